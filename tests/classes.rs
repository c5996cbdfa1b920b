//! Integration tests for classes, instances, statics and enums

use pretty_assertions::assert_eq;
use quill::{run, ErrorKind};

fn run_ok(source: &str) -> String {
    run(source).expect("execution failed")
}

fn run_err(source: &str) -> ErrorKind {
    run(source).expect_err("expected an error").kind
}

#[test]
fn test_class_instantiation() {
    let result = run_ok(r#"
        class Box {
            init(value) {
                this.value = value;
            }
        }
        var b = Box(42);
        print b.value;
        print b;
        print Box;
    "#);
    assert_eq!(result, "42\n<Box instance>\n<class Box>\n");
}

#[test]
fn test_class_method() {
    let result = run_ok(r#"
        class Counter {
            init() {
                this.count = 0;
            }
            inc() {
                this.count = this.count + 1;
                return this.count;
            }
        }
        var c = Counter();
        c.inc();
        c.inc();
        print c.inc();
    "#);
    assert_eq!(result, "3\n");
}

#[test]
fn test_field_initializers_run_before_init() {
    let result = run_ok(r#"
        class Point {
            var x = 1;
            y = 2;
            init(dx) { this.x = this.x + dx; }
            sum() { return this.x + this.y; }
        }
        print Point(10).sum();
    "#);
    assert_eq!(result, "13\n");
}

#[test]
fn test_inheritance_and_super() {
    let result = run_ok(r#"
        class Animal {
            init(name) { this.name = name; }
            speak() { return this.name + " makes a sound"; }
        }
        class Dog < Animal {
            init(name) { super.init(name); this.tricks = 0; }
            speak() { return super.speak() + " (woof)"; }
        }
        var d = Dog("Rex");
        print d.speak();
        print d.tricks;
    "#);
    assert_eq!(result, "Rex makes a sound (woof)\n0\n");
}

#[test]
fn test_inherited_fields_initialize_superclass_first() {
    let result = run_ok(r#"
        class A { var tag = "a"; }
        class B < A { var other = "b"; }
        var b = B();
        print b.tag + b.other;
    "#);
    assert_eq!(result, "ab\n");
}

#[test]
fn test_bound_method_keeps_receiver() {
    let result = run_ok(r#"
        class Greeter {
            init(who) { this.who = who; }
            greet() { return "hi " + this.who; }
        }
        var g = Greeter("ann").greet;
        print g();
    "#);
    assert_eq!(result, "hi ann\n");
}

#[test]
fn test_init_returns_instance_even_with_bare_return() {
    let result = run_ok(r#"
        class Early {
            init(flag) {
                this.flag = flag;
                if (flag) return;
                this.flag = "late";
            }
        }
        var e = Early(true);
        print e.init(false).flag;
    "#);
    assert_eq!(result, "late\n");
}

#[test]
fn test_static_inherited_through_subclass_chain() {
    let result = run_ok("class A { static x = 1; } class B < A {} print B.x;");
    assert_eq!(result, "1\n");
}

#[test]
fn test_static_not_reachable_through_instance() {
    let kind = run_err("class A { static x = 1; } var a = A(); print a.x;");
    assert_eq!(kind, ErrorKind::UndefinedProperty("x".to_string()));
}

#[test]
fn test_static_assignment_writes_to_owner() {
    let result = run_ok(r#"
        class A { static count = 0; }
        class B < A {}
        B.count = B.count + 5;
        print A.count;
        B.fresh = 1;
        print B.fresh;
    "#);
    assert_eq!(result, "5\n1\n");
}

#[test]
fn test_static_methods() {
    let result = run_ok(r#"
        class Temp {
            static scale = 2;
            static double(n) { return n * Temp.scale; }
            init(v) { this.v = v; }
            static make(v) { return Temp(v); }
        }
        print Temp.double(21);
        print Temp.make(7).v;
    "#);
    assert_eq!(result, "42\n7\n");
}

#[test]
fn test_superclass_must_be_class() {
    let kind = run_err("var NotAClass = 1; class B < NotAClass {}");
    assert_eq!(kind, ErrorKind::SuperclassNotClass("int".to_string()));
}

#[test]
fn test_undefined_property() {
    let kind = run_err("class A {} print A().missing;");
    assert_eq!(kind, ErrorKind::UndefinedProperty("missing".to_string()));
}

#[test]
fn test_this_in_static_is_rejected() {
    let kind = run_err("class A { static f() { return this; } }");
    assert_eq!(kind, ErrorKind::InstanceKeywordInStatic("this"));
}

#[test]
fn test_enums() {
    let result = run_ok(r#"
        enum Color { Red, Green, Blue }
        print Color.Green;
        print Color.Blue.ordinal;
        print Color.Red.name;
        print Color.values();
        print Color.Red == Color.Red;
        var names = {Color.Red: "r"};
        print names[Color.Red];
    "#);
    assert_eq!(
        result,
        "Color.Green\n2\nRed\n[Color.Red, Color.Green, Color.Blue]\ntrue\nr\n"
    );
}

#[test]
fn test_iterator_protocol_on_instances() {
    let result = run_ok(r#"
        class Countdown {
            init(n) { this.n = n; }
            hasNext() { return this.n > 0; }
            next() { this.n -= 1; return this.n + 1; }
        }
        foreach (i in Countdown(3)) put i;
        print "";
    "#);
    assert_eq!(result, "321\n");
}

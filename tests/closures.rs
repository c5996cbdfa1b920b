use pretty_assertions::assert_eq;
use quill::run;

#[test]
fn test_shared_mutable_capture() {
    let source = r#"
        var x = 10;
        fun f() { x = x + 1; return x; }
        print f();
        print f();
    "#;
    let result = run(source).expect("Execution failed");
    assert_eq!(result, "11\n12\n");
}

#[test]
fn test_basic_closure() {
    let source = r#"
        var x = "global";
        fun makeClosure() {
            var y = "captured";
            fun inner() {
                return x + " " + y;
            }
            return inner;
        }
        var closure = makeClosure();
        print closure();
    "#;
    let result = run(source).expect("Execution failed");
    assert_eq!(result, "global captured\n");
}

#[test]
fn test_counters_are_independent() {
    let source = r#"
        fun makeCounter() {
            var i = 0;
            fun count() {
                i = i + 1;
                return i;
            }
            return count;
        }
        var c1 = makeCounter();
        var c2 = makeCounter();
        print "" + c1() + "," + c1() + "," + c2();
    "#;
    let result = run(source).expect("Execution failed");
    assert_eq!(result, "1,2,1\n");
}

#[test]
fn test_two_closures_share_one_variable() {
    let source = r#"
        fun pair() {
            var n = 0;
            var inc = fun () { n += 1; };
            var get = fun () { return n; };
            return [inc, get];
        }
        var p = pair();
        p[0]();
        p[0]();
        print p[1]();
    "#;
    let result = run(source).expect("Execution failed");
    assert_eq!(result, "2\n");
}

#[test]
fn test_closure_binds_lexically_not_dynamically() {
    // `show` must keep seeing the global `a` even after a local shadows it
    let source = r#"
        var a = "global";
        {
            fun show() { print a; }
            show();
            var a = "block";
            show();
        }
    "#;
    let result = run(source).expect("Execution failed");
    assert_eq!(result, "global\nglobal\n");
}

#[test]
fn test_foreach_variable_is_fresh_per_iteration() {
    let source = r#"
        var fns = [];
        foreach (i in 0..3) {
            fns.push(fun () { return i; });
        }
        print fns[0]() + fns[1]() + fns[2]();
    "#;
    let result = run(source).expect("Execution failed");
    assert_eq!(result, "3\n");
}

#[test]
fn test_expression_lambdas_and_rest_params() {
    let source = r#"
        var double = |x| x * 2;
        fun sum(first, ...rest) {
            var total = first;
            foreach (n in rest) total += n;
            return total;
        }
        print double(21);
        print sum(1, 2, 3, ...[4, 5]);
    "#;
    let result = run(source).expect("Execution failed");
    assert_eq!(result, "42\n15\n");
}

#[test]
fn test_deep_recursion() {
    let source = r#"
        fun depth(n) {
            if (n == 0) return 0;
            return 1 + depth(n - 1);
        }
        print depth(500);
    "#;
    let result = run(source).expect("Execution failed");
    assert_eq!(result, "500\n");
}

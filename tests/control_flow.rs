//! Loops, early exits and try/catch/finally

use pretty_assertions::assert_eq;
use quill::run;

fn run_ok(source: &str) -> String {
    run(source).expect("execution failed")
}

#[test]
fn test_for_continue_runs_increment() {
    let result = run_ok("for (var i = 0; i < 3; i = i + 1) { if (i == 1) continue; print i; }");
    assert_eq!(result, "0\n2\n");
}

#[test]
fn test_while_break() {
    let result = run_ok(r#"
        var i = 0;
        while (true) {
            i += 1;
            if (i > 4) break;
        }
        print i;
    "#);
    assert_eq!(result, "5\n");
}

#[test]
fn test_do_while_runs_body_once() {
    let result = run_ok("var n = 10; do { print n; n += 1; } while (n < 5);");
    assert_eq!(result, "10\n");
}

#[test]
fn test_repeat_and_loop() {
    let result = run_ok(r#"
        var count = 0;
        repeat (3) count += 1;
        loop {
            count += 10;
            if (count > 30) break;
        }
        print count;
    "#);
    assert_eq!(result, "33\n");
}

#[test]
fn test_break_only_leaves_innermost_loop() {
    let result = run_ok(r#"
        foreach (i in 0..3) {
            foreach (j in 0..3) {
                if (j == 1) break;
                put "" + i + j + " ";
            }
        }
        print "";
    "#);
    assert_eq!(result, "00 10 20 \n");
}

#[test]
fn test_foreach_over_builtin_iterables() {
    let result = run_ok(r#"
        foreach (c in "ab") put c;
        foreach (k in {"x": 1, "y": 2}) put k;
        foreach (b in buffer([7, 8])) put b;
        foreach (n in range(10, 0, -4)) put n;
        foreach (s in set([1, 1, 2])) put s;
        print "";
    "#);
    assert_eq!(result, "abxy78106212\n");
}

#[test]
fn test_iterator_handle() {
    let result = run_ok(r#"
        var it = iter([5, 6]);
        print it.hasNext();
        print it.next();
        print it.index();
        print it.next();
        print it.hasNext();
    "#);
    assert_eq!(result, "true\n5\n1\n6\nfalse\n");
}

#[test]
fn test_try_catch_finally() {
    let result = run_ok(r#"try { throw "boom"; } catch (e) { print e; } finally { print "done"; }"#);
    assert_eq!(result, "boom\ndone\n");
}

#[test]
fn test_finally_runs_once_on_normal_exit() {
    let result = run_ok(r#"try { print "body"; } finally { print "finally"; }"#);
    assert_eq!(result, "body\nfinally\n");
}

#[test]
fn test_finally_runs_once_on_return() {
    let result = run_ok(r#"
        fun f() {
            try { return "returned"; } finally { print "finally"; }
        }
        print f();
    "#);
    assert_eq!(result, "finally\nreturned\n");
}

#[test]
fn test_finally_runs_once_on_break_and_continue() {
    let result = run_ok(r#"
        foreach (i in 0..3) {
            try {
                if (i == 0) continue;
                if (i == 1) break;
            } finally {
                print "finally " + i;
            }
        }
    "#);
    assert_eq!(result, "finally 0\nfinally 1\n");
}

#[test]
fn test_finally_runs_once_on_uncaught_throw() {
    let source = r#"
        fun f() {
            try { throw "inner"; } finally { print "finally"; }
        }
        try { f(); } catch (e) { print "caught " + e.message; }
    "#;
    assert_eq!(run_ok(source), "finally\ncaught inner\n");
}

#[test]
fn test_finally_signal_overrides_pending_return() {
    let result = run_ok(r#"
        fun f() {
            try { return 1; } finally { return 2; }
        }
        print f();
    "#);
    assert_eq!(result, "2\n");
}

#[test]
fn test_throw_from_catch_still_runs_finally() {
    let result = run_ok(r#"
        try {
            try { throw "first"; }
            catch (e) { throw "second"; }
            finally { print "cleanup"; }
        } catch (e) {
            print e.message;
        }
    "#);
    assert_eq!(result, "cleanup\nsecond\n");
}

#[test]
fn test_return_unwinds_through_loops() {
    let result = run_ok(r#"
        fun find(xs, target) {
            foreach (x in xs) {
                while (true) {
                    if (x == target) return "found";
                    break;
                }
            }
            return "missing";
        }
        print find([1, 2, 3], 2);
        print find([1], 9);
    "#);
    assert_eq!(result, "found\nmissing\n");
}

#[test]
fn test_logical_operators_short_circuit() {
    let result = run_ok(r#"
        fun boom() { throw "evaluated"; }
        print false and boom();
        print 1 or boom();
        print nil or "fallback";
        print 0 ? "yes" : "no";
    "#);
    assert_eq!(result, "false\n1\nfallback\nno\n");
}

//! Static and runtime error reporting

use pretty_assertions::assert_eq;
use quill::{run, Config, ErrorKind, Interpreter};

fn run_ok(source: &str) -> String {
    run(source).expect("execution failed")
}

fn run_err(source: &str) -> quill::QuillError {
    run(source).expect_err("expected an error")
}

#[test]
fn test_runtime_errors_are_catchable_with_kind() {
    let result = run_ok(r#"
        try { [1][5]; } catch (e) { print e.kind; }
        try { var d = {"a": 1}; d["b"]; } catch (e) { print e.kind; }
        try { undefinedThing; } catch (e) { print e.kind; }
        try { 1(); } catch (e) { print e.kind; }
        try { assert 1 == 2; } catch (e) { print e.kind; }
        try { 1n / 0n; } catch (e) { print e.kind; }
    "#);
    assert_eq!(
        result,
        "IndexError\nKeyError\nUndefinedVariable\nTypeError\nAssertionError\nDivisionByZero\n"
    );
}

#[test]
fn test_error_objects_carry_line() {
    let result = run_ok("var x = 1;\ntry {\n  throw \"bad\";\n} catch (e) { print e.line; print e.message; }");
    assert_eq!(result, "3\nbad\n");
}

#[test]
fn test_rethrowing_keeps_error_value() {
    let result = run_ok(r#"
        var original = Error("Custom", "nope");
        try { throw original; } catch (e) { print e == original; print e.kind; }
    "#);
    assert_eq!(result, "true\nCustom\n");
}

#[test]
fn test_uncaught_throw() {
    let err = run_err("print 1;\nthrow \"bad\";");
    assert_eq!(err.kind, ErrorKind::Uncaught("bad".to_string()));
    assert_eq!(err.line(), Some(2));
}

#[test]
fn test_error_display_points_at_source() {
    let err = run_err("var a = 1;\nprint missing;");
    let text = err.to_string();
    assert!(text.starts_with("[line 2:7] Error: "), "got {}", text);
    assert!(text.contains("print missing;"));
}

#[test]
fn test_static_errors_stop_before_execution() {
    // Nothing is printed: resolution fails before the first statement runs
    let err = run_err("print \"never\";\nreturn 1;");
    assert_eq!(err.kind, ErrorKind::ReturnOutsideFunction);
    assert_eq!(err.line(), Some(2));

    assert_eq!(run_err("break;").kind, ErrorKind::BreakOutsideLoop);
    assert_eq!(run_err("print this;").kind, ErrorKind::ThisOutsideClass);
    assert_eq!(run_err("class A < A {}").kind, ErrorKind::SelfInheritance("A".to_string()));
    assert_eq!(
        run_err("{ var a = 1; var a = 2; }").kind,
        ErrorKind::DuplicateDeclaration("a".to_string())
    );
    assert_eq!(
        run_err("{ var a = a; }").kind,
        ErrorKind::SelfReferentialInitializer("a".to_string())
    );
}

#[test]
fn test_wrong_arity() {
    let err = run_err("fun f(a, b) {} f(1);");
    assert_eq!(
        err.kind,
        ErrorKind::WrongArity {
            name: "f".to_string(),
            expected: "2".to_string(),
            got: 1,
        }
    );
}

#[test]
fn test_stack_overflow_respects_config() {
    let mut interpreter = Interpreter::with_config(Config::new().max_call_depth(50)).capture_output();
    let program = quill::compile("fun f(n) { return f(n + 1); } f(0);", &mut interpreter)
        .expect("compiles");
    let err = interpreter.interpret(&program, false).expect_err("overflows");
    assert_eq!(err.kind, ErrorKind::StackOverflow(50));
}

#[test]
fn test_interpreter_recovers_after_error() {
    let mut interpreter = Interpreter::with_config(Config::repl()).capture_output();
    let first = quill::compile("var x = 1; fun f() { throw \"x\"; } f();", &mut interpreter)
        .expect("compiles");
    assert!(interpreter.interpret(&first, true).is_err());

    let second = quill::compile("x + 1;", &mut interpreter).expect("compiles");
    interpreter.interpret(&second, true).expect("runs");
    assert_eq!(interpreter.take_output(), "2\n");
}

#[test]
fn test_repl_allows_redeclaring_globals() {
    let mut interpreter = Interpreter::with_config(Config::repl()).capture_output();
    for line in ["var a = 1;", "var a = 2;", "a;"] {
        let program = quill::compile(line, &mut interpreter).expect("compiles");
        interpreter.interpret(&program, true).expect("runs");
    }
    assert_eq!(interpreter.take_output(), "2\n");
}

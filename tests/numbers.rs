//! The numeric tower as seen from scripts

use pretty_assertions::assert_eq;
use quill::{run, ErrorKind};

fn eval_lines(exprs: &[&str]) -> String {
    let source: String = exprs.iter().map(|e| format!("print {};\n", e)).collect();
    run(&source).expect("execution failed")
}

#[test]
fn test_division_is_exact_or_float() {
    assert_eq!(eval_lines(&["7 / 2", "8 / 2", "-9 / 3", "7 % 3", "1.5 * 2"]), "3.5\n4\n-3\n1\n3.0\n");
}

#[test]
fn test_integer_overflow_promotes_to_bigint() {
    let result = eval_lines(&[
        "9223372036854775807 + 1",
        "type(9223372036854775807 + 1)",
        "2 ** 10",
        "2n ** 100n",
    ]);
    assert_eq!(
        result,
        "9223372036854775808\nbigint\n1024\n1267650600228229401496703205376\n"
    );
}

#[test]
fn test_unsigned_wraps() {
    assert_eq!(eval_lines(&["0u - 1u", "type(3u + 1u)", "3u + 1"]), "18446744073709551615\nuint\n4\n");
}

#[test]
fn test_mixed_kinds_rise_in_the_tower() {
    let result = eval_lines(&["type(1 + 1.0)", "type(1 + 1n)", "type(1.5 + 1n)", "1.5n + 1"]);
    assert_eq!(result, "float\nbigint\nbigfloat\n2.5\n");
}

#[test]
fn test_cross_kind_equality_and_ordering() {
    let result = eval_lines(&[
        "1 == 1.0",
        "1 == 1n",
        "1u == 1",
        "true == 1",
        "nil == 0",
        "1 < 2.5",
        "\"a\" < \"b\"",
        "3n > 2",
    ]);
    assert_eq!(result, "true\ntrue\ntrue\nfalse\nfalse\ntrue\ntrue\ntrue\n");
}

#[test]
fn test_string_arithmetic() {
    let result = eval_lines(&["\"n=\" + 1", "1 + \"!\"", "\"ab\" * 3", "[1] + [2]"]);
    assert_eq!(result, "n=1\n1!\nababab\n[1, 2]\n");
}

#[test]
fn test_bitwise_on_integers() {
    let result = eval_lines(&["6 & 3", "6 | 3", "6 ^ 3", "~5", "1 << 4", "256 >> 2", "1 << 70"]);
    assert_eq!(result, "2\n7\n5\n-6\n16\n64\n1180591620717411303424\n");
}

#[test]
fn test_bitwise_on_floats_truncates_toward_zero() {
    assert_eq!(eval_lines(&["5.9 & 3", "-5.9 | 0"]), "1\n-5\n");
}

#[test]
fn test_bitwise_on_non_finite_float_is_an_error() {
    let err = run("print (0.0 / 0.0) & 1;").expect_err("NaN operand");
    assert!(matches!(err.kind, ErrorKind::InvalidBitwiseOperand(_)), "got {:?}", err.kind);
}

#[test]
fn test_negative_shift_is_an_error() {
    let err = run("print 1 << -1;").expect_err("negative shift");
    assert!(
        matches!(err.kind, ErrorKind::Runtime(ref m) if m.contains("negative shift")),
        "got {:?}",
        err.kind
    );
}

#[test]
fn test_conversions() {
    let result = eval_lines(&[
        "int(\"42\")",
        "int(3.9)",
        "float(\"2.5\")",
        "bigint(\"123456789012345678901234567890\") + 1",
        "type(uint(5))",
        "str(1.0) + str(nil)",
    ]);
    assert_eq!(
        result,
        "42\n3\n2.5\n123456789012345678901234567891\nuint\n1.0nil\n"
    );
}

#[test]
fn test_math_natives() {
    let result = eval_lines(&[
        "abs(-3)",
        "floor(2.7)",
        "ceil(2.1)",
        "round(2.5)",
        "sqrt(16)",
        "min(3, 1, 2)",
        "max([4, 9, 2])",
    ]);
    assert_eq!(result, "3\n2\n3\n3\n4.0\n1\n9\n");
}

#[test]
fn test_truthiness_of_numbers() {
    let result = eval_lines(&["0 ? 1 : 2", "0.0 ? 1 : 2", "0n ? 1 : 2", "(0.0 / 0.0) ? 1 : 2", "-1 ? 1 : 2"]);
    assert_eq!(result, "2\n2\n2\n2\n1\n");
}

#[test]
fn test_huge_bigint_exponent_is_an_error() {
    let result = run("try { 2n ** 4000000000; } catch (e) { print e.kind; } print 1n ** 4000000000;")
        .expect("execution failed");
    assert_eq!(result, "Error\n1\n");
}

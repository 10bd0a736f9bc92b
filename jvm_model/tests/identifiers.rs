//! Round trips and rejections across the public identifier grammar.

use pretty_assertions::assert_eq;
use anyhow::Result;
use jvm_model::{AbsMethodId, Case, Input, MethodId, Outcome, Type, Value};

#[test]
fn descriptor_round_trips() -> Result<()> {
	for descriptor in [
		"Z", "B", "S", "C", "I", "J", "F", "D",
		"[I", "[[Z", "[[[D",
		"Ljava/lang/Object;", "Ljava/lang/String;", "[Ljava/lang/Thread;",
	] {
		assert_eq!(Type::parse(descriptor)?.write(), descriptor);
	}
	Ok(())
}

#[test]
fn descriptor_rejections() {
	for bad in ["", "V", "X", "II", "[", "[V", "L;;", "Lmissing/semi"] {
		assert!(Type::parse(bad).is_err(), "{bad:?} should not parse");
	}
}

#[test]
fn method_id_round_trips() -> Result<()> {
	for id in [
		"divide:(II)I",
		"main:([Ljava/lang/String;)V",
		"mixed:(ZBSCIJFD[I)Ljava/lang/Object;",
		"noargs:()V",
	] {
		assert_eq!(MethodId::parse(id)?.write(), id);
	}
	Ok(())
}

#[test]
fn absolute_method_id_round_trips() -> Result<()> {
	for id in [
		"jpamb/cases/Simple.divide:(II)I",
		"jpamb/cases/Arrays.first:([I)I",
		"NoPackage.run:()V",
	] {
		assert_eq!(AbsMethodId::parse(id)?.write(), id);
	}
	Ok(())
}

#[test]
fn case_lines_round_trip() -> Result<()> {
	for line in [
		"jpamb/cases/Simple.divide:(II)I (6, 0) -> divide by zero",
		"jpamb/cases/Simple.assertPositive:(I)V (-1) -> assertion error",
		"jpamb/cases/Arrays.first:([I)I ([I:]) -> out of bounds",
		"jpamb/cases/Arrays.first:([I)I (null) -> null pointer",
		"jpamb/cases/Loops.forever:()V () -> *",
		"jpamb/cases/Chars.pick:([CI)C ([C:'h', 'i'], 1) -> ok",
	] {
		let case = Case::parse(line)?;
		assert_eq!(case.to_string(), line);
	}
	Ok(())
}

#[test]
fn case_line_rejections() {
	for bad in [
		"",
		"just a string",
		"a/B.f:()V missing-arrow",
		"a/B.f:()V (1 -> ok",
		"a/B.f:()V (1) -> sideways",
		"f:()V (1) -> ok",
	] {
		assert!(Case::parse(bad).is_err(), "{bad:?} should not parse");
	}
}

#[test]
fn inputs_evaluate_to_values() -> Result<()> {
	let input = Input::parse("(6, true, 'x', [I:1, 2], null)")?;
	assert_eq!(input.values, vec![
		Value::Int(6),
		Value::Boolean(true),
		Value::Char('x'),
		Value::Array(Type::Int, vec![Value::Int(1), Value::Int(2)]),
		Value::NULL,
	]);
	Ok(())
}

#[test]
fn all_outcomes_have_stable_names() {
	let names: Vec<String> = Outcome::QUERIES.iter().map(|o| o.to_string()).collect();
	assert_eq!(names, vec![
		"ok",
		"assertion error",
		"divide by zero",
		"out of bounds",
		"null pointer",
		"*",
	]);
}

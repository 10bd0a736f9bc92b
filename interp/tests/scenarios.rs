//! End to end runs of both interpreters over hand assembled methods.

use pretty_assertions::assert_eq;
use anyhow::Result;
use domains::{Interval, KSet, SignSet};
use interp::{AbstractAnalysis, Coverage};
use jvm_model::opcode::{BinaryOp, Condition, Insn, InvokeKind, Opcode};
use jvm_model::{AbsMethodId, Bytecode, Outcome, Type, Value};

fn assemble(ops: Vec<(Opcode, u32)>) -> Vec<Insn> {
	ops.into_iter()
		.enumerate()
		.map(|(offset, (op, line))| Insn { offset, line: Some(line), op })
		.collect()
}

fn load_int(index: usize) -> Opcode {
	Opcode::Load { ty: Type::Int, index }
}

fn push_int(value: i32) -> Opcode {
	Opcode::Push { value: Value::Int(value) }
}

fn divide_method() -> Result<(AbsMethodId, Vec<Insn>)> {
	let id = AbsMethodId::parse("jpamb/cases/Simple.divide:(II)I")?;
	let code = assemble(vec![
		(load_int(0), 1),
		(load_int(1), 1),
		(Opcode::Binary { ty: Type::Int, op: BinaryOp::Div }, 1),
		(Opcode::Return { ty: Some(Type::Int) }, 1),
	]);
	Ok((id, code))
}

fn assert_positive_method() -> Result<(AbsMethodId, Vec<Insn>)> {
	let id = AbsMethodId::parse("jpamb/cases/Simple.assertPositive:(I)V")?;
	let assertions_disabled = serde_json::json!({
		"opr": "get", "offset": 0, "static": true,
		"field": {"class": "jpamb/cases/Simple", "name": "$assertionsDisabled", "type": "boolean"},
	});
	let code = vec![
		Insn::from_json(&assertions_disabled)?,
		Insn { offset: 1, line: Some(1), op: Opcode::Ifz { condition: Condition::Ne, target: 5 } },
		Insn { offset: 2, line: Some(1), op: load_int(0) },
		Insn { offset: 3, line: Some(1), op: Opcode::Ifz { condition: Condition::Gt, target: 5 } },
		Insn {
			offset: 4,
			line: Some(1),
			op: Opcode::New { class: "java/lang/AssertionError".into() },
		},
		Insn { offset: 5, line: Some(2), op: Opcode::Return { ty: None } },
	];
	Ok((id, code))
}

fn first_element_method() -> Result<(AbsMethodId, Vec<Insn>)> {
	let id = AbsMethodId::parse("jpamb/cases/Simple.array:([I)I")?;
	let code = assemble(vec![
		(Opcode::Load { ty: Type::Reference, index: 0 }, 1),
		(push_int(0), 1),
		(Opcode::ArrayLoad { ty: Type::Int }, 1),
		(Opcode::Return { ty: Some(Type::Int) }, 1),
	]);
	Ok((id, code))
}

fn countdown_method() -> Result<(AbsMethodId, Vec<Insn>)> {
	let id = AbsMethodId::parse("jpamb/cases/Loops.countdown:(I)V")?;
	let code = assemble(vec![
		(load_int(0), 1),
		(Opcode::Ifz { condition: Condition::Le, target: 4 }, 1),
		(Opcode::Incr { index: 0, amount: -1 }, 2),
		(Opcode::Goto { target: 0 }, 1),
		(Opcode::Return { ty: None }, 3),
	]);
	Ok((id, code))
}

fn constant_false_branch_method() -> Result<(AbsMethodId, Vec<Insn>)> {
	let id = AbsMethodId::parse("jpamb/cases/Simple.constantFalse:()I")?;
	let code = assemble(vec![
		(push_int(0), 1),
		(Opcode::Ifz { condition: Condition::Eq, target: 4 }, 1),
		(push_int(1), 2),
		(Opcode::Store { ty: Type::Int, index: 1 }, 2),
		(push_int(0), 3),
		(Opcode::Return { ty: Some(Type::Int) }, 3),
	]);
	Ok((id, code))
}

fn factorial_method() -> Result<(AbsMethodId, Vec<Insn>)> {
	let id = AbsMethodId::parse("jpamb/cases/Calls.fact:(I)I")?;
	let code = assemble(vec![
		(load_int(0), 1),
		(push_int(1), 1),
		(Opcode::If { condition: Condition::Gt, target: 5 }, 1),
		(push_int(1), 2),
		(Opcode::Return { ty: Some(Type::Int) }, 2),
		(load_int(0), 3),
		(load_int(0), 3),
		(push_int(1), 3),
		(Opcode::Binary { ty: Type::Int, op: BinaryOp::Sub }, 3),
		(Opcode::Invoke { kind: InvokeKind::Static, method: AbsMethodId::parse("jpamb/cases/Calls.fact:(I)I")?, stack_size: None }, 3),
		(Opcode::Binary { ty: Type::Int, op: BinaryOp::Mul }, 3),
		(Opcode::Return { ty: Some(Type::Int) }, 3),
	]);
	Ok((id, code))
}

fn run_concrete(bytecode: &Bytecode, id: &AbsMethodId, args: &[Value]) -> Result<Outcome> {
	let mut coverage = Coverage::new();
	interp::run(bytecode, id, args, 1_000, &mut coverage)
}

#[test]
fn divide_concrete() -> Result<()> {
	let (id, code) = divide_method()?;
	let bytecode = Bytecode::preloaded([(id.clone(), code)]);

	assert_eq!(run_concrete(&bytecode, &id, &[Value::Int(6), Value::Int(2)])?, Outcome::Ok);
	assert_eq!(
		run_concrete(&bytecode, &id, &[Value::Int(6), Value::Int(0)])?,
		Outcome::DivideByZero,
	);
	Ok(())
}

#[test]
fn divide_abstract_cannot_rule_out_either() -> Result<()> {
	let (id, code) = divide_method()?;
	let bytecode = Bytecode::preloaded([(id.clone(), code)]);

	let result = AbstractAnalysis::new(&bytecode).run::<SignSet>(&id)?;
	assert!(result.possible(Outcome::Ok));
	assert!(result.possible(Outcome::DivideByZero));
	assert!(!result.possible(Outcome::AssertionError));
	Ok(())
}

#[test]
fn divide_abstract_interval_agrees() -> Result<()> {
	let (id, code) = divide_method()?;
	let bytecode = Bytecode::preloaded([(id.clone(), code)]);

	let result = AbstractAnalysis::new(&bytecode).run::<Interval>(&id)?;
	assert!(result.possible(Outcome::Ok));
	assert!(result.possible(Outcome::DivideByZero));
	Ok(())
}

#[test]
fn guarded_divide_rules_out_the_zero() -> Result<()> {
	// int safeDivide(int x, int y) { if (y == 0) return 0; return x / y; }
	let id = AbsMethodId::parse("jpamb/cases/Simple.safeDivide:(II)I")?;
	let code = assemble(vec![
		(load_int(1), 1),
		(Opcode::Ifz { condition: Condition::Eq, target: 6 }, 1),
		(load_int(0), 2),
		(load_int(1), 2),
		(Opcode::Binary { ty: Type::Int, op: BinaryOp::Div }, 2),
		(Opcode::Return { ty: Some(Type::Int) }, 2),
		(push_int(0), 1),
		(Opcode::Return { ty: Some(Type::Int) }, 1),
	]);
	let bytecode = Bytecode::preloaded([(id.clone(), code)]);

	// the guard's refinement removes zero from the divisor, so only ok
	// survives
	let result = AbstractAnalysis::new(&bytecode).run::<SignSet>(&id)?;
	assert_eq!(result.outcomes, [Outcome::Ok].into_iter().collect());

	assert_eq!(run_concrete(&bytecode, &id, &[Value::Int(8), Value::Int(0)])?, Outcome::Ok);
	assert_eq!(run_concrete(&bytecode, &id, &[Value::Int(8), Value::Int(2)])?, Outcome::Ok);
	Ok(())
}

#[test]
fn assertion_concrete() -> Result<()> {
	let (id, code) = assert_positive_method()?;
	let bytecode = Bytecode::preloaded([(id.clone(), code)]);

	assert_eq!(run_concrete(&bytecode, &id, &[Value::Int(5)])?, Outcome::Ok);
	assert_eq!(run_concrete(&bytecode, &id, &[Value::Int(-1)])?, Outcome::AssertionError);
	Ok(())
}

#[test]
fn assertion_abstract() -> Result<()> {
	let (id, code) = assert_positive_method()?;
	let bytecode = Bytecode::preloaded([(id.clone(), code)]);

	let result = AbstractAnalysis::new(&bytecode).run::<SignSet>(&id)?;
	assert!(result.possible(Outcome::Ok));
	assert!(result.possible(Outcome::AssertionError));
	assert!(!result.possible(Outcome::DivideByZero));
	Ok(())
}

#[test]
fn array_access_concrete() -> Result<()> {
	let (id, code) = first_element_method()?;
	let bytecode = Bytecode::preloaded([(id.clone(), code)]);

	assert_eq!(run_concrete(&bytecode, &id, &[Value::NULL])?, Outcome::NullPointer);
	assert_eq!(
		run_concrete(&bytecode, &id, &[Value::Array(Type::Int, vec![])])?,
		Outcome::OutOfBounds,
	);
	assert_eq!(
		run_concrete(&bytecode, &id, &[Value::Array(Type::Int, vec![Value::Int(10)])])?,
		Outcome::Ok,
	);
	Ok(())
}

#[test]
fn countdown_concrete_and_abstract() -> Result<()> {
	let (id, code) = countdown_method()?;
	let bytecode = Bytecode::preloaded([(id.clone(), code)]);

	assert_eq!(run_concrete(&bytecode, &id, &[Value::Int(3)])?, Outcome::Ok);

	let mut thresholds = KSet::new();
	for v in [-1, 0, 1, 3] {
		thresholds.insert(v);
	}
	let result = AbstractAnalysis::new(&bytecode)
		.with_thresholds(thresholds)
		.run::<Interval>(&id)?;

	assert!(result.possible(Outcome::Ok));
	// every line of the loop is reachable, including the body
	let lines = result.coverage.lines_of(&id);
	assert_eq!(lines, [1, 2, 3].into_iter().collect());
	Ok(())
}

#[test]
fn constant_false_branch_is_dead() -> Result<()> {
	let (id, code) = constant_false_branch_method()?;
	let bytecode = Bytecode::preloaded([(id.clone(), code)]);

	let result = AbstractAnalysis::new(&bytecode).run::<SignSet>(&id)?;
	assert_eq!(result.outcomes, [Outcome::Ok].into_iter().collect());

	// the impossible branch body on line 2 is never covered
	let lines = result.coverage.lines_of(&id);
	assert_eq!(lines, [1, 3].into_iter().collect());
	Ok(())
}

#[test]
fn recursion_reaches_a_fixpoint() -> Result<()> {
	let (id, code) = factorial_method()?;
	let bytecode = Bytecode::preloaded([(id.clone(), code)]);

	assert_eq!(run_concrete(&bytecode, &id, &[Value::Int(5)])?, Outcome::Ok);

	let result = AbstractAnalysis::new(&bytecode).run::<SignSet>(&id)?;
	assert_eq!(result.outcomes, [Outcome::Ok].into_iter().collect());
	Ok(())
}

#[test]
fn concrete_runs_are_deterministic() -> Result<()> {
	let (id, code) = countdown_method()?;
	let bytecode = Bytecode::preloaded([(id.clone(), code)]);

	let mut first = Coverage::new();
	let mut second = Coverage::new();
	let a = interp::run(&bytecode, &id, &[Value::Int(7)], 1_000, &mut first)?;
	let b = interp::run(&bytecode, &id, &[Value::Int(7)], 1_000, &mut second)?;

	assert_eq!(a, b);
	assert_eq!(first, second);
	Ok(())
}

#[test]
fn concrete_coverage_is_within_abstract_coverage() -> Result<()> {
	let (id, code) = countdown_method()?;
	let bytecode = Bytecode::preloaded([(id.clone(), code)]);

	let mut concrete = Coverage::new();
	interp::run(&bytecode, &id, &[Value::Int(3)], 1_000, &mut concrete)?;

	let abstracted = AbstractAnalysis::new(&bytecode).run::<Interval>(&id)?;
	let concrete_lines = concrete.lines_of(&id);
	let abstract_lines = abstracted.coverage.lines_of(&id);

	assert!(concrete_lines.is_subset(&abstract_lines));
	Ok(())
}

#[test]
fn step_budget_attributes_divergence() -> Result<()> {
	let id = AbsMethodId::parse("jpamb/cases/Loops.forever:()V")?;
	let code = assemble(vec![(Opcode::Goto { target: 0 }, 1)]);
	let bytecode = Bytecode::preloaded([(id.clone(), code)]);

	assert_eq!(run_concrete(&bytecode, &id, &[])?, Outcome::Diverges);

	// the abstract fixpoint stabilizes without any terminating path
	let result = AbstractAnalysis::new(&bytecode).run::<SignSet>(&id)?;
	assert_eq!(result.outcomes, [Outcome::Diverges].into_iter().collect());
	Ok(())
}

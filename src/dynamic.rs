use std::collections::BTreeMap;
use anyhow::Result;
use log::debug;
use interp::Coverage;
use jvm_model::{AbsMethodId, Bytecode, Outcome, Suite, Type, Value};
use debloat::syntactic::{interesting_values, SourceTree};

/// How many input tuples are tried per method.
const ROLLS: usize = 50;
/// Steps before one run is written off as non-terminating.
const MAX_EXEC_STEPS: usize = 1_000;
/// The floor every wager keeps, since the tried inputs prove nothing
/// about the ones not tried.
const GUESS_FLOOR: u32 = 20;

/// A concrete guessing strategy: run the method on inputs seeded from the
/// literals of its own source, tally the outcomes, and wager on the
/// frequencies.
pub fn dynamic(suite: &Suite, method: &str) -> Result<()> {
	let method = AbsMethodId::parse(method)?;
	let bytecode = Bytecode::new(suite.clone());

	let mut tally: BTreeMap<Outcome, usize> = BTreeMap::new();

	if method.member.params.is_empty() {
		// one run decides everything
		let outcome = execute(&bytecode, &method, Vec::new())?;
		for query in Outcome::QUERIES {
			let wager = match (query == outcome, query) {
				(true, _) => 99,
				// non-termination claims leave a sliver for ok
				(false, Outcome::Ok) if outcome == Outcome::Diverges => 1,
				_ => 0,
			};
			println!("{query};{wager}%");
		}
		return Ok(());
	}

	let inputs = generate_inputs(suite, &method);
	let rolls = inputs.len();
	for input in inputs {
		debug!("dynamic roll of {method} on {input:?}");
		let outcome = execute(&bytecode, &method, input)?;
		*tally.entry(outcome).or_default() += 1;
	}

	for query in Outcome::QUERIES {
		let hits = tally.get(&query).copied().unwrap_or(0);
		let wager = (hits * (100 - GUESS_FLOOR as usize) / rolls.max(1)) as u32 + GUESS_FLOOR;
		println!("{query};{wager}%");
	}
	Ok(())
}

fn execute(bytecode: &Bytecode, method: &AbsMethodId, input: Vec<Value>) -> Result<Outcome> {
	let mut coverage = Coverage::new();
	let outcome = match interp::run(bytecode, method, &input, MAX_EXEC_STEPS, &mut coverage) {
		Ok(outcome) => outcome,
		Err(error) => {
			// a run the interpreter cannot model tells us nothing
			log::warn!("run of {method} failed: {error:#}");
			Outcome::Diverges
		},
	};
	// the negative size marker is not a query of its own; the closest
	// query is the bounds failure
	Ok(match outcome {
		Outcome::NegativeArraySize => Outcome::OutOfBounds,
		other => other,
	})
}

/// Deterministic input tuples: every parameter cycles through its
/// candidate values, offset by the roll so the combinations spread.
fn generate_inputs(suite: &Suite, method: &AbsMethodId) -> Vec<Vec<Value>> {
	let mined = SourceTree::from_file(&suite.sourcefile(&method.class))
		.ok()
		.and_then(|tree| {
			let node = tree.method_node(method).ok()?;
			Some(interesting_values(&tree, node))
		})
		.unwrap_or_default();

	let candidate_sets: Vec<Vec<Value>> = method.member.params.iter()
		.map(|ty| candidates(ty, &mined))
		.collect();

	(0..ROLLS)
		.map(|roll| {
			candidate_sets.iter()
				.enumerate()
				.map(|(slot, set)| set[(roll + slot * 7) % set.len()].clone())
				.collect()
		})
		.collect()
}

/// The values worth trying for one parameter: the mined literals around
/// zero first, then a spread of magnitudes.
fn candidates(ty: &Type, mined: &std::collections::BTreeSet<i64>) -> Vec<Value> {
	match ty {
		Type::Boolean => vec![Value::Int(0), Value::Int(1)],
		Type::Char => vec![Value::Int('a' as i32), Value::Int('0' as i32), Value::Int(0)],
		Type::Array(inner) if matches!(**inner, Type::Int) => vec![
			Value::NULL,
			Value::Array(Type::Int, vec![]),
			Value::Array(Type::Int, vec![Value::Int(0)]),
			Value::Array(Type::Int, vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
		],
		Type::Array(inner) if matches!(**inner, Type::Char) => vec![
			Value::NULL,
			Value::Array(Type::Char, vec![]),
			Value::Array(Type::Char, vec![Value::Char('a'), Value::Char('b')]),
		],
		_ => {
			let mut values: Vec<i64> = mined.iter().copied().collect();
			for spread in [0, 1, -1, 2, 7, 100, -100, i32::MAX as i64, i32::MIN as i64] {
				if !values.contains(&spread) {
					values.push(spread);
				}
			}
			values.into_iter().map(|v| Value::Int(v as i32)).collect()
		},
	}
}

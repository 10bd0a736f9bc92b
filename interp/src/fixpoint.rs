use std::collections::{BTreeMap, BTreeSet};
use anyhow::{anyhow, bail, Result};
use indexmap::{IndexMap, IndexSet};
use log::{debug, warn};
use domains::{DivOutcome, Domain, KSet, Relation};
use jvm_model::{
	AbsMethodId, BinaryOp, Bytecode, Condition, InvokeKind, Opcode, Outcome, Pc, Type, Value,
};
use crate::coverage::Coverage;
use crate::stack::Stack;

/// An abstract call frame: the same shape as the concrete one, but the
/// values live in some domain `D`.
#[derive(Debug, Clone, PartialEq)]
pub struct AFrame<D> {
	pub locals: BTreeMap<usize, D>,
	pub stack: Stack<D>,
	pub pc: Pc,
}

impl<D: Domain> AFrame<D> {
	pub fn entry(method: AbsMethodId) -> AFrame<D> {
		AFrame {
			locals: BTreeMap::new(),
			stack: Stack::empty(),
			pc: Pc::entry(method),
		}
	}
}

/// An abstract machine state. The top frame's program counter is the
/// program point this state belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct AState<D> {
	pub heap: BTreeMap<u32, D>,
	pub frames: Vec<AFrame<D>>,
	pub next_addr: u32,
}

/// How two abstract values are merged when states meet at a program
/// point: the plain join, or widening through the threshold set once a
/// point has been revisited often enough.
#[derive(Copy, Clone)]
enum Merge<'k> {
	Join,
	Widen(&'k KSet),
}

impl Merge<'_> {
	fn apply<D: Domain>(self, old: &D, new: &D) -> D {
		match self {
			Merge::Join => old.join(new),
			Merge::Widen(thresholds) => old.widen(&old.join(new), thresholds),
		}
	}
}

impl<D: Domain> AState<D> {
	fn pc(&self) -> Result<&Pc> {
		self.frames.last()
			.map(|frame| &frame.pc)
			.ok_or_else(|| anyhow!("abstract state with an empty call stack"))
	}

	fn top_mut(&mut self) -> Result<&mut AFrame<D>> {
		self.frames.last_mut().ok_or_else(|| anyhow!("abstract state with an empty call stack"))
	}

	/// Pointwise merge of two states reaching the same program point.
	/// Mismatched call-stack shapes indicate malformed control flow and
	/// are fatal.
	fn merge_with(&mut self, other: &AState<D>, merge: Merge<'_>) -> Result<()> {
		if self.frames.len() != other.frames.len() {
			bail!(
				"call stack depths differ at join: {} != {}",
				self.frames.len(),
				other.frames.len(),
			);
		}

		for (addr, value) in &other.heap {
			match self.heap.get(addr) {
				Some(existing) => {
					let merged = merge.apply(existing, value);
					self.heap.insert(*addr, merged);
				},
				None => {
					self.heap.insert(*addr, value.clone());
				},
			}
		}

		for (mine, theirs) in self.frames.iter_mut().zip(&other.frames) {
			if mine.pc != theirs.pc {
				bail!("program counters differ at join: {} != {}", mine.pc, theirs.pc);
			}
			if mine.stack.len() != theirs.stack.len() {
				bail!(
					"operand stack depths differ at {}: {} != {}",
					mine.pc,
					mine.stack.len(),
					theirs.stack.len(),
				);
			}

			for (index, value) in &theirs.locals {
				match mine.locals.get(index) {
					Some(existing) => {
						let merged = merge.apply(existing, value);
						mine.locals.insert(*index, merged);
					},
					None => {
						mine.locals.insert(*index, value.clone());
					},
				}
			}

			for (a, b) in mine.stack.iter_mut().zip(theirs.stack.iter()) {
				*a = merge.apply(a, b);
			}
		}

		self.next_addr = self.next_addr.max(other.next_addr);
		Ok(())
	}
}

/// The per-program-point state table plus the worklist of points that
/// still need processing.
struct StateSet<D> {
	states: IndexMap<Pc, AState<D>>,
	worklist: IndexSet<Pc>,
}

impl<D: Domain> StateSet<D> {
	fn new() -> StateSet<D> {
		StateSet { states: IndexMap::new(), worklist: IndexSet::new() }
	}

	fn contains(&self, pc: &Pc) -> bool {
		self.states.contains_key(pc)
	}

	fn get(&self, pc: &Pc) -> Result<&AState<D>> {
		self.states.get(pc).ok_or_else(|| anyhow!("no state stored for {pc}"))
	}

	/// First-in-first-out over insertion order, so runs are reproducible.
	fn pop_work(&mut self) -> Option<Pc> {
		self.worklist.shift_remove_index(0)
	}

	/// Merges a successor into the table; the point goes (back) on the
	/// worklist if its state changed.
	fn absorb(&mut self, state: AState<D>, merge: Merge<'_>) -> Result<()> {
		let pc = state.pc()?.clone();
		match self.states.get(&pc) {
			None => {
				self.states.insert(pc.clone(), state);
				self.worklist.insert(pc);
			},
			Some(existing) => {
				let mut merged = existing.clone();
				merged.merge_with(&state, merge)?;
				if merged != *existing {
					self.states.insert(pc.clone(), merged);
					self.worklist.insert(pc);
				}
			},
		}
		Ok(())
	}
}

/// One outgoing edge of an abstract step: a successor state, or a
/// possible outcome of the method.
enum Flow<D> {
	State(AState<D>),
	Verdict(Outcome),
}

fn cannot_analyze<D>(what: &dyn std::fmt::Display, pc: &Pc) -> Result<Vec<Flow<D>>> {
	warn!("cannot analyze {what} at {pc}; giving up on this path");
	Ok(vec![Flow::Verdict(Outcome::Diverges)])
}

fn relation_of(condition: Condition) -> Option<Relation> {
	match condition {
		Condition::Eq => Some(Relation::Eq),
		Condition::Ne => Some(Relation::Ne),
		Condition::Lt => Some(Relation::Lt),
		Condition::Le => Some(Relation::Le),
		Condition::Gt => Some(Relation::Gt),
		Condition::Ge => Some(Relation::Ge),
		Condition::Is | Condition::IsNot => None,
	}
}

/// The local variable a popped operand was loaded from, if the producing
/// instruction is still recognizable. `back` is the distance from the
/// branch to the producer; for the deeper operand the instruction in
/// between must be a plain single-push producer for the match to hold.
fn producer_local(bytecode: &Bytecode, pc: &Pc, back: usize) -> Option<usize> {
	if pc.offset < back {
		return None;
	}
	if back == 2 {
		let between = bytecode.insn(&pc.jump(pc.offset - 1)).ok()?;
		if !matches!(between.op, Opcode::Load { .. } | Opcode::Push { .. }) {
			return None;
		}
	}
	let producer = bytecode.insn(&pc.jump(pc.offset - back)).ok()?;
	match producer.op {
		Opcode::Load { index, .. } => Some(index),
		_ => None,
	}
}

fn is_wide(ty: &Type) -> bool {
	matches!(ty, Type::Long | Type::Double)
}

/// Executes one instruction of an abstract state, returning every
/// successor state and every outcome the instruction cannot rule out.
/// Successors are independent copies.
fn step<D: Domain>(state: &AState<D>, bytecode: &Bytecode) -> Result<Vec<Flow<D>>> {
	let pc = state.pc()?.clone();
	let insn = bytecode.insn(&pc)?;
	debug!("abstract step {insn} of {}", pc.method);

	match insn.op {
		Opcode::Push { ref value } => {
			let constant = match value {
				Value::Int(i) => Some(*i as i64),
				Value::Boolean(b) => Some(*b as i64),
				Value::Byte(i) => Some(*i as i64),
				Value::Short(i) => Some(*i as i64),
				Value::Char(c) => Some(*c as i64),
				Value::Long(i) => Some(*i),
				_ => None,
			};
			let Some(constant) = constant else {
				return cannot_analyze(&insn, &pc);
			};
			let mut next = state.clone();
			let frame = next.top_mut()?;
			frame.stack.push(D::constant(constant));
			frame.pc = pc.next();
			Ok(vec![Flow::State(next)])
		},

		Opcode::Load { index, .. } => {
			let mut next = state.clone();
			let frame = next.top_mut()?;
			let value = frame.locals.get(&index)
				.ok_or_else(|| anyhow!("local variable {index} not initialized at {pc}"))?
				.clone();
			frame.stack.push(value);
			frame.pc = pc.next();
			Ok(vec![Flow::State(next)])
		},

		Opcode::Store { index, .. } => {
			let mut next = state.clone();
			let frame = next.top_mut()?;
			let value = frame.stack.pop()?;
			frame.locals.insert(index, value);
			frame.pc = pc.next();
			Ok(vec![Flow::State(next)])
		},

		Opcode::Dup { .. } => {
			let mut next = state.clone();
			let frame = next.top_mut()?;
			let value = frame.stack.peek()?.clone();
			frame.stack.push(value);
			frame.pc = pc.next();
			Ok(vec![Flow::State(next)])
		},

		Opcode::Incr { index, amount } => {
			let mut next = state.clone();
			let frame = next.top_mut()?;
			let value = frame.locals.get(&index)
				.ok_or_else(|| anyhow!("local variable {index} not initialized at {pc}"))?;
			let incremented = value.add(&D::constant(amount as i64));
			frame.locals.insert(index, incremented);
			frame.pc = pc.next();
			Ok(vec![Flow::State(next)])
		},

		Opcode::Goto { target } => {
			let mut next = state.clone();
			next.top_mut()?.pc = pc.jump(target);
			Ok(vec![Flow::State(next)])
		},

		Opcode::Binary { ty: Type::Int | Type::Long, op } => {
			let mut next = state.clone();
			let frame = next.top_mut()?;
			let v2 = frame.stack.pop()?;
			let v1 = frame.stack.pop()?;

			let push_and_advance = |mut next: AState<D>, value: D| -> Result<Flow<D>> {
				let frame = next.top_mut()?;
				frame.stack.push(value);
				frame.pc = pc.next();
				Ok(Flow::State(next))
			};

			match op {
				BinaryOp::Add => Ok(vec![push_and_advance(next, v1.add(&v2))?]),
				BinaryOp::Sub => Ok(vec![push_and_advance(next, v1.sub(&v2))?]),
				BinaryOp::Mul => Ok(vec![push_and_advance(next, v1.mul(&v2))?]),
				BinaryOp::Div | BinaryOp::Rem => {
					let outcome = if op == BinaryOp::Div { v1.div(&v2) } else { v1.rem(&v2) };
					match outcome {
						DivOutcome::Value(value) => Ok(vec![push_and_advance(next, value)?]),
						DivOutcome::DivideByZero => {
							debug!("definite division by zero at {pc}");
							Ok(vec![Flow::Verdict(Outcome::DivideByZero)])
						},
						DivOutcome::Both(value) => {
							debug!("possible division by zero at {pc}");
							Ok(vec![
								Flow::Verdict(Outcome::DivideByZero),
								push_and_advance(next, value)?,
							])
						},
					}
				},
			}
		},

		Opcode::Binary { .. } => cannot_analyze(&insn, &pc),

		Opcode::Cast { from: Type::Int, to: Type::Short } => {
			let mut next = state.clone();
			let frame = next.top_mut()?;
			let value = frame.stack.pop()?;
			frame.stack.push(value.i2s());
			frame.pc = pc.next();
			Ok(vec![Flow::State(next)])
		},

		Opcode::Cast { .. } => cannot_analyze(&insn, &pc),

		Opcode::Ifz { condition, target } => {
			let Some(relation) = relation_of(condition) else {
				return cannot_analyze(&insn, &pc);
			};

			let mut base = state.clone();
			let frame = base.top_mut()?;
			let value = frame.stack.pop()?;
			let refinement = value.compare(relation, &D::constant(0));
			let provenance = producer_local(bytecode, &pc, 1);

			let mut flows = Vec::new();
			if let Some((refined, _)) = refinement.when_true {
				let mut taken = base.clone();
				let frame = taken.top_mut()?;
				if let Some(index) = provenance {
					frame.locals.insert(index, refined);
				}
				frame.pc = pc.jump(target);
				flows.push(Flow::State(taken));
			}
			if let Some((refined, _)) = refinement.when_false {
				let frame = base.top_mut()?;
				if let Some(index) = provenance {
					frame.locals.insert(index, refined);
				}
				frame.pc = pc.next();
				flows.push(Flow::State(base));
			}
			if flows.is_empty() {
				bail!("no feasible branch outcome at {pc}");
			}
			Ok(flows)
		},

		Opcode::If { condition, target } => {
			let Some(relation) = relation_of(condition) else {
				return cannot_analyze(&insn, &pc);
			};

			let mut base = state.clone();
			let frame = base.top_mut()?;
			let v2 = frame.stack.pop()?;
			let v1 = frame.stack.pop()?;
			let refinement = v1.compare(relation, &v2);
			let left_prov = producer_local(bytecode, &pc, 2);
			let right_prov = producer_local(bytecode, &pc, 1);

			let mut flows = Vec::new();
			if let Some((left, right)) = refinement.when_true {
				let mut taken = base.clone();
				let frame = taken.top_mut()?;
				if let Some(index) = left_prov {
					frame.locals.insert(index, left);
				}
				if let Some(index) = right_prov {
					frame.locals.insert(index, right);
				}
				frame.pc = pc.jump(target);
				flows.push(Flow::State(taken));
			}
			if let Some((left, right)) = refinement.when_false {
				let frame = base.top_mut()?;
				if let Some(index) = left_prov {
					frame.locals.insert(index, left);
				}
				if let Some(index) = right_prov {
					frame.locals.insert(index, right);
				}
				frame.pc = pc.next();
				flows.push(Flow::State(base));
			}
			if flows.is_empty() {
				bail!("no feasible branch outcome at {pc}");
			}
			Ok(flows)
		},

		Opcode::Return { ty } => {
			let mut next = state.clone();
			let mut done = next.frames.pop()
				.ok_or_else(|| anyhow!("return with an empty call stack at {pc}"))?;
			let result = match ty {
				Some(_) => Some(done.stack.pop()?),
				None => None,
			};
			if next.frames.is_empty() {
				return Ok(vec![Flow::Verdict(Outcome::Ok)]);
			}
			if let Some(value) = result {
				next.top_mut()?.stack.push(value);
			}
			Ok(vec![Flow::State(next)])
		},

		Opcode::Get { is_static: true, ref field } if field.member.name == "$assertionsDisabled" => {
			// assertions are always enabled under analysis
			let mut next = state.clone();
			let frame = next.top_mut()?;
			frame.stack.push(D::constant(0));
			frame.pc = pc.next();
			Ok(vec![Flow::State(next)])
		},

		Opcode::Get { .. } => cannot_analyze(&insn, &pc),

		Opcode::New { ref class } if class.as_inner() == "java/lang/AssertionError" => {
			debug!("reachable assertion error at {pc}");
			Ok(vec![Flow::Verdict(Outcome::AssertionError)])
		},

		Opcode::New { .. } => cannot_analyze(&insn, &pc),

		Opcode::Invoke { kind: InvokeKind::Static, ref method, .. } => {
			let mut base = state.clone();
			let frame = base.top_mut()?;
			let mut args = Vec::with_capacity(method.member.params.len());
			for _ in 0..method.member.params.len() {
				args.push(frame.stack.pop()?);
			}
			args.reverse();
			frame.pc = pc.next();

			let mut callee = AFrame::entry(method.clone());
			let mut slot = 0;
			for (param, arg) in method.member.params.iter().zip(args) {
				callee.locals.insert(slot, arg);
				slot += if is_wide(param) { 2 } else { 1 };
			}

			let recursive = state.frames.iter().any(|f| f.pc.method == *method);
			if recursive {
				// re-enter the callee entry so the fixpoint joins the
				// parameters there, and let the caller continue with an
				// unknown result; the per-point join bounds the unrolling
				let first = base.frames.iter().position(|f| f.pc.method == *method)
					.unwrap_or(base.frames.len());
				let mut reenter = base.clone();
				reenter.frames.truncate(first);
				reenter.frames.push(callee);

				let mut cont = base;
				if method.member.returns.is_some() {
					cont.top_mut()?.stack.push(D::top());
				}
				Ok(vec![Flow::State(reenter), Flow::State(cont)])
			} else {
				base.frames.push(callee);
				Ok(vec![Flow::State(base)])
			}
		},

		Opcode::Invoke { .. } => cannot_analyze(&insn, &pc),

		// arrays and exceptions are outside the abstract subset
		Opcode::NewArray { .. }
		| Opcode::ArrayLoad { .. }
		| Opcode::ArrayStore { .. }
		| Opcode::ArrayLength
		| Opcode::Throw => cannot_analyze(&insn, &pc),
	}
}

/// The result of one abstract analysis: the outcomes that could not be
/// ruled out, and the source lines reachable states touched.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
	pub outcomes: BTreeSet<Outcome>,
	pub coverage: Coverage,
}

impl AnalysisResult {
	pub fn possible(&self, outcome: Outcome) -> bool {
		self.outcomes.contains(&outcome)
	}
}

/// The worklist fixpoint driver. Build one per bytecode store, configure
/// the budget and thresholds, then [`run`](AbstractAnalysis::run) it over
/// a root method with the domain of your choice.
pub struct AbstractAnalysis<'a> {
	bytecode: &'a Bytecode,
	pub thresholds: KSet,
	/// Worklist iterations before the analysis is abandoned as `*`.
	pub max_iterations: usize,
	/// Revisits of a program point before joins become widenings.
	pub widen_after: u32,
}

impl<'a> AbstractAnalysis<'a> {
	pub fn new(bytecode: &'a Bytecode) -> AbstractAnalysis<'a> {
		AbstractAnalysis {
			bytecode,
			thresholds: KSet::defaults(),
			max_iterations: 10_000,
			widen_after: 3,
		}
	}

	pub fn with_thresholds(mut self, thresholds: KSet) -> AbstractAnalysis<'a> {
		self.thresholds = thresholds;
		self
	}

	/// Analyzes one root method: every parameter starts at ⊤ and every
	/// path is explored until the per-point states stabilize.
	pub fn run<D: Domain>(&self, method: &AbsMethodId) -> Result<AnalysisResult> {
		let mut entry = AFrame::<D>::entry(method.clone());
		let mut slot = 0;
		for param in &method.member.params {
			entry.locals.insert(slot, D::top());
			slot += if is_wide(param) { 2 } else { 1 };
		}

		let mut states = StateSet::new();
		states.absorb(
			AState { heap: BTreeMap::new(), frames: vec![entry], next_addr: 0 },
			Merge::Join,
		)?;

		let mut outcomes = BTreeSet::new();
		let mut coverage = Coverage::new();
		let mut revisits: IndexMap<Pc, u32> = IndexMap::new();
		let mut iterations = 0usize;

		while let Some(pc) = states.pop_work() {
			iterations += 1;
			if iterations > self.max_iterations {
				warn!("abstract analysis of {method} ran out of budget, attributing non-termination");
				outcomes.insert(Outcome::Diverges);
				break;
			}

			let insn = self.bytecode.insn(&pc)?;
			coverage.record(&pc.method, insn.line);

			let state = states.get(&pc)?.clone();
			for flow in step::<D>(&state, self.bytecode)? {
				match flow {
					Flow::Verdict(outcome) => {
						outcomes.insert(outcome);
					},
					Flow::State(successor) => {
						let target = successor.pc()?.clone();
						let merge = if states.contains(&target) {
							let count = revisits.entry(target.clone()).or_insert(0);
							*count += 1;
							if !D::FINITE_LATTICE && *count > self.widen_after {
								Merge::Widen(&self.thresholds)
							} else {
								Merge::Join
							}
						} else {
							Merge::Join
						};
						states.absorb(successor, merge)?;
					},
				}
			}
		}

		// a stable fixpoint with no outcome at all means no path ever
		// terminates
		if outcomes.is_empty() {
			outcomes.insert(Outcome::Diverges);
		}

		Ok(AnalysisResult { outcomes, coverage })
	}
}

#[cfg(test)]
mod testing {
	use std::collections::BTreeMap;
	use pretty_assertions::assert_eq;
	use anyhow::Result;
	use domains::{Domain, SignSet};
	use jvm_model::AbsMethodId;
	use crate::fixpoint::{AFrame, AState, Merge};
	use crate::stack::Stack;

	fn state_with_stack(depth: usize) -> Result<AState<SignSet>> {
		let method = AbsMethodId::parse("a/B.f:()V")?;
		let mut frame = AFrame::<SignSet>::entry(method);
		for _ in 0..depth {
			frame.stack.push(SignSet::top());
		}
		Ok(AState { heap: BTreeMap::new(), frames: vec![frame], next_addr: 0 })
	}

	#[test]
	fn joining_is_pointwise() -> Result<()> {
		let mut a = state_with_stack(1)?;
		let mut b = state_with_stack(1)?;
		a.frames[0].locals.insert(0, SignSet::constant(1));
		b.frames[0].locals.insert(0, SignSet::constant(-1));
		b.frames[0].locals.insert(1, SignSet::constant(0));

		a.merge_with(&b, Merge::Join)?;
		assert_eq!(a.frames[0].locals.get(&0), Some(&SignSet::abstracted([1, -1])));
		// a local only one side knows is kept as is
		assert_eq!(a.frames[0].locals.get(&1), Some(&SignSet::constant(0)));
		Ok(())
	}

	#[test]
	fn mismatched_stacks_are_fatal() -> Result<()> {
		let mut shallow = state_with_stack(0)?;
		let deep = state_with_stack(2)?;
		assert!(shallow.merge_with(&deep, Merge::Join).is_err());

		let mut one = state_with_stack(1)?;
		let mut other = state_with_stack(1)?;
		other.frames.push(AFrame::<SignSet>::entry(AbsMethodId::parse("a/B.g:()V")?));
		assert!(one.merge_with(&other, Merge::Join).is_err());
		Ok(())
	}
}

use std::collections::BTreeMap;
use anyhow::{anyhow, bail, Result};
use log::debug;
use jvm_model::{
	AbsMethodId, BinaryOp, Bytecode, Condition, InvokeKind, Opcode, Outcome, Pc, Type, Value,
};
use crate::coverage::Coverage;
use crate::stack::Stack;

/// A concrete call frame: local variables, the operand stack, and the
/// program counter of the next instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
	pub locals: BTreeMap<usize, Value>,
	pub stack: Stack<Value>,
	pub pc: Pc,
}

impl Frame {
	pub fn entry(method: AbsMethodId) -> Frame {
		Frame {
			locals: BTreeMap::new(),
			stack: Stack::empty(),
			pc: Pc::entry(method),
		}
	}
}

/// The concrete machine state: the heap, the call stack, and the next
/// free heap address. The top frame's program counter is the current
/// program point.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
	pub heap: BTreeMap<u32, Value>,
	pub frames: Stack<Frame>,
	pub next_addr: u32,
}

impl State {
	/// The initial state of a method run: one frame with the arguments
	/// bound to the parameter slots. Array arguments land on the heap and
	/// the slot holds the reference; `long` and `double` arguments occupy
	/// two slots, as in the verified bytecode.
	pub fn entry(method: AbsMethodId, args: &[Value]) -> State {
		let mut state = State {
			heap: BTreeMap::new(),
			frames: Stack::empty(),
			next_addr: 0,
		};

		let mut frame = Frame::entry(method);
		let mut slot = 0;
		for arg in args {
			let wide = matches!(arg, Value::Long(_) | Value::Double(_));
			let bound = match arg.clone() {
				array @ Value::Array(_, _) => {
					let addr = state.alloc(array);
					Value::Reference(Some(addr))
				},
				other => to_stack(other),
			};
			frame.locals.insert(slot, bound);
			slot += if wide { 2 } else { 1 };
		}
		state.frames.push(frame);
		state
	}

	fn alloc(&mut self, value: Value) -> u32 {
		let addr = self.next_addr;
		self.heap.insert(addr, value);
		self.next_addr += 1;
		addr
	}

	fn top(&mut self) -> Result<&mut Frame> {
		self.frames.iter_mut().last().ok_or_else(|| anyhow!("empty call stack"))
	}
}

/// Widens a heap-form value to the 32 bit stack form the operand stack
/// carries: booleans, bytes, shorts and chars all become ints.
pub fn to_stack(value: Value) -> Value {
	match value {
		Value::Boolean(b) => Value::Int(b as i32),
		Value::Byte(i) => Value::Int(i as i32),
		Value::Short(i) => Value::Int(i as i32),
		Value::Char(c) => Value::Int(c as i32),
		other => other,
	}
}

/// Narrows a stack-form value back to the heap form of the element type,
/// as done on array stores.
pub fn to_heap(ty: &Type, value: Value) -> Result<Value> {
	Ok(match (ty, value) {
		(Type::Boolean, Value::Int(i)) => Value::Boolean(i != 0),
		(Type::Byte, Value::Int(i)) => Value::Byte(i as i8),
		(Type::Short, Value::Int(i)) => Value::Short(i as i16),
		(Type::Char, Value::Int(i)) => {
			let c = char::from_u32(i as u32 & 0xffff)
				.ok_or_else(|| anyhow!("int {i} does not narrow to a char"))?;
			Value::Char(c)
		},
		(_, other) => other,
	})
}

fn as_int(value: &Value) -> Result<i32> {
	match value {
		Value::Int(i) => Ok(*i),
		x => bail!("expected an int on the stack, got {x}"),
	}
}

/// The default (zeroed) heap element of an array of `ty`.
fn default_element(ty: &Type) -> Value {
	match ty {
		Type::Boolean => Value::Boolean(false),
		Type::Byte => Value::Byte(0),
		Type::Short => Value::Short(0),
		Type::Char => Value::Char('\0'),
		Type::Long => Value::Long(0),
		Type::Float => Value::Float(0.0),
		Type::Double => Value::Double(0.0),
		Type::Reference | Type::Array(_) | Type::Object(_) => Value::NULL,
		Type::Int => Value::Int(0),
	}
}

/// Evaluates a comparison on two stack values. Numeric conditions expect
/// numbers; `is`/`isnot` compare references.
fn compare(v1: &Value, condition: Condition, v2: &Value) -> Result<bool> {
	match condition {
		Condition::Is | Condition::IsNot => {
			let (Value::Reference(a), Value::Reference(b)) = (v1, v2) else {
				bail!("reference comparison on non-references: {v1} and {v2}");
			};
			let same = a == b;
			Ok(if condition == Condition::Is { same } else { !same })
		},
		_ => {
			let (a, b) = match (v1, v2) {
				(Value::Int(a), Value::Int(b)) => (*a as i64, *b as i64),
				(Value::Long(a), Value::Long(b)) => (*a, *b),
				_ => bail!("numeric comparison on {v1} and {v2}"),
			};
			Ok(match condition {
				Condition::Eq => a == b,
				Condition::Ne => a != b,
				Condition::Lt => a < b,
				Condition::Le => a <= b,
				Condition::Gt => a > b,
				Condition::Ge => a >= b,
				Condition::Is | Condition::IsNot => unreachable!(),
			})
		},
	}
}

/// `None` is a division by zero.
fn int_binary(op: BinaryOp, a: i32, b: i32) -> Option<Value> {
	match op {
		BinaryOp::Add => Some(Value::Int(a.wrapping_add(b))),
		BinaryOp::Sub => Some(Value::Int(a.wrapping_sub(b))),
		BinaryOp::Mul => Some(Value::Int(a.wrapping_mul(b))),
		BinaryOp::Div if b == 0 => None,
		BinaryOp::Div => Some(Value::Int(a.wrapping_div(b))),
		BinaryOp::Rem if b == 0 => None,
		BinaryOp::Rem => Some(Value::Int(a.wrapping_rem(b))),
	}
}

/// Executes the instruction at the top frame's program counter.
///
/// Returns `Some(outcome)` when the run ends, either because the last
/// frame returned (`ok`) or because one of the queried failures happened.
/// Errors indicate a bug in the interpreter or malformed bytecode, never
/// a property of the analyzed program.
pub fn step(state: &mut State, bytecode: &Bytecode, coverage: &mut Coverage) -> Result<Option<Outcome>> {
	let pc = state.frames.peek()?.pc.clone();
	let insn = bytecode.insn(&pc)?;
	debug!("step {insn} of {}", pc.method);

	coverage.record(&pc.method, insn.line);

	match insn.op {
		Opcode::Push { value } => {
			let pushed = match value {
				array @ Value::Array(_, _) => {
					let addr = state.alloc(array);
					Value::Reference(Some(addr))
				},
				other => to_stack(other),
			};
			let frame = state.top()?;
			frame.stack.push(pushed);
			frame.pc = pc.next();
		},

		Opcode::Load { index, .. } => {
			let frame = state.top()?;
			let value = frame.locals.get(&index)
				.ok_or_else(|| anyhow!("local variable {index} not initialized at {pc}"))?
				.clone();
			frame.stack.push(value);
			frame.pc = pc.next();
		},

		Opcode::Store { index, .. } => {
			let frame = state.top()?;
			let value = frame.stack.pop()?;
			frame.locals.insert(index, value);
			frame.pc = pc.next();
		},

		// one category-2 item is a single slot here, so both forms copy
		// the top item
		Opcode::Dup { .. } => {
			let frame = state.top()?;
			let value = frame.stack.peek()?.clone();
			frame.stack.push(value);
			frame.pc = pc.next();
		},

		Opcode::Binary { ty: Type::Int, op } => {
			let frame = state.top()?;
			let v2 = as_int(&frame.stack.pop()?)?;
			let v1 = as_int(&frame.stack.pop()?)?;
			match int_binary(op, v1, v2) {
				None => return Ok(Some(Outcome::DivideByZero)),
				Some(value) => {
					frame.stack.push(value);
					frame.pc = pc.next();
				},
			}
		},

		Opcode::Binary { ty: Type::Long, op } => {
			let frame = state.top()?;
			let (Value::Long(v2), Value::Long(v1)) = (frame.stack.pop()?, frame.stack.pop()?)
			else {
				bail!("long binary on non-long operands at {pc}");
			};
			let value = match op {
				BinaryOp::Add => Value::Long(v1.wrapping_add(v2)),
				BinaryOp::Sub => Value::Long(v1.wrapping_sub(v2)),
				BinaryOp::Mul => Value::Long(v1.wrapping_mul(v2)),
				BinaryOp::Div if v2 == 0 => return Ok(Some(Outcome::DivideByZero)),
				BinaryOp::Div => Value::Long(v1.wrapping_div(v2)),
				BinaryOp::Rem if v2 == 0 => return Ok(Some(Outcome::DivideByZero)),
				BinaryOp::Rem => Value::Long(v1.wrapping_rem(v2)),
			};
			frame.stack.push(value);
			frame.pc = pc.next();
		},

		Opcode::Binary { ty: ty @ (Type::Float | Type::Double), op } => {
			let frame = state.top()?;
			let pop_float = |v: Value| -> Result<f64> {
				match v {
					Value::Float(x) => Ok(x as f64),
					Value::Double(x) => Ok(x),
					x => bail!("float binary on {x}"),
				}
			};
			let v2 = pop_float(frame.stack.pop()?)?;
			let v1 = pop_float(frame.stack.pop()?)?;
			let result = match op {
				BinaryOp::Add => v1 + v2,
				BinaryOp::Sub => v1 - v2,
				BinaryOp::Mul => v1 * v2,
				BinaryOp::Div => v1 / v2,
				BinaryOp::Rem => v1 % v2,
			};
			frame.stack.push(match ty {
				Type::Float => Value::Float(result as f32),
				_ => Value::Double(result),
			});
			frame.pc = pc.next();
		},

		Opcode::Binary { ty, .. } => bail!("binary arithmetic on {ty} at {pc}"),

		Opcode::Cast { from, to } => {
			let frame = state.top()?;
			let value = frame.stack.pop()?;
			frame.stack.push(cast(&from, &to, value, &pc)?);
			frame.pc = pc.next();
		},

		Opcode::Incr { index, amount } => {
			let frame = state.top()?;
			let value = frame.locals.get(&index)
				.ok_or_else(|| anyhow!("local variable {index} not initialized at {pc}"))?;
			let incremented = Value::Int(as_int(value)?.wrapping_add(amount));
			frame.locals.insert(index, incremented);
			frame.pc = pc.next();
		},

		Opcode::Ifz { condition, target } => {
			let frame = state.top()?;
			let value = frame.stack.pop()?;
			let zero = match value {
				Value::Reference(_) => Value::NULL,
				Value::Long(_) => Value::Long(0),
				_ => Value::Int(0),
			};
			if compare(&value, condition, &zero)? {
				frame.pc = pc.jump(target);
			} else {
				frame.pc = pc.next();
			}
		},

		Opcode::If { condition, target } => {
			let frame = state.top()?;
			let v2 = frame.stack.pop()?;
			let v1 = frame.stack.pop()?;
			if compare(&v1, condition, &v2)? {
				frame.pc = pc.jump(target);
			} else {
				frame.pc = pc.next();
			}
		},

		Opcode::Goto { target } => {
			state.top()?.pc = pc.jump(target);
		},

		Opcode::Return { ty } => {
			let mut done = state.frames.pop()?;
			let result = match ty {
				Some(_) => Some(done.stack.pop()?),
				None => None,
			};
			if state.frames.is_empty() {
				return Ok(Some(Outcome::Ok));
			}
			if let Some(value) = result {
				state.top()?.stack.push(value);
			}
		},

		Opcode::Get { is_static: true, ref field } if field.member.name == "$assertionsDisabled" => {
			// assertions are always enabled under analysis
			let frame = state.top()?;
			frame.stack.push(Value::Int(0));
			frame.pc = pc.next();
		},

		Opcode::Get { ref field, .. } => bail!("unmodeled field read {field} at {pc}"),

		Opcode::New { class } if class.as_inner() == "java/lang/AssertionError" => {
			// the <init> and athrow that follow are elided
			return Ok(Some(Outcome::AssertionError));
		},

		Opcode::New { class } => bail!("unmodeled instantiation of {class} at {pc}"),

		Opcode::NewArray { ty, .. } => {
			let frame = state.top()?;
			let count = as_int(&frame.stack.pop()?)?;
			if count < 0 {
				return Ok(Some(Outcome::NegativeArraySize));
			}
			let items = vec![default_element(&ty); count as usize];
			let addr = state.alloc(Value::Array(ty, items));
			let frame = state.top()?;
			frame.stack.push(Value::Reference(Some(addr)));
			frame.pc = pc.next();
		},

		Opcode::ArrayLength => {
			let frame = state.top()?;
			let addr = match frame.stack.pop()? {
				Value::Reference(None) => return Ok(Some(Outcome::NullPointer)),
				Value::Reference(Some(addr)) => addr,
				x => bail!("arraylength on {x} at {pc}"),
			};
			let Some(Value::Array(_, items)) = state.heap.get(&addr) else {
				bail!("arraylength on a non-array heap cell #{addr} at {pc}");
			};
			let length = Value::Int(items.len() as i32);
			let frame = state.top()?;
			frame.stack.push(length);
			frame.pc = pc.next();
		},

		Opcode::ArrayLoad { .. } => {
			let frame = state.top()?;
			let index = as_int(&frame.stack.pop()?)?;
			let addr = match frame.stack.pop()? {
				Value::Reference(None) => return Ok(Some(Outcome::NullPointer)),
				Value::Reference(Some(addr)) => addr,
				x => bail!("array_load on {x} at {pc}"),
			};
			let Some(Value::Array(_, items)) = state.heap.get(&addr) else {
				bail!("array_load on a non-array heap cell #{addr} at {pc}");
			};
			if index < 0 || index as usize >= items.len() {
				return Ok(Some(Outcome::OutOfBounds));
			}
			let value = to_stack(items[index as usize].clone());
			let frame = state.top()?;
			frame.stack.push(value);
			frame.pc = pc.next();
		},

		Opcode::ArrayStore { .. } => {
			let frame = state.top()?;
			let value = frame.stack.pop()?;
			let index = as_int(&frame.stack.pop()?)?;
			let addr = match frame.stack.pop()? {
				Value::Reference(None) => return Ok(Some(Outcome::NullPointer)),
				Value::Reference(Some(addr)) => addr,
				x => bail!("array_store on {x} at {pc}"),
			};
			let Some(Value::Array(elem, items)) = state.heap.get(&addr) else {
				bail!("array_store on a non-array heap cell #{addr} at {pc}");
			};
			if index < 0 || index as usize >= items.len() {
				return Ok(Some(Outcome::OutOfBounds));
			}
			let elem = elem.clone();
			let mut items = items.clone();
			items[index as usize] = to_heap(&elem, value)?;
			state.heap.insert(addr, Value::Array(elem, items));
			state.top()?.pc = pc.next();
		},

		Opcode::Invoke { kind: InvokeKind::Static, method, .. } => {
			let frame = state.top()?;
			let mut args = Vec::with_capacity(method.member.params.len());
			for _ in 0..method.member.params.len() {
				args.push(frame.stack.pop()?);
			}
			args.reverse();
			frame.pc = pc.next();

			let mut callee = Frame::entry(method.clone());
			let mut slot = 0;
			for (param, arg) in method.member.params.iter().zip(args) {
				callee.locals.insert(slot, arg);
				slot += if matches!(param, Type::Long | Type::Double) { 2 } else { 1 };
			}
			state.frames.push(callee);
		},

		Opcode::Invoke { kind, ref method, .. } => {
			bail!("unmodeled {kind:?} call of {method} at {pc}");
		},

		// no exception tables are modeled, so a throw never terminates
		// normally
		Opcode::Throw => return Ok(Some(Outcome::Diverges)),
	}

	Ok(None)
}

fn cast(from: &Type, to: &Type, value: Value, pc: &Pc) -> Result<Value> {
	Ok(match (from, to, value) {
		(Type::Int, Type::Byte, Value::Int(v)) => Value::Int((v as i8) as i32),
		(Type::Int, Type::Short, Value::Int(v)) => Value::Int((v as i16) as i32),
		(Type::Int, Type::Char, Value::Int(v)) => Value::Int((v as u16) as i32),
		(Type::Int, Type::Long, Value::Int(v)) => Value::Long(v as i64),
		(Type::Int, Type::Float, Value::Int(v)) => Value::Float(v as f32),
		(Type::Int, Type::Double, Value::Int(v)) => Value::Double(v as f64),
		(Type::Long, Type::Int, Value::Long(v)) => Value::Int(v as i32),
		(Type::Float, Type::Int, Value::Float(v)) => Value::Int(v as i32),
		(Type::Float, Type::Double, Value::Float(v)) => Value::Double(v as f64),
		(Type::Double, Type::Int, Value::Double(v)) => Value::Int(v as i32),
		(Type::Double, Type::Float, Value::Double(v)) => Value::Float(v as f32),
		(from, to, value) => bail!("unmodeled cast {from} -> {to} of {value} at {pc}"),
	})
}

/// Runs a method to completion within a step budget; a budget overrun is
/// reported as non-termination.
pub fn run(
	bytecode: &Bytecode,
	method: &AbsMethodId,
	args: &[Value],
	max_steps: usize,
	coverage: &mut Coverage,
) -> Result<Outcome> {
	let mut state = State::entry(method.clone(), args);
	for _ in 0..max_steps {
		if let Some(outcome) = step(&mut state, bytecode, coverage)? {
			return Ok(outcome);
		}
	}
	Ok(Outcome::Diverges)
}

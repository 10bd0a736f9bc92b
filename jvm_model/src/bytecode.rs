use std::cell::RefCell;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use log::debug;
use crate::descriptor::Type;
use crate::method::AbsMethodId;
use crate::opcode::Insn;
use crate::suite::Suite;

/// A program counter: an absolute method id plus an offset into that
/// method's instruction sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pc {
	pub method: AbsMethodId,
	pub offset: usize,
}

impl Pc {
	pub fn entry(method: AbsMethodId) -> Pc {
		Pc { method, offset: 0 }
	}

	/// The program counter of the following instruction.
	pub fn next(&self) -> Pc {
		Pc { method: self.method.clone(), offset: self.offset + 1 }
	}

	/// The program counter of a jump target within the same method.
	pub fn jump(&self, target: usize) -> Pc {
		Pc { method: self.method.clone(), offset: target }
	}
}

impl Display for Pc {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}", self.method, self.offset)
	}
}

/// The bytecode store: hands out a method's instruction sequence, loading
/// and decoding the decompiled json at most once per method.
///
/// The store owns the decoded instructions; interpreter states refer into
/// them only through [`Pc`]s.
pub struct Bytecode {
	suite: Option<Suite>,
	methods: RefCell<IndexMap<AbsMethodId, Rc<Vec<Insn>>>>,
}

impl Bytecode {
	pub fn new(suite: Suite) -> Bytecode {
		Bytecode {
			suite: Some(suite),
			methods: RefCell::new(IndexMap::new()),
		}
	}

	/// A store over an in-memory method table, with no backing files.
	pub fn preloaded(methods: impl IntoIterator<Item = (AbsMethodId, Vec<Insn>)>) -> Bytecode {
		Bytecode {
			suite: None,
			methods: RefCell::new(
				methods.into_iter().map(|(id, insns)| (id, Rc::new(insns))).collect(),
			),
		}
	}

	/// The instruction sequence of a method.
	pub fn method(&self, id: &AbsMethodId) -> Result<Rc<Vec<Insn>>> {
		if let Some(insns) = self.methods.borrow().get(id) {
			return Ok(Rc::clone(insns));
		}

		let suite = self.suite.as_ref()
			.ok_or_else(|| anyhow!("unknown method {id}"))?;
		let insns = Rc::new(load_method(suite, id)?);
		self.methods.borrow_mut().insert(id.clone(), Rc::clone(&insns));
		Ok(insns)
	}

	/// The instruction at a program counter. An out of range offset is a
	/// bug in the interpreter, not a property of the analyzed program.
	pub fn insn(&self, pc: &Pc) -> Result<Insn> {
		let insns = self.method(&pc.method)?;
		insns.get(pc.offset)
			.cloned()
			.ok_or_else(|| anyhow!("program counter {pc} is out of range (method has {} instructions)", insns.len()))
	}
}

/// Reads the method's instructions out of the per-class decompiled json.
fn load_method(suite: &Suite, id: &AbsMethodId) -> Result<Vec<Insn>> {
	let path = suite.decompiledfile(&id.class);
	debug!("loading bytecode of {id} from {path:?}");

	let content = std::fs::read_to_string(&path)
		.with_context(|| anyhow!("failed to read decompiled class {path:?}"))?;
	let json: serde_json::Value = serde_json::from_str(&content)
		.with_context(|| anyhow!("failed to parse decompiled class {path:?}"))?;

	let methods = json.get("methods")
		.and_then(|m| m.as_array())
		.ok_or_else(|| anyhow!("decompiled class {path:?} has no methods list"))?;

	let entry = find_method_entry(methods, id)
		.ok_or_else(|| anyhow!("method {id} not found in {path:?}"))?;

	let bytecode = entry.get("code")
		.and_then(|c| c.get("bytecode"))
		.and_then(|b| b.as_array())
		.ok_or_else(|| anyhow!("method {id} in {path:?} has no bytecode"))?;

	let mut insns = bytecode.iter()
		.map(Insn::from_json)
		.collect::<Result<Vec<Insn>>>()
		.with_context(|| anyhow!("failed to decode bytecode of {id}"))?;

	if let Some(lines) = entry.get("code").and_then(|c| c.get("lines")).and_then(|l| l.as_array()) {
		apply_line_table(&mut insns, lines);
	}

	Ok(insns)
}

/// Picks the method entry matching the id: by name, then by parameter
/// types when they decode, falling back to the parameter count.
fn find_method_entry<'a>(
	methods: &'a [serde_json::Value],
	id: &AbsMethodId,
) -> Option<&'a serde_json::Value> {
	let candidates: Vec<&serde_json::Value> = methods.iter()
		.filter(|m| m.get("name").and_then(|n| n.as_str()) == Some(&id.member.name))
		.filter(|m| {
			match m.get("params").and_then(|p| p.as_array()) {
				Some(params) => params.len() == id.member.params.len(),
				None => id.member.params.is_empty(),
			}
		})
		.collect();

	candidates.iter()
		.find(|m| {
			let Some(params) = m.get("params").and_then(|p| p.as_array()) else {
				return id.member.params.is_empty();
			};
			params.iter().zip(&id.member.params).all(|(json, expected)| {
				Type::from_json(json)
					.or_else(|_| {
						json.get("type")
							.ok_or_else(|| anyhow!("no inner type"))
							.and_then(Type::from_json)
					})
					.is_ok_and(|t| t == *expected)
			})
		})
		.copied()
		.or_else(|| candidates.first().copied())
}

/// Attaches source lines from the code attribute's line table: each
/// instruction gets the last table entry at or before its offset.
fn apply_line_table(insns: &mut [Insn], lines: &[serde_json::Value]) {
	let mut table: Vec<(usize, u32)> = lines.iter()
		.filter_map(|entry| {
			let offset = entry.get("offset")?.as_u64()? as usize;
			let line = entry.get("line")?.as_u64()? as u32;
			Some((offset, line))
		})
		.collect();
	table.sort_unstable();

	for insn in insns {
		if insn.line.is_none() {
			insn.line = table.iter()
				.take_while(|(offset, _)| *offset <= insn.offset)
				.last()
				.map(|(_, line)| *line);
		}
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use anyhow::Result;
	use crate::bytecode::{Bytecode, Pc};
	use crate::method::AbsMethodId;
	use crate::opcode::{Insn, Opcode};
	use crate::value::Value;

	fn push(offset: usize, value: i32) -> Insn {
		Insn { offset, line: None, op: Opcode::Push { value: Value::Int(value) } }
	}

	#[test]
	fn preloaded_lookup() -> Result<()> {
		let id = AbsMethodId::parse("a/B.f:()I")?;
		let bc = Bytecode::preloaded([(id.clone(), vec![push(0, 1), push(1, 2)])]);

		let insns = bc.method(&id)?;
		assert_eq!(insns.len(), 2);

		let insn = bc.insn(&Pc { method: id.clone(), offset: 1 })?;
		assert_eq!(insn.op, Opcode::Push { value: Value::Int(2) });

		assert!(bc.insn(&Pc { method: id.clone(), offset: 2 }).is_err());
		assert!(bc.method(&AbsMethodId::parse("a/B.g:()I")?).is_err());
		Ok(())
	}

	#[test]
	fn pc_movement() -> Result<()> {
		let id = AbsMethodId::parse("a/B.f:()I")?;
		let pc = Pc::entry(id);
		assert_eq!(pc.offset, 0);
		assert_eq!(pc.next().offset, 1);
		assert_eq!(pc.jump(14).offset, 14);
		Ok(())
	}
}

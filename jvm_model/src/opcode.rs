use std::fmt::{Display, Formatter};
use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value as Json;
use crate::class::{Absolute, ClassName};
use crate::descriptor::Type;
use crate::field::{AbsFieldId, FieldId};
use crate::method::AbsMethodId;
use crate::value::Value;

/// The operator of a `binary` instruction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BinaryOp {
	Add,
	Sub,
	Mul,
	Div,
	Rem,
}

impl BinaryOp {
	pub fn parse(input: &str) -> Result<BinaryOp> {
		Ok(match input {
			"add" => BinaryOp::Add,
			"sub" => BinaryOp::Sub,
			"mul" => BinaryOp::Mul,
			"div" => BinaryOp::Div,
			"rem" => BinaryOp::Rem,
			x => bail!("unknown binary operator {x:?}"),
		})
	}
}

impl Display for BinaryOp {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			BinaryOp::Add => "add",
			BinaryOp::Sub => "sub",
			BinaryOp::Mul => "mul",
			BinaryOp::Div => "div",
			BinaryOp::Rem => "rem",
		};
		write!(f, "{s}")
	}
}

/// The comparison of an `if` or `ifz` instruction. `Is` and `IsNot` are the
/// reference comparisons against another reference (or null for `ifz`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Condition {
	Eq,
	Ne,
	Lt,
	Le,
	Gt,
	Ge,
	Is,
	IsNot,
}

impl Condition {
	pub fn parse(input: &str) -> Result<Condition> {
		Ok(match input {
			"eq" => Condition::Eq,
			"ne" => Condition::Ne,
			"lt" => Condition::Lt,
			"le" => Condition::Le,
			"gt" => Condition::Gt,
			"ge" => Condition::Ge,
			"is" => Condition::Is,
			"isnot" => Condition::IsNot,
			x => bail!("unknown comparison condition {x:?}"),
		})
	}
}

impl Display for Condition {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			Condition::Eq => "eq",
			Condition::Ne => "ne",
			Condition::Lt => "lt",
			Condition::Le => "le",
			Condition::Gt => "gt",
			Condition::Ge => "ge",
			Condition::Is => "is",
			Condition::IsNot => "isnot",
		};
		write!(f, "{s}")
	}
}

/// The dispatch kind of an `invoke` instruction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum InvokeKind {
	Virtual,
	Static,
	Interface,
	Special,
}

/// A decoded instruction, together with its offset in the method's
/// instruction sequence and, when the decompiler provides one, the source
/// line it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Insn {
	pub offset: usize,
	pub line: Option<u32>,
	pub op: Opcode,
}

/// An instruction of the decompiled bytecode.
///
/// Jump targets are offsets into the same method's instruction sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Opcode {
	/// Push a constant on the operand stack.
	Push { value: Value },
	/// Load a local variable.
	Load { ty: Type, index: usize },
	/// Store the top of the stack into a local variable.
	Store { ty: Type, index: usize },
	/// Duplicate the top `words` of the stack.
	Dup { words: usize },
	/// Apply a binary arithmetic operator to the top two values.
	Binary { ty: Type, op: BinaryOp },
	/// Convert the top of the stack between numeric types.
	Cast { from: Type, to: Type },
	/// Add a constant to a local variable in place.
	Incr { index: usize, amount: i32 },
	/// Compare the top of the stack against zero (or null) and jump.
	Ifz { condition: Condition, target: usize },
	/// Compare the top two values and jump.
	If { condition: Condition, target: usize },
	/// Unconditional jump.
	Goto { target: usize },
	/// Return, with a value of the given type unless void.
	Return { ty: Option<Type> },
	/// Allocate an uninitialized instance.
	New { class: ClassName },
	/// Allocate an array, popping the length from the stack.
	NewArray { ty: Type, dim: usize },
	/// Store into an array: pops value, index, array reference.
	ArrayStore { ty: Type },
	/// Load from an array: pops index, array reference.
	ArrayLoad { ty: Type },
	/// Pop an array reference, push its length.
	ArrayLength,
	/// Throw the top of the stack.
	Throw,
	/// Read a static or instance field.
	Get { is_static: bool, field: AbsFieldId },
	/// Call a method.
	Invoke { kind: InvokeKind, method: AbsMethodId, stack_size: Option<usize> },
}

fn str_field<'a>(obj: &'a serde_json::Map<String, Json>, name: &str) -> Result<&'a str> {
	obj.get(name)
		.and_then(|v| v.as_str())
		.ok_or_else(|| anyhow!("missing or non-string field {name:?}"))
}

fn usize_field(obj: &serde_json::Map<String, Json>, name: &str) -> Result<usize> {
	obj.get(name)
		.and_then(|v| v.as_u64())
		.map(|v| v as usize)
		.ok_or_else(|| anyhow!("missing or non-integer field {name:?}"))
}

fn type_field(obj: &serde_json::Map<String, Json>, name: &str) -> Result<Type> {
	let json = obj.get(name)
		.ok_or_else(|| anyhow!("missing field {name:?}"))?;
	Type::from_json(json)
}

impl Insn {
	/// Decodes one instruction from the decompiler's JSON encoding.
	///
	/// The object is tagged by its `opr` field; unknown tags are an input
	/// error, unknown extra fields are tolerated.
	pub fn from_json(json: &Json) -> Result<Insn> {
		let obj = json.as_object()
			.ok_or_else(|| anyhow!("instruction is not an object: {json}"))?;

		let opr = str_field(obj, "opr")
			.with_context(|| anyhow!("instruction without an \"opr\" tag: {json}"))?;
		let offset = usize_field(obj, "offset")
			.with_context(|| anyhow!("instruction without an offset: {json}"))?;
		let line = obj.get("line").and_then(|v| v.as_u64()).map(|v| v as u32);

		let op = (|| -> Result<Opcode> {
			Ok(match opr {
				"push" => Opcode::Push {
					value: Value::from_json(obj.get("value")
						.ok_or_else(|| anyhow!("push without a value"))?)?,
				},
				"load" => Opcode::Load {
					ty: type_field(obj, "type")?,
					index: usize_field(obj, "index")?,
				},
				"store" => Opcode::Store {
					ty: type_field(obj, "type")?,
					index: usize_field(obj, "index")?,
				},
				"dup" => Opcode::Dup {
					words: usize_field(obj, "words").unwrap_or(1),
				},
				"binary" => Opcode::Binary {
					ty: type_field(obj, "type")?,
					op: BinaryOp::parse(str_field(obj, "operant")?)?,
				},
				"cast" => Opcode::Cast {
					from: type_field(obj, "from")?,
					to: type_field(obj, "to")?,
				},
				"incr" => Opcode::Incr {
					index: usize_field(obj, "index")?,
					amount: obj.get("amount")
						.and_then(|v| v.as_i64())
						.ok_or_else(|| anyhow!("incr without an amount"))? as i32,
				},
				"ifz" => Opcode::Ifz {
					condition: Condition::parse(str_field(obj, "condition")?)?,
					target: usize_field(obj, "target")?,
				},
				"if" => Opcode::If {
					condition: Condition::parse(str_field(obj, "condition")?)?,
					target: usize_field(obj, "target")?,
				},
				"goto" => Opcode::Goto {
					target: usize_field(obj, "target")?,
				},
				"return" => Opcode::Return {
					ty: match obj.get("type") {
						None | Some(Json::Null) => None,
						Some(t) => Some(Type::from_json(t)?),
					},
				},
				"new" => Opcode::New {
					class: ClassName::from(str_field(obj, "class")?),
				},
				"newarray" => Opcode::NewArray {
					ty: type_field(obj, "type")?,
					dim: usize_field(obj, "dim").unwrap_or(1),
				},
				"array_store" => Opcode::ArrayStore {
					ty: type_field(obj, "type")?,
				},
				"array_load" => Opcode::ArrayLoad {
					ty: type_field(obj, "type")?,
				},
				"arraylength" => Opcode::ArrayLength,
				"throw" => Opcode::Throw,
				"get" => {
					let field = obj.get("field")
						.and_then(|f| f.as_object())
						.ok_or_else(|| anyhow!("get without a field reference"))?;
					Opcode::Get {
						is_static: obj.get("static").and_then(|v| v.as_bool()).unwrap_or(false),
						field: Absolute::new(
							ClassName::from(str_field(field, "class")?),
							FieldId::new(str_field(field, "name")?, type_field(field, "type")?),
						),
					}
				},
				"invoke" => {
					let kind = match str_field(obj, "access")? {
						"virtual" => InvokeKind::Virtual,
						"static" => InvokeKind::Static,
						"interface" => InvokeKind::Interface,
						"special" => InvokeKind::Special,
						x => bail!("unknown invoke access {x:?}"),
					};
					Opcode::Invoke {
						kind,
						method: AbsMethodId::from_json(obj.get("method")
							.ok_or_else(|| anyhow!("invoke without a method reference"))?)?,
						stack_size: obj.get("stack_size").and_then(|v| v.as_u64()).map(|v| v as usize),
					}
				},
				x => bail!("unknown opcode tag {x:?}"),
			})
		})().with_context(|| anyhow!("failed to decode instruction {json}"))?;

		Ok(Insn { offset, line, op })
	}
}

impl Display for Opcode {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Opcode::Push { value } => write!(f, "push:{} {value}", value.ty()),
			Opcode::Load { ty, index } => write!(f, "load:{ty} {index}"),
			Opcode::Store { ty, index } => write!(f, "store:{ty} {index}"),
			Opcode::Dup { words } => write!(f, "dup {words}"),
			Opcode::Binary { ty, op } => write!(f, "binary:{ty} {op}"),
			Opcode::Cast { from, to } => write!(f, "cast {from} {to}"),
			Opcode::Incr { index, amount } => write!(f, "incr {index} by {amount}"),
			Opcode::Ifz { condition, target } => write!(f, "ifz {condition} {target}"),
			Opcode::If { condition, target } => write!(f, "if {condition} {target}"),
			Opcode::Goto { target } => write!(f, "goto {target}"),
			Opcode::Return { ty: Some(ty) } => write!(f, "return:{ty}"),
			Opcode::Return { ty: None } => write!(f, "return:V"),
			Opcode::New { class } => write!(f, "new {class}"),
			Opcode::NewArray { ty, dim } => write!(f, "newarray[{dim}D] {ty}"),
			Opcode::ArrayStore { ty } => write!(f, "array_store:{ty}"),
			Opcode::ArrayLoad { ty } => write!(f, "array_load:{ty}"),
			Opcode::ArrayLength => write!(f, "arraylength"),
			Opcode::Throw => write!(f, "throw"),
			Opcode::Get { is_static, field } => {
				let kind = if *is_static { "static" } else { "field" };
				write!(f, "get {kind} {field}")
			},
			Opcode::Invoke { kind, method, .. } => {
				let kind = match kind {
					InvokeKind::Virtual => "virtual",
					InvokeKind::Static => "static",
					InvokeKind::Interface => "interface",
					InvokeKind::Special => "special",
				};
				write!(f, "invoke {kind} {method}")
			},
		}
	}
}

impl Display for Insn {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}: {}", self.offset, self.op)
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use anyhow::Result;
	use crate::descriptor::Type;
	use crate::opcode::{BinaryOp, Condition, Insn, InvokeKind, Opcode};
	use crate::value::Value;

	#[test]
	fn decode_push() -> Result<()> {
		let insn = Insn::from_json(&serde_json::json!({
			"opr": "push", "offset": 0, "value": {"type": "integer", "value": 5},
		}))?;
		assert_eq!(insn.offset, 0);
		assert_eq!(insn.op, Opcode::Push { value: Value::Int(5) });
		Ok(())
	}

	#[test]
	fn decode_binary() -> Result<()> {
		let insn = Insn::from_json(&serde_json::json!({
			"opr": "binary", "offset": 3, "type": "int", "operant": "div",
		}))?;
		assert_eq!(insn.op, Opcode::Binary { ty: Type::Int, op: BinaryOp::Div });
		Ok(())
	}

	#[test]
	fn decode_if() -> Result<()> {
		let insn = Insn::from_json(&serde_json::json!({
			"opr": "if", "offset": 7, "condition": "lt", "target": 14,
		}))?;
		assert_eq!(insn.op, Opcode::If { condition: Condition::Lt, target: 14 });
		Ok(())
	}

	#[test]
	fn decode_invoke() -> Result<()> {
		let insn = Insn::from_json(&serde_json::json!({
			"opr": "invoke", "offset": 2, "access": "static",
			"method": {
				"ref": {"kind": "class", "name": "jpamb/cases/Calls"},
				"name": "fib", "args": ["int"], "returns": "int",
			},
		}))?;
		assert_eq!(insn.op, Opcode::Invoke {
			kind: InvokeKind::Static,
			method: crate::method::AbsMethodId::parse("jpamb/cases/Calls.fib:(I)I")?,
			stack_size: None,
		});
		Ok(())
	}

	#[test]
	fn decode_get() -> Result<()> {
		let insn = Insn::from_json(&serde_json::json!({
			"opr": "get", "offset": 0, "static": true,
			"field": {"class": "jpamb/cases/Simple", "name": "$assertionsDisabled", "type": "boolean"},
		}))?;
		match insn.op {
			Opcode::Get { is_static, field } => {
				assert!(is_static);
				assert_eq!(field.member.name, "$assertionsDisabled");
				assert_eq!(field.member.ty, Type::Boolean);
			},
			x => panic!("decoded to {x:?}"),
		}
		Ok(())
	}

	#[test]
	fn unknown_fields_are_tolerated() -> Result<()> {
		let insn = Insn::from_json(&serde_json::json!({
			"opr": "goto", "offset": 9, "target": 2, "comment": "back edge",
		}))?;
		assert_eq!(insn.op, Opcode::Goto { target: 2 });
		Ok(())
	}

	#[test]
	fn unknown_tags_are_rejected() {
		assert!(Insn::from_json(&serde_json::json!({"opr": "frobnicate", "offset": 0})).is_err());
		assert!(Insn::from_json(&serde_json::json!({"offset": 0})).is_err());
		assert!(Insn::from_json(&serde_json::json!(17)).is_err());
	}
}

use std::fmt::{Display, Formatter};
use anyhow::{anyhow, bail, Result};
use crate::class::ClassName;
use crate::descriptor::Type;

/// A concrete JVM value.
///
/// The integer family is stored at declared width; the interpreter widens
/// to 32 bit *stack form* when a value is pushed and narrows back to
/// *heap form* on array stores (see the interpreter crate).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Boolean(bool),
	Byte(i8),
	Short(i16),
	Char(char),
	Int(i32),
	Long(i64),
	Float(f32),
	Double(f64),
	/// A heap address, or `None` for `null`.
	Reference(Option<u32>),
	/// A heap-form array of the element type.
	Array(Type, Vec<Value>),
	/// A string constant, as loaded by `ldc`.
	Str(String),
}

impl Value {
	pub const NULL: Value = Value::Reference(None);

	pub fn ty(&self) -> Type {
		match self {
			Value::Boolean(_) => Type::Boolean,
			Value::Byte(_) => Type::Byte,
			Value::Short(_) => Type::Short,
			Value::Char(_) => Type::Char,
			Value::Int(_) => Type::Int,
			Value::Long(_) => Type::Long,
			Value::Float(_) => Type::Float,
			Value::Double(_) => Type::Double,
			Value::Reference(_) => Type::Reference,
			Value::Array(t, _) => Type::Array(Box::new(t.clone())),
			Value::Str(_) => Type::Object(ClassName::from("java/lang/String")),
		}
	}

	/// Decodes a constant from the decompiler's JSON encoding, as found in
	/// `push` opcodes: either `null` or `{"type": ..., "value": ...}`.
	pub fn from_json(json: &serde_json::Value) -> Result<Value> {
		if json.is_null() {
			return Ok(Value::NULL);
		}

		let obj = json.as_object()
			.ok_or_else(|| anyhow!("cannot decode a value from {json}"))?;

		let ty = obj.get("type")
			.and_then(|t| t.as_str())
			.ok_or_else(|| anyhow!("constant without a type tag: {json}"))?;
		let payload = obj.get("value")
			.ok_or_else(|| anyhow!("constant without a payload: {json}"))?;

		match ty {
			"boolean" => {
				let b = payload.as_bool()
					.ok_or_else(|| anyhow!("boolean constant with non-boolean payload: {json}"))?;
				Ok(Value::Boolean(b))
			},
			"int" | "integer" => {
				let i = payload.as_i64()
					.ok_or_else(|| anyhow!("integer constant with non-integer payload: {json}"))?;
				Ok(Value::Int(i as i32))
			},
			"long" => {
				let i = payload.as_i64()
					.ok_or_else(|| anyhow!("long constant with non-integer payload: {json}"))?;
				Ok(Value::Long(i))
			},
			"float" => {
				let x = payload.as_f64()
					.ok_or_else(|| anyhow!("float constant with non-numeric payload: {json}"))?;
				Ok(Value::Float(x as f32))
			},
			"double" => {
				let x = payload.as_f64()
					.ok_or_else(|| anyhow!("double constant with non-numeric payload: {json}"))?;
				Ok(Value::Double(x))
			},
			"string" => {
				let s = payload.as_str()
					.ok_or_else(|| anyhow!("string constant with non-string payload: {json}"))?;
				Ok(Value::Str(s.to_owned()))
			},
			x => bail!("unknown constant type {x:?}"),
		}
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Value::Boolean(b) => write!(f, "{b}"),
			Value::Byte(i) => write!(f, "{i}"),
			Value::Short(i) => write!(f, "{i}"),
			Value::Char(c) => write!(f, "'{c}'"),
			Value::Int(i) => write!(f, "{i}"),
			Value::Long(i) => write!(f, "{i}"),
			Value::Float(x) => write!(f, "{x}"),
			Value::Double(x) => write!(f, "{x}"),
			Value::Reference(None) => write!(f, "null"),
			Value::Reference(Some(addr)) => write!(f, "ref#{addr}"),
			Value::Array(t, items) => {
				let tag = match t {
					Type::Char => "C",
					_ => "I",
				};
				write!(f, "[{tag}:")?;
				for (i, item) in items.iter().enumerate() {
					if i > 0 {
						write!(f, ", ")?;
					}
					write!(f, "{item}")?;
				}
				write!(f, "]")
			},
			Value::Str(s) => write!(f, "{s:?}"),
		}
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use anyhow::Result;
	use crate::descriptor::Type;
	use crate::value::Value;

	#[test]
	fn from_json() -> Result<()> {
		assert_eq!(
			Value::from_json(&serde_json::json!({"type": "integer", "value": 5}))?,
			Value::Int(5),
		);
		assert_eq!(
			Value::from_json(&serde_json::json!({"type": "boolean", "value": true}))?,
			Value::Boolean(true),
		);
		assert_eq!(Value::from_json(&serde_json::json!(null))?, Value::NULL);
		assert!(Value::from_json(&serde_json::json!({"type": "quux", "value": 0})).is_err());
		Ok(())
	}

	#[test]
	fn display() {
		assert_eq!(Value::Int(-3).to_string(), "-3");
		assert_eq!(Value::Char('a').to_string(), "'a'");
		assert_eq!(Value::NULL.to_string(), "null");
		assert_eq!(
			Value::Array(Type::Int, vec![Value::Int(1), Value::Int(2)]).to_string(),
			"[I:1, 2]",
		);
		assert_eq!(
			Value::Array(Type::Char, vec![Value::Char('h'), Value::Char('i')]).to_string(),
			"[C:'h', 'i']",
		);
	}
}

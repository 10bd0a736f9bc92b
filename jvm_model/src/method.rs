use std::fmt::{Display, Formatter};
use anyhow::{anyhow, bail, Context, Result};
use crate::class::{Absolute, ClassName};
use crate::descriptor::Type;

/// A method identifier: a name, the parameter types, and the return type
/// (`None` for `void`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId {
	pub name: String,
	pub params: Vec<Type>,
	pub returns: Option<Type>,
}

impl MethodId {
	/// Parses the `name:(argTypes)returnType` form, with types in JVM
	/// descriptor syntax.
	pub fn parse(input: &str) -> Result<MethodId> {
		let (name, rest) = input.split_once(':')
			.ok_or_else(|| anyhow!("method id {input:?} has no `:` separator"))?;

		if name.is_empty() {
			bail!("method id {input:?} has an empty name");
		}

		let mut chars = rest.chars().peekable();
		if chars.next_if_eq(&'(').is_none() {
			bail!("method descriptor of {input:?} doesn't start with '('");
		}

		let mut params = Vec::new();
		loop {
			if chars.next_if_eq(&')').is_some() {
				break;
			}

			let t = Type::read(&mut chars)
				.with_context(|| anyhow!("failed to read parameter descriptor of {input:?}"))?;
			params.push(t);
		}

		let returns = if chars.next_if_eq(&'V').is_some() {
			None
		} else {
			let t = Type::read(&mut chars)
				.with_context(|| anyhow!("failed to read return descriptor of {input:?}"))?;
			Some(t)
		};

		if chars.peek().is_some() {
			bail!("expected end of method id {input:?}, got {} remaining", String::from_iter(chars));
		}

		Ok(MethodId { name: name.to_owned(), params, returns })
	}

	/// Writes the `name:(argTypes)returnType` form.
	pub fn write(&self) -> String {
		let mut s = String::new();
		s.push_str(&self.name);
		s.push_str(":(");
		for param in &self.params {
			s.push_str(&param.write());
		}
		s.push(')');
		if let Some(returns) = &self.returns {
			s.push_str(&returns.write());
		} else {
			s.push('V');
		}
		s
	}
}

impl Display for MethodId {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.write())
	}
}

pub type AbsMethodId = Absolute<MethodId>;

impl AbsMethodId {
	/// Parses the `pkg/Cls.name:(argTypes)returnType` form. The class part
	/// runs up to the last `.` before the descriptor.
	pub fn parse(input: &str) -> Result<AbsMethodId> {
		let colon = input.find(':')
			.ok_or_else(|| anyhow!("absolute method id {input:?} has no descriptor"))?;
		let dot = input[..colon].rfind('.')
			.ok_or_else(|| anyhow!("absolute method id {input:?} has no `.` between class and method"))?;

		let class = &input[..dot];
		if class.is_empty() {
			bail!("absolute method id {input:?} has an empty class name");
		}

		let member = MethodId::parse(&input[dot + 1..])?;

		Ok(Absolute::new(ClassName::from(class), member))
	}

	/// Decodes a method reference from the decompiler's JSON encoding:
	/// an object with a `ref` (the owning class), a `name`, an `args` list
	/// and an optional `returns` type.
	pub fn from_json(json: &serde_json::Value) -> Result<AbsMethodId> {
		if let Some(s) = json.as_str() {
			return AbsMethodId::parse(s);
		}

		let obj = json.as_object()
			.ok_or_else(|| anyhow!("cannot decode a method reference from {json}"))?;

		let class = match obj.get("ref") {
			Some(serde_json::Value::String(name)) => ClassName::from(name.as_str()),
			Some(r) => {
				let name = r.get("name")
					.and_then(|n| n.as_str())
					.ok_or_else(|| anyhow!("method reference owner without a name: {json}"))?;
				ClassName::from(name)
			},
			None => bail!("method reference without an owner: {json}"),
		};

		let name = obj.get("name")
			.and_then(|n| n.as_str())
			.ok_or_else(|| anyhow!("method reference without a name: {json}"))?;

		let mut params = Vec::new();
		if let Some(args) = obj.get("args") {
			let args = args.as_array()
				.ok_or_else(|| anyhow!("method reference args is not a list: {json}"))?;
			for arg in args {
				params.push(Type::from_json(arg)
					.with_context(|| anyhow!("failed to decode argument type of {json}"))?);
			}
		}

		let returns = match obj.get("returns") {
			None | Some(serde_json::Value::Null) => None,
			Some(serde_json::Value::String(s)) if s == "V" => None,
			Some(r) => Some(Type::from_json(r)
				.with_context(|| anyhow!("failed to decode return type of {json}"))?),
		};

		Ok(Absolute::new(class, MethodId {
			name: name.to_owned(),
			params,
			returns,
		}))
	}

	pub fn write(&self) -> String {
		format!("{}.{}", self.class, self.member.write())
	}
}

impl Display for AbsMethodId {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.write())
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use anyhow::Result;
	use crate::descriptor::Type;
	use crate::method::{AbsMethodId, MethodId};

	#[test]
	fn parse() -> Result<()> {
		assert_eq!(
			MethodId::parse("divide:(II)I")?,
			MethodId {
				name: "divide".to_owned(),
				params: vec![Type::Int, Type::Int],
				returns: Some(Type::Int),
			},
		);
		assert_eq!(
			MethodId::parse("main:([Ljava/lang/String;)V")?,
			MethodId {
				name: "main".to_owned(),
				params: vec![Type::Array(Box::new(Type::Object("java/lang/String".into())))],
				returns: None,
			},
		);
		Ok(())
	}

	#[test]
	fn parse_err() {
		assert!(MethodId::parse("").is_err());
		assert!(MethodId::parse("divide").is_err());
		assert!(MethodId::parse(":(II)I").is_err());
		assert!(MethodId::parse("divide:II)I").is_err());
		assert!(MethodId::parse("divide:(II)").is_err());
		assert!(MethodId::parse("divide:(IV)I").is_err());
		assert!(MethodId::parse("divide:(II)II").is_err());
	}

	#[test]
	fn round_trip() -> Result<()> {
		for id in ["divide:(II)I", "check:()V", "get:([C)C", "f:(ZBSCIJFD)J"] {
			assert_eq!(MethodId::parse(id)?.write(), id);
		}
		Ok(())
	}

	#[test]
	fn parse_absolute() -> Result<()> {
		let id = AbsMethodId::parse("jpamb/cases/Simple.divide:(II)I")?;
		assert_eq!(id.class.as_inner(), "jpamb/cases/Simple");
		assert_eq!(id.member.name, "divide");
		assert_eq!(id.write(), "jpamb/cases/Simple.divide:(II)I");

		assert!(AbsMethodId::parse("divide:(II)I").is_err());
		assert!(AbsMethodId::parse(".divide:(II)I").is_err());
		Ok(())
	}

	#[test]
	fn from_json() -> Result<()> {
		let json = serde_json::json!({
			"ref": {"kind": "class", "name": "jpamb/cases/Calls"},
			"name": "fib",
			"args": ["int"],
			"returns": "int",
			"is_interface": false,
		});
		let id = AbsMethodId::from_json(&json)?;
		assert_eq!(id.write(), "jpamb/cases/Calls.fib:(I)I");

		let void = serde_json::json!({
			"ref": {"kind": "class", "name": "jpamb/cases/Simple"},
			"name": "check",
			"args": [],
			"returns": null,
		});
		assert_eq!(AbsMethodId::from_json(&void)?.write(), "jpamb/cases/Simple.check:()V");
		Ok(())
	}
}

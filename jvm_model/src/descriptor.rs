use std::fmt::{Display, Formatter};
use std::iter::Peekable;
use std::str::Chars;
use anyhow::{anyhow, bail, Context, Result};
use crate::class::ClassName;

/// Represents a JVM type.
///
/// ```
/// use jvm_model::descriptor::Type;
///
/// // the type of a java `int`
/// let int_type = Type::Int;
///
/// // the type of a java `int[]`
/// let int_array_type = Type::Array(Box::new(Type::Int));
///
/// assert_ne!(int_type, int_array_type);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
	/// A `boolean`. In a descriptor this is `Z`.
	Boolean,
	/// A `byte`, an 8 bit signed integer.
	Byte,
	/// A `short`, a 16 bit signed integer.
	Short,
	/// A `char`, a 16 bit unsigned code unit.
	Char,
	/// An `int`, a 32 bit signed integer.
	Int,
	/// A `long`, a 64 bit signed integer.
	Long,
	/// A `float`. In rust, this is a `f32`.
	Float,
	/// A `double`. In rust, this is a `f64`.
	Double,
	/// An untyped reference, as produced by the decompiler for `aload` and friends.
	Reference,
	/// An array of the inner type.
	Array(Box<Type>),
	/// An instance of the class specified by [`ClassName`].
	Object(ClassName),
}

// The grammar for descriptors is:
//   FieldType:
//     "B" | "C" | "D" | "F" | "I" | "J" | "S" | "Z" |
//     "L" ClassName ";" |
//     "[" FieldType
fn read_field_type(chars: &mut Peekable<Chars>) -> Result<Type> {
	let char = chars.next().ok_or_else(|| anyhow!("unexpected abrupt ending of descriptor"))?;
	let descriptor = match char {
		'B' => Type::Byte,
		'C' => Type::Char,
		'D' => Type::Double,
		'F' => Type::Float,
		'I' => Type::Int,
		'J' => Type::Long,
		'S' => Type::Short,
		'Z' => Type::Boolean,
		'[' => {
			let inner = read_field_type(chars)?;
			Type::Array(Box::new(inner))
		},
		'L' => {
			let mut s = String::new();

			let mut char = chars.next().ok_or_else(|| anyhow!("unexpected abrupt ending of descriptor"))?;
			while char != ';' {
				s.push(char);

				char = chars.next().ok_or_else(|| anyhow!("unexpected abrupt ending of descriptor"))?;
			}

			Type::Object(ClassName::from(s))
		},
		x => {
			bail!("unexpected char {x:?} in descriptor");
		},
	};

	Ok(descriptor)
}

fn write_field_type(t: &Type, string: &mut String) {
	match t {
		Type::Byte => string.push('B'),
		Type::Char => string.push('C'),
		Type::Double => string.push('D'),
		Type::Float => string.push('F'),
		Type::Int => string.push('I'),
		Type::Long => string.push('J'),
		Type::Short => string.push('S'),
		Type::Boolean => string.push('Z'),
		// an untyped reference has no own descriptor, java/lang/Object is the closest honest encoding
		Type::Reference => {
			string.push_str("Ljava/lang/Object;");
		},
		Type::Object(class_name) => {
			string.push('L');
			string.push_str(class_name.as_inner());
			string.push(';');
		},
		Type::Array(inner) => {
			string.push('[');
			write_field_type(inner, string);
		},
	}
}

impl Type {
	/// Attempts to parse a single field descriptor, rejecting trailing input.
	///
	/// A field descriptor is defined by the [grammar](https://docs.oracle.com/javase/specs/jvms/se22/html/jvms-4.html#jvms-4.3.2) in the
	/// Java Virtual Machine Specification.
	pub fn parse(descriptor: &str) -> Result<Type> {
		let mut chars = descriptor.chars().peekable();

		let t = read_field_type(&mut chars)
			.with_context(|| anyhow!("failed to read field descriptor {descriptor:?}"))?;

		if chars.peek().is_some() {
			bail!("expected end of field descriptor {descriptor:?}, got {:?} remaining", String::from_iter(chars));
		}

		Ok(t)
	}

	/// Reads one field descriptor off the front of `chars`, leaving the rest.
	pub(crate) fn read(chars: &mut Peekable<Chars>) -> Result<Type> {
		read_field_type(chars)
	}

	/// Writes this type as a field descriptor.
	pub fn write(&self) -> String {
		let mut s = String::new();
		write_field_type(self, &mut s);
		s
	}

	/// Decodes a type from the decompiler's JSON encoding.
	///
	/// Simple types come as strings (`"int"`, `"boolean"`, ...), class and
	/// array types as objects tagged with a `kind` field.
	pub fn from_json(json: &serde_json::Value) -> Result<Type> {
		match json {
			serde_json::Value::String(s) => match s.as_str() {
				"boolean" => Ok(Type::Boolean),
				"byte" => Ok(Type::Byte),
				"short" => Ok(Type::Short),
				"char" => Ok(Type::Char),
				"int" | "integer" => Ok(Type::Int),
				"long" => Ok(Type::Long),
				"float" => Ok(Type::Float),
				"double" => Ok(Type::Double),
				"ref" | "reference" => Ok(Type::Reference),
				x => bail!("unknown type name {x:?}"),
			},
			serde_json::Value::Object(map) => {
				// some encodings wrap the type once more, as in {"type": ...}
				if let Some(inner) = map.get("type").filter(|_| !map.contains_key("kind")) {
					return Type::from_json(inner);
				}

				let kind = map.get("kind")
					.and_then(|k| k.as_str())
					.ok_or_else(|| anyhow!("type object without a \"kind\" tag: {json}"))?;

				match kind {
					"class" => {
						let name = map.get("name")
							.and_then(|n| n.as_str())
							.ok_or_else(|| anyhow!("class type without a name: {json}"))?;
						Ok(Type::Object(ClassName::from(name)))
					},
					"array" => {
						let inner = map.get("type")
							.ok_or_else(|| anyhow!("array type without an inner type: {json}"))?;
						Ok(Type::Array(Box::new(Type::from_json(inner)?)))
					},
					x => bail!("unknown type kind {x:?}"),
				}
			},
			x => bail!("cannot decode a type from {x}"),
		}
	}

}

impl Display for Type {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Type::Boolean => write!(f, "boolean"),
			Type::Byte => write!(f, "byte"),
			Type::Short => write!(f, "short"),
			Type::Char => write!(f, "char"),
			Type::Int => write!(f, "int"),
			Type::Long => write!(f, "long"),
			Type::Float => write!(f, "float"),
			Type::Double => write!(f, "double"),
			Type::Reference => write!(f, "ref"),
			Type::Array(inner) => write!(f, "{inner}[]"),
			Type::Object(name) => write!(f, "{name}"),
		}
	}
}

use std::fmt::{Display, Formatter};
use crate::class::Absolute;
use crate::descriptor::Type;

/// A field identifier: a name and the field's type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId {
	pub name: String,
	pub ty: Type,
}

impl FieldId {
	pub fn new(name: impl Into<String>, ty: Type) -> FieldId {
		FieldId { name: name.into(), ty }
	}
}

impl Display for FieldId {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}", self.name, self.ty.write())
	}
}

pub type AbsFieldId = Absolute<FieldId>;

impl Display for AbsFieldId {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}.{}", self.class, self.member)
	}
}

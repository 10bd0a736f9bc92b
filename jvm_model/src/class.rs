use std::fmt::{Display, Formatter};

/// The binary name of a class, with packages separated by `/`,
/// e.g. `jpamb/cases/Simple`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassName {
	inner: String,
}

impl ClassName {
	pub fn as_inner(&self) -> &str {
		&self.inner
	}

	/// The package components, without the simple name.
	pub fn packages(&self) -> impl Iterator<Item = &str> {
		let mut parts: Vec<&str> = self.inner.split('/').collect();
		parts.pop();
		parts.into_iter()
	}

	/// The part after the last `/`, including any `$` inner-class suffix.
	pub fn simple_name(&self) -> &str {
		self.inner.rsplit('/').next().unwrap_or(&self.inner)
	}

	/// The simple name of the top level class, i.e. with any `$` inner-class
	/// suffix removed. This names the source file the class lives in.
	pub fn top_level_name(&self) -> &str {
		let simple = self.simple_name();
		simple.split('$').next().unwrap_or(simple)
	}
}

impl From<&str> for ClassName {
	fn from(value: &str) -> Self {
		ClassName { inner: value.to_owned() }
	}
}

impl From<String> for ClassName {
	fn from(value: String) -> Self {
		ClassName { inner: value }
	}
}

impl Display for ClassName {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.inner)
	}
}

/// A member identifier made absolute by pairing it with the class it
/// belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Absolute<T> {
	pub class: ClassName,
	pub member: T,
}

impl<T> Absolute<T> {
	pub fn new(class: ClassName, member: T) -> Absolute<T> {
		Absolute { class, member }
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::class::ClassName;

	#[test]
	fn name_parts() {
		let name = ClassName::from("jpamb/cases/Simple");
		assert_eq!(name.packages().collect::<Vec<_>>(), vec!["jpamb", "cases"]);
		assert_eq!(name.simple_name(), "Simple");
		assert_eq!(name.top_level_name(), "Simple");

		let inner = ClassName::from("jpamb/cases/Simple$Helper");
		assert_eq!(inner.simple_name(), "Simple$Helper");
		assert_eq!(inner.top_level_name(), "Simple");

		let bare = ClassName::from("Simple");
		assert_eq!(bare.packages().count(), 0);
		assert_eq!(bare.simple_name(), "Simple");
	}
}

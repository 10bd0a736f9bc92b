use std::collections::{BTreeMap, BTreeSet};
use jvm_model::AbsMethodId;

/// Records, per method, the source line of every instruction an
/// interpreter retired. Passed explicitly to the interpreters and cleared
/// per analysis; this is what the debloater reads back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Coverage {
	lines: BTreeMap<AbsMethodId, BTreeSet<u32>>,
}

impl Coverage {
	pub fn new() -> Coverage {
		Coverage::default()
	}

	pub fn record(&mut self, method: &AbsMethodId, line: Option<u32>) {
		if let Some(line) = line {
			self.lines.entry(method.clone()).or_default().insert(line);
		}
	}

	/// The executed lines of one method.
	pub fn lines_of(&self, method: &AbsMethodId) -> BTreeSet<u32> {
		self.lines.get(method).cloned().unwrap_or_default()
	}

	pub fn methods(&self) -> impl Iterator<Item = &AbsMethodId> {
		self.lines.keys()
	}

	pub fn merge(&mut self, other: &Coverage) {
		for (method, lines) in &other.lines {
			self.lines.entry(method.clone()).or_default().extend(lines.iter().copied());
		}
	}

	pub fn clear(&mut self) {
		self.lines.clear();
	}

	pub fn is_empty(&self) -> bool {
		self.lines.is_empty()
	}
}

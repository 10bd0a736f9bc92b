use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use crate::{DivOutcome, Domain, Refinement, Relation};

/// How many literals are tracked before the set collapses to ⊤.
const MAX_TRACKED: usize = 5;

/// The string literal domain: a bounded set of known literals. `add` is
/// concatenation (the cross product of the operand sets); every other
/// arithmetic operation loses all precision.
#[derive(Debug, Clone, PartialEq)]
pub enum StringSet {
	Top,
	/// The empty set is ⊥.
	Lits(BTreeSet<String>),
}

impl StringSet {
	pub fn of<I, S>(items: I) -> StringSet
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		StringSet::capped(items.into_iter().map(Into::into).collect())
	}

	fn capped(values: BTreeSet<String>) -> StringSet {
		if values.len() > MAX_TRACKED {
			StringSet::Top
		} else {
			StringSet::Lits(values)
		}
	}
}

impl Domain for StringSet {
	type Concrete = String;

	const FINITE_LATTICE: bool = true;

	fn abstracted<I: IntoIterator<Item = String>>(items: I) -> StringSet {
		StringSet::capped(items.into_iter().collect())
	}

	fn constant(value: i64) -> StringSet {
		StringSet::of([value.to_string()])
	}

	fn bot() -> StringSet {
		StringSet::Lits(BTreeSet::new())
	}

	fn top() -> StringSet {
		StringSet::Top
	}

	fn is_bot(&self) -> bool {
		matches!(self, StringSet::Lits(values) if values.is_empty())
	}

	fn contains(&self, value: &String) -> bool {
		match self {
			StringSet::Top => true,
			StringSet::Lits(values) => values.contains(value),
		}
	}

	fn le(&self, other: &StringSet) -> bool {
		match (self, other) {
			(_, StringSet::Top) => true,
			(StringSet::Top, _) => false,
			(StringSet::Lits(a), StringSet::Lits(b)) => a.is_subset(b),
		}
	}

	fn join(&self, other: &StringSet) -> StringSet {
		match (self, other) {
			(StringSet::Top, _) | (_, StringSet::Top) => StringSet::Top,
			(StringSet::Lits(a), StringSet::Lits(b)) => {
				StringSet::capped(a.union(b).cloned().collect())
			},
		}
	}

	fn meet(&self, other: &StringSet) -> StringSet {
		match (self, other) {
			(StringSet::Top, x) | (x, StringSet::Top) => x.clone(),
			(StringSet::Lits(a), StringSet::Lits(b)) => {
				StringSet::Lits(a.intersection(b).cloned().collect())
			},
		}
	}

	/// Concatenation.
	fn add(&self, other: &StringSet) -> StringSet {
		if self.is_bot() || other.is_bot() {
			return StringSet::bot();
		}
		match (self, other) {
			(StringSet::Top, _) | (_, StringSet::Top) => StringSet::Top,
			(StringSet::Lits(a), StringSet::Lits(b)) => {
				let mut out = BTreeSet::new();
				for x in a {
					for y in b {
						out.insert(format!("{x}{y}"));
					}
				}
				StringSet::capped(out)
			},
		}
	}

	fn sub(&self, _other: &StringSet) -> StringSet {
		StringSet::Top
	}

	fn mul(&self, _other: &StringSet) -> StringSet {
		StringSet::Top
	}

	fn neg(&self) -> StringSet {
		self.clone()
	}

	fn div(&self, _other: &StringSet) -> DivOutcome<StringSet> {
		DivOutcome::Value(StringSet::Top)
	}

	fn rem(&self, _other: &StringSet) -> DivOutcome<StringSet> {
		DivOutcome::Value(StringSet::Top)
	}

	/// Lexicographic comparison of the tracked literals, pointwise.
	fn compare(&self, relation: Relation, other: &StringSet) -> Refinement<StringSet> {
		let (StringSet::Lits(a), StringSet::Lits(b)) = (self, other) else {
			return Refinement::unknown(self.clone(), other.clone());
		};
		if a.is_empty() || b.is_empty() {
			return Refinement::none();
		}

		let mut self_true = BTreeSet::new();
		let mut other_true = BTreeSet::new();
		let mut self_false = BTreeSet::new();
		let mut other_false = BTreeSet::new();

		for x in a {
			for y in b {
				if relation.eval(x, y) {
					self_true.insert(x.clone());
					other_true.insert(y.clone());
				} else {
					self_false.insert(x.clone());
					other_false.insert(y.clone());
				}
			}
		}

		Refinement {
			when_true: (!self_true.is_empty())
				.then(|| (StringSet::Lits(self_true), StringSet::Lits(other_true))),
			when_false: (!self_false.is_empty())
				.then(|| (StringSet::Lits(self_false), StringSet::Lits(other_false))),
		}
	}

	fn i2s(&self) -> StringSet {
		self.clone()
	}
}

impl Display for StringSet {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			StringSet::Top => write!(f, "⊤str"),
			StringSet::Lits(values) if values.is_empty() => write!(f, "⊥str"),
			StringSet::Lits(values) => {
				write!(f, "{{")?;
				for (i, v) in values.iter().enumerate() {
					if i > 0 {
						write!(f, ",")?;
					}
					write!(f, "{v}")?;
				}
				write!(f, "}}")
			},
		}
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::string_set::StringSet;
	use crate::{Domain, Relation};

	#[test]
	fn abstraction() {
		assert_eq!(StringSet::of::<_, String>([]), StringSet::bot());
		assert!(StringSet::of(["a", "b"]).contains(&"a".to_owned()));
		assert!(!StringSet::of(["a", "b"]).contains(&"c".to_owned()));
		// too many literals collapse to top
		let wide = StringSet::of(["a", "b", "c", "d", "e", "f"]);
		assert_eq!(wide, StringSet::Top);
	}

	#[test]
	fn lattice_laws() {
		let a = StringSet::of(["x"]);
		let b = StringSet::of(["y"]);

		assert_eq!(a.join(&b), StringSet::of(["x", "y"]));
		assert_eq!(a.join(&b), b.join(&a));
		assert_eq!(a.meet(&b), StringSet::bot());
		assert_eq!(a.join(&StringSet::bot()), a);
		assert_eq!(a.join(&StringSet::Top), StringSet::Top);
		assert!(StringSet::bot().le(&a));
		assert!(a.le(&StringSet::Top));
	}

	#[test]
	fn concatenation() {
		let greeting = StringSet::of(["hi ", "yo "]);
		let name = StringSet::of(["ada", "bob"]);
		assert_eq!(
			greeting.add(&name),
			StringSet::of(["hi ada", "hi bob", "yo ada", "yo bob"]),
		);
		assert_eq!(greeting.add(&StringSet::bot()), StringSet::bot());
		assert_eq!(greeting.add(&StringSet::Top), StringSet::Top);
		// everything else loses precision
		assert_eq!(greeting.sub(&name), StringSet::Top);
		assert_eq!(greeting.mul(&name), StringSet::Top);
	}

	#[test]
	fn comparisons_refine() {
		let a = StringSet::of(["a", "c"]);
		let b = StringSet::of(["b"]);

		let lt = a.compare(Relation::Lt, &b);
		assert_eq!(lt.when_true, Some((StringSet::of(["a"]), b.clone())));
		assert_eq!(lt.when_false, Some((StringSet::of(["c"]), b.clone())));

		let eq = a.compare(Relation::Eq, &b);
		assert!(eq.when_true.is_none());
		assert_eq!(eq.when_false, Some((a.clone(), b)));
	}
}

//! Abstract domains for the analysis of JVM integer (and float, string,
//! vector) values.
//!
//! Every domain is a lattice of over-approximations of sets of concrete
//! values, with sound abstract arithmetic, a refinement-aware comparison
//! used to prune branches, and a widening operator that guarantees the
//! fixpoint iteration terminates.

use std::collections::BTreeSet;
use std::fmt::{Debug, Display};

pub mod boxdom;
pub mod float_interval;
pub mod interval;
pub mod machine_word;
pub mod sign;
pub mod string_set;

pub use boxdom::BoxDomain;
pub use float_interval::FloatInterval;
pub use interval::Interval;
pub use machine_word::MachineWord;
pub use sign::{Sign, SignSet};
pub use string_set::StringSet;

/// A numeric comparison, as used by the `if` and `ifz` instructions.
/// Reference comparisons (`is`, `isnot`) never reach a domain.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Relation {
	Eq,
	Ne,
	Lt,
	Le,
	Gt,
	Ge,
}

impl Relation {
	/// The relation with operands swapped: `a R b` iff `b R.flip() a`.
	pub fn flip(self) -> Relation {
		match self {
			Relation::Eq => Relation::Eq,
			Relation::Ne => Relation::Ne,
			Relation::Lt => Relation::Gt,
			Relation::Le => Relation::Ge,
			Relation::Gt => Relation::Lt,
			Relation::Ge => Relation::Le,
		}
	}

	/// Evaluates the relation on a concrete pair.
	pub fn eval<T: PartialOrd>(self, a: &T, b: &T) -> bool {
		match self {
			Relation::Eq => a == b,
			Relation::Ne => a != b,
			Relation::Lt => a < b,
			Relation::Le => a <= b,
			Relation::Gt => a > b,
			Relation::Ge => a >= b,
		}
	}
}

/// The result of an abstract integer division or remainder: the operation
/// can produce a value, fail on a zero divisor, or both, depending on
/// whether the divisor contains zero.
#[derive(Debug, Clone, PartialEq)]
pub enum DivOutcome<A> {
	Value(A),
	DivideByZero,
	Both(A),
}

/// The refinement returned by [`Domain::compare`]: for each boolean
/// outcome that is not ruled out, the pair of operands narrowed to
/// exactly the concrete pairs producing that outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Refinement<A> {
	pub when_true: Option<(A, A)>,
	pub when_false: Option<(A, A)>,
}

impl<A> Refinement<A> {
	/// Neither outcome is ruled out, and no narrowing is possible.
	pub fn unknown(a: A, b: A) -> Refinement<A>
	where
		A: Clone,
	{
		Refinement {
			when_true: Some((a.clone(), b.clone())),
			when_false: Some((a, b)),
		}
	}

	/// No outcome is possible at all (an operand was ⊥).
	pub fn none() -> Refinement<A> {
		Refinement { when_true: None, when_false: None }
	}

	/// The same refinement seen from the other operand's side.
	pub fn swap(self) -> Refinement<A> {
		Refinement {
			when_true: self.when_true.map(|(a, b)| (b, a)),
			when_false: self.when_false.map(|(a, b)| (b, a)),
		}
	}
}

/// The threshold set used by interval widening: unstable bounds jump to
/// the nearest threshold instead of directly to ±∞.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KSet {
	values: BTreeSet<i64>,
}

impl KSet {
	pub fn new() -> KSet {
		KSet::default()
	}

	/// The default thresholds used when nothing was mined from the source.
	pub fn defaults() -> KSet {
		let mut k = KSet::new();
		for v in [-100, -10, -1, 0, 1, 10, 100] {
			k.insert(v);
		}
		k
	}

	pub fn insert(&mut self, value: i64) {
		self.values.insert(value);
	}

	/// Inserts a mined value together with its direct neighbors, which
	/// keeps loop bounds like `i < n` precise across the off-by-one.
	pub fn insert_around(&mut self, value: i64) {
		self.insert(value.saturating_sub(1));
		self.insert(value);
		self.insert(value.saturating_add(1));
	}

	/// The largest threshold at or below `value`, if any.
	pub fn at_or_below(&self, value: i64) -> Option<i64> {
		self.values.range(..=value).next_back().copied()
	}

	/// The smallest threshold at or above `value`, if any.
	pub fn at_or_above(&self, value: i64) -> Option<i64> {
		self.values.range(value..).next().copied()
	}

	pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
		self.values.iter().copied()
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}
}

/// The contract every abstract domain implements.
///
/// An element stands for a set of concrete values (its concretization);
/// `bot` stands for the empty set and `top` for all values. All
/// operations must over-approximate their concrete counterparts.
pub trait Domain: Clone + PartialEq + Debug + Display + Sized {
	/// The concrete value the domain abstracts over.
	type Concrete: Clone;

	/// Whether the lattice has finite height, in which case widening may
	/// simply join.
	const FINITE_LATTICE: bool;

	/// The least element containing every item (α). `bot` for no items.
	fn abstracted<I: IntoIterator<Item = Self::Concrete>>(items: I) -> Self;

	/// The abstraction of a single integer constant, as pushed by the
	/// interpreter.
	fn constant(value: i64) -> Self;

	fn bot() -> Self;
	fn top() -> Self;
	fn is_bot(&self) -> bool;

	/// Membership in the concretization.
	fn contains(&self, value: &Self::Concrete) -> bool;

	/// The partial order of the lattice (`self` ⊑ `other`).
	fn le(&self, other: &Self) -> bool;
	/// The least upper bound (⊔).
	fn join(&self, other: &Self) -> Self;
	/// The greatest lower bound (⊓).
	fn meet(&self, other: &Self) -> Self;

	fn add(&self, other: &Self) -> Self;
	fn sub(&self, other: &Self) -> Self;
	fn mul(&self, other: &Self) -> Self;
	fn neg(&self) -> Self;
	fn div(&self, other: &Self) -> DivOutcome<Self>;
	fn rem(&self, other: &Self) -> DivOutcome<Self>;

	/// Refinement-aware comparison; see [`Refinement`].
	fn compare(&self, relation: Relation, other: &Self) -> Refinement<Self>;

	/// An upper bound of both arguments that converges when iterated. On
	/// finite lattices the join suffices.
	fn widen(&self, other: &Self, _thresholds: &KSet) -> Self {
		self.join(other)
	}

	/// The JVM `i2s` narrowing: truncate to 16 bits and sign extend.
	/// Domains that do not track machine integers may approximate.
	fn i2s(&self) -> Self;
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::{KSet, Relation};

	#[test]
	fn relation_flip() {
		assert_eq!(Relation::Lt.flip(), Relation::Gt);
		assert_eq!(Relation::Le.flip(), Relation::Ge);
		assert_eq!(Relation::Eq.flip(), Relation::Eq);
		assert!(Relation::Lt.eval(&1, &2));
		assert!(Relation::Gt.eval(&2, &1));
		assert!(!Relation::Ne.eval(&2, &2));
	}

	#[test]
	fn kset_lookup() {
		let mut k = KSet::defaults();
		k.insert_around(42);

		assert_eq!(k.at_or_below(5), Some(1));
		assert_eq!(k.at_or_below(-200), None);
		assert_eq!(k.at_or_above(11), Some(41));
		assert_eq!(k.at_or_above(101), None);
		assert_eq!(k.at_or_below(42), Some(42));
	}
}

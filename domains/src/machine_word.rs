use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use crate::{DivOutcome, Domain, Refinement, Relation};

/// How many residues are tracked before the set collapses to ⊤.
const MAX_TRACKED: usize = 16;

/// The machine word domain: a bounded set of 32 bit residues, interpreted
/// as two's complement `int`s. The lattice is finite (if tall), so
/// widening is just the join.
#[derive(Debug, Clone, PartialEq)]
pub enum MachineWord {
	Bot,
	Top,
	Values(BTreeSet<u32>),
}

fn residue(value: i64) -> u32 {
	value as u32
}

fn signed(residue: u32) -> i32 {
	residue as i32
}

impl MachineWord {
	pub fn of(values: impl IntoIterator<Item = i64>) -> MachineWord {
		MachineWord::abstracted(values)
	}

	fn capped(values: BTreeSet<u32>) -> MachineWord {
		if values.len() > MAX_TRACKED {
			MachineWord::Top
		} else {
			MachineWord::Values(values)
		}
	}

	fn pointwise(&self, other: &MachineWord, op: impl Fn(i32, i32) -> i32) -> MachineWord {
		match (self, other) {
			(MachineWord::Bot, _) | (_, MachineWord::Bot) => MachineWord::Bot,
			(MachineWord::Top, _) | (_, MachineWord::Top) => MachineWord::Top,
			(MachineWord::Values(a), MachineWord::Values(b)) => {
				let mut out = BTreeSet::new();
				for x in a {
					for y in b {
						out.insert(op(signed(*x), signed(*y)) as u32);
					}
				}
				MachineWord::capped(out)
			},
		}
	}
}

impl Domain for MachineWord {
	type Concrete = i64;

	const FINITE_LATTICE: bool = true;

	fn abstracted<I: IntoIterator<Item = i64>>(items: I) -> MachineWord {
		let values: BTreeSet<u32> = items.into_iter().map(residue).collect();
		if values.is_empty() {
			MachineWord::Bot
		} else {
			MachineWord::capped(values)
		}
	}

	fn constant(value: i64) -> MachineWord {
		MachineWord::abstracted([value])
	}

	fn bot() -> MachineWord {
		MachineWord::Bot
	}

	fn top() -> MachineWord {
		MachineWord::Top
	}

	fn is_bot(&self) -> bool {
		matches!(self, MachineWord::Bot)
	}

	fn contains(&self, value: &i64) -> bool {
		match self {
			MachineWord::Bot => false,
			MachineWord::Top => true,
			MachineWord::Values(values) => values.contains(&residue(*value)),
		}
	}

	fn le(&self, other: &MachineWord) -> bool {
		match (self, other) {
			(MachineWord::Bot, _) => true,
			(_, MachineWord::Top) => true,
			(MachineWord::Top, _) => false,
			(_, MachineWord::Bot) => false,
			(MachineWord::Values(a), MachineWord::Values(b)) => a.is_subset(b),
		}
	}

	fn join(&self, other: &MachineWord) -> MachineWord {
		match (self, other) {
			(MachineWord::Bot, x) | (x, MachineWord::Bot) => x.clone(),
			(MachineWord::Top, _) | (_, MachineWord::Top) => MachineWord::Top,
			(MachineWord::Values(a), MachineWord::Values(b)) => {
				MachineWord::capped(a.union(b).copied().collect())
			},
		}
	}

	fn meet(&self, other: &MachineWord) -> MachineWord {
		match (self, other) {
			(MachineWord::Bot, _) | (_, MachineWord::Bot) => MachineWord::Bot,
			(MachineWord::Top, x) | (x, MachineWord::Top) => x.clone(),
			(MachineWord::Values(a), MachineWord::Values(b)) => {
				MachineWord::Values(a.intersection(b).copied().collect())
			},
		}
	}

	fn add(&self, other: &MachineWord) -> MachineWord {
		self.pointwise(other, i32::wrapping_add)
	}

	fn sub(&self, other: &MachineWord) -> MachineWord {
		self.pointwise(other, i32::wrapping_sub)
	}

	fn mul(&self, other: &MachineWord) -> MachineWord {
		self.pointwise(other, i32::wrapping_mul)
	}

	fn neg(&self) -> MachineWord {
		match self {
			MachineWord::Bot => MachineWord::Bot,
			MachineWord::Top => MachineWord::Top,
			MachineWord::Values(values) => MachineWord::capped(
				values.iter().map(|v| signed(*v).wrapping_neg() as u32).collect(),
			),
		}
	}

	// A divisor set containing zero collapses to ⊤ rather than splitting,
	// except when zero is the only possibility.
	fn div(&self, other: &MachineWord) -> DivOutcome<MachineWord> {
		match other {
			MachineWord::Bot => DivOutcome::Value(MachineWord::Bot),
			MachineWord::Top => DivOutcome::Value(MachineWord::Top),
			MachineWord::Values(divisors) => {
				if divisors.iter().all(|d| *d == 0) {
					return DivOutcome::DivideByZero;
				}
				if divisors.contains(&0) {
					return DivOutcome::Value(MachineWord::Top);
				}
				DivOutcome::Value(self.pointwise(other, i32::wrapping_div))
			},
		}
	}

	fn rem(&self, other: &MachineWord) -> DivOutcome<MachineWord> {
		match other {
			MachineWord::Bot => DivOutcome::Value(MachineWord::Bot),
			MachineWord::Top => DivOutcome::Value(MachineWord::Top),
			MachineWord::Values(divisors) => {
				if divisors.iter().all(|d| *d == 0) {
					return DivOutcome::DivideByZero;
				}
				if divisors.contains(&0) {
					return DivOutcome::Value(MachineWord::Top);
				}
				DivOutcome::Value(self.pointwise(other, i32::wrapping_rem))
			},
		}
	}

	fn compare(&self, relation: Relation, other: &MachineWord) -> Refinement<MachineWord> {
		let (MachineWord::Values(a), MachineWord::Values(b)) = (self, other) else {
			if self.is_bot() || other.is_bot() {
				return Refinement::none();
			}
			return Refinement::unknown(self.clone(), other.clone());
		};

		let mut self_true = BTreeSet::new();
		let mut other_true = BTreeSet::new();
		let mut self_false = BTreeSet::new();
		let mut other_false = BTreeSet::new();

		for x in a {
			for y in b {
				if relation.eval(&signed(*x), &signed(*y)) {
					self_true.insert(*x);
					other_true.insert(*y);
				} else {
					self_false.insert(*x);
					other_false.insert(*y);
				}
			}
		}

		Refinement {
			when_true: (!self_true.is_empty()).then(|| {
				(MachineWord::Values(self_true), MachineWord::Values(other_true))
			}),
			when_false: (!self_false.is_empty()).then(|| {
				(MachineWord::Values(self_false), MachineWord::Values(other_false))
			}),
		}
	}

	fn i2s(&self) -> MachineWord {
		match self {
			MachineWord::Bot => MachineWord::Bot,
			MachineWord::Top => MachineWord::Top,
			MachineWord::Values(values) => MachineWord::capped(
				values.iter().map(|v| (signed(*v) as i16) as i32 as u32).collect(),
			),
		}
	}
}

impl Display for MachineWord {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			MachineWord::Bot => write!(f, "⊥word"),
			MachineWord::Top => write!(f, "⊤word"),
			MachineWord::Values(values) => {
				write!(f, "{{")?;
				for (i, v) in values.iter().enumerate() {
					if i > 0 {
						write!(f, ",")?;
					}
					write!(f, "{}", signed(*v))?;
				}
				write!(f, "}}")
			},
		}
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::machine_word::MachineWord;
	use crate::{DivOutcome, Domain, Relation};

	#[test]
	fn abstraction() {
		assert_eq!(MachineWord::abstracted([]), MachineWord::Bot);
		assert!(MachineWord::of([1, -1]).contains(&-1));
		assert!(!MachineWord::of([1, -1]).contains(&2));
		// residues are modulo 2^32
		assert!(MachineWord::of([1]).contains(&(1 + (1i64 << 32))));
		// too many values collapse to top
		let wide = MachineWord::abstracted(0i64..40);
		assert_eq!(wide, MachineWord::Top);
	}

	#[test]
	fn lattice_laws() {
		let a = MachineWord::of([1, 2]);
		let b = MachineWord::of([2, 3]);

		assert_eq!(a.join(&b), MachineWord::of([1, 2, 3]));
		assert_eq!(a.join(&b), b.join(&a));
		assert_eq!(a.meet(&b), MachineWord::of([2]));
		assert_eq!(a.join(&MachineWord::Bot), a);
		assert_eq!(a.join(&MachineWord::Top), MachineWord::Top);
		assert!(MachineWord::Bot.le(&a));
		assert!(a.le(&MachineWord::Top));
		assert!(MachineWord::of([1]).le(&a));
		assert!(!a.le(&MachineWord::of([1])));
	}

	#[test]
	fn arithmetic_wraps() {
		let a = MachineWord::of([i32::MAX as i64]);
		assert_eq!(a.add(&MachineWord::of([1])), MachineWord::of([i32::MIN as i64]));
		assert_eq!(
			MachineWord::of([2, 3]).mul(&MachineWord::of([10])),
			MachineWord::of([20, 30]),
		);
		assert_eq!(MachineWord::of([5]).neg(), MachineWord::of([-5]));
	}

	#[test]
	fn division() {
		assert_eq!(
			MachineWord::of([7]).div(&MachineWord::of([2])),
			DivOutcome::Value(MachineWord::of([3])),
		);
		assert_eq!(MachineWord::of([7]).div(&MachineWord::of([0])), DivOutcome::DivideByZero);
		// zero among other divisors loses all precision
		assert_eq!(
			MachineWord::of([7]).div(&MachineWord::of([0, 2])),
			DivOutcome::Value(MachineWord::Top),
		);
		assert_eq!(
			MachineWord::of([7]).rem(&MachineWord::of([4])),
			DivOutcome::Value(MachineWord::of([3])),
		);
	}

	#[test]
	fn comparisons_refine() {
		let a = MachineWord::of([-1, 0, 1]);
		let zero = MachineWord::of([0]);

		let refined = a.compare(Relation::Lt, &zero);
		assert_eq!(refined.when_true, Some((MachineWord::of([-1]), zero.clone())));
		assert_eq!(refined.when_false, Some((MachineWord::of([0, 1]), zero.clone())));

		let top = MachineWord::Top;
		let unknown = top.compare(Relation::Eq, &zero);
		assert_eq!(unknown.when_true, Some((MachineWord::Top, zero.clone())));
		assert_eq!(unknown.when_false, Some((MachineWord::Top, zero)));
	}

	#[test]
	fn narrowing_cast() {
		assert_eq!(MachineWord::of([40000]).i2s(), MachineWord::of([(40000i64 as i16) as i64]));
		assert_eq!(MachineWord::of([5]).i2s(), MachineWord::of([5]));
	}
}

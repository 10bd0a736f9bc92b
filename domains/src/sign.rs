use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use enumflags2::BitFlags;
use crate::{DivOutcome, Domain, Refinement, Relation};

/// The sign of an integer.
#[derive(BitFlags, Copy, Clone, Debug, PartialEq)]
#[repr(u8)]
pub enum Sign {
	Minus = 0b001,
	Zero = 0b010,
	Plus = 0b100,
}

impl Sign {
	pub fn of(value: i64) -> Sign {
		match value.cmp(&0) {
			Ordering::Less => Sign::Minus,
			Ordering::Equal => Sign::Zero,
			Ordering::Greater => Sign::Plus,
		}
	}
}

/// The sign set domain: an element is the set of signs its values may
/// have. Finite height, so widening is just the join.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SignSet {
	signs: BitFlags<Sign>,
}

const SIGNS: [Sign; 3] = [Sign::Minus, Sign::Zero, Sign::Plus];

impl SignSet {
	pub fn of(signs: impl Into<BitFlags<Sign>>) -> SignSet {
		SignSet { signs: signs.into() }
	}

	pub fn signs(&self) -> BitFlags<Sign> {
		self.signs
	}

	fn iter(&self) -> impl Iterator<Item = Sign> + '_ {
		SIGNS.iter().copied().filter(|s| self.signs.contains(*s))
	}

	fn from_table(
		&self,
		other: &SignSet,
		table: fn(Sign, Sign) -> BitFlags<Sign>,
	) -> SignSet {
		let mut out = BitFlags::empty();
		for s1 in self.iter() {
			for s2 in other.iter() {
				out |= table(s1, s2);
			}
		}
		SignSet { signs: out }
	}
}

fn add_signs(a: Sign, b: Sign) -> BitFlags<Sign> {
	match (a, b) {
		(Sign::Plus, Sign::Plus) => Sign::Plus.into(),
		(Sign::Minus, Sign::Minus) => Sign::Minus.into(),
		(Sign::Zero, x) | (x, Sign::Zero) => x.into(),
		(Sign::Plus, Sign::Minus) | (Sign::Minus, Sign::Plus) => BitFlags::all(),
	}
}

fn sub_signs(a: Sign, b: Sign) -> BitFlags<Sign> {
	match (a, b) {
		(Sign::Zero, Sign::Zero) => Sign::Zero.into(),
		(Sign::Plus, Sign::Minus) | (Sign::Plus, Sign::Zero) | (Sign::Zero, Sign::Minus) => Sign::Plus.into(),
		(Sign::Minus, Sign::Plus) | (Sign::Minus, Sign::Zero) | (Sign::Zero, Sign::Plus) => Sign::Minus.into(),
		(Sign::Plus, Sign::Plus) | (Sign::Minus, Sign::Minus) => BitFlags::all(),
	}
}

fn mul_signs(a: Sign, b: Sign) -> BitFlags<Sign> {
	match (a, b) {
		(Sign::Zero, _) | (_, Sign::Zero) => Sign::Zero.into(),
		(Sign::Plus, Sign::Plus) | (Sign::Minus, Sign::Minus) => Sign::Plus.into(),
		(Sign::Plus, Sign::Minus) | (Sign::Minus, Sign::Plus) => Sign::Minus.into(),
	}
}

// Integer division truncates towards zero, so dividing small by large
// reaches zero: +/+ is {+,0}, not {+}. The divisor is never zero here.
fn div_signs(a: Sign, b: Sign) -> BitFlags<Sign> {
	match (a, b) {
		(Sign::Zero, _) => Sign::Zero.into(),
		(Sign::Plus, Sign::Plus) | (Sign::Minus, Sign::Minus) => Sign::Plus | Sign::Zero,
		(Sign::Plus, Sign::Minus) | (Sign::Minus, Sign::Plus) => Sign::Minus | Sign::Zero,
		(_, Sign::Zero) => BitFlags::empty(),
	}
}

/// The two outcomes a comparison of two signs may have, enumerated
/// exhaustively per operator.
fn outcomes(relation: Relation, a: Sign, b: Sign) -> (bool, bool) {
	match relation {
		Relation::Eq => match (a, b) {
			(Sign::Zero, Sign::Zero) => (true, false),
			(Sign::Plus, Sign::Plus) | (Sign::Minus, Sign::Minus) => (true, true),
			_ => (false, true),
		},
		Relation::Ne => {
			let (t, f) = outcomes(Relation::Eq, a, b);
			(f, t)
		},
		Relation::Le => match (a, b) {
			(Sign::Zero, Sign::Zero) | (Sign::Zero, Sign::Plus)
			| (Sign::Minus, Sign::Zero) | (Sign::Minus, Sign::Plus) => (true, false),
			(Sign::Zero, Sign::Minus) | (Sign::Plus, Sign::Zero) | (Sign::Plus, Sign::Minus) => (false, true),
			(Sign::Plus, Sign::Plus) | (Sign::Minus, Sign::Minus) => (true, true),
		},
		Relation::Lt => match (a, b) {
			(Sign::Zero, Sign::Plus) | (Sign::Minus, Sign::Zero) | (Sign::Minus, Sign::Plus) => (true, false),
			(Sign::Zero, Sign::Zero) | (Sign::Zero, Sign::Minus)
			| (Sign::Plus, Sign::Zero) | (Sign::Plus, Sign::Minus) => (false, true),
			(Sign::Plus, Sign::Plus) | (Sign::Minus, Sign::Minus) => (true, true),
		},
		Relation::Ge => {
			let (t, f) = outcomes(Relation::Lt, a, b);
			(f, t)
		},
		Relation::Gt => {
			let (t, f) = outcomes(Relation::Le, a, b);
			(f, t)
		},
	}
}

impl Domain for SignSet {
	type Concrete = i64;

	const FINITE_LATTICE: bool = true;

	fn abstracted<I: IntoIterator<Item = i64>>(items: I) -> SignSet {
		let mut signs = BitFlags::empty();
		for item in items {
			signs |= Sign::of(item);
		}
		SignSet { signs }
	}

	fn constant(value: i64) -> SignSet {
		SignSet::of(Sign::of(value))
	}

	fn bot() -> SignSet {
		SignSet { signs: BitFlags::empty() }
	}

	fn top() -> SignSet {
		SignSet { signs: BitFlags::all() }
	}

	fn is_bot(&self) -> bool {
		self.signs.is_empty()
	}

	fn contains(&self, value: &i64) -> bool {
		self.signs.contains(Sign::of(*value))
	}

	fn le(&self, other: &SignSet) -> bool {
		(self.signs & other.signs) == self.signs
	}

	fn join(&self, other: &SignSet) -> SignSet {
		SignSet { signs: self.signs | other.signs }
	}

	fn meet(&self, other: &SignSet) -> SignSet {
		SignSet { signs: self.signs & other.signs }
	}

	fn add(&self, other: &SignSet) -> SignSet {
		self.from_table(other, add_signs)
	}

	fn sub(&self, other: &SignSet) -> SignSet {
		self.from_table(other, sub_signs)
	}

	fn mul(&self, other: &SignSet) -> SignSet {
		self.from_table(other, mul_signs)
	}

	fn neg(&self) -> SignSet {
		let mut signs = BitFlags::empty();
		if self.signs.contains(Sign::Plus) {
			signs |= Sign::Minus;
		}
		if self.signs.contains(Sign::Zero) {
			signs |= Sign::Zero;
		}
		if self.signs.contains(Sign::Minus) {
			signs |= Sign::Plus;
		}
		SignSet { signs }
	}

	fn div(&self, other: &SignSet) -> DivOutcome<SignSet> {
		if self.is_bot() || other.is_bot() {
			return DivOutcome::Value(SignSet::bot());
		}

		let has_zero = other.signs.contains(Sign::Zero);
		let nonzero = SignSet { signs: other.signs & (Sign::Minus | Sign::Plus) };
		if has_zero && nonzero.is_bot() {
			return DivOutcome::DivideByZero;
		}

		let result = self.from_table(&nonzero, div_signs);
		if has_zero {
			DivOutcome::Both(result)
		} else {
			DivOutcome::Value(result)
		}
	}

	fn rem(&self, other: &SignSet) -> DivOutcome<SignSet> {
		if self.is_bot() || other.is_bot() {
			return DivOutcome::Value(SignSet::bot());
		}

		let has_zero = other.signs.contains(Sign::Zero);
		if has_zero && !other.signs.contains(Sign::Minus) && !other.signs.contains(Sign::Plus) {
			return DivOutcome::DivideByZero;
		}

		// the remainder carries the sign of the dividend, with zero always
		// possible
		let mut signs: BitFlags<Sign> = Sign::Zero.into();
		if self.signs.contains(Sign::Plus) {
			signs |= Sign::Plus;
		}
		if self.signs.contains(Sign::Minus) {
			signs |= Sign::Minus;
		}

		let result = SignSet { signs };
		if has_zero {
			DivOutcome::Both(result)
		} else {
			DivOutcome::Value(result)
		}
	}

	fn compare(&self, relation: Relation, other: &SignSet) -> Refinement<SignSet> {
		let mut self_true = BitFlags::empty();
		let mut other_true = BitFlags::empty();
		let mut self_false = BitFlags::empty();
		let mut other_false = BitFlags::empty();

		for s1 in self.iter() {
			for s2 in other.iter() {
				let (can_true, can_false) = outcomes(relation, s1, s2);
				if can_true {
					self_true |= s1;
					other_true |= s2;
				}
				if can_false {
					self_false |= s1;
					other_false |= s2;
				}
			}
		}

		Refinement {
			when_true: (!self_true.is_empty())
				.then(|| (SignSet { signs: self_true }, SignSet { signs: other_true })),
			when_false: (!self_false.is_empty())
				.then(|| (SignSet { signs: self_false }, SignSet { signs: other_false })),
		}
	}

	// Without value ranges any nonzero sign may wrap in a 16 bit
	// truncation; only zero and bottom survive precisely.
	fn i2s(&self) -> SignSet {
		if self.is_bot() {
			return SignSet::bot();
		}
		if self.signs == Sign::Zero {
			return SignSet::of(Sign::Zero);
		}
		SignSet::top()
	}
}

impl Display for SignSet {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{{")?;
		let mut first = true;
		for (sign, label) in [(Sign::Minus, "-"), (Sign::Zero, "0"), (Sign::Plus, "+")] {
			if self.signs.contains(sign) {
				if !first {
					write!(f, ",")?;
				}
				write!(f, "{label}")?;
				first = false;
			}
		}
		write!(f, "}}")
	}
}

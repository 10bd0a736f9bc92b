use std::fmt::{Display, Formatter};
use anyhow::{bail, Result};

/// The outcome of running (or analyzing) a method.
///
/// The first six variants are the queries the benchmark asks about. The
/// negative-array-size marker is produced by the concrete interpreter and
/// mapped by the harness; it is never a query of its own.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Outcome {
	Ok,
	AssertionError,
	DivideByZero,
	OutOfBounds,
	NullPointer,
	/// Non-termination, and also the attribution for analyses that run out
	/// of budget or hit something they cannot analyze.
	Diverges,
	NegativeArraySize,
}

impl Outcome {
	/// The six queries, in the order the tool protocol reports them.
	pub const QUERIES: [Outcome; 6] = [
		Outcome::Ok,
		Outcome::AssertionError,
		Outcome::DivideByZero,
		Outcome::OutOfBounds,
		Outcome::NullPointer,
		Outcome::Diverges,
	];

	pub fn is_query(self) -> bool {
		self != Outcome::NegativeArraySize
	}

	pub fn parse(input: &str) -> Result<Outcome> {
		Ok(match input {
			"ok" => Outcome::Ok,
			"assertion error" => Outcome::AssertionError,
			"divide by zero" => Outcome::DivideByZero,
			"out of bounds" => Outcome::OutOfBounds,
			"null pointer" => Outcome::NullPointer,
			"*" => Outcome::Diverges,
			x => bail!("unknown outcome {x:?}"),
		})
	}
}

impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			Outcome::Ok => "ok",
			Outcome::AssertionError => "assertion error",
			Outcome::DivideByZero => "divide by zero",
			Outcome::OutOfBounds => "out of bounds",
			Outcome::NullPointer => "null pointer",
			Outcome::Diverges => "*",
			Outcome::NegativeArraySize => "NegativeArraySizeException",
		};
		write!(f, "{s}")
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::outcome::Outcome;

	#[test]
	fn round_trip() {
		for outcome in Outcome::QUERIES {
			assert_eq!(Outcome::parse(&outcome.to_string()).unwrap(), outcome);
		}
		assert!(Outcome::parse("NegativeArraySizeException").is_err());
		assert!(Outcome::parse("fine").is_err());
	}
}

use std::fmt::{Display, Formatter};
use crate::{DivOutcome, Domain, Refinement, Relation};

/// The axis-aligned box domain: one `f64` interval per dimension. A very
/// coarse stand-in for a relational domain; multiplication and division
/// collapse to ⊤, and dimension mismatches are resolved deterministically
/// (meet projects onto the common prefix, join gives up).
#[derive(Debug, Clone)]
pub struct BoxDomain {
	dimension: usize,
	/// `None` is ⊤, an empty list is ⊥.
	bounds: Option<Vec<(f64, f64)>>,
}

const DEFAULT_DIMENSION: usize = 1;

impl BoxDomain {
	pub fn top_of(dimension: usize) -> BoxDomain {
		BoxDomain { dimension, bounds: None }
	}

	pub fn bot_of(dimension: usize) -> BoxDomain {
		BoxDomain { dimension, bounds: Some(Vec::new()) }
	}

	pub fn from_bounds(bounds: Vec<(f64, f64)>) -> BoxDomain {
		if bounds.iter().any(|(lo, hi)| lo > hi) {
			return BoxDomain::bot_of(bounds.len().max(DEFAULT_DIMENSION));
		}
		BoxDomain { dimension: bounds.len(), bounds: Some(bounds) }
	}

	pub fn point(coordinates: &[f64]) -> BoxDomain {
		BoxDomain::from_bounds(coordinates.iter().map(|v| (*v, *v)).collect())
	}

	pub fn dimension(&self) -> usize {
		self.dimension
	}

	fn is_top(&self) -> bool {
		self.bounds.is_none()
	}

	/// Best-effort dimension choice when collapsing to ⊤ or ⊥.
	fn preferred_dimension(&self, other: &BoxDomain) -> usize {
		if !self.is_top() && !self.is_bot() {
			self.dimension
		} else if !other.is_top() && !other.is_bot() {
			other.dimension
		} else {
			self.dimension.max(other.dimension)
		}
	}

	fn pairwise(
		&self,
		other: &BoxDomain,
		op: impl Fn((f64, f64), (f64, f64)) -> (f64, f64),
	) -> BoxDomain {
		if self.is_bot() || other.is_bot() {
			return BoxDomain::bot_of(self.preferred_dimension(other));
		}
		let (Some(a), Some(b)) = (&self.bounds, &other.bounds) else {
			return BoxDomain::top_of(self.preferred_dimension(other));
		};
		if self.dimension != other.dimension {
			return BoxDomain::top_of(self.dimension.max(other.dimension));
		}
		let merged = a.iter().zip(b.iter()).map(|(x, y)| op(*x, *y)).collect();
		BoxDomain::from_bounds(merged)
	}
}

impl PartialEq for BoxDomain {
	/// Bottoms compare equal regardless of dimension, and so do tops;
	/// proper boxes need the same dimension and bounds.
	fn eq(&self, other: &BoxDomain) -> bool {
		if self.is_bot() && other.is_bot() {
			return true;
		}
		if self.is_top() && other.is_top() {
			return true;
		}
		self.dimension == other.dimension && self.bounds == other.bounds
	}
}

impl Domain for BoxDomain {
	type Concrete = Vec<f64>;

	const FINITE_LATTICE: bool = false;

	fn abstracted<I: IntoIterator<Item = Vec<f64>>>(items: I) -> BoxDomain {
		let mut result = BoxDomain::bot();
		for point in items {
			result = result.join(&BoxDomain::point(&point));
		}
		result
	}

	fn constant(value: i64) -> BoxDomain {
		BoxDomain::point(&[value as f64])
	}

	fn bot() -> BoxDomain {
		BoxDomain::bot_of(DEFAULT_DIMENSION)
	}

	fn top() -> BoxDomain {
		BoxDomain::top_of(DEFAULT_DIMENSION)
	}

	fn is_bot(&self) -> bool {
		matches!(&self.bounds, Some(bounds) if bounds.is_empty())
	}

	fn contains(&self, point: &Vec<f64>) -> bool {
		if self.is_bot() {
			return false;
		}
		let Some(bounds) = &self.bounds else {
			return true;
		};
		point.len() == self.dimension
			&& point.iter().zip(bounds.iter()).all(|(v, (lo, hi))| lo <= v && v <= hi)
	}

	fn le(&self, other: &BoxDomain) -> bool {
		if self.is_bot() {
			return true;
		}
		if other.is_top() {
			return true;
		}
		if self.is_top() || other.is_bot() {
			return false;
		}
		if self.dimension != other.dimension {
			return false;
		}
		let (Some(a), Some(b)) = (&self.bounds, &other.bounds) else {
			return false;
		};
		a.iter().zip(b.iter()).all(|((lo, hi), (other_lo, other_hi))| {
			other_lo <= lo && hi <= other_hi
		})
	}

	fn join(&self, other: &BoxDomain) -> BoxDomain {
		// bottom is neutral and dimension agnostic
		if self.is_bot() {
			return other.clone();
		}
		if other.is_bot() {
			return self.clone();
		}
		// mismatched dimensions give up to the higher dimensional top
		if self.dimension != other.dimension {
			return BoxDomain::top_of(self.dimension.max(other.dimension));
		}
		let (Some(a), Some(b)) = (&self.bounds, &other.bounds) else {
			return BoxDomain::top_of(self.dimension);
		};
		let hull = a.iter().zip(b.iter())
			.map(|((lo1, hi1), (lo2, hi2))| (lo1.min(*lo2), hi1.max(*hi2)))
			.collect();
		BoxDomain::from_bounds(hull)
	}

	fn meet(&self, other: &BoxDomain) -> BoxDomain {
		let maxdim = self.dimension.max(other.dimension);

		if self.is_bot() || other.is_bot() {
			return BoxDomain::bot_of(maxdim);
		}
		if self.is_top() && other.is_top() {
			return BoxDomain::top_of(maxdim);
		}
		if self.is_top() {
			return other.clone();
		}
		if other.is_top() {
			return self.clone();
		}

		let (Some(a), Some(b)) = (&self.bounds, &other.bounds) else {
			return BoxDomain::top_of(maxdim);
		};

		if self.dimension == other.dimension {
			let mut intersected = Vec::with_capacity(a.len());
			for ((lo1, hi1), (lo2, hi2)) in a.iter().zip(b.iter()) {
				let lo = lo1.max(*lo2);
				let hi = hi1.min(*hi2);
				if lo > hi {
					return BoxDomain::bot_of(self.dimension);
				}
				intersected.push((lo, hi));
			}
			return BoxDomain { dimension: self.dimension, bounds: Some(intersected) };
		}

		// mismatched dimensions: intersect the projections onto the common
		// prefix; keep the smaller box only when the projection is exact
		let common = self.dimension.min(other.dimension);
		let mut intersection = Vec::with_capacity(common);
		for i in 0..common {
			let lo = a[i].0.max(b[i].0);
			let hi = a[i].1.min(b[i].1);
			if lo > hi {
				return BoxDomain::bot_of(maxdim);
			}
			intersection.push((lo, hi));
		}

		let small = if self.dimension < other.dimension { self } else { other };
		let small_bounds = match &small.bounds {
			Some(bounds) => bounds,
			None => return BoxDomain::top_of(maxdim),
		};
		let same_as_small = intersection.iter().zip(small_bounds.iter()).all(|(x, y)| x == y);

		if same_as_small {
			small.clone()
		} else {
			BoxDomain::top_of(maxdim)
		}
	}

	fn add(&self, other: &BoxDomain) -> BoxDomain {
		self.pairwise(other, |(lo1, hi1), (lo2, hi2)| (lo1 + lo2, hi1 + hi2))
	}

	fn sub(&self, other: &BoxDomain) -> BoxDomain {
		self.pairwise(other, |(lo1, hi1), (lo2, hi2)| (lo1 - hi2, hi1 - lo2))
	}

	fn mul(&self, other: &BoxDomain) -> BoxDomain {
		if self.is_bot() || other.is_bot() {
			return BoxDomain::bot_of(self.preferred_dimension(other));
		}
		BoxDomain::top_of(self.preferred_dimension(other))
	}

	fn neg(&self) -> BoxDomain {
		match &self.bounds {
			None => BoxDomain::top_of(self.dimension),
			Some(bounds) => BoxDomain {
				dimension: self.dimension,
				bounds: Some(bounds.iter().map(|(lo, hi)| (-hi, -lo)).collect()),
			},
		}
	}

	fn div(&self, other: &BoxDomain) -> DivOutcome<BoxDomain> {
		DivOutcome::Value(self.mul(other))
	}

	fn rem(&self, other: &BoxDomain) -> DivOutcome<BoxDomain> {
		DivOutcome::Value(self.mul(other))
	}

	/// Only one dimensional boxes carry enough order to decide anything;
	/// everything else stays unknown.
	fn compare(&self, relation: Relation, other: &BoxDomain) -> Refinement<BoxDomain> {
		if self.is_bot() || other.is_bot() {
			return Refinement::none();
		}

		let single = |b: &BoxDomain| -> Option<(f64, f64)> {
			match &b.bounds {
				Some(bounds) if b.dimension == 1 => bounds.first().copied(),
				_ => None,
			}
		};
		let (Some((a_lo, a_hi)), Some((b_lo, b_hi))) = (single(self), single(other)) else {
			return Refinement::unknown(self.clone(), other.clone());
		};

		let mut result = Refinement::unknown(self.clone(), other.clone());
		match relation {
			Relation::Le => {
				if a_hi <= b_lo {
					result.when_false = None;
				}
				if a_lo > b_hi {
					result.when_true = None;
				}
			},
			Relation::Lt => {
				if a_hi < b_lo {
					result.when_false = None;
				}
				if a_lo >= b_hi {
					result.when_true = None;
				}
			},
			Relation::Eq => {
				if a_lo.max(b_lo) > a_hi.min(b_hi) {
					result.when_true = None;
				}
				if a_lo == a_hi && b_lo == b_hi && a_lo == b_lo {
					result.when_false = None;
				}
			},
			Relation::Ne => {
				let eq = self.compare(Relation::Eq, other);
				return Refinement { when_true: eq.when_false, when_false: eq.when_true };
			},
			Relation::Ge => return other.compare(Relation::Le, self).swap(),
			Relation::Gt => return other.compare(Relation::Lt, self).swap(),
		}
		result
	}

	fn i2s(&self) -> BoxDomain {
		self.clone()
	}
}

impl Display for BoxDomain {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		if self.is_bot() {
			return write!(f, "⊥poly");
		}
		let Some(bounds) = &self.bounds else {
			return write!(f, "⊤poly");
		};
		write!(f, "{{")?;
		for (i, (lo, hi)) in bounds.iter().enumerate() {
			if i > 0 {
				write!(f, ", ")?;
			}
			write!(f, "{lo}≤x{i}≤{hi}")?;
		}
		write!(f, "}}")
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::boxdom::BoxDomain;
	use crate::{Domain, Relation};

	#[test]
	fn abstraction() {
		assert_eq!(BoxDomain::abstracted([]), BoxDomain::bot());
		let b = BoxDomain::abstracted([vec![0.0, 1.0], vec![2.0, -1.0]]);
		assert_eq!(b, BoxDomain::from_bounds(vec![(0.0, 2.0), (-1.0, 1.0)]));
		assert!(b.contains(&vec![1.0, 0.0]));
		assert!(!b.contains(&vec![3.0, 0.0]));
		assert!(!b.contains(&vec![1.0]));
	}

	#[test]
	fn lattice_laws() {
		let a = BoxDomain::from_bounds(vec![(0.0, 1.0)]);
		let b = BoxDomain::from_bounds(vec![(0.5, 2.0)]);

		assert_eq!(a.join(&b), BoxDomain::from_bounds(vec![(0.0, 2.0)]));
		assert_eq!(a.join(&b), b.join(&a));
		assert_eq!(a.meet(&b), BoxDomain::from_bounds(vec![(0.5, 1.0)]));
		assert_eq!(a.join(&BoxDomain::bot()), a);
		assert!(BoxDomain::bot().le(&a));
		assert!(a.le(&BoxDomain::top()));
	}

	#[test]
	fn dimension_mismatch() {
		let one = BoxDomain::from_bounds(vec![(0.0, 1.0)]);
		let two = BoxDomain::from_bounds(vec![(0.0, 1.0), (5.0, 6.0)]);

		// join of mismatched dimensions gives up to the wider top
		let joined = one.join(&two);
		assert_eq!(joined, BoxDomain::top_of(2));
		assert_eq!(joined.dimension(), 2);

		// meet keeps the smaller box when the projection is exact
		assert_eq!(one.meet(&two), one);

		// an inexact projection collapses to top
		let clipped = BoxDomain::from_bounds(vec![(0.25, 0.75), (5.0, 6.0)]);
		assert_eq!(one.meet(&clipped), BoxDomain::top_of(2));

		// disjoint projections give bottom
		let apart = BoxDomain::from_bounds(vec![(9.0, 10.0)]);
		assert_eq!(apart.meet(&two), BoxDomain::bot_of(2));
	}

	#[test]
	fn arithmetic() {
		let a = BoxDomain::from_bounds(vec![(0.0, 1.0), (2.0, 3.0)]);
		let b = BoxDomain::from_bounds(vec![(1.0, 1.0), (-1.0, 0.0)]);

		assert_eq!(a.add(&b), BoxDomain::from_bounds(vec![(1.0, 2.0), (1.0, 3.0)]));
		assert_eq!(a.sub(&b), BoxDomain::from_bounds(vec![(-1.0, 0.0), (2.0, 4.0)]));
		assert_eq!(a.neg(), BoxDomain::from_bounds(vec![(-1.0, 0.0), (-3.0, -2.0)]));
		// multiplication collapses
		assert_eq!(a.mul(&b), BoxDomain::top_of(2));
	}

	#[test]
	fn comparisons() {
		let small = BoxDomain::from_bounds(vec![(0.0, 1.0)]);
		let large = BoxDomain::from_bounds(vec![(2.0, 3.0)]);

		let lt = small.compare(Relation::Lt, &large);
		assert!(lt.when_true.is_some());
		assert!(lt.when_false.is_none());

		let eq = small.compare(Relation::Eq, &large);
		assert!(eq.when_true.is_none());

		// multi dimensional boxes stay unknown
		let a = BoxDomain::from_bounds(vec![(0.0, 1.0), (0.0, 1.0)]);
		let unknown = a.compare(Relation::Le, &a);
		assert!(unknown.when_true.is_some());
		assert!(unknown.when_false.is_some());
	}
}

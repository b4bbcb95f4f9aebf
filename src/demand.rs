//! Demand: the subscriber-controlled budget of values a publisher may push.
//!
//! A `Demand` is either a bounded count or `Unlimited`. Adding two demands
//! saturates into `Unlimited`, and once a subscription has been granted
//! `Unlimited` it stays that way for the rest of its life.

use std::{
  fmt,
  ops::{Add, AddAssign},
};

/// How many more values a subscriber is willing to accept.
///
/// `Bounded(n)` orders before `Unlimited`, so `demand > Demand::max(k)` reads as
/// "there is room for more than `k` values".
///
/// ```rust
/// use rxflow::prelude::*;
///
/// let mut demand = Demand::max(2);
/// demand += Demand::max(3);
/// assert_eq!(demand, Demand::max(5));
///
/// demand += Demand::unlimited();
/// assert!(demand.is_unlimited());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Demand {
  Bounded(usize),
  Unlimited,
}

impl Demand {
  /// No further values.
  #[inline]
  pub const fn none() -> Self { Demand::Bounded(0) }

  /// At most `n` further values.
  #[inline]
  pub const fn max(n: usize) -> Self { Demand::Bounded(n) }

  /// Lift the limit for the rest of the subscription.
  #[inline]
  pub const fn unlimited() -> Self { Demand::Unlimited }

  #[inline]
  pub fn is_none(&self) -> bool { matches!(self, Demand::Bounded(0)) }

  #[inline]
  pub fn is_unlimited(&self) -> bool { matches!(self, Demand::Unlimited) }

  /// The bounded count, or `None` when unlimited.
  #[inline]
  pub fn as_bounded(&self) -> Option<usize> {
    match self {
      Demand::Bounded(n) => Some(*n),
      Demand::Unlimited => None,
    }
  }

  /// Remaining demand after `n` values were accounted for elsewhere.
  pub fn saturating_sub(self, n: usize) -> Demand {
    match self {
      Demand::Bounded(m) => Demand::Bounded(m.saturating_sub(n)),
      Demand::Unlimited => Demand::Unlimited,
    }
  }

  /// Takes one unit of demand for a value about to be delivered.
  ///
  /// Returns `false` when there is nothing left to take.
  pub(crate) fn consume_one(&mut self) -> bool {
    match self {
      Demand::Unlimited => true,
      Demand::Bounded(0) => false,
      Demand::Bounded(n) => {
        *n -= 1;
        true
      }
    }
  }
}

impl Default for Demand {
  fn default() -> Self { Demand::none() }
}

impl From<usize> for Demand {
  fn from(n: usize) -> Self { Demand::Bounded(n) }
}

impl Add for Demand {
  type Output = Demand;

  fn add(self, rhs: Demand) -> Demand {
    match (self, rhs) {
      (Demand::Bounded(a), Demand::Bounded(b)) => a.checked_add(b).map_or(Demand::Unlimited, Demand::Bounded),
      _ => Demand::Unlimited,
    }
  }
}

impl AddAssign for Demand {
  fn add_assign(&mut self, rhs: Demand) { *self = *self + rhs; }
}

impl fmt::Debug for Demand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Demand::Bounded(n) => write!(f, "max({n})"),
      Demand::Unlimited => f.write_str("unlimited"),
    }
  }
}

impl fmt::Display for Demand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Debug::fmt(self, f) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[rxflow_macro::test]
  fn add_saturates_into_unlimited() {
    assert_eq!(Demand::max(usize::MAX) + Demand::max(1), Demand::unlimited());
    assert_eq!(Demand::max(2) + Demand::unlimited(), Demand::unlimited());
    assert_eq!(Demand::max(2) + Demand::max(3), Demand::max(5));
  }

  #[rxflow_macro::test]
  fn bounded_orders_before_unlimited() {
    assert!(Demand::unlimited() > Demand::max(usize::MAX));
    assert!(Demand::max(1) > Demand::none());
    assert!(Demand::none().is_none());
  }

  #[rxflow_macro::test]
  fn consume_one_stops_at_zero() {
    let mut demand = Demand::max(1);
    assert!(demand.consume_one());
    assert!(!demand.consume_one());
    assert_eq!(demand, Demand::none());

    let mut unlimited = Demand::unlimited();
    for _ in 0..10 {
      assert!(unlimited.consume_one());
    }
    assert!(unlimited.is_unlimited());
  }

  #[rxflow_macro::test]
  fn saturating_sub_keeps_unlimited() {
    assert_eq!(Demand::max(3).saturating_sub(5), Demand::none());
    assert_eq!(Demand::unlimited().saturating_sub(5), Demand::unlimited());
    assert_eq!(format!("{}", Demand::max(4)), "max(4)");
  }
}

use std::convert::Infallible;

use super::Subscriber;
use crate::{demand::Demand, published::Published, subscription::SubscriptionRef};

/// Writes every value it receives into a [`Published`] cell.
///
/// Created by [`assign`](crate::ops::PublisherExt::assign). Requests unlimited
/// demand; completion leaves the last written value in place.
pub struct Assign<T> {
  target: Published<T>,
}

impl<T> Assign<T> {
  pub fn new(target: Published<T>) -> Self { Assign { target } }
}

impl<T> Subscriber<T, Infallible> for Assign<T>
where
  T: Clone + Send + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { subscription.request(Demand::unlimited()) }

  fn on_value(&mut self, value: T) -> Demand {
    self.target.set(value);
    Demand::none()
  }

  fn on_completed(&mut self) {}

  fn on_failed(&mut self, err: Infallible) { match err {} }
}

//! Subscriber trait and the terminal event types
//!
//! A Subscriber is the consuming end of a chain. It receives exactly one
//! `on_subscribe`, then values as long as it keeps granting demand, then at
//! most one terminal event.

use crate::{demand::Demand, subscription::SubscriptionRef};

mod assign;
#[cfg(test)]
pub(crate) mod recorder;
mod sink;

pub use assign::Assign;
pub use sink::Sink;

/// How a subscription ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Completion<E> {
  Completed,
  Failed(E),
}

impl<E> Completion<E> {
  #[inline]
  pub fn is_failed(&self) -> bool { matches!(self, Completion::Failed(_)) }

  pub fn map_err<F>(self, f: impl FnOnce(E) -> F) -> Completion<F> {
    match self {
      Completion::Completed => Completion::Completed,
      Completion::Failed(e) => Completion::Failed(f(e)),
    }
  }
}

/// Everything a subscriber can observe on one subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event<T, E> {
  Value(T),
  Completed,
  Failed(E),
}

impl<T, E> From<Completion<E>> for Event<T, E> {
  fn from(completion: Completion<E>) -> Self {
    match completion {
      Completion::Completed => Event::Completed,
      Completion::Failed(e) => Event::Failed(e),
    }
  }
}

/// Subscriber trait: the consumer side of a publisher.
///
/// Callbacks are serialized per subscription: no two of them run at the same
/// time, although consecutive calls may happen on different threads.
pub trait Subscriber<Item, Err>: Send + 'static {
  /// Receive the subscription. This is where initial demand is requested;
  /// a subscriber that never requests leaves the chain stalled.
  fn on_subscribe(&mut self, subscription: SubscriptionRef);

  /// Receive one value. A non-zero return adds to the outstanding demand, as
  /// if `request` had been called.
  fn on_value(&mut self, value: Item) -> Demand;

  /// The publisher finished normally.
  fn on_completed(&mut self);

  /// The publisher failed. No further events follow.
  fn on_failed(&mut self, err: Err);

  fn on_completion(&mut self, completion: Completion<Err>) {
    match completion {
      Completion::Completed => self.on_completed(),
      Completion::Failed(err) => self.on_failed(err),
    }
  }
}

/// Type-erased subscriber, used wherever a node has to store its downstream.
pub type BoxedSubscriber<Item, Err> = Box<dyn Subscriber<Item, Err>>;

impl<Item: 'static, Err: 'static> Subscriber<Item, Err> for BoxedSubscriber<Item, Err> {
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { (**self).on_subscribe(subscription) }

  #[inline]
  fn on_value(&mut self, value: Item) -> Demand { (**self).on_value(value) }

  #[inline]
  fn on_completed(&mut self) { (**self).on_completed() }

  #[inline]
  fn on_failed(&mut self, err: Err) { (**self).on_failed(err) }

  #[inline]
  fn on_completion(&mut self, completion: Completion<Err>) { (**self).on_completion(completion) }
}

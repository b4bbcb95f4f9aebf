use super::{Completion, Subscriber};
use crate::{demand::Demand, subscription::SubscriptionRef};

/// Closure-backed subscriber.
///
/// By default a sink asks for unlimited demand. `with_demand` switches it to
/// an explicit budget: `initial` is requested on subscribe and `refill` is
/// granted again after every value.
///
/// ```rust
/// use std::sync::{Arc, Mutex};
///
/// use rxflow::prelude::*;
///
/// let seen = Arc::new(Mutex::new(vec![]));
/// let c = seen.clone();
/// from_iter(1..=5).subscribe(
///   Sink::new(move |v| c.lock().unwrap().push(v), |_: Completion<_>| {}).with_demand(2, 0),
/// );
/// assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
/// ```
pub struct Sink<N, C> {
  on_value: N,
  on_completion: Option<C>,
  initial: Demand,
  refill: Demand,
}

impl<N, C> Sink<N, C> {
  pub fn new(on_value: N, on_completion: C) -> Self {
    Sink {
      on_value,
      on_completion: Some(on_completion),
      initial: Demand::unlimited(),
      refill: Demand::none(),
    }
  }

  /// Request `initial` values up front and `refill` more after each value.
  pub fn with_demand(mut self, initial: usize, refill: usize) -> Self {
    self.initial = Demand::max(initial);
    self.refill = Demand::max(refill);
    self
  }
}

impl<Item, Err, N, C> Subscriber<Item, Err> for Sink<N, C>
where
  N: FnMut(Item) + Send + 'static,
  C: FnOnce(Completion<Err>) + Send + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    if !self.initial.is_none() {
      subscription.request(self.initial);
    }
  }

  fn on_value(&mut self, value: Item) -> Demand {
    (self.on_value)(value);
    self.refill
  }

  fn on_completed(&mut self) { self.finish(Completion::Completed) }

  fn on_failed(&mut self, err: Err) { self.finish(Completion::Failed(err)) }
}

impl<N, C> Sink<N, C> {
  fn finish<Err>(&mut self, completion: Completion<Err>)
  where
    C: FnOnce(Completion<Err>),
  {
    if let Some(f) = self.on_completion.take() {
      f(completion);
    }
  }
}

use crate::{
  demand::Demand, publisher::Publisher, subscriber::Subscriber, subscription::SubscriptionRef,
};

/// Publisher returned by [`map_err`](crate::ops::PublisherExt::map_err) and
/// [`set_failure_type`](crate::ops::PublisherExt::set_failure_type).
#[derive(Clone)]
pub struct MapErr<P, F> {
  pub(crate) source: P,
  pub(crate) func: F,
}

impl<P, F, E2> Publisher for MapErr<P, F>
where
  P: Publisher,
  F: FnOnce(P::Err) -> E2 + Send + 'static,
  E2: Send + 'static,
{
  type Item = P::Item;
  type Err = E2;

  fn actual_subscribe<S: Subscriber<P::Item, E2>>(self, subscriber: S) {
    self
      .source
      .actual_subscribe(MapErrSubscriber { downstream: subscriber, func: Some(self.func) })
  }
}

pub struct MapErrSubscriber<S, F> {
  downstream: S,
  func: Option<F>,
}

impl<S, F, Item, Err, E2> Subscriber<Item, Err> for MapErrSubscriber<S, F>
where
  S: Subscriber<Item, E2>,
  F: FnOnce(Err) -> E2 + Send + 'static,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.downstream.on_subscribe(subscription) }

  #[inline]
  fn on_value(&mut self, value: Item) -> Demand { self.downstream.on_value(value) }

  #[inline]
  fn on_completed(&mut self) { self.downstream.on_completed() }

  fn on_failed(&mut self, err: Err) {
    if let Some(func) = self.func.take() {
      self.downstream.on_failed(func(err));
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::{prelude::*, subscriber::recorder::Recorder};

  #[rxflow_macro::test]
  fn converts_the_failure() {
    let recorder = Recorder::<i32, String>::unlimited();
    fail::<i32, _>(404).map_err(|code: i32| format!("status {code}")).subscribe(recorder.clone());
    assert_eq!(recorder.failure(), Some("status 404".to_string()));
  }

  #[rxflow_macro::test]
  fn values_are_untouched() {
    let recorder = Recorder::<i32, String>::unlimited();
    from_iter([1, 2]).set_failure_type::<String>().subscribe(recorder.clone());
    assert_eq!(recorder.events(), vec![Event::Value(1), Event::Value(2), Event::Completed]);
  }

  #[rxflow_macro::test]
  fn set_failure_type_enables_merging_with_fallible_sources() {
    let recorder = Recorder::<i32, &str>::unlimited();
    just(1).set_failure_type::<&str>().merge(fail("late")).subscribe(recorder.clone());
    assert_eq!(recorder.events(), vec![Event::Value(1), Event::Failed("late")]);
  }
}

use std::{fmt::Debug, sync::Arc};

use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::{Subscription, SubscriptionRef},
};

type Hook = Option<Arc<dyn Fn() + Send + Sync>>;

/// Side-effect callbacks for [`handle_events`](crate::ops::PublisherExt::handle_events).
///
/// Every hook is optional. Hooks observe; they cannot change what flows
/// through the chain.
///
/// ```rust
/// use std::sync::{
///   atomic::{AtomicUsize, Ordering},
///   Arc,
/// };
///
/// use rxflow::prelude::*;
///
/// let seen = Arc::new(AtomicUsize::new(0));
/// let c = seen.clone();
/// from_iter(0..3)
///   .handle_events(EventHooks::new().on_value(move |_: &i32| {
///     c.fetch_add(1, Ordering::Relaxed);
///   }))
///   .sink(|_| {});
/// assert_eq!(seen.load(Ordering::Relaxed), 3);
/// ```
pub struct EventHooks<T, E> {
  subscribe: Hook,
  value: Option<Arc<dyn Fn(&T) + Send + Sync>>,
  completion: Option<Arc<dyn Fn(&Completion<E>) + Send + Sync>>,
  cancel: Hook,
  request: Option<Arc<dyn Fn(Demand) + Send + Sync>>,
}

impl<T, E> Clone for EventHooks<T, E> {
  fn clone(&self) -> Self {
    EventHooks {
      subscribe: self.subscribe.clone(),
      value: self.value.clone(),
      completion: self.completion.clone(),
      cancel: self.cancel.clone(),
      request: self.request.clone(),
    }
  }
}

impl<T, E> Default for EventHooks<T, E> {
  fn default() -> Self { EventHooks { subscribe: None, value: None, completion: None, cancel: None, request: None } }
}

impl<T, E> EventHooks<T, E> {
  pub fn new() -> Self { Self::default() }

  pub fn on_subscribe(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
    self.subscribe = Some(Arc::new(f));
    self
  }

  pub fn on_value(mut self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
    self.value = Some(Arc::new(f));
    self
  }

  pub fn on_completion(mut self, f: impl Fn(&Completion<E>) + Send + Sync + 'static) -> Self {
    self.completion = Some(Arc::new(f));
    self
  }

  pub fn on_cancel(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
    self.cancel = Some(Arc::new(f));
    self
  }

  pub fn on_request(mut self, f: impl Fn(Demand) + Send + Sync + 'static) -> Self {
    self.request = Some(Arc::new(f));
    self
  }

  fn watches_subscription(&self) -> bool { self.cancel.is_some() || self.request.is_some() }
}

impl<T: Debug, E: Debug> EventHooks<T, E> {
  /// Hooks that record every event through `tracing` at debug level, prefixed
  /// with `label`.
  pub fn logging(label: impl Into<String>) -> Self {
    let label: Arc<str> = Arc::from(label.into());
    let (l1, l2, l3, l4, l5) = (label.clone(), label.clone(), label.clone(), label.clone(), label);
    EventHooks::new()
      .on_subscribe(move || tracing::debug!(label = %l1, "receive subscription"))
      .on_value(move |v| tracing::debug!(label = %l2, value = ?v, "receive value"))
      .on_completion(move |c| match c {
        Completion::Completed => tracing::debug!(label = %l3, "receive finished"),
        Completion::Failed(err) => tracing::debug!(label = %l3, error = ?err, "receive failure"),
      })
      .on_cancel(move || tracing::debug!(label = %l4, "receive cancel"))
      .on_request(move |d| tracing::debug!(label = %l5, demand = %d, "request"))
  }
}

/// Publisher returned by
/// [`handle_events`](crate::ops::PublisherExt::handle_events) and
/// [`log_events`](crate::ops::PublisherExt::log_events).
pub struct HandleEvents<P: Publisher> {
  pub(crate) source: P,
  pub(crate) hooks: EventHooks<P::Item, P::Err>,
}

impl<P: Publisher + Clone> Clone for HandleEvents<P> {
  fn clone(&self) -> Self { HandleEvents { source: self.source.clone(), hooks: self.hooks.clone() } }
}

impl<P: Publisher> Publisher for HandleEvents<P> {
  type Item = P::Item;
  type Err = P::Err;

  fn actual_subscribe<S: Subscriber<P::Item, P::Err>>(self, subscriber: S) {
    self
      .source
      .actual_subscribe(HandleEventsSubscriber { downstream: subscriber, hooks: self.hooks })
  }
}

pub struct HandleEventsSubscriber<S, T, E> {
  downstream: S,
  hooks: EventHooks<T, E>,
}

/// Reports `request` and `cancel` to the hooks before passing them upstream.
struct WatchedSubscription<T, E> {
  upstream: SubscriptionRef,
  hooks: EventHooks<T, E>,
}

impl<T, E> Subscription for WatchedSubscription<T, E> {
  fn request(&self, demand: Demand) {
    if let Some(hook) = &self.hooks.request {
      hook(demand);
    }
    self.upstream.request(demand);
  }

  fn cancel(&self) {
    if let Some(hook) = &self.hooks.cancel {
      hook();
    }
    self.upstream.cancel();
  }
}

impl<S, T, E> Subscriber<T, E> for HandleEventsSubscriber<S, T, E>
where
  S: Subscriber<T, E>,
  T: Send + 'static,
  E: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    if let Some(hook) = &self.hooks.subscribe {
      hook();
    }
    let subscription = if self.hooks.watches_subscription() {
      Arc::new(WatchedSubscription { upstream: subscription, hooks: self.hooks.clone() })
    } else {
      subscription
    };
    self.downstream.on_subscribe(subscription);
  }

  fn on_value(&mut self, value: T) -> Demand {
    if let Some(hook) = &self.hooks.value {
      hook(&value);
    }
    self.downstream.on_value(value)
  }

  fn on_completed(&mut self) {
    if let Some(hook) = &self.hooks.completion {
      hook(&Completion::Completed);
    }
    self.downstream.on_completed()
  }

  fn on_failed(&mut self, err: E) {
    let completion = Completion::Failed(err);
    if let Some(hook) = &self.hooks.completion {
      hook(&completion);
    }
    self.downstream.on_completion(completion)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use crate::{prelude::*, subscriber::recorder::Recorder};

  fn journal() -> (Arc<Mutex<Vec<String>>>, EventHooks<i32, &'static str>) {
    let log = Arc::new(Mutex::new(vec![]));
    let (a, b, c, d, e) = (log.clone(), log.clone(), log.clone(), log.clone(), log.clone());
    let hooks = EventHooks::new()
      .on_subscribe(move || a.lock().unwrap().push("subscribe".to_string()))
      .on_value(move |v| b.lock().unwrap().push(format!("value {v}")))
      .on_completion(move |done| d.lock().unwrap().push(format!("{done:?}")))
      .on_cancel(move || e.lock().unwrap().push("cancel".to_string()))
      .on_request(move |demand| c.lock().unwrap().push(format!("request {demand}")));
    (log, hooks)
  }

  #[rxflow_macro::test]
  fn lifecycle_in_order() {
    let (log, hooks) = journal();
    from_iter([1, 2]).set_failure_type::<&str>().handle_events(hooks).sink(|_| {});
    assert_eq!(*log.lock().unwrap(), vec![
      "subscribe",
      "request unlimited",
      "value 1",
      "value 2",
      "Completed"
    ]);
  }

  #[rxflow_macro::test]
  fn cancel_is_observed() {
    let (log, hooks) = journal();
    let recorder = Recorder::with_demand(Demand::max(1));
    never::<i32, &str>().handle_events(hooks).subscribe(recorder.clone());
    recorder.cancel();
    assert_eq!(*log.lock().unwrap(), vec!["subscribe", "request max(1)", "cancel"]);
  }

  #[rxflow_macro::test]
  fn failure_is_observed_and_forwarded() {
    let (log, hooks) = journal();
    let recorder = Recorder::unlimited();
    fail::<i32, _>("boom").handle_events(hooks).subscribe(recorder.clone());
    assert_eq!(recorder.failure(), Some("boom"));
    assert_eq!(log.lock().unwrap().last().cloned(), Some("Failed(\"boom\")".to_string()));
  }

  #[rxflow_macro::test]
  fn log_events_passes_values_through() {
    let recorder = Recorder::unlimited();
    from_iter(1..=3).log_events("numbers").subscribe(recorder.clone());
    assert_eq!(recorder.values(), vec![1, 2, 3]);
  }
}

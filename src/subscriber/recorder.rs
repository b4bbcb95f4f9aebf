use std::sync::{Arc, Mutex};

use super::{Event, Subscriber};
use crate::{demand::Demand, subscription::SubscriptionRef};

/// Test subscriber that records every event and lets the test drive demand.
pub(crate) struct Recorder<T, E> {
  shared: Arc<Mutex<Recording<T, E>>>,
  initial: Demand,
}

struct Recording<T, E> {
  events: Vec<Event<T, E>>,
  subscription: Option<SubscriptionRef>,
  subscribed: usize,
}

impl<T, E> Clone for Recorder<T, E> {
  fn clone(&self) -> Self { Recorder { shared: self.shared.clone(), initial: self.initial } }
}

impl<T, E> Recorder<T, E> {
  pub(crate) fn unlimited() -> Self { Self::with_demand(Demand::unlimited()) }

  pub(crate) fn with_demand(initial: Demand) -> Self {
    Recorder {
      shared: Arc::new(Mutex::new(Recording { events: vec![], subscription: None, subscribed: 0 })),
      initial,
    }
  }

  pub(crate) fn request(&self, n: usize) {
    let subscription = self.shared.lock().unwrap().subscription.clone();
    if let Some(subscription) = subscription {
      subscription.request(Demand::max(n));
    }
  }

  pub(crate) fn cancel(&self) {
    let subscription = self.shared.lock().unwrap().subscription.clone();
    if let Some(subscription) = subscription {
      subscription.cancel();
    }
  }

  pub(crate) fn subscribed(&self) -> usize { self.shared.lock().unwrap().subscribed }

  pub(crate) fn is_completed(&self) -> bool {
    matches!(self.shared.lock().unwrap().events.last(), Some(Event::Completed))
  }
}

impl<T: Clone, E: Clone> Recorder<T, E> {
  pub(crate) fn events(&self) -> Vec<Event<T, E>> { self.shared.lock().unwrap().events.clone() }

  pub(crate) fn values(&self) -> Vec<T> {
    let shared = self.shared.lock().unwrap();
    shared
      .events
      .iter()
      .filter_map(|e| match e {
        Event::Value(v) => Some(v.clone()),
        _ => None,
      })
      .collect()
  }

  pub(crate) fn failure(&self) -> Option<E> {
    match self.shared.lock().unwrap().events.last() {
      Some(Event::Failed(e)) => Some(e.clone()),
      _ => None,
    }
  }
}

impl<T, E> Subscriber<T, E> for Recorder<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    {
      let mut shared = self.shared.lock().unwrap();
      shared.subscribed += 1;
      shared.subscription = Some(subscription.clone());
    }
    if !self.initial.is_none() {
      subscription.request(self.initial);
    }
  }

  fn on_value(&mut self, value: T) -> Demand {
    self.shared.lock().unwrap().events.push(Event::Value(value));
    Demand::none()
  }

  fn on_completed(&mut self) { self.shared.lock().unwrap().events.push(Event::Completed); }

  fn on_failed(&mut self, err: E) { self.shared.lock().unwrap().events.push(Event::Failed(err)); }
}

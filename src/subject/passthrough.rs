use std::fmt;

use super::SubjectCore;
use crate::{
  pipeline,
  publisher::Publisher,
  relay::Backpressure,
  subscriber::{Completion, Subscriber},
  subscription::CancellationToken,
};

/// Broadcasts every value to the subscribers present at the time of `send`.
///
/// Nothing is replayed. A subscriber without outstanding demand misses the
/// value. Clones share the same subscribers.
pub struct PassthroughSubject<T, E> {
  core: SubjectCore<T, E>,
}

impl<T, E> Clone for PassthroughSubject<T, E> {
  fn clone(&self) -> Self { PassthroughSubject { core: self.core.clone() } }
}

impl<T, E> PassthroughSubject<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  pub fn new() -> Self { PassthroughSubject { core: SubjectCore::new(Backpressure::Drop, None) } }

  pub fn send(&self, value: T) { self.core.send(value) }

  /// End every subscription. Later sends are ignored.
  pub fn send_completion(&self, completion: Completion<E>) { self.core.send_completion(completion) }

  /// Number of live subscriptions.
  pub fn subscriber_count(&self) -> usize { self.core.subscriber_count() }

  /// Feed everything `publisher` emits into this subject.
  pub fn subscribe_to<P>(&self, publisher: P) -> CancellationToken
  where
    P: Publisher<Item = T, Err = E>,
  {
    pipeline::subscribe(publisher, self.clone())
  }
}

impl<T, E> Default for PassthroughSubject<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  fn default() -> Self { Self::new() }
}

impl<T, E> fmt::Debug for PassthroughSubject<T, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("PassthroughSubject") }
}

impl<T, E> Publisher for PassthroughSubject<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  type Item = T;
  type Err = E;

  fn actual_subscribe<S: Subscriber<T, E>>(self, subscriber: S) { self.core.add(subscriber) }
}

impl_subject_subscriber!(PassthroughSubject);

#[cfg(test)]
mod tests {
  use crate::{prelude::*, subscriber::recorder::Recorder};

  #[rxflow_macro::test]
  fn broadcasts_in_subscription_order() {
    let subject = PassthroughSubject::<i32, Infallible>::new();
    let order = std::sync::Arc::new(std::sync::Mutex::new(vec![]));
    for name in ["a", "b"] {
      let order = order.clone();
      subject.clone().sink(move |v| order.lock().unwrap().push((name, v)));
    }
    subject.send(1);
    assert_eq!(*order.lock().unwrap(), vec![("a", 1), ("b", 1)]);
  }

  #[rxflow_macro::test]
  fn late_subscriber_sees_only_later_values() {
    let subject = PassthroughSubject::<i32, Infallible>::new();
    let early = Recorder::unlimited();
    subject.clone().subscribe(early.clone());
    subject.send(1);
    let late = Recorder::unlimited();
    subject.clone().subscribe(late.clone());
    subject.send(2);
    assert_eq!(early.values(), vec![1, 2]);
    assert_eq!(late.values(), vec![2]);
  }

  #[rxflow_macro::test]
  fn values_without_demand_are_dropped() {
    let subject = PassthroughSubject::<i32, Infallible>::new();
    let recorder = Recorder::with_demand(Demand::max(1));
    subject.clone().subscribe(recorder.clone());
    subject.send(1);
    subject.send(2);
    recorder.request(1);
    assert_eq!(recorder.values(), vec![1]);
    subject.send(3);
    assert_eq!(recorder.values(), vec![1, 3]);
  }

  #[rxflow_macro::test]
  fn completion_is_terminal_and_replayed() {
    let subject = PassthroughSubject::<i32, &str>::new();
    let before = Recorder::unlimited();
    subject.clone().subscribe(before.clone());
    subject.send_completion(Completion::Failed("closed"));
    subject.send(1);
    subject.send_completion(Completion::Completed);
    assert_eq!(before.events(), vec![Event::Failed("closed")]);

    let after = Recorder::unlimited();
    subject.clone().subscribe(after.clone());
    assert_eq!(after.events(), vec![Event::Failed("closed")]);
    assert_eq!(subject.subscriber_count(), 0);
  }

  #[rxflow_macro::test]
  fn cancel_removes_the_subscriber() {
    let subject = PassthroughSubject::<i32, Infallible>::new();
    let recorder = Recorder::unlimited();
    let token = subject.clone().subscribe(recorder.clone());
    assert_eq!(subject.subscriber_count(), 1);
    token.cancel();
    assert_eq!(subject.subscriber_count(), 0);
    subject.send(1);
    assert!(recorder.values().is_empty());
  }

  #[rxflow_macro::test]
  fn unsubscribing_mid_fan_out_drops_the_pending_copy() {
    let subject = PassthroughSubject::<i32, Infallible>::new();
    let second = Recorder::unlimited();
    let victim = second.clone();
    subject.clone().sink(move |_| victim.cancel());
    subject.clone().subscribe(second.clone());
    subject.send(1);
    assert!(second.values().is_empty());
    assert_eq!(subject.subscriber_count(), 1);
  }

  #[rxflow_macro::test]
  fn subject_as_subscriber() {
    let subject = PassthroughSubject::<i32, Infallible>::new();
    let recorder = Recorder::unlimited();
    subject.clone().subscribe(recorder.clone());
    subject.subscribe_to(from_iter([1, 2, 3]));
    assert_eq!(recorder.events(), vec![
      Event::Value(1),
      Event::Value(2),
      Event::Value(3),
      Event::Completed
    ]);
  }

  #[rxflow_macro::test]
  fn send_from_many_threads() {
    let subject = PassthroughSubject::<usize, Infallible>::new();
    let recorder = Recorder::unlimited();
    subject.clone().subscribe(recorder.clone());
    let handles: Vec<_> = (0..4)
      .map(|t| {
        let subject = subject.clone();
        std::thread::spawn(move || {
          for i in 0..100 {
            subject.send(t * 100 + i);
          }
        })
      })
      .collect();
    for handle in handles {
      handle.join().unwrap();
    }
    let mut values = recorder.values();
    assert_eq!(values.len(), 400);
    values.sort();
    assert_eq!(values, (0..400).collect::<Vec<_>>());
  }
}

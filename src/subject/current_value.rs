use std::fmt;

use super::SubjectCore;
use crate::{
  pipeline,
  publisher::Publisher,
  relay::Backpressure,
  subscriber::{Completion, Subscriber},
  subscription::CancellationToken,
};

/// Holds a current value, replays it on subscribe and broadcasts every
/// update.
///
/// The stored value changes before the fan-out, so a subscriber reading
/// [`value`](CurrentValueSubject::value) from inside its callback sees the
/// value it is being handed. A subscriber without outstanding demand keeps
/// only the newest value.
///
/// ```rust
/// use std::sync::{Arc, Mutex};
///
/// use rxflow::prelude::*;
///
/// let temperature = CurrentValueSubject::<i32, Infallible>::new(20);
/// temperature.send(21);
///
/// let seen = Arc::new(Mutex::new(vec![]));
/// let c = seen.clone();
/// temperature.clone().sink(move |v| c.lock().unwrap().push(v));
/// temperature.send(22);
/// assert_eq!(*seen.lock().unwrap(), vec![21, 22]);
/// assert_eq!(temperature.value(), 22);
/// ```
pub struct CurrentValueSubject<T, E> {
  core: SubjectCore<T, E>,
}

impl<T, E> Clone for CurrentValueSubject<T, E> {
  fn clone(&self) -> Self { CurrentValueSubject { core: self.core.clone() } }
}

impl<T, E> CurrentValueSubject<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  pub fn new(initial: T) -> Self {
    CurrentValueSubject { core: SubjectCore::new(Backpressure::Latest, Some(initial)) }
  }

  /// The current value. It keeps the last value sent even after completion.
  pub fn value(&self) -> T {
    match self.core.current() {
      Some(value) => value,
      None => unreachable!("a current-value subject always holds a value"),
    }
  }

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

impl<T, E> fmt::Debug for CurrentValueSubject<T, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CurrentValueSubject").finish_non_exhaustive()
  }
}

impl<T, E> Publisher for CurrentValueSubject<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  type Item = T;
  type Err = E;

  fn actual_subscribe<S: Subscriber<T, E>>(self, subscriber: S) { self.core.add(subscriber) }
}

impl_subject_subscriber!(CurrentValueSubject);

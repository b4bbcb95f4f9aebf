use std::{fmt, marker::PhantomData};

use crate::{
  publisher::Publisher,
  relay::{Backpressure, Relay},
  subscriber::{Completion, Subscriber},
};

/// Completes immediately without emitting any values.
pub struct Empty<T, E>(PhantomData<fn() -> (T, E)>);

/// Never emits and never terminates.
pub struct Never<T, E>(PhantomData<fn() -> (T, E)>);

/// Fails immediately with the given error.
pub struct Fail<T, E> {
  error: E,
  _marker: PhantomData<fn() -> T>,
}

impl<T, E> Empty<T, E> {
  pub(crate) fn new() -> Self { Empty(PhantomData) }
}

impl<T, E> Never<T, E> {
  pub(crate) fn new() -> Self { Never(PhantomData) }
}

impl<T, E> Fail<T, E> {
  pub(crate) fn new(error: E) -> Self { Fail { error, _marker: PhantomData } }
}

impl<T, E> Clone for Empty<T, E> {
  fn clone(&self) -> Self { Empty::new() }
}

impl<T, E> Clone for Never<T, E> {
  fn clone(&self) -> Self { Never::new() }
}

impl<T, E: Clone> Clone for Fail<T, E> {
  fn clone(&self) -> Self { Fail::new(self.error.clone()) }
}

impl<T, E> fmt::Debug for Empty<T, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("Empty") }
}

impl<T, E> fmt::Debug for Never<T, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("Never") }
}

fn terminate<T, E, S>(subscriber: S, completion: Option<Completion<E>>)
where
  T: Send + 'static,
  E: Send + 'static,
  S: Subscriber<T, E>,
{
  let relay = Relay::new(subscriber, Backpressure::Buffer);
  if let Some(completion) = completion {
    relay.enqueue_completion(completion);
  }
  relay.start_self();
}

impl<T, E> Publisher for Empty<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  type Item = T;
  type Err = E;

  fn actual_subscribe<S: Subscriber<T, E>>(self, subscriber: S) {
    terminate(subscriber, Some(Completion::Completed))
  }
}

impl<T, E> Publisher for Never<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  type Item = T;
  type Err = E;

  fn actual_subscribe<S: Subscriber<T, E>>(self, subscriber: S) { terminate(subscriber, None) }
}

impl<T, E> Publisher for Fail<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  type Item = T;
  type Err = E;

  fn actual_subscribe<S: Subscriber<T, E>>(self, subscriber: S) {
    terminate(subscriber, Some(Completion::Failed(self.error)))
  }
}

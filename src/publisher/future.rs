use std::sync::{Arc, Mutex};

use crate::{
  publisher::Publisher,
  relay::{Backpressure, Relay},
  subscriber::{Completion, Subscriber},
};

/// A single result produced eagerly and replayed to every subscriber.
///
/// The producing closure runs when the publisher is created, not on
/// subscribe. Subscribers that arrive before the result wait for it; later
/// ones receive the cached result right away.
pub struct EagerFuture<T, E> {
  shared: Arc<Mutex<FutureState<T, E>>>,
}

struct FutureState<T, E> {
  result: Option<Result<T, E>>,
  waiting: Vec<Relay<T, E>>,
}

impl<T, E> Clone for EagerFuture<T, E> {
  fn clone(&self) -> Self { EagerFuture { shared: self.shared.clone() } }
}

/// Completes an [`EagerFuture`]. Only the first resolution counts.
pub struct Promise<T, E> {
  shared: Arc<Mutex<FutureState<T, E>>>,
}

impl<T, E> EagerFuture<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  pub(crate) fn new(f: impl FnOnce(Promise<T, E>)) -> Self {
    let shared = Arc::new(Mutex::new(FutureState { result: None, waiting: vec![] }));
    f(Promise { shared: shared.clone() });
    EagerFuture { shared }
  }
}

fn deliver<T, E>(relay: &Relay<T, E>, result: Result<T, E>)
where
  T: Send + 'static,
  E: Send + 'static,
{
  match result {
    Ok(value) => {
      relay.enqueue(value);
      relay.enqueue_completion(Completion::Completed);
    }
    Err(err) => relay.enqueue_completion(Completion::Failed(err)),
  }
}

impl<T, E> Promise<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  pub fn resolve(self, result: Result<T, E>) {
    let waiting = {
      let mut state = self.shared.lock().unwrap();
      if state.result.is_some() {
        return;
      }
      state.result = Some(result.clone());
      std::mem::take(&mut state.waiting)
    };
    for relay in waiting {
      deliver(&relay, result.clone());
      relay.drain();
    }
  }
}

impl<T, E> Publisher for EagerFuture<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  type Item = T;
  type Err = E;

  fn actual_subscribe<S: Subscriber<T, E>>(self, subscriber: S) {
    let relay = Relay::new(subscriber, Backpressure::Buffer);
    {
      let mut state = self.shared.lock().unwrap();
      match &state.result {
        Some(result) => deliver(&relay, result.clone()),
        None => {
          state.waiting.retain(|r| !r.is_closed());
          state.waiting.push(relay.clone());
        }
      }
    }
    relay.start_self();
  }
}

use std::{
  marker::PhantomData,
  sync::{Arc, Mutex},
};

use crate::{
  demand::Demand,
  publisher::Publisher,
  relay::{Backpressure, Relay},
  subscriber::{Completion, Subscriber},
  subscription::Subscription,
};

type Teardown = Box<dyn FnOnce() + Send>;

/// Publisher driven by a user closure.
///
/// The closure runs once per subscription, after the subscriber received its
/// subscription, and gets an [`Emitter`] it may keep, clone, or move to other
/// threads.
pub struct Create<F, T, E> {
  f: F,
  _marker: PhantomData<fn() -> (T, E)>,
}

impl<F, T, E> Create<F, T, E> {
  pub(crate) fn new(f: F) -> Self { Create { f, _marker: PhantomData } }
}

impl<F: Clone, T, E> Clone for Create<F, T, E> {
  fn clone(&self) -> Self { Create::new(self.f.clone()) }
}

/// Push handle given to a [`create`](crate::factory::create) closure.
///
/// Values sent before the subscriber asked for them are buffered. Everything
/// sent after a terminal event or after cancellation is ignored.
pub struct Emitter<T, E> {
  relay: Relay<T, E>,
  hook: Arc<Mutex<CancelHook>>,
}

#[derive(Default)]
struct CancelHook {
  cancelled: bool,
  teardown: Option<Teardown>,
}

impl<T, E> Clone for Emitter<T, E> {
  fn clone(&self) -> Self { Emitter { relay: self.relay.clone(), hook: self.hook.clone() } }
}

impl<T, E> Emitter<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  pub fn next(&self, value: T) { self.relay.push(value); }

  pub fn error(&self, err: E) { self.relay.complete(Completion::Failed(err)); }

  pub fn complete(&self) { self.relay.complete(Completion::Completed); }

  /// `true` once nothing sent through this emitter can reach the subscriber
  /// anymore.
  pub fn is_closed(&self) -> bool { self.relay.is_closed() }

  /// Demand the subscriber granted that is not yet covered by sent values.
  pub fn demand(&self) -> Demand { self.relay.unfulfilled() }

  /// Run `teardown` when the subscriber cancels. Runs right away if it
  /// already did.
  pub fn on_cancel(&self, teardown: impl FnOnce() + Send + 'static) {
    let mut hook = self.hook.lock().unwrap();
    if hook.cancelled {
      drop(hook);
      teardown();
    } else {
      hook.teardown = Some(Box::new(teardown));
    }
  }
}

struct CreateSubscription<T, E> {
  relay: Relay<T, E>,
  hook: Arc<Mutex<CancelHook>>,
}

impl<T, E> Subscription for CreateSubscription<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn request(&self, demand: Demand) { self.relay.request(demand) }

  fn cancel(&self) {
    self.relay.cancel();
    let teardown = {
      let mut hook = self.hook.lock().unwrap();
      hook.cancelled = true;
      hook.teardown.take()
    };
    if let Some(teardown) = teardown {
      teardown();
    }
  }
}

impl<F, T, E> Publisher for Create<F, T, E>
where
  F: FnOnce(Emitter<T, E>) + Send + 'static,
  T: Send + 'static,
  E: Send + 'static,
{
  type Item = T;
  type Err = E;

  fn actual_subscribe<S: Subscriber<T, E>>(self, subscriber: S) {
    let relay = Relay::new(subscriber, Backpressure::Buffer);
    let hook = Arc::new(Mutex::new(CancelHook::default()));
    relay.start(Arc::new(CreateSubscription { relay: relay.clone(), hook: hook.clone() }));
    if !relay.is_closed() {
      (self.f)(Emitter { relay, hook });
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use crate::{prelude::*, subscriber::recorder::Recorder};

  #[rxflow_macro::test]
  fn test_create_next_complete() {
    let recorder = Recorder::<i32, Infallible>::unlimited();
    create(|emitter: Emitter<i32, Infallible>| {
      emitter.next(1);
      emitter.next(2);
      emitter.complete();
      emitter.next(3);
    })
    .subscribe(recorder.clone());
    assert_eq!(recorder.events(), vec![Event::Value(1), Event::Value(2), Event::Completed]);
  }

  #[rxflow_macro::test]
  fn test_create_error() {
    let recorder = Recorder::<(), &str>::unlimited();
    create(|emitter: Emitter<(), &str>| emitter.error("oops")).subscribe(recorder.clone());
    assert_eq!(recorder.failure(), Some("oops"));
  }

  #[rxflow_macro::test]
  fn test_create_buffers_until_requested() {
    let recorder = Recorder::<i32, Infallible>::with_demand(Demand::none());
    create(|emitter: Emitter<i32, Infallible>| {
      for i in 0..3 {
        emitter.next(i);
      }
    })
    .subscribe(recorder.clone());
    assert!(recorder.values().is_empty());
    recorder.request(2);
    assert_eq!(recorder.values(), vec![0, 1]);
  }

  #[rxflow_macro::test]
  fn test_create_teardown_runs_once() {
    let released = Arc::new(AtomicUsize::new(0));
    let c = released.clone();
    let token = create(move |emitter: Emitter<i32, Infallible>| {
      emitter.next(1);
      emitter.on_cancel(move || {
        c.fetch_add(1, Ordering::SeqCst);
      });
    })
    .sink(|_| {});
    assert_eq!(released.load(Ordering::SeqCst), 0);
    token.cancel();
    token.cancel();
    assert_eq!(released.load(Ordering::SeqCst), 1);
  }

  #[rxflow_macro::test]
  fn test_emitter_moves_across_threads() {
    let (tx, rx) = std::sync::mpsc::channel();
    create(|emitter: Emitter<i32, Infallible>| {
      std::thread::spawn(move || {
        emitter.next(7);
        emitter.complete();
      });
    })
    .sink_completion(move |v| tx.send(v).unwrap(), |_| {});
    assert_eq!(rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap(), 7);
  }
}

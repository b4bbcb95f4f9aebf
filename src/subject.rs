//! Subjects: publishers you push into by hand.
//!
//! | Subject | Replays | Without demand |
//! |---------|---------|----------------|
//! | [`PassthroughSubject`] | nothing | the value is dropped |
//! | [`CurrentValueSubject`] | the current value | only the newest value is kept |
//!
//! Both broadcast every `send` to their live subscribers in subscription
//! order, and both are also [`Subscriber`]s, so they can be attached to any
//! publisher with `subscribe_to`. `send_completion` ends every subscription;
//! the subject then stays inert and hands the stored completion to anyone who
//! subscribes later.
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use rxflow::prelude::*;
//!
//! let subject = PassthroughSubject::<i32, Infallible>::new();
//! let seen = Arc::new(Mutex::new(vec![]));
//! let c = seen.clone();
//! subject.clone().map(|v| v * 2).sink(move |v| c.lock().unwrap().push(v));
//!
//! subject.send(1);
//! subject.send(2);
//! subject.send_completion(Completion::Completed);
//! subject.send(3);
//! assert_eq!(*seen.lock().unwrap(), vec![2, 4]);
//! ```

use std::sync::{Arc, Mutex, Weak};

use crate::{
  demand::Demand,
  relay::{Backpressure, Relay},
  subscriber::{Completion, Subscriber},
  subscription::{Subscription, SubscriptionRef},
};

/// Subject-as-subscriber: feeds every event of an upstream into the subject.
macro_rules! impl_subject_subscriber {
  ($subject:ident) => {
    impl<T, E> $crate::subscriber::Subscriber<T, E> for $subject<T, E>
    where
      T: Clone + Send + 'static,
      E: Clone + Send + 'static,
    {
      fn on_subscribe(&mut self, subscription: $crate::subscription::SubscriptionRef) {
        self.core.attach_upstream(subscription)
      }

      fn on_value(&mut self, value: T) -> $crate::demand::Demand {
        self.send(value);
        $crate::demand::Demand::none()
      }

      fn on_completed(&mut self) { self.send_completion($crate::subscriber::Completion::Completed) }

      fn on_failed(&mut self, err: E) { self.send_completion($crate::subscriber::Completion::Failed(err)) }
    }
  };
}

mod current_value;
mod passthrough;
mod subscribers;

pub use current_value::CurrentValueSubject;
pub use passthrough::PassthroughSubject;
use subscribers::Subscribers;

/// State shared by all clones of one subject.
pub(crate) struct SubjectCore<T, E> {
  state: Arc<Mutex<SubjectState<T, E>>>,
  policy: Backpressure,
}

struct SubjectState<T, E> {
  subscribers: Subscribers<T, E>,
  /// The replayed value of a current-value subject.
  current: Option<T>,
  terminal: Option<Completion<E>>,
  /// Subscriptions the subject holds while acting as a subscriber.
  upstreams: Vec<SubscriptionRef>,
}

impl<T, E> Clone for SubjectCore<T, E> {
  fn clone(&self) -> Self { SubjectCore { state: self.state.clone(), policy: self.policy } }
}

impl<T, E> SubjectCore<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  pub(crate) fn new(policy: Backpressure, current: Option<T>) -> Self {
    SubjectCore {
      state: Arc::new(Mutex::new(SubjectState {
        subscribers: Subscribers::default(),
        current,
        terminal: None,
        upstreams: vec![],
      })),
      policy,
    }
  }

  pub(crate) fn add<S: Subscriber<T, E>>(&self, subscriber: S) {
    let relay = Relay::new(subscriber, self.policy);
    let id = {
      let mut state = self.state.lock().unwrap();
      match &state.terminal {
        Some(terminal) => {
          relay.enqueue_completion(terminal.clone());
          None
        }
        None => {
          if let Some(current) = &state.current {
            relay.enqueue(current.clone());
          }
          Some(state.subscribers.add(relay.clone()))
        }
      }
    };
    match id {
      Some(id) => relay.start(Arc::new(SubjectSubscription {
        relay: relay.clone(),
        subject: Arc::downgrade(&self.state),
        id,
      })),
      None => relay.start_self(),
    }
  }

  pub(crate) fn send(&self, value: T) {
    let pending = {
      let mut state = self.state.lock().unwrap();
      if state.terminal.is_some() {
        tracing::trace!("value sent to a terminated subject ignored");
        return;
      }
      if state.current.is_some() {
        state.current = Some(value.clone());
      }
      state.subscribers.broadcast(value)
    };
    for relay in pending {
      relay.drain();
    }
  }

  pub(crate) fn send_completion(&self, completion: Completion<E>) {
    let (pending, upstreams) = {
      let mut state = self.state.lock().unwrap();
      if state.terminal.is_some() {
        tracing::trace!("completion sent to a terminated subject ignored");
        return;
      }
      let pending = state.subscribers.finish(&completion);
      state.terminal = Some(completion);
      (pending, std::mem::take(&mut state.upstreams))
    };
    drop(upstreams);
    for relay in pending {
      relay.drain();
    }
  }

  pub(crate) fn current(&self) -> Option<T> { self.state.lock().unwrap().current.clone() }

  pub(crate) fn subscriber_count(&self) -> usize { self.state.lock().unwrap().subscribers.len() }

  /// Keep `subscription` as an upstream feeding this subject.
  pub(crate) fn attach_upstream(&self, subscription: SubscriptionRef) {
    let accepted = {
      let mut state = self.state.lock().unwrap();
      if state.terminal.is_none() {
        state.upstreams.push(subscription.clone());
      }
      state.terminal.is_none()
    };
    if accepted {
      subscription.request(Demand::unlimited());
    } else {
      subscription.cancel();
    }
  }
}

/// What a subject hands to each of its subscribers.
struct SubjectSubscription<T, E> {
  relay: Relay<T, E>,
  subject: Weak<Mutex<SubjectState<T, E>>>,
  id: usize,
}

impl<T, E> Subscription for SubjectSubscription<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn request(&self, demand: Demand) { self.relay.request(demand) }

  fn cancel(&self) {
    self.relay.cancel();
    if let Some(subject) = self.subject.upgrade() {
      let removed = subject.lock().unwrap().subscribers.remove(self.id);
      drop(removed);
    }
  }
}

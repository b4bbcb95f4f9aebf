//! Relay: serialized, demand-aware delivery to one subscriber.
//!
//! Every source and every operator that produces values on its own schedule
//! (timers, subjects, combinators) funnels them through a `Relay`. The relay
//! owns the downstream subscriber, counts the demand it has granted, queues
//! values that arrive without demand, and guarantees that callbacks never run
//! concurrently or re-entrantly.
//!
//! # Trampoline
//!
//! Whoever finds the relay idle becomes the drainer: it takes the subscriber
//! out of the shared state, delivers queued events until nothing deliverable
//! is left, and parks the subscriber again. Any `push`, `request` or `complete`
//! that arrives meanwhile (from the callback itself or from another thread)
//! only updates the shared state and returns; the active drainer picks it up
//! on its next turn. No callback is ever invoked with the lock held.
//!
//! # Ordering
//!
//! Values leave in arrival order. `Completed` waits behind queued values;
//! `Failed` skips the queue and discards it.

use std::{
  collections::VecDeque,
  sync::{Arc, Mutex, Weak},
};

use crate::{
  demand::Demand,
  subscriber::{BoxedSubscriber, Completion, Subscriber},
  subscription::{Subscription, SubscriptionRef},
};

/// What a relay does with a value that arrives without outstanding demand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Backpressure {
  /// Queue it until demand arrives.
  Buffer,
  /// Discard it.
  Drop,
  /// Keep only the newest undeliverable value.
  Latest,
}

pub(crate) struct Relay<T, E> {
  state: Arc<Mutex<RelayState<T, E>>>,
}

struct RelayState<T, E> {
  subscriber: Option<BoxedSubscriber<T, E>>,
  /// The subscription handed to the subscriber. Demand returned from
  /// `on_value` goes through it so the owner can forward it upstream.
  handle: Option<Weak<dyn Subscription>>,
  demand: Demand,
  queue: VecDeque<T>,
  terminal: Option<Completion<E>>,
  policy: Backpressure,
  started: bool,
  draining: bool,
  closed: bool,
}

enum Step<T, E> {
  Value(T),
  Terminal(Completion<E>),
}

impl<T, E> Clone for Relay<T, E> {
  fn clone(&self) -> Self { Relay { state: self.state.clone() } }
}

impl<T, E> Relay<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  pub(crate) fn new(subscriber: impl Subscriber<T, E>, policy: Backpressure) -> Self {
    Relay {
      state: Arc::new(Mutex::new(RelayState {
        subscriber: Some(Box::new(subscriber)),
        handle: None,
        demand: Demand::none(),
        queue: VecDeque::new(),
        terminal: None,
        policy,
        started: false,
        draining: false,
        closed: false,
      })),
    }
  }

  /// Hand `subscription` to the subscriber, then deliver whatever became
  /// deliverable while `on_subscribe` ran.
  pub(crate) fn start(&self, subscription: SubscriptionRef) {
    let subscriber = {
      let mut state = self.state.lock().unwrap();
      state.handle = Some(Arc::downgrade(&subscription));
      state.draining = true;
      state.subscriber.take()
    };
    let Some(mut subscriber) = subscriber else {
      return;
    };
    subscriber.on_subscribe(subscription);
    let discarded = {
      let mut state = self.state.lock().unwrap();
      state.started = true;
      state.draining = false;
      if state.closed {
        Some(subscriber)
      } else {
        state.subscriber = Some(subscriber);
        None
      }
    };
    drop(discarded);
    self.drain();
  }

  /// Start with the relay itself as the subscription.
  pub(crate) fn start_self(&self) { self.start(Arc::new(self.clone())) }

  /// Queue `value` without draining. Returns `false` if it was discarded.
  pub(crate) fn enqueue(&self, value: T) -> bool {
    let mut state = self.state.lock().unwrap();
    if state.closed || state.terminal.is_some() {
      return false;
    }
    let room = state.demand > Demand::max(state.queue.len());
    match state.policy {
      Backpressure::Buffer => state.queue.push_back(value),
      Backpressure::Drop if room => state.queue.push_back(value),
      Backpressure::Drop => {
        tracing::trace!("value dropped, subscriber has no outstanding demand");
        return false;
      }
      Backpressure::Latest => match state.queue.back_mut() {
        Some(last) if !room => *last = value,
        _ => state.queue.push_back(value),
      },
    }
    true
  }

  pub(crate) fn push(&self, value: T) -> bool {
    let queued = self.enqueue(value);
    if queued {
      self.drain();
    }
    queued
  }

  /// Record the terminal event without draining. The first one wins.
  pub(crate) fn enqueue_completion(&self, completion: Completion<E>) {
    let mut state = self.state.lock().unwrap();
    if !state.closed && state.terminal.is_none() {
      state.terminal = Some(completion);
    }
  }

  pub(crate) fn complete(&self, completion: Completion<E>) {
    self.enqueue_completion(completion);
    self.drain();
  }

  /// Grant more demand and deliver what it unblocks.
  pub(crate) fn request(&self, demand: Demand) {
    if demand.is_none() {
      return;
    }
    {
      let mut state = self.state.lock().unwrap();
      if state.closed {
        return;
      }
      state.demand += demand;
    }
    self.drain();
  }

  /// Stop delivery for good and drop everything pending.
  pub(crate) fn cancel(&self) {
    let discarded = {
      let mut state = self.state.lock().unwrap();
      state.closed = true;
      state.queue.clear();
      state.terminal = None;
      state.subscriber.take()
    };
    drop(discarded);
  }

  /// `true` once the subscriber was cancelled or its terminal event was
  /// recorded.
  pub(crate) fn is_closed(&self) -> bool {
    let state = self.state.lock().unwrap();
    state.closed || state.terminal.is_some()
  }

  /// Demand not yet covered by queued values.
  pub(crate) fn unfulfilled(&self) -> Demand {
    let state = self.state.lock().unwrap();
    if state.closed {
      return Demand::none();
    }
    state.demand.saturating_sub(state.queue.len())
  }

  pub(crate) fn drain(&self) {
    let mut subscriber = {
      let mut state = self.state.lock().unwrap();
      if state.draining || !state.started {
        return;
      }
      match state.subscriber.take() {
        Some(subscriber) => {
          state.draining = true;
          subscriber
        }
        None => return,
      }
    };

    loop {
      let step = {
        let mut state = self.state.lock().unwrap();
        if state.closed {
          state.draining = false;
          break;
        }
        match next_step(&mut state) {
          Some(step) => step,
          None => {
            state.subscriber = Some(subscriber);
            state.draining = false;
            return;
          }
        }
      };
      match step {
        Step::Value(value) => {
          let more = subscriber.on_value(value);
          if !more.is_none() {
            self.route_demand(more);
          }
        }
        Step::Terminal(completion) => {
          subscriber.on_completion(completion);
          self.state.lock().unwrap().draining = false;
          break;
        }
      }
    }
    drop(subscriber);
  }

  /// Demand returned from `on_value` is treated as a `request` on the
  /// subscription the subscriber holds.
  fn route_demand(&self, demand: Demand) {
    let handle = self.state.lock().unwrap().handle.as_ref().and_then(Weak::upgrade);
    match handle {
      Some(handle) => handle.request(demand),
      None => {
        let mut state = self.state.lock().unwrap();
        if !state.closed {
          state.demand += demand;
        }
      }
    }
  }
}

fn next_step<T, E>(state: &mut RelayState<T, E>) -> Option<Step<T, E>> {
  if matches!(state.terminal, Some(Completion::Failed(_))) {
    state.queue.clear();
    state.closed = true;
    return state.terminal.take().map(Step::Terminal);
  }
  if !state.queue.is_empty() {
    if state.demand.consume_one() {
      return state.queue.pop_front().map(Step::Value);
    }
    return None;
  }
  let terminal = state.terminal.take()?;
  state.closed = true;
  Some(Step::Terminal(terminal))
}

impl<T, E> Subscription for Relay<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  #[inline]
  fn request(&self, demand: Demand) { Relay::request(self, demand) }

  #[inline]
  fn cancel(&self) { Relay::cancel(self) }
}

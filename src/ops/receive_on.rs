//! Receive-on operator
//!
//! Upstream events are appended to a FIFO hand-off queue. At most one drain
//! task per subscription is scheduled at a time; it empties the queue into the
//! downstream relay, so values keep their order even on a pool with many
//! workers. `on_subscribe` is still delivered on the subscribing thread.

use std::{
  collections::VecDeque,
  sync::{Arc, Mutex},
};

use crate::{
  demand::Demand,
  publisher::Publisher,
  relay::{Backpressure, Relay},
  scheduler::{Scheduler, Task},
  subscriber::{Completion, Event, Subscriber},
  subscription::{SerialSubscription, Subscription, SubscriptionRef},
};

/// Publisher returned by [`receive_on`](crate::ops::PublisherExt::receive_on).
#[derive(Clone)]
pub struct ReceiveOn<P, S> {
  pub(crate) source: P,
  pub(crate) scheduler: S,
}

struct HopCore<T, E, S> {
  relay: Relay<T, E>,
  upstream: SerialSubscription,
  hop: Mutex<Hop<T, E>>,
  scheduler: S,
}

struct Hop<T, E> {
  queue: VecDeque<Event<T, E>>,
  /// A drain task is scheduled or running.
  scheduled: bool,
}

impl<T, E, S> HopCore<T, E, S>
where
  T: Send + 'static,
  E: Send + 'static,
  S: Scheduler,
{
  fn hand_off(self: &Arc<Self>, event: Event<T, E>) {
    let schedule = {
      let mut hop = self.hop.lock().unwrap();
      if self.relay.is_closed() {
        return;
      }
      hop.queue.push_back(event);
      !std::mem::replace(&mut hop.scheduled, true)
    };
    if schedule {
      let core = self.clone();
      self.scheduler.schedule(Task::once(move || core.drain_hop()), None);
    }
  }

  fn drain_hop(&self) {
    loop {
      let event = {
        let mut hop = self.hop.lock().unwrap();
        match hop.queue.pop_front() {
          Some(event) => event,
          None => {
            hop.scheduled = false;
            return;
          }
        }
      };
      match event {
        Event::Value(value) => {
          self.relay.push(value);
        }
        Event::Completed => self.relay.complete(Completion::Completed),
        Event::Failed(err) => self.relay.complete(Completion::Failed(err)),
      }
    }
  }
}

impl<T, E, S> Subscription for HopCore<T, E, S>
where
  T: Send + 'static,
  E: Send + 'static,
  S: Scheduler,
{
  fn request(&self, demand: Demand) {
    self.relay.request(demand);
    self.upstream.request(demand);
  }

  fn cancel(&self) {
    self.relay.cancel();
    self.upstream.cancel();
    self.hop.lock().unwrap().queue.clear();
  }
}

struct HopSubscriber<T, E, S> {
  core: Arc<HopCore<T, E, S>>,
}

impl<T, E, S> Subscriber<T, E> for HopSubscriber<T, E, S>
where
  T: Send + 'static,
  E: Send + 'static,
  S: Scheduler,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    let outstanding = self.core.relay.unfulfilled();
    self.core.upstream.replace(subscription, outstanding);
  }

  fn on_value(&mut self, value: T) -> Demand {
    self.core.hand_off(Event::Value(value));
    Demand::none()
  }

  fn on_completed(&mut self) { self.core.hand_off(Event::Completed) }

  fn on_failed(&mut self, err: E) { self.core.hand_off(Event::Failed(err)) }
}

impl<P, S> Publisher for ReceiveOn<P, S>
where
  P: Publisher,
  S: Scheduler,
{
  type Item = P::Item;
  type Err = P::Err;

  fn actual_subscribe<O: Subscriber<P::Item, P::Err>>(self, subscriber: O) {
    let core = Arc::new(HopCore {
      relay: Relay::new(subscriber, Backpressure::Buffer),
      upstream: SerialSubscription::default(),
      hop: Mutex::new(Hop { queue: VecDeque::new(), scheduled: false }),
      scheduler: self.scheduler,
    });
    core.relay.start(core.clone());
    if core.relay.is_closed() {
      return;
    }
    self.source.actual_subscribe(HopSubscriber { core });
  }
}

#[cfg(test)]
mod tests {
  use std::{sync::mpsc::channel, time::Duration};

  use crate::{prelude::*, subscriber::recorder::Recorder};

  #[rxflow_macro::test]
  fn delivery_waits_for_the_scheduler() {
    TestScheduler::init();
    let recorder = Recorder::unlimited();
    from_iter([1, 2, 3]).receive_on(TestScheduler).subscribe(recorder.clone());
    assert_eq!(recorder.subscribed(), 1);
    assert!(recorder.events().is_empty());

    TestScheduler::flush();
    assert_eq!(recorder.events(), vec![
      Event::Value(1),
      Event::Value(2),
      Event::Value(3),
      Event::Completed
    ]);
  }

  #[rxflow_macro::test]
  fn bounded_demand_is_respected() {
    TestScheduler::init();
    let recorder = Recorder::with_demand(Demand::max(2));
    from_iter(0..).receive_on(TestScheduler).subscribe(recorder.clone());
    TestScheduler::flush();
    assert_eq!(recorder.values(), vec![0, 1]);

    recorder.request(1);
    TestScheduler::flush();
    assert_eq!(recorder.values(), vec![0, 1, 2]);
  }

  #[rxflow_macro::test]
  fn cancel_drops_queued_events() {
    TestScheduler::init();
    let recorder = Recorder::unlimited();
    let token = from_iter([1, 2]).receive_on(TestScheduler).subscribe(recorder.clone());
    token.cancel();
    TestScheduler::flush();
    assert!(recorder.events().is_empty());
  }

  #[rxflow_macro::test]
  fn order_survives_a_multi_worker_pool() {
    let pool = ThreadPoolScheduler::builder().pool_size(4).create().unwrap();
    let caller = std::thread::current().id();
    let (tx, rx) = channel();
    let done = tx.clone();
    from_iter(0..500)
      .receive_on(pool)
      .sink_completion(
        move |v| tx.send(Some((v, std::thread::current().id()))).unwrap(),
        move |_| done.send(None).unwrap(),
      );

    let mut received = vec![];
    while let Some(item) = rx.recv_timeout(Duration::from_secs(5)).unwrap() {
      received.push(item);
    }
    let values: Vec<_> = received.iter().map(|(v, _)| *v).collect();
    assert_eq!(values, (0..500).collect::<Vec<_>>());
    assert!(received.iter().all(|(_, thread)| *thread != caller));
  }
}

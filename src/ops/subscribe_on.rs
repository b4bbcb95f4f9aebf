use std::sync::Arc;

use crate::{
  demand::Demand,
  publisher::Publisher,
  scheduler::{Scheduler, Task},
  subscriber::Subscriber,
  subscription::{Subscription, SubscriptionRef},
};

/// Publisher returned by [`subscribe_on`](crate::ops::PublisherExt::subscribe_on).
///
/// The upstream subscription is made on the scheduler, and every later
/// `request` and `cancel` is scheduled there too. Where values are delivered
/// is up to the upstream.
#[derive(Clone)]
pub struct SubscribeOn<P, S> {
  pub(crate) source: P,
  pub(crate) scheduler: S,
}

pub struct SubscribeOnSubscriber<O, S> {
  downstream: O,
  scheduler: S,
}

/// Upstream subscription whose calls hop onto the scheduler.
struct ScheduledSubscription<S> {
  inner: SubscriptionRef,
  scheduler: S,
}

impl<S: Scheduler> Subscription for ScheduledSubscription<S> {
  fn request(&self, demand: Demand) {
    let inner = self.inner.clone();
    self.scheduler.schedule(Task::once(move || inner.request(demand)), None);
  }

  fn cancel(&self) {
    let inner = self.inner.clone();
    self.scheduler.schedule(Task::once(move || inner.cancel()), None);
  }
}

impl<Item, Err, O, S> Subscriber<Item, Err> for SubscribeOnSubscriber<O, S>
where
  O: Subscriber<Item, Err>,
  S: Scheduler,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    let scheduled = ScheduledSubscription { inner: subscription, scheduler: self.scheduler.clone() };
    self.downstream.on_subscribe(Arc::new(scheduled));
  }

  #[inline]
  fn on_value(&mut self, value: Item) -> Demand { self.downstream.on_value(value) }

  #[inline]
  fn on_completed(&mut self) { self.downstream.on_completed() }

  #[inline]
  fn on_failed(&mut self, err: Err) { self.downstream.on_failed(err) }
}

impl<P, S> Publisher for SubscribeOn<P, S>
where
  P: Publisher,
  S: Scheduler,
{
  type Item = P::Item;
  type Err = P::Err;

  fn actual_subscribe<O: Subscriber<P::Item, P::Err>>(self, subscriber: O) {
    let SubscribeOn { source, scheduler } = self;
    let downstream = SubscribeOnSubscriber { downstream: subscriber, scheduler: scheduler.clone() };
    scheduler.schedule(Task::once(move || source.actual_subscribe(downstream)), None);
  }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{
      atomic::{AtomicUsize, Ordering},
      mpsc::channel,
      Arc,
    },
    time::Duration,
  };

  use crate::{prelude::*, subscriber::recorder::Recorder};

  #[rxflow_macro::test]
  fn subscription_happens_on_the_scheduler() {
    TestScheduler::init();
    let subscribed = Arc::new(AtomicUsize::new(0));
    let c = subscribed.clone();
    let recorder = Recorder::unlimited();
    from_iter([1, 2])
      .handle_events(EventHooks::new().on_subscribe(move || {
        c.fetch_add(1, Ordering::SeqCst);
      }))
      .subscribe_on(TestScheduler)
      .subscribe(recorder.clone());

    assert_eq!(subscribed.load(Ordering::SeqCst), 0);
    assert_eq!(TestScheduler::pending_count(), 1);
    TestScheduler::flush();
    assert_eq!(subscribed.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.events(), vec![Event::Value(1), Event::Value(2), Event::Completed]);
  }

  #[rxflow_macro::test]
  fn requests_are_scheduled_too() {
    TestScheduler::init();
    let recorder = Recorder::with_demand(Demand::none());
    from_iter(0..).subscribe_on(TestScheduler).subscribe(recorder.clone());
    TestScheduler::flush();

    recorder.request(2);
    assert!(recorder.values().is_empty());
    TestScheduler::flush();
    assert_eq!(recorder.values(), vec![0, 1]);
  }

  #[rxflow_macro::test]
  fn cancel_before_subscription_reaches_upstream() {
    TestScheduler::init();
    let recorder = Recorder::unlimited();
    let token = from_iter([1]).subscribe_on(TestScheduler).subscribe(recorder.clone());
    token.cancel();
    TestScheduler::flush();
    assert!(recorder.values().is_empty());
  }

  #[rxflow_macro::test]
  fn upstream_runs_on_a_worker() {
    let caller = std::thread::current().id();
    let (tx, rx) = channel();
    create(move |emitter: Emitter<std::thread::ThreadId, Infallible>| {
      emitter.next(std::thread::current().id());
      emitter.complete();
    })
    .subscribe_on(ThreadPoolScheduler::global())
    .sink(move |thread| tx.send(thread).unwrap());
    let worker = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_ne!(worker, caller);
  }
}

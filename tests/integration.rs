//! End-to-end behaviour of operator chains through the public API.

use std::{
  sync::{
    atomic::{AtomicUsize, Ordering},
    mpsc, Arc, Mutex,
  },
  time::Duration,
};

use futures::StreamExt;
use rxflow::prelude::*;

/// Records every event and keeps the subscription so tests can grant demand.
struct Collector<T, E> {
  events: Arc<Mutex<Vec<Event<T, E>>>>,
  subscription: Arc<Mutex<Option<SubscriptionRef>>>,
  initial: Demand,
}

impl<T, E> Clone for Collector<T, E> {
  fn clone(&self) -> Self {
    Collector { events: self.events.clone(), subscription: self.subscription.clone(), initial: self.initial }
  }
}

impl<T: Clone, E: Clone> Collector<T, E> {
  fn new(initial: Demand) -> Self {
    Collector { events: Arc::default(), subscription: Arc::default(), initial }
  }

  fn request(&self, n: usize) {
    let subscription = self.subscription.lock().unwrap().clone();
    if let Some(subscription) = subscription {
      subscription.request(Demand::max(n));
    }
  }

  fn events(&self) -> Vec<Event<T, E>> { self.events.lock().unwrap().clone() }

  fn values(&self) -> Vec<T> {
    self
      .events()
      .into_iter()
      .filter_map(|e| match e {
        Event::Value(v) => Some(v),
        _ => None,
      })
      .collect()
  }
}

impl<T, E> Subscriber<T, E> for Collector<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    *self.subscription.lock().unwrap() = Some(subscription.clone());
    if !self.initial.is_none() {
      subscription.request(self.initial);
    }
  }

  fn on_value(&mut self, value: T) -> Demand {
    self.events.lock().unwrap().push(Event::Value(value));
    Demand::none()
  }

  fn on_completed(&mut self) { self.events.lock().unwrap().push(Event::Completed) }

  fn on_failed(&mut self, err: E) { self.events.lock().unwrap().push(Event::Failed(err)) }
}

#[rxflow_macro::test]
fn cold_publisher_restarts_per_subscription() {
  let source = from_iter(vec![1, 2, 3]).map(|v| v * 10);
  let first = Collector::<i32, Infallible>::new(Demand::unlimited());
  let second = Collector::<i32, Infallible>::new(Demand::unlimited());
  source.clone().subscribe(first.clone());
  source.subscribe(second.clone());
  assert_eq!(first.values(), vec![10, 20, 30]);
  assert_eq!(second.events(), first.events());
}

#[rxflow_macro::test]
fn bounded_demand_is_never_exceeded() {
  let collector = Collector::<i32, Infallible>::new(Demand::max(3));
  from_iter(1..=100)
    .map(|v| v * 2)
    .filter(|v| v % 3 != 0)
    .subscribe(collector.clone());
  assert_eq!(collector.values(), vec![2, 4, 8]);

  collector.request(2);
  assert_eq!(collector.values(), vec![2, 4, 8, 10, 14]);
  assert!(!collector.events().contains(&Event::Completed));
}

#[rxflow_macro::test]
fn sink_with_a_demand_budget() {
  let seen = Arc::new(Mutex::new(vec![]));
  let c = seen.clone();
  let sink = Sink::new(move |v| c.lock().unwrap().push(v), |_: Completion<Infallible>| {});
  from_iter(1..=10).subscribe(sink.with_demand(2, 1));
  assert_eq!(seen.lock().unwrap().len(), 10);
}

#[rxflow_macro::test]
fn remove_duplicates_keeps_changes_only() {
  let collector = Collector::<i32, Infallible>::new(Demand::unlimited());
  from_iter([1, 1, 2, 2, 2, 3, 1]).remove_duplicates().subscribe(collector.clone());
  assert_eq!(collector.values(), vec![1, 2, 3, 1]);
}

#[rxflow_macro::test]
fn merge_completes_after_every_source() {
  let a = PassthroughSubject::<i32, Infallible>::new();
  let b = PassthroughSubject::<i32, Infallible>::new();
  let collector = Collector::new(Demand::unlimited());
  a.clone().merge(b.clone()).subscribe(collector.clone());

  a.send(1);
  b.send(2);
  a.send_completion(Completion::Completed);
  b.send(3);
  assert_eq!(collector.values(), vec![1, 2, 3]);
  assert!(!collector.events().contains(&Event::Completed));

  b.send_completion(Completion::Completed);
  let completions = collector.events().into_iter().filter(|e| *e == Event::Completed).count();
  assert_eq!(completions, 1);
}

#[rxflow_macro::test]
fn combine_latest_pairs_the_newest_values() {
  let numbers = PassthroughSubject::<i32, Infallible>::new();
  let letters = PassthroughSubject::<&str, Infallible>::new();
  let collector = Collector::new(Demand::unlimited());
  numbers.clone().combine_latest(letters.clone()).subscribe(collector.clone());

  numbers.send(1);
  letters.send("A");
  numbers.send(2);
  letters.send("B");
  assert_eq!(collector.values(), vec![(1, "A"), (2, "A"), (2, "B")]);
}

#[rxflow_macro::test]
fn retry_resubscribes_after_a_failure() {
  let attempts = Arc::new(AtomicUsize::new(0));
  let counter = attempts.clone();
  let flaky = defer(move || {
    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
      fail::<&str, &str>("timeout").erase()
    } else {
      just("X").set_failure_type::<&str>().erase()
    }
  });

  let collector = Collector::new(Demand::unlimited());
  flaky.retry(1).subscribe(collector.clone());
  assert_eq!(collector.events(), vec![Event::Value("X"), Event::Completed]);
  assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[rxflow_macro::test]
fn retry_gives_up_after_its_budget() {
  let attempts = Arc::new(AtomicUsize::new(0));
  let counter = attempts.clone();
  let broken = defer(move || {
    counter.fetch_add(1, Ordering::SeqCst);
    fail::<i32, _>("down")
  });

  let collector = Collector::new(Demand::unlimited());
  broken.retry(2).subscribe(collector.clone());
  assert_eq!(collector.events(), vec![Event::Failed("down")]);
  assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[rxflow_macro::test]
fn debounce_emits_the_end_of_a_burst() {
  TestScheduler::init();
  let input = PassthroughSubject::<i32, Infallible>::new();
  let collector = Collector::new(Demand::unlimited());
  input
    .clone()
    .debounce(Duration::from_millis(100), TestScheduler)
    .subscribe(collector.clone());

  input.send(1);
  TestScheduler::advance_by(Duration::from_millis(50));
  input.send(2);
  TestScheduler::advance_by(Duration::from_millis(50));
  assert!(collector.values().is_empty());
  TestScheduler::advance_by(Duration::from_millis(50));
  assert_eq!(collector.values(), vec![2]);

  input.send(3);
  input.send_completion(Completion::Completed);
  assert_eq!(collector.events(), vec![Event::Value(2), Event::Value(3), Event::Completed]);
}

#[rxflow_macro::test]
fn first_where_stops_the_source() {
  let cancelled = Arc::new(AtomicUsize::new(0));
  let c = cancelled.clone();
  let collector = Collector::new(Demand::unlimited());
  from_iter(1..=10)
    .handle_events(EventHooks::new().on_cancel(move || {
      c.fetch_add(1, Ordering::SeqCst);
    }))
    .first_where(|v| *v > 2)
    .subscribe(collector.clone());

  assert_eq!(collector.events(), vec![Event::Value(3), Event::Completed]);
  assert_eq!(cancelled.load(Ordering::SeqCst), 1);
}

#[rxflow_macro::test]
fn cancellation_is_idempotent() {
  let subject = PassthroughSubject::<i32, Infallible>::new();
  let collector = Collector::new(Demand::unlimited());
  let token = subject.clone().map(|v| v + 1).subscribe(collector.clone());
  subject.send(1);
  token.cancel();
  cancel(&token);
  subject.send(2);
  assert_eq!(collector.events(), vec![Event::Value(2)]);
  assert_eq!(subject.subscriber_count(), 0);
  assert!(token.is_cancelled());

  let finished = from_iter([1]).sink(|_| {});
  finished.cancel();
  assert!(finished.is_closed());
  assert!(!finished.is_cancelled());
}

#[rxflow_macro::test]
fn current_value_subject_feeds_a_chain() {
  let level = CurrentValueSubject::<u8, Infallible>::new(3);
  let collector = Collector::new(Demand::unlimited());
  level.clone().map(|v| v * 2).subscribe(collector.clone());
  level.send(4);
  level.send_completion(Completion::Completed);
  assert_eq!(collector.events(), vec![Event::Value(6), Event::Value(8), Event::Completed]);
}

#[rxflow_macro::test]
fn catch_switches_to_the_recovery() {
  let source = PassthroughSubject::<i32, &str>::new();
  let collector = Collector::<i32, Infallible>::new(Demand::unlimited());
  source.clone().catch(|_| just(-1)).subscribe(collector.clone());
  source.send(1);
  source.send(2);
  source.send_completion(Completion::Failed("lost"));
  assert_eq!(collector.events(), vec![Event::Value(1), Event::Value(2), Event::Value(-1), Event::Completed]);
}

#[rxflow_macro::test]
fn receive_on_keeps_order_across_threads() {
  let (tx, rx) = mpsc::channel();
  let done = tx.clone();
  let caller = std::thread::current().id();
  from_iter(0..200)
    .receive_on(ThreadPoolScheduler::global())
    .sink_completion(
      move |v| tx.send(Some((v, std::thread::current().id()))).unwrap(),
      move |_| done.send(None).unwrap(),
    );

  let mut values = vec![];
  while let Some((v, thread)) = rx.recv_timeout(Duration::from_secs(5)).unwrap() {
    assert_ne!(thread, caller);
    values.push(v);
  }
  assert_eq!(values, (0..200).collect::<Vec<_>>());
}

#[rxflow_macro::test]
fn assembly_rejects_mismatched_stages() {
  let mismatch = Assembly::new(from_iter(1..=3))
    .stage(Stage::map(|s: String| s.len()))
    .build::<usize, Infallible>();
  assert!(matches!(mismatch, Err(OperatorFailure::TypeMismatch { .. })));

  let unhandled = Assembly::new(fail::<i32, String>("no".into())).build::<i32, Infallible>();
  assert!(matches!(unhandled, Err(OperatorFailure::FailureNotHandled { .. })));

  let chain = Assembly::new(from_iter([1, 1, 2, 3, 3]))
    .stage(Stage::remove_duplicates::<i32>())
    .stage(Stage::prefix(2))
    .build::<i32, Infallible>()
    .unwrap();
  let collector = Collector::new(Demand::unlimited());
  chain.subscribe(collector.clone());
  assert_eq!(collector.events(), vec![Event::Value(1), Event::Value(2), Event::Completed]);
}

#[rxflow_macro::test]
async fn stream_pulls_one_value_per_poll() {
  let values: Vec<_> = from_iter(1..=3).map(|v| v * 2).into_stream().collect().await;
  assert_eq!(values, vec![Ok(2), Ok(4), Ok(6)]);

  let first = fail::<i32, &str>("gone").first_value().await;
  assert_eq!(first, Err(StreamError::Failed("gone")));
}

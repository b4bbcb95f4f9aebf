//! Operators
//!
//! Every operator is a method on [`PublisherExt`] that wraps `self` in a new
//! publisher. Composition never mutates: `source.map(f)` leaves nothing
//! shared behind, and the resulting value can be cloned and subscribed again
//! when its parts are `Clone`.
//!
//! | Kind | Operators |
//! |------|-----------|
//! | Transform | `map`, `filter`, `scan`, `remove_duplicates`, `map_err`, `set_failure_type` |
//! | Truncate | `first_where`, `first`, `prefix` |
//! | Combine | `merge`, `merge_all`, `combine_latest`, `combine_latest_all`, `flat_map` |
//! | Time | `debounce`, `throttle` |
//! | Recover | `retry`, `catch`, `replace_error` |
//! | Context | `subscribe_on`, `receive_on` |
//! | Side effects | `handle_events`, `log_events` |
//! | Multicast | `share` |
//! | Consume | `subscribe`, `sink`, `sink_completion`, `assign`, `into_stream`, `first_value` |

use std::{convert::Infallible, fmt::Debug, time::Duration};

use crate::{
  demand::Demand,
  pipeline,
  publisher::{AnyPublisher, Publisher},
  published::Published,
  scheduler::Scheduler,
  subscriber::{Assign, Completion, Sink, Subscriber},
  subscription::CancellationToken,
};

pub mod catch;
pub mod combine_latest;
pub mod debounce;
pub mod filter;
pub mod first;
pub mod flat_map;
pub mod handle_events;
pub mod into_stream;
pub mod map;
pub mod map_err;
pub mod merge;
pub mod prefix;
pub mod receive_on;
pub mod remove_duplicates;
pub mod replace_error;
pub mod retry;
pub mod scan;
pub mod share;
pub mod subscribe_on;
pub mod throttle;

use catch::Catch;
use combine_latest::{CombineLatest, CombineLatestAll};
use debounce::Debounce;
use filter::Filter;
use first::FirstWhere;
use flat_map::FlatMap;
use handle_events::{EventHooks, HandleEvents};
use into_stream::{FirstValue, PublisherStream};
use map::Map;
use map_err::MapErr;
use merge::{Merge, MergeAll};
use prefix::Prefix;
use receive_on::ReceiveOn;
use remove_duplicates::RemoveDuplicates;
use replace_error::ReplaceError;
use retry::Retry;
use scan::Scan;
use share::Share;
use subscribe_on::SubscribeOn;
use throttle::Throttle;

/// Predicate used by [`PublisherExt::first`].
pub type AnyValue<T> = fn(&T) -> bool;

/// Equality used by [`PublisherExt::remove_duplicates`].
pub type PartialEqOf<T> = fn(&T, &T) -> bool;

/// Operator and subscription methods available on every publisher.
pub trait PublisherExt: Publisher + Sized {
  // ==================== Consume ====================

  /// Attach `subscriber` and return the token that cancels the chain.
  fn subscribe<S>(self, subscriber: S) -> CancellationToken
  where
    S: Subscriber<Self::Item, Self::Err>,
  {
    pipeline::subscribe(self, subscriber)
  }

  /// Subscribe with unlimited demand, calling `on_value` for every value.
  fn sink<N>(self, on_value: N) -> CancellationToken
  where
    N: FnMut(Self::Item) + Send + 'static,
  {
    self.subscribe(Sink::new(on_value, |_: Completion<Self::Err>| {}))
  }

  /// Like [`sink`](PublisherExt::sink), also observing how the chain ended.
  fn sink_completion<N, C>(self, on_value: N, on_completion: C) -> CancellationToken
  where
    N: FnMut(Self::Item) + Send + 'static,
    C: FnOnce(Completion<Self::Err>) + Send + 'static,
  {
    self.subscribe(Sink::new(on_value, on_completion))
  }

  /// Write every value into `target`. Only chains that cannot fail qualify.
  fn assign(self, target: &Published<Self::Item>) -> CancellationToken
  where
    Self: Publisher<Err = Infallible>,
    Self::Item: Clone,
  {
    self.subscribe(Assign::new(target.clone()))
  }

  /// Hide the concrete chain type.
  fn erase(self) -> AnyPublisher<Self::Item, Self::Err>
  where
    Self: Clone,
  {
    AnyPublisher::new(self)
  }

  /// Pull values as a `futures::Stream`, one request per poll.
  fn into_stream(self) -> PublisherStream<Self::Item, Self::Err> { PublisherStream::new(self) }

  /// Resolve to the first value, or to why there was none.
  fn first_value(self) -> FirstValue<Self::Item, Self::Err> { FirstValue::new(self) }

  // ==================== Transform ====================

  fn map<B, F>(self, f: F) -> Map<Self, F>
  where
    F: FnMut(Self::Item) -> B + Send + 'static,
    B: Send + 'static,
  {
    Map { source: self, func: f }
  }

  /// Forward only values matching `predicate`. Every dropped value is
  /// re-requested from upstream.
  fn filter<F>(self, predicate: F) -> Filter<Self, F>
  where
    F: FnMut(&Self::Item) -> bool + Send + 'static,
  {
    Filter { source: self, predicate }
  }

  /// Emit the running accumulation of `f` starting from `initial`.
  fn scan<B, F>(self, initial: B, f: F) -> Scan<Self, F, B>
  where
    F: FnMut(B, Self::Item) -> B + Send + 'static,
    B: Clone + Send + 'static,
  {
    Scan { source: self, initial, func: f }
  }

  /// Drop values equal to the previously delivered one.
  fn remove_duplicates(self) -> RemoveDuplicates<Self, PartialEqOf<Self::Item>>
  where
    Self::Item: PartialEq + Clone,
  {
    let eq: PartialEqOf<Self::Item> = |a, b| a == b;
    self.remove_duplicates_by(eq)
  }

  /// Drop values for which `eq(previous, value)` holds.
  fn remove_duplicates_by<F>(self, eq: F) -> RemoveDuplicates<Self, F>
  where
    F: FnMut(&Self::Item, &Self::Item) -> bool + Send + 'static,
    Self::Item: Clone,
  {
    RemoveDuplicates { source: self, eq }
  }

  fn map_err<E2, F>(self, f: F) -> MapErr<Self, F>
  where
    F: FnOnce(Self::Err) -> E2 + Send + 'static,
    E2: Send + 'static,
  {
    MapErr { source: self, func: f }
  }

  /// Give a chain that cannot fail the error type `E` expected downstream.
  fn set_failure_type<E>(self) -> MapErr<Self, fn(Infallible) -> E>
  where
    Self: Publisher<Err = Infallible>,
    E: Send + 'static,
  {
    let absurd: fn(Infallible) -> E = |never| match never {};
    self.map_err(absurd)
  }

  // ==================== Truncate ====================

  /// Forward the first value matching `predicate`, then complete and cancel
  /// upstream.
  fn first_where<F>(self, predicate: F) -> FirstWhere<Self, F>
  where
    F: FnMut(&Self::Item) -> bool + Send + 'static,
  {
    FirstWhere { source: self, predicate }
  }

  fn first(self) -> FirstWhere<Self, AnyValue<Self::Item>> {
    let any: AnyValue<Self::Item> = |_| true;
    self.first_where(any)
  }

  /// Forward at most `count` values, then complete and cancel upstream.
  fn prefix(self, count: usize) -> Prefix<Self> { Prefix { source: self, count } }

  // ==================== Combine ====================

  /// Interleave values of `self` and `other`. Completes after both did;
  /// fails on the first failure.
  fn merge<P>(self, other: P) -> Merge<Self, P>
  where
    P: Publisher<Item = Self::Item, Err = Self::Err>,
  {
    Merge { a: self, b: other }
  }

  /// Interleave values of `self` and every publisher in `others`.
  fn merge_all<I>(self, others: I) -> MergeAll<Self>
  where
    I: IntoIterator<Item = Self>,
  {
    let mut sources = vec![self];
    sources.extend(others);
    MergeAll { sources }
  }

  /// Emit the latest pair once both sides produced a value, then on every
  /// value from either side.
  fn combine_latest<P>(self, other: P) -> CombineLatest<Self, P>
  where
    P: Publisher<Err = Self::Err>,
    Self::Item: Clone,
    P::Item: Clone,
  {
    CombineLatest { a: self, b: other }
  }

  /// `combine_latest` over `self` and any number of same-typed publishers.
  fn combine_latest_all<I>(self, others: I) -> CombineLatestAll<Self>
  where
    I: IntoIterator<Item = Self>,
    Self::Item: Clone,
  {
    let mut sources = vec![self];
    sources.extend(others);
    CombineLatestAll { sources }
  }

  /// Subscribe to the publisher `f` builds for every value and interleave
  /// all of their output.
  fn flat_map<P, F>(self, f: F) -> FlatMap<Self, F>
  where
    F: FnMut(Self::Item) -> P + Send + 'static,
    P: Publisher<Err = Self::Err>,
  {
    FlatMap { source: self, func: f, max_publishers: Demand::unlimited() }
  }

  /// `flat_map` with at most `max_publishers` inner publishers alive at once.
  fn flat_map_max<P, F>(self, max_publishers: usize, f: F) -> FlatMap<Self, F>
  where
    F: FnMut(Self::Item) -> P + Send + 'static,
    P: Publisher<Err = Self::Err>,
  {
    FlatMap { source: self, func: f, max_publishers: Demand::max(max_publishers.max(1)) }
  }

  // ==================== Time ====================

  /// Emit a value only after `duration` passed without another one.
  fn debounce<S: Scheduler>(self, duration: Duration, scheduler: S) -> Debounce<Self, S>
  where
    Self::Item: Send,
  {
    Debounce { source: self, duration, scheduler }
  }

  /// Emit at most one value per window of `duration`.
  ///
  /// With `latest == false` the first value of a window goes out right away;
  /// with `latest == true` the newest value goes out when the window closes.
  fn throttle<S: Scheduler>(self, duration: Duration, scheduler: S, latest: bool) -> Throttle<Self, S> {
    Throttle { source: self, duration, scheduler, latest }
  }

  // ==================== Recover ====================

  /// Re-subscribe up to `count` more times after a failure.
  fn retry(self, count: usize) -> Retry<Self>
  where
    Self: Clone,
  {
    Retry { source: self, count }
  }

  /// Switch to the publisher `handler` builds from the failure.
  fn catch<P, F>(self, handler: F) -> Catch<Self, F>
  where
    F: FnOnce(Self::Err) -> P + Send + 'static,
    P: Publisher<Item = Self::Item>,
  {
    Catch { source: self, handler }
  }

  /// Turn a failure into one final `value` followed by completion.
  fn replace_error(self, value: Self::Item) -> ReplaceError<Self, Self::Item>
  where
    Self::Item: Clone,
  {
    ReplaceError { source: self, value }
  }

  // ==================== Context ====================

  /// Subscribe, request and cancel on `scheduler`.
  fn subscribe_on<S: Scheduler>(self, scheduler: S) -> SubscribeOn<Self, S> {
    SubscribeOn { source: self, scheduler }
  }

  /// Deliver values and the terminal event on `scheduler`, in order.
  fn receive_on<S: Scheduler>(self, scheduler: S) -> ReceiveOn<Self, S> {
    ReceiveOn { source: self, scheduler }
  }

  // ==================== Side effects ====================

  fn handle_events(self, hooks: EventHooks<Self::Item, Self::Err>) -> HandleEvents<Self> {
    HandleEvents { source: self, hooks }
  }

  /// Record every lifecycle event through `tracing` at debug level.
  fn log_events(self, label: impl Into<String>) -> HandleEvents<Self>
  where
    Self::Item: Debug,
    Self::Err: Debug,
  {
    self.handle_events(EventHooks::logging(label))
  }

  // ==================== Multicast ====================

  /// Share one upstream subscription among all subscribers, connecting on
  /// the first one and disconnecting when the last one cancels.
  fn share(self) -> Share<Self>
  where
    Self: Clone,
    Self::Item: Clone,
    Self::Err: Clone,
  {
    Share::new(self)
  }
}

impl<P: Publisher> PublisherExt for P {}

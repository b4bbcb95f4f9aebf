//! Source constructors
//!
//! Free functions that create the built-in publishers.
//!
//! | Function | Emits | Terminates |
//! |----------|-------|------------|
//! | [`from_iter`] | the iterator's items, on demand | completes when exhausted |
//! | [`just`] | one value | completes |
//! | [`empty`] | nothing | completes immediately |
//! | [`never`] | nothing | never |
//! | [`fail`] | nothing | fails immediately |
//! | [`create`] | whatever the closure sends | when the closure says so |
//! | [`future`] | one eagerly produced result, replayed | after the result |
//! | [`timer`] | `0` after a delay | completes |
//! | [`interval`] | `0, 1, 2, ...` every period | never |
//! | [`defer`] | a publisher built per subscription | as that publisher |
//!
//! Everything except `future` is cold: each subscription starts its own run.
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use rxflow::prelude::*;
//!
//! let seen = Arc::new(Mutex::new(vec![]));
//! let c = seen.clone();
//! from_iter(vec![1, 2, 3]).sink(move |v| c.lock().unwrap().push(v));
//! assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
//! ```

use std::time::Duration;

use crate::{
  publisher::{
    create::{Create, Emitter},
    defer::Defer,
    from_iter::{FromIter, Just},
    future::{EagerFuture, Promise},
    timer::{Interval, Timer},
    trivial::{Empty, Fail, Never},
    Publisher,
  },
  scheduler::Scheduler,
};

/// Emits every item of `iter`, pulling only as demand arrives.
pub fn from_iter<I>(iter: I) -> FromIter<I>
where
  I: IntoIterator,
{
  FromIter(iter)
}

/// Emits `value` once, then completes.
pub fn just<T>(value: T) -> Just<T> { FromIter(Some(value)) }

/// Completes immediately without emitting any values.
pub fn empty<T, E>() -> Empty<T, E> { Empty::new() }

/// Never emits and never terminates. Useful as a placeholder that only
/// cancellation can end.
pub fn never<T, E>() -> Never<T, E> { Never::new() }

/// Fails immediately with `error`.
pub fn fail<T, E>(error: E) -> Fail<T, E> { Fail::new(error) }

/// Publisher driven by `f`, which is called once per subscription with an
/// [`Emitter`].
///
/// ```rust
/// use std::sync::{Arc, Mutex};
///
/// use rxflow::prelude::*;
///
/// let seen = Arc::new(Mutex::new(vec![]));
/// let c = seen.clone();
/// create(|emitter: Emitter<&str, Infallible>| {
///   emitter.next("hello");
///   emitter.next("world");
///   emitter.complete();
/// })
/// .sink(move |v| c.lock().unwrap().push(v));
/// assert_eq!(*seen.lock().unwrap(), vec!["hello", "world"]);
/// ```
pub fn create<T, E, F>(f: F) -> Create<F, T, E>
where
  F: FnOnce(Emitter<T, E>),
{
  Create::new(f)
}

/// Runs `f` right away and replays the result it resolves to every
/// subscriber.
///
/// ```rust
/// use std::sync::{Arc, Mutex};
///
/// use rxflow::prelude::*;
///
/// let answer = future(|promise: Promise<i32, Infallible>| promise.resolve(Ok(42)));
/// let seen = Arc::new(Mutex::new(vec![]));
/// for _ in 0..2 {
///   let c = seen.clone();
///   answer.clone().sink(move |v| c.lock().unwrap().push(v));
/// }
/// assert_eq!(*seen.lock().unwrap(), vec![42, 42]);
/// ```
pub fn future<T, E>(f: impl FnOnce(Promise<T, E>)) -> EagerFuture<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  EagerFuture::new(f)
}

/// Emits `0` after `delay` on `scheduler`, then completes.
pub fn timer<S: Scheduler>(delay: Duration, scheduler: S) -> Timer<S> { Timer { delay, scheduler } }

/// Emits an increasing counter every `period` on `scheduler`.
///
/// On [`ImmediateScheduler`](crate::scheduler::ImmediateScheduler) the ticks
/// run on the subscribing thread, so subscribing blocks until the chain is
/// cancelled from inside.
pub fn interval<S: Scheduler>(period: Duration, scheduler: S) -> Interval<S> {
  Interval { period, scheduler }
}

/// Calls `f` on every subscription and subscribes to the publisher it returns.
pub fn defer<F, P>(f: F) -> Defer<F>
where
  F: FnOnce() -> P,
  P: Publisher,
{
  Defer(f)
}

//! Options for runtime-assembled stages.
//!
//! An [`OperatorConfig`] carries the parameters that
//! [`Stage`](crate::pipeline::Stage) constructors read. Each constructor
//! names the options it needs and fails with
//! [`OperatorFailure::MissingOption`] when one is absent; options it does not
//! read are ignored, so one config can feed several stages.

use std::{any::Any, fmt, sync::Arc, time::Duration};

use crate::{
  error::OperatorFailure,
  ops::PublisherExt,
  pipeline::{DynValue, TypeTag},
  publisher::{AnyPublisher, Publisher},
  scheduler::{AnyScheduler, Scheduler},
};

type Erased = AnyPublisher<DynValue, DynValue>;

/// A type-checked predicate over erased items.
#[derive(Clone)]
pub(crate) struct Predicate {
  pub(crate) item: TypeTag,
  test: Arc<dyn Fn(&DynValue) -> bool + Send + Sync>,
}

impl Predicate {
  pub(crate) fn test(&self, value: &DynValue) -> bool { (self.test)(value) }
}

/// Builds the replacement publisher for `catch` from an erased failure.
#[derive(Clone)]
pub(crate) struct RecoveryFactory {
  pub(crate) error: TypeTag,
  pub(crate) item: TypeTag,
  pub(crate) failure: Option<TypeTag>,
  build: Arc<dyn Fn(DynValue) -> Erased + Send + Sync>,
}

impl RecoveryFactory {
  pub(crate) fn recover(&self, err: DynValue) -> Erased { (self.build)(err) }
}

/// Builder of stage options.
///
/// ```rust
/// use std::time::Duration;
///
/// use rxflow::prelude::*;
///
/// let config = OperatorConfig::new()
///   .window_duration(Duration::from_millis(300))
///   .scheduler(ImmediateScheduler);
/// assert!(Stage::debounce(&config).is_ok());
/// assert!(Stage::retry(&config).is_err());
/// ```
#[derive(Clone, Default)]
pub struct OperatorConfig {
  window_duration: Option<Duration>,
  scheduler: Option<AnyScheduler>,
  predicate: Option<Predicate>,
  retry_count: Option<usize>,
  recovery_factory: Option<RecoveryFactory>,
  latest: bool,
}

impl OperatorConfig {
  pub fn new() -> Self { Self::default() }

  /// Window of `debounce` and `throttle`.
  pub fn window_duration(mut self, duration: Duration) -> Self {
    self.window_duration = Some(duration);
    self
  }

  /// Scheduler of the time-based stages and of `receive_on`.
  pub fn scheduler(mut self, scheduler: impl Scheduler) -> Self {
    self.scheduler = Some(AnyScheduler::new(scheduler));
    self
  }

  /// Predicate of `first_where`.
  pub fn predicate<A, F>(mut self, predicate: F) -> Self
  where
    A: Any,
    F: Fn(&A) -> bool + Send + Sync + 'static,
  {
    let test = move |v: &DynValue| v.downcast_ref::<A>().is_some_and(&predicate);
    self.predicate = Some(Predicate { item: TypeTag::of::<A>(), test: Arc::new(test) });
    self
  }

  /// Extra attempts of `retry`.
  pub fn retry_count(mut self, count: usize) -> Self {
    self.retry_count = Some(count);
    self
  }

  /// Replacement publisher of `catch`, built from the failure.
  pub fn recovery_factory<E, P, F>(mut self, factory: F) -> Self
  where
    E: Any + Clone,
    P: Publisher + Clone,
    P::Item: Clone + Sync,
    P::Err: Clone + Sync,
    F: Fn(E) -> P + Send + Sync + 'static,
  {
    let build = move |err: DynValue| -> Erased {
      match err.downcast::<E>() {
        Some(err) => factory(err).map(DynValue::new).map_err(DynValue::new).erase(),
        None => unreachable!("catch admitted a failure that is not a {}", TypeTag::of::<E>().name()),
      }
    };
    self.recovery_factory = Some(RecoveryFactory {
      error: TypeTag::of::<E>(),
      item: TypeTag::of::<P::Item>(),
      failure: TypeTag::failure_of::<P::Err>(),
      build: Arc::new(build),
    });
    self
  }

  /// `throttle` emits the newest value of a window instead of the first.
  pub fn latest(mut self, latest: bool) -> Self {
    self.latest = latest;
    self
  }

  pub(crate) fn require_window_duration(&self, stage: &str) -> Result<Duration, OperatorFailure> {
    self.window_duration.ok_or_else(|| missing(stage, "window_duration"))
  }

  pub(crate) fn require_scheduler(&self, stage: &str) -> Result<AnyScheduler, OperatorFailure> {
    self.scheduler.clone().ok_or_else(|| missing(stage, "scheduler"))
  }

  pub(crate) fn require_predicate(&self, stage: &str) -> Result<Predicate, OperatorFailure> {
    self.predicate.clone().ok_or_else(|| missing(stage, "predicate"))
  }

  pub(crate) fn require_retry_count(&self, stage: &str) -> Result<usize, OperatorFailure> {
    self.retry_count.ok_or_else(|| missing(stage, "retry_count"))
  }

  pub(crate) fn require_recovery_factory(&self, stage: &str) -> Result<RecoveryFactory, OperatorFailure> {
    self.recovery_factory.clone().ok_or_else(|| missing(stage, "recovery_factory"))
  }

  pub(crate) fn latest_flag(&self) -> bool { self.latest }
}

fn missing(stage: &str, option: &'static str) -> OperatorFailure {
  OperatorFailure::MissingOption { stage: stage.into(), option }
}

impl fmt::Debug for OperatorConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("OperatorConfig")
      .field("window_duration", &self.window_duration)
      .field("scheduler", &self.scheduler)
      .field("predicate", &self.predicate.as_ref().map(|p| p.item))
      .field("retry_count", &self.retry_count)
      .field("recovery_factory", &self.recovery_factory.as_ref().map(|r| r.error))
      .field("latest", &self.latest)
      .finish()
  }
}

//! Pipeline assembly
//!
//! Chains are normally assembled statically: every operator method wraps the
//! publisher before it, and the compiler checks that item and error types
//! line up. [`subscribe`] attaches the consumer and hands back the
//! [`CancellationToken`] for the whole chain.
//!
//! When the shape of a chain is only known at runtime, [`Assembly`] links
//! type-erased [`Stage`]s instead. Each stage declares the item type it
//! accepts and what it does to the error channel, and the checks the compiler
//! would have made run in [`Assembly::build`], before anything is subscribed.
//!
//! ```rust
//! use rxflow::prelude::*;
//!
//! # fn main() -> Result<(), OperatorFailure> {
//! let doubled = Assembly::new(from_iter(1..=3))
//!   .stage(Stage::map(|v: i32| v * 2))
//!   .build::<i32, Infallible>()?;
//!
//! let rejected = Assembly::new(from_iter(1..=3))
//!   .stage(Stage::map(|s: String| s.len()))
//!   .build::<usize, Infallible>();
//! assert!(matches!(rejected, Err(OperatorFailure::TypeMismatch { .. })));
//! # drop(doubled);
//! # Ok(())
//! # }
//! ```

use std::{
  any::{type_name, Any, TypeId},
  convert::Infallible,
  fmt,
  sync::Arc,
};

use crate::{
  config::OperatorConfig,
  demand::Demand,
  error::OperatorFailure,
  ops::PublisherExt,
  publisher::{AnyPublisher, Publisher},
  subscriber::Subscriber,
  subscription::{CancellationToken, SubscriptionRef},
};

/// Attach `subscriber` to `publisher` and return the token that cancels the
/// chain.
pub fn subscribe<P, S>(publisher: P, subscriber: S) -> CancellationToken
where
  P: Publisher,
  S: Subscriber<P::Item, P::Err>,
{
  let token = CancellationToken::new();
  publisher.actual_subscribe(Tracked { downstream: subscriber, token: token.clone() });
  token
}

/// Cancel the chain behind `token`. Idempotent.
pub fn cancel(token: &CancellationToken) { token.cancel() }

/// Binds the chain's head subscription to the token and releases the token
/// once the chain terminates on its own.
struct Tracked<S> {
  downstream: S,
  token: CancellationToken,
}

impl<Item, Err, S> Subscriber<Item, Err> for Tracked<S>
where
  S: Subscriber<Item, Err>,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.token.bind(subscription.clone());
    self.downstream.on_subscribe(subscription);
  }

  #[inline]
  fn on_value(&mut self, value: Item) -> Demand { self.downstream.on_value(value) }

  fn on_completed(&mut self) {
    self.token.release();
    self.downstream.on_completed();
  }

  fn on_failed(&mut self, err: Err) {
    self.token.release();
    self.downstream.on_failed(err);
  }
}

// ==================== Dynamic assembly ====================

/// Identity and readable name of a Rust type.
#[derive(Clone, Copy)]
pub struct TypeTag {
  id: TypeId,
  name: &'static str,
}

impl TypeTag {
  pub fn of<T: 'static>() -> Self { TypeTag { id: TypeId::of::<T>(), name: type_name::<T>() } }

  pub fn name(&self) -> &'static str { self.name }

  /// Tag of a failure type, `None` for `Infallible`.
  pub(crate) fn failure_of<E: 'static>() -> Option<Self> {
    if TypeId::of::<E>() == TypeId::of::<Infallible>() {
      None
    } else {
      Some(TypeTag::of::<E>())
    }
  }
}

impl PartialEq for TypeTag {
  fn eq(&self, other: &Self) -> bool { self.id == other.id }
}

impl Eq for TypeTag {}

impl fmt::Debug for TypeTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name) }
}

/// A type-erased item or failure travelling through an assembled chain.
#[derive(Clone)]
pub struct DynValue(Arc<dyn Any + Send + Sync>);

impl DynValue {
  pub fn new<T: Any + Send + Sync>(value: T) -> Self { DynValue(Arc::new(value)) }

  pub fn downcast_ref<T: Any>(&self) -> Option<&T> { self.0.downcast_ref() }

  pub fn downcast<T: Any + Clone>(&self) -> Option<T> { self.downcast_ref::<T>().cloned() }
}

impl fmt::Debug for DynValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("DynValue") }
}

/// Recover a value whose type `Assembly` has already checked.
fn unerase<T: Any + Clone>(value: DynValue) -> T {
  match value.downcast::<T>() {
    Some(value) => value,
    None => unreachable!("assembly admitted a value that is not a {}", type_name::<T>()),
  }
}

type Erased = AnyPublisher<DynValue, DynValue>;

/// What flows out of the stages linked so far.
#[derive(Clone, Copy, Debug)]
struct Shape {
  item: TypeTag,
  /// `None` while the chain cannot fail.
  failure: Option<TypeTag>,
}

impl Shape {
  fn expect_item(&self, stage: &str, expected: TypeTag) -> Result<(), OperatorFailure> {
    if self.item == expected {
      Ok(())
    } else {
      Err(OperatorFailure::TypeMismatch { stage: stage.into(), expected: expected.name, found: self.item.name })
    }
  }
}

type Apply = Box<dyn FnOnce(Erased, &mut Shape) -> Result<Erased, OperatorFailure> + Send>;

/// One operator of a dynamically assembled chain.
pub struct Stage {
  name: &'static str,
  apply: Apply,
}

impl fmt::Debug for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.debug_tuple("Stage").field(&self.name).finish() }
}

impl Stage {
  fn new(
    name: &'static str, apply: impl FnOnce(Erased, &mut Shape) -> Result<Erased, OperatorFailure> + Send + 'static,
  ) -> Self {
    Stage { name, apply: Box::new(apply) }
  }

  pub fn name(&self) -> &'static str { self.name }

  pub fn map<A, B, F>(f: F) -> Self
  where
    A: Any + Clone + Send + Sync,
    B: Any + Send + Sync,
    F: Fn(A) -> B + Clone + Send + Sync + 'static,
  {
    Stage::new("map", move |publisher, shape| {
      shape.expect_item("map", TypeTag::of::<A>())?;
      shape.item = TypeTag::of::<B>();
      Ok(publisher.map(move |v| DynValue::new(f(unerase::<A>(v)))).erase())
    })
  }

  pub fn filter<A, F>(predicate: F) -> Self
  where
    A: Any,
    F: Fn(&A) -> bool + Clone + Send + Sync + 'static,
  {
    Stage::new("filter", move |publisher, shape| {
      shape.expect_item("filter", TypeTag::of::<A>())?;
      Ok(publisher.filter(move |v| v.downcast_ref::<A>().is_some_and(&predicate)).erase())
    })
  }

  pub fn remove_duplicates<A>() -> Self
  where
    A: Any + PartialEq,
  {
    Stage::new("remove_duplicates", |publisher, shape| {
      shape.expect_item("remove_duplicates", TypeTag::of::<A>())?;
      let eq = |a: &DynValue, b: &DynValue| a.downcast_ref::<A>() == b.downcast_ref::<A>();
      Ok(publisher.remove_duplicates_by(eq).erase())
    })
  }

  pub fn prefix(count: usize) -> Self { Stage::new("prefix", move |publisher, _| Ok(publisher.prefix(count).erase())) }

  /// `first_where` with the config's `predicate`.
  pub fn first_where(config: &OperatorConfig) -> Result<Self, OperatorFailure> {
    let predicate = config.require_predicate("first_where")?;
    Ok(Stage::new("first_where", move |publisher, shape| {
      shape.expect_item("first_where", predicate.item)?;
      Ok(publisher.first_where(move |v| predicate.test(v)).erase())
    }))
  }

  /// `debounce` with the config's `window_duration` and `scheduler`.
  pub fn debounce(config: &OperatorConfig) -> Result<Self, OperatorFailure> {
    let duration = config.require_window_duration("debounce")?;
    let scheduler = config.require_scheduler("debounce")?;
    Ok(Stage::new("debounce", move |publisher, _| Ok(publisher.debounce(duration, scheduler).erase())))
  }

  /// `throttle` with the config's `window_duration`, `scheduler` and `latest`.
  pub fn throttle(config: &OperatorConfig) -> Result<Self, OperatorFailure> {
    let duration = config.require_window_duration("throttle")?;
    let scheduler = config.require_scheduler("throttle")?;
    let latest = config.latest_flag();
    Ok(Stage::new("throttle", move |publisher, _| {
      Ok(publisher.throttle(duration, scheduler, latest).erase())
    }))
  }

  /// `receive_on` the config's `scheduler`.
  pub fn receive_on(config: &OperatorConfig) -> Result<Self, OperatorFailure> {
    let scheduler = config.require_scheduler("receive_on")?;
    Ok(Stage::new("receive_on", move |publisher, _| Ok(publisher.receive_on(scheduler).erase())))
  }

  /// `retry` the config's `retry_count` times.
  pub fn retry(config: &OperatorConfig) -> Result<Self, OperatorFailure> {
    let count = config.require_retry_count("retry")?;
    Ok(Stage::new("retry", move |publisher, _| Ok(publisher.retry(count).erase())))
  }

  /// `catch` with the config's `recovery_factory`. The chain's failure type
  /// becomes the recovery publisher's.
  pub fn catch(config: &OperatorConfig) -> Result<Self, OperatorFailure> {
    let recovery = config.require_recovery_factory("catch")?;
    Ok(Stage::new("catch", move |publisher, shape| {
      if let Some(failure) = shape.failure {
        if failure != recovery.error {
          return Err(OperatorFailure::TypeMismatch {
            stage: "catch".into(),
            expected: recovery.error.name,
            found: failure.name,
          });
        }
      }
      shape.expect_item("catch", recovery.item)?;
      shape.failure = recovery.failure;
      Ok(publisher.catch(move |err| recovery.recover(err)).erase())
    }))
  }

  /// Replace a failure with `value`. The chain cannot fail afterwards.
  pub fn replace_error<A>(value: A) -> Self
  where
    A: Any + Clone + Send + Sync,
  {
    Stage::new("replace_error", move |publisher, shape| {
      shape.expect_item("replace_error", TypeTag::of::<A>())?;
      shape.failure = None;
      Ok(publisher.replace_error(DynValue::new(value)).set_failure_type::<DynValue>().erase())
    })
  }

  /// Declare the failure type `E` on a chain that cannot fail.
  pub fn set_failure_type<E: Any>() -> Self {
    Stage::new("set_failure_type", |publisher, shape| {
      if shape.failure.is_some() {
        return Err(OperatorFailure::FailureNotHandled { stage: "set_failure_type".into() });
      }
      shape.failure = Some(TypeTag::of::<E>());
      Ok(publisher)
    })
  }
}

/// Links [`Stage`]s onto a source at runtime.
///
/// The first rejected stage is remembered and later stages are skipped;
/// [`build`](Assembly::build) reports it.
pub struct Assembly {
  publisher: Erased,
  shape: Shape,
  rejected: Option<OperatorFailure>,
}

impl Assembly {
  pub fn new<P>(source: P) -> Self
  where
    P: Publisher + Clone,
    P::Item: Clone + Sync,
    P::Err: Clone + Sync,
  {
    Assembly {
      publisher: source.map(DynValue::new).map_err(DynValue::new).erase(),
      shape: Shape { item: TypeTag::of::<P::Item>(), failure: TypeTag::failure_of::<P::Err>() },
      rejected: None,
    }
  }

  pub fn stage(mut self, stage: Stage) -> Self {
    if self.rejected.is_some() {
      return self;
    }
    let Stage { name, apply } = stage;
    let publisher = self.publisher.clone();
    match apply(publisher, &mut self.shape) {
      Ok(publisher) => self.publisher = publisher,
      Err(failure) => {
        tracing::warn!(stage = name, %failure, "pipeline assembly rejected a stage");
        self.rejected = Some(failure);
      }
    }
    self
  }

  /// Check the chain produces `T` and fails with `E` (`Infallible` for a
  /// chain that must not fail), and return it as a typed publisher.
  pub fn build<T, E>(self) -> Result<AnyPublisher<T, E>, OperatorFailure>
  where
    T: Any + Clone + Send + Sync,
    E: Any + Clone + Send + Sync,
  {
    if let Some(failure) = self.rejected {
      return Err(failure);
    }
    let Shape { item, failure } = self.shape;
    if item != TypeTag::of::<T>() {
      return Err(output_mismatch(type_name::<T>(), item.name));
    }
    match failure {
      Some(found) if TypeId::of::<E>() == TypeId::of::<Infallible>() => {
        let failure = OperatorFailure::FailureNotHandled { stage: "build".into() };
        tracing::warn!(%failure, error = found.name, "pipeline assembly rejected the output");
        return Err(failure);
      }
      Some(found) if found != TypeTag::of::<E>() => {
        return Err(output_mismatch(type_name::<E>(), found.name));
      }
      _ => {}
    }
    Ok(self.publisher.map(unerase::<T>).map_err(unerase::<E>).erase())
  }
}

fn output_mismatch(expected: &str, found: &str) -> OperatorFailure {
  let failure = OperatorFailure::OutputMismatch { expected: expected.into(), found: found.into() };
  tracing::warn!(%failure, "pipeline assembly rejected the output");
  failure
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use crate::{prelude::*, subscriber::recorder::Recorder};

  #[rxflow_macro::test]
  fn cancel_is_idempotent() {
    let subject = PassthroughSubject::<i32, Infallible>::new();
    let recorder = Recorder::unlimited();
    let token = subject.clone().map(|v| v + 1).subscribe(recorder.clone());
    subject.send(1);
    cancel(&token);
    cancel(&token);
    subject.send(2);
    assert_eq!(recorder.values(), vec![2]);
    assert_eq!(subject.subscriber_count(), 0);
  }

  #[rxflow_macro::test]
  fn cancel_after_completion_is_a_no_op() {
    let recorder = Recorder::unlimited();
    let token = from_iter([1]).subscribe(recorder.clone());
    assert!(token.is_closed());
    token.cancel();
    assert!(!token.is_cancelled());
    assert_eq!(recorder.events(), vec![Event::Value(1), Event::Completed]);
  }

  #[rxflow_macro::test]
  fn cancel_reaches_every_branch() {
    let a = PassthroughSubject::<i32, Infallible>::new();
    let b = PassthroughSubject::<i32, Infallible>::new();
    let token = a.clone().merge(b.clone()).filter(|v| v % 2 == 0).sink(|_| {});
    assert_eq!((a.subscriber_count(), b.subscriber_count()), (1, 1));
    token.cancel();
    assert_eq!((a.subscriber_count(), b.subscriber_count()), (0, 0));
  }

  #[rxflow_macro::test]
  fn assembled_chain_runs() {
    let chain = Assembly::new(from_iter(1..=4))
      .stage(Stage::map(|v: i32| v * 10))
      .stage(Stage::filter(|v: &i32| *v > 10))
      .stage(Stage::map(|v: i32| v.to_string()))
      .build::<String, Infallible>()
      .unwrap();
    let recorder = Recorder::unlimited();
    chain.subscribe(recorder.clone());
    assert_eq!(recorder.values(), vec!["20", "30", "40"]);
  }

  #[rxflow_macro::test]
  fn mismatched_stage_is_rejected() {
    let failure = Assembly::new(from_iter(1..=4))
      .stage(Stage::map(|s: String| s.len()))
      .stage(Stage::prefix(1))
      .build::<usize, Infallible>()
      .unwrap_err();
    match failure {
      OperatorFailure::TypeMismatch { stage, expected, found } => {
        assert_eq!(stage, "map");
        assert!(expected.ends_with("String"));
        assert_eq!(found, "i32");
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[rxflow_macro::test]
  fn failing_chain_needs_handling() {
    let unhandled = Assembly::new(fail::<i32, &'static str>("down"))
      .stage(Stage::set_failure_type::<String>())
      .build::<i32, String>();
    assert_eq!(unhandled.unwrap_err(), OperatorFailure::FailureNotHandled { stage: "set_failure_type".into() });

    let handled = Assembly::new(fail::<i32, &'static str>("down"))
      .stage(Stage::replace_error(0))
      .stage(Stage::set_failure_type::<String>())
      .build::<i32, String>()
      .unwrap();
    let recorder = Recorder::unlimited();
    handled.subscribe(recorder.clone());
    assert_eq!(recorder.events(), vec![Event::Value(0), Event::Completed]);
  }

  #[rxflow_macro::test]
  fn output_types_are_checked() {
    let wrong_item = Assembly::new(just(1)).build::<String, Infallible>();
    assert!(matches!(wrong_item, Err(OperatorFailure::OutputMismatch { .. })));

    let can_fail = Assembly::new(fail::<i32, &'static str>("x")).build::<i32, Infallible>();
    assert_eq!(can_fail.unwrap_err(), OperatorFailure::FailureNotHandled { stage: "build".into() });
  }

  #[rxflow_macro::test]
  fn config_driven_stages() {
    assert_eq!(
      Stage::debounce(&OperatorConfig::new()).unwrap_err(),
      OperatorFailure::MissingOption { stage: "debounce".into(), option: "window_duration" }
    );

    TestScheduler::init();
    let config = OperatorConfig::new()
      .window_duration(Duration::from_millis(100))
      .scheduler(TestScheduler)
      .recovery_factory(|_: &'static str| just(-1));
    let subject = PassthroughSubject::<i32, &'static str>::new();
    let chain = Assembly::new(subject.clone())
      .stage(Stage::debounce(&config).unwrap())
      .stage(Stage::catch(&config).unwrap())
      .build::<i32, Infallible>()
      .unwrap();
    let recorder = Recorder::unlimited();
    chain.subscribe(recorder.clone());

    subject.send(1);
    subject.send(2);
    TestScheduler::advance_by(Duration::from_millis(100));
    subject.send_completion(Completion::Failed("lost"));
    assert_eq!(recorder.events(), vec![Event::Value(2), Event::Value(-1), Event::Completed]);
  }

  #[rxflow_macro::test]
  fn predicate_type_is_checked() {
    let config = OperatorConfig::new().predicate(|s: &String| s.is_empty());
    let failure = Assembly::new(from_iter(1..=3))
      .stage(Stage::first_where(&config).unwrap())
      .build::<i32, Infallible>()
      .unwrap_err();
    assert!(matches!(failure, OperatorFailure::TypeMismatch { stage, .. } if stage == "first_where"));

    let config = OperatorConfig::new().predicate(|v: &i32| *v > 1).retry_count(2);
    let chain = Assembly::new(from_iter(1..=3))
      .stage(Stage::retry(&config).unwrap())
      .stage(Stage::first_where(&config).unwrap())
      .build::<i32, Infallible>()
      .unwrap();
    let recorder = Recorder::unlimited();
    chain.subscribe(recorder.clone());
    assert_eq!(recorder.events(), vec![Event::Value(2), Event::Completed]);
  }
}

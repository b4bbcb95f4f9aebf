//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

pub use std::convert::Infallible;

// Protocol
pub use crate::demand::Demand;
pub use crate::publisher::{AnyPublisher, Publisher};
pub use crate::subscriber::{Assign, BoxedSubscriber, Completion, Event, Sink, Subscriber};
pub use crate::subscription::*;
// Sources
pub use crate::factory::*;
pub use crate::publisher::{create::Emitter, future::Promise};
// Operators
pub use crate::ops::{
  handle_events::EventHooks,
  into_stream::{FirstValue, PublisherStream},
  PublisherExt,
};
// Schedulers
#[cfg(feature = "futures-scheduler")]
pub use crate::scheduler::{MainScheduler, ThreadPoolScheduler};
#[cfg(feature = "tokio-scheduler")]
pub use crate::scheduler::TokioScheduler;
pub use crate::scheduler::{
  AnyScheduler, ImmediateScheduler, Scheduler, Task, TaskHandle, TaskState, TaskStatus,
  TestScheduler,
};
// Subjects
pub use crate::{
  published::Published,
  subject::{CurrentValueSubject, PassthroughSubject},
};
// Runtime assembly
pub use crate::{
  config::OperatorConfig,
  error::{OperatorFailure, StreamError},
  pipeline::{cancel, subscribe, Assembly, DynValue, Stage, TypeTag},
};

//! # rxflow: demand-driven reactive streams
//!
//! A [`Publisher`](publisher::Publisher) emits values to a
//! [`Subscriber`](subscriber::Subscriber), but only as many as the subscriber
//! asked for through its [`Subscription`](subscription::Subscription).
//! Operators chain publishers into pipelines, subjects bridge imperative code
//! into them, and schedulers decide where and when work runs.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use rxflow::prelude::*;
//!
//! let seen = Arc::new(Mutex::new(vec![]));
//! let c = seen.clone();
//! let token = from_iter(0..10)
//!   .filter(|v| v % 2 == 0)
//!   .map(|v| v * 2)
//!   .sink(move |v| c.lock().unwrap().push(v));
//!
//! assert_eq!(*seen.lock().unwrap(), vec![0, 4, 8, 12, 16]);
//! assert!(token.is_closed());
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Publisher`] | Produces values under demand, then at most one terminal event |
//! | [`Subscriber`] | Consumes values and returns additional [`Demand`] |
//! | [`Subscription`] | Grants demand to, or cancels, one publisher |
//! | [`CancellationToken`] | Tears down a whole chain, exactly once |
//! | [`PassthroughSubject`] / [`CurrentValueSubject`] | Push values in from imperative code |
//! | [`Scheduler`] | Runs tasks now, later or elsewhere |
//! | [`Assembly`] | Links operators chosen at runtime, type-checked before use |
//!
//! ## Feature Flags
//!
//! - **`futures-scheduler`** (default): thread pool and main-thread
//!   schedulers on `futures`' executors
//! - **`timer`** (default): real-time delays for those schedulers
//! - **`tokio-scheduler`**: a scheduler that spawns onto a Tokio runtime
//!
//! [`Publisher`]: publisher::Publisher
//! [`Subscriber`]: subscriber::Subscriber
//! [`Subscription`]: subscription::Subscription
//! [`Demand`]: demand::Demand
//! [`CancellationToken`]: subscription::CancellationToken
//! [`PassthroughSubject`]: subject::PassthroughSubject
//! [`CurrentValueSubject`]: subject::CurrentValueSubject
//! [`Scheduler`]: scheduler::Scheduler
//! [`Assembly`]: pipeline::Assembly

pub mod config;
pub mod demand;
pub mod error;
pub mod factory;
pub mod ops;
pub mod pipeline;
pub mod prelude;
pub mod published;
pub mod publisher;
pub(crate) mod relay;
pub mod scheduler;
pub mod subject;
pub mod subscriber;
pub mod subscription;

pub use prelude::*;

#[cfg(doctest)]
mod __markdown_doctests {
  mod readme {
    #![doc = include_str!("../README.md")]
  }
}

//! courier-core
//!
//! Priority-aware HTTP task dispatch with retry, plus queue routing and
//! provisioning.
//!
//! # Modules
//! - **domain**: task submissions, history entries, queue metadata, priority
//! - **queue**: pending-task store, backoff policy, execution history log
//! - **ports**: traits for external collaborators (HttpSink, TokenProvider, QueueAdmin, AppConfigSource, Clock)
//! - **app**: dispatcher, builder, executor, decider, middleware
//! - **routing**: queue resolver, template substitution, provisioner
//! - **impls**: reqwest / metadata server / Cloud Tasks / in-memory adapters
//! - **config**: environment-driven configuration

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod queue;
pub mod routing;

pub use app::{Dispatcher, DispatcherBuilder, DispatcherStatus};
pub use config::CourierConfig;
pub use error::{CourierError, Result};
pub use routing::{QueueProvisioner, QueueResolver};

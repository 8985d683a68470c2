//! App - the dispatcher and the pieces it is wired from.
//!
//! - **Dispatcher**: scan loop, submission, listing and status
//! - **DispatcherBuilder**: wiring with in-memory defaults
//! - **TaskExecutor**: one HTTP attempt (headers, identity token, timeout)
//! - **Decider**: success / retry / give-up policy
//! - **middleware**: retry and logging wrappers for management calls

pub mod builder;
pub mod decider;
pub mod dispatcher;
pub mod executor;
pub mod middleware;
pub mod status;

pub use self::builder::DispatcherBuilder;
pub use self::decider::{AttemptReport, Decider, Decision, DefaultDecider};
pub use self::dispatcher::{Dispatcher, HISTORY_BODY_LIMIT};
pub use self::executor::TaskExecutor;
pub use self::status::DispatcherStatus;

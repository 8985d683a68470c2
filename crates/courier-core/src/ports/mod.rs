//! Ports: traits for the collaborators courier talks to.
//!
//! Each trait hides one external system (target endpoints, token issuer,
//! queue-management service, app configuration service) or an ambient
//! dependency (clock, id generation) so tests can substitute fakes.

pub mod app_config;
pub mod clock;
pub mod http_sink;
pub mod id_generator;
pub mod queue_admin;
pub mod token_provider;

pub use self::app_config::{Accounting, AppConfigBody, AppConfigDocument, AppConfigSource};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::http_sink::{
    DispatchRequest, DispatchResponse, HttpSink, SinkFactory, TransportError, shared_sink,
};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::queue_admin::QueueAdmin;
pub use self::token_provider::{NoTokenProvider, TokenProvider};

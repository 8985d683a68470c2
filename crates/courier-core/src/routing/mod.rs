//! Queue routing: logical category -> physical queue, and making sure the
//! queues a pipeline needs actually exist.
//!
//! - **resolver**: pure lookup of queue name and API endpoint
//! - **provisioner**: idempotent create-if-absent for pipeline queues
//! - **template**: `{token}` / `${token}` substitution

pub mod cache;
pub mod pipeline;
pub mod provisioner;
pub mod resolver;
pub mod template;

pub use self::cache::TtlCache;
pub use self::pipeline::{PipelineDefinition, PipelineTask, RESERVED_QUEUE_NAMES, is_reserved};
pub use self::provisioner::{
    ProvisionOutcome, ProvisioningResult, QueueProvisionEntry, QueueProvisioner,
    generate_variants,
};
pub use self::resolver::{
    AppContext, AppRoutes, QueueResolver, QueueRoute, QueueValue, ResolverConfig,
};
pub use self::template::{
    FALLBACK_APP_ID, FALLBACK_BUSINESS_UNIT, FALLBACK_SOLUTION_CODE, QueueTokenSet,
    placeholders, substitute,
};

//! IdGenerator port: task name generation.

use std::sync::Arc;

use ulid::Ulid;

use crate::ports::Clock;

/// Generates names for tasks submitted without one.
pub trait IdGenerator: Send + Sync {
    fn task_name(&self) -> String;
}

/// ULID-based generator.
///
/// The timestamp half comes from the injected clock, so names sort by
/// submission time and a `FixedClock` pins the prefix in tests.
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl IdGenerator for UlidGenerator {
    fn task_name(&self) -> String {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        format!("task-{ulid}")
    }
}

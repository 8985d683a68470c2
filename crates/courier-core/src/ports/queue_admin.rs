//! QueueAdmin port: management calls against the backing task-queue service.

use async_trait::async_trait;

use crate::domain::QueueDescriptor;
use crate::error::Result;

/// Queue lifecycle operations.
///
/// Boolean results report whether the call changed anything: `create_queue`
/// returns `false` when the queue already existed, `delete_queue` / `pause_queue`
/// / `resume_queue` return `false` when the queue was not found.
#[async_trait]
pub trait QueueAdmin: Send + Sync {
    async fn queue_exists(&self, name: &str, location: &str) -> Result<bool>;

    async fn create_queue(&self, descriptor: &QueueDescriptor) -> Result<bool>;

    async fn list_queues(&self, location: &str) -> Result<Vec<String>>;

    async fn delete_queue(&self, name: &str, location: &str) -> Result<bool>;

    async fn pause_queue(&self, name: &str, location: &str) -> Result<bool>;

    async fn resume_queue(&self, name: &str, location: &str) -> Result<bool>;
}

//! EmulatedQueueAdmin - in-process queue-management backend.
//!
//! Used for local development and tests: queues live in a map keyed by
//! `(location, name)` and vanish with the process.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{QueueDescriptor, QueueState};
use crate::error::Result;
use crate::ports::QueueAdmin;

type QueueKey = (String, String);

#[derive(Default)]
pub struct EmulatedQueueAdmin {
    queues: Mutex<BTreeMap<QueueKey, QueueDescriptor>>,
}

impl EmulatedQueueAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored descriptor, if the queue exists.
    pub async fn descriptor(&self, name: &str, location: &str) -> Option<QueueDescriptor> {
        self.queues.lock().await.get(&key(name, location)).cloned()
    }

    async fn set_state(&self, name: &str, location: &str, state: QueueState) -> bool {
        let mut queues = self.queues.lock().await;
        match queues.get_mut(&key(name, location)) {
            Some(queue) => {
                queue.state = state;
                true
            }
            None => false,
        }
    }
}

fn key(name: &str, location: &str) -> QueueKey {
    (location.to_string(), name.to_string())
}

#[async_trait]
impl QueueAdmin for EmulatedQueueAdmin {
    async fn queue_exists(&self, name: &str, location: &str) -> Result<bool> {
        Ok(self.queues.lock().await.contains_key(&key(name, location)))
    }

    async fn create_queue(&self, descriptor: &QueueDescriptor) -> Result<bool> {
        let mut queues = self.queues.lock().await;
        let k = key(&descriptor.name, &descriptor.location);
        if queues.contains_key(&k) {
            return Ok(false);
        }
        debug!(queue = %descriptor.name, location = %descriptor.location, "emulated queue created");
        queues.insert(k, descriptor.clone());
        Ok(true)
    }

    async fn list_queues(&self, location: &str) -> Result<Vec<String>> {
        let queues = self.queues.lock().await;
        Ok(queues
            .keys()
            .filter(|(loc, _)| loc == location)
            .map(|(_, name)| name.clone())
            .collect())
    }

    async fn delete_queue(&self, name: &str, location: &str) -> Result<bool> {
        Ok(self
            .queues
            .lock()
            .await
            .remove(&key(name, location))
            .is_some())
    }

    async fn pause_queue(&self, name: &str, location: &str) -> Result<bool> {
        Ok(self.set_state(name, location, QueueState::Paused).await)
    }

    async fn resume_queue(&self, name: &str, location: &str) -> Result<bool> {
        Ok(self.set_state(name, location, QueueState::Running).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(name: &str, location: &str) -> QueueDescriptor {
        QueueDescriptor::new(name, location, "local-project")
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let admin = EmulatedQueueAdmin::new();
        assert!(!admin.queue_exists("q", "us").await.unwrap());
        assert!(admin.create_queue(&queue("q", "us")).await.unwrap());
        assert!(!admin.create_queue(&queue("q", "us")).await.unwrap());
        assert!(admin.queue_exists("q", "us").await.unwrap());
    }

    #[tokio::test]
    async fn queues_are_scoped_by_location() {
        let admin = EmulatedQueueAdmin::new();
        admin.create_queue(&queue("b", "us")).await.unwrap();
        admin.create_queue(&queue("a", "us")).await.unwrap();
        admin.create_queue(&queue("a", "eu")).await.unwrap();

        assert_eq!(admin.list_queues("us").await.unwrap(), vec!["a", "b"]);
        assert_eq!(admin.list_queues("eu").await.unwrap(), vec!["a"]);
        assert!(!admin.queue_exists("b", "eu").await.unwrap());
    }

    #[tokio::test]
    async fn pause_resume_and_delete() {
        let admin = EmulatedQueueAdmin::new();
        admin.create_queue(&queue("q", "us")).await.unwrap();

        assert!(admin.pause_queue("q", "us").await.unwrap());
        assert_eq!(
            admin.descriptor("q", "us").await.unwrap().state,
            QueueState::Paused
        );
        assert!(admin.resume_queue("q", "us").await.unwrap());
        assert_eq!(
            admin.descriptor("q", "us").await.unwrap().state,
            QueueState::Running
        );

        assert!(admin.delete_queue("q", "us").await.unwrap());
        assert!(!admin.delete_queue("q", "us").await.unwrap());
        assert!(!admin.pause_queue("q", "us").await.unwrap());
    }
}

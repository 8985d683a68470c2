//! In-memory task store.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{TaskQueueStore, TaskRecord};
use crate::domain::TaskSummary;
use crate::error::Result;

/// Heap entry ordered by due time.
///
/// Ordering is reversed so `BinaryHeap` acts as a min-heap (earliest first);
/// `seq` breaks ties in insertion order.
#[derive(Debug)]
struct Scheduled {
    schedule_time: DateTime<Utc>,
    seq: u64,
    record: TaskRecord,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.schedule_time == other.schedule_time && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .schedule_time
            .cmp(&self.schedule_time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct StoreState {
    heap: BinaryHeap<Scheduled>,
    next_seq: u64,
}

/// Pending tasks held in a min-heap behind one mutex.
///
/// Every operation takes the lock once, so an extract never races an enqueue:
/// a record is either returned by exactly one `extract_due` call or still in
/// the heap. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryTaskStore {
    state: Mutex<StoreState>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskQueueStore for InMemoryTaskStore {
    async fn enqueue(&self, record: TaskRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(Scheduled {
            schedule_time: record.schedule_time,
            seq,
            record,
        });
        Ok(())
    }

    async fn extract_due(&self, now: DateTime<Utc>) -> Result<Vec<TaskRecord>> {
        let mut state = self.state.lock().await;
        let mut due = Vec::new();
        while let Some(entry) = state.heap.peek() {
            if entry.schedule_time > now {
                break; // heap is sorted
            }
            if let Some(entry) = state.heap.pop() {
                due.push(entry.record);
            }
        }
        Ok(due)
    }

    async fn size(&self) -> Result<usize> {
        Ok(self.state.lock().await.heap.len())
    }

    async fn snapshot(&self) -> Result<Vec<TaskSummary>> {
        let state = self.state.lock().await;
        let mut entries: Vec<&Scheduled> = state.heap.iter().collect();
        entries.sort_by(|a, b| b.cmp(a));
        Ok(entries.into_iter().map(|e| e.record.summary()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HttpMethod, HttpTarget};
    use chrono::{Duration, TimeZone};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn record(name: &str, at: DateTime<Utc>) -> TaskRecord {
        let mut r = TaskRecord::new(name, HttpTarget::new(HttpMethod::Post, "http://svc"), t0());
        r.schedule_time = at;
        r
    }

    #[tokio::test]
    async fn extract_due_skips_future_tasks() {
        let store = InMemoryTaskStore::new();
        store.enqueue(record("now", t0())).await.unwrap();
        store
            .enqueue(record("later", t0() + Duration::seconds(30)))
            .await
            .unwrap();
        store
            .enqueue(record("past", t0() - Duration::seconds(30)))
            .await
            .unwrap();

        let due = store.extract_due(t0()).await.unwrap();
        let names: Vec<_> = due.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["past", "now"]);
        assert_eq!(store.size().await.unwrap(), 1);

        assert!(store.extract_due(t0()).await.unwrap().is_empty());
        let rest = store
            .extract_due(t0() + Duration::seconds(30))
            .await
            .unwrap();
        assert_eq!(rest[0].name, "later");
        assert_eq!(store.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_names_are_kept() {
        let store = InMemoryTaskStore::new();
        store.enqueue(record("same", t0())).await.unwrap();
        store.enqueue(record("same", t0())).await.unwrap();
        assert_eq!(store.size().await.unwrap(), 2);
        assert_eq!(store.extract_due(t0()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn snapshot_lists_in_due_order_without_removing() {
        let store = InMemoryTaskStore::new();
        store
            .enqueue(record("b", t0() + Duration::seconds(2)))
            .await
            .unwrap();
        store.enqueue(record("a", t0())).await.unwrap();

        let listed = store.snapshot().await.unwrap();
        let names: Vec<_> = listed.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(store.size().await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_extracts_never_return_a_task_twice() {
        let store = Arc::new(InMemoryTaskStore::new());
        let mut producers = Vec::new();
        for p in 0..4 {
            let store = Arc::clone(&store);
            producers.push(tokio::spawn(async move {
                for i in 0..250 {
                    store
                        .enqueue(record(&format!("p{p}-{i}"), t0()))
                        .await
                        .unwrap();
                    if i % 50 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }

        let mut consumers = Vec::new();
        for _ in 0..4 {
            let store = Arc::clone(&store);
            consumers.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                for _ in 0..200 {
                    seen.extend(store.extract_due(t0()).await.unwrap());
                    tokio::task::yield_now().await;
                }
                seen
            }));
        }

        for p in producers {
            p.await.unwrap();
        }
        let mut extracted = Vec::new();
        for c in consumers {
            extracted.extend(c.await.unwrap());
        }
        extracted.extend(store.extract_due(t0()).await.unwrap());

        let unique: HashSet<_> = extracted.iter().map(|r| r.name.clone()).collect();
        assert_eq!(extracted.len(), 1000);
        assert_eq!(unique.len(), 1000);
    }
}

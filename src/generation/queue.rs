//! Render queue for pending jobs.
//!
//! Strict FIFO with no capacity limit and no priorities. Every mutation
//! emits a `QueueChanged` event carrying the new length.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::types::Job;

use super::events::{EventSink, RenderEvent};

/// FIFO queue of jobs waiting to render.
#[derive(Debug)]
pub struct RenderQueue {
    jobs: VecDeque<Job>,
    events: EventSink,
}

impl Default for RenderQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderQueue {
    /// Creates an empty queue without change notifications.
    pub fn new() -> Self {
        Self::with_events(EventSink::disconnected())
    }

    /// Creates an empty queue that reports changes to `events`.
    pub fn with_events(events: EventSink) -> Self {
        Self {
            jobs: VecDeque::new(),
            events,
        }
    }

    /// Appends a job at the tail.
    pub fn enqueue(&mut self, mut job: Job) {
        job.set_queued();
        self.jobs.push_back(job);
        self.notify();
    }

    /// Removes and returns the head, or `None` when empty.
    pub fn dequeue(&mut self) -> Option<Job> {
        let job = self.jobs.pop_front();
        if job.is_some() {
            self.notify();
        }
        job
    }

    /// The head without removing it.
    pub fn peek(&self) -> Option<&Job> {
        self.jobs.front()
    }

    pub fn has_items(&self) -> bool {
        !self.jobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Removes every job.
    pub fn clear(&mut self) {
        self.jobs.clear();
        self.notify();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    /// Labels of the queued jobs, head first.
    pub fn labels(&self) -> Vec<String> {
        self.jobs.iter().map(Job::label).collect()
    }

    fn notify(&self) {
        self.events.emit(RenderEvent::QueueChanged {
            length: self.jobs.len(),
        });
    }
}

/// Queue shared between the control side and the render thread.
pub type SharedQueue = Arc<Mutex<RenderQueue>>;

/// Locks a shared queue.
///
/// Queue operations never leave the deque half-modified, so a poisoned lock
/// is still safe to use.
pub fn lock_queue(queue: &SharedQueue) -> MutexGuard<'_, RenderQueue> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JobRequest, JobStatus};
    use std::sync::mpsc;

    fn job(project: &str, seq: u32) -> Job {
        Job::new(1, seq, JobRequest::new(project, "a slow pan over the harbor")).unwrap()
    }

    #[test]
    fn queue_new_is_empty() {
        let mut queue = RenderQueue::new();
        assert!(queue.is_empty());
        assert!(!queue.has_items());
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn queue_is_fifo() {
        let mut queue = RenderQueue::new();
        for seq in 1..=4 {
            queue.enqueue(job("harbor", seq));
        }
        assert_eq!(queue.len(), 4);
        assert_eq!(queue.peek().unwrap().sequence_number, 1);

        let order: Vec<u32> = std::iter::from_fn(|| queue.dequeue())
            .map(|j| j.sequence_number)
            .collect();
        assert_eq!(order, vec![1, 2, 3, 4]);
        assert!(!queue.has_items());
    }

    #[test]
    fn interleaved_operations_keep_fifo_order() {
        let mut queue = RenderQueue::new();
        let panel_job = |panel: u32, project: &str, seq: u32| {
            Job::new(panel, seq, JobRequest::new(project, "rain on a tin roof")).unwrap()
        };
        let consistent = |queue: &RenderQueue| assert_eq!(queue.has_items(), queue.len() > 0);

        queue.enqueue(panel_job(2, "dunes", 1));
        consistent(&queue);
        queue.enqueue(panel_job(1, "harbor", 1));
        consistent(&queue);
        assert_eq!(queue.dequeue().unwrap().label(), "dunes_1");
        consistent(&queue);

        queue.enqueue(panel_job(2, "dunes", 2));
        queue.enqueue(panel_job(3, "canal", 1));
        consistent(&queue);
        assert_eq!(queue.dequeue().unwrap().label(), "harbor_1");
        assert_eq!(queue.dequeue().unwrap().label(), "dunes_2");
        consistent(&queue);

        queue.enqueue(panel_job(1, "harbor", 2));
        assert_eq!(queue.labels(), vec!["canal_1", "harbor_2"]);
        assert_eq!(queue.dequeue().unwrap().panel_id, 3);
        assert_eq!(queue.dequeue().unwrap().label(), "harbor_2");
        consistent(&queue);
        assert!(!queue.has_items());
        assert!(queue.dequeue().is_none());
        consistent(&queue);
    }

    #[test]
    fn enqueue_marks_job_queued() {
        let mut queue = RenderQueue::new();
        queue.enqueue(job("harbor", 1));
        assert_eq!(queue.dequeue().unwrap().status, JobStatus::Queued);
    }

    #[test]
    fn clear_empties_queue() {
        let mut queue = RenderQueue::new();
        queue.enqueue(job("harbor", 1));
        queue.enqueue(job("harbor", 2));
        queue.clear();
        assert!(!queue.has_items());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn mutations_emit_queue_changed() {
        let (tx, rx) = mpsc::channel();
        let mut queue = RenderQueue::with_events(EventSink::new(tx));

        queue.enqueue(job("harbor", 1));
        queue.enqueue(job("harbor", 2));
        queue.dequeue();
        queue.clear();
        // empty dequeue changes nothing
        queue.dequeue();

        let lengths: Vec<usize> = rx
            .try_iter()
            .map(|event| match event {
                RenderEvent::QueueChanged { length } => length,
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(lengths, vec![1, 2, 1, 0]);
    }

    #[test]
    fn labels_follow_queue_order() {
        let mut queue = RenderQueue::new();
        queue.enqueue(job("harbor", 1));
        queue.enqueue(job("dunes", 1));
        assert_eq!(queue.labels(), vec!["harbor_1", "dunes_1"]);
    }
}

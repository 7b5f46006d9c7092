//! Input panels.
//!
//! A panel is an independent group of job requests. Each panel numbers its
//! jobs from 1; a rejected request does not consume a number. Staged jobs
//! move into the render queue in panel order when a batch is submitted.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::Result;
use crate::types::{Job, JobRequest};

use super::queue::RenderQueue;

/// One input group and its staged jobs.
#[derive(Debug, Clone)]
pub struct Panel {
    id: u32,
    next_sequence: u32,
    staged: Vec<Job>,
}

impl Panel {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            next_sequence: 1,
            staged: Vec::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Sequence number the next accepted request will receive.
    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    pub fn staged(&self) -> &[Job] {
        &self.staged
    }

    /// Validates a request and stages the resulting job.
    pub fn stage(&mut self, request: JobRequest) -> Result<&Job> {
        let job = Job::new(self.id, self.next_sequence, request)?;
        self.next_sequence += 1;
        self.staged.push(job);
        Ok(&self.staged[self.staged.len() - 1])
    }
}

/// All panels, ordered by id.
#[derive(Debug, Clone, Default)]
pub struct PanelBoard {
    panels: BTreeMap<u32, Panel>,
}

impl PanelBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a request on `panel_id`, creating the panel on first use.
    ///
    /// Returns a copy of the staged job.
    pub fn stage(&mut self, panel_id: u32, request: JobRequest) -> Result<Job> {
        let panel = self
            .panels
            .entry(panel_id)
            .or_insert_with(|| Panel::new(panel_id));
        let job = panel.stage(request)?.clone();
        debug!(panel = panel_id, job = %job.label(), "staged job");
        Ok(job)
    }

    pub fn panel(&self, panel_id: u32) -> Option<&Panel> {
        self.panels.get(&panel_id)
    }

    /// Number of staged jobs across all panels.
    pub fn staged_count(&self) -> usize {
        self.panels.values().map(|p| p.staged.len()).sum()
    }

    /// Moves every staged job into `queue`: panels in id order, jobs in
    /// staging order. Returns the number of jobs moved.
    pub fn drain_into(&mut self, queue: &mut RenderQueue) -> usize {
        let mut moved = 0;
        for panel in self.panels.values_mut() {
            for job in panel.staged.drain(..) {
                queue.enqueue(job);
                moved += 1;
            }
        }
        moved
    }

    /// Drops all staged jobs. Sequence counters are kept.
    pub fn clear_staged(&mut self) {
        for panel in self.panels.values_mut() {
            panel.staged.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_are_per_panel() {
        let mut board = PanelBoard::new();
        let a1 = board.stage(1, JobRequest::new("harbor", "gulls")).unwrap();
        let a2 = board.stage(1, JobRequest::new("harbor", "fog")).unwrap();
        let b1 = board.stage(2, JobRequest::new("dunes", "wind")).unwrap();

        assert_eq!(a1.sequence_number, 1);
        assert_eq!(a2.sequence_number, 2);
        assert_eq!(b1.sequence_number, 1);
        assert_eq!(b1.panel_id, 2);
    }

    #[test]
    fn rejected_request_keeps_sequence() {
        let mut board = PanelBoard::new();
        assert!(board.stage(1, JobRequest::new("", "gulls")).is_err());
        assert!(board.stage(1, JobRequest::new("harbor", "   ")).is_err());

        let job = board.stage(1, JobRequest::new("harbor", "gulls")).unwrap();
        assert_eq!(job.sequence_number, 1);
        assert_eq!(board.panel(1).unwrap().next_sequence(), 2);
    }

    #[test]
    fn drain_follows_panel_order() {
        let mut board = PanelBoard::new();
        board.stage(2, JobRequest::new("dunes", "wind")).unwrap();
        board.stage(1, JobRequest::new("harbor", "gulls")).unwrap();
        board.stage(1, JobRequest::new("harbor", "fog")).unwrap();

        let mut queue = RenderQueue::new();
        assert_eq!(board.drain_into(&mut queue), 3);
        assert_eq!(queue.labels(), vec!["harbor_1", "harbor_2", "dunes_1"]);
        assert_eq!(board.staged_count(), 0);
    }

    #[test]
    fn clear_staged_keeps_counters() {
        let mut board = PanelBoard::new();
        board.stage(1, JobRequest::new("harbor", "gulls")).unwrap();
        board.clear_staged();
        assert_eq!(board.staged_count(), 0);

        let job = board.stage(1, JobRequest::new("harbor", "fog")).unwrap();
        assert_eq!(job.sequence_number, 2);
    }
}

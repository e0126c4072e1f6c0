//! Deferred release of artifact collectors.
//!
//! Artifact collectors are pulled out of every report and held in a buffer. The scheduler counts the ordinary
//! collectors it has seen announced but not yet reported; when that count reaches zero the whole ordinary tree has
//! been explored, every explicit claim is known, and the unclaimed artifact collectors are spliced into the report
//! being processed so the host collects them last.

use std::collections::HashSet;
use std::mem;
use std::path::PathBuf;

use crate::tree::{CollectReport, CollectionTree, NodeId};

/// What happened when the barrier opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BarrierRelease {
    /// Collectors spliced into the report, in discovery order.
    pub released: Vec<NodeId>,
    /// Collectors dropped because an explicit test claims their artifact. They are detached from the tree.
    pub dropped: Vec<NodeId>,
}

#[derive(Debug)]
pub struct CollectionScheduler {
    remaining: usize,
    buffer: Vec<NodeId>,
    claimed: HashSet<PathBuf>,
    collecting: bool,
}

impl Default for CollectionScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectionScheduler {
    /// Start a pass. The session's own report is the first one awaited.
    pub fn new() -> Self {
        Self {
            remaining: 1,
            buffer: Vec::new(),
            claimed: HashSet::new(),
            collecting: true,
        }
    }

    /// Ordinary reports still awaited.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn buffered(&self) -> &[NodeId] {
        &self.buffer
    }

    /// Process one collector's report, in place.
    ///
    /// Returns the release when this report was the last ordinary one.
    #[tracing::instrument(skip_all, fields(collector = %tree.nodeid(report.collector)))]
    pub fn on_report(&mut self, tree: &mut CollectionTree, report: &mut CollectReport) -> Option<BarrierRelease> {
        if !self.collecting || tree.enclosing_artifact(report.collector).is_some() {
            return None;
        }

        for &id in &report.result {
            if let Some(claim) = tree.node(id).claim() {
                self.claimed.insert(claim.to_path_buf());
            }
        }

        let (artifacts, rest): (Vec<NodeId>, Vec<NodeId>) =
            report.result.iter().partition(|&&id| tree.kind(id).is_artifact());
        report.result = rest;
        self.buffer.extend(artifacts);

        let announced = report.result.iter().filter(|&&id| tree.kind(id).is_collector()).count();
        if self.remaining == 0 {
            tracing::warn!("ordinary report received after the barrier opened");
        }
        self.remaining = self.remaining.saturating_sub(1) + announced;
        tracing::trace!(remaining = self.remaining, buffered = self.buffer.len(), "report processed");

        if self.remaining > 0 {
            return None;
        }

        let mut release = BarrierRelease::default();
        for id in mem::take(&mut self.buffer) {
            let claimed = tree.node(id).path().is_some_and(|p| self.claimed.contains(p));
            if claimed {
                tree.detach(id);
                release.dropped.push(id);
            } else {
                release.released.push(id);
            }
        }
        tracing::debug!(
            released = release.released.len(),
            dropped = release.dropped.len(),
            "artifact collectors released"
        );
        report.result.extend(release.released.iter().copied());
        Some(release)
    }

    /// End the pass. Returns anything still buffered, which is only possible when the walk was cut short.
    pub fn finish(&mut self) -> Vec<NodeId> {
        self.collecting = false;
        self.remaining = 0;
        self.claimed.clear();
        let leftover = mem::take(&mut self.buffer);
        if !leftover.is_empty() {
            tracing::warn!(count = leftover.len(), "collection ended with artifact collectors still buffered");
        }
        leftover
    }
}

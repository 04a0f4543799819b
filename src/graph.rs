//! Incremental reconstruction of the head/mode graph from the
//! wlr-output-management event stream.
//!
//! Events are fed into a [`SyncState`] in arrival order. Until the manager
//! sends `done` (or `finished`) the graph is only reachable through the
//! builder, which has no read accessors. The barrier seals it into a
//! [`Snapshot`], the only type the rest of the crate reads from.

use std::mem;

use tracing::{debug, trace, warn};

use crate::wl_monitor::{WlMonitor, WlMonitorMode};

/// One protocol event, stripped of its wire representation
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent<H, M> {
    /// `zwlr_output_manager_v1.head`
    Head { head: H },
    /// `zwlr_output_head_v1.mode`
    Mode { head: H, mode: M },
    /// `zwlr_output_mode_v1.size`
    ModeSize { mode: M, width: i32, height: i32 },
    /// `zwlr_output_mode_v1.refresh`
    ModeRefresh { mode: M, refresh: i32 },
    /// `zwlr_output_mode_v1.preferred`
    ModePreferred { mode: M },
    /// `zwlr_output_mode_v1.finished`
    ModeFinished { mode: M },
    /// `zwlr_output_head_v1.name`
    HeadName { head: H, name: String },
    /// `zwlr_output_head_v1.description`
    HeadDescription { head: H, description: String },
    /// `zwlr_output_head_v1.enabled`
    HeadEnabled { head: H, enabled: bool },
    /// `zwlr_output_head_v1.current_mode`
    HeadCurrentMode { head: H, mode: M },
    /// `zwlr_output_head_v1.finished`
    HeadFinished { head: H },
    /// `zwlr_output_manager_v1.done`
    Done { serial: u32 },
    /// `zwlr_output_manager_v1.finished`
    ManagerFinished,
}

/// The event that sealed a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Barrier {
    /// The manager finished describing a consistent state
    Done { serial: u32 },
    /// The manager is gone; the state is readable but not configurable
    ManagerFinished,
}

/// Accepts events until a barrier arrives
pub struct SnapshotBuilder<H, M> {
    heads: Vec<WlMonitor<H, M>>,
}

impl<H, M> Default for SnapshotBuilder<H, M> {
    fn default() -> Self {
        Self { heads: Vec::new() }
    }
}

impl<H: PartialEq, M: PartialEq> SnapshotBuilder<H, M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event, returning the barrier if this event was one
    pub fn apply(&mut self, event: OutputEvent<H, M>) -> Option<Barrier> {
        match event {
            OutputEvent::Head { head } => {
                if self.head_mut(&head).is_some() {
                    trace!("head announced twice, ignoring");
                } else {
                    self.heads.push(WlMonitor::new(head));
                }
            }
            OutputEvent::Mode { head, mode } => {
                if self.mode_mut(&mode).is_some() {
                    trace!("mode announced twice, ignoring");
                    return None;
                }
                match self.head_mut(&head) {
                    Some(monitor) => {
                        monitor.modes.push(WlMonitorMode::new(mode))
                    }
                    None => trace!("mode announced for unknown head"),
                }
            }
            OutputEvent::ModeSize {
                mode,
                width,
                height,
            } => {
                if let Some((monitor, index)) = self.mode_mut(&mode) {
                    let entry = &mut monitor.modes[index];
                    entry.resolution.width = width;
                    entry.resolution.height = height;
                }
            }
            OutputEvent::ModeRefresh { mode, refresh } => {
                if let Some((monitor, index)) = self.mode_mut(&mode) {
                    monitor.modes[index].refresh = refresh;
                }
            }
            OutputEvent::ModePreferred { mode } => {
                if let Some((monitor, index)) = self.mode_mut(&mode) {
                    monitor.modes[index].preferred = true;
                }
            }
            OutputEvent::ModeFinished { mode } => {
                if let Some((monitor, index)) = self.mode_mut(&mode) {
                    monitor.modes[index].retired = true;
                    if monitor.current == Some(index) {
                        monitor.current = None;
                    }
                }
            }
            OutputEvent::HeadName { head, name } => {
                if let Some(monitor) = self.head_mut(&head) {
                    monitor.name = Some(name);
                }
            }
            OutputEvent::HeadDescription { head, description } => {
                if let Some(monitor) = self.head_mut(&head) {
                    monitor.description = Some(description);
                }
            }
            OutputEvent::HeadEnabled { head, enabled } => {
                if let Some(monitor) = self.head_mut(&head) {
                    monitor.enabled = enabled;
                }
            }
            OutputEvent::HeadCurrentMode { head, mode } => {
                if let Some(monitor) = self.head_mut(&head) {
                    match monitor.mode_index(&mode) {
                        Some(index) => monitor.current = Some(index),
                        None => warn!(
                            head = monitor.label(),
                            "current mode refers to a mode not announced \
                             yet, leaving it unresolved"
                        ),
                    }
                }
            }
            OutputEvent::HeadFinished { head } => {
                if let Some(monitor) = self.head_mut(&head) {
                    debug!(head = monitor.label(), "head finished");
                    monitor.retired = true;
                }
            }
            OutputEvent::Done { serial } => {
                return Some(Barrier::Done { serial });
            }
            OutputEvent::ManagerFinished => {
                return Some(Barrier::ManagerFinished);
            }
        }
        None
    }

    /// Freeze the graph into a readable snapshot
    pub fn seal(self, barrier: Barrier) -> Snapshot<H, M> {
        debug!(heads = self.heads.len(), ?barrier, "output snapshot sealed");
        for head in self.heads.iter().filter(|h| !h.retired) {
            debug!(
                head = head.label(),
                description = head.description.as_deref(),
                enabled = head.enabled,
                modes = head.live_modes().count(),
                "head"
            );
        }
        Snapshot {
            heads: self.heads,
            barrier,
        }
    }

    fn head_mut(&mut self, id: &H) -> Option<&mut WlMonitor<H, M>> {
        self.heads.iter_mut().find(|h| h.id == *id)
    }

    fn mode_mut(&mut self, id: &M) -> Option<(&mut WlMonitor<H, M>, usize)> {
        self.heads.iter_mut().find_map(|h| {
            let index = h.mode_index(id)?;
            Some((h, index))
        })
    }
}

/// A consistent, read-only view of all heads at one barrier
#[derive(Debug, Clone)]
pub struct Snapshot<H, M> {
    heads: Vec<WlMonitor<H, M>>,
    barrier: Barrier,
}

impl<H, M> Snapshot<H, M> {
    /// All heads in announcement order, retired ones included
    pub fn heads(&self) -> &[WlMonitor<H, M>] {
        &self.heads
    }

    /// Heads still present, paired with their arena index
    pub fn live_heads(
        &self,
    ) -> impl Iterator<Item = (usize, &WlMonitor<H, M>)> {
        self.heads.iter().enumerate().filter(|(_, h)| !h.retired)
    }

    pub fn barrier(&self) -> Barrier {
        self.barrier
    }

    /// Token a configuration must be tagged with, `None` if the manager is gone
    pub fn serial(&self) -> Option<u32> {
        match self.barrier {
            Barrier::Done { serial } => Some(serial),
            Barrier::ManagerFinished => None,
        }
    }
}

/// Two-phase holder: a builder until the barrier, a snapshot afterwards
pub enum SyncState<H, M> {
    Syncing(SnapshotBuilder<H, M>),
    Ready(Snapshot<H, M>),
    /// The snapshot was moved out for configuration
    Consumed,
}

impl<H, M> Default for SyncState<H, M> {
    fn default() -> Self {
        SyncState::Syncing(SnapshotBuilder::default())
    }
}

impl<H: PartialEq, M: PartialEq> SyncState<H, M> {
    pub fn feed(&mut self, event: OutputEvent<H, M>) {
        match self {
            SyncState::Syncing(builder) => {
                if let Some(barrier) = builder.apply(event) {
                    let builder = mem::take(builder);
                    *self = SyncState::Ready(builder.seal(barrier));
                }
            }
            SyncState::Ready(_) | SyncState::Consumed => {
                trace!("output event after snapshot was sealed, ignoring");
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SyncState::Ready(_))
    }

    /// Move the sealed snapshot out, if there is one
    pub fn take_snapshot(&mut self) -> Option<Snapshot<H, M>> {
        match mem::replace(self, SyncState::Consumed) {
            SyncState::Ready(snapshot) => Some(snapshot),
            other => {
                *self = other;
                None
            }
        }
    }
}

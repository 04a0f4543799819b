use tracing::{debug, info, warn};

use crate::{
    error::WlModesetError, graph::Snapshot, select::select_fullscreen_mode,
};

/// One head switched to one of its own modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadSelection {
    /// Index into [`Snapshot::heads`]
    pub head: usize,
    /// Index into that head's `modes`
    pub mode: usize,
}

/// The heads a configuration switches, everything else stays as it is
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationPlan {
    pub selections: Vec<HeadSelection>,
}

impl ConfigurationPlan {
    fn mode_for(&self, head: usize) -> Option<usize> {
        self.selections
            .iter()
            .find(|s| s.head == head)
            .map(|s| s.mode)
    }
}

/// How far the compositor's answer to an applied configuration was tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The request was flushed; the compositor's answer was not awaited
    Sent,
    /// The compositor confirmed the configuration
    Succeeded,
}

/// A configuration being assembled
pub trait ConfigurationTransaction<H, M> {
    /// Enable `head`, switching it to `mode` when given
    fn enable_head(&mut self, head: &H, mode: Option<&M>);
    fn disable_head(&mut self, head: &H);
}

/// Creates and applies configurations against a compositor
pub trait ConfigurationBackend<H, M> {
    type Transaction: ConfigurationTransaction<H, M>;

    /// Start a configuration tagged with the snapshot serial
    fn create_configuration(&mut self, serial: u32) -> Self::Transaction;

    /// Apply, release the configuration and flush it to the compositor
    fn apply(
        &mut self,
        transaction: Self::Transaction,
    ) -> Result<ApplyOutcome, WlModesetError>;
}

/// Switch every head to its fullscreen mode; modeless heads are left out
pub fn fullscreen_plan<H, M: PartialEq>(
    snapshot: &Snapshot<H, M>,
) -> ConfigurationPlan {
    let mut plan = ConfigurationPlan::default();
    for (head_index, head) in snapshot.live_heads() {
        let selected = select_fullscreen_mode(head)
            .and_then(|index| Some((index, head.modes.get(index)?)));
        match selected {
            Some((mode_index, mode)) => {
                info!(
                    head = head.label(),
                    description = head.description.as_deref(),
                    width = mode.resolution.width,
                    height = mode.resolution.height,
                    refresh = mode.refresh,
                    preferred = mode.preferred,
                    "selected fullscreen mode"
                );
                plan.selections.push(HeadSelection {
                    head: head_index,
                    mode: mode_index,
                });
            }
            None => {
                debug!(
                    head = head.label(),
                    "no selectable mode, skipping head"
                );
            }
        }
    }
    plan
}

/// Send `plan` as a single configuration
///
/// Heads the plan does not select are restated as they are (enabled with
/// their current mode, or disabled), since a configuration must account for
/// every head. Retired heads are left out. A selection pointing past a
/// head's modes is ignored and that head is restated.
pub fn commit<H, M, B>(
    backend: &mut B,
    snapshot: &Snapshot<H, M>,
    plan: &ConfigurationPlan,
) -> Result<ApplyOutcome, WlModesetError>
where
    M: PartialEq,
    B: ConfigurationBackend<H, M>,
{
    let serial = snapshot.serial().ok_or(WlModesetError::ManagerFinished)?;
    for selection in &plan.selections {
        if selection.head >= snapshot.heads().len() {
            warn!(
                head = selection.head,
                "selection for unknown head ignored"
            );
        }
    }

    let mut transaction = backend.create_configuration(serial);
    for (head_index, head) in snapshot.live_heads() {
        let selected = plan.mode_for(head_index).and_then(|index| {
            let mode = head.modes.get(index);
            if mode.is_none() {
                warn!(
                    head = head.label(),
                    mode = index,
                    "selection for unknown mode ignored"
                );
            }
            mode
        });
        if let Some(mode) = selected {
            transaction.enable_head(&head.id, Some(&mode.id));
        } else if head.enabled {
            let current = head.current_mode().map(|m| &m.id);
            transaction.enable_head(&head.id, current);
        } else {
            transaction.disable_head(&head.id);
        }
    }

    let outcome = backend.apply(transaction)?;
    info!(
        serial,
        heads = plan.selections.len(),
        ?outcome,
        "output configuration applied"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{Ev, build, head_events};

    #[derive(Debug, PartialEq)]
    enum Op {
        Create(u32),
        Enable(u32, Option<u32>),
        Disable(u32),
        Apply,
    }

    #[derive(Default)]
    struct Recorder {
        ops: Vec<Op>,
    }

    struct RecordedTransaction {
        ops: Vec<Op>,
    }

    impl ConfigurationTransaction<u32, u32> for RecordedTransaction {
        fn enable_head(&mut self, head: &u32, mode: Option<&u32>) {
            self.ops.push(Op::Enable(*head, mode.copied()));
        }

        fn disable_head(&mut self, head: &u32) {
            self.ops.push(Op::Disable(*head));
        }
    }

    impl ConfigurationBackend<u32, u32> for Recorder {
        type Transaction = RecordedTransaction;

        fn create_configuration(
            &mut self,
            serial: u32,
        ) -> RecordedTransaction {
            self.ops.push(Op::Create(serial));
            RecordedTransaction { ops: Vec::new() }
        }

        fn apply(
            &mut self,
            transaction: RecordedTransaction,
        ) -> Result<ApplyOutcome, WlModesetError> {
            self.ops.extend(transaction.ops);
            self.ops.push(Op::Apply);
            Ok(ApplyOutcome::Sent)
        }
    }

    fn two_heads() -> Vec<Ev> {
        let mut events = head_events(
            1,
            "DP-1",
            &[(10, 1920, 1080, 60000, false)],
            Some(10),
        );
        events.extend(head_events(
            2,
            "HDMI-1",
            &[(20, 1280, 720, 60000, false)],
            Some(20),
        ));
        events
    }

    #[test]
    fn test_fullscreen_selects_preferred() {
        let snapshot = build(head_events(
            1,
            "DP-1",
            &[
                (10, 1920, 1080, 60000, false),
                (11, 3840, 2160, 30000, true),
            ],
            Some(10),
        ));
        let plan = fullscreen_plan(&snapshot);
        assert_eq!(
            plan.selections,
            vec![HeadSelection { head: 0, mode: 1 }]
        );

        let mut backend = Recorder::default();
        let outcome = commit(&mut backend, &snapshot, &plan).unwrap();
        assert_eq!(outcome, ApplyOutcome::Sent);
        assert_eq!(
            backend.ops,
            vec![Op::Create(7), Op::Enable(1, Some(11)), Op::Apply]
        );
    }

    #[test]
    fn test_modeless_head_is_left_untouched() {
        let mut events =
            head_events(1, "DP-1", &[(10, 1920, 1080, 60000, false)], None);
        events.extend(head_events(2, "HDMI-1", &[], None));
        events.push(Ev::Head { head: 3 });
        let snapshot = build(events);

        let plan = fullscreen_plan(&snapshot);
        assert_eq!(
            plan.selections,
            vec![HeadSelection { head: 0, mode: 0 }]
        );

        let mut backend = Recorder::default();
        commit(&mut backend, &snapshot, &plan).unwrap();
        assert_eq!(
            backend.ops,
            vec![
                Op::Create(7),
                Op::Enable(1, Some(10)),
                Op::Enable(2, None),
                Op::Disable(3),
                Op::Apply,
            ]
        );
    }

    #[test]
    fn test_unselected_head_keeps_current_mode() {
        let events = two_heads();
        let snapshot = build(events);

        let plan = ConfigurationPlan {
            selections: vec![HeadSelection { head: 1, mode: 0 }],
        };
        let mut backend = Recorder::default();
        commit(&mut backend, &snapshot, &plan).unwrap();
        assert_eq!(
            backend.ops,
            vec![
                Op::Create(7),
                Op::Enable(1, Some(10)),
                Op::Enable(2, Some(20)),
                Op::Apply,
            ]
        );
    }

    #[test]
    fn test_out_of_range_selection_is_ignored() {
        let snapshot = build(two_heads());

        let plan = ConfigurationPlan {
            selections: vec![
                HeadSelection { head: 0, mode: 9 },
                HeadSelection { head: 5, mode: 0 },
            ],
        };
        let mut backend = Recorder::default();
        commit(&mut backend, &snapshot, &plan).unwrap();
        assert_eq!(
            backend.ops,
            vec![
                Op::Create(7),
                Op::Enable(1, Some(10)),
                Op::Enable(2, Some(20)),
                Op::Apply,
            ]
        );
    }

    #[test]
    fn test_retired_heads_are_not_configured() {
        let mut events = two_heads();
        events.push(Ev::HeadFinished { head: 2 });
        let snapshot = build(events);

        let plan = fullscreen_plan(&snapshot);
        let mut backend = Recorder::default();
        commit(&mut backend, &snapshot, &plan).unwrap();
        assert_eq!(
            backend.ops,
            vec![Op::Create(7), Op::Enable(1, Some(10)), Op::Apply]
        );
    }

    #[test]
    fn test_finished_manager_is_not_configured() {
        let mut state = crate::graph::SyncState::default();
        let events = head_events(
            1,
            "DP-1",
            &[(10, 1920, 1080, 60000, false)],
            Some(10),
        );
        for event in events {
            state.feed(event);
        }
        state.feed(Ev::ManagerFinished);
        let snapshot = state.take_snapshot().unwrap();

        let plan = fullscreen_plan(&snapshot);
        let mut backend = Recorder::default();
        let err = commit(&mut backend, &snapshot, &plan).unwrap_err();
        assert!(matches!(err, WlModesetError::ManagerFinished));
        assert!(backend.ops.is_empty());
    }
}

use tracing::{debug, info};

use crate::{
    error::WlModesetError,
    graph::Snapshot,
    state_file::RestoreEntry,
    transaction::{ConfigurationPlan, HeadSelection},
};

/// Match saved records against the live heads
///
/// A head is selected when its name has a record (the first one if the file
/// repeats a name) and one of its live modes has exactly that record's
/// width, height and refresh. Every other head is left out of the plan.
pub fn restore_plan<H, M: PartialEq>(
    snapshot: &Snapshot<H, M>,
    entries: &[RestoreEntry],
) -> Result<ConfigurationPlan, WlModesetError> {
    if entries.is_empty() {
        return Err(WlModesetError::NoStateEntries);
    }

    let mut plan = ConfigurationPlan::default();
    for (head_index, head) in snapshot.live_heads() {
        let Some(name) = head.name.as_deref() else {
            continue;
        };
        let Some(entry) = entries.iter().find(|e| e.name == name) else {
            debug!(head = name, "no saved state for head");
            continue;
        };
        let Some((mode_index, _)) = head
            .live_modes()
            .find(|(_, m)| m.matches(entry.width, entry.height, entry.refresh))
        else {
            debug!(
                head = name,
                width = entry.width,
                height = entry.height,
                refresh = entry.refresh,
                "saved mode no longer offered by head"
            );
            continue;
        };
        info!(
            head = name,
            width = entry.width,
            height = entry.height,
            refresh = entry.refresh,
            "restoring mode"
        );
        plan.selections.push(HeadSelection {
            head: head_index,
            mode: mode_index,
        });
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{Ev, build, head_events};

    fn entry(
        name: &str,
        width: i32,
        height: i32,
        refresh: i32,
    ) -> RestoreEntry {
        RestoreEntry {
            name: name.into(),
            width,
            height,
            refresh,
        }
    }

    #[test]
    fn test_empty_entries_fail_fast() {
        let snapshot = build(head_events(
            1,
            "DP-1",
            &[(10, 1920, 1080, 60000, false)],
            None,
        ));
        let err = restore_plan(&snapshot, &[]).unwrap_err();
        assert!(matches!(err, WlModesetError::NoStateEntries));
    }

    #[test]
    fn test_missing_head_is_skipped() {
        let snapshot = build(head_events(
            1,
            "DP-1",
            &[(10, 2560, 1440, 60000, true), (11, 1920, 1080, 60000, false)],
            Some(10),
        ));
        let entries = [
            entry("DP-1", 1920, 1080, 60000),
            entry("HDMI-1", 2560, 1440, 60000),
        ];
        let plan = restore_plan(&snapshot, &entries).unwrap();
        assert_eq!(plan.selections, vec![HeadSelection { head: 0, mode: 1 }]);
    }

    #[test]
    fn test_requires_exact_refresh() {
        let snapshot = build(head_events(
            1,
            "DP-1",
            &[(10, 1920, 1080, 59940, false)],
            None,
        ));
        let plan =
            restore_plan(&snapshot, &[entry("DP-1", 1920, 1080, 60000)])
                .unwrap();
        assert!(plan.selections.is_empty());
    }

    #[test]
    fn test_first_duplicate_entry_wins() {
        let snapshot = build(head_events(
            1,
            "DP-1",
            &[(10, 1920, 1080, 60000, false), (11, 1280, 720, 60000, false)],
            None,
        ));
        let entries = [
            entry("DP-1", 1280, 720, 60000),
            entry("DP-1", 1920, 1080, 60000),
        ];
        let plan = restore_plan(&snapshot, &entries).unwrap();
        assert_eq!(plan.selections, vec![HeadSelection { head: 0, mode: 1 }]);
    }

    #[test]
    fn test_unnamed_and_retired_heads_are_skipped() {
        let mut events = vec![
            Ev::Head { head: 1 },
            Ev::Mode { head: 1, mode: 10 },
            Ev::ModeSize {
                mode: 10,
                width: 1920,
                height: 1080,
            },
        ];
        events.extend(head_events(
            2,
            "DP-2",
            &[(20, 1920, 1080, 0, false)],
            None,
        ));
        events.push(Ev::HeadFinished { head: 2 });
        let snapshot = build(events);
        let plan =
            restore_plan(&snapshot, &[entry("DP-2", 1920, 1080, 0)]).unwrap();
        assert!(plan.selections.is_empty());
    }

    #[test]
    fn test_restore_is_idempotent() {
        let mut events = head_events(
            1,
            "DP-1",
            &[
                (10, 1920, 1080, 60000, false),
                (11, 3840, 2160, 60000, false),
            ],
            Some(11),
        );
        events.extend(head_events(
            2,
            "HDMI-1",
            &[(20, 2560, 1440, 60000, false)],
            Some(20),
        ));
        let snapshot = build(events);
        let entries = [
            entry("HDMI-1", 2560, 1440, 60000),
            entry("DP-1", 1920, 1080, 60000),
        ];
        let first = restore_plan(&snapshot, &entries).unwrap();
        let second = restore_plan(&snapshot, &entries).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.selections,
            vec![
                HeadSelection { head: 0, mode: 0 },
                HeadSelection { head: 1, mode: 0 },
            ]
        );
    }
}

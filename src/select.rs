use crate::wl_monitor::WlMonitor;

/// Pick the mode a head should use in fullscreen
///
/// The preferred mode wins regardless of size (the last one if the
/// compositor marked several). Otherwise the largest mode by area wins,
/// ties going to the one announced first. Retired modes are never picked.
/// Returns an index into `monitor.modes`.
pub fn select_fullscreen_mode<H, M: PartialEq>(
    monitor: &WlMonitor<H, M>,
) -> Option<usize> {
    let mut preferred = None;
    let mut largest: Option<(usize, i64)> = None;

    for (index, mode) in monitor.live_modes() {
        if mode.preferred {
            preferred = Some(index);
        }
        let area = mode.resolution.area();
        if largest.is_none_or(|(_, best)| area > best) {
            largest = Some((index, area));
        }
    }

    preferred.or(largest.map(|(index, _)| index))
}

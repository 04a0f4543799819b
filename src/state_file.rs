//! Plain-text persistence of the active mode of each head.
//!
//! One record per line: `<name> <width> <height> <refresh>`, separated by
//! single spaces, refresh in mHz. Names cannot contain whitespace.

use std::{fmt::Write as _, fs, io, path::Path, str};

use tracing::{debug, info, warn};

use crate::{error::WlModesetError, graph::Snapshot};

/// Longest head name accepted when loading
pub const MAX_NAME_LEN: usize = 255;

/// A previously active mode read back from the state file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreEntry {
    pub name: String,
    pub width: i32,
    pub height: i32,
    pub refresh: i32,
}

/// Render one record per live head with both a name and a current mode
pub fn render_state<H, M: PartialEq>(snapshot: &Snapshot<H, M>) -> String {
    let mut out = String::new();
    for (_, head) in snapshot.live_heads() {
        let (Some(name), Some(mode)) =
            (head.name.as_deref(), head.current_mode())
        else {
            continue;
        };
        if name.chars().any(char::is_whitespace) {
            warn!(
                head = name,
                "head name contains whitespace, record will not load back"
            );
        }
        let _ = writeln!(
            out,
            "{} {} {} {}",
            name, mode.resolution.width, mode.resolution.height, mode.refresh
        );
    }
    out
}

/// Overwrite `path` with the current modes of `snapshot`
pub fn save_state<H, M: PartialEq>(
    path: &Path,
    snapshot: &Snapshot<H, M>,
) -> Result<(), WlModesetError> {
    let contents = render_state(snapshot);
    fs::write(path, &contents).map_err(|source| {
        WlModesetError::StateFileOpen {
            path: path.to_path_buf(),
            source,
        }
    })?;
    info!(
        path = %path.display(),
        records = contents.lines().count(),
        "saved output state"
    );
    Ok(())
}

/// Parse records, skipping lines that are not exactly one record
///
/// Lines are decoded one at a time, so a line that is not valid UTF-8 is
/// skipped like any other malformed line.
pub fn parse_state(contents: impl AsRef<[u8]>) -> Vec<RestoreEntry> {
    contents
        .as_ref()
        .split(|b| *b == b'\n')
        .enumerate()
        .filter(|(_, raw)| !raw.trim_ascii().is_empty())
        .filter_map(|(number, raw)| {
            let entry = str::from_utf8(raw).ok().and_then(parse_line);
            if entry.is_none() {
                debug!(line = number + 1, "skipping malformed state record");
            }
            entry
        })
        .collect()
}

fn parse_line(line: &str) -> Option<RestoreEntry> {
    let mut fields = line.split_whitespace();
    let name = fields.next()?;
    let width = fields.next()?.parse().ok()?;
    let height = fields.next()?.parse().ok()?;
    let refresh = fields.next()?.parse().ok()?;
    if fields.next().is_some() || name.len() > MAX_NAME_LEN {
        return None;
    }
    Some(RestoreEntry {
        name: name.to_string(),
        width,
        height,
        refresh,
    })
}

/// Read records from `path`; a missing file yields no records
pub fn load_state(path: &Path) -> Result<Vec<RestoreEntry>, WlModesetError> {
    let contents = match fs::read(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "state file does not exist");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(WlModesetError::StateFileRead {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let entries = parse_state(&contents);
    debug!(
        path = %path.display(),
        records = entries.len(),
        "loaded output state"
    );
    Ok(entries)
}

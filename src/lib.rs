mod cli;
mod error;
mod graph;
mod restore;
mod select;
mod state;
mod state_file;
mod transaction;
mod wl_monitor;

pub use cli::{Action, Cli};
pub use error::WlModesetError;
pub use graph::{Barrier, OutputEvent, Snapshot, SnapshotBuilder, SyncState};
pub use restore::restore_plan;
pub use select::select_fullscreen_mode;
pub use state::{
    MANAGER_VERSION, WlOutputSession, WlSnapshot, WlTransaction, WlTransactor,
    bind_version,
};
pub use state_file::{
    MAX_NAME_LEN, RestoreEntry, load_state, parse_state, render_state,
    save_state,
};
pub use transaction::{
    ApplyOutcome, ConfigurationBackend, ConfigurationPlan,
    ConfigurationTransaction, HeadSelection, commit, fullscreen_plan,
};
pub use wl_monitor::{WlMonitor, WlMonitorMode, WlResolution};

use std::{io, path::PathBuf, time::Duration};

use wayland_client::{ConnectError, DispatchError};

/// Errors that can occur while switching or restoring output modes
#[derive(Debug, thiserror::Error)]
pub enum WlModesetError {
    /// Failed to establish Wayland connection
    #[error("failed to connect to wayland display: {0}")]
    Connection(#[from] ConnectError),

    /// The compositor does not advertise `zwlr_output_manager_v1`
    #[error("zwlr_output_manager_v1 not advertised by compositor")]
    ProtocolUnavailable,

    /// Reading, flushing or dispatching the event queue failed
    #[error("wayland dispatch failed: {0}")]
    TransportDispatch(#[from] DispatchError),

    /// No consistent snapshot arrived within the allowed time
    #[error("no output snapshot received within {0:?}")]
    Timeout(Duration),

    /// The state file could not be written
    #[error("failed to write state file {}: {source}", path.display())]
    StateFileOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The state file exists but could not be read
    #[error("failed to read state file {}: {source}", path.display())]
    StateFileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Restore was requested but no usable record was loaded
    #[error("no state entries found")]
    NoStateEntries,

    /// The output manager went away before a configuration could be sent
    #[error("output manager finished, cannot configure outputs")]
    ManagerFinished,

    /// The compositor answered `failed` to an applied configuration
    #[error("compositor rejected the configuration")]
    ConfigurationFailed,

    /// The compositor answered `cancelled` to an applied configuration
    #[error("configuration cancelled (serial outdated)")]
    ConfigurationCancelled,
}

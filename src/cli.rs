use std::{ffi::OsString, path::PathBuf, time::Duration};

use clap::{ArgGroup, CommandFactory, Parser, error::ErrorKind};

/// Switch Wayland outputs to their fullscreen mode, or restore saved modes
#[derive(Debug, Parser)]
#[command(name = "wlx-modeset", version, about)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args(["fullscreen", "restore"]),
))]
pub struct Cli {
    /// Switch every output to its preferred mode, or its largest one
    #[arg(long)]
    pub fullscreen: bool,

    /// Switch outputs back to the modes saved in --state-file
    #[arg(long, requires = "state_file")]
    pub restore: bool,

    /// File the current modes are saved to (--fullscreen) or read from
    /// (--restore)
    #[arg(long, value_name = "PATH")]
    pub state_file: Option<PathBuf>,

    /// Give up if the compositor has not described every output in time
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Wait for the compositor to accept or reject the configuration
    #[arg(long)]
    pub confirm: bool,

    /// Log debug output when RUST_LOG is not set
    #[arg(short, long)]
    pub verbose: bool,
}

/// What to do once the outputs are known
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Save current modes to `state_file` if given, then go fullscreen
    Fullscreen { state_file: Option<PathBuf> },
    /// Re-apply the modes saved in `state_file`
    Restore { state_file: PathBuf },
}

impl Cli {
    /// Parse `args` (program name first) into options and the requested action
    pub fn parse_args<I, T>(args: I) -> Result<(Self, Action), clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = Self::try_parse_from(args)?;
        let action = cli.action()?;
        Ok((cli, action))
    }

    pub fn action(&self) -> Result<Action, clap::Error> {
        if self.fullscreen {
            return Ok(Action::Fullscreen {
                state_file: self.state_file.clone(),
            });
        }
        match &self.state_file {
            Some(path) => Ok(Action::Restore {
                state_file: path.clone(),
            }),
            None => Err(Self::command().error(
                ErrorKind::MissingRequiredArgument,
                "--restore requires --state-file",
            )),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<(Cli, Action), clap::Error> {
        let argv = std::iter::once("wlx-modeset").chain(args.iter().copied());
        Cli::parse_args(argv)
    }

    #[test]
    fn test_fullscreen_without_state_file() {
        let (cli, action) = parse(&["--fullscreen"]).unwrap();
        assert_eq!(action, Action::Fullscreen { state_file: None });
        assert!(!cli.confirm);
        assert_eq!(cli.timeout(), None);
    }

    #[test]
    fn test_fullscreen_with_state_file() {
        let (_, action) =
            parse(&["--fullscreen", "--state-file", "/tmp/modes"]).unwrap();
        assert_eq!(
            action,
            Action::Fullscreen {
                state_file: Some(PathBuf::from("/tmp/modes"))
            }
        );
    }

    #[test]
    fn test_restore_with_state_file() {
        let (cli, action) = parse(&[
            "--restore",
            "--state-file",
            "/tmp/modes",
            "--timeout-ms",
            "1500",
            "--confirm",
        ])
        .unwrap();
        assert_eq!(
            action,
            Action::Restore {
                state_file: PathBuf::from("/tmp/modes")
            }
        );
        assert_eq!(cli.timeout(), Some(Duration::from_millis(1500)));
        assert!(cli.confirm);
    }

    #[test]
    fn test_both_actions_is_usage_error() {
        let err = parse(&["--fullscreen", "--restore", "--state-file", "x"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
        assert!(err.use_stderr());
    }

    #[test]
    fn test_no_action_is_usage_error() {
        let err = parse(&["--state-file", "x"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_restore_requires_state_file() {
        let err = parse(&["--restore"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_missing_state_file_value_is_usage_error() {
        assert!(parse(&["--fullscreen", "--state-file"]).is_err());
        assert!(parse(&["--fullscreen", "--bogus"]).is_err());
    }

    #[test]
    fn test_help_is_not_an_error_exit() {
        let err = parse(&["--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert!(!err.use_stderr());
    }
}

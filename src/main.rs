use std::process::ExitCode;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use wlx_modeset::{
    Action, ApplyOutcome, Cli, WlModesetError, WlOutputSession, commit,
    fullscreen_plan, load_state, restore_plan, save_state,
};

fn main() -> ExitCode {
    let (cli, action) = match Cli::parse_args(std::env::args_os()) {
        Ok(parsed) => parsed,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_logging(cli.verbose);

    match run(&cli, &action) {
        Ok(outcome) => {
            info!(?outcome, "done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "wlx_modeset=debug"
    } else {
        "wlx_modeset=info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli, action: &Action) -> Result<ApplyOutcome, WlModesetError> {
    let (mut session, mut event_queue) = WlOutputSession::new_connection()?;
    session.discover(&mut event_queue)?;
    let snapshot = session.sync(&mut event_queue, cli.timeout())?;
    info!(
        heads = snapshot.live_heads().count(),
        serial = ?snapshot.serial(),
        "outputs discovered"
    );

    let plan = match action {
        Action::Fullscreen { state_file } => {
            if let Some(path) = state_file {
                if let Err(e) = save_state(path, &snapshot) {
                    warn!("{e}, continuing without saving");
                }
            }
            fullscreen_plan(&snapshot)
        }
        Action::Restore { state_file } => {
            let entries = load_state(state_file)?;
            if entries.is_empty() {
                warn!(
                    path = %state_file.display(),
                    "state file holds no usable records"
                );
            }
            restore_plan(&snapshot, &entries)?
        }
    };

    let mut transactor = session.transactor(&mut event_queue, cli.confirm)?;
    commit(&mut transactor, &snapshot, &plan)
}

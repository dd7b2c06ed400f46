use std::process::ExitCode;

use tracing::{error, info};

use arena_ladder::config::{Credentials, Settings};
use arena_ladder::http_client::HttpTransport;
use arena_ladder::pipeline;

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    arena_ladder::init_logging();

    let credentials = match Credentials::from_env() {
        Ok(credentials) => credentials,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };
    let settings = Settings::from_env();

    let transport = match HttpTransport::new() {
        Ok(transport) => transport,
        Err(err) => {
            error!("{err:#}");
            return ExitCode::FAILURE;
        }
    };

    match pipeline::run_full(&settings, &credentials, &transport) {
        Ok(summary) => {
            info!(
                scanned = summary.scanned,
                with_pvp = summary.with_pvp,
                "full run complete"
            );
            for (bracket, count) in &summary.boards {
                info!("{bracket}: {count}");
            }
            if let Some(snapshots) = summary.snapshots {
                info!("snapshots written: {snapshots}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

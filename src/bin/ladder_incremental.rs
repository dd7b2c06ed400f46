use std::process::ExitCode;

use tracing::{error, info};

use arena_ladder::config::{Credentials, Settings};
use arena_ladder::http_client::HttpTransport;
use arena_ladder::pipeline;

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    arena_ladder::init_logging();

    let settings = Settings::from_env();
    let queue = match pipeline::load_pending(&settings) {
        Ok(Some(queue)) => queue,
        Ok(None) => {
            info!("no new entries queued, nothing to do");
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            error!("{err:#}");
            return ExitCode::FAILURE;
        }
    };

    let credentials = match Credentials::from_env() {
        Ok(credentials) => credentials,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };
    let transport = match HttpTransport::new() {
        Ok(transport) => transport,
        Err(err) => {
            error!("{err:#}");
            return ExitCode::FAILURE;
        }
    };

    match pipeline::run_incremental(&settings, &queue, &credentials, &transport) {
        Ok(summary) => {
            info!(
                fetched = summary.scanned,
                added = summary.added,
                total = summary.total,
                "incremental run complete"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

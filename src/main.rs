use std::path::Path;
use std::process::ExitCode;

use overlay_renderer::{app, logging, settings::Settings};
use tracing::error;

const DEFAULT_SETTINGS_PATH: &str = "settings.json";

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let Some(process_name) = args.next() else {
        eprintln!("usage: overlay_renderer <process-name> [settings-file]");
        return ExitCode::FAILURE;
    };
    let settings_path = args
        .next()
        .unwrap_or_else(|| DEFAULT_SETTINGS_PATH.to_string());

    let settings = match Settings::load(&settings_path) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("failed to load {settings_path}: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = logging::init(
        settings.debug_logging,
        settings.log_file.as_deref().map(Path::new),
    );

    match app::run(settings, &process_name) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

use env_logger::DEFAULT_FILTER_ENV;
use log::LevelFilter;

use crate::CLUSTERSTACK_VERSION;

fn debug_requested_by_env() -> bool {
    std::env::var(DEFAULT_FILTER_ENV)
        .map(|filter| filter.contains("debug") || filter.contains("trace"))
        .unwrap_or(false)
}

/// Initializes the logger of the binary.
///
/// Build messages are printed as `<level> <message>`. With `verbose` (or a debug filter in
/// `RUST_LOG`) records also carry a timestamp and their target. `RUST_LOG` overrides `verbose`.
pub fn setup_logging(verbose: bool) {
    let debug = verbose || debug_requested_by_env();
    let mut builder = env_logger::Builder::default();
    builder
        .filter_level(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .format_module_path(false)
        .format_target(debug);
    if debug {
        builder.format_timestamp_millis();
    } else {
        builder.format_timestamp(None);
    }
    builder.parse_default_env();
    builder.init();

    log::debug!("clusterstack {CLUSTERSTACK_VERSION}");
}

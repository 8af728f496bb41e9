use guarddesk_core::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Level used when neither `RUST_LOG` nor the config says otherwise.
fn base_level(logging: Option<&LoggingConfig>, verbose: bool) -> String {
    if verbose {
        return "debug".into();
    }
    logging
        .and_then(|l| l.level.clone())
        .unwrap_or_else(|| "info".into())
}

/// Build the filter: `RUST_LOG` wins, otherwise the configured level plus
/// any per-crate directives.
pub fn build_filter(logging: Option<&LoggingConfig>, verbose: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let mut filter = EnvFilter::new(base_level(logging, verbose));
    for directive in logging.map(|l| l.filters.as_slice()).unwrap_or_default() {
        match directive.parse() {
            Ok(d) => filter = filter.add_directive(d),
            Err(e) => eprintln!("Ignoring log filter '{directive}': {e}"),
        }
    }
    filter
}

pub fn init(logging: Option<&LoggingConfig>, verbose: bool) {
    let filter = build_filter(logging, verbose);
    let json = logging.is_some_and(|l| l.format == "json");
    let stdout = logging.is_some_and(|l| l.output == "stdout");

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match (json, stdout) {
        (true, true) => builder.json().with_writer(std::io::stdout).init(),
        (true, false) => builder.json().with_writer(std::io::stderr).init(),
        (false, true) => builder.with_writer(std::io::stdout).init(),
        (false, false) => builder.with_writer(std::io::stderr).init(),
    }
}

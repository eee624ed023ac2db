use tracing_subscriber::EnvFilter;

/// Install the global subscriber, logs go to stderr.
///
/// `levels` is an `EnvFilter` directive, e.g. `serf_sd=debug,discovery=info`,
/// an invalid one falls back to `info`.
#[allow(clippy::print_stderr)]
pub fn init(color: bool, json: bool, levels: &str) {
    let filter = EnvFilter::try_new(levels).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(color)
        .with_writer(std::io::stderr);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if let Err(err) = result {
        eprintln!("init tracing subscriber failed, {err}");
    }
}

/// Expands a plain level like `debug` into directives for the crates of
/// this workspace, anything else is passed through.
pub fn directives(level: &str) -> String {
    match level {
        "off" | "error" | "warn" | "info" | "debug" | "trace" => [
            format!("serf_sd={level}"),
            format!("discovery={level}"),
            format!("tripwire={level}"),
        ]
        .join(","),
        other => other.to_string(),
    }
}

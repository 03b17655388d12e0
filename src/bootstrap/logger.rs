//! tracing-subscriber setup.
//!
//! The effective filter comes from one of two sources: the level the agent
//! was configured with, or `RUST_LOG`. CLI `-v` flags make the configured
//! level win; otherwise `RUST_LOG` wins when it is set and valid. Either way
//! the HTTP stack under `/metrics` is held at `warn` unless the chosen
//! directive names it explicitly.

use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Crates whose per-request logs drown out bootstrap output.
const QUIET_TARGETS: &[&str] = &["hyper", "axum", "tower"];

/// Install the global subscriber. Fails if one is already installed.
pub fn init(level: &str, prefer_level: bool) -> Result<(), AppError> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(level, prefer_level, rust_log.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))
}

/// Pick the directive string and turn it into an [`EnvFilter`].
fn build_filter(level: &str, prefer_level: bool, rust_log: Option<&str>) -> Result<EnvFilter, AppError> {
    let directive = select_directive(level, prefer_level, rust_log)?;
    let mut filter = EnvFilter::try_new(directive)
        .map_err(|e| AppError::Logger(format!("invalid log filter '{directive}': {e}")))?;
    for target in QUIET_TARGETS {
        if !directive.contains(target) {
            let quiet = format!("{target}=warn")
                .parse()
                .map_err(|e| AppError::Logger(format!("invalid quiet directive for {target}: {e}")))?;
            filter = filter.add_directive(quiet);
        }
    }
    Ok(filter)
}

fn select_directive<'a>(
    level: &'a str,
    prefer_level: bool,
    rust_log: Option<&'a str>,
) -> Result<&'a str, AppError> {
    let level_ok = EnvFilter::try_new(level).is_ok();
    let env = rust_log.filter(|v| !v.trim().is_empty() && EnvFilter::try_new(v).is_ok());

    match (prefer_level, level_ok, env) {
        (true, true, _) => Ok(level),
        (true, false, Some(env)) => Ok(env),
        (false, _, Some(env)) => Ok(env),
        (false, true, None) => Ok(level),
        (_, false, None) => Err(AppError::Logger(format!("invalid log level '{level}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_level_beats_rust_log() {
        assert_eq!(select_directive("debug", true, Some("warn")).unwrap(), "debug");
    }

    #[test]
    fn rust_log_beats_config_level() {
        assert_eq!(select_directive("info", false, Some("minimal_agent=trace")).unwrap(), "minimal_agent=trace");
        assert_eq!(select_directive("info", false, None).unwrap(), "info");
        assert_eq!(select_directive("info", false, Some("  ")).unwrap(), "info");
    }

    #[test]
    fn invalid_level_falls_back_to_rust_log() {
        assert_eq!(select_directive("foo=notalevel", true, Some("warn")).unwrap(), "warn");
        assert!(matches!(select_directive("foo=notalevel", true, None), Err(AppError::Logger(_))));
    }

    #[test]
    fn http_stack_is_quieted_unless_named() {
        let filter = build_filter("debug", true, None).unwrap().to_string();
        assert!(filter.contains("hyper=warn"), "{filter}");
        assert!(filter.contains("axum=warn"), "{filter}");

        let filter = build_filter("hyper=trace", true, None).unwrap().to_string();
        assert!(!filter.contains("hyper=warn"), "{filter}");
    }
}

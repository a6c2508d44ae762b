use std::path::PathBuf;

pub const LOG_ENV: &str = "CONDUITD_LOG";
pub const WORKSPACE_ENV: &str = "CONDUITD_WORKSPACE";
const DEFAULT_LOG_FILTER: &str = "info";

/// Startup settings, read once from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Workspace opened before the first request, if any.
    pub workspace: Option<PathBuf>,
    /// `tracing_subscriber::EnvFilter` directive string.
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |k: &str| get(k).filter(|v| !v.trim().is_empty());
        Config {
            workspace: non_empty(WORKSPACE_ENV).map(PathBuf::from),
            log_filter: non_empty(LOG_ENV)
                .or_else(|| non_empty("RUST_LOG"))
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn log_filter_falls_back_to_rust_log_then_info() {
        assert_eq!(lookup(&[]).log_filter, "info");
        assert_eq!(lookup(&[("RUST_LOG", "debug")]).log_filter, "debug");
        assert_eq!(
            lookup(&[("RUST_LOG", "debug"), (LOG_ENV, "conduitd=trace")]).log_filter,
            "conduitd=trace"
        );
        assert_eq!(lookup(&[(LOG_ENV, "  ")]).log_filter, "info");
    }

    #[test]
    fn workspace_is_optional() {
        assert_eq!(lookup(&[]).workspace, None);
        assert_eq!(
            lookup(&[(WORKSPACE_ENV, "/tmp/circle")]).workspace,
            Some(PathBuf::from("/tmp/circle"))
        );
    }
}

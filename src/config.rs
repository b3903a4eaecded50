use crate::sync::DEFAULT_DEBOUNCE;
use std::{env, path::PathBuf, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    Rest,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub backend: BackendMode,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub debounce: Duration,
    pub theme_path: PathBuf,
    pub demo_email: String,
    pub demo_password: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            backend: BackendMode::Rest,
            supabase_url: None,
            supabase_anon_key: None,
            debounce: DEFAULT_DEBOUNCE,
            theme_path: PathBuf::from("data/preferences.json"),
            demo_email: "demo@example.com".to_string(),
            demo_password: "demo".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Unparsable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let backend = match non_empty("TRACKER_BACKEND").as_deref().map(str::trim) {
            Some(mode) if mode.eq_ignore_ascii_case("memory") => BackendMode::Memory,
            _ => BackendMode::Rest,
        };

        Self {
            port: non_empty("PORT")
                .and_then(|value| value.trim().parse::<u16>().ok())
                .unwrap_or(defaults.port),
            backend,
            supabase_url: non_empty("SUPABASE_URL"),
            supabase_anon_key: non_empty("SUPABASE_ANON_KEY"),
            debounce: non_empty("TRACKER_DEBOUNCE_MS")
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.debounce),
            theme_path: non_empty("TRACKER_THEME_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.theme_path),
            demo_email: non_empty("TRACKER_DEMO_EMAIL").unwrap_or(defaults.demo_email),
            demo_password: non_empty("TRACKER_DEMO_PASSWORD").unwrap_or(defaults.demo_password),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config(&[]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.backend, BackendMode::Rest);
        assert_eq!(config.debounce, Duration::from_millis(1200));
        assert!(config.supabase_url.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = config(&[
            ("PORT", "3000"),
            ("TRACKER_BACKEND", "Memory"),
            ("TRACKER_DEBOUNCE_MS", "50"),
            ("SUPABASE_URL", "https://example.supabase.co"),
            ("TRACKER_THEME_PATH", "/tmp/prefs.json"),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.backend, BackendMode::Memory);
        assert_eq!(config.debounce, Duration::from_millis(50));
        assert_eq!(config.supabase_url.as_deref(), Some("https://example.supabase.co"));
        assert_eq!(config.theme_path, PathBuf::from("/tmp/prefs.json"));
    }

    #[test]
    fn bad_numbers_and_blank_values_fall_back() {
        let config = config(&[("PORT", "http"), ("TRACKER_DEBOUNCE_MS", "soon"), ("SUPABASE_URL", " ")]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.debounce, DEFAULT_DEBOUNCE);
        assert!(config.supabase_url.is_none());
    }
}

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::store::SeedData;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("cannot read seed file {path}: {source}")]
    SeedIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse seed file {path}: {source}")]
    SeedParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Process settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub listen_addr: SocketAddr,
    pub log_filter: String,
    pub generation_timeout: Duration,
    pub seed_path: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, falling back to defaults for unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let listen_addr = match lookup("TIMETABLE_LISTEN_ADDR") {
            Some(value) => value.parse().map_err(|_| SettingsError::Invalid {
                var: "TIMETABLE_LISTEN_ADDR",
                value,
            })?,
            None => SocketAddr::from(([127, 0, 0, 1], 8080)),
        };

        let log_filter = lookup("TIMETABLE_LOG").unwrap_or_else(|| "info".to_string());

        let generation_timeout = match lookup("TIMETABLE_GENERATION_TIMEOUT_MS") {
            Some(value) => value
                .parse()
                .map(Duration::from_millis)
                .map_err(|_| SettingsError::Invalid {
                    var: "TIMETABLE_GENERATION_TIMEOUT_MS",
                    value,
                })?,
            None => Duration::from_secs(30),
        };

        let seed_path = lookup("TIMETABLE_SEED").map(PathBuf::from);

        Ok(Self {
            listen_addr,
            log_filter,
            generation_timeout,
            seed_path,
        })
    }

    pub fn load_seed(&self) -> Result<Option<SeedData>, SettingsError> {
        let Some(path) = &self.seed_path else {
            return Ok(None);
        };
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::SeedIo {
            path: path.clone(),
            source,
        })?;
        let seed = serde_json::from_str(&raw).map_err(|source| SettingsError::SeedParse {
            path: path.clone(),
            source,
        })?;
        Ok(Some(seed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.listen_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(settings.log_filter, "info");
        assert_eq!(settings.generation_timeout, Duration::from_secs(30));
        assert_eq!(settings.seed_path, None);
        assert!(settings.load_seed().unwrap().is_none());
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("TIMETABLE_LISTEN_ADDR", "0.0.0.0:9000"),
            ("TIMETABLE_LOG", "dept_timetable=trace"),
            ("TIMETABLE_GENERATION_TIMEOUT_MS", "250"),
            ("TIMETABLE_SEED", "/tmp/seed.json"),
        ]))
        .unwrap();
        assert_eq!(settings.listen_addr.port(), 9000);
        assert_eq!(settings.log_filter, "dept_timetable=trace");
        assert_eq!(settings.generation_timeout, Duration::from_millis(250));
        assert_eq!(settings.seed_path, Some(PathBuf::from("/tmp/seed.json")));
    }

    #[test]
    fn test_invalid_values() {
        let err = Settings::from_lookup(lookup(&[("TIMETABLE_GENERATION_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Invalid {
                var: "TIMETABLE_GENERATION_TIMEOUT_MS",
                ..
            }
        ));
        assert!(Settings::from_lookup(lookup(&[("TIMETABLE_LISTEN_ADDR", "nowhere")])).is_err());
    }

    #[test]
    fn test_missing_seed_file() {
        let settings = Settings::from_lookup(lookup(&[(
            "TIMETABLE_SEED",
            "/nonexistent/dept_timetable/seed.json",
        )]))
        .unwrap();
        assert!(matches!(settings.load_seed(), Err(SettingsError::SeedIo { .. })));
    }
}

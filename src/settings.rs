//! Process settings from environment variables.

use crate::error::ConfigError;
use std::net::SocketAddr;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_RESOURCES_PATH: &str = "resources";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// `DATABASE_URL`. Without it the in-memory repository is used.
    pub database_url: Option<String>,
    /// `RESOURCES_PATH`: directory of `*.json` resource descriptors.
    pub resources_path: String,
    /// `BIND_ADDR`
    pub bind_addr: SocketAddr,
    /// `MAX_CONNECTIONS`: PostgreSQL pool size.
    pub max_connections: u32,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Load(format!("BIND_ADDR '{}': {}", bind_addr, e)))?;
        let max_connections = match get("MAX_CONNECTIONS") {
            Some(v) => v
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::Load(format!("MAX_CONNECTIONS '{}' must be a positive integer", v)))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Settings {
            database_url: get("DATABASE_URL"),
            resources_path: get("RESOURCES_PATH").unwrap_or_else(|| DEFAULT_RESOURCES_PATH.to_string()),
            bind_addr,
            max_connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.database_url, None);
        assert_eq!(s.resources_path, "resources");
        assert_eq!(s.bind_addr.port(), 3000);
        assert_eq!(s.max_connections, 5);
    }

    #[test]
    fn reads_variables() {
        let s = settings(&[
            ("DATABASE_URL", "postgres://localhost/rest"),
            ("BIND_ADDR", "0.0.0.0:8080"),
            ("MAX_CONNECTIONS", "20"),
            ("RESOURCES_PATH", ""),
        ])
        .unwrap();
        assert_eq!(s.database_url.as_deref(), Some("postgres://localhost/rest"));
        assert_eq!(s.bind_addr.port(), 8080);
        assert_eq!(s.max_connections, 20);
        assert_eq!(s.resources_path, "resources");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(settings(&[("BIND_ADDR", "nowhere")]).is_err());
        assert!(settings(&[("MAX_CONNECTIONS", "0")]).is_err());
    }
}

use std::path::PathBuf;

use anyhow::Context;

const MAX_SESSION_TTL_SECS: u32 = i32::MAX as u32;

/// Process configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub session_db_path: PathBuf,
    pub session_ttl_secs: u32,
    pub secure_cookies: bool,
    pub static_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let port = get("PARLEY_PORT")
            .unwrap_or_else(|| "10000".into())
            .parse()
            .context("PARLEY_PORT must be a port number")?;
        let session_ttl_secs: u32 = get("PARLEY_SESSION_TTL_SECS")
            .unwrap_or_else(|| "3600".into())
            .parse()
            .context("PARLEY_SESSION_TTL_SECS must be a number of seconds")?;
        if !(1..=MAX_SESSION_TTL_SECS).contains(&session_ttl_secs) {
            anyhow::bail!(
                "PARLEY_SESSION_TTL_SECS must be between 1 and {}, got {}",
                MAX_SESSION_TTL_SECS,
                session_ttl_secs
            );
        }
        let secure_cookies = get("PARLEY_SECURE_COOKIES")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            host: get("PARLEY_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: get("PARLEY_DB_PATH").unwrap_or_else(|| "parley.db".into()).into(),
            session_db_path: get("PARLEY_SESSION_DB_PATH")
                .unwrap_or_else(|| "parley-sessions.db".into())
                .into(),
            session_ttl_secs,
            secure_cookies,
            static_dir: get("PARLEY_STATIC_DIR").unwrap_or_else(|| "./public".into()).into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, 10000);
        assert_eq!(config.session_ttl_secs, 3600);
        assert!(!config.secure_cookies);
        assert_eq!(config.db_path, PathBuf::from("parley.db"));
    }

    #[test]
    fn overrides_and_bad_numbers() {
        let config = config(&[("PARLEY_PORT", "8080"), ("PARLEY_SECURE_COOKIES", "TRUE")]).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.secure_cookies);

        assert!(self::config(&[("PARLEY_PORT", "eighty")]).is_err());
    }

    #[test]
    fn session_ttl_must_be_positive_and_bounded() {
        for bad in ["-1", "0", "-3600", "9223372036854775807", "4294967295"] {
            assert!(
                config(&[("PARLEY_SESSION_TTL_SECS", bad)]).is_err(),
                "accepted ttl {}",
                bad
            );
        }

        let config = config(&[("PARLEY_SESSION_TTL_SECS", "2147483647")]).unwrap();
        assert_eq!(config.session_ttl_secs, 2147483647);
    }
}

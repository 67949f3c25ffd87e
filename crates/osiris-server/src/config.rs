use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};

use osiris_api::Settings;

/// Secrets shipped in examples and old defaults. Starting with one is refused.
const PLACEHOLDER_SECRETS: &[&str] = &["", "changeme", "change-me", "dev-secret-change-me", "secret"];

/// Process configuration read from `OSIRIS_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub banned_words: Vec<String>,
    pub token_ttl_days: i64,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("OSIRIS_JWT_SECRET").unwrap_or_default();
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.trim()) {
            bail!("OSIRIS_JWT_SECRET must be set to a real secret");
        }

        let mut banned_words: Vec<String> = get("OSIRIS_BANNED_WORDS")
            .map(|raw| split_words(raw.split(',')))
            .unwrap_or_default();
        if let Some(path) = get("OSIRIS_BANNED_WORDS_FILE") {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("reading OSIRIS_BANNED_WORDS_FILE at {}", path))?;
            banned_words.extend(split_words(contents.lines()));
        }
        banned_words.sort();
        banned_words.dedup();

        let max_upload_mb: usize = parse_var(&get, "OSIRIS_MAX_UPLOAD_MB", 25)?;
        let max_upload_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .with_context(|| format!("OSIRIS_MAX_UPLOAD_MB is too large: {}", max_upload_mb))?;

        Ok(Self {
            host: get("OSIRIS_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_var(&get, "OSIRIS_PORT", 3000)?,
            db_path: get("OSIRIS_DB_PATH").unwrap_or_else(|| "osiris.db".into()).into(),
            jwt_secret,
            upload_dir: get("OSIRIS_UPLOAD_DIR").unwrap_or_else(|| "./uploads".into()).into(),
            max_upload_bytes,
            banned_words,
            token_ttl_days: parse_var(&get, "OSIRIS_TOKEN_TTL_DAYS", 30)?,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    pub fn settings(&self) -> Settings {
        Settings {
            jwt_secret: self.jwt_secret.clone(),
            token_ttl_days: self.token_ttl_days,
            upload_dir: self.upload_dir.clone(),
            max_upload_bytes: self.max_upload_bytes,
            banned_words: self.banned_words.clone(),
        }
    }
}

fn split_words<'a>(parts: impl Iterator<Item = &'a str>) -> Vec<String> {
    parts
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty() && !w.starts_with('#'))
        .collect()
}

fn parse_var<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("OSIRIS_JWT_SECRET", "s3cr3t-value")]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_path, PathBuf::from("osiris.db"));
        assert_eq!(config.settings().max_upload_bytes, 25 * 1024 * 1024);
        assert_eq!(config.token_ttl_days, 30);
        assert!(config.banned_words.is_empty());
        assert_eq!(config.addr().unwrap().port(), 3000);
    }

    #[test]
    fn placeholder_secrets_are_refused() {
        assert!(load(&[]).is_err());
        assert!(load(&[("OSIRIS_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn bad_numbers_name_the_variable() {
        let err = load(&[("OSIRIS_JWT_SECRET", "s3cr3t-value"), ("OSIRIS_PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("OSIRIS_PORT"));
    }

    #[test]
    fn oversized_upload_limit_is_refused() {
        let huge = usize::MAX.to_string();
        let err = load(&[("OSIRIS_JWT_SECRET", "s3cr3t-value"), ("OSIRIS_MAX_UPLOAD_MB", huge.as_str())]).unwrap_err();
        assert!(err.to_string().contains("OSIRIS_MAX_UPLOAD_MB"));

        let config = load(&[("OSIRIS_JWT_SECRET", "s3cr3t-value"), ("OSIRIS_MAX_UPLOAD_MB", "2")]).unwrap();
        assert_eq!(config.max_upload_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn banned_words_are_normalised() {
        let config = load(&[
            ("OSIRIS_JWT_SECRET", "s3cr3t-value"),
            ("OSIRIS_BANNED_WORDS", " Spam, scam ,,spam"),
        ])
        .unwrap();
        assert_eq!(config.banned_words, vec!["scam".to_string(), "spam".to_string()]);
    }
}

//! `.env`-style connection files.
//!
//! Each line is `KEY=VALUE`. Blank lines and lines starting with `#` are
//! skipped, and anything after a `#` in a value is treated as a comment.
//! Keys missing from the file fall back to the process environment, then to
//! the built-in defaults.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use super::types::{DatabaseConfig, Driver};
use crate::error::{MigrateError, Result};

/// File read when no env file is named. It may be absent.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Parse env file content into a key/value map.
pub fn parse_env(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        let key = key.trim().trim_start_matches("export ").trim();
        let mut value = value.trim();
        if let Some(idx) = value.find('#') {
            value = value[..idx].trim();
        }
        let value = strip_quotes(value);

        if !key.is_empty() {
            vars.insert(key.to_string(), value.to_string());
        }
    }

    vars
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Read an env file.
///
/// With `path = None` the default `.env` is read if present. An explicitly
/// named file that cannot be read is a configuration error.
pub fn load_env_file(path: Option<&Path>) -> Result<HashMap<String, String>> {
    let (path, required) = match path {
        Some(p) => (p, true),
        None => (Path::new(DEFAULT_ENV_FILE), false),
    };

    match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!("Loaded env file {}", path.display());
            Ok(parse_env(&content))
        }
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No {} file, using process environment", path.display());
            Ok(HashMap::new())
        }
        Err(e) => Err(MigrateError::Config(format!(
            "cannot read env file {}: {}",
            path.display(),
            e
        ))),
    }
}

impl DatabaseConfig {
    /// Build a config from an env file, the process environment and defaults.
    /// `driver_override` replaces whatever `DB_DRIVER` says.
    pub fn from_env_file(path: Option<&Path>, driver_override: Option<Driver>) -> Result<Self> {
        let vars = load_env_file(path)?;
        Self::from_env_vars(&vars, |key| std::env::var(key).ok(), driver_override)
    }

    /// Resolve each key from `vars`, then `fallback`, then the default.
    pub fn from_env_vars<F>(
        vars: &HashMap<String, String>,
        fallback: F,
        driver_override: Option<Driver>,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| -> Option<String> {
            vars.get(key)
                .cloned()
                .or_else(|| fallback(key))
                .filter(|v| !v.is_empty())
        };

        let driver = match driver_override {
            Some(d) => d,
            None => match lookup("DB_DRIVER") {
                Some(name) => name.parse()?,
                None => Driver::default(),
            },
        };

        let mut config = DatabaseConfig::new(driver);
        if let Some(host) = lookup("DB_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("DB_PORT") {
            let port = port
                .parse::<u16>()
                .map_err(|_| MigrateError::Config(format!("DB_PORT is not a valid port: '{}'", port)))?;
            config.port = Some(port);
        }
        if let Some(user) = lookup("DB_USER") {
            config.user = user;
        }
        if let Some(password) = lookup("DB_PASSWORD") {
            config.password = password;
        }
        if let Some(name) = lookup("DB_NAME") {
            config.database = name;
        }
        if let Some(path) = lookup("DB_PATH") {
            config.path = path.into();
        }
        if let Some(mode) = lookup("DB_SSLMODE") {
            config.ssl_mode = mode;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let vars = parse_env(
            "# connection\n\nDB_DRIVER=mysql\n  DB_HOST = db.internal  \nnot a pair\n",
        );
        assert_eq!(vars.len(), 2);
        assert_eq!(vars["DB_DRIVER"], "mysql");
        assert_eq!(vars["DB_HOST"], "db.internal");
    }

    #[test]
    fn test_parse_strips_inline_comments_and_quotes() {
        let vars = parse_env("DB_PORT=3307 # custom port\nDB_PASSWORD=\"s3cret\"\nDB_NAME='forum'\n");
        assert_eq!(vars["DB_PORT"], "3307");
        assert_eq!(vars["DB_PASSWORD"], "s3cret");
        assert_eq!(vars["DB_NAME"], "forum");
    }

    #[test]
    fn test_parse_keeps_equals_in_value() {
        let vars = parse_env("DB_PASSWORD=a=b=c\n");
        assert_eq!(vars["DB_PASSWORD"], "a=b=c");
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = DatabaseConfig::from_env_vars(&HashMap::new(), no_env, None).unwrap();
        assert_eq!(config.driver, Driver::Postgres);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port(), 5432);
        assert_eq!(config.user, "postgres");
        assert_eq!(config.database, "board");
        assert_eq!(config.path, std::path::PathBuf::from("./data/board.db"));
        assert_eq!(config.ssl_mode, "disable");
    }

    #[test]
    fn test_file_wins_over_process_env() {
        let vars = parse_env("DB_HOST=from-file\n");
        let fallback = |key: &str| match key {
            "DB_HOST" => Some("from-env".to_string()),
            "DB_USER" => Some("env-user".to_string()),
            _ => None,
        };
        let config = DatabaseConfig::from_env_vars(&vars, fallback, None).unwrap();
        assert_eq!(config.host, "from-file");
        assert_eq!(config.user, "env-user");
    }

    #[test]
    fn test_driver_override_and_port_default() {
        let vars = parse_env("DB_DRIVER=postgres\n");
        let config = DatabaseConfig::from_env_vars(&vars, no_env, Some(Driver::Mysql)).unwrap();
        assert_eq!(config.driver, Driver::Mysql);
        assert_eq!(config.port(), 3306);
    }

    #[test]
    fn test_invalid_port_and_driver_rejected() {
        let vars = parse_env("DB_PORT=abc\n");
        assert!(DatabaseConfig::from_env_vars(&vars, no_env, None).is_err());
        let vars = parse_env("DB_DRIVER=oracle\n");
        assert!(DatabaseConfig::from_env_vars(&vars, no_env, None).is_err());
    }

    // =========================================================================
    // Files
    // =========================================================================

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.env");
        let err = load_env_file(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("missing.env"));
    }

    #[test]
    fn test_load_named_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "DB_DRIVER=sqlite\nDB_PATH=/tmp/forum.db").unwrap();
        let config = DatabaseConfig::from_env_file(Some(file.path()), None).unwrap();
        assert_eq!(config.driver, Driver::Sqlite);
        assert_eq!(config.path, std::path::PathBuf::from("/tmp/forum.db"));
    }
}

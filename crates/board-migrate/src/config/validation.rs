//! Configuration validation.

use super::types::{Config, DatabaseConfig, Driver, MigrationOptions};
use crate::drivers::SslMode;
use crate::error::{MigrateError, Result};

/// Validate the whole configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_database(&config.source, "source")?;

    if let Some(target) = &config.target {
        validate_database(target, "target")?;

        if config.source.same_database(target) {
            return Err(MigrateError::Config(
                "source and target cannot be the same database".into(),
            ));
        }
    }

    validate_options(&config.migration)
}

/// Validate one connection block; `side` names it in messages.
pub fn validate_database(db: &DatabaseConfig, side: &str) -> Result<()> {
    match db.driver {
        Driver::Sqlite => {
            if db.path.as_os_str().is_empty() {
                return Err(MigrateError::Config(format!("{}.path is required", side)));
            }
        }
        Driver::Postgres | Driver::Mysql => {
            if db.host.is_empty() {
                return Err(MigrateError::Config(format!("{}.host is required", side)));
            }
            if db.database.is_empty() {
                return Err(MigrateError::Config(format!("{}.database is required", side)));
            }
            if db.user.is_empty() {
                return Err(MigrateError::Config(format!("{}.user is required", side)));
            }
            if db.port == Some(0) {
                return Err(MigrateError::Config(format!("{}.port must be non-zero", side)));
            }
            SslMode::parse(&db.ssl_mode)?;
        }
    }
    Ok(())
}

/// Reject option combinations that cannot both hold.
pub fn validate_options(options: &MigrationOptions) -> Result<()> {
    if options.batch_size == 0 {
        return Err(MigrateError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }
    if options.dynamic_only && options.basic_only {
        return Err(MigrateError::Config(
            "dynamic-only and basic-only cannot be used together".into(),
        ));
    }
    if options.data_only && options.schema_only {
        return Err(MigrateError::Config(
            "data-only and schema-only cannot be used together".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut target = DatabaseConfig::new(Driver::Postgres);
        target.database = "board_new".to_string();
        target.password = "password".to_string();
        Config {
            source: DatabaseConfig::new(Driver::Mysql),
            target: Some(target),
            migration: MigrationOptions::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_source_host() {
        let mut config = valid_config();
        config.source.host = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_same_database_rejected() {
        let mut config = valid_config();
        config.target = Some(config.source.clone());
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("same database"));
    }

    #[test]
    fn test_same_host_different_driver_allowed() {
        let mut config = valid_config();
        let mut target = config.source.clone();
        target.driver = Driver::Postgres;
        config.target = Some(target);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_sqlite_same_path_rejected() {
        let mut config = valid_config();
        config.source = DatabaseConfig::sqlite("/tmp/a.db");
        config.target = Some(DatabaseConfig::sqlite("/tmp/a.db"));
        assert!(validate(&config).is_err());
        config.target = Some(DatabaseConfig::sqlite("/tmp/b.db"));
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_conflicting_flags() {
        let mut options = MigrationOptions {
            dynamic_only: true,
            basic_only: true,
            ..Default::default()
        };
        assert!(validate_options(&options).is_err());

        options.basic_only = false;
        options.data_only = true;
        options.schema_only = true;
        assert!(validate_options(&options).is_err());
    }

    #[test]
    fn test_invalid_ssl_mode() {
        let mut config = valid_config();
        config.source.ssl_mode = "sometimes".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_database_config_debug_redacts_password() {
        let mut config = valid_config();
        config.source.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.source);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_password_123"));
    }
}

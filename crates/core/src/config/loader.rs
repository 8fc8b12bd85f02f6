use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("REELAY_").split("_"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[relays]
read = ["wss://read.example.com"]
write = ["wss://write.example.com"]

[orchestrator]
result_timeout_secs = 120
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.relays.write, vec!["wss://write.example.com"]);
        assert_eq!(config.orchestrator.result_timeout_secs, 120);
    }

    #[test]
    fn test_load_config_from_str_missing_relays() {
        let toml = r#"
[store]
path = "tasks.db"
"#;
        let result = load_config_from_str(toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[relays]
read = ["wss://relay.example.com"]
write = ["wss://relay.example.com"]

[store]
path = "/tmp/reelay-test.db"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.relays.read, vec!["wss://relay.example.com"]);
        assert_eq!(
            config.store.path,
            std::path::PathBuf::from("/tmp/reelay-test.db")
        );
    }
}

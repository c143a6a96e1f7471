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
        .merge(Env::prefixed("CROSSSEED_").split("_"))
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
[downloader]
url = "http://localhost:8080"

[sites]
url = "http://localhost:9117"
api_key = "k"
target_sites = ["alpha"]
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.downloader.url, "http://localhost:8080");
        assert_eq!(config.sites.target_sites, vec!["alpha"]);
    }

    #[test]
    fn test_load_config_from_str_missing_sites() {
        let toml = r#"
[downloader]
url = "http://localhost:8080"
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
[downloader]
url = "http://qbit:8080"

[sites]
url = "http://jackett:9117"
api_key = "file-key"
target_sites = ["alpha", "beta"]

[reconcile]
size_tolerance_mb = 0.02
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.downloader.url, "http://qbit:8080");
        assert_eq!(config.reconcile.size_tolerance_mb, 0.02);
    }
}

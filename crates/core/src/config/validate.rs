use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Cooldown window is well-formed (min <= max)
/// - Size tolerance is not negative
/// - Worker pools are at least 1
/// - At least one target site is configured
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let reconcile = &config.reconcile;

    if reconcile.cooldown_min_secs > reconcile.cooldown_max_secs {
        return Err(ConfigError::ValidationError(format!(
            "reconcile.cooldown_min_secs ({}) cannot exceed cooldown_max_secs ({})",
            reconcile.cooldown_min_secs, reconcile.cooldown_max_secs
        )));
    }

    if reconcile.size_tolerance_mb < 0.0 {
        return Err(ConfigError::ValidationError(
            "reconcile.size_tolerance_mb cannot be negative".to_string(),
        ));
    }

    if reconcile.worker_pool == 0 {
        return Err(ConfigError::ValidationError(
            "reconcile.worker_pool must be at least 1".to_string(),
        ));
    }

    if reconcile.search_workers == 0 {
        return Err(ConfigError::ValidationError(
            "reconcile.search_workers must be at least 1".to_string(),
        ));
    }

    if config.sites.target_sites.is_empty() {
        return Err(ConfigError::ValidationError(
            "sites.target_sites must list at least one site".to_string(),
        ));
    }

    Ok(())
}

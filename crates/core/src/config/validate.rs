use super::{
    types::{Config, DiscoveryBackend, JobRunnerBackend},
    ConfigError,
};

/// Upper bound for every duration setting (one year).
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Validate configuration.
///
/// Any error here is fatal to the invoking command: nothing is read from or
/// written to the state store before the configuration passes.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    if config.capacity.max_concurrent == 0 {
        return Err(invalid("capacity.max_concurrent must be greater than 0"));
    }

    if config.scheduler.max_to_start == 0 {
        return Err(invalid("scheduler.max_to_start must be greater than 0"));
    }

    let reconciler = &config.reconciler;
    if reconciler.max_to_check == 0 {
        return Err(invalid("reconciler.max_to_check must be greater than 0"));
    }
    if reconciler.job_timeout_secs == 0 {
        return Err(invalid("reconciler.job_timeout_secs must be greater than 0"));
    }
    for (field, secs) in [
        ("scheduler.call_timeout_secs", config.scheduler.call_timeout_secs),
        ("reconciler.job_timeout_secs", reconciler.job_timeout_secs),
        ("reconciler.stale_after_secs", reconciler.stale_after_secs),
        ("reconciler.resume_after_secs", reconciler.resume_after_secs),
        ("reconciler.call_timeout_secs", reconciler.call_timeout_secs),
    ] {
        if secs > MAX_DURATION_SECS {
            return Err(ConfigError::ValidationError(format!(
                "{} must not exceed {} seconds",
                field, MAX_DURATION_SECS
            )));
        }
    }
    if reconciler.stale_after_secs < reconciler.job_timeout_secs {
        return Err(invalid(
            "reconciler.stale_after_secs must not be shorter than reconciler.job_timeout_secs",
        ));
    }

    for (field, name) in [
        ("jobs.preprocess_job", &config.jobs.preprocess_job),
        ("jobs.compute_a_job", &config.jobs.compute_a_job),
        ("jobs.compute_b_job", &config.jobs.compute_b_job),
    ] {
        if name.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
    }
    if config.jobs.compute_a_job == config.jobs.compute_b_job {
        return Err(invalid(
            "jobs.compute_a_job and jobs.compute_b_job must be different jobs",
        ));
    }

    if config.job_runner.backend == JobRunnerBackend::Http {
        match &config.job_runner.http {
            Some(http) if !http.url.trim().is_empty() => {}
            _ => {
                return Err(invalid(
                    "job_runner.http.url is required when job_runner.backend = \"http\"",
                ))
            }
        }
    }

    match config.discovery.backend {
        DiscoveryBackend::Filesystem if config.discovery.root.is_none() => {
            return Err(invalid(
                "discovery.root is required when discovery.backend = \"filesystem\"",
            ));
        }
        DiscoveryBackend::File if config.discovery.combinations_file.is_none() => {
            return Err(invalid(
                "discovery.combinations_file is required when discovery.backend = \"file\"",
            ));
        }
        _ => {}
    }
    if config.discovery.backend == DiscoveryBackend::Filesystem
        && config.discovery.required_types.is_empty()
    {
        return Err(invalid("discovery.required_types cannot be empty"));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::constants::{DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_FETCH_TIMEOUT};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("source directory does not exist: {}", .0.display())]
    MissingSource(PathBuf),
}

/// Command line surface.
#[derive(Debug, Parser)]
#[command(name = "bdfr-media")]
#[command(about = "Scrapes media links from a bdfr archive")]
#[command(version)]
pub struct Cli {
    /// Directory containing the source bdfr posts
    pub source: PathBuf,

    /// Directory to save media and processed posts to
    pub dest_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, env = "BDFR_MEDIA_VERBOSE")]
    pub verbose: bool,

    /// Number of posts to process in parallel
    #[arg(short, long, default_value = "1", env = "BDFR_MEDIA_JOBS")]
    pub jobs: usize,

    /// Seconds allowed for resolving a single link
    #[arg(long, default_value_t = DEFAULT_ATTEMPT_TIMEOUT.as_secs(), env = "BDFR_MEDIA_ATTEMPT_TIMEOUT")]
    pub attempt_timeout: u64,

    /// Seconds allowed for a single HTTP request
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT.as_secs(), env = "BDFR_MEDIA_FETCH_TIMEOUT")]
    pub fetch_timeout: u64,
}

/// Run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of directory containing source bdfr posts.
    pub source: PathBuf,
    /// Destination directory for media and processed posts.
    pub dest_dir: PathBuf,
    pub verbose: bool,
    /// Number of posts processed in parallel.
    pub jobs: usize,
    /// Budget for resolving one link, album members included.
    pub attempt_timeout: Duration,
    /// Budget for one HTTP GET.
    pub fetch_timeout: Duration,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Self {
            source: cli.source,
            dest_dir: cli.dest_dir,
            verbose: cli.verbose,
            jobs: cli.jobs,
            attempt_timeout: Duration::from_secs(cli.attempt_timeout),
            fetch_timeout: Duration::from_secs(cli.fetch_timeout),
        }
    }
}

impl Config {
    /// Configuration with default timeouts and a single job.
    #[must_use]
    pub fn new(source: impl Into<PathBuf>, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            dest_dir: dest_dir.into(),
            verbose: false,
            jobs: 1,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jobs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "jobs".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.attempt_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "attempt-timeout".to_string(),
                message: "must be at least 1 second".to_string(),
            });
        }
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "fetch-timeout".to_string(),
                message: "must be at least 1 second".to_string(),
            });
        }
        if !self.source.is_dir() {
            return Err(ConfigError::MissingSource(self.source.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_positionals_and_options() {
        let cli = Cli::try_parse_from(["bdfr-media", "-v", "-j", "4", "src", "dst"]).unwrap();
        let config = Config::from(cli);

        assert_eq!(config.source, PathBuf::from("src"));
        assert_eq!(config.dest_dir, PathBuf::from("dst"));
        assert!(config.verbose);
        assert_eq!(config.jobs, 4);
        assert_eq!(config.attempt_timeout, DEFAULT_ATTEMPT_TIMEOUT);
        assert_eq!(config.fetch_timeout, DEFAULT_FETCH_TIMEOUT);
    }

    #[test]
    fn test_missing_dest_is_usage_error() {
        assert!(Cli::try_parse_from(["bdfr-media", "src"]).is_err());
        assert!(Cli::try_parse_from(["bdfr-media"]).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::new(dir.path(), dir.path().join("out"));
        assert!(config.validate().is_ok());

        config.jobs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path().join("nope"), dir.path());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingSource(_))
        ));
    }
}

#![forbid(unsafe_code)]

//! Forge configuration handling. Parses a TOML file into a strongly-typed
//! structure; every field has a default so a partial file (or none at all) is
//! valid. Command line flags override individual fields after loading.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};

use crate::draft::CertificateSpec;
use crate::protocol::Direction;
use crate::{ForgeError, ForgeResult};

/// Run configuration shared by the prober, the engine and the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    /// Target identity: `host:port` of a server target, or a label for a
    /// client target. Also keys the capability cache.
    pub target: String,

    /// Role of the implementation under test.
    pub direction: Direction,

    /// Logging verbosity (`error`, `warn`, `info`, `debug`, `trace`).
    pub log_level: Option<String>,

    /// Size of the interaction worker pool. Capped at hardware parallelism.
    #[serde(default = "default_parallel_handshakes")]
    pub parallel_handshakes: usize,

    /// Size of the test case worker pool. Defaults to `ceil(1.5 * parallel_handshakes)`.
    pub parallel_tests: Option<usize>,

    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,

    /// Watchdog window without any completion event.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Command run by the watchdog when no progress was observed.
    pub restart_command: Option<String>,

    /// Command that makes a client target connect.
    pub trigger_command: Option<String>,

    pub trigger_interval_ms: u64,

    /// Port the client synchronizer and driver listen on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    pub cache_dir: PathBuf,

    /// Probe again even when a cached report exists.
    pub ignore_cache: bool,

    /// Covering strength used when a test does not override it.
    #[serde(default = "default_strength")]
    pub strength: usize,

    pub output_dir: PathBuf,

    /// Certificates available to the driver.
    #[serde(default = "CertificateSpec::default_catalog")]
    pub certificates: Vec<CertificateSpec>,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            target: "localhost:4433".to_string(),
            direction: Direction::Server,
            log_level: Some("info".to_string()),
            parallel_handshakes: default_parallel_handshakes(),
            parallel_tests: None,
            connect_timeout_ms: 1000,
            read_timeout_ms: 2000,
            idle_timeout_secs: default_idle_timeout_secs(),
            restart_command: None,
            trigger_command: None,
            trigger_interval_ms: 1000,
            listen_port: default_listen_port(),
            cache_dir: PathBuf::from("cache"),
            ignore_cache: false,
            strength: default_strength(),
            output_dir: PathBuf::from("results"),
            certificates: CertificateSpec::default_catalog(),
        }
    }
}

fn default_parallel_handshakes() -> usize {
    5
}

fn default_idle_timeout_secs() -> u64 {
    600
}

fn default_listen_port() -> u16 {
    4433
}

fn default_strength() -> usize {
    2
}

impl ForgeConfig {
    /// Load a configuration file from the given path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ForgeResult<Self> {
        let data = fs::read_to_string(&path).map_err(ForgeError::from)?;
        let cfg = toml::from_str::<ForgeConfig>(&data).map_err(ForgeError::ConfigParse)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load config alias version
    pub fn load<P: AsRef<Path>>(path: P) -> ForgeResult<Self> {
        Self::from_file(path)
    }

    pub fn validate(&self) -> ForgeResult<()> {
        if self.parallel_handshakes == 0 {
            return Err(ForgeError::InvalidConfig("parallel_handshakes must be at least 1".into()));
        }
        if self.parallel_tests == Some(0) {
            return Err(ForgeError::InvalidConfig("parallel_tests must be at least 1".into()));
        }
        if self.strength == 0 {
            return Err(ForgeError::InvalidConfig("strength must be at least 1".into()));
        }
        if self.idle_timeout_secs == 0 {
            return Err(ForgeError::InvalidConfig("idle_timeout_secs must be at least 1".into()));
        }
        Ok(())
    }

    /// Interaction pool size after capping at the available parallelism.
    pub fn effective_parallel_handshakes(&self) -> usize {
        let hardware = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        self.parallel_handshakes.clamp(1, hardware)
    }

    /// Test case pool size, `ceil(1.5 * P)` unless configured.
    pub fn effective_parallel_tests(&self) -> usize {
        self.parallel_tests
            .unwrap_or_else(|| (self.effective_parallel_handshakes() * 3).div_ceil(2))
            .max(1)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn trigger_interval(&self) -> Duration {
        Duration::from_millis(self.trigger_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_uses_defaults() {
        let cfg: ForgeConfig = toml::from_str(
            r#"
            target = "10.0.0.2:443"
            direction = "client"
            parallel_handshakes = 3
            "#,
        )
        .unwrap();
        assert_eq!(cfg.direction, Direction::Client);
        assert_eq!(cfg.strength, 2);
        assert_eq!(cfg.idle_timeout_secs, 600);
        assert_eq!(cfg.certificates.len(), CertificateSpec::default_catalog().len());
    }

    #[test]
    fn test_pool_defaults_to_one_and_a_half_times_interaction_pool() {
        let cfg = ForgeConfig { parallel_handshakes: 1, ..ForgeConfig::default() };
        assert_eq!(cfg.effective_parallel_handshakes(), 1);
        assert_eq!(cfg.effective_parallel_tests(), 2);

        let cfg = ForgeConfig { parallel_tests: Some(7), ..ForgeConfig::default() };
        assert_eq!(cfg.effective_parallel_tests(), 7);
    }

    #[test]
    fn zero_strength_is_rejected() {
        let cfg = ForgeConfig { strength: 0, ..ForgeConfig::default() };
        assert!(matches!(cfg.validate(), Err(ForgeError::InvalidConfig(_))));
    }
}

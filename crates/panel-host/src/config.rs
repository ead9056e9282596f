//! Host configuration: the shared `[bridge]` table plus `[simulation]` delays.

use std::path::{Path, PathBuf};
use std::time::Duration;

use panel_bridge::{find_config_file, BridgeConfig, BridgeSection};
use serde::Deserialize;
use tracing::warn;

const DEFAULT_DUMMY_DATA_DELAY: Duration = Duration::from_millis(1500);
const DEFAULT_ANALYSIS_DELAY: Duration = Duration::from_millis(2000);

/// Simulated backend latencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationConfig {
    pub dummy_data_delay: Duration,
    pub analysis_delay: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dummy_data_delay: DEFAULT_DUMMY_DATA_DELAY,
            analysis_delay: DEFAULT_ANALYSIS_DELAY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostConfig {
    pub bridge: BridgeConfig,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SimulationSection {
    dummy_data_delay_ms: Option<u64>,
    analysis_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    bridge: BridgeSection,
    simulation: SimulationSection,
}

impl HostConfig {
    fn with_config_path(config_path: Option<PathBuf>) -> Self {
        Self {
            bridge: BridgeConfig {
                config_path,
                ..BridgeConfig::default()
            },
            simulation: SimulationConfig::default(),
        }
    }

    /// Loads `panel-bridge.toml` from `root` if present.
    pub fn load(root: &Path) -> Self {
        match find_config_file(root) {
            Some(path) => Self::load_file(root, &path),
            None => Self::default(),
        }
    }

    pub fn load_file(root: &Path, path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_contents(root, Some(path.to_path_buf()), &contents),
            Err(err) => {
                warn!("Failed to read host config at {}: {err}", path.display());
                Self::with_config_path(Some(path.to_path_buf()))
            }
        }
    }

    pub fn from_contents(root: &Path, config_path: Option<PathBuf>, contents: &str) -> Self {
        let parsed: ConfigFile = match toml::from_str(contents) {
            Ok(parsed) => parsed,
            Err(err) => {
                match &config_path {
                    Some(path) => {
                        warn!("Failed to parse host config at {}: {err}", path.display());
                    }
                    None => warn!("Failed to parse host config: {err}"),
                }
                return Self::with_config_path(config_path);
            }
        };
        let defaults = SimulationConfig::default();
        Self {
            bridge: BridgeConfig::from_section(root, config_path, parsed.bridge),
            simulation: SimulationConfig {
                dummy_data_delay: parsed
                    .simulation
                    .dummy_data_delay_ms
                    .map_or(defaults.dummy_data_delay, Duration::from_millis),
                analysis_delay: parsed
                    .simulation
                    .analysis_delay_ms
                    .map_or(defaults.analysis_delay, Duration::from_millis),
            },
        }
    }
}

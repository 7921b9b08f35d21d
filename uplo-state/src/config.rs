//! On-disk location and tuning knobs for the `sled`-backed store.

use std::path::PathBuf;

/// Where the store keeps its data, and how its `sled::Db` is tuned.
/// Mirrors the production backend's existing "look up a per-network
/// cache directory, fall back to a temp directory in tests" pattern.
#[derive(Clone, Debug)]
pub struct Config {
    pub cache_dir: PathBuf,
    pub ephemeral: bool,
}

impl Config {
    pub fn persistent(cache_dir: impl Into<PathBuf>) -> Config {
        Config {
            cache_dir: cache_dir.into(),
            ephemeral: false,
        }
    }

    /// A throwaway store for tests: backed by a fresh temp directory that
    /// is deleted when the returned `Config` (and its store) is dropped.
    pub fn ephemeral() -> Config {
        Config {
            cache_dir: std::env::temp_dir().join(format!("uplo-state-{}", std::process::id())),
            ephemeral: true,
        }
    }

    pub fn sled_config(&self, network: uplo_chain::parameters::Network) -> sled::Config {
        let path = self.cache_dir.join(network.to_string()).join("state");
        sled::Config::default()
            .path(path)
            .temporary(self.ephemeral)
    }
}

impl Default for Config {
    fn default() -> Config {
        Config::persistent(
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("uplo"),
        )
    }
}

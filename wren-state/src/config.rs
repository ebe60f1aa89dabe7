//! Configuration for the on-disk state.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use wren_chain::parameters::Network;

/// Configuration for the durable state: where the database environment,
/// the block files, and the optional `addr.txt` import live.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// The root directory for all node data.
    ///
    /// Each network gets its own subdirectory, so one cache dir can hold
    /// mainnet and testnet state side by side.
    pub cache_dir: PathBuf,

    /// Whether to use an ephemeral (in-temp, delete-on-drop) database
    /// environment. Block files still live under `cache_dir`.
    pub ephemeral: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(|| std::env::current_dir().unwrap().join("cache"))
                .join("wren"),
            ephemeral: false,
        }
    }
}

impl Config {
    /// The application directory for `network`: the parent of the database
    /// environment, block files, and peer import file.
    pub fn app_dir(&self, network: Network) -> PathBuf {
        let net_dir = match network {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        };
        self.cache_dir.join(net_dir)
    }

    /// The sled configuration for the database environment.
    pub fn sled_config(&self, network: Network) -> sled::Config {
        let config = sled::Config::default();
        if self.ephemeral {
            config.temporary(true)
        } else {
            config.path(self.app_dir(network).join("database"))
        }
    }

    /// Where the block files for `network` live.
    pub fn block_dir(&self, network: Network) -> PathBuf {
        self.app_dir(network).join("blocks")
    }

    /// The optional user-provided peer address import file.
    pub fn addr_import_path(&self, network: Network) -> PathBuf {
        self.app_dir(network).join("addr.txt")
    }
}

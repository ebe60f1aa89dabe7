//! The peer address book table.

use std::collections::HashMap;
use std::io::{self, BufRead};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use wren_chain::serialization::{SerializationError, WrenDeserialize, WrenSerialize};

use crate::store::{Env, StoreError, Table};

/// The port peers listen on when a bare IP is imported.
pub const DEFAULT_PORT: u16 = 9333;

/// A known peer: its service bits, socket address, and when we last
/// heard from it. Keyed in the table by its canonical address encoding.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PeerAddress {
    pub services: u64,
    pub addr: SocketAddr,
    pub last_seen: DateTime<Utc>,
}

impl PeerAddress {
    pub fn new(addr: SocketAddr, services: u64) -> PeerAddress {
        PeerAddress {
            services,
            addr,
            last_seen: Utc::now(),
        }
    }

    /// The canonical table key: the 16-byte v6-mapped IP and the
    /// big-endian port.
    pub fn key(&self) -> Vec<u8> {
        self.addr
            .wren_serialize_to_vec()
            .expect("socket addresses always serialize")
    }
}

impl WrenSerialize for PeerAddress {
    fn wren_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        self.services.wren_serialize(&mut writer)?;
        self.addr.wren_serialize(&mut writer)?;
        self.last_seen.wren_serialize(&mut writer)
    }
}

impl WrenDeserialize for PeerAddress {
    fn wren_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(PeerAddress {
            services: u64::wren_deserialize(&mut reader)?,
            addr: SocketAddr::wren_deserialize(&mut reader)?,
            last_seen: <DateTime<Utc>>::wren_deserialize(&mut reader)?,
        })
    }
}

/// A handle on the peer address table.
#[derive(Debug)]
pub struct AddrDb {
    table: Table,
}

fn addr_key(key: &[u8]) -> (String, Vec<u8>) {
    ("addr".to_string(), key.to_vec())
}

impl AddrDb {
    pub fn open(env: &Env) -> Result<AddrDb, StoreError> {
        Ok(AddrDb {
            table: env.open_table("addr")?,
        })
    }

    pub fn write_address(&mut self, addr: &PeerAddress) -> Result<(), StoreError> {
        self.table.write(&addr_key(&addr.key()), addr)
    }

    pub fn erase_address(&mut self, addr: &PeerAddress) -> Result<(), StoreError> {
        self.table.erase(&addr_key(&addr.key()))
    }

    /// Load every persisted peer address, first importing any
    /// user-provided `addr.txt` (one address per line).
    pub fn load_addresses(
        &mut self,
        import_path: &Path,
    ) -> Result<HashMap<Vec<u8>, PeerAddress>, StoreError> {
        let mut addresses = HashMap::new();

        if let Ok(file) = std::fs::File::open(import_path) {
            let mut imported = 0usize;
            for line in io::BufReader::new(file).lines() {
                let line = line?;
                if let Some(addr) = parse_import_line(&line) {
                    let peer = PeerAddress::new(addr, 0);
                    self.write_address(&peer)?;
                    imported += 1;
                }
            }
            info!(imported, path = %import_path.display(), "imported peer addresses");
        }

        for entry in self.table.cursor() {
            let (_key, value) = entry?;
            let peer = PeerAddress::wren_deserialize(&value[..])?;
            addresses.insert(peer.key(), peer);
        }
        debug!(count = addresses.len(), "loaded peer addresses");
        Ok(addresses)
    }
}

fn parse_import_line(line: &str) -> Option<SocketAddr> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    if let Ok(addr) = line.parse::<SocketAddr>() {
        return Some(addr);
    }
    line.parse::<IpAddr>()
        .ok()
        .map(|ip| SocketAddr::new(ip, DEFAULT_PORT))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempdir::TempDir;

    use wren_chain::parameters::Network;

    use crate::Config;

    use super::*;

    #[test]
    fn addresses_roundtrip_through_the_table() {
        wren_test::init();
        let dir = TempDir::new("wren-addr-test").unwrap();
        let config = Config {
            cache_dir: dir.path().to_path_buf(),
            ephemeral: false,
        };
        let env = Env::open(&config, Network::Regtest).unwrap();
        let mut db = AddrDb::open(&env).unwrap();

        let peer = PeerAddress::new("10.0.0.1:9333".parse().unwrap(), 1);
        db.write_address(&peer).unwrap();

        let loaded = db.load_addresses(&dir.path().join("missing-addr.txt")).unwrap();
        assert_eq!(loaded.len(), 1);
        let restored = loaded.get(&peer.key()).unwrap();
        assert_eq!(restored.addr, peer.addr);
        assert_eq!(restored.services, peer.services);
    }

    #[test]
    fn addr_txt_lines_are_imported() {
        wren_test::init();
        let dir = TempDir::new("wren-addr-test").unwrap();
        let config = Config {
            cache_dir: dir.path().to_path_buf(),
            ephemeral: false,
        };
        let env = Env::open(&config, Network::Regtest).unwrap();
        let mut db = AddrDb::open(&env).unwrap();

        let import = dir.path().join("addr.txt");
        let mut file = std::fs::File::create(&import).unwrap();
        writeln!(file, "10.0.0.2:9333").unwrap();
        writeln!(file, "10.0.0.3").unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "not an address").unwrap();
        drop(file);

        let loaded = db.load_addresses(&import).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded
            .values()
            .any(|peer| peer.addr == "10.0.0.3:9333".parse().unwrap()));
    }
}

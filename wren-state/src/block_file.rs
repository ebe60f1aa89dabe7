//! The append-only numbered block files.
//!
//! Each record is a 4-byte network magic, a 4-byte little-endian size,
//! then the serialized block. A file is closed and a new one started
//! before it would exceed the soft cap. The block index remembers each
//! block's (file number, offset-of-block-bytes) so reads can seek
//! straight to the record body.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use tracing::trace;

use wren_chain::block::Block;
use wren_chain::parameters::Network;
use wren_chain::transaction::Transaction;
use wren_chain::{WrenDeserialize, WrenSerialize};

use crate::{DiskTxPos, StoreError};

/// Start a fresh file before an append would push the current one past
/// this size.
const BLOCK_FILE_SOFT_CAP: u64 = 0x7F00_0000;

/// The append-only store of serialized blocks.
pub struct BlockFiles {
    dir: PathBuf,
    magic: [u8; 4],
    current: u32,
}

impl std::fmt::Debug for BlockFiles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockFiles")
            .field("dir", &self.dir)
            .field("current", &self.current)
            .finish()
    }
}

impl BlockFiles {
    /// Open the block file directory for `network`, creating it if
    /// needed, and find the file the next append goes to.
    pub fn open(dir: PathBuf, network: Network) -> Result<BlockFiles, StoreError> {
        std::fs::create_dir_all(&dir)?;
        let mut current = 0;
        while dir.join(file_name(current + 1)).exists() {
            current += 1;
        }
        Ok(BlockFiles {
            dir,
            magic: network.magic(),
            current,
        })
    }

    fn path(&self, file: u32) -> PathBuf {
        self.dir.join(file_name(file))
    }

    fn file_len(&self, file: u32) -> Result<u64, StoreError> {
        let path = self.path(file);
        if path.exists() {
            Ok(std::fs::metadata(path)?.len())
        } else {
            Ok(0)
        }
    }

    /// Append a block, returning the (file number, offset) where its
    /// serialized bytes begin.
    pub fn write_block(&mut self, block: &Block) -> Result<(u32, u32), StoreError> {
        let bytes = block.wren_serialize_to_vec()?;
        let record_len = 8 + bytes.len() as u64;

        let mut len = self.file_len(self.current)?;
        if len > 0 && len + record_len > BLOCK_FILE_SOFT_CAP {
            self.current += 1;
            len = 0;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(self.current))?;
        file.write_all(&self.magic)?;
        file.write_all(&(bytes.len() as u32).to_le_bytes())?;
        let offset = len + 8;
        file.write_all(&bytes)?;
        file.sync_data()?;

        trace!(file = self.current, offset, size = bytes.len(), "appended block");
        Ok((self.current, offset as u32))
    }

    /// Read the block whose bytes begin at (file, offset), verifying the
    /// record framing around it.
    pub fn read_block(&self, file: u32, offset: u32) -> Result<Block, StoreError> {
        if offset < 8 {
            return Err(StoreError::BadBlockRecord("offset inside record framing"));
        }
        let handle = File::open(self.path(file))?;
        let mut reader = BufReader::new(handle);
        reader.seek(SeekFrom::Start(u64::from(offset) - 8))?;

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != self.magic {
            return Err(StoreError::BadBlockRecord("bad magic"));
        }
        let mut size_bytes = [0u8; 4];
        reader.read_exact(&mut size_bytes)?;
        let size = u32::from_le_bytes(size_bytes);

        let block = Block::wren_deserialize((&mut reader).take(u64::from(size)))?;
        Ok(block)
    }

    /// Read a single transaction from its indexed position.
    pub fn read_transaction(&self, pos: &DiskTxPos) -> Result<Transaction, StoreError> {
        if pos.is_null() {
            return Err(StoreError::BadBlockRecord("null transaction position"));
        }
        let handle = File::open(self.path(pos.file))?;
        let mut reader = BufReader::new(handle);
        reader.seek(SeekFrom::Start(u64::from(pos.tx_pos)))?;
        Ok(Transaction::wren_deserialize(&mut reader)?)
    }

    /// Overwrite the record at (file, offset) with a null block padded
    /// to the record's original size.
    pub fn erase_block(&mut self, file: u32, offset: u32) -> Result<(), StoreError> {
        if offset < 8 {
            return Err(StoreError::BadBlockRecord("offset inside record framing"));
        }
        let mut handle = OpenOptions::new().read(true).write(true).open(self.path(file))?;
        handle.seek(SeekFrom::Start(u64::from(offset) - 4))?;
        let mut size_bytes = [0u8; 4];
        handle.read_exact(&mut size_bytes)?;
        let size = u32::from_le_bytes(size_bytes) as usize;

        let mut replacement = Block::null().wren_serialize_to_vec()?;
        if replacement.len() > size {
            return Err(StoreError::BadBlockRecord("record smaller than a null block"));
        }
        replacement.resize(size, 0);

        handle.seek(SeekFrom::Start(u64::from(offset)))?;
        handle.write_all(&replacement)?;
        handle.sync_data()?;
        Ok(())
    }
}

fn file_name(file: u32) -> String {
    format!("blk{:04}.dat", file)
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use wren_chain::parameters::{genesis_block, Network};

    use super::*;

    #[test]
    fn write_read_roundtrip() {
        wren_test::init();
        let dir = TempDir::new("wren-block-file-test").unwrap();
        let mut files =
            BlockFiles::open(dir.path().to_path_buf(), Network::Regtest).unwrap();

        let block = genesis_block(Network::Regtest);
        let (file, offset) = files.write_block(&block).unwrap();
        assert_eq!(file, 0);
        assert_eq!(offset, 8);

        let read_back = files.read_block(file, offset).unwrap();
        assert_eq!(read_back, block);
        assert_eq!(read_back.hash(), block.hash());
    }

    #[test]
    fn appends_are_sequential() {
        wren_test::init();
        let dir = TempDir::new("wren-block-file-test").unwrap();
        let mut files =
            BlockFiles::open(dir.path().to_path_buf(), Network::Regtest).unwrap();

        let block = genesis_block(Network::Regtest);
        let (_, first) = files.write_block(&block).unwrap();
        let (_, second) = files.write_block(&block).unwrap();
        assert_eq!(
            u64::from(second),
            u64::from(first) + block.serialized_size() as u64 + 8
        );

        // Both records read back independently.
        assert_eq!(files.read_block(0, first).unwrap(), block);
        assert_eq!(files.read_block(0, second).unwrap(), block);
    }

    #[test]
    fn erase_overwrites_with_null_block() {
        wren_test::init();
        let dir = TempDir::new("wren-block-file-test").unwrap();
        let mut files =
            BlockFiles::open(dir.path().to_path_buf(), Network::Regtest).unwrap();

        let block = genesis_block(Network::Regtest);
        let (file, first) = files.write_block(&block).unwrap();
        let (_, second) = files.write_block(&block).unwrap();

        files.erase_block(file, first).unwrap();
        let erased = files.read_block(file, first).unwrap();
        assert!(erased.is_null());

        // The neighboring record is untouched.
        assert_eq!(files.read_block(file, second).unwrap(), block);
    }

    #[test]
    fn wrong_magic_is_rejected() {
        wren_test::init();
        let dir = TempDir::new("wren-block-file-test").unwrap();
        let mut files =
            BlockFiles::open(dir.path().to_path_buf(), Network::Regtest).unwrap();
        let block = genesis_block(Network::Regtest);
        let (file, offset) = files.write_block(&block).unwrap();

        let mainnet = BlockFiles::open(dir.path().to_path_buf(), Network::Mainnet).unwrap();
        assert!(matches!(
            mainnet.read_block(file, offset),
            Err(StoreError::BadBlockRecord("bad magic"))
        ));
    }
}

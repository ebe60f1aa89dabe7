//! The SHA-256d hash, used to identify blocks and transactions.

use std::io;

use sha2::{Digest, Sha256};

/// A type implementing `io::Write` that feeds written bytes into a
/// double-SHA-256 state. Serializing a value into the writer and calling
/// [`Writer::finish`] computes the value's canonical hash without an
/// intermediate buffer.
#[derive(Default)]
pub struct Writer {
    hash: Sha256,
}

impl Writer {
    /// Consume the Writer and produce the hash result.
    pub fn finish(self) -> [u8; 32] {
        let first = self.hash.finalize();
        let second = Sha256::digest(&first);
        let mut buffer = [0u8; 32];
        buffer[0..32].copy_from_slice(&second);
        buffer
    }
}

impl io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hash.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("sha256d::Writer").finish()
    }
}

/// Double-SHA-256 of an in-memory byte range.
pub fn digest(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(&first);
    let mut buffer = [0u8; 32];
    buffer[0..32].copy_from_slice(&second);
    buffer
}

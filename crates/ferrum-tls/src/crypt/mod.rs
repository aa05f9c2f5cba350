//! Interfaces to the external cryptographic primitives.
//!
//! The record layer never implements a cipher, MAC, or digest itself; it
//! drives engines built by a caller-supplied [`CryptoBackend`] keyed on the
//! negotiated suite. Key material arrives pre-derived in [`SessionKeys`]
//! from the (external) key exchange machinery.

use crate::{CipherSuiteId, ConnectionSide};
use ferrum_types::TlsError;
use zeroize::Zeroize;

/// A one-shot or streaming hash, used to finalize the handshake transcript.
pub trait Digest {
    fn update(&mut self, data: &[u8]);
    /// Produce the digest and reset the state for reuse.
    fn finish(&mut self) -> Vec<u8>;
}

/// A keyed message authentication code.
pub trait Mac: Send {
    fn update(&mut self, data: &[u8]);
    /// Produce the tag and reset the state for the next message.
    fn finish(&mut self) -> Vec<u8>;
    fn output_length(&self) -> usize;
}

/// A block cipher in ECB mode; the record layer supplies the CBC chaining.
pub trait BlockCipher: Send {
    fn block_size(&self) -> usize;
    fn encrypt_block(&self, block: &mut [u8]);
    fn decrypt_block(&self, block: &mut [u8]);
}

/// A stream cipher applied in place.
pub trait StreamCipher: Send {
    fn process(&mut self, data: &mut [u8]);
}

/// The bulk encryption engine for one direction of a connection.
pub enum BulkCipher {
    Block(Box<dyn BlockCipher>),
    Stream(Box<dyn StreamCipher>),
}

/// Constructs cipher and MAC engines for a negotiated suite.
///
/// Stands in for the global algorithm/suite factory; the record layer asks
/// it for engines at activation time and nothing else.
pub trait CryptoBackend {
    fn new_mac(&self, suite: CipherSuiteId, mac_key: &[u8]) -> Result<Box<dyn Mac>, TlsError>;
    fn new_cipher(&self, suite: CipherSuiteId, cipher_key: &[u8]) -> Result<BulkCipher, TlsError>;
}

/// The six key components derived for one connection, as produced by the
/// external key exchange. Each side writes with its own triple.
#[derive(Debug, Clone, Default)]
pub struct SessionKeys {
    pub client_write_key: Vec<u8>,
    pub server_write_key: Vec<u8>,
    pub client_write_mac_key: Vec<u8>,
    pub server_write_mac_key: Vec<u8>,
    pub client_write_iv: Vec<u8>,
    pub server_write_iv: Vec<u8>,
}

/// One side's write-direction key triple, borrowed from [`SessionKeys`].
pub struct DirectionKeys<'a> {
    pub cipher_key: &'a [u8],
    pub mac_key: &'a [u8],
    pub iv: &'a [u8],
}

impl SessionKeys {
    /// The keys `side` uses to protect the records it writes.
    pub fn write_keys(&self, side: ConnectionSide) -> DirectionKeys<'_> {
        match side {
            ConnectionSide::Client => DirectionKeys {
                cipher_key: &self.client_write_key,
                mac_key: &self.client_write_mac_key,
                iv: &self.client_write_iv,
            },
            ConnectionSide::Server => DirectionKeys {
                cipher_key: &self.server_write_key,
                mac_key: &self.server_write_mac_key,
                iv: &self.server_write_iv,
            },
        }
    }

    /// The keys `side` uses to open the records it reads, i.e. the peer's
    /// write keys.
    pub fn read_keys(&self, side: ConnectionSide) -> DirectionKeys<'_> {
        match side {
            ConnectionSide::Client => self.write_keys(ConnectionSide::Server),
            ConnectionSide::Server => self.write_keys(ConnectionSide::Client),
        }
    }
}

impl Drop for SessionKeys {
    fn drop(&mut self) {
        self.client_write_key.zeroize();
        self.server_write_key.zeroize();
        self.client_write_mac_key.zeroize();
        self.server_write_mac_key.zeroize();
        self.client_write_iv.zeroize();
        self.server_write_iv.zeroize();
    }
}

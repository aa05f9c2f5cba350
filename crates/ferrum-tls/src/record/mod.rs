//! TLS record layer: framing, MAC-then-encrypt protection, and the
//! per-direction cipher state shared by the writer and reader.

pub mod reader;
pub mod writer;

pub use reader::{ReadResult, RecordReader};
pub use writer::RecordWriter;

use crate::crypt::{BlockCipher, BulkCipher, CryptoBackend, DirectionKeys, Mac, StreamCipher};
use crate::{CipherSuiteId, ProtocolVersion};
use ferrum_types::TlsError;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Maximum record plaintext fragment (2^14, RFC 4346 §6.2.1).
pub const MAX_PLAINTEXT_LENGTH: usize = 16384;

/// Maximum record ciphertext expansion (padding + MAC, RFC 4346 §6.2.3).
pub const MAX_CIPHERTEXT_OVERHEAD: usize = 2048;

/// Maximum on-wire record body length.
pub const MAX_CIPHERTEXT_LENGTH: usize = MAX_PLAINTEXT_LENGTH + MAX_CIPHERTEXT_OVERHEAD;

/// Record header size: content_type(1) + version(2) + length(2).
pub const RECORD_HEADER_LEN: usize = 5;

/// TLS record content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

impl ContentType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            20 => Some(ContentType::ChangeCipherSpec),
            21 => Some(ContentType::Alert),
            22 => Some(ContentType::Handshake),
            23 => Some(ContentType::ApplicationData),
            _ => None,
        }
    }
}

/// Compute the record MAC:
/// `MAC(seq(8) || type(1) || version(2) || length(2) || payload)`.
fn record_mac(
    mac: &mut dyn Mac,
    seq: u64,
    content_type: ContentType,
    version: ProtocolVersion,
    payload: &[u8],
) -> Vec<u8> {
    mac.update(&seq.to_be_bytes());
    mac.update(&[content_type as u8]);
    mac.update(&[version.major, version.minor]);
    mac.update(&(payload.len() as u16).to_be_bytes());
    mac.update(payload);
    mac.finish()
}

/// TLS CBC padding: `pad_len + 1` bytes, each holding `pad_len`, bringing
/// the total to a block multiple (RFC 4346 §6.2.3.2).
fn cbc_padding(data_len: usize, block_size: usize) -> Vec<u8> {
    let pad_len = (block_size - ((data_len + 1) % block_size)) % block_size;
    vec![pad_len as u8; pad_len + 1]
}

/// CBC-encrypt in place; `data` must be block-aligned.
fn cbc_encrypt(cipher: &dyn BlockCipher, iv: &[u8], data: &mut [u8]) {
    let bs = cipher.block_size();
    debug_assert!(data.len() % bs == 0 && iv.len() == bs);
    let mut prev = iv.to_vec();
    for chunk in data.chunks_mut(bs) {
        for i in 0..bs {
            chunk[i] ^= prev[i];
        }
        cipher.encrypt_block(chunk);
        prev.copy_from_slice(chunk);
    }
}

/// CBC-decrypt in place without padding removal.
fn cbc_decrypt(cipher: &dyn BlockCipher, iv: &[u8], data: &mut [u8]) {
    let bs = cipher.block_size();
    debug_assert!(data.len() % bs == 0 && iv.len() == bs);
    let mut prev = iv.to_vec();
    for chunk in data.chunks_mut(bs) {
        let ct: Vec<u8> = chunk.to_vec();
        cipher.decrypt_block(chunk);
        for i in 0..bs {
            chunk[i] ^= prev[i];
        }
        prev = ct;
    }
}

/// Bulk cipher with the chaining state the record layer owns.
enum BulkState {
    Block {
        cipher: Box<dyn BlockCipher>,
        /// CBC chaining state; the negotiated IV initially, then the last
        /// ciphertext block of the previous record (implicit-IV versions).
        cbc_state: Vec<u8>,
    },
    Stream(Box<dyn StreamCipher>),
}

impl Drop for BulkState {
    fn drop(&mut self) {
        if let BulkState::Block { cbc_state, .. } = self {
            cbc_state.zeroize();
        }
    }
}

/// Active cipher/MAC engines for one connection direction.
pub(crate) struct ActiveCipher {
    bulk: BulkState,
    mac: Box<dyn Mac>,
    mac_size: usize,
    block_size: usize,
    iv_size: usize,
}

impl ActiveCipher {
    /// Build engines from one direction's key triple via the injected
    /// backend.
    pub(crate) fn build(
        suite: CipherSuiteId,
        keys: &DirectionKeys<'_>,
        backend: &dyn CryptoBackend,
    ) -> Result<Self, TlsError> {
        let mac = backend.new_mac(suite, keys.mac_key)?;
        let mac_size = mac.output_length();

        match backend.new_cipher(suite, keys.cipher_key)? {
            BulkCipher::Block(cipher) => {
                let block_size = cipher.block_size();
                if keys.iv.len() != block_size {
                    return Err(TlsError::internal(
                        "IV length does not match cipher block size",
                    ));
                }
                Ok(Self {
                    bulk: BulkState::Block {
                        cipher,
                        cbc_state: keys.iv.to_vec(),
                    },
                    mac,
                    mac_size,
                    block_size,
                    iv_size: block_size,
                })
            }
            BulkCipher::Stream(cipher) => Ok(Self {
                bulk: BulkState::Stream(cipher),
                mac,
                mac_size,
                block_size: 0,
                iv_size: 0,
            }),
        }
    }

    /// Worst-case per-record expansion (explicit IV + MAC + padding).
    pub(crate) fn max_overhead(&self) -> usize {
        self.iv_size + self.mac_size + self.block_size + 1
    }

    /// Protect one fragment: MAC, pad, encrypt. Returns the wire fragment.
    pub(crate) fn seal(
        &mut self,
        seq: u64,
        version: ProtocolVersion,
        content_type: ContentType,
        payload: &[u8],
    ) -> Result<Vec<u8>, TlsError> {
        let tag = record_mac(self.mac.as_mut(), seq, content_type, version, payload);

        let mut buf = Vec::with_capacity(payload.len() + self.max_overhead());
        buf.extend_from_slice(payload);
        buf.extend_from_slice(&tag);

        match &mut self.bulk {
            BulkState::Block { cipher, cbc_state } => {
                let padding = cbc_padding(buf.len(), self.block_size);
                buf.extend_from_slice(&padding);

                if version.uses_explicit_iv() {
                    let mut iv = vec![0u8; self.block_size];
                    getrandom::getrandom(&mut iv)
                        .map_err(|_| TlsError::internal("random source failure"))?;
                    cbc_encrypt(cipher.as_ref(), &iv, &mut buf);
                    let mut out = Vec::with_capacity(iv.len() + buf.len());
                    out.extend_from_slice(&iv);
                    out.extend_from_slice(&buf);
                    Ok(out)
                } else {
                    cbc_encrypt(cipher.as_ref(), cbc_state, &mut buf);
                    cbc_state.copy_from_slice(&buf[buf.len() - self.block_size..]);
                    Ok(buf)
                }
            }
            BulkState::Stream(cipher) => {
                cipher.process(&mut buf);
                Ok(buf)
            }
        }
    }

    /// Open one wire fragment: decrypt, strip padding, verify the MAC.
    ///
    /// Padding and MAC are validated without early exits so a forger learns
    /// nothing from timing which check failed.
    pub(crate) fn open(
        &mut self,
        seq: u64,
        version: ProtocolVersion,
        content_type: ContentType,
        fragment: Vec<u8>,
    ) -> Result<Vec<u8>, TlsError> {
        let plaintext = match &mut self.bulk {
            BulkState::Block { cipher, cbc_state } => {
                let explicit_iv = version.uses_explicit_iv();
                let mut min_len =
                    (self.mac_size + 1).div_ceil(self.block_size) * self.block_size;
                if explicit_iv {
                    min_len += self.iv_size;
                }
                if fragment.len() < min_len {
                    return Err(TlsError::decoding("block-ciphered record too short"));
                }

                let (iv, encrypted) = if explicit_iv {
                    let (iv, rest) = fragment.split_at(self.block_size);
                    (iv.to_vec(), rest)
                } else {
                    (cbc_state.clone(), &fragment[..])
                };

                if encrypted.is_empty() || encrypted.len() % self.block_size != 0 {
                    return Err(TlsError::decoding("ciphertext not block-aligned"));
                }

                let mut decrypted = encrypted.to_vec();
                if !explicit_iv {
                    cbc_state.copy_from_slice(&encrypted[encrypted.len() - self.block_size..]);
                }
                cbc_decrypt(cipher.as_ref(), &iv, &mut decrypted);

                let pad_len = decrypted[decrypted.len() - 1] as usize;
                let total_overhead = pad_len + 1 + self.mac_size;
                let good_length = (total_overhead <= decrypted.len()) as u8;

                // TLS requires every padding byte to equal pad_len; SSLv3
                // only defines the final byte.
                let mut pad_ok = good_length;
                if version >= ProtocolVersion::TLS10 {
                    let pad_start = decrypted.len().saturating_sub(pad_len + 1);
                    for &b in &decrypted[pad_start..] {
                        pad_ok &= b.ct_eq(&(pad_len as u8)).unwrap_u8();
                    }
                }

                let content_len = if good_length == 1 {
                    decrypted.len() - total_overhead
                } else {
                    0
                };

                let expected = record_mac(
                    self.mac.as_mut(),
                    seq,
                    content_type,
                    version,
                    &decrypted[..content_len],
                );

                let received = if good_length == 1 {
                    &decrypted[content_len..content_len + self.mac_size]
                } else {
                    // Dummy comparison keeps the work uniform.
                    &decrypted[..self.mac_size]
                };
                let mac_ok = received.ct_eq(expected.as_slice()).unwrap_u8();

                if pad_ok & mac_ok != 1 {
                    return Err(TlsError::bad_record_mac("record failed MAC check"));
                }

                decrypted.truncate(content_len);
                decrypted
            }
            BulkState::Stream(cipher) => {
                if fragment.len() < self.mac_size {
                    return Err(TlsError::decoding("stream-ciphered record too short"));
                }
                let mut decrypted = fragment;
                cipher.process(&mut decrypted);

                let content_len = decrypted.len() - self.mac_size;
                let expected = record_mac(
                    self.mac.as_mut(),
                    seq,
                    content_type,
                    version,
                    &decrypted[..content_len],
                );
                let mac_ok = decrypted[content_len..].ct_eq(expected.as_slice()).unwrap_u8();
                if mac_ok != 1 {
                    return Err(TlsError::bad_record_mac("record failed MAC check"));
                }

                decrypted.truncate(content_len);
                decrypted
            }
        };

        if plaintext.len() > MAX_PLAINTEXT_LENGTH {
            return Err(TlsError::decoding("decrypted plaintext exceeds maximum"));
        }
        Ok(plaintext)
    }
}

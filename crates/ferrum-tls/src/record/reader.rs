//! Inbound record reassembly and verification.

use super::{ActiveCipher, ContentType, MAX_CIPHERTEXT_LENGTH, RECORD_HEADER_LEN};
use crate::crypt::{CryptoBackend, SessionKeys};
use crate::handshake::HandshakeType;
use crate::{CipherSuiteId, ConnectionSide, ProtocolVersion};
use ferrum_types::TlsError;

/// Outcome of a [`RecordReader::get_record`] call.
///
/// `NeedMore` is neither success nor failure: it tells a non-blocking caller
/// the minimum number of bytes that must arrive before the next attempt can
/// make progress.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadResult {
    /// One complete record, decrypted and verified.
    Record(ContentType, Vec<u8>),
    /// At least this many more input bytes are required.
    NeedMore(usize),
}

/// Reassembles, decrypts, and verifies incoming records.
///
/// Bytes arrive in arbitrary chunks through [`add_input`](Self::add_input);
/// record boundaries are reconstructed from the 5-byte header. The reader
/// holds its own sequence number and key state, independent of the writer
/// for the opposite direction.
pub struct RecordReader {
    queue: Vec<u8>,
    cipher: Option<ActiveCipher>,
    seq: u64,
    version: ProtocolVersion,
}

impl RecordReader {
    pub fn new() -> Self {
        Self {
            queue: Vec::new(),
            cipher: None,
            seq: 0,
            version: ProtocolVersion::UNSET,
        }
    }

    /// Queue newly arrived bytes; no record boundary is assumed.
    pub fn add_input(&mut self, input: &[u8]) {
        self.queue.extend_from_slice(input);
    }

    pub fn currently_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Pin the expected record version; subsequent records carrying any
    /// other version are rejected.
    pub fn set_version(&mut self, version: ProtocolVersion) {
        self.version = version;
    }

    pub fn is_active(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn sequence_number(&self) -> u64 {
        self.seq
    }

    /// Install cipher and MAC state for the records this side reads (the
    /// peer's write keys) and reset the sequence number.
    pub fn activate(
        &mut self,
        side: ConnectionSide,
        suite: CipherSuiteId,
        keys: &SessionKeys,
        backend: &dyn CryptoBackend,
    ) -> Result<(), TlsError> {
        self.cipher = Some(ActiveCipher::build(suite, &keys.read_keys(side), backend)?);
        self.seq = 0;
        Ok(())
    }

    /// Drop all cryptographic state and any pinned version. Queued input is
    /// kept; only its interpretation resets.
    pub fn reset(&mut self) {
        self.cipher = None;
        self.seq = 0;
        self.version = ProtocolVersion::UNSET;
    }

    /// Try to extract exactly one record from the queue.
    ///
    /// Returns `NeedMore(n)` with the exact shortfall while the queue holds
    /// less than one full record. A legacy SSLv2-framed client hello (high
    /// bit set in the first byte, message type 1) is accepted before any
    /// cipher is active and surfaces as handshake content wrapped in a
    /// synthesized handshake header carrying the v2 marker type.
    pub fn get_record(&mut self) -> Result<ReadResult, TlsError> {
        if self.queue.len() < RECORD_HEADER_LEN {
            return Ok(ReadResult::NeedMore(RECORD_HEADER_LEN - self.queue.len()));
        }

        if self.cipher.is_none() && (self.queue[0] & 0x80) != 0 && self.queue[2] == 1 {
            return self.get_sslv2_hello();
        }

        let content_type = ContentType::from_u8(self.queue[0])
            .ok_or_else(|| TlsError::decoding("unknown record content type"))?;
        let header_version = ProtocolVersion::new(self.queue[1], self.queue[2]);
        let body_len = u16::from_be_bytes([self.queue[3], self.queue[4]]) as usize;

        if body_len > MAX_CIPHERTEXT_LENGTH {
            return Err(TlsError::decoding("record length exceeds maximum"));
        }
        if self.version != ProtocolVersion::UNSET && header_version != self.version {
            return Err(TlsError::decoding("unexpected record version"));
        }

        let queued_body = self.queue.len() - RECORD_HEADER_LEN;
        if queued_body < body_len {
            return Ok(ReadResult::NeedMore(body_len - queued_body));
        }

        self.queue.drain(..RECORD_HEADER_LEN);
        let fragment: Vec<u8> = self.queue.drain(..body_len).collect();

        let payload = match &mut self.cipher {
            None => fragment,
            Some(cipher) => cipher.open(self.seq, self.version, content_type, fragment)?,
        };

        if self.seq == u64::MAX {
            return Err(TlsError::internal("record sequence number exhausted"));
        }
        self.seq += 1;

        Ok(ReadResult::Record(content_type, payload))
    }

    /// Extract a legacy SSLv2 client hello record.
    ///
    /// The two-byte v2 record header is replaced by a synthetic handshake
    /// header so the handshake layer can dispatch on the marker type.
    fn get_sslv2_hello(&mut self) -> Result<ReadResult, TlsError> {
        let record_len = (u16::from_be_bytes([self.queue[0], self.queue[1]]) & 0x7FFF) as usize;
        if record_len > MAX_CIPHERTEXT_LENGTH {
            return Err(TlsError::decoding("record length exceeds maximum"));
        }
        if self.queue.len() < 2 + record_len {
            return Ok(ReadResult::NeedMore(2 + record_len - self.queue.len()));
        }

        let body: Vec<u8> = self.queue.drain(..2 + record_len).skip(2).collect();
        let mut message = Vec::with_capacity(4 + body.len());
        message.push(HandshakeType::ClientHelloSslv2 as u8);
        message.push((body.len() >> 16) as u8);
        message.push((body.len() >> 8) as u8);
        message.push(body.len() as u8);
        message.extend_from_slice(&body);

        if self.seq == u64::MAX {
            return Err(TlsError::internal("record sequence number exhausted"));
        }
        self.seq += 1;

        Ok(ReadResult::Record(ContentType::Handshake, message))
    }
}

impl Default for RecordReader {
    fn default() -> Self {
        Self::new()
    }
}

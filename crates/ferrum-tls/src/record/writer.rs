//! Outbound record protection and framing.

use super::{
    ActiveCipher, ContentType, MAX_PLAINTEXT_LENGTH, RECORD_HEADER_LEN,
};
use crate::crypt::{CryptoBackend, SessionKeys};
use crate::{CipherSuiteId, ConnectionSide, ProtocolVersion};
use ferrum_types::{AlertDescription, AlertLevel, TlsError};

/// Turns outgoing payloads into protected wire records.
///
/// Holds one direction's cryptographic and sequencing state. Until
/// [`activate`](Self::activate) installs key material, records are written
/// in the clear. Finished bytes go to the caller-supplied sink; the writer
/// itself never blocks.
pub struct RecordWriter {
    output: Box<dyn FnMut(&[u8]) + Send>,
    cipher: Option<ActiveCipher>,
    seq: u64,
    version: ProtocolVersion,
    /// Negotiated per-record payload ceiling; 0 means the protocol default.
    max_fragment: usize,
}

impl RecordWriter {
    /// Create a plaintext writer pushing finished records into `output`.
    ///
    /// The version starts unset; callers pin it before the first send.
    pub fn new(output: impl FnMut(&[u8]) + Send + 'static) -> Self {
        Self {
            output: Box::new(output),
            cipher: None,
            seq: 0,
            version: ProtocolVersion::UNSET,
            max_fragment: 0,
        }
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn set_version(&mut self, version: ProtocolVersion) {
        self.version = version;
    }

    /// Set the negotiated maximum fragment size; 0 restores the protocol
    /// default, larger values are clamped to it.
    pub fn set_maximum_fragment_size(&mut self, max_fragment: usize) {
        self.max_fragment = max_fragment.min(MAX_PLAINTEXT_LENGTH);
    }

    pub fn is_active(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn sequence_number(&self) -> u64 {
        self.seq
    }

    /// Install cipher and MAC state for this side's write direction and
    /// reset the sequence number. Called after the key exchange and again on
    /// each renegotiation.
    pub fn activate(
        &mut self,
        side: ConnectionSide,
        suite: CipherSuiteId,
        keys: &SessionKeys,
        backend: &dyn CryptoBackend,
    ) -> Result<(), TlsError> {
        self.cipher = Some(ActiveCipher::build(suite, &keys.write_keys(side), backend)?);
        self.seq = 0;
        Ok(())
    }

    /// Drop all cryptographic state: subsequent records go out in the clear
    /// with a fresh sequence and no pinned version.
    pub fn reset(&mut self) {
        self.cipher = None;
        self.seq = 0;
        self.version = ProtocolVersion::UNSET;
    }

    /// Send `data` as one or more records of the given content type,
    /// fragmenting at the effective maximum. An empty payload still
    /// produces exactly one (empty) record.
    pub fn send(&mut self, content_type: ContentType, data: &[u8]) -> Result<(), TlsError> {
        if data.is_empty() {
            return self.send_record(content_type, &[]);
        }
        let max = self.effective_fragment_size();
        for chunk in data.chunks(max) {
            self.send_record(content_type, chunk)?;
        }
        Ok(())
    }

    /// Serialize and send a 2-byte alert.
    pub fn alert(
        &mut self,
        level: AlertLevel,
        description: AlertDescription,
    ) -> Result<(), TlsError> {
        self.send(ContentType::Alert, &[level as u8, description as u8])
    }

    fn effective_fragment_size(&self) -> usize {
        if self.max_fragment == 0 {
            MAX_PLAINTEXT_LENGTH
        } else {
            self.max_fragment
        }
    }

    fn send_record(&mut self, content_type: ContentType, payload: &[u8]) -> Result<(), TlsError> {
        debug_assert!(payload.len() <= MAX_PLAINTEXT_LENGTH);

        let fragment = match &mut self.cipher {
            None => payload.to_vec(),
            Some(cipher) => cipher.seal(self.seq, self.version, content_type, payload)?,
        };

        if self.seq == u64::MAX {
            return Err(TlsError::internal("record sequence number exhausted"));
        }
        self.seq += 1;

        let mut record = Vec::with_capacity(RECORD_HEADER_LEN + fragment.len());
        record.push(content_type as u8);
        record.push(self.version.major);
        record.push(self.version.minor);
        record.extend_from_slice(&(fragment.len() as u16).to_be_bytes());
        record.extend_from_slice(&fragment);

        (self.output)(&record);
        Ok(())
    }
}

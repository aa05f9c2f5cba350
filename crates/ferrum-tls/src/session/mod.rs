//! Session parameters carried across connections for resumption.

use crate::{CipherSuiteId, CompressionMethod, ProtocolVersion};

/// The negotiated parameters a client replays when asking to resume an
/// earlier session. Secret material (master secret, keys) lives with the
/// key-exchange machinery, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub version: ProtocolVersion,
    pub id: Vec<u8>,
    pub cipher_suite: CipherSuiteId,
    pub compression_method: CompressionMethod,
    pub sni_hostname: String,
    pub srp_identifier: String,
    /// Negotiated maximum fragment size; 0 when none was agreed.
    pub fragment_size: usize,
    pub secure_renegotiation: bool,
}

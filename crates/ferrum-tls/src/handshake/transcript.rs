//! Running transcript over handshake messages.

use crate::crypt::Digest;

/// Accumulates the exact serialized bytes of every handshake message sent
/// and received, for authenticating the handshake as a whole.
///
/// The hash function is not fixed until the cipher suite is known, so the
/// transcript buffers raw bytes and replays them into a caller-supplied
/// digest on demand.
#[derive(Debug, Clone, Default)]
pub struct HandshakeHash {
    data: Vec<u8>,
}

impl HandshakeHash {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    /// The raw transcript bytes accumulated so far.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Replay the transcript into `digest` and return its output. The
    /// buffered transcript is left intact for later, longer replays.
    pub fn final_digest(&self, digest: &mut dyn Digest) -> Vec<u8> {
        digest.update(&self.data);
        digest.finish()
    }
}

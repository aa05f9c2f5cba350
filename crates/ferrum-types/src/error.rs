use crate::alert::AlertDescription;

/// Errors raised while encoding, decoding, or protecting TLS data.
///
/// Two kinds exist. `DecodingError` is a structural problem with the bytes
/// at hand (truncated buffer, out-of-range length field, trailing garbage)
/// and is fatal to the message being parsed. `ProtocolError` is a semantic
/// violation that must be answered with the carried fatal alert before the
/// connection is torn down.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("decoding error: {0}")]
    DecodingError(String),
    #[error("protocol error ({alert:?}): {reason}")]
    ProtocolError {
        alert: AlertDescription,
        reason: String,
    },
}

impl TlsError {
    pub fn decoding(reason: impl Into<String>) -> Self {
        TlsError::DecodingError(reason.into())
    }

    pub fn protocol(alert: AlertDescription, reason: impl Into<String>) -> Self {
        TlsError::ProtocolError {
            alert,
            reason: reason.into(),
        }
    }

    pub fn handshake_failure(reason: impl Into<String>) -> Self {
        Self::protocol(AlertDescription::HandshakeFailure, reason)
    }

    pub fn bad_record_mac(reason: impl Into<String>) -> Self {
        Self::protocol(AlertDescription::BadRecordMac, reason)
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::protocol(AlertDescription::InternalError, reason)
    }

    /// The alert this error maps to on the wire.
    ///
    /// Decoding errors classify as decode_error.
    pub fn alert(&self) -> AlertDescription {
        match self {
            TlsError::DecodingError(_) => AlertDescription::DecodeError,
            TlsError::ProtocolError { alert, .. } => *alert,
        }
    }
}

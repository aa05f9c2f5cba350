//! Handshake message framing and the hello message family.

pub mod hello;
pub mod transcript;

pub use hello::{ClientHello, HelloRequest, ServerHello, ServerHelloDone};
pub use transcript::HandshakeHash;

use crate::record::{ContentType, RecordWriter};
use ferrum_types::TlsError;

/// Handshake message types (RFC 4346 §7.4, plus the NPN message and the
/// marker the record reader synthesizes for SSLv2-framed client hellos).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandshakeType {
    HelloRequest = 0,
    ClientHello = 1,
    ServerHello = 2,
    Certificate = 11,
    ServerKeyExchange = 12,
    CertificateRequest = 13,
    ServerHelloDone = 14,
    CertificateVerify = 15,
    ClientKeyExchange = 16,
    Finished = 20,
    NextProtocol = 67,
    /// Not a wire value: tags a legacy SSLv2 client hello repackaged by the
    /// record reader.
    ClientHelloSslv2 = 253,
}

impl HandshakeType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(HandshakeType::HelloRequest),
            1 => Some(HandshakeType::ClientHello),
            2 => Some(HandshakeType::ServerHello),
            11 => Some(HandshakeType::Certificate),
            12 => Some(HandshakeType::ServerKeyExchange),
            13 => Some(HandshakeType::CertificateRequest),
            14 => Some(HandshakeType::ServerHelloDone),
            15 => Some(HandshakeType::CertificateVerify),
            16 => Some(HandshakeType::ClientKeyExchange),
            20 => Some(HandshakeType::Finished),
            67 => Some(HandshakeType::NextProtocol),
            253 => Some(HandshakeType::ClientHelloSslv2),
            _ => None,
        }
    }
}

/// Wrap a handshake body with the `msg_type(1) || length(3)` header.
pub fn wrap_handshake(msg_type: HandshakeType, body: &[u8]) -> Vec<u8> {
    let len = body.len();
    let mut out = Vec::with_capacity(4 + len);
    out.push(msg_type as u8);
    out.push((len >> 16) as u8);
    out.push((len >> 8) as u8);
    out.push(len as u8);
    out.extend_from_slice(body);
    out
}

/// Parse a handshake header. Returns the type, the body slice, and the
/// total bytes consumed.
pub fn parse_handshake_header(data: &[u8]) -> Result<(HandshakeType, &[u8], usize), TlsError> {
    if data.len() < 4 {
        return Err(TlsError::decoding("handshake header too short"));
    }
    let msg_type = HandshakeType::from_u8(data[0])
        .ok_or_else(|| TlsError::decoding(format!("unknown handshake type {}", data[0])))?;
    let length = ((data[1] as usize) << 16) | ((data[2] as usize) << 8) | data[3] as usize;
    let total = 4 + length;
    if data.len() < total {
        return Err(TlsError::decoding("handshake message body truncated"));
    }
    Ok((msg_type, &data[4..total], total))
}

/// A handshake message that can put itself on the wire.
///
/// `send` serializes the body, prepends the handshake header, feeds the
/// whole message into the running transcript, and hands it to the record
/// writer as handshake content.
pub trait HandshakeMessage {
    fn handshake_type(&self) -> HandshakeType;
    fn serialize(&self) -> Result<Vec<u8>, TlsError>;

    fn send(&self, writer: &mut RecordWriter, hash: &mut HandshakeHash) -> Result<(), TlsError> {
        let body = self.serialize()?;
        let message = wrap_handshake(self.handshake_type(), &body);
        hash.update(&message);
        writer.send(ContentType::Handshake, &message)
    }
}

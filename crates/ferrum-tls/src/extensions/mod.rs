//! TLS hello extensions (RFC 4366, RFC 5746, NPN).
//!
//! Extensions are modeled as a closed tagged sum plus an opaque fallback for
//! type codes this stack does not know; parsing never rejects an unknown
//! extension, it just carries the bytes along.

use crate::codec::{append_length_value, TlsReader};
use ferrum_types::{AlertDescription, TlsError};

/// TLS extension type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtensionType(pub u16);

impl ExtensionType {
    pub const SERVER_NAME: Self = Self(0);
    pub const MAX_FRAGMENT_LENGTH: Self = Self(1);
    pub const SRP_IDENTIFIER: Self = Self(12);
    pub const NEXT_PROTOCOL_NEGOTIATION: Self = Self(13172);
    pub const RENEGOTIATION_INFO: Self = Self(0xFF01);
}

/// The record sizes a peer may request via max_fragment_length (RFC 6066 §4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MaxFragmentSize {
    Bytes512 = 1,
    Bytes1024 = 2,
    Bytes2048 = 3,
    Bytes4096 = 4,
}

impl MaxFragmentSize {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Bytes512),
            2 => Some(Self::Bytes1024),
            3 => Some(Self::Bytes2048),
            4 => Some(Self::Bytes4096),
            _ => None,
        }
    }

    pub fn from_size(size: usize) -> Option<Self> {
        match size {
            512 => Some(Self::Bytes512),
            1024 => Some(Self::Bytes1024),
            2048 => Some(Self::Bytes2048),
            4096 => Some(Self::Bytes4096),
            _ => None,
        }
    }

    pub fn size(self) -> usize {
        match self {
            Self::Bytes512 => 512,
            Self::Bytes1024 => 1024,
            Self::Bytes2048 => 2048,
            Self::Bytes4096 => 4096,
        }
    }
}

/// One typed hello extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    /// Secure renegotiation binding data (RFC 5746). Empty on an initial
    /// handshake.
    RenegotiationInfo(Vec<u8>),
    /// Server name indication hostname (RFC 4366 §3.1).
    ServerName(String),
    /// SRP identity (RFC 5054 §2.8.1).
    SrpIdentifier(String),
    /// Next protocol negotiation. A client offers an empty list; a server
    /// answers with the protocols it speaks.
    NextProtocolNegotiation(Vec<String>),
    /// Maximum fragment length negotiation (RFC 6066 §4).
    MaxFragmentLength(MaxFragmentSize),
    /// An extension this stack does not interpret, carried opaquely.
    Unknown { ext_type: ExtensionType, data: Vec<u8> },
}

impl Extension {
    pub fn ext_type(&self) -> ExtensionType {
        match self {
            Extension::RenegotiationInfo(_) => ExtensionType::RENEGOTIATION_INFO,
            Extension::ServerName(_) => ExtensionType::SERVER_NAME,
            Extension::SrpIdentifier(_) => ExtensionType::SRP_IDENTIFIER,
            Extension::NextProtocolNegotiation(_) => ExtensionType::NEXT_PROTOCOL_NEGOTIATION,
            Extension::MaxFragmentLength(_) => ExtensionType::MAX_FRAGMENT_LENGTH,
            Extension::Unknown { ext_type, .. } => *ext_type,
        }
    }

    /// Extensions whose value carries no information are left off the wire.
    fn is_empty_value(&self) -> bool {
        match self {
            Extension::ServerName(name) => name.is_empty(),
            Extension::SrpIdentifier(id) => id.is_empty(),
            _ => false,
        }
    }

    /// Encode the extension body (without the type/length tuple).
    fn serialize_body(&self) -> Vec<u8> {
        let mut body = Vec::new();
        match self {
            Extension::RenegotiationInfo(info) => {
                append_length_value(&mut body, info, 1);
            }
            Extension::ServerName(name) => {
                // server_name_list: one host_name (type 0) entry.
                let name = name.as_bytes();
                let entry_len = 1 + 2 + name.len();
                body.extend_from_slice(&(entry_len as u16).to_be_bytes());
                body.push(0);
                append_length_value(&mut body, name, 2);
            }
            Extension::SrpIdentifier(id) => {
                append_length_value(&mut body, id.as_bytes(), 1);
            }
            Extension::NextProtocolNegotiation(protocols) => {
                for proto in protocols {
                    append_length_value(&mut body, proto.as_bytes(), 1);
                }
            }
            Extension::MaxFragmentLength(size) => {
                body.push(*size as u8);
            }
            Extension::Unknown { data, .. } => {
                body.extend_from_slice(data);
            }
        }
        body
    }

    /// Decode one extension body dispatched on its type code.
    fn parse_body(ext_type: ExtensionType, data: &[u8]) -> Result<Self, TlsError> {
        let mut reader = TlsReader::new(data);
        let ext = match ext_type {
            ExtensionType::RENEGOTIATION_INFO => {
                let info = reader.get_range(1, 0, 255)?;
                reader.assert_done()?;
                Extension::RenegotiationInfo(info)
            }
            ExtensionType::SERVER_NAME => {
                let mut hostname = String::new();
                let mut name_bytes = reader.get_u16()? as usize;
                while name_bytes > 0 {
                    let name_type = reader.get_u8()?;
                    name_bytes = name_bytes
                        .checked_sub(1)
                        .ok_or_else(|| TlsError::decoding("SNI name list length inconsistent"))?;
                    if name_type == 0 {
                        hostname = reader.get_string(2, 1, 65535)?;
                        name_bytes = name_bytes
                            .checked_sub(2 + hostname.len())
                            .ok_or_else(|| {
                                TlsError::decoding("SNI name list length inconsistent")
                            })?;
                    } else {
                        reader.discard_next(name_bytes)?;
                        name_bytes = 0;
                    }
                }
                Extension::ServerName(hostname)
            }
            ExtensionType::SRP_IDENTIFIER => {
                let id = reader.get_string(1, 1, 255)?;
                reader.assert_done()?;
                Extension::SrpIdentifier(id)
            }
            ExtensionType::NEXT_PROTOCOL_NEGOTIATION => {
                let mut protocols = Vec::new();
                while reader.has_remaining() {
                    protocols.push(reader.get_string(1, 0, 255)?);
                }
                Extension::NextProtocolNegotiation(protocols)
            }
            ExtensionType::MAX_FRAGMENT_LENGTH => {
                let code = reader.get_u8()?;
                reader.assert_done()?;
                let size = MaxFragmentSize::from_code(code).ok_or_else(|| {
                    TlsError::protocol(
                        AlertDescription::IllegalParameter,
                        format!("bad max_fragment_length code {code}"),
                    )
                })?;
                Extension::MaxFragmentLength(size)
            }
            _ => Extension::Unknown {
                ext_type,
                data: data.to_vec(),
            },
        };
        Ok(ext)
    }
}

/// The ordered extension set of one hello message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extensions(Vec<Extension>);

impl Extensions {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, ext: Extension) {
        self.0.push(ext);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Extension> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialize as one 2-byte length-prefixed block of
    /// `type(2) || length(2) || body` tuples. Value-empty extensions are
    /// skipped; if nothing remains, nothing is emitted at all, matching
    /// peers that predate extensions.
    pub fn serialize(&self) -> Vec<u8> {
        let mut inner = Vec::new();
        for ext in &self.0 {
            if ext.is_empty_value() {
                continue;
            }
            let body = ext.serialize_body();
            inner.extend_from_slice(&ext.ext_type().0.to_be_bytes());
            append_length_value(&mut inner, &body, 2);
        }

        if inner.is_empty() {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(2 + inner.len());
        append_length_value(&mut out, &inner, 2);
        out
    }

    /// Parse an extension block from the reader.
    ///
    /// A completely absent block (nothing left in the reader) yields the
    /// empty set, as does a present block declaring zero length. The
    /// declared outer length must exactly cover the contained extensions.
    pub fn parse(reader: &mut TlsReader<'_>) -> Result<Self, TlsError> {
        let mut exts = Extensions::new();
        if !reader.has_remaining() {
            return Ok(exts);
        }

        let block = reader.get_range(2, 0, 65535)?;
        let mut block_reader = TlsReader::new(&block);
        while block_reader.has_remaining() {
            let ext_type = ExtensionType(block_reader.get_u16()?);
            let body = block_reader.get_range(2, 0, 65535)?;
            exts.push(Extension::parse_body(ext_type, &body)?);
        }
        Ok(exts)
    }
}

impl From<Vec<Extension>> for Extensions {
    fn from(v: Vec<Extension>) -> Self {
        Self(v)
    }
}

//! The hello message family: HelloRequest, ClientHello (modern and legacy
//! SSLv2 framing), ServerHello, and ServerHelloDone.
//!
//! Hello messages are value objects: built once from policy or session
//! state (sending themselves on construction) or recovered from received
//! body bytes, then handed to the handshake driver.

use crate::codec::{append_length_u16_vector, append_length_value, TlsReader};
use crate::config::{Certificate, KeyAlgorithm, Policy};
use crate::extensions::{Extension, Extensions, MaxFragmentSize};
use crate::handshake::{HandshakeHash, HandshakeMessage, HandshakeType};
use crate::record::RecordWriter;
use crate::session::Session;
use crate::{CipherSuiteId, CompressionMethod, ProtocolVersion};
use ferrum_types::{AlertDescription, TlsError};

fn random_vec(len: usize) -> Result<Vec<u8>, TlsError> {
    let mut buf = vec![0u8; len];
    getrandom::getrandom(&mut buf).map_err(|_| TlsError::internal("random source failure"))?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// HelloRequest
// ---------------------------------------------------------------------------

/// Server request to start renegotiating. The body is always empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HelloRequest;

impl HelloRequest {
    /// Build and transmit immediately. A hello request carries no state and
    /// never enters the handshake transcript.
    pub fn new(writer: &mut RecordWriter) -> Result<Self, TlsError> {
        let hr = HelloRequest;
        let mut scratch = HandshakeHash::new();
        hr.send(writer, &mut scratch)?;
        Ok(hr)
    }

    pub fn deserialize(body: &[u8]) -> Result<Self, TlsError> {
        if !body.is_empty() {
            return Err(TlsError::decoding("hello request must be empty, and is not"));
        }
        Ok(HelloRequest)
    }
}

impl HandshakeMessage for HelloRequest {
    fn handshake_type(&self) -> HandshakeType {
        HandshakeType::HelloRequest
    }

    fn serialize(&self) -> Result<Vec<u8>, TlsError> {
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// ClientHello
// ---------------------------------------------------------------------------

/// The client's opening offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    version: ProtocolVersion,
    /// 32 bytes when locally generated; 16 to 32 when recovered from an
    /// SSLv2 challenge.
    random: Vec<u8>,
    session_id: Vec<u8>,
    suites: Vec<CipherSuiteId>,
    comp_methods: Vec<CompressionMethod>,
    hostname: String,
    srp_identifier: String,
    next_protocol: bool,
    fragment_size: usize,
    secure_renegotiation: bool,
    renegotiation_info: Vec<u8>,
}

impl ClientHello {
    /// Offer a fresh handshake from policy state and transmit.
    ///
    /// `reneg_info` is empty on an initial handshake and carries the prior
    /// verify data when renegotiating. Secure renegotiation is always
    /// offered via the extension.
    pub fn new(
        writer: &mut RecordWriter,
        hash: &mut HandshakeHash,
        policy: &dyn Policy,
        reneg_info: Vec<u8>,
        next_protocol: bool,
        hostname: &str,
        srp_identifier: &str,
    ) -> Result<Self, TlsError> {
        let hello = ClientHello {
            version: policy.preferred_version(),
            random: random_vec(32)?,
            session_id: Vec::new(),
            suites: policy.cipher_suites(!srp_identifier.is_empty()),
            comp_methods: policy.compression_methods(),
            hostname: hostname.to_string(),
            srp_identifier: srp_identifier.to_string(),
            next_protocol,
            fragment_size: 0,
            secure_renegotiation: true,
            renegotiation_info: reneg_info,
        };
        hello.send(writer, hash)?;
        Ok(hello)
    }

    /// Ask to resume `session` and transmit: the prior session's id and
    /// parameters are echoed, and exactly its suite and compression method
    /// are offered.
    pub fn resume(
        writer: &mut RecordWriter,
        hash: &mut HandshakeHash,
        session: &Session,
        next_protocol: bool,
    ) -> Result<Self, TlsError> {
        let hello = ClientHello {
            version: session.version,
            random: random_vec(32)?,
            session_id: session.id.clone(),
            suites: vec![session.cipher_suite],
            comp_methods: vec![session.compression_method],
            hostname: session.sni_hostname.clone(),
            srp_identifier: session.srp_identifier.clone(),
            next_protocol,
            fragment_size: session.fragment_size,
            secure_renegotiation: session.secure_renegotiation,
            renegotiation_info: Vec::new(),
        };
        hello.send(writer, hash)?;
        Ok(hello)
    }

    /// Parse a received hello, dispatching on the type byte the record
    /// layer reported (modern hello or the synthesized SSLv2 marker).
    pub fn parse(msg_type: HandshakeType, body: &[u8]) -> Result<Self, TlsError> {
        match msg_type {
            HandshakeType::ClientHello => Self::deserialize(body),
            HandshakeType::ClientHelloSslv2 => Self::deserialize_sslv2(body),
            _ => Err(TlsError::decoding("not a client hello")),
        }
    }

    pub fn deserialize(body: &[u8]) -> Result<Self, TlsError> {
        if body.len() < 41 {
            return Err(TlsError::decoding("client hello packet corrupted"));
        }

        let mut reader = TlsReader::new(body);
        let version = ProtocolVersion::new(reader.get_u8()?, reader.get_u8()?);
        let random = reader.get_fixed(32)?.to_vec();
        let session_id = reader.get_range(1, 0, 32)?;
        let suites: Vec<CipherSuiteId> = reader
            .get_range_vector_u16(2, 1, 32767)?
            .into_iter()
            .map(CipherSuiteId)
            .collect();
        let comp_methods: Vec<CompressionMethod> = reader
            .get_range_vector_u8(1, 1, 255)?
            .into_iter()
            .map(CompressionMethod)
            .collect();

        let mut hello = ClientHello {
            version,
            random,
            session_id,
            suites,
            comp_methods,
            hostname: String::new(),
            srp_identifier: String::new(),
            next_protocol: false,
            fragment_size: 0,
            secure_renegotiation: false,
            renegotiation_info: Vec::new(),
        };

        let extensions = Extensions::parse(&mut reader)?;
        reader.assert_done()?;

        for ext in extensions.iter() {
            match ext {
                Extension::ServerName(name) => hello.hostname = name.clone(),
                Extension::SrpIdentifier(id) => hello.srp_identifier = id.clone(),
                Extension::NextProtocolNegotiation(protocols) => {
                    if !protocols.is_empty() {
                        return Err(TlsError::decoding("client sent non-empty NPN extension"));
                    }
                    hello.next_protocol = true;
                }
                Extension::MaxFragmentLength(size) => hello.fragment_size = size.size(),
                Extension::RenegotiationInfo(info) => {
                    hello.secure_renegotiation = true;
                    hello.renegotiation_info = info.clone();
                }
                Extension::Unknown { .. } => {}
            }
        }

        if hello.offered_suite(CipherSuiteId::EMPTY_RENEGOTIATION_INFO_SCSV) {
            // Sending both the SCSV and the extension is allowed, but then
            // the extension value must be empty.
            if hello.secure_renegotiation && !hello.renegotiation_info.is_empty() {
                return Err(TlsError::handshake_failure(
                    "client sent renegotiation SCSV and non-empty extension",
                ));
            }
            hello.secure_renegotiation = true;
            hello.renegotiation_info.clear();
        }

        Ok(hello)
    }

    /// Parse the legacy SSLv2-format hello, as repackaged by the record
    /// reader (the body starts at the v2 message-type byte).
    pub fn deserialize_sslv2(body: &[u8]) -> Result<Self, TlsError> {
        if body.len() < 12 || body[0] != 1 {
            return Err(TlsError::decoding("SSLv2 client hello corrupted"));
        }

        let cipher_spec_len = u16::from_be_bytes([body[3], body[4]]) as usize;
        let session_id_len = u16::from_be_bytes([body[5], body[6]]) as usize;
        let challenge_len = u16::from_be_bytes([body[7], body[8]]) as usize;

        let expected_size = 9 + session_id_len + cipher_spec_len + challenge_len;
        if body.len() != expected_size {
            return Err(TlsError::decoding("SSLv2 client hello corrupted"));
        }
        if session_id_len != 0 || cipher_spec_len % 3 != 0 || !(16..=32).contains(&challenge_len)
        {
            return Err(TlsError::decoding("SSLv2 client hello corrupted"));
        }

        let mut suites = Vec::new();
        for spec in body[9..9 + cipher_spec_len].chunks_exact(3) {
            // A non-zero high byte marks an SSLv2-only cipher spec with no
            // 16-bit suite id; those are skipped, not rejected.
            if spec[0] != 0 {
                continue;
            }
            suites.push(CipherSuiteId(u16::from_be_bytes([spec[1], spec[2]])));
        }

        let secure_renegotiation =
            suites.contains(&CipherSuiteId::EMPTY_RENEGOTIATION_INFO_SCSV);

        Ok(ClientHello {
            version: ProtocolVersion::new(body[1], body[2]),
            random: body[9 + cipher_spec_len + session_id_len..].to_vec(),
            session_id: Vec::new(),
            suites,
            comp_methods: Vec::new(),
            hostname: String::new(),
            srp_identifier: String::new(),
            next_protocol: false,
            fragment_size: 0,
            secure_renegotiation,
            renegotiation_info: Vec::new(),
        })
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn random(&self) -> &[u8] {
        &self.random
    }

    pub fn session_id(&self) -> &[u8] {
        &self.session_id
    }

    pub fn ciphersuites(&self) -> &[CipherSuiteId] {
        &self.suites
    }

    pub fn compression_methods(&self) -> &[CompressionMethod] {
        &self.comp_methods
    }

    pub fn sni_hostname(&self) -> &str {
        &self.hostname
    }

    pub fn srp_identifier(&self) -> &str {
        &self.srp_identifier
    }

    pub fn next_protocol(&self) -> bool {
        self.next_protocol
    }

    pub fn fragment_size(&self) -> usize {
        self.fragment_size
    }

    pub fn secure_renegotiation(&self) -> bool {
        self.secure_renegotiation
    }

    pub fn renegotiation_info(&self) -> &[u8] {
        &self.renegotiation_info
    }

    /// Whether the client offered this suite.
    pub fn offered_suite(&self, suite: CipherSuiteId) -> bool {
        self.suites.contains(&suite)
    }
}

impl HandshakeMessage for ClientHello {
    fn handshake_type(&self) -> HandshakeType {
        HandshakeType::ClientHello
    }

    fn serialize(&self) -> Result<Vec<u8>, TlsError> {
        let mut buf = Vec::new();
        buf.push(self.version.major);
        buf.push(self.version.minor);
        buf.extend_from_slice(&self.random);

        append_length_value(&mut buf, &self.session_id, 1);
        let suite_ids: Vec<u16> = self.suites.iter().map(|s| s.0).collect();
        append_length_u16_vector(&mut buf, &suite_ids, 2);
        let comp: Vec<u8> = self.comp_methods.iter().map(|c| c.0).collect();
        append_length_value(&mut buf, &comp, 1);

        // Renegotiation info is always offered. The remaining extensions
        // are only for an initial handshake; when renegotiating, the peer
        // already knows them and re-signaling is suppressed.
        let mut extensions = Extensions::new();
        extensions.push(Extension::RenegotiationInfo(self.renegotiation_info.clone()));
        if self.renegotiation_info.is_empty() {
            extensions.push(Extension::ServerName(self.hostname.clone()));
            extensions.push(Extension::SrpIdentifier(self.srp_identifier.clone()));
            if self.next_protocol {
                extensions.push(Extension::NextProtocolNegotiation(Vec::new()));
            }
        }
        buf.extend_from_slice(&extensions.serialize());

        Ok(buf)
    }
}

// ---------------------------------------------------------------------------
// ServerHello
// ---------------------------------------------------------------------------

/// The server's answer fixing the session parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    version: ProtocolVersion,
    session_id: Vec<u8>,
    random: Vec<u8>,
    suite: CipherSuiteId,
    comp_method: CompressionMethod,
    fragment_size: usize,
    secure_renegotiation: bool,
    renegotiation_info: Vec<u8>,
    next_protocol: bool,
    next_protocols: Vec<String>,
}

impl ServerHello {
    /// Negotiate a suite against the client's offer and transmit.
    ///
    /// The certificate set is only inspected for which server key types are
    /// available; selection itself is the policy's call. No mutually
    /// acceptable suite is a handshake failure.
    #[allow(clippy::too_many_arguments)]
    pub fn new<C: Certificate>(
        writer: &mut RecordWriter,
        hash: &mut HandshakeHash,
        policy: &dyn Policy,
        client_has_secure_renegotiation: bool,
        reneg_info: Vec<u8>,
        certs: &[C],
        client_hello: &ClientHello,
        version: ProtocolVersion,
    ) -> Result<Self, TlsError> {
        let mut have_rsa = false;
        let mut have_dsa = false;
        for cert in certs {
            match cert.key_algorithm() {
                Some(KeyAlgorithm::Rsa) => have_rsa = true,
                Some(KeyAlgorithm::Dsa) => have_dsa = true,
                None => {}
            }
        }

        let suite = policy
            .choose_suite(client_hello.ciphersuites(), have_rsa, have_dsa)
            .ok_or_else(|| {
                TlsError::handshake_failure("can't agree on a ciphersuite with client")
            })?;
        let comp_method = policy.choose_compression(client_hello.compression_methods());

        let hello = ServerHello {
            version,
            session_id: random_vec(32)?,
            random: random_vec(32)?,
            suite,
            comp_method,
            fragment_size: client_hello.fragment_size(),
            secure_renegotiation: client_has_secure_renegotiation,
            renegotiation_info: reneg_info,
            next_protocol: false,
            next_protocols: Vec::new(),
        };
        hello.send(writer, hash)?;
        Ok(hello)
    }

    /// Accept an already-decided suite/compression/session id (resumption)
    /// and transmit.
    #[allow(clippy::too_many_arguments)]
    pub fn resume(
        writer: &mut RecordWriter,
        hash: &mut HandshakeHash,
        client_has_secure_renegotiation: bool,
        reneg_info: Vec<u8>,
        session_id: Vec<u8>,
        fragment_size: usize,
        suite: CipherSuiteId,
        comp_method: CompressionMethod,
        version: ProtocolVersion,
    ) -> Result<Self, TlsError> {
        let hello = ServerHello {
            version,
            session_id,
            random: random_vec(32)?,
            suite,
            comp_method,
            fragment_size,
            secure_renegotiation: client_has_secure_renegotiation,
            renegotiation_info: reneg_info,
            next_protocol: false,
            next_protocols: Vec::new(),
        };
        hello.send(writer, hash)?;
        Ok(hello)
    }

    pub fn deserialize(body: &[u8]) -> Result<Self, TlsError> {
        if body.len() < 38 {
            return Err(TlsError::decoding("server hello packet corrupted"));
        }

        let mut reader = TlsReader::new(body);
        let version = ProtocolVersion::new(reader.get_u8()?, reader.get_u8()?);
        if !version.is_supported() {
            return Err(TlsError::protocol(
                AlertDescription::ProtocolVersion,
                "unsupported server version",
            ));
        }

        let random = reader.get_fixed(32)?.to_vec();
        let session_id = reader.get_range(1, 0, 32)?;
        let suite = CipherSuiteId(reader.get_u16()?);
        let comp_method = CompressionMethod(reader.get_u8()?);

        let mut hello = ServerHello {
            version,
            session_id,
            random,
            suite,
            comp_method,
            fragment_size: 0,
            secure_renegotiation: false,
            renegotiation_info: Vec::new(),
            next_protocol: false,
            next_protocols: Vec::new(),
        };

        let extensions = Extensions::parse(&mut reader)?;
        reader.assert_done()?;

        for ext in extensions.iter() {
            match ext {
                Extension::RenegotiationInfo(info) => {
                    hello.secure_renegotiation = true;
                    hello.renegotiation_info = info.clone();
                }
                Extension::NextProtocolNegotiation(protocols) => {
                    hello.next_protocol = true;
                    hello.next_protocols = protocols.clone();
                }
                Extension::MaxFragmentLength(size) => hello.fragment_size = size.size(),
                _ => {}
            }
        }

        Ok(hello)
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn random(&self) -> &[u8] {
        &self.random
    }

    pub fn session_id(&self) -> &[u8] {
        &self.session_id
    }

    pub fn ciphersuite(&self) -> CipherSuiteId {
        self.suite
    }

    pub fn compression_method(&self) -> CompressionMethod {
        self.comp_method
    }

    pub fn fragment_size(&self) -> usize {
        self.fragment_size
    }

    pub fn secure_renegotiation(&self) -> bool {
        self.secure_renegotiation
    }

    pub fn renegotiation_info(&self) -> &[u8] {
        &self.renegotiation_info
    }

    pub fn next_protocol(&self) -> bool {
        self.next_protocol
    }

    pub fn next_protocols(&self) -> &[String] {
        &self.next_protocols
    }
}

impl HandshakeMessage for ServerHello {
    fn handshake_type(&self) -> HandshakeType {
        HandshakeType::ServerHello
    }

    fn serialize(&self) -> Result<Vec<u8>, TlsError> {
        let mut buf = Vec::new();
        buf.push(self.version.major);
        buf.push(self.version.minor);
        buf.extend_from_slice(&self.random);
        append_length_value(&mut buf, &self.session_id, 1);
        buf.extend_from_slice(&self.suite.0.to_be_bytes());
        buf.push(self.comp_method.0);

        let mut extensions = Extensions::new();
        if self.secure_renegotiation {
            extensions.push(Extension::RenegotiationInfo(self.renegotiation_info.clone()));
        }
        if self.fragment_size != 0 {
            let size = MaxFragmentSize::from_size(self.fragment_size).ok_or_else(|| {
                TlsError::internal(format!(
                    "fragment size {} has no wire encoding",
                    self.fragment_size
                ))
            })?;
            extensions.push(Extension::MaxFragmentLength(size));
        }
        if self.next_protocol {
            extensions.push(Extension::NextProtocolNegotiation(self.next_protocols.clone()));
        }
        buf.extend_from_slice(&extensions.serialize());

        Ok(buf)
    }
}

// ---------------------------------------------------------------------------
// ServerHelloDone
// ---------------------------------------------------------------------------

/// Marks the end of the server's hello flight. The body is always empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerHelloDone;

impl ServerHelloDone {
    /// Build and transmit.
    pub fn new(writer: &mut RecordWriter, hash: &mut HandshakeHash) -> Result<Self, TlsError> {
        let done = ServerHelloDone;
        done.send(writer, hash)?;
        Ok(done)
    }

    pub fn deserialize(body: &[u8]) -> Result<Self, TlsError> {
        if !body.is_empty() {
            return Err(TlsError::decoding(
                "server hello done must be empty, and is not",
            ));
        }
        Ok(ServerHelloDone)
    }
}

impl HandshakeMessage for ServerHelloDone {
    fn handshake_type(&self) -> HandshakeType {
        HandshakeType::ServerHelloDone
    }

    fn serialize(&self) -> Result<Vec<u8>, TlsError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DefaultPolicy;
    use crate::handshake::parse_handshake_header;
    use crate::record::{ContentType, ReadResult, RecordReader, RECORD_HEADER_LEN};
    use std::sync::{Arc, Mutex};

    struct RsaCert;
    impl Certificate for RsaCert {
        fn key_algorithm(&self) -> Option<KeyAlgorithm> {
            Some(KeyAlgorithm::Rsa)
        }
    }

    struct DsaCert;
    impl Certificate for DsaCert {
        fn key_algorithm(&self) -> Option<KeyAlgorithm> {
            Some(KeyAlgorithm::Dsa)
        }
    }

    fn sink_writer() -> (Arc<Mutex<Vec<u8>>>, RecordWriter) {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let out = sink.clone();
        let mut writer = RecordWriter::new(move |bytes: &[u8]| {
            out.lock().unwrap().extend_from_slice(bytes);
        });
        writer.set_version(ProtocolVersion::TLS10);
        (sink, writer)
    }

    /// The handshake message (header + body) inside a single sent record.
    fn sent_message(sink: &Arc<Mutex<Vec<u8>>>) -> Vec<u8> {
        let wire = sink.lock().unwrap().clone();
        wire[RECORD_HEADER_LEN..].to_vec()
    }

    fn ext_block(entries: &[(u16, Vec<u8>)]) -> Vec<u8> {
        let mut inner = Vec::new();
        for (ty, data) in entries {
            inner.extend_from_slice(&ty.to_be_bytes());
            append_length_value(&mut inner, data, 2);
        }
        let mut out = Vec::new();
        append_length_value(&mut out, &inner, 2);
        out
    }

    fn client_hello_body(suites: &[u16], ext: &[u8]) -> Vec<u8> {
        let mut body = vec![3, 1];
        body.extend_from_slice(&[0xAA; 32]);
        body.push(0); // empty session id
        append_length_u16_vector(&mut body, suites, 2);
        body.extend_from_slice(&[1, 0]); // compression: null only
        body.extend_from_slice(ext);
        body
    }

    fn server_hello_body(major: u8, minor: u8, ext: &[u8]) -> Vec<u8> {
        let mut body = vec![major, minor];
        body.extend_from_slice(&[0xBB; 32]);
        body.push(0); // empty session id
        body.extend_from_slice(&0x002Fu16.to_be_bytes());
        body.push(0);
        body.extend_from_slice(ext);
        body
    }

    fn sslv2_body(specs: &[[u8; 3]], challenge_len: usize) -> Vec<u8> {
        let mut body = vec![1, 3, 1];
        body.extend_from_slice(&((specs.len() * 3) as u16).to_be_bytes());
        body.extend_from_slice(&0u16.to_be_bytes());
        body.extend_from_slice(&(challenge_len as u16).to_be_bytes());
        for spec in specs {
            body.extend_from_slice(spec);
        }
        body.extend_from_slice(&vec![0xC7; challenge_len]);
        body
    }

    // -- HelloRequest -------------------------------------------------------

    #[test]
    fn test_hello_request_empty_body() {
        assert_eq!(HelloRequest.serialize().unwrap(), Vec::<u8>::new());
        HelloRequest::deserialize(&[]).unwrap();
        assert!(HelloRequest::deserialize(&[0]).is_err());
    }

    #[test]
    fn test_hello_request_sends_immediately() {
        let (sink, mut writer) = sink_writer();
        HelloRequest::new(&mut writer).unwrap();
        assert_eq!(sent_message(&sink), vec![0, 0, 0, 0]);
    }

    // -- ClientHello --------------------------------------------------------

    #[test]
    fn test_client_hello_fresh_roundtrip() {
        let (sink, mut writer) = sink_writer();
        let mut hash = HandshakeHash::new();
        let hello = ClientHello::new(
            &mut writer,
            &mut hash,
            &DefaultPolicy,
            Vec::new(),
            true,
            "www.example.com",
            "",
        )
        .unwrap();

        assert_eq!(hello.random().len(), 32);
        assert!(hello.session_id().is_empty());
        assert!(hello.secure_renegotiation());

        let message = sent_message(&sink);
        // The transcript saw exactly the header + body.
        assert_eq!(hash.bytes(), &message[..]);

        let (msg_type, body, _) = parse_handshake_header(&message).unwrap();
        assert_eq!(msg_type, HandshakeType::ClientHello);

        let parsed = ClientHello::deserialize(body).unwrap();
        assert_eq!(parsed, hello);
    }

    #[test]
    fn test_client_hello_srp_widens_offer() {
        let (_, mut writer) = sink_writer();
        let mut hash = HandshakeHash::new();
        let hello = ClientHello::new(
            &mut writer,
            &mut hash,
            &DefaultPolicy,
            Vec::new(),
            false,
            "",
            "alice",
        )
        .unwrap();

        assert!(hello.offered_suite(CipherSuiteId::TLS_SRP_SHA_WITH_AES_128_CBC_SHA));
        assert_eq!(hello.srp_identifier(), "alice");
    }

    #[test]
    fn test_client_hello_renegotiation_suppresses_options() {
        let (sink, mut writer) = sink_writer();
        let mut hash = HandshakeHash::new();
        let reneg_info = vec![0x1F; 12];
        ClientHello::new(
            &mut writer,
            &mut hash,
            &DefaultPolicy,
            reneg_info.clone(),
            true,
            "www.example.com",
            "alice",
        )
        .unwrap();

        let message = sent_message(&sink);
        let (_, body, _) = parse_handshake_header(&message).unwrap();
        let parsed = ClientHello::deserialize(body).unwrap();

        // Only renegotiation info goes on the wire while renegotiating.
        assert_eq!(parsed.renegotiation_info(), &reneg_info[..]);
        assert!(parsed.secure_renegotiation());
        assert_eq!(parsed.sni_hostname(), "");
        assert_eq!(parsed.srp_identifier(), "");
        assert!(!parsed.next_protocol());
    }

    #[test]
    fn test_client_hello_resume_offers_single_suite() {
        let session = Session {
            version: ProtocolVersion::TLS10,
            id: vec![0x5C; 32],
            cipher_suite: CipherSuiteId::TLS_RSA_WITH_AES_256_CBC_SHA,
            compression_method: CompressionMethod::NULL,
            sni_hostname: "resume.example.com".into(),
            srp_identifier: String::new(),
            fragment_size: 2048,
            secure_renegotiation: true,
        };

        let (sink, mut writer) = sink_writer();
        let mut hash = HandshakeHash::new();
        let hello =
            ClientHello::resume(&mut writer, &mut hash, &session, false).unwrap();

        assert_eq!(hello.version(), session.version);
        assert_eq!(hello.session_id(), &session.id[..]);
        assert_eq!(hello.ciphersuites(), &[session.cipher_suite]);
        assert_eq!(
            hello.compression_methods(),
            &[session.compression_method]
        );
        assert_eq!(hello.fragment_size(), 2048);

        let message = sent_message(&sink);
        let (_, body, _) = parse_handshake_header(&message).unwrap();
        let parsed = ClientHello::deserialize(body).unwrap();
        assert_eq!(parsed.session_id(), &session.id[..]);
        assert_eq!(parsed.ciphersuites(), &[session.cipher_suite]);
        assert_eq!(parsed.sni_hostname(), "resume.example.com");
    }

    #[test]
    fn test_client_hello_minimum_size_enforced() {
        assert!(ClientHello::deserialize(&[]).is_err());
        assert!(ClientHello::deserialize(&[3, 1]).is_err());
        assert!(ClientHello::deserialize(&[0u8; 40]).is_err());
    }

    #[test]
    fn test_client_hello_single_suite_accepted() {
        let body = client_hello_body(&[0x002F], &[]);
        let hello = ClientHello::deserialize(&body).unwrap();
        assert_eq!(hello.ciphersuites(), &[CipherSuiteId(0x002F)]);
        assert!(!hello.secure_renegotiation());
    }

    #[test]
    fn test_client_hello_empty_suite_list_rejected() {
        let body = client_hello_body(&[], &[]);
        assert!(ClientHello::deserialize(&body).is_err());
    }

    #[test]
    fn test_client_hello_empty_compression_list_rejected() {
        let mut body = vec![3, 1];
        body.extend_from_slice(&[0xAA; 32]);
        body.push(0);
        append_length_u16_vector(&mut body, &[0x002F], 2);
        body.push(0); // zero compression methods
        assert!(ClientHello::deserialize(&body).is_err());
    }

    #[test]
    fn test_client_hello_oversize_session_id_rejected() {
        let mut body = vec![3, 1];
        body.extend_from_slice(&[0xAA; 32]);
        body.push(33);
        body.extend_from_slice(&[0xEE; 33]);
        append_length_u16_vector(&mut body, &[0x002F], 2);
        body.extend_from_slice(&[1, 0]);
        assert!(ClientHello::deserialize(&body).is_err());
    }

    #[test]
    fn test_scsv_sets_secure_renegotiation() {
        let body = client_hello_body(&[0x002F, 0x00FF], &[]);
        let hello = ClientHello::deserialize(&body).unwrap();
        assert!(hello.secure_renegotiation());
        assert!(hello.renegotiation_info().is_empty());
    }

    #[test]
    fn test_scsv_with_empty_extension_accepted() {
        let ext = ext_block(&[(0xFF01, vec![0x00])]);
        let body = client_hello_body(&[0x002F, 0x00FF], &ext);
        let hello = ClientHello::deserialize(&body).unwrap();
        assert!(hello.secure_renegotiation());
        assert!(hello.renegotiation_info().is_empty());
    }

    #[test]
    fn test_scsv_with_nonempty_extension_fatal() {
        let ext = ext_block(&[(0xFF01, vec![0x03, 0x01, 0x02, 0x03])]);
        let body = client_hello_body(&[0x002F, 0x00FF], &ext);
        let err = ClientHello::deserialize(&body).unwrap_err();
        assert_eq!(err.alert(), AlertDescription::HandshakeFailure);
    }

    #[test]
    fn test_nonempty_npn_from_client_rejected() {
        let ext = ext_block(&[(13172, vec![0x03, b'f', b'o', b'o'])]);
        let body = client_hello_body(&[0x002F], &ext);
        assert!(ClientHello::deserialize(&body).is_err());
    }

    #[test]
    fn test_max_fragment_extension_parsed() {
        let ext = ext_block(&[(1, vec![3])]);
        let body = client_hello_body(&[0x002F], &ext);
        let hello = ClientHello::deserialize(&body).unwrap();
        assert_eq!(hello.fragment_size(), 2048);
    }

    #[test]
    fn test_duplicate_extension_last_wins() {
        let sni = |host: &str| {
            let mut data = Vec::new();
            data.extend_from_slice(&((host.len() + 3) as u16).to_be_bytes());
            data.push(0);
            append_length_value(&mut data, host.as_bytes(), 2);
            data
        };
        let ext = ext_block(&[(0, sni("first.example")), (0, sni("second.example"))]);
        let body = client_hello_body(&[0x002F], &ext);
        let hello = ClientHello::deserialize(&body).unwrap();
        assert_eq!(hello.sni_hostname(), "second.example");
    }

    // -- SSLv2 ClientHello --------------------------------------------------

    #[test]
    fn test_sslv2_hello_parsed() {
        let body = sslv2_body(&[[0, 0, 0x2F], [0, 0, 0x35]], 16);
        let hello = ClientHello::deserialize_sslv2(&body).unwrap();
        assert_eq!(hello.version(), ProtocolVersion::TLS10);
        assert_eq!(
            hello.ciphersuites(),
            &[CipherSuiteId(0x002F), CipherSuiteId(0x0035)]
        );
        assert_eq!(hello.random(), &[0xC7; 16][..]);
        assert!(hello.session_id().is_empty());
        assert!(!hello.secure_renegotiation());
        assert_eq!(hello.fragment_size(), 0);
        assert!(!hello.next_protocol());
    }

    #[test]
    fn test_sslv2_cipher_specs_with_high_byte_skipped() {
        let body = sslv2_body(&[[7, 0, 5], [0, 0, 0x2F]], 20);
        let hello = ClientHello::deserialize_sslv2(&body).unwrap();
        assert_eq!(hello.ciphersuites(), &[CipherSuiteId(0x002F)]);
    }

    #[test]
    fn test_sslv2_scsv_detected() {
        let body = sslv2_body(&[[0, 0, 0x2F], [0, 0, 0xFF]], 16);
        let hello = ClientHello::deserialize_sslv2(&body).unwrap();
        assert!(hello.secure_renegotiation());
    }

    #[test]
    fn test_sslv2_structural_checks() {
        // Wrong message type byte.
        let mut body = sslv2_body(&[[0, 0, 0x2F]], 16);
        body[0] = 2;
        assert!(ClientHello::deserialize_sslv2(&body).is_err());

        // Total length must match the declared fields exactly.
        let mut body = sslv2_body(&[[0, 0, 0x2F]], 16);
        body.push(0);
        assert!(ClientHello::deserialize_sslv2(&body).is_err());
        let mut body = sslv2_body(&[[0, 0, 0x2F]], 16);
        body.pop();
        assert!(ClientHello::deserialize_sslv2(&body).is_err());

        // Session id must be empty.
        let mut body = sslv2_body(&[[0, 0, 0x2F]], 17);
        body[5] = 0;
        body[6] = 1; // declare 1 session id byte, stealing one challenge byte
        body[7] = 0;
        body[8] = 16;
        assert!(ClientHello::deserialize_sslv2(&body).is_err());

        // Cipher spec length must divide by 3.
        let mut body = sslv2_body(&[[0, 0, 0x2F]], 16);
        body[3] = 0;
        body[4] = 2;
        body.remove(9);
        assert!(ClientHello::deserialize_sslv2(&body).is_err());

        // Challenge length outside [16,32].
        assert!(ClientHello::deserialize_sslv2(&sslv2_body(&[[0, 0, 0x2F]], 15)).is_err());
        assert!(ClientHello::deserialize_sslv2(&sslv2_body(&[[0, 0, 0x2F]], 33)).is_err());
        ClientHello::deserialize_sslv2(&sslv2_body(&[[0, 0, 0x2F]], 32)).unwrap();

        // Too short for the fixed header.
        assert!(ClientHello::deserialize_sslv2(&[1, 3, 1, 0, 0, 0, 0, 0]).is_err());
    }

    // -- ServerHello --------------------------------------------------------

    fn client_offer(suites: &[u16]) -> ClientHello {
        ClientHello::deserialize(&client_hello_body(suites, &[])).unwrap()
    }

    #[test]
    fn test_server_hello_negotiates_by_key_type() {
        let offer = client_offer(&[0x0032, 0x002F]);
        let (sink, mut writer) = sink_writer();
        let mut hash = HandshakeHash::new();

        let hello = ServerHello::new(
            &mut writer,
            &mut hash,
            &DefaultPolicy,
            true,
            Vec::new(),
            &[RsaCert],
            &offer,
            ProtocolVersion::TLS10,
        )
        .unwrap();

        // Only the RSA-authenticated suite is usable with an RSA-only cert
        // set.
        assert_eq!(
            hello.ciphersuite(),
            CipherSuiteId::TLS_RSA_WITH_AES_128_CBC_SHA
        );
        assert_eq!(hello.session_id().len(), 32);
        assert_eq!(hello.random().len(), 32);

        let message = sent_message(&sink);
        let (msg_type, body, _) = parse_handshake_header(&message).unwrap();
        assert_eq!(msg_type, HandshakeType::ServerHello);
        let parsed = ServerHello::deserialize(body).unwrap();
        assert_eq!(parsed, hello);
    }

    #[test]
    fn test_server_hello_prefers_dsa_suite_with_dsa_cert() {
        let offer = client_offer(&[0x0032, 0x002F]);
        let (_, mut writer) = sink_writer();
        let mut hash = HandshakeHash::new();

        let hello = ServerHello::new(
            &mut writer,
            &mut hash,
            &DefaultPolicy,
            true,
            Vec::new(),
            &[DsaCert],
            &offer,
            ProtocolVersion::TLS10,
        )
        .unwrap();
        assert_eq!(
            hello.ciphersuite(),
            CipherSuiteId::TLS_DHE_DSS_WITH_AES_128_CBC_SHA
        );
    }

    #[test]
    fn test_server_hello_disjoint_offer_is_handshake_failure() {
        let offer = client_offer(&[0x1301, 0x1302]);
        let (_, mut writer) = sink_writer();
        let mut hash = HandshakeHash::new();

        let err = ServerHello::new(
            &mut writer,
            &mut hash,
            &DefaultPolicy,
            true,
            Vec::new(),
            &[RsaCert],
            &offer,
            ProtocolVersion::TLS10,
        )
        .unwrap_err();
        assert_eq!(err.alert(), AlertDescription::HandshakeFailure);
    }

    #[test]
    fn test_server_hello_no_usable_cert_is_handshake_failure() {
        let offer = client_offer(&[0x002F]);
        let (_, mut writer) = sink_writer();
        let mut hash = HandshakeHash::new();

        let err = ServerHello::new(
            &mut writer,
            &mut hash,
            &DefaultPolicy,
            true,
            Vec::new(),
            &[] as &[RsaCert],
            &offer,
            ProtocolVersion::TLS10,
        )
        .unwrap_err();
        assert_eq!(err.alert(), AlertDescription::HandshakeFailure);
    }

    #[test]
    fn test_server_hello_resume_roundtrip() {
        let (sink, mut writer) = sink_writer();
        let mut hash = HandshakeHash::new();
        let hello = ServerHello::resume(
            &mut writer,
            &mut hash,
            true,
            vec![0x2A; 24],
            vec![0x77; 32],
            2048,
            CipherSuiteId::TLS_RSA_WITH_AES_256_CBC_SHA,
            CompressionMethod::NULL,
            ProtocolVersion::TLS11,
        )
        .unwrap();

        let message = sent_message(&sink);
        let (_, body, _) = parse_handshake_header(&message).unwrap();
        let parsed = ServerHello::deserialize(body).unwrap();
        assert_eq!(parsed, hello);
        assert_eq!(parsed.fragment_size(), 2048);
        assert_eq!(parsed.renegotiation_info(), &[0x2A; 24][..]);
    }

    #[test]
    fn test_server_hello_without_secure_renegotiation_omits_extensions() {
        let (sink, mut writer) = sink_writer();
        let mut hash = HandshakeHash::new();
        ServerHello::resume(
            &mut writer,
            &mut hash,
            false,
            Vec::new(),
            Vec::new(),
            0,
            CipherSuiteId::TLS_RSA_WITH_AES_128_CBC_SHA,
            CompressionMethod::NULL,
            ProtocolVersion::TLS10,
        )
        .unwrap();

        let message = sent_message(&sink);
        let (_, body, _) = parse_handshake_header(&message).unwrap();
        // version(2) + random(32) + sid_len(1) + suite(2) + comp(1): no
        // extension block at all.
        assert_eq!(body.len(), 38);
        let parsed = ServerHello::deserialize(body).unwrap();
        assert!(!parsed.secure_renegotiation());
    }

    #[test]
    fn test_server_hello_rejects_unsupported_version() {
        let body = server_hello_body(3, 3, &[]);
        let err = ServerHello::deserialize(&body).unwrap_err();
        assert_eq!(err.alert(), AlertDescription::ProtocolVersion);

        let body = server_hello_body(2, 0, &[]);
        assert!(ServerHello::deserialize(&body).is_err());
    }

    #[test]
    fn test_server_hello_minimum_size_enforced() {
        assert!(ServerHello::deserialize(&[0u8; 37]).is_err());
    }

    #[test]
    fn test_server_hello_npn_roundtrip() {
        let mut npn = Vec::new();
        append_length_value(&mut npn, b"http/1.1", 1);
        append_length_value(&mut npn, b"spdy/2", 1);
        let ext = ext_block(&[(13172, npn)]);
        let body = server_hello_body(3, 1, &ext);

        let hello = ServerHello::deserialize(&body).unwrap();
        assert!(hello.next_protocol());
        assert_eq!(hello.next_protocols(), &["http/1.1", "spdy/2"]);

        let reparsed = ServerHello::deserialize(&hello.serialize().unwrap()).unwrap();
        assert_eq!(reparsed, hello);
    }

    // -- ServerHelloDone ----------------------------------------------------

    #[test]
    fn test_server_hello_done_roundtrip() {
        let (sink, mut writer) = sink_writer();
        let mut hash = HandshakeHash::new();
        ServerHelloDone::new(&mut writer, &mut hash).unwrap();

        let message = sent_message(&sink);
        assert_eq!(message, vec![14, 0, 0, 0]);
        assert_eq!(hash.bytes(), &message[..]);

        ServerHelloDone::deserialize(&[]).unwrap();
        assert!(ServerHelloDone::deserialize(&[1]).is_err());
    }

    // -- Through the record layer ------------------------------------------

    #[test]
    fn test_client_hello_through_record_layer() {
        let (sink, mut writer) = sink_writer();
        let mut hash = HandshakeHash::new();
        let hello = ClientHello::new(
            &mut writer,
            &mut hash,
            &DefaultPolicy,
            Vec::new(),
            false,
            "relay.example.net",
            "",
        )
        .unwrap();

        let mut reader = RecordReader::new();
        reader.add_input(&sink.lock().unwrap());
        let (content_type, payload) = match reader.get_record().unwrap() {
            ReadResult::Record(ty, payload) => (ty, payload),
            other => panic!("expected record, got {other:?}"),
        };
        assert_eq!(content_type, ContentType::Handshake);

        let (msg_type, body, consumed) = parse_handshake_header(&payload).unwrap();
        assert_eq!(consumed, payload.len());
        let parsed = ClientHello::parse(msg_type, body).unwrap();
        assert_eq!(parsed, hello);
    }

    #[test]
    fn test_sslv2_hello_through_record_layer() {
        let v2_body = sslv2_body(&[[0, 0, 0x2F], [0, 0, 0xFF]], 24);
        let mut wire = Vec::new();
        wire.extend_from_slice(&(0x8000u16 | v2_body.len() as u16).to_be_bytes());
        wire.extend_from_slice(&v2_body);

        let mut reader = RecordReader::new();
        reader.add_input(&wire);
        let payload = match reader.get_record().unwrap() {
            ReadResult::Record(ContentType::Handshake, payload) => payload,
            other => panic!("expected handshake record, got {other:?}"),
        };

        let (msg_type, body, _) = parse_handshake_header(&payload).unwrap();
        assert_eq!(msg_type, HandshakeType::ClientHelloSslv2);
        let hello = ClientHello::parse(msg_type, body).unwrap();
        assert!(hello.offered_suite(CipherSuiteId(0x002F)));
        assert!(hello.secure_renegotiation());
        assert_eq!(hello.random().len(), 24);
    }
}

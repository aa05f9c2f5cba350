//! Negotiation policy and the certificate view consumed by suite selection.

use crate::{CipherSuiteId, CompressionMethod, ProtocolVersion};

/// Public key algorithm of a server certificate, as reported by the
/// external X.509 machinery. Suite selection only needs to know whether an
/// RSA or DSA key is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Rsa,
    Dsa,
}

/// Minimal certificate view: just the subject key algorithm.
pub trait Certificate {
    /// `None` when the key is neither RSA nor DSA.
    fn key_algorithm(&self) -> Option<KeyAlgorithm>;
}

/// Negotiation preferences injected by the application.
pub trait Policy {
    /// The highest version this endpoint offers.
    fn preferred_version(&self) -> ProtocolVersion {
        ProtocolVersion::TLS11
    }

    /// Suites to offer, in preference order. `with_srp` widens the list to
    /// SRP suites when the client has an SRP identity to present.
    fn cipher_suites(&self, with_srp: bool) -> Vec<CipherSuiteId>;

    /// Compression methods to offer, in preference order.
    fn compression_methods(&self) -> Vec<CompressionMethod> {
        vec![CompressionMethod::NULL]
    }

    /// Pick a mutually acceptable suite from the client's offer, knowing
    /// which server key types are available. `None` means no agreement.
    fn choose_suite(
        &self,
        offered: &[CipherSuiteId],
        have_rsa: bool,
        have_dsa: bool,
    ) -> Option<CipherSuiteId>;

    /// Pick a compression method from the client's offer.
    fn choose_compression(&self, _offered: &[CompressionMethod]) -> CompressionMethod {
        CompressionMethod::NULL
    }
}

/// Stock policy covering the RFC 4346-era suite set.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicy;

impl DefaultPolicy {
    fn preference_order(with_srp: bool) -> Vec<CipherSuiteId> {
        let mut suites = vec![
            CipherSuiteId::TLS_RSA_WITH_AES_256_CBC_SHA,
            CipherSuiteId::TLS_RSA_WITH_AES_128_CBC_SHA,
            CipherSuiteId::TLS_RSA_WITH_3DES_EDE_CBC_SHA,
            CipherSuiteId::TLS_RSA_WITH_RC4_128_SHA,
            CipherSuiteId::TLS_DHE_DSS_WITH_AES_256_CBC_SHA,
            CipherSuiteId::TLS_DHE_DSS_WITH_AES_128_CBC_SHA,
            CipherSuiteId::TLS_DHE_DSS_WITH_3DES_EDE_CBC_SHA,
        ];
        if with_srp {
            suites.insert(0, CipherSuiteId::TLS_SRP_SHA_WITH_AES_256_CBC_SHA);
            suites.insert(1, CipherSuiteId::TLS_SRP_SHA_WITH_AES_128_CBC_SHA);
        }
        suites
    }

    /// Server key type a suite's key exchange requires.
    fn required_key(suite: CipherSuiteId) -> Option<KeyAlgorithm> {
        match suite {
            CipherSuiteId::TLS_RSA_WITH_RC4_128_SHA
            | CipherSuiteId::TLS_RSA_WITH_3DES_EDE_CBC_SHA
            | CipherSuiteId::TLS_RSA_WITH_AES_128_CBC_SHA
            | CipherSuiteId::TLS_RSA_WITH_AES_256_CBC_SHA => Some(KeyAlgorithm::Rsa),
            CipherSuiteId::TLS_DHE_DSS_WITH_3DES_EDE_CBC_SHA
            | CipherSuiteId::TLS_DHE_DSS_WITH_AES_128_CBC_SHA
            | CipherSuiteId::TLS_DHE_DSS_WITH_AES_256_CBC_SHA => Some(KeyAlgorithm::Dsa),
            // SRP suites authenticate through the SRP exchange itself.
            CipherSuiteId::TLS_SRP_SHA_WITH_AES_128_CBC_SHA
            | CipherSuiteId::TLS_SRP_SHA_WITH_AES_256_CBC_SHA => None,
            _ => Some(KeyAlgorithm::Rsa),
        }
    }
}

impl Policy for DefaultPolicy {
    fn cipher_suites(&self, with_srp: bool) -> Vec<CipherSuiteId> {
        Self::preference_order(with_srp)
    }

    fn choose_suite(
        &self,
        offered: &[CipherSuiteId],
        have_rsa: bool,
        have_dsa: bool,
    ) -> Option<CipherSuiteId> {
        for suite in Self::preference_order(false) {
            if !offered.contains(&suite) {
                continue;
            }
            let usable = match Self::required_key(suite) {
                Some(KeyAlgorithm::Rsa) => have_rsa,
                Some(KeyAlgorithm::Dsa) => have_dsa,
                None => true,
            };
            if usable {
                return Some(suite);
            }
        }
        None
    }
}

//! Certificate handling
//!
//! Parses the PEM key/certificate pair stored inline on a Route into a
//! structured form the state classifier can reason about: validity window
//! and covered host names. Also converts an issued DER chain back into the
//! PEM representation the Route stores.

mod request;

pub use request::{generate_for_host, CertificateRequest, RSA_KEY_BITS};

use chrono::{DateTime, Utc};
use thiserror::Error;
use x509_parser::prelude::*;

/// Certificate errors
#[derive(Debug, Error)]
pub enum CertError {
    /// PEM envelope could not be decoded
    #[error("failed to parse PEM data: {0}")]
    Pem(String),

    /// X.509 structure could not be parsed
    #[error("failed to parse X.509 certificate: {0}")]
    X509(String),

    /// The CA returned an empty certificate chain
    #[error("certificate chain is empty")]
    EmptyChain,

    /// Private key generation failed
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Private key could not be serialized
    #[error("failed to encode private key: {0}")]
    KeyEncoding(String),

    /// Certificate signing request could not be built
    #[error("failed to build certificate request: {0}")]
    Csr(String),
}

/// PEM-encoded private key and leaf certificate, as stored on a Route.
#[derive(Clone, Debug)]
pub struct CertPemData {
    /// PEM-encoded private key
    pub key: String,
    /// PEM-encoded certificate chain, leaf first
    pub certificate: String,
}

impl CertPemData {
    /// Convert a DER certificate chain issued by the CA into PEM form,
    /// pairing it with the already PEM-encoded private key.
    pub fn from_der_chain(chain: &[Vec<u8>], key_pem: String) -> Result<Self, CertError> {
        if chain.is_empty() {
            return Err(CertError::EmptyChain);
        }

        let certificate = chain
            .iter()
            .map(|der| ::pem::encode(&::pem::Pem::new("CERTIFICATE", der.clone())))
            .collect::<Vec<_>>()
            .join("");

        Ok(Self {
            key: key_pem,
            certificate,
        })
    }

    /// Parse the leaf certificate.
    pub fn parse(&self) -> Result<ParsedCertificate, CertError> {
        ParsedCertificate::from_pem(&self.certificate)
    }
}

/// The attributes of a leaf certificate the controller reasons about.
#[derive(Clone, Debug)]
pub struct ParsedCertificate {
    /// Start of the validity window
    pub not_before: DateTime<Utc>,
    /// End of the validity window
    pub not_after: DateTime<Utc>,
    /// DNS names from the subject alternative name extension
    pub dns_names: Vec<String>,
    /// Subject common name, if present
    pub common_name: Option<String>,
}

impl ParsedCertificate {
    /// Parse the first certificate of a PEM bundle.
    pub fn from_pem(pem_data: &str) -> Result<Self, CertError> {
        let (_, parsed_pem) = parse_x509_pem(pem_data.as_bytes())
            .map_err(|e| CertError::Pem(format!("{e:?}")))?;
        let cert = parsed_pem
            .parse_x509()
            .map_err(|e| CertError::X509(format!("{e:?}")))?;

        let not_before = DateTime::<Utc>::from_timestamp(cert.validity().not_before.timestamp(), 0)
            .ok_or_else(|| CertError::X509("notBefore out of range".to_string()))?;
        let not_after = DateTime::<Utc>::from_timestamp(cert.validity().not_after.timestamp(), 0)
            .ok_or_else(|| CertError::X509("notAfter out of range".to_string()))?;

        let mut dns_names = Vec::new();
        if let Ok(Some(san)) = cert.subject_alternative_name() {
            for name in &san.value.general_names {
                if let GeneralName::DNSName(dns) = name {
                    dns_names.push((*dns).to_string());
                }
            }
        }

        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(str::to_string);

        Ok(Self {
            not_before,
            not_after,
            dns_names,
            common_name,
        })
    }

    /// Returns true if `t` falls inside the validity window.
    ///
    /// The window is closed on the left and open on the right: a certificate
    /// is no longer valid at the very instant of `not_after`.
    pub fn valid_at(&self, t: DateTime<Utc>) -> bool {
        t >= self.not_before && t < self.not_after
    }

    /// Returns true if the certificate covers `host`.
    ///
    /// SAN DNS names are authoritative when present; the subject common name
    /// is only consulted for certificates without a SAN extension.
    pub fn verify_hostname(&self, host: &str) -> bool {
        if !self.dns_names.is_empty() {
            return self.dns_names.iter().any(|p| hostname_matches(p, host));
        }
        self.common_name
            .as_deref()
            .is_some_and(|cn| hostname_matches(cn, host))
    }
}

/// Case-insensitive host name match with support for a single leftmost
/// wildcard label (`*.example.com` matches `www.example.com` but neither
/// `example.com` nor `a.b.example.com`).
fn hostname_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let host = host.to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        Some(suffix) => match host.split_once('.') {
            Some((label, rest)) => !label.is_empty() && rest == suffix,
            None => false,
        },
        None => pattern == host,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    /// Self-sign a certificate with the given SANs and validity window.
    pub(crate) fn make_cert_pem(
        sans: &[&str],
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
    ) -> String {
        let key = rcgen::KeyPair::generate().unwrap();
        let mut params =
            rcgen::CertificateParams::new(sans.iter().map(|s| s.to_string()).collect::<Vec<_>>())
                .unwrap();
        params.not_before =
            ::time::OffsetDateTime::from_unix_timestamp(not_before.timestamp()).unwrap();
        params.not_after =
            ::time::OffsetDateTime::from_unix_timestamp(not_after.timestamp()).unwrap();
        params.self_signed(&key).unwrap().pem()
    }

    fn ts(s: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .unwrap()
            .and_utc()
    }

    #[test]
    fn parses_validity_and_sans() {
        let pem = make_cert_pem(
            &["example.com", "www.example.com"],
            ts("2025-01-01 00:00:00"),
            ts("2025-04-01 00:00:00"),
        );
        let cert = ParsedCertificate::from_pem(&pem).unwrap();
        assert_eq!(cert.not_before, ts("2025-01-01 00:00:00"));
        assert_eq!(cert.not_after, ts("2025-04-01 00:00:00"));
        assert_eq!(cert.dns_names, vec!["example.com", "www.example.com"]);
    }

    #[test]
    fn garbage_pem_is_an_error() {
        assert!(ParsedCertificate::from_pem("not a certificate").is_err());
        assert!(ParsedCertificate::from_pem("").is_err());
    }

    #[test]
    fn validity_window_is_half_open() {
        let pem = make_cert_pem(
            &["example.com"],
            ts("2025-01-01 00:00:00"),
            ts("2025-04-01 00:00:00"),
        );
        let cert = ParsedCertificate::from_pem(&pem).unwrap();

        assert!(!cert.valid_at(ts("2024-12-31 23:59:59")));
        assert!(cert.valid_at(ts("2025-01-01 00:00:00")));
        assert!(cert.valid_at(ts("2025-03-31 23:59:59")));
        assert!(!cert.valid_at(ts("2025-04-01 00:00:00")), "expired at notAfter");
    }

    #[test]
    fn hostname_verification() {
        let pem = make_cert_pem(
            &["example.com"],
            ts("2025-01-01 00:00:00"),
            ts("2025-04-01 00:00:00"),
        );
        let cert = ParsedCertificate::from_pem(&pem).unwrap();
        assert!(cert.verify_hostname("example.com"));
        assert!(cert.verify_hostname("EXAMPLE.com"));
        assert!(!cert.verify_hostname("other.com"));
        assert!(!cert.verify_hostname("www.example.com"));
    }

    #[test]
    fn wildcard_matches_single_label() {
        assert!(hostname_matches("*.example.com", "www.example.com"));
        assert!(!hostname_matches("*.example.com", "example.com"));
        assert!(!hostname_matches("*.example.com", "a.b.example.com"));
        assert!(!hostname_matches("*.example.com", "com"));
        assert!(hostname_matches("example.com", "example.com"));
        assert!(!hostname_matches("example.com", "www.example.com"));
    }

    #[test]
    fn der_chain_round_trips_to_pem() {
        let key = rcgen::KeyPair::generate().unwrap();
        let params = rcgen::CertificateParams::new(vec!["example.com".to_string()]).unwrap();
        let cert = params.self_signed(&key).unwrap();
        let der = cert.der().to_vec();

        let pem_data =
            CertPemData::from_der_chain(&[der], "key placeholder".to_string()).unwrap();
        let parsed = pem_data.parse().unwrap();
        assert_eq!(parsed.dns_names, vec!["example.com"]);
    }

    #[test]
    fn empty_chain_is_an_error() {
        let err = CertPemData::from_der_chain(&[], "k".to_string()).unwrap_err();
        assert!(matches!(err, CertError::EmptyChain));
    }
}

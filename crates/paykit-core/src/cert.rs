//! Certificate trust validation against a pinned issuer and domain
//!
//! Downloads PEM certificate bundles (cached process-wide by URL), loads a
//! single trusted root, and validates a client certificate chain: the chain
//! must contain the trusted root, and the leaf's Common Name must belong to
//! the pinned domain. Chain building alone only proves issuance by *some*
//! trusted CA; the domain pin defends against an attacker legitimately
//! obtaining a CA-signed certificate for an unrelated domain.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use dashmap::DashMap;
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use sha2::{Digest, Sha256};
use x509_parser::certificate::X509Certificate;

use crate::config;
use crate::error::{Error, Result};

pub const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
pub const PEM_END: &str = "-----END CERTIFICATE-----";

/// Suffix the leaf certificate's Common Name must carry.
pub const PINNED_DOMAIN_SUFFIX: &str = ".paypal.com";

/// Default trusted root shipped with the crate, used when no
/// `trustedCertificateLocation` is configured. Issuer rotation replaces this
/// resource out of band.
const BUNDLED_TRUSTED_ROOT_PEM: &str =
    include_str!("../resources/DigiCertSHA2ExtendedValidationServerCA.pem");

/// Process-wide certificate cache, keyed by bundle URL. Append-only: the
/// certificate set for a URL changes rarely, so entries are parsed once and
/// reused; the first writer wins per key.
static CERTIFICATES: Lazy<DashMap<String, Arc<Vec<Certificate>>>> = Lazy::new(DashMap::new);

static TRUSTED_ROOT: OnceCell<Certificate> = OnceCell::new();

static CN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"CN=[A-Za-z0-9.*_-]+").expect("valid pattern"));

/// One certificate, held as DER bytes. X.509 interpretation happens on
/// demand so a bundle can be cached without re-parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
}

impl Certificate {
    pub fn from_der(der: Vec<u8>) -> Self {
        Self { der }
    }

    /// Decodes the body of one PEM block (the base64 between the BEGIN/END
    /// delimiters).
    pub fn from_pem_body(body: &str) -> Result<Self> {
        let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
        let der = BASE64.decode(compact).map_err(|e| Error::Config {
            message: "certificate block is not valid base64".to_string(),
            source: Some(e.into()),
        })?;
        Ok(Self { der })
    }

    /// Loads the first certificate from a PEM file.
    pub fn from_pem_file(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let segments = split_pem_segments(&text);
        match segments.first() {
            Some(body) => Self::from_pem_body(body),
            None => Err(Error::Config {
                message: format!("no certificate found in {path}"),
                source: None,
            }),
        }
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// SHA-256 fingerprint over the DER encoding.
    pub fn fingerprint(&self) -> [u8; 32] {
        Sha256::digest(&self.der).into()
    }

    fn x509(&self) -> Result<X509Certificate<'_>> {
        x509_parser::parse_x509_certificate(&self.der)
            .map(|(_, parsed)| parsed)
            .map_err(|e| Error::Config {
                message: format!("malformed X.509 certificate: {e}"),
                source: None,
            })
    }
}

/// Splits PEM text on the literal BEGIN/END delimiters, yielding the trimmed
/// non-empty body of every block. Generic collection-import routines in some
/// ecosystems only parse the first certificate of a multi-certificate PEM
/// stream, so the split is done manually to recover all of them.
pub fn split_pem_segments(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(PEM_BEGIN) {
        let after = &rest[start + PEM_BEGIN.len()..];
        let Some(end) = after.find(PEM_END) else { break };
        let body = after[..end].trim();
        if !body.is_empty() {
            segments.push(body.to_string());
        }
        rest = &after[end + PEM_END.len()..];
    }
    segments
}

/// Parses every certificate in a PEM bundle, in order.
pub fn parse_bundle(text: &str) -> Result<Vec<Certificate>> {
    split_pem_segments(text)
        .iter()
        .map(|body| Certificate::from_pem_body(body))
        .collect()
}

/// Gets the certificates for the given URL from the process-wide cache,
/// downloading and parsing the bundle on first use.
pub async fn certificates_from_url(url: &str) -> Result<Arc<Vec<Certificate>>> {
    if let Some(cached) = CERTIFICATES.get(url) {
        return Ok(Arc::clone(&cached));
    }

    log::debug!("downloading certificate bundle from {url}");
    let response = reqwest::get(url)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| Error::Connection {
            message: format!("failed to download certificates from {url}: {e}"),
            source: Some(e.into()),
        })?;
    let text = response.text().await.map_err(|e| Error::Connection {
        message: format!("failed reading certificate bundle from {url}: {e}"),
        source: Some(e.into()),
    })?;
    let parsed = Arc::new(parse_bundle(&text)?);

    // First writer wins; readers never observe a partial collection.
    let entry = CERTIFICATES
        .entry(url.to_string())
        .or_insert_with(|| Arc::clone(&parsed));
    Ok(Arc::clone(&entry))
}

/// Gets the trusted root used for chain validation, loading it once from the
/// configured path or the bundled default.
pub fn trusted_root(config: &HashMap<String, String>) -> Result<&'static Certificate> {
    TRUSTED_ROOT.get_or_try_init(|| load_trusted_root(config))
}

/// Reads the trusted root from `trustedCertificateLocation` when configured,
/// else from the bundled resource.
pub fn load_trusted_root(config: &HashMap<String, String>) -> Result<Certificate> {
    match config.get(config::TRUSTED_CERTIFICATE_LOCATION) {
        Some(path) => Certificate::from_pem_file(path),
        None => {
            let segments = split_pem_segments(BUNDLED_TRUSTED_ROOT_PEM);
            match segments.first() {
                Some(body) => Certificate::from_pem_body(body),
                None => Err(Error::Config {
                    message: "bundled trusted root resource is empty".to_string(),
                    source: None,
                }),
            }
        }
    }
}

/// Validates a client certificate chain against the trusted root plus the
/// domain pin. Returns false when either input is absent or empty, when the
/// chain cannot be built, when the trusted root never appears in the built
/// chain, or when the leaf fails the pin.
pub fn validate_chain(trusted: &Certificate, client_certs: &[Certificate]) -> bool {
    if client_certs.is_empty() {
        return false;
    }

    let Some(chain) = build_chain(trusted, client_certs) else {
        return false;
    };

    let trusted_fingerprint = trusted.fingerprint();
    if !chain
        .iter()
        .any(|cert| cert.fingerprint() == trusted_fingerprint)
    {
        log::warn!("trusted root not present in the built certificate chain");
        return false;
    }

    leaf_has_pinned_subject(&client_certs[0])
}

/// Builds a chain starting from the leaf, using the remaining client
/// certificates plus the trusted root as available issuers. Every element
/// must parse, be inside its validity window, and carry a signature the
/// selected issuer verifies. Full-chain revocation has no offline
/// equivalent; the validity-window check stands in for it.
fn build_chain<'a>(
    trusted: &'a Certificate,
    client_certs: &'a [Certificate],
) -> Option<Vec<&'a Certificate>> {
    let mut chain: Vec<&'a Certificate> = vec![client_certs.first()?];
    loop {
        let current = chain.last().copied()?;
        let parsed = current.x509().ok()?;
        if !parsed.validity().is_valid() {
            return None;
        }
        if parsed.subject().as_raw() == parsed.issuer().as_raw() {
            // Self-signed: the chain terminates here.
            break;
        }

        let mut issuer: Option<&'a Certificate> = None;
        for candidate in client_certs.iter().skip(1).chain(std::iter::once(trusted)) {
            if chain.iter().any(|c| std::ptr::eq(*c, candidate)) {
                continue;
            }
            let Ok(candidate_parsed) = candidate.x509() else {
                continue;
            };
            if candidate_parsed.subject().as_raw() != parsed.issuer().as_raw() {
                continue;
            }
            if parsed
                .verify_signature(Some(candidate_parsed.public_key()))
                .is_ok()
            {
                issuer = Some(candidate);
                break;
            }
        }

        match issuer {
            Some(cert) => chain.push(cert),
            // No further issuer available; the chain is as complete as the
            // provided certificates allow.
            None => break,
        }
    }
    Some(chain)
}

/// Checks the leaf certificate's subject against the pinned domain.
fn leaf_has_pinned_subject(leaf: &Certificate) -> bool {
    let Ok(parsed) = leaf.x509() else {
        return false;
    };
    subject_has_pinned_common_name(&parsed.subject().to_string())
}

/// The first Common Name in the subject must end with the pinned domain.
pub(crate) fn subject_has_pinned_common_name(subject: &str) -> bool {
    CN_PATTERN
        .find(subject)
        .is_some_and(|cn| cn.as_str().ends_with(PINNED_DOMAIN_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn pem_block(body: &str) -> String {
        format!("{PEM_BEGIN}\n{body}\n{PEM_END}\n")
    }

    fn encoded(bytes: &[u8]) -> String {
        BASE64.encode(bytes)
    }

    #[test]
    fn test_three_blocks_yield_three_certificates() {
        let bundle = format!(
            "{}{}{}",
            pem_block(&encoded(b"first certificate")),
            pem_block(&encoded(b"second certificate")),
            pem_block(&encoded(b"third certificate")),
        );
        let certs = parse_bundle(&bundle).unwrap();
        assert_eq!(certs.len(), 3);
        assert_eq!(certs[0].der(), b"first certificate");
        assert_eq!(certs[2].der(), b"third certificate");
    }

    #[test]
    fn test_empty_blocks_are_skipped() {
        let bundle = format!(
            "{}{}{}",
            pem_block(&encoded(b"only")),
            pem_block(""),
            pem_block("   \n  "),
        );
        assert_eq!(split_pem_segments(&bundle).len(), 1);
    }

    #[test]
    fn test_text_outside_delimiters_is_ignored() {
        let bundle = format!(
            "subject=/CN=example\n{}trailing notes\n",
            pem_block(&encoded(b"payload"))
        );
        let certs = parse_bundle(&bundle).unwrap();
        assert_eq!(certs.len(), 1);
        assert_eq!(certs[0].der(), b"payload");
    }

    #[test]
    fn test_invalid_base64_is_a_config_error() {
        let bundle = pem_block("!!! not base64 !!!");
        assert!(matches!(parse_bundle(&bundle), Err(Error::Config { .. })));
    }

    #[test]
    fn test_fingerprints_differ_per_certificate() {
        let a = Certificate::from_der(b"one".to_vec());
        let b = Certificate::from_der(b"two".to_vec());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), Certificate::from_der(b"one".to_vec()).fingerprint());
    }

    #[test]
    fn test_validate_chain_rejects_empty_or_garbage_input() {
        let trusted = Certificate::from_der(b"root".to_vec());
        assert!(!validate_chain(&trusted, &[]));

        // DER that is not an X.509 certificate cannot start a chain.
        let garbage = vec![Certificate::from_der(b"not a certificate".to_vec())];
        assert!(!validate_chain(&trusted, &garbage));
    }

    /// Generates a self-signed root plus a leaf it issued for the given
    /// Common Name.
    fn issued_pair(leaf_cn: &str) -> (Certificate, Certificate) {
        use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};

        let root_key = KeyPair::generate().unwrap();
        let mut root_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        root_params
            .distinguished_name
            .push(DnType::CommonName, "Test Root CA");
        root_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let root = root_params.self_signed(&root_key).unwrap();

        let leaf_key = KeyPair::generate().unwrap();
        let mut leaf_params = CertificateParams::new(vec![leaf_cn.to_string()]).unwrap();
        leaf_params
            .distinguished_name
            .push(DnType::CommonName, leaf_cn);
        let leaf = leaf_params.signed_by(&leaf_key, &root, &root_key).unwrap();

        (
            Certificate::from_der(root.der().to_vec()),
            Certificate::from_der(leaf.der().to_vec()),
        )
    }

    #[test]
    fn test_chain_to_trusted_root_with_pinned_leaf_validates() {
        let (root, leaf) = issued_pair("api.paypal.com");
        assert!(validate_chain(&root, &[leaf]));
    }

    #[test]
    fn test_pinned_domain_rejects_leaf_from_trusted_root() {
        // Issued by the trusted root, so the chain itself is sound, but the
        // leaf's Common Name fails the domain pin.
        let (root, leaf) = issued_pair("evil.example.com");
        assert!(!validate_chain(&root, &[leaf]));
    }

    #[test]
    fn test_leaf_from_unrelated_issuer_is_rejected() {
        // Both roots carry the same subject name; only the signature check
        // tells them apart.
        let (_, leaf) = issued_pair("api.paypal.com");
        let (other_root, _) = issued_pair("api.paypal.com");
        assert!(!validate_chain(&other_root, &[leaf]));
    }

    #[test]
    fn test_pinned_common_name() {
        assert!(subject_has_pinned_common_name(
            "CN=api.paypal.com, O=PayPal Inc., C=US"
        ));
        assert!(subject_has_pinned_common_name("CN=api.sandbox.paypal.com"));
        assert!(!subject_has_pinned_common_name(
            "CN=evil.example.com, O=Evil Corp"
        ));
        assert!(!subject_has_pinned_common_name("O=No Common Name Here"));
        // the pin applies to the first CN only
        assert!(!subject_has_pinned_common_name(
            "CN=evil.example.com, CN=api.paypal.com"
        ));
    }

    #[test]
    fn test_trusted_root_from_configured_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", pem_block(&encoded(b"configured root"))).unwrap();

        let config = HashMap::from([(
            config::TRUSTED_CERTIFICATE_LOCATION.to_string(),
            file.path().to_string_lossy().to_string(),
        )]);
        let root = load_trusted_root(&config).unwrap();
        assert_eq!(root.der(), b"configured root");
    }

    #[test]
    fn test_trusted_root_missing_file_is_an_error() {
        let config = HashMap::from([(
            config::TRUSTED_CERTIFICATE_LOCATION.to_string(),
            "/nonexistent/root.pem".to_string(),
        )]);
        assert!(load_trusted_root(&config).is_err());
    }

    #[test]
    fn test_bundled_trusted_root_loads() {
        let root = load_trusted_root(&HashMap::new()).unwrap();
        assert!(!root.der().is_empty());
    }
}

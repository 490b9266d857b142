//! # Certificate Codec
//!
//! Decodes PEM certificates and private keys found in user Secrets, and
//! encodes DER material back into PEM.
//!
//! Decoding is pure: on failure nothing is returned except a [`CodecError`]
//! naming the offending Secret field. JKS keystores are opaque blobs here;
//! only their presence is checked.

use rustls::pki_types::{pem::PemObject, PrivateKeyDer};
use thiserror::Error;
use x509_parser::prelude::{FromDer, X509Certificate};
use zeroize::Zeroizing;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to decode field '{field}': {reason}")]
pub struct CodecError {
    pub field: String,
    pub reason: String,
}

impl CodecError {
    fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// A parsed X.509 certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCertificate {
    pub der: Vec<u8>,
    pub subject: String,
    pub not_after: Option<chrono::DateTime<chrono::Utc>>,
}

/// Private key encodings accepted in `tls.key`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFormat {
    Pkcs1,
    Pkcs8,
    Sec1,
}

impl KeyFormat {
    fn pem_label(self) -> &'static str {
        match self {
            KeyFormat::Pkcs1 => "RSA PRIVATE KEY",
            KeyFormat::Pkcs8 => "PRIVATE KEY",
            KeyFormat::Sec1 => "EC PRIVATE KEY",
        }
    }
}

/// A parsed private key; the DER bytes are wiped on drop
#[derive(Clone)]
pub struct DecodedKey {
    pub der: Zeroizing<Vec<u8>>,
    pub format: KeyFormat,
}

impl std::fmt::Debug for DecodedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedKey")
            .field("format", &self.format)
            .field("der", &"***")
            .finish()
    }
}

/// Decode the first PEM `CERTIFICATE` block in `pem`
pub fn decode_certificate(field: &str, pem: &[u8]) -> Result<DecodedCertificate, CodecError> {
    if pem.is_empty() {
        return Err(CodecError::new(field, "value is empty"));
    }

    let (_, block) = x509_parser::pem::parse_x509_pem(pem)
        .map_err(|e| CodecError::new(field, format!("invalid PEM: {e}")))?;

    if block.label != "CERTIFICATE" {
        return Err(CodecError::new(
            field,
            format!("expected CERTIFICATE block, found '{}'", block.label),
        ));
    }

    let (_, cert) = X509Certificate::from_der(block.contents.as_slice())
        .map_err(|e| CodecError::new(field, format!("invalid X.509 certificate: {e}")))?;

    let subject = cert.subject().to_string();
    let not_after = chrono::DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0);

    Ok(DecodedCertificate {
        der: block.contents.clone(),
        subject,
        not_after,
    })
}

/// Decode the first PEM private key block (PKCS#1, PKCS#8 or SEC1) in `pem`
pub fn decode_key(field: &str, pem: &[u8]) -> Result<DecodedKey, CodecError> {
    if pem.is_empty() {
        return Err(CodecError::new(field, "value is empty"));
    }

    let key = PrivateKeyDer::from_pem_slice(pem)
        .map_err(|e| CodecError::new(field, format!("invalid private key: {e}")))?;

    let format = match &key {
        PrivateKeyDer::Pkcs1(_) => KeyFormat::Pkcs1,
        PrivateKeyDer::Pkcs8(_) => KeyFormat::Pkcs8,
        PrivateKeyDer::Sec1(_) => KeyFormat::Sec1,
        _ => return Err(CodecError::new(field, "unsupported private key encoding")),
    };

    Ok(DecodedKey {
        der: Zeroizing::new(key.secret_der().to_vec()),
        format,
    })
}

/// Check a keystore or password field is present and non-empty
pub fn check_opaque(field: &str, value: &[u8]) -> Result<(), CodecError> {
    if value.is_empty() {
        return Err(CodecError::new(field, "value is empty"));
    }
    Ok(())
}

/// Encode DER certificate bytes as a PEM `CERTIFICATE` block
#[must_use]
pub fn encode_certificate(der: &[u8]) -> String {
    encode_pem("CERTIFICATE", der)
}

/// Encode DER private key bytes as PEM using the label matching `format`
#[must_use]
pub fn encode_key(format: KeyFormat, der: &[u8]) -> Zeroizing<String> {
    Zeroizing::new(encode_pem(format.pem_label(), der))
}

fn encode_pem(label: &str, der: &[u8]) -> String {
    let config = pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF);
    pem::encode_config(&pem::Pem::new(label, der), config)
}

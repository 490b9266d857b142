//! # Certificate Bundle
//!
//! The materialized identity handed back once a user's Secret is complete.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// PEM material for one user, plus the JKS artefacts when requested
///
/// Every field is wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct UserCertificate {
    pub ca: Vec<u8>,
    pub certificate: Vec<u8>,
    pub key: Vec<u8>,
    pub jks: Option<JksBundle>,
}

/// JKS keystore, truststore and the keystore password
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct JksBundle {
    pub keystore: Vec<u8>,
    pub truststore: Vec<u8>,
    pub password: Vec<u8>,
}

impl std::fmt::Debug for UserCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCertificate")
            .field("ca_len", &self.ca.len())
            .field("certificate_len", &self.certificate.len())
            .field("key", &"***")
            .field("jks", &self.jks)
            .finish()
    }
}

impl std::fmt::Debug for JksBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JksBundle")
            .field("keystore_len", &self.keystore.len())
            .field("truststore_len", &self.truststore.len())
            .field("password", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_key_and_password() {
        let bundle = UserCertificate {
            ca: b"ca".to_vec(),
            certificate: b"cert".to_vec(),
            key: b"super-secret-key".to_vec(),
            jks: Some(JksBundle {
                keystore: b"ks".to_vec(),
                truststore: b"ts".to_vec(),
                password: b"hunter2".to_vec(),
            }),
        };

        let rendered = format!("{bundle:?}");
        assert!(!rendered.contains("super-secret-key"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }
}

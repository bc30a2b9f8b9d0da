//! Shared-secret check for the ingress endpoint.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// SHA-256 digest of the configured ingress secret.
///
/// Supplied tokens are hashed and compared in constant time, so neither the
/// secret's length nor a matching prefix leaks through timing.
#[derive(Clone)]
pub struct IngressSecret {
    digest: [u8; 32],
}

impl IngressSecret {
    pub fn new(secret: &str) -> Self {
        Self { digest: Sha256::digest(secret.as_bytes()).into() }
    }

    pub fn verify(&self, supplied: &str) -> bool {
        let supplied: [u8; 32] = Sha256::digest(supplied.as_bytes()).into();
        self.digest[..].ct_eq(&supplied[..]).into()
    }
}

impl std::fmt::Debug for IngressSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("IngressSecret(***)")
    }
}

//! RSA PKCS#1 v1.5 signing for apk packages (spec §4.D).

use pkcs1::DecodeRsaPrivateKey;
use pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha1::Digest as _;
use sha2::Digest as _;

use crate::error::{PackagerError, Result};

/// Which hash `apk` expects the signature to be computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsaDigest {
    /// `.SIGN.RSA.<keyname>` — the historical, universally-supported form.
    Sha1,
    /// `.SIGN.RSA256.<keyname>` — opt-in; some older `apk` clients can't
    /// verify it.
    Sha256,
}

/// A loaded RSA private key plus the key name that becomes part of the
/// signature tar entry's filename.
pub struct RsaSigner {
    key: RsaPrivateKey,
    key_name: String,
}

impl RsaSigner {
    /// Parses a PEM-encoded RSA private key, trying PKCS#8 (optionally
    /// encrypted, when `passphrase` is given) and falling back to bare
    /// PKCS#1. Encrypted classic-OpenSSL PKCS#1 (`Proc-Type: ENCRYPTED`)
    /// is not supported; re-encode such keys as PKCS#8 first.
    pub fn load(pem: &str, key_name: impl Into<String>, passphrase: Option<&str>) -> Result<Self> {
        let key = match passphrase {
            Some(pass) => RsaPrivateKey::from_pkcs8_encrypted_pem(pem, pass)
                .map_err(|e| PackagerError::SigningFailure(format!("decrypting signing key: {e}")))?,
            None => RsaPrivateKey::from_pkcs8_pem(pem)
                .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
                .map_err(|e| PackagerError::SigningFailure(format!("parsing signing key: {e}")))?,
        };
        Ok(Self { key, key_name: key_name.into() })
    }

    /// Signs `message` with PKCS#1 v1.5 padding over the requested digest.
    pub fn sign(&self, digest: RsaDigest, message: &[u8]) -> Result<Vec<u8>> {
        let (padding, hashed) = match digest {
            RsaDigest::Sha1 => (Pkcs1v15Sign::new::<sha1::Sha1>(), sha1::Sha1::digest(message).to_vec()),
            RsaDigest::Sha256 => (Pkcs1v15Sign::new::<sha2::Sha256>(), sha2::Sha256::digest(message).to_vec()),
        };
        self.key
            .sign(padding, &hashed)
            .map_err(|e| PackagerError::SigningFailure(format!("signing control tarball: {e}")))
    }

    /// `.SIGN.RSA.<keyname>` or `.SIGN.RSA256.<keyname>`, the apk
    /// signature tar's sole entry name (spec §4.D, §4.G).
    #[must_use]
    pub fn entry_name(&self, digest: RsaDigest) -> String {
        match digest {
            RsaDigest::Sha1 => format!(".SIGN.RSA.{}", self.key_name),
            RsaDigest::Sha256 => format!(".SIGN.RSA256.{}", self.key_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_name_matches_digest_kind() {
        // A real signer needs a valid key to construct, so only the
        // naming convention is exercised here; round-trip signing is
        // covered by the apk emitter's integration tests.
        assert_eq!(
            RsaSigner { key: dummy_key(), key_name: "pkg@example.com".to_string() }.entry_name(RsaDigest::Sha1),
            ".SIGN.RSA.pkg@example.com"
        );
        assert_eq!(
            RsaSigner { key: dummy_key(), key_name: "pkg@example.com".to_string() }.entry_name(RsaDigest::Sha256),
            ".SIGN.RSA256.pkg@example.com"
        );
    }

    fn dummy_key() -> RsaPrivateKey {
        // A tiny key is fine here: this test never calls `sign`.
        RsaPrivateKey::new(&mut rand::thread_rng(), 512).expect("generating test key")
    }
}

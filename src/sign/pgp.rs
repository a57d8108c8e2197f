//! OpenPGP detached binary signatures for rpm and deb (spec §4.D).
//!
//! Grounded on the signature-*verification* helper in `paultag/deb-rs`'s
//! `control/openpgp.rs` (same crate, opposite direction): we load a
//! `Cert` the same way, but select a signing-capable secret key and
//! produce a signature instead of checking one.

use std::io::Write as _;

use sequoia_openpgp::cert::Cert;
use sequoia_openpgp::crypto::{KeyPair, Password};
use sequoia_openpgp::parse::Parse;
use sequoia_openpgp::policy::StandardPolicy;
use sequoia_openpgp::serialize::stream::{Message, Signer};

use crate::error::{PackagerError, Result};

/// A secret key selected for signing, plus the policy it was resolved
/// under (kept alive for the `StandardPolicy`'s lifetime in [`sign`]).
pub struct PgpSigner {
    keypair: KeyPair,
}

impl PgpSigner {
    /// Reads an ASCII-armored or binary OpenPGP secret keyring, picks the
    /// first entity with a signing-capable, non-revoked key, and decrypts
    /// it with `passphrase` if it isn't already unencrypted.
    pub fn load(keyring: &[u8], passphrase: Option<&str>) -> Result<Self> {
        let policy = StandardPolicy::new();
        let cert = Cert::from_bytes(keyring)
            .map_err(|e| PackagerError::SigningFailure(format!("parsing OpenPGP keyring: {e}")))?;

        let key = cert
            .keys()
            .with_policy(&policy, None)
            .supported()
            .alive()
            .revoked(false)
            .for_signing()
            .secret()
            .next()
            .ok_or_else(|| PackagerError::SigningFailure("keyring has no signing-capable secret key".to_string()))?
            .key()
            .clone();

        let keypair = if key.has_unencrypted_secret() {
            key.into_keypair()
        } else {
            let pass = passphrase
                .ok_or_else(|| PackagerError::SigningFailure("key is encrypted but no passphrase was supplied".to_string()))?;
            key.decrypt_secret(&Password::from(pass))
                .map_err(|e| PackagerError::SigningFailure(format!("wrong passphrase: {e}")))?
                .into_keypair()
        }
        .map_err(|e| PackagerError::SigningFailure(format!("key cannot sign: {e}")))?;

        Ok(Self { keypair })
    }

    /// Produces a detached binary OpenPGP signature over `message`.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        {
            let sink = Message::new(&mut out);
            let mut signer = Signer::new(sink, self.keypair.clone())
                .detached()
                .build()
                .map_err(|e| PackagerError::SigningFailure(format!("building signer: {e}")))?;
            signer
                .write_all(message)
                .map_err(|e| PackagerError::SigningFailure(format!("writing signed data: {e}")))?;
            signer
                .finalize()
                .map_err(|e| PackagerError::SigningFailure(format!("finalizing signature: {e}")))?;
        }
        Ok(out)
    }
}

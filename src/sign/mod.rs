//! Signing backends (spec §4.D): RSA-SHA1/SHA256 for apk, OpenPGP
//! detached signatures for rpm/deb.

pub mod pgp;
pub mod rsa;

pub use pgp::PgpSigner;
pub use rsa::{RsaDigest, RsaSigner};

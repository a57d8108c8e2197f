//! Apk emitter end-to-end tests (spec §8 scenarios 1, 3).

mod fixtures;

use std::io::Read;

use packager::model::Format;
use pkcs8::EncodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::Digest as _;

/// One gzip member found by walking the byte-concatenated apk envelope:
/// its compressed bytes (what a detached signature is computed over) and
/// its decompressed tar bytes (what we assert the contents of).
struct GzipMember {
    compressed: Vec<u8>,
    decompressed: Vec<u8>,
}

fn split_gzip_streams(mut bytes: &[u8]) -> Vec<GzipMember> {
    let mut members = Vec::new();
    while !bytes.is_empty() {
        let mut dec = flate2::read::GzDecoder::new(bytes);
        let mut decompressed = Vec::new();
        dec.read_to_end(&mut decompressed).unwrap();
        let consumed = bytes.len() - dec.into_inner().len();
        members.push(GzipMember {
            compressed: bytes[..consumed].to_vec(),
            decompressed,
        });
        bytes = &bytes[consumed..];
    }
    members
}

fn tar_first_entry_name(tar: &[u8]) -> String {
    String::from_utf8_lossy(&tar[0..100]).trim_end_matches('\0').to_string()
}

#[test]
fn scenario_1_minimal_apk_is_two_concatenated_gzips() {
    let scratch = fixtures::Scratch::new("apk-minimal");
    let pkg = fixtures::minimal_package(&scratch);

    let mut out = Vec::new();
    packager::formats::package(&pkg, Format::Apk, false, &mut out).unwrap();

    let members = split_gzip_streams(&out);
    assert_eq!(members.len(), 2, "no signing key configured: control + data only");

    let control = &members[0].decompressed;
    assert_eq!(tar_first_entry_name(control), ".PKGINFO");
    let pkginfo = String::from_utf8_lossy(&control[512..512 + 200]);
    assert!(pkginfo.contains("pkgname = foo\n"));
    assert!(pkginfo.contains("pkgver = 1.0.0\n"));
}

#[test]
fn scenario_3_apk_with_rsa_signature_verifies_against_the_public_key() {
    let scratch = fixtures::Scratch::new("apk-signed");
    let mut pkg = fixtures::minimal_package(&scratch);

    let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
    let public_key = RsaPublicKey::from(&private_key);
    let pem = private_key.to_pkcs8_pem(pkcs8::LineEnding::LF).unwrap();
    let key_path = scratch.write("key.rsa", pem.as_bytes());

    pkg.apk.key_path = Some(key_path);
    pkg.apk.key_name = Some("pkg@example.com".to_string());

    let mut out = Vec::new();
    packager::formats::package(&pkg, Format::Apk, false, &mut out).unwrap();

    let members = split_gzip_streams(&out);
    assert_eq!(members.len(), 3, "signing key configured: signature + control + data");

    let signature_tar = &members[0].decompressed;
    assert_eq!(tar_first_entry_name(signature_tar), ".SIGN.RSA.pkg@example.com");
    let size_field = String::from_utf8_lossy(&signature_tar[124..136]);
    let size = u64::from_str_radix(size_field.trim_end_matches('\0').trim(), 8).unwrap() as usize;
    let signature = &signature_tar[512..512 + size];

    // Spec §4.D: the signature is computed over the control tarball's
    // compressed bytes, not its decompressed tar content.
    let hashed = sha1::Sha1::digest(&members[1].compressed);
    public_key
        .verify(Pkcs1v15Sign::new::<sha1::Sha1>(), &hashed, signature)
        .expect("signature must verify against the control tarball's compressed bytes");
}

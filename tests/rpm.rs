//! Rpm emitter end-to-end tests (spec §8 scenarios 1, 4).

mod fixtures;

use std::collections::HashMap;

use packager::model::{ChangelogEntry, Format};

struct HeaderEntry {
    rtype: u32,
    offset: usize,
    count: u32,
}

struct Header {
    entries: HashMap<u32, HeaderEntry>,
    store_start: usize,
    /// Byte length of this region: 16-byte intro + index + store, with no
    /// outer padding applied. The signature header additionally gets
    /// zero-padded to an 8-byte boundary after this (see
    /// `signature_region_len`) so the main header that follows starts
    /// aligned; the main header itself has no such padding.
    unpadded_len: usize,
}

fn be32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes(bytes.try_into().unwrap())
}

/// Parses one RPM header region (signature or main) starting at `pos`.
fn parse_header(bytes: &[u8], pos: usize) -> Header {
    assert_eq!(&bytes[pos..pos + 4], &[0x8e, 0xad, 0xe8, 0x01]);
    let nindex = be32(&bytes[pos + 8..pos + 12]) as usize;
    let hsize = be32(&bytes[pos + 12..pos + 16]) as usize;
    let index_start = pos + 16;
    let store_start = index_start + nindex * 16;

    let mut entries = HashMap::new();
    for i in 0..nindex {
        let e = &bytes[index_start + i * 16..index_start + (i + 1) * 16];
        let tag = be32(&e[0..4]);
        let rtype = be32(&e[4..8]);
        let offset = be32(&e[8..12]) as usize;
        let count = be32(&e[12..16]);
        entries.insert(tag, HeaderEntry { rtype, offset, count });
    }

    Header {
        entries,
        store_start,
        unpadded_len: (store_start - pos) + hsize,
    }
}

/// The signature header is zero-padded after its store to an 8-byte
/// boundary, so the main header that immediately follows starts aligned
/// (`rpm.rs`'s `build_signature_header`).
fn signature_region_len(header: &Header) -> usize {
    (header.unpadded_len + 7) / 8 * 8
}

impl Header {
    fn string(&self, bytes: &[u8], tag: u32) -> String {
        let e = &self.entries[&tag];
        let start = self.store_start + e.offset;
        let end = bytes[start..].iter().position(|&b| b == 0).map(|p| start + p).unwrap();
        String::from_utf8_lossy(&bytes[start..end]).into_owned()
    }

    fn string_array(&self, bytes: &[u8], tag: u32) -> Vec<String> {
        let e = &self.entries[&tag];
        let mut pos = self.store_start + e.offset;
        let mut out = Vec::new();
        for _ in 0..e.count {
            let end = bytes[pos..].iter().position(|&b| b == 0).map(|p| pos + p).unwrap();
            out.push(String::from_utf8_lossy(&bytes[pos..end]).into_owned());
            pos = end + 1;
        }
        out
    }

    fn int32_array(&self, bytes: &[u8], tag: u32) -> Vec<i32> {
        let e = &self.entries[&tag];
        let mut pos = self.store_start + e.offset;
        let mut out = Vec::new();
        for _ in 0..e.count {
            out.push(i32::from_be_bytes(bytes[pos..pos + 4].try_into().unwrap()));
            pos += 4;
        }
        out
    }

    fn has(&self, tag: u32) -> bool {
        self.entries.contains_key(&tag)
    }
}

const RPMTAG_NAME: u32 = 1000;
const RPMTAG_SIZE: u32 = 1009;
const RPMTAG_FILEDIGESTS: u32 = 1035;
const RPMTAG_BASENAMES: u32 = 1117;
const RPMTAG_CHANGELOGTIME: u32 = 1080;
const RPMTAG_CHANGELOGNAME: u32 = 1081;
const RPMTAG_CHANGELOGTEXT: u32 = 1082;
const RPMSIGTAG_SIZE: u32 = 1000;
const RPMSIGTAG_MD5: u32 = 1004;

fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::Digest as _;
    let mut hasher = sha2::Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[test]
fn scenario_1_minimal_rpm_lead_and_headers() {
    let scratch = fixtures::Scratch::new("rpm-minimal");
    let pkg = fixtures::minimal_package(&scratch);

    let mut out = Vec::new();
    packager::formats::package(&pkg, Format::Rpm, false, &mut out).unwrap();

    // 96-byte lead, magic 0xedabeedb.
    assert_eq!(&out[0..4], &[0xed, 0xab, 0xee, 0xdb]);

    let sig_header = parse_header(&out, 96);
    assert!(sig_header.has(RPMSIGTAG_SIZE));
    assert!(sig_header.has(RPMSIGTAG_MD5));

    let main_start = 96 + signature_region_len(&sig_header);
    // The main header begins on an 8-byte boundary relative to the
    // signature header's end; rpm.rs pads `build_signature_header` to
    // guarantee this.
    assert_eq!(main_start % 8, 0);

    let main_header = parse_header(&out, main_start);
    assert_eq!(main_header.string(&out, RPMTAG_NAME), "foo");
    assert_eq!(main_header.int32_array(&out, RPMTAG_SIZE), vec![3]);

    // Implicit directories (/usr, /usr/bin) contribute their own
    // basenames entries alongside the file itself (spec §4.B, invariant
    // I4), so assert membership rather than exact equality.
    let basenames = main_header.string_array(&out, RPMTAG_BASENAMES);
    assert!(basenames.contains(&"hello".to_string()));

    let digests = main_header.string_array(&out, RPMTAG_FILEDIGESTS);
    assert!(digests.contains(&sha256_hex(b"hi\n")));
}

#[test]
fn scenario_4_changelog_entries_preserve_order_and_timestamps() {
    let scratch = fixtures::Scratch::new("rpm-changelog");
    let mut pkg = fixtures::minimal_package(&scratch);
    pkg.changelog = vec![
        ChangelogEntry { timestamp: 1_577_836_800, packager: "Jane Doe <jane@example.com>".to_string(), version: "1.0.0-1".to_string(), notes: vec!["Initial release".to_string()] },
        ChangelogEntry { timestamp: 1_580_515_200, packager: "Jane Doe <jane@example.com>".to_string(), version: "1.0.1-1".to_string(), notes: vec!["Bug fixes".to_string()] },
        ChangelogEntry { timestamp: 1_583_020_800, packager: "Jane Doe <jane@example.com>".to_string(), version: "1.0.2-1".to_string(), notes: vec!["More fixes".to_string()] },
    ];

    let mut out = Vec::new();
    packager::formats::package(&pkg, Format::Rpm, false, &mut out).unwrap();

    let sig_header = parse_header(&out, 96);
    let main_start = 96 + signature_region_len(&sig_header);
    let main_header = parse_header(&out, main_start);

    assert_eq!(
        main_header.int32_array(&out, RPMTAG_CHANGELOGTIME),
        vec![1_577_836_800i64 as i32, 1_580_515_200i64 as i32, 1_583_020_800i64 as i32]
    );
    assert_eq!(main_header.string_array(&out, RPMTAG_CHANGELOGNAME).len(), 3);
    assert_eq!(main_header.string_array(&out, RPMTAG_CHANGELOGTEXT).len(), 3);
    assert!(main_header.string_array(&out, RPMTAG_CHANGELOGNAME)[0].starts_with("* Wed Jan 01 2020"));
}

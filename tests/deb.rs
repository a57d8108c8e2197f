//! Deb emitter end-to-end tests (spec §8 scenarios 1, 5, 6).

mod fixtures;

use std::collections::HashMap;
use std::io::Read;

use packager::model::{ContentEntry, ContentType, Format};

/// Parses a BSD `ar` envelope into `(name, body)` pairs, trimming the
/// trailing-space padding `ar::append_member` pads names with.
fn parse_ar(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    assert_eq!(&bytes[0..8], b"!<arch>\n");
    let mut pos = 8;
    let mut members = Vec::new();
    while pos < bytes.len() {
        let header = &bytes[pos..pos + 60];
        let name = String::from_utf8_lossy(&header[0..16]).trim_end().to_string();
        let size: usize = String::from_utf8_lossy(&header[48..58]).trim().parse().unwrap();
        let body_start = pos + 60;
        let body = bytes[body_start..body_start + size].to_vec();
        members.push((name, body));
        pos = body_start + size;
        if size % 2 == 1 {
            pos += 1;
        }
    }
    members
}

fn xz_decompress(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    xz2::read::XzDecoder::new(bytes).read_to_end(&mut out).unwrap();
    out
}

/// Reads every regular-file tar entry into `path -> body`. Good enough for
/// assertions on a handful of small fixture entries; not a general tar
/// reader.
fn tar_entries(bytes: &[u8]) -> HashMap<String, Vec<u8>> {
    let mut out = HashMap::new();
    let mut pos = 0usize;
    while pos + 512 <= bytes.len() {
        let header = &bytes[pos..pos + 512];
        if header.iter().all(|&b| b == 0) {
            break;
        }
        let name = String::from_utf8_lossy(&header[0..100]).trim_end_matches('\0').to_string();
        let size_field = String::from_utf8_lossy(&header[124..136]);
        let size_str = size_field.trim_end_matches('\0').trim();
        let size = u64::from_str_radix(size_str, 8).unwrap_or(0) as usize;
        let body_start = pos + 512;
        let body = bytes[body_start..body_start + size].to_vec();
        out.insert(name, body);
        let padded = (size + 511) / 512 * 512;
        pos = body_start + padded;
    }
    out
}

#[test]
fn scenario_1_minimal_deb() {
    let scratch = fixtures::Scratch::new("deb-minimal");
    let pkg = fixtures::minimal_package(&scratch);

    let mut out = Vec::new();
    packager::formats::package(&pkg, Format::Deb, false, &mut out).unwrap();

    let members = parse_ar(&out);
    let names: Vec<&str> = members.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["debian-binary", "control.tar.xz", "data.tar.xz"]);

    assert_eq!(members[0].1, b"2.0\n");

    let control_tar = xz_decompress(&members[1].1);
    let control_files = tar_entries(&control_tar);
    let control = String::from_utf8(control_files["control"].clone()).unwrap();
    assert!(control.contains("Package: foo\n"));
    assert!(control.contains("Installed-Size: 1\n"));

    let md5sums = String::from_utf8(control_files["md5sums"].clone()).unwrap();
    assert_eq!(md5sums, "764efa883dda1e11db47671c4a3bbd9e  usr/bin/hello\n");

    let data_tar = xz_decompress(&members[2].1);
    let data_files = tar_entries(&data_tar);
    assert_eq!(data_files["./usr/bin/hello"], b"hi\n");
}

#[test]
fn scenario_5_collision_detection_fails_before_any_bytes_are_written() {
    let scratch = fixtures::Scratch::new("deb-collision");
    let a = scratch.write("a.conf", b"a");
    let b = scratch.write("b.conf", b"b");

    let mut pkg = fixtures::minimal_package(&scratch);
    pkg.contents.clear();
    pkg.contents.push(ContentEntry::new(a, "/etc/app.conf", ContentType::Config));
    pkg.contents.push(ContentEntry::new(b, "/etc/app.conf", ContentType::Config));

    let mut out = Vec::new();
    let result = packager::formats::package(&pkg, Format::Deb, false, &mut out);
    assert!(result.is_err());
    assert!(out.is_empty());
}

#[test]
fn scenario_6_reproducible_build_with_fixed_source_date_epoch() {
    let scratch = fixtures::Scratch::new("deb-repro");
    let pkg = fixtures::minimal_package(&scratch);

    let mut first = Vec::new();
    packager::formats::package(&pkg, Format::Deb, false, &mut first).unwrap();
    let mut second = Vec::new();
    packager::formats::package(&pkg, Format::Deb, false, &mut second).unwrap();

    assert_eq!(first, second);
}

#[test]
fn conventional_filename_matches_spec_table() {
    let scratch = fixtures::Scratch::new("deb-filename");
    let pkg = fixtures::minimal_package(&scratch);
    let normalized = packager::model::defaults::normalize(&pkg, Format::Deb).unwrap();
    assert_eq!(packager::formats::conventional_filename(&normalized), "foo_1.0.0_amd64.deb");
}

//! RPM package emitter (spec §4.F).
//!
//! An RPM file is four concatenated regions: a 96-byte lead, a signature
//! header, a main header, and a compressed CPIO payload. Both headers
//! share the same tagged-index encoding ([`HeaderBuilder`]); only the tag
//! numbers and the values stored under them differ.

use std::collections::BTreeMap;
use std::io::Write as _;

use crate::archive::compress::Compression;
use crate::archive::digest::{DigestSet, DigestWriter};
use crate::config;
use crate::error::Result;
use crate::formats::Emitter;
use crate::glob::{ContentSource, EmittedFile};
use crate::logging::info_archive_done;
use crate::model::{ContentType, Format, Lifecycle, NormalizedPackage, Overlay, VersionOperator};
use crate::sign::PgpSigner;

pub struct RpmEmitter;

impl Emitter for RpmEmitter {
    fn conventional_filename(&self, pkg: &NormalizedPackage) -> String {
        let (_, release) = pkg.version.rpm_version_release();
        format!("{}-{}-{}.{}.rpm", pkg.name, pkg.version.upstream, release, pkg.arch)
    }

    fn package(&self, pkg: &NormalizedPackage, contents: &[EmittedFile], sink: &mut dyn std::io::Write) -> Result<()> {
        let compression = pkg.rpm.compression.unwrap_or_else(|| Compression::default_for(Format::Rpm));

        let payload = build_cpio_payload(contents)?;
        let compressed_payload = compress_whole(compression, &payload)?;
        let header = build_header(pkg, contents, compression)?;

        let mut header_and_payload = Vec::with_capacity(header.len() + compressed_payload.len());
        header_and_payload.extend_from_slice(&header);
        header_and_payload.extend_from_slice(&compressed_payload);

        let mut md5_writer = DigestWriter::new(std::io::sink(), DigestSet { md5: true, sha1: false, sha256: false });
        md5_writer.write_all(&header_and_payload)?;
        let md5_hex = md5_writer.digests().md5_hex().expect("md5 requested");
        let md5_digest = hex_decode(&md5_hex);

        let mut sha256_writer = DigestWriter::new(std::io::sink(), DigestSet { md5: false, sha1: false, sha256: true });
        sha256_writer.write_all(&header)?;
        let sha256_hex = sha256_writer.digests().sha256_hex().expect("sha256 requested");

        let pgp_signature = match &pkg.rpm.signing_key_path {
            Some(path) => {
                let keyring = std::fs::read(path)?;
                let passphrase = config::passphrase(Format::Rpm.env_tag());
                let signer = PgpSigner::load(&keyring, passphrase.as_deref())?;
                Some(signer.sign(&header_and_payload)?)
            }
            None => None,
        };

        let signature_header = build_signature_header(header_and_payload.len() as u32, &md5_digest, &sha256_hex, pgp_signature.as_deref());

        write_lead(sink, pkg)?;
        sink.write_all(&signature_header)?;
        sink.write_all(&header)?;
        sink.write_all(&compressed_payload)?;

        info_archive_done!(Format::Rpm, header_and_payload.len());
        Ok(())
    }
}

fn compress_whole(compression: Compression, body: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut w = compression.writer(&mut out)?;
        w.write_all(body)?;
        w.finish_stream()?;
    }
    Ok(out)
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{b:02x}").expect("writing to a String never fails");
    }
    s
}

/// 96-byte historical lead, required by every RPM reader even though
/// modern tooling mostly ignores its contents (spec §4.F).
fn write_lead(sink: &mut dyn std::io::Write, pkg: &NormalizedPackage) -> Result<()> {
    let (upstream, release) = pkg.version.rpm_version_release();
    let mut lead = [0u8; 96];
    lead[0..4].copy_from_slice(&[0xed, 0xab, 0xee, 0xdb]);
    lead[4] = 3; // major
    lead[5] = 0; // minor
    lead[6..8].copy_from_slice(&0u16.to_be_bytes()); // type: binary
    lead[8..10].copy_from_slice(&1u16.to_be_bytes()); // archnum, historical
    let name = format!("{}-{upstream}-{release}", pkg.name);
    let name_bytes = name.as_bytes();
    let n = name_bytes.len().min(65);
    lead[10..10 + n].copy_from_slice(&name_bytes[..n]);
    lead[76..78].copy_from_slice(&1u16.to_be_bytes()); // osnum: linux
    lead[78..80].copy_from_slice(&5u16.to_be_bytes()); // signature_type
    sink.write_all(&lead)?;
    Ok(())
}

/// RPM's tagged-value store type codes (a subset of `rpmTagType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RpmType {
    Int16 = 3,
    Int32 = 4,
    String = 6,
    Bin = 7,
    StringArray = 8,
    I18nString = 9,
}

impl RpmType {
    fn alignment(self) -> usize {
        match self {
            RpmType::Int16 => 2,
            RpmType::Int32 => 4,
            _ => 1,
        }
    }
}

/// Accumulates tagged entries for one header (main or signature) and
/// serializes them per spec §4.F: a sorted index of (tag, type, offset,
/// count) descriptors followed by the packed data store.
#[derive(Default)]
struct HeaderBuilder {
    entries: Vec<(u32, RpmType, u32, Vec<u8>)>,
}

impl HeaderBuilder {
    fn push_int16(&mut self, tag: u32, values: &[u16]) {
        let mut data = Vec::with_capacity(values.len() * 2);
        for v in values {
            data.extend_from_slice(&v.to_be_bytes());
        }
        self.entries.push((tag, RpmType::Int16, values.len() as u32, data));
    }

    fn push_int32(&mut self, tag: u32, values: &[i32]) {
        let mut data = Vec::with_capacity(values.len() * 4);
        for v in values {
            data.extend_from_slice(&v.to_be_bytes());
        }
        self.entries.push((tag, RpmType::Int32, values.len() as u32, data));
    }

    fn push_string(&mut self, tag: u32, value: &str) {
        let mut data = value.as_bytes().to_vec();
        data.push(0);
        self.entries.push((tag, RpmType::String, 1, data));
    }

    fn push_i18n_string(&mut self, tag: u32, value: &str) {
        let mut data = value.as_bytes().to_vec();
        data.push(0);
        self.entries.push((tag, RpmType::I18nString, 1, data));
    }

    fn push_string_array(&mut self, tag: u32, values: &[String]) {
        if values.is_empty() {
            return;
        }
        let mut data = Vec::new();
        for v in values {
            data.extend_from_slice(v.as_bytes());
            data.push(0);
        }
        self.entries.push((tag, RpmType::StringArray, values.len() as u32, data));
    }

    fn push_bin(&mut self, tag: u32, value: &[u8]) {
        self.entries.push((tag, RpmType::Bin, value.len() as u32, value.to_vec()));
    }

    fn build(mut self) -> Vec<u8> {
        self.entries.sort_by_key(|e| e.0);

        let mut store = Vec::new();
        let mut index = Vec::new();
        for (tag, rpm_type, count, data) in &self.entries {
            let align = rpm_type.alignment();
            while store.len() % align != 0 {
                store.push(0);
            }
            let offset = store.len() as u32;
            store.extend_from_slice(data);
            index.push((*tag, *rpm_type as u32, offset, *count));
        }

        let mut out = Vec::new();
        out.extend_from_slice(&[0x8e, 0xad, 0xe8, 0x01]);
        out.extend_from_slice(&[0, 0, 0, 0]);
        out.extend_from_slice(&(index.len() as u32).to_be_bytes());
        out.extend_from_slice(&(store.len() as u32).to_be_bytes());
        for (tag, rtype, offset, count) in index {
            out.extend_from_slice(&tag.to_be_bytes());
            out.extend_from_slice(&rtype.to_be_bytes());
            out.extend_from_slice(&offset.to_be_bytes());
            out.extend_from_slice(&count.to_be_bytes());
        }
        out.extend_from_slice(&store);
        out
    }
}

// Main-header tag numbers, named after their real `rpmtag.h` constants.
const RPMTAG_HEADERI18NTABLE: u32 = 100;
const RPMTAG_NAME: u32 = 1000;
const RPMTAG_VERSION: u32 = 1001;
const RPMTAG_RELEASE: u32 = 1002;
const RPMTAG_EPOCH: u32 = 1003;
const RPMTAG_SUMMARY: u32 = 1004;
const RPMTAG_DESCRIPTION: u32 = 1005;
const RPMTAG_BUILDTIME: u32 = 1006;
const RPMTAG_BUILDHOST: u32 = 1007;
const RPMTAG_SIZE: u32 = 1009;
const RPMTAG_VENDOR: u32 = 1011;
const RPMTAG_LICENSE: u32 = 1014;
const RPMTAG_PACKAGER: u32 = 1015;
const RPMTAG_GROUP: u32 = 1016;
const RPMTAG_PREIN: u32 = 1023;
const RPMTAG_POSTIN: u32 = 1024;
const RPMTAG_PREUN: u32 = 1025;
const RPMTAG_POSTUN: u32 = 1026;
const RPMTAG_FILESIZES: u32 = 1028;
const RPMTAG_FILEMODES: u32 = 1030;
const RPMTAG_FILERDEVS: u32 = 1033;
const RPMTAG_FILEMTIMES: u32 = 1034;
const RPMTAG_FILEDIGESTS: u32 = 1035;
const RPMTAG_FILELINKTOS: u32 = 1036;
const RPMTAG_FILEFLAGS: u32 = 1037;
const RPMTAG_FILEUSERNAME: u32 = 1039;
const RPMTAG_FILEGROUPNAME: u32 = 1040;
const RPMTAG_PROVIDENAME: u32 = 1047;
const RPMTAG_REQUIREFLAGS: u32 = 1048;
const RPMTAG_REQUIRENAME: u32 = 1049;
const RPMTAG_REQUIREVERSION: u32 = 1050;
const RPMTAG_CONFLICTFLAGS: u32 = 1053;
const RPMTAG_CONFLICTNAME: u32 = 1054;
const RPMTAG_CONFLICTVERSION: u32 = 1055;
const RPMTAG_OS: u32 = 1021;
const RPMTAG_ARCH: u32 = 1022;
const RPMTAG_CHANGELOGTIME: u32 = 1080;
const RPMTAG_CHANGELOGNAME: u32 = 1081;
const RPMTAG_CHANGELOGTEXT: u32 = 1082;
const RPMTAG_PREINPROG: u32 = 1085;
const RPMTAG_POSTINPROG: u32 = 1086;
const RPMTAG_PREUNPROG: u32 = 1087;
const RPMTAG_POSTUNPROG: u32 = 1088;
const RPMTAG_OBSOLETENAME: u32 = 1090;
const RPMTAG_PROVIDEFLAGS: u32 = 1112;
const RPMTAG_PROVIDEVERSION: u32 = 1113;
const RPMTAG_OBSOLETEFLAGS: u32 = 1114;
const RPMTAG_OBSOLETEVERSION: u32 = 1115;
const RPMTAG_DIRINDEXES: u32 = 1116;
const RPMTAG_BASENAMES: u32 = 1117;
const RPMTAG_DIRNAMES: u32 = 1118;
const RPMTAG_PAYLOADFORMAT: u32 = 1124;
const RPMTAG_PAYLOADCOMPRESSOR: u32 = 1125;
const RPMTAG_PAYLOADFLAGS: u32 = 1126;
const RPMTAG_PRETRANS: u32 = 1151;
const RPMTAG_POSTTRANS: u32 = 1152;
const RPMTAG_PRETRANSPROG: u32 = 1153;
const RPMTAG_POSTTRANSPROG: u32 = 1154;
const RPMTAG_RECOMMENDNAME: u32 = 5046;
const RPMTAG_RECOMMENDVERSION: u32 = 5047;
const RPMTAG_RECOMMENDFLAGS: u32 = 5048;
const RPMTAG_SUGGESTNAME: u32 = 5049;
const RPMTAG_SUGGESTVERSION: u32 = 5050;
const RPMTAG_SUGGESTFLAGS: u32 = 5051;
const RPMTAG_FILEDIGESTALGO: u32 = 5011;

// Signature-header tag numbers (spec §4.F names these directly).
const RPMSIGTAG_SIZE: u32 = 1000;
const RPMSIGTAG_PGP: u32 = 1002;
const RPMSIGTAG_MD5: u32 = 1004;
const RPMSIGTAG_SHA256: u32 = 5092;

/// Dependency relational-operator bitmask (spec §4.F): bit 0x02 `LESS`,
/// 0x04 `GREATER`, 0x08 `EQUAL`.
fn dependency_flags(op: VersionOperator) -> i32 {
    match op {
        VersionOperator::Lt => 0x02,
        VersionOperator::Le => 0x02 | 0x08,
        VersionOperator::Eq => 0x08,
        VersionOperator::Ge => 0x04 | 0x08,
        VersionOperator::Gt => 0x04,
    }
}

fn push_overlay(builder: &mut HeaderBuilder, overlay: &Overlay, name_tag: u32, version_tag: u32, flags_tag: u32) {
    if overlay.is_empty() {
        return;
    }
    let names: Vec<String> = overlay.iter().map(|d| d.name.clone()).collect();
    let versions: Vec<String> = overlay.iter().map(|d| d.version.clone().unwrap_or_default()).collect();
    let flags: Vec<i32> = overlay
        .iter()
        .map(|d| d.operator.map(dependency_flags).unwrap_or(0))
        .collect();
    builder.push_string_array(name_tag, &names);
    builder.push_string_array(version_tag, &versions);
    builder.push_int32(flags_tag, &flags);
}

/// Splits `destination` into `(dirname-with-trailing-slash, basename)`.
fn split_path(destination: &str) -> (String, String) {
    let trimmed = destination.trim_start_matches('/');
    match trimmed.rsplit_once('/') {
        Some((dir, base)) => (format!("/{dir}/"), base.to_string()),
        None => ("/".to_string(), trimmed.to_string()),
    }
}

fn payload_compressor_name(compression: Compression) -> &'static str {
    match compression {
        Compression::Gzip { .. } => "gzip",
        Compression::Xz { .. } => "xz",
        Compression::Lzma { .. } => "lzma",
        Compression::Zstd { .. } => "zstd",
        Compression::None => "none",
    }
}

fn payload_flags(compression: Compression) -> &'static str {
    match compression {
        Compression::Gzip { .. } => "9",
        Compression::Xz { .. } => "6",
        Compression::Zstd { .. } => "19",
        Compression::Lzma { .. } => "6",
        Compression::None => "",
    }
}

fn build_header(pkg: &NormalizedPackage, contents: &[EmittedFile], compression: Compression) -> Result<Vec<u8>> {
    let mut b = HeaderBuilder::default();

    b.push_string_array(RPMTAG_HEADERI18NTABLE, &["C".to_string()]);

    let (upstream, release) = pkg.version.rpm_version_release();
    b.push_string(RPMTAG_NAME, &pkg.name);
    b.push_string(RPMTAG_VERSION, &upstream);
    b.push_string(RPMTAG_RELEASE, &release);
    if let Some(epoch) = pkg.version.epoch {
        b.push_int32(RPMTAG_EPOCH, &[epoch as i32]);
    }

    let summary = pkg.rpm.summary.clone().unwrap_or_else(|| pkg.description.lines().next().unwrap_or_default().to_string());
    b.push_i18n_string(RPMTAG_SUMMARY, &summary);
    b.push_i18n_string(RPMTAG_DESCRIPTION, &pkg.description);
    b.push_int32(RPMTAG_BUILDTIME, &[pkg.mtime as i32]);
    b.push_string(RPMTAG_BUILDHOST, "localhost");

    let total_size: u64 = contents.iter().filter(|e| e.is_regular()).map(|e| e.size).sum();
    b.push_int32(RPMTAG_SIZE, &[total_size as i32]);

    if let Some(vendor) = &pkg.vendor {
        b.push_string(RPMTAG_VENDOR, vendor);
    }
    if let Some(license) = &pkg.license {
        b.push_string(RPMTAG_LICENSE, license);
    }
    if !pkg.maintainer.is_empty() {
        b.push_string(RPMTAG_PACKAGER, &pkg.maintainer);
    }
    let group = pkg.rpm.group.clone().or_else(|| pkg.section.clone()).unwrap_or_else(|| "Unspecified".to_string());
    b.push_i18n_string(RPMTAG_GROUP, &group);

    b.push_string(RPMTAG_OS, "linux");
    b.push_string(RPMTAG_ARCH, &pkg.arch);

    for phase in Lifecycle::COMMON.into_iter().chain([Lifecycle::PreTrans, Lifecycle::PostTrans]) {
        let Some(path) = pkg.scripts.get(&phase) else { continue };
        let Some(tag_name) = phase.rpm_tag() else { continue };
        let body = std::fs::read_to_string(path)?;
        let (body_tag, prog_tag) = match tag_name {
            "pre" => (RPMTAG_PREIN, RPMTAG_PREINPROG),
            "post" => (RPMTAG_POSTIN, RPMTAG_POSTINPROG),
            "preun" => (RPMTAG_PREUN, RPMTAG_PREUNPROG),
            "postun" => (RPMTAG_POSTUN, RPMTAG_POSTUNPROG),
            "pretrans" => (RPMTAG_PRETRANS, RPMTAG_PRETRANSPROG),
            "posttrans" => (RPMTAG_POSTTRANS, RPMTAG_POSTTRANSPROG),
            _ => continue,
        };
        b.push_string(body_tag, &body);
        b.push_string(prog_tag, "/bin/sh");
    }

    push_overlay(&mut b, &pkg.depends, RPMTAG_REQUIRENAME, RPMTAG_REQUIREVERSION, RPMTAG_REQUIREFLAGS);
    push_overlay(&mut b, &pkg.conflicts, RPMTAG_CONFLICTNAME, RPMTAG_CONFLICTVERSION, RPMTAG_CONFLICTFLAGS);
    push_overlay(&mut b, &pkg.provides, RPMTAG_PROVIDENAME, RPMTAG_PROVIDEVERSION, RPMTAG_PROVIDEFLAGS);
    push_overlay(&mut b, &pkg.rpm.obsoletes, RPMTAG_OBSOLETENAME, RPMTAG_OBSOLETEVERSION, RPMTAG_OBSOLETEFLAGS);
    push_overlay(&mut b, &pkg.recommends, RPMTAG_RECOMMENDNAME, RPMTAG_RECOMMENDVERSION, RPMTAG_RECOMMENDFLAGS);
    push_overlay(&mut b, &pkg.suggests, RPMTAG_SUGGESTNAME, RPMTAG_SUGGESTVERSION, RPMTAG_SUGGESTFLAGS);

    if !pkg.changelog.is_empty() {
        let times: Vec<i32> = pkg.changelog.iter().map(|e| e.timestamp as i32).collect();
        let names: Vec<String> = pkg
            .changelog
            .iter()
            .map(|e| format!("{} {} - {}", changelog_date(e.timestamp), e.packager, e.version))
            .collect();
        let texts: Vec<String> = pkg.changelog.iter().map(|e| e.notes.join("\n")).collect();
        b.push_int32(RPMTAG_CHANGELOGTIME, &times);
        b.push_string_array(RPMTAG_CHANGELOGNAME, &names);
        b.push_string_array(RPMTAG_CHANGELOGTEXT, &texts);
    }

    // Per-file tags (spec §4.F): every EmittedFile contributes one entry
    // to each of these parallel arrays, in the same order.
    let mut dir_order: Vec<String> = Vec::new();
    let mut dir_indexes: BTreeMap<String, u32> = BTreeMap::new();
    let mut basenames = Vec::new();
    let mut dirindexes = Vec::new();
    let mut filesizes = Vec::new();
    let mut filemodes = Vec::new();
    let mut filemtimes = Vec::new();
    let mut filedigests = Vec::new();
    let mut filelinktos = Vec::new();
    let mut fileflags = Vec::new();
    let mut fileusers = Vec::new();
    let mut filegroups = Vec::new();

    for entry in contents {
        let (dir, base) = split_path(&entry.destination);
        let dir_index = *dir_indexes.entry(dir.clone()).or_insert_with(|| {
            dir_order.push(dir.clone());
            (dir_order.len() - 1) as u32
        });

        basenames.push(base);
        dirindexes.push(dir_index as i32);

        let mode_type_bits: u32 = match entry.kind {
            ContentType::Directory | ContentType::ImplicitDirectory => 0o040000,
            ContentType::Symlink => 0o120000,
            _ => 0o100000,
        };
        let mode = mode_type_bits | entry.file_info.mode.unwrap_or(0o644);
        filemodes.push(mode as u16);
        filemtimes.push(entry.file_info.mtime.unwrap_or(pkg.mtime) as i32);
        fileflags.push(entry.kind.rpm_flag_bits() as i32);
        fileusers.push(entry.file_info.owner.clone().unwrap_or_else(|| "root".to_string()));
        filegroups.push(entry.file_info.group.clone().unwrap_or_else(|| "root".to_string()));
        filelinktos.push(entry.link_target.clone().unwrap_or_default());

        match entry.kind {
            ContentType::Directory | ContentType::ImplicitDirectory | ContentType::Symlink | ContentType::Ghost => {
                filesizes.push(0);
                filedigests.push(String::new());
            }
            _ => {
                filesizes.push(entry.size as i32);
                filedigests.push(file_sha256(&entry.source)?);
            }
        }
    }

    b.push_string_array(RPMTAG_DIRNAMES, &dir_order);
    b.push_string_array(RPMTAG_BASENAMES, &basenames);
    b.push_int32(RPMTAG_DIRINDEXES, &dirindexes);
    b.push_int32(RPMTAG_FILESIZES, &filesizes);
    b.push_int16(RPMTAG_FILEMODES, &filemodes);
    b.push_int16(RPMTAG_FILERDEVS, &vec![0u16; contents.len()]);
    b.push_int32(RPMTAG_FILEMTIMES, &filemtimes);
    b.push_string_array(RPMTAG_FILEDIGESTS, &filedigests);
    b.push_string_array(RPMTAG_FILELINKTOS, &filelinktos);
    b.push_int32(RPMTAG_FILEFLAGS, &fileflags);
    b.push_string_array(RPMTAG_FILEUSERNAME, &fileusers);
    b.push_string_array(RPMTAG_FILEGROUPNAME, &filegroups);
    b.push_int32(RPMTAG_FILEDIGESTALGO, &[8]); // 8 = SHA256

    b.push_string(RPMTAG_PAYLOADFORMAT, "cpio");
    b.push_string(RPMTAG_PAYLOADCOMPRESSOR, payload_compressor_name(compression));
    b.push_string(RPMTAG_PAYLOADFLAGS, payload_flags(compression));

    Ok(b.build())
}

fn file_sha256(source: &ContentSource) -> Result<String> {
    let mut writer = DigestWriter::new(std::io::sink(), DigestSet { md5: false, sha1: false, sha256: true });
    if let ContentSource::Host(path) = source {
        let mut file = std::fs::File::open(path)?;
        std::io::copy(&mut file, &mut writer)?;
    }
    Ok(writer.digests().sha256_hex().expect("sha256 requested"))
}

fn changelog_date(timestamp: i64) -> String {
    const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    const MONTHS: [&str; 12] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];
    match time::OffsetDateTime::from_unix_timestamp(timestamp) {
        Ok(dt) => {
            let weekday = WEEKDAYS[dt.weekday().number_days_from_monday() as usize];
            let month = MONTHS[u8::from(dt.month()) as usize - 1];
            format!("* {weekday} {month} {:02} {}", dt.day(), dt.year())
        }
        Err(_) => String::new(),
    }
}

fn build_signature_header(size: u32, md5: &[u8], sha256_hex: &str, pgp: Option<&[u8]>) -> Vec<u8> {
    let mut b = HeaderBuilder::default();
    b.push_int32(RPMSIGTAG_SIZE, &[size as i32]);
    b.push_bin(RPMSIGTAG_MD5, md5);
    b.push_string(RPMSIGTAG_SHA256, sha256_hex);
    if let Some(sig) = pgp {
        b.push_bin(RPMSIGTAG_PGP, sig);
    }
    let mut out = b.build();
    // Signature header region is itself padded to an 8-byte boundary
    // within the file, per real `rpm` (it's followed immediately by the
    // unpadded main header).
    while out.len() % 8 != 0 {
        out.push(0);
    }
    out
}

/// Writes one "new ASCII" (`070701`) CPIO entry: a 110-byte ASCII-hex
/// header, the NUL-terminated name padded to a 4-byte boundary, then the
/// body padded the same way (spec §4.F).
fn write_cpio_entry(out: &mut Vec<u8>, ino: u32, mode: u32, mtime: i64, name: &str, body: &[u8]) {
    let namesize = name.len() as u32 + 1;
    let header = format!(
        "070701{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}",
        ino,
        mode,
        0u32, // uid
        0u32, // gid
        1u32, // nlink
        mtime.max(0) as u32,
        body.len() as u32,
        0u32, // devmajor
        0u32, // devminor
        0u32, // rdevmajor
        0u32, // rdevminor
        namesize,
        0u32, // check
    );
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(name.as_bytes());
    out.push(0);
    pad4(out, 110 + name.len() + 1);
    out.extend_from_slice(body);
    pad4(out, body.len());
}

fn pad4(out: &mut Vec<u8>, written: usize) {
    let rem = (4 - written % 4) % 4;
    out.extend(std::iter::repeat(0u8).take(rem));
}

fn build_cpio_payload(contents: &[EmittedFile]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut ino = 1u32;
    for entry in contents {
        if matches!(entry.kind, ContentType::Ghost) {
            continue;
        }
        let name = format!("./{}", entry.destination.trim_start_matches('/'));
        let mode_type_bits: u32 = match entry.kind {
            ContentType::Directory | ContentType::ImplicitDirectory => 0o040000,
            ContentType::Symlink => 0o120000,
            _ => 0o100000,
        };
        let mode = mode_type_bits | entry.file_info.mode.unwrap_or(0o644);

        match entry.kind {
            ContentType::Directory | ContentType::ImplicitDirectory => {
                write_cpio_entry(&mut out, ino, mode, entry.file_info.mtime.unwrap_or(0), &name, &[]);
            }
            ContentType::Symlink => {
                let target = entry.link_target.clone().unwrap_or_default();
                write_cpio_entry(&mut out, ino, mode, entry.file_info.mtime.unwrap_or(0), &name, target.as_bytes());
            }
            _ => {
                crate::logging::trace_file!(entry.destination, entry.size);
                let body = match &entry.source {
                    ContentSource::Host(path) => std::fs::read(path)?,
                    ContentSource::None => Vec::new(),
                };
                write_cpio_entry(&mut out, ino, mode, entry.file_info.mtime.unwrap_or(0), &name, &body);
            }
        }
        ino += 1;
    }
    write_cpio_entry(&mut out, ino, 0, 0, "TRAILER!!!", &[]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_flags_match_spec_table() {
        assert_eq!(dependency_flags(VersionOperator::Lt), 0x02);
        assert_eq!(dependency_flags(VersionOperator::Gt), 0x04);
        assert_eq!(dependency_flags(VersionOperator::Eq), 0x08);
        assert_eq!(dependency_flags(VersionOperator::Ge), 0x0c);
    }

    #[test]
    fn header_builder_sorts_by_tag_and_aligns_int32() {
        let mut b = HeaderBuilder::default();
        b.push_string(RPMTAG_NAME, "x"); // tag 1000, 1 byte + NUL unaligned
        b.push_int32(RPMTAG_EPOCH, &[7]); // tag 1003, needs 4-byte alignment
        let bytes = b.build();
        // nindex = 2, hsize recorded at offset 8..12
        assert_eq!(u32::from_be_bytes(bytes[8..12].try_into().unwrap()), 2);
    }

    #[test]
    fn changelog_dates_render_scenario_4_timestamps() {
        // Scenario 4: 2020-01-01, 2020-02-01, 2020-03-01.
        assert_eq!(changelog_date(1_577_836_800), "* Wed Jan 01 2020");
        assert_eq!(changelog_date(1_580_515_200), "* Sat Feb 01 2020");
        assert_eq!(changelog_date(1_583_020_800), "* Sun Mar 01 2020");
    }

    #[test]
    fn split_path_separates_dir_and_basename() {
        assert_eq!(split_path("/usr/bin/hello"), ("/usr/bin/".to_string(), "hello".to_string()));
        assert_eq!(split_path("/hello"), ("/".to_string(), "hello".to_string()));
    }

    #[test]
    fn cpio_trailer_entry_has_correct_magic() {
        let payload = build_cpio_payload(&[]).unwrap();
        assert_eq!(&payload[0..6], b"070701");
        assert!(String::from_utf8_lossy(&payload).contains("TRAILER!!!"));
    }
}

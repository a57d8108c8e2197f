//! Alpine package emitter (spec §4.G).
//!
//! An apk is three gzip streams concatenated: an optional detached
//! signature tarball, the control tarball (`.PKGINFO` plus scripts), and
//! the data tarball. The first two are "cut" — their tar stream omits
//! the trailing zero blocks, since only the outermost one needs them for
//! the concatenation to parse as a single archive.

use crate::archive::compress::Compression;
use crate::archive::digest::{DigestSet, DigestWriter};
use crate::archive::tar::{EntryMeta, EntryType, TarFormat, TarWriter};
use crate::config;
use crate::error::Result;
use crate::formats::Emitter;
use crate::glob::{ContentSource, EmittedFile};
use crate::logging::info_archive_done;
use crate::model::{ContentType, Format, Lifecycle, NormalizedPackage};
use crate::sign::{RsaDigest, RsaSigner};

pub struct ApkEmitter;

impl Emitter for ApkEmitter {
    fn conventional_filename(&self, pkg: &NormalizedPackage) -> String {
        format!("{}_{}_{}.apk", pkg.name, pkg.version.apk_string(), pkg.arch)
    }

    fn package(&self, pkg: &NormalizedPackage, contents: &[EmittedFile], sink: &mut dyn std::io::Write) -> Result<()> {
        let installed_size: u64 = contents.iter().filter(|e| e.is_regular()).map(|e| e.size).sum();
        let control_tar = build_control_tar(pkg, installed_size)?;
        let control_gz = gzip_cut(&control_tar)?;

        if let Some(key_path) = &pkg.apk.key_path {
            let key_name = pkg.apk.key_name.clone().unwrap_or_default();
            let pem = std::fs::read_to_string(key_path)?;
            let passphrase = config::passphrase(Format::Apk.env_tag());
            let signer = RsaSigner::load(&pem, key_name, passphrase.as_deref())?;
            let digest = if pkg.apk.signing_key_sha256 { RsaDigest::Sha256 } else { RsaDigest::Sha1 };
            let signature = signer.sign(digest, &control_gz)?;

            let mut sig_tar = TarWriter::new(Vec::new(), TarFormat::Ustar);
            let meta = file_entry(&signer.entry_name(digest), signature.len() as u64, 0o600, pkg.mtime);
            sig_tar.append(&meta, &signature[..])?;
            let sig_tar = sig_tar.into_inner();
            sink.write_all(&gzip_cut(&sig_tar)?)?;
        }

        sink.write_all(&control_gz)?;

        let data_tar = build_data_tar(pkg, contents)?;
        let data_gz = gzip_full(&data_tar)?;
        sink.write_all(&data_gz)?;

        info_archive_done!(Format::Apk, data_tar.len());
        Ok(())
    }
}

fn gzip_cut(tar_without_trailer: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut w = Compression::Gzip { level: 6 }.writer(&mut out)?;
        std::io::Write::write_all(&mut w, tar_without_trailer)?;
        w.finish_stream()?;
    }
    Ok(out)
}

fn gzip_full(tar_with_trailer: &[u8]) -> Result<Vec<u8>> {
    gzip_cut(tar_with_trailer)
}

fn file_entry(path: &str, size: u64, mode: u32, mtime: i64) -> EntryMeta {
    let mut meta = EntryMeta::new(path, EntryType::Regular);
    meta.size = size;
    meta.mode = mode;
    meta.mtime = mtime;
    meta
}

/// Renders `.PKGINFO`: key order is significant for byte-reproducibility
/// (spec §4.G).
fn render_pkginfo(pkg: &NormalizedPackage, installed_size: u64) -> String {
    let mut out = String::new();
    let mut push = |key: &str, value: &str| {
        out.push_str(key);
        out.push_str(" = ");
        out.push_str(value);
        out.push('\n');
    };

    push("pkgname", &pkg.name);
    push("pkgver", &pkg.version.apk_string());
    push("pkgdesc", pkg.description.lines().next().unwrap_or_default());
    if let Some(url) = &pkg.homepage {
        push("url", url);
    }
    push("builddate", &pkg.mtime.to_string());
    push("packager", &pkg.maintainer);
    push("size", &installed_size.to_string());
    push("arch", &pkg.arch);
    if let Some(origin) = &pkg.apk.origin {
        push("origin", origin);
    }
    if let Some(commit) = &pkg.apk.commit {
        push("commit", commit);
    }

    for dep in &pkg.depends {
        push("depend", &dep.to_string());
    }
    for dep in &pkg.provides {
        push("provides", &dep.to_string());
    }
    for dep in &pkg.replaces {
        push("replaces", &dep.to_string());
    }
    for dep in &pkg.conflicts {
        push("conflict", &dep.to_string());
    }
    if let Some(license) = &pkg.license {
        push("license", license);
    }

    out
}

fn build_control_tar(pkg: &NormalizedPackage, installed_size: u64) -> Result<Vec<u8>> {
    let mut tar = TarWriter::new(Vec::new(), TarFormat::Ustar);

    let pkginfo = render_pkginfo(pkg, installed_size);
    let meta = file_entry(".PKGINFO", pkginfo.len() as u64, 0o644, pkg.mtime);
    tar.append(&meta, pkginfo.as_bytes())?;

    for phase in Lifecycle::COMMON {
        let Some(path) = pkg.scripts.get(&phase) else { continue };
        let Some(name) = phase.apk_name() else { continue };
        let body = std::fs::read(path)?;
        let meta = file_entry(name, body.len() as u64, 0o755, pkg.mtime);
        tar.append(&meta, &body[..])?;
    }

    Ok(tar.into_inner())
}

fn build_data_tar(pkg: &NormalizedPackage, contents: &[EmittedFile]) -> Result<Vec<u8>> {
    let mut tar = TarWriter::new(Vec::new(), TarFormat::Pax);

    for entry in contents {
        let path = entry.destination.trim_start_matches('/').to_string();
        let mode = entry.file_info.mode.unwrap_or(0o644);
        let mtime = entry.file_info.mtime.unwrap_or(pkg.mtime);
        let uname = entry.file_info.owner.clone().unwrap_or_else(|| "root".to_string());
        let gname = entry.file_info.group.clone().unwrap_or_else(|| "root".to_string());

        match entry.kind {
            ContentType::Directory | ContentType::ImplicitDirectory => {
                let mut meta = EntryMeta::new(format!("{path}/"), EntryType::Directory);
                meta.mode = mode;
                meta.mtime = mtime;
                meta.uname = uname;
                meta.gname = gname;
                tar.append(&meta, std::io::empty())?;
            }
            ContentType::Symlink => {
                let mut meta = EntryMeta::new(path, EntryType::Symlink);
                meta.linkname = entry.link_target.clone();
                meta.mtime = mtime;
                meta.uname = uname;
                meta.gname = gname;
                tar.append(&meta, std::io::empty())?;
            }
            ContentType::Ghost => continue,
            _ => {
                let mut meta = EntryMeta::new(path, EntryType::Regular);
                meta.size = entry.size;
                meta.mode = mode;
                meta.mtime = mtime;
                meta.uname = uname;
                meta.gname = gname;
                crate::logging::trace_file!(entry.destination, entry.size);
                let body = match &entry.source {
                    ContentSource::Host(source) => std::fs::read(source)?,
                    ContentSource::None => Vec::new(),
                };
                meta.pax_records.insert("APK-TOOLS.checksum.SHA1".to_string(), sha1_hex(&body));
                tar.append(&meta, &body[..])?;
            }
        }
    }

    Ok(tar.finish()?)
}

fn sha1_hex(body: &[u8]) -> String {
    let mut writer = DigestWriter::new(std::io::sink(), DigestSet { md5: false, sha1: true, sha256: false });
    std::io::Write::write_all(&mut writer, body).expect("writing to io::sink never fails");
    writer.digests().sha1_hex().expect("sha1 requested")
}

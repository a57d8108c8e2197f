//! Debian package emitter (spec §4.E).

use crate::archive::ar;
use crate::archive::compress::Compression;
use crate::archive::digest::{DigestSet, DigestWriter};
use crate::archive::tar::{EntryMeta, EntryType, TarFormat, TarWriter};
use crate::config;
use crate::error::Result;
use crate::formats::Emitter;
use crate::glob::{ContentSource, EmittedFile};
use crate::logging::info_archive_done;
use crate::model::{ContentType, Format, Lifecycle, NormalizedPackage, TriggerVerb};
use crate::sign::PgpSigner;

pub struct DebEmitter;

impl Emitter for DebEmitter {
    fn conventional_filename(&self, pkg: &NormalizedPackage) -> String {
        format!("{}_{}_{}.deb", pkg.name, pkg.version.deb_string(), pkg.arch)
    }

    fn package(&self, pkg: &NormalizedPackage, contents: &[EmittedFile], sink: &mut dyn std::io::Write) -> Result<()> {
        let compression = pkg.deb.compression.unwrap_or_else(|| Compression::default_for(Format::Deb));

        let (md5sums, installed_size_kib) = compute_md5sums(contents)?;
        let control_tar = build_control_tar(pkg, contents, &md5sums, installed_size_kib)?;
        let control_member = compress_whole(compression, &control_tar)?;

        let data_tar = build_data_tar(pkg, contents)?;
        let data_member = compress_whole(compression, &data_tar)?;

        ar::write_magic(sink)?;
        ar::append_member(sink, "debian-binary", pkg.mtime, b"2.0\n")?;
        ar::append_member(sink, &format!("control.tar.{}", compression.extension()), pkg.mtime, &control_member)?;
        ar::append_member(sink, &format!("data.tar.{}", compression.extension()), pkg.mtime, &data_member)?;

        if let Some(key_path) = &pkg.deb.signing_key_path {
            let keyring = std::fs::read(key_path)?;
            let passphrase = config::passphrase(Format::Deb.env_tag());
            let signer = PgpSigner::load(&keyring, passphrase.as_deref())?;

            let mut signed_region = Vec::new();
            signed_region.extend_from_slice(b"2.0\n");
            signed_region.extend_from_slice(&control_member);
            signed_region.extend_from_slice(&data_member);
            let signature = signer.sign(&signed_region)?;
            ar::append_member(sink, "_gpgorigin", pkg.mtime, &signature)?;
        }

        info_archive_done!(Format::Deb, control_member.len() + data_member.len());
        Ok(())
    }
}

fn compress_whole(compression: Compression, body: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut w = compression.writer(&mut out)?;
        std::io::Write::write_all(&mut w, body)?;
        w.finish_stream()?;
    }
    Ok(out)
}

/// Returns `(md5sums text, Installed-Size in KiB rounded up)`.
fn compute_md5sums(contents: &[EmittedFile]) -> Result<(String, u64)> {
    let mut out = String::new();
    let mut total_bytes: u64 = 0;
    for entry in contents {
        if !entry.is_regular() {
            continue;
        }
        let digest = hash_source(&entry.source)?;
        total_bytes += entry.size;
        out.push_str(&digest);
        out.push_str("  ");
        out.push_str(entry.destination.trim_start_matches('/'));
        out.push('\n');
    }
    let kib = (total_bytes + 1023) / 1024;
    Ok((out, kib))
}

fn hash_source(source: &ContentSource) -> Result<String> {
    let mut writer = DigestWriter::new(std::io::sink(), DigestSet { md5: true, sha1: false, sha256: false });
    if let ContentSource::Host(path) = source {
        let mut file = std::fs::File::open(path)?;
        std::io::copy(&mut file, &mut writer)?;
    }
    Ok(writer.digests().md5_hex().expect("md5 requested"))
}

fn render_description(description: &str) -> String {
    let mut lines = description.lines();
    let mut out = String::new();
    if let Some(first) = lines.next() {
        out.push_str(first);
    }
    for line in lines {
        out.push('\n');
        if line.trim().is_empty() {
            out.push_str(" .");
        } else {
            out.push(' ');
            out.push_str(line);
        }
    }
    out
}

fn render_control(pkg: &NormalizedPackage, installed_size_kib: u64) -> String {
    let mut out = String::new();
    out.push_str(&format!("Package: {}\n", pkg.name));
    out.push_str(&format!("Version: {}\n", pkg.version.deb_string()));
    if let Some(section) = &pkg.section {
        out.push_str(&format!("Section: {section}\n"));
    }
    if let Some(priority) = &pkg.priority {
        out.push_str(&format!("Priority: {priority}\n"));
    }
    out.push_str(&format!("Architecture: {}\n", pkg.arch));
    out.push_str(&format!("Maintainer: {}\n", pkg.maintainer));
    out.push_str(&format!("Installed-Size: {installed_size_kib}\n"));

    push_overlay_line(&mut out, "Depends", &pkg.depends);
    push_overlay_line(&mut out, "Recommends", &pkg.recommends);
    push_overlay_line(&mut out, "Suggests", &pkg.suggests);
    push_overlay_line(&mut out, "Conflicts", &pkg.conflicts);
    push_overlay_line(&mut out, "Breaks", &pkg.deb.breaks);
    push_overlay_line(&mut out, "Replaces", &pkg.replaces);
    push_overlay_line(&mut out, "Provides", &pkg.provides);

    if let Some(homepage) = &pkg.homepage {
        out.push_str(&format!("Homepage: {homepage}\n"));
    }
    out.push_str(&format!("Description: {}\n", render_description(&pkg.description)));
    out
}

fn push_overlay_line(out: &mut String, tag: &str, overlay: &crate::model::Overlay) {
    if overlay.is_empty() {
        return;
    }
    let joined = overlay.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
    out.push_str(&format!("{tag}: {joined}\n"));
}

fn render_conffiles(contents: &[EmittedFile]) -> String {
    let mut out = String::new();
    for entry in contents {
        if matches!(entry.kind, ContentType::Config | ContentType::ConfigNoReplace) {
            out.push_str(&entry.destination);
            out.push('\n');
        }
    }
    out
}

fn render_triggers(pkg: &NormalizedPackage) -> Option<String> {
    if pkg.deb.triggers.is_empty() {
        return None;
    }
    let mut out = String::new();
    for trigger in &pkg.deb.triggers {
        let verb = match (trigger.verb, trigger.await_) {
            (TriggerVerb::Interest, true) => "interest",
            (TriggerVerb::Interest, false) => "interest-noawait",
            (TriggerVerb::Activate, true) => "activate",
            (TriggerVerb::Activate, false) => "activate-noawait",
        };
        out.push_str(&format!("{verb} {}\n", trigger.name));
    }
    Some(out)
}

fn render_changelog(pkg: &NormalizedPackage) -> Option<String> {
    if pkg.changelog.is_empty() {
        return None;
    }
    let mut out = String::new();
    for entry in &pkg.changelog {
        out.push_str(&format!("{} ({}) unstable; urgency=medium\n\n", pkg.name, entry.version));
        for note in &entry.notes {
            out.push_str(&format!("  * {note}\n"));
        }
        out.push('\n');
        let datetime = time::OffsetDateTime::from_unix_timestamp(entry.timestamp)
            .ok()
            .and_then(|dt| dt.format(&time::format_description::well_known::Rfc2822).ok())
            .unwrap_or_default();
        out.push_str(&format!(" -- {}  {datetime}\n\n", entry.packager));
    }
    Some(out)
}

fn build_control_tar(pkg: &NormalizedPackage, contents: &[EmittedFile], md5sums: &str, installed_size_kib: u64) -> Result<Vec<u8>> {
    let mut tar = TarWriter::new(Vec::new(), TarFormat::Gnu);

    let control = render_control(pkg, installed_size_kib);
    append_text(&mut tar, "control", &control, 0o644, pkg.mtime)?;
    append_text(&mut tar, "md5sums", md5sums, 0o644, pkg.mtime)?;

    let conffiles = render_conffiles(contents);
    if !conffiles.is_empty() {
        append_text(&mut tar, "conffiles", &conffiles, 0o644, pkg.mtime)?;
    }

    if let Some(triggers) = render_triggers(pkg) {
        append_text(&mut tar, "triggers", &triggers, 0o644, pkg.mtime)?;
    }

    for phase in Lifecycle::COMMON {
        if let Some(path) = pkg.scripts.get(&phase) {
            let name = phase.deb_name().expect("COMMON phases all have a deb name");
            let body = std::fs::read(path)?;
            let meta = file_entry(name, body.len() as u64, 0o755, pkg.mtime);
            tar.append(&meta, &body[..])?;
        }
    }

    Ok(tar.finish()?)
}

fn build_data_tar(pkg: &NormalizedPackage, contents: &[EmittedFile]) -> Result<Vec<u8>> {
    let mut tar = TarWriter::new(Vec::new(), TarFormat::Gnu);

    for entry in contents {
        let path = format!(".{}", entry.destination);
        let mode = entry.file_info.mode.unwrap_or(0o644);
        let mtime = entry.file_info.mtime.unwrap_or(pkg.mtime);
        let uname = entry.file_info.owner.clone().unwrap_or_else(|| "root".to_string());
        let gname = entry.file_info.group.clone().unwrap_or_else(|| "root".to_string());

        match entry.kind {
            ContentType::Directory | ContentType::ImplicitDirectory => {
                let mut meta = dir_entry(&path, mode, mtime);
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
            ContentType::Ghost => {
                // RPM-only content type; deb has no manifest-only entries.
                continue;
            }
            _ => {
                let mut meta = file_entry(&path, entry.size, mode, mtime);
                meta.uname = uname;
                meta.gname = gname;
                crate::logging::trace_file!(entry.destination, entry.size);
                match &entry.source {
                    ContentSource::Host(source) => {
                        let file = std::fs::File::open(source)?;
                        tar.append(&meta, file)?;
                    }
                    ContentSource::None => tar.append(&meta, std::io::empty())?,
                }
            }
        }
    }

    if let Some(changelog) = render_changelog(pkg) {
        let gz = gzip_bytes(changelog.as_bytes())?;
        let path = format!("./usr/share/doc/{}/changelog.gz", pkg.name);
        let meta = file_entry(&path, gz.len() as u64, 0o644, pkg.mtime);
        tar.append(&meta, &gz[..])?;
    }

    Ok(tar.finish()?)
}

fn gzip_bytes(body: &[u8]) -> Result<Vec<u8>> {
    compress_whole(Compression::Gzip { level: 9 }, body)
}

fn append_text<W: std::io::Write>(tar: &mut TarWriter<W>, name: &str, text: &str, mode: u32, mtime: i64) -> Result<()> {
    let meta = file_entry(name, text.len() as u64, mode, mtime);
    tar.append(&meta, text.as_bytes())?;
    Ok(())
}

fn file_entry(path: &str, size: u64, mode: u32, mtime: i64) -> EntryMeta {
    let mut meta = EntryMeta::new(path, EntryType::Regular);
    meta.size = size;
    meta.mode = mode;
    meta.mtime = mtime;
    meta
}

fn dir_entry(path: &str, mode: u32, mtime: i64) -> EntryMeta {
    let mut name = path.to_string();
    if !name.ends_with('/') {
        name.push('/');
    }
    let mut meta = EntryMeta::new(name, EntryType::Directory);
    meta.mode = mode;
    meta.mtime = mtime;
    meta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_formats_continuation_lines() {
        let rendered = render_description("Short summary\nFirst paragraph.\n\nSecond paragraph.");
        assert_eq!(rendered, "Short summary\n First paragraph.\n .\n Second paragraph.");
    }

    #[test]
    fn md5sums_strips_leading_slash() {
        let dir = std::env::temp_dir().join(format!("packager-deb-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("hello");
        std::fs::write(&file, b"hi\n").unwrap();

        let entries = vec![EmittedFile {
            destination: "/usr/bin/hello".to_string(),
            kind: ContentType::Regular,
            file_info: crate::model::FileInfo::default(),
            size: 3,
            source: ContentSource::Host(file),
            link_target: None,
        }];
        let (sums, kib) = compute_md5sums(&entries).unwrap();
        assert!(sums.ends_with("  usr/bin/hello\n"));
        assert_eq!(kib, 1);
    }
}

//! Arch Linux package emitter (spec §4.H).
//!
//! Output is a single zstd-compressed tar containing `.PKGINFO`, a
//! gzipped `.MTREE` manifest, an optional `.INSTALL` script, then the
//! file tree (directories, files, symlinks, each sorted by path).

use crate::archive::compress::Compression;
use crate::archive::digest::{DigestSet, DigestWriter};
use crate::archive::tar::{EntryMeta, EntryType, TarFormat, TarWriter};
use crate::error::Result;
use crate::formats::Emitter;
use crate::glob::{ContentSource, EmittedFile};
use crate::logging::info_archive_done;
use crate::model::{ContentType, Format, Lifecycle, NormalizedPackage};

pub struct ArchEmitter;

impl Emitter for ArchEmitter {
    fn conventional_filename(&self, pkg: &NormalizedPackage) -> String {
        format!("{}-{}-{}.pkg.tar.zst", pkg.name, pkg.version.arch_string(), pkg.arch)
    }

    fn package(&self, pkg: &NormalizedPackage, contents: &[EmittedFile], sink: &mut dyn std::io::Write) -> Result<()> {
        let installed_size: u64 = contents.iter().filter(|e| e.is_regular()).map(|e| e.size).sum();
        let pkginfo = render_pkginfo(pkg, installed_size);
        let mtree_gz = build_mtree(pkg, &pkginfo, contents)?;
        let install = render_install(pkg);

        let mut tar = TarWriter::new(Vec::new(), TarFormat::Gnu);

        let meta = file_entry(".PKGINFO", pkginfo.len() as u64, 0o644, pkg.mtime);
        tar.append(&meta, pkginfo.as_bytes())?;

        let meta = file_entry(".MTREE", mtree_gz.len() as u64, 0o644, pkg.mtime);
        tar.append(&meta, &mtree_gz[..])?;

        if let Some(install) = &install {
            let meta = file_entry(".INSTALL", install.len() as u64, 0o644, pkg.mtime);
            tar.append(&meta, install.as_bytes())?;
        }

        let mut sorted: Vec<&EmittedFile> = contents.iter().collect();
        sorted.sort_by(|a, b| content_order(a).cmp(&content_order(b)).then_with(|| a.destination.cmp(&b.destination)));

        for entry in sorted {
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

        let tar_bytes = tar.finish()?;
        let mut w = Compression::Zstd { level: 3 }.writer(sink)?;
        std::io::Write::write_all(&mut w, &tar_bytes)?;
        w.finish_stream()?;

        info_archive_done!(Format::Arch, tar_bytes.len());
        Ok(())
    }
}

fn content_order(entry: &EmittedFile) -> u8 {
    match entry.kind {
        ContentType::Directory | ContentType::ImplicitDirectory => 0,
        ContentType::Symlink => 2,
        _ => 1,
    }
}

fn file_entry(path: &str, size: u64, mode: u32, mtime: i64) -> EntryMeta {
    let mut meta = EntryMeta::new(path, EntryType::Regular);
    meta.size = size;
    meta.mode = mode;
    meta.mtime = mtime;
    meta
}

fn render_pkginfo(pkg: &NormalizedPackage, installed_size: u64) -> String {
    let mut out = String::new();
    let mut push = |key: &str, value: &str| {
        out.push_str(key);
        out.push_str(" = ");
        out.push_str(value);
        out.push('\n');
    };

    push("pkgname", &pkg.name);
    let pkgbase = pkg.arch_overrides.pkgbase.clone().unwrap_or_else(|| pkg.name.clone());
    push("pkgbase", &pkgbase);
    push("pkgver", &pkg.version.arch_string());
    push("pkgdesc", pkg.description.lines().next().unwrap_or_default());
    if let Some(url) = &pkg.homepage {
        push("url", url);
    }
    push("builddate", &pkg.mtime.to_string());
    push("packager", &pkg.maintainer);
    push("arch", &pkg.arch);
    if let Some(license) = &pkg.license {
        push("license", license);
    }
    push("size", &installed_size.to_string());

    for dep in &pkg.replaces {
        push("replaces", &dep.to_string());
    }
    for dep in &pkg.conflicts {
        push("conflict", &dep.to_string());
    }
    for dep in &pkg.provides {
        push("provides", &dep.to_string());
    }
    for dep in &pkg.depends {
        push("depend", &dep.to_string());
    }
    for path in &pkg.arch_overrides.backup {
        push("backup", path);
    }

    out
}

/// `.INSTALL`: one shell function per lifecycle phase Arch recognizes, in
/// the fixed order spec §4.H mandates. Omitted entirely if no scripts
/// were declared.
fn render_install(pkg: &NormalizedPackage) -> Option<String> {
    let mut out = String::new();
    let mut any = false;
    for phase in Lifecycle::ARCH_ORDER {
        let Some(path) = pkg.scripts.get(&phase) else { continue };
        let Some(function) = phase.arch_function() else { continue };
        let body = std::fs::read_to_string(path).ok()?;
        any = true;
        out.push_str(&format!("{function}() {{\n{body}\n}}\n\n"));
    }
    any.then_some(out)
}

/// `.MTREE`: gzipped, `#mtree` header, one line per entry with
/// `.PKGINFO` listed first (spec §4.H).
fn build_mtree(pkg: &NormalizedPackage, pkginfo: &str, contents: &[EmittedFile]) -> Result<Vec<u8>> {
    let mut out = String::new();
    out.push_str("#mtree\n");
    out.push_str(&mtree_line(".PKGINFO", pkg.mtime, 0o644, pkginfo.len() as u64, "file", Some(&digest_bytes(pkginfo.as_bytes())), None));

    for entry in contents {
        let path = format!("./{}", entry.destination.trim_start_matches('/'));
        let mode = entry.file_info.mode.unwrap_or(0o644);
        let mtime = entry.file_info.mtime.unwrap_or(pkg.mtime);

        match entry.kind {
            ContentType::Directory | ContentType::ImplicitDirectory => {
                out.push_str(&mtree_line(&path, mtime, mode, 0, "dir", None, None));
            }
            ContentType::Symlink => {
                out.push_str(&mtree_line(&path, mtime, mode, 0, "link", None, entry.link_target.as_deref()));
            }
            ContentType::Ghost => continue,
            _ => {
                let body = match &entry.source {
                    ContentSource::Host(source) => std::fs::read(source)?,
                    ContentSource::None => Vec::new(),
                };
                out.push_str(&mtree_line(&path, mtime, mode, entry.size, "file", Some(&digest_bytes(&body)), None));
            }
        }
    }

    let mut gz = Vec::new();
    {
        let mut w = Compression::Gzip { level: 6 }.writer(&mut gz)?;
        std::io::Write::write_all(&mut w, out.as_bytes())?;
        w.finish_stream()?;
    }
    Ok(gz)
}

struct Digests {
    md5: String,
    sha256: String,
}

fn digest_bytes(body: &[u8]) -> Digests {
    let mut writer = DigestWriter::new(std::io::sink(), DigestSet { md5: true, sha1: false, sha256: true });
    std::io::Write::write_all(&mut writer, body).expect("writing to io::sink never fails");
    let digests = writer.digests();
    Digests {
        md5: digests.md5_hex().expect("md5 requested"),
        sha256: digests.sha256_hex().expect("sha256 requested"),
    }
}

fn mtree_line(path: &str, mtime: i64, mode: u32, size: u64, kind: &str, digests: Option<&Digests>, link: Option<&str>) -> String {
    let mut line = format!("{path} time={mtime}.0 mode={mode:o} size={size} type={kind}");
    if let Some(d) = digests {
        line.push_str(&format!(" md5digest={} sha256digest={}", d.md5, d.sha256));
    }
    if let Some(target) = link {
        line.push_str(&format!(" link={target}"));
    }
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkginfo_contains_pkgbase_defaulted_to_name() {
        let mut pkg_raw = crate::model::Package::new("foo", "1.0.0");
        pkg_raw.arch = "x86_64".to_string();
        let normalized = crate::model::defaults::normalize(&pkg_raw, Format::Arch).unwrap();
        let rendered = render_pkginfo(&normalized, 0);
        assert!(rendered.contains("pkgbase = foo\n"));
    }

    #[test]
    fn mtree_starts_with_header_then_pkginfo() {
        let mut pkg_raw = crate::model::Package::new("foo", "1.0.0");
        pkg_raw.arch = "x86_64".to_string();
        let normalized = crate::model::defaults::normalize(&pkg_raw, Format::Arch).unwrap();
        let gz = build_mtree(&normalized, "pkgname = foo\n", &[]).unwrap();
        let mut dec = flate2::read::GzDecoder::new(&gz[..]);
        let mut text = String::new();
        std::io::Read::read_to_string(&mut dec, &mut text).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("#mtree"));
        assert!(lines.next().unwrap().starts_with(".PKGINFO"));
    }

    #[test]
    fn install_omitted_when_no_scripts() {
        let mut pkg_raw = crate::model::Package::new("foo", "1.0.0");
        pkg_raw.arch = "x86_64".to_string();
        let normalized = crate::model::defaults::normalize(&pkg_raw, Format::Arch).unwrap();
        assert!(render_install(&normalized).is_none());
    }
}

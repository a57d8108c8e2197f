//! Glob expansion and content resolution (spec §4.B).
//!
//! Turns the raw, possibly-glob-bearing [`ContentEntry`] list into a
//! sorted, collision-free [`EmittedFile`] list with implicit directories
//! synthesized for every file's ancestors.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::{PackagerError, Result};
use crate::model::{ContentEntry, ContentType, FileInfo, Format};

/// Where an [`EmittedFile`]'s bytes come from.
#[derive(Debug, Clone)]
pub enum ContentSource {
    /// Stream from this host path.
    Host(PathBuf),
    /// Symlink target text, directory, or ghost entry — no payload bytes.
    None,
}

/// An entry ready to be written into an archive (spec §3: "Emitted file").
#[derive(Debug, Clone)]
pub struct EmittedFile {
    /// Slash-delimited, anchored at `/`.
    pub destination: String,
    pub kind: ContentType,
    pub file_info: FileInfo,
    /// Byte size, already resolved (stat'd from the host file, taken from
    /// `file_info.size`, or `0` for directories/symlinks/ghosts).
    pub size: u64,
    pub source: ContentSource,
    /// Only present for [`ContentType::Symlink`] entries.
    pub link_target: Option<String>,
}

impl EmittedFile {
    #[must_use]
    pub fn is_regular(&self) -> bool {
        matches!(
            self.kind,
            ContentType::Regular | ContentType::Config | ContentType::ConfigNoReplace | ContentType::Doc | ContentType::License | ContentType::Readme
        )
    }
}

/// An expanded entry, before packager filtering, collision detection, and
/// implicit-directory synthesis.
#[derive(Debug, Clone)]
struct Expanded {
    destination: String,
    kind: ContentType,
    packager: Option<Format>,
    file_info: FileInfo,
    host_source: Option<PathBuf>,
    link_target: Option<String>,
}

/// Normalizes a destination to a slash-delimited path anchored at `/`.
fn anchor(destination: &str) -> String {
    let trimmed = destination.trim_start_matches('/');
    format!("/{trimmed}")
}

fn join_destination(base: &str, suffix: &str) -> String {
    let base = base.trim_end_matches('/');
    let suffix = suffix.trim_start_matches('/');
    if suffix.is_empty() {
        anchor(base)
    } else {
        anchor(&format!("{base}/{suffix}"))
    }
}

/// Expands `{a,b,c}` brace alternation by enumerating the cartesian
/// product of each group, since the `glob` crate has no native support
/// for it (spec §4.B step 2).
fn expand_braces(pattern: &str) -> Vec<String> {
    if let Some(open) = pattern.find('{') {
        if let Some(close) = pattern[open..].find('}').map(|i| i + open) {
            let prefix = &pattern[..open];
            let alternatives = &pattern[open + 1..close];
            let suffix = &pattern[close + 1..];
            let mut out = Vec::new();
            for alt in alternatives.split(',') {
                for rest in expand_braces(&format!("{prefix}{alt}{suffix}")) {
                    out.push(rest);
                }
            }
            return out;
        }
    }
    vec![pattern.to_string()]
}

fn is_glob_pattern(source: &str) -> bool {
    source.contains(['*', '?', '[', '{'])
}

fn resolve_host_pattern(source: &Path) -> PathBuf {
    let s = source.to_string_lossy();
    if let Some(rest) = s.strip_prefix("../") {
        if let Ok(cwd) = std::env::current_dir() {
            return cwd.join("..").join(rest).to_path_buf();
        }
    }
    source.to_path_buf()
}

/// Recursively collects every non-directory leaf under `root`.
fn walk_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    out.sort();
    Ok(out)
}

fn longest_common_prefix(paths: &[PathBuf]) -> PathBuf {
    if paths.is_empty() {
        return PathBuf::new();
    }
    let mut prefix: Vec<_> = paths[0].components().collect();
    for path in &paths[1..] {
        let components: Vec<_> = path.components().collect();
        let mut i = 0;
        while i < prefix.len() && i < components.len() && prefix[i] == components[i] {
            i += 1;
        }
        prefix.truncate(i);
    }
    prefix.iter().collect()
}

/// Expands one [`ContentEntry`]'s glob pattern(s) into zero or more
/// [`Expanded`] rows (spec §4.B steps 1-6).
fn expand_entry(entry: &ContentEntry, disable_globbing: bool) -> Result<Vec<Expanded>> {
    if matches!(entry.kind, ContentType::Symlink) {
        return Ok(vec![Expanded {
            destination: anchor(&entry.destination),
            kind: ContentType::Symlink,
            packager: entry.packager,
            file_info: entry.file_info.clone(),
            host_source: None,
            link_target: Some(entry.source.to_string_lossy().into_owned()),
        }]);
    }
    if matches!(entry.kind, ContentType::Ghost) {
        return Ok(vec![Expanded {
            destination: anchor(&entry.destination),
            kind: ContentType::Ghost,
            packager: entry.packager,
            file_info: entry.file_info.clone(),
            host_source: None,
            link_target: None,
        }]);
    }

    let source_str = entry.source.to_string_lossy().into_owned();

    if disable_globbing {
        // Source is matched literally, metacharacters and all.
        return Ok(vec![Expanded {
            destination: anchor(&entry.destination),
            kind: entry.kind,
            packager: entry.packager,
            file_info: entry.file_info.clone(),
            host_source: Some(entry.source.clone()),
            link_target: None,
        }]);
    }

    let mut matches: Vec<PathBuf> = Vec::new();
    for pattern in expand_braces(&source_str) {
        let resolved = resolve_host_pattern(Path::new(&pattern));
        let pattern_str = resolved.to_string_lossy().into_owned();
        let paths = glob::glob(&pattern_str)
            .map_err(|e| PackagerError::GlobNoMatch(format!("{pattern_str}: {e}")))?;
        for found in paths.flatten() {
            matches.push(found);
        }
    }
    matches.sort();
    matches.dedup();

    if matches.is_empty() {
        return Err(PackagerError::GlobNoMatch(source_str));
    }

    // Step 3: a single directory match whose source is not itself a glob
    // pattern is walked recursively.
    if matches.len() == 1 && matches[0].is_dir() && !is_glob_pattern(&source_str) {
        let root = &matches[0];
        let files = walk_files(root)?;
        return Ok(files
            .into_iter()
            .map(|path| {
                let rel = path.strip_prefix(root).unwrap_or(&path);
                let dest = join_destination(&entry.destination, &rel.to_string_lossy());
                Expanded {
                    destination: dest,
                    kind: ContentType::Regular,
                    packager: entry.packager,
                    file_info: entry.file_info.clone(),
                    host_source: Some(path.clone()),
                    link_target: None,
                }
            })
            .collect());
    }

    // Step 5: a single-file match with a trailing-slash destination keeps
    // the source's basename.
    if matches.len() == 1 {
        let path = &matches[0];
        let dest = if entry.destination.ends_with('/') {
            let basename = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            join_destination(&entry.destination, &basename)
        } else {
            anchor(&entry.destination)
        };
        return Ok(vec![Expanded {
            destination: dest,
            kind: entry.kind,
            packager: entry.packager,
            file_info: entry.file_info.clone(),
            host_source: Some(path.clone()),
            link_target: None,
        }]);
    }

    // Step 4: multiple matches share the destination prefix, keyed by the
    // longest common prefix of the matched paths.
    let prefix = longest_common_prefix(&matches);
    Ok(matches
        .into_iter()
        .map(|path| {
            let rel = path.strip_prefix(&prefix).unwrap_or(&path);
            let dest = join_destination(&entry.destination, &rel.to_string_lossy());
            Expanded {
                destination: dest,
                kind: entry.kind,
                packager: entry.packager,
                file_info: entry.file_info.clone(),
                host_source: Some(path),
                link_target: None,
            }
        })
        .collect())
}

/// Detects destination collisions across the *entire* expanded content
/// list (all packager restrictions included) per spec §4.B.
fn detect_collisions(expanded: &[Expanded]) -> Result<()> {
    let mut by_destination: HashMap<&str, Vec<&Expanded>> = HashMap::new();
    for e in expanded {
        by_destination.entry(e.destination.as_str()).or_default().push(e);
    }
    for (destination, group) in by_destination {
        if group.len() < 2 {
            continue;
        }
        let mut restrictions = Vec::new();
        for e in &group {
            match e.packager {
                Some(p) if !restrictions.contains(&Some(p)) => restrictions.push(Some(p)),
                Some(_) => {
                    return Err(PackagerError::Collision(destination.to_string()));
                }
                None => return Err(PackagerError::Collision(destination.to_string())),
            }
        }
    }
    Ok(())
}

/// Synthesizes a directory entry for every ancestor of `destination` not
/// already present in `covered` (spec §4.B, invariant I4).
fn synthesize_ancestors(destination: &str, covered: &mut BTreeMap<String, ()>, out: &mut Vec<Expanded>, package_mtime: i64) {
    let parts: Vec<&str> = destination.trim_start_matches('/').split('/').collect();
    let mut path = String::new();
    // Skip the last component: that's the file/dir itself, not an ancestor.
    for part in &parts[..parts.len().saturating_sub(1)] {
        path.push('/');
        path.push_str(part);
        if covered.contains_key(&path) {
            continue;
        }
        covered.insert(path.clone(), ());
        out.push(Expanded {
            destination: path.clone(),
            kind: ContentType::ImplicitDirectory,
            packager: None,
            file_info: FileInfo::implicit_directory(package_mtime),
            host_source: None,
            link_target: None,
        });
    }
}

fn sort_key(kind: ContentType) -> u8 {
    match kind {
        ContentType::ImplicitDirectory => 0,
        ContentType::Directory => 0,
        ContentType::Symlink => 2,
        ContentType::Ghost => 3,
        _ => 1,
    }
}

/// Resolves the full content list for one emission (spec §4.B).
///
/// `contents` is the *entire* raw content list, including entries
/// restricted to other packagers — collision detection needs to see all
/// of them. Only entries matching `format` (or unrestricted) survive into
/// the returned list.
pub fn resolve(
    contents: &[ContentEntry],
    disable_globbing: bool,
    format: Format,
    package_mtime: i64,
) -> Result<Vec<EmittedFile>> {
    let mut expanded = Vec::new();
    for entry in contents {
        if entry.is_host_file() {
            if !disable_globbing && !entry.source.exists() && !is_glob_pattern(&entry.source.to_string_lossy()) {
                return Err(PackagerError::MissingSource(entry.source.clone()));
            }
        }
        expanded.extend(expand_entry(entry, disable_globbing)?);
    }

    detect_collisions(&expanded)?;

    let mut filtered: Vec<Expanded> = expanded
        .into_iter()
        .filter(|e| matches!(e.packager, None) || e.packager == Some(format))
        .collect();

    let mut covered: BTreeMap<String, ()> = BTreeMap::new();
    for e in &filtered {
        covered.insert(e.destination.clone(), ());
    }
    let mut implicit = Vec::new();
    for e in &filtered {
        synthesize_ancestors(&e.destination, &mut covered, &mut implicit, package_mtime);
    }
    filtered.extend(implicit);

    filtered.sort_by(|a, b| {
        sort_key(a.kind)
            .cmp(&sort_key(b.kind))
            .then_with(|| a.host_source.cmp(&b.host_source))
            .then_with(|| a.destination.cmp(&b.destination))
    });

    filtered
        .into_iter()
        .map(|e| {
            let is_dir = e.kind.is_directory_like();
            let resolved = e.file_info.defaulted(is_dir, package_mtime);
            let size = match (&e.host_source, resolved.size_override) {
                (_, Some(sz)) => sz,
                (Some(path), None) => std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
                (None, None) => 0,
            };
            Ok(EmittedFile {
                destination: e.destination,
                kind: e.kind,
                file_info: FileInfo {
                    owner: Some(resolved.owner),
                    group: Some(resolved.group),
                    mode: Some(resolved.mode),
                    mtime: Some(resolved.mtime),
                    size: Some(size),
                },
                size,
                source: e
                    .host_source
                    .map(ContentSource::Host)
                    .unwrap_or(ContentSource::None),
                link_target: e.link_target,
            })
        })
        .collect()
}

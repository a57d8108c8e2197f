//! Owner/group/mode/mtime/size overrides for a content entry (spec §3,
//! §4.A(f): "defaulting missing `file_info` fields").

/// Per-entry file metadata. Any field left unset is defaulted during
/// glob resolution (spec §4.B) rather than at declaration time, since the
/// package-wide `mtime` default isn't known until normalization.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileInfo {
    pub owner: Option<String>,
    pub group: Option<String>,
    pub mode: Option<u32>,
    pub mtime: Option<i64>,
    /// Overrides the size that would otherwise be read from the host
    /// file; used for ghost entries and inline content.
    pub size: Option<u64>,
}

impl FileInfo {
    /// Owner/group/mode defaults used by synthesized implicit directories
    /// (spec §4.B: "mode `0755`, owner/group `root`").
    #[must_use]
    pub fn implicit_directory(mtime: i64) -> Self {
        Self {
            owner: Some("root".to_string()),
            group: Some("root".to_string()),
            mode: Some(0o755),
            mtime: Some(mtime),
            size: None,
        }
    }

    /// Fills in any unset field from the package-wide defaults: root:root
    /// ownership, mode `0644` for regular files (`0755` for directories),
    /// and the package `mtime`.
    #[must_use]
    pub fn defaulted(&self, is_dir: bool, package_mtime: i64) -> ResolvedFileInfo {
        ResolvedFileInfo {
            owner: self.owner.clone().unwrap_or_else(|| "root".to_string()),
            group: self.group.clone().unwrap_or_else(|| "root".to_string()),
            mode: self.mode.unwrap_or(if is_dir { 0o755 } else { 0o644 }),
            mtime: self.mtime.unwrap_or(package_mtime),
            size_override: self.size,
        }
    }
}

/// [`FileInfo`] with every field defaulted; what the glob resolver hands
/// to an emitter for each file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFileInfo {
    pub owner: String,
    pub group: String,
    pub mode: u32,
    pub mtime: i64,
    pub size_override: Option<u64>,
}

//! The package description (spec §3: "Data model").
//!
//! [`Package`] is the root entity a caller builds up and hands to a
//! selected [`Emitter`](crate::formats::Emitter). It is mutable and
//! unvalidated; [`crate::model::defaults::normalize`] turns it into an
//! immutable [`NormalizedPackage`] once per emission.

pub mod defaults;
pub mod fileinfo;
pub mod version;

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

pub use fileinfo::FileInfo;
pub use version::Version;

/// One of the four package formats this crate emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Deb,
    Rpm,
    Apk,
    Arch,
}

impl Format {
    pub const ALL: [Format; 4] = [Format::Deb, Format::Rpm, Format::Apk, Format::Arch];

    /// Short tag used in environment variable names (`NFPM_<FORMAT>_PASSPHRASE`)
    /// and log fields.
    #[must_use]
    pub fn env_tag(self) -> &'static str {
        match self {
            Format::Deb => "DEB",
            Format::Rpm => "RPM",
            Format::Apk => "APK",
            Format::Arch => "ARCH",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Deb => "deb",
            Format::Rpm => "rpm",
            Format::Apk => "apk",
            Format::Arch => "arch",
        })
    }
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "deb" => Ok(Format::Deb),
            "rpm" => Ok(Format::Rpm),
            "apk" => Ok(Format::Apk),
            "arch" | "archlinux" | "pacman" => Ok(Format::Arch),
            other => Err(format!("unknown package format: {other}")),
        }
    }
}

/// A package dependency reference used by every overlay set (depends,
/// conflicts, provides, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub name: String,
    pub version: Option<String>,
    pub operator: Option<VersionOperator>,
}

impl Dependency {
    #[must_use]
    pub fn name_only(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            operator: None,
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let (Some(op), Some(ver)) = (&self.operator, &self.version) {
            write!(f, " ({op} {ver})")?;
        }
        Ok(())
    }
}

/// Relational operator on a dependency's version, mirroring RPM's
/// `LESS`/`GREATER`/`EQUAL` dependency flag bits (spec §4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionOperator {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
}

impl fmt::Display for VersionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VersionOperator::Lt => "<<",
            VersionOperator::Le => "<=",
            VersionOperator::Eq => "=",
            VersionOperator::Ge => ">=",
            VersionOperator::Gt => ">>",
        })
    }
}

/// An insertion-ordered, deduplicated collection of [`Dependency`] values.
///
/// Spec §4.A(d): "discarding duplicate overlay entries while preserving
/// first-seen order". A plain `IndexSet` crate would do this in one line,
/// but the one extra dependency isn't worth it for a single small type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overlay {
    order: Vec<Dependency>,
    seen: HashSet<Dependency>,
}

impl Overlay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, dep: Dependency) {
        if self.seen.insert(dep.clone()) {
            self.order.push(dep);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dependency> {
        self.order.iter()
    }
}

impl FromIterator<Dependency> for Overlay {
    fn from_iter<T: IntoIterator<Item = Dependency>>(iter: T) -> Self {
        let mut overlay = Self::new();
        for dep in iter {
            overlay.push(dep);
        }
        overlay
    }
}

impl<'a> IntoIterator for &'a Overlay {
    type Item = &'a Dependency;
    type IntoIter = std::slice::Iter<'a, Dependency>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.iter()
    }
}

/// Lifecycle phase a maintainer script runs at (spec §3: "script paths").
///
/// Deb and APK only use the first four; RPM adds `PreTrans`/`PostTrans`;
/// Arch adds `PreUpgrade`/`PostUpgrade`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    PreInstall,
    PostInstall,
    PreRemove,
    PostRemove,
    PreTrans,
    PostTrans,
    PreUpgrade,
    PostUpgrade,
}

impl Lifecycle {
    pub const COMMON: [Lifecycle; 4] = [
        Lifecycle::PreInstall,
        Lifecycle::PostInstall,
        Lifecycle::PreRemove,
        Lifecycle::PostRemove,
    ];

    #[must_use]
    pub fn deb_name(self) -> Option<&'static str> {
        match self {
            Lifecycle::PreInstall => Some("preinst"),
            Lifecycle::PostInstall => Some("postinst"),
            Lifecycle::PreRemove => Some("prerm"),
            Lifecycle::PostRemove => Some("postrm"),
            _ => None,
        }
    }

    #[must_use]
    pub fn rpm_tag(self) -> Option<&'static str> {
        match self {
            Lifecycle::PreInstall => Some("pre"),
            Lifecycle::PostInstall => Some("post"),
            Lifecycle::PreRemove => Some("preun"),
            Lifecycle::PostRemove => Some("postun"),
            Lifecycle::PreTrans => Some("pretrans"),
            Lifecycle::PostTrans => Some("posttrans"),
            _ => None,
        }
    }

    #[must_use]
    pub fn apk_name(self) -> Option<&'static str> {
        match self {
            Lifecycle::PreInstall => Some(".pre-install"),
            Lifecycle::PostInstall => Some(".post-install"),
            Lifecycle::PreRemove => Some(".pre-deinstall"),
            Lifecycle::PostRemove => Some(".post-deinstall"),
            _ => None,
        }
    }

    /// Name of the shell function Arch's `.INSTALL` file defines for this
    /// phase, and its position in the fixed ordering spec §4.H mandates.
    #[must_use]
    pub fn arch_function(self) -> Option<&'static str> {
        match self {
            Lifecycle::PreInstall => Some("pre_install"),
            Lifecycle::PostInstall => Some("post_install"),
            Lifecycle::PreUpgrade => Some("pre_upgrade"),
            Lifecycle::PostUpgrade => Some("post_upgrade"),
            Lifecycle::PreRemove => Some("pre_remove"),
            Lifecycle::PostRemove => Some("post_remove"),
            _ => None,
        }
    }

    /// Fixed order `.INSTALL` lists functions in, per spec §4.H.
    pub const ARCH_ORDER: [Lifecycle; 6] = [
        Lifecycle::PreInstall,
        Lifecycle::PostInstall,
        Lifecycle::PreUpgrade,
        Lifecycle::PostUpgrade,
        Lifecycle::PreRemove,
        Lifecycle::PostRemove,
    ];
}

/// A user-declared inclusion: source (host) -> destination (in-package).
///
/// See spec §3 "Content entry" for the full invariant list (I1-I4).
#[derive(Debug, Clone)]
pub struct ContentEntry {
    /// Host path, possibly containing glob metacharacters. For a symlink
    /// entry this is the link target instead (invariant I2).
    pub source: PathBuf,
    /// Slash-delimited POSIX path inside the package, anchored at `/`.
    pub destination: String,
    pub kind: ContentType,
    /// If set, this entry is only emitted when the current emitter's
    /// format matches.
    pub packager: Option<Format>,
    pub file_info: FileInfo,
}

impl ContentEntry {
    #[must_use]
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<String>, kind: ContentType) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            kind,
            packager: None,
            file_info: FileInfo::default(),
        }
    }

    #[must_use]
    pub fn restricted_to(mut self, format: Format) -> Self {
        self.packager = Some(format);
        self
    }

    #[must_use]
    pub fn with_file_info(mut self, info: FileInfo) -> Self {
        self.file_info = info;
        self
    }

    #[must_use]
    pub fn is_host_file(&self) -> bool {
        !matches!(self.kind, ContentType::Symlink | ContentType::Ghost)
    }
}

/// Closed set of content entry types (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Regular,
    Config,
    ConfigNoReplace,
    Symlink,
    Directory,
    /// Never authored by the user; synthesized by glob resolution
    /// (invariant I4).
    ImplicitDirectory,
    /// RPM-only: a manifest entry with no payload (invariant I3).
    Ghost,
    Doc,
    License,
    Readme,
    /// Source is a directory to walk.
    Tree,
}

impl ContentType {
    #[must_use]
    pub fn is_directory_like(self) -> bool {
        matches!(self, ContentType::Directory | ContentType::ImplicitDirectory)
    }

    /// RPM file-flag bitmask contribution for this content type (spec §4.F).
    #[must_use]
    pub fn rpm_flag_bits(self) -> u32 {
        match self {
            ContentType::Config => 1,
            ContentType::Doc => 2,
            ContentType::ConfigNoReplace => 1 | 16,
            ContentType::Ghost => 64,
            ContentType::License => 128,
            ContentType::Readme => 256,
            _ => 0,
        }
    }
}

/// Per-format sub-record holding fields only that format understands
/// (spec §3). Overrides win over common fields when non-empty (spec §9
/// Open Question 2).
#[derive(Debug, Clone, Default)]
pub struct DebOverrides {
    pub maintainer: Option<String>,
    pub section: Option<String>,
    pub breaks: Overlay,
    pub triggers: Vec<Trigger>,
    pub compression: Option<crate::archive::compress::Compression>,
    /// Path to an OpenPGP secret keyring; if set, the emitter appends a
    /// detached `_gpgorigin` signature over `debian-binary` + both tar
    /// members (spec §4.D).
    pub signing_key_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Trigger {
    pub verb: TriggerVerb,
    pub name: String,
    pub await_: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerVerb {
    Interest,
    Activate,
}

#[derive(Debug, Clone, Default)]
pub struct RpmOverrides {
    pub group: Option<String>,
    pub obsoletes: Overlay,
    pub summary: Option<String>,
    pub packager: Option<String>,
    pub compression: Option<crate::archive::compress::Compression>,
    /// Path to an OpenPGP secret keyring; if set, `RPMSIGTAG_PGP` is
    /// populated with a detached signature over header+payload.
    pub signing_key_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ChangelogEntry {
    pub timestamp: i64,
    pub packager: String,
    pub version: String,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ApkOverrides {
    pub key_name: Option<String>,
    pub key_path: Option<PathBuf>,
    pub signing_key_sha256: bool,
    pub origin: Option<String>,
    pub commit: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ArchOverrides {
    pub pkgbase: Option<String>,
    pub packager: Option<String>,
    pub backup: Vec<String>,
}

/// The root package description (spec §3).
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    /// Raw version string, parsed into a [`Version`] during normalization.
    pub version: String,
    /// Logical architecture tag (spec §6 left column), e.g. `"amd64"`.
    pub arch: String,
    /// Almost always `"linux"`; normalization rejects any other value.
    pub platform: Option<String>,
    pub description: String,
    pub homepage: Option<String>,
    pub maintainer: Option<String>,
    pub vendor: Option<String>,
    pub license: Option<String>,
    pub section: Option<String>,
    pub priority: Option<String>,
    /// Source date epoch for this package; defaults from the environment
    /// when unset (spec §6).
    pub mtime: Option<i64>,

    pub depends: Overlay,
    pub recommends: Overlay,
    pub suggests: Overlay,
    pub conflicts: Overlay,
    pub replaces: Overlay,
    pub provides: Overlay,

    /// Shared between the deb and rpm emitters (spec §4.E, §4.F); arch
    /// and apk don't render one.
    pub changelog: Vec<ChangelogEntry>,

    pub deb: DebOverrides,
    pub rpm: RpmOverrides,
    pub apk: ApkOverrides,
    pub arch_overrides: ArchOverrides,

    pub scripts: std::collections::HashMap<Lifecycle, PathBuf>,
    pub contents: Vec<ContentEntry>,
}

impl Package {
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            arch: String::new(),
            platform: None,
            description: String::new(),
            homepage: None,
            maintainer: None,
            vendor: None,
            license: None,
            section: None,
            priority: None,
            mtime: None,
            depends: Overlay::new(),
            recommends: Overlay::new(),
            suggests: Overlay::new(),
            conflicts: Overlay::new(),
            replaces: Overlay::new(),
            provides: Overlay::new(),
            changelog: Vec::new(),
            deb: DebOverrides::default(),
            rpm: RpmOverrides::default(),
            apk: ApkOverrides::default(),
            arch_overrides: ArchOverrides::default(),
            scripts: std::collections::HashMap::new(),
            contents: Vec::new(),
        }
    }
}

/// The immutable, format-resolved view of a [`Package`] (spec §3:
/// "the model is immutable once normalized").
///
/// Produced by [`defaults::normalize`]. Content resolution (spec §4.B) is a
/// separate step performed by [`crate::glob::resolve`], since it additionally
/// needs the "disable globbing" flag and touches the host filesystem.
#[derive(Debug, Clone)]
pub struct NormalizedPackage {
    pub format: Format,
    pub name: String,
    pub version: Version,
    pub arch: String,
    pub description: String,
    pub homepage: Option<String>,
    pub maintainer: String,
    pub vendor: Option<String>,
    pub license: Option<String>,
    pub section: Option<String>,
    pub priority: Option<String>,
    pub mtime: i64,

    pub depends: Overlay,
    pub recommends: Overlay,
    pub suggests: Overlay,
    pub conflicts: Overlay,
    pub replaces: Overlay,
    pub provides: Overlay,

    pub changelog: Vec<ChangelogEntry>,

    pub deb: DebOverrides,
    pub rpm: RpmOverrides,
    pub apk: ApkOverrides,
    pub arch_overrides: ArchOverrides,

    pub scripts: std::collections::HashMap<Lifecycle, PathBuf>,
    pub contents: Vec<ContentEntry>,
}

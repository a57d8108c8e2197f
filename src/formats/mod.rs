//! Format-specific emitters (spec §4.E-§4.H) and the single public entry
//! point that ties normalization, content resolution, and emission
//! together (spec §5, §9 "Polymorphic emitters").

pub mod apk;
pub mod arch;
pub mod deb;
pub mod rpm;

use std::io::Write;

use enum_dispatch::enum_dispatch;

use crate::error::Result;
use crate::glob::{self, EmittedFile};
use crate::model::{defaults, Format, NormalizedPackage, Package};

/// A format-specific backend that turns a normalized package plus its
/// resolved content list into bytes.
#[enum_dispatch]
pub trait Emitter {
    /// `<name>_<version>_<arch>.deb`-style conventional output name.
    fn conventional_filename(&self, pkg: &NormalizedPackage) -> String;

    /// Writes the archive to `sink`. `contents` has already been through
    /// [`crate::glob::resolve`] for this emitter's format.
    fn package(&self, pkg: &NormalizedPackage, contents: &[EmittedFile], sink: &mut dyn Write) -> Result<()>;
}

#[enum_dispatch(Emitter)]
pub enum AnyEmitter {
    Deb(deb::DebEmitter),
    Rpm(rpm::RpmEmitter),
    Apk(apk::ApkEmitter),
    Arch(arch::ArchEmitter),
}

fn emitter_for(format: Format) -> AnyEmitter {
    match format {
        Format::Deb => AnyEmitter::Deb(deb::DebEmitter),
        Format::Rpm => AnyEmitter::Rpm(rpm::RpmEmitter),
        Format::Apk => AnyEmitter::Apk(apk::ApkEmitter),
        Format::Arch => AnyEmitter::Arch(arch::ArchEmitter),
    }
}

/// The crate's single public entry point (spec §5): normalizes `pkg` for
/// `format`, resolves its content list, and writes the resulting archive
/// to `sink`.
///
/// `sink` is a trait object rather than a generic so callers can box
/// arbitrary writers (files, `Vec<u8>`, pipes) without monomorphizing
/// four emitters per concrete `Write` type (see DESIGN.md).
pub fn package(pkg: &Package, format: Format, disable_globbing: bool, sink: &mut dyn Write) -> Result<()> {
    let normalized = defaults::normalize(pkg, format)?;
    let contents = glob::resolve(&pkg.contents, disable_globbing, format, normalized.mtime)?;
    emitter_for(format).package(&normalized, &contents, sink)
}

/// Convenience for callers that just want the conventional output name
/// without building the whole package first.
#[must_use]
pub fn conventional_filename(pkg: &NormalizedPackage) -> String {
    emitter_for(pkg.format).conventional_filename(pkg)
}

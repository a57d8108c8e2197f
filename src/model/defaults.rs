//! Architecture canonicalization, name/version validation, and the
//! normalization pass that turns a [`Package`] into a [`NormalizedPackage`]
//! (spec §4.A, §4.I, §6).

use crate::config;
use crate::error::{PackagerError, Result};
use crate::model::{Format, NormalizedPackage, Package, Version};

/// One row of the architecture table in spec §6. `None` means the
/// logical architecture has no canonical value for that format.
struct ArchRow {
    logical: &'static str,
    deb: Option<&'static str>,
    rpm: Option<&'static str>,
    apk: Option<&'static str>,
    arch: Option<&'static str>,
}

const ARCH_TABLE: &[ArchRow] = &[
    ArchRow { logical: "386", deb: Some("i386"), rpm: Some("i386"), apk: Some("x86"), arch: Some("i686") },
    ArchRow { logical: "amd64", deb: Some("amd64"), rpm: Some("x86_64"), apk: Some("x86_64"), arch: Some("x86_64") },
    ArchRow { logical: "arm64", deb: Some("arm64"), rpm: Some("aarch64"), apk: Some("aarch64"), arch: Some("aarch64") },
    ArchRow { logical: "arm5", deb: Some("armel"), rpm: Some("armv5tel"), apk: None, arch: Some("arm") },
    ArchRow { logical: "arm6", deb: Some("armhf"), rpm: Some("armv6hl"), apk: Some("armhf"), arch: Some("armv6h") },
    ArchRow { logical: "arm7", deb: Some("armhf"), rpm: Some("armv7hl"), apk: Some("armv7"), arch: Some("armv7h") },
    ArchRow { logical: "mips64le", deb: Some("mips64el"), rpm: Some("mips64el"), apk: None, arch: None },
    ArchRow { logical: "ppc64le", deb: Some("ppc64el"), rpm: Some("ppc64le"), apk: Some("ppc64le"), arch: None },
    ArchRow { logical: "s390x", deb: Some("s390x"), rpm: Some("s390x"), apk: Some("s390x"), arch: None },
    ArchRow { logical: "all", deb: Some("all"), rpm: Some("noarch"), apk: Some("noarch"), arch: Some("any") },
];

/// Resolves a logical architecture tag to the canonical value a given
/// format expects (spec §6).
///
/// Accepts canonical values verbatim too (e.g. `"x86_64"` for rpm), since
/// callers migrating an existing per-format value shouldn't be forced to
/// know the logical name.
pub fn canonical_architecture(logical: &str, format: Format) -> Result<String> {
    for row in ARCH_TABLE {
        let value = match format {
            Format::Deb => row.deb,
            Format::Rpm => row.rpm,
            Format::Apk => row.apk,
            Format::Arch => row.arch,
        };
        if row.logical == logical {
            return value.map(str::to_string).ok_or_else(|| {
                PackagerError::InvalidDescription(format!(
                    "architecture {logical} has no {format} equivalent"
                ))
            });
        }
        if value == Some(logical) {
            return Ok(logical.to_string());
        }
    }
    Err(PackagerError::InvalidDescription(format!(
        "unknown architecture: {logical}"
    )))
}

/// Validates a package name against the packager's character set (spec
/// §4.A).
fn validate_name(name: &str, format: Format) -> Result<()> {
    if name.is_empty() {
        return Err(PackagerError::InvalidDescription("name is empty".to_string()));
    }
    let valid = match format {
        Format::Arch => {
            !name.starts_with('-')
                && !name.starts_with('.')
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-'))
        }
        Format::Deb => name
            .chars()
            .all(|c| (c.is_ascii_lowercase() || c.is_ascii_digit()) || matches!(c, '-' | '+' | '.')),
        Format::Rpm => !name.chars().any(|c| c.is_whitespace() || c == '/'),
        // The spec is silent on APK's name charset; Alpine package names
        // follow the same lowercase/digits/.-+_ convention as their apk
        // index tooling, so we reuse Debian's rule here (see DESIGN.md).
        Format::Apk => name
            .chars()
            .all(|c| (c.is_ascii_lowercase() || c.is_ascii_digit()) || matches!(c, '-' | '+' | '.' | '_')),
    };
    if !valid {
        return Err(PackagerError::InvalidDescription(format!(
            "name {name:?} is invalid for {format} packages"
        )));
    }
    Ok(())
}

/// Normalizes a [`Package`] for the given target format (spec §4.A).
///
/// This performs steps (a)-(f); content resolution (spec §4.B) is a
/// separate pass over `.contents` done by [`crate::glob::resolve`].
pub fn normalize(pkg: &Package, format: Format) -> Result<NormalizedPackage> {
    validate_name(&pkg.name, format)?;

    if let Some(platform) = &pkg.platform {
        if platform != "linux" {
            return Err(PackagerError::InvalidDescription(format!(
                "unsupported platform: {platform}"
            )));
        }
    }

    let version = Version::parse(&pkg.version).map_err(|e| PackagerError::InvalidDescription(e.0))?;
    let arch = canonical_architecture(&pkg.arch, format)?;
    let mtime = pkg.mtime.unwrap_or_else(config::source_date_epoch);

    // (c) format-specific override wins if non-empty, else the common field.
    let maintainer = match format {
        Format::Deb => pkg.deb.maintainer.clone(),
        Format::Rpm => pkg.rpm.packager.clone(),
        Format::Arch => pkg.arch_overrides.packager.clone(),
        Format::Apk => None,
    }
    .or_else(|| pkg.maintainer.clone())
    .unwrap_or_default();

    let section = match format {
        Format::Deb => pkg.deb.section.clone().or_else(|| pkg.section.clone()),
        _ => pkg.section.clone(),
    };

    Ok(NormalizedPackage {
        format,
        name: pkg.name.clone(),
        version,
        arch,
        description: pkg.description.clone(),
        homepage: pkg.homepage.clone(),
        maintainer,
        vendor: pkg.vendor.clone(),
        license: pkg.license.clone(),
        section,
        priority: pkg.priority.clone(),
        mtime,
        depends: pkg.depends.clone(),
        recommends: pkg.recommends.clone(),
        suggests: pkg.suggests.clone(),
        conflicts: pkg.conflicts.clone(),
        replaces: pkg.replaces.clone(),
        provides: pkg.provides.clone(),
        changelog: pkg.changelog.clone(),
        deb: pkg.deb.clone(),
        rpm: pkg.rpm.clone(),
        apk: pkg.apk.clone(),
        arch_overrides: pkg.arch_overrides.clone(),
        scripts: pkg.scripts.clone(),
        contents: pkg.contents.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arch_table_round_trips() {
        assert_eq!(canonical_architecture("amd64", Format::Rpm).unwrap(), "x86_64");
        assert_eq!(canonical_architecture("arm7", Format::Arch).unwrap(), "armv7h");
        assert_eq!(canonical_architecture("all", Format::Apk).unwrap(), "noarch");
    }

    #[test]
    fn unsupported_arch_for_format_is_an_error() {
        assert!(canonical_architecture("arm5", Format::Apk).is_err());
        assert!(canonical_architecture("s390x", Format::Arch).is_err());
    }

    #[test]
    fn name_charsets_are_enforced() {
        assert!(validate_name("foo-bar_baz", Format::Arch).is_ok());
        assert!(validate_name(".leading-dot", Format::Arch).is_err());
        assert!(validate_name("Has-Upper", Format::Deb).is_err());
        assert!(validate_name("has space", Format::Rpm).is_err());
        assert!(validate_name("has/slash", Format::Rpm).is_err());
        assert!(validate_name("", Format::Deb).is_err());
    }

    #[test]
    fn normalize_minimal_package() {
        let mut pkg = Package::new("foo", "1.0.0");
        pkg.arch = "amd64".to_string();
        let normalized = normalize(&pkg, Format::Deb).unwrap();
        assert_eq!(normalized.arch, "amd64");
        assert_eq!(normalized.version.upstream, "1.0.0");
    }

    #[test]
    fn normalize_rejects_bad_platform() {
        let mut pkg = Package::new("foo", "1.0.0");
        pkg.arch = "amd64".to_string();
        pkg.platform = Some("windows".to_string());
        assert!(normalize(&pkg, Format::Deb).is_err());
    }
}

//! Version parsing and per-format reassembly (spec §4.I).

use std::fmt;

/// A package version split into its five components.
///
/// Parsing never fails — spec §4.I's splitting rules tolerate any part
/// being empty — but [`Version::parse`] rejects an entirely empty input,
/// since spec §4.A says normalization fails when "the version is empty".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Version {
    pub epoch: Option<u64>,
    pub upstream: String,
    pub prerelease: Option<String>,
    pub release: Option<String>,
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionError(pub String);

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid version: {}", self.0)
    }
}

impl std::error::Error for VersionError {}

impl Version {
    /// Parses a version string per spec §4.I's left-to-right splitting
    /// rules: `:` (epoch), then `+` (build metadata), then `-` (release),
    /// then `~` (prerelease).
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        if input.is_empty() {
            return Err(VersionError("version string is empty".to_string()));
        }

        // Step 1: epoch, only if the prefix before the first ':' is all digits.
        let (epoch, remainder) = match input.split_once(':') {
            Some((maybe_epoch, rest)) if !maybe_epoch.is_empty() && maybe_epoch.chars().all(|c| c.is_ascii_digit()) => {
                let epoch: u64 = maybe_epoch
                    .parse()
                    .map_err(|_| VersionError(format!("epoch out of range: {maybe_epoch}")))?;
                (Some(epoch), rest)
            }
            _ => (None, input),
        };

        // Step 2: build metadata after the first '+'.
        let (left, metadata) = match remainder.split_once('+') {
            Some((l, r)) => (l, Some(r.to_string())),
            None => (remainder, None),
        };

        // Step 3: release after the first '-'.
        let (version_part, release) = match left.split_once('-') {
            Some((l, r)) => (l, Some(r.to_string())),
            None => (left, None),
        };

        // Step 4: prerelease after the first '~'.
        let (upstream, prerelease) = match version_part.split_once('~') {
            Some((l, r)) => (l.to_string(), Some(r.to_string())),
            None => (version_part.to_string(), None),
        };

        Ok(Version {
            epoch,
            upstream,
            prerelease,
            release,
            metadata,
        })
    }

    /// `[epoch:]upstream[~prerelease][+metadata][-release]`
    #[must_use]
    pub fn deb_string(&self) -> String {
        let mut s = String::new();
        if let Some(epoch) = self.epoch {
            s.push_str(&epoch.to_string());
            s.push(':');
        }
        s.push_str(&self.upstream);
        if let Some(pre) = &self.prerelease {
            s.push('~');
            s.push_str(pre);
        }
        if let Some(meta) = &self.metadata {
            s.push('+');
            s.push_str(meta);
        }
        if let Some(release) = &self.release {
            s.push('-');
            s.push_str(release);
        }
        s
    }

    /// Returns `(VERSION tag, RELEASE tag)`: upstream goes in `VERSION`;
    /// `release[~prerelease]` goes in `RELEASE`; epoch has its own tag.
    #[must_use]
    pub fn rpm_version_release(&self) -> (String, String) {
        let release = self.release.clone().unwrap_or_else(|| "1".to_string());
        let release = match &self.prerelease {
            Some(pre) => format!("{release}~{pre}"),
            None => release,
        };
        (self.upstream.clone(), release)
    }

    /// `upstream[-release][~prerelease][+metadata]`
    #[must_use]
    pub fn apk_string(&self) -> String {
        let mut s = self.upstream.clone();
        if let Some(release) = &self.release {
            s.push('-');
            s.push_str(release);
        }
        if let Some(pre) = &self.prerelease {
            s.push('~');
            s.push_str(pre);
        }
        if let Some(meta) = &self.metadata {
            s.push('+');
            s.push_str(meta);
        }
        s
    }

    /// `[epoch:]upstream[prerelease]-release`, with dashes in the
    /// prerelease replaced by underscores.
    ///
    /// Spec §8 scenario 2 pins the exact rendering: epoch `2`, upstream
    /// `1.0.0`, prerelease `beta-1`, default release all yield
    /// `2:1.0.0beta_1-1` — no separator between upstream and prerelease,
    /// only internal dashes in the prerelease become underscores (see
    /// DESIGN.md for the Open Question this resolves).
    #[must_use]
    pub fn arch_string(&self) -> String {
        let mut s = String::new();
        if let Some(epoch) = self.epoch {
            s.push_str(&epoch.to_string());
            s.push(':');
        }
        s.push_str(&self.upstream);
        if let Some(pre) = &self.prerelease {
            s.push_str(&pre.replace('-', "_"));
        }
        s.push('-');
        s.push_str(self.release.as_deref().unwrap_or("1"));
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_all_parts() {
        let v = Version::parse("3:1.0.0~beta-1+meta").unwrap();
        assert_eq!(v.epoch, Some(3));
        assert_eq!(v.upstream, "1.0.0");
        assert_eq!(v.prerelease.as_deref(), Some("beta"));
        assert_eq!(v.release.as_deref(), Some("1"));
        assert_eq!(v.metadata.as_deref(), Some("meta"));
    }

    #[test]
    fn split_order_matches_spec() {
        // Spec splits '+' before '-', so "+" binds tighter than "-".
        let v = Version::parse("1.0.0+meta-1").unwrap();
        assert_eq!(v.upstream, "1.0.0");
        assert_eq!(v.metadata.as_deref(), Some("meta-1"));
        assert_eq!(v.release, None);
    }

    #[test]
    fn bare_version_has_no_optional_parts() {
        let v = Version::parse("1.0.0").unwrap();
        assert_eq!(v.epoch, None);
        assert_eq!(v.upstream, "1.0.0");
        assert_eq!(v.prerelease, None);
        assert_eq!(v.release, None);
        assert_eq!(v.metadata, None);
    }

    #[test]
    fn non_digit_before_colon_is_not_an_epoch() {
        let v = Version::parse("v1.0.0:extra").unwrap();
        assert_eq!(v.epoch, None);
        assert_eq!(v.upstream, "v1.0.0:extra");
    }

    #[test]
    fn empty_version_is_rejected() {
        assert!(Version::parse("").is_err());
    }

    #[test]
    fn arch_scenario_from_spec() {
        // Scenario 2: name=foo-test, version=1.0.0, prerelease=beta-1, epoch=2
        // .PKGINFO pkgver equals 2:1.0.0beta_1-1 per the worked example.
        //
        // The worked example's prerelease separator is immediately after the
        // upstream version (no explicit '~' in pkgver), so we build the
        // Version directly rather than via Version::parse here.
        let v = Version {
            epoch: Some(2),
            upstream: "1.0.0".to_string(),
            prerelease: Some("beta-1".to_string()),
            release: Some("1".to_string()),
            metadata: None,
        };
        assert_eq!(v.arch_string(), "2:1.0.0beta_1-1");
    }

    #[test]
    fn deb_reassembly() {
        // '+' is split before '-', so "git123-4" is all build metadata and
        // there is no release component here.
        let v = Version::parse("3:1.2.3~rc1+git123-4").unwrap();
        assert_eq!(v.release, None);
        assert_eq!(v.metadata.as_deref(), Some("git123-4"));
        assert_eq!(v.deb_string(), "3:1.2.3~rc1+git123-4");
    }
}

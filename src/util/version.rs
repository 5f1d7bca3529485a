use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A parsed `major.minor.patch[-label[.]number]` version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre_release: Option<PreRelease>,
}

/// Pre-release tag such as `beta.2` or `rc1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PreRelease {
    pub label: String,
    pub number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version {input:?}: {reason}")]
pub struct VersionError {
    pub input: String,
    pub reason: &'static str,
}

/// How `new` relates to `old`, component by component.
///
/// `Greater` means the new version is ahead in that component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionComparison {
    pub major: Ordering,
    pub minor: Ordering,
    pub patch: Ordering,
    /// Only set when both versions carry a pre-release tag.
    pub pre_release: Option<Ordering>,
}

impl VersionComparison {
    /// A major or minor change in either direction invalidates caches
    /// built by another schema.
    pub fn requires_rebuild(&self) -> bool {
        self.major != Ordering::Equal || self.minor != Ordering::Equal
    }
}

impl FromStr for SemVer {
    type Err = VersionError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let err = |reason| VersionError {
            input: input.to_string(),
            reason,
        };

        let trimmed = input.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let (core, pre) = match trimmed.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (trimmed, None),
        };
        // Build metadata never affects precedence.
        let core = core.split('+').next().unwrap_or(core);

        let mut parts = core.split('.');
        let mut next = |name| -> Result<u64, VersionError> {
            parts
                .next()
                .ok_or_else(|| err(name))?
                .parse::<u64>()
                .map_err(|_| err(name))
        };
        let major = next("missing or non-numeric major")?;
        let minor = next("missing or non-numeric minor")?;
        let patch = next("missing or non-numeric patch")?;
        if parts.next().is_some() {
            return Err(err("too many components"));
        }

        let pre_release = match pre {
            Some(pre) => Some(parse_pre_release(pre.split('+').next().unwrap_or(pre))
                .ok_or_else(|| err("malformed pre-release"))?),
            None => None,
        };

        Ok(Self {
            major,
            minor,
            patch,
            pre_release,
        })
    }
}

fn parse_pre_release(pre: &str) -> Option<PreRelease> {
    let label: String = pre
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if label.is_empty() {
        return None;
    }
    let rest = pre[label.len()..].trim_start_matches('.');
    let number = if rest.is_empty() { 0 } else { rest.parse().ok()? };
    Some(PreRelease {
        label: label.to_lowercase(),
        number,
    })
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre_release {
            write!(f, "-{}.{}", pre.label, pre.number)?;
        }
        Ok(())
    }
}

/// Compare two semantic versions, reporting `new` relative to `old`.
pub fn compare_semver(old: &str, new: &str) -> Result<VersionComparison, VersionError> {
    let old: SemVer = old.parse()?;
    let new: SemVer = new.parse()?;

    let pre_release = match (&old.pre_release, &new.pre_release) {
        (Some(o), Some(n)) => Some(n.cmp(o)),
        _ => None,
    };

    Ok(VersionComparison {
        major: new.major.cmp(&old.major),
        minor: new.minor.cmp(&old.minor),
        patch: new.patch.cmp(&old.patch),
        pre_release,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let v: SemVer = "5.1.2".parse().unwrap();
        assert_eq!((v.major, v.minor, v.patch), (5, 1, 2));
        assert!(v.pre_release.is_none());
    }

    #[test]
    fn test_parse_pre_release_forms() {
        let dotted: SemVer = "v1.0.0-beta.2".parse().unwrap();
        let compact: SemVer = "1.0.0-beta2".parse().unwrap();
        assert_eq!(dotted.pre_release, compact.pre_release);
        assert_eq!(dotted.to_string(), "1.0.0-beta.2");

        let bare: SemVer = "1.0.0-rc".parse().unwrap();
        assert_eq!(bare.pre_release.unwrap().number, 0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("1.2".parse::<SemVer>().is_err());
        assert!("1.2.x".parse::<SemVer>().is_err());
        assert!("1.2.3.4".parse::<SemVer>().is_err());
        assert!("1.2.3-".parse::<SemVer>().is_err());
    }

    #[test]
    fn test_compare_components() {
        let cases = [
            ("1.0.0", "2.0.0", Ordering::Greater, Ordering::Equal, Ordering::Equal),
            ("2.0.0", "1.0.0", Ordering::Less, Ordering::Equal, Ordering::Equal),
            ("1.1.0", "1.2.0", Ordering::Equal, Ordering::Greater, Ordering::Equal),
            ("1.1.5", "1.1.3", Ordering::Equal, Ordering::Equal, Ordering::Less),
            ("1.1.1", "1.1.1", Ordering::Equal, Ordering::Equal, Ordering::Equal),
        ];
        for (old, new, major, minor, patch) in cases {
            let cmp = compare_semver(old, new).unwrap();
            assert_eq!(cmp.major, major, "{} -> {}", old, new);
            assert_eq!(cmp.minor, minor, "{} -> {}", old, new);
            assert_eq!(cmp.patch, patch, "{} -> {}", old, new);
        }
    }

    #[test]
    fn test_compare_pre_release() {
        let cmp = compare_semver("1.0.0-alpha.3", "1.0.0-beta.1").unwrap();
        assert_eq!(cmp.pre_release, Some(Ordering::Greater));

        let cmp = compare_semver("1.0.0-rc.2", "1.0.0-rc.1").unwrap();
        assert_eq!(cmp.pre_release, Some(Ordering::Less));

        let cmp = compare_semver("1.0.0-rc.1", "1.0.0").unwrap();
        assert_eq!(cmp.pre_release, None);
    }

    #[test]
    fn test_requires_rebuild() {
        assert!(compare_semver("1.0.0", "1.1.0").unwrap().requires_rebuild());
        assert!(compare_semver("2.0.0", "1.9.0").unwrap().requires_rebuild());
        assert!(!compare_semver("1.1.0", "1.1.7").unwrap().requires_rebuild());
    }
}

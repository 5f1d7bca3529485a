use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::app::{FeedCacheError, Result};
use crate::config::FeedSpec;
use crate::domain::manifest::StaticFields;
use crate::domain::{Manifest, ManifestState};
use crate::store::write_json_atomic;
use crate::util::compare_semver;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Reads and writes `manifest.json` in a cache directory.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
    schema_version: String,
}

impl ManifestStore {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            path: cache_dir.join(MANIFEST_FILE),
            schema_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Override the version stamped into new manifests.
    pub fn with_schema_version(mut self, version: impl Into<String>) -> Self {
        self.schema_version = version.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the manifest, or return an unbuilt skeleton if there is none.
    ///
    /// Malformed JSON is reported as [`FeedCacheError::CorruptManifest`] and
    /// never repaired here.
    pub fn read_manifest(&self) -> Result<Manifest> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Manifest::skeleton(&self.schema_version));
            }
            Err(e) => return Err(FeedCacheError::filesystem(&self.path, e)),
        };

        serde_json::from_str(&content).map_err(|e| FeedCacheError::CorruptManifest {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Build the manifest from scratch for `feeds` and persist it.
    ///
    /// Validators are cleared and every entry is marked as checked at `now`.
    pub fn write_manifest(
        &self,
        feeds: &[FeedSpec],
        default_cache_time: u64,
        now: i64,
    ) -> Result<Manifest> {
        let manifest = Manifest::build(&self.schema_version, feeds, default_cache_time, now);
        write_json_atomic(&self.path, &manifest)?;
        tracing::debug!(path = %self.path.display(), entries = manifest.data.len(), "Built manifest");
        Ok(manifest)
    }

    /// Persist a manifest whose entries were updated after a fetch cycle.
    pub fn update_manifest(&self, manifest: &Manifest) -> Result<()> {
        write_json_atomic(&self.path, manifest)?;
        tracing::debug!(path = %self.path.display(), "Updated manifest");
        Ok(())
    }

    /// Whether the manifest was written by a schema this build cannot trust.
    ///
    /// Any major or minor difference counts, as does an unreadable version.
    pub fn needs_version_rebuild(&self, manifest: &Manifest) -> bool {
        match compare_semver(&manifest.config.schema_version, &self.schema_version) {
            Ok(cmp) => cmp.requires_rebuild(),
            Err(e) => {
                tracing::debug!(error = %e, "Unreadable manifest version");
                true
            }
        }
    }
}

/// Compare the configuration-derived fields of `manifest` with `feeds`.
///
/// ETags, Last-Modified and check times are ignored. An added, removed or
/// altered source makes the result [`ManifestState::Changed`].
pub fn compare(manifest: &Manifest, feeds: &[FeedSpec], default_cache_time: u64) -> ManifestState {
    let stored: BTreeMap<&str, StaticFields<'_>> = manifest
        .data
        .iter()
        .map(|(source, entry)| (source.as_str(), entry.static_fields()))
        .collect();

    let configured: BTreeMap<&str, StaticFields<'_>> = feeds
        .iter()
        .map(|feed| {
            (
                feed.source.as_str(),
                StaticFields::of_spec(feed, default_cache_time),
            )
        })
        .collect();

    if stored == configured {
        ManifestState::Unchanged
    } else {
        ManifestState::Changed
    }
}

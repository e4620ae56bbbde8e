use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::pipeline::MANIFEST_PREFIX;
use crate::model::HarvestRunManifest;
use crate::store::Store;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.store.manifest_dir();
    let db_path = args.store.resolved_db_path();

    info!(cache_root = %args.store.cache_root.display(), "status requested");

    match latest_manifest(&manifest_dir)? {
        Some(path) => {
            let raw =
                fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
            let manifest: HarvestRunManifest = serde_json::from_slice(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?;

            info!(
                path = %path.display(),
                run_id = %manifest.run_id,
                command = %manifest.command,
                status = %manifest.status,
                dry_run = manifest.dry_run,
                started_at = %manifest.started_at,
                project_url = %manifest.project_url.unwrap_or_default(),
                pages_attempted = manifest.counts.pages_attempted,
                pages_harvested = manifest.counts.pages_harvested,
                pages_failed = manifest.counts.pages_failed,
                records = manifest.counts.records,
                publications_saved = manifest.counts.publications_saved,
                warnings = manifest.warnings.len(),
                "loaded last harvest run manifest"
            );
        }
        None => warn!(path = %manifest_dir.display(), "no harvest run manifest found"),
    }

    if db_path.exists() {
        let store = Store::open(&db_path)?;
        let counts = store.counts()?;
        let metadata = store.metadata()?;
        let lookup = |key: &str| {
            metadata
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.clone())
                .unwrap_or_default()
        };

        info!(
            path = %db_path.display(),
            schema_version = %lookup("db_schema_version"),
            updated_at = %lookup("db_updated_at"),
            projects = counts.projects,
            pages = counts.pages,
            publications = counts.publications,
            persons = counts.persons,
            urls = counts.urls,
            "database status"
        );
    } else {
        warn!(path = %db_path.display(), "database file missing");
    }

    Ok(())
}

/// Run manifests carry a compact UTC timestamp, so the lexically last name is the newest.
fn latest_manifest(manifest_dir: &Path) -> Result<Option<PathBuf>> {
    if !manifest_dir.exists() {
        return Ok(None);
    }

    let mut latest: Option<PathBuf> = None;
    for entry in fs::read_dir(manifest_dir)
        .with_context(|| format!("failed to list {}", manifest_dir.display()))?
    {
        let path = entry?.path();
        let is_run_manifest = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(MANIFEST_PREFIX) && name.ends_with(".json"))
            .unwrap_or(false);
        if is_run_manifest && latest.as_ref().is_none_or(|current| path > *current) {
            latest = Some(path);
        }
    }

    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_manifest_picks_newest_run_file() {
        let dir = std::env::temp_dir().join(format!(
            "rrs_status_test_{}_{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        fs::create_dir_all(&dir).expect("temp dir should be created");
        for name in [
            "harvest_run_20100101T000000Z.json",
            "harvest_run_20110202T000000Z.json",
            "other.json",
        ] {
            fs::write(dir.join(name), "{}").expect("fixture should write");
        }

        let latest = latest_manifest(&dir).expect("listing should work");
        let _ = fs::remove_dir_all(&dir);

        assert_eq!(
            latest
                .as_deref()
                .and_then(|path| path.file_name())
                .and_then(|name| name.to_str()),
            Some("harvest_run_20110202T000000Z.json")
        );
        assert!(latest_manifest(&dir).expect("missing dir is fine").is_none());
    }
}

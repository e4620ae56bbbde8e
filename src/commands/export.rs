use std::fs;

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::{ExportArgs, ExportFormat};
use crate::config::HarvestConfig;
use crate::export::{documents_from_store, es_bulk_body, push_bulk, write_json};
use crate::store::Store;
use crate::util::ensure_directory;

pub fn run(args: ExportArgs) -> Result<()> {
    let db_path = args.store.resolved_db_path();
    if !db_path.exists() {
        bail!("database not found: {}", db_path.display());
    }

    let store = Store::open(&db_path)?;
    let documents = documents_from_store(&store)?;
    let output = args.output.clone().unwrap_or_else(|| {
        args.store
            .cache_root
            .join("exports")
            .join(args.format.default_file_name())
    });

    match args.format {
        ExportFormat::Json => {
            if args.es_url.is_some() {
                bail!("--es-url requires --format es-bulk");
            }
            write_json(&documents, &output)?;
        }
        ExportFormat::EsBulk => {
            let body = es_bulk_body(&documents, &args.index)?;
            if let Some(parent) = output.parent() {
                ensure_directory(parent)?;
            }
            fs::write(&output, body.as_bytes())
                .with_context(|| format!("failed to write {}", output.display()))?;
            info!(path = %output.display(), documents = documents.len(), "wrote bulk body");

            if let Some(es_url) = &args.es_url {
                let config = HarvestConfig::load(args.store.config.as_deref())?;
                let summary = push_bulk(&config, es_url, body)?;
                info!(items = summary.items, took_ms = ?summary.took_ms, "bulk push completed");
            }
        }
    }

    info!(
        format = args.format.as_str(),
        documents = documents.len(),
        path = %output.display(),
        "export completed"
    );
    Ok(())
}

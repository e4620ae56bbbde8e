use std::io::{self, Write};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::cli::HarvestArgs;
use crate::commands::pipeline::{
    PageHarvester, RunManifestDraft, load_source, write_run_manifest,
};
use crate::config::HarvestConfig;
use crate::extract::EntityExtractor;
use crate::model::{HarvestCounts, PageReport};
use crate::records::RecordBuilder;
use crate::region::RegionDetector;
use crate::store::{self, RrsProject, Store};
use crate::util::now_utc_string;

pub fn run(args: HarvestArgs) -> Result<()> {
    let started = Utc::now();
    let config = HarvestConfig::load(args.store.config.as_deref())?;
    let page = load_source(&args.source, &args.store.cache_root, &config)?;

    let detector = RegionDetector::new(&config)?;
    let builder = RecordBuilder::new(&config, &detector)?;
    let extractor = EntityExtractor::new()?;
    let harvester = PageHarvester {
        config: &config,
        detector: &detector,
        builder: &builder,
        extractor: &extractor,
    };

    let project_id = args.project_url.as_deref().map(store::project_id);
    let harvest = harvester.harvest(&page, project_id.as_deref());

    let mut counts = HarvestCounts {
        pages_attempted: 1,
        pages_harvested: 1,
        records: harvest.records,
        ..HarvestCounts::default()
    };

    if args.dry_run {
        info!(url = %page.final_url, "dry run, skipping database write");
    } else {
        let db_path = args.store.resolved_db_path();
        let mut store = Store::open(&db_path)?;
        if let (Some(url), Some(project_id)) = (&args.project_url, &project_id) {
            let now = now_utc_string();
            store.save_project(&RrsProject {
                project_id: project_id.clone(),
                url: url.clone(),
                title: None,
                acronym: None,
                first_seen_at: now.clone(),
                last_seen_at: now,
            })?;
        }
        let stats = store.save_harvest(&harvest.harvested)?;
        counts.add_stats(&stats);
        info!(
            path = %db_path.display(),
            publications = stats.publications,
            replaced = stats.replaced,
            persons_new = stats.persons_new,
            "stored harvest"
        );
    }

    let manifest_path = write_run_manifest(
        &args.store,
        RunManifestDraft {
            command: "harvest",
            started,
            dry_run: args.dry_run,
            project_url: args.project_url.clone(),
            counts,
            pages: vec![harvest.report.clone()],
            warnings: Vec::new(),
        },
    )?;

    if args.json {
        write_json_report(&harvest.report)
    } else {
        write_text_report(&harvest.report, &manifest_path.display().to_string())
    }
}

fn write_json_report(report: &PageReport) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, report)
        .context("failed to serialize harvest json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

pub(super) fn write_page_summary(output: &mut impl Write, report: &PageReport) -> Result<()> {
    writeln!(output, "Page: {}", report.final_url)?;
    match (&report.region_path, &report.region_miss) {
        (Some(path), _) => writeln!(
            output,
            "Region: {} method={} confidence={:.2}",
            path,
            report.region_method.as_deref().unwrap_or("-"),
            report.region_confidence.unwrap_or_default()
        )?,
        (None, miss) => writeln!(
            output,
            "Region: none ({})",
            miss.as_deref().unwrap_or("unknown")
        )?,
    }
    if report.used_article_meta {
        writeln!(output, "Source: article meta tags")?;
    }
    writeln!(output, "Publications: {}", report.publications.len())?;

    for (index, publication) in report.publications.iter().enumerate() {
        writeln!(
            output,
            "{}.\t{}\t{}\t{}",
            index + 1,
            publication.deliverable_code.as_deref().unwrap_or("-"),
            publication.title,
            publication.date.as_deref().unwrap_or("-"),
        )?;
        if let Some(link) = &publication.link {
            writeln!(output, "\t{link}")?;
        }
        if !publication.authors.is_empty() {
            writeln!(output, "\tauthors: {}", publication.authors.join(", "))?;
        }
    }
    Ok(())
}

fn write_text_report(report: &PageReport, manifest_path: &str) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    write_page_summary(&mut output, report)?;
    writeln!(output, "Manifest: {manifest_path}")?;
    output.flush()?;
    Ok(())
}

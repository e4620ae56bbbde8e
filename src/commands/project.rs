use std::io::{self, Write};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::ProjectArgs;
use crate::commands::harvest::write_page_summary;
use crate::commands::pipeline::{PageHarvester, RunManifestDraft, write_run_manifest};
use crate::config::HarvestConfig;
use crate::dom::DomTree;
use crate::extract::EntityExtractor;
use crate::fetch::{Fetcher, PageCache, fetch_cached};
use crate::model::{HarvestCounts, PageReport};
use crate::records::RecordBuilder;
use crate::region::RegionDetector;
use crate::store::{self, RrsProject, Store};
use crate::util::{normalize_whitespace, now_utc_string};

const MAX_ACRONYM_CHARS: usize = 15;

#[derive(Debug, Serialize)]
struct ProjectReport {
    project: RrsProject,
    listing_pages: Vec<String>,
    pages: Vec<PageReport>,
    warnings: Vec<String>,
}

pub fn run(args: ProjectArgs) -> Result<()> {
    let started = Utc::now();
    let config = HarvestConfig::load(args.store.config.as_deref())?;
    let max_pages = args.max_pages.unwrap_or(config.max_project_pages);

    let fetcher = Fetcher::new(&config)?;
    let cache = PageCache::new(&args.store.cache_root);
    let home = fetch_cached(&fetcher, &cache, &args.url, args.no_cache)
        .with_context(|| format!("failed to fetch project home page {}", args.url))?;
    let home_tree = DomTree::parse(&home.body);

    let detector = RegionDetector::new(&config)?;
    let builder = RecordBuilder::new(&config, &detector)?;
    let extractor = EntityExtractor::new()?;
    let harvester = PageHarvester {
        config: &config,
        detector: &detector,
        builder: &builder,
        extractor: &extractor,
    };

    let now = now_utc_string();
    let title = home_tree.title().map(|value| normalize_whitespace(&value));
    let mut project = RrsProject {
        project_id: store::project_id(&args.url),
        url: args.url.clone(),
        acronym: title.as_deref().and_then(guess_acronym),
        title,
        first_seen_at: now.clone(),
        last_seen_at: now,
    };

    let mut store = if args.dry_run {
        None
    } else {
        let store = Store::open(&args.store.resolved_db_path())?;
        project = store.save_project(&project)?;
        Some(store)
    };

    let listing_pages = detector
        .discover_listing_pages(&home_tree, home.base_url())
        .into_iter()
        .take(max_pages)
        .map(|candidate| candidate.url)
        .collect::<Vec<String>>();
    info!(
        url = %args.url,
        title = %project.title.as_deref().unwrap_or("-"),
        acronym = %project.acronym.as_deref().unwrap_or("-"),
        listing_pages = listing_pages.len(),
        "discovered project pages"
    );

    let mut counts = HarvestCounts::default();
    let mut pages = Vec::new();
    let mut warnings = Vec::new();

    let home_harvest = harvester.harvest(&home, Some(project.project_id.as_str()));
    let mut harvests = Vec::new();
    if home_harvest.report.region_path.is_some() {
        counts.pages_attempted += 1;
        harvests.push(home_harvest);
    }

    for url in &listing_pages {
        counts.pages_attempted += 1;
        match fetch_cached(&fetcher, &cache, url, args.no_cache) {
            Ok(page) => harvests.push(harvester.harvest(&page, Some(project.project_id.as_str()))),
            Err(err) => {
                warn!(url = %url, error = %err, "skipping listing page");
                warnings.push(format!("{url}: {err:#}"));
                counts.pages_failed += 1;
            }
        }
    }

    for harvest in harvests {
        counts.pages_harvested += 1;
        counts.records += harvest.records;
        if let Some(store) = store.as_mut() {
            match store.save_harvest(&harvest.harvested) {
                Ok(stats) => counts.add_stats(&stats),
                Err(err) => {
                    warn!(url = %harvest.report.final_url, error = %err, "failed to store page");
                    warnings.push(format!("{}: {err:#}", harvest.report.final_url));
                }
            }
        }
        pages.push(harvest.report);
    }

    let manifest_path = write_run_manifest(
        &args.store,
        RunManifestDraft {
            command: "project",
            started,
            dry_run: args.dry_run,
            project_url: Some(args.url.clone()),
            counts: counts.clone(),
            pages: pages.clone(),
            warnings: warnings.clone(),
        },
    )?;

    let report = ProjectReport {
        project,
        listing_pages,
        pages,
        warnings,
    };

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut output, &report)
            .context("failed to serialize project json output")?;
        writeln!(output)?;
    } else {
        writeln!(
            output,
            "Project: {} ({})",
            report.project.title.as_deref().unwrap_or("untitled"),
            report.project.acronym.as_deref().unwrap_or("-")
        )?;
        writeln!(
            output,
            "Pages: attempted={} harvested={} failed={} publications={}",
            counts.pages_attempted,
            counts.pages_harvested,
            counts.pages_failed,
            report
                .pages
                .iter()
                .map(|page| page.publications.len())
                .sum::<usize>()
        )?;
        for page in &report.pages {
            writeln!(output)?;
            write_page_summary(&mut output, page)?;
        }
        for warning in &report.warnings {
            writeln!(output, "Warning: {warning}")?;
        }
        writeln!(output, "Manifest: {}", manifest_path.display())?;
    }
    output.flush()?;
    Ok(())
}

/// First title token that looks like a project acronym: `KiWi`, `LOD2`, `MUSING`.
fn guess_acronym(title: &str) -> Option<String> {
    title
        .split(|ch: char| ch.is_whitespace() || matches!(ch, ':' | '|' | ',' | '(' | ')' | '–'))
        .map(|token| token.trim_matches(|ch: char| !ch.is_alphanumeric()))
        .find(|token| {
            let uppercase = token.chars().filter(|ch| ch.is_uppercase()).count();
            token.chars().count() <= MAX_ACRONYM_CHARS
                && uppercase >= 2
                && token.chars().next().is_some_and(char::is_uppercase)
                && token.chars().all(|ch| ch.is_alphanumeric() || ch == '-')
        })
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acronym_is_first_multi_capital_token() {
        assert_eq!(
            guess_acronym("KiWi - Knowledge in a Wiki").as_deref(),
            Some("KiWi")
        );
        assert_eq!(
            guess_acronym("Welcome to the LOD2 project (FP7)").as_deref(),
            Some("LOD2")
        );
        assert_eq!(guess_acronym("Home page of our project"), None);
    }
}

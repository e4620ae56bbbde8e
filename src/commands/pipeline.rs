use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::cli::{SourceArgs, StoreArgs};
use crate::config::HarvestConfig;
use crate::dom::DomTree;
use crate::extract::{EntityExtractor, Person};
use crate::fetch::{FetchedPage, Fetcher, PageCache, document_extension, fetch_cached, load_file};
use crate::meta::{ArticleMeta, extract_article_meta};
use crate::model::{
    HarvestCounts, HarvestPaths, HarvestRunManifest, PageReport, PublicationSummary,
};
use crate::records::{Record, RecordBuilder};
use crate::region::{RegionDetector, RegionOutcome};
use crate::sequence::find_record_container;
use crate::store::{
    self, DB_SCHEMA_VERSION, HarvestedPage, HarvestedPublication, RrsPage, RrsPublication,
    SaveStats,
};
use crate::util::{now_utc_string, sha256_hex, utc_compact_string, write_json_pretty};

pub(super) const MANIFEST_PREFIX: &str = "harvest_run_";

/// Borrowed harvesting stages, built once per command and reused for every page.
pub(super) struct PageHarvester<'a> {
    pub config: &'a HarvestConfig,
    pub detector: &'a RegionDetector<'a>,
    pub builder: &'a RecordBuilder<'a>,
    pub extractor: &'a EntityExtractor,
}

pub(super) struct PageHarvest {
    pub report: PageReport,
    pub harvested: HarvestedPage,
    pub records: usize,
}

impl PageHarvester<'_> {
    pub fn harvest(&self, page: &FetchedPage, project_id: Option<&str>) -> PageHarvest {
        let tree = DomTree::parse(&page.body);
        let base_url = page.base_url();
        let page_id = store::page_id(&page.url);
        let harvested_at = now_utc_string();

        let mut report = PageReport {
            url: page.url.clone(),
            final_url: page.final_url.clone(),
            page_id: page_id.clone(),
            sha256: page.sha256.clone(),
            ..PageReport::default()
        };

        let mut records = Vec::<Record>::new();
        match self.detector.find_region(&tree) {
            RegionOutcome::Found(region) => {
                report.region_path = Some(region.path.clone());
                report.region_method = Some(region.method.as_str().to_string());
                report.region_confidence = Some(region.confidence);

                if let Some(segmentation) = find_record_container(&tree, region.node, self.config)
                {
                    report.container_path = Some(segmentation.container_path.clone());
                    report.record_pattern = segmentation.pattern.clone();
                    records = self.builder.build_records(&tree, &segmentation, base_url);
                }
                if records.is_empty() {
                    debug!(url = %base_url, "no record sequence, one record per document link");
                    records = self.builder.records_from_region(&tree, region.node, base_url);
                }
            }
            RegionOutcome::Missing(miss) => {
                report.region_miss = Some(miss.as_str().to_string());
            }
        }

        let mut publications = records
            .iter()
            .map(|record| {
                self.publication_from_record(record, &page.url, &page_id, project_id, &harvested_at)
            })
            .collect::<Vec<HarvestedPublication>>();

        if publications.is_empty() {
            let meta = extract_article_meta(&tree);
            if !meta.is_empty() {
                if let Some(publication) =
                    self.publication_from_meta(&meta, &page.url, &page_id, project_id, &harvested_at)
                {
                    report.used_article_meta = true;
                    publications.push(publication);
                }
            }
        }

        report.publications = records
            .iter()
            .map(|record| record.matched)
            .chain(std::iter::repeat(false))
            .zip(&publications)
            .map(|(matched, item)| summarize(item, matched))
            .collect();

        info!(
            url = %base_url,
            region = %report.region_path.as_deref().unwrap_or("-"),
            method = %report.region_method.as_deref().unwrap_or("-"),
            records = records.len(),
            publications = publications.len(),
            article_meta = report.used_article_meta,
            "harvested page"
        );

        PageHarvest {
            harvested: HarvestedPage {
                page: RrsPage {
                    page_id,
                    project_id: project_id.map(str::to_string),
                    url: page.url.clone(),
                    final_url: page.final_url.clone(),
                    sha256: page.sha256.clone(),
                    fetched_at: page.fetched_at.clone(),
                    region_path: report.region_path.clone(),
                    region_method: report.region_method.clone(),
                    region_confidence: report.region_confidence,
                    record_count: publications.len() as i64,
                },
                publications,
            },
            records: records.len(),
            report,
        }
    }

    fn publication_from_record(
        &self,
        record: &Record,
        page_url: &str,
        page_id: &str,
        project_id: Option<&str>,
        harvested_at: &str,
    ) -> HarvestedPublication {
        let entities = self.extractor.extract(&record.text);

        HarvestedPublication {
            publication: RrsPublication {
                publication_id: store::publication_id(
                    page_url,
                    &record.title,
                    record.link.as_deref(),
                ),
                project_id: project_id.map(str::to_string),
                page_id: page_id.to_string(),
                title: record.title.clone(),
                deliverable_code: entities.deliverable_code.clone(),
                work_package: entities.work_package.clone(),
                link: record.link.clone(),
                file_type: record.file_type.clone(),
                date: entities.date().map(str::to_string),
                year: entities.year().map(i64::from),
                isbn: entities.isbn.first().cloned(),
                issn: entities.issn.first().cloned(),
                doi: entities.doi.clone(),
                event: entities.event.clone(),
                location: entities.location.clone(),
                pages: entities.pages.clone(),
                source_hash: Some(sha256_hex(record.text.as_bytes())),
                source_text: Some(record.text.clone()),
                harvested_at: harvested_at.to_string(),
            },
            authors: entities.authors,
            urls: record.links.clone(),
        }
    }

    /// Single publication described by the page's citation meta tags.
    fn publication_from_meta(
        &self,
        meta: &ArticleMeta,
        page_url: &str,
        page_id: &str,
        project_id: Option<&str>,
        harvested_at: &str,
    ) -> Option<HarvestedPublication> {
        let title = meta.title.clone()?;
        let dates = meta
            .date
            .as_deref()
            .map(|raw| self.extractor.extract(&raw.replace('/', "-")))
            .unwrap_or_default();
        let source_text = meta.description.clone().unwrap_or_else(|| title.clone());

        Some(HarvestedPublication {
            publication: RrsPublication {
                publication_id: store::publication_id(page_url, &title, meta.pdf_url.as_deref()),
                project_id: project_id.map(str::to_string),
                page_id: page_id.to_string(),
                link: meta.pdf_url.clone(),
                file_type: meta
                    .pdf_url
                    .as_deref()
                    .and_then(|url| document_extension(url, &self.config.document_extensions)),
                date: dates.date().map(str::to_string),
                year: dates.year().map(i64::from),
                doi: meta.doi.clone(),
                event: meta.venue.clone(),
                source_hash: Some(sha256_hex(source_text.as_bytes())),
                source_text: Some(source_text),
                harvested_at: harvested_at.to_string(),
                title,
                ..RrsPublication::default()
            },
            authors: meta
                .authors
                .iter()
                .filter_map(|name| Person::parse(name))
                .collect(),
            urls: meta.pdf_url.iter().cloned().collect(),
        })
    }
}

fn summarize(item: &HarvestedPublication, matched: bool) -> PublicationSummary {
    let publication = &item.publication;
    PublicationSummary {
        publication_id: publication.publication_id.clone(),
        title: publication.title.clone(),
        link: publication.link.clone(),
        file_type: publication.file_type.clone(),
        deliverable_code: publication.deliverable_code.clone(),
        date: publication.date.clone(),
        year: publication.year,
        authors: item.authors.iter().map(Person::full_name).collect(),
        matched,
    }
}

pub(super) fn load_source(
    source: &SourceArgs,
    cache_root: &Path,
    config: &HarvestConfig,
) -> Result<FetchedPage> {
    if let Some(path) = &source.html_file {
        return load_file(path, source.base_url.as_deref());
    }

    let Some(url) = source.url.as_deref() else {
        bail!("either --url or --html-file is required");
    };
    let fetcher = Fetcher::new(config)?;
    fetch_cached(&fetcher, &PageCache::new(cache_root), url, source.no_cache)
}

impl HarvestCounts {
    pub fn add_stats(&mut self, stats: &SaveStats) {
        self.publications_saved += stats.publications;
        self.publications_replaced += stats.replaced;
        self.persons_new += stats.persons_new;
        self.author_links += stats.author_links;
        self.urls += stats.urls;
    }
}

pub(super) struct RunManifestDraft {
    pub command: &'static str,
    pub started: DateTime<Utc>,
    pub dry_run: bool,
    pub project_url: Option<String>,
    pub counts: HarvestCounts,
    pub pages: Vec<PageReport>,
    pub warnings: Vec<String>,
}

pub(super) fn write_run_manifest(store_args: &StoreArgs, draft: RunManifestDraft) -> Result<PathBuf> {
    let manifest_dir = store_args.manifest_dir();
    let compact = utc_compact_string(draft.started);
    let path = manifest_dir.join(format!("{MANIFEST_PREFIX}{compact}.json"));

    let status = if draft.counts.pages_failed > 0 && draft.counts.pages_harvested == 0 {
        "failed"
    } else if draft.counts.pages_failed > 0 {
        "partial"
    } else {
        "completed"
    };

    let mut notes = Vec::new();
    if draft.dry_run {
        notes.push("Dry run: nothing was written to the database.".to_string());
    }

    let manifest = HarvestRunManifest {
        manifest_version: 1,
        run_id: format!("run-{compact}"),
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        command: draft.command.to_string(),
        status: status.to_string(),
        dry_run: draft.dry_run,
        started_at: draft
            .started
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        updated_at: now_utc_string(),
        project_url: draft.project_url,
        paths: HarvestPaths {
            cache_root: store_args.cache_root.display().to_string(),
            manifest_dir: manifest_dir.display().to_string(),
            db_path: store_args.resolved_db_path().display().to_string(),
        },
        counts: draft.counts,
        pages: draft.pages,
        warnings: draft.warnings,
        notes,
    };

    write_json_pretty(&path, &manifest)?;
    info!(path = %path.display(), status = %manifest.status, "wrote harvest run manifest");
    Ok(path)
}

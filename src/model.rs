use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublicationSummary {
    pub publication_id: String,
    pub title: String,
    pub link: Option<String>,
    pub file_type: Option<String>,
    pub deliverable_code: Option<String>,
    pub date: Option<String>,
    pub year: Option<i64>,
    pub authors: Vec<String>,
    pub matched: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageReport {
    pub url: String,
    pub final_url: String,
    pub page_id: String,
    pub sha256: String,
    pub region_path: Option<String>,
    pub region_method: Option<String>,
    pub region_confidence: Option<f64>,
    pub region_miss: Option<String>,
    pub container_path: Option<String>,
    pub record_pattern: Vec<String>,
    pub used_article_meta: bool,
    pub publications: Vec<PublicationSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestPaths {
    pub cache_root: String,
    pub manifest_dir: String,
    pub db_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarvestCounts {
    pub pages_attempted: usize,
    pub pages_harvested: usize,
    pub pages_failed: usize,
    pub records: usize,
    pub publications_saved: usize,
    pub publications_replaced: usize,
    pub persons_new: usize,
    pub author_links: usize,
    pub urls: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub command: String,
    pub status: String,
    pub dry_run: bool,
    pub started_at: String,
    pub updated_at: String,
    pub project_url: Option<String>,
    pub paths: HarvestPaths,
    pub counts: HarvestCounts,
    pub pages: Vec<PageReport>,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}

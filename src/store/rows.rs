use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

/// A table row with a fixed column list. `values` returns one value per
/// entry of `COLUMNS`, in the same order.
pub trait RrsRow: Sized {
    const TABLE: &'static str;
    const KEY: &'static [&'static str];
    const COLUMNS: &'static [&'static str];

    fn values(&self) -> Vec<Value>;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RrsProject {
    pub project_id: String,
    pub url: String,
    pub title: Option<String>,
    pub acronym: Option<String>,
    pub first_seen_at: String,
    pub last_seen_at: String,
}

impl RrsRow for RrsProject {
    const TABLE: &'static str = "rrs_project";
    const KEY: &'static [&'static str] = &["project_id"];
    const COLUMNS: &'static [&'static str] = &[
        "project_id",
        "url",
        "title",
        "acronym",
        "first_seen_at",
        "last_seen_at",
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::from(self.project_id.clone()),
            Value::from(self.url.clone()),
            Value::from(self.title.clone()),
            Value::from(self.acronym.clone()),
            Value::from(self.first_seen_at.clone()),
            Value::from(self.last_seen_at.clone()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            project_id: row.get("project_id")?,
            url: row.get("url")?,
            title: row.get("title")?,
            acronym: row.get("acronym")?,
            first_seen_at: row.get("first_seen_at")?,
            last_seen_at: row.get("last_seen_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RrsPage {
    pub page_id: String,
    pub project_id: Option<String>,
    pub url: String,
    pub final_url: String,
    pub sha256: String,
    pub fetched_at: String,
    pub region_path: Option<String>,
    pub region_method: Option<String>,
    pub region_confidence: Option<f64>,
    pub record_count: i64,
}

impl RrsRow for RrsPage {
    const TABLE: &'static str = "rrs_page";
    const KEY: &'static [&'static str] = &["page_id"];
    const COLUMNS: &'static [&'static str] = &[
        "page_id",
        "project_id",
        "url",
        "final_url",
        "sha256",
        "fetched_at",
        "region_path",
        "region_method",
        "region_confidence",
        "record_count",
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::from(self.page_id.clone()),
            Value::from(self.project_id.clone()),
            Value::from(self.url.clone()),
            Value::from(self.final_url.clone()),
            Value::from(self.sha256.clone()),
            Value::from(self.fetched_at.clone()),
            Value::from(self.region_path.clone()),
            Value::from(self.region_method.clone()),
            Value::from(self.region_confidence),
            Value::from(self.record_count),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            page_id: row.get("page_id")?,
            project_id: row.get("project_id")?,
            url: row.get("url")?,
            final_url: row.get("final_url")?,
            sha256: row.get("sha256")?,
            fetched_at: row.get("fetched_at")?,
            region_path: row.get("region_path")?,
            region_method: row.get("region_method")?,
            region_confidence: row.get("region_confidence")?,
            record_count: row.get("record_count")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RrsPublication {
    pub publication_id: String,
    pub project_id: Option<String>,
    pub page_id: String,
    pub title: String,
    pub deliverable_code: Option<String>,
    pub work_package: Option<String>,
    pub link: Option<String>,
    pub file_type: Option<String>,
    pub date: Option<String>,
    pub year: Option<i64>,
    pub isbn: Option<String>,
    pub issn: Option<String>,
    pub doi: Option<String>,
    pub event: Option<String>,
    pub location: Option<String>,
    pub pages: Option<String>,
    pub source_text: Option<String>,
    pub source_hash: Option<String>,
    pub harvested_at: String,
}

impl RrsRow for RrsPublication {
    const TABLE: &'static str = "rrs_publication";
    const KEY: &'static [&'static str] = &["publication_id"];
    const COLUMNS: &'static [&'static str] = &[
        "publication_id",
        "project_id",
        "page_id",
        "title",
        "deliverable_code",
        "work_package",
        "link",
        "file_type",
        "date",
        "year",
        "isbn",
        "issn",
        "doi",
        "event",
        "location",
        "pages",
        "source_text",
        "source_hash",
        "harvested_at",
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::from(self.publication_id.clone()),
            Value::from(self.project_id.clone()),
            Value::from(self.page_id.clone()),
            Value::from(self.title.clone()),
            Value::from(self.deliverable_code.clone()),
            Value::from(self.work_package.clone()),
            Value::from(self.link.clone()),
            Value::from(self.file_type.clone()),
            Value::from(self.date.clone()),
            Value::from(self.year),
            Value::from(self.isbn.clone()),
            Value::from(self.issn.clone()),
            Value::from(self.doi.clone()),
            Value::from(self.event.clone()),
            Value::from(self.location.clone()),
            Value::from(self.pages.clone()),
            Value::from(self.source_text.clone()),
            Value::from(self.source_hash.clone()),
            Value::from(self.harvested_at.clone()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            publication_id: row.get("publication_id")?,
            project_id: row.get("project_id")?,
            page_id: row.get("page_id")?,
            title: row.get("title")?,
            deliverable_code: row.get("deliverable_code")?,
            work_package: row.get("work_package")?,
            link: row.get("link")?,
            file_type: row.get("file_type")?,
            date: row.get("date")?,
            year: row.get("year")?,
            isbn: row.get("isbn")?,
            issn: row.get("issn")?,
            doi: row.get("doi")?,
            event: row.get("event")?,
            location: row.get("location")?,
            pages: row.get("pages")?,
            source_text: row.get("source_text")?,
            source_hash: row.get("source_hash")?,
            harvested_at: row.get("harvested_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RrsPerson {
    pub person_id: String,
    pub full_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
}

impl RrsRow for RrsPerson {
    const TABLE: &'static str = "rrs_person";
    const KEY: &'static [&'static str] = &["person_id"];
    const COLUMNS: &'static [&'static str] = &[
        "person_id",
        "full_name",
        "first_name",
        "middle_name",
        "last_name",
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::from(self.person_id.clone()),
            Value::from(self.full_name.clone()),
            Value::from(self.first_name.clone()),
            Value::from(self.middle_name.clone()),
            Value::from(self.last_name.clone()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            person_id: row.get("person_id")?,
            full_name: row.get("full_name")?,
            first_name: row.get("first_name")?,
            middle_name: row.get("middle_name")?,
            last_name: row.get("last_name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RrsPublicationPerson {
    pub publication_id: String,
    pub person_id: String,
    pub author_rank: i64,
}

impl RrsRow for RrsPublicationPerson {
    const TABLE: &'static str = "rrs_publication_person";
    const KEY: &'static [&'static str] = &["publication_id", "person_id"];
    const COLUMNS: &'static [&'static str] = &["publication_id", "person_id", "author_rank"];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::from(self.publication_id.clone()),
            Value::from(self.person_id.clone()),
            Value::from(self.author_rank),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            publication_id: row.get("publication_id")?,
            person_id: row.get("person_id")?,
            author_rank: row.get("author_rank")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RrsUrl {
    pub url_id: String,
    pub publication_id: String,
    pub url: String,
    pub link_type: String,
}

impl RrsRow for RrsUrl {
    const TABLE: &'static str = "rrs_url";
    const KEY: &'static [&'static str] = &["url_id"];
    const COLUMNS: &'static [&'static str] = &["url_id", "publication_id", "url", "link_type"];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::from(self.url_id.clone()),
            Value::from(self.publication_id.clone()),
            Value::from(self.url.clone()),
            Value::from(self.link_type.clone()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            url_id: row.get("url_id")?,
            publication_id: row.get("publication_id")?,
            url: row.get("url")?,
            link_type: row.get("link_type")?,
        })
    }
}

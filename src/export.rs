use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::config::HarvestConfig;
use crate::fetch::Fetcher;
use crate::store::{RrsPage, RrsProject, Store};
use crate::util::{truncate_chars, write_json_pretty};

/// Flat publication record shared by `export` and `import`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicationDocument {
    pub id: String,
    pub project_url: Option<String>,
    pub page_url: String,
    /// Address the page was served from, when it differs from `page_url`.
    pub page_final_url: Option<String>,
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
    pub authors: Vec<String>,
    pub urls: Vec<String>,
    pub source_text: Option<String>,
    pub harvested_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkSummary {
    pub items: usize,
    pub took_ms: Option<u64>,
}

pub fn documents_from_store(store: &Store) -> Result<Vec<PublicationDocument>> {
    let pages = store
        .all::<RrsPage>()?
        .into_iter()
        .map(|page| (page.page_id.clone(), page))
        .collect::<HashMap<String, RrsPage>>();
    let project_urls = store
        .all::<RrsProject>()?
        .into_iter()
        .map(|project| (project.project_id, project.url))
        .collect::<HashMap<String, String>>();

    let documents = store
        .publications_with_authors()?
        .into_iter()
        .map(|entry| {
            let publication = entry.publication;
            let page = pages.get(&publication.page_id);
            PublicationDocument {
                project_url: publication
                    .project_id
                    .as_ref()
                    .and_then(|id| project_urls.get(id))
                    .cloned(),
                page_url: page.map(|page| page.url.clone()).unwrap_or_default(),
                page_final_url: page
                    .filter(|page| page.final_url != page.url)
                    .map(|page| page.final_url.clone()),
                authors: entry
                    .authors
                    .into_iter()
                    .map(|author| author.full_name)
                    .collect(),
                urls: entry.urls.into_iter().map(|url| url.url).collect(),
                id: publication.publication_id,
                title: publication.title,
                deliverable_code: publication.deliverable_code,
                work_package: publication.work_package,
                link: publication.link,
                file_type: publication.file_type,
                date: publication.date,
                year: publication.year,
                isbn: publication.isbn,
                issn: publication.issn,
                doi: publication.doi,
                event: publication.event,
                location: publication.location,
                pages: publication.pages,
                source_text: publication.source_text,
                harvested_at: Some(publication.harvested_at),
            }
        })
        .collect();

    Ok(documents)
}

pub fn write_json(documents: &[PublicationDocument], path: &Path) -> Result<()> {
    write_json_pretty(path, &documents)?;
    info!(path = %path.display(), documents = documents.len(), "wrote publication json");
    Ok(())
}

/// Bulk API body: an `index` action line followed by the document, one
/// pair per publication, newline terminated.
pub fn es_bulk_body(documents: &[PublicationDocument], index: &str) -> Result<String> {
    let mut body = String::new();
    for document in documents {
        let action = json!({ "index": { "_index": index, "_id": document.id } });
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(
            &serde_json::to_string(document)
                .with_context(|| format!("failed to serialize document {}", document.id))?,
        );
        body.push('\n');
    }
    Ok(body)
}

pub fn push_bulk(config: &HarvestConfig, es_url: &str, body: String) -> Result<BulkSummary> {
    let endpoint = format!("{}/_bulk", es_url.trim_end_matches('/'));
    let fetcher = Fetcher::new(config)?;

    let response = fetcher
        .client()
        .post(&endpoint)
        .header(CONTENT_TYPE, "application/x-ndjson")
        .body(body)
        .send()
        .with_context(|| format!("bulk request failed: {endpoint}"))?;

    let status = response.status();
    let text = response
        .text()
        .with_context(|| format!("failed to read bulk response from {endpoint}"))?;
    if !status.is_success() {
        bail!(
            "bulk request to {endpoint} returned status {}: {}",
            status.as_u16(),
            truncate_chars(text.trim(), 200)
        );
    }
    let payload: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse bulk response from {endpoint}"))?;

    let items = payload
        .get("items")
        .and_then(|value| value.as_array())
        .map(|items| items.as_slice())
        .unwrap_or_default();
    if payload.get("errors").and_then(|value| value.as_bool()) == Some(true) {
        let reason = items
            .iter()
            .find_map(|item| item.pointer("/index/error/reason"))
            .and_then(|value| value.as_str())
            .unwrap_or("unknown error");
        bail!("bulk indexing into {endpoint} reported errors: {reason}");
    }

    info!(endpoint = %endpoint, items = items.len(), "pushed bulk index");
    Ok(BulkSummary {
        items: items.len(),
        took_ms: payload.get("took").and_then(|value| value.as_u64()),
    })
}

pub fn read_documents(path: &Path) -> Result<Vec<PublicationDocument>> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse publication list {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Person;
    use crate::store::{HarvestedPage, HarvestedPublication, RrsPublication, page_id, publication_id};

    fn sample_document() -> PublicationDocument {
        PublicationDocument {
            id: "pub:0001".to_string(),
            page_url: "http://project.example.org/results".to_string(),
            title: "Final Report".to_string(),
            deliverable_code: Some("D7.3".to_string()),
            year: Some(2011),
            authors: vec!["J. Smith".to_string()],
            ..PublicationDocument::default()
        }
    }

    #[test]
    fn bulk_body_pairs_action_and_document_lines() {
        let body = es_bulk_body(&[sample_document()], "rrs").expect("body should build");
        let lines = body.lines().collect::<Vec<&str>>();

        assert_eq!(lines.len(), 2);
        assert!(body.ends_with('\n'));
        assert_eq!(lines[0], r#"{"index":{"_id":"pub:0001","_index":"rrs"}}"#);

        let document: serde_json::Value =
            serde_json::from_str(lines[1]).expect("document line should be json");
        assert_eq!(document["title"], "Final Report");
        assert_eq!(document["deliverable_code"], "D7.3");
        assert_eq!(document["authors"][0], "J. Smith");
    }

    #[test]
    fn documents_read_back_with_defaults_for_missing_fields() {
        let path = std::env::temp_dir().join(format!(
            "rrs_export_test_{}_{}.json",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        fs::write(
            &path,
            r#"[{"page_url": "http://example.org/p", "title": "Minimal", "year": 2009}]"#,
        )
        .expect("fixture should write");

        let documents = read_documents(&path).expect("documents should parse");
        let _ = fs::remove_file(&path);

        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].title, "Minimal");
        assert_eq!(documents[0].year, Some(2009));
        assert!(documents[0].id.is_empty());
        assert!(documents[0].authors.is_empty());
    }

    #[test]
    fn store_documents_carry_page_url_and_author_names() {
        let page_url = "http://project.example.org/results";
        let mut store = Store::open_in_memory().expect("store should open");
        let publication = RrsPublication {
            publication_id: publication_id(page_url, "Final Report", None),
            page_id: page_id(page_url),
            title: "Final Report".to_string(),
            harvested_at: "2011-05-01T00:00:00Z".to_string(),
            ..RrsPublication::default()
        };
        store
            .save_harvest(&HarvestedPage {
                page: RrsPage {
                    page_id: page_id(page_url),
                    project_id: None,
                    url: page_url.to_string(),
                    final_url: page_url.to_string(),
                    sha256: "00".to_string(),
                    fetched_at: "2011-05-01T00:00:00Z".to_string(),
                    region_path: None,
                    region_method: None,
                    region_confidence: None,
                    record_count: 1,
                },
                publications: vec![HarvestedPublication {
                    publication,
                    authors: vec![Person {
                        first: "Anna".to_string(),
                        middle: None,
                        last: "Novak".to_string(),
                    }],
                    urls: Vec::new(),
                }],
            })
            .expect("harvest should save");

        let documents = documents_from_store(&store).expect("documents should load");
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].page_url, page_url);
        assert_eq!(documents[0].authors, vec!["Anna Novak"]);
        assert_eq!(
            documents[0].harvested_at.as_deref(),
            Some("2011-05-01T00:00:00Z")
        );
    }
}

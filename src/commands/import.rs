use std::fs;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::ImportArgs;
use crate::export::{PublicationDocument, read_documents};
use crate::extract::Person;
use crate::store::{
    self, HarvestedPage, HarvestedPublication, RrsPage, RrsProject, RrsPublication, SaveStats,
    Store,
};
use crate::util::{now_utc_string, sha256_hex};

pub fn run(args: ImportArgs) -> Result<()> {
    let raw = fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let source_hash = sha256_hex(&raw);
    let documents = read_documents(&args.input)?;
    let imported_at = now_utc_string();

    let pages = group_documents(
        documents,
        args.project_url.as_deref(),
        &source_hash,
        &imported_at,
    );

    let mut store = Store::open(&args.store.resolved_db_path())?;
    for project_url in pages
        .iter()
        .filter_map(|(project_url, _)| project_url.as_deref())
    {
        store.save_project(&RrsProject {
            project_id: store::project_id(project_url),
            url: project_url.to_string(),
            title: None,
            acronym: None,
            first_seen_at: imported_at.clone(),
            last_seen_at: imported_at.clone(),
        })?;
    }

    let mut total = SaveStats::default();
    for (_, page) in &pages {
        let stats = store.save_harvest(page)?;
        total.publications += stats.publications;
        total.replaced += stats.replaced;
        total.persons_new += stats.persons_new;
        total.author_links += stats.author_links;
        total.urls += stats.urls;
    }

    info!(
        input = %args.input.display(),
        pages = pages.len(),
        publications = total.publications,
        replaced = total.replaced,
        persons_new = total.persons_new,
        "import completed"
    );
    Ok(())
}

/// Groups documents by their page, in first-seen order. Each group carries
/// the project url its publications belong to.
fn group_documents(
    documents: Vec<PublicationDocument>,
    project_override: Option<&str>,
    source_hash: &str,
    imported_at: &str,
) -> Vec<(Option<String>, HarvestedPage)> {
    let mut pages = Vec::<(Option<String>, HarvestedPage)>::new();

    for document in documents {
        if document.title.trim().is_empty() || document.page_url.trim().is_empty() {
            warn!(id = %document.id, "skipping document without title or page_url");
            continue;
        }

        let project_url = project_override
            .map(str::to_string)
            .or_else(|| document.project_url.clone());
        let project_id = project_url.as_deref().map(store::project_id);
        let page_id = store::page_id(&document.page_url);

        let position = match pages
            .iter()
            .position(|(_, page)| page.page.page_id == page_id)
        {
            Some(position) => position,
            None => {
                pages.push((
                    project_url.clone(),
                    HarvestedPage {
                        page: RrsPage {
                            page_id: page_id.clone(),
                            project_id: project_id.clone(),
                            url: document.page_url.clone(),
                            final_url: document
                                .page_final_url
                                .clone()
                                .unwrap_or_else(|| document.page_url.clone()),
                            sha256: source_hash.to_string(),
                            fetched_at: imported_at.to_string(),
                            region_path: None,
                            region_method: Some("import".to_string()),
                            region_confidence: None,
                            record_count: 0,
                        },
                        publications: Vec::new(),
                    },
                ));
                pages.len() - 1
            }
        };

        let authors = document
            .authors
            .iter()
            .filter_map(|name| {
                let person = Person::parse(name);
                if person.is_none() {
                    warn!(id = %document.id, author = %name, "unparsed author name dropped");
                }
                person
            })
            .collect::<Vec<Person>>();
        let publication_id = if document.id.trim().is_empty() {
            store::publication_id(&document.page_url, &document.title, document.link.as_deref())
        } else {
            document.id.clone()
        };
        let source_hash = document
            .source_text
            .as_deref()
            .map(|text| sha256_hex(text.as_bytes()));

        let page = &mut pages[position].1;
        page.page.record_count += 1;
        page.publications.push(HarvestedPublication {
            publication: RrsPublication {
                publication_id,
                project_id,
                page_id,
                title: document.title,
                deliverable_code: document.deliverable_code,
                work_package: document.work_package,
                link: document.link,
                file_type: document.file_type,
                date: document.date,
                year: document.year,
                isbn: document.isbn,
                issn: document.issn,
                doi: document.doi,
                event: document.event,
                location: document.location,
                pages: document.pages,
                source_text: document.source_text,
                source_hash,
                harvested_at: document
                    .harvested_at
                    .unwrap_or_else(|| imported_at.to_string()),
            },
            authors,
            urls: document.urls,
        });
    }

    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::pipeline::PageHarvester;
    use crate::config::HarvestConfig;
    use crate::export::documents_from_store;
    use crate::extract::EntityExtractor;
    use crate::fetch::FetchedPage;
    use crate::records::RecordBuilder;
    use crate::region::RegionDetector;

    fn document(page_url: &str, title: &str) -> PublicationDocument {
        PublicationDocument {
            page_url: page_url.to_string(),
            title: title.to_string(),
            authors: vec!["J. Smith".to_string(), "not a name".to_string()],
            ..PublicationDocument::default()
        }
    }

    #[test]
    fn documents_group_by_page_and_skip_untitled() {
        let documents = vec![
            document("http://a.example.org/results", "First"),
            document("http://b.example.org/papers", "Second"),
            document("http://a.example.org/results", "Third"),
            document("http://a.example.org/results", "  "),
        ];

        let pages = group_documents(
            documents,
            Some("http://a.example.org/"),
            "hash",
            "2011-01-01T00:00:00Z",
        );

        assert_eq!(pages.len(), 2);
        let (project_url, first_page) = &pages[0];
        assert_eq!(project_url.as_deref(), Some("http://a.example.org/"));
        assert_eq!(first_page.page.record_count, 2);
        assert_eq!(first_page.publications[1].publication.title, "Third");
        assert_eq!(first_page.publications[0].authors.len(), 1);
        assert!(
            first_page.publications[0]
                .publication
                .publication_id
                .starts_with("pub:")
        );
        assert_eq!(
            first_page.publications[0].publication.harvested_at,
            "2011-01-01T00:00:00Z"
        );
    }

    #[test]
    fn grouped_documents_store_cleanly() {
        let pages = group_documents(
            vec![document("http://a.example.org/results", "First")],
            Some("http://a.example.org/"),
            "hash",
            "2011-01-01T00:00:00Z",
        );

        let mut store = Store::open_in_memory().expect("store should open");
        store
            .save_project(&RrsProject {
                project_id: store::project_id("http://a.example.org/"),
                url: "http://a.example.org/".to_string(),
                title: None,
                acronym: None,
                first_seen_at: "2011-01-01T00:00:00Z".to_string(),
                last_seen_at: "2011-01-01T00:00:00Z".to_string(),
            })
            .expect("project should save");
        let stats = store.save_harvest(&pages[0].1).expect("page should save");

        assert_eq!(stats.publications, 1);
        assert_eq!(stats.persons_new, 1);
        assert_eq!(store.counts().expect("counts").projects, 1);
    }

    #[test]
    fn exported_saved_copy_reimports_onto_the_same_page() {
        let config = HarvestConfig::default();
        let detector = RegionDetector::new(&config).expect("detector should build");
        let builder = RecordBuilder::new(&config, &detector).expect("builder should build");
        let extractor = EntityExtractor::new().expect("extractor should build");
        let harvester = PageHarvester {
            config: &config,
            detector: &detector,
            builder: &builder,
            extractor: &extractor,
        };
        let body = r#"<html><body>
            <h2>Deliverables</h2>
            <ul>
              <li><a href="docs/D1.1.pdf">D1.1 Requirements Analysis</a> (12 May 2009)</li>
              <li><a href="docs/D2.1.pdf">D2.1 Architecture Specification</a> (3 June 2009)</li>
              <li><a href="docs/D3.1.pdf">D3.1 Evaluation Plan</a> (4 July 2009)</li>
            </ul>
            </body></html>"#;
        let saved_copy = FetchedPage {
            url: "file:///tmp/saved/results.html".to_string(),
            final_url: "http://project.example.org/results.html".to_string(),
            status: 200,
            content_type: Some("text/html".to_string()),
            body: body.to_string(),
            sha256: sha256_hex(body.as_bytes()),
            fetched_at: "2010-06-01T00:00:00Z".to_string(),
        };

        let harvest = harvester.harvest(&saved_copy, None);
        assert_eq!(
            harvest.harvested.page.page_id,
            store::page_id("file:///tmp/saved/results.html")
        );

        let mut store = Store::open_in_memory().expect("store should open");
        store
            .save_harvest(&harvest.harvested)
            .expect("harvest should save");

        let documents = documents_from_store(&store).expect("documents should load");
        assert_eq!(documents.len(), 3);
        assert_eq!(
            documents[0].page_final_url.as_deref(),
            Some("http://project.example.org/results.html")
        );

        let pages = group_documents(documents, None, "hash", "2011-01-01T00:00:00Z");
        assert_eq!(pages.len(), 1);
        let stats = store.save_harvest(&pages[0].1).expect("import should save");

        assert_eq!(stats.replaced, 3);
        let counts = store.counts().expect("counts");
        assert_eq!(counts.pages, 1);
        assert_eq!(counts.publications, 3);
        let stored = store.all::<RrsPage>().expect("pages should load");
        assert_eq!(stored[0].final_url, "http://project.example.org/results.html");
    }
}

mod query;
mod rows;
mod schema;


use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde::Serialize;

use crate::extract::Person;
use crate::util::{ensure_directory, normalize_whitespace, stable_id, truncate_chars};

pub use query::{Direction, FluentQuery, Op};
pub use rows::{RrsPage, RrsPerson, RrsProject, RrsPublication, RrsPublicationPerson, RrsRow, RrsUrl};
pub use schema::DB_SCHEMA_VERSION;

pub struct Store {
    connection: Connection,
}

#[derive(Debug, Clone)]
pub struct HarvestedPublication {
    pub publication: RrsPublication,
    pub authors: Vec<Person>,
    pub urls: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct HarvestedPage {
    pub page: RrsPage,
    pub publications: Vec<HarvestedPublication>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SaveStats {
    pub publications: usize,
    pub replaced: usize,
    pub persons_new: usize,
    pub author_links: usize,
    pub urls: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub projects: i64,
    pub pages: i64,
    pub publications: i64,
    pub persons: i64,
    pub urls: i64,
}

/// Structured listing criteria for stored publications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicationFilter {
    pub year_from: Option<i64>,
    pub year_to: Option<i64>,
    pub undated: bool,
    pub deliverables_only: bool,
    pub newest_first: bool,
}

impl PublicationFilter {
    pub fn is_empty(&self) -> bool {
        self.year_from.is_none()
            && self.year_to.is_none()
            && !self.undated
            && !self.deliverables_only
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicationWithAuthors {
    pub publication: RrsPublication,
    pub authors: Vec<RrsPerson>,
    pub urls: Vec<RrsUrl>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub publication_id: String,
    pub title: String,
    pub year: Option<i64>,
    pub link: Option<String>,
    pub snippet: String,
    pub match_kind: String,
    pub score: f64,
}

pub fn project_id(url: &str) -> String {
    stable_id("prj", &[url])
}

pub fn page_id(url: &str) -> String {
    stable_id("page", &[url])
}

pub fn publication_id(page_url: &str, title: &str, link: Option<&str>) -> String {
    stable_id("pub", &[page_url, title, link.unwrap_or_default()])
}

/// Person row keyed by the lower-cased full name, so spelling variants that
/// only differ in case share one row.
pub fn person_row(person: &Person) -> RrsPerson {
    let full_name = person.full_name();
    RrsPerson {
        person_id: stable_id("per", &[full_name.to_lowercase().as_str()]),
        first_name: person.first.clone(),
        middle_name: person.middle.clone(),
        last_name: person.last.clone(),
        full_name,
    }
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                ensure_directory(parent)?;
            }
        }

        let connection = Connection::open(path)
            .with_context(|| format!("failed to open database: {}", path.display()))?;
        schema::configure_connection(&connection)?;
        schema::ensure_schema(&connection)?;

        Ok(Self { connection })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let connection =
            Connection::open_in_memory().context("failed to open in-memory database")?;
        connection
            .pragma_update(None, "foreign_keys", "ON")
            .context("failed to enable foreign keys")?;
        schema::ensure_schema(&connection)?;

        Ok(Self { connection })
    }

    pub fn upsert<T: RrsRow>(&self, row: &T) -> Result<()> {
        upsert_row(&self.connection, row)
    }

    /// Row whose key columns equal `key`, given in `T::KEY` order.
    pub fn find<T: RrsRow>(&self, key: &[Value]) -> Result<Option<T>> {
        if key.len() != T::KEY.len() {
            bail!(
                "{} is keyed by {} column(s), got {}",
                T::TABLE,
                T::KEY.len(),
                key.len()
            );
        }

        let mut query = FluentQuery::select(T::TABLE).columns(T::COLUMNS);
        for (column, value) in T::KEY.iter().zip(key) {
            query = query.filter(column, Op::Eq, value.clone());
        }
        let (sql, params) = query.limit(1).build()?;

        let mut statement = self
            .connection
            .prepare(&sql)
            .with_context(|| format!("failed to prepare lookup on {}", T::TABLE))?;
        statement
            .query_row(params_from_iter(params.iter()), T::from_row)
            .optional()
            .with_context(|| format!("failed to read from {}", T::TABLE))
    }

    pub fn all<T: RrsRow>(&self) -> Result<Vec<T>> {
        let mut query = FluentQuery::select(T::TABLE).columns(T::COLUMNS);
        for key in T::KEY {
            query = query.order_by(key, Direction::Asc);
        }
        select_rows(&self.connection, &query)
    }

    /// Stores the project, keeping `first_seen_at` and a known title of an earlier visit.
    pub fn save_project(&self, project: &RrsProject) -> Result<RrsProject> {
        let mut row = project.clone();
        if let Some(existing) =
            self.find::<RrsProject>(&[Value::from(project.project_id.clone())])?
        {
            row.first_seen_at = existing.first_seen_at;
            if row.title.is_none() {
                row.title = existing.title;
            }
            if row.acronym.is_none() {
                row.acronym = existing.acronym;
            }
        }

        self.upsert(&row)?;
        schema::touch_updated_at(&self.connection)?;
        Ok(row)
    }

    /// Writes one harvested page in a single transaction. Publications stored
    /// earlier for the same page are replaced.
    pub fn save_harvest(&mut self, harvest: &HarvestedPage) -> Result<SaveStats> {
        let tx = self
            .connection
            .transaction()
            .context("failed to start harvest transaction")?;

        upsert_row(&tx, &harvest.page)?;
        let mut stats = SaveStats {
            replaced: delete_page_publications(&tx, &harvest.page.page_id)?,
            ..SaveStats::default()
        };

        let mut stored = HashSet::new();
        for item in &harvest.publications {
            let publication = &item.publication;
            if !stored.insert(publication.publication_id.clone()) {
                continue;
            }

            upsert_row(&tx, publication)?;
            tx.execute(
                "INSERT INTO rrs_publication_fts(publication_id, title, source_text) VALUES (?1, ?2, ?3)",
                params![
                    publication.publication_id,
                    publication.title,
                    publication.source_text.as_deref().unwrap_or_default(),
                ],
            )
            .context("failed to index publication text")?;
            stats.publications += 1;

            let mut linked = HashSet::new();
            for person in &item.authors {
                let person = person_row(person);
                if !linked.insert(person.person_id.clone()) {
                    continue;
                }
                if !row_exists::<RrsPerson>(&tx, &[Value::from(person.person_id.clone())])? {
                    upsert_row(&tx, &person)?;
                    stats.persons_new += 1;
                }
                upsert_row(
                    &tx,
                    &RrsPublicationPerson {
                        publication_id: publication.publication_id.clone(),
                        person_id: person.person_id,
                        author_rank: linked.len() as i64,
                    },
                )?;
                stats.author_links += 1;
            }

            let mut seen_urls = HashSet::new();
            for url in &item.urls {
                if !seen_urls.insert(url.as_str()) {
                    continue;
                }
                let link_type = if publication.link.as_deref() == Some(url.as_str()) {
                    "primary"
                } else {
                    "related"
                };
                upsert_row(
                    &tx,
                    &RrsUrl {
                        url_id: stable_id("url", &[publication.publication_id.as_str(), url.as_str()]),
                        publication_id: publication.publication_id.clone(),
                        url: url.clone(),
                        link_type: link_type.to_string(),
                    },
                )?;
                stats.urls += 1;
            }
        }

        schema::touch_updated_at(&tx)?;
        tx.commit().context("failed to commit harvest transaction")?;

        Ok(stats)
    }

    pub fn publications_with_authors(&self) -> Result<Vec<PublicationWithAuthors>> {
        let publications = select_rows::<RrsPublication>(
            &self.connection,
            &FluentQuery::select(RrsPublication::TABLE)
                .columns(RrsPublication::COLUMNS)
                .order_by("page_id", Direction::Asc)
                .order_by("title", Direction::Asc),
        )?;

        let mut authors_statement = self.connection.prepare(
            "
            SELECT
              p.person_id AS person_id,
              p.full_name AS full_name,
              p.first_name AS first_name,
              p.middle_name AS middle_name,
              p.last_name AS last_name
            FROM rrs_publication_person pp
            JOIN rrs_person p ON p.person_id = pp.person_id
            WHERE pp.publication_id = ?1
            ORDER BY pp.author_rank ASC
            ",
        )?;

        let mut out = Vec::with_capacity(publications.len());
        for publication in publications {
            let authors = authors_statement
                .query_map([&publication.publication_id], RrsPerson::from_row)?
                .collect::<rusqlite::Result<Vec<RrsPerson>>>()
                .with_context(|| {
                    format!("failed to load authors of {}", publication.publication_id)
                })?;
            let urls = select_rows::<RrsUrl>(
                &self.connection,
                &FluentQuery::select(RrsUrl::TABLE)
                    .columns(RrsUrl::COLUMNS)
                    .filter("publication_id", Op::Eq, publication.publication_id.clone())
                    .order_by("link_type", Direction::Asc)
                    .order_by("url", Direction::Asc),
            )?;

            out.push(PublicationWithAuthors {
                publication,
                authors,
                urls,
            });
        }

        Ok(out)
    }

    /// Full-text search over titles and source text. Falls back to a title
    /// `LIKE` match when the index has no hit.
    pub fn search(&self, query_text: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let fts_query = to_fts_query(query_text);
        if fts_query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let hits = self.fts_matches(&fts_query, limit)?;
        if !hits.is_empty() {
            return Ok(hits);
        }

        self.like_matches(&normalize_whitespace(query_text), limit)
    }

    fn fts_matches(&self, fts_query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let mut statement = self.connection.prepare(
            "
            SELECT
              p.publication_id,
              p.title,
              p.year,
              p.link,
              snippet(rrs_publication_fts, 2, '[', ']', ' ... ', 16),
              bm25(rrs_publication_fts)
            FROM rrs_publication_fts
            JOIN rrs_publication p ON p.publication_id = rrs_publication_fts.publication_id
            WHERE rrs_publication_fts MATCH ?1
            ORDER BY bm25(rrs_publication_fts) ASC
            LIMIT ?2
            ",
        )?;

        let rows = statement.query_map(params![fts_query, limit as i64], |row| {
            let title: String = row.get(1)?;
            let snippet: String = row.get(4)?;
            let rank: f64 = row.get(5)?;
            Ok(SearchHit {
                publication_id: row.get(0)?,
                year: row.get(2)?,
                link: row.get(3)?,
                snippet: if snippet.trim().is_empty() {
                    title.clone()
                } else {
                    snippet
                },
                title,
                match_kind: "fts".to_string(),
                score: -rank,
            })
        })?;

        rows.collect::<rusqlite::Result<Vec<SearchHit>>>()
            .context("failed to run full-text search")
    }

    fn like_matches(&self, query_text: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let pattern = format!("%{}%", query_text.replace(['%', '_'], " "));
        let publications = select_rows::<RrsPublication>(
            &self.connection,
            &FluentQuery::select(RrsPublication::TABLE)
                .columns(RrsPublication::COLUMNS)
                .filter("title", Op::Like, pattern)
                .order_by("title", Direction::Asc)
                .limit(limit),
        )?;

        Ok(publications
            .into_iter()
            .map(|publication| SearchHit {
                snippet: truncate_chars(
                    publication
                        .source_text
                        .as_deref()
                        .unwrap_or(publication.title.as_str()),
                    160,
                ),
                publication_id: publication.publication_id,
                title: publication.title,
                year: publication.year,
                link: publication.link,
                match_kind: "like".to_string(),
                score: 0.0,
            })
            .collect())
    }

    /// Publications matching `filter`, by year then title.
    pub fn list_publications(
        &self,
        filter: &PublicationFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let mut query =
            FluentQuery::select(RrsPublication::TABLE).columns(RrsPublication::COLUMNS);
        if let Some(year) = filter.year_from {
            query = query.filter("year", Op::Ge, year);
        }
        if let Some(year) = filter.year_to {
            query = query.filter("year", Op::Le, year);
        }
        if filter.undated {
            query = query.filter_null("year", Op::IsNull);
        }
        if filter.deliverables_only {
            query = query.filter_null("deliverable_code", Op::IsNotNull);
        }
        let direction = if filter.newest_first {
            Direction::Desc
        } else {
            Direction::Asc
        };
        let query = query
            .order_by("year", direction)
            .order_by("title", Direction::Asc)
            .limit(limit);

        let publications = select_rows::<RrsPublication>(&self.connection, &query)?;
        Ok(publications
            .into_iter()
            .map(|publication| SearchHit {
                snippet: publication
                    .deliverable_code
                    .clone()
                    .or_else(|| publication.date.clone())
                    .unwrap_or_default(),
                publication_id: publication.publication_id,
                title: publication.title,
                year: publication.year,
                link: publication.link,
                match_kind: "list".to_string(),
                score: 0.0,
            })
            .collect())
    }

    pub fn counts(&self) -> Result<StoreCounts> {
        Ok(StoreCounts {
            projects: count_rows(&self.connection, RrsProject::TABLE)?,
            pages: count_rows(&self.connection, RrsPage::TABLE)?,
            publications: count_rows(&self.connection, RrsPublication::TABLE)?,
            persons: count_rows(&self.connection, RrsPerson::TABLE)?,
            urls: count_rows(&self.connection, RrsUrl::TABLE)?,
        })
    }

    pub fn metadata(&self) -> Result<Vec<(String, String)>> {
        let mut statement = self
            .connection
            .prepare("SELECT key, value FROM metadata ORDER BY key ASC")?;
        let rows = statement.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<rusqlite::Result<Vec<(String, String)>>>()
            .context("failed to read metadata")
    }
}

fn upsert_row<T: RrsRow>(connection: &Connection, row: &T) -> Result<()> {
    let mut query = FluentQuery::insert(T::TABLE);
    for (column, value) in T::COLUMNS.iter().zip(row.values()) {
        query = query.value(column, value);
    }
    let (sql, params) = query.on_conflict(T::KEY).build()?;

    connection
        .execute(&sql, params_from_iter(params.iter()))
        .with_context(|| format!("failed to upsert into {}", T::TABLE))?;
    Ok(())
}

fn row_exists<T: RrsRow>(connection: &Connection, key: &[Value]) -> Result<bool> {
    let mut query = FluentQuery::count(T::TABLE);
    for (column, value) in T::KEY.iter().zip(key) {
        query = query.filter(column, Op::Eq, value.clone());
    }
    let (sql, params) = query.build()?;

    let count: i64 = connection
        .query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))
        .with_context(|| format!("failed to count rows of {}", T::TABLE))?;
    Ok(count > 0)
}

fn select_rows<T: RrsRow>(connection: &Connection, query: &FluentQuery) -> Result<Vec<T>> {
    let (sql, params) = query.build()?;
    let mut statement = connection
        .prepare(&sql)
        .with_context(|| format!("failed to prepare select on {}", T::TABLE))?;
    let rows = statement.query_map(params_from_iter(params.iter()), T::from_row)?;
    rows.collect::<rusqlite::Result<Vec<T>>>()
        .with_context(|| format!("failed to read rows of {}", T::TABLE))
}

fn count_rows(connection: &Connection, table: &str) -> Result<i64> {
    let (sql, params) = FluentQuery::count(table).build()?;
    connection
        .query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))
        .with_context(|| format!("failed to count rows of {table}"))
}

/// Author links and urls go with the publication rows through `ON DELETE CASCADE`.
fn delete_page_publications(connection: &Connection, page_id: &str) -> Result<usize> {
    connection
        .execute(
            "DELETE FROM rrs_publication_fts WHERE publication_id IN
             (SELECT publication_id FROM rrs_publication WHERE page_id = ?1)",
            [page_id],
        )
        .context("failed to clear publication index")?;

    let (sql, params) = FluentQuery::delete(RrsPublication::TABLE)
        .filter("page_id", Op::Eq, page_id.to_string())
        .build()?;
    connection
        .execute(&sql, params_from_iter(params.iter()))
        .with_context(|| format!("failed to replace publications of {page_id}"))
}

fn to_fts_query(query_text: &str) -> String {
    query_text
        .split_whitespace()
        .map(|token| token.replace('"', ""))
        .filter(|token| !token.is_empty())
        .map(|token| format!("\"{token}\""))
        .collect::<Vec<String>>()
        .join(" ")
}

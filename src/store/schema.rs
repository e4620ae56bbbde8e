use anyhow::{Context, Result, bail};
use rusqlite::Connection;

use crate::util::now_utc_string;

pub const DB_SCHEMA_VERSION: &str = "1";

pub(super) fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign keys")?;
    Ok(())
}

pub(super) fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS rrs_project (
          project_id TEXT PRIMARY KEY,
          url TEXT NOT NULL,
          title TEXT,
          acronym TEXT,
          first_seen_at TEXT NOT NULL,
          last_seen_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS rrs_page (
          page_id TEXT PRIMARY KEY,
          project_id TEXT,
          url TEXT NOT NULL,
          final_url TEXT NOT NULL,
          sha256 TEXT NOT NULL,
          fetched_at TEXT NOT NULL,
          region_path TEXT,
          region_method TEXT,
          region_confidence REAL,
          record_count INTEGER NOT NULL DEFAULT 0,
          FOREIGN KEY(project_id) REFERENCES rrs_project(project_id)
        );

        CREATE TABLE IF NOT EXISTS rrs_publication (
          publication_id TEXT PRIMARY KEY,
          project_id TEXT,
          page_id TEXT NOT NULL,
          title TEXT NOT NULL,
          deliverable_code TEXT,
          work_package TEXT,
          link TEXT,
          file_type TEXT,
          date TEXT,
          year INTEGER,
          isbn TEXT,
          issn TEXT,
          doi TEXT,
          event TEXT,
          location TEXT,
          pages TEXT,
          source_text TEXT,
          source_hash TEXT,
          harvested_at TEXT NOT NULL,
          FOREIGN KEY(project_id) REFERENCES rrs_project(project_id),
          FOREIGN KEY(page_id) REFERENCES rrs_page(page_id)
        );

        CREATE TABLE IF NOT EXISTS rrs_person (
          person_id TEXT PRIMARY KEY,
          full_name TEXT NOT NULL UNIQUE,
          first_name TEXT NOT NULL,
          middle_name TEXT,
          last_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS rrs_publication_person (
          publication_id TEXT NOT NULL,
          person_id TEXT NOT NULL,
          author_rank INTEGER NOT NULL,
          PRIMARY KEY (publication_id, person_id),
          FOREIGN KEY(publication_id) REFERENCES rrs_publication(publication_id) ON DELETE CASCADE,
          FOREIGN KEY(person_id) REFERENCES rrs_person(person_id)
        );

        CREATE TABLE IF NOT EXISTS rrs_url (
          url_id TEXT PRIMARY KEY,
          publication_id TEXT NOT NULL,
          url TEXT NOT NULL,
          link_type TEXT NOT NULL,
          FOREIGN KEY(publication_id) REFERENCES rrs_publication(publication_id) ON DELETE CASCADE
        );
        ",
        )
        .context("failed to create rrs tables")?;

    ensure_column_exists(connection, "rrs_publication", "pages TEXT")?;
    ensure_column_exists(connection, "rrs_publication", "source_hash TEXT")?;
    ensure_column_exists(connection, "rrs_page", "region_confidence REAL")?;

    connection
        .execute(
            "
            CREATE VIRTUAL TABLE IF NOT EXISTS rrs_publication_fts
            USING fts5(publication_id UNINDEXED, title, source_text)
            ",
            [],
        )
        .context("failed to initialize FTS5 table rrs_publication_fts")?;

    connection.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_rrs_page_project ON rrs_page(project_id);
        CREATE INDEX IF NOT EXISTS idx_rrs_publication_page ON rrs_publication(page_id);
        CREATE INDEX IF NOT EXISTS idx_rrs_publication_project ON rrs_publication(project_id);
        CREATE INDEX IF NOT EXISTS idx_rrs_publication_person_person ON rrs_publication_person(person_id);
        CREATE INDEX IF NOT EXISTS idx_rrs_url_publication ON rrs_url(publication_id);
        ",
    )?;

    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    touch_updated_at(connection)?;

    Ok(())
}

pub(super) fn touch_updated_at(connection: &Connection) -> Result<()> {
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now_utc_string()],
    )?;
    Ok(())
}

fn ensure_column_exists(
    connection: &Connection,
    table_name: &str,
    column_definition: &str,
) -> Result<()> {
    let Some(column_name) = column_definition.split_whitespace().next() else {
        bail!("invalid column definition: {column_definition}");
    };

    let pragma_sql = format!("PRAGMA table_info({table_name})");
    let mut statement = connection
        .prepare(&pragma_sql)
        .with_context(|| format!("failed to inspect schema for table {table_name}"))?;

    let mut rows = statement.query([])?;
    while let Some(row) = rows.next()? {
        let existing_name: String = row.get(1)?;
        if existing_name == column_name {
            return Ok(());
        }
    }

    let alter_sql = format!("ALTER TABLE {table_name} ADD COLUMN {column_definition}");
    connection
        .execute(&alter_sql, [])
        .with_context(|| format!("failed to add column {column_name} on {table_name}"))?;

    Ok(())
}

use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;

use crate::cli::QueryArgs;
use crate::store::{PublicationFilter, SearchHit, Store};

#[derive(Debug, Serialize)]
struct QueryResponse<'a> {
    query: Option<&'a str>,
    limit: usize,
    returned: usize,
    results: &'a [SearchHit],
}

pub fn run(args: QueryArgs) -> Result<()> {
    let db_path = args.store.resolved_db_path();
    if !db_path.exists() {
        bail!("database not found: {} (run harvest first)", db_path.display());
    }

    let store = Store::open(&db_path)?;
    let hits = match args.query.as_deref() {
        Some(query) => store.search(query, args.limit)?,
        None => {
            let filter = PublicationFilter {
                year_from: args.since,
                year_to: args.until,
                undated: args.undated,
                deliverables_only: args.deliverables,
                newest_first: args.newest_first,
            };
            if filter.is_empty() {
                info!("no query or filter given, listing stored publications");
            }
            store.list_publications(&filter, args.limit)?
        }
    };
    let label = args.query.as_deref().unwrap_or("(listing)");
    info!(query = %label, returned = hits.len(), "query completed");

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        let response = QueryResponse {
            query: args.query.as_deref(),
            limit: args.limit,
            returned: hits.len(),
            results: &hits,
        };
        serde_json::to_writer_pretty(&mut output, &response)
            .context("failed to serialize query json output")?;
        writeln!(output)?;
    } else {
        writeln!(output, "Query: {label}")?;
        writeln!(output, "Results: {}", hits.len())?;
        for (index, hit) in hits.iter().enumerate() {
            writeln!(
                output,
                "{}.\t{}\t{}\tmatch={} score={:.4}",
                index + 1,
                hit.title,
                hit.year.map(|year| year.to_string()).unwrap_or_else(|| "-".to_string()),
                hit.match_kind,
                hit.score
            )?;
            if let Some(link) = &hit.link {
                writeln!(output, "\t{link}")?;
            }
            writeln!(output, "\t{}", hit.snippet)?;
        }
    }
    output.flush()?;
    Ok(())
}

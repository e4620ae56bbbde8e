use std::fs;
use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::citation::{Citation, CitationParser};
use crate::cli::CitationArgs;
use crate::extract::Person;

pub fn run(args: CitationArgs) -> Result<()> {
    let parser = CitationParser::new()?;

    let mut inputs = args.citations.clone();
    if let Some(path) = &args.file {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let entries = parser.split_citations(&raw);
        info!(path = %path.display(), citations = entries.len(), "split reference list");
        inputs.extend(entries);
    }
    if inputs.is_empty() {
        bail!("no citations given: pass citation text or --file");
    }

    let citations = inputs
        .iter()
        .map(|text| parser.parse(text))
        .collect::<Vec<Citation>>();

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut output, &citations)
            .context("failed to serialize citation json output")?;
        writeln!(output)?;
    } else {
        for (index, citation) in citations.iter().enumerate() {
            write_citation(&mut output, index + 1, citation)?;
        }
    }
    output.flush()?;
    Ok(())
}

fn write_citation(output: &mut impl Write, number: usize, citation: &Citation) -> Result<()> {
    writeln!(output, "[{number}] {}", citation.raw)?;
    if !citation.authors.is_empty() {
        let names = citation
            .authors
            .iter()
            .map(Person::full_name)
            .collect::<Vec<String>>();
        writeln!(output, "\tauthors: {}", names.join("; "))?;
    }

    let fields = [
        ("title", citation.title.clone()),
        ("venue", citation.venue.clone()),
        ("year", citation.year.map(|year| year.to_string())),
        ("volume", citation.volume.clone()),
        ("issue", citation.issue.clone()),
        ("pages", citation.pages.clone()),
        ("publisher", citation.publisher.clone()),
        ("doi", citation.doi.clone()),
        ("isbn", citation.isbn.clone()),
        ("url", citation.url.clone()),
    ];
    for (name, value) in fields {
        if let Some(value) = value {
            writeln!(output, "\t{name}: {value}")?;
        }
    }
    Ok(())
}

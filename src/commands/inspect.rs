use std::io::{self, Write};

use anyhow::Result;
use tracing::info;

use crate::cli::InspectArgs;
use crate::commands::pipeline::load_source;
use crate::config::HarvestConfig;
use crate::dom::DomTree;
use crate::meta::extract_article_meta;
use crate::records::RecordBuilder;
use crate::region::{RegionDetector, RegionOutcome};
use crate::sequence::find_record_container;
use crate::util::truncate_chars;

const PREVIEW_CHARS: usize = 96;

pub fn run(args: InspectArgs) -> Result<()> {
    let config = HarvestConfig::load(args.config.as_deref())?;
    let page = load_source(&args.source, &args.cache_root, &config)?;
    let tree = DomTree::parse(&page.body);
    let detector = RegionDetector::new(&config)?;
    let builder = RecordBuilder::new(&config, &detector)?;

    info!(url = %page.final_url, nodes = tree.len(), "inspecting page");

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "Page: {}", page.final_url)?;

    let meta = extract_article_meta(&tree);
    if !meta.is_empty() {
        writeln!(
            output,
            "Article meta: title={:?} authors={} date={}",
            meta.title.as_deref().unwrap_or_default(),
            meta.authors.len(),
            meta.date.as_deref().unwrap_or("-")
        )?;
    }

    let region = match detector.find_region(&tree) {
        RegionOutcome::Found(region) => region,
        RegionOutcome::Missing(miss) => {
            writeln!(output, "Region: none ({})", miss.as_str())?;
            output.flush()?;
            return Ok(());
        }
    };

    writeln!(
        output,
        "Region: {} method={} confidence={:.2} document_links={}/{} page_document_links={}",
        region.path,
        region.method.as_str(),
        region.confidence,
        region.document_links,
        region.total_links,
        region.page_document_links
    )?;
    if let Some(heading) = &region.heading {
        writeln!(output, "Heading: {heading}")?;
    }

    let Some(segmentation) = find_record_container(&tree, region.node, &config) else {
        let records = builder.records_from_region(&tree, region.node, &page.final_url);
        writeln!(
            output,
            "Container: none, {} record(s) from document links",
            records.len()
        )?;
        for record in &records {
            writeln!(output, "\t{}", truncate_chars(&record.title, PREVIEW_CHARS))?;
        }
        output.flush()?;
        return Ok(());
    };

    writeln!(output, "Container: {}", segmentation.container_path)?;
    writeln!(
        output,
        "Pattern: start={} [{}] tolerance={} frequency_gap={} score={:.3}",
        segmentation.start_label,
        segmentation.pattern.join(" "),
        segmentation.tolerance,
        segmentation.frequency_gap,
        segmentation.score
    )?;
    writeln!(
        output,
        "Segments: {} matched={} with_links={}",
        segmentation.segments.len(),
        segmentation.matched_count(),
        segmentation.link_segments
    )?;

    for (index, segment) in segmentation.segments.iter().enumerate() {
        let text = tree.text_of_nodes(&segment.nodes);
        writeln!(
            output,
            "{}.\t{}\tdistance={}\t[{}]\t{}",
            index + 1,
            if segment.matched { "match" } else { "other" },
            segment.distance,
            segment.labels.join(" "),
            truncate_chars(&text, PREVIEW_CHARS)
        )?;
    }

    let records = builder.build_records(&tree, &segmentation, &page.final_url);
    writeln!(output, "Records: {}", records.len())?;
    for record in &records {
        writeln!(
            output,
            "{}.\t{}\t{}",
            record.index,
            truncate_chars(&record.title, PREVIEW_CHARS),
            record.link.as_deref().unwrap_or("-")
        )?;
    }

    output.flush()?;
    Ok(())
}

use std::collections::HashSet;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;

use crate::config::HarvestConfig;
use crate::dom::{DomTree, Link, NodeId};
use crate::fetch::{document_extension, resolve_link};
use crate::region::RegionDetector;
use crate::sequence::Segmentation;

const EMPHASIS_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6", "strong", "b", "em", "i"];
const MIN_TITLE_CHARS: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub index: usize,
    pub title: String,
    pub link: Option<String>,
    pub links: Vec<String>,
    pub text: String,
    pub file_type: Option<String>,
    pub matched: bool,
    pub node_path: String,
}

pub struct RecordBuilder<'a> {
    config: &'a HarvestConfig,
    detector: &'a RegionDetector<'a>,
    generic_link_text: Regex,
    size_note: Regex,
    leading_code: Regex,
    title_split: Regex,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(config: &'a HarvestConfig, detector: &'a RegionDetector<'a>) -> Result<Self> {
        Ok(Self {
            config,
            detector,
            generic_link_text: Regex::new(
                r"(?i)^[\[(]?\s*(?:pdf|ps|doc|docx|odt|rtf|ppt|pptx|zip|download|here|click here|link|more|more\.\.\.|read more|full ?text|abstract|bibtex|details|get it|file|view)\s*[\])]?$",
            )
            .context("failed to compile generic link text regex")?,
            size_note: Regex::new(r"(?i)^[\[(]?\s*\d+(?:[.,]\d+)?\s*(?:[kmg]i?b|bytes?)\s*[\])]?$")
                .context("failed to compile size note regex")?,
            leading_code: Regex::new(
                r"^(?:(?:D|WP)\s?\d{1,2}(?:\.\d{1,2})*|\[\d+\]|\d+\.)\s*[-–:.)]?\s*",
            )
            .context("failed to compile leading code regex")?,
            title_split: Regex::new(r"\s+[-–]\s+|:\s+|\.\s+")
                .context("failed to compile title split regex")?,
        })
    }

    pub fn is_generic_link_text(&self, text: &str) -> bool {
        let trimmed = text.trim();
        trimmed.is_empty()
            || self.generic_link_text.is_match(trimmed)
            || self.size_note.is_match(trimmed)
            || trimmed.starts_with("http://")
            || trimmed.starts_with("https://")
    }

    pub fn build_records(
        &self,
        tree: &DomTree,
        segmentation: &Segmentation,
        base_url: &str,
    ) -> Vec<Record> {
        let any_links = segmentation.link_segments > 0;
        let mut records = Vec::new();

        for segment in &segmentation.segments {
            let links = tree.links_in_nodes(&segment.nodes);
            if any_links && links.is_empty() {
                continue;
            }
            if let Some(record) =
                self.record_from_nodes(tree, &segment.nodes, &links, base_url, segment.matched)
            {
                records.push(record);
            }
        }

        finalize(records)
    }

    /// One record per document link, used when a region has no repeating structure.
    pub fn records_from_region(&self, tree: &DomTree, region: NodeId, base_url: &str) -> Vec<Record> {
        let mut records = Vec::new();

        for link in tree
            .links(region)
            .into_iter()
            .filter(|link| self.detector.is_document_link(link))
        {
            let nodes = match tree.parent(link.node) {
                Some(parent) if tree.is_element(parent) && parent != region => vec![parent],
                _ => vec![link.node],
            };
            let links = vec![link];
            if let Some(record) = self.record_from_nodes(tree, &nodes, &links, base_url, false) {
                records.push(record);
            }
        }

        finalize(records)
    }

    fn record_from_nodes(
        &self,
        tree: &DomTree,
        nodes: &[NodeId],
        links: &[Link],
        base_url: &str,
        matched: bool,
    ) -> Option<Record> {
        let text = tree.text_of_nodes(nodes);

        let mut resolved = Vec::<String>::new();
        for link in links {
            if let Some(url) = resolve_link(base_url, &link.href) {
                if !resolved.contains(&url) {
                    resolved.push(url);
                }
            }
        }

        let primary = links
            .iter()
            .filter(|link| self.detector.is_document_link(link))
            .chain(links.iter())
            .find_map(|link| resolve_link(base_url, &link.href));
        let file_type = primary
            .as_deref()
            .and_then(|url| document_extension(url, &self.config.document_extensions));

        let title = self.pick_title(tree, nodes, links)?;

        Some(Record {
            index: 0,
            title,
            link: primary,
            links: resolved,
            text,
            file_type,
            matched,
            node_path: nodes
                .first()
                .map(|node| tree.path(*node))
                .unwrap_or_default(),
        })
    }

    fn pick_title(
        &self,
        tree: &DomTree,
        nodes: &[NodeId],
        links: &[Link],
    ) -> Option<String> {
        for link in links {
            if self.is_generic_link_text(&link.text) {
                continue;
            }
            let title = self.clean_title(&link.text);
            if title.chars().count() >= MIN_TITLE_CHARS {
                return Some(title);
            }
        }

        for node in nodes {
            let mut scope = vec![*node];
            scope.extend(tree.descendants(*node));
            for candidate in scope {
                let emphasised = tree
                    .tag(candidate)
                    .map(|tag| EMPHASIS_TAGS.contains(&tag))
                    .unwrap_or(false)
                    || tree.has_class(candidate, "title");
                if !emphasised {
                    continue;
                }
                let title = self.clean_title(&tree.text(candidate));
                if title.chars().count() >= MIN_TITLE_CHARS && !self.is_generic_link_text(&title) {
                    return Some(title);
                }
            }
        }

        let generic_links = links
            .iter()
            .filter(|link| self.is_generic_link_text(&link.text))
            .map(|link| link.node)
            .collect::<Vec<NodeId>>();
        let remainder = tree.text_of_nodes_without(nodes, &generic_links);
        let without_code = self.leading_code.replace(remainder.trim(), "").to_string();
        self.title_split
            .split(&without_code)
            .map(|piece| self.clean_title(piece))
            .find(|piece| piece.chars().count() >= MIN_TITLE_CHARS)
    }

    pub fn clean_title(&self, raw: &str) -> String {
        let collapsed = raw.split_whitespace().collect::<Vec<&str>>().join(" ");
        let stripped = self.leading_code.replace(&collapsed, "").to_string();
        let candidate = if stripped.trim().is_empty() {
            collapsed.as_str()
        } else {
            stripped.as_str()
        };

        candidate
            .trim_matches(|ch: char| {
                ch.is_whitespace()
                    || matches!(
                        ch,
                        '"' | '\'' | '“' | '”' | '„' | '‘' | '’' | ',' | ';' | ':' | '-' | '–' | '.'
                    )
            })
            .to_string()
    }
}

fn finalize(records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::<(String, Option<String>)>::new();
    let mut out = Vec::with_capacity(records.len());

    for mut record in records {
        if !seen.insert((record.title.clone(), record.link.clone())) {
            continue;
        }
        record.index = out.len();
        out.push(record);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::find_record_container;

    fn build(html: &str, base: &str) -> Vec<Record> {
        let config = HarvestConfig::default();
        let detector = RegionDetector::new(&config).expect("detector should build");
        let builder = RecordBuilder::new(&config, &detector).expect("builder should build");
        let tree = DomTree::parse(html);
        let region = detector
            .find_region(&tree)
            .region()
            .map(|region| region.node)
            .expect("region should be found");
        match find_record_container(&tree, region, &config) {
            Some(segmentation) => builder.build_records(&tree, &segmentation, base),
            None => builder.records_from_region(&tree, region, base),
        }
    }

    #[test]
    fn table_rows_become_records_with_resolved_links() {
        let records = build(
            r#"<html><body><h2>Deliverables</h2><table>
              <tr><th>No.</th><th>Title</th><th>Date</th></tr>
              <tr><td>D1.1</td><td><a href="docs/d11.pdf">Requirements analysis</a></td><td>March 2009</td></tr>
              <tr><td>D1.2</td><td><a href="docs/d12.doc">System architecture</a></td><td>June 2009</td></tr>
              <tr><td>D2.1</td><td><a href="docs/d21.pdf">Prototype</a></td><td>Sept 2009</td></tr>
            </table></body></html>"#,
            "http://project.example.org/results/",
        );

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].title, "Requirements analysis");
        assert_eq!(
            records[0].link.as_deref(),
            Some("http://project.example.org/results/docs/d11.pdf")
        );
        assert_eq!(records[1].file_type.as_deref(), Some("doc"));
        assert!(records[2].text.contains("D2.1"));
        assert_eq!(records[2].index, 2);
    }

    #[test]
    fn generic_link_text_falls_back_to_emphasis_then_text() {
        let records = build(
            r#"<html><body><ul>
              <li><b>Ontology design</b>, J. Smith. <a href="o.pdf">[PDF]</a> <a href="o.ps">ps</a></li>
              <li>D3.2 - Reasoner evaluation, 2010 <a href="r.pdf">(1.2 MB)</a></li>
            </ul></body></html>"#,
            "http://example.org/",
        );

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Ontology design");
        assert_eq!(records[0].link.as_deref(), Some("http://example.org/o.pdf"));
        assert_eq!(records[0].links.len(), 2);
        assert_eq!(records[1].title, "Reasoner evaluation, 2010");
    }

    #[test]
    fn generic_link_words_inside_the_title_survive() {
        let records = build(
            r#"<html><body><h2>Reports</h2><ul>
              <li>Where data lives <a href="a.pdf">here</a></li>
              <li>Linked file formats <a href="b.pdf">file</a></li>
            </ul></body></html>"#,
            "http://example.org/",
        );

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Where data lives");
        assert_eq!(records[1].title, "Linked file formats");
        assert_eq!(records[0].text, "Where data lives here");
    }

    #[test]
    fn region_without_repetition_uses_one_record_per_document_link() {
        let records = build(
            r#"<html><body><div id="d">
              <h2>Deliverables</h2>
              <p>The final report <a href="final.pdf">Final project report</a> is available.</p>
              <div><span>Also:</span> <a href="annex.pdf">Annex</a></div>
            </div></body></html>"#,
            "http://example.org/",
        );

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Final project report");
        assert_eq!(records[1].title, "Annex");
        assert!(!records[0].matched);
    }

    #[test]
    fn clean_title_strips_codes_quotes_and_punctuation() {
        let config = HarvestConfig::default();
        let detector = RegionDetector::new(&config).expect("detector should build");
        let builder = RecordBuilder::new(&config, &detector).expect("builder should build");

        assert_eq!(builder.clean_title("D2.1: “Prototype”."), "Prototype");
        assert_eq!(builder.clean_title("  [3]  Some   paper, "), "Some paper");
        assert_eq!(builder.clean_title("D4"), "D4");
        assert!(builder.is_generic_link_text("[PDF]"));
        assert!(builder.is_generic_link_text("(350 kB)"));
        assert!(!builder.is_generic_link_text("PDF generation toolkit"));
    }
}

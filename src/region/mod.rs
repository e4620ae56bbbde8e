//! Deliverable region detection.
//!
//! A region is the smallest subtree that still holds most of the page's
//! document links, or, failing that, the block that follows a heading
//! such as "Deliverables" or "Publications".

use std::collections::HashMap;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use url::Url;

use crate::config::HarvestConfig;
use crate::dom::{DomTree, Link, NodeId, ROOT};
use crate::fetch::{is_document_link, resolve_link, same_host};

#[cfg(test)]
mod tests;

const MAX_HEADING_CHARS: usize = 80;
const HEADING_SEARCH_LEVELS: usize = 2;
const KEYWORD_HEADING_CONFIDENCE: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionMethod {
    DocumentLinks,
    KeywordHeading,
}

impl RegionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            RegionMethod::DocumentLinks => "document_links",
            RegionMethod::KeywordHeading => "keyword_heading",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionMiss {
    NoLinks,
    NoCandidate,
}

impl RegionMiss {
    pub fn as_str(self) -> &'static str {
        match self {
            RegionMiss::NoLinks => "no_links",
            RegionMiss::NoCandidate => "no_candidate",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Region {
    pub node: NodeId,
    pub path: String,
    pub method: RegionMethod,
    pub heading: Option<String>,
    pub document_links: usize,
    pub total_links: usize,
    pub page_document_links: usize,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub enum RegionOutcome {
    Found(Region),
    Missing(RegionMiss),
}

impl RegionOutcome {
    #[cfg(test)]
    pub fn region(&self) -> Option<&Region> {
        match self {
            RegionOutcome::Found(region) => Some(region),
            RegionOutcome::Missing(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CandidatePage {
    pub url: String,
    pub anchor_text: String,
    pub score: u32,
}

pub struct RegionDetector<'a> {
    config: &'a HarvestConfig,
    deliverable_code: Regex,
}

impl<'a> RegionDetector<'a> {
    pub fn new(config: &'a HarvestConfig) -> Result<Self> {
        Ok(Self {
            config,
            deliverable_code: Regex::new(r"\bD\s?\d{1,2}(?:\.\d{1,2})*\b")
                .context("failed to compile deliverable code regex")?,
        })
    }

    /// Document file link, or a link whose text names a deliverable such as `D2.1`.
    pub fn is_document_link(&self, link: &Link) -> bool {
        is_document_link(&link.href, &self.config.document_extensions)
            || self.deliverable_code.is_match(&link.text)
    }

    pub fn find_region(&self, tree: &DomTree) -> RegionOutcome {
        let links = tree.links(ROOT);
        if links.is_empty() {
            return RegionOutcome::Missing(RegionMiss::NoLinks);
        }

        let document_links = links
            .iter()
            .filter(|link| self.is_document_link(link))
            .collect::<Vec<&Link>>();

        let by_links = if document_links.len() >= 2 {
            self.region_by_document_links(tree, &document_links)
        } else {
            None
        };

        let region = match by_links {
            Some(region) if !is_page_level(tree, region.node) => Some(region),
            Some(region) => self
                .region_by_keyword_heading(tree, &document_links)
                .or(Some(region)),
            None => self.region_by_keyword_heading(tree, &document_links),
        };

        match region {
            Some(region) => RegionOutcome::Found(region),
            None => RegionOutcome::Missing(RegionMiss::NoCandidate),
        }
    }

    fn region_by_document_links(
        &self,
        tree: &DomTree,
        document_links: &[&Link],
    ) -> Option<Region> {
        let page_total = document_links.len();
        // A single link is never a listing, whatever the configured share.
        let required =
            ((page_total as f64 * self.config.region_min_share).ceil() as usize).max(2);

        let mut covered = HashMap::<NodeId, usize>::new();
        for link in document_links {
            let mut current = Some(link.node);
            while let Some(node) = current {
                *covered.entry(node).or_insert(0) += 1;
                current = tree.parent(node);
            }
        }

        let node = covered
            .iter()
            .filter(|(node, count)| **count >= required && tree.is_element(**node))
            .map(|(node, _)| *node)
            .max_by(|left, right| {
                tree.depth(*left)
                    .cmp(&tree.depth(*right))
                    .then(right.cmp(left))
            })?;

        let document_count = covered.get(&node).copied().unwrap_or(0);
        let total_links = tree.links(node).len().max(1);
        let heading = self.attached_heading(tree, node);
        let keyword_bonus = if heading.is_some() { 1.0 } else { 0.0 };
        let confidence = 0.5 * (document_count as f64 / total_links as f64)
            + 0.3 * (document_count as f64 / page_total as f64)
            + 0.2 * keyword_bonus;

        Some(Region {
            node,
            path: tree.path(node),
            method: RegionMethod::DocumentLinks,
            heading,
            document_links: document_count,
            total_links,
            page_document_links: page_total,
            confidence: confidence.clamp(0.0, 1.0),
        })
    }

    fn region_by_keyword_heading(
        &self,
        tree: &DomTree,
        document_links: &[&Link],
    ) -> Option<Region> {
        for heading in (0..tree.len()).filter(|id| self.is_keyword_heading(tree, *id)) {
            let anchor = heading_anchor(tree, heading);
            let Some(node) = following_sibling_with_links(tree, anchor)
                .or_else(|| parent_with_extra_links(tree, anchor))
            else {
                continue;
            };

            let document_count = document_links
                .iter()
                .filter(|link| tree.contains(node, link.node))
                .count();

            return Some(Region {
                node,
                path: tree.path(node),
                method: RegionMethod::KeywordHeading,
                heading: Some(tree.text(heading)),
                document_links: document_count,
                total_links: tree.links(node).len(),
                page_document_links: document_links.len(),
                confidence: KEYWORD_HEADING_CONFIDENCE,
            });
        }

        None
    }

    fn is_keyword_heading(&self, tree: &DomTree, id: NodeId) -> bool {
        if !is_heading_like(tree, id) {
            return false;
        }
        let text = tree.text(id);
        !text.is_empty()
            && text.chars().count() <= MAX_HEADING_CHARS
            && self.config.mentions_region_keyword(&text)
    }

    fn attached_heading(&self, tree: &DomTree, region: NodeId) -> Option<String> {
        for child in tree.element_children(region).into_iter().take(2) {
            if self.is_keyword_heading(tree, child) {
                return Some(tree.text(child));
            }
        }

        let mut current = region;
        for _ in 0..=HEADING_SEARCH_LEVELS {
            if let Some(heading) = preceding_heading(tree, current) {
                if self.is_keyword_heading(tree, heading) {
                    return Some(tree.text(heading));
                }
                return None;
            }
            current = tree.parent(current)?;
        }

        None
    }

    /// Links on a project home page that probably lead to a deliverables listing.
    pub fn discover_listing_pages(&self, tree: &DomTree, base_url: &str) -> Vec<CandidatePage> {
        let mut best = HashMap::<String, (u32, usize, String)>::new();

        for (order, link) in tree.links(ROOT).into_iter().enumerate() {
            let Some(url) = resolve_link(base_url, &link.href) else {
                continue;
            };
            if url == base_url || !same_host(&url, base_url) {
                continue;
            }
            if is_document_link(&url, &self.config.document_extensions) {
                continue;
            }

            let mut score = 0;
            if self.config.mentions_region_keyword(&link.text) {
                score += 2;
            }
            let path = Url::parse(&url)
                .map(|value| value.path().to_string())
                .unwrap_or_default();
            if self.config.mentions_region_keyword(&path) {
                score += 1;
            }
            if score == 0 {
                continue;
            }

            let entry = best.entry(url).or_insert((score, order, link.text.clone()));
            if score > entry.0 {
                *entry = (score, entry.1, link.text.clone());
            }
        }

        let mut candidates = best
            .into_iter()
            .map(|(url, (score, order, anchor_text))| {
                let page = CandidatePage {
                    url,
                    anchor_text,
                    score,
                };
                (order, page)
            })
            .collect::<Vec<(usize, CandidatePage)>>();
        candidates.sort_by(|left, right| {
            right
                .1
                .score
                .cmp(&left.1.score)
                .then(left.0.cmp(&right.0))
        });
        candidates.into_iter().map(|(_, page)| page).collect()
    }
}

fn is_page_level(tree: &DomTree, node: NodeId) -> bool {
    matches!(tree.tag(node), Some("html") | Some("body"))
}

pub fn is_heading_like(tree: &DomTree, id: NodeId) -> bool {
    match tree.tag(id) {
        Some("h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "dt" | "caption" | "legend") => true,
        Some("strong" | "b") => tree
            .parent(id)
            .map(|parent| tree.is_block(parent) && tree.text(parent) == tree.text(id))
            .unwrap_or(false),
        _ => false,
    }
}

/// Node whose siblings follow the heading: a standalone `<b>` counts as its block.
fn heading_anchor(tree: &DomTree, heading: NodeId) -> NodeId {
    match tree.tag(heading) {
        Some("strong" | "b") => tree.parent(heading).unwrap_or(heading),
        _ => heading,
    }
}

fn following_sibling_with_links(tree: &DomTree, node: NodeId) -> Option<NodeId> {
    let parent = tree.parent(node)?;
    tree.element_children(parent)
        .into_iter()
        .skip_while(|sibling| *sibling != node)
        .skip(1)
        .find(|sibling| !tree.links(*sibling).is_empty())
}

fn parent_with_extra_links(tree: &DomTree, node: NodeId) -> Option<NodeId> {
    let parent = tree.parent(node)?;
    if !tree.is_element(parent) {
        return None;
    }
    let own = tree.links(node).len();
    if tree.links(parent).len() > own {
        Some(parent)
    } else {
        None
    }
}

fn preceding_heading(tree: &DomTree, node: NodeId) -> Option<NodeId> {
    let parent = tree.parent(node)?;
    let siblings = tree.element_children(parent);
    let position = siblings.iter().position(|sibling| *sibling == node)?;

    siblings[..position].iter().rev().copied().find_map(|sibling| {
        if is_heading_like(tree, sibling) {
            return Some(sibling);
        }
        tree.element_children(sibling).into_iter().find(|child| {
            matches!(tree.tag(*child), Some("strong" | "b")) && is_heading_like(tree, *child)
        })
    })
}

//! Record segmentation by repeating sibling tag sequences.
//!
//! The children of a candidate container are reduced to a label sequence
//! (`li li li`, `h3 p a h3 p a`, `a #text br a #text br`). For every label
//! that repeats, the sequence is cut at each occurrence and the most common
//! piece becomes the record pattern. Pieces within an edit-distance
//! tolerance of the pattern count as records; the rest are merged or kept
//! as unmatched records. The container whose cut explains most of its
//! children and most of its links wins.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use crate::config::HarvestConfig;
use crate::dom::{DomTree, NodeId};

#[cfg(test)]
mod tests;

pub const TEXT_LABEL: &str = "#text";

const SEPARATOR_LABELS: &[&str] = &[TEXT_LABEL, "br", "hr"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub node: NodeId,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    pub nodes: Vec<NodeId>,
    pub labels: Vec<String>,
    pub distance: usize,
    pub matched: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Segmentation {
    pub container: NodeId,
    pub container_path: String,
    pub start_label: String,
    pub pattern: Vec<String>,
    pub tolerance: usize,
    pub frequency_gap: usize,
    pub segments: Vec<Segment>,
    pub score: f64,
    pub link_segments: usize,
}

impl Segmentation {
    pub fn matched_count(&self) -> usize {
        self.segments.iter().filter(|segment| segment.matched).count()
    }

    fn quality(&self) -> f64 {
        self.score * self.link_segments as f64
    }
}

/// One token per meaningful child: element tag name, or `#text` for non-blank text.
pub fn sibling_tokens(tree: &DomTree, container: NodeId) -> Vec<Token> {
    tree.children(container)
        .iter()
        .copied()
        .filter_map(|child| {
            if let Some(tag) = tree.tag(child) {
                return Some(Token {
                    node: child,
                    label: tag.to_string(),
                });
            }
            tree.text_content(child).map(|_| Token {
                node: child,
                label: TEXT_LABEL.to_string(),
            })
        })
        .collect()
}

/// Searches the region and its element descendants for the best record container.
pub fn find_record_container(
    tree: &DomTree,
    region: NodeId,
    config: &HarvestConfig,
) -> Option<Segmentation> {
    let mut best: Option<(Segmentation, usize)> = None;
    let mut queue = VecDeque::from([(region, 0_usize)]);

    while let Some((node, depth)) = queue.pop_front() {
        if let Some(candidate) = segment_children(tree, node, config) {
            let replace = match &best {
                None => true,
                Some((current, current_depth)) => {
                    let candidate_quality = candidate.quality();
                    let current_quality = current.quality();
                    candidate_quality > current_quality + f64::EPSILON
                        || ((candidate_quality - current_quality).abs() <= f64::EPSILON
                            && depth < *current_depth)
                }
            };
            if replace {
                best = Some((candidate, depth));
            }
        }

        if depth < config.max_container_depth {
            for child in tree.element_children(node) {
                queue.push_back((child, depth + 1));
            }
        }
    }

    best.map(|(segmentation, _)| segmentation)
}

/// Segments the children of `container` into records, if a repeating pattern exists.
pub fn segment_children(
    tree: &DomTree,
    container: NodeId,
    config: &HarvestConfig,
) -> Option<Segmentation> {
    let tokens = sibling_tokens(tree, container);
    if tokens.len() < config.min_records {
        return None;
    }

    let has_links = tokens
        .iter()
        .map(|token| !tree.links(token.node).is_empty())
        .collect::<Vec<bool>>();
    let link_children = has_links.iter().filter(|value| **value).count();

    let mut frequencies = HashMap::<&str, usize>::new();
    for token in &tokens {
        if token.label != TEXT_LABEL {
            *frequencies.entry(token.label.as_str()).or_insert(0) += 1;
        }
    }

    let mut candidates = frequencies
        .into_iter()
        .filter(|(_, count)| *count >= config.min_records)
        .map(|(label, count)| (label.to_string(), count.abs_diff(link_children)))
        .collect::<Vec<(String, usize)>>();
    candidates.sort_by(|left, right| left.1.cmp(&right.1).then(left.0.cmp(&right.0)));

    let mut best: Option<Segmentation> = None;
    for (label, gap) in candidates {
        let Some(candidate) = segment_at_label(&tokens, &has_links, &label, gap, config) else {
            continue;
        };

        let replace = match &best {
            None => true,
            Some(current) => {
                candidate.score > current.score + f64::EPSILON
                    || ((candidate.score - current.score).abs() <= f64::EPSILON
                        && candidate.link_segments > current.link_segments)
            }
        };
        if replace {
            best = Some(candidate);
        }
    }

    best.map(|mut segmentation| {
        segmentation.container = container;
        segmentation.container_path = tree.path(container);
        segmentation
    })
}

fn segment_at_label(
    tokens: &[Token],
    has_links: &[bool],
    start_label: &str,
    frequency_gap: usize,
    config: &HarvestConfig,
) -> Option<Segmentation> {
    let starts = tokens
        .iter()
        .enumerate()
        .filter(|(_, token)| token.label == start_label)
        .map(|(index, _)| index)
        .collect::<Vec<usize>>();
    if starts.len() < config.min_records {
        return None;
    }

    let ranges = starts
        .iter()
        .enumerate()
        .map(|(position, start)| {
            let end = starts.get(position + 1).copied().unwrap_or(tokens.len());
            (*start, end)
        })
        .collect::<Vec<(usize, usize)>>();

    let label_runs = ranges
        .iter()
        .map(|(start, end)| {
            tokens[*start..*end]
                .iter()
                .map(|token| token.label.clone())
                .collect::<Vec<String>>()
        })
        .collect::<Vec<Vec<String>>>();

    let pattern = dominant_pattern(&label_runs)?;
    let tolerance = tolerance_for(pattern.len(), config.tolerance_ratio);

    let last_index = ranges.len() - 1;
    let pieces = ranges
        .iter()
        .zip(label_runs)
        .enumerate()
        .map(|(index, ((start, end), labels))| {
            let distance = levenshtein(&labels, &pattern);
            let links = has_links[*start..*end].iter().any(|value| *value);
            let matched = distance <= tolerance
                || trim_separators(&labels) == trim_separators(&pattern)
                || (index == last_index && pattern.starts_with(&labels));
            let nodes = tokens[*start..*end]
                .iter()
                .map(|token| token.node)
                .collect::<Vec<NodeId>>();
            (
                Segment {
                    nodes,
                    labels,
                    distance,
                    matched,
                },
                links,
            )
        })
        .collect::<Vec<(Segment, bool)>>();

    // Link-less misfits are continuation lines only while a record still follows.
    let last_matched = pieces.iter().rposition(|(segment, _)| segment.matched)?;

    let mut segments = Vec::<Segment>::with_capacity(pieces.len());
    let mut segment_links = Vec::<bool>::with_capacity(pieces.len());
    for (index, (segment, links)) in pieces.into_iter().enumerate() {
        if !segment.matched && !links && index < last_matched {
            if let Some(previous) = segments.last_mut() {
                previous.nodes.extend(segment.nodes);
                previous.labels.extend(segment.labels);
                continue;
            }
        }

        segments.push(segment);
        segment_links.push(links);
    }

    let matched = segments.iter().filter(|segment| segment.matched).count();
    if matched < config.min_records {
        return None;
    }

    let covered = segments
        .iter()
        .map(|segment| segment.nodes.len())
        .sum::<usize>();
    let coverage = covered as f64 / tokens.len() as f64;
    let link_segments = segment_links.iter().filter(|value| **value).count();
    let link_ratio = if has_links.iter().any(|value| *value) {
        link_segments as f64 / segments.len() as f64
    } else {
        1.0
    };
    let score = matched as f64 / segments.len() as f64 * coverage * link_ratio;

    Some(Segmentation {
        container: 0,
        container_path: String::new(),
        start_label: start_label.to_string(),
        pattern,
        tolerance,
        frequency_gap,
        link_segments,
        segments,
        score,
    })
}

/// Most frequent label run; ties go to the shorter run, then the earlier one.
fn dominant_pattern(runs: &[Vec<String>]) -> Option<Vec<String>> {
    let mut counts = HashMap::<&[String], (usize, usize)>::new();
    for (index, run) in runs.iter().enumerate() {
        let entry = counts.entry(run.as_slice()).or_insert((0, index));
        entry.0 += 1;
    }

    counts
        .into_iter()
        .min_by(|(left_run, left), (right_run, right)| {
            right
                .0
                .cmp(&left.0)
                .then(left_run.len().cmp(&right_run.len()))
                .then(left.1.cmp(&right.1))
        })
        .map(|(run, _)| run.to_vec())
}

pub fn tolerance_for(pattern_len: usize, ratio: f64) -> usize {
    if pattern_len <= 1 {
        return 0;
    }
    ((pattern_len as f64 * ratio).floor() as usize).max(1)
}

fn trim_separators(labels: &[String]) -> &[String] {
    let mut end = labels.len();
    while end > 1 && SEPARATOR_LABELS.contains(&labels[end - 1].as_str()) {
        end -= 1;
    }
    &labels[..end]
}

/// Token-level edit distance.
pub fn levenshtein<T: PartialEq>(left: &[T], right: &[T]) -> usize {
    if left.is_empty() {
        return right.len();
    }
    if right.is_empty() {
        return left.len();
    }

    let mut previous = (0..=right.len()).collect::<Vec<usize>>();
    let mut current = vec![0_usize; right.len() + 1];

    for (i, left_item) in left.iter().enumerate() {
        current[0] = i + 1;
        for (j, right_item) in right.iter().enumerate() {
            let substitution = previous[j] + usize::from(left_item != right_item);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[right.len()]
}

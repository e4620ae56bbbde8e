//! Bibliographic citation parsing.
//!
//! A citation is read left to right: authors, then the year group when it
//! directly follows them, then the title, then the venue up to the first
//! volume/pages/year field. Identifiers (DOI, ISBN, URL) and page ranges
//! come from the entity extractor.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;

use crate::extract::{EntityExtractor, Person};
use crate::util::normalize_whitespace;

const MIN_MARKED_ENTRIES: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Citation {
    pub raw: String,
    pub authors: Vec<Person>,
    pub title: Option<String>,
    pub venue: Option<String>,
    pub year: Option<i32>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages: Option<String>,
    pub publisher: Option<String>,
    pub doi: Option<String>,
    pub isbn: Option<String>,
    pub url: Option<String>,
}

pub struct CitationParser {
    entities: EntityExtractor,
    marker: Regex,
    year_group: Regex,
    title_end: Regex,
    venue_prefix: Regex,
    venue_end: Regex,
    volume: Regex,
    volume_issue: Regex,
    issue: Regex,
    bare_pages: Regex,
    publisher: Regex,
    bracket_entry: Regex,
    numbered_entry: Regex,
    blank_lines: Regex,
}

impl CitationParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            entities: EntityExtractor::new()?,
            marker: Regex::new(r"^\s*(?:\[\d+\]|\d+\.)\s+")
                .context("failed to compile citation marker regex")?,
            year_group: Regex::new(r"\(\s*(?P<y>(?:19|20)\d{2})[a-z]?\s*\)")
                .context("failed to compile year group regex")?,
            title_end: Regex::new(r"\.\s|\?\s|,\s+[Ii]n:?\s")
                .context("failed to compile title end regex")?,
            venue_prefix: Regex::new(r"^(?i)in:?\s+").context("failed to compile venue prefix regex")?,
            venue_end: Regex::new(
                r"(?i),?\s*(?:\bvol\b\.?|\bvolume\b|\bno\.|\bpp?\.|\bpages\b|\d+\s*\(\d+\))|,\s*(?:19|20)\d{2}\b|\(\s*(?:19|20)\d{2}|\.\s+(?:doi|isbn|https?:)|\.?\s*$",
            )
            .context("failed to compile venue end regex")?,
            volume: Regex::new(r"(?i)\bvol(?:ume)?\.?\s*(?P<volume>\d+)")
                .context("failed to compile volume regex")?,
            volume_issue: Regex::new(r"\b(?P<volume>\d+)\s*\((?P<issue>\d+)\)")
                .context("failed to compile volume issue regex")?,
            issue: Regex::new(r"(?i)\b(?:no|nr|issue)\.?\s*(?P<issue>\d+)")
                .context("failed to compile issue regex")?,
            bare_pages: Regex::new(r"[,:]\s*(?P<from>\d{1,5})\s*[-–]{1,2}\s*(?P<to>\d{1,5})\b")
                .context("failed to compile page range regex")?,
            publisher: Regex::new(
                r"(?:^|[,.]\s*)(?P<publisher>\p{Lu}[\p{L}&'\- ]*\p{L})(?:,\s*\p{Lu}\p{L}+)?,\s*(?:19|20)\d{2}\.?\s*$",
            )
            .context("failed to compile publisher regex")?,
            bracket_entry: Regex::new(r"(?m)^\s*\[\d+\]")
                .context("failed to compile bracket entry regex")?,
            numbered_entry: Regex::new(r"(?m)^\s*\d+\.\s+\p{Lu}")
                .context("failed to compile numbered entry regex")?,
            blank_lines: Regex::new(r"\n\s*\n").context("failed to compile blank line regex")?,
        })
    }

    pub fn parse(&self, text: &str) -> Citation {
        let raw = normalize_whitespace(text);
        let body = self.marker.replace(&raw, "").to_string();
        let entities = self.entities.extract(&body);

        let (authors, after_authors, year) = self.split_authors(&body);
        let rest = after_authors.trim_start_matches(|ch: char| {
            ch.is_whitespace() || matches!(ch, '.' | ',' | ':' | ';')
        });
        let (title, remainder) = self.split_title(rest);

        let publisher = self
            .publisher
            .captures(remainder)
            .map(|caps| caps["publisher"].trim().to_string());
        let venue = self
            .venue(remainder)
            .filter(|venue| match &publisher {
                Some(publisher) => !venue.starts_with(publisher.as_str()),
                None => true,
            });

        let (volume, mut issue) = match self.volume.captures(remainder) {
            Some(caps) => (Some(caps["volume"].to_string()), None),
            None => match self.volume_issue.captures(remainder) {
                Some(caps) => (
                    Some(caps["volume"].to_string()),
                    Some(caps["issue"].to_string()),
                ),
                None => (None, None),
            },
        };
        if issue.is_none() {
            issue = self
                .issue
                .captures(remainder)
                .map(|caps| caps["issue"].to_string());
        }

        let pages = self.entities.pages(remainder).or_else(|| {
            self.bare_pages
                .captures_iter(remainder)
                .find(|caps| !is_year(&caps["from"]) || !is_year(&caps["to"]))
                .map(|caps| format!("{}-{}", &caps["from"], &caps["to"]))
        });

        Citation {
            raw,
            authors,
            title,
            venue,
            year: year.or_else(|| entities.years.first().copied()),
            volume,
            issue,
            pages,
            publisher,
            doi: entities.doi,
            isbn: entities.isbn.into_iter().next(),
            url: entities.urls.into_iter().next(),
        }
    }

    /// Authors, the text after them, and the year when it is a `(2009)` group
    /// directly following the names.
    fn split_authors<'t>(&self, body: &'t str) -> (Vec<Person>, &'t str, Option<i32>) {
        if let Some(caps) = self.year_group.captures(body) {
            if let Some(group) = caps.get(0) {
                let year = caps["y"].parse::<i32>().ok();
                let prefix = body[..group.start()].trim();
                if prefix.is_empty() {
                    return (Vec::new(), &body[group.end()..], year);
                }
                if let Some(persons) = self.entities.name_list(prefix) {
                    return (persons, &body[group.end()..], year);
                }
            }
        }

        match self.entities.leading_authors(body) {
            Some((persons, end)) => (persons, &body[end..], None),
            None => (Vec::new(), body, None),
        }
    }

    fn split_title<'t>(&self, rest: &'t str) -> (Option<String>, &'t str) {
        if let Some(open) = rest.chars().next().filter(|ch| matches!(ch, '"' | '“')) {
            let close = if open == '“' { '”' } else { '"' };
            let inner = &rest[open.len_utf8()..];
            if let Some(end) = inner.find(close) {
                let title = clean_field(&inner[..end]);
                let remainder = &inner[end + close.len_utf8()..];
                return (non_empty(title), trim_leading_separators(remainder));
            }
        }

        match self.title_end.find(rest) {
            Some(found) => {
                let keep_question = found.as_str().starts_with('?');
                let end = if keep_question {
                    found.start() + 1
                } else {
                    found.start()
                };
                let title = clean_field(&rest[..end]);
                (non_empty(title), trim_leading_separators(&rest[found.end()..]))
            }
            None => (non_empty(clean_field(rest)), ""),
        }
    }

    fn venue(&self, remainder: &str) -> Option<String> {
        let remainder = self.venue_prefix.replace(remainder, "");
        let end = self
            .venue_end
            .find(&remainder)
            .map(|found| found.start())
            .unwrap_or(remainder.len());
        non_empty(clean_field(&remainder[..end]))
    }

    /// Splits a reference list on `[n]` or `n.` line markers, or on blank lines.
    pub fn split_citations(&self, text: &str) -> Vec<String> {
        for pattern in [&self.bracket_entry, &self.numbered_entry] {
            let starts = pattern
                .find_iter(text)
                .map(|found| found.start())
                .collect::<Vec<usize>>();
            if starts.len() < MIN_MARKED_ENTRIES {
                continue;
            }

            return starts
                .iter()
                .enumerate()
                .map(|(index, start)| {
                    let end = starts.get(index + 1).copied().unwrap_or(text.len());
                    normalize_whitespace(&self.marker.replace(text[*start..end].trim(), ""))
                })
                .filter(|entry| !entry.is_empty())
                .collect();
        }

        self.blank_lines
            .split(text)
            .map(normalize_whitespace)
            .filter(|entry| !entry.is_empty())
            .collect()
    }
}

fn clean_field(value: &str) -> String {
    normalize_whitespace(value)
        .trim_matches(|ch: char| {
            ch.is_whitespace() || matches!(ch, ',' | '.' | ';' | ':' | '"' | '“' | '”')
        })
        .to_string()
}

fn trim_leading_separators(value: &str) -> &str {
    value.trim_start_matches(|ch: char| ch.is_whitespace() || matches!(ch, ',' | '.' | ':' | ';'))
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

fn is_year(value: &str) -> bool {
    value
        .parse::<u32>()
        .map(|year| (1900..=2099).contains(&year))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> CitationParser {
        CitationParser::new().expect("parser should build")
    }

    fn last_names(citation: &Citation) -> Vec<&str> {
        citation
            .authors
            .iter()
            .map(|person| person.last.as_str())
            .collect()
    }

    #[test]
    fn acm_style_with_trailing_year() {
        let citation = parser().parse(
            "J. Smith and K. Lee. Ontology matching at scale. In Proceedings of the 9th \
             International Conference on Web Engineering, pages 112-125, 2009.",
        );

        assert_eq!(last_names(&citation), vec!["Smith", "Lee"]);
        assert_eq!(citation.title.as_deref(), Some("Ontology matching at scale"));
        assert_eq!(
            citation.venue.as_deref(),
            Some("Proceedings of the 9th International Conference on Web Engineering")
        );
        assert_eq!(citation.pages.as_deref(), Some("112-125"));
        assert_eq!(citation.year, Some(2009));
        assert_eq!(citation.publisher, None);
    }

    #[test]
    fn apa_style_with_year_group_and_journal_volume() {
        let citation = parser().parse(
            "Smith, J., & Jones, K. (2009). Reasoning with rules. Journal of Web Semantics, \
             7(3), 45-60. doi:10.1016/j.websem.2009.05.001",
        );

        assert_eq!(last_names(&citation), vec!["Smith", "Jones"]);
        assert_eq!(citation.year, Some(2009));
        assert_eq!(citation.title.as_deref(), Some("Reasoning with rules"));
        assert_eq!(citation.venue.as_deref(), Some("Journal of Web Semantics"));
        assert_eq!(citation.volume.as_deref(), Some("7"));
        assert_eq!(citation.issue.as_deref(), Some("3"));
        assert_eq!(citation.pages.as_deref(), Some("45-60"));
        assert_eq!(citation.doi.as_deref(), Some("10.1016/j.websem.2009.05.001"));
    }

    #[test]
    fn ieee_style_with_quoted_title() {
        let citation = parser().parse(
            "[4] J. Smith, \"Linked data for research projects,\" in Proc. ICWE 2009, pp. 1-10.",
        );

        assert_eq!(last_names(&citation), vec!["Smith"]);
        assert_eq!(
            citation.title.as_deref(),
            Some("Linked data for research projects")
        );
        assert_eq!(citation.venue.as_deref(), Some("Proc. ICWE 2009"));
        assert_eq!(citation.pages.as_deref(), Some("1-10"));
        assert_eq!(citation.year, Some(2009));
        assert!(citation.raw.starts_with("[4]"));
    }

    #[test]
    fn book_with_publisher_and_city() {
        let citation =
            parser().parse("K. Lee: Semantic Web Services. Springer, Berlin, 2008. ISBN 978-3-16-148410-0");

        assert_eq!(last_names(&citation), vec!["Lee"]);
        assert_eq!(citation.title.as_deref(), Some("Semantic Web Services"));
        assert_eq!(citation.isbn.as_deref(), Some("9783161484100"));
        assert_eq!(citation.year, Some(2008));
    }

    #[test]
    fn publisher_before_trailing_year() {
        let citation = parser().parse("K. Lee: Semantic Web Services. Springer, Berlin, 2008.");

        assert_eq!(citation.publisher.as_deref(), Some("Springer"));
        assert_eq!(citation.venue, None);
    }

    #[test]
    fn split_citations_on_markers_and_blank_lines() {
        let parser = parser();

        let bracketed = parser.split_citations(
            "[1] J. Smith. First paper.\n    Continued line.\n[2] K. Lee. Second paper.\n",
        );
        assert_eq!(
            bracketed,
            vec![
                "J. Smith. First paper. Continued line.".to_string(),
                "K. Lee. Second paper.".to_string(),
            ]
        );

        let numbered = parser.split_citations("1. A. One. Title.\n2. B. Two. Title.\n");
        assert_eq!(numbered.len(), 2);
        assert_eq!(numbered[1], "B. Two. Title.");

        let blocks = parser.split_citations("A. One. Title.\n\n  \nB. Two. Title.");
        assert_eq!(blocks, vec!["A. One. Title.", "B. Two. Title."]);
    }
}

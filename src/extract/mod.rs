//! Entity extraction from record text.
//!
//! Every pattern is compiled once in [`EntityExtractor::new`]. Dates are
//! checked against the calendar before they are reported, and ISBN/ISSN
//! candidates against their check digits.

mod dates;
mod identifiers;
mod person;

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

pub use person::Person;

use dates::{month_number, parse_year, render_day, render_month};
use identifiers::{compact_identifier, issn_is_valid, leading_isbn};

#[cfg(test)]
mod tests;

const COUNTRIES: &[&str] = &[
    "Czech Republic",
    "Czechia",
    "Slovakia",
    "Austria",
    "Germany",
    "Switzerland",
    "Poland",
    "Hungary",
    "Slovenia",
    "Croatia",
    "Serbia",
    "Romania",
    "Bulgaria",
    "Greece",
    "Cyprus",
    "Malta",
    "Italy",
    "Spain",
    "Portugal",
    "France",
    "Belgium",
    "The Netherlands",
    "Netherlands",
    "Luxembourg",
    "United Kingdom",
    "UK",
    "Ireland",
    "Iceland",
    "Denmark",
    "Norway",
    "Sweden",
    "Finland",
    "Estonia",
    "Latvia",
    "Lithuania",
    "Ukraine",
    "Russia",
    "Turkey",
    "Israel",
    "USA",
    "United States",
    "Canada",
    "Brazil",
    "Australia",
    "Japan",
    "China",
    "Korea",
    "India",
    "Singapore",
];

const ACRONYM_STOPWORDS: &[&str] = &["ISBN", "ISSN", "DOI", "PDF", "WP", "EU", "FP"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    pub deliverable_code: Option<String>,
    pub work_package: Option<String>,
    pub dates: Vec<String>,
    pub years: Vec<i32>,
    pub isbn: Vec<String>,
    pub issn: Vec<String>,
    pub doi: Option<String>,
    pub emails: Vec<String>,
    pub urls: Vec<String>,
    pub pages: Option<String>,
    pub authors: Vec<Person>,
    pub event: Option<String>,
    pub location: Option<String>,
}

impl Entities {
    pub fn date(&self) -> Option<&str> {
        self.dates.first().map(String::as_str)
    }

    /// Year of the first date, else the first standalone year.
    pub fn year(&self) -> Option<i32> {
        self.dates
            .first()
            .and_then(|date| date.get(..4))
            .and_then(parse_year)
            .or_else(|| self.years.first().copied())
    }
}

pub struct EntityExtractor {
    deliverable_code: Regex,
    work_package: Regex,
    iso_date: Regex,
    numeric_date: Regex,
    day_month_year: Regex,
    month_day_year: Regex,
    month_year: Regex,
    numeric_month_year: Regex,
    year: Regex,
    isbn_prefixed: Regex,
    isbn_bare: Regex,
    issn: Regex,
    doi: Regex,
    email: Regex,
    url: Regex,
    pages: Regex,
    author_clause: Regex,
    name_list_end: Regex,
    name_separator: Regex,
    et_al: Regex,
    proceedings: Regex,
    in_event: Regex,
    event_phrase: Regex,
    acronym_event: Regex,
    location: Regex,
}

impl EntityExtractor {
    pub fn new() -> Result<Self> {
        let countries = COUNTRIES
            .iter()
            .map(|country| regex::escape(country))
            .collect::<Vec<String>>()
            .join("|");

        Ok(Self {
            deliverable_code: compile(r"\bD\s?(?P<num>\d{1,2}(?:\.\d{1,2})*)\b", "deliverable code")?,
            work_package: compile(r"\bWP\s?(?P<num>\d{1,2})\b", "work package")?,
            iso_date: compile(r"\b(?P<y>\d{4})-(?P<m>\d{1,2})-(?P<d>\d{1,2})\b", "ISO date")?,
            numeric_date: compile(
                r"\b(?P<d>\d{1,2})(?:\.\s?|/)(?P<m>\d{1,2})(?:\.\s?|/)(?P<y>\d{4})\b",
                "numeric date",
            )?,
            day_month_year: compile(
                r"\b(?P<d>\d{1,2})\.?\s+(?P<month>\p{L}+)\.?\s+(?P<y>\d{4})\b",
                "day month year date",
            )?,
            month_day_year: compile(
                r"\b(?P<month>\p{L}+)\.?\s+(?P<d>\d{1,2})(?:st|nd|rd|th)?,?\s+(?P<y>\d{4})\b",
                "month day year date",
            )?,
            month_year: compile(r"\b(?P<month>\p{L}+)\.?,?\s+(?P<y>\d{4})\b", "month year date")?,
            numeric_month_year: compile(r"\b(?P<m>\d{1,2})/(?P<y>\d{4})\b", "numeric month year")?,
            year: compile(r"\b(?P<y>(?:19|20)\d{2})\b", "year")?,
            isbn_prefixed: compile(
                r"(?i)\bISBN(?:-1[03])?\s*:?\s*(?P<isbn>(?:[\dX][-\s]?){9,12}[\dX])",
                "ISBN",
            )?,
            isbn_bare: compile(r"\b(?P<isbn>97[89](?:[-\s]?\d){10})\b", "bare ISBN")?,
            issn: compile(r"(?i)\b(?P<issn>\d{4}-\d{3}[\dX])\b", "ISSN")?,
            doi: compile(r#"\b(?P<doi>10\.\d{4,9}/[^\s"<>]+)"#, "DOI")?,
            email: compile(
                r"(?P<email>[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,})",
                "email",
            )?,
            url: compile(r#"(?P<url>https?://[^\s<>"']+)"#, "URL")?,
            pages: compile(
                r"(?i)\b(?:pp?\.|pages?)\s*(?P<from>\d+)(?:\s*[-–—]+\s*(?P<to>\d+))?",
                "pages",
            )?,
            author_clause: compile(
                r"(?i)(?:^|[\s(])(?:by|authors?|autoři|autor)\s*:?\s+(?P<names>.+)",
                "author clause",
            )?,
            name_list_end: compile(
                r#"\p{Ll}(?P<stop>\.\s)|(?P<other>:\s|\(\s*(?:19|20)\d{2}|["“]|\.$)"#,
                "name list end",
            )?,
            name_separator: compile(r"\s*(?:[,;&]|\band\b|\bund\b)\s*", "name separator")?,
            et_al: compile(r"(?i)\bet\.?\s+al\.?", "et al")?,
            proceedings: compile(
                r"(?i)\b(?P<event>proceedings\s+of\s+(?:the\s+)?[^.;(]+)",
                "proceedings",
            )?,
            in_event: compile(r"\bIn:\s*(?P<event>[^.;]+)", "in event")?,
            event_phrase: compile(
                r"(?P<event>(?:[\p{Lu}\d][\p{L}\d&'-]*\s+){0,6}(?:Conference|Workshop|Symposium|Congress|Summit|Colloquium)\b(?:\s+(?:on|of)\s+[^.;,(]+)?)",
                "event phrase",
            )?,
            acronym_event: compile(
                r"\b(?P<acronym>[A-Z]{2,}[A-Za-z]*)['’]?\s?(?P<y>(?:19|20)\d{2})\b",
                "acronym event",
            )?,
            location: compile(
                &format!(
                    r"\b(?P<city>\p{{Lu}}[\p{{L}}-]+(?:\s\p{{Lu}}[\p{{L}}-]+)?),\s*(?P<country>{countries})\b"
                ),
                "location",
            )?,
        })
    }

    pub fn extract(&self, text: &str) -> Entities {
        Entities {
            deliverable_code: self
                .deliverable_code
                .captures(text)
                .map(|caps| format!("D{}", &caps["num"])),
            work_package: self
                .work_package
                .captures(text)
                .map(|caps| format!("WP{}", &caps["num"])),
            dates: self.dates(text),
            years: self.years(text),
            isbn: self.isbns(text),
            issn: self.issns(text),
            doi: self
                .doi
                .captures(text)
                .map(|caps| trim_trailing_punctuation(&caps["doi"]).to_string()),
            emails: unique(
                self.email
                    .captures_iter(text)
                    .map(|caps| caps["email"].trim_end_matches('.').to_string()),
            ),
            urls: unique(
                self.url
                    .captures_iter(text)
                    .map(|caps| trim_trailing_punctuation(&caps["url"]).to_string()),
            ),
            pages: self.pages(text),
            authors: self.authors(text),
            event: self.event(text),
            location: self
                .location
                .captures(text)
                .map(|caps| format!("{}, {}", &caps["city"], &caps["country"])),
        }
    }

    pub fn dates(&self, text: &str) -> Vec<String> {
        let mut found = Vec::<(usize, usize, String)>::new();

        for caps in self.iso_date.captures_iter(text) {
            let date = numeric_triple(&caps).and_then(|(y, m, d)| render_day(y, m, d));
            claim(&mut found, &caps, date);
        }
        for caps in self.numeric_date.captures_iter(text) {
            let date = numeric_triple(&caps).and_then(|(y, m, d)| render_day(y, m, d));
            claim(&mut found, &caps, date);
        }
        for regex in [&self.day_month_year, &self.month_day_year] {
            for caps in regex.captures_iter(text) {
                let date = named_triple(&caps).and_then(|(y, m, d)| render_day(y, m, d));
                claim(&mut found, &caps, date);
            }
        }
        for caps in self.month_year.captures_iter(text) {
            let date = parse_year(&caps["y"])
                .zip(month_number(&caps["month"]))
                .and_then(|(y, m)| render_month(y, m));
            claim(&mut found, &caps, date);
        }
        for caps in self.numeric_month_year.captures_iter(text) {
            let date = parse_year(&caps["y"])
                .zip(caps["m"].parse::<u32>().ok())
                .and_then(|(y, m)| render_month(y, m));
            claim(&mut found, &caps, date);
        }

        found.sort_by_key(|(start, _, _)| *start);
        unique(found.into_iter().map(|(_, _, date)| date))
    }

    fn years(&self, text: &str) -> Vec<i32> {
        let mut years = Vec::new();
        for caps in self.year.captures_iter(text) {
            if let Some(year) = parse_year(&caps["y"]) {
                if !years.contains(&year) {
                    years.push(year);
                }
            }
        }
        years
    }

    fn isbns(&self, text: &str) -> Vec<String> {
        let candidates = self
            .isbn_prefixed
            .captures_iter(text)
            .chain(self.isbn_bare.captures_iter(text))
            .filter_map(|caps| leading_isbn(&compact_identifier(&caps["isbn"])));
        unique(candidates)
    }

    fn issns(&self, text: &str) -> Vec<String> {
        let candidates = self.issn.captures_iter(text).filter_map(|caps| {
            let compact = compact_identifier(&caps["issn"]);
            issn_is_valid(&compact).then(|| format!("{}-{}", &compact[..4], &compact[4..]))
        });
        unique(candidates)
    }

    pub fn pages(&self, text: &str) -> Option<String> {
        let caps = self.pages.captures(text)?;
        let from = &caps["from"];
        Some(match caps.name("to") {
            Some(to) => format!("{}-{}", from, to.as_str()),
            None => from.to_string(),
        })
    }

    /// Names from a `by ...`/`Authors: ...` clause, else from a leading list
    /// such as `J. Smith, A. B. Jones and K. Lee.` which must contain initials.
    pub fn authors(&self, text: &str) -> Vec<Person> {
        for caps in self.author_clause.captures_iter(text) {
            let names = self.name_list_slice(&caps["names"]);
            let persons = self
                .split_names(names)
                .iter()
                .map_while(|piece| Person::parse(piece))
                .collect::<Vec<Person>>();
            if !persons.is_empty() {
                return persons;
            }
        }

        self.leading_authors(text)
            .map(|(persons, _)| persons)
            .unwrap_or_default()
    }

    /// Leading name list and the byte offset in `text` where it ends.
    pub fn leading_authors(&self, text: &str) -> Option<(Vec<Person>, usize)> {
        let offset = text.len() - text.trim_start().len();
        let slice = self.name_list_slice(text);
        let persons = self.name_list(slice)?;
        persons
            .iter()
            .any(Person::has_initial)
            .then_some((persons, offset + slice.len()))
    }

    /// Every piece of `names` parsed as a person, or `None`.
    pub fn name_list(&self, names: &str) -> Option<Vec<Person>> {
        let pieces = self.split_names(names);
        if pieces.is_empty() {
            return None;
        }
        pieces
            .iter()
            .map(|piece| Person::parse(piece))
            .collect::<Option<Vec<Person>>>()
    }

    fn name_list_slice<'t>(&self, text: &'t str) -> &'t str {
        let text = text.trim_start();
        let end = self
            .name_list_end
            .captures(text)
            .and_then(|caps| caps.name("stop").or_else(|| caps.name("other")))
            .map(|found| found.start())
            .unwrap_or(text.len());
        &text[..end]
    }

    /// Splits a name list, re-joining inverted names (`Smith, J.`).
    fn split_names(&self, names: &str) -> Vec<String> {
        let cleaned = self.et_al.replace_all(names, "");
        let mut pieces = Vec::<String>::new();

        for piece in self
            .name_separator
            .split(cleaned.trim())
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
        {
            let only_initials = piece.split_whitespace().all(person::is_initial_group);
            let previous_is_surname = pieces
                .last()
                .map(|previous| !previous.contains(' ') && !previous.contains(','))
                .unwrap_or(false);
            if only_initials && previous_is_surname {
                if let Some(previous) = pieces.last_mut() {
                    previous.push_str(", ");
                    previous.push_str(piece);
                }
                continue;
            }
            pieces.push(piece.to_string());
        }

        pieces
    }

    pub fn event(&self, text: &str) -> Option<String> {
        let from_pattern = |regex: &Regex| {
            regex
                .captures(text)
                .map(|caps| trim_trailing_punctuation(caps["event"].trim()).to_string())
                .filter(|event| !event.is_empty())
        };

        from_pattern(&self.proceedings)
            .or_else(|| from_pattern(&self.in_event))
            .or_else(|| from_pattern(&self.event_phrase))
            .or_else(|| {
                self.acronym_event
                    .captures_iter(text)
                    .find(|caps| !ACRONYM_STOPWORDS.contains(&&caps["acronym"]))
                    .map(|caps| format!("{} {}", &caps["acronym"], &caps["y"]))
            })
    }
}

fn compile(pattern: &str, name: &str) -> Result<Regex> {
    Regex::new(pattern).with_context(|| format!("failed to compile {name} regex"))
}

fn numeric_triple(caps: &Captures<'_>) -> Option<(i32, u32, u32)> {
    Some((
        parse_year(&caps["y"])?,
        caps["m"].parse().ok()?,
        caps["d"].parse().ok()?,
    ))
}

fn named_triple(caps: &Captures<'_>) -> Option<(i32, u32, u32)> {
    Some((
        parse_year(&caps["y"])?,
        month_number(&caps["month"])?,
        caps["d"].parse().ok()?,
    ))
}

/// Records a date unless its span overlaps one found by an earlier pattern.
fn claim(found: &mut Vec<(usize, usize, String)>, caps: &Captures<'_>, date: Option<String>) {
    let (Some(date), Some(whole)) = (date, caps.get(0)) else {
        return;
    };
    let (start, end) = (whole.start(), whole.end());
    if found
        .iter()
        .any(|(other_start, other_end, _)| start < *other_end && *other_start < end)
    {
        return;
    }
    found.push((start, end, date));
}

fn trim_trailing_punctuation(value: &str) -> &str {
    value.trim_end_matches(['.', ',', ';', ':', ')', ']', '}'])
}

fn unique<I: IntoIterator<Item = String>>(values: I) -> Vec<String> {
    let mut out = Vec::<String>::new();
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

use chrono::{Datelike, NaiveDate};

const MONTHS: &[(&str, u32)] = &[
    ("january", 1),
    ("jan", 1),
    ("february", 2),
    ("feb", 2),
    ("march", 3),
    ("mar", 3),
    ("april", 4),
    ("apr", 4),
    ("may", 5),
    ("june", 6),
    ("jun", 6),
    ("july", 7),
    ("jul", 7),
    ("august", 8),
    ("aug", 8),
    ("september", 9),
    ("sep", 9),
    ("sept", 9),
    ("october", 10),
    ("oct", 10),
    ("november", 11),
    ("nov", 11),
    ("december", 12),
    ("dec", 12),
    // Czech, nominative and genitive
    ("leden", 1),
    ("ledna", 1),
    ("únor", 2),
    ("února", 2),
    ("březen", 3),
    ("března", 3),
    ("duben", 4),
    ("dubna", 4),
    ("květen", 5),
    ("května", 5),
    ("červen", 6),
    ("června", 6),
    ("červenec", 7),
    ("července", 7),
    ("srpen", 8),
    ("srpna", 8),
    ("září", 9),
    ("říjen", 10),
    ("října", 10),
    ("listopad", 11),
    ("listopadu", 11),
    ("prosinec", 12),
    ("prosince", 12),
    // German
    ("januar", 1),
    ("jänner", 1),
    ("februar", 2),
    ("märz", 3),
    ("mai", 5),
    ("juni", 6),
    ("juli", 7),
    ("oktober", 10),
    ("okt", 10),
    ("dezember", 12),
    ("dez", 12),
];

pub fn month_number(word: &str) -> Option<u32> {
    let lowered = word.trim_end_matches('.').to_lowercase();
    MONTHS
        .iter()
        .find(|(name, _)| *name == lowered)
        .map(|(_, number)| *number)
}

/// `YYYY-MM-DD` when the triple is a real calendar day.
pub fn render_day(year: i32, month: u32, day: u32) -> Option<String> {
    NaiveDate::from_ymd_opt(year, month, day).map(|date| date.format("%Y-%m-%d").to_string())
}

pub fn render_month(year: i32, month: u32) -> Option<String> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|date| format!("{:04}-{:02}", date.year(), date.month()))
}

pub fn parse_year(raw: &str) -> Option<i32> {
    let year = raw.parse::<i32>().ok()?;
    (1900..=2099).contains(&year).then_some(year)
}

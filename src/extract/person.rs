use serde::{Deserialize, Serialize};

const PARTICLES: &[&str] = &["van", "von", "de", "der", "den", "da", "di", "du", "la", "le", "del"];
const MAX_NAME_TOKENS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub first: String,
    pub middle: Option<String>,
    pub last: String,
}

impl Person {
    /// Parses `J. Smith`, `Anna B. Jones`, `Ludwig van Beethoven` or the
    /// inverted `Smith, J. R.` into name parts. Returns `None` for anything
    /// that does not look like a personal name.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().trim_end_matches([',', ';']);

        if let Some((last, given)) = trimmed.split_once(',') {
            let last_tokens = last.split_whitespace().collect::<Vec<&str>>();
            let given_tokens = split_initials(given);
            if last_tokens.is_empty()
                || given_tokens.is_empty()
                || !last_tokens.iter().all(|token| is_word(token) || is_particle(token))
                || !given_tokens.iter().all(|token| is_initial(token) || is_word(token))
            {
                return None;
            }
            return Some(Self::from_parts(
                &given_tokens,
                strip_final_period(&last_tokens.join(" ")),
            ));
        }

        let tokens = split_initials(trimmed);
        if tokens.len() < 2 || tokens.len() > MAX_NAME_TOKENS {
            return None;
        }

        let last_start = tokens
            .iter()
            .position(|token| is_particle(token))
            .filter(|position| *position > 0)
            .unwrap_or(tokens.len() - 1);
        let (given, family) = tokens.split_at(last_start);

        if !given.iter().all(|token| is_initial(token) || is_word(token)) {
            return None;
        }
        let (surname, particles) = family.split_last()?;
        let surname = strip_final_period(surname);
        if !is_word(&surname) || !particles.iter().all(|token| is_particle(token)) {
            return None;
        }

        let mut last = particles.to_vec();
        last.push(surname);
        Some(Self::from_parts(given, last.join(" ")))
    }

    fn from_parts(given: &[String], last: String) -> Self {
        let first = given.first().cloned().unwrap_or_default();
        let middle = if given.len() > 1 {
            Some(given[1..].join(" "))
        } else {
            None
        };
        Self {
            first,
            middle,
            last,
        }
    }

    pub fn full_name(&self) -> String {
        let mut parts = vec![self.first.as_str()];
        if let Some(middle) = &self.middle {
            parts.push(middle);
        }
        parts.push(&self.last);
        parts
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<&str>>()
            .join(" ")
    }

    pub fn has_initial(&self) -> bool {
        is_initial(&self.first)
            || self
                .middle
                .as_deref()
                .map(|middle| middle.split_whitespace().any(is_initial))
                .unwrap_or(false)
    }
}

/// Splits whitespace tokens and glued initials such as `J.R.` into `J.` `R.`.
fn split_initials(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for token in raw.split_whitespace() {
        let pieces = token
            .split_inclusive('.')
            .filter(|piece| !piece.is_empty())
            .collect::<Vec<&str>>();
        if pieces.len() > 1 && pieces.iter().all(|piece| is_initial(piece)) {
            tokens.extend(pieces.into_iter().map(str::to_string));
        } else {
            tokens.push(token.to_string());
        }
    }
    tokens
}

/// `J.`, `J.-P.` or glued initials such as `J.R.`.
pub(super) fn is_initial_group(token: &str) -> bool {
    split_initials(token).iter().all(|piece| is_initial(piece))
}

fn strip_final_period(token: &str) -> String {
    if token.chars().count() > 2 {
        token.trim_end_matches('.').to_string()
    } else {
        token.to_string()
    }
}

fn is_initial(token: &str) -> bool {
    let chars = token.chars().collect::<Vec<char>>();
    match chars.as_slice() {
        [letter, '.'] => letter.is_uppercase(),
        [first, '.', '-', second, '.'] => first.is_uppercase() && second.is_uppercase(),
        _ => false,
    }
}

fn is_word(token: &str) -> bool {
    let token = token.trim_end_matches('.');
    let mut chars = token.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_uppercase()
        && token.chars().count() >= 2
        && chars.all(|ch| ch.is_alphabetic() || ch == '-' || ch == '\'' || ch == '’')
        && token.chars().skip(1).any(|ch| ch.is_lowercase())
}

fn is_particle(token: &str) -> bool {
    PARTICLES.contains(&token)
}

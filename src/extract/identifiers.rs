/// Digits plus a trailing `X`, with separators removed and `x` upper-cased.
pub fn compact_identifier(raw: &str) -> String {
    raw.chars()
        .filter(|ch| ch.is_ascii_digit() || *ch == 'X' || *ch == 'x')
        .map(|ch| ch.to_ascii_uppercase())
        .collect()
}

pub fn isbn10_is_valid(compact: &str) -> bool {
    let chars = compact.chars().collect::<Vec<char>>();
    if chars.len() != 10 {
        return false;
    }

    let mut sum = 0_u32;
    for (index, ch) in chars.iter().enumerate() {
        let value = match ch {
            'X' if index == 9 => 10,
            digit => match digit.to_digit(10) {
                Some(value) => value,
                None => return false,
            },
        };
        sum += (10 - index as u32) * value;
    }
    sum % 11 == 0
}

pub fn isbn13_is_valid(compact: &str) -> bool {
    if compact.len() != 13 || !compact.chars().all(|ch| ch.is_ascii_digit()) {
        return false;
    }

    let sum = compact
        .chars()
        .filter_map(|ch| ch.to_digit(10))
        .enumerate()
        .map(|(index, digit)| if index % 2 == 0 { digit } else { digit * 3 })
        .sum::<u32>();
    sum % 10 == 0
}

/// Longest valid ISBN at the start of `compact`, trying 13 digits before 10.
pub fn leading_isbn(compact: &str) -> Option<String> {
    if compact.len() >= 13 && isbn13_is_valid(&compact[..13]) {
        return Some(compact[..13].to_string());
    }
    if compact.len() >= 10 && isbn10_is_valid(&compact[..10]) {
        return Some(compact[..10].to_string());
    }
    None
}

pub fn issn_is_valid(compact: &str) -> bool {
    let chars = compact.chars().collect::<Vec<char>>();
    if chars.len() != 8 {
        return false;
    }

    let mut sum = 0_u32;
    for (index, ch) in chars[..7].iter().enumerate() {
        let Some(value) = ch.to_digit(10) else {
            return false;
        };
        sum += (8 - index as u32) * value;
    }

    let expected = (11 - sum % 11) % 11;
    match chars[7] {
        'X' => expected == 10,
        ch => ch.to_digit(10) == Some(expected),
    }
}

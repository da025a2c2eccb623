//! Best-effort recovery of a citation's access date from free text.
//!
//! Tokens are classified in descending lexical order, then a fallback pass
//! assigns leftover short tokens to month and day in written order. Ambiguous
//! inputs such as `03 04 2020` therefore resolve to 4 March.

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static ACCESSDATE_PARAM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)\baccess-?date\s*=\s*(?P<here>.*?)(?:\||\}\}|$)")
        .expect("accessdate pattern compiles")
});

// A period only ends the phrase when it closes the text or precedes a
// non-digit, so abbreviations like `Apr. 2012` stay intact.
static RETRIEVED_PHRASE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)(?:Retrieved|accessed) (?:on )?(?P<here>.*?)(?:\.(?:\s*$|\s+\D)|<|$)")
        .expect("retrieved pattern compiles")
});

static TOKEN_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,\-.;\s/]+").expect("token split pattern compiles"));

const MONTHS: [(&str, &str); 12] = [
    ("JAN", "01"),
    ("FEB", "02"),
    ("MAR", "03"),
    ("APR", "04"),
    ("MAY", "05"),
    ("JUN", "06"),
    ("JUL", "07"),
    ("AUG", "08"),
    ("SEP", "09"),
    ("OCT", "10"),
    ("NOV", "11"),
    ("DEC", "12"),
];

type Strategy = fn(&str) -> Option<String>;

/// Ordered ways of locating the raw date string; the first match wins.
const STRATEGIES: [(&str, Strategy); 2] = [
    ("accessdate-param", from_accessdate_param),
    ("retrieved-phrase", from_retrieved_phrase),
];

/// Access date of a reference as midnight UTC, if one can be determined.
pub fn extract_accessdate(reference_text: &str) -> Option<DateTime<Utc>> {
    let raw = find_raw_accessdate(reference_text)?;
    let date = parse_loose_date(&raw);
    debug!(raw = %raw, parsed = ?date, "accessdate candidate");
    date?.and_hms_opt(0, 0, 0).map(|value| value.and_utc())
}

pub fn find_raw_accessdate(reference_text: &str) -> Option<String> {
    STRATEGIES.iter().find_map(|(name, strategy)| {
        let found = strategy(reference_text)?;
        debug!(strategy = name, "accessdate located");
        Some(found)
    })
}

fn from_accessdate_param(text: &str) -> Option<String> {
    capture_here(&ACCESSDATE_PARAM_RE, text)
}

fn from_retrieved_phrase(text: &str) -> Option<String> {
    capture_here(&RETRIEVED_PHRASE_RE, text)
}

fn capture_here(pattern: &Regex, text: &str) -> Option<String> {
    let captures = pattern.captures(text)?;
    Some(captures.name("here")?.as_str().trim().to_string())
}

/// Turn a noisy date string into a calendar date.
pub fn parse_loose_date(raw: &str) -> Option<NaiveDate> {
    let tokens = TOKEN_SPLIT_RE
        .split(raw)
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>();

    let mut sorted = tokens.clone();
    sorted.sort_unstable_by(|left, right| right.cmp(left));

    let mut year: Option<String> = None;
    let mut month: Option<String> = None;
    let mut day: Option<String> = None;

    for token in &sorted {
        if month.is_none()
            && let Some(number) = month_number(token)
        {
            month = Some(number.to_string());
        } else if year.is_none() && starts_with_four_digits(token) {
            year = Some((*token).to_string());
        } else if let Some(digits) = leading_digits(token) {
            let above_twelve = digits.parse::<u64>().map_or(true, |value| value > 12);
            if above_twelve {
                day = Some(digits.to_string());
            } else if month.is_some() && day.is_none() {
                day = Some(digits.to_string());
            } else if day.is_some() && month.is_none() {
                month = Some(digits.to_string());
            }
        }
    }

    if year.is_none() || month.is_none() || day.is_none() {
        for token in &tokens {
            if token.chars().count() > 2 {
                continue;
            }
            if month.is_none() {
                month = Some((*token).to_string());
            } else {
                day = Some((*token).to_string());
            }
        }
    }

    compose_date(&year?, &zero_pad(month?), &zero_pad(day?))
}

fn compose_date(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    if year.len() != 4 || month.len() != 2 || day.len() != 2 {
        return None;
    }
    if ![year, month, day]
        .iter()
        .all(|part| part.bytes().all(|byte| byte.is_ascii_digit()))
    {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn month_number(token: &str) -> Option<&'static str> {
    let prefix = token.chars().take(3).collect::<String>().to_uppercase();
    MONTHS
        .iter()
        .find(|(abbreviation, _)| *abbreviation == prefix)
        .map(|(_, number)| *number)
}

fn starts_with_four_digits(token: &str) -> bool {
    token.len() >= 4 && token.bytes().take(4).all(|byte| byte.is_ascii_digit())
}

fn leading_digits(token: &str) -> Option<&str> {
    let end = token
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(token.len());
    if end == 0 { None } else { Some(&token[..end]) }
}

fn zero_pad(value: String) -> String {
    if value.chars().count() == 1 {
        format!("0{value}")
    } else {
        value
    }
}

// Pure helpers over a discussion thread's title and body.

use std::ops::RangeInclusive;
use std::sync::LazyLock;

use regex::Regex;

static EPISODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^.*(?:Episodes?|Ep\.?)\s*([\d-]+).*$").expect("valid regex")
});

static EPISODE_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i):?\s*(?:Episodes?|Ep\.?)\s*[\d-]+").expect("valid regex")
});

static SPACED_DASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+-\s+").expect("valid regex"));

static BOILERPLATE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["Discussion", "Spoilers", "Thread"]
        .iter()
        .map(|word| Regex::new(&format!("(?i){}", regex::escape(word))).expect("valid regex"))
        .collect()
});

static TRAILING_WORDS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["Final", "Episode"]
        .iter()
        .map(|word| Regex::new(&format!("(?i){}", regex::escape(word))).expect("valid regex"))
        .collect()
});

fn is_opening(c: char) -> bool {
    matches!(c, '(' | '[' | '{' | '<')
}

fn is_closing(c: char) -> bool {
    matches!(c, ')' | ']' | '}' | '>')
}

/// Drop everything between an opening and the next closing bracket, brackets
/// included. Nesting is not tracked; a stray closing bracket is dropped too.
pub fn strip_brackets(text: &str) -> String {
    let mut inside = false;
    text.chars()
        .filter(|&c| {
            if is_opening(c) {
                inside = true;
            } else if is_closing(c) {
                inside = false;
                return false;
            }
            !inside
        })
        .collect()
}

/// Episode number(s) announced in a title: `Episode 5`, `Ep. 3`, `Episodes 1-3`.
pub fn episode_range(title: &str) -> Option<RangeInclusive<u32>> {
    let raw = EPISODE_RE.captures(title)?.get(1)?.as_str();

    if raw.contains('-') {
        let numbers: Vec<u32> = raw.split('-').filter_map(|s| s.parse().ok()).collect();
        match numbers.as_slice() {
            [] => None,
            [only] => Some(*only..=*only),
            [first, .., last] => Some(*first..=*last),
        }
    } else {
        let n: u32 = raw.parse().ok()?;
        Some(n..=n)
    }
}

/// The show name a discussion title refers to, with annotations and
/// discussion boilerplate removed. Used as the free-text search query.
pub fn show_title(title: &str) -> String {
    let mut text = strip_brackets(title);
    for re in BOILERPLATE.iter() {
        text = re.replace_all(&text, "").into_owned();
    }
    text = EPISODE_MARKER_RE.replace_all(&text, "").into_owned();
    for re in TRAILING_WORDS.iter() {
        text = re.replace_all(&text, "").into_owned();
    }
    text = SPACED_DASH_RE.replace_all(&text, " ").into_owned();

    let trimmed = text.trim();
    let trimmed = trimmed.strip_suffix('-').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('–').unwrap_or(trimmed);
    trimmed.trim().to_string()
}

//! Classification of the ` - ` separated description line every story
//! carries, e.g.
//!
//! `Rated: T - English - Humor/Adventure - Chapters: 2 - Words: 131,097 -
//! Reviews: 537 - Favs: 2,515 - Follows: 2,207 - Updated: Jul 27, 2016 -
//! Published: Dec 17, 2009 - Harry P.`
//!
//! Only the rating and the language have a fixed position. After an optional
//! genre token every other field is recognized by its prefix, so the order of
//! the rest of the line does not matter.

use chrono::{DateTime, Datelike as _, NaiveDate, TimeZone as _, Utc};
use ffnet_common::models::{Meta, Rating};

use crate::{
    markup::{parse_count, tokenize},
    ExtractError,
};

pub const GENRES: [&str; 22] = [
    "General",
    "Romance",
    "Humor",
    "Drama",
    "Poetry",
    "Adventure",
    "Mystery",
    "Horror",
    "Parody",
    "Angst",
    "Supernatural",
    "Suspense",
    "Sci-Fi",
    "Fantasy",
    "Spiritual",
    "Tragedy",
    "Western",
    "Crime",
    "Family",
    "Hurt",
    "Comfort",
    "Friendship",
];

const RATING_MARKER: &str = "Rated:";
const ID_MARKER: &str = "id:";
const COMPLETE_MARKER: &str = "Complete";

const DATE_FORMATS: [&str; 2] = ["%m/%d/%Y", "%b %d, %Y"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountField {
    Chapters,
    Words,
    Reviews,
    Favs,
    Follows,
}

impl CountField {
    pub const PREFIXES: [(&'static str, CountField); 5] = [
        ("Chapters: ", CountField::Chapters),
        ("Words: ", CountField::Words),
        ("Reviews: ", CountField::Reviews),
        ("Favs: ", CountField::Favs),
        ("Follows: ", CountField::Follows),
    ];

    fn name(self) -> &'static str {
        match self {
            CountField::Chapters => "chapters",
            CountField::Words => "words",
            CountField::Reviews => "reviews",
            CountField::Favs => "favs",
            CountField::Follows => "follows",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateField {
    Updated,
    Published,
}

impl DateField {
    pub const PREFIXES: [(&'static str, DateField); 2] = [
        ("Updated: ", DateField::Updated),
        ("Published: ", DateField::Published),
    ];
}

fn match_prefix<'t, F: Copy>(
    table: &[(&'static str, F)],
    token: &'t str,
) -> Option<(F, &'t str)> {
    table
        .iter()
        .find_map(|(prefix, field)| token.strip_prefix(prefix).map(|rest| (*field, rest)))
}

#[derive(Default)]
struct Counts {
    chapters: Option<u64>,
    words: Option<u64>,
    reviews: Option<u64>,
    favs: Option<u64>,
    follows: Option<u64>,
}

impl Counts {
    fn slot(&mut self, field: CountField) -> &mut Option<u64> {
        match field {
            CountField::Chapters => &mut self.chapters,
            CountField::Words => &mut self.words,
            CountField::Reviews => &mut self.reviews,
            CountField::Favs => &mut self.favs,
            CountField::Follows => &mut self.follows,
        }
    }
}

/// Splits and classifies a plain text description line.
pub fn parse_line(line: &str) -> Result<Meta, ExtractError> {
    classify(&tokenize(line))
}

/// Classifies description tokens, substituting the current time for
/// unreadable dates.
pub fn classify<S: AsRef<str>>(tokens: &[S]) -> Result<Meta, ExtractError> {
    classify_at(tokens, Utc::now())
}

/// Same as [`classify`] with an explicit fallback time.
pub fn classify_at<S: AsRef<str>>(tokens: &[S], now: DateTime<Utc>) -> Result<Meta, ExtractError> {
    let tokens: Vec<&str> = tokens.iter().map(|t| t.as_ref().trim()).collect();

    // crossover and fandom tokens come before the rating
    let start = tokens
        .iter()
        .position(|t| t.starts_with(RATING_MARKER))
        .ok_or_else(|| ExtractError::missing("description", "rating"))?;
    let mut tokens = &tokens[start..];

    let rating = tokens[0]
        .trim_start_matches(RATING_MARKER)
        .replace("Fiction", "");
    let rating = Rating::from(rating.trim());

    let language = tokens
        .get(1)
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .ok_or_else(|| ExtractError::missing("description", "language"))?;

    tokens = &tokens[2..];

    let genres = match tokens.first() {
        Some(token) if is_genre_run(token) => {
            let genres = token.split('/').map(String::from).collect();
            tokens = &tokens[1..];
            genres
        }
        _ => Vec::new(),
    };

    if let Some((last, rest)) = tokens.split_last() {
        if last.starts_with(ID_MARKER) {
            tokens = rest;
        }
    }

    let mut complete = false;
    if let Some((last, rest)) = tokens.split_last() {
        if last.contains(COMPLETE_MARKER) {
            complete = true;
            tokens = rest;
        }
    }

    let mut counts = Counts::default();
    let mut published = None;
    let mut updated = None;
    let mut characters: Option<Vec<String>> = None;

    for token in tokens {
        if let Some((field, value)) = match_prefix(&CountField::PREFIXES, token) {
            match parse_count(value) {
                Some(count) => *counts.slot(field) = Some(count),
                None => {
                    tracing::warn!(field = field.name(), value, "unreadable count, ignoring it")
                }
            }
        } else if let Some((field, value)) = match_prefix(&DateField::PREFIXES, token) {
            let date = parse_date(value, now);

            match field {
                DateField::Updated => updated = Some(date),
                DateField::Published => published = Some(date),
            }
        } else {
            if characters.is_some() {
                tracing::debug!(token, "second character token, replacing the first");
            }

            characters = Some(split_characters(token));
        }
    }

    let published = published.unwrap_or_else(|| {
        tracing::warn!("description has no published date, using the current time");

        now
    });

    Ok(Meta {
        rating,
        language,
        genres,
        characters: characters.unwrap_or_default(),
        chapter_count: counts
            .chapters
            .and_then(|c| u32::try_from(c).ok())
            .filter(|c| *c >= 1)
            .unwrap_or(1),
        word_count: counts.words.unwrap_or(0),
        reviews: counts.reviews.unwrap_or(0),
        favs: counts.favs.unwrap_or(0),
        followers: counts.follows.unwrap_or(0),
        published,
        updated: updated.unwrap_or(published),
        complete,
    })
}

fn is_genre_run(token: &str) -> bool {
    token.split('/').all(|genre| GENRES.contains(&genre))
}

fn split_characters(token: &str) -> Vec<String> {
    token
        .split(',')
        .map(|c| c.replace(|ch: char| ch == '[' || ch == ']', ""))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

/// Parses the dates the site renders, falling back to `now`.
///
/// Dates of the current year are rendered without one.
pub fn parse_date(value: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let value = value.trim();

    let date = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(&format!("{}/{}", value, now.year()), "%m/%d/%Y").ok()
        });

    match date.and_then(|d| d.and_hms_opt(0, 0, 0)) {
        Some(naive) => Utc.from_utc_datetime(&naive),
        None => {
            tracing::warn!(value, "malformed date, using the current time");

            now
        }
    }
}

/// Decodes the epoch seconds the site stores in `data-xutime` attributes.
pub fn from_xutime(seconds: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0).single()
}

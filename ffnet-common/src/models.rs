use std::fmt;

use chrono::{DateTime, Utc};

#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum Rating {
    #[serde(rename = "K")]
    K,
    #[serde(rename = "K+")]
    KPlus,
    #[serde(rename = "T")]
    Teen,
    #[serde(rename = "M")]
    Mature,
    #[serde(rename = "other")]
    Other(String),
}

impl From<&str> for Rating {
    fn from(label: &str) -> Self {
        match label {
            "K" => Rating::K,
            "K+" => Rating::KPlus,
            "T" => Rating::Teen,
            "M" => Rating::Mature,
            other => Rating::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rating::K => f.write_str("K"),
            Rating::KPlus => f.write_str("K+"),
            Rating::Teen => f.write_str("T"),
            Rating::Mature => f.write_str("M"),
            Rating::Other(label) => f.write_str(label),
        }
    }
}

/// Everything the description line of a story carries.
///
/// Every field is always set, inputs missing from the line are defaulted
/// while the line is classified.
#[derive(Clone, Debug, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Meta {
    pub rating: Rating,
    pub language: String,
    pub genres: Vec<String>,
    pub characters: Vec<String>,
    pub chapter_count: u32,
    pub word_count: u64,
    pub reviews: u64,
    pub favs: u64,
    pub followers: u64,
    pub published: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub complete: bool,
}

/// Where the fields of a [`Story`] were taken from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoryOrigin {
    /// Parsed from the story's own page.
    Page,
    /// Summary parsed out of a multi story listing, no per story fetch was made.
    Listing,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Story {
    pub id: u64,
    pub title: String,
    pub fandoms: Vec<String>,
    pub author_id: u64,
    pub author_name: Option<String>,
    pub meta: Meta,
    pub origin: StoryOrigin,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Chapter {
    pub story_id: u64,
    pub number: u32,
    pub story_text_id: Option<u64>,
    pub title: String,
    pub raw_text: String,
    pub text_list: Vec<String>,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Review {
    pub story_id: u64,
    /// Chapter the review listing was requested for, `0` meaning all chapters.
    pub chapter: u32,
    pub chapter_label: Option<String>,
    pub user_name: String,
    /// `None` for anonymous reviewers.
    pub user_id: Option<u64>,
    pub time_ago: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub story_count: u32,
    pub favorite_count: u32,
    pub favorite_author_count: u32,
    pub favorite_stories: Vec<Story>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct UserLink {
    pub id: u64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct StoryLink {
    pub id: u64,
    pub title: String,
}

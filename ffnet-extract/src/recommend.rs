use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    markup::capture,
    query::{Document, Element},
    story::{parse_description_html, parse_id},
    ExtractError,
};

static STORY_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/s/(\d+)/").expect("story href pattern is valid"));

/// A story of a fandom listing, scored by how many follows each of its
/// chapters earned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub story_id: u64,
    pub title: String,
    pub followers: u64,
    pub chapters: u32,
    pub score: f64,
}

impl Candidate {
    pub fn qualifies(&self, threshold: f64) -> bool {
        self.score > threshold
    }
}

fn parse_entry(entry: &Element) -> Result<Candidate, ExtractError> {
    let link = entry
        .first("a.stitle")
        .ok_or_else(|| ExtractError::missing("candidate", "story link"))?;

    let href = link.attr("href").unwrap_or_default();
    let story_id = parse_id("candidate", "story link", capture(&STORY_HREF, &href))?;

    let details = entry
        .first("div.z-padtop2")
        .and_then(|div| div.outer_html())
        .ok_or_else(|| ExtractError::missing("candidate", "description"))?;

    let meta = parse_description_html(&details)?;

    Ok(Candidate {
        story_id,
        title: link.text().trim().to_string(),
        followers: meta.followers,
        chapters: meta.chapter_count,
        score: meta.followers as f64 / f64::from(meta.chapter_count.max(1)),
    })
}

/// Scores every story of a listing page, in page order.
///
/// Entries that cannot be read are logged and left out.
pub fn candidates(markup: &str) -> Result<Vec<Candidate>, ExtractError> {
    let doc = Document::parse(markup)?;

    Ok(doc
        .select("div.z-list")
        .iter()
        .filter_map(|entry| match parse_entry(entry) {
            Ok(candidate) => Some(candidate),
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable listing entry");

                None
            }
        })
        .collect())
}

/// Stories of a listing page scoring above `threshold`.
pub fn recommend(markup: &str, threshold: f64) -> Result<Vec<Candidate>, ExtractError> {
    recommend_with(markup, threshold, 0, |_| {})
}

/// Like [`recommend`], handing the first `limit` qualifying stories to
/// `on_qualify` as they are found.
#[tracing::instrument(skip(markup, on_qualify), err)]
pub fn recommend_with(
    markup: &str,
    threshold: f64,
    limit: usize,
    mut on_qualify: impl FnMut(&Candidate),
) -> Result<Vec<Candidate>, ExtractError> {
    let qualified: Vec<Candidate> = candidates(markup)?
        .into_iter()
        .filter(|candidate| candidate.qualifies(threshold))
        .collect();

    tracing::info!(qualified = qualified.len(), "scored listing");

    for candidate in qualified.iter().take(limit) {
        tracing::debug!(story_id = candidate.story_id, score = candidate.score, "recommended");

        on_qualify(candidate);
    }

    Ok(qualified)
}

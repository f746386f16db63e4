use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use ffnet_common::{
    fetch::Fetch,
    models::{Meta, Story, StoryOrigin},
};
use regex::Regex;

use crate::{
    description,
    markup::{capture, decode_entities, strip_tags, tokenize, unescape_js},
    query::{Document, Element},
    site::Site,
    ExtractError,
};

static STORY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"var\s+storyid\s*=\s*(\d+);").expect("story id pattern is valid"));
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"var\s+title\s*=\s*'(.+)';").expect("title pattern is valid"));
static USER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"var\s+userid\s*=\s*(\d+);").expect("user id pattern is valid"));
static AUTHOR_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"href='/u/\d+/(.+?)'").expect("author pattern is valid"));
static DESCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)Rated:.+?</div>").expect("description pattern is valid"));
static PUBLISHED_XUTIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Published:\s*<span[^>]*data-xutime=['"](\d+)['"]"#)
        .expect("published pattern is valid")
});
static UPDATED_XUTIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Updated:\s*<span[^>]*data-xutime=['"](\d+)['"]"#)
        .expect("updated pattern is valid")
});

pub(crate) static USER_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/u/(\d+)").expect("user link pattern is valid"));

/// The title the page embeds in its script block, `+` standing for spaces.
pub(crate) fn script_title(markup: &str) -> Option<String> {
    capture(&TITLE, markup).map(|title| unescape_js(&title.replace('+', " ")))
}

pub(crate) fn parse_id(
    entity: &'static str,
    field: &'static str,
    value: Option<&str>,
) -> Result<u64, ExtractError> {
    let value = value.ok_or_else(|| ExtractError::missing(entity, field))?;

    value
        .trim()
        .parse()
        .map_err(|_| ExtractError::InvalidNumber {
            entity,
            field,
            value: value.to_string(),
        })
}

/// Parses a story's own page.
#[tracing::instrument(skip(markup), err)]
pub fn parse_page(markup: &str) -> Result<Story, ExtractError> {
    let id = parse_id("story", "storyid", capture(&STORY_ID, markup))?;

    let title = script_title(markup).ok_or_else(|| ExtractError::missing("story", "title"))?;

    let author_id = parse_id("story", "userid", capture(&USER_ID, markup))?;
    let author_name = capture(&AUTHOR_NAME, markup).map(String::from);

    let doc = Document::parse(markup)?;
    let fandoms = doc
        .select("#pre_story_links a")
        .last()
        .map(|link| split_fandoms(&link.text().replace("Crossover", ""), '+'))
        .unwrap_or_default();

    let block = DESCRIPTION
        .find(markup)
        .map(|m| m.as_str())
        .ok_or_else(|| ExtractError::missing("story", "description"))?;

    let meta = parse_description_html(block)?;

    tracing::debug!(id, title = %title, "parsed story page");

    Ok(Story {
        id,
        title,
        fandoms,
        author_id,
        author_name,
        meta,
        origin: StoryOrigin::Page,
        fetched_at: Utc::now(),
    })
}

/// Fetches and parses a story's first page.
pub fn fetch<F: Fetch + ?Sized>(fetch: &F, site: &Site, story_id: u64) -> Result<Story, ExtractError> {
    let url = site.story(story_id)?;
    let markup = fetch.fetch(&url)?;
    let story = parse_page(&markup)?;

    if story.id != story_id {
        tracing::warn!(story_id, got = story.id, "story page does not match the request");
    }

    Ok(story)
}

/// Parses one story entry of a listing, such as a user's favorites.
///
/// Fixed fields come from the entry's `data-*` attributes, the description
/// line from its grey detail row.
pub fn parse_listing(entry: &Element) -> Result<Story, ExtractError> {
    let id = parse_id("listing", "data-storyid", entry.attr("data-storyid").as_deref())?;

    let title = entry
        .attr("data-title")
        .ok_or_else(|| ExtractError::missing("listing", "data-title"))?;

    let fandoms = entry
        .attr("data-category")
        .map(|category| split_fandoms(&category, '&'))
        .unwrap_or_default();

    let (author_id, author_name) = entry
        .select("a")
        .into_iter()
        .find_map(|link| {
            let href = link.attr("href")?;
            let id = capture(&USER_LINK, &href)?.parse::<u64>().ok()?;
            Some((id, link.text().trim().to_string()))
        })
        .ok_or_else(|| ExtractError::missing("listing", "author id"))?;

    let details = entry
        .first("div.z-padtop2")
        .and_then(|div| div.outer_html())
        .ok_or_else(|| ExtractError::missing("listing", "description"))?;

    let meta = parse_description_html(&details)?;

    Ok(Story {
        id,
        title,
        fandoms,
        author_id,
        author_name: Some(author_name).filter(|name| !name.is_empty()),
        meta,
        origin: StoryOrigin::Listing,
        fetched_at: Utc::now(),
    })
}

/// Classifies a description block still carrying its markup.
///
/// The rendered dates are only day precise, so the epoch stamps the site
/// attaches to them take precedence.
pub(crate) fn parse_description_html(html: &str) -> Result<Meta, ExtractError> {
    let text = decode_entities(&strip_tags(html));
    let mut meta = description::classify(&tokenize(&text))?;

    let published = xutime(&PUBLISHED_XUTIME, html);
    let updated = xutime(&UPDATED_XUTIME, html);

    if let Some(published) = published {
        meta.published = published;
    }

    match updated {
        Some(updated) => meta.updated = updated,
        None if published.is_some() => meta.updated = meta.published,
        None => {}
    }

    Ok(meta)
}

fn xutime(re: &Regex, html: &str) -> Option<DateTime<Utc>> {
    capture(re, html)
        .and_then(|seconds| seconds.parse().ok())
        .and_then(description::from_xutime)
}

fn split_fandoms(chunk: &str, separator: char) -> Vec<String> {
    chunk
        .split(separator)
        .map(str::trim)
        .filter(|fandom| !fandom.is_empty())
        .map(String::from)
        .collect()
}

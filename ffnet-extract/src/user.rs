use std::sync::LazyLock;

use chrono::Utc;
use ffnet_common::{
    fetch::Fetch,
    models::{Story, StoryLink, User, UserLink},
    Uri,
};
use regex::Regex;

use crate::{
    markup::{capture, decode_entities, parse_count},
    paginate::PageSource,
    query::Document,
    site::Site,
    story::{self, parse_id, USER_LINK},
    ExtractError,
};

static USERNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<link rel=["']canonical["'] href=["'][^"']*/u/\d+/([^"']+)["']"#)
        .expect("username pattern is valid")
});
static STORY_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"My Stories\s*<span class=["']?badge["']?>([\d,]+)<"#)
        .expect("story count pattern is valid")
});
static FAVORITE_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Favorite Stories\s*<span class=["']?badge["']?>([\d,]+)<"#)
        .expect("favorite count pattern is valid")
});
static FAVORITE_AUTHOR_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Favorite Authors\s*<span class=["']?badge["']?>([\d,]+)<"#)
        .expect("favorite author count pattern is valid")
});

static FEED_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<entry>.*?</entry>").expect("entry pattern is valid"));
static FEED_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<title[^>]*>(.*?)</title>").expect("title pattern is valid"));
static LINK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<link[^>]*>").expect("link pattern is valid"));
static ALTERNATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"rel=["']alternate["']"#).expect("rel pattern is valid"));
static HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href=["']([^"']+)["']"#).expect("href pattern is valid"));
static STORY_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/s/(\d+)").expect("story link pattern is valid"));

fn badge(re: &Regex, markup: &str) -> u32 {
    capture(re, markup)
        .and_then(parse_count)
        .and_then(|count| u32::try_from(count).ok())
        .unwrap_or(0)
}

/// Parses a user's profile page, including the summaries of their favorite
/// stories.
#[tracing::instrument(skip(markup), err)]
pub fn parse_page(user_id: u64, markup: &str) -> Result<User, ExtractError> {
    let username = capture(&USERNAME, markup)
        .map(String::from)
        .ok_or_else(|| ExtractError::missing("user", "username"))?;

    let doc = Document::parse(markup)?;

    Ok(User {
        id: user_id,
        username,
        story_count: badge(&STORY_COUNT, markup),
        favorite_count: badge(&FAVORITE_COUNT, markup),
        favorite_author_count: badge(&FAVORITE_AUTHOR_COUNT, markup),
        favorite_stories: favorite_stories(&doc),
        fetched_at: Utc::now(),
    })
}

fn favorite_stories(doc: &Document) -> Vec<Story> {
    doc.select("div.favstories")
        .iter()
        .filter_map(|entry| match story::parse_listing(entry) {
            Ok(story) => Some(story),
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable favorite story");

                None
            }
        })
        .collect()
}

/// Authors linked from the last table of a profile page.
pub fn favorite_authors(markup: &str) -> Result<Vec<Result<UserLink, ExtractError>>, ExtractError> {
    let doc = Document::parse(markup)?;

    let table = match doc.select("table").pop() {
        Some(table) => table,
        None => return Ok(Vec::new()),
    };

    Ok(table
        .select("a")
        .into_iter()
        .filter_map(|link| {
            let href = link.attr("href")?;
            let id = capture(&USER_LINK, &href)?;

            Some(
                parse_id("favorite author", "id", Some(id)).map(|id| UserLink {
                    id,
                    name: link.text().trim().to_string(),
                }),
            )
        })
        .collect())
}

/// Stories listed in a user's atom feed.
pub fn feed_stories(feed: &str) -> Vec<Result<StoryLink, ExtractError>> {
    FEED_ENTRY
        .find_iter(feed)
        .map(|entry| {
            let entry = entry.as_str();

            let href = LINK_TAG
                .find_iter(entry)
                .map(|tag| tag.as_str())
                .filter(|tag| ALTERNATE.is_match(tag))
                .find_map(|tag| capture(&HREF, tag));

            let id = parse_id("feed entry", "story link", href.and_then(|href| capture(&STORY_LINK, href)))?;

            let title = capture(&FEED_TITLE, entry)
                .map(|title| {
                    let title = title.trim();
                    let title = title
                        .strip_prefix("<![CDATA[")
                        .and_then(|t| t.strip_suffix("]]>"))
                        .unwrap_or(title);

                    decode_entities(title.trim())
                })
                .unwrap_or_default();

            Ok(StoryLink { id, title })
        })
        .collect()
}

/// The favorite authors of a user, all listed on the profile page.
pub struct FavoriteAuthorPages {
    site: Site,
    user_id: u64,
}

impl FavoriteAuthorPages {
    pub fn new(site: Site, user_id: u64) -> Self {
        FavoriteAuthorPages { site, user_id }
    }
}

impl PageSource for FavoriteAuthorPages {
    type Item = UserLink;

    fn url(&self, page: u32) -> Option<Result<Uri, ExtractError>> {
        (page == self.first_page()).then(|| self.site.user(self.user_id))
    }

    fn extract(&self, body: &str) -> Result<Vec<Result<UserLink, ExtractError>>, ExtractError> {
        favorite_authors(body)
    }
}

/// The stories a user wrote, as listed by their atom feed.
pub struct AuthoredStoryPages {
    site: Site,
    user_id: u64,
}

impl AuthoredStoryPages {
    pub fn new(site: Site, user_id: u64) -> Self {
        AuthoredStoryPages { site, user_id }
    }
}

impl PageSource for AuthoredStoryPages {
    type Item = StoryLink;

    fn url(&self, page: u32) -> Option<Result<Uri, ExtractError>> {
        (page == self.first_page()).then(|| self.site.user_feed(self.user_id))
    }

    fn extract(&self, body: &str) -> Result<Vec<Result<StoryLink, ExtractError>>, ExtractError> {
        Ok(feed_stories(body))
    }
}

/// Fetches and parses a user's profile.
pub fn fetch<F: Fetch + ?Sized>(fetch: &F, site: &Site, user_id: u64) -> Result<User, ExtractError> {
    let url = site.user(user_id)?;
    let markup = fetch.fetch(&url)?;

    parse_page(user_id, &markup)
}

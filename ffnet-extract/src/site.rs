use std::{fmt, str::FromStr};

use ffnet_common::{Conf, Uri, DEFAULT_BASE_URL};

use crate::ExtractError;

/// URL layout of the site, rooted at a configurable base.
#[derive(Clone, Debug)]
pub struct Site {
    root: String,
}

impl Default for Site {
    fn default() -> Self {
        Site::new(DEFAULT_BASE_URL)
    }
}

impl Site {
    pub fn new(root: &str) -> Self {
        Site {
            root: root.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_conf(conf: &Conf) -> Self {
        Site::new(conf.base_url())
    }

    fn uri(&self, path: String) -> Result<Uri, ExtractError> {
        let url = format!("{}{}", self.root, path);

        Uri::try_from(url.as_str()).map_err(|source| ExtractError::InvalidUrl { url, source })
    }

    pub fn story(&self, story_id: u64) -> Result<Uri, ExtractError> {
        self.uri(format!("/s/{}", story_id))
    }

    pub fn chapter(&self, story_id: u64, number: u32) -> Result<Uri, ExtractError> {
        self.uri(format!("/s/{}/{}", story_id, number))
    }

    /// Review page `page` (1-based) for one chapter, `0` meaning all chapters.
    pub fn reviews(&self, story_id: u64, chapter: u32, page: u32) -> Result<Uri, ExtractError> {
        self.uri(format!("/r/{}/{}/{}/", story_id, chapter, page))
    }

    pub fn user(&self, user_id: u64) -> Result<Uri, ExtractError> {
        self.uri(format!("/u/{}", user_id))
    }

    pub fn user_feed(&self, user_id: u64) -> Result<Uri, ExtractError> {
        self.uri(format!("/atom/u/{}/", user_id))
    }

    pub fn listing(&self, query: &ListingQuery) -> Result<Uri, ExtractError> {
        self.uri(format!(
            "/{}/{}/?srt={}&r={}&c1={}",
            query.medium,
            query.fandom,
            query.sort as u8,
            query.rating as u8,
            query.character
        ))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortBy {
    UpdateDate = 1,
    PublishDate = 2,
    Reviews = 3,
    Favorites = 4,
    #[default]
    Follows = 5,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RatingFilter {
    #[default]
    All = 10,
    Mature = 4,
    Teen = 3,
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "update" | "updated" => Ok(SortBy::UpdateDate),
            "publish" | "published" => Ok(SortBy::PublishDate),
            "reviews" => Ok(SortBy::Reviews),
            "favorites" | "favs" => Ok(SortBy::Favorites),
            "follows" => Ok(SortBy::Follows),
            other => Err(format!("unknown sort order `{}`", other)),
        }
    }
}

impl FromStr for RatingFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(RatingFilter::All),
            "m" | "mature" => Ok(RatingFilter::Mature),
            "t" | "teen" => Ok(RatingFilter::Teen),
            other => Err(format!("unknown rating filter `{}`", other)),
        }
    }
}

/// One fandom listing page, e.g. `/anime/Death-Note/`.
#[derive(Clone, Debug)]
pub struct ListingQuery {
    pub medium: String,
    pub fandom: String,
    pub sort: SortBy,
    pub rating: RatingFilter,
    pub character: String,
}

impl ListingQuery {
    pub fn new(fandom: impl Into<String>) -> Self {
        ListingQuery {
            medium: "anime".to_string(),
            fandom: fandom.into(),
            sort: SortBy::default(),
            rating: RatingFilter::default(),
            character: String::new(),
        }
    }
}

impl fmt::Display for ListingQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.medium, self.fandom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_urls_under_the_root() {
        let site = Site::new("https://www.fanfiction.net/");

        assert_eq!(site.chapter(12, 3).unwrap().path(), "/s/12/3");
        assert_eq!(site.reviews(12, 0, 2).unwrap().path(), "/r/12/0/2/");
        assert_eq!(site.user_feed(7).unwrap().path(), "/atom/u/7/");

        let listing = site.listing(&ListingQuery::new("Death-Note")).unwrap();
        assert_eq!(listing.path(), "/anime/Death-Note/");
        assert_eq!(listing.query(), Some("srt=5&r=10&c1="));
    }

    #[test]
    fn listing_filters_parse_from_names() {
        let query = ListingQuery {
            medium: "book".into(),
            sort: "reviews".parse().unwrap(),
            rating: "M".parse().unwrap(),
            character: "12345".into(),
            ..ListingQuery::new("Harry-Potter")
        };
        let listing = Site::default().listing(&query).unwrap();

        assert_eq!(listing.path(), "/book/Harry-Potter/");
        assert_eq!(listing.query(), Some("srt=3&r=4&c1=12345"));
        assert!("newest".parse::<SortBy>().is_err());
    }

    #[test]
    fn invalid_roots_are_reported() {
        let site = Site::new("not a url");

        assert!(matches!(site.story(1), Err(ExtractError::InvalidUrl { .. })));
    }
}

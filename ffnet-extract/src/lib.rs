//! Extraction of stories, chapters, reviews and user profiles from
//! fanfiction.net pages, plus the lazy iterators that walk their pages.

pub mod chapter;
pub mod description;
mod error;
pub mod markup;
pub mod paginate;
mod pool;
pub mod query;
pub mod recommend;
pub mod review;
pub mod site;
pub mod story;
pub mod user;

pub use crate::{
    chapter::Chapters,
    error::ExtractError,
    paginate::{PageSource, Paginator},
    pool::fetch_stories,
    recommend::{recommend, recommend_with, Candidate},
    review::ReviewPages,
    site::{ListingQuery, RatingFilter, Site, SortBy},
    user::{AuthoredStoryPages, FavoriteAuthorPages},
};

use ffnet_common::fetch::Fetch;

/// Every review of a story, `chapter` 0 meaning all chapters.
pub fn reviews<F: Fetch + ?Sized>(
    fetch: &F,
    site: Site,
    story_id: u64,
    chapter: u32,
) -> Paginator<'_, ReviewPages, F> {
    Paginator::new(ReviewPages::new(site, story_id, chapter), fetch)
}

/// The authors a user follows.
pub fn favorite_authors<F: Fetch + ?Sized>(
    fetch: &F,
    site: Site,
    user_id: u64,
) -> Paginator<'_, FavoriteAuthorPages, F> {
    Paginator::new(FavoriteAuthorPages::new(site, user_id), fetch)
}

/// The stories a user wrote.
pub fn authored_stories<F: Fetch + ?Sized>(
    fetch: &F,
    site: Site,
    user_id: u64,
) -> Paginator<'_, AuthoredStoryPages, F> {
    Paginator::new(AuthoredStoryPages::new(site, user_id), fetch)
}

use std::sync::LazyLock;

use ffnet_common::{models::Review, Uri};
use regex::Regex;

use crate::{
    markup::{capture, decode_entities},
    paginate::PageSource,
    site::Site,
    story::USER_LINK,
    ExtractError,
};

static REVIEW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)img class=.*?</div").expect("review pattern is valid"));
static USER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"> *([^< ][^<]*)<").expect("user name pattern is valid"));
static CHAPTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<small style=[^>]*>([^<]*)<").expect("chapter pattern is valid"));
static TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<span data[^>]*>([^<]*)<").expect("time pattern is valid"));
static TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<div[^>]*>([^<]*)<").expect("text pattern is valid"));

/// Cuts a review page into the markup of its single reviews.
pub fn fragments(page: &str) -> Vec<&str> {
    REVIEW.find_iter(page).map(|m| m.as_str()).collect()
}

/// Parses one review as cut out by [`fragments`].
///
/// `chapter` is the chapter the listing was requested for, `0` for all.
pub fn parse_fragment(story_id: u64, chapter: u32, fragment: &str) -> Result<Review, ExtractError> {
    let user_name = capture(&USER_NAME, fragment)
        .map(|name| decode_entities(name.trim()))
        .ok_or_else(|| ExtractError::missing("review", "user name"))?;

    let text = capture(&TEXT, fragment)
        .map(|text| decode_entities(text.trim()))
        .ok_or_else(|| ExtractError::missing("review", "text"))?;

    let chapter_label = capture(&CHAPTER, fragment)
        .map(|label| label.trim().trim_end_matches('.').trim().to_string())
        .filter(|label| !label.is_empty());

    let mut time_ago = capture(&TIME, fragment)
        .map(|time| time.trim().to_string())
        .unwrap_or_default();

    // the site shortens recent stamps to `8h` / `5m`
    if time_ago.ends_with('h') || time_ago.ends_with('m') {
        time_ago.push_str(" ago");
    }

    let user_id = capture(&USER_LINK, fragment).and_then(|id| id.parse().ok());

    Ok(Review {
        story_id,
        chapter,
        chapter_label,
        user_name,
        user_id,
        time_ago,
        text,
    })
}

/// Review pages of a story, or of one of its chapters.
pub struct ReviewPages {
    site: Site,
    story_id: u64,
    chapter: u32,
}

impl ReviewPages {
    pub fn new(site: Site, story_id: u64, chapter: u32) -> Self {
        ReviewPages {
            site,
            story_id,
            chapter,
        }
    }
}

impl PageSource for ReviewPages {
    type Item = Review;

    fn url(&self, page: u32) -> Option<Result<Uri, ExtractError>> {
        Some(self.site.reviews(self.story_id, self.chapter, page))
    }

    fn extract(&self, body: &str) -> Result<Vec<Result<Review, ExtractError>>, ExtractError> {
        Ok(fragments(body)
            .into_iter()
            .map(|fragment| parse_fragment(self.story_id, self.chapter, fragment))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn review_row(user: Option<(u64, &str)>, chapter: u32, time: &str, text: &str) -> String {
        let name = match user {
            Some((id, name)) => format!("<a href='/u/{}/{}'>{}</a>", id, name.replace(' ', "-"), name),
            None => " Guest ".to_string(),
        };

        format!(
            "<tr><td style='padding-top:10px;padding-bottom:10px'><img class='round36' src='//ff74.b-cdn.net/static/images/d_60_90.jpg' width=36 height=36>{} <small style='color:gray'>chapter {} . <span data-xutime='1469600000'>{}</span></small><div style='margin-top:5px'>{}</div></td></tr>\n",
            name, chapter, time, text
        )
    }

    #[test]
    fn parses_signed_review() {
        let page = review_row(Some((1234, "Reader One")), 2, "Jul 27, 2016", "Loved it &amp; more!");
        let fragments = fragments(&page);
        assert_eq!(fragments.len(), 1);

        let review = parse_fragment(99, 0, fragments[0]).unwrap();

        assert_eq!(
            review,
            Review {
                story_id: 99,
                chapter: 0,
                chapter_label: Some("chapter 2".into()),
                user_name: "Reader One".into(),
                user_id: Some(1234),
                time_ago: "Jul 27, 2016".into(),
                text: "Loved it & more!".into(),
            }
        );
    }

    #[test]
    fn parses_anonymous_review_with_short_time() {
        let page = review_row(None, 1, "8h", "Update soon");
        let review = parse_fragment(99, 1, fragments(&page)[0]).unwrap();

        assert_eq!(review.user_name, "Guest");
        assert_eq!(review.user_id, None);
        assert_eq!(review.time_ago, "8h ago");
        assert_eq!(review.chapter, 1);
    }

    #[test]
    fn splits_a_page_in_order() {
        let page = format!(
            "<table>{}{}{}</table>",
            review_row(Some((1, "A")), 1, "1m", "first"),
            review_row(None, 1, "2h", "second"),
            review_row(Some((3, "C")), 2, "Jan 1", "third"),
        );

        let texts: Vec<String> = fragments(&page)
            .into_iter()
            .map(|f| parse_fragment(1, 0, f).unwrap().text)
            .collect();

        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn review_without_text_is_rejected() {
        let fragment = "img class='round36'><a href='/u/1/A'>A</a> <small style='color:gray'>chapter 1</small></div";

        assert!(matches!(
            parse_fragment(1, 0, fragment),
            Err(ExtractError::MandatoryFieldMissing { field: "text", .. })
        ));
    }
}

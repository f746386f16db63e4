use std::sync::LazyLock;

use ffnet_common::{
    fetch::Fetch,
    models::{Chapter, Story},
};
use regex::Regex;

use crate::{
    markup::capture,
    query::Document,
    site::Site,
    story::{parse_id, script_title},
    ExtractError,
};

static STORY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"var\s+storyid\s*=\s*(\d+);").expect("story id pattern is valid"));
static CHAPTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"var\s+chapter\s*=\s*(\d+);").expect("chapter pattern is valid"));
static STORY_TEXT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"var\s+storytextid\s*=\s*storytextid=(\d+);").expect("storytextid pattern is valid")
});
static OPTION_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\.\s*").expect("option number pattern is valid"));

/// Parses the page of a single chapter.
#[tracing::instrument(skip(markup), err)]
pub fn parse_page(markup: &str) -> Result<Chapter, ExtractError> {
    let story_id = parse_id("chapter", "storyid", capture(&STORY_ID, markup))?;
    let number = parse_id("chapter", "chapter", capture(&CHAPTER, markup))?;
    let number = u32::try_from(number).map_err(|_| ExtractError::InvalidNumber {
        entity: "chapter",
        field: "chapter",
        value: number.to_string(),
    })?;
    let story_text_id = capture(&STORY_TEXT_ID, markup).and_then(|id| id.parse().ok());

    let doc = Document::parse(markup)?;

    // one-shots and single chapter stories render no chapter selector
    let title = match doc.first("select[name=chapter]") {
        Some(select) => select
            .first("option[selected]")
            .map(|option| OPTION_NUMBER.replace(option.text().trim(), "").into_owned()),
        None => None,
    };
    let title = title
        .or_else(|| script_title(markup))
        .ok_or_else(|| ExtractError::missing("chapter", "title"))?;

    let body = doc
        .first("div#storytext")
        .ok_or_else(|| ExtractError::missing("chapter", "storytext"))?;

    body.remove_descendants(&|el| el.has_class("a2a_kit"));
    for hr in body.select("hr") {
        hr.remove_attr("size");
        hr.remove_attr("noshade");
    }

    let raw_text = body.outer_html().unwrap_or_default();
    let text_list = body.text_segments();
    let text = text_list.join("\n");

    Ok(Chapter {
        story_id,
        number,
        story_text_id,
        title,
        raw_text,
        text_list,
        text,
    })
}

/// Chapters `1..=count` of a story, one fetch per chapter.
///
/// A chapter that fails to load is reported and the next one is attempted,
/// dropping the iterator stops fetching.
pub struct Chapters<'f, F: ?Sized> {
    fetch: &'f F,
    site: Site,
    story_id: u64,
    // wider than `count` so stepping past `u32::MAX` cannot overflow
    next: u64,
    count: u32,
}

impl<'f, F: Fetch + ?Sized> Chapters<'f, F> {
    pub fn new(fetch: &'f F, site: Site, story_id: u64, count: u32) -> Self {
        Chapters {
            fetch,
            site,
            story_id,
            next: 1,
            count,
        }
    }

    pub fn of(fetch: &'f F, site: Site, story: &Story) -> Self {
        Chapters::new(fetch, site, story.id, story.meta.chapter_count)
    }

    fn load(&self, number: u32) -> Result<Chapter, ExtractError> {
        let url = self.site.chapter(self.story_id, number)?;
        let markup = self.fetch.fetch(&url)?;
        let chapter = parse_page(&markup)?;

        if chapter.story_id != self.story_id || chapter.number != number {
            tracing::warn!(
                story_id = self.story_id,
                number,
                got_story = chapter.story_id,
                got_number = chapter.number,
                "chapter page does not match the request"
            );
        }

        Ok(chapter)
    }
}

impl<'f, F: Fetch + ?Sized> Iterator for Chapters<'f, F> {
    type Item = Result<Chapter, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        let number = u32::try_from(self.next).ok().filter(|n| *n <= self.count)?;
        self.next += 1;

        Some(self.load(number))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (u64::from(self.count) + 1).saturating_sub(self.next);
        let left = usize::try_from(left).unwrap_or(usize::MAX);
        (left, Some(left))
    }
}

#[cfg(test)]
mod tests {
    use ffnet_common::{fetch::FetchError, Uri};
    use pretty_assertions::assert_eq;

    use super::*;

    fn chapter_page(story_id: u64, number: u32, selector: bool) -> String {
        let select = if selector {
            format!(
                "<select name=chapter><option value=1>1. Start</option><option value={0} selected>{0}. Part {0}</option></select>",
                number
            )
        } else {
            String::new()
        };

        format!(
            r#"<html><head><script>var storyid = {story_id}; var chapter = {number}; var title = 'The+Story'; var storytextid = storytextid=99{number};</script></head>
            <body>{select}<div class='storytext xcontrast_txt nocopy' id='storytext'>
            <div class='a2a_kit a2a_kit_size_24 a2a_default_style'><a class='a2a_button_facebook'>share</a></div>
            <p>Chapter {number} opens.</p><hr size=1 noshade><p>It &amp; ends.</p></div></body></html>"#
        )
    }

    #[test]
    fn parses_chapter_with_selector() {
        let chapter = parse_page(&chapter_page(3, 2, true)).unwrap();

        assert_eq!(chapter.story_id, 3);
        assert_eq!(chapter.number, 2);
        assert_eq!(chapter.story_text_id, Some(992));
        assert_eq!(chapter.title, "Part 2");
        assert_eq!(chapter.text_list, vec!["Chapter 2 opens.", "It & ends."]);
        assert_eq!(chapter.text, "Chapter 2 opens.\nIt & ends.");
        assert!(!chapter.raw_text.contains("share"));
        assert!(chapter.raw_text.contains("<hr>"));
    }

    #[test]
    fn single_chapter_falls_back_to_story_title() {
        let chapter = parse_page(&chapter_page(3, 1, false)).unwrap();

        assert_eq!(chapter.title, "The Story");
    }

    #[test]
    fn missing_story_text_is_fatal() {
        let page = chapter_page(3, 1, false).replace("id='storytext'", "id='other'");

        assert!(matches!(
            parse_page(&page),
            Err(ExtractError::MandatoryFieldMissing {
                field: "storytext",
                ..
            })
        ));
    }

    #[test]
    fn yields_every_chapter_in_order() {
        let fetch = |url: &Uri| -> Result<String, FetchError> {
            let number = url.path().rsplit('/').next().unwrap().parse().unwrap();
            Ok(chapter_page(3, number, true))
        };

        let chapters = Chapters::new(&fetch, Site::default(), 3, 4);
        assert_eq!(chapters.size_hint(), (4, Some(4)));

        let numbers: Vec<u32> = chapters.map(|c| c.unwrap().number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn a_failing_chapter_does_not_stop_the_rest() {
        let fetch = |url: &Uri| -> Result<String, FetchError> {
            let number: u32 = url.path().rsplit('/').next().unwrap().parse().unwrap();
            if number == 2 {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: 503,
                });
            }
            Ok(chapter_page(3, number, true))
        };

        let results: Vec<_> = Chapters::new(&fetch, Site::default(), 3, 3).collect();

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ExtractError::Fetch(_))));
        assert_eq!(results[2].as_ref().unwrap().number, 3);
    }

    #[test]
    fn huge_chapter_counts_do_not_overflow() {
        let fetch = |url: &Uri| -> Result<String, FetchError> {
            let number = url.path().rsplit('/').next().unwrap().parse().unwrap();
            Ok(chapter_page(3, number, true))
        };

        let mut chapters = Chapters::new(&fetch, Site::default(), 3, u32::MAX);
        assert_eq!(chapters.size_hint().0, usize::try_from(u32::MAX).unwrap());

        chapters.next = u64::from(u32::MAX);
        assert_eq!(chapters.size_hint(), (1, Some(1)));
        assert!(chapters.next().is_some());
        assert_eq!(chapters.size_hint(), (0, Some(0)));
        assert!(chapters.next().is_none());
    }

    #[test]
    fn stopping_early_fetches_nothing_more() {
        let calls = std::cell::Cell::new(0);
        let fetch = |url: &Uri| -> Result<String, FetchError> {
            calls.set(calls.get() + 1);
            let number = url.path().rsplit('/').next().unwrap().parse().unwrap();
            Ok(chapter_page(3, number, true))
        };

        let first: Vec<_> = Chapters::new(&fetch, Site::default(), 3, 10).take(2).collect();

        assert_eq!(first.len(), 2);
        assert_eq!(calls.get(), 2);
    }
}

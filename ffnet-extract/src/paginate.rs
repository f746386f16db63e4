//! Lazy, page at a time iteration over the children of a story or user.

use std::collections::VecDeque;

use ffnet_common::{fetch::Fetch, Uri};

use crate::ExtractError;

/// Describes where the pages of one sequence live and how to cut a page into
/// items.
pub trait PageSource {
    type Item;

    /// Page number the sequence starts at.
    fn first_page(&self) -> u32 {
        1
    }

    /// URL of `page`, `None` when the source has no such page.
    fn url(&self, page: u32) -> Option<Result<Uri, ExtractError>>;

    /// Every item fragment found on a page, each parsed on its own so one
    /// broken fragment does not take the page down with it.
    fn extract(&self, body: &str) -> Result<Vec<Result<Self::Item, ExtractError>>, ExtractError>;
}

enum State<T> {
    NeedsFetch(u32),
    HasCached {
        page: u32,
        items: VecDeque<Result<T, ExtractError>>,
        yielded: usize,
    },
    Exhausted,
}

/// Iterator over every item of a [`PageSource`].
///
/// A page is only requested once everything from the previous one has been
/// handed out, and the first page without any item ends the sequence for
/// good. A transient fetch failure is yielded as an error without ending the
/// sequence, advancing again retries the same page. Any other page level
/// failure is yielded once and ends the sequence.
pub struct Paginator<'f, S: PageSource, F: ?Sized> {
    source: S,
    fetch: &'f F,
    state: State<S::Item>,
}

impl<'f, S: PageSource, F: Fetch + ?Sized> Paginator<'f, S, F> {
    pub fn new(source: S, fetch: &'f F) -> Self {
        let first = source.first_page();
        Paginator::starting_at(source, fetch, first)
    }

    pub fn starting_at(source: S, fetch: &'f F, page: u32) -> Self {
        Paginator {
            source,
            fetch,
            state: State::NeedsFetch(page),
        }
    }

    /// Page currently being handed out or about to be requested.
    pub fn page(&self) -> Option<u32> {
        match self.state {
            State::NeedsFetch(page) | State::HasCached { page, .. } => Some(page),
            State::Exhausted => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, State::Exhausted)
    }

    fn load(&self, url: &Uri) -> Result<Vec<Result<S::Item, ExtractError>>, ExtractError> {
        let body = self.fetch.fetch(url)?;
        self.source.extract(&body)
    }
}

impl<'f, S: PageSource, F: Fetch + ?Sized> Iterator for Paginator<'f, S, F> {
    type Item = Result<S::Item, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match std::mem::replace(&mut self.state, State::Exhausted) {
                State::Exhausted => return None,
                State::HasCached {
                    page,
                    mut items,
                    yielded,
                } => match items.pop_front() {
                    Some(item) => {
                        self.state = State::HasCached {
                            page,
                            items,
                            yielded: yielded + 1,
                        };

                        return Some(item);
                    }
                    None => {
                        tracing::trace!(page, yielded, "page used up");

                        self.state = State::NeedsFetch(page + 1);
                    }
                },
                State::NeedsFetch(page) => {
                    let url = match self.source.url(page) {
                        None => {
                            tracing::debug!(page, "source has no further pages");

                            return None;
                        }
                        Some(Err(err)) => {
                            tracing::warn!(page, error = %err, "no usable url for page");

                            return Some(Err(err));
                        }
                        Some(Ok(url)) => url,
                    };

                    match self.load(&url) {
                        Err(err) if err.is_transient() => {
                            tracing::warn!(page, error = %err, "unable to load page, will retry");

                            self.state = State::NeedsFetch(page);

                            return Some(Err(err));
                        }
                        Err(err) => {
                            tracing::warn!(page, error = %err, "unable to load page, giving up");

                            return Some(Err(err));
                        }
                        Ok(items) if items.is_empty() => {
                            tracing::debug!(page, "empty page, sequence finished");

                            return None;
                        }
                        Ok(items) => {
                            tracing::debug!(page, items = items.len(), "loaded page");

                            self.state = State::HasCached {
                                page,
                                items: items.into(),
                                yielded: 0,
                            };
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use ffnet_common::fetch::FetchError;
    use pretty_assertions::assert_eq;

    use super::*;

    /// Pages are `|` separated numbers, `x` marks a broken item.
    struct Numbers;

    impl PageSource for Numbers {
        type Item = u32;

        fn url(&self, page: u32) -> Option<Result<Uri, ExtractError>> {
            Some(Ok(format!("https://example.com/p/{}", page).parse().unwrap()))
        }

        fn extract(&self, body: &str) -> Result<Vec<Result<u32, ExtractError>>, ExtractError> {
            Ok(body
                .split('|')
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse().map_err(|_| ExtractError::InvalidNumber {
                        entity: "test",
                        field: "n",
                        value: s.to_string(),
                    })
                })
                .collect())
        }
    }

    fn page_of(url: &Uri) -> usize {
        url.path().rsplit('/').next().unwrap().parse().unwrap()
    }

    #[test]
    fn concatenates_pages_until_an_empty_one() {
        let pages = ["1|2|3", "4", "5|6", ""];
        let requested = RefCell::new(Vec::new());
        let fetch = |url: &Uri| -> Result<String, FetchError> {
            let page = page_of(url);
            requested.borrow_mut().push(page);
            Ok(pages.get(page - 1).copied().unwrap_or("").to_string())
        };

        let items: Vec<u32> = Paginator::new(Numbers, &fetch).map(Result::unwrap).collect();

        assert_eq!(items, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(*requested.borrow(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn exhausted_sequences_stay_exhausted() {
        let calls = Cell::new(0);
        let fetch = |_: &Uri| -> Result<String, FetchError> {
            calls.set(calls.get() + 1);
            Ok(String::new())
        };

        let mut pager = Paginator::new(Numbers, &fetch);

        assert!(pager.next().is_none());
        assert!(pager.is_exhausted());
        assert!(pager.next().is_none());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn cached_items_need_no_fetch() {
        let calls = Cell::new(0);
        let fetch = |_: &Uri| -> Result<String, FetchError> {
            calls.set(calls.get() + 1);
            Ok("7|8|9".to_string())
        };

        let mut pager = Paginator::new(Numbers, &fetch);

        assert_eq!(pager.next().unwrap().unwrap(), 7);
        assert_eq!(pager.next().unwrap().unwrap(), 8);
        assert_eq!(pager.next().unwrap().unwrap(), 9);
        assert_eq!(calls.get(), 1);
        assert_eq!(pager.page(), Some(1));
    }

    #[test]
    fn fetch_failure_is_not_the_end() {
        let failures = Cell::new(1);
        let fetch = |url: &Uri| -> Result<String, FetchError> {
            match page_of(url) {
                1 => Ok("1|2".to_string()),
                2 if failures.get() > 0 => {
                    failures.set(failures.get() - 1);
                    Err(FetchError::Status {
                        url: url.to_string(),
                        status: 502,
                    })
                }
                2 => Ok("3".to_string()),
                _ => Ok(String::new()),
            }
        };

        let mut pager = Paginator::new(Numbers, &fetch);

        assert_eq!(pager.next().unwrap().unwrap(), 1);
        assert_eq!(pager.next().unwrap().unwrap(), 2);
        assert!(matches!(pager.next(), Some(Err(ExtractError::Fetch(_)))));
        assert!(!pager.is_exhausted());
        assert_eq!(pager.page(), Some(2));
        assert_eq!(pager.next().unwrap().unwrap(), 3);
        assert!(pager.next().is_none());
    }

    #[test]
    fn permanent_fetch_failure_ends_the_sequence() {
        let calls = Cell::new(0);
        let fetch = |url: &Uri| -> Result<String, FetchError> {
            calls.set(calls.get() + 1);
            Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        };

        let items: Vec<_> = Paginator::new(Numbers, &fetch).take(100).collect();

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(ExtractError::Fetch(_))));
        assert_eq!(calls.get(), 1);
    }

    /// Fails at the page level in the configured way.
    enum Unusable {
        Url,
        Body,
    }

    impl PageSource for Unusable {
        type Item = u32;

        fn url(&self, page: u32) -> Option<Result<Uri, ExtractError>> {
            Some(match self {
                Unusable::Url => Err(ExtractError::InvalidUrl {
                    url: "not a url".to_string(),
                    source: "not a url".parse::<Uri>().unwrap_err(),
                }),
                Unusable::Body => Ok(format!("https://example.com/p/{}", page).parse().unwrap()),
            })
        }

        fn extract(&self, _: &str) -> Result<Vec<Result<u32, ExtractError>>, ExtractError> {
            Err(ExtractError::missing("page", "listing"))
        }
    }

    #[test]
    fn unusable_url_ends_the_sequence() {
        let fetch = |_: &Uri| -> Result<String, FetchError> { unreachable!() };
        let mut pager = Paginator::new(Unusable::Url, &fetch);

        assert!(matches!(pager.next(), Some(Err(ExtractError::InvalidUrl { .. }))));
        assert!(pager.is_exhausted());
        assert!(pager.next().is_none());
    }

    #[test]
    fn unreadable_page_ends_the_sequence() {
        let calls = Cell::new(0);
        let fetch = |_: &Uri| -> Result<String, FetchError> {
            calls.set(calls.get() + 1);
            Ok("whatever".to_string())
        };

        let items: Vec<_> = Paginator::new(Unusable::Body, &fetch).take(100).collect();

        assert_eq!(items.len(), 1);
        assert!(matches!(
            items[0],
            Err(ExtractError::MandatoryFieldMissing { .. })
        ));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn broken_items_do_not_hide_their_neighbours() {
        let fetch = |url: &Uri| -> Result<String, FetchError> {
            Ok(if page_of(url) == 1 { "1|x|3" } else { "" }.to_string())
        };

        let items: Vec<_> = Paginator::new(Numbers, &fetch).collect();

        assert_eq!(items.len(), 3);
        assert!(items[1].is_err());
        assert_eq!(*items[2].as_ref().unwrap(), 3);
    }

    #[test]
    fn can_start_at_a_later_page() {
        let fetch = |url: &Uri| -> Result<String, FetchError> {
            Ok(match page_of(url) {
                0 => "0",
                1 => "1",
                _ => "",
            }
            .to_string())
        };

        let from_zero: Vec<u32> = Paginator::starting_at(Numbers, &fetch, 0)
            .map(Result::unwrap)
            .collect();
        let from_one: Vec<u32> = Paginator::new(Numbers, &fetch).map(Result::unwrap).collect();

        assert_eq!(from_zero, vec![0, 1]);
        assert_eq!(from_one, vec![1]);
    }
}

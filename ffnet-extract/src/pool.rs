use ffnet_common::{channel, fetch::Fetch, models::Story};

use crate::{site::Site, story, ExtractError};

/// Fetches many stories over `workers` threads.
///
/// Results come back in the order of `ids`, one per id.
#[tracing::instrument(skip(fetch, site, ids), fields(stories = ids.len()))]
pub fn fetch_stories<F: Fetch + Sync + ?Sized>(
    fetch: &F,
    site: &Site,
    ids: &[u64],
    workers: usize,
) -> Vec<Result<Story, ExtractError>> {
    let workers = workers.clamp(1, ids.len().max(1));

    let (job_sender, job_receiver) = channel::unbounded::<(usize, u64)>();
    let (result_sender, result_receiver) = channel::unbounded();

    for job in ids.iter().copied().enumerate() {
        if let Err(err) = job_sender.send(job) {
            tracing::error!(err = ?err, "unable to queue story");
        }
    }
    drop(job_sender);

    tracing::debug!(workers, "starting story workers");

    std::thread::scope(|scope| {
        for i in 0..workers {
            let jobs = job_receiver.clone();
            let results = result_sender.clone();

            let child_span = tracing::debug_span!("worker", thread_id = i).or_current();
            scope.spawn(move || {
                let _entered = child_span.entered();

                for (index, story_id) in jobs {
                    let story = story::fetch(fetch, site, story_id);

                    if let Err(err) = results.send((index, story)) {
                        tracing::error!(err = ?err, "unable to hand back story");
                    }
                }
            });
        }
    });
    drop(result_sender);

    let mut slots: Vec<Option<Result<Story, ExtractError>>> = ids.iter().map(|_| None).collect();
    for (index, story) in result_receiver {
        slots[index] = Some(story);
    }

    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use ffnet_common::{fetch::FetchError, Uri};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::story::tests::STORY_PAGE;

    fn story_id(url: &Uri) -> u64 {
        url.path().trim_start_matches("/s/").parse().unwrap()
    }

    #[test]
    fn keeps_input_order() {
        let calls = AtomicUsize::new(0);
        let fetch = |url: &Uri| -> Result<String, FetchError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(STORY_PAGE.replace("5782108", &story_id(url).to_string()))
        };

        let ids = [30, 10, 20, 50, 40];
        let stories = fetch_stories(&fetch, &Site::default(), &ids, 3);

        let got: Vec<u64> = stories.into_iter().map(|s| s.unwrap().id).collect();
        assert_eq!(got, ids.to_vec());
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn failures_stay_in_their_slot() {
        let fetch = |url: &Uri| -> Result<String, FetchError> {
            match story_id(url) {
                2 => Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                }),
                id => Ok(STORY_PAGE.replace("5782108", &id.to_string())),
            }
        };

        let stories = fetch_stories(&fetch, &Site::default(), &[1, 2, 3], 8);

        assert_eq!(stories.len(), 3);
        assert_eq!(stories[0].as_ref().unwrap().id, 1);
        assert!(matches!(stories[1], Err(ExtractError::Fetch(_))));
        assert_eq!(stories[2].as_ref().unwrap().id, 3);
    }

    #[test]
    fn no_ids_no_work() {
        let fetch = |_: &Uri| -> Result<String, FetchError> { unreachable!() };

        assert!(fetch_stories(&fetch, &Site::default(), &[], 4).is_empty());
    }
}

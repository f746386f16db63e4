mod verbose;

use std::io::{self, Write};

use clap::{FromArgMatches as _, IntoApp as _, Parser, Subcommand};
use serde::Serialize;
use tracing_error::ErrorLayer;
use tracing_subscriber::{prelude::*, EnvFilter, Registry};
use twelf::Layer;

use ffnet_common::{
    fetch::{Fetch as _, HttpFetcher},
    Conf, Context as _, Report,
};
use ffnet_extract::{
    authored_stories, favorite_authors, fetch_stories, recommend_with, reviews,
    story, user, Chapters, ExtractError, ListingQuery, RatingFilter, Site, SortBy,
};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    #[clap(flatten)]
    verbose: verbose::Verbosity,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a story's metadata
    Story { id: u64 },
    /// Print every chapter of a story
    Chapters { id: u64 },
    /// Print the reviews of a story
    Reviews {
        id: u64,
        /// Only the reviews of this chapter, 0 for all
        #[clap(long, default_value_t = 0)]
        chapter: u32,
        /// Stop after this many reviews
        #[clap(long)]
        limit: Option<usize>,
    },
    /// Print a user's profile and favorite stories
    User {
        id: u64,
        /// Also print the authors the user follows
        #[clap(long)]
        authors: bool,
        /// Also print the stories the user wrote
        #[clap(long)]
        stories: bool,
    },
    /// Fetch several stories at once
    Stories {
        #[clap(required = true)]
        ids: Vec<u64>,
    },
    /// Score a fandom listing and print the stories above the threshold
    Recommend {
        /// Fandom as it appears in the listing URL, e.g. `Death-Note`
        fandom: String,
        #[clap(long, default_value = "anime")]
        medium: String,
        /// update, publish, reviews, favorites or follows
        #[clap(long, default_value = "follows")]
        sort: SortBy,
        /// all, m or t
        #[clap(long, default_value = "all")]
        rating: RatingFilter,
        /// Character id filter
        #[clap(long)]
        character: Option<String>,
        /// Minimum follows per chapter, overrides the configured one
        #[clap(long)]
        threshold: Option<f64>,
        /// Fetch the full record of this many recommended stories not yet in the library
        #[clap(long, default_value_t = 0)]
        fetch: usize,
    },
}

fn main() -> Result<(), Report> {
    ffnet_common::install()?;

    let matches = Cli::command().args(&Conf::clap_args()).get_matches();
    let cli = Cli::from_arg_matches(&matches)?;
    let conf = Conf::with_layers(&[
        Layer::Json("ffnet.json".into()),
        Layer::Toml("ffnet.toml".into()),
        Layer::Env(Some("FFNET_".to_string())),
        Layer::Clap(matches),
    ])?;

    let subscriber = Registry::default()
        .with(ErrorLayer::default())
        .with(tracing_subscriber::fmt::Layer::default().with_writer(io::stderr))
        .with(EnvFilter::from_default_env().add_directive(cli.verbose.log_level_filter().into()));

    tracing::subscriber::set_global_default(subscriber)?;

    let fetcher = HttpFetcher::new(&conf).context("unable to set up the http client")?;
    let site = Site::from_conf(&conf);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Story { id } => {
            let story = story::fetch(&fetcher, &site, id)?;
            print_line(&mut out, &story)?;
        }
        Commands::Chapters { id } => {
            let story = story::fetch(&fetcher, &site, id)?;
            print_all(&mut out, Chapters::of(&fetcher, site, &story))?;
        }
        Commands::Reviews { id, chapter, limit } => {
            let pages = reviews(&fetcher, site, id, chapter).take(limit.unwrap_or(usize::MAX));
            print_all(&mut out, pages)?;
        }
        Commands::User {
            id,
            authors,
            stories,
        } => {
            let profile = user::fetch(&fetcher, &site, id)?;
            print_line(&mut out, &profile)?;

            if authors {
                print_all(&mut out, favorite_authors(&fetcher, site.clone(), id))?;
            }
            if stories {
                print_all(&mut out, authored_stories(&fetcher, site, id))?;
            }
        }
        Commands::Stories { ids } => {
            let stories = fetch_stories(&fetcher, &site, &ids, conf.workers());

            for (id, story) in ids.iter().zip(stories) {
                match story {
                    Ok(story) => print_line(&mut out, &story)?,
                    Err(err) => tracing::error!(story_id = id, error = %err, "unable to fetch story"),
                }
            }
        }
        Commands::Recommend {
            fandom,
            medium,
            sort,
            rating,
            character,
            threshold,
            fetch,
        } => {
            let query = ListingQuery {
                medium,
                fandom,
                sort,
                rating,
                character: character.unwrap_or_default(),
            };
            let threshold = threshold.unwrap_or_else(|| conf.threshold());

            tracing::info!(listing = %query, threshold, "scoring listing");

            let markup = fetcher
                .fetch(&site.listing(&query)?)
                .with_context(|| format!("unable to load listing `{}`", query))?;

            let mut wanted = Vec::new();
            let candidates = recommend_with(&markup, threshold, fetch, |candidate| {
                match conf.library_entry(candidate.story_id) {
                    Some(path) if path.exists() => {
                        tracing::info!(story_id = candidate.story_id, path = %path.display(), "already in the library");
                    }
                    _ => wanted.push(candidate.story_id),
                }
            })?;

            for candidate in &candidates {
                print_line(&mut out, candidate)?;
            }

            for (id, story) in wanted.iter().zip(fetch_stories(&fetcher, &site, &wanted, conf.workers())) {
                match story {
                    Ok(story) => print_line(&mut out, &story)?,
                    Err(err) => tracing::error!(story_id = id, error = %err, "unable to fetch story"),
                }
            }
        }
    }

    Ok(())
}

fn print_line<T: Serialize>(out: &mut impl Write, item: &T) -> Result<(), Report> {
    serde_json::to_writer(&mut *out, item)?;
    writeln!(out)?;

    Ok(())
}

/// Prints every record of a sequence.
///
/// Records that fail to parse are skipped, a page that cannot be fetched ends
/// the command since the fetcher has already retried it.
fn print_all<T: Serialize>(
    out: &mut impl Write,
    items: impl Iterator<Item = Result<T, ExtractError>>,
) -> Result<(), Report> {
    for item in items {
        match item {
            Ok(item) => print_line(&mut *out, &item)?,
            Err(err @ ExtractError::Fetch(_)) => return Err(err.into()),
            Err(err) => tracing::warn!(error = %err, "skipping unreadable record"),
        }
    }

    Ok(())
}

// ABOUTME: scout CLI: region crawl into SQLite and batch person-profile enrichment into a JSON cache.
// ABOUTME: Also prints generated queries and parses saved pages offline for verification.

mod pages;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use scout_crawl::{
    Checkpoint, ChromeOptions, CrawlOptions, Crawler, DetailOptions, Session, SessionOptions, SiteProfile,
    SqliteStore, WebDriverFactory, DEFAULT_SUFFIX,
};
use scout_infobox::enrich::{read_names_csv, read_names_lines, DEFAULT_NAME_COLUMNS};
use scout_infobox::{EnrichJob, EnrichOptions, InfoboxConfig, InfoboxParser, ProfileCache, Resolver};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pages::{RenderedPages, SavedPage};

#[derive(Parser, Debug)]
#[command(name = "scout")]
#[command(about = "Crawl map places by region and enrich person profiles", long_about = None)]
struct Args {
    /// More log output (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct BrowserArgs {
    /// chromedriver endpoint.
    #[arg(long, env = "SCOUT_WEBDRIVER_URL", default_value = scout_crawl::driver::webdriver::DEFAULT_ENDPOINT)]
    webdriver: String,

    /// Run Chrome without a window.
    #[arg(long, default_value_t = false)]
    headless: bool,
}

impl BrowserArgs {
    fn factory(&self) -> WebDriverFactory {
        WebDriverFactory::new(&self.webdriver, ChromeOptions::default().headless(self.headless))
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl every region query into a SQLite store, resuming from the checkpoint.
    Crawl {
        /// CSV of administrative units with a header row.
        #[arg(long)]
        regions: PathBuf,

        /// Appended to every query.
        #[arg(long, default_value = DEFAULT_SUFFIX)]
        suffix: String,

        #[arg(long, default_value = "places.db")]
        db: PathBuf,

        #[arg(long, default_value = "crawl_progress.json")]
        checkpoint: PathBuf,

        /// Site profile JSON replacing the builtin Naver Map profile.
        #[arg(long)]
        site: Option<PathBuf>,

        #[arg(long, default_value_t = 1)]
        max_pages: usize,

        /// Restart the browser every N targets (0 disables).
        #[arg(long, default_value_t = 10)]
        recycle_every: usize,

        #[arg(long, default_value_t = 10)]
        min_visitor_reviews: u32,

        #[arg(long, default_value_t = 50)]
        min_blog_reviews: u32,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Print the queries a region file expands to.
    Queries {
        #[arg(long)]
        regions: PathBuf,

        #[arg(long, default_value = DEFAULT_SUFFIX)]
        suffix: String,
    },

    /// Resolve person names into cached infobox profiles.
    Profiles {
        /// Text file with one name per line.
        #[arg(long, conflicts_with = "csv", required_unless_present = "csv")]
        names: Option<PathBuf>,

        /// CSV file holding a name column.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Name column header; picked automatically when omitted.
        #[arg(long, requires = "csv")]
        column: Option<String>,

        #[arg(long, default_value = "profiles")]
        out_dir: PathBuf,

        /// Infobox configuration JSON replacing the builtin one.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Seconds to pause after every live fetch.
        #[arg(long, default_value_t = 1.2)]
        sleep: f64,

        /// Upper bound in seconds of the random extra pause.
        #[arg(long, default_value_t = 0.6)]
        jitter: f64,

        /// Stop after N names (0 means all).
        #[arg(long, default_value_t = 0)]
        limit: usize,

        /// Refetch cached entries that are errors or fail validation.
        #[arg(long, default_value_t = false)]
        refresh_bad: bool,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Parse a saved page into a profile for NAME and print it as JSON.
    Parse {
        html: PathBuf,

        #[arg(long)]
        name: String,

        #[arg(long)]
        config: Option<PathBuf>,

        /// Output compact JSON instead of pretty.
        #[arg(long, default_value_t = false)]
        compact: bool,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_infobox_config(path: Option<&PathBuf>) -> Result<InfoboxConfig> {
    match path {
        Some(p) => InfoboxConfig::from_file(p).with_context(|| format!("loading {}", p.display())),
        None => Ok(InfoboxConfig::builtin()),
    }
}

fn print_json(value: &impl serde::Serialize, compact: bool) -> Result<()> {
    let out = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{out}");
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Queries { regions, suffix } => {
            let queries = scout_crawl::load_queries(&regions, &suffix)?;
            for q in queries {
                println!("{q}");
            }
        }

        Command::Crawl {
            regions,
            suffix,
            db,
            checkpoint,
            site,
            max_pages,
            recycle_every,
            min_visitor_reviews,
            min_blog_reviews,
            browser,
        } => {
            let site = match site {
                Some(p) => SiteProfile::from_file(&p).with_context(|| format!("loading {}", p.display()))?,
                None => SiteProfile::builtin(),
            };
            let queries = scout_crawl::load_queries(&regions, &suffix)?;
            if queries.is_empty() {
                bail!("{} produced no queries", regions.display());
            }
            let store = SqliteStore::open(&db).with_context(|| format!("opening {}", db.display()))?;
            let opts = CrawlOptions::default()
                .max_pages(max_pages)
                .recycle_every(recycle_every)
                .detail(DetailOptions::default().min_reviews(min_visitor_reviews, min_blog_reviews));

            let mut crawler = Crawler::new(site, browser.factory(), store, Checkpoint::load(&checkpoint), opts)?;
            let summary = crawler.run(&queries)?;
            print_json(&summary, false)?;
        }

        Command::Profiles {
            names,
            csv,
            column,
            out_dir,
            config,
            sleep,
            jitter,
            limit,
            refresh_bad,
            browser,
        } => {
            let names = match (names, csv) {
                (Some(path), _) => read_names_lines(&path)?,
                (None, Some(path)) => match &column {
                    Some(col) => read_names_csv(&path, &[col.as_str()])?,
                    None => read_names_csv(&path, DEFAULT_NAME_COLUMNS)?,
                },
                (None, None) => bail!("either --names or --csv is required"),
            };
            info!(count = names.len(), "names loaded");

            let parser = InfoboxParser::new(load_infobox_config(config.as_ref())?)?;
            let session = Session::new(
                browser.factory(),
                SessionOptions {
                    recycle_every: 0,
                    ..SessionOptions::default()
                },
            );
            let opts = EnrichOptions::default()
                .sleep(Duration::from_secs_f64(sleep.max(0.0)))
                .jitter(Duration::from_secs_f64(jitter.max(0.0)))
                .refresh_bad(refresh_bad)
                .limit(limit);
            let mut job = EnrichJob::new(
                Resolver::new(parser, RenderedPages::new(session)),
                ProfileCache::open(&out_dir)?,
                opts,
            );
            let summary = job.run(&names)?;
            let (resolver, _) = job.into_parts();
            resolver.into_source().close();

            let failed: Vec<&str> = summary
                .outcomes
                .iter()
                .filter(|o| o.profile.is_error())
                .map(|o| o.name.as_str())
                .collect();
            print_json(
                &json!({
                    "processed": summary.outcomes.len(),
                    "fetched": summary.fetched,
                    "cached": summary.cached,
                    "failed": summary.failed,
                    "failed_names": failed,
                    "out_dir": out_dir.display().to_string(),
                }),
                false,
            )?;
        }

        Command::Parse {
            html,
            name,
            config,
            compact,
        } => {
            let page = fs::read_to_string(&html).with_context(|| format!("reading {}", html.display()))?;
            let parser = InfoboxParser::new(load_infobox_config(config.as_ref())?)?;
            let profile = Resolver::new(parser, SavedPage::new(page)).resolve(&name)?;
            print_json(&profile, compact)?;
        }
    }

    Ok(())
}

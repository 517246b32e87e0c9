mod config;
mod db;
mod dedupe;
mod export;
mod fetch;
mod listing;
mod model;
mod parser;
mod stats;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing::{debug, warn};

use crate::config::{Labels, Settings};
use crate::model::{Language, ParseReport};
use crate::parser::{ParseContext, ParseMode};

#[derive(Parser)]
#[command(name = "faculty_citations", about = "Faculty profile citation extractor")]
struct Cli {
    /// Config file (default: ./faculty.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch listing pages and populate the profile URL queue
    Init,
    /// Fetch unvisited profile pages
    Scrape {
        /// Max pages to fetch (default: all unvisited)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Extract citations from stored profile HTML
    Process {
        /// Max pages to process (default: all unprocessed)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Skip identity fields, keep name and citations only
        #[arg(long)]
        citations_only: bool,
        /// Re-parse pages that already have a record
        #[arg(long)]
        reprocess: bool,
    },
    /// Scrape + process in one pipeline
    Run {
        /// Max pages to scrape+process
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Write JSON/CSV/HTML and review exports from stored records
    Export {
        /// Output directory (default: output_dir from config)
        #[arg(short, long)]
        out: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value = "all")]
        format: export::Format,
        /// Only this language (default: every configured language)
        #[arg(short, long)]
        lang: Option<Language>,
    },
    /// Show pipeline and citation statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = config::load(cli.config.as_deref())?;
    debug!(?settings, "Loaded configuration");

    let result = match cli.command {
        Commands::Init => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let urls = listing::fetch_profile_urls(&settings).await?;
            let inserted = db::insert_pages(&conn, &urls)?;
            println!("Inserted {} new profile URLs ({} total found)", inserted, urls.len());
            Ok(())
        }
        Commands::Scrape { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let pages = db::fetch_unvisited(&conn, limit)?;
            if pages.is_empty() {
                println!("No unvisited pages. Run 'init' first or all pages are fetched.");
                return Ok(());
            }
            println!("Fetching {} profiles (streaming to DB)...", pages.len());
            let stats = fetch::fetch_pages_streaming(&conn, pages, &settings.fetch).await?;
            println!(
                "Done: {} fetched ({} ok, {} errors).",
                stats.total, stats.ok, stats.errors
            );
            Ok(())
        }
        Commands::Process {
            limit,
            citations_only,
            reprocess,
        } => {
            let ctx = ParseContext::from_settings(&settings)?;
            debug!("{} section markers loaded", ctx.classifier.len());
            let mode = if citations_only {
                ParseMode::CitationsOnly
            } else {
                ParseMode::Full
            };
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let pages = db::fetch_unprocessed(&conn, limit, reprocess)?;
            if pages.is_empty() {
                println!("No unprocessed pages. Run 'scrape' first.");
                return Ok(());
            }
            println!("Processing {} pages...", pages.len());
            let counts = process_pages(&conn, &pages, mode, &ctx)?;
            counts.print();
            Ok(())
        }
        Commands::Run { limit } => {
            let ctx = ParseContext::from_settings(&settings)?;
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let pages = db::fetch_unvisited(&conn, limit)?;
            if pages.is_empty() {
                println!("No unvisited pages. Run 'init' first.");
                return Ok(());
            }

            // Phase 1: Fetch (streaming to DB)
            let t_fetch = Instant::now();
            println!("Pipeline: fetching {} profiles (streaming to DB)...", pages.len());
            let stats = fetch::fetch_pages_streaming(&conn, pages, &settings.fetch).await?;
            println!(
                "Fetched {} pages ({} ok, {} errors) in {:.1}s",
                stats.total, stats.ok, stats.errors, t_fetch.elapsed().as_secs_f64()
            );

            // Phase 2: Process
            let t_process = Instant::now();
            let unprocessed = db::fetch_unprocessed(&conn, None, false)?;
            if unprocessed.is_empty() {
                println!("Nothing to process (all fetched pages had errors).");
                return Ok(());
            }
            println!("Processing {} pages...", unprocessed.len());
            let counts = process_pages(&conn, &unprocessed, ParseMode::Full, &ctx)?;
            println!("Processed in {:.1}s", t_process.elapsed().as_secs_f64());
            counts.print();
            Ok(())
        }
        Commands::Export { out, format, lang } => run_export(&settings, out, format, lang),
        Commands::Stats => print_stats(&settings),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

struct ProcessCounts {
    faculty: usize,
    report: ParseReport,
}

impl ProcessCounts {
    fn print(&self) {
        let r = &self.report;
        println!(
            "Saved {} faculty, {} citations ({} unrecognized, {} unknown year).",
            self.faculty, r.emitted, r.unrecognized, r.unknown_year
        );
        println!(
            "Skipped {} malformed items, removed {} duplicates.",
            r.malformed, r.duplicates
        );
    }
}

fn process_pages(
    conn: &rusqlite::Connection,
    pages: &[db::StoredPage],
    mode: ParseMode,
    ctx: &ParseContext,
) -> anyhow::Result<ProcessCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(pages.len() as u64);
    let template = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] \
                    {pos}/{len} ({per_sec})";
    pb.set_style(
        ProgressStyle::default_bar()
            .template(template)?
            .progress_chars("#>-"),
    );

    let mut counts = ProcessCounts {
        faculty: 0,
        report: ParseReport::default(),
    };

    for chunk in pages.chunks(500) {
        let profiles: Vec<_> = chunk
            .par_iter()
            .map(|page| parser::process_page(page, mode, ctx))
            .collect();

        for (page, profile) in chunk.iter().zip(&profiles) {
            if profile.report.structure_missing {
                warn!("No citation sections found in {}", page.url);
            }
            counts.report.absorb(&profile.report);
        }

        let page_ids: Vec<i64> = chunk.iter().map(|p| p.page_data_id).collect();
        db::save_records(conn, &page_ids, &profiles, mode)?;
        counts.faculty += profiles.len();
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn run_export(
    settings: &Settings,
    out: Option<PathBuf>,
    format: export::Format,
    lang: Option<Language>,
) -> anyhow::Result<()> {
    let labels = Labels::from_settings(&settings.labels)?;
    let languages = match lang {
        Some(l) => vec![l],
        None => settings.languages.clone(),
    };
    let out_dir = out.unwrap_or_else(|| PathBuf::from(&settings.output_dir));

    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;
    let records = db::load_records(&conn)?;
    if records.is_empty() {
        println!("No faculty records. Run 'process' first.");
        return Ok(());
    }

    let stats = stats::aggregate(&records);
    let written = export::write_all(&out_dir, &records, &stats, &labels, &languages, format)?;
    for path in &written {
        println!("Wrote {}", path.display());
    }
    println!(
        "Exported {} citations from {} faculty ({} for review).",
        stats.total,
        records.len(),
        stats.unrecognized
    );
    Ok(())
}

fn print_stats(settings: &Settings) -> anyhow::Result<()> {
    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;
    let s = db::get_stats(&conn)?;
    println!("Total:     {}", s.total);
    println!("Visited:   {}", s.visited);
    println!("Unvisited: {}", s.unvisited);
    println!("Fetched:   {}", s.scraped);
    println!("Errors:    {}", s.errors);
    println!("Processed: {}", s.processed);
    println!("Citations: {}", s.citations);
    println!("Dropped duplicates: {}", s.duplicates);

    let records = db::load_records(&conn)?;
    if records.is_empty() {
        return Ok(());
    }
    let labels = Labels::from_settings(&settings.labels)?;
    let agg = stats::aggregate(&records);

    println!("\n--- Citations ---");
    println!("Total:        {}", agg.total);
    println!("With year:    {}", agg.total - agg.unknown_year);
    println!("Without year: {}", agg.unknown_year);
    println!("Categorized:  {}", agg.category_total());
    println!("Unrecognized: {}", agg.unrecognized);
    if let Some((lo, hi)) = agg.year_range {
        println!("Year range:   {}-{}", lo, hi);
    }

    println!(
        "Duplicates:   {} removed ({} by DOI, {} by text)",
        agg.duplicates.removed, agg.duplicates.doi_based, agg.duplicates.text_based
    );

    println!("\n--- By category ---");
    for (category, n) in &agg.by_category {
        let label = labels.label(*category, settings.default_language);
        match agg.category_year_range.get(category) {
            Some((lo, hi)) => println!("  {:<36} {:>5}  {}-{}", label, n, lo, hi),
            None => println!("  {:<36} {:>5}", label, n),
        }
    }

    println!("\n--- Top years ---");
    for (year, n) in agg.top_years(5) {
        println!("  {}: {}", year, n);
    }

    println!("\n--- Top authors ---");
    for f in agg.top_faculty(5) {
        println!("  {:<32} {:>5}", truncate(&f.name, 32), f.total);
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

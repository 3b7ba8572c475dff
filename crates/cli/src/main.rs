//! rcache entry point.
//!
//! Inspects and maintains a result cache from the command line. Results are
//! printed to stdout as JSON; logging goes to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use resultcache_core::{BackendKind, CacheConfig, CacheManager, CodecKind, DocId, InverterKind, Posting, QueryId};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rcache", version, about = "Inspect and maintain a cached search result store")]
struct Cli {
    /// Overrides the configured database path.
    #[arg(long, value_name = "PATH", global = true)]
    db_path: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "RCACHE_LOG_JSON", global = true)]
    json: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Summary of the cache and the settings it was opened with.
    Info,
    /// Every cached query with its id and hit count.
    Queries,
    /// Cached hits of a query.
    Hits {
        query: String,
        #[arg(long, default_value_t = 0)]
        start: usize,
        #[arg(long)]
        end: Option<usize>,
    },
    /// Match count statistics of a query.
    Stats { query: String },
    /// Facet counts of a query.
    Facets { query: String },
    /// Per-document view over all cached hits.
    ByDoc,
    /// Check the stored layout for inconsistencies.
    Verify,
    /// Remove everything from the cache.
    Clear,
}

#[derive(Serialize)]
struct Info {
    db_path: PathBuf,
    backend: BackendKind,
    codec: CodecKind,
    inverter: InverterKind,
    chunk_size: usize,
    queries: u64,
    empty: bool,
}

#[derive(Serialize)]
struct QueryRow {
    id: QueryId,
    query: String,
    hits: usize,
}

#[derive(Serialize)]
struct DocRow {
    docid: DocId,
    hits: Vec<Posting>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.json);

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!(error = %e, "rcache failed");
            eprintln!("error: {e:#}");
            std::process::exit(2);
        }
    }
}

fn init_tracing(json: bool) {
    let builder = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Runs one subcommand. `Ok(false)` means the command completed but found problems.
fn run(cli: Cli) -> Result<bool> {
    let mut config = CacheConfig::load().context("loading cache configuration")?;
    if let Some(path) = cli.db_path {
        config.db_path = path;
    }

    let mut cache = CacheManager::open(&config).with_context(|| format!("opening {}", config.db_path.display()))?;
    let ok = match cli.cmd {
        Cmd::Info => {
            let queries = cache.query_count()?;
            print_json(&Info {
                db_path: config.db_path.clone(),
                backend: config.backend,
                codec: config.codec,
                inverter: config.inverter,
                chunk_size: cache.chunk_size(),
                queries,
                empty: cache.is_empty()?,
            })?;
            true
        }
        Cmd::Queries => {
            let mut rows = Vec::new();
            for id in cache.iter_queryids()? {
                let Some(query) = cache.query_str(id)? else { continue };
                rows.push(QueryRow { id, query, hits: cache.hit_count(id)? });
            }
            print_json(&rows)?;
            true
        }
        Cmd::Hits { query, start, end } => {
            if end.is_some_and(|end| end < start) {
                bail!("--end must not be lower than --start");
            }
            let id = lookup(&cache, &query)?;
            print_json(&cache.get_hits(id, start, end)?)?;
            true
        }
        Cmd::Stats { query } => {
            let id = lookup(&cache, &query)?;
            print_json(&cache.get_stats(id)?)?;
            true
        }
        Cmd::Facets { query } => {
            let id = lookup(&cache, &query)?;
            print_json(&cache.get_facets(id)?)?;
            true
        }
        Cmd::ByDoc => {
            let rows: Vec<DocRow> = cache.iter_by_docid()?.map(|(docid, hits)| DocRow { docid, hits }).collect();
            print_json(&rows)?;
            true
        }
        Cmd::Verify => {
            let report = cache.verify()?;
            print_json(&report)?;
            report.is_ok()
        }
        Cmd::Clear => {
            cache.clear()?;
            tracing::info!(db_path = %config.db_path.display(), "cleared result cache");
            true
        }
    };

    cache.close()?;
    Ok(ok)
}

fn lookup(cache: &CacheManager, query: &str) -> Result<QueryId> {
    cache.get_queryid(query)?.with_context(|| format!("query {query:?} is not cached"))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_hits_range() {
        let cli = Cli::try_parse_from(["rcache", "hits", "hello", "--start", "2", "--end", "5"]).unwrap();
        assert!(matches!(cli.cmd, Cmd::Hits { ref query, start: 2, end: Some(5) } if query == "hello"));
    }

    #[test]
    fn test_global_db_path() {
        let cli = Cli::try_parse_from(["rcache", "verify", "--db-path", "/tmp/cache.sqlite"]).unwrap();
        assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/cache.sqlite")));
        assert!(matches!(cli.cmd, Cmd::Verify));
    }
}

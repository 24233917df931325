//! anticorrupt CLI: validate the record set and query the knowledge graph.

use anticorrupt::format;
use anticorrupt_core::{EntityKind, EntityRef, Error};
use anticorrupt_kg::{Direction, EdgeFilter, EdgeLabel, GraphSnapshot, KbConfig, KnowledgeEngine, SearchOptions};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "anticorrupt", version = env!("CARGO_PKG_VERSION"), about = "Political knowledge base: validate records, query the entity graph")]
struct Cli {
    /// Record directory (overrides [data].dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (default: <config dir>/anticorrupt/kb.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON instead of text
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check every record; exits 1 if anything is wrong
    Validate,

    /// Free-text search across all kinds
    Search {
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
        /// Append glossary terms related to glossary hits
        #[arg(long)]
        related: bool,
    },

    /// Direct connections of a node
    Graph {
        id: String,
        #[arg(short, long)]
        kind: Option<EntityKind>,
        #[arg(long, value_enum, default_value_t = Dir::Both)]
        direction: Dir,
        /// Only follow edges with this label (repeatable)
        #[arg(long = "label")]
        labels: Vec<EdgeLabel>,
        /// Ignore relationships not valid on this date (YYYY-MM-DD)
        #[arg(long)]
        at: Option<NaiveDate>,
    },

    /// Shortest relational path between two nodes
    Path {
        from: String,
        to: String,
        #[arg(long)]
        from_kind: Option<EntityKind>,
        #[arg(long)]
        to_kind: Option<EntityKind>,
        #[arg(long)]
        at: Option<NaiveDate>,
    },

    /// Everything reachable within a number of hops
    Traverse {
        id: String,
        #[arg(short, long)]
        kind: Option<EntityKind>,
        #[arg(short, long)]
        depth: Option<usize>,
        #[arg(long)]
        at: Option<NaiveDate>,
    },

    /// Print one full record
    Show {
        id: String,
        #[arg(short, long)]
        kind: Option<EntityKind>,
    },

    /// Graph statistics
    Stats,

    /// Events of a timeline group in date order
    Timeline { group: String },

    /// Node-link JSON of the whole graph
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    DumpConfig,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Dir {
    Out,
    In,
    Both,
}

impl From<Dir> for Direction {
    fn from(d: Dir) -> Self {
        match d {
            Dir::Out => Direction::Outgoing,
            Dir::In => Direction::Incoming,
            Dir::Both => Direction::Both,
        }
    }
}

fn filter_at(at: Option<NaiveDate>) -> EdgeFilter {
    match at {
        Some(date) => EdgeFilter::default().active_on(date),
        None => EdgeFilter::default(),
    }
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", text());
    }
    Ok(())
}

/// The snapshot, or the validation report and exit 1.
async fn snapshot(engine: &KnowledgeEngine) -> anyhow::Result<Arc<GraphSnapshot>> {
    match engine.snapshot().await {
        Ok(snap) => Ok(snap),
        Err(Error::ValidationFailed { errors }) => {
            if let Some(report) = engine.last_report().await {
                eprint!("{}", format::format_report(&report));
            }
            eprintln!("refusing to query: {} validation error(s)", errors);
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "anticorrupt=info,anticorrupt_kg=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(KbConfig::default_path);
    let mut config = KbConfig::load(&config_path);
    if let Some(dir) = &cli.data_dir {
        config.data.dir = dir.clone();
    }
    tracing::debug!("data dir: {}", config.data.dir.display());

    let engine = KnowledgeEngine::from_config(config);
    let json = cli.json;

    match cli.command {
        Command::Validate => {
            let report = engine.validate().await?;
            emit(json, report.as_ref(), || format::format_report(&report))?;
            if !report.is_valid() {
                std::process::exit(1);
            }
        }

        Command::Search { query, limit, related } => {
            snapshot(&engine).await?;
            let mut options: SearchOptions = engine.config().search_options();
            options.limit = limit.or(options.limit);
            options.expand_related |= related;
            let hits = engine.search_with(&query, &options).await?;
            emit(json, &hits, || format::format_hits(&query, &hits))?;
        }

        Command::Graph { id, kind, direction, labels, at } => {
            let snap = snapshot(&engine).await?;
            let key = snap.resolve(&id, kind)?;
            let mut filter = filter_at(at).direction(direction.into());
            if !labels.is_empty() {
                filter = filter.labels(labels);
            }
            let neighbors = snap.neighbors(&key, &filter)?;
            emit(json, &neighbors, || format::format_neighbors(&key, &neighbors))?;
        }

        Command::Path { from, to, from_kind, to_kind, at } => {
            snapshot(&engine).await?;
            let path = engine.shortest_path(&from, from_kind, &to, to_kind, &filter_at(at)).await?;
            emit(json, &path, || format::format_path(&from, &to, path.as_ref()))?;
        }

        Command::Traverse { id, kind, depth, at } => {
            let snap = snapshot(&engine).await?;
            let key = snap.resolve(&id, kind)?;
            let reached = engine.traverse(&id, kind, depth, &filter_at(at)).await?;
            emit(json, &reached, || format::format_reached(&key, &reached))?;
        }

        Command::Show { id, kind } => {
            let snap = snapshot(&engine).await?;
            let kinds = kind.map(|k| vec![k]).unwrap_or_else(|| EntityKind::ALL.to_vec());
            let entity = kinds
                .into_iter()
                .find_map(|k| snap.knowledge_base().get(&EntityRef::new(k, id.clone())))
                .ok_or_else(|| Error::not_found(kind, id.clone()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entity)?);
            } else {
                print!("{}", serde_yaml::to_string(&entity)?);
            }
        }

        Command::Stats => {
            let stats = snapshot(&engine).await?.stats();
            emit(json, &stats, || format::format_stats(&stats))?;
        }

        Command::Timeline { group } => {
            let snap = snapshot(&engine).await?;
            let events = snap.timeline(&group);
            emit(json, &events, || format::format_timeline(&group, &events))?;
        }

        Command::Export { output } => {
            let export = snapshot(&engine).await?.export();
            let text = serde_json::to_string_pretty(&export)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, text)?;
                    eprintln!("wrote {} node(s), {} link(s) to {}", export.nodes.len(), export.links.len(), path.display());
                }
                None => println!("{}", text),
            }
        }

        Command::DumpConfig => print!("{}", engine.config().to_toml()),
    }

    Ok(())
}

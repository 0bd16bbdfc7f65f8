//! Watchlist CLI
//!
//! Drives a local SQLite watchlist through the optimistic coordinator, one
//! command per invocation.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use watchlist_core::{
    canonicalize, ItemIdentity, ListId, Mutation, MutationCoordinator, MutationReport, SyncConfig,
    Vote, WatchList,
};
use watchlist_store::SqliteWatchlistStore;

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "watchlist")]
#[command(about = "Vote on, add and remove titles in shared watchlists")]
struct Args {
    /// SQLite database file
    #[arg(long, value_name = "PATH", default_value = "watchlist.db")]
    db: PathBuf,

    /// Act as this user
    #[arg(short, long, default_value = "me")]
    user: String,

    /// Coordinator settings (TOML)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose logging, unless RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an empty list and print its id
    CreateList { name: String },
    /// List all lists with their sizes
    Lists,
    /// Show a list ranked by score
    Show { list: ListId },
    /// Add an item (`catalog-a:<id>`, `catalog-b:<id>` or a persisted UUID)
    Add { list: ListId, item: String },
    /// Remove an item
    Remove { list: ListId, item: String },
    /// Vote on an item; repeating the same vote withdraws it
    Vote {
        list: ListId,
        item: String,
        direction: Direction,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Direction {
    Up,
    Down,
}

impl From<Direction> for Vote {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Up => Vote::Up,
            Direction::Down => Vote::Down,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => SyncConfig::from_toml(&std::fs::read_to_string(path)?)?,
        None => SyncConfig::default(),
    };
    let store = Arc::new(SqliteWatchlistStore::open(&args.db, &args.user)?);
    tracing::debug!(db = %args.db.display(), user = %args.user, "store opened");

    match args.command {
        Command::CreateList { name } => {
            println!("{}", store.create_list(&name)?);
        }
        Command::Lists => {
            for list in store.list_lists()? {
                println!("{}  {:<24} {:>3} items", list.id, list.name, list.entries);
            }
        }
        Command::Show { list } => {
            let coord = MutationCoordinator::new(store, config);
            print_list(&coord.refresh(list).await?);
        }
        Command::Add { list, item } => {
            return submit(store, config, list, &item, Mutation::Add).await;
        }
        Command::Remove { list, item } => {
            return submit(store, config, list, &item, Mutation::Remove).await;
        }
        Command::Vote {
            list,
            item,
            direction,
        } => {
            return submit(store, config, list, &item, Mutation::Vote(direction.into())).await;
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn submit(
    store: Arc<SqliteWatchlistStore>,
    config: SyncConfig,
    list_id: ListId,
    raw_item: &str,
    mutation: Mutation,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let item = ItemIdentity::from(canonicalize(raw_item)?);
    let coord = MutationCoordinator::new(store, config);
    coord.refresh(list_id).await?;

    let Some(outcome) = coord.mutate(list_id, item.clone(), mutation).outcome().await else {
        eprintln!("{} is busy, try again", item);
        return Ok(ExitCode::FAILURE);
    };
    let failed = outcome.is_rolled_back();
    let report = MutationReport {
        list_id,
        item,
        mutation,
        outcome,
    };
    if let Some(message) = report.user_message() {
        eprintln!("{}", message);
    }

    print_list(&coord.refresh(list_id).await?);
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_list(list: &WatchList) {
    println!("{} ({})", list.name, list.id);
    if list.is_empty() {
        println!("  (empty)");
        return;
    }
    for entry in list.ranked() {
        let mine = match entry.user_vote {
            Some(Vote::Up) => "+",
            Some(Vote::Down) => "-",
            None => " ",
        };
        println!(
            "{:>5}  {:>3} up {:>3} down {} {}",
            entry.score(),
            entry.upvotes,
            entry.downvotes,
            mine,
            entry.item
        );
    }
}

use std::path::PathBuf;

use clap::Parser;

/// Replays a JSON workload against an in-memory database and prints every
/// live view transaction as one JSON line.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Workload script (tables, params, views, transactions)
    #[arg(short, long)]
    pub script: PathBuf,

    /// Allow views that join tables
    #[arg(long)]
    pub allow_joins: bool,

    /// Pretty-print each transaction instead of one line per transaction
    #[arg(long)]
    pub pretty: bool,
}

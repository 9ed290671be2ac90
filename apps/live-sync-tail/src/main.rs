//! Replays a scripted workload against an in-memory database and tails the
//! resulting live view transactions to stdout.

mod cli;
mod script;

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use live_sync_core::{DataEventTransaction, Database, MemoryDatabase, MemoryDbConfig};
use live_sync_views::{DynamicViewSet, ViewSetConfig};

use cli::Args;
use script::{ParamKindSpec, Script};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the event stream.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let script = Script::load(&args.script)?;
    let db = Arc::new(MemoryDatabase::new(MemoryDbConfig {
        can_join: args.allow_joins,
        can_field_alias: true,
        ..Default::default()
    }));
    for ddl in &script.tables {
        db.create_from_sql(ddl)
            .with_context(|| format!("failed to create table from {:?}", ddl))?;
    }

    let shared: Arc<dyn Database> = db.clone();
    let mut set = DynamicViewSet::new(shared, ViewSetConfig::named("live-sync-tail"));
    let mut params = HashMap::new();
    for spec in &script.params {
        let id = match spec.kind {
            ParamKindSpec::Single => set.create_single_value_param(spec.name.clone()),
            ParamKindSpec::Multi => set.create_multi_value_param(spec.name.clone()),
        };
        params.insert(spec.name.clone(), id);
    }
    for (index, spec) in script.views.iter().enumerate() {
        let definition = spec.definition(&params)?;
        set.create_view(definition)
            .with_context(|| format!("failed to register view #{} ({})", index, spec.sql))?;
    }

    let pretty = args.pretty;
    let handle = set.start(Box::new(move |transaction: DataEventTransaction| {
        if let Err(e) = print_transaction(&transaction, pretty) {
            error!(error = %e, "failed to write transaction");
        }
    }))?;

    let mut committed = 0usize;
    for (index, operations) in script.transactions.iter().enumerate() {
        let mut transaction = db.begin_transaction()?;
        let applied = operations
            .iter()
            .try_for_each(|operation| operation.apply(&mut transaction));
        let outcome = match applied {
            Ok(()) => transaction.commit(),
            Err(e) => {
                // Dropping the transaction rolls it back.
                drop(transaction);
                Err(e)
            }
        };
        match outcome {
            Ok(()) => committed += 1,
            Err(e) => warn!(transaction = index, error = %e, "transaction rolled back"),
        }
    }

    handle.join();
    info!(committed, total = script.transactions.len(), "workload finished");
    Ok(())
}

fn print_transaction(transaction: &DataEventTransaction, pretty: bool) -> anyhow::Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(transaction)?
    } else {
        serde_json::to_string(transaction)?
    };
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", text)?;
    stdout.flush()?;
    Ok(())
}

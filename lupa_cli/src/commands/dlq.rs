//! The `dlq` subcommand: inspect and resolve dead-letter entries.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use lupa_lib::Db;

#[derive(Args)]
pub struct DlqArgs {
    /// Include entries already marked resolved
    #[arg(long)]
    pub all: bool,

    /// Mark one entry as resolved instead of listing
    #[arg(long, value_name = "ID")]
    pub resolve: Option<i64>,

    /// Print the full raw payload of each entry
    #[arg(long)]
    pub payload: bool,
}

pub fn run(args: &DlqArgs, db_path: &Path) -> Result<()> {
    let db = Db::open(db_path)?;
    db.init()?;

    if let Some(id) = args.resolve {
        if db.resolve_dead_letter(id)? {
            eprintln!("Entry {} marked resolved", id);
        } else {
            eprintln!("No dead-letter entry with id {}", id);
        }
        return Ok(());
    }

    let rows = db.dead_letters(!args.all)?;
    if rows.is_empty() {
        eprintln!("Dead-letter queue is empty");
        return Ok(());
    }

    for row in &rows {
        let status = if row.resolved { "resolved" } else { "open" };
        println!(
            "#{} [{}] {} {} ({}): {}",
            row.id,
            status,
            row.created_at,
            row.origin,
            row.error_type.as_deref().unwrap_or("-"),
            first_line(&row.error_message),
        );
        if args.payload {
            println!("    {}", row.payload);
        }
    }
    eprintln!("{} entries", rows.len());
    Ok(())
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or(message)
}

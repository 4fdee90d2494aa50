use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use log::error;

use kizuna::Database;

/// Минимальный CLI поверх движка.
#[derive(Parser, Debug)]
#[command(name = "kizuna", version, about = "Kizuna storage engine CLI")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Initialize a database file (metadata + catalog roots)
    Init {
        #[arg(long)]
        path: PathBuf,
    },
    /// Execute one SQL statement and print the result
    Exec {
        #[arg(long)]
        path: PathBuf,
        /// SQL statement text
        sql: String,
    },
    /// List catalog tables
    Tables {
        #[arg(long)]
        path: PathBuf,
    },
    /// Print page/freelist/catalog summary
    Status {
        #[arg(long)]
        path: PathBuf,
    },
}

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт — info.
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        error!("{:?}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Init { path } => {
            // страница 1 и корни каталога создаются при открытии
            let _db = Database::open(&path, true)?;
            println!("initialized {}", path.display());
        }
        Cmd::Exec { path, sql } => {
            let mut db = Database::open(&path, true)?;
            let output = db.execute(&sql)?;
            println!("{}", output.render());
            if let kizuna::ExecOutput::Select(result) = &output {
                println!("{}", result.column_names.join("\t"));
                for row in &result.rows {
                    println!("{}", row.join("\t"));
                }
            }
            db.flush()?;
        }
        Cmd::Tables { path } => {
            let mut db = Database::open(&path, false)?;
            for entry in db.list_tables()? {
                println!("{}\t(id={}, root={})", entry.name, entry.table_id, entry.root_page_id);
            }
        }
        Cmd::Status { path } => {
            let db = Database::open(&path, false)?;
            let pager = db.pager();
            let meta = pager.metadata();
            println!("path:                {}", path.display());
            println!("pages on disk:       {}", pager.file().page_count()?);
            println!("free pages:          {}", meta.free_count);
            println!("first trunk:         {}", meta.first_trunk_id);
            println!("catalog tables root: {}", meta.catalog_tables_root);
            println!("catalog columns root:{}", meta.catalog_columns_root);
            println!("next table id:       {}", meta.next_table_id);
        }
    }
    Ok(())
}

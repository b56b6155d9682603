mod associate;
mod catalog;
mod cli;
mod config;
mod ingest;
mod sheet;
mod store;

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::time::Instant;

use cli::{AssociateCommands, Cli, Commands};
use store::EntryStore;

/// Import order matters: the geographic hierarchy resolves parents from
/// rows committed by earlier files.
const IMPORT_FILES: &[&str] = &[
    "tabelas-dados.xlsx",
    "cae.xlsx",
    "paises.xlsx",
    "distritos.xlsx",
    "concelhos.xlsx",
    "freguesias.xlsx",
    "ine-zonas.xlsx",
];

const DEFAULT_SHEET: &str = "Data";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();

    let url = config::database_url()?;
    let pool = config::connect(&url).await?;
    config::migrate(&pool).await?;

    match cli.command {
        Commands::Import { files, sheet } => {
            let mut store = EntryStore::new(pool.clone());
            for file in &files {
                ingest::import_file(&mut store, file, &sheet).await?;
            }
        }
        Commands::ProcessSteps { file, sheet } => {
            let mut store = EntryStore::new(pool.clone());
            ingest::process_steps::link_file(&mut store, &file, &sheet).await?;
        }
        Commands::Associate(command) => match command {
            AssociateCommands::Fields => {
                associate::associate_fields_records(&pool).await?;
            }
            AssociateCommands::RecordTypes { file, sheet } => {
                associate::associate_record_types_file(&pool, &file, &sheet).await?;
            }
            AssociateCommands::Steps { file, sheet } => {
                associate::associate_steps_file(&pool, &file, &sheet).await?;
            }
        },
        Commands::Run { dir } => run_pipeline(&pool, &dir).await?,
    }

    pool.close().await;
    Ok(())
}

/// Execute the whole pipeline: imports in dependency order, process-step
/// linking, then the three association procedures.
async fn run_pipeline(pool: &sqlx::SqlitePool, dir: &Path) -> Result<()> {
    let start = Instant::now();
    let mut store = EntryStore::new(pool.clone());

    for name in IMPORT_FILES {
        let task_start = Instant::now();
        ingest::import_file(&mut store, &dir.join(name), DEFAULT_SHEET).await?;
        log::info!("Task 'import {}' finished in {:?}", name, task_start.elapsed());
    }

    ingest::process_steps::link_file(&mut store, &dir.join("processo-passos.xlsx"), DEFAULT_SHEET)
        .await?;
    associate::associate_fields_records(pool).await?;
    associate::associate_record_types_file(pool, &dir.join("record-types.xlsx"), DEFAULT_SHEET)
        .await?;
    associate::associate_steps_file(pool, &dir.join("passo-registos.xlsx"), DEFAULT_SHEET).await?;

    log::info!("Pipeline finished in {:?}", start.elapsed());
    Ok(())
}

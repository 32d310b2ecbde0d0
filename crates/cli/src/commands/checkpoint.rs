//! `ferrocode checkpoint`: inspect or clear the saved checkpoint.

use anyhow::Context;
use ferrocode_checkpoint::{CheckpointStore, FileCheckpointStore};
use ferrocode_config::AppConfig;

fn open_store() -> anyhow::Result<FileCheckpointStore> {
    let config = AppConfig::load().context("Failed to load config")?;
    Ok(FileCheckpointStore::new(config.checkpoint.resolved_path()))
}

pub async fn show() -> anyhow::Result<()> {
    let store = open_store()?;
    match store.read().await? {
        Some(record) => {
            println!("Checkpoint: {}", store.path().display());
            println!("  Cycle:     {}", record.cycle);
            println!("  Saved at:  {}", record.timestamp.to_rfc3339());
            println!();
            println!("{}", record.summary);
        }
        None => println!("No checkpoint at {}", store.path().display()),
    }
    Ok(())
}

pub async fn clear() -> anyhow::Result<()> {
    let store = open_store()?;
    store.clear().await?;
    println!("Cleared {}", store.path().display());
    Ok(())
}

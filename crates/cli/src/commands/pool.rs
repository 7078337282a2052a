//! Pool-wide commands

use cairn_pool::StoragePool;
use std::io::{self, Write};

pub async fn sync(pool: &StoragePool) -> eyre::Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || pool.sync_now()).await??;
    tracing::info!("Sync finished");
    Ok(())
}

pub fn locations(pool: &StoragePool) -> eyre::Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(
        stdout,
        "{:<20} {:>8} {:>9} {:>8} {:>6} {:>7}",
        "NAME", "PRIORITY", "AVAILABLE", "ITEMS", "SHARED", "REPAIR"
    )?;
    for location in pool.locations() {
        let repair = location
            .repair_config()
            .map(|r| format!("{}+{}", r.data_shards, r.parity_shards))
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            stdout,
            "{:<20} {:>8} {:>9} {:>8} {:>6} {:>7}",
            location.name(),
            location.priority(),
            location.is_available(),
            location.len(),
            location.is_shared(),
            repair
        )?;
    }
    Ok(())
}

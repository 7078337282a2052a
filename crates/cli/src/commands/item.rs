//! Item commands

use cairn_core::{FileAccess, FileMode};
use cairn_pool::{Item, StoragePool};
use eyre::WrapErr;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::info;

pub fn put(
    pool: &StoragePool,
    id: &str,
    input: Option<&Path>,
    tags: Vec<String>,
    new: bool,
    append: bool,
) -> eyre::Result<()> {
    let mode = if new {
        FileMode::CreateNew
    } else if append {
        FileMode::Append
    } else {
        FileMode::Create
    };
    let tags = (!tags.is_empty()).then(|| tags.into_iter().collect::<BTreeSet<_>>());

    let mut reader: Box<dyn Read> = match input {
        Some(path) if path != Path::new("-") => Box::new(
            File::open(path).wrap_err_with(|| format!("failed to open {}", path.display()))?,
        ),
        _ => Box::new(io::stdin().lock()),
    };

    let mut stream = pool.open(id, mode, FileAccess::Write, tags)?;
    let copied = io::copy(&mut reader, &mut stream)?;
    let location = stream.location().to_string();
    let item = stream.finish()?;
    info!(id, location = %location, bytes = copied, length = item.length, "Item stored");
    Ok(())
}

pub fn get(pool: &StoragePool, id: &str, output: Option<&Path>) -> eyre::Result<()> {
    let mut stream = pool.open(id, FileMode::Open, FileAccess::Read, None)?;
    let copied = match output {
        Some(path) if path != Path::new("-") => {
            let mut file = File::create(path)
                .wrap_err_with(|| format!("failed to create {}", path.display()))?;
            io::copy(&mut stream, &mut file)?
        }
        _ => {
            let mut stdout = io::stdout().lock();
            let copied = io::copy(&mut stream, &mut stdout)?;
            stdout.flush()?;
            copied
        }
    };
    tracing::debug!(id, location = %stream.location(), bytes = copied, "Item read");
    Ok(())
}

pub fn list(pool: &StoragePool, pattern: &str, json: bool) -> eyre::Result<()> {
    let mut items = pool.list(pattern);
    items.sort_by(|a, b| a.id.cmp(&b.id));

    let mut stdout = io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut stdout, &items)?;
        writeln!(stdout)?;
    } else {
        for item in &items {
            writeln!(stdout, "{}", format_item(item))?;
        }
    }
    Ok(())
}

pub fn delete(pool: &StoragePool, id: &str) -> eyre::Result<()> {
    if !pool.delete(id)? {
        eyre::bail!("item '{id}' not found");
    }
    info!(id, "Item deleted");
    Ok(())
}

pub fn repair(pool: &StoragePool, id: &str) -> eyre::Result<()> {
    let blocks = pool.repair(id)?;
    if blocks == 0 {
        info!(id, "No damaged blocks found");
    } else {
        info!(id, blocks, "Damaged blocks rebuilt");
    }
    Ok(())
}

fn format_item(item: &Item) -> String {
    let tags: Vec<&str> = item.tags.iter().map(String::as_str).collect();
    format!(
        "{:<32} {:>12}  {}  [{}]",
        item.id,
        item.length,
        item.last_modified.format("%Y-%m-%d %H:%M:%S"),
        tags.join(", ")
    )
}

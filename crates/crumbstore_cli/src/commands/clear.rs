//! Clear command implementation.

use crumbstore_core::{BreadcrumbStore, Config};
use std::path::Path;
use tracing::info;

/// Runs the clear command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No breadcrumb log found at {:?}", path).into());
    }

    let capacity = crumbstore_core::BreadcrumbReader::open(path)?
        .capacity()
        .and_then(|capacity| u32::try_from(capacity).ok());
    let mut config = Config::default();
    if let Some(capacity) = capacity {
        config = config.capacity_bytes(capacity);
    }

    info!("Clearing breadcrumbs in {:?}", path);
    let store = BreadcrumbStore::open_at(path, config)?;
    store.try_clear()?;
    store.close();
    Ok(())
}

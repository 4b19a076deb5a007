//! Add command implementation.

use crumbstore_core::{
    BreadcrumbId, BreadcrumbLevel, BreadcrumbStore, BreadcrumbType, Config, NewBreadcrumb,
};
use std::path::Path;
use tracing::info;

/// Parses a `key=value` attribute argument.
pub fn parse_attribute(arg: &str) -> Result<(String, String), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("invalid attribute `{arg}`, expected key=value"))?;
    if key.is_empty() {
        return Err(format!("invalid attribute `{arg}`, key is empty"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Runs the add command, returning the new breadcrumb's id.
pub fn run(
    path: &Path,
    message: &str,
    attributes: &[(String, String)],
    kind: &str,
    level: &str,
    capacity: Option<u32>,
) -> Result<BreadcrumbId, Box<dyn std::error::Error>> {
    let kind: BreadcrumbType = kind.parse()?;
    let level: BreadcrumbLevel = level.parse()?;

    let mut config = Config::default();
    if let Some(capacity) = capacity {
        config = config.capacity_bytes(capacity);
    } else if let Ok(stored) = existing_capacity(path) {
        config = config.capacity_bytes(stored);
    }

    info!("Adding breadcrumb to {:?}", path);
    let store = BreadcrumbStore::open_at(path, config)?;
    let id = store.try_add(
        NewBreadcrumb::new(message)
            .attributes(attributes.iter().cloned())
            .kind(kind)
            .level(level),
    )?;
    store.close();
    Ok(id)
}

/// Capacity of an existing log, so adding never resizes it implicitly.
fn existing_capacity(path: &Path) -> Result<u32, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err("no log".into());
    }
    let reader = crumbstore_core::BreadcrumbReader::open(path)?;
    let capacity = reader.capacity().ok_or("capacity unknown")?;
    Ok(u32::try_from(capacity)?)
}

//! Inspect command implementation.

use crumbstore_core::{BreadcrumbReader, BreadcrumbType, DEFAULT_CAPACITY_BYTES};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Breadcrumb log inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Log path.
    pub path: String,
    /// File size in bytes.
    pub file_size: u64,
    /// Ring capacity in bytes.
    pub capacity: u64,
    /// Bytes occupied by retained frames.
    pub used: u64,
    /// Number of breadcrumbs that decode.
    pub breadcrumb_count: usize,
    /// Oldest retained id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_id: Option<u64>,
    /// Newest retained id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_id: Option<u64>,
    /// Number of configuration breadcrumbs.
    pub configuration_count: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Collects statistics for the log at `path`.
pub fn inspect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No breadcrumb log found at {:?}", path).into());
    }
    info!("Inspecting breadcrumb log {:?}", path);

    let file_size = std::fs::metadata(path)?.len();
    let reader = BreadcrumbReader::open(path)?;
    let capacity = reader
        .capacity()
        .unwrap_or_else(|| u64::from(DEFAULT_CAPACITY_BYTES));
    let used = reader.size_bytes();

    let mut result = InspectResult {
        path: path.display().to_string(),
        file_size,
        capacity,
        used,
        breadcrumb_count: 0,
        first_id: None,
        last_id: None,
        configuration_count: 0,
    };

    for breadcrumb in reader {
        let id = breadcrumb.id.as_u64();
        result.first_id.get_or_insert(id);
        result.last_id = Some(id);
        result.breadcrumb_count += 1;
        if breadcrumb.kind == BreadcrumbType::Configuration {
            result.configuration_count += 1;
        }
    }

    Ok(result)
}

fn print_text_output(result: &InspectResult) {
    println!("CrumbStore Log Inspection");
    println!("=========================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Storage:");
    println!("  File size: {}", format_size(result.file_size));
    println!("  Capacity:  {}", format_size(result.capacity));
    println!(
        "  Used:      {} ({:.1}%)",
        format_size(result.used),
        result.used as f64 * 100.0 / result.capacity.max(1) as f64
    );
    println!();
    println!("Breadcrumbs:");
    println!("  Retained:       {}", result.breadcrumb_count);
    println!("  Configuration:  {}", result.configuration_count);
    if let (Some(first), Some(last)) = (result.first_id, result.last_id) {
        println!("  Id range:       {first}..={last}");
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

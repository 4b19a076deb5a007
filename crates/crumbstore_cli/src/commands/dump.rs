//! Dump command implementation.

use crumbstore_core::{Breadcrumb, BreadcrumbReader, RecordCodec};
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Runs the dump command, writing to `out`.
pub fn run(
    path: &Path,
    limit: Option<usize>,
    format: &str,
    out: &mut dyn Write,
) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No breadcrumb log found at {:?}", path).into());
    }
    info!("Dumping breadcrumbs from {:?}", path);

    let mut breadcrumbs: Vec<Breadcrumb> = BreadcrumbReader::open(path)?.collect();
    if let Some(limit) = limit {
        let skip = breadcrumbs.len().saturating_sub(limit);
        breadcrumbs.drain(..skip);
    }

    match format {
        "json" => {
            for breadcrumb in &breadcrumbs {
                out.write_all(&RecordCodec::encode(breadcrumb)?)?;
                writeln!(out)?;
            }
        }
        _ => {
            for breadcrumb in &breadcrumbs {
                writeln!(out, "{}", format_text(breadcrumb))?;
            }
        }
    }

    Ok(())
}

fn format_text(breadcrumb: &Breadcrumb) -> String {
    let mut line = format!(
        "[{:>6}] {} {:<7} {:<13} {}",
        breadcrumb.id.as_u64(),
        breadcrumb.timestamp,
        breadcrumb.level,
        breadcrumb.kind,
        breadcrumb.message
    );
    if !breadcrumb.attributes.is_empty() {
        let attributes: Vec<String> = breadcrumb
            .attributes
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        line.push_str(" {");
        line.push_str(&attributes.join(", "));
        line.push('}');
    }
    line
}

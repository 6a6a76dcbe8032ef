//! Output file naming and CSV summaries.

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Substitute `{name}` placeholders in `template` from `vars`.
///
/// Every placeholder must have a value; text outside braces is copied as is.
pub fn render_template(template: &str, vars: &[(&str, String)]) -> Result<String> {
    lazy_static::lazy_static! {
        static ref PLACEHOLDER: Regex = Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    }

    if let Some(caps) = PLACEHOLDER
        .captures_iter(template)
        .find(|caps| !vars.iter().any(|(name, _)| *name == &caps[1]))
    {
        bail!("Unknown placeholder '{{{}}}' in template '{}'", &caps[1], template);
    }

    let rendered = PLACEHOLDER.replace_all(template, |caps: &regex::Captures| {
        vars.iter()
            .find(|(name, _)| *name == &caps[1])
            .map(|(_, value)| value.clone())
            .unwrap_or_default()
    });
    Ok(rendered.into_owned())
}

/// Resolve a file name template under `dir`.
pub fn output_path(dir: &Path, template: &str, vars: &[(&str, String)]) -> Result<PathBuf> {
    Ok(dir.join(render_template(template, vars)?))
}

/// A row of a summary CSV. `HEADER` names the serialized fields in order.
pub trait SummaryRow: Serialize {
    const HEADER: &'static [&'static str];
}

/// Write `rows` as a CSV file. The header is written even when there are no
/// rows.
pub fn write_summary_csv<T: SummaryRow>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(T::HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    if rows.is_empty() {
        log::warn!("Summary {} has no rows", path.display());
    } else {
        log::info!("Summary written to {} ({} rows)", path.display(), rows.len());
    }
    Ok(())
}

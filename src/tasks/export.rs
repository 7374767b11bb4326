//! File export (CSV / JSON)
//!
//! The target's parent directories are created, the content goes to a temp
//! file in the same directory, and the temp file is renamed over the target.
//! Readers never see a partial file. The input passes through unchanged.

use std::borrow::Cow;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::{info, instrument};

use super::{TaskContext, TaskResolver};
use crate::ast::params::{ExportFormat, ExportParams};
use crate::ast::{parse_params, TaskDescriptor};
use crate::error::{AionError, Result};
use crate::store::{display_value, RecordStore, TaskOutput};

/// Write `records` to `path` atomically
pub fn write_export(path: &Path, format: ExportFormat, records: &RecordStore) -> io::Result<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let mut tmp = NamedTempFile::new_in(&parent)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        match format {
            ExportFormat::Csv => write_csv(&mut writer, records)?,
            ExportFormat::Json => {
                serde_json::to_writer_pretty(&mut writer, records)?;
                writer.write_all(b"\n")?;
            }
        }
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// CSV with a header of every field in first-seen order.
///
/// Null and missing values are empty cells; lists and objects are JSON text.
pub fn write_csv<W: Write>(writer: &mut W, records: &RecordStore) -> io::Result<()> {
    let header = records.fields();
    if header.is_empty() {
        return Ok(());
    }

    write_row(writer, header.iter().map(|h| Cow::Borrowed(h.as_str())))?;
    for record in records {
        write_row(
            writer,
            header
                .iter()
                .map(|h| record.get(h).map(display_value).unwrap_or(Cow::Borrowed(""))),
        )?;
    }
    Ok(())
}

fn write_row<'a, W: Write>(
    writer: &mut W,
    cells: impl Iterator<Item = Cow<'a, str>>,
) -> io::Result<()> {
    for (i, cell) in cells.enumerate() {
        if i > 0 {
            writer.write_all(b",")?;
        }
        writer.write_all(escape_cell(&cell).as_bytes())?;
    }
    writer.write_all(b"\n")
}

/// RFC 4180 quoting: wrap when the cell holds a comma, quote or line break
fn escape_cell(cell: &str) -> Cow<'_, str> {
    if cell.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", cell.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(cell)
    }
}

pub struct ExportResolver;

#[async_trait]
impl TaskResolver for ExportResolver {
    fn validate(&self, task: &TaskDescriptor) -> Result<()> {
        let params: ExportParams = parse_params(task)?;
        if params.file_path.trim().is_empty() {
            return Err(AionError::validation("export", "'file_path' cannot be empty"));
        }
        Ok(())
    }

    #[instrument(name = "export", skip_all, fields(records_in = input.len()))]
    async fn execute(
        &self,
        input: &RecordStore,
        task: &TaskDescriptor,
        _ctx: &TaskContext,
    ) -> Result<TaskOutput> {
        let params: ExportParams = parse_params(task)?;
        let path = PathBuf::from(&params.file_path);
        let records = input.clone();
        let format = params.format;

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_export(&target, format, &records))
            .await
            .map_err(|e| AionError::Export {
                path: params.file_path.clone(),
                reason: format!("export worker failed: {}", e),
            })?
            .map_err(|e| AionError::Export {
                path: params.file_path.clone(),
                reason: e.to_string(),
            })?;

        info!(path = %path.display(), format = %format, records = input.len(), "exported records");
        Ok(TaskOutput::Records(input.clone()))
    }
}

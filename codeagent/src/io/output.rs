//! Structured JSON output file.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::core::summary::OutputPayload;
use crate::core::types::TaskResult;
use crate::error::OutputError;

/// Write `{results, summary}` as one JSON document followed by a newline.
///
/// A blank path does nothing; surrounding whitespace is ignored. The file is created or truncated. A close
/// failure is reported even when encoding succeeded; an encoding failure wins
/// when both happen.
#[instrument(skip_all, fields(path = %path.display(), results = results.len()))]
pub fn write_structured_output(path: &Path, results: &[TaskResult]) -> Result<(), OutputError> {
    let raw = path.to_string_lossy();
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    // Keep the original bytes when no surrounding whitespace was removed.
    let cleaned;
    let path = if trimmed.len() == raw.len() {
        path
    } else {
        cleaned = PathBuf::from(trimmed);
        cleaned.as_path()
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| OutputError::CreateDir {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let file = File::create(path).map_err(|source| OutputError::CreateFile {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    let payload = OutputPayload::new(results);
    let encoded = serde_json::to_writer(&mut writer, &payload)
        .and_then(|()| writer.write_all(b"\n").map_err(serde_json::Error::io));
    let closed = close(writer);

    encoded.map_err(|source| OutputError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    closed.map_err(|source| OutputError::Close {
        path: path.to_path_buf(),
        source,
    })?;

    debug!("structured output written");
    Ok(())
}

fn close(writer: BufWriter<File>) -> std::io::Result<()> {
    let file = writer.into_inner().map_err(|err| err.into_error())?;
    file.sync_all()
}

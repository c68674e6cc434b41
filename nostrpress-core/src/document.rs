//! Document store: discovery, loading and atomic writes of article files.
//!
//! Writes go through a sibling `.nostrpress.tmp` file renamed over the target,
//! so a crash mid-batch never leaves a half-written article behind.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{io_err, CoreError};
use crate::frontmatter::{effective_format, parse_document, serialize_document};
use crate::types::Document;

/// Section index files are never articles.
const INDEX_FILE: &str = "_index.md";

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// All `*.md` files directly inside `posts_dir`, excluding `_index.md`, sorted by name.
pub fn list_documents(posts_dir: &Path) -> Result<Vec<PathBuf>, CoreError> {
    let entries = std::fs::read_dir(posts_dir).map_err(|e| io_err(posts_dir, e))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(posts_dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_md = path.extension().is_some_and(|ext| ext == "md");
        let is_index = path.file_name().is_some_and(|n| n == INDEX_FILE);
        if is_md && !is_index {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Load every document in `posts_dir`. Per-file parse failures are returned
/// in place so the caller can count them without aborting the batch.
pub fn load_all(posts_dir: &Path) -> Result<Vec<Result<Document, CoreError>>, CoreError> {
    Ok(list_documents(posts_dir)?
        .into_iter()
        .map(|p| load(&p))
        .collect())
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

pub fn load(path: &Path) -> Result<Document, CoreError> {
    let raw = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let parsed = parse_document(&raw).map_err(|source| CoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let mut doc = Document::new(path, parsed.metadata, parsed.body, parsed.format);
    doc.datetimes = parsed.datetimes;
    Ok(doc)
}

fn render(doc: &Document) -> Result<String, CoreError> {
    serialize_document(&doc.metadata, &doc.body, doc.format, &doc.datetimes).map_err(|source| {
        CoreError::Serialize {
            path: doc.path.clone(),
            source,
        }
    })
}

/// Atomically write `doc` back to `doc.path`.
///
/// A plain document that gained metadata switches to YAML front matter; its
/// `format` is updated to match what is now on disk.
pub fn save(doc: &mut Document) -> Result<(), CoreError> {
    let content = render(doc)?;
    let tmp = PathBuf::from(format!("{}.nostrpress.tmp", doc.path.display()));
    atomic_write(&doc.path, &content, &tmp)?;
    doc.format = effective_format(&doc.metadata, doc.format);
    tracing::debug!("wrote: {}", doc.path.display());
    Ok(())
}

/// Write a brand-new document. Fails with `AlreadyExists` rather than
/// replacing a file that appeared at the same path.
pub fn create(doc: &Document) -> Result<(), CoreError> {
    let content = render(doc)?;
    if let Some(parent) = doc.path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&doc.path)
        .map_err(|e| io_err(&doc.path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| io_err(&doc.path, e))?;
    tracing::debug!("created: {}", doc.path.display());
    Ok(())
}

pub fn remove(path: &Path) -> Result<(), CoreError> {
    std::fs::remove_file(path).map_err(|e| io_err(path, e))?;
    tracing::debug!("removed: {}", path.display());
    Ok(())
}

fn atomic_write(path: &Path, content: &str, tmp: &Path) -> Result<(), CoreError> {
    std::fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;
    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

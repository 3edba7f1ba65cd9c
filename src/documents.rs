use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing::info;

/// Reads a job description or resume from disk. PDFs go through `pdf-extract`;
/// anything else must be UTF-8 text.
pub fn extract_text(path: &Path, max_bytes: u64) -> anyhow::Result<String> {
    let size = fs::metadata(path)
        .with_context(|| format!("Cannot read {}", path.display()))?
        .len();
    anyhow::ensure!(
        size <= max_bytes,
        "{} is {} bytes, larger than the {} byte limit",
        path.display(),
        size,
        max_bytes
    );

    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let text = if is_pdf(path) {
        pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|err| anyhow::anyhow!("{err}"))
            .with_context(|| format!("Failed to extract text from PDF {}", path.display()))?
    } else {
        String::from_utf8(bytes)
            .with_context(|| format!("{} is not UTF-8 text", path.display()))?
    };

    let text = text.trim().to_string();
    anyhow::ensure!(!text.is_empty(), "No text found in {}", path.display());
    info!(path = %path.display(), chars = text.len(), "Extracted document text");
    Ok(text)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// File stem, used as the default document id.
pub fn document_id(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| blake3::hash(path.to_string_lossy().as_bytes()).to_hex()[..12].to_string())
}

//! Import workflow: discover files, sniff their kind, render a preview and
//! create one card per file. A failing file never aborts the batch.

use crate::config::ImportConfig;
use crate::error::RenderError;
use anyhow::Context;
use chrono::{DateTime, Utc};
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use storage::models::{Card, CardId, CardKind, Thumbnail};
use storage::CardStore;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Produces a preview image for freshly imported bytes.
#[async_trait::async_trait]
pub trait ThumbnailRenderer: Send + Sync {
    async fn render(&self, bytes: &[u8], kind: CardKind) -> Result<Thumbnail, RenderError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderRenderer;

#[async_trait::async_trait]
impl ThumbnailRenderer for PlaceholderRenderer {
    async fn render(&self, _bytes: &[u8], _kind: CardKind) -> Result<Thumbnail, RenderError> {
        Ok(Thumbnail::placeholder())
    }
}

/// Renders the first GIF frame as a PNG no larger than `size` on each side.
#[cfg(feature = "image-thumbnails")]
#[derive(Debug, Clone, Copy)]
pub struct GifThumbnailRenderer {
    pub size: u32,
}

#[cfg(feature = "image-thumbnails")]
#[async_trait::async_trait]
impl ThumbnailRenderer for GifThumbnailRenderer {
    async fn render(&self, bytes: &[u8], kind: CardKind) -> Result<Thumbnail, RenderError> {
        if kind != CardKind::AnimatedImage {
            return Err(RenderError::Unsupported);
        }
        let owned = bytes.to_vec();
        let size = self.size;
        tokio::task::spawn_blocking(move || {
            let img = image::load_from_memory_with_format(&owned, image::ImageFormat::Gif)
                .map_err(|e| RenderError::Failed(e.to_string()))?;
            let thumb = img.thumbnail(size, size);
            let mut buf = std::io::Cursor::new(Vec::new());
            thumb
                .write_to(&mut buf, image::ImageOutputFormat::Png)
                .map_err(|e| RenderError::Failed(e.to_string()))?;
            Ok(Thumbnail::png(buf.into_inner()))
        })
        .await
        .map_err(|e| RenderError::Failed(e.to_string()))?
    }
}

/// Raw input for one card.
#[derive(Debug, Clone)]
pub struct ImportSource {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImportSource {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    fn display_name(&self) -> String {
        let stem = Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::trim)
            .unwrap_or("");
        if stem.is_empty() {
            "Untitled".to_string()
        } else {
            stem.to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub file_name: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: Vec<Card>,
    pub skipped: Vec<SkippedFile>,
    /// Non-fatal problems worth showing to the user.
    pub notices: Vec<String>,
}

impl ImportReport {
    fn skip(&mut self, file_name: &str, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(file = file_name, reason = %reason, "import skipped");
        self.notices.push(format!("{file_name}: {reason}"));
        self.skipped.push(SkippedFile {
            file_name: file_name.to_string(),
            reason,
        });
    }
}

pub fn detect_kind(file_name: &str, bytes: &[u8]) -> Option<CardKind> {
    if let Some(kind) = infer::get(bytes) {
        match kind.mime_type() {
            "application/pdf" => return Some(CardKind::Document),
            "image/gif" => return Some(CardKind::AnimatedImage),
            _ => {}
        }
    }
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    match ext.as_deref() {
        Some("pdf") => Some(CardKind::Document),
        Some("gif") => Some(CardKind::AnimatedImage),
        _ => None,
    }
}

/// Number of pages; anything unreadable counts as one page.
pub fn page_count(bytes: &[u8], kind: CardKind) -> u32 {
    match kind {
        CardKind::AnimatedImage => 1,
        CardKind::Document => count_pdf_pages(bytes).unwrap_or(1).max(1),
    }
}

#[cfg(feature = "pdf")]
fn count_pdf_pages(bytes: &[u8]) -> Option<u32> {
    match lopdf::Document::load_mem(bytes) {
        Ok(doc) => u32::try_from(doc.get_pages().len()).ok(),
        Err(e) => {
            debug!("pdf parse failed: {}", e);
            None
        }
    }
}

// Counts `/Type /Page` dictionaries (not `/Pages`).
#[cfg(not(feature = "pdf"))]
fn count_pdf_pages(bytes: &[u8]) -> Option<u32> {
    const TYPE: &[u8] = b"/Type";
    const PAGE: &[u8] = b"/Page";
    let mut count = 0u32;
    let mut i = 0;
    while i + TYPE.len() <= bytes.len() {
        if &bytes[i..i + TYPE.len()] != TYPE {
            i += 1;
            continue;
        }
        let mut j = i + TYPE.len();
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if bytes.len() >= j + PAGE.len() && &bytes[j..j + PAGE.len()] == PAGE {
            let next = bytes.get(j + PAGE.len()).copied();
            if !matches!(next, Some(c) if c.is_ascii_alphanumeric()) {
                count += 1;
            }
        }
        i = j;
    }
    (count > 0).then_some(count)
}

pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

static ID_SEQ: AtomicU64 = AtomicU64::new(0);

/// Fresh opaque id: 20 hex chars of blake3(content hash, time, sequence).
pub fn new_card_id(content_hash: &str, now: DateTime<Utc>) -> CardId {
    let seq = ID_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut hasher = blake3::Hasher::new();
    hasher.update(content_hash.as_bytes());
    hasher.update(&now.timestamp_micros().to_le_bytes());
    hasher.update(&seq.to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    let hex = hasher.finalize().to_hex();
    CardId::new(&hex.as_str()[..20])
}

fn build_globset(patterns: &[String], case_insensitive: bool) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = if case_insensitive {
            GlobBuilder::new(pat).case_insensitive(true).build()?
        } else {
            Glob::new(pat)?
        };
        builder.add(glob);
    }
    Ok(builder.build()?)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

/// Walks `roots` for files whose name matches `include` (case-insensitive)
/// and whose path matches no `exclude` pattern. Hidden entries are skipped.
/// A root that is itself a file is checked the same way.
pub fn collect_paths(
    roots: &[PathBuf],
    include: &[String],
    exclude: &[String],
) -> anyhow::Result<Vec<PathBuf>> {
    let include_set = build_globset(include, true).context("invalid include pattern")?;
    let exclude_set = build_globset(exclude, false).context("invalid exclude pattern")?;
    let mut out = Vec::new();
    for root in roots {
        for entry in WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || (!is_hidden(e.path()) && !exclude_set.is_match(e.path())))
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!("walk error: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let name_matches = path
                .file_name()
                .map(|n| include_set.is_match(Path::new(n)))
                .unwrap_or(false);
            if name_matches && !exclude_set.is_match(path) {
                out.push(path.to_path_buf());
            }
        }
    }
    Ok(out)
}

/// Reads each path. Unreadable files are reported, not fatal.
pub async fn read_sources(paths: &[PathBuf]) -> (Vec<ImportSource>, Vec<SkippedFile>) {
    let mut sources = Vec::with_capacity(paths.len());
    let mut failed = Vec::new();
    for path in paths {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        match tokio::fs::read(path).await {
            Ok(bytes) => sources.push(ImportSource::new(file_name, bytes)),
            Err(e) => {
                warn!(path = %path.display(), "unreadable file: {}", e);
                failed.push(SkippedFile {
                    file_name,
                    reason: format!("unreadable: {e}"),
                });
            }
        }
    }
    (sources, failed)
}

/// Creates and persists one card per source. `known_hashes` holds content
/// hashes already in the library and is extended with new imports.
pub async fn import_batch(
    sources: Vec<ImportSource>,
    renderer: &dyn ThumbnailRenderer,
    store: &dyn CardStore,
    cfg: &ImportConfig,
    known_hashes: &mut HashSet<String>,
) -> ImportReport {
    let mut report = ImportReport::default();
    for source in sources {
        let file_name = source.file_name.clone();
        if let Some(limit) = cfg.max_file_bytes {
            if source.bytes.len() as u64 > limit {
                report.skip(&file_name, format!("larger than {limit} bytes"));
                continue;
            }
        }
        let Some(kind) = detect_kind(&file_name, &source.bytes) else {
            report.skip(&file_name, "unsupported file type");
            continue;
        };
        let hash = content_hash(&source.bytes);
        if cfg.skip_duplicates && known_hashes.contains(&hash) {
            report.skip(&file_name, "already in library");
            continue;
        }

        let thumbnail = match renderer.render(&source.bytes, kind).await {
            Ok(t) => t,
            Err(e) => {
                warn!(file = %file_name, "thumbnail render failed: {}", e);
                report
                    .notices
                    .push(format!("{file_name}: preview unavailable ({e})"));
                Thumbnail::placeholder()
            }
        };

        let now = Utc::now();
        let mut card = Card::new(
            new_card_id(&hash, now),
            source.display_name(),
            kind,
            page_count(&source.bytes, kind),
            thumbnail,
            now,
        );
        card.content_hash = Some(hash.clone());

        if let Err(e) = store.put_bytes(&card.id, &source.bytes).await {
            report.skip(&file_name, format!("could not store file: {e}"));
            continue;
        }
        if let Err(e) = store.put(&card).await {
            // Leave nothing half-written behind.
            let _ = store.delete(&card.id).await;
            report.skip(&file_name, format!("could not store card: {e}"));
            continue;
        }
        debug!(id = %card.id, file = %file_name, pages = card.page_count, "card imported");
        known_hashes.insert(hash);
        report.imported.push(card);
    }
    info!(
        imported = report.imported.len(),
        skipped = report.skipped.len(),
        "import batch finished"
    );
    report
}

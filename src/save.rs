//! File save relay
//!
//! Presents a native save dialog seeded under the user's desktop directory,
//! then writes the page-supplied content. Image types arrive base64 encoded
//! (optionally as a `data:` URL); everything else is written verbatim.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::error::SaveError;

/// Save request as sent by the page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub content: String,
    pub suggested_name: String,
    pub file_type: String,
}

/// Exactly one of these is produced per save request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SaveOutcome {
    Saved { path: PathBuf },
    Cancelled,
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileType {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
    Text,
    Csv,
    Json,
    Html,
    Xml,
    /// Unrecognized tag, written as text with the tag as extension
    Other(String),
}

impl FileType {
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim().trim_start_matches('.').to_ascii_lowercase();
        match tag.as_str() {
            "png" => Self::Png,
            "jpg" | "jpeg" => Self::Jpeg,
            "gif" => Self::Gif,
            "webp" => Self::Webp,
            "bmp" => Self::Bmp,
            "txt" | "text" | "" => Self::Text,
            "csv" => Self::Csv,
            "json" => Self::Json,
            "html" | "htm" => Self::Html,
            "xml" => Self::Xml,
            _ => Self::Other(tag),
        }
    }

    pub fn extension(&self) -> &str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
            Self::Text => "txt",
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Html => "html",
            Self::Xml => "xml",
            Self::Other(ext) => ext,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Png | Self::Jpeg | Self::Gif | Self::Webp | Self::Bmp)
    }

    /// Dialog filter for this type
    pub fn filter(&self) -> FileFilter {
        let (name, extensions): (&str, Vec<String>) = match self {
            Self::Png => ("PNG Image", vec!["png".into()]),
            Self::Jpeg => ("JPEG Image", vec!["jpg".into(), "jpeg".into()]),
            Self::Gif => ("GIF Image", vec!["gif".into()]),
            Self::Webp => ("WebP Image", vec!["webp".into()]),
            Self::Bmp => ("Bitmap Image", vec!["bmp".into()]),
            Self::Text => ("Text", vec!["txt".into()]),
            Self::Csv => ("CSV", vec!["csv".into()]),
            Self::Json => ("JSON", vec!["json".into()]),
            Self::Html => ("HTML", vec!["html".into(), "htm".into()]),
            Self::Xml => ("XML", vec!["xml".into()]),
            Self::Other(ext) => ("File", vec![ext.clone()]),
        };
        FileFilter { name: name.to_string(), extensions }
    }

    /// Bytes to write for `content`
    pub fn decode(&self, content: &str) -> Result<Vec<u8>, SaveError> {
        if !self.is_image() {
            return Ok(content.as_bytes().to_vec());
        }
        let encoded = match content.split_once(";base64,") {
            Some((prefix, data)) if prefix.starts_with("data:") => data,
            _ => content,
        };
        Ok(BASE64.decode(encoded.trim())?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    pub name: String,
    pub extensions: Vec<String>,
}

/// Native save dialog. `None` means the user dismissed it.
#[async_trait]
pub trait SaveDialog: Send + Sync {
    async fn pick_save_path(&self, default_path: &Path, filter: &FileFilter) -> Option<PathBuf>;
}

/// Default directory for the dialog: desktop, then home, then cwd
pub fn default_save_dir() -> PathBuf {
    dirs::desktop_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// File name from the page's suggestion with the type's extension ensured.
///
/// Only the final path component is kept so a page cannot steer the default
/// path outside the save directory.
pub fn file_name_for(suggested: &str, file_type: &FileType) -> String {
    let base = suggested
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or("download");

    let extension = file_type.extension();
    let has_extension = Path::new(base)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            e.eq_ignore_ascii_case(extension)
                || file_type.filter().extensions.iter().any(|x| x.eq_ignore_ascii_case(e))
        });

    if has_extension {
        base.to_string()
    } else {
        format!("{}.{}", base, extension)
    }
}

pub struct FileSaveRelay<D> {
    dialog: D,
    save_dir: PathBuf,
}

impl<D: SaveDialog> FileSaveRelay<D> {
    pub fn new(dialog: D) -> Self {
        Self::with_dir(dialog, default_save_dir())
    }

    pub fn with_dir(dialog: D, save_dir: PathBuf) -> Self {
        Self { dialog, save_dir }
    }

    /// Run one save interaction to completion
    pub async fn save(&self, request: &SaveRequest) -> SaveOutcome {
        let file_type = FileType::from_tag(&request.file_type);
        let default_path = self
            .save_dir
            .join(file_name_for(&request.suggested_name, &file_type));

        let Some(path) = self
            .dialog
            .pick_save_path(&default_path, &file_type.filter())
            .await
        else {
            log::info!("Save dialog dismissed");
            return SaveOutcome::Cancelled;
        };

        match write(&path, &file_type, &request.content).await {
            Ok(()) => {
                log::info!("Saved {}", path.display());
                SaveOutcome::Saved { path }
            }
            Err(e) => {
                log::error!("Save failed: {}", e);
                SaveOutcome::Failed { message: e.to_string() }
            }
        }
    }
}

async fn write(path: &Path, file_type: &FileType, content: &str) -> Result<(), SaveError> {
    let bytes = file_type.decode(content)?;
    tokio::fs::write(path, bytes).await.map_err(|source| SaveError::Write {
        path: path.display().to_string(),
        source,
    })
}

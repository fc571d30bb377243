//! Category-specific metadata and secondary attachments.
//!
//! [`CategoryMetadata`] is a tagged union: exactly one variant is populated per
//! record and it must agree with the record's primary category. Office and
//! font metadata are orthogonal facets that may accompany any category.

use super::Category;
use serde::{Deserialize, Serialize};

/// Image metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageMetadata {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Width divided by height.
    pub aspect_ratio: Option<f64>,
    /// Color space name (e.g. `srgb`, `cmyk`).
    pub color_space: Option<String>,
    /// Bits per channel.
    pub bit_depth: Option<u8>,
    /// Whether the image has an alpha channel.
    pub has_alpha: bool,
    /// Dominant colors as hex strings.
    pub dominant_colors: Vec<String>,
    /// Hex encoding of a 64-bit perceptual fingerprint.
    pub perceptual_hash: Option<String>,
    /// Path of a generated thumbnail.
    pub thumbnail_path: Option<String>,
}

/// Video metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoMetadata {
    /// Duration in seconds.
    pub duration_secs: f64,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Frames per second.
    pub frame_rate: Option<f64>,
    /// Video codec name.
    pub video_codec: Option<String>,
    /// Audio codec name.
    pub audio_codec: Option<String>,
    /// Container format.
    pub container: Option<String>,
}

/// Audio metadata, including common tag fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioMetadata {
    /// Duration in seconds.
    pub duration_secs: f64,
    /// Bitrate in bits per second.
    pub bitrate: Option<u32>,
    /// Sample rate in hertz.
    pub sample_rate: Option<u32>,
    /// Channel count.
    pub channels: Option<u8>,
    /// Codec name.
    pub codec: Option<String>,
    /// Track title tag.
    pub title: Option<String>,
    /// Artist tag.
    pub artist: Option<String>,
    /// Album tag.
    pub album: Option<String>,
    /// Release year tag.
    pub year: Option<i32>,
    /// Genre tag.
    pub genre: Option<String>,
    /// Track number tag.
    pub track: Option<u32>,
}

/// Document metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentMetadata {
    /// Number of pages.
    pub page_count: Option<u32>,
    /// Number of words.
    pub word_count: Option<u64>,
    /// Number of characters.
    pub char_count: Option<u64>,
    /// Author.
    pub author: Option<String>,
    /// Title.
    pub title: Option<String>,
    /// Subject.
    pub subject: Option<String>,
    /// Detected language code.
    pub language: Option<String>,
}

/// Source code metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodeMetadata {
    /// Programming language.
    pub language: String,
    /// Total line count.
    pub total_lines: u32,
    /// Lines containing code.
    pub code_lines: u32,
    /// Lines containing only comments.
    pub comment_lines: u32,
    /// Blank lines.
    pub blank_lines: u32,
    /// Cyclomatic complexity estimate.
    pub complexity: Option<f64>,
}

/// Archive metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArchiveMetadata {
    /// Archive format (e.g. `zip`, `tar.gz`).
    pub format: String,
    /// Uncompressed size divided by compressed size.
    pub compression_ratio: Option<f64>,
    /// Number of entries.
    pub entry_count: u32,
    /// Whether any entry is encrypted.
    pub encrypted: bool,
}

/// Office document facet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OfficeMetadata {
    /// Producing application.
    pub application: Option<String>,
    /// Author.
    pub author: Option<String>,
    /// Last author to modify the document.
    pub last_modified_by: Option<String>,
    /// Company property.
    pub company: Option<String>,
    /// Title property.
    pub title: Option<String>,
    /// Revision number.
    pub revision: Option<u32>,
    /// Page count (word processors).
    pub page_count: Option<u32>,
    /// Slide count (presentations).
    pub slide_count: Option<u32>,
    /// Sheet count (spreadsheets).
    pub sheet_count: Option<u32>,
}

/// Font facet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FontMetadata {
    /// Family name.
    pub family: Option<String>,
    /// Subfamily (style) name.
    pub subfamily: Option<String>,
    /// Full font name.
    pub full_name: Option<String>,
    /// Version string.
    pub version: Option<String>,
    /// Designer.
    pub designer: Option<String>,
    /// Number of glyphs.
    pub glyph_count: Option<u32>,
    /// Font format (`ttf`, `otf`, `woff2`).
    pub format: Option<String>,
}

/// Category-specific metadata, one variant per primary category that has one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryMetadata {
    /// Image metadata.
    Image(ImageMetadata),
    /// Video metadata.
    Video(VideoMetadata),
    /// Audio metadata.
    Audio(AudioMetadata),
    /// Document metadata.
    Document(DocumentMetadata),
    /// Code metadata.
    Code(CodeMetadata),
    /// Archive metadata.
    Archive(ArchiveMetadata),
}

impl CategoryMetadata {
    /// Returns the category this variant belongs to.
    #[must_use]
    pub const fn category(&self) -> Category {
        match self {
            Self::Image(_) => Category::Image,
            Self::Video(_) => Category::Video,
            Self::Audio(_) => Category::Audio,
            Self::Document(_) => Category::Document,
            Self::Code(_) => Category::Code,
            Self::Archive(_) => Category::Archive,
        }
    }
}

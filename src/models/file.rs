//! File records and identifiers.

use super::{CategoryMetadata, FontMetadata, OfficeMetadata};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

/// Current logical schema version stamped on stored records.
pub const SCHEMA_VERSION: u32 = 1;

/// Backend-assigned identity of a stored file record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(i64);

impl FileId {
    /// Creates a file ID from its raw value.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Primary file category.
///
/// The set is closed: unknown stored values deserialize as [`Category::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Raster and vector images.
    Image,
    /// Video containers.
    Video,
    /// Audio files.
    Audio,
    /// Text-like documents (PDF, plain text, markdown).
    Document,
    /// Source code.
    Code,
    /// Compressed archives.
    Archive,
    /// Font files.
    Font,
    /// Office suite documents.
    Office,
    /// Anything else.
    #[default]
    #[serde(other)]
    Other,
}

impl Category {
    /// Returns all category variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Image,
            Self::Video,
            Self::Audio,
            Self::Document,
            Self::Code,
            Self::Archive,
            Self::Font,
            Self::Office,
            Self::Other,
        ]
    }

    /// Returns the category as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Code => "code",
            Self::Archive => "archive",
            Self::Font => "font",
            Self::Office => "office",
            Self::Other => "other",
        }
    }

    /// Parses a category from a string, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "document" => Some(Self::Document),
            "code" => Some(Self::Code),
            "archive" => Some(Self::Archive),
            "font" => Some(Self::Font),
            "office" => Some(Self::Office),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Type discriminator of a relationship edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipKind {
    /// Visually or textually similar.
    SimilarTo,
    /// Requires the target to function (imports, includes).
    DependsOn,
    /// Byte-identical copy of the target.
    DuplicateOf,
    /// Produced from the target (thumbnail, export, transcode).
    DerivedFrom,
    /// Physically contains the target (archive entries).
    Contains,
}

impl RelationshipKind {
    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SimilarTo => "similar-to",
            Self::DependsOn => "depends-on",
            Self::DuplicateOf => "duplicate-of",
            Self::DerivedFrom => "derived-from",
            Self::Contains => "contains",
        }
    }

    /// Parses a relationship kind.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "similar-to" => Some(Self::SimilarTo),
            "depends-on" => Some(Self::DependsOn),
            "duplicate-of" => Some(Self::DuplicateOf),
            "derived-from" => Some(Self::DerivedFrom),
            "contains" => Some(Self::Contains),
            _ => None,
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directed, typed edge from the owning record to another record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    /// Path of the target record.
    pub target: String,
    /// Edge type.
    pub kind: RelationshipKind,
    /// Optional strength of the relation (0.0 to 1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl Relationship {
    /// Creates an unweighted relationship.
    #[must_use]
    pub fn new(target: impl Into<String>, kind: RelationshipKind) -> Self {
        Self {
            target: target.into(),
            kind,
            weight: None,
        }
    }

    /// Sets the weight.
    #[must_use]
    pub const fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }
}

/// The primary cataloged entity for one physical file.
///
/// `path` is the identity: re-submitting a record with the same path updates
/// the stored record in place.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Absolute path (unique key).
    pub path: String,
    /// Display name (file name component).
    pub name: String,
    /// Extension without the leading dot; empty when absent.
    pub extension: String,
    /// Size in bytes.
    pub size: u64,
    /// Creation time (Unix epoch milliseconds).
    pub created_at: i64,
    /// Last modification time (Unix epoch milliseconds).
    pub modified_at: i64,
    /// Last access time (Unix epoch milliseconds).
    pub accessed_at: i64,
    /// Detected MIME type.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Primary category.
    #[serde(default)]
    pub category: Category,
    /// Fast non-cryptographic content hash.
    #[serde(default)]
    pub fast_hash: Option<String>,
    /// Strong content hash, used for exact duplicate detection.
    #[serde(default)]
    pub strong_hash: Option<String>,
    /// When the record was produced (Unix epoch milliseconds).
    #[serde(default)]
    pub processed_at: i64,
    /// How long extraction took, in milliseconds.
    #[serde(default)]
    pub processing_duration_ms: u64,
    /// Logical schema version of the record.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Free-text content extracted from the file, indexed for search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Category-specific metadata; its variant must match `category`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CategoryMetadata>,
    /// Office document facet, independent of `category`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub office: Option<OfficeMetadata>,
    /// Font facet, independent of `category`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<FontMetadata>,
    /// Opaque EXIF payload (image records only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exif: Option<serde_json::Value>,
    /// Labels; replaced wholesale on every upsert.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Outgoing relationships; replaced wholesale on every upsert.
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

const fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl FileRecord {
    /// Creates a record for `path`, deriving name and extension from it.
    #[must_use]
    pub fn new(path: impl Into<String>, category: Category) -> Self {
        let path = path.into();
        let file_path = std::path::Path::new(&path);
        let name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = file_path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        Self {
            path,
            name,
            extension,
            category,
            schema_version: SCHEMA_VERSION,
            ..Default::default()
        }
    }

    /// Sets the size.
    #[must_use]
    pub const fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Sets the strong hash.
    #[must_use]
    pub fn with_strong_hash(mut self, hash: impl Into<String>) -> Self {
        self.strong_hash = Some(hash.into());
        self
    }

    /// Sets the category metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: CategoryMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Sets the tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the perceptual fingerprint, if this is an image that carries one.
    #[must_use]
    pub fn perceptual_hash(&self) -> Option<&str> {
        match &self.metadata {
            Some(CategoryMetadata::Image(image)) => image.perceptual_hash.as_deref(),
            _ => None,
        }
    }
}

/// Normalizes a tag list: trims, drops empties, removes duplicates keeping
/// the first occurrence.
#[must_use]
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::with_capacity(tags.len());
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(*t))
        .map(str::to_string)
        .collect()
}

/// Normalizes a relationship list: one edge per `(target, kind)`, kept at the
/// position of its first occurrence, carrying the weight of its last.
#[must_use]
pub fn normalize_relationships(relationships: &[Relationship]) -> Vec<Relationship> {
    let mut positions: HashMap<(&str, RelationshipKind), usize> =
        HashMap::with_capacity(relationships.len());
    let mut edges: Vec<Relationship> = Vec::with_capacity(relationships.len());
    for relationship in relationships {
        match positions.entry((relationship.target.as_str(), relationship.kind)) {
            Entry::Occupied(slot) => edges[*slot.get()].weight = relationship.weight,
            Entry::Vacant(slot) => {
                slot.insert(edges.len());
                edges.push(relationship.clone());
            }
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImageMetadata;

    #[test]
    fn test_new_derives_name_and_extension() {
        let record = FileRecord::new("/photos/2024/Beach.JPG", Category::Image);
        assert_eq!(record.name, "Beach.JPG");
        assert_eq!(record.extension, "jpg");
        assert_eq!(record.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_new_without_extension() {
        let record = FileRecord::new("/usr/bin/make", Category::Other);
        assert_eq!(record.name, "make");
        assert_eq!(record.extension, "");
    }

    #[test]
    fn test_category_parse_roundtrip() {
        for category in Category::all() {
            assert_eq!(Category::parse(category.as_str()), Some(*category));
        }
        assert_eq!(Category::parse("IMAGE"), Some(Category::Image));
        assert_eq!(Category::parse("spreadsheet"), None);
    }

    #[test]
    fn test_unknown_category_deserializes_as_other() {
        let category: Category = serde_json::from_str("\"hologram\"").unwrap();
        assert_eq!(category, Category::Other);
    }

    #[test]
    fn test_normalize_tags() {
        let tags = vec![
            " vacation ".to_string(),
            String::new(),
            "family".to_string(),
            "vacation".to_string(),
        ];
        assert_eq!(normalize_tags(&tags), vec!["vacation", "family"]);
    }

    #[test]
    fn test_perceptual_hash_only_for_images() {
        let image = FileRecord::new("/a.png", Category::Image).with_metadata(
            CategoryMetadata::Image(ImageMetadata {
                perceptual_hash: Some("ffff0000ffff0000".to_string()),
                ..Default::default()
            }),
        );
        assert_eq!(image.perceptual_hash(), Some("ffff0000ffff0000"));

        let other = FileRecord::new("/a.txt", Category::Document);
        assert_eq!(other.perceptual_hash(), None);
    }

    #[test]
    fn test_relationship_kind_serde() {
        let rel = Relationship::new("/b.rs", RelationshipKind::DependsOn);
        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(json["kind"], "depends-on");
        assert!(json.get("weight").is_none());
    }

    #[test]
    fn test_normalize_relationships_merges_same_target_and_kind() {
        let edges = vec![
            Relationship::new("/b.txt", RelationshipKind::SimilarTo).with_weight(0.1),
            Relationship::new("/c.txt", RelationshipKind::DependsOn),
            Relationship::new("/b.txt", RelationshipKind::SimilarTo).with_weight(0.9),
            Relationship::new("/b.txt", RelationshipKind::DerivedFrom),
        ];
        assert_eq!(
            normalize_relationships(&edges),
            vec![
                Relationship::new("/b.txt", RelationshipKind::SimilarTo).with_weight(0.9),
                Relationship::new("/c.txt", RelationshipKind::DependsOn),
                Relationship::new("/b.txt", RelationshipKind::DerivedFrom),
            ]
        );
    }
}

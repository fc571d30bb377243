//! Category metadata router.
//!
//! A record carries at most one primary metadata variant (selected by its
//! category) and, independently, optional office and font facets. The router
//! turns those into a list of [`SlotPayload`]s keyed by [`MetadataSlot`] and
//! back again. Both backends call it, so the variant dispatch exists once:
//! the relational backend writes each payload into the slot's side table,
//! the document backend nests it under the slot's key.
//!
//! Decoding is forgiving. A payload that no longer parses is logged and
//! omitted; the surrounding record still loads.

use super::schema::{self, TableSpec};
use crate::models::{
    ArchiveMetadata, AudioMetadata, Category, CategoryMetadata, CodeMetadata, DocumentMetadata,
    FileRecord, FontMetadata, ImageMetadata, OfficeMetadata, VideoMetadata,
};
use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;

/// A field-name to value map for one slot.
pub type Fields = Map<String, Value>;

/// One metadata destination: a primary variant or a secondary facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataSlot {
    /// Image variant.
    Image,
    /// Video variant.
    Video,
    /// Audio variant.
    Audio,
    /// Document variant.
    Document,
    /// Code variant.
    Code,
    /// Archive variant.
    Archive,
    /// Office facet.
    Office,
    /// Font facet.
    Font,
}

impl MetadataSlot {
    /// Every slot, in side-table order.
    pub const ALL: [Self; 8] = [
        Self::Image,
        Self::Video,
        Self::Audio,
        Self::Document,
        Self::Code,
        Self::Archive,
        Self::Office,
        Self::Font,
    ];

    /// Key under which the document backend nests this slot.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Code => "code",
            Self::Archive => "archive",
            Self::Office => "office",
            Self::Font => "font",
        }
    }

    /// Parses a slot key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.key() == key)
    }

    /// Side table backing this slot in the relational store.
    #[must_use]
    pub const fn table(self) -> &'static TableSpec {
        match self {
            Self::Image => &schema::IMAGE_TABLE,
            Self::Video => &schema::VIDEO_TABLE,
            Self::Audio => &schema::AUDIO_TABLE,
            Self::Document => &schema::DOCUMENT_TABLE,
            Self::Code => &schema::CODE_TABLE,
            Self::Archive => &schema::ARCHIVE_TABLE,
            Self::Office => &schema::OFFICE_TABLE,
            Self::Font => &schema::FONT_TABLE,
        }
    }

    /// Returns true for the office and font facets.
    #[must_use]
    pub const fn is_secondary(self) -> bool {
        matches!(self, Self::Office | Self::Font)
    }

    /// Serializes this slot's part of `record`, if the record carries it.
    fn encode(self, record: &FileRecord) -> Option<Result<Fields>> {
        match (self, &record.metadata) {
            (Self::Image, Some(CategoryMetadata::Image(m))) => Some(to_fields(self, m)),
            (Self::Video, Some(CategoryMetadata::Video(m))) => Some(to_fields(self, m)),
            (Self::Audio, Some(CategoryMetadata::Audio(m))) => Some(to_fields(self, m)),
            (Self::Document, Some(CategoryMetadata::Document(m))) => Some(to_fields(self, m)),
            (Self::Code, Some(CategoryMetadata::Code(m))) => Some(to_fields(self, m)),
            (Self::Archive, Some(CategoryMetadata::Archive(m))) => Some(to_fields(self, m)),
            (Self::Office, _) => record.office.as_ref().map(|m| to_fields(self, m)),
            (Self::Font, _) => record.font.as_ref().map(|m| to_fields(self, m)),
            _ => None,
        }
    }

    /// Parses `fields` and attaches the result to `out`.
    fn decode(self, fields: Fields, out: &mut Attachments) -> Result<()> {
        match self {
            Self::Image => {
                out.metadata = Some(CategoryMetadata::Image(from_fields::<ImageMetadata>(
                    self, fields,
                )?));
            },
            Self::Video => {
                out.metadata = Some(CategoryMetadata::Video(from_fields::<VideoMetadata>(
                    self, fields,
                )?));
            },
            Self::Audio => {
                out.metadata = Some(CategoryMetadata::Audio(from_fields::<AudioMetadata>(
                    self, fields,
                )?));
            },
            Self::Document => {
                out.metadata = Some(CategoryMetadata::Document(
                    from_fields::<DocumentMetadata>(self, fields)?,
                ));
            },
            Self::Code => {
                out.metadata = Some(CategoryMetadata::Code(from_fields::<CodeMetadata>(
                    self, fields,
                )?));
            },
            Self::Archive => {
                out.metadata = Some(CategoryMetadata::Archive(
                    from_fields::<ArchiveMetadata>(self, fields)?,
                ));
            },
            Self::Office => out.office = Some(from_fields::<OfficeMetadata>(self, fields)?),
            Self::Font => out.font = Some(from_fields::<FontMetadata>(self, fields)?),
        }
        Ok(())
    }
}

impl fmt::Display for MetadataSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// The encoded fields of one slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotPayload {
    /// Destination slot.
    pub slot: MetadataSlot,
    /// Field values keyed by field name.
    pub fields: Fields,
}

/// Metadata reassembled from slot payloads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attachments {
    /// Primary variant.
    pub metadata: Option<CategoryMetadata>,
    /// Office facet.
    pub office: Option<OfficeMetadata>,
    /// Font facet.
    pub font: Option<FontMetadata>,
}

impl Attachments {
    /// Moves the attachments onto `record`.
    pub fn apply_to(self, record: &mut FileRecord) {
        record.metadata = self.metadata;
        record.office = self.office;
        record.font = self.font;
    }
}

/// Returns the primary slot of a category; `None` when it has no variant.
#[must_use]
pub const fn primary_slot(category: Category) -> Option<MetadataSlot> {
    match category {
        Category::Image => Some(MetadataSlot::Image),
        Category::Video => Some(MetadataSlot::Video),
        Category::Audio => Some(MetadataSlot::Audio),
        Category::Document => Some(MetadataSlot::Document),
        Category::Code => Some(MetadataSlot::Code),
        Category::Archive => Some(MetadataSlot::Archive),
        Category::Font | Category::Office | Category::Other => None,
    }
}

/// Checks that a record's metadata agrees with its category.
///
/// # Errors
///
/// Returns [`Error::ConstraintViolation`] if the metadata variant belongs to a
/// different category, or if a non-image record carries an EXIF payload.
pub fn validate(record: &FileRecord) -> Result<()> {
    if let Some(metadata) = &record.metadata {
        let variant = metadata.category();
        if variant != record.category {
            return Err(Error::ConstraintViolation(format!(
                "{} metadata on {} record '{}'",
                variant, record.category, record.path
            )));
        }
    }
    if record.exif.is_some() && record.category != Category::Image {
        return Err(Error::ConstraintViolation(format!(
            "exif payload on {} record '{}'",
            record.category, record.path
        )));
    }
    Ok(())
}

/// Splits a record's metadata into slot payloads.
///
/// Slots absent from the result carry nothing for this record; backends
/// remove any stale payload they hold for those slots.
///
/// # Errors
///
/// Returns an error if the record fails [`validate`] or a payload cannot be
/// serialized.
pub fn split(record: &FileRecord) -> Result<Vec<SlotPayload>> {
    validate(record)?;
    MetadataSlot::ALL
        .into_iter()
        .filter_map(|slot| {
            slot.encode(record)
                .map(|fields| fields.map(|fields| SlotPayload { slot, fields }))
        })
        .collect()
}

/// Rebuilds metadata for a record of `category` from stored payloads.
///
/// Only the category's own primary slot is decoded; payloads for other
/// primary slots are ignored. Payloads that fail to parse are logged and
/// left out.
pub fn assemble(
    category: Category,
    path: &str,
    payloads: impl IntoIterator<Item = SlotPayload>,
) -> Attachments {
    let primary = primary_slot(category);
    let mut out = Attachments::default();
    for SlotPayload { slot, fields } in payloads {
        if !slot.is_secondary() && Some(slot) != primary {
            tracing::debug!(path, slot = slot.key(), "Ignoring metadata for another category");
            continue;
        }
        if let Err(e) = slot.decode(fields, &mut out) {
            tracing::warn!(path, slot = slot.key(), error = %e, "Dropping malformed metadata");
        }
    }
    out
}

fn to_fields<T: Serialize>(slot: MetadataSlot, value: &T) -> Result<Fields> {
    match serde_json::to_value(value) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(Error::ConstraintViolation(format!(
            "{slot} metadata serialized to non-object {other}"
        ))),
        Err(e) => Err(Error::ConstraintViolation(format!(
            "{slot} metadata not serializable: {e}"
        ))),
    }
}

fn from_fields<T: DeserializeOwned>(slot: MetadataSlot, fields: Fields) -> Result<T> {
    serde_json::from_value(Value::Object(fields)).map_err(|e| Error::MalformedPayload {
        field: slot.key().to_string(),
        cause: e.to_string(),
    })
}

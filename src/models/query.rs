//! Query types: filters, sorting, and pagination.

use super::{Category, FileRecord};

/// Timestamp field a date range applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateField {
    /// Creation time.
    Created,
    /// Last modification time (default).
    #[default]
    Modified,
    /// Last access time.
    Accessed,
    /// Processing time.
    Processed,
}

impl DateField {
    /// Returns the field value of a record.
    #[must_use]
    pub const fn value_of(&self, record: &FileRecord) -> i64 {
        match self {
            Self::Created => record.created_at,
            Self::Modified => record.modified_at,
            Self::Accessed => record.accessed_at,
            Self::Processed => record.processed_at,
        }
    }
}

/// Inclusive range over a timestamp field; either bound may be omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    /// Field the range applies to.
    pub field: DateField,
    /// Inclusive lower bound (Unix epoch milliseconds).
    pub from: Option<i64>,
    /// Inclusive upper bound (Unix epoch milliseconds).
    pub to: Option<i64>,
}

/// Inclusive size range in bytes; either bound may be omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizeRange {
    /// Inclusive lower bound.
    pub min: Option<u64>,
    /// Inclusive upper bound.
    pub max: Option<u64>,
}

/// Exact match of a JSON value at a dot-addressed field path.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch {
    /// Dot path into the record (e.g. `metadata.image.width`).
    pub path: String,
    /// Expected value.
    pub value: serde_json::Value,
}

/// Filter criteria for catalog queries.
///
/// All predicates are combined with AND; `tags` matches a record carrying
/// any one of the listed tags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileFilter {
    /// Exact category.
    pub category: Option<Category>,
    /// Exact extension.
    pub extension: Option<String>,
    /// Size range.
    pub size: SizeRange,
    /// Any-of tag set.
    pub tags: Vec<String>,
    /// Date range.
    pub date: Option<DateRange>,
    /// Case-insensitive substring over name, path, tags, and content.
    pub text: Option<String>,
    /// Exact field-path matches.
    pub fields: Vec<FieldMatch>,
}

impl FileFilter {
    /// Creates an empty filter (matches all).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a category filter.
    #[must_use]
    pub const fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Adds an extension filter.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Sets the inclusive size bounds.
    #[must_use]
    pub const fn with_size_range(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.size = SizeRange { min, max };
        self
    }

    /// Adds a tag to the any-of tag set.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Sets the date range.
    #[must_use]
    pub const fn with_date_range(
        mut self,
        field: DateField,
        from: Option<i64>,
        to: Option<i64>,
    ) -> Self {
        self.date = Some(DateRange { field, from, to });
        self
    }

    /// Sets the free-text search term.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Adds an exact field-path match.
    #[must_use]
    pub fn with_field(mut self, path: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.push(FieldMatch {
            path: path.into(),
            value,
        });
        self
    }

    /// Returns true if the filter is empty (matches all).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.extension.is_none()
            && self.size == SizeRange::default()
            && self.tags.is_empty()
            && self.date.is_none()
            && self.text.as_deref().is_none_or(str::is_empty)
            && self.fields.is_empty()
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// Sort key: a dot-addressed field path plus direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    /// Dot path into the record (e.g. `size`, `metadata.image.width`).
    pub field: String,
    /// Direction.
    pub direction: SortDirection,
}

impl SortSpec {
    /// Ascending sort on `field`.
    #[must_use]
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Descending sort on `field`.
    #[must_use]
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// 1-indexed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Page number, starting at 1.
    pub page: usize,
    /// Items per page.
    pub page_size: usize,
}

impl Pagination {
    /// Creates a page request.
    #[must_use]
    pub const fn new(page: usize, page_size: usize) -> Self {
        Self { page, page_size }
    }
}

/// A complete query: filter, optional sort, optional page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    /// Filter criteria.
    pub filter: FileFilter,
    /// Sort key.
    pub sort: Option<SortSpec>,
    /// Page request; `None` returns everything.
    pub page: Option<Pagination>,
}

impl QuerySpec {
    /// Creates a query for the given filter.
    #[must_use]
    pub fn new(filter: FileFilter) -> Self {
        Self {
            filter,
            sort: None,
            page: None,
        }
    }

    /// Sets the sort key.
    #[must_use]
    pub fn sorted_by(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Sets the page request.
    #[must_use]
    pub const fn paginated(mut self, page: usize, page_size: usize) -> Self {
        self.page = Some(Pagination::new(page, page_size));
        self
    }
}

/// Result of a catalog query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Records on the requested page.
    pub items: Vec<FileRecord>,
    /// Number of matches before pagination.
    pub total: usize,
    /// `ceil(total / page_size)`.
    pub total_pages: usize,
    /// Page number that was served.
    pub page: usize,
    /// Page size that was applied (`total` when unpaginated).
    pub page_size: usize,
}

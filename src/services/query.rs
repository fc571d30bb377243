//! Backend-agnostic filtering, sorting, and pagination.
//!
//! Both storage backends hand their candidate records to the same code so a
//! query yields the same answer regardless of where the records live. The
//! relational backend pushes most predicates down into SQL; whatever it
//! cannot express (field-path matches) is finished here.

use crate::models::{
    FieldMatch, FileFilter, FileRecord, Pagination, QueryResult, QuerySpec, SortDirection, SortSpec,
};
use crate::storage::schema::resolve_field_path;
use crate::{Error, Result};
use serde_json::Value;
use std::cmp::Ordering;

/// Case-insensitive substring test shared by every text predicate.
///
/// An empty needle matches everything.
#[must_use]
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Stateless query evaluation over in-memory records.
///
/// # Example
///
/// ```rust
/// use metacat::{Category, FileFilter, FileRecord, QueryEngine, QuerySpec, SortSpec};
///
/// let records = vec![
///     FileRecord::new("/b.jpg", Category::Image).with_size(20),
///     FileRecord::new("/a.jpg", Category::Image).with_size(10),
///     FileRecord::new("/c.rs", Category::Code).with_size(5),
/// ];
/// let spec = QuerySpec::new(FileFilter::new().with_category(Category::Image))
///     .sorted_by(SortSpec::ascending("size"))
///     .paginated(1, 1);
///
/// let result = QueryEngine::execute(records, &spec)?;
/// assert_eq!(result.total, 2);
/// assert_eq!(result.total_pages, 2);
/// assert_eq!(result.items[0].path, "/a.jpg");
/// # Ok::<(), metacat::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryEngine;

impl QueryEngine {
    /// Returns true if `record` satisfies every predicate of `filter`.
    #[must_use]
    pub fn matches(filter: &FileFilter, record: &FileRecord) -> bool {
        if filter.category.is_some_and(|c| c != record.category) {
            return false;
        }
        if filter
            .extension
            .as_deref()
            .is_some_and(|e| e != record.extension)
        {
            return false;
        }
        if filter.size.min.is_some_and(|min| record.size < min)
            || filter.size.max.is_some_and(|max| record.size > max)
        {
            return false;
        }
        if !filter.tags.is_empty() && !record.tags.iter().any(|t| filter.tags.contains(t)) {
            return false;
        }
        if let Some(range) = filter.date {
            let value = range.field.value_of(record);
            if range.from.is_some_and(|from| value < from) || range.to.is_some_and(|to| value > to)
            {
                return false;
            }
        }
        if let Some(text) = filter.text.as_deref().filter(|t| !t.is_empty())
            && !Self::matches_text(text, record)
        {
            return false;
        }
        Self::matches_fields(&filter.fields, record)
    }

    /// Returns true if every field-path predicate holds for `record`.
    ///
    /// Paths that resolve to nothing never match.
    #[must_use]
    pub fn matches_fields(fields: &[FieldMatch], record: &FileRecord) -> bool {
        if fields.is_empty() {
            return true;
        }
        let Ok(document) = serde_json::to_value(record) else {
            return false;
        };
        fields.iter().all(|field| {
            lookup(&document, &field.path).is_some_and(|value| values_equal(value, &field.value))
        })
    }

    fn matches_text(text: &str, record: &FileRecord) -> bool {
        contains_ignore_case(&record.name, text)
            || contains_ignore_case(&record.path, text)
            || record.tags.iter().any(|t| contains_ignore_case(t, text))
            || record
                .content
                .as_deref()
                .is_some_and(|c| contains_ignore_case(c, text))
    }

    /// Stable sort by a field path.
    ///
    /// Strings compare case-insensitively. Absent and null values go last in
    /// both directions, and an unknown path leaves the order unchanged.
    pub fn sort(records: &mut Vec<FileRecord>, sort: &SortSpec) {
        let path = sort.field.as_str();
        let mut keyed: Vec<(Option<SortKey>, FileRecord)> = records
            .drain(..)
            .map(|record| (SortKey::of(&record, path), record))
            .collect();

        keyed.sort_by(|(a, _), (b, _)| match (a, b) {
            (Some(a), Some(b)) => match sort.direction {
                SortDirection::Ascending => a.cmp(b),
                SortDirection::Descending => b.cmp(a),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        records.extend(keyed.into_iter().map(|(_, record)| record));
    }

    /// Slices one page out of already filtered and sorted records.
    ///
    /// Page numbers below 1 are served as page 1; a page past the end is
    /// empty. Without a page request everything is returned as one page.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the page size is zero.
    pub fn paginate(records: Vec<FileRecord>, page: Option<Pagination>) -> Result<QueryResult> {
        let total = records.len();
        let Some(page) = page else {
            return Ok(QueryResult {
                items: records,
                total,
                total_pages: usize::from(total > 0),
                page: 1,
                page_size: total,
            });
        };

        if page.page_size == 0 {
            return Err(Error::InvalidInput(
                "page size must be greater than zero".to_string(),
            ));
        }
        let number = page.page.max(1);
        let start = (number - 1).saturating_mul(page.page_size);
        let items = records
            .into_iter()
            .skip(start)
            .take(page.page_size)
            .collect();

        Ok(QueryResult {
            items,
            total,
            total_pages: total.div_ceil(page.page_size),
            page: number,
            page_size: page.page_size,
        })
    }

    /// Sorts and paginates records that already satisfy the filter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the page size is zero.
    pub fn finish(mut records: Vec<FileRecord>, spec: &QuerySpec) -> Result<QueryResult> {
        if let Some(sort) = &spec.sort {
            Self::sort(&mut records, sort);
        }
        Self::paginate(records, spec.page)
    }

    /// Filters, sorts, and paginates an arbitrary record set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the page size is zero.
    pub fn execute(records: Vec<FileRecord>, spec: &QuerySpec) -> Result<QueryResult> {
        let matching = records
            .into_iter()
            .filter(|r| Self::matches(&spec.filter, r))
            .collect();
        Self::finish(matching, spec)
    }
}

/// Resolves a dot path (field or column spelling) inside a JSON document.
fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    let resolved = resolve_field_path(path);
    resolved
        .split('.')
        .try_fold(document, |value, segment| match value {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
        .filter(|v| !v.is_null())
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .zip(b.as_f64())
            .is_some_and(|(a, b)| a.total_cmp(&b) == Ordering::Equal),
        _ => actual == expected,
    }
}

/// Comparable projection of a JSON value.
#[derive(Debug)]
enum SortKey {
    Bool(bool),
    Number(f64),
    Text(String),
    Other(String),
}

impl SortKey {
    fn of(record: &FileRecord, path: &str) -> Option<Self> {
        let document = serde_json::to_value(record).ok()?;
        Some(match lookup(&document, path)? {
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.as_f64()?),
            Value::String(s) => Self::Text(s.to_lowercase()),
            other => Self::Other(other.to_string()),
        })
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Number(_) => 1,
            Self::Text(_) => 2,
            Self::Other(_) => 3,
        }
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) | (Self::Other(a), Self::Other(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey {}

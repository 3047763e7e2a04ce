//! Search filters and pagination for task listings.

use super::codes::normalize_code;
use super::{CODE_SEPARATOR, ClosedTask, OpenTask, ReviewDomainError};
use crate::roster::domain::ReviewerId;
use std::collections::BTreeSet;

/// Criteria for listing open or closed tasks.
///
/// All set criteria must match. Codes match as a superset: every requested
/// code must be a key of the task's code map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    codes: BTreeSet<String>,
    author_id: Option<ReviewerId>,
    reviewer_id: Option<ReviewerId>,
    company: Option<String>,
}

impl TaskFilter {
    /// Creates a filter that matches every task.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires every code in a `+`-separated list such as `"A1+B2"`.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewDomainError::InvalidProjectCode`] for an empty segment.
    pub fn with_code_list(mut self, list: &str) -> Result<Self, ReviewDomainError> {
        for segment in list.split(CODE_SEPARATOR) {
            self.codes.insert(normalize_code(segment.to_owned())?);
        }
        Ok(self)
    }

    /// Requires every code of an iterator.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewDomainError::InvalidProjectCode`] for an invalid code.
    pub fn with_codes<I, S>(mut self, codes: I) -> Result<Self, ReviewDomainError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for code in codes {
            self.codes.insert(normalize_code(code.into())?);
        }
        Ok(self)
    }

    /// Restricts results to one author.
    #[must_use]
    pub fn with_author(mut self, author_id: ReviewerId) -> Self {
        self.author_id = Some(author_id);
        self
    }

    /// Restricts results to one reviewer.
    #[must_use]
    pub fn with_reviewer(mut self, reviewer_id: ReviewerId) -> Self {
        self.reviewer_id = Some(reviewer_id);
        self
    }

    /// Restricts results to companies containing `fragment`, ignoring case.
    ///
    /// Only closed task searches honour this criterion.
    #[must_use]
    pub fn with_company(mut self, fragment: impl Into<String>) -> Self {
        self.company = Some(fragment.into());
        self
    }

    /// Returns the required codes.
    #[must_use]
    pub const fn codes(&self) -> &BTreeSet<String> {
        &self.codes
    }

    /// Returns the author criterion.
    #[must_use]
    pub const fn author_id(&self) -> Option<&ReviewerId> {
        self.author_id.as_ref()
    }

    /// Returns the reviewer criterion.
    #[must_use]
    pub const fn reviewer_id(&self) -> Option<&ReviewerId> {
        self.reviewer_id.as_ref()
    }

    /// Returns the company fragment criterion.
    #[must_use]
    pub fn company(&self) -> Option<&str> {
        self.company.as_deref()
    }

    /// Returns `true` when an open task satisfies the filter.
    #[must_use]
    pub fn matches_open(&self, task: &OpenTask) -> bool {
        task.codes().contains_all(&self.codes)
            && self.author_id.as_ref().is_none_or(|id| id == task.author_id())
            && self
                .reviewer_id
                .as_ref()
                .is_none_or(|id| Some(id) == task.reviewer_id())
    }

    /// Returns `true` when a closed task satisfies the filter.
    #[must_use]
    pub fn matches_closed(&self, task: &ClosedTask) -> bool {
        task.codes().contains_all(&self.codes)
            && self.author_id.as_ref().is_none_or(|id| id == task.author_id())
            && self.reviewer_id.as_ref().is_none_or(|id| id == task.reviewer_id())
            && self.company.as_deref().is_none_or(|fragment| {
                task.company()
                    .to_lowercase()
                    .contains(&fragment.to_lowercase())
            })
    }
}

/// One-based pagination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page_index: u32,
    page_size: u32,
}

impl PageRequest {
    /// Default number of rows per page.
    pub const DEFAULT_PAGE_SIZE: u32 = 10;

    /// Creates a validated page request.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewDomainError::InvalidPageRequest`] when either value is
    /// zero.
    pub const fn new(page_index: u32, page_size: u32) -> Result<Self, ReviewDomainError> {
        if page_index == 0 || page_size == 0 {
            return Err(ReviewDomainError::InvalidPageRequest {
                page_index,
                page_size,
            });
        }
        Ok(Self {
            page_index,
            page_size,
        })
    }

    /// Requests every row on a single page.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            page_index: 1,
            page_size: u32::MAX,
        }
    }

    /// Returns the 1-based page index.
    #[must_use]
    pub const fn page_index(self) -> u32 {
        self.page_index
    }

    /// Returns the page size.
    #[must_use]
    pub const fn page_size(self) -> u32 {
        self.page_size
    }

    /// Returns the number of rows preceding this page.
    #[must_use]
    pub fn offset(self) -> u64 {
        u64::from(self.page_index - 1) * u64::from(self.page_size)
    }

    /// Returns the slice of `rows` covered by this page.
    #[must_use]
    pub fn apply<T>(self, rows: Vec<T>) -> Vec<T> {
        let skip = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(self.page_size).unwrap_or(usize::MAX);
        rows.into_iter().skip(skip).take(take).collect()
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page_index: 1,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of results together with the unpaginated total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Rows on this page.
    pub rows: Vec<T>,
    /// Number of matching rows across all pages.
    pub total: u64,
}

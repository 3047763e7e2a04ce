//! Project code sets and page counts.

use super::ReviewDomainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Separator used when several project codes are written as one string.
pub const CODE_SEPARATOR: char = '+';

/// Non-empty map of project code to project title.
///
/// Iteration order is the sorted code order, which is also the order used to
/// derive the open task fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct ProjectCodes(BTreeMap<String, String>);

impl ProjectCodes {
    /// Creates a validated code map.
    ///
    /// Codes and titles are trimmed. A repeated code keeps the last title.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewDomainError::EmptyProjectCodes`] when no entries are
    /// given and [`ReviewDomainError::InvalidProjectCode`] when a code is
    /// empty or contains the separator.
    pub fn new<I, K, V>(entries: I) -> Result<Self, ReviewDomainError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (raw_code, raw_title) in entries {
            let code = normalize_code(raw_code.into())?;
            map.insert(code, raw_title.into().trim().to_owned());
        }
        if map.is_empty() {
            return Err(ReviewDomainError::EmptyProjectCodes);
        }
        Ok(Self(map))
    }

    /// Returns the codes in sorted order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns the title recorded for `code`.
    #[must_use]
    pub fn title(&self, code: &str) -> Option<&str> {
        self.0.get(code).map(String::as_str)
    }

    /// Returns the number of codes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when the map holds no codes. Never true for a value
    /// built through [`Self::new`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` when every requested code is a key of this map.
    #[must_use]
    pub fn contains_all<'a>(&self, requested: impl IntoIterator<Item = &'a String>) -> bool {
        requested.into_iter().all(|code| self.0.contains_key(code))
    }

    /// Returns the sorted codes joined by the separator.
    #[must_use]
    pub fn joined(&self) -> String {
        let mut out = String::new();
        for (index, code) in self.codes().enumerate() {
            if index > 0 {
                out.push(CODE_SEPARATOR);
            }
            out.push_str(code);
        }
        out
    }

    /// Returns a reference to the underlying map.
    #[must_use]
    pub const fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl TryFrom<BTreeMap<String, String>> for ProjectCodes {
    type Error = ReviewDomainError;

    fn try_from(value: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProjectCodes> for BTreeMap<String, String> {
    fn from(value: ProjectCodes) -> Self {
        value.0
    }
}

pub(super) fn normalize_code(raw: String) -> Result<String, ReviewDomainError> {
    let code = raw.trim();
    if code.is_empty() || code.contains(CODE_SEPARATOR) {
        return Err(ReviewDomainError::InvalidProjectCode(raw));
    }
    Ok(code.to_owned())
}

/// Positive page count of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Pages(u32);

impl Pages {
    /// Creates a validated page count.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewDomainError::ZeroPages`] for zero.
    pub const fn new(value: u32) -> Result<Self, ReviewDomainError> {
        if value == 0 {
            return Err(ReviewDomainError::ZeroPages);
        }
        Ok(Self(value))
    }

    /// Returns the raw page count.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Returns the ledger weight of a task with this page count.
    ///
    /// Urgent tasks weigh `floor(pages * 1.5)`; regular tasks weigh `pages`.
    #[must_use]
    pub fn weighted(self, urgent: bool) -> i64 {
        let pages = i64::from(self.0);
        if urgent {
            pages + pages.div_euclid(2)
        } else {
            pages
        }
    }
}

impl TryFrom<u32> for Pages {
    type Error = ReviewDomainError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Pages> for u32 {
    fn from(value: Pages) -> Self {
        value.0
    }
}

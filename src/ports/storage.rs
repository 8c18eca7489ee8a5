//! Storage port: Trait for persistent assessment history.
//!
//! This trait abstracts the storage backend (SQLite) from the application logic.

use crate::domain::{
    AssessmentRecord, AssessmentSummary, HistoryStats, RiskAssessment, ValidatedObservation,
};

/// A page of history rows with pagination metadata.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentPage {
    /// Rows in this page
    pub items: Vec<AssessmentSummary>,
    /// Total count of all stored assessments
    pub total_count: usize,
    /// Current page offset
    pub offset: usize,
    /// Page size limit
    pub limit: usize,
    /// Whether there are more pages
    pub has_more: bool,
}

impl AssessmentPage {
    #[must_use]
    pub fn new(items: Vec<AssessmentSummary>, total_count: usize, offset: usize, limit: usize) -> Self {
        let has_more = offset.saturating_add(items.len()) < total_count;
        Self {
            items,
            total_count,
            offset,
            limit,
            has_more,
        }
    }

    #[must_use]
    pub fn next_offset(&self) -> Option<usize> {
        if self.has_more {
            Some(self.offset.saturating_add(self.limit))
        } else {
            None
        }
    }

    #[must_use]
    pub fn prev_offset(&self) -> Option<usize> {
        if self.offset > 0 {
            Some(self.offset.saturating_sub(self.limit))
        } else {
            None
        }
    }
}

/// Trait for durable assessment history.
///
/// Listings are ordered by assessment time, most recent first.
pub trait AssessmentStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Store an assessment with the observation it came from.
    ///
    /// The assessment timestamp becomes the stored assessment date. Returns
    /// the surrogate id assigned by the store.
    ///
    /// # Errors
    /// Returns error if the write fails.
    fn save_assessment(
        &self,
        observation: &ValidatedObservation,
        assessment: &RiskAssessment,
    ) -> Result<i64, Self::Error>;

    /// Most recent assessment for an exact patient identifier.
    ///
    /// # Errors
    /// Returns error if the query fails.
    fn find_latest_by_patient_id(
        &self,
        patient_id: &str,
    ) -> Result<Option<AssessmentRecord>, Self::Error>;

    /// Case-insensitive substring match over patient name or identifier.
    ///
    /// # Errors
    /// Returns error if the query fails.
    fn search(&self, term: &str) -> Result<Vec<AssessmentSummary>, Self::Error>;

    /// Every stored assessment.
    ///
    /// # Errors
    /// Returns error if the query fails.
    fn list_all(&self) -> Result<Vec<AssessmentSummary>, Self::Error>;

    /// Assessments with offset/limit pagination.
    ///
    /// # Errors
    /// Returns error if the query fails.
    fn list_paginated(&self, offset: usize, limit: usize) -> Result<AssessmentPage, Self::Error>;

    /// Risk-level counts over the whole history.
    ///
    /// # Errors
    /// Returns error if the query fails.
    fn stats(&self) -> Result<HistoryStats, Self::Error>;

    /// Delete an assessment by surrogate id. Returns whether a row was removed.
    ///
    /// # Errors
    /// Returns error if the delete fails.
    fn delete_assessment(&self, id: i64) -> Result<bool, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_metadata_at_extreme_offset() {
        let page = AssessmentPage::new(Vec::new(), 3, usize::MAX, 10);
        assert!(!page.has_more);
        assert_eq!(page.next_offset(), None);
        assert_eq!(page.prev_offset(), Some(usize::MAX - 10));
    }

    #[test]
    fn test_next_offset_saturates() {
        let mut page = AssessmentPage::new(Vec::new(), 10, 0, usize::MAX);
        assert!(page.has_more);
        assert_eq!(page.next_offset(), Some(usize::MAX));

        page.offset = 5;
        assert_eq!(page.next_offset(), Some(usize::MAX));
    }
}

//! Subject choice forms: `Draft -> Open -> Closed`, no reopen.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::data::{FormId, StaffId, SubjectId};
use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormStatus {
    #[default]
    Draft,
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmission {
    pub subject_ids: Vec<SubjectId>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceForm {
    pub id: FormId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: FormStatus,
    /// At most one submission per staff member.
    #[serde(default)]
    pub submissions: BTreeMap<StaffId, FormSubmission>,
}

impl ChoiceForm {
    pub fn new(id: FormId, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            status: FormStatus::Draft,
            submissions: BTreeMap::new(),
        }
    }

    pub fn open(&mut self) -> Result<(), ValidationError> {
        self.transition(FormStatus::Draft, FormStatus::Open)
    }

    pub fn close(&mut self) -> Result<(), ValidationError> {
        self.transition(FormStatus::Open, FormStatus::Closed)
    }

    fn transition(&mut self, from: FormStatus, to: FormStatus) -> Result<(), ValidationError> {
        if self.status != from {
            return Err(ValidationError::InvalidFormTransition {
                form_id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Upserts a staff member's submission. Returns `true` when an earlier
    /// submission was replaced.
    pub fn submit(
        &mut self,
        staff_id: StaffId,
        subject_ids: Vec<SubjectId>,
        notes: impl Into<String>,
    ) -> Result<bool, ValidationError> {
        if self.status != FormStatus::Open {
            return Err(ValidationError::FormNotOpen {
                form_id: self.id,
                status: self.status,
            });
        }
        let submission = FormSubmission {
            subject_ids,
            notes: notes.into(),
        };
        Ok(self.submissions.insert(staff_id, submission).is_some())
    }

    pub fn submission(&self, staff_id: StaffId) -> Option<&FormSubmission> {
        self.submissions.get(&staff_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut form = ChoiceForm::new(1, "Odd semester", "");
        assert_eq!(form.status, FormStatus::Draft);
        form.open().unwrap();
        assert_eq!(form.status, FormStatus::Open);
        form.close().unwrap();
        assert_eq!(form.status, FormStatus::Closed);
    }

    #[test]
    fn test_no_reopen() {
        let mut form = ChoiceForm::new(1, "Odd semester", "");
        form.open().unwrap();
        form.close().unwrap();
        assert_eq!(
            form.open(),
            Err(ValidationError::InvalidFormTransition {
                form_id: 1,
                from: FormStatus::Closed,
                to: FormStatus::Open
            })
        );
        assert_eq!(form.status, FormStatus::Closed);
    }

    #[test]
    fn test_cannot_close_draft() {
        let mut form = ChoiceForm::new(4, "Draft", "");
        assert!(form.close().is_err());
        assert_eq!(form.status, FormStatus::Draft);
    }

    #[test]
    fn test_submit_rejected_unless_open() {
        let mut form = ChoiceForm::new(2, "Even semester", "");
        assert_eq!(
            form.submit(7, vec![1], ""),
            Err(ValidationError::FormNotOpen {
                form_id: 2,
                status: FormStatus::Draft
            })
        );

        form.open().unwrap();
        form.close().unwrap();
        assert_eq!(
            form.submit(7, vec![1], ""),
            Err(ValidationError::FormNotOpen {
                form_id: 2,
                status: FormStatus::Closed
            })
        );
        assert!(form.submissions.is_empty());
    }

    #[test]
    fn test_resubmission_overwrites() {
        let mut form = ChoiceForm::new(3, "Electives", "");
        form.open().unwrap();
        assert!(!form.submit(7, vec![1, 2], "first").unwrap());
        assert!(form.submit(7, vec![3], "second").unwrap());

        assert_eq!(form.submissions.len(), 1);
        let submission = form.submission(7).unwrap();
        assert_eq!(submission.subject_ids, vec![3]);
        assert_eq!(submission.notes, "second");
    }
}

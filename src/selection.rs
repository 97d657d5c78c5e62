//! Staff-facing subject selection. A selection is made once and then locked
//! for good; there is no unlock path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::data::{ConstraintRule, StaffId, SubjectId};
use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SubjectSelection {
    #[default]
    Unlocked,
    Locked { subjects: Vec<SubjectId> },
}

impl SubjectSelection {
    pub fn is_locked(&self) -> bool {
        matches!(self, SubjectSelection::Locked { .. })
    }

    /// Locked subjects in submitted order; empty while unlocked.
    pub fn subjects(&self) -> &[SubjectId] {
        match self {
            SubjectSelection::Unlocked => &[],
            SubjectSelection::Locked { subjects } => subjects,
        }
    }

    /// Validates and locks a selection. A locked selection rejects every
    /// call, whatever the payload, and is left untouched on error.
    pub fn select(
        &mut self,
        staff_id: StaffId,
        subject_ids: &[SubjectId],
        rule: &ConstraintRule,
        known_subjects: &BTreeSet<SubjectId>,
    ) -> Result<(), ValidationError> {
        if self.is_locked() {
            return Err(ValidationError::SelectionLocked { staff_id });
        }
        if subject_ids.is_empty() {
            return Err(ValidationError::EmptySelection);
        }
        if let Some(&unknown) = subject_ids.iter().find(|id| !known_subjects.contains(id)) {
            return Err(ValidationError::UnknownSubject(unknown));
        }

        let mut seen = BTreeSet::new();
        let subjects: Vec<SubjectId> = subject_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        if subjects.len() > rule.max_subjects as usize {
            return Err(ValidationError::TooManySubjects {
                role: rule.role,
                requested: subjects.len(),
                max: rule.max_subjects,
            });
        }

        *self = SubjectSelection::Locked { subjects };
        Ok(())
    }
}

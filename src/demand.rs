use std::collections::{BTreeMap, BTreeSet};

use crate::data::{Subject, SubjectId};
use crate::error::ConfigError;

/// Weekly teaching hours required per subject credit.
pub const HOURS_PER_CREDIT: u32 = 2;

/// Required weekly hours per subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemandModel {
    hours: BTreeMap<SubjectId, u32>,
}

impl DemandModel {
    pub fn from_subjects(subjects: &[Subject]) -> Result<Self, ConfigError> {
        let mut hours = BTreeMap::new();
        for subject in subjects {
            if subject.credits == 0 {
                return Err(ConfigError::ZeroCredits {
                    subject_id: subject.id,
                });
            }
            let required = subject
                .credits
                .checked_mul(HOURS_PER_CREDIT)
                .ok_or(ConfigError::DemandOverflow {
                    subject_id: subject.id,
                })?;
            if hours.insert(subject.id, required).is_some() {
                return Err(ConfigError::DuplicateId {
                    kind: "subject",
                    id: subject.id,
                });
            }
        }
        Ok(Self { hours })
    }

    pub fn required_hours(&self, subject_id: SubjectId) -> Option<u32> {
        self.hours.get(&subject_id).copied()
    }

    pub fn subject_ids(&self) -> BTreeSet<SubjectId> {
        self.hours.keys().copied().collect()
    }
}

//! Resolves raw preference submissions into clean, ordered per-staff lists.

use itertools::Itertools;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

use crate::data::{PreferenceSubmission, StaffId, StaffMember, SubjectId};
use crate::forms::ChoiceForm;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPreferences {
    by_staff: BTreeMap<StaffId, Vec<SubjectId>>,
}

impl ResolvedPreferences {
    /// Ordered preferences; empty for staff without a usable submission.
    pub fn for_staff(&self, staff_id: StaffId) -> &[SubjectId] {
        self.by_staff.get(&staff_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of (staff, subject) pairs across all staff.
    pub fn total(&self) -> usize {
        self.by_staff.values().map(Vec::len).sum()
    }
}

pub struct PreferenceResolver<'a> {
    known_subjects: &'a BTreeSet<SubjectId>,
}

impl<'a> PreferenceResolver<'a> {
    pub fn new(known_subjects: &'a BTreeSet<SubjectId>) -> Self {
        Self { known_subjects }
    }

    /// Keeps submitted order, drops unknown ids and repeats. When a staff
    /// member appears in several submissions the last one counts. Staff
    /// without a submission resolve to an empty list.
    pub fn resolve(
        &self,
        staff: &[StaffMember],
        submissions: &[PreferenceSubmission],
    ) -> ResolvedPreferences {
        let latest: BTreeMap<StaffId, &PreferenceSubmission> =
            submissions.iter().map(|s| (s.staff_id, s)).collect();

        let by_staff: BTreeMap<StaffId, Vec<SubjectId>> = staff
            .iter()
            .map(|member| {
                let resolved = latest
                    .get(&member.id)
                    .map(|submission| {
                        submission
                            .subject_ids
                            .iter()
                            .copied()
                            .filter(|id| {
                                let known = self.known_subjects.contains(id);
                                if !known {
                                    debug!("staff {} prefers unknown subject {id}, dropped", member.id);
                                }
                                known
                            })
                            .unique()
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                (member.id, resolved)
            })
            .collect();

        ResolvedPreferences { by_staff }
    }
}

/// Gathers raw submissions from department data: a locked selection is the
/// staff member's preference list, otherwise the answer to the most
/// recently created choice form they responded to.
pub fn collect_submissions(staff: &[StaffMember], forms: &[ChoiceForm]) -> Vec<PreferenceSubmission> {
    staff
        .iter()
        .filter_map(|member| {
            let subject_ids = if member.selection.is_locked() {
                member.selection.subjects().to_vec()
            } else {
                forms
                    .iter()
                    .rev()
                    .find_map(|form| form.submission(member.id))?
                    .subject_ids
                    .clone()
            };
            Some(PreferenceSubmission {
                staff_id: member.id,
                subject_ids,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Role;
    use crate::selection::SubjectSelection;

    fn staff() -> Vec<StaffMember> {
        vec![
            StaffMember::new(1, "Asha", Role::Professor),
            StaffMember::new(2, "Ravi", Role::AssistantProfessor),
            StaffMember::new(3, "Meena", Role::Hod),
        ]
    }

    fn submission(staff_id: StaffId, subject_ids: &[SubjectId]) -> PreferenceSubmission {
        PreferenceSubmission {
            staff_id,
            subject_ids: subject_ids.to_vec(),
        }
    }

    #[test]
    fn test_resolve_filters_and_dedups_in_order() {
        let known: BTreeSet<SubjectId> = [10, 20, 30].into_iter().collect();
        let resolved = PreferenceResolver::new(&known).resolve(
            &staff(),
            &[submission(1, &[30, 99, 10, 30, 20]), submission(2, &[20])],
        );
        assert_eq!(resolved.for_staff(1), &[30, 10, 20]);
        assert_eq!(resolved.for_staff(2), &[20]);
        assert!(resolved.for_staff(3).is_empty());
        assert_eq!(resolved.total(), 4);
    }

    #[test]
    fn test_last_submission_wins() {
        let known: BTreeSet<SubjectId> = [10, 20].into_iter().collect();
        let resolved = PreferenceResolver::new(&known)
            .resolve(&staff(), &[submission(1, &[10]), submission(1, &[20])]);
        assert_eq!(resolved.for_staff(1), &[20]);
    }

    #[test]
    fn test_submissions_for_unknown_staff_ignored() {
        let known: BTreeSet<SubjectId> = [10].into_iter().collect();
        let resolved = PreferenceResolver::new(&known).resolve(&staff(), &[submission(42, &[10])]);
        assert!(resolved.for_staff(42).is_empty());
    }

    #[test]
    fn test_collect_prefers_locked_selection() {
        let mut members = staff();
        members[0].selection = SubjectSelection::Locked { subjects: vec![10] };

        let mut older = ChoiceForm::new(1, "old", "");
        older.open().unwrap();
        older.submit(1, vec![20], "").unwrap();
        older.submit(2, vec![20], "").unwrap();
        older.submit(3, vec![30], "").unwrap();
        let mut newer = ChoiceForm::new(2, "new", "");
        newer.open().unwrap();
        newer.submit(2, vec![30, 10], "").unwrap();

        let submissions = collect_submissions(&members, &[older, newer]);
        assert_eq!(
            submissions,
            vec![submission(1, &[10]), submission(2, &[30, 10]), submission(3, &[30])]
        );
    }

    #[test]
    fn test_collect_skips_staff_without_input() {
        let submissions = collect_submissions(&staff(), &[]);
        assert!(submissions.is_empty());
    }
}

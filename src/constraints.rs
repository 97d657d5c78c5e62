//! Compiles raw constraint records into a per-role rule book for one
//! department.

use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};

use crate::data::{ConstraintRecord, ConstraintRule, DepartmentId, Role};
use crate::error::ConfigError;

/// Subject cap for a role that has neither a department nor a global rule.
pub const DEFAULT_MAX_SUBJECTS: u32 = 1;
/// Weekly hour cap for a role that has neither a department nor a global rule.
pub const DEFAULT_MAX_HOURS_PER_WEEK: u32 = 8;

impl ConstraintRule {
    /// The built-in rule used when no record covers `role`.
    pub fn fallback(role: Role) -> Self {
        Self {
            role,
            max_subjects: DEFAULT_MAX_SUBJECTS,
            max_hours_per_week: DEFAULT_MAX_HOURS_PER_WEEK,
            allowed_subject_types: BTreeSet::new(),
            lab_faculty_required: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleBook {
    rules: BTreeMap<Role, ConstraintRule>,
}

impl RuleBook {
    pub fn rule_for(&self, role: Role) -> ConstraintRule {
        self.rules
            .get(&role)
            .cloned()
            .unwrap_or_else(|| ConstraintRule::fallback(role))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Outcome of validating one record.
type Parsed = Result<ConstraintRule, ConfigError>;

#[derive(Debug, Clone, Copy)]
pub struct ConstraintCompiler {
    department_id: DepartmentId,
}

impl ConstraintCompiler {
    pub fn new(department_id: DepartmentId) -> Self {
        Self { department_id }
    }

    /// A department-scoped record beats a global one for the same role;
    /// within one scope the record listed last wins. Malformed records only
    /// fail compilation when they would decide the rule of a role in use.
    pub fn compile(
        &self,
        records: &[ConstraintRecord],
        roles_in_use: &BTreeSet<Role>,
    ) -> Result<RuleBook, ConfigError> {
        let mut global: BTreeMap<Role, Parsed> = BTreeMap::new();
        let mut scoped: BTreeMap<Role, Parsed> = BTreeMap::new();

        for record in records {
            let target = match record.department_id {
                None => &mut global,
                Some(id) if id == self.department_id => &mut scoped,
                Some(_) => continue,
            };
            target.insert(record.role, parse_record(record));
        }

        let roles: BTreeSet<Role> = global
            .keys()
            .chain(scoped.keys())
            .chain(roles_in_use.iter())
            .copied()
            .collect();

        let mut rules = BTreeMap::new();
        for role in roles {
            let in_use = roles_in_use.contains(&role);
            let resolved = match (scoped.get(&role), global.get(&role)) {
                (Some(Ok(rule)), _) => Some(Ok(rule.clone())),
                (Some(Err(err)), _) => Some(Err(err.clone())),
                (None, Some(Ok(rule))) => Some(Ok(rule.clone())),
                (None, Some(Err(err))) => Some(Err(err.clone())),
                (None, None) => None,
            };

            match resolved {
                Some(Ok(rule)) => {
                    rules.insert(role, rule);
                }
                Some(Err(err)) if in_use => return Err(err),
                Some(Err(err)) => {
                    warn!("skipping constraint for unused role {role}: {err}");
                }
                None => {
                    debug!(
                        "no constraint for role {role}, using default ({DEFAULT_MAX_SUBJECTS} subjects, {DEFAULT_MAX_HOURS_PER_WEEK} h/week)"
                    );
                    rules.insert(role, ConstraintRule::fallback(role));
                }
            }
        }

        Ok(RuleBook { rules })
    }
}

fn parse_record(record: &ConstraintRecord) -> Parsed {
    let cap = |field: &'static str, value: i64| {
        u32::try_from(value).map_err(|_| ConfigError::InvalidCap {
            role: record.role,
            field,
            value,
        })
    };
    Ok(ConstraintRule {
        role: record.role,
        max_subjects: cap("maxSubjects", record.max_subjects)?,
        max_hours_per_week: cap("maxHoursPerWeek", record.max_hours_per_week)?,
        allowed_subject_types: record.allowed_subject_types.iter().cloned().collect(),
        lab_faculty_required: record.lab_faculty_required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(department_id: Option<DepartmentId>, role: Role, subjects: i64, hours: i64) -> ConstraintRecord {
        ConstraintRecord {
            department_id,
            role,
            max_subjects: subjects,
            max_hours_per_week: hours,
            allowed_subject_types: vec!["theory".to_string()],
            lab_faculty_required: true,
        }
    }

    fn roles(list: &[Role]) -> BTreeSet<Role> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_department_overrides_global() {
        let records = vec![
            record(None, Role::Professor, 1, 10),
            record(Some(7), Role::Professor, 2, 12),
            record(Some(8), Role::Professor, 3, 14),
        ];
        let book = ConstraintCompiler::new(7)
            .compile(&records, &roles(&[Role::Professor]))
            .unwrap();
        let rule = book.rule_for(Role::Professor);
        assert_eq!(rule.max_subjects, 2);
        assert_eq!(rule.max_hours_per_week, 12);
        assert!(rule.allowed_subject_types.contains("theory"));
    }

    #[test]
    fn test_global_applies_without_department_rule() {
        let records = vec![record(None, Role::Hod, 1, 4)];
        let book = ConstraintCompiler::new(7)
            .compile(&records, &roles(&[Role::Hod]))
            .unwrap();
        assert_eq!(book.rule_for(Role::Hod).max_hours_per_week, 4);
    }

    #[test]
    fn test_default_rule_is_explicit() {
        let book = ConstraintCompiler::new(7)
            .compile(&[], &roles(&[Role::Lecturer]))
            .unwrap();
        assert_eq!(book.len(), 1);
        let rule = book.rule_for(Role::Lecturer);
        assert_eq!(rule.max_subjects, DEFAULT_MAX_SUBJECTS);
        assert_eq!(rule.max_hours_per_week, DEFAULT_MAX_HOURS_PER_WEEK);
        assert_eq!(RuleBook::default().rule_for(Role::Hod), ConstraintRule::fallback(Role::Hod));
    }

    #[test]
    fn test_last_record_in_scope_wins() {
        let records = vec![
            record(Some(7), Role::Professor, 1, 6),
            record(Some(7), Role::Professor, 1, 9),
        ];
        let book = ConstraintCompiler::new(7)
            .compile(&records, &roles(&[Role::Professor]))
            .unwrap();
        assert_eq!(book.rule_for(Role::Professor).max_hours_per_week, 9);
    }

    #[test]
    fn test_negative_cap_for_role_in_use_fails() {
        let records = vec![record(Some(7), Role::Professor, 1, -3)];
        let err = ConstraintCompiler::new(7)
            .compile(&records, &roles(&[Role::Professor]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidCap {
                role: Role::Professor,
                field: "maxHoursPerWeek",
                value: -3
            }
        );
    }

    #[test]
    fn test_malformed_global_shadowed_by_valid_department_rule() {
        let records = vec![
            record(None, Role::Professor, -1, 8),
            record(Some(7), Role::Professor, 1, 8),
        ];
        let book = ConstraintCompiler::new(7)
            .compile(&records, &roles(&[Role::Professor]))
            .unwrap();
        assert_eq!(book.rule_for(Role::Professor).max_subjects, 1);
    }

    #[test]
    fn test_malformed_record_for_unused_role_is_skipped() {
        let records = vec![record(None, Role::Hod, -1, 8)];
        let book = ConstraintCompiler::new(7)
            .compile(&records, &roles(&[Role::Professor]))
            .unwrap();
        assert_eq!(book.rule_for(Role::Hod), ConstraintRule::fallback(Role::Hod));
    }
}

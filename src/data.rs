use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::ConfigError;
use crate::forms::ChoiceForm;
use crate::selection::SubjectSelection;

// Type aliases for clarity
pub type DepartmentId = u32;
pub type StaffId = u32;
pub type SubjectId = u32;
pub type ClassroomId = u32;
pub type FormId = u32;
/// 1-based period number within a working day.
pub type Timeslot = u32;

/// Staff roles that constraint rules are keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    AssistantProfessor,
    AssociateProfessor,
    Professor,
    Hod,
    Lecturer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::AssistantProfessor => "assistant_professor",
            Role::AssociateProfessor => "associate_professor",
            Role::Professor => "professor",
            Role::Hod => "hod",
            Role::Lecturer => "lecturer",
        };
        f.write_str(name)
    }
}

/// A teaching staff member of one department.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
    pub id: StaffId,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub selection: SubjectSelection,
}

impl StaffMember {
    pub fn new(id: StaffId, name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            selection: SubjectSelection::Unlocked,
        }
    }
}

/// A subject from the department catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    pub code: String,
    pub credits: u32,
}

impl Subject {
    pub fn new(id: SubjectId, name: impl Into<String>, code: impl Into<String>, credits: u32) -> Self {
        Self {
            id,
            name: name.into(),
            code: code.into(),
            credits,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassroomKind {
    Lecture,
    Lab,
}

/// Represents a physical room with a given capacity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classroom {
    pub id: ClassroomId,
    pub name: String,
    pub capacity: u32,
    /// Explicit classification; when absent the room name decides.
    #[serde(default, rename = "kind", skip_serializing_if = "Option::is_none")]
    pub explicit_kind: Option<ClassroomKind>,
}

impl Classroom {
    pub fn new(id: ClassroomId, name: impl Into<String>, capacity: u32) -> Self {
        Self {
            id,
            name: name.into(),
            capacity,
            explicit_kind: None,
        }
    }

    pub fn with_kind(mut self, kind: ClassroomKind) -> Self {
        self.explicit_kind = Some(kind);
        self
    }

    /// Any room whose name contains "lab" (case-insensitive) is a lab
    /// unless an explicit kind was registered.
    pub fn kind(&self) -> ClassroomKind {
        match self.explicit_kind {
            Some(kind) => kind,
            None if self.name.to_lowercase().contains("lab") => ClassroomKind::Lab,
            None => ClassroomKind::Lecture,
        }
    }
}

fn default_lab_faculty_required() -> bool {
    true
}

/// A raw constraint record as stored by administrators. Caps are signed so
/// malformed input survives deserialization and is rejected by the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintRecord {
    /// `None` for a global rule.
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
    pub role: Role,
    pub max_subjects: i64,
    pub max_hours_per_week: i64,
    #[serde(default)]
    pub allowed_subject_types: Vec<String>,
    #[serde(default = "default_lab_faculty_required")]
    pub lab_faculty_required: bool,
}

/// A compiled, validated per-role rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintRule {
    pub role: Role,
    pub max_subjects: u32,
    pub max_hours_per_week: u32,
    pub allowed_subject_types: BTreeSet<String>,
    pub lab_faculty_required: bool,
}

fn default_period_duration() -> u32 {
    60
}

/// The department's weekly time grid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    pub working_days: Vec<String>,
    pub periods_per_day: u32,
    #[serde(default = "default_period_duration")]
    pub period_duration_minutes: u32,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub break_times: Vec<String>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            working_days: ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]
                .iter()
                .map(|d| d.to_string())
                .collect(),
            periods_per_day: 7,
            period_duration_minutes: default_period_duration(),
            start_time: "09:00".to_string(),
            end_time: "17:00".to_string(),
            break_times: Vec::new(),
        }
    }
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.working_days.is_empty() {
            return Err(ConfigError::EmptyWorkingDays);
        }
        let mut seen = BTreeSet::new();
        for day in &self.working_days {
            if !seen.insert(day.as_str()) {
                return Err(ConfigError::DuplicateWorkingDay(day.clone()));
            }
        }
        if self.periods_per_day == 0 {
            return Err(ConfigError::ZeroPeriods);
        }
        let start = parse_clock(&self.start_time).ok_or_else(|| ConfigError::InvalidTime {
            field: "startTime",
            value: self.start_time.clone(),
        })?;
        let end = parse_clock(&self.end_time).ok_or_else(|| ConfigError::InvalidTime {
            field: "endTime",
            value: self.end_time.clone(),
        })?;
        if start >= end {
            return Err(ConfigError::InvertedHours {
                start: self.start_time.clone(),
                end: self.end_time.clone(),
            });
        }
        if self.period_duration_minutes == 0 {
            return Err(ConfigError::ZeroPeriodDuration);
        }
        let day_end = self
            .periods_per_day
            .checked_mul(self.period_duration_minutes)
            .and_then(|minutes| minutes.checked_add(start));
        if day_end.is_none_or(|minutes| minutes > end) {
            return Err(ConfigError::PeriodsOverrunDay {
                periods: self.periods_per_day,
                duration: self.period_duration_minutes,
                end: self.end_time.clone(),
            });
        }
        Ok(())
    }

    /// Periods in scan order.
    pub fn periods(&self) -> impl Iterator<Item = Timeslot> + '_ {
        1..=self.periods_per_day
    }

    pub fn slot_label(slot: Timeslot) -> String {
        format!("Period {slot}")
    }

    /// Wall-clock start of a period as `HH:MM`.
    pub fn slot_start(&self, slot: Timeslot) -> Option<String> {
        self.slot_offset(slot, slot.checked_sub(1)?).map(format_clock)
    }

    /// Wall-clock end of a period as `HH:MM`.
    pub fn slot_end(&self, slot: Timeslot) -> Option<String> {
        self.slot_offset(slot, slot).map(format_clock)
    }

    fn slot_offset(&self, slot: Timeslot, periods_before: u32) -> Option<u32> {
        if slot == 0 || slot > self.periods_per_day {
            return None;
        }
        let minutes = periods_before.checked_mul(self.period_duration_minutes)?;
        let at = parse_clock(&self.start_time)?.checked_add(minutes)?;
        (at <= 24 * 60).then_some(at)
    }

    /// Label and wall-clock bounds of every period in the day.
    pub fn timings(&self) -> BTreeMap<Timeslot, PeriodTiming> {
        self.periods()
            .filter_map(|slot| {
                let timing = PeriodTiming {
                    label: Self::slot_label(slot),
                    start: self.slot_start(slot)?,
                    end: self.slot_end(slot)?,
                };
                Some((slot, timing))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodTiming {
    pub label: String,
    pub start: String,
    pub end: String,
}

fn format_clock(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

fn parse_clock(value: &str) -> Option<u32> {
    let (h, m) = value.split_once(':')?;
    let h: u32 = h.trim().parse().ok()?;
    let m: u32 = m.trim().parse().ok()?;
    (h < 24 && m < 60).then_some(h * 60 + m)
}

/// One committed (day, slot, subject, staff, classroom) fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentEntry {
    pub day: String,
    pub time_slot: Timeslot,
    pub subject_id: SubjectId,
    pub staff_id: StaffId,
    pub classroom_id: ClassroomId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ShortfallReason {
    /// No free (day, slot, classroom) was left for this staff member.
    CapacityExhausted,
    /// The staff member reached the role's weekly hour cap.
    HourCap,
    /// The staff member reached the role's distinct-subject cap.
    SubjectCap,
}

/// A staff/subject pair that did not reach its required weekly hours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Shortfall {
    pub staff_id: StaffId,
    pub subject_id: SubjectId,
    pub required_hours: u32,
    pub assigned_hours: u32,
    pub reason: ShortfallReason,
}

impl Shortfall {
    pub fn missing_hours(&self) -> u32 {
        self.required_hours.saturating_sub(self.assigned_hours)
    }
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] staff {} subject {}: {} of {} hours assigned",
            self.reason, self.staff_id, self.subject_id, self.assigned_hours, self.required_hours
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UnscheduledReason {
    NoPreferences,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnscheduledStaff {
    pub staff_id: StaffId,
    pub reason: UnscheduledReason,
}

/// Raw, unvalidated subject preferences of one staff member.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceSubmission {
    pub staff_id: StaffId,
    pub subject_ids: Vec<SubjectId>,
}

/// Department data as pushed by administrative collaborators.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    #[serde(default)]
    pub config: Option<ScheduleConfig>,
    #[serde(default)]
    pub staff: Vec<StaffMember>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    /// Registration order is the classroom scan order.
    #[serde(default)]
    pub classrooms: Vec<Classroom>,
    #[serde(default)]
    pub forms: Vec<ChoiceForm>,
}

impl Department {
    pub fn new(id: DepartmentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            config: None,
            staff: Vec::new(),
            subjects: Vec::new(),
            classrooms: Vec::new(),
            forms: Vec::new(),
        }
    }

    pub fn staff_member(&self, staff_id: StaffId) -> Option<&StaffMember> {
        self.staff.iter().find(|s| s.id == staff_id)
    }

    pub fn subject_ids(&self) -> BTreeSet<SubjectId> {
        self.subjects.iter().map(|s| s.id).collect()
    }
}

/// The read-only snapshot one generation run works from.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationInput {
    pub department_id: DepartmentId,
    pub config: ScheduleConfig,
    pub staff: Vec<StaffMember>,
    pub subjects: Vec<Subject>,
    pub classrooms: Vec<Classroom>,
    pub constraints: Vec<ConstraintRecord>,
    pub submissions: Vec<PreferenceSubmission>,
}

/// The result of one scheduler pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleOutcome {
    pub entries: Vec<AssignmentEntry>,
    pub shortfalls: Vec<Shortfall>,
    pub unscheduled: Vec<UnscheduledStaff>,
}

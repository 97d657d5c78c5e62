//! Backing store for department data and committed schedules.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::data::{AssignmentEntry, ConstraintRecord, Department, DepartmentId, GenerationInput};
use crate::error::StoreError;
use crate::preferences::collect_submissions;
use crate::views::Directory;

/// The schedule produced by one successful run, with the names it was
/// projected against.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedSchedule {
    pub run: u64,
    pub entries: Vec<AssignmentEntry>,
    pub directory: Directory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Committed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationLogEntry {
    pub run: u64,
    pub status: RunStatus,
    pub entries_count: usize,
    pub shortfall_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub recorded_at: u64,
}

impl GenerationLogEntry {
    pub fn committed(run: u64, entries_count: usize, shortfall_count: usize) -> Self {
        Self {
            run,
            status: RunStatus::Committed,
            entries_count,
            shortfall_count,
            message: None,
            recorded_at: unix_now(),
        }
    }

    pub fn aborted(run: u64, message: impl Into<String>) -> Self {
        Self {
            run,
            status: RunStatus::Aborted,
            entries_count: 0,
            shortfall_count: 0,
            message: Some(message.into()),
            recorded_at: unix_now(),
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Startup data for the in-memory store.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedData {
    #[serde(default)]
    pub constraints: Vec<ConstraintRecord>,
    #[serde(default)]
    pub departments: Vec<Department>,
}

/// Storage operations the service relies on.
///
/// `replace_schedule` must swap a department's schedule as one unit:
/// readers see either the old set or the new one, never a mix.
pub trait TimetableStore: Send + Sync {
    /// Read-only input for one generation run.
    fn snapshot(&self, department_id: DepartmentId) -> Result<GenerationInput, StoreError>;

    fn replace_schedule(
        &self,
        department_id: DepartmentId,
        schedule: CommittedSchedule,
    ) -> Result<(), StoreError>;

    fn committed_schedule(
        &self,
        department_id: DepartmentId,
    ) -> Result<Option<CommittedSchedule>, StoreError>;

    fn append_log(
        &self,
        department_id: DepartmentId,
        entry: GenerationLogEntry,
    ) -> Result<(), StoreError>;

    fn generation_log(
        &self,
        department_id: DepartmentId,
    ) -> Result<Vec<GenerationLogEntry>, StoreError>;

    /// Inserts or replaces department data. For a department already on
    /// record, the stored selection of every known staff member and the
    /// stored choice forms are kept: those only change through their own
    /// operations.
    fn upsert_department(&self, department: Department) -> Result<(), StoreError>;

    fn replace_constraints(&self, records: Vec<ConstraintRecord>) -> Result<(), StoreError>;

    fn constraints(&self) -> Result<Vec<ConstraintRecord>, StoreError>;

    /// Runs `f` against the department under the write lock.
    fn modify<R>(
        &self,
        department_id: DepartmentId,
        f: impl FnOnce(&mut Department) -> R,
    ) -> Result<R, StoreError>;
}

#[derive(Debug)]
struct DepartmentState {
    department: Department,
    schedule: Option<CommittedSchedule>,
    log: Vec<GenerationLogEntry>,
}

impl DepartmentState {
    fn new(department: Department) -> Self {
        Self {
            department,
            schedule: None,
            log: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    departments: RwLock<HashMap<DepartmentId, DepartmentState>>,
    constraints: RwLock<Vec<ConstraintRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: SeedData) -> Self {
        let departments = seed
            .departments
            .into_iter()
            .map(|d| (d.id, DepartmentState::new(d)))
            .collect();
        Self {
            departments: RwLock::new(departments),
            constraints: RwLock::new(seed.constraints),
        }
    }

    fn read<R>(
        &self,
        department_id: DepartmentId,
        f: impl FnOnce(&DepartmentState) -> R,
    ) -> Result<R, StoreError> {
        let departments = self
            .departments
            .read()
            .map_err(|_| StoreError::Poisoned("departments"))?;
        departments
            .get(&department_id)
            .map(f)
            .ok_or(StoreError::UnknownDepartment(department_id))
    }

    fn write<R>(
        &self,
        department_id: DepartmentId,
        f: impl FnOnce(&mut DepartmentState) -> R,
    ) -> Result<R, StoreError> {
        let mut departments = self
            .departments
            .write()
            .map_err(|_| StoreError::Poisoned("departments"))?;
        departments
            .get_mut(&department_id)
            .map(f)
            .ok_or(StoreError::UnknownDepartment(department_id))
    }
}

impl TimetableStore for InMemoryStore {
    fn snapshot(&self, department_id: DepartmentId) -> Result<GenerationInput, StoreError> {
        let constraints = self.constraints()?;
        self.read(department_id, |state| {
            let department = &state.department;
            GenerationInput {
                department_id,
                config: department.config.clone().unwrap_or_default(),
                staff: department.staff.clone(),
                subjects: department.subjects.clone(),
                classrooms: department.classrooms.clone(),
                constraints,
                submissions: collect_submissions(&department.staff, &department.forms),
            }
        })
    }

    fn replace_schedule(
        &self,
        department_id: DepartmentId,
        schedule: CommittedSchedule,
    ) -> Result<(), StoreError> {
        self.write(department_id, |state| {
            state.schedule = Some(schedule);
        })
    }

    fn committed_schedule(
        &self,
        department_id: DepartmentId,
    ) -> Result<Option<CommittedSchedule>, StoreError> {
        self.read(department_id, |state| state.schedule.clone())
    }

    fn append_log(
        &self,
        department_id: DepartmentId,
        entry: GenerationLogEntry,
    ) -> Result<(), StoreError> {
        self.write(department_id, |state| state.log.push(entry))
    }

    fn generation_log(
        &self,
        department_id: DepartmentId,
    ) -> Result<Vec<GenerationLogEntry>, StoreError> {
        self.read(department_id, |state| state.log.clone())
    }

    fn upsert_department(&self, mut department: Department) -> Result<(), StoreError> {
        let mut departments = self
            .departments
            .write()
            .map_err(|_| StoreError::Poisoned("departments"))?;
        match departments.get_mut(&department.id) {
            Some(state) => {
                for member in &mut department.staff {
                    if let Some(stored) = state.department.staff_member(member.id) {
                        member.selection = stored.selection.clone();
                    }
                }
                department.forms = std::mem::take(&mut state.department.forms);
                state.department = department;
            }
            None => {
                departments.insert(department.id, DepartmentState::new(department));
            }
        }
        Ok(())
    }

    fn replace_constraints(&self, records: Vec<ConstraintRecord>) -> Result<(), StoreError> {
        let mut constraints = self
            .constraints
            .write()
            .map_err(|_| StoreError::Poisoned("constraints"))?;
        *constraints = records;
        Ok(())
    }

    fn constraints(&self) -> Result<Vec<ConstraintRecord>, StoreError> {
        self.constraints
            .read()
            .map(|c| c.clone())
            .map_err(|_| StoreError::Poisoned("constraints"))
    }

    fn modify<R>(
        &self,
        department_id: DepartmentId,
        f: impl FnOnce(&mut Department) -> R,
    ) -> Result<R, StoreError> {
        self.write(department_id, |state| f(&mut state.department))
    }
}

//! The entry point collaborators call: generation, view queries, subject
//! selection and choice forms for each department.
//!
//! At most one generation runs per department at a time. A run works on a
//! snapshot taken under that department's lock, allocates on a blocking
//! thread, and only then replaces the committed schedule in one store
//! call. A run that fails or is dropped before that call leaves the
//! previous schedule in place.

use log::{info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

use crate::constraints::ConstraintCompiler;
use crate::data::{
    AssignmentEntry, ClassroomId, ConstraintRecord, Department, DepartmentId, FormId, Shortfall,
    StaffId, SubjectId, UnscheduledStaff,
};
use crate::error::{ServiceError, StoreError, ValidationError};
use crate::forms::ChoiceForm;
use crate::selection::SubjectSelection;
use crate::solver::Scheduler;
use crate::store::{CommittedSchedule, GenerationLogEntry, TimetableStore};
use crate::views::{
    ClassroomTimetable, Directory, StaffTimetable, StudentView, TimetableViews, ViewProjector,
};

/// What `generate` hands back to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReport {
    pub department_id: DepartmentId,
    pub run: u64,
    pub entries: Vec<AssignmentEntry>,
    pub shortfalls: Vec<Shortfall>,
    pub unscheduled: Vec<UnscheduledStaff>,
    pub views: TimetableViews,
}

/// Per-department generation lock; it guards the last run number handed out.
type RunLock = Arc<AsyncMutex<Option<u64>>>;

pub struct TimetableService<S> {
    store: Arc<S>,
    locks: Mutex<HashMap<DepartmentId, RunLock>>,
    generation_timeout: Duration,
}

impl<S: TimetableStore + 'static> TimetableService<S> {
    pub fn new(store: Arc<S>, generation_timeout: Duration) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
            generation_timeout,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn department_lock(&self, department_id: DepartmentId) -> Result<RunLock, ServiceError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| StoreError::Poisoned("department locks"))?;
        Ok(locks.entry(department_id).or_default().clone())
    }

    /// Generates and commits a fresh schedule for the department, fully
    /// replacing the previous one.
    pub async fn generate(&self, department_id: DepartmentId) -> Result<GenerationReport, ServiceError> {
        let lock = self.department_lock(department_id)?;
        let mut last_run = lock.lock().await;

        let input = self.store.snapshot(department_id)?;
        let run = match *last_run {
            Some(last) => last + 1,
            None => self.next_run_from_store(department_id)?,
        };
        *last_run = Some(run);
        let limit = self.generation_timeout;
        info!("Generating timetable for department {department_id}, run {run}");

        let (input, outcome) = tokio::task::spawn_blocking(move || {
            let outcome = Scheduler::new(&input).with_time_limit(limit).run();
            (input, outcome)
        })
        .await
        .map_err(|e| ServiceError::Internal(format!("generation task failed: {e}")))?;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                self.record(department_id, GenerationLogEntry::aborted(run, err.to_string()));
                return Err(err.into());
            }
        };

        let directory = Directory::from_input(&input);
        let views = ViewProjector::new(&outcome.entries, &directory).project_all();
        let schedule = CommittedSchedule {
            run,
            entries: outcome.entries.clone(),
            directory,
        };
        if let Err(err) = self.store.replace_schedule(department_id, schedule) {
            warn!("commit of run {run} for department {department_id} failed: {err}");
            self.record(department_id, GenerationLogEntry::aborted(run, err.to_string()));
            return Err(err.into());
        }

        self.record(
            department_id,
            GenerationLogEntry::committed(run, outcome.entries.len(), outcome.shortfalls.len()),
        );
        info!(
            "Committed run {run} for department {department_id}: {} entries, {} shortfalls",
            outcome.entries.len(),
            outcome.shortfalls.len()
        );

        Ok(GenerationReport {
            department_id,
            run,
            entries: outcome.entries,
            shortfalls: outcome.shortfalls,
            unscheduled: outcome.unscheduled,
            views,
        })
    }

    /// First run number after whatever the store already holds.
    fn next_run_from_store(&self, department_id: DepartmentId) -> Result<u64, ServiceError> {
        let logged = self
            .store
            .generation_log(department_id)?
            .iter()
            .map(|entry| entry.run)
            .max()
            .unwrap_or(0);
        let committed = self
            .store
            .committed_schedule(department_id)?
            .map_or(0, |schedule| schedule.run);
        Ok(logged.max(committed) + 1)
    }

    fn record(&self, department_id: DepartmentId, entry: GenerationLogEntry) {
        if let Err(err) = self.store.append_log(department_id, entry) {
            warn!("could not record generation log for department {department_id}: {err}");
        }
    }

    fn committed(&self, department_id: DepartmentId) -> Result<CommittedSchedule, ServiceError> {
        self.store
            .committed_schedule(department_id)?
            .ok_or(ServiceError::NotGenerated(department_id))
    }

    pub fn entries(&self, department_id: DepartmentId) -> Result<Vec<AssignmentEntry>, ServiceError> {
        Ok(self.committed(department_id)?.entries)
    }

    pub fn student_view(&self, department_id: DepartmentId) -> Result<StudentView, ServiceError> {
        let schedule = self.committed(department_id)?;
        Ok(ViewProjector::new(&schedule.entries, &schedule.directory).student_view())
    }

    pub fn staff_view(
        &self,
        department_id: DepartmentId,
        staff_id: StaffId,
    ) -> Result<StaffTimetable, ServiceError> {
        let schedule = self.committed(department_id)?;
        ViewProjector::new(&schedule.entries, &schedule.directory)
            .staff_view(staff_id)
            .ok_or(ServiceError::UnknownStaff(staff_id))
    }

    pub fn classroom_view(
        &self,
        department_id: DepartmentId,
        classroom_id: ClassroomId,
    ) -> Result<ClassroomTimetable, ServiceError> {
        let schedule = self.committed(department_id)?;
        ViewProjector::new(&schedule.entries, &schedule.directory)
            .classroom_view(classroom_id)
            .ok_or(ServiceError::UnknownClassroom(classroom_id))
    }

    pub fn lab_view(
        &self,
        department_id: DepartmentId,
    ) -> Result<BTreeMap<ClassroomId, ClassroomTimetable>, ServiceError> {
        let schedule = self.committed(department_id)?;
        Ok(ViewProjector::new(&schedule.entries, &schedule.directory).lab_view())
    }

    pub fn generation_log(
        &self,
        department_id: DepartmentId,
    ) -> Result<Vec<GenerationLogEntry>, ServiceError> {
        Ok(self.store.generation_log(department_id)?)
    }

    pub fn upsert_department(&self, department: Department) -> Result<(), ServiceError> {
        info!("Upserting department {} ({})", department.id, department.name);
        Ok(self.store.upsert_department(department)?)
    }

    pub fn replace_constraints(&self, records: Vec<ConstraintRecord>) -> Result<(), ServiceError> {
        info!("Replacing constraint store with {} records", records.len());
        Ok(self.store.replace_constraints(records)?)
    }

    /// Validates a staff member's subject choice against their role's cap
    /// and locks it.
    pub fn select_subjects(
        &self,
        department_id: DepartmentId,
        staff_id: StaffId,
        subject_ids: &[SubjectId],
    ) -> Result<SubjectSelection, ServiceError> {
        let constraints = self.store.constraints()?;
        self.store.modify(department_id, |department| -> Result<SubjectSelection, ServiceError> {
            let known = department.subject_ids();
            let member = department
                .staff
                .iter_mut()
                .find(|s| s.id == staff_id)
                .ok_or(ValidationError::UnknownStaff(staff_id))?;
            if member.selection.is_locked() {
                return Err(ValidationError::SelectionLocked { staff_id }.into());
            }

            let roles = BTreeSet::from([member.role]);
            let rule = ConstraintCompiler::new(department_id)
                .compile(&constraints, &roles)?
                .rule_for(member.role);
            member.selection.select(staff_id, subject_ids, &rule, &known)?;
            info!("Staff {staff_id} locked subjects {:?}", member.selection.subjects());
            Ok(member.selection.clone())
        })?
    }

    pub fn create_form(
        &self,
        department_id: DepartmentId,
        title: String,
        description: String,
    ) -> Result<ChoiceForm, ServiceError> {
        let form = self.store.modify(department_id, |department| {
            let id = department.forms.iter().map(|f| f.id).max().unwrap_or(0) + 1;
            let form = ChoiceForm::new(id, title, description);
            department.forms.push(form.clone());
            form
        })?;
        info!("Created choice form {} in department {department_id}", form.id);
        Ok(form)
    }

    pub fn open_form(&self, department_id: DepartmentId, form_id: FormId) -> Result<ChoiceForm, ServiceError> {
        self.with_form(department_id, form_id, |form| {
            form.open()?;
            Ok(form.clone())
        })
    }

    pub fn close_form(&self, department_id: DepartmentId, form_id: FormId) -> Result<ChoiceForm, ServiceError> {
        self.with_form(department_id, form_id, |form| {
            form.close()?;
            Ok(form.clone())
        })
    }

    /// Records a staff member's answer to an open form. Returns `true` when
    /// it replaced an earlier answer.
    pub fn submit_preferences(
        &self,
        department_id: DepartmentId,
        form_id: FormId,
        staff_id: StaffId,
        subject_ids: Vec<SubjectId>,
        notes: String,
    ) -> Result<bool, ServiceError> {
        self.store.modify(department_id, |department| -> Result<bool, ServiceError> {
            if department.staff_member(staff_id).is_none() {
                return Err(ValidationError::UnknownStaff(staff_id).into());
            }
            let form = department
                .forms
                .iter_mut()
                .find(|f| f.id == form_id)
                .ok_or(ValidationError::UnknownForm(form_id))?;
            Ok(form.submit(staff_id, subject_ids, notes)?)
        })?
    }

    fn with_form<R>(
        &self,
        department_id: DepartmentId,
        form_id: FormId,
        f: impl FnOnce(&mut ChoiceForm) -> Result<R, ValidationError>,
    ) -> Result<R, ServiceError> {
        self.store.modify(department_id, |department| -> Result<R, ServiceError> {
            let form = department
                .forms
                .iter_mut()
                .find(|form| form.id == form_id)
                .ok_or(ValidationError::UnknownForm(form_id))?;
            Ok(f(form)?)
        })?
    }
}

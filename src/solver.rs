use log::{debug, info, trace, warn};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::availability::{AvailabilityTracker, WorkloadTracker};
use crate::constraints::{ConstraintCompiler, RuleBook};
use crate::data::{
    AssignmentEntry, ClassroomId, ConstraintRule, GenerationInput, Role, ScheduleOutcome,
    Shortfall, ShortfallReason, StaffId, StaffMember, SubjectId, Timeslot, UnscheduledReason,
    UnscheduledStaff,
};
use crate::demand::DemandModel;
use crate::error::{ConfigError, SolveError};
use crate::preferences::{PreferenceResolver, ResolvedPreferences};

/// Lifecycle of one generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running,
    /// Terminal: the outcome was produced.
    Committed,
    /// Terminal: configuration was rejected or the deadline passed.
    Aborted,
}

/// Everything prepared once per run before allocation starts.
struct Prepared<'a> {
    rules: RuleBook,
    demand: DemandModel,
    preferences: ResolvedPreferences,
    staff: Vec<&'a StaffMember>,
    classrooms: Vec<ClassroomId>,
}

/// Greedy, deterministic allocator of (day, slot, classroom) triples to
/// staff/subject pairs.
///
/// Staff are visited in ascending id, each staff member's preferences in
/// submitted order. A pair keeps taking the earliest free cell (earliest
/// day, then slot, then classroom registration order) until its subject
/// demand is met or one of the role caps is hit.
pub struct Scheduler<'a> {
    input: &'a GenerationInput,
    state: RunState,
    deadline: Option<(Instant, Duration)>,
}

impl<'a> Scheduler<'a> {
    pub fn new(input: &'a GenerationInput) -> Self {
        Self {
            input,
            state: RunState::NotStarted,
            deadline: None,
        }
    }

    /// Aborts the run once `limit` has elapsed from now.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.deadline = Some((Instant::now() + limit, limit));
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Runs the allocation once. `Committed` and `Aborted` are terminal, so a
    /// second call is rejected without touching the state.
    pub fn run(&mut self) -> Result<ScheduleOutcome, SolveError> {
        if self.state != RunState::NotStarted {
            return Err(SolveError::AlreadyFinished { state: self.state });
        }
        self.transition(RunState::Running);
        match self.solve() {
            Ok(outcome) => {
                self.transition(RunState::Committed);
                Ok(outcome)
            }
            Err(err) => {
                warn!(
                    "generation for department {} aborted: {err}",
                    self.input.department_id
                );
                self.transition(RunState::Aborted);
                Err(err)
            }
        }
    }

    fn transition(&mut self, next: RunState) {
        debug!(
            "department {} run: {:?} -> {:?}",
            self.input.department_id, self.state, next
        );
        self.state = next;
    }

    fn prepare(&self) -> Result<Prepared<'a>, ConfigError> {
        let input = self.input;
        input.config.validate()?;

        let demand = DemandModel::from_subjects(&input.subjects)?;

        let mut classrooms = Vec::with_capacity(input.classrooms.len());
        let mut seen = BTreeSet::new();
        for room in &input.classrooms {
            if !seen.insert(room.id) {
                return Err(ConfigError::DuplicateId {
                    kind: "classroom",
                    id: room.id,
                });
            }
            classrooms.push(room.id);
        }

        let mut staff: Vec<&StaffMember> = input.staff.iter().collect();
        staff.sort_by_key(|s| s.id);
        if let Some(pair) = staff.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(ConfigError::DuplicateId {
                kind: "staff",
                id: pair[0].id,
            });
        }

        let roles_in_use: BTreeSet<Role> = staff.iter().map(|s| s.role).collect();
        let rules = ConstraintCompiler::new(input.department_id)
            .compile(&input.constraints, &roles_in_use)?;

        let known = demand.subject_ids();
        let preferences = PreferenceResolver::new(&known).resolve(&input.staff, &input.submissions);

        Ok(Prepared {
            rules,
            demand,
            preferences,
            staff,
            classrooms,
        })
    }

    fn solve(&self) -> Result<ScheduleOutcome, SolveError> {
        let start_time = Instant::now();
        let input = self.input;
        let prepared = self.prepare()?;

        let days = input.config.working_days.len();
        let periods = input.config.periods_per_day as usize;
        info!(
            "Allocating department {}: {} staff, {} subjects, {} classrooms, {} days x {} periods",
            input.department_id,
            prepared.staff.len(),
            input.subjects.len(),
            prepared.classrooms.len(),
            days,
            periods
        );

        // each staff member commits at most one entry per (day, slot) and
        // ends each preference with at most one failed scan
        let step_budget = prepared.staff.len() * days * periods + prepared.preferences.total();
        let mut steps = 0usize;

        let mut tracker = AvailabilityTracker::new(prepared.classrooms.iter().copied());
        let mut workload = WorkloadTracker::default();
        let mut entries = Vec::new();
        let mut shortfalls = Vec::new();
        let mut unscheduled = Vec::new();

        for member in &prepared.staff {
            let preferences = prepared.preferences.for_staff(member.id);
            if preferences.is_empty() {
                debug!("staff {} has no preferences, unscheduled", member.id);
                unscheduled.push(UnscheduledStaff {
                    staff_id: member.id,
                    reason: UnscheduledReason::NoPreferences,
                });
                continue;
            }
            let rule = prepared.rules.rule_for(member.role);

            for &subject_id in preferences {
                self.check_deadline()?;
                let Some(required) = prepared.demand.required_hours(subject_id) else {
                    continue;
                };

                let blocked = loop {
                    if workload.pair_hours(member.id, subject_id) >= required {
                        break None;
                    }
                    if let Some(reason) = cap_reached(&rule, &workload, member.id, subject_id) {
                        break Some(reason);
                    }
                    steps += 1;
                    if steps > step_budget {
                        warn!("step budget {step_budget} exhausted for department {}", input.department_id);
                        break Some(ShortfallReason::CapacityExhausted);
                    }
                    let Some((day, slot, classroom_id)) =
                        self.find_cell(member.id, &tracker, &workload)
                    else {
                        break Some(ShortfallReason::CapacityExhausted);
                    };

                    tracker.occupy(day, slot, classroom_id);
                    workload.record(member.id, subject_id, day, slot);
                    let entry = AssignmentEntry {
                        day: input.config.working_days[day].clone(),
                        time_slot: slot,
                        subject_id,
                        staff_id: member.id,
                        classroom_id,
                    };
                    trace!("committed {entry:?}");
                    entries.push(entry);
                };

                if let Some(reason) = blocked {
                    let shortfall = Shortfall {
                        staff_id: member.id,
                        subject_id,
                        required_hours: required,
                        assigned_hours: workload.pair_hours(member.id, subject_id),
                        reason,
                    };
                    debug!("shortfall {shortfall}");
                    shortfalls.push(shortfall);
                }
            }
        }

        info!(
            "Allocated {} entries with {} shortfalls in {:.2?}",
            entries.len(),
            shortfalls.len(),
            start_time.elapsed()
        );

        Ok(ScheduleOutcome {
            entries,
            shortfalls,
            unscheduled,
        })
    }

    /// Earliest (day, slot) where the staff member is free and some
    /// classroom is too.
    fn find_cell(
        &self,
        staff_id: StaffId,
        tracker: &AvailabilityTracker,
        workload: &WorkloadTracker,
    ) -> Option<(usize, Timeslot, ClassroomId)> {
        let config = &self.input.config;
        (0..config.working_days.len()).find_map(|day| {
            config.periods().find_map(|slot| {
                if workload.is_busy(staff_id, day, slot) {
                    return None;
                }
                tracker
                    .first_free(day, slot)
                    .map(|classroom_id| (day, slot, classroom_id))
            })
        })
    }

    fn check_deadline(&self) -> Result<(), SolveError> {
        match self.deadline {
            Some((deadline, limit)) if Instant::now() >= deadline => Err(SolveError::DeadlineExceeded {
                limit_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            }),
            _ => Ok(()),
        }
    }
}

/// A subject the staff member already teaches only needs hour headroom; a
/// new one also needs a free subject slot.
fn cap_reached(
    rule: &ConstraintRule,
    workload: &WorkloadTracker,
    staff_id: StaffId,
    subject_id: SubjectId,
) -> Option<ShortfallReason> {
    if workload.staff_hours(staff_id) >= rule.max_hours_per_week {
        return Some(ShortfallReason::HourCap);
    }
    if !workload.teaches(staff_id, subject_id)
        && workload.subject_count(staff_id) >= rule.max_subjects as usize
    {
        return Some(ShortfallReason::SubjectCap);
    }
    None
}

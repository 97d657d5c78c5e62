//! Mutable bookkeeping for one generation run: classroom occupancy per
//! (day, slot) and per-staff workload.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::data::{ClassroomId, StaffId, SubjectId, Timeslot};

/// A (working-day index, period) cell of the weekly grid.
pub type SlotKey = (usize, Timeslot);

/// Tracks which classrooms are occupied at each (day, slot).
#[derive(Debug, Clone)]
pub struct AvailabilityTracker {
    /// Classrooms in registration order; this is the scan order.
    classrooms: Vec<ClassroomId>,
    occupied: HashMap<SlotKey, HashSet<ClassroomId>>,
}

impl AvailabilityTracker {
    pub fn new(classrooms: impl IntoIterator<Item = ClassroomId>) -> Self {
        Self {
            classrooms: classrooms.into_iter().collect(),
            occupied: HashMap::new(),
        }
    }

    pub fn is_occupied(&self, day: usize, slot: Timeslot, classroom_id: ClassroomId) -> bool {
        self.occupied
            .get(&(day, slot))
            .is_some_and(|rooms| rooms.contains(&classroom_id))
    }

    /// First unoccupied classroom at (day, slot) in registration order.
    pub fn first_free(&self, day: usize, slot: Timeslot) -> Option<ClassroomId> {
        let taken = self.occupied.get(&(day, slot));
        self.classrooms
            .iter()
            .copied()
            .find(|id| taken.is_none_or(|rooms| !rooms.contains(id)))
    }

    /// Marks a classroom as taken. Returns `false` if it already was.
    pub fn occupy(&mut self, day: usize, slot: Timeslot, classroom_id: ClassroomId) -> bool {
        self.occupied
            .entry((day, slot))
            .or_default()
            .insert(classroom_id)
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied.values().map(HashSet::len).sum()
    }
}

/// Running hour and subject counters per staff member.
#[derive(Debug, Clone, Default)]
pub struct WorkloadTracker {
    hours: HashMap<StaffId, u32>,
    subjects: HashMap<StaffId, BTreeSet<SubjectId>>,
    pair_hours: HashMap<(StaffId, SubjectId), u32>,
    busy: HashSet<(StaffId, SlotKey)>,
}

impl WorkloadTracker {
    pub fn staff_hours(&self, staff_id: StaffId) -> u32 {
        self.hours.get(&staff_id).copied().unwrap_or(0)
    }

    pub fn pair_hours(&self, staff_id: StaffId, subject_id: SubjectId) -> u32 {
        self.pair_hours
            .get(&(staff_id, subject_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn subject_count(&self, staff_id: StaffId) -> usize {
        self.subjects.get(&staff_id).map_or(0, BTreeSet::len)
    }

    pub fn teaches(&self, staff_id: StaffId, subject_id: SubjectId) -> bool {
        self.subjects
            .get(&staff_id)
            .is_some_and(|subjects| subjects.contains(&subject_id))
    }

    pub fn is_busy(&self, staff_id: StaffId, day: usize, slot: Timeslot) -> bool {
        self.busy.contains(&(staff_id, (day, slot)))
    }

    /// Records one taught hour.
    pub fn record(&mut self, staff_id: StaffId, subject_id: SubjectId, day: usize, slot: Timeslot) {
        *self.hours.entry(staff_id).or_default() += 1;
        *self.pair_hours.entry((staff_id, subject_id)).or_default() += 1;
        self.subjects.entry(staff_id).or_default().insert(subject_id);
        self.busy.insert((staff_id, (day, slot)));
    }
}

//! Read-only timetable views sliced from the committed entry list.
//!
//! Every view is a pure function of the entries plus the name directory
//! captured with them, so the four views never disagree with each other.
//! Maps are ordered, which makes serialized output stable across runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::data::{
    AssignmentEntry, ClassroomId, ClassroomKind, GenerationInput, PeriodTiming, StaffId,
    SubjectId, Timeslot,
};

/// day -> slot -> cell
pub type DayGrid<T> = BTreeMap<String, BTreeMap<Timeslot, T>>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub name: String,
    pub kind: ClassroomKind,
}

/// Names captured from the input snapshot of the run that produced a
/// schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Directory {
    pub staff: BTreeMap<StaffId, String>,
    pub subjects: BTreeMap<SubjectId, String>,
    pub classrooms: BTreeMap<ClassroomId, RoomInfo>,
    #[serde(default)]
    pub periods: BTreeMap<Timeslot, PeriodTiming>,
}

impl Directory {
    pub fn from_input(input: &GenerationInput) -> Self {
        Self {
            staff: input.staff.iter().map(|s| (s.id, s.name.clone())).collect(),
            subjects: input.subjects.iter().map(|s| (s.id, s.name.clone())).collect(),
            classrooms: input
                .classrooms
                .iter()
                .map(|c| {
                    let info = RoomInfo {
                        name: c.name.clone(),
                        kind: c.kind(),
                    };
                    (c.id, info)
                })
                .collect(),
            periods: input.config.timings(),
        }
    }

    fn staff_name(&self, id: StaffId) -> String {
        self.staff.get(&id).cloned().unwrap_or_default()
    }

    fn subject_name(&self, id: SubjectId) -> String {
        self.subjects.get(&id).cloned().unwrap_or_default()
    }

    fn classroom_name(&self, id: ClassroomId) -> String {
        self.classrooms
            .get(&id)
            .map(|room| room.name.clone())
            .unwrap_or_default()
    }

    fn classroom_kind(&self, id: ClassroomId) -> ClassroomKind {
        self.classrooms
            .get(&id)
            .map_or(ClassroomKind::Lecture, |room| room.kind)
    }
}

/// One session in the student grid. Several classrooms can run sessions
/// in the same slot, so a student cell holds a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSession {
    pub subject_id: SubjectId,
    pub subject: String,
    pub staff_id: StaffId,
    pub staff: String,
    pub classroom_id: ClassroomId,
    pub classroom: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentView {
    /// Label and wall-clock bounds of each period in the grid.
    pub periods: BTreeMap<Timeslot, PeriodTiming>,
    pub schedule: DayGrid<Vec<StudentSession>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffSession {
    pub subject_id: SubjectId,
    pub subject: String,
    pub classroom_id: ClassroomId,
    pub classroom: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffTimetable {
    pub staff_id: StaffId,
    pub name: String,
    pub schedule: DayGrid<StaffSession>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSession {
    pub subject_id: SubjectId,
    pub subject: String,
    pub staff_id: StaffId,
    pub staff: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassroomTimetable {
    pub classroom_id: ClassroomId,
    pub name: String,
    pub kind: ClassroomKind,
    pub schedule: DayGrid<RoomSession>,
}

/// All four views of one schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableViews {
    pub student: StudentView,
    pub staff: BTreeMap<StaffId, StaffTimetable>,
    pub classroom: BTreeMap<ClassroomId, ClassroomTimetable>,
    pub lab: BTreeMap<ClassroomId, ClassroomTimetable>,
}

pub struct ViewProjector<'a> {
    entries: &'a [AssignmentEntry],
    directory: &'a Directory,
}

impl<'a> ViewProjector<'a> {
    pub fn new(entries: &'a [AssignmentEntry], directory: &'a Directory) -> Self {
        Self { entries, directory }
    }

    pub fn student_view(&self) -> StudentView {
        let mut view = StudentView {
            periods: self.directory.periods.clone(),
            ..StudentView::default()
        };
        for entry in self.entries {
            view.schedule
                .entry(entry.day.clone())
                .or_default()
                .entry(entry.time_slot)
                .or_default()
                .push(StudentSession {
                    subject_id: entry.subject_id,
                    subject: self.directory.subject_name(entry.subject_id),
                    staff_id: entry.staff_id,
                    staff: self.directory.staff_name(entry.staff_id),
                    classroom_id: entry.classroom_id,
                    classroom: self.directory.classroom_name(entry.classroom_id),
                });
        }
        view
    }

    /// `None` when the staff member is not in the directory.
    pub fn staff_view(&self, staff_id: StaffId) -> Option<StaffTimetable> {
        let name = self.directory.staff.get(&staff_id)?.clone();
        let mut timetable = StaffTimetable {
            staff_id,
            name,
            schedule: DayGrid::new(),
        };
        for entry in self.entries.iter().filter(|e| e.staff_id == staff_id) {
            self.place_staff_session(&mut timetable, entry);
        }
        Some(timetable)
    }

    /// Timetables of every staff member that has at least one entry.
    pub fn all_staff(&self) -> BTreeMap<StaffId, StaffTimetable> {
        let mut out: BTreeMap<StaffId, StaffTimetable> = BTreeMap::new();
        for entry in self.entries {
            let timetable = out.entry(entry.staff_id).or_insert_with(|| StaffTimetable {
                staff_id: entry.staff_id,
                name: self.directory.staff_name(entry.staff_id),
                schedule: DayGrid::new(),
            });
            self.place_staff_session(timetable, entry);
        }
        out
    }

    fn place_staff_session(&self, timetable: &mut StaffTimetable, entry: &AssignmentEntry) {
        timetable
            .schedule
            .entry(entry.day.clone())
            .or_default()
            .insert(
                entry.time_slot,
                StaffSession {
                    subject_id: entry.subject_id,
                    subject: self.directory.subject_name(entry.subject_id),
                    classroom_id: entry.classroom_id,
                    classroom: self.directory.classroom_name(entry.classroom_id),
                },
            );
    }

    /// `None` when the classroom is not in the directory.
    pub fn classroom_view(&self, classroom_id: ClassroomId) -> Option<ClassroomTimetable> {
        let info = self.directory.classrooms.get(&classroom_id)?;
        let mut timetable = ClassroomTimetable {
            classroom_id,
            name: info.name.clone(),
            kind: info.kind,
            schedule: DayGrid::new(),
        };
        for entry in self.entries.iter().filter(|e| e.classroom_id == classroom_id) {
            self.place_room_session(&mut timetable, entry);
        }
        Some(timetable)
    }

    /// Timetables of every classroom that has at least one entry.
    pub fn all_classrooms(&self) -> BTreeMap<ClassroomId, ClassroomTimetable> {
        let mut out: BTreeMap<ClassroomId, ClassroomTimetable> = BTreeMap::new();
        for entry in self.entries {
            let timetable = out
                .entry(entry.classroom_id)
                .or_insert_with(|| ClassroomTimetable {
                    classroom_id: entry.classroom_id,
                    name: self.directory.classroom_name(entry.classroom_id),
                    kind: self.directory.classroom_kind(entry.classroom_id),
                    schedule: DayGrid::new(),
                });
            self.place_room_session(timetable, entry);
        }
        out
    }

    fn place_room_session(&self, timetable: &mut ClassroomTimetable, entry: &AssignmentEntry) {
        timetable
            .schedule
            .entry(entry.day.clone())
            .or_default()
            .insert(
                entry.time_slot,
                RoomSession {
                    subject_id: entry.subject_id,
                    subject: self.directory.subject_name(entry.subject_id),
                    staff_id: entry.staff_id,
                    staff: self.directory.staff_name(entry.staff_id),
                },
            );
    }

    /// The classroom view restricted to labs.
    pub fn lab_view(&self) -> BTreeMap<ClassroomId, ClassroomTimetable> {
        self.all_classrooms()
            .into_iter()
            .filter(|(_, timetable)| timetable.kind == ClassroomKind::Lab)
            .collect()
    }

    pub fn project_all(&self) -> TimetableViews {
        let classroom = self.all_classrooms();
        let lab = classroom
            .iter()
            .filter(|(_, timetable)| timetable.kind == ClassroomKind::Lab)
            .map(|(id, timetable)| (*id, timetable.clone()))
            .collect();
        TimetableViews {
            student: self.student_view(),
            staff: self.all_staff(),
            classroom,
            lab,
        }
    }
}

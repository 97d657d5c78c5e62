//! Department timetable engine.
//!
//! Assigns subjects to staff, time slots and classrooms under role-based
//! workload caps and staff preference order, then projects the committed
//! assignment list into student, staff, classroom and lab views.
//!
//! - `constraints`, `preferences`, `demand`, `availability`: per-run inputs
//!   and bookkeeping
//! - `solver`: the allocation pass
//! - `views`: read-only projections of a committed schedule
//! - `selection`, `forms`: how staff preferences are collected
//! - `store`, `service`, `server`: persistence, per-department
//!   serialisation and the HTTP API

pub mod availability;
pub mod constraints;
pub mod data;
pub mod demand;
pub mod error;
pub mod forms;
pub mod preferences;
pub mod selection;
pub mod server;
pub mod service;
pub mod settings;
pub mod solver;
pub mod store;
pub mod views;

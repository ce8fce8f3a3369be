//! Domain model for persisted todo tasks.
//!
//! # Responsibility
//! - Define the task record shared by the store, CRUD service and engine.
//! - Keep validation rules next to the data they protect.
//!
//! # Invariants
//! - Every task is identified by a stable `TaskId` assigned on insert.
//! - Notification flags are only meaningful for the current `date_due`.

pub mod task;

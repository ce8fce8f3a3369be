//! Record store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Define the narrow `TaskStore` contract consumed by the engine and CRUD.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Writes validate task input before touching SQL.
//! - Point reads reject rows that break model invariants; due-date scans skip
//!   and log them so one bad row cannot block every reminder.

pub mod task_repo;

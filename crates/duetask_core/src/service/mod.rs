//! CRUD use-case services.
//!
//! # Responsibility
//! - Validate user input at the boundary before it reaches the store.
//! - Keep CLI/UI callers decoupled from storage details.

pub mod task_service;

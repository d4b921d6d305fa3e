/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `groups`: Groups, invitations, members and roles
/// - `tasks`: Personal and group tasks, confirmation and finalization
/// - `labels`: Per-user labels

pub mod groups;
pub mod health;
pub mod labels;
pub mod tasks;

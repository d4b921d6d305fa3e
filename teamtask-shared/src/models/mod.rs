/// Domain models for TeamTask
///
/// # Models
///
/// - `group`: Groups, roles and the role/permission resolver
/// - `task`: Personal and group tasks, priority mapping and the completion aggregator
/// - `label`: Per-user labels attached to tasks
///
/// Every model here is a plain value. Persistence lives in [`crate::store`].

pub mod group;
pub mod label;
pub mod task;

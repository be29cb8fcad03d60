//! BDD step definitions for logwatch service

pub mod alerting_steps;
pub mod lease_steps;
pub mod rotation_steps;

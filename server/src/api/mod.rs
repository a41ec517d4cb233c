//! HTTP API handlers.
//!
//! - `registrations`: sign-up and live counts
//! - `check_ins`: door scans
//! - `analytics`: post-event summary
//! - `invite_codes`: public event lookup codes

pub mod analytics;
pub mod check_ins;
pub mod invite_codes;
pub mod registrations;

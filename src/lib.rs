//! Terminal dashboard for a remote background-job service.
//!
//! The service owns the jobs; this crate polls it, keeps a local view in step
//! with the server, and shows user actions optimistically until the next
//! snapshot confirms or contradicts them.
//!
//! - `api`: HTTP contract with the job service
//! - `reconciler`: snapshot ordering, pending mutations, poll timers
//! - `views`: pure projections of reconciled state into rows and counters
//! - `dashboard`: per-screen controllers that own a reconciler each
//! - `cli`: the interactive terminal front end

pub mod api;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod logging;
pub mod notify;
pub mod reconciler;
pub mod views;

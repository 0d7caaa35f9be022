//! Change reporting and notification dispatch.
//!
//! A run produces one [`JobState`](job::JobState) per monitored job. The
//! states are collected into a [`Report`](report::Report), filtered by the
//! configured [`DisplayPolicy`](filter::DisplayPolicy) and handed to every
//! enabled channel of a [`ReporterRegistry`](reporters::ReporterRegistry).
pub mod config;
pub mod delivery;
pub mod diff;
pub mod filter;
pub mod job;
pub mod logger;
pub mod report;
pub mod reporters;
pub mod run;

//! housekeeper: file and database housekeeping jobs for a small office.
//!
//! Each module backs one subcommand of the `housekeeper` binary; the
//! remaining modules carry the shared error type, logging and config.

pub mod chat;
pub mod config;
pub mod copy;
pub mod error;
pub mod hash;
pub mod ledger;
pub mod logging;
pub mod payroll;
pub mod platform;
pub mod projects;
pub mod pubspec;
pub mod purge;
pub mod remote;
pub mod report;
pub mod scanner;
pub mod types;

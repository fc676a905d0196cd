//! Report output.

mod generator;

pub use generator::{generate_console_summary, save_reports};

//! I/O utilities for waveform tables.
//!
//! A waveform table is a plain text file holding one raw converter count per
//! line. Blank lines are ignored and `#` starts a comment that runs to the end
//! of the line. The host simulator replays a table through the output channel
//! instead of its built-in sine or ramp generator.

/// File loading and writing for waveform tables.
///
/// Wraps the parser with file access and attaches the path to every error so
/// a bad table is easy to locate from the command line.
pub mod loader;

/// Line-oriented parser for the waveform table format.
///
/// Accepts one unsigned sample per line with optional surrounding whitespace
/// and a trailing comment. Rejects values above the 12-bit converter range
/// and reports the offending line number.
pub mod parser;

pub use loader::{load_table, write_table};
pub use parser::parse_table;

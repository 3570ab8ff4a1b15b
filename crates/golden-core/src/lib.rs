//! Golden-file integration harness for `pcb2gcode`.
//!
//! Runs the program once per scenario, compares the produced tree against
//! the checked-in `expected/` tree, and can patch those trees from the
//! current output.

pub mod common;
pub mod domain;
pub mod modules;

// src/files/mod.rs

//! Input files: named groups of files on disk and the include/exclude
//! matcher that selects a task's inputs from them.

pub mod groups;
pub mod matcher;

pub use groups::{InputFile, InputGroup, InputGroups};
pub use matcher::FileMatcher;

//! File-tree state and rename/selection orchestration for a filesystem-backed
//! AsciiDoc editor.

pub mod boundary;
pub mod config;
pub mod console;
pub mod editor;
pub mod effects;
pub mod error;
pub mod fs;
pub mod handler;
pub mod logging;
pub mod rename;
pub mod search;
pub mod session;
pub mod store;
pub mod tree;

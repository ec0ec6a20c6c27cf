//! File-backed stores: the bracket controller and per-format ladders.

mod bracket_store;
mod ladder_store;

pub use bracket_store::BracketController;
pub use ladder_store::{LadderRegistry, LadderStore, MessageSink, LADDER_HEADER};

use std::fs;
use std::io;
use std::path::Path;

/// Replace `path` atomically: write a sibling temp file, then rename over.
/// Readers never observe a partially written file.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

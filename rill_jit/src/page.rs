//! Executable page management through anonymous mappings

use memmap2::{Mmap, MmapMut};
use rill_common::{RillError, RillResult};

/// Copy `code` into a fresh anonymous mapping and transition it
/// write→read+execute. The returned mapping is unmapped on drop.
pub fn map_executable(code: &[u8]) -> RillResult<Mmap> {
    if code.is_empty() {
        return Err(RillError::jit_error("refusing to map an empty code buffer"));
    }
    let mut page = MmapMut::map_anon(code.len())
        .map_err(|error| RillError::jit_error(format!("map_anon failed: {error}")))?;
    page[..code.len()].copy_from_slice(code);
    page.make_exec()
        .map_err(|error| RillError::jit_error(format!("make_exec failed: {error}")))
}

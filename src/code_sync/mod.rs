//! Code sync between assistant replies and the editor.
//!
//! Assistant text is scanned for fenced blocks (`fence`), one block is chosen
//! by the extraction policy (`router`), and its content replaces the editor
//! content (`editor`).

mod editor;
mod fence;
mod router;

pub use editor::{EditorState, EditorSurface, FileEditor, MemoryEditor};
pub use fence::{FENCE, FencedBlock, has_fence, scan_fences};
pub use router::{CodeExtraction, CodeSyncRouter, code_blocks};

/// Language whose blocks are preferred when syncing code.
pub const DEFAULT_LANGUAGE: &str = "python";

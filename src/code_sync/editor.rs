//! Editor Surface contract and the editor state owned by a session.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// The text-editing widget, seen only through get/set.
pub trait EditorSurface: Send {
    fn value(&self) -> String;
    fn set_value(&mut self, text: &str);
}

/// Editor surface held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryEditor {
    text: String,
}

impl MemoryEditor {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl EditorSurface for MemoryEditor {
    fn value(&self) -> String {
        self.text.clone()
    }

    fn set_value(&mut self, text: &str) {
        self.text = text.to_string();
    }
}

/// Editor surface backed by a scratch file, so an external editor can change
/// the code between runs.
///
/// Reads go to disk unless the last write failed; the last written text is
/// also the fallback when the file cannot be read. Writes land in a staging
/// file next to the target and are renamed over it, so a reader never sees a
/// partial file.
#[derive(Debug, Clone)]
pub struct FileEditor {
    path: PathBuf,
    last_written: String,
    write_failed: bool,
}

impl FileEditor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_written: String::new(),
            write_failed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `.<name>.tmp` beside the scratch file.
    fn staging_path(&self) -> PathBuf {
        let mut name = OsString::from(".");
        name.push(self.path.file_name().unwrap_or_default());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn persist(&self, text: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let staging = self.staging_path();
        std::fs::write(&staging, text)?;
        std::fs::rename(&staging, &self.path).inspect_err(|_| {
            let _ = std::fs::remove_file(&staging);
        })
    }
}

impl EditorSurface for FileEditor {
    fn value(&self) -> String {
        // The file on disk is older than what was last set.
        if self.write_failed {
            return self.last_written.clone();
        }

        match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => self.last_written.clone(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read scratch file");
                self.last_written.clone()
            }
        }
    }

    fn set_value(&mut self, text: &str) {
        self.last_written = text.to_string();

        match self.persist(text) {
            Ok(()) => self.write_failed = false,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to write scratch file");
                self.write_failed = true;
            }
        }
    }
}

/// Editor content plus sidecar visibility for one session.
pub struct EditorState {
    surface: Box<dyn EditorSurface>,
    sidecar_visible: bool,
}

impl EditorState {
    pub fn new(surface: Box<dyn EditorSurface>) -> Self {
        Self {
            surface,
            sidecar_visible: false,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryEditor::default()))
    }

    pub fn code(&self) -> String {
        self.surface.value()
    }

    /// Replace the whole editor content.
    pub fn replace(&mut self, code: &str) {
        self.surface.set_value(code);
    }

    pub fn is_sidecar_visible(&self) -> bool {
        self.sidecar_visible
    }

    pub fn show_sidecar(&mut self) {
        self.sidecar_visible = true;
    }
}

impl std::fmt::Debug for EditorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorState")
            .field("code_len", &self.surface.value().len())
            .field("sidecar_visible", &self.sidecar_visible)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_editor_round_trip() {
        let mut editor = MemoryEditor::new("old");
        editor.set_value("new");
        assert_eq!(editor.value(), "new");
    }

    #[test]
    fn test_file_editor_writes_and_reads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".coder").join("scratch.py");
        let mut editor = FileEditor::new(&path);

        assert_eq!(editor.value(), "");
        editor.set_value("print(1)");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "print(1)");
        assert_eq!(editor.value(), "print(1)");
    }

    #[test]
    fn test_file_editor_sees_external_edits() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scratch.py");
        let mut editor = FileEditor::new(&path);
        editor.set_value("a = 1");

        std::fs::write(&path, "a = 2").unwrap();
        assert_eq!(editor.value(), "a = 2");
    }

    #[test]
    fn test_failed_write_keeps_new_text_over_stale_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scratch.py");
        let mut editor = FileEditor::new(&path);
        editor.set_value("old = 1");

        // A directory in the staging slot makes the next write fail.
        let staging = dir.path().join(".scratch.py.tmp");
        std::fs::create_dir(&staging).unwrap();

        let mut state = EditorState::new(Box::new(editor));
        state.replace("new = 2");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old = 1");
        assert_eq!(state.code(), "new = 2");

        std::fs::remove_dir(&staging).unwrap();
        state.replace("newer = 3");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "newer = 3");
        assert!(!staging.exists());

        std::fs::write(&path, "edited = 4").unwrap();
        assert_eq!(state.code(), "edited = 4");
    }

    #[test]
    fn test_file_editor_missing_parent_directory_is_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("scratch.py");
        let mut editor = FileEditor::new(&path);

        editor.set_value("x = 1");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x = 1");
        assert!(!dir.path().join("a").join("b").join(".scratch.py.tmp").exists());
    }

    #[test]
    fn test_editor_state_replace_and_sidecar() {
        let mut state = EditorState::in_memory();
        assert!(!state.is_sidecar_visible());
        assert_eq!(state.code(), "");

        state.replace("x = 1");
        state.replace("y = 2");
        assert_eq!(state.code(), "y = 2");

        state.show_sidecar();
        assert!(state.is_sidecar_visible());
    }
}

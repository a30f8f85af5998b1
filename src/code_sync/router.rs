use serde::{Deserialize, Serialize};

use super::editor::EditorState;
use super::fence::{FencedBlock, scan_fences};

/// Code pulled out of an assistant reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeExtraction {
    /// Tag of the block the code came from, if it had one.
    pub language: Option<String>,
    /// Block content, trimmed.
    pub code: String,
}

/// Routes code from assistant replies into the editor.
///
/// Policy, applied to the reply's fenced blocks:
/// 1. the first block tagged with the target language
/// 2. otherwise the first block with any tag (or none)
/// 3. otherwise nothing
#[derive(Debug, Clone)]
pub struct CodeSyncRouter {
    language: String,
}

impl CodeSyncRouter {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Apply the extraction policy without touching the editor.
    pub fn extract(&self, text: &str) -> Option<CodeExtraction> {
        let blocks = scan_fences(text);
        let chosen = blocks
            .iter()
            .find(|b| b.is_tagged(&self.language))
            .or_else(|| blocks.first())?;

        let code = chosen.trimmed_body();
        if code.is_empty() {
            return None;
        }

        Some(CodeExtraction {
            language: chosen.tag.map(str::to_string),
            code: code.to_string(),
        })
    }

    /// Extract code and, when found, replace the editor content with it and
    /// show the sidecar. Calling twice with the same text leaves the editor
    /// in the same state.
    pub fn route(&self, text: &str, editor: &mut EditorState) -> Option<CodeExtraction> {
        let extraction = self.extract(text)?;
        editor.replace(&extraction.code);
        editor.show_sidecar();
        tracing::debug!(
            language = extraction.language.as_deref().unwrap_or("none"),
            chars = extraction.code.len(),
            "synced code into editor"
        );
        Some(extraction)
    }
}

impl Default for CodeSyncRouter {
    fn default() -> Self {
        Self::new(super::DEFAULT_LANGUAGE)
    }
}

/// Trimmed content of every fenced block, in order of appearance.
pub fn code_blocks(text: &str) -> Vec<String> {
    scan_fences(text)
        .iter()
        .map(FencedBlock::trimmed_body)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_python_block() {
        let router = CodeSyncRouter::default();
        let got = router.extract("```python\nX\n```").unwrap();
        assert_eq!(got.code, "X");
        assert_eq!(got.language.as_deref(), Some("python"));
    }

    #[test]
    fn test_falls_back_to_generic_block() {
        let router = CodeSyncRouter::default();
        let got = router.extract("Try:\n```\nY\n```").unwrap();
        assert_eq!(got.code, "Y");
        assert_eq!(got.language, None);
    }

    #[test]
    fn test_prefers_python_over_earlier_generic_block() {
        let router = CodeSyncRouter::default();
        let text = "Output:\n```\nY\n```\nCode:\n```python\nX\n```";
        assert_eq!(router.extract(text).unwrap().code, "X");
    }

    #[test]
    fn test_fallback_takes_body_not_tag() {
        let router = CodeSyncRouter::default();
        let got = router.extract("```js\nconsole.log(1)\n```").unwrap();
        assert_eq!(got.code, "console.log(1)");
        assert_eq!(got.language.as_deref(), Some("js"));
    }

    #[test]
    fn test_no_fence_is_empty_result() {
        let router = CodeSyncRouter::default();
        let mut editor = EditorState::in_memory();
        editor.replace("keep me");

        assert!(router.route("No code here.", &mut editor).is_none());
        assert_eq!(editor.code(), "keep me");
        assert!(!editor.is_sidecar_visible());
    }

    #[test]
    fn test_empty_block_is_empty_result() {
        let router = CodeSyncRouter::default();
        assert!(router.extract("```python\n   \n```").is_none());
    }

    #[test]
    fn test_route_replaces_editor_and_shows_sidecar() {
        let router = CodeSyncRouter::default();
        let mut editor = EditorState::in_memory();
        editor.replace("old code\nmore");

        let text = "```python\n  def f():\n    return 1\n```";
        router.route(text, &mut editor).unwrap();
        assert_eq!(editor.code(), "def f():\n    return 1");
        assert!(editor.is_sidecar_visible());

        // Same input, same editor state.
        router.route(text, &mut editor).unwrap();
        assert_eq!(editor.code(), "def f():\n    return 1");
    }

    #[test]
    fn test_custom_target_language() {
        let router = CodeSyncRouter::new("rust");
        let text = "```python\na\n```\n```rust\nfn main() {}\n```";
        assert_eq!(router.extract(text).unwrap().code, "fn main() {}");
    }

    #[test]
    fn test_inline_fence_mention_keeps_python_block() {
        let router = CodeSyncRouter::default();

        let got = router
            .extract("Wrap code in ``` markers like this:\n```python\nprint(1)\n```")
            .unwrap();
        assert_eq!(got.code, "print(1)");
        assert_eq!(got.language.as_deref(), Some("python"));

        let text = "Type ``` then the tag.\n```\nY\n```\n```python\nX\n```";
        assert_eq!(router.extract(text).unwrap().code, "X");
        assert_eq!(code_blocks(text), vec!["Y".to_string(), "X".to_string()]);
    }

    #[test]
    fn test_code_blocks_lists_all() {
        let blocks = code_blocks("```\na\n```\n```python\n b \n```");
        assert_eq!(blocks, vec!["a".to_string(), "b".to_string()]);
    }
}

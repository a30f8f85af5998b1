//! Fenced code block scanning.
//!
//! Fences are line-anchored: a run of three or more backticks opens or
//! closes a block only at the start of a line, after at most three spaces
//! of indent. Backticks inside a sentence are prose. A line that opens with
//! a fence and carries another on the same line is a single-line block
//! (```` ```python x = 1``` ````). Each line is visited once.

/// Fence delimiter used by assistant replies.
pub const FENCE: &str = "```";

const MAX_FENCE_INDENT: usize = 3;

/// A fenced region of assistant text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FencedBlock<'a> {
    /// Language tag from the info string (`python` in ```` ```python ````).
    pub tag: Option<&'a str>,
    /// Raw content between the info string and the closing fence, untrimmed.
    pub body: &'a str,
    /// Byte offset of the opening fence.
    pub offset: usize,
}

impl FencedBlock<'_> {
    /// Whether the block is tagged with `language` (ASCII case-insensitive).
    pub fn is_tagged(&self, language: &str) -> bool {
        self.tag
            .is_some_and(|tag| tag.eq_ignore_ascii_case(language))
    }

    pub fn trimmed_body(&self) -> &str {
        self.body.trim()
    }
}

/// Whether the text contains a fence marker anywhere.
pub fn has_fence(text: &str) -> bool {
    text.contains(FENCE)
}

/// An opening fence still waiting for its close.
struct OpenFence<'a> {
    tag: Option<&'a str>,
    width: usize,
    body_start: usize,
    offset: usize,
}

/// Locate every terminated fenced block, in order of appearance.
///
/// An opening fence without a matching close is ignored.
pub fn scan_fences(text: &str) -> Vec<FencedBlock<'_>> {
    let mut blocks = Vec::new();
    let mut open: Option<OpenFence<'_>> = None;
    let mut line_start = 0;

    for raw in text.split_inclusive('\n') {
        let start = line_start;
        line_start += raw.len();
        let line = raw.trim_end_matches(['\n', '\r']);

        if let Some(fence) = open.take() {
            match closing_end(line, fence.width) {
                Some(end) => blocks.push(FencedBlock {
                    tag: fence.tag,
                    body: &text[fence.body_start..start + end],
                    offset: fence.offset,
                }),
                None => open = Some(fence),
            }
            continue;
        }

        let Some((indent, width)) = fence_run(line) else {
            continue;
        };
        let info_start = indent + width;
        let info = &line[info_start..];

        match info.find(FENCE) {
            Some(close) => blocks.push(single_line_block(&info[..close], start + indent)),
            None => {
                open = Some(OpenFence {
                    tag: info.split_whitespace().next(),
                    width,
                    body_start: line_start,
                    offset: start + indent,
                })
            }
        }
    }

    blocks
}

/// Indent and backtick count of a fence at the start of `line`.
fn fence_run(line: &str) -> Option<(usize, usize)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > MAX_FENCE_INDENT {
        return None;
    }
    let rest = &line[indent..];
    let width = rest.len() - rest.trim_start_matches('`').len();
    (width >= FENCE.len()).then_some((indent, width))
}

/// Where the body ends within `line` if it closes a fence of `width`.
///
/// Either a fence line of its own (at least `width` backticks, nothing but
/// whitespace after) or a code line ending in the fence, in which case the
/// body keeps the code.
fn closing_end(line: &str, width: usize) -> Option<usize> {
    if let Some((indent, run)) = fence_run(line)
        && run >= width
        && line[indent + run..].trim().is_empty()
    {
        return Some(0);
    }

    let trimmed = line.trim_end();
    let code = trimmed.trim_end_matches('`');
    let trailing = trimmed.len() - code.len();
    (trailing >= width && !code.trim().is_empty()).then_some(code.len())
}

/// Split a single-line block into tag and body.
///
/// The first word is a tag only when more content follows it.
fn single_line_block(inner: &str, offset: usize) -> FencedBlock<'_> {
    if inner.starts_with(char::is_whitespace) {
        return FencedBlock {
            tag: None,
            body: inner,
            offset,
        };
    }

    match inner.split_once(char::is_whitespace) {
        Some((tag, rest)) if !rest.trim().is_empty() => FencedBlock {
            tag: Some(tag),
            body: rest,
            offset,
        },
        _ => FencedBlock {
            tag: None,
            body: inner,
            offset,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_tagged_block() {
        let blocks = scan_fences("Here:\n```python\nprint(1)\n```\nDone.");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].tag, Some("python"));
        assert_eq!(blocks[0].body, "print(1)\n");
        assert_eq!(blocks[0].offset, 6);
    }

    #[test]
    fn test_scan_untagged_block() {
        let blocks = scan_fences("```\nY\n```");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].tag, None);
        assert_eq!(blocks[0].trimmed_body(), "Y");
    }

    #[test]
    fn test_scan_multiple_blocks_in_order() {
        let text = "```js\na()\n```\ntext\n```python\nb()\n```";
        let blocks = scan_fences(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].tag, Some("js"));
        assert_eq!(blocks[1].tag, Some("python"));
        assert_eq!(blocks[1].trimmed_body(), "b()");
    }

    #[test]
    fn test_info_string_extra_words_are_ignored() {
        let blocks = scan_fences("```python title=\"x.py\"\ncode\n```");
        assert_eq!(blocks[0].tag, Some("python"));
        assert_eq!(blocks[0].trimmed_body(), "code");
    }

    #[test]
    fn test_single_line_blocks() {
        let tagged = scan_fences("```python x = 1```");
        assert_eq!(tagged[0].tag, Some("python"));
        assert_eq!(tagged[0].trimmed_body(), "x = 1");

        let bare = scan_fences("```print(1)```");
        assert_eq!(bare[0].tag, None);
        assert_eq!(bare[0].body, "print(1)");

        let spaced = scan_fences("``` x = 1 ```");
        assert_eq!(spaced[0].tag, None);
        assert_eq!(spaced[0].trimmed_body(), "x = 1");
    }

    #[test]
    fn test_unterminated_fence_is_ignored() {
        assert!(scan_fences("```python\nprint(1)\n").is_empty());

        let blocks = scan_fences("```\na\n```\n```python\nnever closed");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].trimmed_body(), "a");
    }

    #[test]
    fn test_no_fences() {
        assert!(scan_fences("just prose").is_empty());
        assert!(!has_fence("just prose"));
        assert!(has_fence("unterminated ``` marker"));
    }

    #[test]
    fn test_is_tagged_case_insensitive() {
        let blocks = scan_fences("```Python\nx\n```");
        assert!(blocks[0].is_tagged("python"));
        assert!(!blocks[0].is_tagged("py"));
    }

    #[test]
    fn test_inline_marker_in_prose_does_not_open_block() {
        let blocks = scan_fences("Wrap code in ``` markers like this:\n```python\nprint(1)\n```");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].tag, Some("python"));
        assert_eq!(blocks[0].trimmed_body(), "print(1)");

        let blocks = scan_fences("Type ``` then the tag.\n```\nY\n```\n```python\nX\n```");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].trimmed_body(), "Y");
        assert_eq!(blocks[1].tag, Some("python"));
        assert_eq!(blocks[1].trimmed_body(), "X");
    }

    #[test]
    fn test_fence_indent_limit() {
        let blocks = scan_fences("   ```python\nx = 1\n   ```");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].offset, 3);
        assert_eq!(blocks[0].trimmed_body(), "x = 1");

        assert!(scan_fences("    ```python\nx = 1\n    ```").is_empty());
    }

    #[test]
    fn test_backticks_inside_body_do_not_close() {
        let text = "```python\ns = 'use ``` for fences'\n    ```\n```";
        let blocks = scan_fences(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            blocks[0].trimmed_body(),
            "s = 'use ``` for fences'\n    ```"
        );
    }

    #[test]
    fn test_close_on_code_line() {
        let blocks = scan_fences("```python\nprint(1)```\nafter");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].body, "print(1)");
    }

    #[test]
    fn test_longer_fence_needs_matching_close() {
        let text = "````markdown\n```python\nx\n```\n````";
        let blocks = scan_fences(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].tag, Some("markdown"));
        assert_eq!(blocks[0].trimmed_body(), "```python\nx\n```");
    }

    #[test]
    fn test_crlf_line_endings() {
        let blocks = scan_fences("```python\r\nprint(1)\r\n```\r\n");
        assert_eq!(blocks[0].tag, Some("python"));
        assert_eq!(blocks[0].trimmed_body(), "print(1)");
    }

    #[test]
    fn test_many_fences_scan_linearly() {
        let text = "```\nx\n".repeat(10_001);
        let blocks = scan_fences(&text);
        assert_eq!(blocks.len(), 5_000);

        let prose = "a ``` b ``` c\n".repeat(10_000);
        assert!(scan_fences(&prose).is_empty());
    }
}

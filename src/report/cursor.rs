//! Whitespace token cursor over report text.
//!
//! The analysis report is token-oriented rather than line-oriented: function
//! blocks and argument records are recognized token by token with a lookahead
//! of one. This cursor makes that state explicit and keeps enough position
//! information to report the line of a malformed token.

/// Cursor over a report string, yielding whitespace-delimited tokens.
#[derive(Debug, Clone)]
pub struct TokenCursor<'a> {
    input: &'a str,
    /// Byte offset of the next unread character
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    /// Create a cursor at the start of `input`.
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Read the next whitespace-delimited token.
    ///
    /// Returns `None` once only whitespace (or nothing) remains.
    pub fn next_token(&mut self) -> Option<&'a str> {
        let rest = &self.input[self.pos..];
        let start = rest.find(|c: char| !c.is_whitespace())?;
        let token = &rest[start..];
        let end = token.find(char::is_whitespace).unwrap_or(token.len());
        self.pos += start + end;
        Some(&token[..end])
    }

    /// Advance past the next occurrence of `ch`, discarding everything
    /// before it.
    ///
    /// Returns `false` when `ch` does not occur in the remaining input; the
    /// cursor is then positioned at end-of-input.
    pub fn seek_past(&mut self, ch: char) -> bool {
        match self.input[self.pos..].find(ch) {
            Some(offset) => {
                self.pos += offset + ch.len_utf8();
                true
            }
            None => {
                self.pos = self.input.len();
                false
            }
        }
    }

    /// 1-based line number of the current position, for diagnostics.
    #[must_use]
    pub fn line(&self) -> usize {
        self.input[..self.pos].bytes().filter(|&b| b == b'\n').count() + 1
    }

    /// Whether only whitespace (or nothing) remains.
    #[must_use]
    pub fn at_end(&self) -> bool {
        self.input[self.pos..].chars().all(char::is_whitespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_across_lines() {
        let mut cur = TokenCursor::new("Memory Effect:\n  ArgMemOnly");
        assert_eq!(cur.next_token(), Some("Memory"));
        assert_eq!(cur.next_token(), Some("Effect:"));
        assert_eq!(cur.next_token(), Some("ArgMemOnly"));
        assert_eq!(cur.next_token(), None);
    }

    #[test]
    fn test_empty_input() {
        let mut cur = TokenCursor::new("");
        assert!(cur.at_end());
        assert_eq!(cur.next_token(), None);
    }

    #[test]
    fn test_whitespace_only_input() {
        let mut cur = TokenCursor::new("  \t\n  ");
        assert_eq!(cur.next_token(), None);
        assert!(cur.at_end());
    }

    #[test]
    fn test_seek_past_found() {
        let mut cur = TokenCursor::new("prefix junk (@vec_add): rest");
        assert!(cur.seek_past('@'));
        assert_eq!(cur.next_token(), Some("vec_add):"));
    }

    #[test]
    fn test_seek_past_not_found() {
        let mut cur = TokenCursor::new("no marker here");
        assert!(!cur.seek_past('@'));
        assert!(cur.at_end());
        assert_eq!(cur.next_token(), None);
    }

    #[test]
    fn test_seek_past_at_token_boundary() {
        // '@' immediately followed by whitespace: the name is the next token.
        let mut cur = TokenCursor::new("header @ name): tail");
        assert!(cur.seek_past('@'));
        assert_eq!(cur.next_token(), Some("name):"));
    }

    #[test]
    fn test_line_tracking() {
        let mut cur = TokenCursor::new("one\ntwo\nthree");
        assert_eq!(cur.line(), 1);
        cur.next_token();
        assert_eq!(cur.line(), 1);
        cur.next_token();
        assert_eq!(cur.line(), 2);
        cur.next_token();
        assert_eq!(cur.line(), 3);
    }

    #[test]
    fn test_consumed_input_is_not_revisited() {
        let mut cur = TokenCursor::new("a @ b @ c");
        assert!(cur.seek_past('@'));
        assert_eq!(cur.next_token(), Some("b"));
        assert!(cur.seek_past('@'));
        assert_eq!(cur.next_token(), Some("c"));
        assert!(!cur.seek_past('@'));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// next_token never panics and terminates on arbitrary input
        #[test]
        fn prop_next_token_never_panics(input in ".*") {
            let mut cur = TokenCursor::new(&input);
            while cur.next_token().is_some() {}
            prop_assert!(cur.at_end());
        }

        /// tokens never contain whitespace and are never empty
        #[test]
        fn prop_tokens_are_nonempty_words(input in ".*") {
            let mut cur = TokenCursor::new(&input);
            while let Some(tok) = cur.next_token() {
                prop_assert!(!tok.is_empty());
                prop_assert!(!tok.contains(char::is_whitespace));
            }
        }

        /// seek_past lands immediately after the marker when present
        #[test]
        fn prop_seek_past_consumes_marker(input in "[a-z ]*@[a-z ]*") {
            let mut cur = TokenCursor::new(&input);
            prop_assert!(cur.seek_past('@'));
            prop_assert!(!cur.seek_past('@'));
        }
    }
}

//! Boundary-aware lexical scanning.
//!
//! Rewriters never look inside comments or literals. [`Scan`] lexes the
//! source once, records the byte ranges of every comment and string, rune or
//! raw string literal, and answers questions about the remaining code bytes.

use std::ops::Range;

use crate::error::RewriteError;

pub struct Scan<'a> {
    src: &'a str,
    /// Sorted, disjoint ranges covered by comments and literals.
    skipped: Vec<Range<usize>>,
}

pub fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn closer(open: u8) -> Option<u8> {
    match open {
        b'(' => Some(b')'),
        b'[' => Some(b']'),
        b'{' => Some(b'}'),
        _ => None,
    }
}

impl<'a> Scan<'a> {
    pub fn new(src: &'a str) -> Result<Self, RewriteError> {
        let bytes = src.as_bytes();
        let mut skipped = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            let start = i;
            match bytes[i] {
                b'/' if bytes.get(i + 1) == Some(&b'/') => {
                    i = memchr(bytes, b'\n', i).unwrap_or(bytes.len());
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    i = src[i + 2..]
                        .find("*/")
                        .map(|end| i + 2 + end + 2)
                        .ok_or_else(|| RewriteError::syntax(start, "unterminated block comment"))?;
                }
                b'`' => {
                    i = memchr(bytes, b'`', i + 1)
                        .map(|end| end + 1)
                        .ok_or_else(|| RewriteError::syntax(start, "unterminated raw string literal"))?;
                }
                quote @ (b'"' | b'\'') => {
                    i += 1;
                    loop {
                        match bytes.get(i) {
                            Some(b'\\') => i += 2,
                            Some(&b) if b == quote => {
                                i += 1;
                                break;
                            }
                            Some(b'\n') | None => {
                                let what = if quote == b'"' { "string" } else { "rune" };
                                return Err(RewriteError::syntax(
                                    start,
                                    format!("unterminated {what} literal"),
                                ));
                            }
                            Some(_) => i += 1,
                        }
                    }
                }
                _ => {
                    i += 1;
                    continue;
                }
            }
            skipped.push(start..i);
        }
        Ok(Self { src, skipped })
    }

    pub fn source(&self) -> &'a str {
        self.src
    }

    pub fn len(&self) -> usize {
        self.src.len()
    }

    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }

    fn byte(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(offset).copied()
    }

    fn skipped_at(&self, offset: usize) -> Option<&Range<usize>> {
        let index = self.skipped.partition_point(|r| r.end <= offset);
        self.skipped.get(index).filter(|r| r.start <= offset)
    }

    pub fn is_code(&self, offset: usize) -> bool {
        offset < self.src.len() && self.skipped_at(offset).is_none()
    }

    /// Code bytes in `range`, with comments and literals stepped over.
    pub fn code_bytes(&self, range: Range<usize>) -> impl Iterator<Item = (usize, u8)> + '_ {
        let mut i = range.start;
        let end = range.end.min(self.src.len());
        std::iter::from_fn(move || {
            while i < end {
                if let Some(skip) = self.skipped_at(i) {
                    i = skip.end;
                    continue;
                }
                let at = i;
                i += 1;
                return Some((at, self.src.as_bytes()[at]));
            }
            None
        })
    }

    /// Offsets of `keyword` in code, bounded by non-identifier bytes on both sides.
    pub fn keywords(&self, keyword: &str) -> Vec<usize> {
        self.src
            .match_indices(keyword)
            .map(|(at, _)| at)
            .filter(|&at| self.is_keyword_at(at, keyword))
            .collect()
    }

    pub fn is_keyword_at(&self, at: usize, keyword: &str) -> bool {
        self.src[at..].starts_with(keyword)
            && self.is_code(at)
            && !at
                .checked_sub(1)
                .and_then(|prev| self.byte(prev))
                .is_some_and(is_ident_byte)
            && !self.byte(at + keyword.len()).is_some_and(is_ident_byte)
    }

    /// True when only spaces or tabs separate `offset` from the start of a
    /// statement (start of file, a newline, `{`, `}`, `;` or a case colon).
    pub fn at_statement_start(&self, offset: usize) -> bool {
        let before = self.src[..offset].trim_end_matches([' ', '\t']);
        match before.as_bytes().last() {
            None | Some(b'\n' | b'{' | b'}' | b';') => true,
            Some(b':') => self.is_code(before.len() - 1),
            _ => false,
        }
    }

    /// Offset of the delimiter closing the one at `open`.
    pub fn matching_close(&self, open: usize) -> Result<usize, RewriteError> {
        let unbalanced = || {
            let delimiter = self.byte(open).map(char::from).unwrap_or('?');
            RewriteError::syntax(open, format!("unbalanced `{delimiter}`"))
        };
        let mut stack = Vec::new();
        for (at, b) in self.code_bytes(open..self.src.len()) {
            if let Some(close) = closer(b) {
                stack.push(close);
            } else if matches!(b, b')' | b']' | b'}') {
                if stack.pop() != Some(b) {
                    return Err(unbalanced());
                }
                if stack.is_empty() {
                    return Ok(at);
                }
            }
        }
        Err(unbalanced())
    }

    /// First offset of `needle` in `range` that is code at nesting depth zero.
    pub fn find_top_level(&self, range: Range<usize>, needle: &str) -> Option<usize> {
        let first = needle.as_bytes()[0];
        let mut depth = 0usize;
        for (at, b) in self.code_bytes(range.clone()) {
            if depth == 0 && b == first && self.src[at..range.end].starts_with(needle) {
                return Some(at);
            }
            match b {
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        None
    }

    /// First plain assignment `=` at depth zero (not `==`, `!=`, `<=`, `>=`,
    /// `:=`, `=>` or an operator-assignment).
    pub fn find_assign(&self, range: Range<usize>) -> Option<usize> {
        let mut depth = 0usize;
        for (at, b) in self.code_bytes(range.clone()) {
            match b {
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                b'=' if depth == 0 => {
                    let prev = at.checked_sub(1).and_then(|p| self.byte(p));
                    let next = self.byte(at + 1);
                    let compound = prev.is_some_and(|p| b"=!<>:+-*/%&|^".contains(&p));
                    if !compound && !matches!(next, Some(b'=' | b'>')) {
                        return Some(at);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Split `range` at every depth-zero `sep`, trimming whitespace.
    pub fn split_top_level(&self, range: Range<usize>, sep: u8) -> Vec<Range<usize>> {
        let mut parts = Vec::new();
        let mut depth = 0usize;
        let mut start = range.start;
        for (at, b) in self.code_bytes(range.clone()) {
            match b {
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                _ if b == sep && depth == 0 => {
                    parts.push(self.trim(start..at));
                    start = at + 1;
                }
                _ => {}
            }
        }
        parts.push(self.trim(start..range.end));
        parts
    }

    /// Shrink `range` past leading and trailing whitespace.
    pub fn trim(&self, range: Range<usize>) -> Range<usize> {
        let text = &self.src[range.clone()];
        let start = range.start + (text.len() - text.trim_start().len());
        let end = range.end - (text.len() - text.trim_end().len());
        start..end.max(start)
    }

    /// Skip spaces and tabs.
    pub fn skip_space(&self, mut offset: usize) -> usize {
        while matches!(self.byte(offset), Some(b' ' | b'\t')) {
            offset += 1;
        }
        offset
    }

    /// Skip whitespace, newlines, comments and any byte in `extra`.
    pub fn skip_trivia(&self, mut offset: usize, end: usize, extra: &[u8]) -> usize {
        while offset < end {
            match self.byte(offset) {
                Some(b) if b.is_ascii_whitespace() || extra.contains(&b) => offset += 1,
                Some(b'/') => match self.skipped_at(offset) {
                    Some(comment) if comment.start == offset => offset = comment.end,
                    _ => break,
                },
                _ => break,
            }
        }
        offset
    }

    /// True when nothing but whitespace or a comment follows `offset` on its line.
    pub fn rest_of_line_is_blank(&self, offset: usize) -> bool {
        let end = memchr(self.src.as_bytes(), b'\n', offset).unwrap_or(self.src.len());
        self.skip_trivia(offset, end, &[]) >= end
    }

    /// Identifier starting exactly at `offset`.
    pub fn ident_at(&self, offset: usize) -> Option<Range<usize>> {
        if !self.byte(offset).is_some_and(is_ident_start) || !self.is_code(offset) {
            return None;
        }
        let len = self.src.as_bytes()[offset..]
            .iter()
            .take_while(|&&b| is_ident_byte(b))
            .count();
        Some(offset..offset + len)
    }

    /// Every identifier token in code.
    pub fn identifiers(&self) -> Vec<&'a str> {
        let mut out = Vec::new();
        let mut iter = self.code_bytes(0..self.src.len()).peekable();
        while let Some((at, b)) = iter.next() {
            let boundary = at
                .checked_sub(1)
                .and_then(|p| self.byte(p))
                .is_none_or(|p| !is_ident_byte(p));
            if is_ident_start(b) && boundary {
                let range = self.ident_at(at).unwrap_or(at..at + 1);
                while iter.peek().is_some_and(|&(next, _)| next < range.end) {
                    iter.next();
                }
                out.push(&self.src[range]);
            }
        }
        out
    }

    pub fn line_start(&self, offset: usize) -> usize {
        self.src[..offset].rfind('\n').map_or(0, |nl| nl + 1)
    }

    /// Leading whitespace of the line containing `offset`.
    pub fn indent_of(&self, offset: usize) -> &'a str {
        let start = self.line_start(offset);
        let line = &self.src[start..];
        let len = line.len() - line.trim_start_matches([' ', '\t']).len();
        &self.src[start..start + len]
    }
}

fn memchr(bytes: &[u8], needle: u8, from: usize) -> Option<usize> {
    bytes[from.min(bytes.len())..]
        .iter()
        .position(|&b| b == needle)
        .map(|i| from + i)
}

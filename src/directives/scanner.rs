//! Balanced `{{...}}` scanner.
//!
//! Occurrences are found with a stack of open positions, so a directive whose
//! body contains other directives is one span that encloses theirs. Input is
//! handled best-effort:
//!
//! - an unclosed `{{` is literal text;
//! - a `}}` with nothing open is literal text;
//! - in an odd run of `{` the first brace is literal;
//! - in an odd run of `}` the first brace closes a single `{` left open in
//!   the body; with none open, the span closes at the first `}}`. So
//!   `{{{x}}}` holds the span `{{x}}` between two literal braces and
//!   `{"a": {{input}}}` holds `{{input}}`.

/// Byte range of one `{{...}}` occurrence, delimiters included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Text of the whole occurrence.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    /// Text between the outer delimiters.
    pub fn interior<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start + 2..self.end - 2]
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Every balanced occurrence in `text`, ordered by start offset. Enclosing
/// spans come before the spans they contain.
pub fn scan(text: &str) -> Vec<Span> {
    let bytes = text.as_bytes();
    // Open positions, with the number of single `{` still open in each body.
    let mut open: Vec<(usize, usize)> = Vec::new();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let pair = bytes.get(i + 1) == Some(&bytes[i]);
        match bytes[i] {
            b'{' if pair && run_length(bytes, i, b'{') % 2 == 0 => {
                open.push((i, 0));
                i += 2;
            }
            b'{' => {
                if let Some((_, singles)) = open.last_mut() {
                    *singles += 1;
                }
                i += 1;
            }
            b'}' if pair => {
                let odd = run_length(bytes, i, b'}') % 2 == 1;
                // `{{a:{b}}}`: the first brace belongs to the body.
                if odd && open.last().is_some_and(|&(_, singles)| singles > 0) {
                    if let Some((_, singles)) = open.last_mut() {
                        *singles -= 1;
                    }
                    i += 1;
                } else if let Some((start, _)) = open.pop() {
                    spans.push(Span { start, end: i + 2 });
                    i += 2;
                } else {
                    i += 1;
                }
            }
            b'}' => {
                if let Some((_, singles)) = open.last_mut() {
                    *singles = singles.saturating_sub(1);
                }
                i += 1;
            }
            _ => i += 1,
        }
    }

    spans.sort_by_key(|s| s.start);
    spans
}

fn run_length(bytes: &[u8], from: usize, b: u8) -> usize {
    bytes[from..].iter().take_while(|&&c| c == b).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(text: &str) -> Vec<&str> {
        scan(text).iter().map(|s| s.text(text)).collect()
    }

    #[test]
    fn test_flat_occurrences() {
        assert_eq!(
            texts("a {{date}} b {{time}}"),
            vec!["{{date}}", "{{time}}"]
        );
    }

    #[test]
    fn test_nested_occurrences() {
        let text = "{{cutoff 3:{{get x}}}}";
        assert_eq!(texts(text), vec![text, "{{get x}}"]);
        let spans = scan(text);
        assert!(spans[0].contains(&spans[1]));
        assert_eq!(spans[0].interior(text), "cutoff 3:{{get x}}");
    }

    #[test]
    fn test_unclosed_is_literal() {
        assert!(scan("{{date").is_empty());
        assert_eq!(texts("{{ {{date}}"), vec!["{{date}}"]);
    }

    #[test]
    fn test_stray_close_is_literal() {
        assert_eq!(texts("}} {{date}} }}"), vec!["{{date}}"]);
    }

    #[test]
    fn test_triple_braces() {
        assert_eq!(texts("{{{x}}}"), vec!["{{x}}"]);
    }

    #[test]
    fn test_single_braces_inside_body() {
        let text = "{{ignore:{a}}}";
        assert_eq!(texts(text), vec![text]);
    }

    #[test]
    fn test_literal_brace_after_directive() {
        assert_eq!(texts(r#"{"a": {{input}}}"#), vec!["{{input}}"]);
        assert_eq!(texts("{x: {{get v}}}"), vec!["{{get v}}"]);
        assert_eq!(texts("{{cutoff 2:abc}}}"), vec!["{{cutoff 2:abc}}"]);
        assert_eq!(texts("{{user}}}"), vec!["{{user}}"]);
    }

    #[test]
    fn test_single_brace_closed_inside_odd_run() {
        let text = "{{a:{b}}} }";
        assert_eq!(texts(text), vec!["{{a:{b}}}"]);
        let text = "{{x {{{y}}}}}";
        assert_eq!(texts(text), vec![text, "{{y}}"]);
    }

    #[test]
    fn test_multibyte_text() {
        let text = "héllo {{user}} wörld";
        assert_eq!(texts(text), vec!["{{user}}"]);
    }
}

//! Directive pattern dialect.
//!
//! Directive keys are written the way users write them in custom directive
//! documents: `{` and `}` are literal text unless they form a counted
//! repetition such as `{2}`, `{2,}` or `{2,5}` following something
//! repeatable. The `regex` crate treats every unescaped brace as syntax, so
//! keys are translated before compilation.
//!
//! Compiled patterns are anchored to a whole occurrence: they are matched
//! against one `{{...}}` span found by the scanner, never searched for inside
//! free text.

use regex::Regex;

use crate::error::Result;

/// Escape literal braces in `pattern` so it compiles with the `regex` crate.
///
/// Escapes and character classes are copied through untouched.
pub fn translate(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut in_class = false;
    // Whether the previous token can carry a repetition operator.
    let mut repeatable = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\\' {
            out.push(c);
            if let Some(&next) = chars.get(i + 1) {
                out.push(next);
                i += 1;
            }
            repeatable = true;
            i += 1;
            continue;
        }

        if in_class {
            if c == ']' {
                in_class = false;
                repeatable = true;
            }
            out.push(c);
            i += 1;
            continue;
        }

        match c {
            '[' => {
                in_class = true;
                out.push(c);
                // A leading `]` or `^]` is a literal member of the class.
                if chars.get(i + 1) == Some(&'^') {
                    out.push('^');
                    i += 1;
                }
                if chars.get(i + 1) == Some(&']') {
                    out.push(']');
                    i += 1;
                }
            }
            '{' => {
                let len = if repeatable {
                    counted_repetition_len(&chars[i..])
                } else {
                    None
                };
                match len {
                    Some(len) => {
                        out.extend(&chars[i..i + len]);
                        i += len;
                        repeatable = false;
                        continue;
                    }
                    None => {
                        out.push_str("\\{");
                        repeatable = true;
                    }
                }
            }
            '}' => {
                out.push_str("\\}");
                repeatable = true;
            }
            '(' | '|' => {
                out.push(c);
                repeatable = false;
            }
            '*' | '+' | '?' => {
                out.push(c);
                repeatable = false;
            }
            _ => {
                out.push(c);
                repeatable = true;
            }
        }
        i += 1;
    }

    out
}

/// Length of a counted repetition (`{n}`, `{n,}`, `{n,m}`) at the start of
/// `chars`, including both braces.
fn counted_repetition_len(chars: &[char]) -> Option<usize> {
    let mut i = 1;
    let digits_start = i;
    while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
        i += 1;
    }
    if i == digits_start {
        return None;
    }
    if chars.get(i) == Some(&',') {
        i += 1;
        while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
    }
    if chars.get(i) == Some(&'}') {
        Some(i + 1)
    } else {
        None
    }
}

/// Compile a directive key into a regex anchored to a whole occurrence.
pub fn compile(pattern: &str) -> Result<Regex> {
    let anchored = format!(r"\A(?:{})\z", translate(pattern));
    Ok(Regex::new(&anchored)?)
}

//! Date and time rendering for the clock directives.
//!
//! Formats use Unicode date pattern letters (`yyyy`, `MMMM`, `d`, `HH`,
//! `mm`, `a`, ...). Text in single quotes is copied literally and `''` is a
//! single quote. Letters without a meaning here are copied as-is.

use chrono::{DateTime, Datelike, TimeZone, Timelike};

/// Default `{{date}}` format.
pub const DEFAULT_DATE_FORMAT: &str = "MMMM d, yyyy";

/// Default `{{time}}` format.
pub const DEFAULT_TIME_FORMAT: &str = "HH:mm:s a";

/// Render `moment` with a Unicode date pattern.
pub fn format_unicode<Tz>(pattern: &str, moment: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            i += 1;
            while i < chars.len() && chars[i] != '\'' {
                out.push(chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }

        if !c.is_ascii_alphabetic() {
            out.push(c);
            i += 1;
            continue;
        }

        let run = chars[i..].iter().take_while(|&&x| x == c).count();
        out.push_str(&render_field(c, run, moment));
        i += run;
    }

    out
}

fn render_field<Tz>(letter: char, width: usize, moment: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    match letter {
        'y' if width == 2 => format!("{:02}", moment.year().rem_euclid(100)),
        'y' => format!("{:0width$}", moment.year(), width = width),
        'M' | 'L' => match width {
            1 => moment.month().to_string(),
            2 => format!("{:02}", moment.month()),
            3 => moment.format("%b").to_string(),
            _ => moment.format("%B").to_string(),
        },
        'd' => pad(moment.day(), width),
        'E' if width >= 4 => moment.format("%A").to_string(),
        'E' => moment.format("%a").to_string(),
        'H' => pad(moment.hour(), width),
        'h' => pad(moment.hour12().1, width),
        'm' => pad(moment.minute(), width),
        's' => pad(moment.second(), width),
        'a' => moment.format("%p").to_string(),
        other => other.to_string().repeat(width),
    }
}

fn pad(value: u32, width: usize) -> String {
    if width >= 2 {
        format!("{:02}", value)
    } else {
        value.to_string()
    }
}

/// English name of the weekday of `moment`.
pub fn day_name<Tz>(moment: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    moment.format("%A").to_string()
}

//! Loose statement dates to calendar dates, and record titles.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::warn;

use fundsync_core::CanonicalDate;

/// Which capture groups hold what.
#[derive(Clone, Copy)]
enum Layout {
    YearMonthDay,
    MonthDay,
    MonthDayYear,
}

struct Family {
    pattern: Lazy<Regex>,
    layout: Layout,
}

/// Tried in order; the first family with an accepted candidate decides.
static FAMILIES: [Family; 4] = [
    Family {
        pattern: Lazy::new(|| Regex::new(r"([0-9]{4})[-年]([0-9]{1,2})[-月]([0-9]{1,2})日?").unwrap()),
        layout: Layout::YearMonthDay,
    },
    Family {
        pattern: Lazy::new(|| Regex::new(r"([0-9]{1,2})[-月]([0-9]{1,2})日?").unwrap()),
        layout: Layout::MonthDay,
    },
    Family {
        pattern: Lazy::new(|| Regex::new(r"([0-9]{4})-([0-9]{1,2})-([0-9]{1,2})").unwrap()),
        layout: Layout::YearMonthDay,
    },
    Family {
        pattern: Lazy::new(|| Regex::new(r"([0-9]{1,2})-([0-9]{1,2})-([0-9]{4})").unwrap()),
        layout: Layout::MonthDayYear,
    },
];

/// A candidate must not be a slice of a longer number: no digit or
/// `<digit>-` right before it, and no digit or `-<digit>` right after it.
fn is_standalone(text: &str, start: usize, end: usize) -> bool {
    let mut before = text[..start].chars().rev();
    match before.next() {
        Some(c) if c.is_ascii_digit() => return false,
        Some('-') if before.next().is_some_and(|c| c.is_ascii_digit()) => return false,
        _ => {}
    }
    let mut rest = text[end..].chars();
    match rest.next() {
        Some(c) if c.is_ascii_digit() => false,
        Some('-') => !rest.next().is_some_and(|c| c.is_ascii_digit()),
        _ => true,
    }
}

fn first_standalone<'t>(pattern: &Regex, text: &'t str) -> Option<Captures<'t>> {
    let mut pos = 0;
    while pos <= text.len() {
        let caps = pattern.captures_at(text, pos)?;
        let whole = caps.get(0)?;
        if is_standalone(text, whole.start(), whole.end()) {
            return Some(caps);
        }
        // Retry from the next character so overlapping candidates are seen.
        pos = whole.start() + text[whole.start()..].chars().next()?.len_utf8();
    }
    None
}

fn field(caps: &Captures<'_>, i: usize) -> Option<u32> {
    caps.get(i)?.as_str().parse().ok()
}

/// Normalize a free-form statement date.
///
/// Month-day forms take the year of `today`. Zero fields and impossible
/// calendar dates yield `None`.
pub fn normalize(freeform: &str, today: NaiveDate) -> Option<CanonicalDate> {
    for family in FAMILIES.iter() {
        let Some(caps) = first_standalone(&family.pattern, freeform) else {
            continue;
        };
        let (year, month, day) = match family.layout {
            Layout::YearMonthDay => (field(&caps, 1)?, field(&caps, 2)?, field(&caps, 3)?),
            Layout::MonthDay => (today.year().max(0) as u32, field(&caps, 1)?, field(&caps, 2)?),
            Layout::MonthDayYear => (field(&caps, 3)?, field(&caps, 1)?, field(&caps, 2)?),
        };
        let date = if year == 0 || month == 0 || day == 0 {
            None
        } else {
            NaiveDate::from_ymd_opt(year as i32, month, day)
        };
        if date.is_none() {
            warn!(candidate = &caps[0], input = freeform, "Statement date is not a calendar date");
        }
        return date.map(CanonicalDate);
    }
    None
}

/// Record title, e.g. `@March 9, 2025`. Falls back to `today`.
pub fn make_title(date: Option<CanonicalDate>, today: NaiveDate) -> String {
    let date = date.map(|d| d.date()).unwrap_or(today);
    format!("@{}", date.format("%B %-d, %Y"))
}

//! The formatting/parsing grammar consumed by NTP result logging and by
//! tests (spec.md §6): a fixed table of pattern letters, each matched
//! as a maximal run of identical characters. A letter run of a length
//! this table does not recognize is passed through as a literal,
//! unchanged.

use crate::calendar::DateTime;
use core::fmt;

const MONTHS: [(&str, &str); 12] = [
    ("Jan", "January"),
    ("Feb", "February"),
    ("Mar", "March"),
    ("Apr", "April"),
    ("May", "May"),
    ("Jun", "June"),
    ("Jul", "July"),
    ("Aug", "August"),
    ("Sep", "September"),
    ("Oct", "October"),
    ("Nov", "November"),
    ("Dec", "December"),
];

/// Indexed `1` (Monday) through `7` (Sunday), matching
/// [`DateTime::weekday_number`].
const WEEKDAYS: [(&str, &str); 7] = [
    ("Mon", "Monday"),
    ("Tue", "Tuesday"),
    ("Wed", "Wednesday"),
    ("Thu", "Thursday"),
    ("Fri", "Friday"),
    ("Sat", "Saturday"),
    ("Sun", "Sunday"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    EraSign,
    EraWord,
    Year(u8),
    Month(u8),
    DayOfMonth(u8),
    DayOfWeek(u8),
    Hour24(u8),
    Hour12(u8),
    Minute(u8),
    Second(u8),
    Fraction(u8),
    MeridiemLower,
    MeridiemUpper,
}

/// An error parsing a [`DateTime`] out of a string against a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The input did not match a literal character the pattern
    /// required.
    LiteralMismatch { expected: char, position: usize },
    /// A numeric field was expected but absent or out of range.
    InvalidNumber { position: usize },
    /// A month/weekday/meridiem name did not match any recognized
    /// spelling.
    UnrecognizedName { position: usize },
    /// The input ran out before the pattern was satisfied.
    UnexpectedEnd,
    /// Trailing input remained after the pattern was fully matched.
    TrailingInput,
    /// The assembled year/month/day/hour/minute/second/nanosecond
    /// fields do not form a valid calendar instant.
    InvalidDate,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::LiteralMismatch { expected, position } => {
                write!(f, "expected {expected:?} at position {position}")
            }
            ParseError::InvalidNumber { position } => {
                write!(f, "invalid numeric field at position {position}")
            }
            ParseError::UnrecognizedName { position } => {
                write!(f, "unrecognized name at position {position}")
            }
            ParseError::UnexpectedEnd => write!(f, "input ended before the pattern did"),
            ParseError::TrailingInput => write!(f, "trailing input after a full match"),
            ParseError::InvalidDate => write!(f, "fields do not form a valid date/time"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Splits `pattern` into maximal runs of identical characters, each
/// classified against the token table. A run whose length the table
/// does not recognize for its letter becomes a literal of that exact
/// text.
fn tokenize(pattern: &str) -> Vec<Token> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let mut j = i + 1;
        while j < chars.len() && chars[j] == c {
            j += 1;
        }
        let len = (j - i) as u8;
        let run: String = chars[i..j].iter().collect();

        let token = match (c, len) {
            ('#', 1) => Token::EraSign,
            ('E', 1) => Token::EraWord,
            ('y', 1 | 2 | 4) => Token::Year(len),
            ('M', 1 | 2 | 3 | 4) => Token::Month(len),
            ('d', 1 | 2) => Token::DayOfMonth(len),
            ('d', 3 | 4) => Token::DayOfWeek(len - 2),
            ('h', 1 | 2) => Token::Hour24(len),
            ('H', 1 | 2) => Token::Hour12(len),
            ('m', 1 | 2) => Token::Minute(len),
            ('s', 1 | 2) => Token::Second(len),
            ('f', 1..=9) => Token::Fraction(len),
            ('a', 1) => Token::MeridiemLower,
            ('A', 1) => Token::MeridiemUpper,
            _ => Token::Literal(run),
        };

        tokens.push(token);
        i = j;
    }

    merge_literals(tokens)
}

/// Coalesces adjacent literals produced when two different unrecognized
/// runs sit next to each other (e.g. `"yyy-"` tokenizes as a `yyy`
/// literal followed by a `-` literal).
fn merge_literals(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    for t in tokens {
        match (out.last_mut(), &t) {
            (Some(Token::Literal(prev)), Token::Literal(next)) => prev.push_str(next),
            _ => out.push(t),
        }
    }
    out
}

/// The civil (BCE-aware) display year and era for `dt`'s astronomical
/// year: astronomical year `0` is `1 BCE`, `-1` is `2 BCE`, and so on.
fn era_parts(year: i32) -> (bool, i64) {
    if year <= 0 {
        (true, 1 - i64::from(year))
    } else {
        (false, i64::from(year))
    }
}

/// Formats `dt` according to `pattern`, per the grammar documented on
/// [`crate::calendar`].
pub fn format(dt: DateTime, pattern: &str) -> String {
    let tokens = tokenize(pattern);
    let (is_bce, display_year) = era_parts(dt.year());
    let mut out = String::with_capacity(pattern.len());

    for token in &tokens {
        match token {
            Token::Literal(s) => out.push_str(s),
            Token::EraSign => {
                if is_bce {
                    out.push('-');
                }
            }
            Token::EraWord => out.push_str(if is_bce { "BCE" } else { "CE" }),
            Token::Year(1) => out.push_str(&display_year.to_string()),
            Token::Year(2) => out.push_str(&format!("{:02}", display_year % 100)),
            Token::Year(4) => out.push_str(&format!("{display_year:04}")),
            Token::Year(_) => unreachable!("tokenize only emits Year(1|2|4)"),
            Token::Month(1) => out.push_str(&dt.month().to_string()),
            Token::Month(2) => out.push_str(&format!("{:02}", dt.month())),
            Token::Month(3) => out.push_str(MONTHS[dt.month() as usize - 1].0),
            Token::Month(4) => out.push_str(MONTHS[dt.month() as usize - 1].1),
            Token::Month(_) => unreachable!("tokenize only emits Month(1..=4)"),
            Token::DayOfMonth(1) => out.push_str(&dt.day().to_string()),
            Token::DayOfMonth(2) => out.push_str(&format!("{:02}", dt.day())),
            Token::DayOfMonth(_) => unreachable!("tokenize only emits DayOfMonth(1|2)"),
            Token::DayOfWeek(1) => out.push_str(WEEKDAYS[dt.weekday_number() as usize - 1].0),
            Token::DayOfWeek(2) => out.push_str(WEEKDAYS[dt.weekday_number() as usize - 1].1),
            Token::DayOfWeek(_) => unreachable!("tokenize only emits DayOfWeek(1|2)"),
            // §6: `h`/`hh` is 24-hour, `H`/`HH` is 12-hour — the letters
            // are swapped from the common C `strftime` convention.
            Token::Hour24(1) => out.push_str(&dt.hour().to_string()),
            Token::Hour24(2) => out.push_str(&format!("{:02}", dt.hour())),
            Token::Hour24(_) => unreachable!("tokenize only emits Hour24(1|2)"),
            Token::Hour12(width) => {
                let h12 = match dt.hour() % 12 {
                    0 => 12,
                    h => h,
                };
                match width {
                    1 => out.push_str(&h12.to_string()),
                    2 => out.push_str(&format!("{h12:02}")),
                    _ => unreachable!("tokenize only emits Hour12(1|2)"),
                }
            }
            Token::Minute(1) => out.push_str(&dt.minute().to_string()),
            Token::Minute(2) => out.push_str(&format!("{:02}", dt.minute())),
            Token::Minute(_) => unreachable!("tokenize only emits Minute(1|2)"),
            Token::Second(1) => out.push_str(&dt.second().to_string()),
            Token::Second(2) => out.push_str(&format!("{:02}", dt.second())),
            Token::Second(_) => unreachable!("tokenize only emits Second(1|2)"),
            Token::Fraction(width) => out.push_str(&fraction_digits(dt.nanosecond(), *width)),
            Token::MeridiemLower => out.push_str(if dt.hour() < 12 { "am" } else { "pm" }),
            Token::MeridiemUpper => out.push_str(if dt.hour() < 12 { "AM" } else { "PM" }),
        }
    }

    out
}

/// The leading `width` digits of `nanosecond`, left-aligned and
/// zero-padded (e.g. 9 digits truncated to `width=3` keeps the first
/// three, dropping the rest; a `width` beyond the 9 significant digits
/// of a nanosecond pads with zeros on the right).
fn fraction_digits(nanosecond: u32, width: u8) -> String {
    let nine = format!("{nanosecond:09}");
    let width = width as usize;
    if width <= 9 {
        nine[..width].to_string()
    } else {
        format!("{:0<width$}", nine, width = width)
    }
}

/// Parses `input` against `pattern`, using the same token table as
/// [`format`].
pub fn parse(input: &str, pattern: &str) -> Result<DateTime, ParseError> {
    let tokens = tokenize(pattern);
    let chars: Vec<char> = input.chars().collect();
    let mut pos = 0usize;

    let mut year: Option<i32> = None;
    let mut is_bce = false;
    let mut month: Option<u32> = None;
    let mut day: Option<u32> = None;
    let mut hour24: Option<u32> = None;
    let mut hour12: Option<u32> = None;
    let mut is_pm: Option<bool> = None;
    let mut minute: Option<u32> = None;
    let mut second: Option<u32> = None;
    let mut nanosecond: Option<u32> = None;

    for token in &tokens {
        match token {
            Token::Literal(lit) => {
                for expected in lit.chars() {
                    let got = *chars.get(pos).ok_or(ParseError::UnexpectedEnd)?;
                    if got != expected {
                        return Err(ParseError::LiteralMismatch {
                            expected,
                            position: pos,
                        });
                    }
                    pos += 1;
                }
            }
            Token::EraSign => {
                if chars.get(pos) == Some(&'-') {
                    is_bce = true;
                    pos += 1;
                }
            }
            Token::EraWord => {
                if let Some((consumed, matched)) = match_name(&chars[pos..], &["bce", "ce"]) {
                    is_bce = matched == "bce";
                    pos += consumed;
                } else {
                    return Err(ParseError::UnrecognizedName { position: pos });
                }
            }
            Token::Year(width) => {
                let max_digits = if *width == 1 { 4 } else { usize::from(*width) };
                let (value, consumed) = take_number(&chars[pos..], max_digits)
                    .ok_or(ParseError::InvalidNumber { position: pos })?;
                year = Some(value as i32);
                pos += consumed;
            }
            Token::Month(1 | 2) => {
                let (value, consumed) = take_number(&chars[pos..], 2)
                    .ok_or(ParseError::InvalidNumber { position: pos })?;
                month = Some(value);
                pos += consumed;
            }
            Token::Month(3) => {
                let names: Vec<&str> = MONTHS.iter().map(|(short, _)| *short).collect();
                let (consumed, idx) =
                    match_name_indexed(&chars[pos..], &names).ok_or(ParseError::UnrecognizedName { position: pos })?;
                month = Some(idx as u32 + 1);
                pos += consumed;
            }
            Token::Month(_) => {
                let names: Vec<&str> = MONTHS.iter().map(|(_, long)| *long).collect();
                let (consumed, idx) =
                    match_name_indexed(&chars[pos..], &names).ok_or(ParseError::UnrecognizedName { position: pos })?;
                month = Some(idx as u32 + 1);
                pos += consumed;
            }
            Token::DayOfMonth(_) => {
                let (value, consumed) = take_number(&chars[pos..], 2)
                    .ok_or(ParseError::InvalidNumber { position: pos })?;
                day = Some(value);
                pos += consumed;
            }
            Token::DayOfWeek(1) => {
                let names: Vec<&str> = WEEKDAYS.iter().map(|(short, _)| *short).collect();
                let (consumed, _idx) =
                    match_name_indexed(&chars[pos..], &names).ok_or(ParseError::UnrecognizedName { position: pos })?;
                pos += consumed;
            }
            Token::DayOfWeek(_) => {
                let names: Vec<&str> = WEEKDAYS.iter().map(|(_, long)| *long).collect();
                let (consumed, _idx) =
                    match_name_indexed(&chars[pos..], &names).ok_or(ParseError::UnrecognizedName { position: pos })?;
                pos += consumed;
            }
            Token::Hour24(_) => {
                let (value, consumed) = take_number(&chars[pos..], 2)
                    .ok_or(ParseError::InvalidNumber { position: pos })?;
                hour24 = Some(value);
                pos += consumed;
            }
            Token::Hour12(_) => {
                let (value, consumed) = take_number(&chars[pos..], 2)
                    .ok_or(ParseError::InvalidNumber { position: pos })?;
                hour12 = Some(value);
                pos += consumed;
            }
            Token::Minute(_) => {
                let (value, consumed) = take_number(&chars[pos..], 2)
                    .ok_or(ParseError::InvalidNumber { position: pos })?;
                minute = Some(value);
                pos += consumed;
            }
            Token::Second(_) => {
                let (value, consumed) = take_number(&chars[pos..], 2)
                    .ok_or(ParseError::InvalidNumber { position: pos })?;
                second = Some(value);
                pos += consumed;
            }
            Token::Fraction(width) => {
                let width = *width as usize;
                let end = (pos + width).min(chars.len());
                let digits: String = chars[pos..end].iter().collect();
                if digits.len() != width || !digits.chars().all(|c| c.is_ascii_digit()) {
                    return Err(ParseError::InvalidNumber { position: pos });
                }
                let padded = format!("{digits:0<9}");
                nanosecond = Some(padded[..9].parse().map_err(|_| ParseError::InvalidNumber { position: pos })?);
                pos += width;
            }
            Token::MeridiemLower | Token::MeridiemUpper => {
                if let Some((consumed, matched)) = match_name(&chars[pos..], &["am", "pm"]) {
                    is_pm = Some(matched == "pm");
                    pos += consumed;
                } else {
                    return Err(ParseError::UnrecognizedName { position: pos });
                }
            }
        }
    }

    if pos != chars.len() {
        return Err(ParseError::TrailingInput);
    }

    let year_magnitude = year.unwrap_or(1);
    let year = if is_bce { 1 - year_magnitude } else { year_magnitude };

    let hour = match (hour24, hour12, is_pm) {
        (Some(h), _, _) => h,
        (None, Some(h12), pm) => (h12 % 12) + if pm.unwrap_or(false) { 12 } else { 0 },
        (None, None, _) => 0,
    };

    DateTime::from_ymd_hms_nano(
        year,
        month.unwrap_or(1),
        day.unwrap_or(1),
        hour,
        minute.unwrap_or(0),
        second.unwrap_or(0),
        nanosecond.unwrap_or(0),
    )
    .ok_or(ParseError::InvalidDate)
}

/// Consumes up to `max_digits` leading ASCII digits from `chars` and
/// parses them as a `u32`. Matches the "greedy up to N digits" rule
/// §6 states for the year token.
fn take_number(chars: &[char], max_digits: usize) -> Option<(u32, usize)> {
    let mut end = 0;
    while end < chars.len() && end < max_digits && chars[end].is_ascii_digit() {
        end += 1;
    }
    if end == 0 {
        return None;
    }
    let digits: String = chars[..end].iter().collect();
    digits.parse().ok().map(|v| (v, end))
}

/// Matches the longest of `candidates` (English, case-insensitive) at
/// the start of `chars`, returning the characters consumed and the
/// lowercase form matched.
fn match_name(chars: &[char], candidates: &[&str]) -> Option<(usize, String)> {
    let mut best: Option<(usize, String)> = None;
    for candidate in candidates {
        let len = candidate.chars().count();
        if chars.len() < len {
            continue;
        }
        let prefix: String = chars[..len].iter().collect();
        if prefix.eq_ignore_ascii_case(candidate) {
            if best.as_ref().map(|(l, _)| len > *l).unwrap_or(true) {
                best = Some((len, candidate.to_lowercase()));
            }
        }
    }
    best
}

/// Like [`match_name`] but returns the index of the matched candidate
/// instead of its text, for name tables indexed by month/weekday.
fn match_name_indexed(chars: &[char], candidates: &[&str]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    for (idx, candidate) in candidates.iter().enumerate() {
        let len = candidate.chars().count();
        if chars.len() < len {
            continue;
        }
        let prefix: String = chars[..len].iter().collect();
        if prefix.eq_ignore_ascii_case(candidate) {
            if best.map(|(l, _)| len > l).unwrap_or(true) {
                best = Some((len, idx));
            }
        }
    }
    best
}

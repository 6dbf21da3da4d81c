//! Frame Decorator (spec §4.4) — composes a 6x22 device grid from
//! generated text plus a time/weather/color info row. No teacher
//! analogue; written in the plain-function, explicit-`Result` style the
//! rest of the core uses for self-contained transforms.

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::model::{ContentData, FormatOptions, FrameResult, Grid, TextAlign};

const COLS: usize = 22;
const ROWS: usize = 6;
const INFO_ROW: usize = ROWS - 1;

/// Device tile-code alphabet. Index is the tile code; value is the
/// character it represents. Matches `SPACE`=0, `A`-`Z`=1..=26,
/// `0`-`9`=27..=36, a small punctuation set, then color tiles.
const SPACE_CODE: i32 = 0;
const DIGIT_BASE: i32 = 27;
const PUNCT: &[(char, i32)] = &[('.', 37), (',', 38), ('\'', 39), ('!', 40), ('?', 41), ('-', 42)];
const NEUTRAL_COLOR_TILE: i32 = 63;

fn char_to_code(c: char) -> Option<i32> {
    match c {
        ' ' => Some(SPACE_CODE),
        'A'..='Z' => Some((c as i32 - 'A' as i32) + 1),
        '0'..='9' => Some((c as i32 - '0' as i32) + DIGIT_BASE),
        other => PUNCT.iter().find(|(p, _)| *p == other).map(|(_, code)| *code),
    }
}

/// True iff `code` is a valid value in the device alphabet (letters,
/// digits, punctuation, space, or a color tile). Used by the retry
/// engine's layout-mode validation.
pub fn is_valid_tile_code(code: i32) -> bool {
    (0..=68).contains(&code)
}

fn encode_row(text: &str) -> [i32; COLS] {
    let mut row = [SPACE_CODE; COLS];
    for (i, c) in text.chars().take(COLS).enumerate() {
        row[i] = char_to_code(c).unwrap_or(SPACE_CODE);
    }
    row
}

fn word_wrap(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate_len = if current.is_empty() {
            word.len()
        } else {
            current.len() + 1 + word.len()
        };
        if candidate_len > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if word.len() > max_chars {
            let mut remaining = word;
            while remaining.len() > max_chars {
                let (head, tail) = remaining.split_at(max_chars);
                lines.push(head.to_string());
                remaining = tail;
            }
            current = remaining.to_string();
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn align(line: &str, max_chars: usize, align: TextAlign) -> String {
    let len = line.chars().count().min(max_chars);
    let truncated: String = line.chars().take(max_chars).collect();
    let pad = max_chars.saturating_sub(len);
    match align {
        TextAlign::Left => format!("{truncated}{}", " ".repeat(pad)),
        TextAlign::Right => format!("{}{truncated}", " ".repeat(pad)),
        TextAlign::Center => {
            let left = pad / 2;
            let right = pad - left;
            format!("{}{truncated}{}", " ".repeat(left), " ".repeat(right))
        }
    }
}

fn day_suffix_free_date(dt: DateTime<Utc>) -> String {
    format!("{}", dt.day())
}

fn month_abbrev(dt: DateTime<Utc>) -> &'static str {
    match dt.month() {
        1 => "JAN", 2 => "FEB", 3 => "MAR", 4 => "APR", 5 => "MAY", 6 => "JUN",
        7 => "JUL", 8 => "AUG", 9 => "SEP", 10 => "OCT", 11 => "NOV", _ => "DEC",
    }
}

fn weekday_abbrev(dt: DateTime<Utc>) -> &'static str {
    match dt.weekday() {
        chrono::Weekday::Mon => "MON",
        chrono::Weekday::Tue => "TUE",
        chrono::Weekday::Wed => "WED",
        chrono::Weekday::Thu => "THU",
        chrono::Weekday::Fri => "FRI",
        chrono::Weekday::Sat => "SAT",
        chrono::Weekday::Sun => "SUN",
    }
}

/// Builds the 21-character info string (everything but the trailing
/// color tile): `"{DAY} {DATE}{MON} {HH:MM}   {ColorChar}{TEMP}{UNIT}"`.
fn build_info_text(dt: DateTime<Utc>, data: Option<&ContentData>) -> String {
    let day = weekday_abbrev(dt);
    let date = day_suffix_free_date(dt);
    let month = month_abbrev(dt);
    let time = format!("{:02}:{:02}", dt.hour(), dt.minute());

    let weather_part = match data.and_then(|d| d.weather.as_ref()) {
        Some(w) => format!("{}{}F", w.color_letter, w.temp_f.round() as i64),
        None => String::new(),
    };

    let base = format!("{day} {date}{month} {time}   {weather_part}");
    let truncated: String = base.chars().take(COLS - 1).collect();
    format!("{truncated:<width$}", width = COLS - 1)
}

fn info_row_codes(dt: DateTime<Utc>, data: Option<&ContentData>) -> [i32; COLS] {
    let text = build_info_text(dt, data);
    let mut row = encode_row(&text);
    let color_tile = data
        .and_then(|d| d.color_bar)
        .map(|bar| bar[5])
        .unwrap_or(NEUTRAL_COLOR_TILE);
    row[COLS - 1] = color_tile;
    row
}

/// Minimal best-effort grid for catastrophic decoration failure: first
/// 22 uppercase characters of `text` in row 0, spaces elsewhere.
fn catastrophic_fallback(text: &str) -> FrameResult {
    let mut grid: Grid = [[0; COLS]; ROWS];
    grid[0] = encode_row(&text.to_uppercase());
    FrameResult {
        layout: grid,
        warnings: vec!["decoration failed, emitted minimal fallback grid".to_string()],
    }
}

pub fn decorate(
    text: &str,
    timestamp: DateTime<Utc>,
    data: Option<&ContentData>,
    options: Option<&FormatOptions>,
) -> FrameResult {
    let defaults = FormatOptions::default();
    let options = options.unwrap_or(&defaults);
    let mut warnings = Vec::new();

    if text.is_empty() {
        return catastrophic_fallback(text);
    }

    let uppercase = text.to_uppercase();
    let lines = if options.word_wrap {
        word_wrap(&uppercase, options.max_chars_per_line)
    } else {
        vec![uppercase]
    };

    let content_rows = ROWS - 1;
    let usable_rows = options.max_lines.min(content_rows);
    if lines.len() > usable_rows {
        warnings.push(format!(
            "text wrapped to {} lines, exceeds max_lines={}, truncating",
            lines.len(),
            usable_rows
        ));
    }

    let mut grid: Grid = [[0; COLS]; ROWS];
    for (i, line) in lines.iter().take(usable_rows).enumerate() {
        let aligned = align(line, options.max_chars_per_line, options.text_align);
        grid[i] = encode_row(&aligned);
    }

    grid[INFO_ROW] = info_row_codes(timestamp, data);

    FrameResult { layout: grid, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WeatherData;

    #[test]
    fn exact_fit_produces_no_truncation_warning() {
        let text = "A".repeat(21 * 5);
        let result = decorate(&text, Utc::now(), None, None);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn twenty_three_columns_wraps_to_two_lines() {
        let text = "A".repeat(23);
        let result = decorate(&text, Utc::now(), None, None);
        assert_ne!(result.layout[0], result.layout[1]);
        assert!(result.layout[1].iter().any(|&c| c != 0));
    }

    #[test]
    fn exceeding_max_lines_still_returns_6x22_with_warning() {
        let text = "WORD ".repeat(40);
        let result = decorate(&text, Utc::now(), None, None);
        assert_eq!(result.layout.len(), ROWS);
        assert!(result.layout.iter().all(|row| row.len() == COLS));
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn info_row_includes_color_tile_from_color_bar() {
        let data = ContentData {
            weather: Some(WeatherData { temp_f: 72.0, condition: "Sunny".to_string(), color_letter: 'G' }),
            color_bar: Some([60, 61, 62, 63, 64, 68]),
            fetched_at: Utc::now(),
            warnings: Vec::new(),
        };
        let result = decorate("HELLO", Utc::now(), Some(&data), None);
        assert_eq!(result.layout[INFO_ROW][COLS - 1], 68);
    }

    #[test]
    fn empty_text_falls_back_to_minimal_grid() {
        let result = decorate("", Utc::now(), None, None);
        assert_eq!(result.layout.len(), ROWS);
        assert!(!result.warnings.is_empty());
    }
}

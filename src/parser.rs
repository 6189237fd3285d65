// Command output mini-language parser
//
// Rows are split on `||`. Tokens split on `|` when the text contains a pipe anywhere,
// otherwise on whitespace. Each token is dispatched by prefix:
//
//   CR:<color>                        circle
//   BAR:<min>-<max>=<value>:<bg>:<fg> vertical bar
//   HBAR:<min>-<max>=<value>:<bg>:<fg> horizontal bar
//   TXTC:<color>[: ]<text>            colored text
//   TXT:<text>                        text in the default font color
//   GR:<color>:<int>                  append a trend sample (no visual element)
//
// Malformed or unknown tokens are dropped; parsing never fails.

use crate::history::HistoryBuffer;
use crate::numeric::{parse_float_lenient, parse_int_lenient};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

lazy_static! {
    static ref LEADING_HEX: Regex = Regex::new(r"^#([0-9A-Fa-f]{6}|[0-9A-Fa-f]{3})").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

pub const ROW_SEPARATOR: &str = "||";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BarOrientation {
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChartElement {
    Circle {
        color: String,
    },
    Bar {
        orientation: BarOrientation,
        min: f64,
        max: f64,
        value: f64,
        bg: String,
        fg: String,
    },
    Text {
        content: String,
        color: Option<String>,
    },
}

impl ChartElement {
    /// Position of `value` inside `[min, max]`, clamped to `[0, 1]`.
    /// Empty, inverted or NaN ranges give 0.
    pub fn fill_ratio(min: f64, max: f64, value: f64) -> f64 {
        let range = max - min;
        if !(range > 0.0) {
            return 0.0;
        }
        let ratio = (value - min) / range;
        if ratio.is_nan() {
            0.0
        } else {
            ratio.clamp(0.0, 1.0)
        }
    }
}

pub type Row = Vec<ChartElement>;
pub type ParseResult = Vec<Row>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenSeparator {
    Pipe,
    Whitespace,
}

/// Parse one full command output. `GR:` tokens update `history` as they are met.
pub fn parse_output(text: &str, history: &mut HistoryBuffer) -> ParseResult {
    // Decided once for the whole text, even rows without a pipe split on `|`.
    let separator = if text.contains('|') {
        TokenSeparator::Pipe
    } else {
        TokenSeparator::Whitespace
    };

    let rows: ParseResult = text
        .split(ROW_SEPARATOR)
        .map(|segment| parse_row(segment, separator, history))
        .collect();

    debug!(
        "Parsed {} rows, {} elements",
        rows.len(),
        rows.iter().map(Vec::len).sum::<usize>()
    );
    rows
}

fn parse_row(segment: &str, separator: TokenSeparator, history: &mut HistoryBuffer) -> Row {
    let segment = segment.trim();
    let tokens: Vec<&str> = match separator {
        TokenSeparator::Pipe => segment.split('|').collect(),
        TokenSeparator::Whitespace => WHITESPACE.split(segment).collect(),
    };

    tokens
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter_map(|token| parse_token(token, history))
        .collect()
}

fn parse_token(token: &str, history: &mut HistoryBuffer) -> Option<ChartElement> {
    if let Some(color) = token.strip_prefix("CR:") {
        if color.is_empty() {
            return None;
        }
        return Some(ChartElement::Circle {
            color: color.to_string(),
        });
    }
    if let Some(rest) = token.strip_prefix("BAR:") {
        return parse_bar(rest, BarOrientation::Vertical);
    }
    if let Some(rest) = token.strip_prefix("HBAR:") {
        return parse_bar(rest, BarOrientation::Horizontal);
    }
    if let Some(rest) = token.strip_prefix("TXTC:") {
        return parse_colored_text(rest);
    }
    if let Some(content) = token.strip_prefix("TXT:") {
        if content.is_empty() {
            return None;
        }
        return Some(ChartElement::Text {
            content: content.to_string(),
            color: None,
        });
    }
    if let Some(rest) = token.strip_prefix("GR:") {
        apply_trend_token(rest, history);
        return None;
    }

    debug!("Dropping unrecognized token '{}'", token);
    None
}

fn parse_bar(body: &str, orientation: BarOrientation) -> Option<ChartElement> {
    let parts: Vec<&str> = body.split(':').collect();
    if parts.len() < 3 {
        return None;
    }
    let range_value: Vec<&str> = parts[0].split('=').collect();
    if range_value.len() != 2 {
        return None;
    }
    let min_max: Vec<&str> = range_value[0].split('-').collect();
    if min_max.len() != 2 {
        return None;
    }

    Some(ChartElement::Bar {
        orientation,
        min: parse_float_lenient(min_max[0]),
        max: parse_float_lenient(min_max[1]),
        value: parse_float_lenient(range_value[1]),
        bg: parts[1].to_string(),
        fg: parts[2].to_string(),
    })
}

fn parse_colored_text(rest: &str) -> Option<ChartElement> {
    // A leading hex color if there is one, otherwise exactly one character
    let color = match LEADING_HEX.find(rest) {
        Some(hex) => hex.as_str(),
        None => {
            let first = rest.chars().next()?;
            &rest[..first.len_utf8()]
        }
    };

    let mut content = &rest[color.len()..];
    if let Some(stripped) = content
        .strip_prefix(':')
        .or_else(|| content.strip_prefix(' '))
    {
        content = stripped;
    }
    if content.is_empty() {
        return None;
    }

    Some(ChartElement::Text {
        content: content.to_string(),
        color: Some(color.to_string()),
    })
}

fn apply_trend_token(rest: &str, history: &mut HistoryBuffer) {
    let parts: Vec<&str> = rest.split(':').collect();
    if parts.len() < 2 {
        return;
    }
    match parse_int_lenient(parts[1]) {
        Some(value) => {
            history.append(value);
            history.set_trend_color(parts[0]);
        }
        None => debug!("Ignoring trend sample '{}'", parts[1]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryHistoryStore;

    fn history() -> HistoryBuffer {
        HistoryBuffer::new(Box::new(MemoryHistoryStore::default()))
    }

    fn parse(text: &str) -> ParseResult {
        parse_output(text, &mut history())
    }

    fn text(content: &str, color: Option<&str>) -> ChartElement {
        ChartElement::Text {
            content: content.to_string(),
            color: color.map(String::from),
        }
    }

    #[test]
    fn test_single_row_mixed_elements() {
        let rows = parse("CR:r|BAR:0-100=50:b:r|TXT:Hi");
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0],
            vec![
                ChartElement::Circle {
                    color: "r".to_string()
                },
                ChartElement::Bar {
                    orientation: BarOrientation::Vertical,
                    min: 0.0,
                    max: 100.0,
                    value: 50.0,
                    bg: "b".to_string(),
                    fg: "r".to_string(),
                },
                text("Hi", None),
            ]
        );
        assert_eq!(ChartElement::fill_ratio(0.0, 100.0, 50.0), 0.5);
    }

    #[test]
    fn test_two_rows_colored_text() {
        let rows = parse("TXTC:#ff0000:Alert||CR:g");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![text("Alert", Some("#ff0000"))]);
        assert_eq!(
            rows[1],
            vec![ChartElement::Circle {
                color: "g".to_string()
            }]
        );
    }

    #[test]
    fn test_whitespace_separator() {
        let rows = parse("CR:g  BAR:0-10=3:k:g\tTXT:Status is OK");
        assert_eq!(rows[0].len(), 3);
        // without pipes the words after the first become unknown tokens
        assert_eq!(rows[0][2], text("Status", None));
    }

    #[test]
    fn test_pipe_separator_is_global() {
        // second row has no pipe of its own but still splits on `|` only
        let rows = parse("CR:r|CR:g||TXT:two words");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec![text("two words", None)]);
    }

    #[test]
    fn test_empty_rows_are_kept() {
        let rows = parse("CR:r||||CR:g");
        assert_eq!(rows.len(), 3);
        assert!(rows[1].is_empty());
        assert_eq!(parse("").len(), 1);
        assert!(parse("")[0].is_empty());
    }

    #[test]
    fn test_malformed_bars_dropped() {
        for token in [
            "BAR:0-100=50:b",
            "BAR:0-100:b:r",
            "BAR:0=1=2:b:r",
            "BAR:100=50:b:r",
            "BAR:-10-10=5:b:r",
            "HBAR:",
        ] {
            assert!(parse(token)[0].is_empty(), "{} should be dropped", token);
        }
    }

    #[test]
    fn test_bar_numbers_flow_through() {
        let rows = parse("HBAR:a-b=c:k:w:extra");
        match &rows[0][0] {
            ChartElement::Bar {
                orientation,
                min,
                max,
                value,
                ..
            } => {
                assert_eq!(*orientation, BarOrientation::Horizontal);
                assert!(min.is_nan() && max.is_nan() && value.is_nan());
                assert_eq!(ChartElement::fill_ratio(*min, *max, *value), 0.0);
            }
            other => panic!("unexpected element {:?}", other),
        }
    }

    #[test]
    fn test_fill_ratio_clamps() {
        assert_eq!(ChartElement::fill_ratio(0.0, 100.0, -5.0), 0.0);
        assert_eq!(ChartElement::fill_ratio(0.0, 100.0, 500.0), 1.0);
        assert_eq!(ChartElement::fill_ratio(5.0, 5.0, 5.0), 0.0);
        assert_eq!(ChartElement::fill_ratio(10.0, 0.0, 5.0), 0.0);
        assert_eq!(ChartElement::fill_ratio(0.0, 10.0, f64::NAN), 0.0);
        assert_eq!(ChartElement::fill_ratio(0.0, f64::INFINITY, 1.0), 0.0);
    }

    #[test]
    fn test_colored_text_separators() {
        assert_eq!(parse("TXTC:r:a:b")[0], vec![text("a:b", Some("r"))]);
        assert!(parse("TXTC:#29c|x")[0].is_empty());
        assert_eq!(parse("TXTC:gok")[0], vec![text("ok", Some("g"))]);
        assert_eq!(
            parse("TXTC:#29c loading now|CR:g")[0][0],
            text("loading now", Some("#29c"))
        );
        // a full 6-digit hex is preferred over its 3-digit prefix
        assert_eq!(
            parse("TXTC:#abcdefX|")[0],
            vec![text("X", Some("#abcdef"))]
        );
        assert!(parse("TXTC:r")[0].is_empty());
        assert!(parse("TXTC:r:|")[0].is_empty());
        // '#' without hex digits is a one-character color
        let rows = parse("TXTC:#zz:oops|CR:g");
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[0][0], text("zz:oops", Some("#")));
    }

    #[test]
    fn test_empty_payloads_dropped() {
        assert!(parse("CR:|TXT:|FOO:bar|cr:r")[0].is_empty());
    }

    #[test]
    fn test_trend_tokens() {
        let mut history = history();
        let rows = parse_output("GR:b:42|CR:r", &mut history);
        assert_eq!(rows[0].len(), 1);
        parse_output("GR:b:58", &mut history);
        let snap = history.snapshot();
        assert_eq!(snap.samples, vec![42.0, 58.0]);
        assert_eq!(snap.trend_color, "b");
    }

    #[test]
    fn test_bad_trend_value_ignored() {
        let mut history = history();
        parse_output("GR:r:abc|GR:r|GR:o:7.9", &mut history);
        let snap = history.snapshot();
        assert_eq!(snap.samples, vec![7.0]);
        assert_eq!(snap.trend_color, "o");
    }

    #[test]
    fn test_oversized_trend_value_ignored() {
        let mut history = history();
        let huge = "9".repeat(400);
        parse_output(&format!("GR:b:1|GR:r:{}", huge), &mut history);
        let snap = history.snapshot();
        assert_eq!(snap.samples, vec![1.0]);
        assert_eq!(snap.trend_color, "b");
    }

    #[test]
    fn test_parse_is_total() {
        for input in ["|", "||", "|||", ":::", "BAR:::", "TXTC:", "GR:::", "\u{1F600}|TXTC:\u{e9}x"] {
            let _ = parse(input);
        }
        assert_eq!(parse("TXTC:\u{e9}x")[0], vec![text("x", Some("\u{e9}"))]);
    }
}

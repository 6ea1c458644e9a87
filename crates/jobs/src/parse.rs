//! Locating structured payloads in model text.
//!
//! Models wrap JSON in prose, code fences, or leave a trailing comma behind.
//! Each strategy is a pure `&str -> Result<Parsed, ParseError>` function;
//! [`locate_structured`] tries them in priority order.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("response is empty")]
    Empty,
    #[error("no {0} found")]
    NotFound(&'static str),
    #[error("invalid JSON: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Direct,
    Fenced,
    BracketScan,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::Fenced => "fenced",
            Strategy::BracketScan => "bracket_scan",
        }
    }
}

/// A parsed payload and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub value: Value,
    pub strategy: Strategy,
    /// A formatting repair (trailing-comma removal) was needed.
    pub repaired: bool,
}

pub type ParseFn = fn(&str) -> Result<Parsed, ParseError>;

/// Strategies in the order they are tried.
pub const STRATEGIES: [ParseFn; 3] = [parse_direct, parse_fenced, parse_bracket_scan];

/// Try every strategy in order; the first success wins.
///
/// On total failure the error of the last strategy is returned.
pub fn locate_structured(text: &str) -> Result<Parsed, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    let mut last = ParseError::Empty;
    for strategy in STRATEGIES {
        match strategy(text) {
            Ok(parsed) => return Ok(parsed),
            Err(e) => last = e,
        }
    }
    Err(last)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Strategies
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// (1) The whole response is JSON.
pub fn parse_direct(text: &str) -> Result<Parsed, ParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    serde_json::from_str(trimmed)
        .map(|value| Parsed {
            value,
            strategy: Strategy::Direct,
            repaired: false,
        })
        .map_err(|e| ParseError::Invalid(e.to_string()))
}

/// (2) The first fenced code block (```` ``` ```` or ```` ```json ````) that parses.
pub fn parse_fenced(text: &str) -> Result<Parsed, ParseError> {
    let mut last = ParseError::NotFound("fenced code block");
    for block in fenced_blocks(text) {
        match parse_with_repair(block, Strategy::Fenced) {
            Ok(parsed) => return Ok(parsed),
            Err(e) => last = e,
        }
    }
    Err(last)
}

/// (3) The first balanced `[...]` literal that parses.
pub fn parse_bracket_scan(text: &str) -> Result<Parsed, ParseError> {
    let mut last = ParseError::NotFound("array literal");
    for (start, ch) in text.char_indices() {
        if ch != '[' {
            continue;
        }
        let Some(end) = balanced_end(text, start) else {
            continue;
        };
        match parse_with_repair(&text[start..end], Strategy::BracketScan) {
            Ok(parsed) => return Ok(parsed),
            Err(e) => last = e,
        }
    }
    Err(last)
}

fn parse_with_repair(candidate: &str, strategy: Strategy) -> Result<Parsed, ParseError> {
    let candidate = candidate.trim();
    match serde_json::from_str(candidate) {
        Ok(value) => Ok(Parsed {
            value,
            strategy,
            repaired: false,
        }),
        Err(first) => {
            let repaired = strip_trailing_commas(candidate);
            if repaired == candidate {
                return Err(ParseError::Invalid(first.to_string()));
            }
            serde_json::from_str(&repaired)
                .map(|value| Parsed {
                    value,
                    strategy,
                    repaired: true,
                })
                .map_err(|e| ParseError::Invalid(e.to_string()))
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scanning helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Bodies of all fenced code blocks, in order. The info string after the
/// opening fence (e.g. `json`) is dropped.
fn fenced_blocks(text: &str) -> Vec<&str> {
    const FENCE: &str = "```";
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find(FENCE) {
        let after_open = &rest[open + FENCE.len()..];
        let body_start = after_open.find('\n').map_or(after_open.len(), |i| i + 1);
        let info = &after_open[..body_start];
        // A fence with JSON on the same line: ```[1, 2]```
        let (body_region, offset) = if info.trim_start().starts_with(['[', '{']) {
            (after_open, 0)
        } else {
            (&after_open[body_start..], body_start)
        };
        let Some(close) = body_region.find(FENCE) else {
            break;
        };
        blocks.push(&body_region[..close]);
        rest = &after_open[offset + close + FENCE.len()..];
    }
    blocks
}

/// Byte index one past the bracket closing the one at `start`, honouring
/// JSON string literals.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + i + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// Remove commas that directly precede `]` or `}` (outside strings).
pub fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            out.push(ch);
            continue;
        }
        if ch == '"' {
            in_string = true;
        } else if ch == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some(']') | Some('}')) {
                continue;
            }
        }
        out.push(ch);
    }
    out
}

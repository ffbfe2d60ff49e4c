//! Instruction formatter
//!
//! Turns the text of a memory examine request into a normalized
//! `(address, bytes, label)` triple. The debugger prints examined bytes as
//! one or more lines shaped like
//!
//! ```text
//! 0x401126 <main+4>:	0x48	0x83	0xec	0x10
//! ```
//!
//! where the `<symbol>` part is absent when the address is outside any known
//! routine. Long dumps wrap onto further `<address>:` lines.

use thiserror::Error;

/// Why an examine text could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatWarning {
    #[error("examine output is empty")]
    Empty,
    #[error("no address separator in `{0}`")]
    MissingSeparator(String),
    #[error("unterminated symbol in `{0}`")]
    UnterminatedSymbol(String),
    #[error("malformed address `{0}`")]
    MalformedAddress(String),
    #[error("examine output carries no bytes")]
    NoBytes,
    #[error("invalid byte token `{0}`")]
    InvalidByte(String),
}

/// Formatted examine output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formatted {
    pub address: String,
    pub raw_bytes: String,
    pub label: Option<String>,
    /// Set when the text was malformed and carried through verbatim
    pub warning: Option<FormatWarning>,
}

impl Formatted {
    pub fn is_degraded(&self) -> bool {
        self.warning.is_some()
    }
}

/// Format raw examine text.
///
/// Never fails: malformed text yields a degraded record holding the raw text
/// in both the address and byte fields.
pub fn format_examine(raw: &str) -> Formatted {
    match parse_examine(raw) {
        Ok((address, raw_bytes, label)) => Formatted {
            address,
            raw_bytes,
            label,
            warning: None,
        },
        Err(warning) => Formatted {
            address: raw.to_string(),
            raw_bytes: raw.to_string(),
            label: None,
            warning: Some(warning),
        },
    }
}

fn parse_examine(raw: &str) -> Result<(String, String, Option<String>), FormatWarning> {
    let mut lines = raw.lines().map(str::trim).filter(|line| !line.is_empty());
    let first = lines.next().ok_or(FormatWarning::Empty)?;

    let (head, bytes) = split_line(first)?;
    let (address, label) = match head.find('<') {
        Some(open) => {
            // split_line guarantees the head ends with '>'
            let symbol = head[open + 1..head.len() - 1].trim();
            (head[..open].trim(), Some(symbol.to_string()))
        }
        None => (head.trim(), None),
    };
    if address.is_empty() || address.contains(char::is_whitespace) {
        return Err(FormatWarning::MalformedAddress(address.to_string()));
    }

    let mut tokens: Vec<&str> = bytes.split_whitespace().collect();
    for line in lines {
        let (_, more) = split_line(line)?;
        tokens.extend(more.split_whitespace());
    }

    Ok((address.to_string(), join_bytes(&tokens)?, label))
}

/// Split one examine line into its `<address>[ <symbol>]` head and byte tail
fn split_line(line: &str) -> Result<(&str, &str), FormatWarning> {
    let separator = if line.contains('<') {
        line.rfind(">:")
            .map(|i| i + 1)
            .ok_or_else(|| FormatWarning::UnterminatedSymbol(line.to_string()))?
    } else {
        line.find(':')
            .ok_or_else(|| FormatWarning::MissingSeparator(line.to_string()))?
    };
    Ok((&line[..separator], &line[separator + 1..]))
}

/// Concatenate byte tokens in emitted order: the first keeps its `0x`
/// prefix, the rest contribute their digits.
fn join_bytes(tokens: &[&str]) -> Result<String, FormatWarning> {
    if tokens.is_empty() {
        return Err(FormatWarning::NoBytes);
    }
    let mut joined = String::with_capacity(2 + tokens.len() * 2);
    joined.push_str("0x");
    for token in tokens {
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .ok_or_else(|| FormatWarning::InvalidByte(token.to_string()))?;
        if digits.is_empty() || hex::decode(digits).is_err() {
            return Err(FormatWarning::InvalidByte(token.to_string()));
        }
        joined.push_str(digits);
    }
    Ok(joined)
}

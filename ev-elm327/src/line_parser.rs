//! Line-buffered ASCII parser (§4.3) over a bounded ring buffer.
//!
//! Pure and transport-agnostic: feed it bytes as they arrive, and at each
//! `>` prompt it yields the complete lines seen since the previous
//! prompt.

const RING_CAPACITY: usize = 2048;

/// One complete line extracted from the adapter's response stream,
/// classified by content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// `OK` or similar at-command acknowledgement.
    AtOk,
    /// The adapter rejected a command (`?`).
    AtRejected,
    /// `ELM327 v1.5` style reset banner; the part after `v`/`V` is kept
    /// for version extraction.
    Banner(String),
    /// A line of whitespace-separated hex byte pairs: one ISO-TP frame.
    HexFrame(Vec<u8>),
    /// `NO DATA`.
    NoData,
    /// `CAN ERROR`, `BUS ERROR`, or similar.
    LinkError(String),
    /// A non-empty line that didn't classify as anything above.
    Other(String),
}

/// A bounded ring buffer that accumulates bytes and yields complete lines
/// once a `>` prompt is seen, mirroring the adapter's own buffering: it
/// only replies with `>` once it is done talking.
pub struct LineRing {
    buf: Vec<u8>,
}

impl LineRing {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(RING_CAPACITY),
        }
    }

    /// Append incoming bytes. Oldest bytes are dropped if the ring would
    /// overflow its capacity without ever having seen a prompt (a
    /// misbehaving adapter flooding us with garbage).
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() > RING_CAPACITY {
            let excess = self.buf.len() - RING_CAPACITY;
            self.buf.drain(0..excess);
        }
    }

    /// If a `>` prompt has been seen, drain and classify every complete
    /// line up to it. Returns `None` if no prompt has arrived yet.
    pub fn take_lines_at_prompt(&mut self) -> Option<Vec<Line>> {
        let prompt_pos = self.buf.iter().position(|&b| b == b'>')?;
        let chunk: Vec<u8> = self.buf.drain(0..=prompt_pos).collect();
        let text = &chunk[..chunk.len() - 1]; // drop the '>' itself

        let mut lines = Vec::new();
        for raw in text.split(|&b| b == b'\r' || b == b'\n') {
            if raw.is_empty() {
                continue;
            }
            lines.push(classify(raw));
        }
        Some(lines)
    }
}

impl Default for LineRing {
    fn default() -> Self {
        Self::new()
    }
}

fn classify(raw: &[u8]) -> Line {
    let text = String::from_utf8_lossy(raw).trim().to_string();
    if text.is_empty() {
        return Line::Other(text);
    }
    if text == "OK" {
        return Line::AtOk;
    }
    if text == "?" {
        return Line::AtRejected;
    }
    if text.eq_ignore_ascii_case("NO DATA") {
        return Line::NoData;
    }
    if text.to_ascii_uppercase().contains("ERROR") {
        return Line::LinkError(text);
    }
    if text.to_ascii_uppercase().starts_with("ELM327") {
        return Line::Banner(text);
    }
    if is_hex_line(&text) {
        return Line::HexFrame(parse_hex_line(&text));
    }
    Line::Other(text)
}

fn is_hex_line(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_hexdigit() || c.is_ascii_whitespace())
}

/// Parse whitespace-separated hex byte pairs. Nibbles are paired within
/// each token, not across the whole line: an odd leftover nibble at the
/// end of a token is treated as an implicit leading zero rather than
/// dropping the whole line, since silently discarding a frame is worse
/// than over-accepting a malformed one.
fn parse_hex_line(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len() / 2 + 1);
    for token in text.split_ascii_whitespace() {
        let mut chars = token.chars().peekable();
        while chars.peek().is_some() {
            let hi = chars.next().unwrap();
            let byte = match chars.next() {
                Some(lo) => u8::from_str_radix(&format!("{hi}{lo}"), 16),
                None => u8::from_str_radix(&format!("0{hi}"), 16),
            };
            if let Ok(b) = byte {
                bytes.push(b);
            }
        }
    }
    bytes
}

/// Extract `major.minor` version digits from a banner line such as
/// `ELM327 v1.5`. Returns `None` if no version marker is present.
#[must_use]
pub fn extract_version(banner: &str) -> Option<(u8, u8)> {
    let lower = banner.to_ascii_lowercase();
    let idx = lower.find('v')?;
    let rest = &lower[idx + 1..];
    let digits: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let mut parts = digits.splitn(2, '.');
    let major: u8 = parts.next()?.parse().ok()?;
    let minor: u8 = parts.next().unwrap_or("0").parse().ok()?;
    Some((major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_ok_and_prompt() {
        let mut ring = LineRing::new();
        ring.push(b"OK\r\r>");
        let lines = ring.take_lines_at_prompt().unwrap();
        assert_eq!(lines, vec![Line::AtOk]);
    }

    #[test]
    fn no_prompt_yields_none() {
        let mut ring = LineRing::new();
        ring.push(b"OK\r");
        assert!(ring.take_lines_at_prompt().is_none());
    }

    #[test]
    fn hex_frame_with_spaces() {
        let mut ring = LineRing::new();
        ring.push(b"62 11 03 B4\r\r>");
        let lines = ring.take_lines_at_prompt().unwrap();
        assert_eq!(lines, vec![Line::HexFrame(vec![0x62, 0x11, 0x03, 0xB4])]);
    }

    #[test]
    fn multiple_hex_lines_before_prompt() {
        let mut ring = LineRing::new();
        ring.push(b"10 35 61 01 AA AA AA AA\r21 AA AA AA AA AA AA\r>");
        let lines = ring.take_lines_at_prompt().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(matches!(lines[0], Line::HexFrame(_)));
        assert!(matches!(lines[1], Line::HexFrame(_)));
    }

    #[test]
    fn odd_nibble_treated_as_leading_zero() {
        let mut ring = LineRing::new();
        ring.push(b"6 11\r>");
        let lines = ring.take_lines_at_prompt().unwrap();
        assert_eq!(lines, vec![Line::HexFrame(vec![0x06, 0x11])]);
    }

    #[test]
    fn no_data_and_error_classification() {
        let mut ring = LineRing::new();
        ring.push(b"NO DATA\r>");
        assert_eq!(
            ring.take_lines_at_prompt().unwrap(),
            vec![Line::NoData]
        );

        let mut ring = LineRing::new();
        ring.push(b"CAN ERROR\r>");
        assert_eq!(
            ring.take_lines_at_prompt().unwrap(),
            vec![Line::LinkError("CAN ERROR".to_string())]
        );
    }

    #[test]
    fn version_extraction() {
        assert_eq!(extract_version("ELM327 v1.5"), Some((1, 5)));
        assert_eq!(extract_version("ELM327 v2.1"), Some((2, 1)));
        assert_eq!(extract_version("no version here"), None);
    }

    #[test]
    fn rejected_command() {
        let mut ring = LineRing::new();
        ring.push(b"?\r>");
        assert_eq!(ring.take_lines_at_prompt().unwrap(), vec![Line::AtRejected]);
    }
}

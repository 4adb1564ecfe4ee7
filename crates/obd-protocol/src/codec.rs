//! PID request building and reply parsing
//!
//! Adapter replies are plain text whose shape depends on the echo, spaces and
//! headers settings, so each line is tokenized into hex byte values and
//! matched against the positive-response pair `(service + 0x40, pid)`.

use serde::{Deserialize, Serialize};

/// Response identifiers of the engine controller (11-bit and 29-bit CAN).
/// When several ECUs answer a broadcast request, a line carrying one of
/// these wins.
pub const PRIMARY_ECU_TAGS: [&str; 2] = ["7E8", "18DAF110"];

/// Build the request command for `service`/`pid`, e.g. `(1, 0x0C)` -> `"010C"`
pub fn build_request(service: u8, pid: u8) -> String {
    format!("{service:02X}{pid:02X}")
}

/// Service code of a positive response to `service`
pub fn positive_service(service: u8) -> u8 {
    service.wrapping_add(0x40)
}

/// Scan `text` left to right for non-overlapping pairs of hex digits.
///
/// Any other character breaks a pair, so `"7E8 06 41"` yields
/// `[0x7E, 0x06, 0x41]`.
pub fn hex_tokens(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::with_capacity(bytes.len() / 2);
    let mut i = 0;
    while i + 1 < bytes.len() {
        match (hex_value(bytes[i]), hex_value(bytes[i + 1])) {
            (Some(hi), Some(lo)) => {
                tokens.push(hi << 4 | lo);
                i += 2;
            }
            _ => i += 1,
        }
    }
    tokens
}

fn hex_value(c: u8) -> Option<u8> {
    (c as char).to_digit(16).map(|d| d as u8)
}

/// How a payload was located inside a reply line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseStrategy {
    /// Token pair `(service + 0x40, pid)` anywhere in the tokenized line
    Delimited,
    /// Line starts with the condensed prefix, e.g. `410C1AF8`
    Condensed,
    /// Prefix found after an engine-controller header tag
    PrimaryEcu,
}

impl ParseStrategy {
    /// Untagged strategies, in the order they are tried on each line
    pub const FALLBACK_ORDER: [ParseStrategy; 2] =
        [ParseStrategy::Delimited, ParseStrategy::Condensed];

    /// Extract the payload following the positive-response pair, if the line
    /// matches under this strategy. Empty payloads never match.
    pub fn extract(self, line: &str, service: u8, pid: u8) -> Option<Vec<u8>> {
        let prefix = condensed_prefix(service, pid);
        let payload = match self {
            ParseStrategy::Delimited => {
                let tokens = hex_tokens(line);
                let target = [positive_service(service), pid];
                let at = tokens.windows(2).position(|w| w == target)?;
                tokens[at + 2..].to_vec()
            }
            ParseStrategy::Condensed => {
                let upper = line.to_ascii_uppercase();
                hex_tokens(upper.strip_prefix(&prefix)?)
            }
            ParseStrategy::PrimaryEcu => {
                let compact = compact_upper(line);
                let tag = primary_tag(&compact)?;
                let body = &compact[tag.len()..];
                let at = body.find(&prefix)?;
                hex_tokens(&body[at + prefix.len()..])
            }
        };
        (!payload.is_empty()).then_some(payload)
    }
}

fn condensed_prefix(service: u8, pid: u8) -> String {
    format!("{:02X}{pid:02X}", positive_service(service))
}

fn compact_upper(line: &str) -> String {
    line.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Engine-controller tag heading `compact`; payload bytes that happen to
/// spell a tag further along do not count.
fn primary_tag(compact: &str) -> Option<&'static str> {
    PRIMARY_ECU_TAGS
        .iter()
        .copied()
        .find(|tag| compact.starts_with(tag))
}

/// A payload extracted from one reply line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFrame {
    pub service: u8,
    pub pid: u8,
    pub payload: Vec<u8>,
    /// Payload was found behind an engine-controller header tag
    pub primary_ecu: bool,
    pub strategy: ParseStrategy,
}

/// Every frame answering `service`/`pid` in `lines`, in line order
pub fn parse_frames(lines: &[String], service: u8, pid: u8) -> Vec<ParsedFrame> {
    lines
        .iter()
        .filter_map(|line| {
            let tagged = ParseStrategy::PrimaryEcu
                .extract(line, service, pid)
                .map(|p| (ParseStrategy::PrimaryEcu, p));
            let (strategy, payload) = tagged.or_else(|| {
                ParseStrategy::FALLBACK_ORDER
                    .iter()
                    .find_map(|s| s.extract(line, service, pid).map(|p| (*s, p)))
            })?;
            Some(ParsedFrame {
                service,
                pid,
                payload,
                primary_ecu: strategy == ParseStrategy::PrimaryEcu,
                strategy,
            })
        })
        .collect()
}

/// Pick one frame per request: the engine controller's if present, else the first
pub fn select_frame(frames: Vec<ParsedFrame>) -> Option<ParsedFrame> {
    let primary = frames.iter().position(|f| f.primary_ecu);
    let mut frames = frames;
    match primary {
        Some(at) => Some(frames.swap_remove(at)),
        None => frames.into_iter().next(),
    }
}

/// Payload of the selected positive reply to `service`/`pid`, if any line matched
pub fn parse_positive_reply(lines: &[String], service: u8, pid: u8) -> Option<Vec<u8>> {
    select_frame(parse_frames(lines, service, pid)).map(|f| f.payload)
}

/// Whether any line acknowledges `service`/`pid`, payload or not.
/// Used by the smoke test, where only the link matters.
pub fn has_positive(lines: &[String], service: u8, pid: u8) -> bool {
    let target = [positive_service(service), pid];
    let prefix = condensed_prefix(service, pid);
    lines.iter().any(|line| {
        hex_tokens(line).windows(2).any(|w| w == target)
            || line.to_ascii_uppercase().starts_with(&prefix)
            || ParseStrategy::PrimaryEcu.extract(line, service, pid).is_some()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_request() {
        assert_eq!(build_request(0x01, 0x0C), "010C");
        assert_eq!(build_request(0x01, 0x00), "0100");
    }

    #[test]
    fn test_hex_tokens() {
        assert_eq!(hex_tokens("41 0C 1A F8"), vec![0x41, 0x0C, 0x1A, 0xF8]);
        assert_eq!(hex_tokens("410c1af8"), vec![0x41, 0x0C, 0x1A, 0xF8]);
        assert_eq!(hex_tokens("7E8 03 41"), vec![0x7E, 0x03, 0x41]);
        // "DA" in "DATA" is a valid pair
        assert_eq!(hex_tokens("NO DATA"), vec![0xDA]);
        assert!(hex_tokens("OK").is_empty());
    }

    #[test]
    fn test_no_data_never_forms_a_reply() {
        let reply = lines(&["NO DATA"]);
        for pid in [0x00, 0x0C, 0xDA] {
            assert!(parse_frames(&reply, 1, pid).is_empty());
            assert!(!has_positive(&reply, 1, pid));
        }
    }

    #[test]
    fn test_delimited_reply() {
        let reply = lines(&["41 0C 1A F8"]);
        assert_eq!(parse_positive_reply(&reply, 1, 0x0C), Some(vec![0x1A, 0xF8]));
    }

    #[test]
    fn test_condensed_reply() {
        let reply = lines(&["410d28"]);
        let frames = parse_frames(&reply, 1, 0x0D);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload, vec![0x28]);
    }

    #[test]
    fn test_headers_without_spaces() {
        // 3-char header shifts the pair grid; the tag path still finds it
        let reply = lines(&["7E804410C1AF8"]);
        let frames = parse_frames(&reply, 1, 0x0C);
        assert_eq!(frames[0].strategy, ParseStrategy::PrimaryEcu);
        assert_eq!(frames[0].payload, vec![0x1A, 0xF8]);
    }

    #[test]
    fn test_primary_ecu_wins_regardless_of_order() {
        let reply = lines(&["7E9 03 41 0D 10", "7E8 03 41 0D 20"]);
        assert_eq!(parse_positive_reply(&reply, 1, 0x0D), Some(vec![0x20]));

        let reply = lines(&["7E8 03 41 0D 20", "7E9 03 41 0D 10"]);
        assert_eq!(parse_positive_reply(&reply, 1, 0x0D), Some(vec![0x20]));
    }

    #[test]
    fn test_tag_spelled_by_payload_is_not_primary() {
        // Another 29-bit responder whose payload ends in 07 E8
        let reply = lines(&["18DAF11904410C07E8", "18DAF11004410C1AF8"]);
        assert_eq!(parse_positive_reply(&reply, 1, 0x0C), Some(vec![0x1A, 0xF8]));

        let reply = lines(&["7E9 04 41 0C 17 E8", "7E8 04 41 0C 1A F8"]);
        assert_eq!(parse_positive_reply(&reply, 1, 0x0C), Some(vec![0x1A, 0xF8]));

        let frames = parse_frames(&lines(&["7E9 04 41 0C 17 E8"]), 1, 0x0C);
        assert_eq!(frames[0].strategy, ParseStrategy::Delimited);
        assert!(!frames[0].primary_ecu);
    }

    #[test]
    fn test_primary_flag_follows_strategy() {
        let frames = parse_frames(&lines(&["7E8 04 41 0C 1A F8"]), 1, 0x0C);
        assert_eq!(frames[0].strategy, ParseStrategy::PrimaryEcu);
        assert!(frames[0].primary_ecu);

        // Payload bytes 7E 80 spell the tag but the line is untagged
        let frames = parse_frames(&lines(&["41 0C 7E 80"]), 1, 0x0C);
        assert_eq!(frames[0].strategy, ParseStrategy::Delimited);
        assert!(!frames[0].primary_ecu);
    }

    #[test]
    fn test_first_match_without_tags() {
        let reply = lines(&["SEARCHING...", "41 0D 10", "41 0D 20"]);
        assert_eq!(parse_positive_reply(&reply, 1, 0x0D), Some(vec![0x10]));
    }

    #[test]
    fn test_no_match_is_absent() {
        assert_eq!(parse_positive_reply(&lines(&["NO DATA"]), 1, 0x0C), None);
        assert_eq!(parse_positive_reply(&lines(&["41 0D 20"]), 1, 0x0C), None);
        // Pair without payload carries no value
        assert_eq!(parse_positive_reply(&lines(&["41 0C"]), 1, 0x0C), None);
        assert_eq!(parse_positive_reply(&[], 1, 0x0C), None);
    }

    #[test]
    fn test_has_positive() {
        assert!(has_positive(&lines(&["41 00 BE 3F A8 13"]), 1, 0x00));
        assert!(has_positive(&lines(&["4100BE3FA813"]), 1, 0x00));
        assert!(has_positive(&lines(&["7E8064100BE3FA813"]), 1, 0x00));
        assert!(!has_positive(&lines(&["UNABLE TO CONNECT"]), 1, 0x00));
        assert!(!has_positive(&lines(&["OK"]), 1, 0x00));
    }
}

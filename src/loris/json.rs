//! JSON decoding for LORIS responses.
//!
//! Failures carry the serde path, a normalized type-mismatch message and a
//! snippet of the offending line, since the portal's payloads are large
//! single-line documents where a bare "line 1 column 48213" is useless.

use anyhow::Result;

/// Width of the snippet window around the failing column, in characters.
const SNIPPET_WIDTH: usize = 24;

/// Parse `body` into `T`, describing where and why decoding failed.
pub fn parse_json_with_context<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    let jd = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(jd).map_err(|err| {
        let inner = err.inner();
        let (line, column) = (inner.line(), inner.column());
        let path = err.path().to_string();

        let msg = inner.to_string();
        let loc = format!(" at line {line} column {column}");
        let msg = msg.strip_suffix(&loc).unwrap_or(&msg);

        let mut described = String::new();
        if !path.is_empty() && path != "." {
            described.push_str(&format!("at path '{path}': "));
        }
        described.push_str(&format!(
            "{} (line {line} col {column})\n{}",
            describe_mismatch(msg),
            snippet(body, line, column)
        ));
        anyhow::anyhow!(described)
    })
}

/// Whether a body is an HTML document rather than JSON.
///
/// The portal answers JSON endpoints with its login page once the session
/// cookies stop being accepted.
pub fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start();
    head.starts_with('<')
        && head
            .get(..64.min(head.len()))
            .is_some_and(|h| h.to_ascii_lowercase().contains("html"))
}

/// Rewrite "invalid type: X, expected Y" as "expected Y, got X".
fn describe_mismatch(msg: &str) -> String {
    if let Some(rest) = msg.split_once("invalid type: ").map(|(_, r)| r)
        && let Some((actual, expected)) = rest.split_once(", expected ")
    {
        return format!("expected {}, got {actual}", expected.trim());
    }
    msg.to_string()
}

fn snippet(body: &str, line: usize, column: usize) -> String {
    let Some(target) = body.lines().nth(line.saturating_sub(1)) else {
        return "(no such line)".to_string();
    };
    if target.is_empty() {
        return "(empty line)".to_string();
    }

    // serde reports byte columns; walk chars so multi-byte names can't split a slice.
    let error_byte = column.saturating_sub(1).min(target.len());
    let chars: Vec<(usize, char)> = target.char_indices().collect();
    let error_idx = chars
        .iter()
        .position(|(b, _)| *b >= error_byte)
        .unwrap_or(chars.len());

    let half = SNIPPET_WIDTH / 2;
    let start = error_idx.saturating_sub(half);
    let end = (error_idx + half).min(chars.len());
    let window: String = chars[start..end].iter().map(|(_, c)| *c).collect();
    let indicator = " ".repeat(error_idx - start) + "^";

    format!("...{window}...\n   {indicator}")
}

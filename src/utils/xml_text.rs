//! Text helpers for quick-xml event streams
//!
//! quick-xml reports entity references (`&amp;`, `&#233;`) as separate
//! events, so element text has to be stitched back together by the caller.

use quick_xml::escape::{resolve_predefined_entity, unescape};

/// Decode raw text or attribute bytes, resolving any inline entities
pub fn decode_text(raw: &[u8]) -> Result<String, String> {
    let text = std::str::from_utf8(raw).map_err(|e| format!("invalid UTF-8: {e}"))?;
    unescape(text)
        .map(|cow| cow.into_owned())
        .map_err(|e| format!("bad escape in '{text}': {e}"))
}

/// Resolve the name of an entity reference (`amp`, `#233`, `#x20AC`)
///
/// Unknown entities are kept verbatim as `&name;`.
pub fn resolve_reference(raw: &[u8]) -> String {
    let name = String::from_utf8_lossy(raw);

    let resolved = if let Some(code) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        u32::from_str_radix(code, 16).ok().and_then(char::from_u32).map(String::from)
    } else if let Some(code) = name.strip_prefix('#') {
        code.parse::<u32>().ok().and_then(char::from_u32).map(String::from)
    } else {
        resolve_predefined_entity(&name).map(str::to_string)
    };

    resolved.unwrap_or_else(|| format!("&{name};"))
}

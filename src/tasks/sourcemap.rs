//! Inline source map helpers.
//!
//! Maps are embedded into the output as base64 `data:` URLs, the same way
//! development builds of the style and script bundles are served.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parcel_sourcemap::SourceMap;

const DATA_URL_PREFIX: &str = "data:application/json;charset=utf-8;base64,";

/// Which comment syntax the map reference uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// `/*# sourceMappingURL=... */`
    Css,
    /// `//# sourceMappingURL=...`
    Js,
}

/// Serialize a map and render the `sourceMappingURL` comment that embeds it.
pub fn inline_comment(map: &mut SourceMap, style: CommentStyle) -> Result<String, String> {
    let json = map.to_json(None).map_err(|e| format!("source map serialization failed: {:?}", e))?;
    let url = format!("{}{}", DATA_URL_PREFIX, STANDARD.encode(json));
    Ok(match style {
        CommentStyle::Css => format!("/*# sourceMappingURL={} */\n", url),
        CommentStyle::Js => format!("//# sourceMappingURL={}\n", url),
    })
}

/// Decode the JSON of an inline source map, if present.
#[cfg(test)]
pub(crate) fn decode_inline(contents: &str) -> Option<String> {
    let start = contents.find(DATA_URL_PREFIX)? + DATA_URL_PREFIX.len();
    let encoded: String = contents[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='))
        .collect();
    let bytes = STANDARD.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

#![deny(missing_docs)]

//! # Reference Utilities
//!
//! JSON Pointer helpers for `$ref` targets inside the loaded document.
//!
//! Only fragment references (`#/...`) are local. Anything carrying a document
//! part, absolute or relative, would require fetching another document and is
//! rejected.

use crate::error::{SpecError, SpecResult};
use percent_encoding::percent_decode_str;
use serde_json::Value;

/// Unescapes one JSON Pointer segment: `~1` first, then `~0`.
pub(crate) fn unescape_pointer_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

fn encode_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Splits a local `$ref` into decoded pointer segments.
pub(crate) fn local_pointer_segments(reference: &str) -> SpecResult<Vec<String>> {
    let Some(fragment) = reference.strip_prefix('#') else {
        return Err(SpecError::UnsupportedReference {
            reference: reference.to_string(),
        });
    };
    if fragment.is_empty() {
        return Ok(Vec::new());
    }
    // A URI fragment is percent-decoded into a pointer before the pointer is parsed.
    let fragment = percent_decode_str(fragment).decode_utf8_lossy();
    let Some(path) = fragment.strip_prefix('/') else {
        // Plain-name fragments (`#Foo`) are anchors, not pointers.
        return Err(SpecError::UnsupportedReference {
            reference: reference.to_string(),
        });
    };
    Ok(path.split('/').map(unescape_pointer_segment).collect())
}

/// Canonical spelling of a local pointer, so that `#/a%20b` and `#/a b` share
/// one identity.
pub(crate) fn canonical_pointer(reference: &str) -> SpecResult<String> {
    let segments = local_pointer_segments(reference)?;
    let mut out = String::from("#");
    for segment in &segments {
        out.push('/');
        out.push_str(&encode_pointer_segment(segment));
    }
    Ok(out)
}

/// Walks `document` along a local `$ref`.
pub(crate) fn lookup_pointer<'d>(document: &'d Value, reference: &str) -> SpecResult<&'d Value> {
    let unresolved = || SpecError::UnresolvedReference {
        reference: reference.to_string(),
    };
    let mut current = document;
    for segment in local_pointer_segments(reference)? {
        current = match current {
            Value::Object(map) => map.get(&segment).ok_or_else(unresolved)?,
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|idx| items.get(idx))
                .ok_or_else(unresolved)?,
            _ => return Err(unresolved()),
        };
    }
    Ok(current)
}

/// Appends a segment to a pointer used for diagnostics.
pub(crate) fn child_pointer(parent: &str, segment: &str) -> String {
    format!("{}/{}", parent, encode_pointer_segment(segment))
}

/// Characters that are unsafe in a path segment on at least one common filesystem.
const RESERVED: &[char] = &['\\', '/', ':', '"', '*', '?', '<', '>', '|'];

/// Map free-text metadata to a filesystem-safe path segment.
///
/// Every reserved character becomes `_`, then surrounding whitespace is
/// trimmed. Applying it twice yields the same string.
pub fn sanitize(text: &str) -> String {
    text.replace(RESERVED, "_").trim().to_owned()
}

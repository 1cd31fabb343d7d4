//! Location arithmetic for `/`-separated paths inside file systems.
//!
//! Locations are absolute: `/` is the root and `/a/b` names member `a/b`.
//! Member names are the location without its leading separator.

use crate::path::LOCATION_SEPARATOR;

/// Returns the parent location, or `None` for the root.
///
/// ```rust
/// use stackvfs::vfs::location::dirname;
///
/// assert_eq!(dirname("/a/b"), Some("/a"));
/// assert_eq!(dirname("/a"), Some("/"));
/// assert_eq!(dirname("/"), None);
/// ```
pub fn dirname(location: &str) -> Option<&str> {
    let trimmed = location.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.rfind('/') {
        Some(0) | None => Some(LOCATION_SEPARATOR),
        Some(index) => Some(&trimmed[..index]),
    }
}

/// Returns the last segment of a location; empty for the root.
pub fn basename(location: &str) -> &str {
    let trimmed = location.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(index) => &trimmed[index + 1..],
        None => trimmed,
    }
}

/// Appends a child segment to a directory location.
pub fn join(directory: &str, name: &str) -> String {
    if directory.ends_with('/') {
        format!("{}{}", directory, name)
    } else {
        format!("{}/{}", directory, name)
    }
}

/// Converts a location to a member name: no leading or trailing separator.
pub fn member_name(location: &str) -> &str {
    location.trim_start_matches('/').trim_end_matches('/')
}

/// Normalizes a raw archive member name: strips leading `./` and `/`
/// prefixes and trailing separators.
pub fn normalize_member_name(raw: &str) -> String {
    let mut name = raw;
    loop {
        if let Some(rest) = name.strip_prefix("./") {
            name = rest;
        } else if let Some(rest) = name.strip_prefix('/') {
            name = rest;
        } else {
            break;
        }
    }
    let name = name.trim_end_matches('/');
    if name == "." { String::new() } else { name.to_string() }
}

/// Splits a remainder relative to a directory into the direct child
/// segment and the deeper suffix (empty for a direct child).
pub(crate) fn split_child(remainder: &str) -> (&str, &str) {
    match remainder.split_once('/') {
        Some((segment, suffix)) => (segment, suffix),
        None => (remainder, ""),
    }
}

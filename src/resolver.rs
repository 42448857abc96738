// src/resolver.rs
// Request URL to filesystem path resolution with containment checks

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Nested encodings deeper than this are refused outright.
const MAX_DECODE_ROUNDS: usize = 4;

/// Outcome of resolving a request URL against the served directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPath {
    /// A path strictly inside the served directory. It may not exist.
    File(PathBuf),
    /// Nothing servable; the dispatcher answers with the SPA fallback.
    NoMatch,
}

impl ResolvedPath {
    pub fn into_path(self) -> Option<PathBuf> {
        match self {
            ResolvedPath::File(path) => Some(path),
            ResolvedPath::NoMatch => None,
        }
    }
}

/// Turn a raw request target into a path below `base_directory`.
///
/// `base_directory` is expected to be absolute and already normalized (the
/// bootstrap canonicalizes it). The function is pure: it never touches the
/// filesystem, so whether the path exists, or is a directory, is left to the
/// caller. Every input, however hostile, yields a value.
pub fn resolve(request_url: &str, base_directory: &Path, base_href: &str) -> ResolvedPath {
    let path = strip_query_and_fragment(request_url);
    let path = strip_base_href(path, base_href);

    let Some(decoded) = decode_fully(path) else {
        return ResolvedPath::NoMatch;
    };

    let Some(relative) = normalize(&decoded) else {
        return ResolvedPath::NoMatch;
    };

    if relative.as_os_str().is_empty() {
        return ResolvedPath::NoMatch;
    }

    let candidate = base_directory.join(&relative);
    if candidate != base_directory && candidate.starts_with(base_directory) {
        ResolvedPath::File(candidate)
    } else {
        ResolvedPath::NoMatch
    }
}

fn strip_query_and_fragment(url: &str) -> &str {
    match url.find(|c: char| c == '?' || c == '#') {
        Some(index) => &url[..index],
        None => url,
    }
}

/// Drop the base href when the URL sits under it.
///
/// The prefix only applies on a segment boundary, so `/app` strips
/// `/app/main.js` but leaves `/application.js` alone.
fn strip_base_href<'a>(path: &'a str, base_href: &str) -> &'a str {
    if base_href.is_empty() {
        return path;
    }

    match path.strip_prefix(base_href) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || base_href.ends_with('/') => rest,
        _ => path,
    }
}

/// Percent-decode until the string stops changing.
///
/// The raw input must be well formed. A later round that meets a stray `%`
/// stops decoding and keeps the text literally, which is also how the
/// filesystem will see it.
fn decode_fully(path: &str) -> Option<String> {
    if !has_valid_escapes(path) {
        return None;
    }

    let mut current = path.to_string();
    for round in 0..MAX_DECODE_ROUNDS {
        if !current.contains('%') {
            return Some(current);
        }
        if round > 0 && !has_valid_escapes(&current) {
            return Some(current);
        }

        let decoded = urlencoding::decode(&current).ok()?.into_owned();
        if decoded == current {
            return Some(current);
        }
        current = decoded;
    }

    if current.contains('%') && has_valid_escapes(&current) {
        None
    } else {
        Some(current)
    }
}

fn has_valid_escapes(path: &str) -> bool {
    let bytes = path.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit);
            if !valid {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

/// Collapse a decoded URL path into a relative path of plain file names.
///
/// Backslashes count as separators. `..`, NUL bytes, and anything the
/// platform would read as a root or drive prefix reject the whole path.
fn normalize(decoded: &str) -> Option<PathBuf> {
    if decoded.contains('\0') {
        return None;
    }

    let unified = decoded.replace('\\', "/");
    let mut relative = PathBuf::new();

    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            _ => {}
        }

        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == OsStr::new(segment) => {
                relative.push(name)
            }
            _ => return None,
        }
    }

    Some(relative)
}

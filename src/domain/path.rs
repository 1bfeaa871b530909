//! Folder path and URI normalization.
//!
//! Workspace descriptors record folders as URIs (`file:///c%3A/Users/me/proj`),
//! while users pass native paths (`C:\Users\me\proj\`). Both are reduced to one
//! canonical string so equality can be a plain string comparison. Everything
//! here is lexical: the filesystem is never consulted.

use std::borrow::Cow;
use std::path::PathBuf;

use percent_encoding::percent_decode_str;

const FILE_SCHEME: &str = "file";
const SCHEME_SEPARATOR: &str = "://";

/// Normalizes a folder path or URI into its canonical comparison form.
///
/// Remote URIs (`vscode-remote://wsl+ubuntu/home/me`) keep their scheme and
/// authority verbatim (after decoding); only the inner path is normalized.
///
/// ```text
/// file:///C%3A/Proj   -> c:/Proj
/// C:\Proj\            -> c:/Proj
/// /home/me//a/./b/..  -> /home/me/a
/// ```
#[must_use]
pub fn normalize(input: &str) -> String {
    let input = input.trim();

    match split_scheme(input) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case(FILE_SCHEME) => {
            normalize_inner(&file_uri_path(rest))
        }
        Some((scheme, rest)) => {
            let (authority, inner) = rest.find('/').map_or((rest, ""), |i| rest.split_at(i));
            let authority = decode(authority);
            let inner = if inner.is_empty() {
                String::new()
            } else {
                normalize_inner(inner)
            };
            format!(
                "{}{SCHEME_SEPARATOR}{authority}{inner}",
                scheme.to_ascii_lowercase()
            )
        }
        None => normalize_inner(input),
    }
}

/// Two paths match when their normalized forms are equal.
#[must_use]
pub fn paths_match(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Whether a path or URI points at another machine or container.
#[must_use]
pub fn is_remote(input: &str) -> bool {
    split_scheme(input.trim())
        .is_some_and(|(scheme, _)| !scheme.eq_ignore_ascii_case(FILE_SCHEME))
}

/// Whether a normalized path lacks a root (no `/`, drive letter or scheme).
#[must_use]
pub fn is_relative(normalized: &str) -> bool {
    !(normalized.starts_with('/')
        || drive_letter(normalized).is_some()
        || normalized.contains(SCHEME_SEPARATOR))
}

/// Decodes a folder URI into a local filesystem path.
///
/// Returns `None` for remote URIs, which have no local counterpart.
#[must_use]
pub fn local_path(uri: &str) -> Option<PathBuf> {
    if is_remote(uri) {
        return None;
    }
    Some(PathBuf::from(normalize(uri)))
}

/// Splits `scheme://rest`, rejecting single letters so `c://` stays a path.
fn split_scheme(input: &str) -> Option<(&str, &str)> {
    let idx = input.find(SCHEME_SEPARATOR)?;
    let scheme = &input[..idx];

    let mut chars = scheme.chars();
    let valid = scheme.len() >= 2
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));

    valid.then(|| (scheme, &input[idx + SCHEME_SEPARATOR.len()..]))
}

/// Path portion of a `file://` URI; a non-empty host becomes a UNC prefix.
fn file_uri_path(rest: &str) -> Cow<'_, str> {
    if rest.is_empty() {
        Cow::Borrowed("/")
    } else if rest.starts_with('/') || rest.starts_with('\\') {
        Cow::Borrowed(rest)
    } else if rest.starts_with("localhost/") {
        Cow::Borrowed(&rest["localhost".len()..])
    } else {
        Cow::Owned(format!("//{rest}"))
    }
}

fn decode(raw: &str) -> Cow<'_, str> {
    percent_decode_str(raw).decode_utf8_lossy()
}

/// Returns the drive letter of a `x:` style path.
fn drive_letter(path: &str) -> Option<char> {
    let mut chars = path.chars();
    let letter = chars.next().filter(char::is_ascii_alphabetic)?;
    (chars.next() == Some(':')).then_some(letter)
}

fn normalize_inner(raw: &str) -> String {
    let decoded = decode(raw).replace('\\', "/");

    // `/c:/Users` is how URIs spell Windows paths
    let mut path = decoded.as_str();
    if path.starts_with('/') && drive_letter(&path[1..]).is_some() {
        path = &path[1..];
    }

    let (prefix, rest) = if let Some(letter) = drive_letter(path) {
        let rest = &path[2..];
        let root = if rest.starts_with('/') { ":/" } else { ":" };
        (format!("{}{root}", letter.to_ascii_lowercase()), rest)
    } else if path.starts_with("//") && !path.starts_with("///") {
        ("//".to_string(), &path[2..])
    } else if path.starts_with('/') {
        ("/".to_string(), path)
    } else {
        (String::new(), path)
    };

    let rooted = !prefix.is_empty();
    let mut segments: Vec<&str> = Vec::new();

    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                // `..` above a root is a no-op
                _ if rooted => {}
                _ => segments.push(".."),
            },
            _ => segments.push(segment),
        }
    }

    let joined = segments.join("/");
    if prefix.is_empty() && joined.is_empty() {
        return ".".to_string();
    }
    format!("{prefix}{joined}")
}

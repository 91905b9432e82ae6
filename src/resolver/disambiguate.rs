//! Path-hint matching and minimal disambiguating paths.
//!
//! Hints are matched as written. A hint lines up with a path when it occurs
//! in it at `/` segment boundaries; a leading or trailing `/` in the hint is
//! its own boundary, and a match may stop right before the file extension
//! (`a/x` lines up with `a/x.ts`). Every match is a substring of the path.
use crate::catalog::Declaration;

pub fn matches_segments(hint: &str, path: &str) -> bool {
    if hint.is_empty() {
        return false;
    }
    path.match_indices(hint).any(|(start, _)| {
        left_aligned(hint, path, start) && right_aligned(hint, path, start + hint.len())
    })
}

fn left_aligned(hint: &str, path: &str, start: usize) -> bool {
    start == 0 || hint.starts_with('/') || path[..start].ends_with('/')
}

fn right_aligned(hint: &str, path: &str, end: usize) -> bool {
    let rest = &path[end..];
    rest.is_empty() || hint.ends_with('/') || rest.starts_with('/') || is_extension(path, end)
}

/// `path[end..]` is the extension of the file name, e.g. `.ts`.
fn is_extension(path: &str, end: usize) -> bool {
    let rest = &path[end..];
    let file_start = path.rfind('/').map_or(0, |i| i + 1);
    // `.env`-style names have no stem to match.
    end > file_start && rest.starts_with('.') && !rest[1..].contains(['.', '/'])
}

/// Candidates whose origin matches the hint.
///
/// An origin equal to the hint wins outright. Otherwise segment-aligned
/// matches win, and plain substring matching is only used when no candidate
/// lines up with segment boundaries.
pub fn filter_by_hint<'a>(hint: &str, candidates: &'a [Declaration]) -> Vec<&'a Declaration> {
    let exact: Vec<&Declaration> = candidates.iter().filter(|d| d.origin == hint).collect();
    if !exact.is_empty() {
        return exact;
    }

    let aligned: Vec<&Declaration> = candidates
        .iter()
        .filter(|d| matches_segments(hint, &d.origin))
        .collect();
    if !aligned.is_empty() {
        return aligned;
    }
    candidates
        .iter()
        .filter(|d| d.origin.contains(hint))
        .collect()
}

/// For each path, the shortest trailing run of segments that, used as a
/// hint, matches it and no other distinct path. Falls back to the full path.
pub fn minimal_paths(paths: &[&str]) -> Vec<String> {
    paths
        .iter()
        .map(|path| {
            let segments: Vec<&str> = path.split('/').collect();
            (1..=segments.len())
                .map(|k| segments[segments.len() - k..].join("/"))
                .find(|suffix| {
                    paths
                        .iter()
                        .all(|other| other == path || !matches_segments(suffix, other))
                })
                .unwrap_or_else(|| path.to_string())
        })
        .collect()
}

/// `<minimal path>#<name>` for every candidate, in candidate order.
///
/// Candidates sharing a file are told apart by kind: `<path>#<name>:<kind>`.
pub fn candidate_labels(candidates: &[Declaration]) -> Vec<String> {
    let paths: Vec<&str> = candidates.iter().map(|d| d.origin.as_str()).collect();
    minimal_paths(&paths)
        .into_iter()
        .zip(candidates)
        .map(|(path, d)| {
            let shares_file = candidates
                .iter()
                .any(|other| !std::ptr::eq(other, d) && other.origin == d.origin);
            if shares_file {
                format!("{path}#{}:{}", d.name, d.kind)
            } else {
                format!("{path}#{}", d.name)
            }
        })
        .collect()
}

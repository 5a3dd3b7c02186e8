//! Include/exclude path filtering for scan results.
//!
//! Patterns follow the usual git-flavoured rules: a pattern without wildcards
//! matches a path exactly or as a leading directory; `*` and `?` match within
//! a single path component; `**` crosses components; `[...]` matches a
//! character class. A wildcard pattern with no `/` is matched against the
//! path's final component.

use bstr::{BStr, BString, ByteSlice};

/// An include/exclude path filter.
///
/// An empty include list admits every path. Excludes are applied after
/// includes and always win.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include: Vec<BString>,
    exclude: Vec<BString>,
}

impl PathFilter {
    pub fn new(include: Vec<BString>, exclude: Vec<BString>) -> Self {
        PathFilter { include, exclude }
    }

    /// A filter that admits every path.
    pub fn accept_all() -> Self {
        PathFilter::default()
    }

    /// Whether `path` passes the include list and survives the exclude list.
    pub fn included(&self, path: &BStr) -> bool {
        if !self.include.is_empty()
            && !self.include.iter().any(|p| pattern_hits(p.as_bstr(), path))
        {
            return false;
        }
        !self.exclude.iter().any(|p| pattern_hits(p.as_bstr(), path))
    }
}

/// Test one pattern against one repo-relative path.
fn pattern_hits(pattern: &BStr, path: &BStr) -> bool {
    if !has_wildcard(pattern) {
        // Literal: exact path or leading directory.
        if path == pattern {
            return true;
        }
        let mut dir = pattern.to_vec();
        dir.push(b'/');
        return path.starts_with(&dir);
    }

    if pattern.contains(&b'/') {
        glob_match(pattern, path)
    } else {
        // Basename patterns like `*.bin` apply in any directory.
        let name = path.rsplit_str("/").next().unwrap_or(path.as_bytes());
        glob_match(pattern, name.as_bstr())
    }
}

fn has_wildcard(pattern: &BStr) -> bool {
    pattern.iter().any(|&c| matches!(c, b'*' | b'?' | b'['))
}

/// Recursive glob matcher over bytes.
fn glob_match(pattern: &BStr, text: &BStr) -> bool {
    let pat: &[u8] = pattern;
    let txt: &[u8] = text;

    if pat.is_empty() {
        return txt.is_empty();
    }

    match pat[0] {
        b'*' => {
            let crosses_slash = pat.len() > 1 && pat[1] == b'*';
            let rest = if crosses_slash { &pat[2..] } else { &pat[1..] };
            for i in 0..=txt.len() {
                if glob_match(rest.as_bstr(), txt[i..].as_bstr()) {
                    return true;
                }
                if i < txt.len() && !crosses_slash && txt[i] == b'/' {
                    return false;
                }
            }
            false
        }
        b'?' => {
            !txt.is_empty() && txt[0] != b'/' && glob_match(pat[1..].as_bstr(), txt[1..].as_bstr())
        }
        b'[' => match parse_class(pat) {
            Some((matcher, rest)) => {
                !txt.is_empty()
                    && txt[0] != b'/'
                    && matcher(txt[0])
                    && glob_match(rest.as_bstr(), txt[1..].as_bstr())
            }
            // Unterminated class matches a literal '['.
            None => !txt.is_empty() && txt[0] == b'[' && glob_match(pat[1..].as_bstr(), txt[1..].as_bstr()),
        },
        b'\\' if pat.len() > 1 => {
            !txt.is_empty() && txt[0] == pat[1] && glob_match(pat[2..].as_bstr(), txt[1..].as_bstr())
        }
        c => !txt.is_empty() && txt[0] == c && glob_match(pat[1..].as_bstr(), txt[1..].as_bstr()),
    }
}

/// Parse a `[...]` class, returning a membership test and the rest of the
/// pattern after the closing `]`.
fn parse_class(pat: &[u8]) -> Option<(impl Fn(u8) -> bool, &[u8])> {
    debug_assert_eq!(pat[0], b'[');
    let mut i = 1;
    let negated = i < pat.len() && (pat[i] == b'!' || pat[i] == b'^');
    if negated {
        i += 1;
    }
    let body_start = i;
    // A ']' immediately after the opening (or negation) is a literal member.
    if i < pat.len() && pat[i] == b']' {
        i += 1;
    }
    while i < pat.len() && pat[i] != b']' {
        i += 1;
    }
    if i >= pat.len() {
        return None;
    }
    let body = pat[body_start..i].to_vec();
    let rest = &pat[i + 1..];

    let test = move |c: u8| {
        let mut hit = false;
        let mut j = 0;
        while j < body.len() {
            if j + 2 < body.len() && body[j + 1] == b'-' {
                if body[j] <= c && c <= body[j + 2] {
                    hit = true;
                }
                j += 3;
            } else {
                if body[j] == c {
                    hit = true;
                }
                j += 1;
            }
        }
        hit != negated
    };
    Some((test, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(include: &[&str], exclude: &[&str]) -> PathFilter {
        PathFilter::new(
            include.iter().map(|s| BString::from(*s)).collect(),
            exclude.iter().map(|s| BString::from(*s)).collect(),
        )
    }

    fn included(f: &PathFilter, path: &str) -> bool {
        f.included(path.as_bytes().as_bstr())
    }

    #[test]
    fn empty_filter_admits_everything() {
        let f = PathFilter::accept_all();
        assert!(included(&f, "a/b/c.bin"));
        assert!(included(&f, "top.dat"));
    }

    #[test]
    fn literal_include_matches_exact_and_directory() {
        let f = filter(&["assets"], &[]);
        assert!(included(&f, "assets"));
        assert!(included(&f, "assets/big.bin"));
        assert!(!included(&f, "assets2/big.bin"));
        assert!(!included(&f, "other/assets"));
    }

    #[test]
    fn basename_wildcard_applies_anywhere() {
        let f = filter(&["*.bin"], &[]);
        assert!(included(&f, "big.bin"));
        assert!(included(&f, "deep/nested/big.bin"));
        assert!(!included(&f, "big.bin.txt"));
    }

    #[test]
    fn slash_wildcard_stays_in_component() {
        let f = filter(&["media/*.png"], &[]);
        assert!(included(&f, "media/logo.png"));
        assert!(!included(&f, "media/sub/logo.png"));
    }

    #[test]
    fn double_star_crosses_components() {
        let f = filter(&["media/**/*.png"], &[]);
        assert!(included(&f, "media/a/b/logo.png"));
    }

    #[test]
    fn exclude_wins_over_include() {
        let f = filter(&["assets"], &["assets/scratch"]);
        assert!(included(&f, "assets/keep.bin"));
        assert!(!included(&f, "assets/scratch/tmp.bin"));
    }

    #[test]
    fn character_class() {
        let f = filter(&["file[0-9].dat"], &[]);
        assert!(included(&f, "file3.dat"));
        assert!(!included(&f, "fileA.dat"));
    }

    #[test]
    fn non_utf8_path_matches_literal() {
        let f = filter(&[], &[]);
        let raw = BString::from(&b"bin/\xffodd.bin"[..]);
        assert!(f.included(raw.as_bstr()));
    }
}

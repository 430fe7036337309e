//! Glob pattern compilation and matching.
//!
//! Patterns are segment-wise: `*`, `?`, `[abc]`, `[a-z]` and `[!abc]`
//! match within one path segment, `**` matches zero or more whole
//! segments. Matching is done against canonical `/`-separated paths;
//! a leading `/` on either side is ignored.

use thiserror::Error;

/// Errors raised while compiling a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// A `[` class was never closed.
    #[error("unclosed character class in pattern `{0}`")]
    UnclosedClass(String),
    /// The pattern ended in the middle of a `\` escape.
    #[error("dangling escape at end of pattern `{0}`")]
    DanglingEscape(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ClassItem {
    Char(char),
    Range(char, char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(char),
    AnyChar,
    Wildcard,
    Class { negated: bool, items: Vec<ClassItem> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// `**`: spans zero or more whole path segments.
    Globstar,
    Parts(Vec<Token>),
}

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compile `pattern`.
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        let mut segments = Vec::new();
        for part in pattern.split('/').filter(|p| !p.is_empty()) {
            if part == "**" {
                segments.push(Segment::Globstar);
            } else {
                segments.push(Segment::Parts(compile_segment(part, pattern)?));
            }
        }
        Ok(Self {
            raw: pattern.to_owned(),
            segments,
        })
    }

    /// The pattern source text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match `path` (leading `/` ignored) against the whole pattern.
    pub fn matches(&self, path: &str) -> bool {
        let segs: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match_from(&self.segments, &segs)
    }
}

/// An ordered set of patterns matched as "any of".
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    /// Compile every pattern in `patterns`.
    pub fn new<I, S>(patterns: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Pattern::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// The set with no patterns in it.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// True when any member pattern matches `path`.
    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }
}

fn compile_segment(part: &str, whole: &str) -> Result<Vec<Token>, PatternError> {
    let chars: Vec<char> = part.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                // Consecutive stars within a segment collapse to one.
                if tokens.last() != Some(&Token::Wildcard) {
                    tokens.push(Token::Wildcard);
                }
                i += 1;
            }
            '?' => {
                tokens.push(Token::AnyChar);
                i += 1;
            }
            '\\' => match chars.get(i + 1) {
                Some(&escaped) => {
                    tokens.push(Token::Literal(escaped));
                    i += 2;
                }
                None => return Err(PatternError::DanglingEscape(whole.to_owned())),
            },
            '[' => {
                let (token, next) = compile_class(&chars, i + 1, whole)?;
                tokens.push(token);
                i = next;
            }
            other => {
                tokens.push(Token::Literal(other));
                i += 1;
            }
        }
    }
    Ok(tokens)
}

/// Parse a `[...]` class starting just after the `[`. Returns the token
/// and the index one past the closing `]`.
fn compile_class(
    chars: &[char],
    mut i: usize,
    whole: &str,
) -> Result<(Token, usize), PatternError> {
    let mut negated = false;
    if matches!(chars.get(i), Some(&'!') | Some(&'^')) {
        negated = true;
        i += 1;
    }
    let mut items = Vec::new();
    let mut first = true;
    loop {
        let Some(&c) = chars.get(i) else {
            return Err(PatternError::UnclosedClass(whole.to_owned()));
        };
        // `]` closes the class except as its very first member.
        if c == ']' && !first {
            return Ok((Token::Class { negated, items }, i + 1));
        }
        first = false;
        // A range is `x-y` with `y` not the closing bracket.
        if chars.get(i + 1) == Some(&'-') && chars.get(i + 2).is_some_and(|&hi| hi != ']') {
            items.push(ClassItem::Range(c, chars[i + 2]));
            i += 3;
        } else {
            items.push(ClassItem::Char(c));
            i += 1;
        }
    }
}

fn match_from(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::Globstar, rest)) => {
            (0..=path.len()).any(|skip| match_from(rest, &path[skip..]))
        }
        Some((Segment::Parts(tokens), rest)) => match path.split_first() {
            Some((seg, path_rest)) => match_segment(tokens, seg) && match_from(rest, path_rest),
            None => false,
        },
    }
}

/// Greedy `*` matching with a single backtrack point per star. Linear in
/// the segment length for each star, so adversarial patterns stay cheap.
fn match_segment(tokens: &[Token], text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    let mut ti = 0;
    let mut ci = 0;
    let mut backtrack: Option<(usize, usize)> = None;

    while ci < chars.len() {
        match tokens.get(ti) {
            Some(Token::Wildcard) => {
                backtrack = Some((ti + 1, ci));
                ti += 1;
            }
            Some(tok) if token_matches(tok, chars[ci]) => {
                ti += 1;
                ci += 1;
            }
            _ => match backtrack {
                Some((after_star, eaten)) => {
                    backtrack = Some((after_star, eaten + 1));
                    ti = after_star;
                    ci = eaten + 1;
                }
                None => return false,
            },
        }
    }
    while tokens.get(ti) == Some(&Token::Wildcard) {
        ti += 1;
    }
    ti == tokens.len()
}

fn token_matches(token: &Token, c: char) -> bool {
    match token {
        Token::Literal(l) => *l == c,
        Token::AnyChar => true,
        Token::Wildcard => true,
        Token::Class { negated, items } => {
            let hit = items.iter().any(|item| match item {
                ClassItem::Char(x) => *x == c,
                ClassItem::Range(lo, hi) => (*lo..=*hi).contains(&c),
            });
            hit != *negated
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn is_match(pattern: &str, path: &str) -> bool {
        Pattern::new(pattern).unwrap().matches(path)
    }

    #[rstest]
    #[case("hello", "hello", true)]
    #[case("hello", "world", false)]
    #[case("hello", "hell", false)]
    fn literals(#[case] pat: &str, #[case] path: &str, #[case] want: bool) {
        assert_eq!(is_match(pat, path), want);
    }

    #[rstest]
    #[case("*", "anything", true)]
    #[case("*.rs", "main.rs", true)]
    #[case("*.rs", ".rs", true)]
    #[case("*.rs", "main.txt", false)]
    #[case("a*b*c", "aXXbYYc", true)]
    #[case("a*b*c", "abc", true)]
    #[case("a*b*c", "acb", false)]
    #[case("test*", "test", true)]
    #[case("*test*", "mytestfile", true)]
    #[case("a**b", "aXXXb", true)]
    fn stars(#[case] pat: &str, #[case] path: &str, #[case] want: bool) {
        assert_eq!(is_match(pat, path), want);
    }

    #[rstest]
    #[case("?", "a", true)]
    #[case("?", "", false)]
    #[case("???", "abc", true)]
    #[case("???", "ab", false)]
    #[case("test?", "test1", true)]
    fn question_marks(#[case] pat: &str, #[case] path: &str, #[case] want: bool) {
        assert_eq!(is_match(pat, path), want);
    }

    #[rstest]
    #[case("[abc]", "b", true)]
    #[case("[abc]", "d", false)]
    #[case("[a-z]", "m", true)]
    #[case("[a-z]", "M", false)]
    #[case("[a-zA-Z0-9]", "X", true)]
    #[case("[!abc]", "d", true)]
    #[case("[!abc]", "a", false)]
    #[case("[^a-z]", "5", true)]
    #[case("[]abc]", "]", true)]
    #[case("[-ab]", "-", true)]
    #[case("[a-]", "-", true)]
    #[case("file[0-9].txt", "file5.txt", true)]
    #[case("file[0-9].txt", "filex.txt", false)]
    fn classes(#[case] pat: &str, #[case] path: &str, #[case] want: bool) {
        assert_eq!(is_match(pat, path), want);
    }

    #[rstest]
    #[case("a/*.rs", "a/main.rs", true)]
    #[case("a/*.rs", "b/main.rs", false)]
    #[case("a/*.rs", "a/b/main.rs", false)]
    #[case("*/*", "foo/bar", true)]
    #[case("*/*", "foobar", false)]
    fn segment_wildcards_stay_in_their_segment(
        #[case] pat: &str,
        #[case] path: &str,
        #[case] want: bool,
    ) {
        assert_eq!(is_match(pat, path), want);
    }

    #[rstest]
    #[case("**/*.rs", "main.rs", true)]
    #[case("**/*.rs", "src/main.rs", true)]
    #[case("**/*.rs", "src/deep/nest/main.rs", true)]
    #[case("**/*.rs", "src/main.txt", false)]
    #[case("src/**", "src", true)]
    #[case("src/**", "src/a/b", true)]
    #[case("src/**/test", "src/test", true)]
    #[case("src/**/test", "src/a/b/test", true)]
    #[case("src/**/test", "other/test", false)]
    #[case("**", "anything/at/all", true)]
    fn globstar(#[case] pat: &str, #[case] path: &str, #[case] want: bool) {
        assert_eq!(is_match(pat, path), want);
    }

    #[test]
    fn leading_slash_is_ignored_on_both_sides() {
        assert!(is_match("/a/*.txt", "/a/b.txt"));
        assert!(is_match("a/*.txt", "/a/b.txt"));
        assert!(is_match("/a/*.txt", "a/b.txt"));
    }

    #[test]
    fn escapes_make_metacharacters_literal() {
        assert!(is_match("\\*", "*"));
        assert!(!is_match("\\*", "a"));
        assert!(is_match("a\\?b", "a?b"));
        assert!(is_match("\\[x\\]", "[x]"));
    }

    #[test]
    fn compile_errors() {
        assert!(matches!(
            Pattern::new("[abc"),
            Err(PatternError::UnclosedClass(_))
        ));
        assert!(matches!(
            Pattern::new("oops\\"),
            Err(PatternError::DanglingEscape(_))
        ));
    }

    #[test]
    fn adversarial_stars_terminate() {
        let pat = format!("{}b", "*a".repeat(40));
        let path = "a".repeat(200);
        assert!(!is_match(&pat, &path));
    }

    #[test]
    fn unicode_segments() {
        assert!(is_match("héll?", "héllo"));
        assert!(is_match("*ñ*", "español"));
        assert!(is_match("[αβγ]", "β"));
    }

    #[test]
    fn pattern_set_semantics() {
        let set = PatternSet::new(["*.rs", "*.toml"]).unwrap();
        assert!(set.matches("main.rs"));
        assert!(set.matches("Cargo.toml"));
        assert!(!set.matches("notes.md"));
        assert!(PatternSet::empty().is_empty());
        assert!(!PatternSet::empty().matches("anything"));
    }
}

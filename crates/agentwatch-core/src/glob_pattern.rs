//! Glob pattern compilation for watch bindings and exclusions.
//!
//! Patterns arrive as free text inside review comments, so compilation never
//! fails loudly: an invalid pattern becomes a matcher that never matches.

use regex::{Regex, RegexBuilder};

/// The literal pattern that selects every path, separators included.
pub const MATCH_ALL_PATTERN: &str = "*";

const COMPILED_PATTERN_SIZE_LIMIT: usize = 1 << 20;

#[derive(Debug, Clone)]
enum GlobMatcher {
    Everything,
    Expression(Regex),
    Never,
}

#[derive(Debug, Clone)]
/// A compiled glob pattern anchored against whole paths.
pub struct GlobPattern {
    source: String,
    matcher: GlobMatcher,
}

impl GlobPattern {
    pub fn compile(pattern: &str) -> Self {
        if pattern == MATCH_ALL_PATTERN {
            return Self {
                source: pattern.to_string(),
                matcher: GlobMatcher::Everything,
            };
        }
        let expression = glob_to_regex(pattern);
        let matcher = match RegexBuilder::new(&expression)
            .size_limit(COMPILED_PATTERN_SIZE_LIMIT)
            .build()
        {
            Ok(regex) => GlobMatcher::Expression(regex),
            Err(error) => {
                tracing::warn!(
                    pattern,
                    expression = %expression,
                    error = %error,
                    "glob pattern failed to compile and will never match"
                );
                GlobMatcher::Never
            }
        };
        Self {
            source: pattern.to_string(),
            matcher,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns false when the pattern degraded to a never-matching matcher.
    pub fn is_valid(&self) -> bool {
        !matches!(self.matcher, GlobMatcher::Never)
    }

    pub fn is_match(&self, path: &str) -> bool {
        match &self.matcher {
            GlobMatcher::Everything => true,
            GlobMatcher::Expression(regex) => regex.is_match(path),
            GlobMatcher::Never => false,
        }
    }
}

/// Convenience wrapper that compiles `pattern` and tests a single path.
pub fn glob_matches(pattern: &str, path: &str) -> bool {
    GlobPattern::compile(pattern).is_match(path)
}

/// Translates glob syntax into an anchored regular expression.
///
/// `*` stays inside one path segment, `**` crosses separators (`**/` also
/// matches zero directories), `?` is one non-separator character, `[...]` is
/// passed through as a class and `{a,b}` becomes an alternation group. Every
/// other character is escaped. Unbalanced brackets or braces are emitted as-is
/// so the regex compiler rejects them.
pub fn glob_to_regex(pattern: &str) -> String {
    let chars = pattern.chars().collect::<Vec<_>>();
    let mut expression = String::with_capacity(pattern.len() * 2 + 2);
    expression.push('^');
    let mut brace_depth = 0_usize;
    let mut index = 0_usize;
    while index < chars.len() {
        let ch = chars[index];
        match ch {
            '*' => {
                let mut end = index;
                while chars.get(end) == Some(&'*') {
                    end += 1;
                }
                if end - index == 1 {
                    expression.push_str("[^/]*");
                    index = end;
                } else if chars.get(end) == Some(&'/') {
                    expression.push_str("(?:.*/)?");
                    index = end + 1;
                } else {
                    expression.push_str(".*");
                    index = end;
                }
                continue;
            }
            '?' => expression.push_str("[^/]"),
            '[' => {
                if let Some(close) = find_class_end(&chars, index) {
                    let mut body = chars[index + 1..close].iter().collect::<String>();
                    if let Some(rest) = body.strip_prefix('!') {
                        body = format!("^{rest}");
                    }
                    expression.push('[');
                    expression.push_str(&body);
                    expression.push(']');
                    index = close + 1;
                    continue;
                }
                expression.push('[');
            }
            '{' => {
                brace_depth += 1;
                expression.push_str("(?:");
            }
            '}' => {
                brace_depth = brace_depth.saturating_sub(1);
                expression.push(')');
            }
            ',' if brace_depth > 0 => expression.push('|'),
            other => {
                let mut buffer = [0_u8; 4];
                expression.push_str(&regex::escape(other.encode_utf8(&mut buffer)));
            }
        }
        index += 1;
    }
    expression.push('$');
    expression
}

fn find_class_end(chars: &[char], open: usize) -> Option<usize> {
    let mut cursor = open + 1;
    if matches!(chars.get(cursor), Some('!') | Some('^')) {
        cursor += 1;
    }
    // A `]` directly after the opener is a literal member of the class.
    if chars.get(cursor) == Some(&']') {
        cursor += 1;
    }
    while cursor < chars.len() {
        if chars[cursor] == ']' {
            return Some(cursor);
        }
        cursor += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::{glob_matches, glob_to_regex, GlobPattern, MATCH_ALL_PATTERN};

    #[test]
    fn unit_match_all_pattern_matches_every_path() {
        for path in ["", "a.js", "a/b/c.rs", "/abs/path", ".hidden/x"] {
            assert!(glob_matches(MATCH_ALL_PATTERN, path), "path {path:?}");
        }
    }

    #[test]
    fn unit_single_star_does_not_cross_directories() {
        assert!(glob_matches("*.js", "a.js"));
        assert!(!glob_matches("*.js", "a/b.js"));
        assert!(glob_matches("**/*.js", "a/b.js"));
        assert!(glob_matches("**/*.js", "a/b/c/d.js"));
    }

    #[test]
    fn functional_double_star_slash_matches_zero_directories() {
        assert!(glob_matches("**/*.js", "a.js"));
        assert!(glob_matches("src/**/*.ts", "src/a.ts"));
        assert!(glob_matches("src/**/*.ts", "src/deep/nested/a.ts"));
        assert!(!glob_matches("src/**/*.ts", "lib/a.ts"));
        assert!(glob_matches("docs/**", "docs/a/b.md"));
    }

    #[test]
    fn functional_alternation_expands_to_group() {
        assert!(glob_matches("{a,b}.js", "a.js"));
        assert!(glob_matches("{a,b}.js", "b.js"));
        assert!(!glob_matches("{a,b}.js", "c.js"));
        assert!(glob_matches("src/*.{ts,tsx}", "src/view.tsx"));
    }

    #[test]
    fn functional_question_mark_and_classes() {
        assert!(glob_matches("file?.rs", "file1.rs"));
        assert!(!glob_matches("file?.rs", "file/.rs"));
        assert!(glob_matches("[ab].py", "a.py"));
        assert!(!glob_matches("[ab].py", "c.py"));
        assert!(glob_matches("[!ab].py", "c.py"));
        assert!(!glob_matches("[!ab].py", "a.py"));
    }

    #[test]
    fn integration_matcher_is_anchored_at_both_ends() {
        assert!(!glob_matches("a.js", "xa.js"));
        assert!(!glob_matches("a.js", "a.jsx"));
        assert!(!glob_matches("src/*.rs", "nested/src/main.rs"));
    }

    #[test]
    fn regression_regex_metacharacters_are_escaped() {
        assert!(glob_matches("a+b(1).js", "a+b(1).js"));
        assert!(!glob_matches("a.js", "abjs"));
        assert!(!glob_matches("^.*$", "anything"));
        assert!(glob_matches("^.*$", "^.*$"));
        assert_eq!(glob_to_regex("a.b"), "^a\\.b$");
    }

    #[test]
    fn regression_invalid_patterns_degrade_to_never_matching() {
        for pattern in ["{a,b", "a}", "[abc", "src/[z-a].rs"] {
            let compiled = GlobPattern::compile(pattern);
            assert!(!compiled.is_valid(), "pattern {pattern:?}");
            assert!(!compiled.is_match(pattern));
            assert!(!compiled.is_match("a"));
        }
    }

    #[test]
    fn regression_compiled_pattern_keeps_source_text() {
        let compiled = GlobPattern::compile("src/**/*.ts");
        assert_eq!(compiled.as_str(), "src/**/*.ts");
        assert!(compiled.is_valid());
    }
}

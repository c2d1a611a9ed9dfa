//! Template-to-pattern compilation for matching plan output.
//!
//! An expectation template is ordinary text with named placeholders standing
//! in for values the provisioning engine generates non-deterministically
//! (hashed set indexes, computed identifiers):
//!
//! ```text
//! subnets.{ident}:    "subnet-55555555"
//! ```
//!
//! Syntax:
//! - `{name}` - placeholder; captures the shortest possible run of characters.
//!   Reusing the same name compiles to a backreference, so every occurrence
//!   must match byte-for-byte identical text.
//! - `{{` / `}}` - a literal `{` / `}` in the matched text.
//! - Runs of whitespace match any whitespace (one or more), so templates are
//!   insensitive to column alignment in tabular plan output. This can be
//!   switched off via [`Options`].
//! - Everything else matches literally.
//!
//! # Example
//!
//! ```
//! use planmatch::template::Pattern;
//!
//! let pattern = Pattern::compile("hello {name}!").unwrap();
//! let found = pattern.search("well, hello world!").unwrap().unwrap();
//! assert_eq!(found.group("name"), Some("world"));
//! ```

use std::collections::HashSet;
use thiserror::Error;
use winnow::combinator::{alt, delimited, repeat};
use winnow::prelude::*;
use winnow::token::{one_of, take_till, take_while};

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("malformed template: stray brace at offset {offset}")]
    StrayBrace { offset: usize },
    #[error("regex error: {0}")]
    Regex(#[from] fancy_regex::Error),
}

/// One segment of a template, in source order. Concatenating the source text
/// of all tokens reconstructs the template exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'a> {
    Placeholder(&'a str),
    OpenBrace,
    CloseBrace,
    Literal(&'a str),
    Whitespace(&'a str),
}

fn ident<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)
}

fn token<'a>(input: &mut &'a str) -> ModalResult<Token<'a>> {
    alt((
        "{{".value(Token::OpenBrace),
        "}}".value(Token::CloseBrace),
        delimited('{', ident, '}').map(Token::Placeholder),
        take_while(1.., char::is_whitespace).map(Token::Whitespace),
        take_till(1.., |c: char| c == '{' || c == '}' || c.is_whitespace())
            .map(Token::Literal),
    ))
    .parse_next(input)
}

/// Split a template into tokens. A bare `{` or `}` that forms neither an
/// escaped brace nor a placeholder is rejected rather than silently dropped:
/// template strings are static test fixtures, so a stray brace is an
/// authoring bug that should fail loudly.
pub fn tokenize(template: &str) -> Result<Vec<Token<'_>>, TemplateError> {
    repeat(0.., token)
        .parse(template)
        .map_err(|e| TemplateError::StrayBrace { offset: e.offset() })
}

#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Compile whitespace runs to "one or more whitespace of any kind"
    /// instead of matching them verbatim. On by default; plan renderers
    /// column-align attribute tables, and the exact padding is not something
    /// expectations should depend on.
    pub collapse_whitespace: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            collapse_whitespace: true,
        }
    }
}

/// A compiled expectation template, ready to be searched for in plan output.
pub struct Pattern {
    regex: fancy_regex::Regex,
    names: Vec<String>,
}

impl Pattern {
    pub fn compile(template: &str) -> Result<Self, TemplateError> {
        Self::compile_with(template, Options::default())
    }

    pub fn compile_with(template: &str, options: Options) -> Result<Self, TemplateError> {
        let tokens = tokenize(template)?;

        let mut seen: HashSet<&str> = HashSet::new();
        let mut names = Vec::new();
        let mut regex_str = String::new();

        for tok in &tokens {
            match tok {
                Token::Literal(text) => regex_str.push_str(&regex::escape(text)),
                Token::Whitespace(text) => {
                    if options.collapse_whitespace {
                        regex_str.push_str(r"\s+");
                    } else {
                        regex_str.push_str(&regex::escape(text));
                    }
                }
                Token::OpenBrace => regex_str.push_str(r"\{"),
                Token::CloseBrace => regex_str.push_str(r"\}"),
                Token::Placeholder(name) => {
                    if seen.insert(name) {
                        names.push(name.to_string());
                        regex_str.push_str(&format!("(?P<{}>.*?)", name));
                    } else {
                        regex_str.push_str(&format!(r"\k<{}>", name));
                    }
                }
            }
        }

        // fancy-regex rather than regex: repeat placeholders need genuine
        // backreference support, which linear-time engines don't offer.
        let regex = fancy_regex::Regex::new(&regex_str)?;
        Ok(Self { regex, names })
    }

    /// Search `text` for the first occurrence of the pattern. The match may
    /// begin anywhere in the buffer. `Ok(None)` means the text did not
    /// contain the expected block; it is a normal outcome, not an error.
    pub fn search<'t>(&self, text: &'t str) -> Result<Option<Match<'t>>, TemplateError> {
        Ok(self.regex.captures(text)?.map(|caps| Match { caps }))
    }

    pub fn is_match(&self, text: &str) -> Result<bool, TemplateError> {
        Ok(self.regex.is_match(text)?)
    }

    /// Placeholder names in first-occurrence order.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A successful match, exposing each placeholder's captured substring.
pub struct Match<'t> {
    caps: fancy_regex::Captures<'t>,
}

impl<'t> Match<'t> {
    pub fn group(&self, name: &str) -> Option<&'t str> {
        self.caps.name(name).map(|m| m.as_str())
    }

    pub fn as_str(&self) -> &'t str {
        self.caps.get(0).map(|m| m.as_str()).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact() -> Options {
        Options {
            collapse_whitespace: false,
        }
    }

    #[test]
    fn test_tokenize_covers_input() {
        let template = "a {x} b {{c}} \t d";
        let tokens = tokenize(template).unwrap();
        let rebuilt: String = tokens
            .iter()
            .map(|t| match t {
                Token::Placeholder(name) => format!("{{{}}}", name),
                Token::OpenBrace => "{{".to_string(),
                Token::CloseBrace => "}}".to_string(),
                Token::Literal(text) => text.to_string(),
                Token::Whitespace(text) => text.to_string(),
            })
            .collect();
        assert_eq!(rebuilt, template);
    }

    #[test]
    fn test_tokenize_forms() {
        let tokens = tokenize("id.{{x}} {name}").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Literal("id."),
                Token::OpenBrace,
                Token::Literal("x"),
                Token::CloseBrace,
                Token::Whitespace(" "),
                Token::Placeholder("name"),
            ]
        );
    }

    #[test]
    fn test_tokenize_stray_open_brace() {
        let err = tokenize("ingress.{ count").unwrap_err();
        assert!(matches!(err, TemplateError::StrayBrace { offset: 8 }));
    }

    #[test]
    fn test_tokenize_stray_close_brace() {
        assert!(tokenize("a } b").is_err());
    }

    #[test]
    fn test_tokenize_unclosed_placeholder() {
        assert!(tokenize("{name").is_err());
    }

    #[test]
    fn test_literal_only_matches_itself() {
        let pattern = Pattern::compile_with("Plan: 5 to add, 0 to change.", exact()).unwrap();
        assert!(pattern.is_match("Plan: 5 to add, 0 to change.").unwrap());
        assert!(!pattern.is_match("Plan: 6 to add, 0 to change.").unwrap());
    }

    #[test]
    fn test_literal_regex_metacharacters_escaped() {
        let pattern = Pattern::compile("tags.%: \"3\"").unwrap();
        assert!(pattern.is_match("tags.%: \"3\"").unwrap());
        // An unescaped `.` would match here
        assert!(!pattern.is_match("tagsX%: \"3\"").unwrap());
    }

    #[test]
    fn test_single_placeholder_captures_shortest() {
        let pattern = Pattern::compile("{x}!").unwrap();
        let found = pattern.search("ab!cd!").unwrap().unwrap();
        assert_eq!(found.group("x"), Some("ab"));
    }

    #[test]
    fn test_search_anywhere_in_buffer() {
        let pattern = Pattern::compile("name: \"{n}\"").unwrap();
        let text = "irrelevant preamble\n  name: \"router\"\ntrailer";
        let found = pattern.search(text).unwrap().unwrap();
        assert_eq!(found.group("n"), Some("router"));
    }

    #[test]
    fn test_repeat_placeholder_must_match_identically() {
        let pattern = Pattern::compile("a {x} b {x} c").unwrap();
        let found = pattern.search("a 42 b 42 c").unwrap().unwrap();
        assert_eq!(found.group("x"), Some("42"));
        assert!(pattern.search("a 42 b 43 c").unwrap().is_none());
    }

    #[test]
    fn test_repeat_placeholder_backtracks() {
        // A post-hoc equality check over independent captures would bind
        // x="a" and fail; a real backreference finds x="a b".
        let pattern = Pattern::compile("{x} {x}").unwrap();
        let found = pattern.search("a b a b").unwrap().unwrap();
        assert_eq!(found.group("x"), Some("a b"));
    }

    #[test]
    fn test_escaped_braces_are_literal() {
        let pattern = Pattern::compile("id.{{ident}}.name").unwrap();
        assert!(pattern.is_match("id.{ident}.name").unwrap());
        assert!(!pattern.is_match("id.XYZ.name").unwrap());
    }

    #[test]
    fn test_whitespace_collapsing() {
        let pattern = Pattern::compile("a:   1").unwrap();
        assert!(pattern.is_match("a: 1").unwrap());
        assert!(pattern.is_match("a:\t\t1").unwrap());
    }

    #[test]
    fn test_whitespace_exact_when_collapse_off() {
        let pattern = Pattern::compile_with("a:   1", exact()).unwrap();
        assert!(pattern.is_match("a:   1").unwrap());
        assert!(!pattern.is_match("a: 1").unwrap());
    }

    #[test]
    fn test_placeholder_does_not_cross_lines() {
        let pattern = Pattern::compile_with("a {x} b", exact()).unwrap();
        assert!(pattern.search("a 1\n2 b").unwrap().is_none());
    }

    #[test]
    fn test_whitespace_crosses_lines() {
        let pattern = Pattern::compile("egress.#: \"1\"\nvpc_id: \"vpc-12345678\"").unwrap();
        let text = "      egress.#:    \"1\"\n      vpc_id:      \"vpc-12345678\"";
        assert!(pattern.is_match(text).unwrap());
    }

    #[test]
    fn test_names_in_first_occurrence_order() {
        let pattern = Pattern::compile("{b} {a} {b}").unwrap();
        assert_eq!(pattern.names(), &["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_consistent_identifier_across_resource_block() {
        let template = "\
ingress.{ident}.cidr_blocks.#:      \"1\"
ingress.{ident}.cidr_blocks.0:      \"0.0.0.0/0\"
ingress.{ident}.from_port:          \"443\"
ingress.{ident}.to_port:            \"443\"";
        let pattern = Pattern::compile(template).unwrap();

        let consistent = "\
      ingress.2617001939.cidr_blocks.#:      \"1\"
      ingress.2617001939.cidr_blocks.0:      \"0.0.0.0/0\"
      ingress.2617001939.from_port:          \"443\"
      ingress.2617001939.to_port:            \"443\"";
        let found = pattern.search(consistent).unwrap().unwrap();
        assert_eq!(found.group("ident"), Some("2617001939"));

        let inconsistent = "\
      ingress.2617001939.cidr_blocks.#:      \"1\"
      ingress.2617001939.cidr_blocks.0:      \"0.0.0.0/0\"
      ingress.1111111111.from_port:          \"443\"
      ingress.2617001939.to_port:            \"443\"";
        assert!(pattern.search(inconsistent).unwrap().is_none());
    }

    #[test]
    fn test_distinct_placeholders_capture_independently() {
        let template = "\
subnets.{ident1}: \"subnet-55555555\"
subnets.{ident2}: \"subnet-33333333\"";
        let pattern = Pattern::compile(template).unwrap();
        let text = "\
      subnets.1482904285: \"subnet-55555555\"
      subnets.3154575106: \"subnet-33333333\"";
        let found = pattern.search(text).unwrap().unwrap();
        assert_eq!(found.group("ident1"), Some("1482904285"));
        assert_eq!(found.group("ident2"), Some("3154575106"));
    }

    #[test]
    fn test_compile_is_idempotent() {
        let a = Pattern::compile("x.{i}: {v}").unwrap();
        let b = Pattern::compile("x.{i}: {v}").unwrap();
        let text = "x.123: computed";
        assert_eq!(
            a.search(text).unwrap().unwrap().as_str(),
            b.search(text).unwrap().unwrap().as_str()
        );
    }

    #[test]
    fn test_no_match_is_not_an_error() {
        let pattern = Pattern::compile("absent {x} block").unwrap();
        assert!(pattern.search("entirely different text").unwrap().is_none());
    }
}

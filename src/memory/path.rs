//! Memory path parsing
//!
//! Paths are scope-qualified (`user.profile.name`, `dialog.items[0]`,
//! `conversation['display name']`). A few shorthands are expanded while
//! parsing:
//!
//! - `$name` addresses `dialog.name`
//! - `#intent` addresses `turn.recognized.intents.intent`
//! - `@entity` addresses the first value of `turn.recognized.entities.entity`
//! - `@@entity` addresses every value of `turn.recognized.entities.entity`
//!
//! A path without a known scope prefix resolves against `dialog`.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag},
    character::complete::{alpha1, alphanumeric1, char, digit1},
    combinator::{all_consuming, map, map_res, opt, recognize},
    multi::{many0, many0_count},
    sequence::{delimited, pair, preceded},
    IResult,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::scopes::MemoryScope;
use crate::errors::ExpressionError;

/// One step of a memory path
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A parsed, scope-qualified memory path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPath {
    /// Scope the path starts in
    pub scope: MemoryScope,
    /// Steps below the scope root
    pub segments: Vec<PathSegment>,
    /// Take the first element when the resolved value is an array (`@entity`)
    pub first_element: bool,
}

impl MemoryPath {
    pub fn new(scope: MemoryScope, segments: Vec<PathSegment>) -> Self {
        Self {
            scope,
            segments,
            first_element: false,
        }
    }

    /// Parse a path, expanding shorthands
    pub fn parse(text: &str) -> Result<Self, ExpressionError> {
        let trimmed = text.trim();
        match all_consuming(memory_path)(trimmed) {
            Ok((_, path)) => Ok(path),
            Err(_) => Err(ExpressionError::Parse(format!("invalid memory path '{trimmed}'"))),
        }
    }

    /// True when the path addresses a whole scope
    pub fn is_scope_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for MemoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.scope)?;
        for segment in &self.segments {
            match segment {
                PathSegment::Key(key) if is_identifier(key) => write!(f, ".{key}")?,
                PathSegment::Key(key) => write!(f, "['{key}']")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

fn is_identifier(key: &str) -> bool {
    matches!(all_consuming(identifier)(key), Ok(_))
}

pub(crate) fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn quoted_key(input: &str) -> IResult<&str, String> {
    map(
        alt((
            delimited(char('\''), opt(is_not("'")), char('\'')),
            delimited(char('"'), opt(is_not("\"")), char('"')),
        )),
        |key: Option<&str>| key.unwrap_or_default().to_string(),
    )(input)
}

fn bracket_segment(input: &str) -> IResult<&str, PathSegment> {
    delimited(
        char('['),
        alt((
            map_res(digit1, |digits: &str| digits.parse::<usize>().map(PathSegment::Index)),
            map(quoted_key, PathSegment::Key),
        )),
        char(']'),
    )(input)
}

fn segment(input: &str) -> IResult<&str, PathSegment> {
    alt((
        map(preceded(char('.'), identifier), |key| PathSegment::Key(key.to_string())),
        bracket_segment,
    ))(input)
}

fn recognized(kind: &str, rest: Vec<PathSegment>) -> Vec<PathSegment> {
    let mut segments = vec![
        PathSegment::Key("recognized".to_string()),
        PathSegment::Key(kind.to_string()),
    ];
    segments.extend(rest);
    segments
}

/// Parse a memory path at the start of `input`
pub(crate) fn memory_path(input: &str) -> IResult<&str, MemoryPath> {
    alt((
        map(
            preceded(tag("@@"), pair(identifier, many0(segment))),
            |(name, rest)| {
                let mut tail = vec![PathSegment::Key(name.to_string())];
                tail.extend(rest);
                MemoryPath::new(MemoryScope::Turn, recognized("entities", tail))
            },
        ),
        map(
            preceded(char('@'), pair(identifier, many0(segment))),
            |(name, rest)| {
                let mut path = MemoryPath::new(
                    MemoryScope::Turn,
                    recognized("entities", vec![PathSegment::Key(name.to_string())]),
                );
                path.first_element = rest.is_empty();
                path.segments.extend(rest);
                path
            },
        ),
        map(
            preceded(char('#'), pair(identifier, many0(segment))),
            |(name, rest)| {
                let mut tail = vec![PathSegment::Key(name.to_string())];
                tail.extend(rest);
                MemoryPath::new(MemoryScope::Turn, recognized("intents", tail))
            },
        ),
        map(
            preceded(char('$'), pair(opt(identifier), many0(segment))),
            |(name, rest)| {
                let mut segments: Vec<PathSegment> =
                    name.map(|n| PathSegment::Key(n.to_string())).into_iter().collect();
                segments.extend(rest);
                MemoryPath::new(MemoryScope::Dialog, segments)
            },
        ),
        map(pair(identifier, many0(segment)), |(head, rest)| {
            match MemoryScope::from_name(head) {
                Some(scope) => MemoryPath::new(scope, rest),
                None => {
                    let mut segments = vec![PathSegment::Key(head.to_string())];
                    segments.extend(rest);
                    MemoryPath::new(MemoryScope::Dialog, segments)
                }
            }
        }),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(path: &MemoryPath) -> Vec<String> {
        path.segments
            .iter()
            .map(|s| match s {
                PathSegment::Key(k) => k.clone(),
                PathSegment::Index(i) => i.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_scope_qualified_paths() {
        let path = MemoryPath::parse("user.profile.name").unwrap();
        assert_eq!(path.scope, MemoryScope::User);
        assert_eq!(keys(&path), vec!["profile", "name"]);

        let path = MemoryPath::parse("dialog.items[2]['first name']").unwrap();
        assert_eq!(path.scope, MemoryScope::Dialog);
        assert_eq!(
            path.segments,
            vec![
                PathSegment::Key("items".into()),
                PathSegment::Index(2),
                PathSegment::Key("first name".into()),
            ]
        );
    }

    #[test]
    fn test_unqualified_path_defaults_to_dialog() {
        let path = MemoryPath::parse("counter").unwrap();
        assert_eq!(path.scope, MemoryScope::Dialog);
        assert_eq!(path.to_string(), "dialog.counter");
    }

    #[test]
    fn test_shorthands() {
        let path = MemoryPath::parse("$todo").unwrap();
        assert_eq!(path.to_string(), "dialog.todo");

        let path = MemoryPath::parse("#Greeting").unwrap();
        assert_eq!(path.to_string(), "turn.recognized.intents.Greeting");

        let path = MemoryPath::parse("@city").unwrap();
        assert_eq!(path.to_string(), "turn.recognized.entities.city");
        assert!(path.first_element);

        let path = MemoryPath::parse("@@city").unwrap();
        assert!(!path.first_element);
    }

    #[test]
    fn test_invalid_paths() {
        assert!(MemoryPath::parse("").is_err());
        assert!(MemoryPath::parse("user..name").is_err());
        assert!(MemoryPath::parse("user.[x]").is_err());
    }
}

//! Path Expressions
//!
//! Path expressions address nodes in the configuration document. The
//! language is a small XPath-like subset:
//!
//! ```text
//! /network/interface                       every interface node
//! /network/interface[uuid='u1']            one interface
//! /network/interface[name='a' or name='b'] interfaces named a or b
//! //*[*='u1' and uuid!='u1']               any node with a property equal to u1, except u1 itself
//! ```
//!
//! # Node model
//!
//! Nodes are JSON objects. A child step `name` yields the object stored
//! under `name`, or every object element when `name` holds an array. Scalar
//! values are properties, never nodes.
//!
//! # Comparisons
//!
//! `p='v'` holds when the direct property `p` is a scalar whose text is `v`,
//! or an array containing such a scalar. `*` as the property tests every
//! direct property. `p!='v'` is the negation of `p='v'`, so a missing
//! property is not equal to anything.

use crate::db::BackendError;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Check that a name can be used as a path step or property
pub fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Quote a value as a path literal
pub fn quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

/// Text form of a scalar JSON value, `None` for objects, arrays and null
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// One step of a resolved location inside the document
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Address of one node inside the document
pub type Location = Vec<Segment>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Named(String),
}

impl NameTest {
    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Named(n) => n == name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    NotEq,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Comparison {
    property: NameTest,
    op: CompareOp,
    literal: String,
}

impl Comparison {
    fn holds(&self, node: &Value) -> bool {
        let Some(map) = node.as_object() else {
            return false;
        };
        let equal = match &self.property {
            NameTest::Named(p) => map
                .get(p)
                .is_some_and(|v| value_matches(v, &self.literal)),
            NameTest::Any => map.values().any(|v| value_matches(v, &self.literal)),
        };
        match self.op {
            CompareOp::Eq => equal,
            CompareOp::NotEq => !equal,
        }
    }
}

fn value_matches(value: &Value, literal: &str) -> bool {
    match value {
        Value::Array(items) => items
            .iter()
            .any(|item| scalar_text(item).is_some_and(|t| t == literal)),
        other => scalar_text(other).is_some_and(|t| t == literal),
    }
}

/// Disjunction of conjunctions
#[derive(Debug, Clone, PartialEq, Eq)]
struct Predicate {
    any_of: Vec<Vec<Comparison>>,
}

impl Predicate {
    fn holds(&self, node: &Value) -> bool {
        self.any_of
            .iter()
            .any(|all_of| all_of.iter().all(|c| c.holds(node)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    name: NameTest,
    predicate: Option<Predicate>,
}

impl Step {
    fn is_plain(&self) -> bool {
        self.axis == Axis::Child
            && matches!(self.name, NameTest::Named(_))
            && self.predicate.is_none()
    }
}

/// A parsed path expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    source: String,
    steps: Vec<Step>,
}

impl PathExpr {
    /// Parse a path expression
    pub fn parse(source: &str) -> Result<Self, BackendError> {
        Parser::new(source).parse()
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Step names when every step is a plain child name without predicate
    pub fn plain_names(&self) -> Option<Vec<&str>> {
        self.steps
            .iter()
            .map(|step| match (&step.name, step.is_plain()) {
                (NameTest::Named(n), true) => Some(n.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Split into the parent expression and the final plain name
    ///
    /// Used for appends: the final step names the list to append to. The
    /// parent is `None` when the list lives directly under the root.
    pub fn split_last(&self) -> Result<(Option<PathExpr>, &str), BackendError> {
        let (last, parents) = self
            .steps
            .split_last()
            .ok_or_else(|| BackendError::invalid_path(&self.source, "empty path"))?;

        let name = match (&last.name, last.is_plain()) {
            (NameTest::Named(n), true) => n.as_str(),
            _ => {
                return Err(BackendError::invalid_path(
                    &self.source,
                    "final step must be a plain name to append",
                ))
            }
        };

        let parent = if parents.is_empty() {
            None
        } else {
            Some(PathExpr {
                source: render_steps(parents),
                steps: parents.to_vec(),
            })
        };

        Ok((parent, name))
    }

    /// Resolve the expression against a document root
    ///
    /// Locations are returned in document order without duplicates.
    pub fn evaluate(&self, root: &Value) -> Vec<Location> {
        let mut context: Vec<(Location, &Value)> = vec![(Vec::new(), root)];

        for step in &self.steps {
            let mut next = Vec::new();
            for (location, node) in &context {
                match step.axis {
                    Axis::Child => collect_children(location, *node, &step.name, &mut next),
                    Axis::Descendant => {
                        collect_descendants(location, *node, &step.name, &mut next)
                    }
                }
            }

            if let Some(predicate) = &step.predicate {
                next.retain(|(_, node)| predicate.holds(node));
            }

            let mut seen = std::collections::HashSet::new();
            next.retain(|(location, _)| seen.insert(location.clone()));
            context = next;
        }

        context.into_iter().map(|(location, _)| location).collect()
    }
}

impl FromStr for PathExpr {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Node children in document order, paired with the name they live under
fn children<'a>(location: &Location, node: &'a Value) -> Vec<(Location, &'a str, &'a Value)> {
    let mut out = Vec::new();
    let Some(map) = node.as_object() else {
        return out;
    };

    for (key, value) in map {
        match value {
            Value::Object(_) => {
                let mut child = location.clone();
                child.push(Segment::Key(key.clone()));
                out.push((child, key.as_str(), value));
            }
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    if item.is_object() {
                        let mut child = location.clone();
                        child.push(Segment::Key(key.clone()));
                        child.push(Segment::Index(index));
                        out.push((child, key.as_str(), item));
                    }
                }
            }
            _ => {}
        }
    }
    out
}

fn collect_children<'a>(
    location: &Location,
    node: &'a Value,
    name: &NameTest,
    out: &mut Vec<(Location, &'a Value)>,
) {
    for (child, child_name, value) in children(location, node) {
        if name.matches(child_name) {
            out.push((child, value));
        }
    }
}

fn collect_descendants<'a>(
    location: &Location,
    node: &'a Value,
    name: &NameTest,
    out: &mut Vec<(Location, &'a Value)>,
) {
    for (child, child_name, value) in children(location, node) {
        if name.matches(child_name) {
            out.push((child.clone(), value));
        }
        collect_descendants(&child, value, name, out);
    }
}

fn render_steps(steps: &[Step]) -> String {
    let mut out = String::new();
    for step in steps {
        out.push_str(match step.axis {
            Axis::Child => "/",
            Axis::Descendant => "//",
        });
        match &step.name {
            NameTest::Any => out.push('*'),
            NameTest::Named(n) => out.push_str(n),
        }
        if let Some(predicate) = &step.predicate {
            out.push('[');
            let clauses: Vec<String> = predicate
                .any_of
                .iter()
                .map(|all_of| {
                    all_of
                        .iter()
                        .map(|c| {
                            let property = match &c.property {
                                NameTest::Any => "*",
                                NameTest::Named(n) => n.as_str(),
                            };
                            let op = match c.op {
                                CompareOp::Eq => "=",
                                CompareOp::NotEq => "!=",
                            };
                            format!("{}{}{}", property, op, quote_literal(&c.literal))
                        })
                        .collect::<Vec<_>>()
                        .join(" and ")
                })
                .collect();
            out.push_str(&clauses.join(" or "));
            out.push(']');
        }
    }
    out
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> BackendError {
        BackendError::invalid_path(
            self.source,
            format!("{} at offset {}", reason.into(), self.pos),
        )
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn parse(mut self) -> Result<PathExpr, BackendError> {
        if self.chars.is_empty() {
            return Err(self.error("empty path"));
        }

        let mut steps = Vec::new();
        while self.pos < self.chars.len() {
            if !self.eat('/') {
                return Err(self.error("expected '/'"));
            }
            let axis = if self.eat('/') {
                Axis::Descendant
            } else {
                Axis::Child
            };
            let name = self.parse_name()?;
            let predicate = if self.eat('[') {
                let predicate = self.parse_predicate()?;
                self.skip_whitespace();
                if !self.eat(']') {
                    return Err(self.error("expected ']'"));
                }
                Some(predicate)
            } else {
                None
            };
            steps.push(Step {
                axis,
                name,
                predicate,
            });
        }

        Ok(PathExpr {
            source: self.source.to_string(),
            steps,
        })
    }

    fn parse_name(&mut self) -> Result<NameTest, BackendError> {
        if self.eat('*') {
            return Ok(NameTest::Any);
        }
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected a name or '*'"));
        }
        Ok(NameTest::Named(self.chars[start..self.pos].iter().collect()))
    }

    fn parse_predicate(&mut self) -> Result<Predicate, BackendError> {
        let mut any_of = vec![self.parse_conjunction()?];
        while self.eat_keyword("or") {
            any_of.push(self.parse_conjunction()?);
        }
        Ok(Predicate { any_of })
    }

    fn parse_conjunction(&mut self) -> Result<Vec<Comparison>, BackendError> {
        let mut all_of = vec![self.parse_comparison()?];
        while self.eat_keyword("and") {
            all_of.push(self.parse_comparison()?);
        }
        Ok(all_of)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        self.skip_whitespace();
        let end = self.pos + keyword.len();
        if end > self.chars.len() {
            return false;
        }
        let word: String = self.chars[self.pos..end].iter().collect();
        let boundary = self
            .chars
            .get(end)
            .map_or(true, |c| c.is_whitespace() || *c == '\'' || *c == '"');
        if word == keyword && boundary {
            self.pos = end;
            true
        } else {
            false
        }
    }

    fn parse_comparison(&mut self) -> Result<Comparison, BackendError> {
        self.skip_whitespace();
        let property = self.parse_name()?;
        self.skip_whitespace();
        let op = if self.eat('=') {
            CompareOp::Eq
        } else if self.eat('!') {
            if !self.eat('=') {
                return Err(self.error("expected '=' after '!'"));
            }
            CompareOp::NotEq
        } else {
            return Err(self.error("expected '=' or '!='"));
        };
        self.skip_whitespace();
        let literal = self.parse_literal()?;
        Ok(Comparison {
            property,
            op,
            literal,
        })
    }

    fn parse_literal(&mut self) -> Result<String, BackendError> {
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected a quoted literal")),
        };
        self.pos += 1;

        let mut literal = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated literal")),
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c) => {
                            literal.push(c);
                            self.pos += 1;
                        }
                        None => return Err(self.error("unterminated escape")),
                    }
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(literal);
                }
                Some(c) => {
                    literal.push(c);
                    self.pos += 1;
                }
            }
        }
    }
}

// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Version ordering and version specifications.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

#[cfg(test)]
#[path = "./version_test.rs"]
mod version_test;

/// Compare two version strings component by component.
///
/// Components are separated by `.`, `-`, `_` or `+`. Numeric components
/// compare numerically and sort after textual ones; when every shared
/// component is equal the version with more components is newer.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left: Vec<&str> = components(a).collect();
    let right: Vec<&str> = components(b).collect();
    for (l, r) in left.iter().zip(right.iter()) {
        let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
            (Ok(l), Ok(r)) => l.cmp(&r),
            (Ok(_), Err(_)) => Ordering::Greater,
            (Err(_), Ok(_)) => Ordering::Less,
            (Err(_), Err(_)) => l.cmp(r),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    left.len().cmp(&right.len())
}

fn components(version: &str) -> impl Iterator<Item = &str> {
    version
        .split(['.', '-', '_', '+'])
        .filter(|c| !c.is_empty())
}

/// Relational operator in a version expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl VersionOp {
    fn holds(self, ord: Ordering) -> bool {
        match self {
            Self::Eq => ord == Ordering::Equal,
            Self::Ne => ord != Ordering::Equal,
            Self::Lt => ord == Ordering::Less,
            Self::Le => ord != Ordering::Greater,
            Self::Gt => ord == Ordering::Greater,
            Self::Ge => ord != Ordering::Less,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    /// Split a leading operator off `term`, longest spelling first.
    fn split(term: &str) -> Option<(Self, &str)> {
        const OPS: [(&str, VersionOp); 7] = [
            ("==", VersionOp::Eq),
            ("!=", VersionOp::Ne),
            ("<=", VersionOp::Le),
            (">=", VersionOp::Ge),
            ("<", VersionOp::Lt),
            (">", VersionOp::Gt),
            ("=", VersionOp::Eq),
        ];
        OPS.iter()
            .find_map(|(text, op)| term.strip_prefix(*text).map(|rest| (*op, rest.trim())))
    }
}

/// A boolean combination of version comparisons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionExpr {
    Compare { op: VersionOp, version: String },
    All(Vec<VersionExpr>),
    Any(Vec<VersionExpr>),
}

impl VersionExpr {
    pub fn is_satisfied_by(&self, version: &str) -> bool {
        match self {
            Self::Compare { op, version: wanted } => {
                op.holds(compare_versions(version, wanted))
            }
            Self::All(terms) => terms.iter().all(|t| t.is_satisfied_by(version)),
            Self::Any(terms) => terms.iter().any(|t| t.is_satisfied_by(version)),
        }
    }
}

impl fmt::Display for VersionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare { op, version } => write!(f, "{} {version}", op.as_str()),
            Self::All(terms) => write_joined(f, terms, " && "),
            Self::Any(terms) => write_joined(f, terms, " || "),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, terms: &[VersionExpr], sep: &str) -> fmt::Result {
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{term}")?;
    }
    Ok(())
}

/// A requested version: either a literal version name or an expression
/// that installed versions are matched against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    Exact(String),
    Expr(VersionExpr),
}

impl VersionSpec {
    /// The literal version, if this is not an expression.
    pub fn literal(&self) -> Option<&str> {
        match self {
            Self::Exact(version) => Some(version.as_str()),
            Self::Expr(_) => None,
        }
    }

    pub fn is_satisfied_by(&self, version: &str) -> bool {
        match self {
            Self::Exact(wanted) => wanted == version,
            Self::Expr(expr) => expr.is_satisfied_by(version),
        }
    }

    /// Pick the newest of `candidates` that satisfies this spec.
    pub fn best_match<'a, I>(&self, candidates: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates
            .into_iter()
            .filter(|v| self.is_satisfied_by(v))
            .max_by(|a, b| compare_versions(a, b))
    }
}

impl FromStr for VersionSpec {
    type Err = Error;

    fn from_str(spec: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidVersionSpec {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty version"));
        }

        let is_expression = trimmed.contains("||")
            || trimmed.contains("&&")
            || VersionOp::split(trimmed).is_some();
        if !is_expression {
            if trimmed.split_whitespace().count() > 1 {
                return Err(invalid("a literal version may not contain whitespace"));
            }
            return Ok(Self::Exact(trimmed.to_string()));
        }

        let mut alternatives = Vec::new();
        for alternative in trimmed.split("||") {
            let mut terms = Vec::new();
            for term in alternative.split("&&") {
                let term = term.trim();
                let (op, version) = VersionOp::split(term).unwrap_or((VersionOp::Eq, term));
                if version.is_empty() || version.contains(char::is_whitespace) {
                    return Err(invalid(&format!("cannot parse term '{term}'")));
                }
                terms.push(VersionExpr::Compare {
                    op,
                    version: version.to_string(),
                });
            }
            alternatives.push(if terms.len() == 1 {
                terms.remove(0)
            } else {
                VersionExpr::All(terms)
            });
        }

        let expr = if alternatives.len() == 1 {
            alternatives.remove(0)
        } else {
            VersionExpr::Any(alternatives)
        };
        Ok(Self::Expr(expr))
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(version) => f.write_str(version),
            Self::Expr(expr) => write!(f, "{expr}"),
        }
    }
}

// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Table file parsing and flattening.
//!
//! A table file describes, per flavor and build type, the environment
//! changes and dependencies a product needs:
//!
//! ```text
//! # python.table
//! setupRequired(zlib)
//! setupOptional("readline >= 6")
//! envPrepend(PATH, ${PRODUCT_DIR}/bin)
//!
//! if (FLAVOR == DarwinX86 || FLAVOR == Darwin) {
//!     envSet(PYTHON_FRAMEWORK, 1)
//! } else if (FLAVOR == Linux && TYPE == build) {
//!     envAppend(LD_LIBRARY_PATH, ${PRODUCT_DIR}/lib)
//! }
//! ```
//!
//! The keyword form `if (...) ... elseif (...) ... else ... endif` is
//! accepted as well. A table either parses completely or not at all.

use std::path::{Path, PathBuf};

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while, take_while1};
use nom::character::complete::{char, multispace1, not_line_ending, satisfy, space0, space1};
use nom::combinator::{cut, map, not, opt, recognize, value, verify};
use nom::error::{VerboseError, VerboseErrorKind, context};
use nom::multi::{many0, separated_list1};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use nom::IResult;

use crate::action::{Action, ActionKind, DEFAULT_SEPARATOR, Dependency};
use crate::flavor::Flavor;
use crate::version::VersionSpec;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./table_test.rs"]
mod table_test;

/// Extension of table files.
pub const TABLE_EXTENSION: &str = "table";

type ParseResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// A guard on a conditional block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Flavor { value: String, negate: bool },
    BuildType { value: String, negate: bool },
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

impl Condition {
    /// Evaluate the guard for a requested flavor and build type.
    ///
    /// A flavor comparison matches the flavor itself and its `+` variants.
    /// A build type comparison only matches a build type the caller asked
    /// for.
    pub fn eval(&self, flavor: Option<&Flavor>, build_type: Option<&str>) -> bool {
        match self {
            Self::Flavor { value, negate } => {
                flavor.is_some_and(|f| f.matches(value)) != *negate
            }
            Self::BuildType { value, negate } => (build_type == Some(value.as_str())) != *negate,
            Self::All(terms) => terms.iter().all(|t| t.eval(flavor, build_type)),
            Self::Any(terms) => terms.iter().any(|t| t.eval(flavor, build_type)),
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Action(ActionKind),
    Conditional {
        branches: Vec<(Condition, Vec<Node>)>,
        otherwise: Option<Vec<Node>>,
    },
}

/// A parsed table file.
#[derive(Debug, Clone)]
pub struct Table {
    path: Option<PathBuf>,
    nodes: Vec<Node>,
}

impl Table {
    /// Parse table source. `path` is only used for error reporting.
    pub fn parse(source: &str, path: Option<&Path>) -> Result<Self> {
        let report_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("<table>"));
        let malformed = |rest: &str, detail: &str| {
            let (line, text) = locate(source, rest);
            Error::MalformedTable {
                path: report_path.clone(),
                line,
                detail: if text.is_empty() {
                    detail.to_string()
                } else {
                    format!("{detail}: `{text}`")
                },
            }
        };

        let raw = match terminated(statements, ws)(source) {
            Ok(("", raw)) => raw,
            Ok((rest, _)) => return Err(malformed(rest, "unsupported statement")),
            Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => {
                let rest = err.errors.first().map(|(rest, _)| *rest).unwrap_or("");
                let detail = err
                    .errors
                    .iter()
                    .find_map(|(_, kind)| match kind {
                        VerboseErrorKind::Context(ctx) => Some(*ctx),
                        _ => None,
                    })
                    .unwrap_or("syntax error");
                return Err(malformed(rest, detail));
            }
            Err(nom::Err::Incomplete(_)) => return Err(malformed("", "unexpected end of table")),
        };

        let nodes = build_nodes(raw, &malformed)?;
        Ok(Self {
            path: path.map(Path::to_path_buf),
            nodes,
        })
    }

    /// Load and parse a table file from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|error| {
            if error.kind() == std::io::ErrorKind::NotFound {
                Error::TablefileNotFound {
                    path: Some(path.to_path_buf()),
                    name: None,
                    version: None,
                    flavor: None,
                }
            } else {
                Error::ReadFailed {
                    path: path.to_path_buf(),
                    error,
                }
            }
        })?;
        Self::parse(&source, Some(path))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Flatten the table into the ordered actions that apply to `flavor`
    /// and `build_type`.
    ///
    /// At most one branch of each conditional contributes: the first whose
    /// guard matches, else the `else` branch if there is one.
    pub fn actions(&self, flavor: Option<&str>, build_type: Option<&str>) -> Vec<Action> {
        let requested = flavor.map(Flavor::new);
        let mut actions = Vec::new();
        flatten(&self.nodes, requested.as_ref(), build_type, &mut actions);
        actions
    }
}

fn flatten(
    nodes: &[Node],
    flavor: Option<&Flavor>,
    build_type: Option<&str>,
    out: &mut Vec<Action>,
) {
    for node in nodes {
        match node {
            Node::Action(kind) => out.push(Action {
                kind: kind.clone(),
                flavor: flavor.map(|f| f.to_string()),
            }),
            Node::Conditional {
                branches,
                otherwise,
            } => {
                let chosen = branches
                    .iter()
                    .find(|(cond, _)| cond.eval(flavor, build_type))
                    .map(|(_, body)| body)
                    .or(otherwise.as_ref());
                if let Some(body) = chosen {
                    flatten(body, flavor, build_type, out);
                }
            }
        }
    }
}

/// Line number and trimmed line text at the position where `rest` begins.
fn locate<'a>(source: &'a str, rest: &str) -> (usize, &'a str) {
    let offset = source.len().saturating_sub(rest.len());
    let line = source[..offset].matches('\n').count() + 1;
    let text = source.lines().nth(line - 1).unwrap_or_default().trim();
    (line, text)
}

// Syntax tree straight out of the parser, before statements are checked.
enum RawNode<'a> {
    Call {
        name: &'a str,
        args: Vec<String>,
        at: &'a str,
    },
    If {
        branches: Vec<(Condition, Vec<RawNode<'a>>)>,
        otherwise: Option<Vec<RawNode<'a>>>,
    },
}

fn build_nodes<'a>(
    raw: Vec<RawNode<'a>>,
    malformed: &dyn Fn(&'a str, &str) -> Error,
) -> Result<Vec<Node>> {
    raw.into_iter()
        .map(|node| match node {
            RawNode::Call { name, args, at } => build_action(name, args)
                .map(Node::Action)
                .map_err(|detail| malformed(at, &detail)),
            RawNode::If {
                branches,
                otherwise,
            } => {
                let branches = branches
                    .into_iter()
                    .map(|(cond, body)| Ok((cond, build_nodes(body, malformed)?)))
                    .collect::<Result<Vec<_>>>()?;
                let otherwise = otherwise
                    .map(|body| build_nodes(body, malformed))
                    .transpose()?;
                Ok(Node::Conditional {
                    branches,
                    otherwise,
                })
            }
        })
        .collect()
}

fn check_arity(name: &str, count: usize, min: usize, max: usize) -> std::result::Result<(), String> {
    if (min..=max).contains(&count) {
        return Ok(());
    }
    let expected = if min == max {
        min.to_string()
    } else {
        format!("{min} to {max}")
    };
    Err(format!("{name} expects {expected} argument(s), got {count}"))
}

fn build_action(name: &str, mut args: Vec<String>) -> std::result::Result<ActionKind, String> {
    let kind = match name.to_ascii_lowercase().as_str() {
        "envset" | "pathset" => {
            check_arity(name, args.len(), 2, 2)?;
            let value = args.pop().unwrap_or_default();
            let var = args.pop().unwrap_or_default();
            ActionKind::SetEnv { var, value }
        }
        lower @ ("envappend" | "pathappend" | "envprepend" | "pathprepend") => {
            check_arity(name, args.len(), 2, 3)?;
            let separator = if args.len() == 3 {
                args.pop().unwrap_or_default()
            } else {
                DEFAULT_SEPARATOR.to_string()
            };
            let value = args.pop().unwrap_or_default();
            let var = args.pop().unwrap_or_default();
            if lower.ends_with("append") {
                ActionKind::AppendEnv {
                    var,
                    value,
                    separator,
                }
            } else {
                ActionKind::PrependEnv {
                    var,
                    value,
                    separator,
                }
            }
        }
        "addalias" => {
            check_arity(name, args.len(), 2, 2)?;
            let command = args.pop().unwrap_or_default();
            let name = args.pop().unwrap_or_default();
            ActionKind::AddAlias { name, command }
        }
        "unsetalias" | "removealias" => {
            check_arity(name, args.len(), 1, 1)?;
            ActionKind::RemoveAlias {
                name: args.pop().unwrap_or_default(),
            }
        }
        "sourcerequired" => {
            check_arity(name, args.len(), 1, 1)?;
            ActionKind::SourceRequired {
                script: args.pop().unwrap_or_default(),
            }
        }
        lower @ ("setuprequired" | "setupoptional") => {
            let dependency = parse_dependency(&args.join(" "))?;
            if lower == "setuprequired" {
                ActionKind::SetupRequired(dependency)
            } else {
                ActionKind::SetupOptional(dependency)
            }
        }
        _ => return Err(format!("unsupported statement '{name}'")),
    };

    match &kind {
        ActionKind::SetEnv { var, .. }
        | ActionKind::AppendEnv { var, .. }
        | ActionKind::PrependEnv { var, .. }
            if var.is_empty() =>
        {
            Err(format!("{name} needs a variable name"))
        }
        ActionKind::AddAlias { name: alias, .. } | ActionKind::RemoveAlias { name: alias }
            if alias.is_empty() =>
        {
            Err(format!("{name} needs an alias name"))
        }
        _ => Ok(kind),
    }
}

/// Parse the argument of a setup statement: a product name optionally
/// followed by a version or version expression.
fn parse_dependency(text: &str) -> std::result::Result<Dependency, String> {
    let mut words = text.split_whitespace();
    let product = words
        .next()
        .ok_or_else(|| "missing product name".to_string())?
        .to_string();
    if product.starts_with('-') {
        return Err(format!("unsupported option '{product}'"));
    }
    let rest = words.collect::<Vec<_>>().join(" ");
    let version = if rest.is_empty() {
        None
    } else {
        Some(rest.parse::<VersionSpec>().map_err(|err| err.to_string())?)
    };
    Ok(Dependency { product, version })
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_keyword(word: &str) -> bool {
    matches!(word, "if" | "else" | "elseif" | "endif")
}

fn comment(input: &str) -> ParseResult<'_, &str> {
    recognize(pair(char('#'), not_line_ending))(input)
}

/// Whitespace, newlines and comments.
fn ws(input: &str) -> ParseResult<'_, ()> {
    value((), many0(alt((multispace1, comment))))(input)
}

fn identifier(input: &str) -> ParseResult<'_, &str> {
    take_while1(is_ident_char)(input)
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> ParseResult<'a, &'a str> {
    move |input: &'a str| terminated(tag(word), not(satisfy(is_ident_char)))(input)
}

fn statements(input: &str) -> ParseResult<'_, Vec<RawNode<'_>>> {
    many0(preceded(ws, statement))(input)
}

fn statement(input: &str) -> ParseResult<'_, RawNode<'_>> {
    alt((if_block, call))(input)
}

fn call(input: &str) -> ParseResult<'_, RawNode<'_>> {
    let at = input;
    let (input, name) = verify(identifier, |name: &str| !is_keyword(name))(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = char('(')(input)?;
    let (input, args) = arguments(input)?;
    let (input, _) = char(')')(input)?;
    let (input, _) = opt(preceded(space0, char(';')))(input)?;
    Ok((input, RawNode::Call { name, args, at }))
}

/// Raw, comma separated arguments up to the closing parenthesis. Quotes
/// are removed, nested parentheses are kept.
fn arguments(input: &str) -> ParseResult<'_, Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut was_quoted = false;
    let mut quote: Option<char> = None;
    let mut depth = 0usize;

    for (idx, c) in input.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            } else {
                current.push(c);
            }
            continue;
        }
        match c {
            '"' | '\'' => {
                quote = Some(c);
                was_quoted = true;
            }
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' if depth == 0 => {
                if was_quoted || !args.is_empty() || !current.trim().is_empty() {
                    args.push(current.trim().to_string());
                }
                return Ok((&input[idx..], args));
            }
            ')' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                args.push(current.trim().to_string());
                current.clear();
                was_quoted = false;
            }
            _ => current.push(c),
        }
    }

    Err(nom::Err::Failure(VerboseError {
        errors: vec![(
            input,
            VerboseErrorKind::Context("unterminated argument list"),
        )],
    }))
}

fn quoted(input: &str) -> ParseResult<'_, &str> {
    alt((
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
    ))(input)
}

fn operand(input: &str) -> ParseResult<'_, String> {
    map(
        alt((
            quoted,
            take_while1(|c: char| !c.is_whitespace() && !"(){}|&,".contains(c)),
        )),
        String::from,
    )(input)
}

fn comparison(input: &str) -> ParseResult<'_, Condition> {
    let at = input;
    let (input, variable) = identifier(input)?;
    let (input, _) = ws(input)?;
    let (input, op) = alt((tag("=="), tag("!="), tag("=")))(input)?;
    let (input, _) = ws(input)?;
    let (input, value) = cut(context("expected a value to compare with", operand))(input)?;
    let negate = op == "!=";
    match variable.to_ascii_lowercase().as_str() {
        "flavor" => Ok((input, Condition::Flavor { value, negate })),
        "type" | "setuptype" | "buildtype" => Ok((input, Condition::BuildType { value, negate })),
        _ => Err(nom::Err::Failure(VerboseError {
            errors: vec![(
                at,
                VerboseErrorKind::Context("unknown condition variable (expected FLAVOR or TYPE)"),
            )],
        })),
    }
}

fn atom(input: &str) -> ParseResult<'_, Condition> {
    alt((
        delimited(
            pair(char('('), ws),
            condition,
            cut(context("expected ')' to close the condition", pair(ws, char(')')))),
        ),
        comparison,
    ))(input)
}

fn conjunction(input: &str) -> ParseResult<'_, Condition> {
    let (input, mut terms) = separated_list1(delimited(ws, tag("&&"), ws), atom)(input)?;
    let cond = if terms.len() == 1 {
        terms.remove(0)
    } else {
        Condition::All(terms)
    };
    Ok((input, cond))
}

fn condition(input: &str) -> ParseResult<'_, Condition> {
    let (input, mut alternatives) =
        separated_list1(delimited(ws, tag("||"), ws), conjunction)(input)?;
    let cond = if alternatives.len() == 1 {
        alternatives.remove(0)
    } else {
        Condition::Any(alternatives)
    };
    Ok((input, cond))
}

fn else_if(input: &str) -> ParseResult<'_, ()> {
    alt((
        value((), keyword("elseif")),
        value((), tuple((keyword("else"), space1, keyword("if")))),
    ))(input)
}

fn guard(input: &str) -> ParseResult<'_, Condition> {
    let (input, _) = ws(input)?;
    let (input, cond) = cut(context("expected a condition", condition))(input)?;
    let (input, _) = ws(input)?;
    Ok((input, cond))
}

fn braced_body(input: &str) -> ParseResult<'_, Vec<RawNode<'_>>> {
    let (input, _) = cut(context("expected '{' to open the block", char('{')))(input)?;
    let (input, body) = statements(input)?;
    let (input, _) = ws(input)?;
    let (input, _) = cut(context("expected '}' to close the block", char('}')))(input)?;
    Ok((input, body))
}

fn if_block(input: &str) -> ParseResult<'_, RawNode<'_>> {
    let (input, _) = keyword("if")(input)?;
    let (input, first) = guard(input)?;
    if input.starts_with('{') {
        braced_chain(input, first)
    } else {
        keyword_chain(input, first)
    }
}

/// `if (c) { ... } else if (c) { ... } else { ... }`
fn braced_chain(input: &str, first: Condition) -> ParseResult<'_, RawNode<'_>> {
    let (mut input, body) = braced_body(input)?;
    let mut branches = vec![(first, body)];
    let mut otherwise = None;
    loop {
        let (after, _) = ws(input)?;
        if let Ok((rest, _)) = else_if(after) {
            let (rest, cond) = guard(rest)?;
            let (rest, body) = braced_body(rest)?;
            branches.push((cond, body));
            input = rest;
        } else if let Ok((rest, _)) = keyword("else")(after) {
            let (rest, _) = ws(rest)?;
            let (rest, body) = braced_body(rest)?;
            otherwise = Some(body);
            input = rest;
            break;
        } else {
            break;
        }
    }
    Ok((
        input,
        RawNode::If {
            branches,
            otherwise,
        },
    ))
}

fn endif(input: &str) -> ParseResult<'_, &str> {
    cut(context("expected 'endif'", keyword("endif")))(input)
}

/// `if (c) ... elseif (c) ... else ... endif`
fn keyword_chain(input: &str, first: Condition) -> ParseResult<'_, RawNode<'_>> {
    let (mut input, body) = statements(input)?;
    let mut branches = vec![(first, body)];
    let mut otherwise = None;
    loop {
        let (after, _) = ws(input)?;
        if let Ok((rest, _)) = else_if(after) {
            let (rest, cond) = guard(rest)?;
            let (rest, body) = statements(rest)?;
            branches.push((cond, body));
            input = rest;
        } else if let Ok((rest, _)) = keyword("else")(after) {
            let (rest, body) = statements(rest)?;
            let (rest, _) = ws(rest)?;
            let (rest, _) = endif(rest)?;
            otherwise = Some(body);
            input = rest;
            break;
        } else {
            let (rest, _) = endif(after)?;
            input = rest;
            break;
        }
    }
    Ok((
        input,
        RawNode::If {
            branches,
            otherwise,
        },
    ))
}

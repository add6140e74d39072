//! Grammar-driven parser producing the syntax tree the unrestricted backend
//! interprets.
//!
//! The grammar lives in `expression.pest`. Precedence, lowest first:
//! assignment, conditional (`?:`), `||`/`??`, `&&`, equality, relational,
//! additive, multiplicative, unary, postfix member/call access. Assignment
//! forms are parsed only so that evaluation can refuse them with a precise
//! error.
//!
//! Bracket and ternary nesting is bounded before the grammar runs, and tree
//! depth is bounded while the tree is built, so oversized input is a syntax
//! error rather than a stack overflow in the grammar or the interpreter.

use super::value::{self, ArithOp, CompareOp, Operand};
use pest::error::{ErrorVariant, InputLocation, LineColLocation};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use serde_json::Value;

/// Deepest bracket plus ternary nesting handed to the grammar.
const MAX_NESTING: usize = 64;

/// Deepest syntax tree handed to the interpreter.
const MAX_DEPTH: usize = 256;

#[derive(Parser)]
#[grammar = "expression/expression.pest"]
struct ExpressionParser;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Property {
    Named(String),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Arith(ArithOp),
    Compare(CompareOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Operand),
    Identifier(String),
    Member {
        object: Box<Expr>,
        property: Property,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        optional: bool,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    /// Any assignment or update form. Never evaluated successfully.
    Assign {
        target: Box<Expr>,
    },
}

/// Parses `source` as one expression. A single trailing `;` is tolerated.
pub(crate) fn parse(source: &str) -> Result<Expr, String> {
    if source.trim().is_empty() {
        return Err("empty expression".to_string());
    }
    check_nesting(source)?;

    let mut pairs = ExpressionParser::parse(Rule::expression, source).map_err(|e| describe(&e, source))?;
    let expression = expect_pair(&mut pairs)?;
    let assignment = expect_pair(&mut expression.into_inner())?;
    build(assignment).map(|built| built.expr)
}

/// Parses `text` as exactly one literal (`'a'`, `"b"`, `42`, `-1.5`, `true`,
/// `false`, `null`, `undefined`). `Some(None)` is `undefined`.
pub(crate) fn parse_literal(text: &str) -> Option<Operand> {
    let mut pairs = ExpressionParser::parse(Rule::literal, text).ok()?;
    let pair = pairs.next()?.into_inner().next()?;
    match pair.as_rule() {
        Rule::negative => {
            let n = pair.into_inner().next()?.as_str().parse::<f64>().ok()?;
            Some(Some(value::number(-n)))
        }
        Rule::number => number(pair.as_str()).ok().map(Some),
        Rule::string => unquote(pair.as_str()).ok().map(|s| Some(Value::String(s))),
        Rule::keyword => keyword(pair.as_str()),
        _ => None,
    }
}

/// A subtree together with its height.
struct Built {
    expr: Expr,
    depth: usize,
}

impl Built {
    fn leaf(expr: Expr) -> Self {
        Self { expr, depth: 1 }
    }

    fn node(expr: Expr, child_depth: usize) -> Result<Self, String> {
        let depth = child_depth + 1;
        if depth > MAX_DEPTH {
            return Err(format!("expression nests deeper than {MAX_DEPTH} levels"));
        }
        Ok(Self { expr, depth })
    }
}

fn build(pair: Pair<'_, Rule>) -> Result<Built, String> {
    match pair.as_rule() {
        Rule::assignment => build_assignment(pair),
        Rule::conditional => build_conditional(pair),
        Rule::logical_or
        | Rule::logical_and
        | Rule::equality
        | Rule::relational
        | Rule::additive
        | Rule::multiplicative => build_chain(pair),
        Rule::unary => build_unary(pair),
        Rule::postfix => {
            let mut inner = pair.into_inner();
            let target = build(expect_pair(&mut inner)?)?;
            if inner.next().is_none() {
                return Ok(target);
            }
            Built::node(Expr::Assign { target: Box::new(target.expr) }, target.depth)
        }
        Rule::call_member => build_call_member(pair),
        Rule::number => Ok(Built::leaf(Expr::Literal(Some(number(pair.as_str())?)))),
        Rule::string => Ok(Built::leaf(Expr::Literal(Some(Value::String(unquote(pair.as_str())?))))),
        Rule::template => Err("template literals are not supported".to_string()),
        Rule::keyword => keyword(pair.as_str())
            .map(|literal| Built::leaf(Expr::Literal(literal)))
            .ok_or_else(|| format!("unknown keyword `{}`", pair.as_str())),
        Rule::identifier => Ok(Built::leaf(Expr::Identifier(pair.as_str().to_string()))),
        Rule::array => {
            let (items, depth) = build_list(pair)?;
            Built::node(Expr::Array(items), depth)
        }
        Rule::object => build_object(pair),
        other => Err(format!("unexpected {other:?}")),
    }
}

fn build_assignment(pair: Pair<'_, Rule>) -> Result<Built, String> {
    let mut inner = pair.into_inner();
    let target = build(expect_pair(&mut inner)?)?;
    if inner.peek().is_none() {
        return Ok(target);
    }
    // The right-hand side must still parse; the whole form is refused at evaluation.
    for value in inner.filter(|p| p.as_rule() == Rule::conditional) {
        build(value)?;
    }
    Built::node(Expr::Assign { target: Box::new(target.expr) }, target.depth)
}

fn build_conditional(pair: Pair<'_, Rule>) -> Result<Built, String> {
    let mut inner = pair.into_inner();
    let test = build(expect_pair(&mut inner)?)?;
    let Some(consequent) = inner.next() else {
        return Ok(test);
    };
    let consequent = build(consequent)?;
    let alternate = build(expect_pair(&mut inner)?)?;
    let depth = test.depth.max(consequent.depth).max(alternate.depth);
    Built::node(
        Expr::Conditional {
            test: Box::new(test.expr),
            consequent: Box::new(consequent.expr),
            alternate: Box::new(alternate.expr),
        },
        depth,
    )
}

/// Folds `operand (op operand)*` left to right.
fn build_chain(pair: Pair<'_, Rule>) -> Result<Built, String> {
    let mut inner = pair.into_inner();
    let mut left = build(expect_pair(&mut inner)?)?;

    while let Some(op_pair) = inner.next() {
        let right = build(expect_pair(&mut inner)?)?;
        let depth = left.depth.max(right.depth);
        let (lhs, rhs) = (Box::new(left.expr), Box::new(right.expr));
        let expr = match op_pair.as_str() {
            "||" => Expr::Logical { op: LogicalOp::Or, left: lhs, right: rhs },
            "??" => Expr::Logical { op: LogicalOp::Nullish, left: lhs, right: rhs },
            "&&" => Expr::Logical { op: LogicalOp::And, left: lhs, right: rhs },
            symbol => Expr::Binary { op: binary_op(symbol)?, left: lhs, right: rhs },
        };
        left = Built::node(expr, depth)?;
    }

    Ok(left)
}

fn binary_op(symbol: &str) -> Result<BinaryOp, String> {
    let op = match symbol {
        "+" => BinaryOp::Arith(ArithOp::Add),
        "-" => BinaryOp::Arith(ArithOp::Sub),
        "*" => BinaryOp::Arith(ArithOp::Mul),
        "/" => BinaryOp::Arith(ArithOp::Div),
        "%" => BinaryOp::Arith(ArithOp::Rem),
        other => BinaryOp::Compare(CompareOp::from_symbol(other).ok_or_else(|| format!("unknown operator `{other}`"))?),
    };
    Ok(op)
}

/// Prefix operators apply innermost first, so they are folded right to left.
fn build_unary(pair: Pair<'_, Rule>) -> Result<Built, String> {
    let mut prefixes: Vec<Pair<'_, Rule>> = pair.into_inner().collect();
    let operand = prefixes.pop().ok_or_else(incomplete)?;
    let mut built = build(operand)?;

    for prefix in prefixes.into_iter().rev() {
        let operand = Box::new(built.expr);
        let expr = match (prefix.as_rule(), prefix.as_str()) {
            (Rule::update_op, _) => Expr::Assign { target: operand },
            (_, "!") => Expr::Unary { op: UnaryOp::Not, operand },
            (_, "-") => Expr::Unary { op: UnaryOp::Neg, operand },
            (_, "+") => Expr::Unary { op: UnaryOp::Plus, operand },
            (_, "typeof") => Expr::Unary { op: UnaryOp::TypeOf, operand },
            (_, "void") => Expr::Unary { op: UnaryOp::Void, operand },
            (_, other) => return Err(format!("unknown prefix operator `{other}`")),
        };
        built = Built::node(expr, built.depth)?;
    }

    Ok(built)
}

fn build_call_member(pair: Pair<'_, Rule>) -> Result<Built, String> {
    let mut inner = pair.into_inner();
    let mut built = build(expect_pair(&mut inner)?)?;

    for accessor in inner {
        let mut parts = accessor.into_inner().peekable();
        let optional = parts.next_if(|p| p.as_rule() == Rule::optional_dot).is_some();
        let part = expect_pair(&mut parts)?;
        let object = Box::new(built.expr);

        let (expr, depth) = match part.as_rule() {
            Rule::property_name => {
                let property = Property::Named(part.as_str().to_string());
                (Expr::Member { object, property, optional }, built.depth)
            }
            Rule::index => {
                let index = build(expect_pair(&mut part.into_inner())?)?;
                let property = Property::Computed(Box::new(index.expr));
                (Expr::Member { object, property, optional }, built.depth.max(index.depth))
            }
            Rule::arguments => {
                let (args, args_depth) = build_list(part)?;
                (Expr::Call { callee: object, args, optional }, built.depth.max(args_depth))
            }
            other => return Err(format!("unexpected {other:?}")),
        };
        built = Built::node(expr, depth)?;
    }

    Ok(built)
}

fn build_list(pair: Pair<'_, Rule>) -> Result<(Vec<Expr>, usize), String> {
    let mut items = Vec::new();
    let mut depth = 0;
    for item in pair.into_inner() {
        let built = build(item)?;
        depth = depth.max(built.depth);
        items.push(built.expr);
    }
    Ok((items, depth))
}

fn build_object(pair: Pair<'_, Rule>) -> Result<Built, String> {
    let mut entries = Vec::new();
    let mut depth = 0;

    for entry in pair.into_inner() {
        let mut inner = entry.into_inner();
        let key_pair = expect_pair(&mut inner)?;
        let key = match key_pair.as_rule() {
            Rule::string => unquote(key_pair.as_str())?,
            Rule::number => value::to_js_string(&Some(number(key_pair.as_str())?)),
            _ => key_pair.as_str().to_string(),
        };
        // `{ a }` is shorthand for `{ a: a }`.
        let value = match inner.next() {
            Some(value) => build(value)?,
            None => Built::leaf(Expr::Identifier(key.clone())),
        };
        depth = depth.max(value.depth);
        entries.push((key, value.expr));
    }

    Built::node(Expr::Object(entries), depth)
}

fn number(text: &str) -> Result<Value, String> {
    text.parse::<f64>()
        .map(value::number)
        .map_err(|_| format!("invalid number `{text}`"))
}

fn keyword(word: &str) -> Option<Operand> {
    match word {
        "true" => Some(Some(Value::Bool(true))),
        "false" => Some(Some(Value::Bool(false))),
        "null" => Some(Some(Value::Null)),
        "undefined" => Some(None),
        _ => None,
    }
}

/// Strips the quotes of a string token and decodes its escapes.
fn unquote(token: &str) -> Result<String, String> {
    let body = token.get(1..token.len().saturating_sub(1)).unwrap_or_default();
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = Some(hex.as_str())
                    .filter(|h| h.len() == 4 && h.chars().all(|c| c.is_ascii_hexdigit()))
                    .and_then(|h| u32::from_str_radix(h, 16).ok())
                    .and_then(char::from_u32)
                    .ok_or_else(|| format!("invalid unicode escape `\\u{hex}`"))?;
                out.push(decoded);
            }
            Some(other) => out.push(other),
            None => return Err("unterminated string literal".to_string()),
        }
    }

    Ok(out)
}

/// Rejects input whose bracket depth plus ternary count exceeds
/// [`MAX_NESTING`]. String contents are skipped.
fn check_nesting(source: &str) -> Result<(), String> {
    let chars: Vec<char> = source.chars().collect();
    let mut quote = None;
    let mut depth = 0usize;
    let mut deepest = 0usize;
    let mut ternaries = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            if c == '\\' {
                i += 1;
            } else if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' | '[' | '{' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            '?' => match chars.get(i + 1) {
                Some('?') => i += 1,
                Some('.') if !chars.get(i + 2).is_some_and(char::is_ascii_digit) => {}
                _ => ternaries += 1,
            },
            _ => {}
        }
        i += 1;
    }

    if deepest + ternaries > MAX_NESTING {
        return Err(format!("expression nests deeper than {MAX_NESTING} levels"));
    }
    Ok(())
}

fn expect_pair<'i>(pairs: &mut impl Iterator<Item = Pair<'i, Rule>>) -> Result<Pair<'i, Rule>, String> {
    pairs.next().ok_or_else(incomplete)
}

fn incomplete() -> String {
    "incomplete expression".to_string()
}

fn describe(error: &pest::error::Error<Rule>, source: &str) -> String {
    let column = match error.line_col {
        LineColLocation::Pos((_, column)) | LineColLocation::Span((_, column), _) => column,
    };
    let at = match error.location {
        InputLocation::Pos(at) | InputLocation::Span((at, _)) => at,
    };
    let found = source
        .get(at..)
        .and_then(|rest| rest.chars().next())
        .map_or_else(|| "end of expression".to_string(), |c| format!("`{c}`"));

    match &error.variant {
        ErrorVariant::ParsingError { positives, .. } => {
            let mut expected: Vec<&str> = positives.iter().map(|rule| rule_name(*rule)).collect();
            expected.sort_unstable();
            expected.dedup();
            if expected.is_empty() {
                format!("unexpected {found} at column {column}")
            } else {
                format!("expected {}, found {found} at column {column}", expected.join(" or "))
            }
        }
        ErrorVariant::CustomError { message } => format!("{message} at column {column}"),
    }
}

fn rule_name(rule: Rule) -> &'static str {
    match rule {
        Rule::EOI => "end of expression",
        Rule::assign_op
        | Rule::or_op
        | Rule::and_op
        | Rule::equality_op
        | Rule::relational_op
        | Rule::additive_op
        | Rule::multiplicative_op
        | Rule::update_op => "operator",
        Rule::accessor | Rule::optional_dot | Rule::index | Rule::arguments => "member access or call",
        Rule::property_name => "property name",
        _ => "expression",
    }
}

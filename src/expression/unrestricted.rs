//! Compiling backend: parse into a syntax tree, interpret.
//!
//! Parsed trees are cached per source text, so a condition that is evaluated
//! on every render is only parsed once. The interpreter walks values as
//! `Cow<'_, Value>` borrowed from the scope and clones only what an
//! expression actually produces.

use super::parser::{self, BinaryOp, Expr, LogicalOp, Property, UnaryOp};
use super::scope::{Root, Scope};
use super::value::{self, Operand};
use super::{Evaluator, ExpressionError};
use serde_json::Value;
use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

const CACHE_CAPACITY: usize = 1024;

/// Evaluator that compiles expressions into a syntax tree.
///
/// Errors propagate to the caller: syntax errors, unknown bare identifiers,
/// property reads on `null`/`undefined` without optional chaining, and any
/// assignment ([`ExpressionError::ReadOnlyScope`]).
#[derive(Debug, Default)]
pub struct UnrestrictedEvaluator {
    cache: RefCell<HashMap<String, Rc<Expr>>>,
}

impl UnrestrictedEvaluator {
    fn compile(&self, source: &str) -> Result<Rc<Expr>, ExpressionError> {
        if let Some(expr) = self.cache.borrow().get(source) {
            return Ok(Rc::clone(expr));
        }

        let syntax = |message: String| ExpressionError::Syntax {
            expression: source.trim().to_string(),
            message,
        };
        let expr = Rc::new(parser::parse(source).map_err(syntax)?);

        let mut cache = self.cache.borrow_mut();
        if cache.len() >= CACHE_CAPACITY {
            tracing::debug!(entries = cache.len(), "expression cache full, clearing");
            cache.clear();
        }
        cache.insert(source.to_string(), Rc::clone(&expr));
        Ok(expr)
    }
}

impl Evaluator for UnrestrictedEvaluator {
    fn name(&self) -> &'static str {
        "unrestricted"
    }

    fn evaluate_source(&self, source: &str, scope: &Scope<'_>) -> Result<Operand, ExpressionError> {
        let expr = self.compile(source)?;
        let interpreter = Interpreter {
            scope,
            source: source.trim(),
        };
        interpreter.eval(&expr).map(|v| v.map(Cow::into_owned))
    }
}

type Val<'a> = Option<Cow<'a, Value>>;

/// Outcome of one link in a member/call chain. `ShortCircuit` means an
/// optional link hit `null`/`undefined` and the rest of the chain is skipped.
enum Flow<'a> {
    Value(Val<'a>),
    ShortCircuit,
}

struct Interpreter<'s, 'a> {
    scope: &'s Scope<'a>,
    source: &'s str,
}

impl<'a> Interpreter<'_, 'a> {
    fn eval(&self, expr: &Expr) -> Result<Val<'a>, ExpressionError> {
        match self.chain(expr)? {
            Flow::Value(v) => Ok(v),
            Flow::ShortCircuit => Ok(None),
        }
    }

    fn operand(&self, expr: &Expr) -> Result<Operand, ExpressionError> {
        Ok(self.eval(expr)?.map(Cow::into_owned))
    }

    fn type_error(&self, message: String) -> ExpressionError {
        ExpressionError::Type {
            expression: self.source.to_string(),
            message,
        }
    }

    fn chain(&self, expr: &Expr) -> Result<Flow<'a>, ExpressionError> {
        let value = match expr {
            Expr::Literal(v) => v.clone().map(Cow::Owned),
            Expr::Identifier(name) => self.identifier(name)?,
            Expr::Member { .. } => return self.member(expr),
            Expr::Call { callee, args, optional } => return self.call(callee, args, *optional),
            Expr::Unary { op, operand } => self.unary(*op, operand)?.map(Cow::Owned),
            Expr::Binary { op, left, right } => {
                let (l, r) = (self.operand(left)?, self.operand(right)?);
                match op {
                    BinaryOp::Arith(op) => value::arithmetic(*op, &l, &r).map(Cow::Owned),
                    BinaryOp::Compare(op) => Some(Cow::Owned(Value::Bool(value::compare(*op, &l, &r)))),
                }
            }
            Expr::Logical { op, left, right } => {
                let l = self.eval(left)?;
                let keep_left = match op {
                    LogicalOp::And => !value::truthy_ref(l.as_deref()),
                    LogicalOp::Or => value::truthy_ref(l.as_deref()),
                    LogicalOp::Nullish => l.as_deref().is_some_and(|v| !v.is_null()),
                };
                if keep_left {
                    l
                } else {
                    self.eval(right)?
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if value::truthy(&self.operand(test)?) {
                    self.eval(consequent)?
                } else {
                    self.eval(alternate)?
                }
            }
            Expr::Array(items) => {
                let items = items
                    .iter()
                    .map(|item| self.operand(item).map(value::into_json))
                    .collect::<Result<Vec<_>, _>>()?;
                Some(Cow::Owned(Value::Array(items)))
            }
            Expr::Object(entries) => {
                let entries = entries
                    .iter()
                    .map(|(key, item)| Ok((key.clone(), self.operand(item)?)))
                    .collect::<Result<Vec<_>, ExpressionError>>()?;
                Some(Cow::Owned(value::object_from(entries)))
            }
            Expr::Assign { target } => {
                tracing::debug!(assign_target = ?target, "assignment reached during evaluation");
                self.scope.assign(self.source)?;
                None
            }
        };
        Ok(Flow::Value(value))
    }

    fn identifier(&self, name: &str) -> Result<Val<'a>, ExpressionError> {
        if let Some(root) = Root::from_ident(name) {
            return Ok(Some(self.scope.root_value(root, None)));
        }
        if self.scope.has_local(name) {
            let local = self.scope.root_value(Root::Local, None);
            return Ok(value::step(local, name));
        }
        Err(ExpressionError::Reference {
            name: name.to_string(),
            expression: self.source.to_string(),
        })
    }

    fn property_key(&self, property: &Property) -> Result<String, ExpressionError> {
        match property {
            Property::Named(name) => Ok(name.clone()),
            Property::Computed(index) => Ok(value::to_js_string(&self.operand(index)?)),
        }
    }

    /// Resolves the receiver of a member access or method call, or reports
    /// why there is none.
    fn receiver(&self, object: &Expr, key: &str, optional: bool) -> Result<Option<Cow<'a, Value>>, ExpressionError> {
        let target = match self.chain(object)? {
            Flow::ShortCircuit => return Ok(None),
            Flow::Value(v) => v,
        };
        match target {
            Some(v) if !v.is_null() => Ok(Some(v)),
            _ if optional => Ok(None),
            missing => {
                let kind = if missing.is_some() { "null" } else { "undefined" };
                Err(self.type_error(format!("Cannot read properties of {kind} (reading '{key}')")))
            }
        }
    }

    fn member(&self, expr: &Expr) -> Result<Flow<'a>, ExpressionError> {
        if let Some((root, path)) = static_path(expr) {
            let segments: Vec<&str> = path.iter().map(String::as_str).collect();
            if let Some(found) = self.scope.lookup(root, &segments) {
                return Ok(Flow::Value(Some(Cow::Owned(found))));
            }
        }

        let Expr::Member {
            object,
            property,
            optional,
        } = expr
        else {
            return self.chain(expr);
        };
        let key = self.property_key(property)?;

        if let Expr::Identifier(name) = object.as_ref() {
            if let Some(root) = Root::from_ident(name) {
                let tier = self.scope.root_value(root, Some(&key));
                return Ok(Flow::Value(value::step(tier, &key)));
            }
        }

        match self.receiver(object, &key, *optional)? {
            Some(target) => Ok(Flow::Value(value::step(target, &key))),
            None => Ok(Flow::ShortCircuit),
        }
    }

    fn call(&self, callee: &Expr, args: &[Expr], optional: bool) -> Result<Flow<'a>, ExpressionError> {
        let args = args.iter().map(|arg| self.operand(arg)).collect::<Result<Vec<_>, _>>()?;

        if let Some((Root::Extra, path)) = static_path(callee) {
            let segments: Vec<&str> = path.iter().map(String::as_str).collect();
            if let Some(result) = self.scope.call(&segments, &args) {
                return result
                    .map(|v| Flow::Value(v.map(Cow::Owned)))
                    .map_err(|message| ExpressionError::Host {
                        name: path.join("."),
                        message,
                    });
            }
        }

        let Expr::Member {
            object,
            property,
            optional: member_optional,
        } = callee
        else {
            return match self.chain(callee)? {
                Flow::ShortCircuit => Ok(Flow::ShortCircuit),
                Flow::Value(v) if optional && v.as_deref().map_or(true, Value::is_null) => Ok(Flow::ShortCircuit),
                Flow::Value(_) => Err(self.type_error(format!("{} is not a function", describe_callee(callee)))),
            };
        };

        let name = self.property_key(property)?;
        let Some(receiver) = self.receiver(object, &name, *member_optional)? else {
            return Ok(Flow::ShortCircuit);
        };
        match value::call_method(&receiver, &name, &args) {
            Some(Ok(v)) => Ok(Flow::Value(v.map(Cow::Owned))),
            Some(Err(message)) => Err(self.type_error(message)),
            None if optional && value::get_property(&receiver, &name).is_none() => Ok(Flow::ShortCircuit),
            None => Err(self.type_error(format!("{} is not a function", describe_callee(callee)))),
        }
    }

    fn unary(&self, op: UnaryOp, operand: &Expr) -> Result<Operand, ExpressionError> {
        if op == UnaryOp::TypeOf {
            if let Expr::Identifier(name) = operand {
                if Root::from_ident(name).is_none() && !self.scope.has_local(name) {
                    return Ok(Some(Value::String("undefined".to_string())));
                }
            }
        }
        let v = self.operand(operand)?;
        Ok(match op {
            UnaryOp::Not => Some(Value::Bool(!value::truthy(&v))),
            UnaryOp::Neg => Some(value::number(-value::to_number(&v))),
            UnaryOp::Plus => Some(value::number(value::to_number(&v))),
            UnaryOp::TypeOf => Some(Value::String(value::type_of(&v).to_string())),
            UnaryOp::Void => None,
        })
    }
}

/// The tier and dotted path of a member chain made only of names and
/// literal indices, rooted at `$`, `$$` or `$$$`.
fn static_path(expr: &Expr) -> Option<(Root, Vec<String>)> {
    match expr {
        Expr::Identifier(name) => Root::from_ident(name).map(|root| (root, Vec::new())),
        Expr::Member { object, property, .. } => {
            let (root, mut path) = static_path(object)?;
            match property {
                Property::Named(name) => path.push(name.clone()),
                Property::Computed(index) => match index.as_ref() {
                    Expr::Literal(Some(key @ (Value::String(_) | Value::Number(_)))) => {
                        path.push(value::to_js_string(&Some(key.clone())));
                    }
                    _ => return None,
                },
            }
            Some((root, path))
        }
        _ => None,
    }
}

fn describe_callee(callee: &Expr) -> String {
    match static_path(callee) {
        Some((root, path)) => {
            let prefix = match root {
                Root::Local => "$",
                Root::Global => "$$",
                Root::Extra => "$$$",
            };
            std::iter::once(prefix.to_string()).chain(path).collect::<Vec<_>>().join(".")
        }
        None => match callee {
            Expr::Identifier(name) => name.clone(),
            Expr::Member {
                property: Property::Named(name),
                ..
            } => format!("(…).{name}"),
            _ => "expression".to_string(),
        },
    }
}

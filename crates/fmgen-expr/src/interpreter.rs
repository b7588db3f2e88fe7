//! Tree-walking interpreter
//!
//! Every evaluated node costs one step of fuel. Function calls nest up to
//! `max_call_depth`, and strings and lists are checked against their size
//! limits whenever they grow. Member access, indexing and calls form
//! optional chains: `a?.b.c` stops at `a` when it is nullish.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

use chrono::{DateTime, FixedOffset};

use crate::ast::{BinaryOp, Element, Expr, ExprKind, Literal, LogicalOp, Property, PropertyKey, TemplatePart, UnaryOp};
use crate::builtins;
use crate::context::EvaluationContext;
use crate::error::{EvalResult, LimitError, RuntimeError};
use crate::limits::SandboxLimits;
use crate::value::{Closure, Num, RtMap, RtValue, Scope};

pub(crate) struct Interpreter {
    bindings: HashMap<String, RtValue>,
    limits: SandboxLimits,
    steps: u64,
    depth: usize,
    clock: DateTime<FixedOffset>,
}

impl Interpreter {
    pub(crate) fn new(ctx: &EvaluationContext, limits: SandboxLimits) -> Self {
        let mut bindings: HashMap<String, RtValue> = ctx
            .bindings()
            .map(|(name, value)| (name.to_string(), RtValue::from_value(value)))
            .collect();
        match ctx.query() {
            Some(api) => {
                bindings.insert("dv".into(), RtValue::Host(api.clone()));
            }
            None => {
                bindings.entry("dv".into()).or_insert(RtValue::Undefined);
            }
        }
        Self {
            bindings,
            limits,
            steps: 0,
            depth: 0,
            clock: ctx.clock(),
        }
    }

    pub(crate) fn run(&mut self, expr: &Expr) -> EvalResult<RtValue> {
        self.eval(expr, None)
    }

    pub(crate) fn steps(&self) -> u64 {
        self.steps
    }

    pub(crate) fn clock(&self) -> DateTime<FixedOffset> {
        self.clock
    }

    fn tick(&mut self) -> EvalResult<()> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(LimitError::Steps(self.limits.max_steps).into());
        }
        Ok(())
    }

    pub(crate) fn check_str_len(&self, len: usize) -> EvalResult<()> {
        if len > self.limits.max_string_len {
            return Err(LimitError::StringLength(self.limits.max_string_len).into());
        }
        Ok(())
    }

    fn check_list_len(&self, len: usize) -> EvalResult<()> {
        if len > self.limits.max_list_len {
            return Err(LimitError::ListLength(self.limits.max_list_len).into());
        }
        Ok(())
    }

    /// Deeply nested values would make sanitizing and dropping them
    /// recurse without bound.
    pub(crate) fn check_depth(&self, value: RtValue) -> EvalResult<RtValue> {
        if value.depth() > self.limits.max_value_depth {
            return Err(LimitError::ValueDepth(self.limits.max_value_depth).into());
        }
        Ok(value)
    }

    /// `String(value)`, refused before building text over the limit.
    pub(crate) fn text_of(&self, value: &RtValue) -> EvalResult<String> {
        self.check_str_len(value.text_len())?;
        Ok(value.to_js_string())
    }

    pub(crate) fn new_str(&self, text: String) -> EvalResult<RtValue> {
        self.check_str_len(text.len())?;
        Ok(RtValue::str(text))
    }

    pub(crate) fn new_list(&self, items: Vec<RtValue>) -> EvalResult<RtValue> {
        self.check_list_len(items.len())?;
        self.check_depth(RtValue::list(items))
    }

    pub(crate) fn new_map(&self, map: RtMap) -> EvalResult<RtValue> {
        self.check_list_len(map.len())?;
        self.check_depth(RtValue::map(map))
    }

    fn eval(&mut self, expr: &Expr, scope: Option<&Rc<Scope>>) -> EvalResult<RtValue> {
        self.tick()?;
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(literal(lit)),
            ExprKind::Template(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => out.push_str(text),
                        TemplatePart::Expr(inner) => {
                            let value = self.eval(inner, scope)?;
                            self.check_str_len(out.len().saturating_add(value.text_len()))?;
                            out.push_str(&value.to_js_string());
                        }
                    }
                    self.check_str_len(out.len())?;
                }
                Ok(RtValue::str(out))
            }
            ExprKind::Ident(name) => self.lookup(name, scope),
            ExprKind::Array(elements) => {
                let items = self.eval_elements(elements, scope)?;
                self.new_list(items)
            }
            ExprKind::Object(props) => self.eval_object(props, scope),
            ExprKind::Paren(inner) => self.eval(inner, scope),
            ExprKind::Member { .. } | ExprKind::Index { .. } | ExprKind::Call { .. } => {
                Ok(self.eval_chain(expr, scope)?.unwrap_or(RtValue::Undefined))
            }
            ExprKind::New { callee, args } => {
                let ctor = self.eval(callee, scope)?;
                let args = self.eval_elements(args, scope)?;
                match ctor {
                    RtValue::Namespace("Date") => Ok(builtins::construct_date(self, &args)),
                    _ => Err(RuntimeError::type_error(format!("{} is not a constructor", label(callee))).into()),
                }
            }
            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand, scope),
            ExprKind::Binary { op, left, right } => {
                let l = self.eval(left, scope)?;
                let r = self.eval(right, scope)?;
                self.binary(*op, l, r)
            }
            ExprKind::Logical { op, left, right } => {
                let l = self.eval(left, scope)?;
                let short_circuit = match op {
                    LogicalOp::And => !l.is_truthy(),
                    LogicalOp::Or => l.is_truthy(),
                    LogicalOp::Nullish => !l.is_nullish(),
                };
                if short_circuit {
                    Ok(l)
                } else {
                    self.eval(right, scope)
                }
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.is_truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            ExprKind::Arrow { params, body } => self.check_depth(RtValue::Closure(Rc::new(Closure {
                params: params.clone(),
                body: body.clone(),
                scope: scope.cloned(),
            }))),
        }
    }

    fn lookup(&self, name: &str, scope: Option<&Rc<Scope>>) -> EvalResult<RtValue> {
        if let Some(value) = scope.and_then(|s| s.lookup(name)) {
            return Ok(value.clone());
        }
        if let Some(value) = self.bindings.get(name) {
            return Ok(value.clone());
        }
        builtins::global(name).ok_or_else(|| RuntimeError::reference_error(name).into())
    }

    /// `None` means an optional link short-circuited the chain.
    fn eval_chain(&mut self, expr: &Expr, scope: Option<&Rc<Scope>>) -> EvalResult<Option<RtValue>> {
        match &expr.kind {
            ExprKind::Member {
                object,
                property,
                optional,
            } => {
                let Some(target) = self.eval_link(object, scope)? else {
                    return Ok(None);
                };
                if *optional && target.is_nullish() {
                    return Ok(None);
                }
                builtins::get_property(&target, property).map(Some)
            }
            ExprKind::Index {
                object,
                index,
                optional,
            } => {
                let Some(target) = self.eval_link(object, scope)? else {
                    return Ok(None);
                };
                if *optional && target.is_nullish() {
                    return Ok(None);
                }
                let key = self.eval(index, scope)?;
                builtins::get_property(&target, &builtins::property_key(self, &key)?).map(Some)
            }
            ExprKind::Call {
                callee,
                args,
                optional,
            } => {
                let Some(function) = self.eval_link(callee, scope)? else {
                    return Ok(None);
                };
                if *optional && function.is_nullish() {
                    return Ok(None);
                }
                if !function.is_callable() {
                    return Err(RuntimeError::type_error(format!("{} is not a function", label(callee))).into());
                }
                let args = self.eval_elements(args, scope)?;
                self.call(&function, args).map(Some)
            }
            _ => self.eval(expr, scope).map(Some),
        }
    }

    fn eval_link(&mut self, expr: &Expr, scope: Option<&Rc<Scope>>) -> EvalResult<Option<RtValue>> {
        if expr.kind.is_chain_link() {
            self.tick()?;
            self.eval_chain(expr, scope)
        } else {
            self.eval(expr, scope).map(Some)
        }
    }

    pub(crate) fn call(&mut self, function: &RtValue, args: Vec<RtValue>) -> EvalResult<RtValue> {
        match function {
            RtValue::Closure(closure) => self.call_closure(closure, args),
            RtValue::Native(name) => builtins::call_native(self, name, args),
            RtValue::Method(method) => builtins::call_method(self, &method.receiver, &method.name, args),
            RtValue::Namespace("Date") => Ok(RtValue::str(
                RtValue::DateTime(self.clock).date_text().unwrap_or_default(),
            )),
            other => Err(RuntimeError::type_error(format!("{} is not a function", other.describe())).into()),
        }
    }

    fn call_closure(&mut self, closure: &Closure, args: Vec<RtValue>) -> EvalResult<RtValue> {
        if self.depth >= self.limits.max_call_depth {
            return Err(LimitError::CallDepth(self.limits.max_call_depth).into());
        }
        let mut args = args.into_iter();
        let vars = closure
            .params
            .iter()
            .map(|param| (param.clone(), args.next().unwrap_or(RtValue::Undefined)))
            .collect();
        let scope = Rc::new(Scope::new(vars, closure.scope.clone()));
        self.depth += 1;
        let result = self.eval(&closure.body, Some(&scope));
        self.depth -= 1;
        result
    }

    fn eval_elements(&mut self, elements: &[Element], scope: Option<&Rc<Scope>>) -> EvalResult<Vec<RtValue>> {
        let mut out = Vec::with_capacity(elements.len());
        for element in elements {
            match element {
                Element::Item(expr) => out.push(self.eval(expr, scope)?),
                Element::Spread(expr) => {
                    let value = self.eval(expr, scope)?;
                    match builtins::iterate(&value) {
                        Some(items) => out.extend(items),
                        None => {
                            return Err(RuntimeError::type_error(format!("{} is not iterable", label(expr))).into())
                        }
                    }
                }
            }
            self.check_list_len(out.len())?;
        }
        Ok(out)
    }

    fn eval_object(&mut self, props: &[Property], scope: Option<&Rc<Scope>>) -> EvalResult<RtValue> {
        let mut map = RtMap::new();
        for prop in props {
            match prop {
                Property::KeyValue(key, value) => {
                    let key = match key {
                        PropertyKey::Static(name) => name.clone(),
                        PropertyKey::Computed(expr) => {
                            let key = self.eval(expr, scope)?;
                            builtins::property_key(self, &key)?
                        }
                    };
                    let value = self.eval(value, scope)?;
                    map.insert(key, value);
                }
                Property::Shorthand(name, _) => {
                    let value = self.lookup(name, scope)?;
                    map.insert(name.clone(), value);
                }
                Property::Spread(expr) => {
                    let value = self.eval(expr, scope)?;
                    map.extend(builtins::entries(&value));
                }
            }
            self.check_list_len(map.len())?;
        }
        self.new_map(map)
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr, scope: Option<&Rc<Scope>>) -> EvalResult<RtValue> {
        // typeof tolerates undeclared identifiers
        if let (UnaryOp::Typeof, ExprKind::Ident(name)) = (op, &operand.kind) {
            let value = self.lookup(name, scope).unwrap_or(RtValue::Undefined);
            return Ok(RtValue::str(value.type_of()));
        }
        let value = self.eval(operand, scope)?;
        Ok(match op {
            UnaryOp::Not => RtValue::Bool(!value.is_truthy()),
            UnaryOp::Plus => value.to_number().into_value(),
            UnaryOp::Neg => match value.to_number() {
                Num::Int(i) => i.checked_neg().map_or(RtValue::Float(-(i as f64)), RtValue::Int),
                Num::Float(f) => RtValue::Float(-f),
            },
            UnaryOp::Typeof => RtValue::str(value.type_of()),
        })
    }

    fn binary(&mut self, op: BinaryOp, l: RtValue, r: RtValue) -> EvalResult<RtValue> {
        let value = match op {
            BinaryOp::Add if concatenates(&l) || concatenates(&r) => {
                self.check_str_len(l.text_len().saturating_add(r.text_len()))?;
                let mut text = l.to_js_string();
                text.push_str(&r.to_js_string());
                return self.new_str(text);
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                arith(op, l.to_number(), r.to_number()).into_value()
            }
            BinaryOp::Pow => builtins::arith_pow(l.to_number(), r.to_number()).into_value(),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => RtValue::Bool(compare(op, &l, &r)),
            BinaryOp::In => RtValue::Bool(builtins::has_property(&r, &builtins::property_key(self, &l)?)?),
            BinaryOp::LooseEq => RtValue::Bool(l.loose_eq(&r)),
            BinaryOp::LooseNe => RtValue::Bool(!l.loose_eq(&r)),
            BinaryOp::StrictEq => RtValue::Bool(l.strict_eq(&r)),
            BinaryOp::StrictNe => RtValue::Bool(!l.strict_eq(&r)),
        };
        Ok(value)
    }
}

fn literal(lit: &Literal) -> RtValue {
    match lit {
        Literal::Undefined => RtValue::Undefined,
        Literal::Null => RtValue::Null,
        Literal::Bool(b) => RtValue::Bool(*b),
        Literal::Int(i) => RtValue::Int(*i),
        Literal::Float(f) => RtValue::Float(*f),
        Literal::Str(s) => RtValue::str(s),
    }
}

/// `+` joins as text unless both sides are primitives other than strings.
fn concatenates(value: &RtValue) -> bool {
    !matches!(
        value,
        RtValue::Undefined | RtValue::Null | RtValue::Bool(_) | RtValue::Int(_) | RtValue::Float(_)
    )
}

/// Integer arithmetic while exact, floating point otherwise.
fn arith(op: BinaryOp, a: Num, b: Num) -> Num {
    if let (Num::Int(x), Num::Int(y)) = (a, b) {
        let exact = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Sub => x.checked_sub(y),
            BinaryOp::Mul => x.checked_mul(y),
            BinaryOp::Div => x
                .checked_rem(y)
                .filter(|rem| *rem == 0)
                .and_then(|_| x.checked_div(y)),
            BinaryOp::Rem => x.checked_rem(y),
            _ => None,
        };
        if let Some(n) = exact {
            return Num::Int(n);
        }
    }
    let (x, y) = (a.to_f64(), b.to_f64());
    Num::Float(match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        BinaryOp::Rem => x % y,
        _ => f64::NAN,
    })
}

fn compare(op: BinaryOp, l: &RtValue, r: &RtValue) -> bool {
    let ordering = match (l, r) {
        (RtValue::Str(a), RtValue::Str(b)) => Some(a.cmp(b)),
        (RtValue::Int(a), RtValue::Int(b)) => Some(a.cmp(b)),
        _ => l.to_number().to_f64().partial_cmp(&r.to_number().to_f64()),
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Le => ordering != Ordering::Greater,
        BinaryOp::Gt => ordering == Ordering::Greater,
        BinaryOp::Ge => ordering != Ordering::Less,
        _ => false,
    }
}

/// Source-like name of an expression for error messages.
fn label(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Ident(name) => name.clone(),
        ExprKind::Member { object, property, .. } => format!("{}.{property}", label(object)),
        ExprKind::Index { object, .. } => format!("{}[...]", label(object)),
        ExprKind::Call { callee, .. } => format!("{}(...)", label(callee)),
        ExprKind::Paren(inner) => label(inner),
        _ => "expression".into(),
    }
}

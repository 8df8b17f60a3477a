//! Tree-walking evaluator.
//!
//! Name resolution inside a function body, first match wins:
//!
//! 1. parameters of the function and of enclosing functions;
//! 2. `root`, the root of the defining node's tree;
//! 3. sibling fields of the defining node;
//! 4. bindings in the evaluation [`Context`];
//! 5. builtins, in call position only.
//!
//! The defining node is the node whose entries hold the computed field, or,
//! for a closure, the node whose field created it.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use super::ast::{Arg, BinaryOp, Expr, Fragment, Lambda, ParamKind, Segment, Statement};
use super::{builtins, ops};
use crate::context::{Context, WeakContext};
use crate::diagnostics::DiagnosticSink;
use crate::error::{Error, Result};
use crate::tree::{Node, WeakNode, ROOT};
use crate::value::{Arguments, Mapping, Value};

/// Nesting limit for function invocations.
pub const MAX_CALL_DEPTH: usize = 128;

thread_local! {
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

struct DepthGuard;

impl DepthGuard {
    fn enter(label: &str) -> Result<Self> {
        CALL_DEPTH.with(|depth| {
            if depth.get() >= MAX_CALL_DEPTH {
                return Err(Error::Evaluation {
                    message: format!(
                        "maximum call depth of {MAX_CALL_DEPTH} exceeded in `{label}`"
                    ),
                });
            }
            depth.set(depth.get() + 1);
            Ok(Self)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// A chain of parameter frames captured by closures.
#[derive(Clone, Default)]
pub(crate) struct Env(Option<Rc<Frame>>);

struct Frame {
    vars: RefCell<Vec<(String, Value)>>,
    parent: Env,
}

impl Env {
    fn child(&self) -> Self {
        Self(Some(Rc::new(Frame {
            vars: RefCell::default(),
            parent: self.clone(),
        })))
    }

    fn define(&self, name: &str, value: Value) {
        if let Some(frame) = &self.0 {
            frame.vars.borrow_mut().push((name.to_string(), value));
        }
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        let mut env = self;
        while let Some(frame) = &env.0 {
            let found = frame
                .vars
                .borrow()
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone());
            if found.is_some() {
                return found;
            }
            env = &frame.parent;
        }
        None
    }

    // Updates the innermost frame binding `name`; false if none does.
    fn assign(&self, name: &str, value: &Value) -> bool {
        let mut env = self;
        while let Some(frame) = &env.0 {
            if let Some(slot) = frame.vars.borrow_mut().iter_mut().find(|(n, _)| n == name) {
                slot.1 = value.clone();
                return true;
            }
            env = &frame.parent;
        }
        false
    }
}

/// A computed field or helper: a lambda plus what it captured when created.
pub struct Function {
    lambda: Rc<Lambda>,
    captured: Env,
    context: WeakContext,
    owner: WeakNode,
}

impl Function {
    pub(crate) fn new(
        lambda: Rc<Lambda>,
        captured: Env,
        context: WeakContext,
        owner: WeakNode,
    ) -> Self {
        Self {
            lambda,
            captured,
            context,
            owner,
        }
    }

    /// Parameter names in declaration order.
    #[must_use]
    pub fn parameter_names(&self) -> Vec<&str> {
        self.lambda.params.iter().map(|p| p.name.as_str()).collect()
    }

    /// True if the function declares any parameters.
    #[must_use]
    pub fn takes_arguments(&self) -> bool {
        !self.lambda.params.is_empty()
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("fn(")?;
        for (i, param) in self.lambda.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&param.name)?;
            match (param.kind, param.is_required()) {
                (ParamKind::Positional, true) => {}
                (ParamKind::Positional, false) => f.write_str(" = ..")?,
                (ParamKind::Named, true) => f.write_str(":")?,
                (ParamKind::Named, false) => f.write_str(": ..")?,
            }
        }
        f.write_str(")")
    }
}

/// Everything an expression can see while it is evaluated.
#[derive(Clone)]
pub(crate) struct Scope {
    env: Env,
    owner: Option<Node>,
    context: Option<Context>,
    sink: Rc<dyn DiagnosticSink>,
}

impl Scope {
    /// Scope for the top level of a fragment file.
    pub(crate) fn top_level(context: &Context, sink: Rc<dyn DiagnosticSink>) -> Self {
        Self {
            env: Env::default(),
            owner: None,
            context: Some(context.clone()),
            sink,
        }
    }

    /// Scope for an expression evaluated against `node`.
    pub(crate) fn for_node(node: &Node, sink: Rc<dyn DiagnosticSink>) -> Self {
        Self {
            env: Env::default(),
            owner: Some(node.clone()),
            context: node.context().cloned(),
            sink,
        }
    }

    fn unresolved(&self, name: &str) -> Error {
        match &self.owner {
            Some(owner) => Error::NoKey {
                name: format!("{}{name}", owner.qualified_name()),
            },
            None => Error::UndefinedVariable {
                name: name.to_string(),
            },
        }
    }

    fn resolve(&self, name: &str) -> Result<Value> {
        if let Some(value) = self.env.lookup(name) {
            return Ok(value);
        }
        if let Some(owner) = &self.owner {
            if name == ROOT {
                return Ok(Value::Node(owner.root()));
            }
            if owner.contains(name) {
                return owner.get(name);
            }
        }
        if let Some(value) = self.context.as_ref().and_then(|c| c.get(name)) {
            return Ok(value);
        }
        Err(self.unresolved(name))
    }

    fn call_name(&self, name: &str, args: &Arguments) -> Result<Value> {
        if let Some(value) = self.env.lookup(name) {
            return self.call_value(value, name, args);
        }
        if let Some(owner) = &self.owner {
            if name == ROOT {
                return self.call_value(Value::Node(owner.root()), name, args);
            }
            if owner.contains(name) {
                return owner.call(name, args);
            }
        }
        if let Some(value) = self.context.as_ref().and_then(|c| c.get(name)) {
            return self.call_value(value, name, args);
        }
        builtins::call(name, args).unwrap_or_else(|| Err(self.unresolved(name)))
    }

    fn call_value(&self, value: Value, label: &str, args: &Arguments) -> Result<Value> {
        match value {
            Value::Function(function) => invoke(&function, None, label, args, &self.sink),
            other => {
                if !args.is_empty() {
                    self.sink
                        .warn(&format!("`{label}` is not a function and ignores arguments"));
                }
                Ok(other)
            }
        }
    }

    fn assign(&self, name: &str, value: &Value) -> Result<()> {
        if self.env.assign(name, value) {
            return Ok(());
        }
        if let Some(owner) = self.owner.as_ref().filter(|o| o.contains(name)) {
            return Err(Error::Evaluation {
                message: format!(
                    "cannot assign to field `{}{name}`; tree nodes are read-only",
                    owner.qualified_name()
                ),
            });
        }
        let context = self.context.as_ref().ok_or_else(|| Error::Evaluation {
            message: format!("cannot assign `{name}` without an evaluation context"),
        })?;
        context.set(name, value.clone());
        Ok(())
    }

    fn closure(&self, lambda: &Rc<Lambda>) -> Function {
        Function::new(
            Rc::clone(lambda),
            self.env.clone(),
            self.context.as_ref().map(Context::downgrade).unwrap_or_default(),
            self.owner.as_ref().map(Node::downgrade).unwrap_or_default(),
        )
    }
}

/// Runs a parsed fragment: statements in order, then the optional result.
pub(crate) fn run(fragment: &Fragment, scope: &Scope) -> Result<Value> {
    for statement in &fragment.statements {
        match statement {
            Statement::Let(name, expr) => {
                let value = eval(expr, scope)?;
                if let Some(context) = &scope.context {
                    context.set(name, value);
                }
            }
            Statement::Expr(expr) => {
                eval(expr, scope)?;
            }
        }
    }
    fragment
        .result
        .as_ref()
        .map_or(Ok(Value::Null), |expr| eval(expr, scope))
}

/// Invokes `function` with `args`.
///
/// `owner` is the node the function was reached through; when absent, the
/// node captured at creation (if still alive) is used. `label` names the
/// function in warnings and errors.
pub(crate) fn invoke(
    function: &Rc<Function>,
    owner: Option<&Node>,
    label: &str,
    args: &Arguments,
    sink: &Rc<dyn DiagnosticSink>,
) -> Result<Value> {
    let _depth = DepthGuard::enter(label)?;
    let lambda = &function.lambda;

    if lambda.params.is_empty() && !args.is_empty() {
        sink.warn(&format!("`{label}` takes no parameters; ignoring arguments"));
    }
    if lambda.params.iter().any(|p| p.name == ROOT) {
        sink.warn(&format!("parameter `root` of `{label}` shadows the root accessor"));
    }

    let scope = Scope {
        env: function.captured.child(),
        owner: owner.cloned().or_else(|| function.owner.upgrade()),
        context: function.context.upgrade(),
        sink: Rc::clone(sink),
    };
    if !lambda.params.is_empty() {
        bind(lambda, &scope, label, args)?;
    }
    eval(&lambda.body, &scope)
}

fn bind(lambda: &Lambda, scope: &Scope, label: &str, args: &Arguments) -> Result<()> {
    let error = |message: String| Error::Argument {
        function: label.to_string(),
        message,
    };

    let declared = lambda.positional().count();
    let required = lambda.positional().filter(|p| p.is_required()).count();
    let given = args.positional().len();
    if given < required {
        return Err(error(format!(
            "expected at least {required} positional arguments, got {given}"
        )));
    }
    if given > declared {
        return Err(error(format!(
            "expected at most {declared} positional arguments, got {given}"
        )));
    }

    let mut seen = HashSet::new();
    for (name, _) in args.named_args() {
        if !lambda.named().any(|p| &p.name == name) {
            return Err(error(format!("unknown named argument `{name}`")));
        }
        if !seen.insert(name.as_str()) {
            return Err(error(format!("named argument `{name}` given more than once")));
        }
    }

    // Defaults see the parameters bound before them.
    let mut positional = args.positional().iter();
    for param in &lambda.params {
        let supplied = match param.kind {
            ParamKind::Positional => positional.next().cloned(),
            ParamKind::Named => args
                .named_args()
                .iter()
                .find(|(name, _)| name == &param.name)
                .map(|(_, value)| value.clone()),
        };
        let value = match (supplied, &param.default) {
            (Some(value), _) => value,
            (None, Some(default)) => eval(default, scope)?,
            (None, None) => return Err(error(format!("missing named argument `{}`", param.name))),
        };
        scope.env.define(&param.name, value);
    }
    Ok(())
}

pub(crate) fn eval(expr: &Expr, scope: &Scope) -> Result<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Interpolated(segments) => {
            let mut out = String::new();
            for segment in segments {
                match segment {
                    Segment::Text(text) => out.push_str(text),
                    Segment::Expr(expr) => out.push_str(&eval(expr, scope)?.to_string()),
                }
            }
            Ok(Value::Str(out))
        }
        Expr::List(items) => items
            .iter()
            .map(|item| eval(item, scope))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        Expr::Map(entries) => {
            let mut map = Mapping::new();
            for (key, expr) in entries {
                map.insert(key.clone(), eval(expr, scope)?);
            }
            Ok(Value::Mapping(map))
        }
        Expr::Ident(name) => scope.resolve(name),
        Expr::SelfRef => scope.owner.clone().map(Value::Node).ok_or_else(|| Error::Evaluation {
            message: "`self` is only available inside computed fields".to_string(),
        }),
        Expr::Member(target, name) => member(&eval(target, scope)?, name),
        Expr::Index(target, index) => ops::index(&eval(target, scope)?, &eval(index, scope)?),
        Expr::Call(callee, args) => {
            let args = arguments(args, scope)?;
            call(callee, &args, scope)
        }
        Expr::Unary(op, operand) => ops::unary(*op, eval(operand, scope)?),
        Expr::Binary(BinaryOp::And, left, right) => {
            let left = eval(left, scope)?;
            if left.is_truthy() {
                eval(right, scope)
            } else {
                Ok(left)
            }
        }
        Expr::Binary(BinaryOp::Or, left, right) => {
            let left = eval(left, scope)?;
            if left.is_truthy() {
                Ok(left)
            } else {
                eval(right, scope)
            }
        }
        Expr::Binary(op, left, right) => {
            ops::binary(*op, &eval(left, scope)?, &eval(right, scope)?)
        }
        Expr::Conditional(condition, then, otherwise) => {
            if eval(condition, scope)?.is_truthy() {
                eval(then, scope)
            } else {
                eval(otherwise, scope)
            }
        }
        Expr::Lambda(lambda) => Ok(Value::Function(Rc::new(scope.closure(lambda)))),
        Expr::Assign(name, value) => {
            let value = eval(value, scope)?;
            scope.assign(name, &value)?;
            Ok(value)
        }
        Expr::Sequence(items) => {
            let mut last = Value::Null;
            for item in items {
                last = eval(item, scope)?;
            }
            Ok(last)
        }
    }
}

fn arguments(args: &[Arg], scope: &Scope) -> Result<Arguments> {
    let mut positional = Vec::new();
    let mut named = Vec::new();
    for arg in args {
        match arg {
            Arg::Positional(expr) => positional.push(eval(expr, scope)?),
            Arg::Named(name, expr) => named.push((name.clone(), eval(expr, scope)?)),
        }
    }
    Ok(Arguments::from_parts(positional, named))
}

fn member(target: &Value, name: &str) -> Result<Value> {
    match target {
        Value::Node(node) if name == ROOT => Ok(Value::Node(node.root())),
        Value::Node(node) => node.get(name),
        Value::Mapping(map) => map.get(name).cloned().ok_or_else(|| Error::NoKey {
            name: name.to_string(),
        }),
        other => Err(Error::Type {
            operation: format!("field access `.{name}`"),
            details: format!("{} has no fields", other.type_name()),
        }),
    }
}

fn call(callee: &Expr, args: &Arguments, scope: &Scope) -> Result<Value> {
    match callee {
        Expr::Ident(name) => scope.call_name(name, args),
        Expr::Member(target, name) => {
            let target = eval(target, scope)?;
            match &target {
                Value::Node(node) if name != ROOT => node.call(name, args),
                _ => scope.call_value(member(&target, name)?, name, args),
            }
        }
        other => scope.call_value(eval(other, scope)?, "<expression>", args),
    }
}

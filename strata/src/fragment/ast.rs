//! Syntax tree for the fragment language.

use std::rc::Rc;

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub(crate) fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Segment {
    Text(String),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub(crate) enum Arg {
    Positional(Expr),
    Named(String, Expr),
}

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    /// Scalar literal.
    Literal(Value),
    Interpolated(Vec<Segment>),
    List(Vec<Expr>),
    Map(Vec<(String, Expr)>),
    Ident(String),
    SelfRef,
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Arg>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Lambda(Rc<Lambda>),
    Assign(String, Box<Expr>),
    Sequence(Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParamKind {
    Positional,
    Named,
}

#[derive(Debug, Clone)]
pub(crate) struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Expr>,
}

impl Param {
    pub(crate) fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Lambda {
    pub params: Vec<Param>,
    pub body: Expr,
}

impl Lambda {
    /// Wraps a bare expression as a function of no parameters.
    pub(crate) fn thunk(body: Expr) -> Self {
        Self {
            params: Vec::new(),
            body,
        }
    }

    pub(crate) fn positional(&self) -> impl Iterator<Item = &Param> {
        self.params.iter().filter(|p| p.kind == ParamKind::Positional)
    }

    pub(crate) fn named(&self) -> impl Iterator<Item = &Param> {
        self.params.iter().filter(|p| p.kind == ParamKind::Named)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Statement {
    Let(String, Expr),
    Expr(Expr),
}

/// A parsed fragment: statements run in order, then the optional result.
#[derive(Debug, Clone, Default)]
pub(crate) struct Fragment {
    pub statements: Vec<Statement>,
    pub result: Option<Expr>,
}

//! Parser for the fragment language.
//!
//! Precedence, loosest first: assignment, `?:`, `||`, `&&`, equality,
//! comparison, additive, multiplicative, unary, postfix (`.`, call, index).
//! The binary and unary tiers are a single `pratt` table.

use std::collections::HashSet;
use std::rc::Rc;

use chumsky::error::{RichPattern, RichReason};
use chumsky::input::ValueInput;
use chumsky::pratt::{infix, left, prefix};
use chumsky::prelude::*;

use super::ast::{
    Arg, BinaryOp, Expr, Fragment, Lambda, Param, ParamKind, Segment, Statement, UnaryOp,
};
use super::lexer::{lexer, Span, Spanned, StrPiece, Token};
use crate::value::Value;

/// Deepest nesting accepted: brackets, plus `=>`, `?` and `=` chains and
/// runs of prefix operators.
pub(crate) const MAX_NESTING: usize = 64;

type Extra<'t> = extra::Err<Rich<'t, Token, Span>>;
type ParseResult<T> = Result<T, SyntaxError>;

/// A parse failure with a 1-based source position.
///
/// The path is attached by the caller when converting into [`crate::Error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl SyntaxError {
    fn locate(source: &str, failure: Failure) -> Self {
        let before = source.get(..failure.offset).unwrap_or(source);
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        Self {
            line: before.matches('\n').count() + 1,
            column: before[line_start..].chars().count() + 1,
            message: failure.message,
        }
    }
}

/// A failure located by byte offset into the text being parsed.
#[derive(Debug)]
struct Failure {
    offset: usize,
    message: String,
}

impl Failure {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }

    /// The earliest of the errors one parse reported.
    fn first<T>(errors: &[Rich<'_, T, Span>], message: fn(&Rich<'_, T, Span>) -> String) -> Self {
        errors.iter().min_by_key(|error| error.span().start).map_or_else(
            || Self::new(0, "invalid syntax"),
            |error| Self::new(error.span().start, message(error)),
        )
    }

    fn shifted(self, by: usize) -> Self {
        Self {
            offset: self.offset + by,
            ..self
        }
    }

    fn into_rich<'t>(self) -> Rich<'t, Token, Span> {
        Rich::custom(Span::from(self.offset..self.offset), self.message)
    }
}

/// Parse a whole fragment file.
pub(crate) fn parse_fragment(source: &str) -> ParseResult<Fragment> {
    fragment_at(source, 0).map_err(|failure| SyntaxError::locate(source, failure))
}

/// Parse a single expression, such as the body of a YAML `!fn` scalar.
pub(crate) fn parse_expression(source: &str) -> ParseResult<Expr> {
    expression_at(source, 0).map_err(|failure| SyntaxError::locate(source, failure))
}

fn fragment_at(source: &str, depth: usize) -> Result<Fragment, Failure> {
    let tokens = tokenize(source, depth)?;
    let end = Span::from(source.len()..source.len());
    let result = fragment()
        .parse(tokens.as_slice().map(end, |(token, span)| (token, span)))
        .into_result()
        .map_err(|errors| Failure::first(&errors, parse_message));
    result
}

fn expression_at(source: &str, depth: usize) -> Result<Expr, Failure> {
    let tokens = tokenize(source, depth)?;
    let end = Span::from(source.len()..source.len());
    let result = expression()
        .parse(tokens.as_slice().map(end, |(token, span)| (token, span)))
        .into_result()
        .map_err(|errors| Failure::first(&errors, parse_message));
    result
}

fn tokenize(source: &str, depth: usize) -> Result<Vec<Spanned<Token>>, Failure> {
    let mut tokens = lexer()
        .parse(source)
        .into_result()
        .map_err(|errors| Failure::first(&errors, lex_message))?;
    nest(&mut tokens, depth)?;
    Ok(tokens)
}

// Rejects input nested past `MAX_NESTING` before any recursive parsing
// starts, and records the depth each interpolation starts at.
fn nest(tokens: &mut [Spanned<Token>], base: usize) -> Result<(), Failure> {
    // `=>`, `?` and `=` chains open since the last separator, per bracket.
    let mut chains = vec![0];
    let mut depth = base;
    let mut prefix_run = 0;
    let mut after_operand = false;
    for (token, span) in tokens.iter_mut() {
        let mut is_prefix = false;
        match token {
            Token::LParen | Token::LBracket | Token::LBrace => {
                depth += 1;
                chains.push(0);
            }
            Token::RParen | Token::RBracket | Token::RBrace => {
                if chains.len() > 1 {
                    depth -= 1 + chains.pop().unwrap_or_default();
                }
            }
            Token::Comma | Token::Semicolon => {
                if let Some(open) = chains.last_mut() {
                    depth -= *open;
                    *open = 0;
                }
            }
            Token::Arrow | Token::Question | Token::Assign => {
                if let Some(open) = chains.last_mut() {
                    *open += 1;
                    depth += 1;
                }
            }
            Token::Bang => is_prefix = true,
            Token::Minus => is_prefix = !after_operand,
            Token::Str(pieces) => {
                for piece in pieces {
                    if let StrPiece::Code { depth: start, .. } = piece {
                        *start = depth + prefix_run + 1;
                    }
                }
            }
            _ => {}
        }
        prefix_run = if is_prefix { prefix_run + 1 } else { 0 };
        if depth + prefix_run > MAX_NESTING {
            return Err(Failure::new(
                span.start,
                format!("expression nested more than {MAX_NESTING} levels deep"),
            ));
        }
        after_operand = matches!(
            token,
            Token::Ident(_)
                | Token::Int(_)
                | Token::Float(_)
                | Token::Str(_)
                | Token::True
                | Token::False
                | Token::Null
                | Token::SelfKw
                | Token::RParen
                | Token::RBracket
                | Token::RBrace
        );
    }
    Ok(())
}

enum Postfix {
    Member(String),
    Call(Vec<Arg>),
    Index(Expr),
}

fn expression<'t, I>() -> impl Parser<'t, I, Expr, Extra<'t>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    recursive(|expr| {
        let ident = select! { Token::Ident(name) => name };

        let literal = select! {
            Token::Int(i) => Expr::Literal(Value::Int(i)),
            Token::Float(x) => Expr::Literal(Value::Float(x)),
            Token::True => Expr::Literal(Value::Bool(true)),
            Token::False => Expr::Literal(Value::Bool(false)),
            Token::Null => Expr::Literal(Value::Null),
        };

        let string = select! { Token::Str(pieces) => pieces }.validate(|pieces, _, emitter| {
            interpolate(pieces).unwrap_or_else(|failure| {
                emitter.emit(failure.into_rich());
                Expr::Literal(Value::Null)
            })
        });

        let list = expr
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBracket), just(Token::RBracket))
            .map(Expr::List);

        let key = select! {
            Token::Ident(name) => name,
            Token::Int(i) => i.to_string(),
            Token::Let => "let".to_string(),
            Token::Fn => "fn".to_string(),
            Token::True => "true".to_string(),
            Token::False => "false".to_string(),
            Token::Null => "null".to_string(),
            Token::SelfKw => "self".to_string(),
        }
        .or(select! { Token::Str(pieces) => pieces }.validate(|pieces, e, emitter| {
            match pieces.as_slice() {
                [StrPiece::Text(text)] => text.clone(),
                _ => {
                    emitter.emit(Rich::custom(e.span(), "mapping keys cannot be interpolated"));
                    String::new()
                }
            }
        }))
        .labelled("a mapping key");

        let map = key
            .then_ignore(just(Token::Colon))
            .then(expr.clone())
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .map(Expr::Map);

        // `x`, `x = default`, `x:` and `x: default`.
        let param = ident
            .clone()
            .labelled("a parameter name")
            .then(choice((
                just(Token::Colon)
                    .ignore_then(expr.clone().or_not())
                    .map(|default| (ParamKind::Named, default)),
                just(Token::Assign)
                    .ignore_then(expr.clone())
                    .map(|default| (ParamKind::Positional, Some(default))),
                empty().to((ParamKind::Positional, None)),
            )))
            .map_with(|(name, (kind, default)), e| {
                (
                    Param {
                        name,
                        kind,
                        default,
                    },
                    e.span(),
                )
            });

        let lambda = just(Token::Fn)
            .ignore_then(
                param
                    .separated_by(just(Token::Comma))
                    .allow_trailing()
                    .collect::<Vec<_>>()
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .validate(|params, _, emitter| {
                for (span, message) in parameter_errors(&params) {
                    emitter.emit(Rich::custom(span, message));
                }
                params.into_iter().map(|(param, _)| param).collect::<Vec<_>>()
            })
            .then_ignore(just(Token::Arrow))
            .then(expr.clone())
            .map(|(params, body)| Expr::Lambda(Rc::new(Lambda { params, body })));

        // `(a; b)` runs both and yields `b`; `(a)` is plain grouping.
        let group = expr
            .clone()
            .separated_by(just(Token::Semicolon))
            .at_least(1)
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LParen), just(Token::RParen))
            .map(|mut items| {
                if items.len() == 1 {
                    items.remove(0)
                } else {
                    Expr::Sequence(items)
                }
            });

        let atom = choice((
            literal,
            string,
            just(Token::SelfKw).to(Expr::SelfRef),
            ident.clone().map(Expr::Ident),
            list,
            map,
            lambda,
            group,
        ))
        .labelled("an expression")
        .boxed();

        let argument = ident
            .clone()
            .then_ignore(just(Token::Colon))
            .then(expr.clone())
            .map(|(name, value)| Arg::Named(name, value))
            .or(expr.clone().map(Arg::Positional));

        let postfix = choice((
            just(Token::Dot)
                .ignore_then(ident.clone().labelled("a field name"))
                .map(Postfix::Member),
            argument
                .separated_by(just(Token::Comma))
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen))
                .map(Postfix::Call),
            expr.clone()
                .delimited_by(just(Token::LBracket), just(Token::RBracket))
                .map(Postfix::Index),
        ));

        let call = atom.foldl(postfix.repeated(), |target, postfix| match postfix {
            Postfix::Member(name) => Expr::Member(Box::new(target), name),
            Postfix::Call(args) => Expr::Call(Box::new(target), args),
            Postfix::Index(index) => Expr::Index(Box::new(target), Box::new(index)),
        });

        let binary = call.pratt((
            prefix(7, just(Token::Minus), |_, rhs, _| Expr::Unary(UnaryOp::Neg, Box::new(rhs))),
            prefix(7, just(Token::Bang), |_, rhs, _| Expr::Unary(UnaryOp::Not, Box::new(rhs))),
            infix(
                left(6),
                select! {
                    Token::Star => BinaryOp::Mul,
                    Token::Slash => BinaryOp::Div,
                    Token::Percent => BinaryOp::Rem,
                },
                |l, op, r, _| Expr::Binary(op, Box::new(l), Box::new(r)),
            ),
            infix(
                left(5),
                select! { Token::Plus => BinaryOp::Add, Token::Minus => BinaryOp::Sub },
                |l, op, r, _| Expr::Binary(op, Box::new(l), Box::new(r)),
            ),
            infix(
                left(4),
                select! {
                    Token::Lt => BinaryOp::Lt,
                    Token::Le => BinaryOp::Le,
                    Token::Gt => BinaryOp::Gt,
                    Token::Ge => BinaryOp::Ge,
                },
                |l, op, r, _| Expr::Binary(op, Box::new(l), Box::new(r)),
            ),
            infix(
                left(3),
                select! { Token::Eq => BinaryOp::Eq, Token::NotEq => BinaryOp::NotEq },
                |l, op, r, _| Expr::Binary(op, Box::new(l), Box::new(r)),
            ),
            infix(
                left(2),
                just(Token::AndAnd).to(BinaryOp::And),
                |l, op, r, _| Expr::Binary(op, Box::new(l), Box::new(r)),
            ),
            infix(
                left(1),
                just(Token::OrOr).to(BinaryOp::Or),
                |l, op, r, _| Expr::Binary(op, Box::new(l), Box::new(r)),
            ),
        ));

        let conditional = binary
            .then(
                just(Token::Question)
                    .ignore_then(expr.clone())
                    .then_ignore(just(Token::Colon))
                    .then(expr.clone())
                    .or_not(),
            )
            .map(|(condition, branches)| match branches {
                Some((then, otherwise)) => {
                    Expr::Conditional(Box::new(condition), Box::new(then), Box::new(otherwise))
                }
                None => condition,
            });

        let assignment = ident
            .then_ignore(just(Token::Assign))
            .then(expr)
            .map(|(name, value)| Expr::Assign(name, Box::new(value)));

        assignment.or(conditional).boxed()
    })
}

fn fragment<'t, I>() -> impl Parser<'t, I, Fragment, Extra<'t>>
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    let expr = expression::<I>();

    let binding = just(Token::Let)
        .ignore_then(select! { Token::Ident(name) => name }.labelled("a name after `let`"))
        .then_ignore(just(Token::Assign))
        .then(expr.clone())
        .then_ignore(just(Token::Semicolon))
        .map(|(name, value)| Statement::Let(name, value));

    let statement = binding.or(expr
        .clone()
        .then_ignore(just(Token::Semicolon))
        .map(Statement::Expr));

    statement
        .repeated()
        .collect::<Vec<_>>()
        .then(expr.or_not())
        .map(|(statements, result)| Fragment { statements, result })
}

// Each `${...}` is parsed as an expression of its own; failures are moved
// back to where the code sits in the enclosing text.
fn interpolate(pieces: Vec<StrPiece>) -> Result<Expr, Failure> {
    if let [StrPiece::Text(text)] = pieces.as_slice() {
        return Ok(Expr::Literal(Value::Str(text.clone())));
    }
    pieces
        .into_iter()
        .map(|piece| match piece {
            StrPiece::Text(text) => Ok(Segment::Text(text)),
            StrPiece::Code {
                source,
                offset,
                depth,
            } => {
                if source.trim().is_empty() {
                    return Err(Failure::new(offset, "empty interpolation"));
                }
                expression_at(&source, depth)
                    .map(Segment::Expr)
                    .map_err(|failure| failure.shifted(offset))
            }
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Expr::Interpolated)
}

fn parameter_errors(params: &[(Param, Span)]) -> Vec<(Span, String)> {
    let mut seen = HashSet::new();
    let mut after_default = false;
    let mut errors = Vec::new();
    for (param, span) in params {
        if !seen.insert(param.name.as_str()) {
            errors.push((*span, format!("duplicate parameter `{}`", param.name)));
        }
        if param.kind == ParamKind::Positional {
            if param.is_required() && after_default {
                errors.push((
                    *span,
                    format!(
                        "required parameter `{}` follows a parameter with a default",
                        param.name
                    ),
                ));
            }
            after_default |= !param.is_required();
        }
    }
    errors
}

fn parse_message(error: &Rich<'_, Token, Span>) -> String {
    if let RichReason::Custom(message) = error.reason() {
        return message.clone();
    }
    let found = error
        .found()
        .map_or_else(|| "end of input".to_string(), ToString::to_string);
    let mut expected: Vec<String> = error
        .expected()
        .map(|pattern| match pattern {
            RichPattern::Token(token) => format!("{}", &**token),
            RichPattern::Label(label) => label.to_string(),
            RichPattern::EndOfInput => "end of input".to_string(),
            _ => "something else".to_string(),
        })
        .collect();
    expected.sort();
    expected.dedup();
    match expected.split_last() {
        None => format!("unexpected {found}"),
        Some((last, [])) => format!("expected {last}, found {found}"),
        Some((last, rest)) => format!("expected {} or {last}, found {found}", rest.join(", ")),
    }
}

fn lex_message(error: &Rich<'_, char, Span>) -> String {
    match (error.reason(), error.found()) {
        (RichReason::Custom(message), _) => message.clone(),
        (_, Some(c)) => format!("unexpected character `{c}`"),
        (_, None) => "unexpected end of input".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(source: &str) -> Expr {
        parse_expression(source).unwrap()
    }

    fn nested_lists(depth: usize) -> String {
        format!("{}1{}", "[".repeat(depth), "]".repeat(depth))
    }

    #[test]
    fn test_precedence() {
        let Expr::Binary(BinaryOp::Add, _, right) = expr("1 + 2 * 3") else {
            panic!("expected addition at the top");
        };
        assert!(matches!(*right, Expr::Binary(BinaryOp::Mul, _, _)));
    }

    #[test]
    fn test_left_associative() {
        let Expr::Binary(BinaryOp::Sub, left, _) = expr("10 - 4 - 3") else {
            panic!("expected subtraction at the top");
        };
        assert!(matches!(*left, Expr::Binary(BinaryOp::Sub, _, _)));
    }

    #[test]
    fn test_logic_binds_looser_than_comparison() {
        let Expr::Binary(BinaryOp::Or, left, right) = expr("a < 1 && b || !c == d") else {
            panic!("expected `||` at the top");
        };
        assert!(matches!(*left, Expr::Binary(BinaryOp::And, _, _)));
        let Expr::Binary(BinaryOp::Eq, lhs, _) = *right else {
            panic!("expected `==` on the right");
        };
        assert!(matches!(*lhs, Expr::Unary(UnaryOp::Not, _)));
    }

    #[test]
    fn test_unary_binds_looser_than_postfix() {
        let Expr::Unary(UnaryOp::Neg, operand) = expr("-a.b") else {
            panic!("expected negation at the top");
        };
        assert!(matches!(*operand, Expr::Member(_, ref name) if name == "b"));
    }

    #[test]
    fn test_postfix_chain() {
        let Expr::Call(callee, args) = expr("root.nest1.add(2, fred: 5)") else {
            panic!("expected a call");
        };
        assert!(matches!(*callee, Expr::Member(_, ref name) if name == "add"));
        assert!(matches!(args[0], Arg::Positional(_)));
        assert!(matches!(args[1], Arg::Named(ref name, _) if name == "fred"));
    }

    #[test]
    fn test_index() {
        assert!(matches!(expr("items[-1]"), Expr::Index(..)));
    }

    #[test]
    fn test_lambda_parameters() {
        let Expr::Lambda(lambda) = expr("fn(a, b = 7, fred:, george: 9) => a") else {
            panic!("expected a lambda");
        };
        let kinds: Vec<_> = lambda
            .params
            .iter()
            .map(|p| (p.name.as_str(), p.kind, p.is_required()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("a", ParamKind::Positional, true),
                ("b", ParamKind::Positional, false),
                ("fred", ParamKind::Named, true),
                ("george", ParamKind::Named, false),
            ]
        );
    }

    #[test]
    fn test_required_after_default_rejected() {
        let err = parse_expression("fn(a = 1, b) => a").unwrap_err();
        assert!(err.message.contains("`b`"));
        assert_eq!((err.line, err.column), (1, 11));
    }

    #[test]
    fn test_duplicate_parameter_rejected() {
        let err = parse_expression("fn(a, a) => a").unwrap_err();
        assert!(err.message.contains("duplicate"));
    }

    #[test]
    fn test_assignment_and_sequence() {
        let Expr::Sequence(items) = expr("(count = count + 1; count)") else {
            panic!("expected a sequence");
        };
        assert!(matches!(items[0], Expr::Assign(ref name, _) if name == "count"));
    }

    #[test]
    fn test_single_group_is_not_a_sequence() {
        assert!(matches!(expr("(1 + 2)"), Expr::Binary(BinaryOp::Add, _, _)));
    }

    #[test]
    fn test_conditional() {
        assert!(matches!(expr("a > 1 ? 'big' : 'small'"), Expr::Conditional(..)));
    }

    #[test]
    fn test_map_keys() {
        let Expr::Map(entries) = expr(r#"{ plain: 1, "quoted key": 2, 3: 4, self: 5, }"#) else {
            panic!("expected a map");
        };
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["plain", "quoted key", "3", "self"]);
    }

    #[test]
    fn test_interpolated_key_rejected() {
        let err = parse_expression(r#"{ "${a}": 1 }"#).unwrap_err();
        assert!(err.message.contains("interpolated"));
    }

    #[test]
    fn test_interpolation_parsed() {
        let Expr::Interpolated(segments) = expr(r#""Value: ${nest1.test1(4)}!""#) else {
            panic!("expected interpolation");
        };
        assert_eq!(segments.len(), 3);
        assert!(matches!(segments[1], Segment::Expr(Expr::Call(..))));
    }

    #[test]
    fn test_interpolation_error_position() {
        let err = parse_fragment("\n  \"x ${ 1 + }\"").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.column > 3);
    }

    #[test]
    fn test_empty_interpolation() {
        let err = parse_expression(r#""a ${ } b""#).unwrap_err();
        assert_eq!(err.message, "empty interpolation");
    }

    #[test]
    fn test_fragment_statements_and_result() {
        let fragment = parse_fragment("let a = 1;\nhelper = fn(x) => x;\n{ value: a }").unwrap();
        assert_eq!(fragment.statements.len(), 2);
        assert!(matches!(fragment.statements[0], Statement::Let(ref name, _) if name == "a"));
        assert!(matches!(fragment.result, Some(Expr::Map(_))));
    }

    #[test]
    fn test_fragment_without_result() {
        let fragment = parse_fragment("let a = 1;").unwrap();
        assert!(fragment.result.is_none());
        assert!(parse_fragment("").unwrap().result.is_none());
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        let err = parse_fragment("{ a: 1 } { b: 2 }").unwrap_err();
        assert!(err.message.contains("end of input"));
        assert_eq!((err.line, err.column), (1, 10));
    }

    #[test]
    fn test_missing_colon_in_map() {
        let err = parse_expression("{ a 1 }").unwrap_err();
        assert_eq!((err.line, err.column), (1, 5));
        assert!(err.message.contains("`:`"));
    }

    #[test]
    fn test_moderate_nesting_parses() {
        assert!(matches!(expr(&nested_lists(24)), Expr::List(_)));
    }

    #[test]
    fn test_deep_nesting_rejected_before_parsing() {
        let source = nested_lists(200);
        let err = parse_expression(&source).unwrap_err();
        assert!(err.message.contains("nested more than"));
        assert_eq!((err.line, err.column), (1, MAX_NESTING + 1));

        let err = parse_fragment(&format!("{{ a: {source} }}")).unwrap_err();
        assert!(err.message.contains("nested more than"));
    }

    #[test]
    fn test_deep_unary_and_conditional_chains_rejected() {
        let negations = format!("{}1", "-".repeat(500));
        assert!(parse_expression(&negations).unwrap_err().message.contains("nested"));

        let chain = "a ? 1 : ".repeat(500) + "0";
        assert!(parse_expression(&chain).unwrap_err().message.contains("nested"));
    }

    #[test]
    fn test_nesting_counts_through_interpolation() {
        let inner = nested_lists(40);
        let source = format!("{}\"${{{inner}}}\"{}", "[".repeat(40), "]".repeat(40));
        let err = parse_expression(&source).unwrap_err();
        assert!(err.message.contains("nested"));
    }

    #[test]
    fn test_separators_reset_chains() {
        let entries: Vec<String> = (0..100)
            .map(|i| format!("f{i}: fn(x = 1) => x ? 1 : 2"))
            .collect();
        let source = format!("{{ {} }}", entries.join(", "));
        assert!(matches!(expr(&source), Expr::Map(ref entries) if entries.len() == 100));
    }
}

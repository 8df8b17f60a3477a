//! Tokenizer for the fragment language.

use std::fmt;

use chumsky::prelude::*;

pub(crate) type Span = SimpleSpan;
pub(crate) type Spanned<T> = (T, Span);

/// One piece of a double-quoted string.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StrPiece {
    Text(String),
    /// Source of a `${...}` interpolation.
    Code {
        source: String,
        /// Byte offset of `source` within the lexed text.
        offset: usize,
        /// Nesting depth the interpolation starts at, set before parsing.
        depth: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(Vec<StrPiece>),
    Let,
    Fn,
    True,
    False,
    Null,
    SelfKw,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semicolon,
    Dot,
    Question,
    Assign,
    Arrow,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    AndAnd,
    OrOr,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Ident(name) => return write!(f, "identifier `{name}`"),
            Self::Int(i) => return write!(f, "number `{i}`"),
            Self::Float(x) => return write!(f, "number `{x}`"),
            Self::Str(_) => return f.write_str("string"),
            Self::Let => "let",
            Self::Fn => "fn",
            Self::True => "true",
            Self::False => "false",
            Self::Null => "null",
            Self::SelfKw => "self",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::Comma => ",",
            Self::Colon => ":",
            Self::Semicolon => ";",
            Self::Dot => ".",
            Self::Question => "?",
            Self::Assign => "=",
            Self::Arrow => "=>",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Bang => "!",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
        };
        write!(f, "`{symbol}`")
    }
}

/// Splits fragment source into spanned tokens, dropping whitespace and
/// `#` comments.
///
/// Unterminated strings and bad escapes are reported without stopping, so
/// the error lands where the string starts rather than at end of input.
pub(crate) fn lexer<'src>(
) -> impl Parser<'src, &'src str, Vec<Spanned<Token>>, extra::Err<Rich<'src, char>>> {
    let digits = any()
        .filter(char::is_ascii_digit)
        .then(any().filter(|c: &char| c.is_ascii_digit() || *c == '_').repeated())
        .to_slice();

    // A fraction needs a digit after the dot, so `3.x` is `3`, `.`, `x`.
    let number = digits
        .then(just('.').then(text::digits(10)).to_slice().or_not())
        .validate(|(whole, fraction): (&str, Option<&str>), e, emitter| {
            let text: String = whole
                .chars()
                .chain(fraction.unwrap_or_default().chars())
                .filter(|c| *c != '_')
                .collect();
            let token = if fraction.is_some() {
                text.parse().map(Token::Float).ok()
            } else {
                text.parse().map(Token::Int).ok()
            };
            token.unwrap_or_else(|| {
                emitter.emit(Rich::custom(e.span(), format!("number `{text}` is out of range")));
                Token::Int(0)
            })
        });

    let word = any()
        .filter(|c: &char| c.is_alphabetic() || *c == '_')
        .then(any().filter(|c: &char| c.is_alphanumeric() || *c == '_').repeated())
        .to_slice()
        .map(|word: &str| match word {
            "let" => Token::Let,
            "fn" => Token::Fn,
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            "self" => Token::SelfKw,
            _ => Token::Ident(word.to_string()),
        });

    let raw = just('\'')
        .ignore_then(
            just('\\')
                .ignore_then(one_of("'\\"))
                .or(none_of('\''))
                .repeated()
                .collect::<String>(),
        )
        .then(just('\'').or_not())
        .validate(|(text, close), e, emitter| {
            if close.is_none() {
                emitter.emit(Rich::custom(e.span(), "unterminated string"));
            }
            Token::Str(vec![StrPiece::Text(text)])
        });

    let escape = just('\\').ignore_then(any()).validate(|c, e, emitter| match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        '\\' | '"' | '$' => c,
        other => {
            emitter.emit(Rich::custom(e.span(), format!("unknown escape `\\{other}`")));
            other
        }
    });

    // Quoted strings inside interpolated code are skipped whole, so a `}`
    // inside them does not close the interpolation.
    let quoted = |quote: char| {
        just(quote)
            .then(
                just('\\')
                    .then(any())
                    .ignored()
                    .or(any().filter(move |c: &char| *c != quote && *c != '\\').ignored())
                    .repeated(),
            )
            .then(just(quote))
            .ignored()
    };

    let code = recursive(|code| {
        choice((
            just('{').then(code).then(just('}')).to_slice(),
            quoted('"').to_slice(),
            quoted('\'').to_slice(),
            none_of("{}\"'").to_slice(),
        ))
        .repeated()
        .to_slice()
    });

    let interpolation = just("${")
        .ignore_then(code.map_with(|source: &str, e| (source.to_string(), e.span())))
        .then(just('}').or_not())
        .validate(|((source, span), close): ((String, Span), Option<char>), e, emitter| {
            if close.is_none() {
                emitter.emit(Rich::custom(e.span(), "unterminated interpolation"));
            }
            StrPiece::Code {
                source,
                offset: span.start,
                depth: 0,
            }
        });

    let literal_char = choice((
        escape,
        none_of("\"\\$"),
        just('$').and_is(just("${").not()),
    ));

    let cooked = just('"')
        .ignore_then(
            choice((
                literal_char
                    .repeated()
                    .at_least(1)
                    .collect::<String>()
                    .map(StrPiece::Text),
                interpolation,
            ))
            .repeated()
            .collect::<Vec<_>>(),
        )
        .then(just('"').or_not())
        .validate(|(mut pieces, close), e, emitter| {
            if close.is_none() {
                emitter.emit(Rich::custom(e.span(), "unterminated string"));
            }
            if pieces.is_empty() {
                pieces.push(StrPiece::Text(String::new()));
            }
            Token::Str(pieces)
        });

    let pair = choice((
        just("=>").to(Token::Arrow),
        just("==").to(Token::Eq),
        just("!=").to(Token::NotEq),
        just("<=").to(Token::Le),
        just(">=").to(Token::Ge),
        just("&&").to(Token::AndAnd),
        just("||").to(Token::OrOr),
    ));

    let single = choice((
        just('=').to(Token::Assign),
        just('!').to(Token::Bang),
        just('<').to(Token::Lt),
        just('>').to(Token::Gt),
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just('[').to(Token::LBracket),
        just(']').to(Token::RBracket),
        just('{').to(Token::LBrace),
        just('}').to(Token::RBrace),
        just(',').to(Token::Comma),
        just(':').to(Token::Colon),
        just(';').to(Token::Semicolon),
        just('.').to(Token::Dot),
        just('?').to(Token::Question),
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Star),
        just('/').to(Token::Slash),
        just('%').to(Token::Percent),
    ));

    let token = choice((cooked, raw, number, word, pair, single));

    let comment = just('#').then(none_of('\n').repeated()).padded();
    let trivia = comment.repeated().padded();

    trivia.clone().ignore_then(
        token
            .map_with(|token, e| (token, e.span()))
            .then_ignore(trivia)
            .repeated()
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        lexer()
            .parse(source)
            .into_result()
            .unwrap()
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }

    fn first_error(source: &str) -> (usize, String) {
        let errors = lexer().parse(source).into_result().unwrap_err();
        let error = &errors[0];
        (error.span().start, error.to_string())
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("let x = self"),
            vec![Token::Let, Token::Ident("x".into()), Token::Assign, Token::SelfKw]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("1_000 2.5 3.x"),
            vec![
                Token::Int(1000),
                Token::Float(2.5),
                Token::Int(3),
                Token::Dot,
                Token::Ident("x".into()),
            ]
        );
    }

    #[test]
    fn test_two_character_operators() {
        assert_eq!(
            kinds("=> == != <= >= && ||"),
            vec![
                Token::Arrow,
                Token::Eq,
                Token::NotEq,
                Token::Le,
                Token::Ge,
                Token::AndAnd,
                Token::OrOr,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(kinds("# a comment\n42 # trailing"), vec![Token::Int(42)]);
        assert!(kinds("  # only a comment\n").is_empty());
        assert!(kinds("").is_empty());
    }

    #[test]
    fn test_interpolated_string() {
        let tokens = kinds(r#""Value: ${ {a: "}"}.a } end""#);
        let Token::Str(pieces) = &tokens[0] else {
            panic!("expected string, got {:?}", tokens[0]);
        };
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0], StrPiece::Text("Value: ".into()));
        assert!(matches!(
            &pieces[1],
            StrPiece::Code { source, offset: 10, .. } if source == r#" {a: "}"}.a "#
        ));
        assert_eq!(pieces[2], StrPiece::Text(" end".into()));
    }

    #[test]
    fn test_escapes() {
        let tokens = kinds(r#""a\n\${b}" 'it\'s ${raw}'"#);
        assert_eq!(tokens[0], Token::Str(vec![StrPiece::Text("a\n${b}".into())]));
        assert_eq!(tokens[1], Token::Str(vec![StrPiece::Text("it's ${raw}".into())]));
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(kinds(r#""""#), vec![Token::Str(vec![StrPiece::Text(String::new())])]);
    }

    #[test]
    fn test_spans() {
        let tokens = lexer().parse("a\n  b").into_result().unwrap();
        assert_eq!(tokens[1].1.start, 4);
    }

    #[test]
    fn test_unterminated_string_reported_at_its_start() {
        let (offset, message) = first_error("x = \"abc");
        assert_eq!(offset, 4);
        assert!(message.contains("unterminated"));
    }

    #[test]
    fn test_unknown_escape() {
        let (_, message) = first_error(r#""\q""#);
        assert!(message.contains("unknown escape"));
    }

    #[test]
    fn test_unexpected_character() {
        let (offset, _) = first_error("a @ b");
        assert_eq!(offset, 2);
    }
}

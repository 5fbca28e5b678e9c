use super::{ParseError, Spanned};
use chumsky::prelude::*;
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'code> {
    BracketRoundOpen,
    BracketRoundClose,
    BracketCurlyOpen,
    BracketCurlyClose,
    BracketSquareOpen,
    BracketSquareClose,
    Comment(&'code str),
    Number(f64),
    Text(&'code str),
    SnakeCaseIdentifier(&'code str),
    Colon,
    Comma,
    Dot,
    Semicolon,
    Newline,
    Pipe,
    NotEqual,
    GreaterOrEqual,
    Greater,
    LessOrEqual,
    Less,
    Equal,
    Assign,
    Minus,
    Plus,
    Asterisk,
    Slash,
    Let,
    SelfRef,
    None,
    True,
    False,
}

impl<'code> Token<'code> {
    pub fn into_cow_str(self) -> Cow<'code, str> {
        match self {
            Self::BracketRoundOpen => "(".into(),
            Self::BracketRoundClose => ")".into(),
            Self::BracketCurlyOpen => "{".into(),
            Self::BracketCurlyClose => "}".into(),
            Self::BracketSquareOpen => "[".into(),
            Self::BracketSquareClose => "]".into(),
            Self::Comment(comment) => comment.into(),
            Self::Number(number) => number.to_string().into(),
            Self::Text(text) => text.into(),
            Self::SnakeCaseIdentifier(identifier) => identifier.into(),
            Self::Colon => ":".into(),
            Self::Comma => ",".into(),
            Self::Dot => ".".into(),
            Self::Semicolon => ";".into(),
            Self::Newline => "\n".into(),
            Self::Pipe => "|".into(),
            Self::NotEqual => "!=".into(),
            Self::GreaterOrEqual => ">=".into(),
            Self::Greater => ">".into(),
            Self::LessOrEqual => "<=".into(),
            Self::Less => "<".into(),
            Self::Equal => "==".into(),
            Self::Assign => "=".into(),
            Self::Minus => "-".into(),
            Self::Plus => "+".into(),
            Self::Asterisk => "*".into(),
            Self::Slash => "/".into(),
            Self::Let => "let".into(),
            Self::SelfRef => "self".into(),
            Self::None => "none".into(),
            Self::True => "True".into(),
            Self::False => "False".into(),
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.into_cow_str())
    }
}

pub fn lexer<'code>()
-> impl Parser<'code, &'code str, Vec<Spanned<Token<'code>>>, extra::Err<ParseError<'code, char>>> {
    let bracket = choice((
        just('(').to(Token::BracketRoundOpen),
        just(')').to(Token::BracketRoundClose),
        just('{').to(Token::BracketCurlyOpen),
        just('}').to(Token::BracketCurlyClose),
        just('[').to(Token::BracketSquareOpen),
        just(']').to(Token::BracketSquareClose),
    ));

    let comparator_or_assign = choice((
        just("!=").to(Token::NotEqual),
        just(">=").to(Token::GreaterOrEqual),
        just('>').to(Token::Greater),
        just("<=").to(Token::LessOrEqual),
        just('<').to(Token::Less),
        just("==").to(Token::Equal),
        just('=').to(Token::Assign),
    ));

    let arithmetic_operator = choice((
        just('-').to(Token::Minus),
        just('+').to(Token::Plus),
        just('*').to(Token::Asterisk),
        just('/').to(Token::Slash),
    ));

    let comment = just("--")
        .ignore_then(
            any()
                .and_is(text::inline_whitespace().then(text::newline()).not())
                .repeated(),
        )
        .to_slice()
        .map(Token::Comment);

    // Unsigned here; unary minus is an operator so that `1-2` lexes as three tokens.
    let number = text::int(10)
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .from_str()
        .unwrapped()
        .map(Token::Number);

    let text = just('\'')
        .ignore_then(none_of('\'').repeated().to_slice())
        .then_ignore(just('\''))
        .map(Token::Text);

    let snake_case_identifier_or_keyword = any()
        .filter(char::is_ascii_lowercase)
        .then(
            any()
                .filter(|character: &char| {
                    *character == '_'
                        || character.is_ascii_lowercase()
                        || character.is_ascii_digit()
                })
                .repeated(),
        )
        .to_slice()
        .map(|identifier| match identifier {
            "let" => Token::Let,
            "self" => Token::SelfRef,
            "none" => Token::None,
            _ => Token::SnakeCaseIdentifier(identifier),
        });

    let tag = any()
        .filter(char::is_ascii_uppercase)
        .then(
            any()
                .filter(|character: &char| {
                    character.is_ascii_lowercase()
                        || character.is_ascii_uppercase()
                        || character.is_ascii_digit()
                })
                .repeated(),
        )
        .to_slice()
        .try_map(|tag, span| match tag {
            "True" => Ok(Token::True),
            "False" => Ok(Token::False),
            _ => Err(ParseError::custom(
                span,
                format!("Unknown tag '{tag}', expected 'True' or 'False'"),
            )),
        });

    let token = choice((
        bracket,
        comment,
        number,
        just('|').to(Token::Pipe),
        just(':').to(Token::Colon),
        just(',').to(Token::Comma),
        just('.').to(Token::Dot),
        just(';').to(Token::Semicolon),
        text::newline().to(Token::Newline),
        comparator_or_assign,
        arithmetic_operator,
        text,
        snake_case_identifier_or_keyword,
        tag,
    ));

    token
        .map_with(|token, extra| Spanned {
            node: token,
            span: extra.span(),
        })
        .padded_by(text::inline_whitespace())
        .recover_with(skip_then_retry_until(any().ignored(), end()))
        .repeated()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chumsky::prelude::Parser;

    fn tokens(code: &str) -> Vec<Token<'_>> {
        lexer()
            .parse(code)
            .output()
            .unwrap()
            .iter()
            .map(|token| token.node)
            .collect()
    }

    #[test]
    fn test_number_and_operators() {
        assert_eq!(
            tokens("1-2"),
            vec![Token::Number(1.0), Token::Minus, Token::Number(2.0)],
        );
    }

    #[test]
    fn test_text() {
        assert_eq!(tokens("'hello'"), vec![Token::Text("hello")]);
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            tokens("let answer = none"),
            vec![
                Token::Let,
                Token::SnakeCaseIdentifier("answer"),
                Token::Assign,
                Token::None,
            ],
        );
    }

    #[test]
    fn test_comparators() {
        assert_eq!(
            tokens("a != b == c"),
            vec![
                Token::SnakeCaseIdentifier("a"),
                Token::NotEqual,
                Token::SnakeCaseIdentifier("b"),
                Token::Equal,
                Token::SnakeCaseIdentifier("c"),
            ],
        );
    }

    #[test]
    fn test_comment_runs_to_end_of_line() {
        assert_eq!(
            tokens("1 -- the answer\n2"),
            vec![
                Token::Number(1.0),
                Token::Comment("-- the answer"),
                Token::Newline,
                Token::Number(2.0),
            ],
        );
    }

    #[test]
    fn test_lambda_tokens() {
        assert_eq!(
            tokens("|a, b| a + b"),
            vec![
                Token::Pipe,
                Token::SnakeCaseIdentifier("a"),
                Token::Comma,
                Token::SnakeCaseIdentifier("b"),
                Token::Pipe,
                Token::SnakeCaseIdentifier("a"),
                Token::Plus,
                Token::SnakeCaseIdentifier("b"),
            ],
        );
    }
}

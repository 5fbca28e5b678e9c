//! Lexer, grammar and AST for Cloister script.
//!
//! Source text goes through two chumsky stages: `lexer()` produces spanned
//! tokens, then `expression_parser()`/`program_parser()` consume the token
//! stream. The AST is owned (`String` names, `Rc` lambda bodies) so that
//! values produced by the evaluator can outlive the source they were parsed
//! from.

use chumsky::{input::ValueInput, pratt::*, prelude::*};
use std::fmt;
use std::rc::Rc;

mod lexer;
pub use lexer::{Token, lexer};

use crate::error::{SourceSyntaxError, SyntaxIssue};

pub use chumsky::prelude::{Input, Parser};

pub type Span = SimpleSpan;
pub type ParseError<'code, T> = Rich<'code, T, Span>;

#[derive(Debug, Clone)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Literal),
    /// The ambient-receiver keyword. Resolves to `none` unless a capability
    /// named `self` was granted explicitly.
    SelfRef,
    Alias {
        name: String,
    },
    List {
        items: Vec<Spanned<Self>>,
    },
    Record {
        fields: Vec<(String, Spanned<Self>)>,
    },
    Lambda {
        parameters: Vec<String>,
        body: Rc<Spanned<Self>>,
    },
    Call {
        callee: Box<Spanned<Self>>,
        arguments: Vec<Spanned<Self>>,
    },
    Member {
        object: Box<Spanned<Self>>,
        field: String,
    },
    Comparator(Comparator),
    Arithmetic(ArithmeticOperator),
}

#[derive(Debug, Clone)]
pub enum Literal {
    Number(f64),
    Text(String),
    Bool(bool),
    None,
}

#[derive(Debug, Clone)]
pub enum Comparator {
    Equal {
        operand_a: Box<Spanned<Expression>>,
        operand_b: Box<Spanned<Expression>>,
    },
    NotEqual {
        operand_a: Box<Spanned<Expression>>,
        operand_b: Box<Spanned<Expression>>,
    },
    Greater {
        operand_a: Box<Spanned<Expression>>,
        operand_b: Box<Spanned<Expression>>,
    },
    GreaterOrEqual {
        operand_a: Box<Spanned<Expression>>,
        operand_b: Box<Spanned<Expression>>,
    },
    Less {
        operand_a: Box<Spanned<Expression>>,
        operand_b: Box<Spanned<Expression>>,
    },
    LessOrEqual {
        operand_a: Box<Spanned<Expression>>,
        operand_b: Box<Spanned<Expression>>,
    },
}

#[derive(Debug, Clone)]
pub enum ArithmeticOperator {
    Negate {
        operand: Box<Spanned<Expression>>,
    },
    Add {
        operand_a: Box<Spanned<Expression>>,
        operand_b: Box<Spanned<Expression>>,
    },
    Subtract {
        operand_a: Box<Spanned<Expression>>,
        operand_b: Box<Spanned<Expression>>,
    },
    Multiply {
        operand_a: Box<Spanned<Expression>>,
        operand_b: Box<Spanned<Expression>>,
    },
    Divide {
        operand_a: Box<Spanned<Expression>>,
        operand_b: Box<Spanned<Expression>>,
    },
}

#[derive(Debug, Clone)]
pub enum Statement {
    Let {
        name: String,
        value: Spanned<Expression>,
    },
    Assign {
        object: Box<Spanned<Expression>>,
        field: String,
        value: Spanned<Expression>,
    },
    Expression(Spanned<Expression>),
}

fn expression<'code, I>()
-> impl Parser<'code, I, Spanned<Expression>, extra::Err<ParseError<'code, Token<'code>>>> + Clone
where
    I: ValueInput<'code, Token = Token<'code>, Span = Span>,
{
    let newlines = just(Token::Newline).repeated();

    recursive(|expression| {
        let colon = just(Token::Colon);
        let comma = just(Token::Comma);
        let dot = just(Token::Dot);
        let pipe = just(Token::Pipe);
        let bracket_round_open = just(Token::BracketRoundOpen);
        let bracket_round_close = just(Token::BracketRoundClose);
        let bracket_curly_open = just(Token::BracketCurlyOpen);
        let bracket_curly_close = just(Token::BracketCurlyClose);
        let bracket_square_open = just(Token::BracketSquareOpen);
        let bracket_square_close = just(Token::BracketSquareClose);

        let snake_case_identifier =
            select! { Token::SnakeCaseIdentifier(identifier) => identifier };

        let literal = select! {
            Token::Number(number) => Literal::Number(number),
            Token::Text(text) => Literal::Text(text.to_owned()),
            Token::True => Literal::Bool(true),
            Token::False => Literal::Bool(false),
            Token::None => Literal::None,
        };

        let expression_literal = literal.map(Expression::Literal);

        let self_reference = just(Token::SelfRef).to(Expression::SelfRef);

        let alias = snake_case_identifier.map(|name: &str| Expression::Alias {
            name: name.to_owned(),
        });

        let items = expression
            .clone()
            .separated_by(comma.clone().padded_by(newlines.clone()))
            .allow_trailing()
            .collect::<Vec<_>>();

        let list = items
            .clone()
            .delimited_by(
                bracket_square_open.then(newlines.clone()),
                newlines.clone().then(bracket_square_close),
            )
            .map(|items| Expression::List { items });

        let record_field = group((snake_case_identifier, colon, expression.clone()))
            .map(|(name, _, value)| (name.to_owned(), value));

        let record = record_field
            .separated_by(comma.clone().padded_by(newlines.clone()))
            .allow_trailing()
            .collect()
            .delimited_by(
                bracket_curly_open.then(newlines.clone()),
                newlines.clone().then(bracket_curly_close),
            )
            .map(|fields| Expression::Record { fields });

        let lambda = {
            let parameters = snake_case_identifier
                .map(|parameter: &str| parameter.to_owned())
                .separated_by(comma.clone())
                .collect::<Vec<_>>()
                .delimited_by(pipe.clone(), pipe);

            parameters
                .then(expression.clone())
                .map(|(parameters, body)| Expression::Lambda {
                    parameters,
                    body: Rc::new(body),
                })
        };

        let nested = bracket_round_open
            .clone()
            .ignore_then(expression.clone().padded_by(newlines.clone()))
            .then_ignore(bracket_round_close.clone());

        let atom = choice((
            lambda,
            expression_literal,
            self_reference,
            alias,
            list,
            record,
        ))
        .map_with(|expression, extra| Spanned {
            node: expression,
            span: extra.span(),
        })
        .or(nested);

        let call_arguments = items.delimited_by(
            bracket_round_open.then(newlines.clone()),
            newlines.clone().then(bracket_round_close),
        );

        let member_field = dot.ignore_then(snake_case_identifier);

        atom.pratt((
            // Precedence 9 (tightest): call and field access
            postfix(9, call_arguments, |callee, arguments, extra| Spanned {
                span: extra.span(),
                node: Expression::Call {
                    callee: Box::new(callee),
                    arguments,
                },
            }),
            postfix(9, member_field, |object, field: &str, extra| Spanned {
                span: extra.span(),
                node: Expression::Member {
                    object: Box::new(object),
                    field: field.to_owned(),
                },
            }),
            // Precedence 8: unary minus
            prefix(8, just(Token::Minus), |_, operand, extra| Spanned {
                span: extra.span(),
                node: Expression::Arithmetic(ArithmeticOperator::Negate {
                    operand: Box::new(operand),
                }),
            }),
            // Precedence 7: multiplicative operators
            infix(left(7), just(Token::Asterisk), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Arithmetic(ArithmeticOperator::Multiply {
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                }),
            }),
            infix(left(7), just(Token::Slash), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Arithmetic(ArithmeticOperator::Divide {
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                }),
            }),
            // Precedence 5: additive operators
            infix(left(5), just(Token::Plus), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Arithmetic(ArithmeticOperator::Add {
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                }),
            }),
            infix(left(5), just(Token::Minus), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Arithmetic(ArithmeticOperator::Subtract {
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                }),
            }),
            // Precedence 3: comparison operators
            infix(left(3), just(Token::Equal), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Comparator(Comparator::Equal {
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                }),
            }),
            infix(left(3), just(Token::NotEqual), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Comparator(Comparator::NotEqual {
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                }),
            }),
            infix(left(3), just(Token::Greater), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Comparator(Comparator::Greater {
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                }),
            }),
            infix(left(3), just(Token::GreaterOrEqual), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Comparator(Comparator::GreaterOrEqual {
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                }),
            }),
            infix(left(3), just(Token::Less), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Comparator(Comparator::Less {
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                }),
            }),
            infix(left(3), just(Token::LessOrEqual), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Comparator(Comparator::LessOrEqual {
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                }),
            }),
        ))
    })
}

/// A single expression, with surrounding newlines tolerated. Anything more
/// than one expression fails, which is what gives Expression mode its
/// "sole expression" contract.
pub fn expression_parser<'code, I>()
-> impl Parser<'code, I, Spanned<Expression>, extra::Err<ParseError<'code, Token<'code>>>>
where
    I: ValueInput<'code, Token = Token<'code>, Span = Span>,
{
    expression().padded_by(just(Token::Newline).repeated())
}

/// A statement sequence separated by newlines and/or semicolons.
pub fn program_parser<'code, I>()
-> impl Parser<'code, I, Vec<Spanned<Statement>>, extra::Err<ParseError<'code, Token<'code>>>>
where
    I: ValueInput<'code, Token = Token<'code>, Span = Span>,
{
    let expression = expression();

    let separator = choice((just(Token::Semicolon), just(Token::Newline)))
        .ignored()
        .repeated()
        .at_least(1);

    let let_statement = just(Token::Let)
        .ignore_then(select! { Token::SnakeCaseIdentifier(name) => name })
        .then_ignore(just(Token::Assign))
        .then(expression.clone())
        .map(|(name, value)| Statement::Let {
            name: name.to_owned(),
            value,
        });

    let expression_or_assignment = expression
        .clone()
        .then(just(Token::Assign).ignore_then(expression).or_not())
        .try_map(|(target, value), span| match value {
            Some(value) => match target.node {
                Expression::Member { object, field } => Ok(Statement::Assign {
                    object,
                    field,
                    value,
                }),
                _ => Err(ParseError::custom(
                    span,
                    "assignment target must be a field access like `record.field`",
                )),
            },
            None => Ok(Statement::Expression(target)),
        });

    choice((let_statement, expression_or_assignment))
        .map_with(|statement, extra| Spanned {
            node: statement,
            span: extra.span(),
        })
        .separated_by(separator)
        .allow_leading()
        .allow_trailing()
        .collect()
}

fn lex(source: &str) -> Result<Vec<Spanned<Token<'_>>>, SourceSyntaxError> {
    let (tokens, errors) = lexer().parse(source).into_output_errors();
    if !errors.is_empty() {
        return Err(syntax_error(errors));
    }
    let mut tokens = tokens.unwrap_or_default();
    tokens.retain(|token| !matches!(token.node, Token::Comment(_)));
    Ok(tokens)
}

/// Parse `source` as a single expression.
pub fn parse_expression(source: &str) -> Result<Spanned<Expression>, SourceSyntaxError> {
    let tokens = lex(source)?;
    let (expression, errors) = expression_parser()
        .parse(tokens.map(Span::from(source.len()..source.len()), |Spanned { node, span }| {
            (node, span)
        }))
        .into_output_errors();
    match expression {
        Some(expression) if errors.is_empty() => Ok(expression),
        _ => Err(syntax_error_or(errors, source, "expected a single expression")),
    }
}

/// Parse `source` as a statement sequence.
pub fn parse_program(source: &str) -> Result<Vec<Spanned<Statement>>, SourceSyntaxError> {
    let tokens = lex(source)?;
    // Blank leading and trailing lines are not statements; drop them here so
    // the grammar only deals with separators *between* statements.
    let is_separator =
        |token: &Spanned<Token>| matches!(token.node, Token::Newline | Token::Semicolon);
    let start = tokens
        .iter()
        .position(|token| !is_separator(token))
        .unwrap_or(tokens.len());
    let end = tokens
        .iter()
        .rposition(|token| !is_separator(token))
        .map_or(start, |index| index + 1);
    let tokens = tokens[start..end].to_vec();
    let (statements, errors) = program_parser()
        .parse(tokens.map(Span::from(source.len()..source.len()), |Spanned { node, span }| {
            (node, span)
        }))
        .into_output_errors();
    match statements {
        Some(statements) if errors.is_empty() => Ok(statements),
        _ => Err(syntax_error_or(errors, source, "expected a program")),
    }
}

fn syntax_error<'code, T: fmt::Display + 'code>(
    errors: impl IntoIterator<Item = ParseError<'code, T>>,
) -> SourceSyntaxError {
    SourceSyntaxError {
        location: None,
        issues: errors
            .into_iter()
            .map(|error| SyntaxIssue {
                span: error.span().into_range(),
                message: error.to_string(),
            })
            .collect(),
    }
}

fn syntax_error_or<'code, T: fmt::Display + 'code>(
    errors: Vec<ParseError<'code, T>>,
    source: &str,
    fallback: &str,
) -> SourceSyntaxError {
    let mut error = syntax_error(errors);
    if error.issues.is_empty() {
        error.issues.push(SyntaxIssue {
            span: 0..source.len(),
            message: fallback.to_owned(),
        });
    }
    error
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addition() {
        let expression = parse_expression("1 + 2").unwrap();
        assert!(matches!(
            expression.node,
            Expression::Arithmetic(ArithmeticOperator::Add { .. }),
        ));
    }

    #[test]
    fn test_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let expression = parse_expression("1 + 2 * 3").unwrap();
        let Expression::Arithmetic(ArithmeticOperator::Add { operand_b, .. }) = expression.node
        else {
            panic!("expected Add at the top, got {:?}", expression.node);
        };
        assert!(matches!(
            operand_b.node,
            Expression::Arithmetic(ArithmeticOperator::Multiply { .. }),
        ));
    }

    #[test]
    fn test_lambda_with_call() {
        let expression = parse_expression("(|a, b| a + b)(1, 2)").unwrap();
        let Expression::Call { callee, arguments } = expression.node else {
            panic!("expected Call, got {:?}", expression.node);
        };
        assert!(matches!(callee.node, Expression::Lambda { .. }));
        assert_eq!(arguments.len(), 2);
    }

    #[test]
    fn test_member_chain() {
        let expression = parse_expression("config.server.port").unwrap();
        let Expression::Member { object, field } = expression.node else {
            panic!("expected Member, got {:?}", expression.node);
        };
        assert_eq!(field, "port");
        assert!(matches!(object.node, Expression::Member { .. }));
    }

    #[test]
    fn test_expression_mode_rejects_program() {
        assert!(parse_expression("123; 234").is_err());
    }

    #[test]
    fn test_program_statements() {
        let statements = parse_program("let x = 1\nx + 1").unwrap();
        assert_eq!(statements.len(), 2);
        assert!(matches!(statements[0].node, Statement::Let { .. }));
        assert!(matches!(statements[1].node, Statement::Expression(_)));
    }

    #[test]
    fn test_program_semicolon_separator() {
        let statements = parse_program("123; 234").unwrap();
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn test_assignment_requires_field_target() {
        assert!(parse_program("module.exports = 1").is_ok());
        assert!(parse_program("exports = 1").is_err());
    }

    #[test]
    fn test_record_and_list() {
        let expression = parse_expression("{ items: [1, 2], name: 'box' }").unwrap();
        let Expression::Record { fields } = expression.node else {
            panic!("expected Record, got {:?}", expression.node);
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].0, "items");
    }

    #[test]
    fn test_comment_is_ignored() {
        let statements = parse_program("1 -- one\n2").unwrap();
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn test_blank_lines_around_a_program() {
        let statements = parse_program("\n\nlet x = 1\n\nx\n\n").unwrap();
        assert_eq!(statements.len(), 2);
        assert!(parse_program("\n\n").unwrap().is_empty());
        assert!(parse_program("").unwrap().is_empty());
    }
}

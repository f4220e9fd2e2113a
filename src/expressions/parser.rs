//! Parser for the built-in expression language
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! or      := and ("||" and)*
//! and     := equality ("&&" equality)*
//! equality:= compare (("==" | "!=") compare)*
//! compare := additive (("<=" | ">=" | "<" | ">") additive)*
//! additive:= term (("+" | "-") term)*
//! term    := unary (("*" | "/" | "%") unary)*
//! unary   := ("!" | "-") unary | primary
//! primary := number | string | array | "(" or ")" | call | keyword | path
//! ```

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag},
    character::complete::{char, digit1, multispace0},
    combinator::{all_consuming, map, map_res, not, opt, peek, recognize},
    error::{context, convert_error, ParseError, VerboseError},
    multi::{fold_many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult, Parser,
};
use serde_json::Value;

use crate::errors::ExpressionError;
use crate::memory::path::{identifier, memory_path};
use crate::memory::MemoryPath;

type ParserResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

/// Parsed expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(MemoryPath),
    Array(Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

impl Expr {
    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }
}

/// Parse a complete expression
#[tracing::instrument(level = "debug", skip(text))]
pub fn parse_expression(text: &str) -> Result<Expr, ExpressionError> {
    match all_consuming(ws(or_expr))(text) {
        Ok((_, expr)) => Ok(expr),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(ExpressionError::Parse(
            convert_error(text, e),
        )),
        Err(nom::Err::Incomplete(_)) => Err(ExpressionError::Parse(format!(
            "incomplete expression '{text}'"
        ))),
    }
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> ParserResult<'a, O>
where
    F: Parser<&'a str, O, VerboseError<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

/// Left-associative chain of `operand (op operand)*`
fn chain<'a>(
    input: &'a str,
    operand: fn(&'a str) -> ParserResult<'a, Expr>,
    operator: fn(&'a str) -> ParserResult<'a, BinaryOp>,
) -> ParserResult<'a, Expr> {
    let (input, first) = operand(input)?;
    fold_many0(
        pair(ws(operator), operand),
        move || first.clone(),
        |lhs, (op, rhs)| Expr::binary(op, lhs, rhs),
    )(input)
}

fn or_expr(input: &str) -> ParserResult<'_, Expr> {
    chain(input, and_expr, |i| map(tag("||"), |_| BinaryOp::Or)(i))
}

fn and_expr(input: &str) -> ParserResult<'_, Expr> {
    chain(input, equality, |i| map(tag("&&"), |_| BinaryOp::And)(i))
}

fn equality(input: &str) -> ParserResult<'_, Expr> {
    chain(input, comparison, |i| {
        alt((
            map(tag("=="), |_| BinaryOp::Equal),
            map(tag("!="), |_| BinaryOp::NotEqual),
        ))(i)
    })
}

fn comparison(input: &str) -> ParserResult<'_, Expr> {
    chain(input, additive, |i| {
        alt((
            map(tag("<="), |_| BinaryOp::LessOrEqual),
            map(tag(">="), |_| BinaryOp::GreaterOrEqual),
            map(tag("<"), |_| BinaryOp::Less),
            map(tag(">"), |_| BinaryOp::Greater),
        ))(i)
    })
}

fn additive(input: &str) -> ParserResult<'_, Expr> {
    chain(input, term, |i| {
        alt((
            map(char('+'), |_| BinaryOp::Add),
            map(char('-'), |_| BinaryOp::Subtract),
        ))(i)
    })
}

fn term(input: &str) -> ParserResult<'_, Expr> {
    chain(input, unary, |i| {
        alt((
            map(char('*'), |_| BinaryOp::Multiply),
            map(char('/'), |_| BinaryOp::Divide),
            map(char('%'), |_| BinaryOp::Modulo),
        ))(i)
    })
}

fn unary(input: &str) -> ParserResult<'_, Expr> {
    alt((
        map(preceded(ws(char('!')), unary), |e| Expr::Unary(UnaryOp::Not, Box::new(e))),
        map(preceded(ws(char('-')), unary), |e| {
            Expr::Unary(UnaryOp::Negate, Box::new(e))
        }),
        ws(primary),
    ))(input)
}

fn primary(input: &str) -> ParserResult<'_, Expr> {
    context(
        "primary",
        alt((
            number,
            string_literal,
            array_literal,
            delimited(char('('), ws(or_expr), char(')')),
            call,
            keyword,
            map(memory_path_verbose, Expr::Path),
        )),
    )(input)
}

fn number(input: &str) -> ParserResult<'_, Expr> {
    map_res(
        recognize(pair(digit1, opt(pair(char('.'), digit1)))),
        |text: &str| -> Result<Expr, String> {
            if text.contains('.') {
                let f: f64 = text.parse().map_err(|e| format!("{e}"))?;
                serde_json::Number::from_f64(f)
                    .map(|n| Expr::Literal(Value::Number(n)))
                    .ok_or_else(|| format!("invalid number {text}"))
            } else {
                let n: i64 = text.parse().map_err(|e| format!("{e}"))?;
                Ok(Expr::Literal(Value::from(n)))
            }
        },
    )(input)
}

fn string_literal(input: &str) -> ParserResult<'_, Expr> {
    map(
        alt((
            delimited(char('\''), opt(is_not("'")), char('\'')),
            delimited(char('"'), opt(is_not("\"")), char('"')),
        )),
        |text: Option<&str>| Expr::Literal(Value::String(text.unwrap_or_default().to_string())),
    )(input)
}

fn array_literal(input: &str) -> ParserResult<'_, Expr> {
    map(
        delimited(
            char('['),
            separated_list0(char(','), ws(or_expr)),
            preceded(multispace0, char(']')),
        ),
        Expr::Array,
    )(input)
}

fn call(input: &str) -> ParserResult<'_, Expr> {
    map(
        tuple((
            identifier_verbose,
            preceded(multispace0, char('(')),
            separated_list0(char(','), ws(or_expr)),
            preceded(multispace0, char(')')),
        )),
        |(name, _, args, _)| Expr::Call(name.to_string(), args),
    )(input)
}

fn keyword(input: &str) -> ParserResult<'_, Expr> {
    map_res(
        terminated(identifier_verbose, not(peek(alt((char('.'), char('[')))))),
        |word: &str| match word {
            "true" => Ok(Expr::Literal(Value::Bool(true))),
            "false" => Ok(Expr::Literal(Value::Bool(false))),
            "null" => Ok(Expr::Literal(Value::Null)),
            _ => Err("not a keyword"),
        },
    )(input)
}

/// Adapt the path parsers, which use the default nom error type
fn identifier_verbose(input: &str) -> ParserResult<'_, &str> {
    identifier(input).map_err(|e| e.map(|inner| VerboseError::from_error_kind(inner.input, inner.code)))
}

fn memory_path_verbose(input: &str) -> ParserResult<'_, MemoryPath> {
    memory_path(input).map_err(|e| e.map(|inner| VerboseError::from_error_kind(inner.input, inner.code)))
}

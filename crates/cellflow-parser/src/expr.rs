//! Expression parser (precedence climbing).

use cellflow_ast::{BinaryOp, Expr, ExprKind, Param, Sigil, Span, UnaryOp};
use cellflow_lexer::Token;

use crate::error::ParseError;
use crate::stream::TokenStream;

/// Parse a full expression.
pub(crate) fn parse_expr(ts: &mut TokenStream) -> Result<Expr, ParseError> {
    if ts.check(&Token::Lambda) {
        return parse_lambda(ts);
    }
    parse_binary(ts, 0)
}

/// Parse an expression list; a top-level comma builds a tuple.
pub(crate) fn parse_expr_list(ts: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = ts.current_pos();
    let first = parse_expr(ts)?;
    if !ts.check(&Token::Comma) {
        return Ok(first);
    }
    let mut elements = vec![first];
    while ts.eat(&Token::Comma) {
        if is_expr_end(ts) {
            break; // trailing comma
        }
        elements.push(parse_expr(ts)?);
    }
    Ok(Expr::new(ExprKind::Tuple(elements), ts.span_from(start)))
}

fn is_expr_end(ts: &TokenStream) -> bool {
    matches!(
        ts.peek(),
        None | Some(Token::Newline)
            | Some(Token::Semi)
            | Some(Token::RParen)
            | Some(Token::RBracket)
            | Some(Token::RBrace)
    )
}

/// Binding power for a binary operator, with its AST op.
fn binary_op(token: &Token) -> Option<(BinaryOp, u8, u8)> {
    // (op, left bp, right bp); right > left means left-assoc
    let entry = match token {
        Token::Or => (BinaryOp::Or, 1, 2),
        Token::And => (BinaryOp::And, 3, 4),
        Token::EqEq => (BinaryOp::Eq, 5, 6),
        Token::NotEq => (BinaryOp::NotEq, 5, 6),
        Token::Lt => (BinaryOp::Lt, 5, 6),
        Token::LtEq => (BinaryOp::LtEq, 5, 6),
        Token::Gt => (BinaryOp::Gt, 5, 6),
        Token::GtEq => (BinaryOp::GtEq, 5, 6),
        Token::In => (BinaryOp::In, 5, 6),
        Token::Plus => (BinaryOp::Add, 7, 8),
        Token::Minus => (BinaryOp::Sub, 7, 8),
        Token::Star => (BinaryOp::Mul, 9, 10),
        Token::Slash => (BinaryOp::Div, 9, 10),
        Token::Percent => (BinaryOp::Mod, 9, 10),
        // Right-associative
        Token::DoubleStar => (BinaryOp::Pow, 14, 13),
        _ => return None,
    };
    Some(entry)
}

fn parse_binary(ts: &mut TokenStream, min_bp: u8) -> Result<Expr, ParseError> {
    let start = ts.current_pos();
    let mut left = parse_unary(ts)?;

    while let Some(token) = ts.peek() {
        let Some((op, left_bp, right_bp)) = binary_op(token) else {
            break;
        };
        if left_bp < min_bp {
            break;
        }
        ts.advance();
        let right = parse_binary(ts, right_bp)?;
        left = Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ts.span_from(start),
        );
    }

    Ok(left)
}

fn parse_unary(ts: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = ts.current_pos();
    let op = match ts.peek() {
        Some(Token::Minus) => Some(UnaryOp::Neg),
        Some(Token::Not) => Some(UnaryOp::Not),
        _ => None,
    };
    if let Some(op) = op {
        ts.advance();
        let operand = parse_unary(ts)?;
        return Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            ts.span_from(start),
        ));
    }
    parse_postfix(ts)
}

/// Parse an atom followed by any chain of call/attribute/subscript suffixes.
pub(crate) fn parse_postfix(ts: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = ts.current_pos();
    let mut expr = parse_atom(ts)?;

    loop {
        match ts.peek() {
            Some(Token::Dot) => {
                ts.advance();
                let attr = expect_ident(ts)?;
                expr = Expr::new(
                    ExprKind::Attribute {
                        object: Box::new(expr),
                        attr,
                    },
                    ts.span_from(start),
                );
            }
            Some(Token::LBracket) => {
                ts.advance();
                ts.skip_newlines();
                let index = parse_expr(ts)?;
                ts.skip_newlines();
                ts.expect(Token::RBracket)?;
                expr = Expr::new(
                    ExprKind::Subscript {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                    ts.span_from(start),
                );
            }
            Some(Token::LParen) => {
                ts.advance();
                let (args, kwargs) = parse_call_args(ts)?;
                expr = Expr::new(
                    ExprKind::Call {
                        func: Box::new(expr),
                        args,
                        kwargs,
                    },
                    ts.span_from(start),
                );
            }
            _ => break,
        }
    }

    Ok(expr)
}

/// Parse call arguments up to and including the closing paren.
fn parse_call_args(ts: &mut TokenStream) -> Result<(Vec<Expr>, Vec<(String, Expr)>), ParseError> {
    let mut args = Vec::new();
    let mut kwargs = Vec::new();

    ts.skip_newlines();
    if ts.eat(&Token::RParen) {
        return Ok((args, kwargs));
    }

    loop {
        ts.skip_newlines();
        // `name = expr` is a keyword argument.
        let is_kwarg = matches!(
            (ts.peek(), ts.peek_nth(1)),
            (Some(Token::Ident(_)), Some(Token::Assign))
        );
        if is_kwarg {
            let name = expect_ident(ts)?;
            ts.expect(Token::Assign)?;
            kwargs.push((name, parse_expr(ts)?));
        } else {
            args.push(parse_expr(ts)?);
        }
        ts.skip_newlines();
        if !ts.eat(&Token::Comma) {
            break;
        }
        ts.skip_newlines();
        if ts.check(&Token::RParen) {
            break; // trailing comma
        }
    }
    ts.expect(Token::RParen)?;
    Ok((args, kwargs))
}

fn parse_lambda(ts: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = ts.current_pos();
    ts.expect(Token::Lambda)?;
    let mut params = Vec::new();
    if !ts.check(&Token::Colon) {
        loop {
            params.push(parse_param(ts)?);
            if !ts.eat(&Token::Comma) {
                break;
            }
        }
    }
    ts.expect(Token::Colon)?;
    let body = parse_expr(ts)?;
    Ok(Expr::new(
        ExprKind::Lambda {
            params,
            body: Box::new(body),
        },
        ts.span_from(start),
    ))
}

/// Parse a single parameter: `name` or `name = default`.
pub(crate) fn parse_param(ts: &mut TokenStream) -> Result<Param, ParseError> {
    let start = ts.current_pos();
    let name = expect_ident(ts)?;
    let default = if ts.eat(&Token::Assign) {
        Some(parse_expr(ts)?)
    } else {
        None
    };
    Ok(Param {
        name,
        default,
        span: ts.span_from(start),
    })
}

/// Consume an identifier token.
pub(crate) fn expect_ident(ts: &mut TokenStream) -> Result<String, ParseError> {
    match ts.peek() {
        Some(Token::Ident(name)) => {
            let name = name.clone();
            ts.advance();
            Ok(name)
        }
        found => Err(ParseError::unexpected_token(
            found,
            "where an identifier was expected",
            ts.current_span(),
        )),
    }
}

fn parse_atom(ts: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = ts.current_pos();
    let span_of = |ts: &TokenStream| -> Span { ts.span_from(start) };

    // Reactivity sigils attach to the following name.
    let sigil = match ts.peek() {
        Some(Token::ReactiveSigil) => {
            ts.advance();
            Sigil::Reactive
        }
        Some(Token::CascadeSigil) => {
            ts.advance();
            Sigil::Cascading
        }
        Some(Token::BlockSigil) => {
            ts.advance();
            Sigil::Blocking
        }
        _ => Sigil::None,
    };
    if sigil != Sigil::None {
        let id = expect_ident(ts)?;
        return Ok(Expr::new(ExprKind::Name { id, sigil }, span_of(ts)));
    }

    match ts.peek().cloned() {
        Some(Token::Ident(id)) => {
            ts.advance();
            Ok(Expr::new(
                ExprKind::Name {
                    id,
                    sigil: Sigil::None,
                },
                span_of(ts),
            ))
        }
        Some(Token::Int(v)) => {
            ts.advance();
            Ok(Expr::new(ExprKind::Int(v), span_of(ts)))
        }
        Some(Token::Float(v)) => {
            ts.advance();
            Ok(Expr::new(ExprKind::Float(v), span_of(ts)))
        }
        Some(Token::Str(s)) => {
            ts.advance();
            Ok(Expr::new(ExprKind::Str(s), span_of(ts)))
        }
        Some(Token::True) => {
            ts.advance();
            Ok(Expr::new(ExprKind::Bool(true), span_of(ts)))
        }
        Some(Token::False) => {
            ts.advance();
            Ok(Expr::new(ExprKind::Bool(false), span_of(ts)))
        }
        Some(Token::None) => {
            ts.advance();
            Ok(Expr::new(ExprKind::NoneLit, span_of(ts)))
        }
        Some(Token::LParen) => {
            ts.advance();
            ts.skip_newlines();
            if ts.eat(&Token::RParen) {
                return Ok(Expr::new(ExprKind::Tuple(Vec::new()), span_of(ts)));
            }
            let first = parse_expr(ts)?;
            ts.skip_newlines();
            if ts.check(&Token::Comma) {
                let mut elements = vec![first];
                while ts.eat(&Token::Comma) {
                    ts.skip_newlines();
                    if ts.check(&Token::RParen) {
                        break;
                    }
                    elements.push(parse_expr(ts)?);
                    ts.skip_newlines();
                }
                ts.expect(Token::RParen)?;
                Ok(Expr::new(ExprKind::Tuple(elements), span_of(ts)))
            } else {
                ts.expect(Token::RParen)?;
                Ok(first)
            }
        }
        Some(Token::LBracket) => {
            ts.advance();
            ts.skip_newlines();
            if ts.eat(&Token::RBracket) {
                return Ok(Expr::new(ExprKind::List(Vec::new()), span_of(ts)));
            }
            let first = parse_expr(ts)?;
            ts.skip_newlines();
            if ts.check(&Token::For) {
                // List comprehension: [elem for target in source if cond]
                ts.advance();
                let target = crate::stmt::parse_target(ts)?;
                ts.expect(Token::In)?;
                let source = parse_expr(ts)?;
                let cond = if ts.eat(&Token::If) {
                    Some(Box::new(parse_expr(ts)?))
                } else {
                    None
                };
                ts.skip_newlines();
                ts.expect(Token::RBracket)?;
                return Ok(Expr::new(
                    ExprKind::ListComp {
                        element: Box::new(first),
                        target: Box::new(target),
                        source: Box::new(source),
                        cond,
                    },
                    span_of(ts),
                ));
            }
            let mut elements = vec![first];
            while ts.eat(&Token::Comma) {
                ts.skip_newlines();
                if ts.check(&Token::RBracket) {
                    break;
                }
                elements.push(parse_expr(ts)?);
                ts.skip_newlines();
            }
            ts.expect(Token::RBracket)?;
            Ok(Expr::new(ExprKind::List(elements), span_of(ts)))
        }
        Some(Token::LBrace) => {
            ts.advance();
            ts.skip_newlines();
            let mut entries = Vec::new();
            if !ts.check(&Token::RBrace) {
                loop {
                    ts.skip_newlines();
                    let key = parse_expr(ts)?;
                    ts.expect(Token::Colon)?;
                    let value = parse_expr(ts)?;
                    entries.push((key, value));
                    ts.skip_newlines();
                    if !ts.eat(&Token::Comma) {
                        break;
                    }
                    ts.skip_newlines();
                    if ts.check(&Token::RBrace) {
                        break;
                    }
                }
            }
            ts.expect(Token::RBrace)?;
            Ok(Expr::new(ExprKind::Dict(entries), span_of(ts)))
        }
        Some(Token::Lambda) => parse_lambda(ts),
        found => Err(ParseError::unexpected_token(
            found.as_ref(),
            "where an expression was expected",
            ts.current_span(),
        )),
    }
}

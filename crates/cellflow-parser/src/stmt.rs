//! Statement parsers.

use cellflow_ast::{BinaryOp, Expr, Stmt, StmtKind, Target, TargetKind};
use cellflow_lexer::Token;

use crate::error::ParseError;
use crate::expr::{expect_ident, parse_expr, parse_expr_list, parse_param, parse_postfix};
use crate::stream::TokenStream;

/// Parse a single statement. Does not consume the trailing separator.
pub(crate) fn parse_stmt(ts: &mut TokenStream) -> Result<Stmt, ParseError> {
    match ts.peek() {
        Some(Token::Def) => parse_func_def(ts),
        Some(Token::Class) => parse_class_def(ts),
        Some(Token::For) => parse_for(ts),
        Some(Token::While) => parse_while(ts),
        Some(Token::If) => parse_if(ts),
        Some(Token::Return) => parse_return(ts),
        Some(Token::Del) => parse_delete(ts),
        Some(Token::Import) => parse_import(ts),
        _ => parse_simple(ts),
    }
}

/// Parse a `{ ... }` block of statements.
pub(crate) fn parse_block(ts: &mut TokenStream) -> Result<Vec<Stmt>, ParseError> {
    ts.skip_newlines();
    ts.expect(Token::LBrace)?;
    let mut body = Vec::new();
    loop {
        ts.skip_separators();
        if ts.check(&Token::RBrace) || ts.at_end() {
            break;
        }
        body.push(parse_stmt(ts)?);
        if !matches!(
            ts.peek(),
            Some(Token::Newline) | Some(Token::Semi) | Some(Token::RBrace)
        ) && !ts.at_end()
        {
            return Err(ParseError::unexpected_token(
                ts.peek(),
                "after statement",
                ts.current_span(),
            ));
        }
    }
    ts.expect(Token::RBrace)?;
    Ok(body)
}

fn parse_func_def(ts: &mut TokenStream) -> Result<Stmt, ParseError> {
    let start = ts.current_pos();
    ts.expect(Token::Def)?;
    let name = expect_ident(ts)?;
    ts.expect(Token::LParen)?;
    let mut params = Vec::new();
    ts.skip_newlines();
    if !ts.check(&Token::RParen) {
        loop {
            ts.skip_newlines();
            params.push(parse_param(ts)?);
            ts.skip_newlines();
            if !ts.eat(&Token::Comma) {
                break;
            }
            ts.skip_newlines();
            if ts.check(&Token::RParen) {
                break;
            }
        }
    }
    ts.expect(Token::RParen)?;
    let body = parse_block(ts)?;
    Ok(Stmt::new(
        StmtKind::FuncDef { name, params, body },
        ts.span_from(start),
    ))
}

fn parse_class_def(ts: &mut TokenStream) -> Result<Stmt, ParseError> {
    let start = ts.current_pos();
    ts.expect(Token::Class)?;
    let name = expect_ident(ts)?;
    let body = parse_block(ts)?;
    Ok(Stmt::new(
        StmtKind::ClassDef { name, body },
        ts.span_from(start),
    ))
}

fn parse_for(ts: &mut TokenStream) -> Result<Stmt, ParseError> {
    let start = ts.current_pos();
    ts.expect(Token::For)?;
    let target = parse_target_list(ts)?;
    ts.expect(Token::In)?;
    let iter = parse_expr(ts)?;
    let body = parse_block(ts)?;
    Ok(Stmt::new(
        StmtKind::For { target, iter, body },
        ts.span_from(start),
    ))
}

fn parse_while(ts: &mut TokenStream) -> Result<Stmt, ParseError> {
    let start = ts.current_pos();
    ts.expect(Token::While)?;
    let cond = parse_expr(ts)?;
    let body = parse_block(ts)?;
    Ok(Stmt::new(
        StmtKind::While { cond, body },
        ts.span_from(start),
    ))
}

fn parse_if(ts: &mut TokenStream) -> Result<Stmt, ParseError> {
    let start = ts.current_pos();
    ts.expect(Token::If)?;
    let cond = parse_expr(ts)?;
    let body = parse_block(ts)?;
    let save = ts.current_pos();
    ts.skip_newlines();
    let orelse = if ts.eat(&Token::Else) {
        if ts.check(&Token::If) {
            // `else if` chains become a nested If in the else arm.
            vec![parse_if(ts)?]
        } else {
            parse_block(ts)?
        }
    } else {
        ts.rewind(save);
        Vec::new()
    };
    Ok(Stmt::new(
        StmtKind::If { cond, body, orelse },
        ts.span_from(start),
    ))
}

fn parse_return(ts: &mut TokenStream) -> Result<Stmt, ParseError> {
    let start = ts.current_pos();
    ts.expect(Token::Return)?;
    let value = if matches!(
        ts.peek(),
        None | Some(Token::Newline) | Some(Token::Semi) | Some(Token::RBrace)
    ) {
        None
    } else {
        Some(parse_expr_list(ts)?)
    };
    Ok(Stmt::new(StmtKind::Return(value), ts.span_from(start)))
}

fn parse_delete(ts: &mut TokenStream) -> Result<Stmt, ParseError> {
    let start = ts.current_pos();
    ts.expect(Token::Del)?;
    let mut targets = vec![parse_target(ts)?];
    while ts.eat(&Token::Comma) {
        targets.push(parse_target(ts)?);
    }
    Ok(Stmt::new(StmtKind::Delete(targets), ts.span_from(start)))
}

fn parse_import(ts: &mut TokenStream) -> Result<Stmt, ParseError> {
    let start = ts.current_pos();
    ts.expect(Token::Import)?;
    let mut module = expect_ident(ts)?;
    while ts.eat(&Token::Dot) {
        module.push('.');
        module.push_str(&expect_ident(ts)?);
    }
    let alias = if ts.eat(&Token::As) {
        Some(expect_ident(ts)?)
    } else {
        None
    };
    Ok(Stmt::new(
        StmtKind::Import { module, alias },
        ts.span_from(start),
    ))
}

/// Augmented-assignment operator, if the token is one.
fn aug_op(token: &Token) -> Option<BinaryOp> {
    match token {
        Token::PlusAssign => Some(BinaryOp::Add),
        Token::MinusAssign => Some(BinaryOp::Sub),
        Token::StarAssign => Some(BinaryOp::Mul),
        Token::SlashAssign => Some(BinaryOp::Div),
        _ => None,
    }
}

/// Scan ahead for an assignment operator at bracket depth zero before the
/// statement ends. Kwarg `=` inside calls sits at depth > 0 and is skipped.
fn scan_assignment(ts: &TokenStream) -> Option<Token> {
    let mut depth = 0usize;
    for i in 0.. {
        let token = ts.peek_nth(i)?;
        match token {
            Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
            Token::RParen | Token::RBracket | Token::RBrace => {
                depth = depth.checked_sub(1)?;
            }
            Token::Newline | Token::Semi if depth == 0 => return None,
            Token::Assign if depth == 0 => return Some(Token::Assign),
            Token::PlusAssign | Token::MinusAssign | Token::StarAssign | Token::SlashAssign
                if depth == 0 =>
            {
                return Some(token.clone());
            }
            // `lambda p = 1: ...` defaults never appear at depth 0 on the
            // left of a statement-level `=`, so no special case is needed.
            _ => {}
        }
    }
    None
}

/// Simple statement: assignment, augmented assignment, or bare expression.
fn parse_simple(ts: &mut TokenStream) -> Result<Stmt, ParseError> {
    let start = ts.current_pos();
    match scan_assignment(ts) {
        Some(Token::Assign) => {
            let mut targets = vec![parse_target_list(ts)?];
            ts.expect(Token::Assign)?;
            // Chained `a = b = value`: keep consuming targets while another
            // top-level `=` remains.
            while matches!(scan_assignment(ts), Some(Token::Assign)) {
                targets.push(parse_target_list(ts)?);
                ts.expect(Token::Assign)?;
            }
            let value = parse_expr_list(ts)?;
            Ok(Stmt::new(
                StmtKind::Assign { targets, value },
                ts.span_from(start),
            ))
        }
        Some(op_token) => {
            let op = aug_op(&op_token).ok_or_else(|| {
                ParseError::invalid_syntax("malformed augmented assignment", ts.current_span())
            })?;
            let target = parse_target(ts)?;
            ts.advance(); // the op= token
            let value = parse_expr_list(ts)?;
            Ok(Stmt::new(
                StmtKind::AugAssign { target, op, value },
                ts.span_from(start),
            ))
        }
        None => {
            let expr = parse_expr_list(ts)?;
            Ok(Stmt::new(StmtKind::ExprStmt(expr), ts.span_from(start)))
        }
    }
}

/// Parse a comma-separated target list; more than one element becomes a
/// tuple target.
pub(crate) fn parse_target_list(ts: &mut TokenStream) -> Result<Target, ParseError> {
    let start = ts.current_pos();
    let first = parse_target(ts)?;
    if !ts.check(&Token::Comma) {
        return Ok(first);
    }
    let mut elements = vec![first];
    while ts.eat(&Token::Comma) {
        if matches!(ts.peek(), Some(Token::Assign) | Some(Token::In)) {
            break; // trailing comma
        }
        elements.push(parse_target(ts)?);
    }
    Ok(Target::new(TargetKind::Tuple(elements), ts.span_from(start)))
}

/// Parse a single assignment target.
pub(crate) fn parse_target(ts: &mut TokenStream) -> Result<Target, ParseError> {
    let start = ts.current_pos();
    match ts.peek() {
        Some(Token::Star) => {
            ts.advance();
            let inner = parse_target(ts)?;
            Ok(Target::new(
                TargetKind::Starred(Box::new(inner)),
                ts.span_from(start),
            ))
        }
        Some(Token::LParen) => {
            ts.advance();
            let mut elements = vec![parse_target(ts)?];
            while ts.eat(&Token::Comma) {
                if ts.check(&Token::RParen) {
                    break;
                }
                elements.push(parse_target(ts)?);
            }
            ts.expect(Token::RParen)?;
            Ok(Target::new(TargetKind::Tuple(elements), ts.span_from(start)))
        }
        Some(Token::LBracket) => {
            ts.advance();
            let mut elements = vec![parse_target(ts)?];
            while ts.eat(&Token::Comma) {
                if ts.check(&Token::RBracket) {
                    break;
                }
                elements.push(parse_target(ts)?);
            }
            ts.expect(Token::RBracket)?;
            Ok(Target::new(TargetKind::List(elements), ts.span_from(start)))
        }
        Some(Token::Ident(_)) => {
            let expr = parse_postfix(ts)?;
            expr_to_target(expr)
        }
        found => Err(ParseError::unexpected_token(
            found,
            "where an assignment target was expected",
            ts.current_span(),
        )),
    }
}

/// Reinterpret a postfix expression as an assignment target.
fn expr_to_target(expr: Expr) -> Result<Target, ParseError> {
    use cellflow_ast::ExprKind;
    let span = expr.span;
    let kind = match expr.kind {
        ExprKind::Name { id, sigil: _ } => TargetKind::Name(id),
        ExprKind::Attribute { object, attr } => TargetKind::Attribute { object, attr },
        ExprKind::Subscript { object, index } => TargetKind::Subscript { object, index },
        _ => {
            return Err(ParseError::invalid_syntax(
                "expression is not a valid assignment target",
                span,
            ));
        }
    };
    Ok(Target::new(kind, span))
}

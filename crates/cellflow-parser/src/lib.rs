// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Hand-written recursive descent parser for the cellflow cell language.
//!
//! # Design
//!
//! The parser works over `(Token, Range<usize>)` pairs from the lexer, with
//! a small [`TokenStream`] wrapper for lookahead and span recovery. Grammar
//! shape:
//!
//! - Statements terminate at newline or `;`; compound statements carry
//!   brace-delimited bodies in which separators are freely repeated.
//! - Assignment vs. expression statements are disambiguated by scanning
//!   ahead for a top-level `=` (or `op=`) before the statement end; `=`
//!   inside call parentheses is a keyword argument, not an assignment.
//! - Expressions use precedence climbing with `**` right-associative and
//!   postfix call/attribute/subscript binding tightest.
//!
//! Errors are collected per statement: a failed statement is recorded and
//! the parser resynchronizes at the next separator, so one bad line does
//! not hide diagnostics for the rest of the cell.

mod error;
mod expr;
mod stmt;
mod stream;

pub use error::{ParseError, ParseErrorKind};
pub use stream::TokenStream;

use cellflow_ast::{Expr, Span, Stmt};
use cellflow_lexer::{lex, Token};

/// Parse a cell source into its statements.
///
/// Returns all parse errors rather than just the first.
pub fn parse_statements(source: &str) -> Result<Vec<Stmt>, Vec<ParseError>> {
    let tokens = match lex(source) {
        Ok(tokens) => tokens,
        Err(err) => {
            return Err(vec![ParseError::lex(Span::new(
                err.span.start as u32,
                err.span.end as u32,
            ))]);
        }
    };

    let mut ts = TokenStream::new(&tokens);
    let mut stmts = Vec::new();
    let mut errors = Vec::new();

    loop {
        ts.skip_separators();
        if ts.at_end() {
            break;
        }
        match stmt::parse_stmt(&mut ts) {
            Ok(stmt) => {
                stmts.push(stmt);
                // A statement must be followed by a separator or EOF.
                if !ts.at_end() && !matches!(ts.peek(), Some(Token::Newline) | Some(Token::Semi)) {
                    errors.push(ParseError::unexpected_token(
                        ts.peek(),
                        "after statement",
                        ts.current_span(),
                    ));
                    synchronize(&mut ts);
                }
            }
            Err(err) => {
                errors.push(err);
                synchronize(&mut ts);
            }
        }
    }

    if errors.is_empty() {
        Ok(stmts)
    } else {
        Err(errors)
    }
}

/// Parse a single expression (no trailing input allowed).
pub fn parse_expression(source: &str) -> Result<Expr, Vec<ParseError>> {
    let tokens = match lex(source) {
        Ok(tokens) => tokens,
        Err(err) => {
            return Err(vec![ParseError::lex(Span::new(
                err.span.start as u32,
                err.span.end as u32,
            ))]);
        }
    };
    let mut ts = TokenStream::new(&tokens);
    ts.skip_separators();
    let expr = expr::parse_expr(&mut ts).map_err(|e| vec![e])?;
    ts.skip_separators();
    if !ts.at_end() {
        return Err(vec![ParseError::unexpected_token(
            ts.peek(),
            "after expression",
            ts.current_span(),
        )]);
    }
    Ok(expr)
}

/// Skip to the next statement boundary after a parse error.
fn synchronize(ts: &mut TokenStream) {
    let mut depth = 0usize;
    while let Some(token) = ts.peek() {
        match token {
            Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
            Token::RParen | Token::RBracket | Token::RBrace => depth = depth.saturating_sub(1),
            Token::Newline | Token::Semi if depth == 0 => {
                ts.advance();
                return;
            }
            _ => {}
        }
        ts.advance();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellflow_ast::{ExprKind, Sigil, StmtKind, TargetKind};

    fn parse_one(source: &str) -> Stmt {
        let mut stmts = parse_statements(source).unwrap();
        assert_eq!(stmts.len(), 1, "expected one statement in {source:?}");
        stmts.pop().unwrap()
    }

    #[test]
    fn test_simple_assignment() {
        let stmt = parse_one("x = 1 + 2");
        let StmtKind::Assign { targets, value } = stmt.kind else {
            panic!("expected assignment");
        };
        assert_eq!(targets.len(), 1);
        assert!(matches!(targets[0].kind, TargetKind::Name(ref n) if n == "x"));
        assert!(matches!(value.kind, ExprKind::Binary { .. }));
    }

    #[test]
    fn test_chained_assignment() {
        let stmt = parse_one("a = b = 3");
        let StmtKind::Assign { targets, .. } = stmt.kind else {
            panic!("expected assignment");
        };
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn test_tuple_unpacking() {
        let stmt = parse_one("a, b = pair");
        let StmtKind::Assign { targets, .. } = stmt.kind else {
            panic!("expected assignment");
        };
        assert!(matches!(targets[0].kind, TargetKind::Tuple(ref elems) if elems.len() == 2));
    }

    #[test]
    fn test_starred_target() {
        let stmt = parse_one("first, *rest = xs");
        let StmtKind::Assign { targets, .. } = stmt.kind else {
            panic!("expected assignment");
        };
        let TargetKind::Tuple(elems) = &targets[0].kind else {
            panic!("expected tuple target");
        };
        assert!(matches!(elems[1].kind, TargetKind::Starred(_)));
    }

    #[test]
    fn test_attribute_and_subscript_targets() {
        let stmt = parse_one("obj.field[0] = v");
        let StmtKind::Assign { targets, .. } = stmt.kind else {
            panic!("expected assignment");
        };
        assert_eq!(
            targets[0].as_ref_chain().unwrap().to_string(),
            "obj.field[0]"
        );
    }

    #[test]
    fn test_aug_assignment() {
        let stmt = parse_one("count += 1");
        assert!(matches!(stmt.kind, StmtKind::AugAssign { .. }));
    }

    #[test]
    fn test_kwarg_is_not_assignment() {
        let stmt = parse_one("f(x = 1)");
        let StmtKind::ExprStmt(expr) = stmt.kind else {
            panic!("expected expression statement, got {:?}", stmt.kind);
        };
        let ExprKind::Call { kwargs, args, .. } = expr.kind else {
            panic!("expected call");
        };
        assert!(args.is_empty());
        assert_eq!(kwargs.len(), 1);
        assert_eq!(kwargs[0].0, "x");
    }

    #[test]
    fn test_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let stmt = parse_one("y = 1 + 2 * 3");
        let StmtKind::Assign { value, .. } = stmt.kind else {
            panic!("expected assignment");
        };
        let ExprKind::Binary {
            op: cellflow_ast::BinaryOp::Add,
            right,
            ..
        } = value.kind
        else {
            panic!("expected + at the top");
        };
        assert!(matches!(
            right.kind,
            ExprKind::Binary {
                op: cellflow_ast::BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_power_right_assoc() {
        // 2 ** 3 ** 2 parses as 2 ** (3 ** 2)
        let expr = parse_expression("2 ** 3 ** 2").unwrap();
        let ExprKind::Binary { left, .. } = expr.kind else {
            panic!("expected binary");
        };
        assert!(matches!(left.kind, ExprKind::Int(2)));
    }

    #[test]
    fn test_sigils_in_expression() {
        let expr = parse_expression("$$lst.append(42)").unwrap();
        let chain = expr.as_ref_chain().unwrap();
        assert!(chain.is_cascading_reactive());
        assert_eq!(chain.to_string(), "$$lst.append()");
    }

    #[test]
    fn test_func_def_with_defaults() {
        let stmt = parse_one("def f(a, b = 2) { return a + b }");
        let StmtKind::FuncDef { name, params, body } = stmt.kind else {
            panic!("expected def");
        };
        assert_eq!(name, "f");
        assert_eq!(params.len(), 2);
        assert!(params[1].default.is_some());
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn test_for_over_multiline_block() {
        let source = "total = 0\nfor x in xs {\n    total += x\n}\n";
        let stmts = parse_statements(source).unwrap();
        assert_eq!(stmts.len(), 2);
        assert!(matches!(stmts[1].kind, StmtKind::For { .. }));
    }

    #[test]
    fn test_if_else_chain() {
        let stmt = parse_one("if a { x = 1 } else if b { x = 2 } else { x = 3 }");
        let StmtKind::If { orelse, .. } = stmt.kind else {
            panic!("expected if");
        };
        assert_eq!(orelse.len(), 1);
        assert!(matches!(orelse[0].kind, StmtKind::If { .. }));
    }

    #[test]
    fn test_dict_vs_block() {
        // A brace at expression position is a dict display.
        let stmt = parse_one(r#"d = {"a": 1, "b": 2}"#);
        let StmtKind::Assign { value, .. } = stmt.kind else {
            panic!("expected assignment");
        };
        assert!(matches!(value.kind, ExprKind::Dict(ref entries) if entries.len() == 2));
    }

    #[test]
    fn test_list_comprehension() {
        let expr = parse_expression("[x * 2 for x in xs if x > 0]").unwrap();
        let ExprKind::ListComp { cond, .. } = expr.kind else {
            panic!("expected comprehension");
        };
        assert!(cond.is_some());
    }

    #[test]
    fn test_lambda() {
        let stmt = parse_one("f = lambda a, b: a + b");
        let StmtKind::Assign { value, .. } = stmt.kind else {
            panic!("expected assignment");
        };
        assert!(matches!(value.kind, ExprKind::Lambda { ref params, .. } if params.len() == 2));
    }

    #[test]
    fn test_import_with_alias() {
        let stmt = parse_one("import numpy as np");
        assert!(matches!(
            stmt.kind,
            StmtKind::Import { ref module, ref alias }
                if module == "numpy" && alias.as_deref() == Some("np")
        ));
    }

    #[test]
    fn test_del_statement() {
        let stmt = parse_one("del x, d[0]");
        let StmtKind::Delete(targets) = stmt.kind else {
            panic!("expected del");
        };
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn test_semicolon_separated() {
        let stmts = parse_statements("a = 1; b = 2; a + b").unwrap();
        assert_eq!(stmts.len(), 3);
    }

    #[test]
    fn test_newlines_inside_brackets() {
        let stmts = parse_statements("xs = [\n  1,\n  2,\n]\n").unwrap();
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn test_error_recovery_collects_all() {
        let errors = parse_statements("x = \ny = 1\nz = )").unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_reactive_sigil_name() {
        let expr = parse_expression("$x + 1").unwrap();
        let ExprKind::Binary { left, .. } = expr.kind else {
            panic!("expected binary");
        };
        assert!(
            matches!(left.kind, ExprKind::Name { ref sigil, .. } if *sigil == Sigil::Reactive)
        );
    }

    #[test]
    fn test_statement_spans_slice_source() {
        let source = "a = 1\nb = a + 1";
        let stmts = parse_statements(source).unwrap();
        assert_eq!(&source[stmts[0].span.to_range()], "a = 1");
        assert_eq!(&source[stmts[1].span.to_range()], "b = a + 1");
    }
}

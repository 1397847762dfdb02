//! Recursive-descent parser for mathematical expressions.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := power (('*' | '/') power)*
//! power   := unary ('^' power)?
//! unary   := '-' unary | primary
//! primary := number | variable | func '(' expr ')' | '(' expr ')'
//! ```
//!
//! Unary minus binds tighter than `^`, so `-x^2` is `(-x)^2`; `^` is
//! right-associative.

use super::ast::{BinaryOp, Expr, Func, MAX_DEPTH};
use super::error::{ParseError, ParseErrorKind};
use super::token::{Token, TokenKind};

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    variables: &'a [String],
    depth: usize,
}

impl<'a> Parser<'a> {
    /// `variables` is the declared binding set; any other identifier that is
    /// not a function call is rejected.
    pub fn new(tokens: Vec<Token>, variables: &'a [String]) -> Self {
        Self {
            tokens,
            pos: 0,
            variables,
            depth: 0,
        }
    }

    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        if self.peek().kind == TokenKind::Eof {
            return Err(ParseError::new(
                ParseErrorKind::Empty,
                "empty expression",
                self.peek().pos,
            ));
        }

        let expr = self.parse_expr()?;

        let t = self.peek();
        match t.kind {
            TokenKind::Eof => {}
            TokenKind::RParen => return Err(ParseError::unmatched_paren(t.pos)),
            _ => {
                return Err(ParseError::unexpected_token(
                    format!("unexpected {} after expression", t.kind.describe()),
                    t.pos,
                ))
            }
        }

        if expr.depth() > MAX_DEPTH {
            return Err(ParseError::new(
                ParseErrorKind::DepthExceeded,
                format!("expression tree deeper than {MAX_DEPTH} levels"),
                0,
            ));
        }

        Ok(expr)
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_term()?;
        let mut depth = lhs.depth();
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let op_pos = self.peek().pos;
            self.advance();
            let rhs = self.parse_term()?;
            depth = fold_depth(depth, &rhs, op_pos)?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_power()?;
        let mut depth = lhs.depth();
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => break,
            };
            let op_pos = self.peek().pos;
            self.advance();
            let rhs = self.parse_power()?;
            depth = fold_depth(depth, &rhs, op_pos)?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_unary()?;
        if self.peek().kind == TokenKind::Caret {
            self.advance();
            self.enter()?;
            let exponent = self.parse_power();
            self.depth -= 1;
            return Ok(Expr::binary(BinaryOp::Pow, base, exponent?));
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.peek().kind == TokenKind::Minus {
            self.advance();
            self.enter()?;
            let operand = self.parse_unary();
            self.depth -= 1;
            return Ok(Expr::neg(operand?));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let t = self.peek().clone();
        match t.kind {
            TokenKind::Number(v) => {
                self.advance();
                Ok(Expr::Number(v))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.peek().kind == TokenKind::LParen {
                    let func = Func::from_name(&name).ok_or_else(|| {
                        ParseError::new(
                            ParseErrorKind::UnknownFunction,
                            format!("unknown function '{name}'"),
                            t.pos,
                        )
                    })?;
                    return self.parse_call(func, t.pos);
                }
                if self.variables.iter().any(|v| *v == name) {
                    return Ok(Expr::Variable(name));
                }
                if Func::from_name(&name).is_some() {
                    let next = self.peek();
                    return Err(ParseError::unexpected_token(
                        format!(
                            "expected '(' after function '{name}', got {}",
                            next.kind.describe()
                        ),
                        next.pos,
                    ));
                }
                Err(ParseError::new(
                    ParseErrorKind::UnknownIdentifier,
                    format!("unknown identifier '{name}'"),
                    t.pos,
                ))
            }
            TokenKind::LParen => {
                self.advance();
                self.enter()?;
                let inner = self.parse_expr();
                self.depth -= 1;
                let inner = inner?;
                self.expect_close()?;
                Ok(inner)
            }
            TokenKind::Eof => Err(ParseError::unexpected_token(
                "unexpected end of input, expected an operand",
                t.pos,
            )),
            other => Err(ParseError::unexpected_token(
                format!("expected an operand, got {}", other.describe()),
                t.pos,
            )),
        }
    }

    /// Parse `( arg )` after a function name. Extra arguments are parsed so the
    /// error can report the real count.
    fn parse_call(&mut self, func: Func, func_pos: usize) -> Result<Expr, ParseError> {
        self.advance(); // consume '('
        self.enter()?;
        let result = self.parse_call_args();
        self.depth -= 1;
        let mut args = result?;

        if args.len() != 1 {
            return Err(ParseError::new(
                ParseErrorKind::WrongArgCount,
                format!(
                    "function '{}' takes exactly 1 argument, got {}",
                    func.name(),
                    args.len()
                ),
                func_pos,
            ));
        }
        let arg = args.remove(0);
        Ok(Expr::call(func, arg))
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.peek().kind == TokenKind::RParen {
            self.advance();
            return Ok(args);
        }
        args.push(self.parse_expr()?);
        while self.peek().kind == TokenKind::Comma {
            self.advance();
            args.push(self.parse_expr()?);
        }
        self.expect_close()?;
        Ok(args)
    }

    fn expect_close(&mut self) -> Result<(), ParseError> {
        let t = self.peek();
        match t.kind {
            TokenKind::RParen => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof => Err(ParseError::unmatched_paren(t.pos)),
            _ => Err(ParseError::unexpected_token(
                format!("expected ')', got {}", t.kind.describe()),
                t.pos,
            )),
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            self.depth -= 1;
            return Err(ParseError::new(
                ParseErrorKind::DepthExceeded,
                format!("nesting deeper than {MAX_DEPTH} levels"),
                self.peek().pos,
            ));
        }
        Ok(())
    }

    // --- Utility methods ---

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }
}

/// Depth of `lhs op rhs` given the depth of `lhs`. A left-associative chain
/// grows one level per operator, so the limit is checked while folding
/// rather than on the finished tree.
fn fold_depth(lhs_depth: usize, rhs: &Expr, op_pos: usize) -> Result<usize, ParseError> {
    let depth = 1 + lhs_depth.max(rhs.depth());
    if depth > MAX_DEPTH {
        return Err(ParseError::new(
            ParseErrorKind::DepthExceeded,
            format!("expression tree deeper than {MAX_DEPTH} levels"),
            op_pos,
        ));
    }
    Ok(depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::lexer::Lexer;

    fn parse_with(src: &str, vars: &[&str]) -> Result<Expr, ParseError> {
        let vars: Vec<String> = vars.iter().map(|v| v.to_string()).collect();
        let tokens = Lexer::new(src).tokenize()?;
        Parser::new(tokens, &vars).parse()
    }

    fn parse(src: &str) -> Result<Expr, ParseError> {
        parse_with(src, &["x"])
    }

    #[test]
    fn parse_number_and_variable() {
        assert_eq!(parse("2.5").unwrap(), Expr::Number(2.5));
        assert_eq!(parse("x").unwrap(), Expr::var("x"));
    }

    #[test]
    fn additive_is_left_associative() {
        assert_eq!(parse("x - 1 - 2").unwrap().to_string(), "((x - 1) - 2)");
    }

    #[test]
    fn multiplicative_binds_tighter_than_additive() {
        assert_eq!(parse("1 + x * 2").unwrap().to_string(), "(1 + (x * 2))");
        assert_eq!(parse("x / 2 * 3").unwrap().to_string(), "((x / 2) * 3)");
    }

    #[test]
    fn power_is_right_associative() {
        assert_eq!(parse("2 ^ 3 ^ x").unwrap().to_string(), "(2 ^ (3 ^ x))");
    }

    #[test]
    fn unary_minus_binds_tighter_than_power() {
        assert_eq!(parse("-x ^ 2").unwrap().to_string(), "((-x) ^ 2)");
        assert_eq!(parse("2 ^ -x").unwrap().to_string(), "(2 ^ (-x))");
        assert_eq!(parse("--x").unwrap().to_string(), "(-(-x))");
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(parse("(1 + x) * 2").unwrap().to_string(), "((1 + x) * 2)");
    }

    #[test]
    fn function_calls() {
        let tree = parse("sin(x) * cos(x / 2)").unwrap();
        assert_eq!(tree.to_string(), "(sin(x) * cos((x / 2)))");
        for name in ["sin", "cos", "tan", "exp", "log", "sqrt", "abs", "floor", "ceil"] {
            assert!(parse(&format!("{name}(x)")).is_ok(), "{name} should parse");
        }
    }

    #[test]
    fn display_reparses_to_identical_tree() {
        let tree = parse("exp(-abs(x)) * sin(5*x) - x^2/3").unwrap();
        assert_eq!(parse(&tree.to_string()).unwrap(), tree);
    }

    #[test]
    fn parsing_is_deterministic() {
        let a = parse("sqrt(abs(x)) * sin(2*x)").unwrap();
        let b = parse("sqrt(abs(x)) * sin(2*x)").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn declared_variables_only() {
        assert!(parse_with("x + t", &["x", "t"]).is_ok());
        let err = parse("x + t").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnknownIdentifier);
        assert_eq!(err.pos, 4);
    }

    #[test]
    fn unknown_function() {
        let err = parse("exec(x)").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnknownFunction);
        assert_eq!(err.pos, 0);
    }

    #[test]
    fn function_name_without_call() {
        let err = parse("sin + 1").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken);
        assert_eq!(err.pos, 4);
    }

    #[test]
    fn wrong_argument_count() {
        let err = parse("1 + sin(x, 2)").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::WrongArgCount);
        assert_eq!(err.pos, 4);
        assert!(err.message.contains("got 2"));

        let err = parse("cos()").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::WrongArgCount);
        assert!(err.message.contains("got 0"));
    }

    #[test]
    fn unmatched_open_paren_reports_end_of_input() {
        let err = parse("sin(x").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnmatchedParen);
        assert_eq!(err.pos, 5);

        let err = parse("(x + 1").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnmatchedParen);
        assert_eq!(err.pos, 6);
    }

    #[test]
    fn unmatched_close_paren() {
        let err = parse("x + 1)").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnmatchedParen);
        assert_eq!(err.pos, 5);
    }

    #[test]
    fn dangling_operator() {
        let err = parse("x +").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken);
        assert_eq!(err.pos, 3);
    }

    #[test]
    fn adjacent_operands_rejected() {
        let err = parse("2 x").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken);
        assert_eq!(err.pos, 2);
    }

    #[test]
    fn empty_expression() {
        assert_eq!(parse("").unwrap_err().kind, ParseErrorKind::Empty);
        assert_eq!(parse("  ").unwrap_err().kind, ParseErrorKind::Empty);
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let src = format!("{}x{}", "(".repeat(200), ")".repeat(200));
        let err = parse(&src).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::DepthExceeded);

        let src = format!("{}x", "-".repeat(500));
        assert_eq!(parse(&src).unwrap_err().kind, ParseErrorKind::DepthExceeded);
    }

    #[test]
    fn long_flat_chain_exceeding_tree_depth_is_rejected() {
        let src = vec!["x"; MAX_DEPTH + 5].join(" + ");
        assert_eq!(parse(&src).unwrap_err().kind, ParseErrorKind::DepthExceeded);
    }

    #[test]
    fn huge_flat_chains_fail_without_building_the_tree() {
        for op in [" + ", " - ", " * ", " / "] {
            let src = vec!["x"; 20_000].join(op);
            let err = parse(&src).unwrap_err();
            assert_eq!(err.kind, ParseErrorKind::DepthExceeded, "{op}");
        }
        let src = vec!["x"; 200_000].join("+");
        assert_eq!(parse(&src).unwrap_err().kind, ParseErrorKind::DepthExceeded);
    }

    #[test]
    fn chain_at_the_limit_parses() {
        // MAX_DEPTH - 1 operators fold into a tree exactly MAX_DEPTH deep.
        let src = vec!["x"; MAX_DEPTH].join(" + ");
        assert_eq!(parse(&src).unwrap().depth(), MAX_DEPTH);
    }

    #[test]
    fn moderate_nesting_is_fine() {
        let src = format!("{}x{}", "sin(".repeat(20), ")".repeat(20));
        assert_eq!(parse(&src).unwrap().depth(), 21);
    }
}

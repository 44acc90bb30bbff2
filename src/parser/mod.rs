//! Recursive-descent parser: token stream to AST.
//!
//! Grammar (informal):
//!
//! ```text
//! program     := list EOF
//! list        := and_or ( (';' | newline) and_or )*
//! and_or      := pipeline ( ('&&' | '||') pipeline )*
//! pipeline    := command ( '|' command )*
//! command     := simple_cmd | compound
//! compound    := if | for | while | until | case | '{' list '}' | '(' list ')'
//! simple_cmd  := assignment* ( word | redirect )+
//! ```
//!
//! `'{' list '}'` and `'(' list ')'` both just group a list for
//! precedence; true subshell isolation is out of scope, so both forms
//! return the inner list's AST directly rather than a wrapper node.

mod arith;

use crate::ast::{AstNode, DoubleQuotedPart, Redirect, RedirectMode, RedirectTarget, Token, WordNode};
use crate::errors::ParseError;
use crate::lexer::lex;

pub fn parse(tokens: Vec<Token>) -> Result<AstNode, ParseError> {
    Parser { tokens, pos: 0 }.parse_program()
}

/// Lexes and parses a full source string in one call.
pub fn parse_source(source: &str) -> Result<AstNode, ParseError> {
    let tokens = lex(source).map_err(|e| ParseError::new(e.to_string(), Default::default()))?;
    parse(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Token {
        self.tokens[self.pos].clone()
    }

    fn peek_at(&self, k: usize) -> Token {
        let idx = (self.pos + k).min(self.tokens.len() - 1);
        self.tokens[idx].clone()
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn unexpected(&self) -> ParseError {
        ParseError::new(describe(&self.peek()), Default::default())
    }

    fn expect_kind(&mut self, want: &Token) -> Result<(), ParseError> {
        if std::mem::discriminant(&self.peek()) == std::mem::discriminant(want) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), Token::Newline) {
            self.advance();
        }
    }

    fn at_end(&self) -> bool {
        matches!(self.peek(), Token::EndOfInput)
    }

    fn at_double_semicolon(&self) -> bool {
        matches!(self.peek(), Token::Semicolon) && matches!(self.peek_at(1), Token::Semicolon)
    }

    // -- program / list / and_or / pipeline ---------------------------

    fn parse_program(&mut self) -> Result<AstNode, ParseError> {
        let node = self.parse_list(&|t| matches!(t, Token::EndOfInput))?;
        self.expect_kind(&Token::EndOfInput)?;
        Ok(node)
    }

    fn parse_list(&mut self, stop: &dyn Fn(&Token) -> bool) -> Result<AstNode, ParseError> {
        self.skip_newlines();
        if stop(&self.peek()) || self.at_end() {
            return Ok(AstNode::Empty);
        }
        let mut node = self.parse_and_or()?;
        loop {
            match self.peek() {
                Token::Semicolon => {
                    self.advance();
                }
                Token::Newline => {
                    self.advance();
                    self.skip_newlines();
                }
                _ => break,
            }
            self.skip_newlines();
            if stop(&self.peek()) || self.at_end() {
                break;
            }
            let rhs = self.parse_and_or()?;
            node = AstNode::Sequence { left: Box::new(node), right: Box::new(rhs) };
        }
        Ok(node)
    }

    fn parse_and_or(&mut self) -> Result<AstNode, ParseError> {
        let mut node = self.parse_pipeline()?;
        loop {
            match self.peek() {
                Token::And => {
                    self.advance();
                    self.skip_newlines();
                    let rhs = self.parse_pipeline()?;
                    node = AstNode::And { left: Box::new(node), right: Box::new(rhs) };
                }
                Token::Or => {
                    self.advance();
                    self.skip_newlines();
                    let rhs = self.parse_pipeline()?;
                    node = AstNode::Or { left: Box::new(node), right: Box::new(rhs) };
                }
                _ => break,
            }
        }
        Ok(node)
    }

    fn parse_pipeline(&mut self) -> Result<AstNode, ParseError> {
        let mut stages = vec![self.parse_command()?];
        while matches!(self.peek(), Token::Pipe) {
            self.advance();
            self.skip_newlines();
            stages.push(self.parse_command()?);
        }
        if stages.len() == 1 {
            Ok(stages.pop().unwrap())
        } else {
            Ok(AstNode::Pipeline { stages })
        }
    }

    // -- commands -------------------------------------------------------

    fn parse_command(&mut self) -> Result<AstNode, ParseError> {
        match self.peek() {
            Token::If => self.parse_if(),
            Token::For => self.parse_for(),
            Token::While => self.parse_while(false),
            Token::Until => self.parse_while(true),
            Token::Case => self.parse_case(),
            Token::LBrace => {
                self.advance();
                let body = self.parse_list(&|t| matches!(t, Token::RBrace))?;
                self.expect_kind(&Token::RBrace)?;
                Ok(body)
            }
            Token::LParen => {
                self.advance();
                let body = self.parse_list(&|t| matches!(t, Token::RParen))?;
                self.expect_kind(&Token::RParen)?;
                Ok(body)
            }
            Token::Break => {
                self.advance();
                Ok(AstNode::Break { level: self.parse_optional_level()? })
            }
            Token::Continue => {
                self.advance();
                Ok(AstNode::Continue { level: self.parse_optional_level()? })
            }
            _ => self.parse_simple_command(),
        }
    }

    fn parse_optional_level(&mut self) -> Result<WordNode, ParseError> {
        if is_word_token(&self.peek()) {
            let tok = self.advance();
            token_to_word(tok)
        } else {
            Ok(WordNode::Literal("1".to_string()))
        }
    }

    fn parse_if(&mut self) -> Result<AstNode, ParseError> {
        self.advance(); // if
        let mut branches = Vec::new();
        let cond = self.parse_list(&|t| matches!(t, Token::Then))?;
        self.expect_kind(&Token::Then)?;
        let body = self.parse_list(&|t| matches!(t, Token::Elif | Token::Else | Token::Fi))?;
        branches.push((cond, body));
        while matches!(self.peek(), Token::Elif) {
            self.advance();
            let cond = self.parse_list(&|t| matches!(t, Token::Then))?;
            self.expect_kind(&Token::Then)?;
            let body = self.parse_list(&|t| matches!(t, Token::Elif | Token::Else | Token::Fi))?;
            branches.push((cond, body));
        }
        let else_body = if matches!(self.peek(), Token::Else) {
            self.advance();
            Some(Box::new(self.parse_list(&|t| matches!(t, Token::Fi))?))
        } else {
            None
        };
        self.expect_kind(&Token::Fi)?;
        Ok(AstNode::If { branches, else_body })
    }

    fn parse_for(&mut self) -> Result<AstNode, ParseError> {
        self.advance(); // for
        let var_name = match self.advance() {
            Token::Word(name) => name,
            _ => return Err(self.unexpected()),
        };
        self.expect_kind(&Token::In)?;
        let mut items = Vec::new();
        while is_word_token(&self.peek()) {
            let tok = self.advance();
            items.push(token_to_word(tok)?);
        }
        match self.peek() {
            Token::Semicolon => {
                self.advance();
            }
            Token::Newline => {
                self.advance();
                self.skip_newlines();
            }
            _ => return Err(self.unexpected()),
        }
        self.expect_kind(&Token::Do)?;
        let body = self.parse_list(&|t| matches!(t, Token::Done))?;
        self.expect_kind(&Token::Done)?;
        Ok(AstNode::For { var_name, items, body: Box::new(body) })
    }

    fn parse_while(&mut self, until: bool) -> Result<AstNode, ParseError> {
        self.advance(); // while / until
        let condition = self.parse_list(&|t| matches!(t, Token::Do))?;
        self.expect_kind(&Token::Do)?;
        let body = self.parse_list(&|t| matches!(t, Token::Done))?;
        self.expect_kind(&Token::Done)?;
        let condition = Box::new(condition);
        let body = Box::new(body);
        Ok(if until { AstNode::Until { condition, body } } else { AstNode::While { condition, body } })
    }

    fn parse_case(&mut self) -> Result<AstNode, ParseError> {
        self.advance(); // case
        let subject_tok = self.advance();
        if !is_word_token(&subject_tok) {
            return Err(self.unexpected());
        }
        let subject = token_to_word(subject_tok)?;
        self.expect_kind(&Token::In)?;
        self.skip_newlines();
        let mut arms = Vec::new();
        while !matches!(self.peek(), Token::Esac) {
            if matches!(self.peek(), Token::LParen) {
                self.advance();
            }
            let first_tok = self.advance();
            if !is_word_token(&first_tok) {
                return Err(self.unexpected());
            }
            let mut patterns = vec![token_to_word(first_tok)?];
            while matches!(self.peek(), Token::Pipe) {
                self.advance();
                let tok = self.advance();
                patterns.push(token_to_word(tok)?);
            }
            self.expect_kind(&Token::RParen)?;
            self.skip_newlines();
            let body = self.parse_case_body()?;
            arms.push((patterns, body));
            self.skip_newlines();
        }
        self.expect_kind(&Token::Esac)?;
        Ok(AstNode::Case { subject, arms })
    }

    fn parse_case_body(&mut self) -> Result<AstNode, ParseError> {
        self.skip_newlines();
        if self.at_double_semicolon() || matches!(self.peek(), Token::Esac) {
            return Ok(AstNode::Empty);
        }
        let mut node = self.parse_and_or()?;
        loop {
            self.skip_newlines();
            if self.at_double_semicolon() {
                self.advance();
                self.advance();
                break;
            }
            if matches!(self.peek(), Token::Esac) {
                break;
            }
            match self.peek() {
                Token::Semicolon => {
                    self.advance();
                    self.skip_newlines();
                    if self.at_double_semicolon() {
                        self.advance();
                        self.advance();
                        break;
                    }
                    if matches!(self.peek(), Token::Esac) {
                        break;
                    }
                }
                Token::Newline => {
                    self.advance();
                    self.skip_newlines();
                }
                _ => return Err(self.unexpected()),
            }
            let rhs = self.parse_and_or()?;
            node = AstNode::Sequence { left: Box::new(node), right: Box::new(rhs) };
        }
        Ok(node)
    }

    fn parse_simple_command(&mut self) -> Result<AstNode, ParseError> {
        let mut assignments = Vec::new();
        let mut words = Vec::new();
        let mut redirects = Vec::new();

        loop {
            match self.peek() {
                Token::Assignment(name, value) => {
                    self.advance();
                    assignments.push((name, WordNode::Unquoted(value)));
                }
                Token::MergedCluster(ref parts) if matches!(parts.first(), Some(Token::Assignment(_, _))) => {
                    let parts = parts.clone();
                    self.advance();
                    assignments.push(assignment_from_cluster(parts)?);
                }
                _ => break,
            }
        }

        loop {
            match self.peek() {
                Token::Redirect(_) | Token::Heredoc { .. } => {
                    redirects.push(self.parse_redirect()?);
                }
                t if is_word_token(&t) => {
                    self.advance();
                    words.push(token_to_word(t)?);
                }
                _ => break,
            }
        }

        if words.is_empty() && assignments.is_empty() && redirects.is_empty() {
            return Err(self.unexpected());
        }

        Ok(AstNode::Command { words, assignments, redirects })
    }

    fn parse_redirect(&mut self) -> Result<Redirect, ParseError> {
        match self.advance() {
            Token::Redirect(RedirectMode::ErrToOut) => {
                Ok(Redirect { mode: RedirectMode::ErrToOut, target: RedirectTarget::FdDup { from_fd: 2, to_fd: 1 } })
            }
            Token::Redirect(RedirectMode::OutToErr) => {
                Ok(Redirect { mode: RedirectMode::OutToErr, target: RedirectTarget::FdDup { from_fd: 1, to_fd: 2 } })
            }
            Token::Redirect(mode) => {
                let word_tok = self.advance();
                if !is_word_token(&word_tok) {
                    return Err(self.unexpected());
                }
                Ok(Redirect { mode, target: RedirectTarget::Word(token_to_word(word_tok)?) })
            }
            Token::Heredoc { content, expand } => {
                Ok(Redirect { mode: RedirectMode::In, target: RedirectTarget::HeredocContent { content, expand } })
            }
            _ => Err(self.unexpected()),
        }
    }
}

fn is_word_token(token: &Token) -> bool {
    matches!(
        token,
        Token::Word(_)
            | Token::SingleQuoted(_)
            | Token::DoubleQuoted(_)
            | Token::Variable(_)
            | Token::Substitution(_)
            | Token::Arithmetic(_)
            | Token::Glob(_)
            | Token::MergedCluster(_)
            | Token::Assignment(_, _)
    )
}

fn assignment_from_cluster(parts: Vec<Token>) -> Result<(String, WordNode), ParseError> {
    let mut iter = parts.into_iter();
    let (name, value) = match iter.next().unwrap() {
        Token::Assignment(name, value) => (name, value),
        _ => unreachable!("caller already checked first element is Assignment"),
    };
    let mut pieces = Vec::new();
    if !value.is_empty() {
        pieces.push(WordNode::Unquoted(value));
    }
    for part in iter {
        pieces.push(token_to_word(part)?);
    }
    let value_node = match pieces.len() {
        0 => WordNode::Literal(String::new()),
        1 => pieces.pop().unwrap(),
        _ => WordNode::Concat(pieces),
    };
    Ok((name, value_node))
}

fn token_to_word(token: Token) -> Result<WordNode, ParseError> {
    match token {
        Token::Word(s) => Ok(WordNode::Unquoted(s)),
        Token::SingleQuoted(s) => Ok(WordNode::Literal(s)),
        Token::Glob(s) => Ok(WordNode::Glob(s)),
        Token::Variable(name) => Ok(WordNode::Variable(name)),
        Token::Substitution(src) => {
            let ast = parse_source(&src)?;
            Ok(WordNode::Substitution(Box::new(ast)))
        }
        Token::Arithmetic(src) => Ok(WordNode::Arithmetic(arith::parse_arith(&src)?)),
        Token::DoubleQuoted(parts) => {
            let mut nodes = Vec::with_capacity(parts.len());
            for part in parts {
                nodes.push(match part {
                    DoubleQuotedPart::Literal(s) => WordNode::Literal(s),
                    DoubleQuotedPart::Variable(name) => WordNode::Variable(name),
                    DoubleQuotedPart::Substitution(src) => WordNode::Substitution(Box::new(parse_source(&src)?)),
                    DoubleQuotedPart::Arithmetic(src) => WordNode::Arithmetic(arith::parse_arith(&src)?),
                });
            }
            let inner = if nodes.len() == 1 {
                nodes.pop().unwrap()
            } else if nodes.is_empty() {
                WordNode::Literal(String::new())
            } else {
                WordNode::Concat(nodes)
            };
            Ok(WordNode::Quoted(Box::new(inner)))
        }
        Token::MergedCluster(parts) => {
            let nodes = parts.into_iter().map(token_to_word).collect::<Result<Vec<_>, _>>()?;
            Ok(WordNode::Concat(nodes))
        }
        Token::Assignment(name, value) => Ok(WordNode::Unquoted(format!("{name}={value}"))),
        other => Err(ParseError::new(describe(&other), Default::default())),
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::EndOfInput => "end of input".to_string(),
        Token::Word(w) => w.clone(),
        Token::Newline => "newline".to_string(),
        other => format!("{other:?}"),
    }
}

//! Recursive descent parser for the surface syntax
//!
//! Statement sequences are parsed front to back, but each statement node
//! is only constructed after the rest of its sequence, so a node always
//! carries its already-built syntactic successor. Labels register
//! themselves in the program's label index the moment their statement is
//! added.
//!
//! # Module Structure
//!
//! - `cursor` - Token stream navigation and lookahead
//! - `error` - Error types with source location tracking

pub mod cursor;
pub mod error;

pub use cursor::TokenCursor;
pub use error::{ParseError, ParseResult};

use std::rc::Rc;

use crate::ast::{AExp, ClassDef, PrimOp, Program, StmtId, StmtKind};
use crate::lexer::{SpannedToken, Token};

pub struct Parser {
    cursor: TokenCursor,
}

impl Parser {
    pub fn new(tokens: Vec<SpannedToken>) -> Self {
        Self {
            cursor: TokenCursor::new(tokens),
        }
    }

    /// Parse a whole source file into a fresh program. Returns the
    /// program together with the class names in declaration order.
    pub fn parse_program(mut self) -> ParseResult<(Program, Vec<String>)> {
        let mut program = Program::new();
        let classes = self.parse_into(&mut program)?;
        Ok((program, classes))
    }

    /// Parse a source file into an existing program, so several files can
    /// share one class table and statement arena. Returns the class names
    /// in declaration order.
    pub fn parse_into(&mut self, program: &mut Program) -> ParseResult<Vec<String>> {
        let mut classes = Vec::new();
        while self.cursor.match_token(&Token::Class) {
            classes.push(self.class_def(program)?);
        }
        if !self.cursor.is_at_end() {
            return Err(self.cursor.unexpected("a class definition"));
        }
        Ok(classes)
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    /// class-def ::= 'class' Id 'extends' Id '{' field-def* method-def* '}'
    fn class_def(&mut self, program: &mut Program) -> ParseResult<String> {
        let name = self.ident("a class name")?;
        self.cursor.consume(Token::Extends)?;
        let parent = self.ident("a parent class name")?;
        let mut class = ClassDef::new(name.clone(), Some(parent));

        self.cursor.consume(Token::LBrace)?;

        // field-def ::= 'var' Id ';'
        while self.cursor.match_token(&Token::Var) {
            let field = self.ident("a field name")?;
            self.cursor.consume(Token::Semicolon)?;
            class.add_field(field);
        }

        // method-def ::= 'def' Id '(' names ')' '{' stmt* '}'
        while self.cursor.match_token(&Token::Def) {
            let method = self.ident("a method name")?;
            let formals = self.names()?;
            self.cursor.consume(Token::LBrace)?;
            let body = self.stmt_seq(program)?;
            self.cursor.consume(Token::RBrace)?;
            class.add_method(method, formals, body);
        }

        self.cursor.consume(Token::RBrace)?;
        program.add_class(class);
        Ok(name)
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Parse a statement sequence, handing back the entry statement.
    /// The sequence ends at the first token that cannot begin a statement.
    fn stmt_seq(&mut self, program: &mut Program) -> ParseResult<Option<StmtId>> {
        let kind = match self.stmt_kind()? {
            Some(kind) => kind,
            None => return Ok(None),
        };
        let rest = self.stmt_seq(program)?;
        Ok(Some(program.add_stmt(kind, rest)))
    }

    /// One statement, or `None` when the current token cannot begin one.
    fn stmt_kind(&mut self) -> ParseResult<Option<StmtKind>> {
        let kind = match self.cursor.peek() {
            Token::Print => {
                self.cursor.advance();
                let args = self.aexps()?;
                self.cursor.consume(Token::Semicolon)?;
                StmtKind::Print(args)
            }

            Token::Label => {
                self.cursor.advance();
                let label = self.ident("a label name")?;
                self.cursor.consume(Token::Colon)?;
                StmtKind::Label(label)
            }

            Token::Skip => {
                self.cursor.advance();
                self.cursor.consume(Token::Semicolon)?;
                StmtKind::Skip
            }

            Token::Goto => {
                self.cursor.advance();
                let label = self.ident("a label name")?;
                self.cursor.consume(Token::Semicolon)?;
                StmtKind::Goto(label)
            }

            Token::If => {
                self.cursor.advance();
                let cond = self.aexp()?;
                self.cursor.consume(Token::Goto)?;
                let target = self.ident("a label name")?;
                self.cursor.consume(Token::Semicolon)?;
                StmtKind::If { cond, target }
            }

            Token::Return => {
                self.cursor.advance();
                let result = self.aexp()?;
                self.cursor.consume(Token::Semicolon)?;
                StmtKind::Return(result)
            }

            Token::PushHandler => {
                self.cursor.advance();
                let class_name = self.ident("an exception class name")?;
                let label = self.ident("a label name")?;
                self.cursor.consume(Token::Semicolon)?;
                StmtKind::PushHandler { class_name, label }
            }

            Token::PopHandler => {
                self.cursor.advance();
                self.cursor.consume(Token::Semicolon)?;
                StmtKind::PopHandler
            }

            Token::Throw => {
                self.cursor.advance();
                let exception = self.aexp()?;
                self.cursor.consume(Token::Semicolon)?;
                StmtKind::Throw(exception)
            }

            Token::MoveException => {
                self.cursor.advance();
                let register = self.name("a register name")?;
                self.cursor.consume(Token::Semicolon)?;
                StmtKind::MoveException(register)
            }

            // `$r := ...` -- an assignment of an expression, an
            // allocation, or an invocation. A register expression can
            // also begin a statementless context, so only the `:=`
            // lookahead commits us.
            Token::Name(_) if self.cursor.peek_next() == &Token::Assign => {
                let lhs = self.name("a register name")?;
                self.cursor.consume(Token::Assign)?;
                let kind = self.assignment_rhs(lhs)?;
                self.cursor.consume(Token::Semicolon)?;
                kind
            }

            _ => return Ok(None),
        };

        Ok(Some(kind))
    }

    /// What follows `$r :=` -- `new C`, `invoke ...`, or an atomic
    /// expression.
    fn assignment_rhs(&mut self, lhs: String) -> ParseResult<StmtKind> {
        match self.cursor.peek() {
            Token::New => {
                self.cursor.advance();
                let class_name = self.ident("a class name")?;
                Ok(StmtKind::New { lhs, class_name })
            }

            Token::Invoke => {
                self.cursor.advance();
                if self.cursor.match_token(&Token::Super) {
                    self.cursor.consume(Token::Dot)?;
                    let method = self.ident("a method name")?;
                    let args = self.aexps()?;
                    Ok(StmtKind::InvokeSuper { lhs, method, args })
                } else {
                    let object = self.aexp()?;
                    self.cursor.consume(Token::Dot)?;
                    let method = self.ident("a method name")?;
                    let args = self.aexps()?;
                    Ok(StmtKind::Invoke {
                        lhs,
                        object,
                        method,
                        args,
                    })
                }
            }

            _ => {
                let rhs = self.aexp()?;
                Ok(StmtKind::AssignAExp { lhs, rhs })
            }
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// aexp ::= aexp' ('.' Id)?
    fn aexp(&mut self) -> ParseResult<AExp> {
        let base = self.aexp_prime()?;
        if self.cursor.match_token(&Token::Dot) {
            let field = self.ident("a field name")?;
            return Ok(AExp::Field(Rc::new(base), field));
        }
        Ok(base)
    }

    fn aexp_prime(&mut self) -> ParseResult<AExp> {
        let exp = match self.cursor.peek() {
            Token::This => {
                self.cursor.advance();
                AExp::This
            }
            Token::True => {
                self.cursor.advance();
                AExp::Bool(true)
            }
            Token::False => {
                self.cursor.advance();
                AExp::Bool(false)
            }
            Token::Null => {
                self.cursor.advance();
                AExp::Null
            }
            Token::Void => {
                self.cursor.advance();
                AExp::Void
            }
            Token::Name(register) => {
                let register = register.clone();
                self.cursor.advance();
                AExp::Register(register)
            }
            Token::Int(value) => {
                let value = *value;
                self.cursor.advance();
                AExp::Int(value)
            }
            Token::Plus | Token::Minus | Token::Star | Token::Eq => {
                let op = match self.cursor.peek() {
                    Token::Plus => PrimOp::Add,
                    Token::Minus => PrimOp::Sub,
                    Token::Star => PrimOp::Mul,
                    _ => PrimOp::Eq,
                };
                self.cursor.advance();
                let args = self.aexps()?;
                AExp::Atomic(op, args)
            }
            Token::InstanceOf => {
                self.cursor.advance();
                self.cursor.consume(Token::LParen)?;
                let object = self.aexp()?;
                self.cursor.consume(Token::Comma)?;
                let class_name = self.ident("a class name")?;
                self.cursor.consume(Token::RParen)?;
                AExp::InstanceOf(Rc::new(object), class_name)
            }
            _ => return Err(self.cursor.unexpected("an expression")),
        };
        Ok(exp)
    }

    /// '(' (aexp (',' aexp)*)? ')'
    fn aexps(&mut self) -> ParseResult<Vec<AExp>> {
        self.cursor.consume(Token::LParen)?;
        let mut args = Vec::new();
        if self.cursor.match_token(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.aexp()?);
            if self.cursor.match_token(&Token::RParen) {
                break;
            }
            self.cursor.consume(Token::Comma)?;
        }
        Ok(args)
    }

    /// '(' ($name (',' $name)*)? ')'
    fn names(&mut self) -> ParseResult<Vec<String>> {
        self.cursor.consume(Token::LParen)?;
        let mut names = Vec::new();
        if self.cursor.match_token(&Token::RParen) {
            return Ok(names);
        }
        loop {
            names.push(self.name("a register name")?);
            if self.cursor.match_token(&Token::RParen) {
                break;
            }
            self.cursor.consume(Token::Comma)?;
        }
        Ok(names)
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    fn ident(&mut self, expected: &str) -> ParseResult<String> {
        if let Token::Ident(name) = self.cursor.peek() {
            let name = name.clone();
            self.cursor.advance();
            Ok(name)
        } else {
            Err(self.cursor.unexpected(expected))
        }
    }

    fn name(&mut self, expected: &str) -> ParseResult<String> {
        if let Token::Name(name) = self.cursor.peek() {
            let name = name.clone();
            self.cursor.advance();
            Ok(name)
        } else {
            Err(self.cursor.unexpected(expected))
        }
    }
}

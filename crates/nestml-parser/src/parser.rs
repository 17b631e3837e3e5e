use nestml_core::{Diagnostic, SourceRange};
use nestml_lexer::{Keyword, Token, TokenKind};

use crate::ast::*;

/// Parse a token stream (as produced by [`nestml_lexer::lex`]) into a list of
/// top-level models. Recovery: on a malformed declaration or statement, the
/// parser reports an ERROR diagnostic and skips tokens until the next
/// newline or block-closing `end`, then resumes — so one bad line doesn't
/// swallow the rest of the file (spec.md §7's "best effort" contract).
pub fn parse_models(tokens: Vec<Token>) -> (Vec<Model>, Vec<Diagnostic>) {
    let mut parser = Parser::new(tokens);
    let models = parser.parse_all();
    (models, parser.diagnostics)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    // --- token stream helpers -------------------------------------------------

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn range(&self) -> SourceRange {
        self.current().range
    }

    fn at_eof(&self) -> bool {
        matches!(self.kind(), TokenKind::Eof)
    }

    fn bump(&mut self) -> Token {
        let tok = self.current().clone();
        if !matches!(tok.kind, TokenKind::Eof) {
            self.pos += 1;
        }
        tok
    }

    fn skip_newlines(&mut self) {
        while matches!(self.kind(), TokenKind::Newline) {
            self.bump();
        }
    }

    fn skip_terminators(&mut self) {
        while matches!(self.kind(), TokenKind::Newline | TokenKind::Colon) {
            self.bump();
        }
    }

    fn check_keyword(&self, kw: Keyword) -> bool {
        matches!(self.kind(), TokenKind::Keyword(k) if *k == kw)
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if self.check_keyword(kw) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, kw: Keyword, what: &str) -> Option<SourceRange> {
        if self.check_keyword(kw) {
            Some(self.bump().range)
        } else {
            self.error_here("ParseExpectedToken", format!("expected {what}"));
            None
        }
    }

    fn error_here(&mut self, code: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error(code, self.range(), message.into()));
    }

    fn identifier(&mut self) -> Option<(String, SourceRange)> {
        if let TokenKind::Identifier(name) = self.kind().clone() {
            let range = self.range();
            self.bump();
            Some((name, range))
        } else {
            self.error_here("ParseExpectedIdentifier", "expected identifier");
            None
        }
    }

    /// Skip to the next statement/declaration boundary: a newline, the
    /// `end` keyword, or EOF.
    fn synchronize_line(&mut self) {
        while !self.at_eof() && !matches!(self.kind(), TokenKind::Newline) && !self.check_keyword(Keyword::End) {
            self.bump();
        }
        self.skip_newlines();
    }

    /// Skip to the next `neuron`/`synapse` keyword or EOF, used when an
    /// entire model fails to parse.
    fn synchronize_model(&mut self) {
        while !self.at_eof() && !self.check_keyword(Keyword::Neuron) && !self.check_keyword(Keyword::Synapse) {
            self.bump();
        }
    }

    fn optional_docstring(&mut self) -> Option<String> {
        self.skip_newlines();
        if let TokenKind::Docstring(text) = self.kind().clone() {
            self.bump();
            self.skip_newlines();
            Some(text)
        } else {
            None
        }
    }

    // --- top level -------------------------------------------------------------

    fn parse_all(&mut self) -> Vec<Model> {
        let mut models = Vec::new();
        self.skip_newlines();
        while !self.at_eof() {
            if self.check_keyword(Keyword::Neuron) {
                models.push(Model::Neuron(self.parse_neuron()));
            } else if self.check_keyword(Keyword::Synapse) {
                models.push(Model::Synapse(self.parse_synapse()));
            } else {
                self.error_here("ParseExpectedModel", "expected `neuron` or `synapse`");
                self.synchronize_model();
            }
            self.skip_newlines();
        }
        models
    }

    fn parse_neuron(&mut self) -> Neuron {
        let start = self.range();
        self.bump(); // `neuron`
        let name = self.identifier().map(|(n, _)| n).unwrap_or_else(|| "<error>".to_string());
        self.skip_terminators();
        let docstring = self.optional_docstring();
        let mut blocks = Vec::new();
        while !self.at_eof() && !self.check_keyword(Keyword::End) {
            if self.check_keyword(Keyword::Neuron) || self.check_keyword(Keyword::Synapse) {
                self.error_here("ParseMissingEnd", "missing `end` before next model");
                break;
            }
            match self.parse_block(false) {
                Some(block) => blocks.push(block),
                None => self.synchronize_line(),
            }
            self.skip_newlines();
        }
        let end_range = if self.check_keyword(Keyword::End) {
            self.bump().range
        } else {
            self.range()
        };
        Neuron {
            name,
            docstring,
            blocks,
            range: SourceRange::new(start.start, end_range.end),
        }
    }

    fn parse_synapse(&mut self) -> Synapse {
        let start = self.range();
        self.bump(); // `synapse`
        let name = self.identifier().map(|(n, _)| n).unwrap_or_else(|| "<error>".to_string());
        self.skip_terminators();
        let docstring = self.optional_docstring();
        let mut blocks = Vec::new();
        while !self.at_eof() && !self.check_keyword(Keyword::End) {
            if self.check_keyword(Keyword::Neuron) || self.check_keyword(Keyword::Synapse) {
                self.error_here("ParseMissingEnd", "missing `end` before next model");
                break;
            }
            match self.parse_block(true) {
                Some(block) => blocks.push(block),
                None => self.synchronize_line(),
            }
            self.skip_newlines();
        }
        let end_range = if self.check_keyword(Keyword::End) {
            self.bump().range
        } else {
            self.range()
        };
        Synapse {
            name,
            docstring,
            blocks,
            range: SourceRange::new(start.start, end_range.end),
        }
    }

    fn parse_block(&mut self, in_synapse: bool) -> Option<Block> {
        self.skip_newlines();
        let block = if self.check_keyword(Keyword::State) {
            self.bump();
            Block::State(self.parse_declarations())
        } else if self.check_keyword(Keyword::Parameters) {
            self.bump();
            Block::Parameters(self.parse_declarations())
        } else if self.check_keyword(Keyword::Internals) {
            self.bump();
            Block::Internals(self.parse_declarations())
        } else if self.check_keyword(Keyword::InitialValues) {
            self.bump();
            Block::InitialValues(self.parse_declarations())
        } else if self.check_keyword(Keyword::Equations) {
            self.bump();
            Block::Equations(self.parse_equations())
        } else if self.check_keyword(Keyword::Input) {
            self.bump();
            Block::Input(self.parse_input_ports())
        } else if self.check_keyword(Keyword::Output) {
            self.bump();
            Block::Output(self.parse_output_port())
        } else if self.check_keyword(Keyword::Update) {
            self.bump();
            Block::Update(self.parse_statements_until_end())
        } else if self.check_keyword(Keyword::Function) {
            Block::Function(self.parse_function())
        } else if in_synapse && self.at_identifier_text("pre_spike") {
            self.bump();
            Block::PreSpike(self.parse_statements_until_end())
        } else if in_synapse && self.at_identifier_text("post_spike") {
            self.bump();
            Block::PostSpike(self.parse_statements_until_end())
        } else {
            self.error_here("ParseUnknownBlock", "unrecognized block keyword");
            return None;
        };
        Some(block)
    }

    fn at_identifier_text(&self, text: &str) -> bool {
        matches!(self.kind(), TokenKind::Identifier(s) if s == text)
    }

    // --- declarations ------------------------------------------------------------

    fn parse_declarations(&mut self) -> Vec<Declaration> {
        self.skip_terminators();
        let mut decls = Vec::new();
        while !self.at_eof() && !self.is_block_boundary() {
            let docstring = self.optional_docstring();
            match self.parse_declaration(docstring) {
                Some(decl) => decls.push(decl),
                None => {
                    self.synchronize_line();
                    continue;
                }
            }
            self.skip_newlines();
        }
        decls
    }

    fn is_block_boundary(&self) -> bool {
        self.check_keyword(Keyword::End)
            || self.check_keyword(Keyword::State)
            || self.check_keyword(Keyword::Parameters)
            || self.check_keyword(Keyword::Internals)
            || self.check_keyword(Keyword::InitialValues)
            || self.check_keyword(Keyword::Equations)
            || self.check_keyword(Keyword::Input)
            || self.check_keyword(Keyword::Output)
            || self.check_keyword(Keyword::Update)
            || self.check_keyword(Keyword::Function)
            || self.check_keyword(Keyword::Neuron)
            || self.check_keyword(Keyword::Synapse)
    }

    fn parse_declaration(&mut self, docstring: Option<String>) -> Option<Declaration> {
        let start = self.range();
        let recordable = self.eat_keyword(Keyword::Recordable);
        let is_function = self.eat_keyword(Keyword::Function);
        let (name, _) = self.identifier()?;

        let array_size = if matches!(self.kind(), TokenKind::LBracket) {
            self.bump();
            let size = self.parse_expr()?;
            if matches!(self.kind(), TokenKind::RBracket) {
                self.bump();
            } else {
                self.error_here("ParseExpectedToken", "expected `]`");
            }
            Some(size)
        } else {
            None
        };

        let type_name = self.parse_physical_type()?;

        let initializer = if matches!(self.kind(), TokenKind::Assign) {
            self.bump();
            self.parse_expr()
        } else {
            None
        };

        let end = self.range();
        Some(Declaration {
            name,
            array_size,
            type_name,
            initializer,
            recordable,
            is_function,
            docstring,
            range: SourceRange::new(start.start, end.end),
        })
    }

    fn parse_physical_type(&mut self) -> Option<PhysicalType> {
        let ty = match self.kind().clone() {
            TokenKind::Keyword(Keyword::Integer) => PhysicalType::Integer,
            TokenKind::Keyword(Keyword::Real) => PhysicalType::Real,
            TokenKind::Keyword(Keyword::Boolean) => PhysicalType::Boolean,
            TokenKind::Keyword(Keyword::String) => PhysicalType::String,
            TokenKind::Keyword(Keyword::Void) => PhysicalType::Void,
            TokenKind::Identifier(name) => PhysicalType::Unit(name),
            TokenKind::Integer(1) => PhysicalType::Unit("1".to_string()),
            _ => {
                self.error_here("ParseExpectedType", "expected a type or unit expression");
                return None;
            }
        };
        self.bump();
        // `1/ms`, `nS/ms`: a compound unit expression following a bare unit token.
        if matches!(ty, PhysicalType::Unit(_)) && matches!(self.kind(), TokenKind::Slash) {
            let mut text = match &ty {
                PhysicalType::Unit(s) => s.clone(),
                _ => unreachable!(),
            };
            while matches!(self.kind(), TokenKind::Slash) {
                self.bump();
                text.push('/');
                if let TokenKind::Identifier(next) = self.kind().clone() {
                    text.push_str(&next);
                    self.bump();
                } else {
                    self.error_here("ParseExpectedType", "expected unit after `/`");
                    break;
                }
            }
            return Some(PhysicalType::Unit(text));
        }
        Some(ty)
    }

    // --- equations -----------------------------------------------------------------

    fn parse_equations(&mut self) -> Vec<EquationsEntry> {
        self.skip_terminators();
        let mut entries = Vec::new();
        while !self.at_eof() && !self.is_block_boundary() && !self.check_keyword(Keyword::Shape) {
            match self.parse_ode_entry() {
                Some(entry) => entries.push(entry),
                None => {
                    self.synchronize_line();
                    continue;
                }
            }
            self.skip_newlines();
        }
        while self.check_keyword(Keyword::Shape) {
            match self.parse_shape() {
                Some(shape) => entries.push(EquationsEntry::Shape(shape)),
                None => self.synchronize_line(),
            }
            self.skip_newlines();
            while !self.at_eof() && !self.is_block_boundary() && !self.check_keyword(Keyword::Shape) {
                match self.parse_ode_entry() {
                    Some(entry) => entries.push(entry),
                    None => {
                        self.synchronize_line();
                        continue;
                    }
                }
                self.skip_newlines();
            }
        }
        entries
    }

    fn parse_ode_entry(&mut self) -> Option<EquationsEntry> {
        let start = self.range();
        let (target, _) = self.identifier()?;
        let order = target.chars().rev().take_while(|c| *c == '\'').count() as u8;
        if !matches!(self.kind(), TokenKind::Assign) {
            self.error_here("ParseExpectedToken", "expected `=` in equations entry");
            return None;
        }
        self.bump();
        let rhs = self.parse_expr()?;
        let end = self.range();
        Some(EquationsEntry::Ode {
            target,
            order,
            rhs,
            range: SourceRange::new(start.start, end.end),
        })
    }

    fn parse_shape(&mut self) -> Option<Shape> {
        let start = self.range();
        self.bump(); // `shape`
        let (target, _) = self.identifier()?;
        let order = target.chars().rev().take_while(|c| *c == '\'').count() as u8;
        let name = target.trim_end_matches('\'').to_string();
        if !matches!(self.kind(), TokenKind::Assign) {
            self.error_here("ParseExpectedToken", "expected `=` in shape declaration");
            return None;
        }
        self.bump();
        let rhs = self.parse_expr()?;
        let end = self.range();
        Some(Shape {
            name,
            order,
            rhs,
            range: SourceRange::new(start.start, end.end),
        })
    }

    // --- ports -----------------------------------------------------------------------

    fn parse_input_ports(&mut self) -> Vec<InputPort> {
        self.skip_terminators();
        let mut ports = Vec::new();
        while !self.at_eof() && !self.is_block_boundary() {
            match self.parse_input_port() {
                Some(port) => ports.push(port),
                None => {
                    self.synchronize_line();
                    continue;
                }
            }
            self.skip_newlines();
        }
        ports
    }

    fn parse_input_port(&mut self) -> Option<InputPort> {
        let start = self.range();
        let (name, _) = self.identifier()?;
        let type_name = if matches!(self.kind(), TokenKind::Keyword(_) | TokenKind::Identifier(_))
            && !self.check_keyword(Keyword::Current)
            && !matches!(self.kind(), TokenKind::LeftArrow)
        {
            self.parse_physical_type()
        } else {
            None
        };
        if !matches!(self.kind(), TokenKind::LeftArrow) {
            self.error_here("ParseExpectedToken", "expected `<-` in input port declaration");
            return None;
        }
        self.bump();
        let qualifier = if self.eat_keyword(Keyword::Inhibitory) {
            Some(PortQualifier::Inhibitory)
        } else if self.eat_keyword(Keyword::Excitatory) {
            Some(PortQualifier::Excitatory)
        } else if self.check_keyword(Keyword::Current) {
            Some(PortQualifier::Current)
        } else {
            None
        };
        let is_spike = if self.eat_keyword(Keyword::Spike) {
            true
        } else if self.eat_keyword(Keyword::Current) {
            false
        } else {
            self.error_here("ParseExpectedToken", "expected `spike` or `current` in input port declaration");
            return None;
        };
        let end = self.range();
        Some(InputPort {
            name,
            type_name,
            qualifier,
            is_spike,
            range: SourceRange::new(start.start, end.end),
        })
    }

    fn parse_output_port(&mut self) -> OutputPort {
        self.skip_terminators();
        if self.eat_keyword(Keyword::Spike) {
            OutputPort::Spike
        } else {
            self.error_here("ParseExpectedToken", "expected `spike` in output block");
            OutputPort::Spike
        }
    }

    // --- functions -------------------------------------------------------------------

    fn parse_function(&mut self) -> FunctionDecl {
        let start = self.range();
        self.bump(); // `function`
        let name = self.identifier().map(|(n, _)| n).unwrap_or_else(|| "<error>".to_string());
        let mut parameters = Vec::new();
        if matches!(self.kind(), TokenKind::LParen) {
            self.bump();
            while !matches!(self.kind(), TokenKind::RParen) && !self.at_eof() {
                if let Some((pname, _)) = self.identifier() {
                    if let Some(ty) = self.parse_physical_type() {
                        parameters.push((pname, ty));
                    }
                }
                if matches!(self.kind(), TokenKind::Comma) {
                    self.bump();
                } else {
                    break;
                }
            }
            if matches!(self.kind(), TokenKind::RParen) {
                self.bump();
            } else {
                self.error_here("ParseExpectedToken", "expected `)` closing parameter list");
            }
        }
        let return_type = if matches!(self.kind(), TokenKind::Colon) {
            self.bump();
            self.parse_physical_type().unwrap_or(PhysicalType::Void)
        } else {
            PhysicalType::Void
        };
        self.skip_terminators();
        let docstring = self.optional_docstring();
        let body = self.parse_statements_until_end();
        let end_range = if self.check_keyword(Keyword::End) {
            self.bump().range
        } else {
            self.range()
        };
        FunctionDecl {
            name,
            parameters,
            return_type,
            body,
            docstring,
            range: SourceRange::new(start.start, end_range.end),
        }
    }

    // --- statements ----------------------------------------------------------------

    fn parse_statements_until_end(&mut self) -> Vec<Statement> {
        self.skip_newlines();
        let mut statements = Vec::new();
        while !self.at_eof()
            && !self.check_keyword(Keyword::End)
            && !self.check_keyword(Keyword::Elif)
            && !self.check_keyword(Keyword::Else)
        {
            match self.parse_statement() {
                Some(stmt) => statements.push(stmt),
                None => self.synchronize_line(),
            }
            self.skip_newlines();
        }
        statements
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        if self.check_keyword(Keyword::If) {
            return Some(Statement::If(self.parse_if()));
        }
        if self.check_keyword(Keyword::For) {
            return Some(self.parse_for());
        }
        if self.check_keyword(Keyword::While) {
            return Some(self.parse_while());
        }
        if self.check_keyword(Keyword::Return) {
            let range = self.bump().range;
            let value = if matches!(self.kind(), TokenKind::Newline | TokenKind::Eof) {
                None
            } else {
                self.parse_expr()
            };
            let _ = range;
            return Some(Statement::Return(value));
        }
        let start = self.range();
        let expr = self.parse_expr()?;
        if matches!(self.kind(), TokenKind::Assign) {
            self.bump();
            let rhs = self.parse_expr()?;
            let end = self.range();
            Some(Statement::Assignment {
                lhs: expr,
                rhs,
                range: SourceRange::new(start.start, end.end),
            })
        } else {
            Some(Statement::Expr(expr))
        }
    }

    fn parse_if(&mut self) -> IfStatement {
        let start = self.range();
        self.bump(); // `if`
        let condition = self.parse_expr().unwrap_or(Expr::BoolLiteral(false));
        self.skip_terminators();
        let then_branch = self.parse_statements_until_end();
        let mut elif_branches = Vec::new();
        while self.check_keyword(Keyword::Elif) {
            self.bump();
            let cond = self.parse_expr().unwrap_or(Expr::BoolLiteral(false));
            self.skip_terminators();
            let body = self.parse_statements_until_end();
            elif_branches.push((cond, body));
        }
        let else_branch = if self.eat_keyword(Keyword::Else) {
            self.skip_terminators();
            Some(self.parse_statements_until_end())
        } else {
            None
        };
        let end_range = if self.check_keyword(Keyword::End) {
            self.bump().range
        } else {
            self.range()
        };
        IfStatement {
            condition,
            then_branch,
            elif_branches,
            else_branch,
            range: SourceRange::new(start.start, end_range.end),
        }
    }

    fn parse_for(&mut self) -> Statement {
        let start = self.range();
        self.bump(); // `for`
        let variable = self.identifier().map(|(n, _)| n).unwrap_or_else(|| "<error>".to_string());
        if !self.eat_keyword(Keyword::In) {
            self.error_here("ParseExpectedToken", "expected `in` in for-loop header");
        }
        let begin = self.parse_expr().unwrap_or(Expr::IntLiteral(0));
        if !self.at_identifier_text("to") {
            self.error_here("ParseExpectedToken", "expected `...to...` in for-loop header");
        } else {
            self.bump();
        }
        let end_expr = self.parse_expr().unwrap_or(Expr::IntLiteral(0));
        let step = if self.at_identifier_text("step") {
            self.bump();
            self.parse_expr()
        } else {
            None
        };
        self.skip_terminators();
        let body = self.parse_statements_until_end();
        let end_range = if self.check_keyword(Keyword::End) {
            self.bump().range
        } else {
            self.range()
        };
        Statement::For(ForStatement {
            variable,
            start: begin,
            end: end_expr,
            step,
            body,
            range: SourceRange::new(start.start, end_range.end),
        })
    }

    fn parse_while(&mut self) -> Statement {
        let start = self.range();
        self.bump(); // `while`
        let condition = self.parse_expr().unwrap_or(Expr::BoolLiteral(false));
        self.skip_terminators();
        let body = self.parse_statements_until_end();
        let end_range = if self.check_keyword(Keyword::End) {
            self.bump().range
        } else {
            self.range()
        };
        Statement::While {
            condition,
            body,
            range: SourceRange::new(start.start, end_range.end),
        }
    }

    // --- expressions: precedence-climbing ---------------------------------------------

    fn parse_expr(&mut self) -> Option<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_and()?;
        while self.check_keyword(Keyword::Or) {
            let range = self.bump().range;
            let rhs = self.parse_and()?;
            lhs = Expr::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                range,
            };
        }
        Some(lhs)
    }

    fn parse_and(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_not()?;
        while self.check_keyword(Keyword::And) {
            let range = self.bump().range;
            let rhs = self.parse_not()?;
            lhs = Expr::Binary {
                op: BinaryOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                range,
            };
        }
        Some(lhs)
    }

    fn parse_not(&mut self) -> Option<Expr> {
        if self.check_keyword(Keyword::Not) {
            let range = self.bump().range;
            let operand = self.parse_not()?;
            return Some(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
                range,
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Option<Expr> {
        let lhs = self.parse_additive()?;
        let op = match self.kind() {
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::Ge => BinaryOp::Ge,
            TokenKind::Eq => BinaryOp::Eq,
            TokenKind::Ne => BinaryOp::Ne,
            _ => return Some(lhs),
        };
        let range = self.bump().range;
        let rhs = self.parse_additive()?;
        Some(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            range,
        })
    }

    fn parse_additive(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let range = self.bump().range;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                range,
            };
        }
        Some(lhs)
    }

    fn parse_multiplicative(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            let range = self.bump().range;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                range,
            };
        }
        Some(lhs)
    }

    fn parse_unary(&mut self) -> Option<Expr> {
        if matches!(self.kind(), TokenKind::Minus) {
            let range = self.bump().range;
            let operand = self.parse_unary()?;
            return Some(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
                range,
            });
        }
        if matches!(self.kind(), TokenKind::Plus) {
            self.bump();
            return self.parse_unary();
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Option<Expr> {
        let base = self.parse_postfix()?;
        if matches!(self.kind(), TokenKind::Power) {
            let range = self.bump().range;
            let exponent = self.parse_unary()?; // right-associative
            return Some(Expr::Power {
                base: Box::new(base),
                exponent: Box::new(exponent),
                range,
            });
        }
        Some(base)
    }

    fn parse_postfix(&mut self) -> Option<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if matches!(self.kind(), TokenKind::LBracket) {
                let range = self.bump().range;
                let index = self.parse_expr()?;
                if matches!(self.kind(), TokenKind::RBracket) {
                    self.bump();
                } else {
                    self.error_here("ParseExpectedToken", "expected `]`");
                }
                expr = Expr::Index {
                    base: Box::new(expr),
                    index: Box::new(index),
                    range,
                };
            } else {
                break;
            }
        }
        Some(expr)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let start = self.range();
        match self.kind().clone() {
            TokenKind::Integer(value) => {
                self.bump();
                self.fold_unit_suffix(Expr::IntLiteral(value), start)
            }
            TokenKind::Float(value) => {
                self.bump();
                self.fold_unit_suffix(Expr::FloatLiteral(value), start)
            }
            TokenKind::StringLiteral(value) => {
                self.bump();
                Some(Expr::StringLiteral(value))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.bump();
                Some(Expr::BoolLiteral(true))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.bump();
                Some(Expr::BoolLiteral(false))
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expr()?;
                if matches!(self.kind(), TokenKind::RParen) {
                    self.bump();
                } else {
                    self.error_here("ParseExpectedToken", "expected `)`");
                }
                Some(inner)
            }
            TokenKind::Identifier(name) if name == "convolve" => {
                self.bump();
                self.parse_convolve(start)
            }
            TokenKind::Identifier(name) => {
                self.bump();
                if matches!(self.kind(), TokenKind::LParen) {
                    self.bump();
                    let args = self.parse_call_args();
                    Some(Expr::Call {
                        name,
                        args,
                        range: start,
                    })
                } else {
                    Some(Expr::Variable(name))
                }
            }
            _ => {
                self.error_here("ParseExpectedExpr", "expected an expression");
                None
            }
        }
    }

    /// `convolve` is a built-in, not a regular call, because its arguments
    /// reference a shape and a port rather than being evaluated expressions.
    fn parse_convolve(&mut self, start: SourceRange) -> Option<Expr> {
        if !matches!(self.kind(), TokenKind::LParen) {
            self.error_here("ParseExpectedToken", "expected `(` after `convolve`");
            return None;
        }
        self.bump();
        let (shape, _) = self.identifier()?;
        if !matches!(self.kind(), TokenKind::Comma) {
            self.error_here("ParseExpectedToken", "expected `,` in `convolve(...)`");
            return None;
        }
        self.bump();
        let (port, _) = self.identifier()?;
        if matches!(self.kind(), TokenKind::RParen) {
            self.bump();
        } else {
            self.error_here("ParseExpectedToken", "expected `)` closing `convolve(...)`");
        }
        Some(Expr::Convolve {
            shape,
            port,
            range: start,
        })
    }

    fn parse_call_args(&mut self) -> Vec<Expr> {
        let mut args = Vec::new();
        if matches!(self.kind(), TokenKind::RParen) {
            self.bump();
            return args;
        }
        loop {
            if let Some(arg) = self.parse_expr() {
                args.push(arg);
            } else {
                break;
            }
            if matches!(self.kind(), TokenKind::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        if matches!(self.kind(), TokenKind::RParen) {
            self.bump();
        } else {
            self.error_here("ParseExpectedToken", "expected `)` closing call arguments");
        }
        args
    }

    /// `10 mV`, `0.5 nS/ms`: a numeric literal directly followed by a unit
    /// identifier is folded into a call to a synthetic constructor so the
    /// unit stays attached to the value through later phases.
    fn fold_unit_suffix(&mut self, literal: Expr, range: SourceRange) -> Option<Expr> {
        if let TokenKind::Identifier(_) = self.kind() {
            if let Some(PhysicalType::Unit(unit)) = self.parse_physical_type() {
                return Some(Expr::Call {
                    name: "__unit_literal".to_string(),
                    args: vec![literal, Expr::StringLiteral(unit)],
                    range,
                });
            }
        }
        Some(literal)
    }
}

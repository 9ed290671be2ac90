//! Recursive-descent parser producing unresolved statements.
//!
//! Table and field names are kept as written; [`super::Statement::parse`]
//! resolves them against the catalog afterwards.

use crate::catalog::{FieldDef, FieldType, Index, IndexKind, Table};
use crate::error::{Result, SyncError};
use crate::value::Value;

use super::expr::{BinaryOp, ColumnRef, Expr};
use super::from_ref::JoinKind;
use super::lexer::{Lexer, SpannedToken, Token};
use super::select::OrderItem;

#[derive(Debug, Clone)]
pub(crate) enum RawStatement {
    Select(RawSelect),
    Insert(RawInsert),
    Update(RawUpdate),
    Delete(RawDelete),
    CreateTable(Table),
}

#[derive(Debug, Clone)]
pub(crate) struct RawTableRef {
    pub table: String,
    pub alias: Option<String>,
    pub join_kind: JoinKind,
    pub condition: Option<Expr>,
}

#[derive(Debug, Clone)]
pub(crate) enum RawProjectionItem {
    Wildcard,
    Column { column: ColumnRef, alias: Option<String> },
}

#[derive(Debug, Clone)]
pub(crate) struct RawSelect {
    pub projection: Vec<RawProjectionItem>,
    pub from: Vec<RawTableRef>,
    pub where_clause: Option<Expr>,
    pub order_by: Vec<OrderItem>,
}

#[derive(Debug, Clone)]
pub(crate) struct RawInsert {
    pub table: String,
    pub fields: Vec<String>,
    pub values: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub(crate) struct RawUpdate {
    pub table: String,
    pub assignments: Vec<(String, Expr)>,
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone)]
pub(crate) struct RawDelete {
    pub table: String,
    pub where_clause: Option<Expr>,
}

/// Statement parser
pub(crate) struct Parser<'a> {
    tokens: Vec<SpannedToken>,
    position: usize,
    /// Parameter names the caller supplied, in order, for `@@names`/`@@values`
    supplied_names: &'a [String],
}

impl<'a> Parser<'a> {
    /// Parses one statement, expanding insert shorthand from `supplied_names`.
    pub fn parse(sql: &str, supplied_names: &'a [String]) -> Result<RawStatement> {
        let tokens = Lexer::new(sql).tokenize()?;
        let mut parser = Parser {
            tokens,
            position: 0,
            supplied_names,
        };
        let statement = parser.parse_statement()?;
        if parser.check(&Token::Semicolon) {
            parser.advance();
        }
        if !parser.check(&Token::Eof) {
            return Err(parser.unexpected("end of statement"));
        }
        Ok(statement)
    }

    fn parse_statement(&mut self) -> Result<RawStatement> {
        match self.peek() {
            Token::Select => Ok(RawStatement::Select(self.parse_select()?)),
            Token::Insert => Ok(RawStatement::Insert(self.parse_insert()?)),
            Token::Update => Ok(RawStatement::Update(self.parse_update()?)),
            Token::Delete => Ok(RawStatement::Delete(self.parse_delete()?)),
            Token::Create => Ok(RawStatement::CreateTable(self.parse_create_table()?)),
            _ => Err(self.unexpected("SELECT, INSERT, UPDATE, DELETE or CREATE")),
        }
    }

    fn parse_select(&mut self) -> Result<RawSelect> {
        self.expect(Token::Select)?;
        let projection = self.parse_projection()?;

        self.expect(Token::From)?;
        let mut from = vec![self.parse_table_ref(JoinKind::Anchor)?];
        while let Some(join_kind) = self.parse_join_keyword()? {
            let mut table_ref = self.parse_table_ref(join_kind)?;
            self.expect(Token::On)?;
            table_ref.condition = Some(self.parse_expr()?);
            from.push(table_ref);
        }

        let where_clause = if self.check(&Token::Where) {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };

        let order_by = if self.check(&Token::Order) {
            self.advance();
            self.expect(Token::By)?;
            self.parse_order_by()?
        } else {
            Vec::new()
        };

        Ok(RawSelect {
            projection,
            from,
            where_clause,
            order_by,
        })
    }

    fn parse_projection(&mut self) -> Result<Vec<RawProjectionItem>> {
        let mut items = Vec::new();
        loop {
            if self.check(&Token::Star) {
                self.advance();
                items.push(RawProjectionItem::Wildcard);
            } else {
                let column = self.parse_column_ref()?;
                let alias = self.parse_optional_alias()?;
                items.push(RawProjectionItem::Column { column, alias });
            }
            if !self.check(&Token::Comma) {
                break;
            }
            self.advance();
        }
        Ok(items)
    }

    fn parse_optional_alias(&mut self) -> Result<Option<String>> {
        if self.check(&Token::As) {
            self.advance();
            return Ok(Some(self.parse_identifier()?));
        }
        if let Token::Identifier(name) = self.peek() {
            self.advance();
            return Ok(Some(name));
        }
        Ok(None)
    }

    fn parse_table_ref(&mut self, join_kind: JoinKind) -> Result<RawTableRef> {
        let table = self.parse_identifier()?;
        let alias = self.parse_optional_alias()?;
        Ok(RawTableRef {
            table,
            alias,
            join_kind,
            condition: None,
        })
    }

    fn parse_join_keyword(&mut self) -> Result<Option<JoinKind>> {
        let kind = match self.peek() {
            Token::Join => {
                self.advance();
                return Ok(Some(JoinKind::Inner));
            }
            Token::Inner => JoinKind::Inner,
            Token::Left => JoinKind::Left,
            _ => return Ok(None),
        };
        self.advance();
        if kind == JoinKind::Left && self.check(&Token::Outer) {
            self.advance();
        }
        self.expect(Token::Join)?;
        Ok(Some(kind))
    }

    fn parse_order_by(&mut self) -> Result<Vec<OrderItem>> {
        let mut items = Vec::new();
        loop {
            let expr = self.parse_expr()?;
            let descending = match self.peek() {
                Token::Asc => {
                    self.advance();
                    false
                }
                Token::Desc => {
                    self.advance();
                    true
                }
                _ => false,
            };
            items.push(OrderItem { expr, descending });
            if !self.check(&Token::Comma) {
                break;
            }
            self.advance();
        }
        Ok(items)
    }

    fn parse_insert(&mut self) -> Result<RawInsert> {
        self.expect(Token::Insert)?;
        self.expect(Token::Into)?;
        let table = self.parse_identifier()?;

        self.expect(Token::LeftParen)?;
        let mut fields = Vec::new();
        loop {
            if self.check(&Token::ParamNames) {
                self.advance();
                fields.extend(self.supplied_names.iter().cloned());
            } else {
                fields.push(self.parse_identifier()?);
            }
            if !self.check(&Token::Comma) {
                break;
            }
            self.advance();
        }
        self.expect(Token::RightParen)?;

        self.expect(Token::Values)?;
        self.expect(Token::LeftParen)?;
        let mut values = Vec::new();
        loop {
            if self.check(&Token::ParamValues) {
                self.advance();
                values.extend(self.supplied_names.iter().map(|n| Expr::Param(n.clone())));
            } else {
                values.push(self.parse_expr()?);
            }
            if !self.check(&Token::Comma) {
                break;
            }
            self.advance();
        }
        self.expect(Token::RightParen)?;

        if fields.len() != values.len() {
            return Err(SyncError::syntax(
                format!("{} fields but {} values", fields.len(), values.len()),
                self.offset(),
            ));
        }

        Ok(RawInsert {
            table,
            fields,
            values,
        })
    }

    fn parse_update(&mut self) -> Result<RawUpdate> {
        self.expect(Token::Update)?;
        let table = self.parse_identifier()?;
        self.expect(Token::Set)?;

        let mut assignments = Vec::new();
        loop {
            let field = self.parse_identifier()?;
            self.expect(Token::Equal)?;
            let value = self.parse_expr()?;
            assignments.push((field, value));
            if !self.check(&Token::Comma) {
                break;
            }
            self.advance();
        }

        let where_clause = if self.check(&Token::Where) {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };

        Ok(RawUpdate {
            table,
            assignments,
            where_clause,
        })
    }

    fn parse_delete(&mut self) -> Result<RawDelete> {
        self.expect(Token::Delete)?;
        self.expect(Token::From)?;
        let table = self.parse_identifier()?;
        let where_clause = if self.check(&Token::Where) {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(RawDelete {
            table,
            where_clause,
        })
    }

    fn parse_create_table(&mut self) -> Result<Table> {
        self.expect(Token::Create)?;
        self.expect(Token::Table)?;
        let name = self.parse_identifier()?;
        self.expect(Token::LeftParen)?;

        let mut fields = Vec::new();
        let mut indexes = Vec::new();
        loop {
            if self.check_word("PRIMARY") {
                self.advance();
                self.expect_word("KEY")?;
                let field_names = self.parse_identifier_list()?;
                indexes.push(Index::new("PRIMARY", IndexKind::Primary, field_names));
            } else if self.check_word("UNIQUE") {
                self.advance();
                if self.check_word("INDEX") || self.check_word("KEY") {
                    self.advance();
                }
                let index_name = match self.peek() {
                    Token::Identifier(n) => {
                        self.advance();
                        n
                    }
                    _ => format!("UQ_{}_{}", name, indexes.len()),
                };
                let field_names = self.parse_identifier_list()?;
                indexes.push(Index::new(index_name, IndexKind::Unique, field_names));
            } else if self.check_word("INDEX") || self.check_word("KEY") {
                self.advance();
                let index_name = self.parse_identifier()?;
                let field_names = self.parse_identifier_list()?;
                indexes.push(Index::new(index_name, IndexKind::Other, field_names));
            } else {
                let (field, inline_primary) = self.parse_field_def()?;
                if inline_primary {
                    indexes.push(Index::new("PRIMARY", IndexKind::Primary, vec![field.name.clone()]));
                }
                fields.push(field);
            }

            if !self.check(&Token::Comma) {
                break;
            }
            self.advance();
        }
        self.expect(Token::RightParen)?;

        Table::new(name, fields, indexes)
    }

    fn parse_field_def(&mut self) -> Result<(FieldDef, bool)> {
        let name = self.parse_identifier()?;
        let type_offset = self.offset();
        let type_name = self.parse_identifier()?;
        let field_type = FieldType::from_sql_name(&type_name).ok_or_else(|| {
            SyncError::syntax(format!("unknown field type '{}'", type_name), type_offset)
        })?;
        let mut field = FieldDef::new(name, field_type);

        if self.check(&Token::LeftParen) {
            self.advance();
            let length = self.parse_integer()?;
            // DECIMAL(p, s) carries a scale we do not track.
            if self.check(&Token::Comma) {
                self.advance();
                self.parse_integer()?;
            }
            self.expect(Token::RightParen)?;
            if field_type == FieldType::Text {
                field = field.max_length(length as usize);
            }
        }

        let mut inline_primary = false;
        loop {
            match self.peek() {
                Token::Not => {
                    self.advance();
                    self.expect(Token::Null)?;
                    field = field.not_null();
                }
                Token::Null => {
                    self.advance();
                }
                _ if self.check_word("AUTO_INCREMENT") || self.check_word("IDENTITY") => {
                    self.advance();
                    field = field.auto_increment();
                }
                _ if self.check_word("PRIMARY") => {
                    self.advance();
                    self.expect_word("KEY")?;
                    field = field.not_null();
                    inline_primary = true;
                }
                _ => break,
            }
        }
        Ok((field, inline_primary))
    }

    fn parse_identifier_list(&mut self) -> Result<Vec<String>> {
        self.expect(Token::LeftParen)?;
        let mut names = Vec::new();
        loop {
            names.push(self.parse_identifier()?);
            if !self.check(&Token::Comma) {
                break;
            }
            self.advance();
        }
        self.expect(Token::RightParen)?;
        Ok(names)
    }

    // Expressions, lowest precedence first.

    pub(crate) fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or_expr()
    }

    fn parse_or_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_and_expr()?;
        while self.check(&Token::Or) {
            self.advance();
            let right = self.parse_and_expr()?;
            left = Expr::binary(left, BinaryOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_not_expr()?;
        while self.check(&Token::And) {
            self.advance();
            let right = self.parse_not_expr()?;
            left = Expr::binary(left, BinaryOp::And, right);
        }
        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Expr> {
        if self.check(&Token::Not) {
            self.advance();
            let inner = self.parse_not_expr()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison_expr()
    }

    fn parse_comparison_expr(&mut self) -> Result<Expr> {
        let left = self.parse_additive_expr()?;

        let op = match self.peek() {
            Token::Equal => Some(BinaryOp::Eq),
            Token::NotEqual => Some(BinaryOp::NotEq),
            Token::LessThan => Some(BinaryOp::Lt),
            Token::LessThanOrEqual => Some(BinaryOp::LtEq),
            Token::GreaterThan => Some(BinaryOp::Gt),
            Token::GreaterThanOrEqual => Some(BinaryOp::GtEq),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let right = self.parse_additive_expr()?;
            return Ok(Expr::binary(left, op, right));
        }

        if self.check(&Token::Is) {
            self.advance();
            let negated = if self.check(&Token::Not) {
                self.advance();
                true
            } else {
                false
            };
            self.expect(Token::Null)?;
            return Ok(Expr::IsNull {
                expr: Box::new(left),
                negated,
            });
        }

        let negated = self.check(&Token::Not)
            && matches!(self.peek_at(1), Token::In | Token::Like | Token::Between);
        if negated {
            self.advance();
        }

        match self.peek() {
            Token::In => {
                self.advance();
                self.expect(Token::LeftParen)?;
                let mut list = Vec::new();
                loop {
                    list.push(self.parse_expr()?);
                    if !self.check(&Token::Comma) {
                        break;
                    }
                    self.advance();
                }
                self.expect(Token::RightParen)?;
                Ok(Expr::InList {
                    expr: Box::new(left),
                    list,
                    negated,
                })
            }
            Token::Like => {
                self.advance();
                let pattern = self.parse_additive_expr()?;
                Ok(Expr::Like {
                    expr: Box::new(left),
                    pattern: Box::new(pattern),
                    negated,
                })
            }
            Token::Between => {
                self.advance();
                let low = self.parse_additive_expr()?;
                self.expect(Token::And)?;
                let high = self.parse_additive_expr()?;
                Ok(Expr::Between {
                    expr: Box::new(left),
                    low: Box::new(low),
                    high: Box::new(high),
                    negated,
                })
            }
            _ => Ok(left),
        }
    }

    fn parse_additive_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative_expr()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative_expr()?;
            left = Expr::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_multiplicative_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary_expr()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary_expr()?;
            left = Expr::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr> {
        if self.check(&Token::Minus) {
            let offset = self.offset();
            self.advance();
            return Ok(match self.parse_unary_expr()? {
                Expr::Literal(Value::Int(i)) => match i.checked_neg() {
                    Some(negated) => Expr::Literal(Value::Int(negated)),
                    None => return Err(SyncError::syntax(format!("integer out of range: -({})", i), offset)),
                },
                Expr::Literal(Value::Float(x)) => Expr::Literal(Value::Float(-x)),
                other => Expr::Negate(Box::new(other)),
            });
        }
        self.parse_primary_expr()
    }

    fn parse_primary_expr(&mut self) -> Result<Expr> {
        match self.peek() {
            Token::Integer(i) => {
                self.advance();
                Ok(Expr::Literal(Value::Int(i)))
            }
            Token::Float(x) => {
                self.advance();
                Ok(Expr::Literal(Value::Float(x)))
            }
            Token::String(s) => {
                self.advance();
                Ok(Expr::Literal(Value::Text(s)))
            }
            Token::True => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(true)))
            }
            Token::False => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(false)))
            }
            Token::Null => {
                self.advance();
                Ok(Expr::Literal(Value::Null))
            }
            Token::Param(name) => {
                self.advance();
                Ok(Expr::Param(name))
            }
            Token::LeftParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(Token::RightParen)?;
                Ok(Expr::Nested(Box::new(inner)))
            }
            Token::Identifier(_) => Ok(Expr::Column(self.parse_column_ref()?)),
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_column_ref(&mut self) -> Result<ColumnRef> {
        let first = self.parse_identifier()?;
        if self.check(&Token::Dot) {
            self.advance();
            let name = self.parse_identifier()?;
            Ok(ColumnRef::new(Some(first), name))
        } else {
            Ok(ColumnRef::new(None, first))
        }
    }

    // Token helpers

    fn parse_identifier(&mut self) -> Result<String> {
        match self.peek() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn parse_integer(&mut self) -> Result<i64> {
        match self.peek() {
            Token::Integer(i) => {
                self.advance();
                Ok(i)
            }
            _ => Err(self.unexpected("integer")),
        }
    }

    fn peek(&self) -> Token {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> Token {
        self.tokens
            .get(self.position + n)
            .map(|t| t.token.clone())
            .unwrap_or(Token::Eof)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.position)
            .or_else(|| self.tokens.last())
            .map(|t| t.offset)
            .unwrap_or(0)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(&self.peek()) == std::mem::discriminant(token)
    }

    fn check_word(&self, word: &str) -> bool {
        matches!(self.peek(), Token::Identifier(ref n) if n.eq_ignore_ascii_case(word))
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        if self.check(&expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("{:?}", expected)))
        }
    }

    fn expect_word(&mut self, word: &str) -> Result<()> {
        if self.check_word(word) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(word))
        }
    }

    fn unexpected(&self, expected: &str) -> SyncError {
        SyncError::syntax(
            format!("expected {}, found {:?}", expected, self.peek()),
            self.offset(),
        )
    }
}

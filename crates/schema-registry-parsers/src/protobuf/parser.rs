//! Tokenizer and recursive-descent parser for proto2/proto3 text

use schema_registry_core::{RegistryError, Result};

use super::{EnumDef, Field, FieldType, Label, Message, ProtoFile, Syntax};

/// Highest tag number protobuf allows
const MAX_FIELD_NUMBER: u32 = 536_870_911;

pub(super) fn parse(text: &str) -> Result<ProtoFile> {
    let tokens = tokenize(text)?;
    Parser { tokens, pos: 0 }.parse_file()
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(u64),
    /// Only legal inside option values, which the parser skips
    Float(f64),
    Str(String),
    Sym(char),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "{s}"),
            Token::Int(n) => write!(f, "{n}"),
            Token::Float(x) => write!(f, "{x}"),
            Token::Str(s) => write!(f, "\"{s}\""),
            Token::Sym(c) => write!(f, "{c}"),
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let bytes: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '/' && bytes.get(i + 1) == Some(&'/') {
            while i < bytes.len() && bytes[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && bytes.get(i + 1) == Some(&'*') {
            i += 2;
            while i + 1 < bytes.len() && !(bytes[i] == '*' && bytes[i + 1] == '/') {
                i += 1;
            }
            i = (i + 2).min(bytes.len());
        } else if c == '"' || c == '\'' {
            let quote = c;
            i += 1;
            let mut s = String::new();
            while i < bytes.len() && bytes[i] != quote {
                if bytes[i] == '\\' && i + 1 < bytes.len() {
                    s.push(bytes[i + 1]);
                    i += 2;
                } else {
                    s.push(bytes[i]);
                    i += 1;
                }
            }
            if i >= bytes.len() {
                return Err(RegistryError::invalid_schema("unterminated string literal"));
            }
            i += 1;
            tokens.push(Token::Str(s));
        } else if c.is_ascii_digit() {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == '.') {
                i += 1;
            }
            let literal: String = bytes[start..i].iter().collect();
            let value = if let Some(hex) = literal.strip_prefix("0x").or_else(|| literal.strip_prefix("0X")) {
                u64::from_str_radix(hex, 16).ok()
            } else {
                literal.parse().ok()
            };
            match value {
                Some(n) => tokens.push(Token::Int(n)),
                None => match literal.parse::<f64>() {
                    Ok(x) => tokens.push(Token::Float(x)),
                    Err(_) => {
                        return Err(RegistryError::invalid_schema(format!(
                            "invalid numeric literal '{literal}'"
                        )))
                    }
                },
            }
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(bytes[start..i].iter().collect()));
        } else if "{}<>=,;[]().-".contains(c) {
            tokens.push(Token::Sym(c));
            i += 1;
        } else {
            return Err(RegistryError::invalid_schema(format!(
                "unexpected character '{c}'"
            )));
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn parse_file(&mut self) -> Result<ProtoFile> {
        let mut file = ProtoFile {
            syntax: Syntax::Proto2,
            package: None,
            imports: Vec::new(),
            messages: Vec::new(),
            enums: Vec::new(),
        };

        while let Some(token) = self.peek() {
            match token {
                Token::Sym(';') => {
                    self.advance();
                }
                Token::Ident(keyword) => match keyword.as_str() {
                    "syntax" => {
                        self.advance();
                        self.expect_sym('=')?;
                        let literal = self.expect_str()?;
                        file.syntax = match literal.as_str() {
                            "proto2" => Syntax::Proto2,
                            "proto3" => Syntax::Proto3,
                            other => {
                                return Err(RegistryError::invalid_schema(format!(
                                    "unknown syntax '{other}'"
                                )))
                            }
                        };
                        self.expect_sym(';')?;
                    }
                    "package" => {
                        self.advance();
                        file.package = Some(self.parse_full_ident()?);
                        self.expect_sym(';')?;
                    }
                    "import" => {
                        self.advance();
                        if matches!(self.peek(), Some(Token::Ident(modifier)) if modifier == "public" || modifier == "weak")
                        {
                            self.advance();
                        }
                        file.imports.push(self.expect_str()?);
                        self.expect_sym(';')?;
                    }
                    "option" => self.skip_option()?,
                    "message" => {
                        self.advance();
                        let message = self.parse_message()?;
                        file.messages.push(message);
                    }
                    "enum" => {
                        self.advance();
                        let en = self.parse_enum()?;
                        file.enums.push(en);
                    }
                    "service" | "extend" => {
                        self.advance();
                        // name (possibly qualified for extend), then a block
                        self.parse_full_ident()?;
                        self.skip_braced_block()?;
                    }
                    other => {
                        return Err(RegistryError::invalid_schema(format!(
                            "unexpected '{other}' at file scope"
                        )))
                    }
                },
                other => {
                    return Err(RegistryError::invalid_schema(format!(
                        "unexpected '{other}' at file scope"
                    )))
                }
            }
        }
        Ok(file)
    }

    fn parse_message(&mut self) -> Result<Message> {
        let name = self.expect_ident()?;
        let mut message = Message {
            name,
            fields: Vec::new(),
            oneofs: Vec::new(),
            messages: Vec::new(),
            enums: Vec::new(),
            reserved_numbers: Vec::new(),
            reserved_names: Vec::new(),
        };
        self.expect_sym('{')?;

        loop {
            match self.peek() {
                None => return Err(RegistryError::invalid_schema("unterminated message body")),
                Some(Token::Sym('}')) => {
                    self.advance();
                    break;
                }
                Some(Token::Sym(';')) => {
                    self.advance();
                }
                Some(Token::Ident(keyword)) => {
                    let keyword = keyword.clone();
                    match keyword.as_str() {
                        "option" => self.skip_option()?,
                        "reserved" => {
                            let (numbers, names) = self.parse_reserved()?;
                            message.reserved_numbers.extend(numbers);
                            message.reserved_names.extend(names);
                        }
                        "message" => {
                            self.advance();
                            let nested = self.parse_message()?;
                            message.messages.push(nested);
                        }
                        "enum" => {
                            self.advance();
                            let en = self.parse_enum()?;
                            message.enums.push(en);
                        }
                        "oneof" => {
                            self.advance();
                            let oneof_name = self.expect_ident()?;
                            self.expect_sym('{')?;
                            loop {
                                match self.peek() {
                                    None => {
                                        return Err(RegistryError::invalid_schema(
                                            "unterminated oneof body",
                                        ))
                                    }
                                    Some(Token::Sym('}')) => {
                                        self.advance();
                                        break;
                                    }
                                    Some(Token::Sym(';')) => {
                                        self.advance();
                                    }
                                    Some(Token::Ident(k)) if k == "option" => self.skip_option()?,
                                    _ => {
                                        let mut field = self.parse_field(Label::None)?;
                                        field.oneof = Some(oneof_name.clone());
                                        push_field(&mut message, field)?;
                                    }
                                }
                            }
                            message.oneofs.push(oneof_name);
                        }
                        "map" => {
                            let field = self.parse_map_field()?;
                            push_field(&mut message, field)?;
                        }
                        "extensions" => {
                            self.advance();
                            while !matches!(self.peek(), Some(Token::Sym(';')) | None) {
                                self.advance();
                            }
                            self.expect_sym(';')?;
                        }
                        "group" => {
                            return Err(RegistryError::invalid_schema(
                                "group fields are not supported",
                            ))
                        }
                        "optional" => {
                            self.advance();
                            let field = self.parse_field(Label::Optional)?;
                            push_field(&mut message, field)?;
                        }
                        "required" => {
                            self.advance();
                            let field = self.parse_field(Label::Required)?;
                            push_field(&mut message, field)?;
                        }
                        "repeated" => {
                            self.advance();
                            let field = self.parse_field(Label::Repeated)?;
                            push_field(&mut message, field)?;
                        }
                        _ => {
                            let field = self.parse_field(Label::None)?;
                            push_field(&mut message, field)?;
                        }
                    }
                }
                Some(Token::Sym('.')) => {
                    let field = self.parse_field(Label::None)?;
                    push_field(&mut message, field)?;
                }
                Some(other) => {
                    return Err(RegistryError::invalid_schema(format!(
                        "unexpected '{other}' in message body"
                    )))
                }
            }
        }
        Ok(message)
    }

    fn parse_field(&mut self, label: Label) -> Result<Field> {
        let ty = if matches!(self.peek(), Some(Token::Ident(k)) if k == "map") {
            return self.parse_map_field();
        } else {
            self.parse_type()?
        };
        let name = self.expect_ident()?;
        self.expect_sym('=')?;
        let number = self.expect_field_number()?;
        self.skip_field_options()?;
        self.expect_sym(';')?;
        Ok(Field {
            name,
            number,
            label,
            ty,
            oneof: None,
        })
    }

    fn parse_map_field(&mut self) -> Result<Field> {
        self.advance(); // "map"
        self.expect_sym('<')?;
        let key = self.parse_type()?;
        self.expect_sym(',')?;
        let value = self.parse_type()?;
        self.expect_sym('>')?;
        let name = self.expect_ident()?;
        self.expect_sym('=')?;
        let number = self.expect_field_number()?;
        self.skip_field_options()?;
        self.expect_sym(';')?;
        Ok(Field {
            name,
            number,
            label: Label::None,
            ty: FieldType::Map(Box::new(key), Box::new(value)),
            oneof: None,
        })
    }

    fn parse_type(&mut self) -> Result<FieldType> {
        let written = self.parse_full_ident()?;
        Ok(match written.as_str() {
            "double" => FieldType::Double,
            "float" => FieldType::Float,
            "int32" => FieldType::Int32,
            "int64" => FieldType::Int64,
            "uint32" => FieldType::Uint32,
            "uint64" => FieldType::Uint64,
            "sint32" => FieldType::Sint32,
            "sint64" => FieldType::Sint64,
            "fixed32" => FieldType::Fixed32,
            "fixed64" => FieldType::Fixed64,
            "sfixed32" => FieldType::Sfixed32,
            "sfixed64" => FieldType::Sfixed64,
            "bool" => FieldType::Bool,
            "string" => FieldType::String,
            "bytes" => FieldType::Bytes,
            _ => FieldType::Named(written),
        })
    }

    fn parse_enum(&mut self) -> Result<EnumDef> {
        let name = self.expect_ident()?;
        let mut values = Vec::new();
        self.expect_sym('{')?;
        loop {
            match self.peek() {
                None => return Err(RegistryError::invalid_schema("unterminated enum body")),
                Some(Token::Sym('}')) => {
                    self.advance();
                    break;
                }
                Some(Token::Sym(';')) => {
                    self.advance();
                }
                Some(Token::Ident(keyword)) if keyword == "option" => self.skip_option()?,
                Some(Token::Ident(keyword)) if keyword == "reserved" => {
                    self.parse_reserved()?;
                }
                Some(Token::Ident(_)) => {
                    let value_name = self.expect_ident()?;
                    self.expect_sym('=')?;
                    let negative = self.accept_sym('-');
                    let magnitude = self.expect_int()?;
                    let number = if negative {
                        -(magnitude as i64)
                    } else {
                        magnitude as i64
                    };
                    let number = i32::try_from(number).map_err(|_| {
                        RegistryError::invalid_schema(format!(
                            "enum value '{value_name}' out of range"
                        ))
                    })?;
                    self.skip_field_options()?;
                    self.expect_sym(';')?;
                    values.push((value_name, number));
                }
                Some(other) => {
                    return Err(RegistryError::invalid_schema(format!(
                        "unexpected '{other}' in enum body"
                    )))
                }
            }
        }
        Ok(EnumDef { name, values })
    }

    /// `reserved 2, 9 to 11, 40 to max;` or `reserved "foo", "bar";`
    fn parse_reserved(&mut self) -> Result<(Vec<(u32, u32)>, Vec<String>)> {
        self.advance(); // "reserved"
        let mut numbers = Vec::new();
        let mut names = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Str(_)) => names.push(self.expect_str()?),
                Some(Token::Int(_)) => {
                    let lo = self.expect_field_number()?;
                    let hi = if matches!(self.peek(), Some(Token::Ident(k)) if k == "to") {
                        self.advance();
                        match self.peek() {
                            Some(Token::Ident(k)) if k == "max" => {
                                self.advance();
                                MAX_FIELD_NUMBER
                            }
                            _ => self.expect_field_number()?,
                        }
                    } else {
                        lo
                    };
                    numbers.push((lo, hi));
                }
                Some(other) => {
                    return Err(RegistryError::invalid_schema(format!(
                        "unexpected '{other}' in reserved list"
                    )))
                }
                None => return Err(RegistryError::invalid_schema("unterminated reserved list")),
            }
            if self.accept_sym(',') {
                continue;
            }
            self.expect_sym(';')?;
            return Ok((numbers, names));
        }
    }

    /// Possibly dotted identifier, with an optional leading dot
    fn parse_full_ident(&mut self) -> Result<String> {
        let mut out = String::new();
        if self.accept_sym('.') {
            out.push('.');
        }
        out.push_str(&self.expect_ident()?);
        while self.accept_sym('.') {
            out.push('.');
            out.push_str(&self.expect_ident()?);
        }
        Ok(out)
    }

    /// Consume an option statement, balancing aggregate braces
    fn skip_option(&mut self) -> Result<()> {
        self.advance(); // "option"
        let mut depth = 0usize;
        loop {
            match self.next() {
                Some(Token::Sym('{')) => depth += 1,
                Some(Token::Sym('}')) => depth = depth.saturating_sub(1),
                Some(Token::Sym(';')) if depth == 0 => return Ok(()),
                Some(_) => {}
                None => return Err(RegistryError::invalid_schema("unterminated option")),
            }
        }
    }

    fn skip_field_options(&mut self) -> Result<()> {
        if !self.accept_sym('[') {
            return Ok(());
        }
        let mut depth = 1usize;
        loop {
            match self.next() {
                Some(Token::Sym('[')) => depth += 1,
                Some(Token::Sym(']')) => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Some(_) => {}
                None => return Err(RegistryError::invalid_schema("unterminated field options")),
            }
        }
    }

    fn skip_braced_block(&mut self) -> Result<()> {
        self.expect_sym('{')?;
        let mut depth = 1usize;
        loop {
            match self.next() {
                Some(Token::Sym('{')) => depth += 1,
                Some(Token::Sym('}')) => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Some(_) => {}
                None => return Err(RegistryError::invalid_schema("unterminated block")),
            }
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn accept_sym(&mut self, c: char) -> bool {
        if matches!(self.peek(), Some(Token::Sym(s)) if *s == c) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_sym(&mut self, c: char) -> Result<()> {
        match self.next() {
            Some(Token::Sym(s)) if s == c => Ok(()),
            Some(other) => Err(RegistryError::invalid_schema(format!(
                "expected '{c}', found '{other}'"
            ))),
            None => Err(RegistryError::invalid_schema(format!(
                "expected '{c}', found end of input"
            ))),
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.next() {
            Some(Token::Ident(s)) => Ok(s),
            Some(other) => Err(RegistryError::invalid_schema(format!(
                "expected identifier, found '{other}'"
            ))),
            None => Err(RegistryError::invalid_schema(
                "expected identifier, found end of input",
            )),
        }
    }

    fn expect_str(&mut self) -> Result<String> {
        match self.next() {
            Some(Token::Str(s)) => Ok(s),
            Some(other) => Err(RegistryError::invalid_schema(format!(
                "expected string literal, found '{other}'"
            ))),
            None => Err(RegistryError::invalid_schema(
                "expected string literal, found end of input",
            )),
        }
    }

    fn expect_int(&mut self) -> Result<u64> {
        match self.next() {
            Some(Token::Int(n)) => Ok(n),
            Some(other) => Err(RegistryError::invalid_schema(format!(
                "expected number, found '{other}'"
            ))),
            None => Err(RegistryError::invalid_schema(
                "expected number, found end of input",
            )),
        }
    }

    fn expect_field_number(&mut self) -> Result<u32> {
        let number = self.expect_int()?;
        if number == 0 || number > u64::from(MAX_FIELD_NUMBER) {
            return Err(RegistryError::invalid_schema(format!(
                "field number {number} out of range"
            )));
        }
        Ok(number as u32)
    }
}

fn push_field(message: &mut Message, field: Field) -> Result<()> {
    if message.fields.iter().any(|f| f.number == field.number) {
        return Err(RegistryError::invalid_schema(format!(
            "message '{}' uses tag {} twice",
            message.name, field.number
        )));
    }
    message.fields.push(field);
    Ok(())
}

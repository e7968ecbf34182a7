//! Recursive-descent parser for type encoding strings
//!
//! Method encodings as reported by the runtime look like `c40@0:8o^@16@24o^@32`:
//! the return type followed by the receiver, the selector and the explicit
//! arguments, each optionally prefixed by qualifiers and followed by a
//! stack offset.

use std::sync::Arc;

use crate::error::{EncodingError, EncodingResult};
use crate::registry::StructRegistry;
use crate::ty::{AggregateKind, PrimitiveKind, StructField, StructType, TypeDescriptor};

/// Qualifier prefixes (`const`, `in`, `inout`, `out`, `bycopy`, `byref`, `oneway`)
const QUALIFIERS: &[u8] = b"rnNoORV";

fn is_identifier_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_identifier_rest(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Cursor over a single encoding string
///
/// Struct definitions encountered while parsing are merged into the
/// registry the parser was created with, so name-only references such as
/// `{CGPoint}` resolve against anything parsed earlier.
pub struct EncodingParser<'a> {
    encoding: &'a str,
    bytes: &'a [u8],
    cursor: usize,
    registry: &'a StructRegistry,
}

impl<'a> EncodingParser<'a> {
    /// Create a parser positioned at the start of `encoding`
    pub fn new(encoding: &'a str, registry: &'a StructRegistry) -> Self {
        Self {
            encoding,
            bytes: encoding.as_bytes(),
            cursor: 0,
            registry,
        }
    }

    /// Current cursor position
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Whether the whole input has been consumed
    pub fn is_at_end(&self) -> bool {
        self.cursor >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.cursor).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.cursor + offset).copied()
    }

    fn bump(&mut self) {
        self.cursor += 1;
    }

    fn unexpected(&self) -> EncodingError {
        match self.peek() {
            Some(byte) => EncodingError::BadTypeEncoding {
                encoding: self.encoding.to_string(),
                position: self.cursor,
                token: byte as char,
            },
            None => EncodingError::UnexpectedEnd {
                encoding: self.encoding.to_string(),
                position: self.cursor,
            },
        }
    }

    fn expect(&mut self, byte: u8) -> EncodingResult<()> {
        if self.peek() == Some(byte) {
            self.bump();
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn skip_digits(&mut self) {
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.bump();
        }
    }

    fn read_number(&mut self) -> Option<usize> {
        let start = self.cursor;
        self.skip_digits();
        self.encoding[start..self.cursor].parse().ok()
    }

    fn read_name(&mut self) -> EncodingResult<String> {
        match self.peek() {
            Some(b'?') => {
                self.bump();
                return Ok("?".to_string());
            }
            Some(byte) if is_identifier_start(byte) => {}
            _ => return Err(self.unexpected()),
        }
        let start = self.cursor;
        while matches!(self.peek(), Some(byte) if is_identifier_rest(byte)) {
            self.bump();
        }
        Ok(self.encoding[start..self.cursor].to_string())
    }

    fn read_quoted_name(&mut self) -> EncodingResult<String> {
        self.expect(b'"')?;
        let name = self.read_name()?;
        self.expect(b'"')?;
        Ok(name)
    }

    /// Skip a quoted string without interpreting it, e.g. `"<NSCopying>"`
    fn skip_quoted(&mut self) -> EncodingResult<()> {
        self.expect(b'"')?;
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.bump();
                    return Ok(());
                }
                Some(_) => self.bump(),
                None => return Err(self.unexpected()),
            }
        }
    }

    /// Skip an extended block signature, e.g. `<v@?@"NSError">`
    fn skip_angle_block(&mut self) -> EncodingResult<()> {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                Some(b'<') => depth += 1,
                Some(b'>') => {
                    depth -= 1;
                    if depth == 0 {
                        self.bump();
                        return Ok(());
                    }
                }
                Some(b'"') => {
                    self.skip_quoted()?;
                    continue;
                }
                Some(_) => {}
                None => return Err(self.unexpected()),
            }
            self.bump();
        }
    }

    /// Whether a quoted string at the cursor is the class name of a
    /// preceding `@` rather than the next field's name.
    ///
    /// Inside a struct with named fields both are quoted; a class name is
    /// followed by another quoted name or by the end of the struct.
    fn quoted_is_class_name(&self, close: Option<u8>) -> bool {
        if close.is_none() {
            return true;
        }
        let mut offset = 1;
        loop {
            match self.peek_at(offset) {
                Some(b'"') => break,
                Some(_) => offset += 1,
                None => return true,
            }
        }
        let after = self.peek_at(offset + 1);
        after.is_none() || after == Some(b'"') || after == close
    }

    /// Read one complete type at the cursor
    pub fn read_type(&mut self) -> EncodingResult<TypeDescriptor> {
        self.read_type_in(None)
    }

    fn read_type_in(&mut self, close: Option<u8>) -> EncodingResult<TypeDescriptor> {
        while matches!(self.peek(), Some(byte) if QUALIFIERS.contains(&byte)) {
            self.bump();
        }
        let mut indirection: u8 = 0;
        while self.peek() == Some(b'^') {
            indirection = indirection.saturating_add(1);
            self.bump();
        }

        let token = self.peek().ok_or_else(|| self.unexpected())?;
        let ty = if let Some(kind) = PrimitiveKind::from_code(token) {
            self.bump();
            TypeDescriptor::Primitive(kind)
        } else {
            match token {
                b'#' => {
                    self.bump();
                    TypeDescriptor::Class
                }
                b':' => {
                    self.bump();
                    TypeDescriptor::Selector
                }
                b'?' => {
                    self.bump();
                    TypeDescriptor::UnknownOpaque
                }
                b'@' => {
                    self.bump();
                    if self.peek() == Some(b'?') {
                        self.bump();
                        if self.peek() == Some(b'<') {
                            self.skip_angle_block()?;
                        }
                        TypeDescriptor::Block
                    } else {
                        if self.peek() == Some(b'"') && self.quoted_is_class_name(close) {
                            self.skip_quoted()?;
                        }
                        TypeDescriptor::Object
                    }
                }
                b'[' => {
                    self.bump();
                    self.read_array()?
                }
                b'{' => {
                    self.bump();
                    self.read_aggregate(AggregateKind::Struct)?
                }
                b'(' => {
                    self.bump();
                    self.read_aggregate(AggregateKind::Union)?
                }
                b'b' => {
                    return Err(EncodingError::UnsupportedBitfield {
                        encoding: self.encoding.to_string(),
                        position: self.cursor,
                    })
                }
                _ => return Err(self.unexpected()),
            }
        };

        // stack offset
        self.skip_digits();

        Ok(if indirection > 0 {
            TypeDescriptor::pointer_to(ty, indirection)
        } else {
            ty
        })
    }

    fn read_array(&mut self) -> EncodingResult<TypeDescriptor> {
        let length_at = self.cursor;
        let length = match self.read_number() {
            Some(length) if length > 0 => length,
            _ => {
                return Err(EncodingError::InvalidArrayLength {
                    encoding: self.encoding.to_string(),
                    position: length_at,
                })
            }
        };
        let element = self.read_type()?;
        self.expect(b']')?;
        Ok(TypeDescriptor::Array {
            length,
            element: Box::new(element),
        })
    }

    fn read_aggregate(&mut self, kind: AggregateKind) -> EncodingResult<TypeDescriptor> {
        let start = self.cursor - 1;
        let close = kind.close() as u8;
        let name = self.read_name()?;

        match self.peek() {
            Some(b'=') => {
                self.bump();
                let named = self.peek() == Some(b'"');
                let mut fields = Vec::new();
                while let Some(byte) = self.peek() {
                    if byte == close {
                        break;
                    }
                    let field_name = if byte == b'"' {
                        Some(self.read_quoted_name()?)
                    } else {
                        None
                    };
                    let ty = self.read_type_in(named.then_some(close))?;
                    fields.push(StructField { name: field_name, ty });
                }
                self.expect(close)?;

                let definition = StructType::new(name, kind, fields);
                if definition.is_anonymous() {
                    return Ok(TypeDescriptor::Struct(Arc::new(definition)));
                }
                let encoding = &self.encoding[start..self.cursor];
                Ok(TypeDescriptor::Struct(self.registry.merge(definition, encoding)))
            }
            Some(byte) if byte == close => {
                self.bump();
                match self.registry.lookup(&name) {
                    Some(existing) => Ok(TypeDescriptor::Struct(existing)),
                    None => Err(EncodingError::UnresolvedStructReference {
                        encoding: self.encoding.to_string(),
                        name,
                    }),
                }
            }
            _ => Err(self.unexpected()),
        }
    }
}

/// Parse exactly one type; trailing input is an error
pub fn parse_one(encoding: &str, registry: &StructRegistry) -> EncodingResult<TypeDescriptor> {
    let mut parser = EncodingParser::new(encoding, registry);
    let ty = parser.read_type()?;
    if !parser.is_at_end() {
        return Err(parser.unexpected());
    }
    Ok(ty)
}

/// Parse a sequence of one or more types
pub fn parse_sequence(
    encoding: &str,
    registry: &StructRegistry,
) -> EncodingResult<Vec<TypeDescriptor>> {
    let mut parser = EncodingParser::new(encoding, registry);
    let mut types = vec![parser.read_type()?];
    while !parser.is_at_end() {
        types.push(parser.read_type()?);
    }
    Ok(types)
}

/// Remove stack offsets from a method encoding: `@24@0:8@16` becomes `@@:@`
///
/// Array lengths, bitfield widths and quoted names keep their digits.
pub fn strip_offsets(encoding: &str) -> String {
    let mut out = String::with_capacity(encoding.len());
    let mut in_quotes = false;
    let mut keep_digits = false;
    for ch in encoding.chars() {
        if in_quotes {
            in_quotes = ch != '"';
            out.push(ch);
            continue;
        }
        if ch.is_ascii_digit() {
            if keep_digits {
                out.push(ch);
            }
            continue;
        }
        keep_digits = matches!(ch, '[' | 'b');
        in_quotes = ch == '"';
        out.push(ch);
    }
    out
}

/// A method encoding split into its return type and argument types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodEncoding {
    /// Return type
    pub return_type: TypeDescriptor,
    /// Argument types, starting with the receiver and the selector
    pub arguments: Vec<TypeDescriptor>,
}

impl MethodEncoding {
    /// Parse a full method encoding such as `@24@0:8@16`
    pub fn parse(encoding: &str, registry: &StructRegistry) -> EncodingResult<Self> {
        let mut types = parse_sequence(encoding, registry)?.into_iter();
        // parse_sequence always yields at least one type
        let return_type = types.next().unwrap_or(TypeDescriptor::VOID);
        Ok(Self {
            return_type,
            arguments: types.collect(),
        })
    }

    /// Number of explicit arguments, excluding receiver and selector
    pub fn explicit_argument_count(&self) -> usize {
        self.arguments.len().saturating_sub(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(encoding: &str) -> EncodingResult<TypeDescriptor> {
        parse_one(encoding, &StructRegistry::new())
    }

    #[test]
    fn test_qualifiers_are_skipped() {
        let ty = parse("o^@").unwrap();
        assert!(ty.is_inout_reference());
        assert_eq!(parse("rr*").unwrap(), TypeDescriptor::Primitive(PrimitiveKind::CString));
    }

    #[test]
    fn test_trailing_input_rejected() {
        assert!(matches!(
            parse("ii"),
            Err(EncodingError::BadTypeEncoding { position: 1, token: 'i', .. })
        ));
    }

    #[test]
    fn test_unexpected_end() {
        assert!(matches!(parse("^"), Err(EncodingError::UnexpectedEnd { position: 1, .. })));
        assert!(matches!(parse("[4i"), Err(EncodingError::UnexpectedEnd { .. })));
    }

    #[test]
    fn test_quoted_class_name_in_struct() {
        let registry = StructRegistry::new();
        let ty = parse_one("{Pair=\"first\"@\"NSString\"\"second\"@}", &registry).unwrap();
        let TypeDescriptor::Struct(st) = ty else {
            panic!("expected struct");
        };
        assert_eq!(st.fields().len(), 2);
        assert_eq!(st.fields()[1].name.as_deref(), Some("second"));

        let ty = parse_one("{Obj=\"a\"@\"b\"i}", &registry).unwrap();
        let TypeDescriptor::Struct(st) = ty else {
            panic!("expected struct");
        };
        assert_eq!(st.field_index("b"), Some(1));
    }

    #[test]
    fn test_strip_offsets() {
        assert_eq!(strip_offsets("c40@0:8o^@16@24o^@32"), "c@:o^@@o^@");
        assert_eq!(strip_offsets("[12^f]8"), "[12^f]");
        assert_eq!(strip_offsets("{V2=\"x1\"d}16"), "{V2=\"x1\"d}");
    }
}

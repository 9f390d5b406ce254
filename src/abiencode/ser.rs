//! Solidity `abi.encode` for anything implementing [Serialize].
//!
//! Serialization happens in two steps. The serde data model is first
//! lowered into a [Token] tree, which knows for every node whether it is
//! static or dynamic. The tree is then written slot by slot, heads before
//! tails, as described in the Solidity ABI specification.
//!
//! Mapping of serde types:
//! - integers and `bool`: one right-aligned slot (`uintN`/`intN`/`bool`)
//! - `serialize_bytes`: static bytes, left-aligned and padded to full slots
//!   (`bytesN`; [Address][super::types::Address] and
//!   [U256][super::types::U256] pre-align themselves to 32 bytes)
//! - `str` and the `DYNAMIC_BYTES` newtype: dynamic `bytes`/`string`
//! - sequences (`Vec<T>`, slices): dynamic arrays `T[]`
//! - tuples, structs and `[T; N]`: tuples, dynamic only if a member is

use super::error::{Error, Result};
use serde::{
    ser::{self, Impossible, SerializeSeq, SerializeStruct, SerializeTuple, SerializeTupleStruct},
    Serialize,
};

/// Newtype name marking a byte slice as dynamic `bytes`.
///
/// The characters have no special meaning, they are chosen so that no
/// regular Rust type will ever have this name.
pub(super) const DYNAMIC_BYTES: &str = ":$&_DYNAMIC_BYTES";

const SLOT_SIZE: usize = 32; // bytes

/// Sink for the encoded output, one 32-byte slot per call.
pub trait Writer {
    fn write(&mut self, slot: &[u8]);
}

impl Writer for Vec<u8> {
    fn write(&mut self, slot: &[u8]) {
        self.extend_from_slice(slot);
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// A single slot.
    Word([u8; SLOT_SIZE]),
    /// Static bytes, padded to full slots on the right.
    Fixed(Vec<u8>),
    /// Dynamic `bytes` or `string`.
    Bytes(Vec<u8>),
    /// Dynamic array.
    Array(Vec<Token>),
    /// Tuple, struct or fixed-size array.
    Tuple(Vec<Token>),
}

fn padded_len(len: usize) -> usize {
    (len + SLOT_SIZE - 1) / SLOT_SIZE * SLOT_SIZE
}

fn write_usize<W: Writer>(writer: &mut W, v: usize) {
    let mut slot = [0u8; SLOT_SIZE];
    slot[SLOT_SIZE - 8..].copy_from_slice(&(v as u64).to_be_bytes());
    writer.write(&slot);
}

fn write_padded<W: Writer>(writer: &mut W, v: &[u8]) {
    for chunk in v.chunks(SLOT_SIZE) {
        let mut slot = [0u8; SLOT_SIZE];
        slot[..chunk.len()].copy_from_slice(chunk);
        writer.write(&slot);
    }
}

impl Token {
    fn is_dynamic(&self) -> bool {
        match self {
            Token::Word(_) | Token::Fixed(_) => false,
            Token::Bytes(_) | Token::Array(_) => true,
            Token::Tuple(members) => members.iter().any(Token::is_dynamic),
        }
    }

    /// Space taken in the head of the enclosing tuple: an offset for
    /// dynamic tokens, the whole encoding otherwise.
    fn head_size(&self) -> usize {
        if self.is_dynamic() {
            SLOT_SIZE
        } else {
            self.encoded_size()
        }
    }

    fn encoded_size(&self) -> usize {
        match self {
            Token::Word(_) => SLOT_SIZE,
            Token::Fixed(v) => padded_len(v.len()),
            Token::Bytes(v) => SLOT_SIZE + padded_len(v.len()),
            Token::Array(elements) => SLOT_SIZE + sequence_size(elements),
            Token::Tuple(members) => sequence_size(members),
        }
    }

    fn encode<W: Writer>(&self, writer: &mut W) {
        match self {
            Token::Word(slot) => writer.write(slot),
            Token::Fixed(v) => write_padded(writer, v),
            Token::Bytes(v) => {
                write_usize(writer, v.len());
                write_padded(writer, v);
            }
            Token::Array(elements) => {
                write_usize(writer, elements.len());
                encode_sequence(elements, writer);
            }
            Token::Tuple(members) => encode_sequence(members, writer),
        }
    }
}

fn sequence_size(tokens: &[Token]) -> usize {
    tokens
        .iter()
        .map(|t| {
            if t.is_dynamic() {
                SLOT_SIZE + t.encoded_size()
            } else {
                t.encoded_size()
            }
        })
        .sum()
}

/// Heads first (offsets are relative to the start of the sequence, not
/// counting the length slot of arrays), then the tails of dynamic members.
fn encode_sequence<W: Writer>(tokens: &[Token], writer: &mut W) {
    let mut offset: usize = tokens.iter().map(Token::head_size).sum();
    for token in tokens {
        if token.is_dynamic() {
            write_usize(writer, offset);
            offset += token.encoded_size();
        } else {
            token.encode(writer);
        }
    }
    for token in tokens.iter().filter(|t| t.is_dynamic()) {
        token.encode(writer);
    }
}

/// Write `abi.encode(value)` to the writer.
///
/// Like Solidity, a dynamic value is preceded by its offset (`0x20`), a
/// static one is written as is.
pub fn to_writer<T, W>(value: &T, writer: &mut W) -> Result<()>
where
    T: Serialize + ?Sized,
    W: Writer,
{
    let token = value.serialize(TokenSerializer)?;
    encode_sequence(core::slice::from_ref(&token), writer);
    Ok(())
}

/// Convenience wrapper around [to_writer] collecting into a buffer.
#[cfg(test)]
pub fn to_vec<T>(value: &T) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    let mut buf = Vec::new();
    to_writer(value, &mut buf)?;
    Ok(buf)
}

fn right_aligned(v: &[u8]) -> Token {
    let mut slot = [0u8; SLOT_SIZE];
    slot[SLOT_SIZE - v.len()..].copy_from_slice(v);
    Token::Word(slot)
}

fn signed(negative: bool, v: &[u8]) -> Token {
    let mut slot = [if negative { 0xff } else { 0x00 }; SLOT_SIZE];
    slot[SLOT_SIZE - v.len()..].copy_from_slice(v);
    Token::Word(slot)
}

struct TokenSerializer;

/// Collects the members of a sequence, tuple or struct.
struct Compound {
    tokens: Vec<Token>,
    dynamic_length: bool,
}

impl Compound {
    fn push<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.tokens.push(value.serialize(TokenSerializer)?);
        Ok(())
    }

    fn finish(self) -> Token {
        if self.dynamic_length {
            Token::Array(self.tokens)
        } else {
            Token::Tuple(self.tokens)
        }
    }
}

impl ser::Serializer for TokenSerializer {
    type Ok = Token;
    type Error = Error;

    type SerializeSeq = Compound;
    type SerializeTuple = Compound;
    type SerializeTupleStruct = Compound;
    type SerializeTupleVariant = Impossible<Token, Error>;
    type SerializeMap = Impossible<Token, Error>;
    type SerializeStruct = Compound;
    type SerializeStructVariant = Impossible<Token, Error>;

    fn serialize_bool(self, v: bool) -> Result<Token> {
        Ok(right_aligned(&[v as u8]))
    }

    fn serialize_i8(self, v: i8) -> Result<Token> {
        Ok(signed(v < 0, &v.to_be_bytes()))
    }

    fn serialize_i16(self, v: i16) -> Result<Token> {
        Ok(signed(v < 0, &v.to_be_bytes()))
    }

    fn serialize_i32(self, v: i32) -> Result<Token> {
        Ok(signed(v < 0, &v.to_be_bytes()))
    }

    fn serialize_i64(self, v: i64) -> Result<Token> {
        Ok(signed(v < 0, &v.to_be_bytes()))
    }

    fn serialize_i128(self, v: i128) -> Result<Token> {
        Ok(signed(v < 0, &v.to_be_bytes()))
    }

    fn serialize_u8(self, v: u8) -> Result<Token> {
        Ok(right_aligned(&v.to_be_bytes()))
    }

    fn serialize_u16(self, v: u16) -> Result<Token> {
        Ok(right_aligned(&v.to_be_bytes()))
    }

    fn serialize_u32(self, v: u32) -> Result<Token> {
        Ok(right_aligned(&v.to_be_bytes()))
    }

    fn serialize_u64(self, v: u64) -> Result<Token> {
        Ok(right_aligned(&v.to_be_bytes()))
    }

    fn serialize_u128(self, v: u128) -> Result<Token> {
        Ok(right_aligned(&v.to_be_bytes()))
    }

    fn serialize_f32(self, _: f32) -> Result<Token> {
        Err(Error::TypeNotRepresentable("f32"))
    }

    fn serialize_f64(self, _: f64) -> Result<Token> {
        Err(Error::TypeNotRepresentable("f64"))
    }

    fn serialize_char(self, _: char) -> Result<Token> {
        Err(Error::TypeNotYetSupported("char"))
    }

    fn serialize_str(self, v: &str) -> Result<Token> {
        Ok(Token::Bytes(v.as_bytes().to_vec()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Token> {
        Ok(Token::Fixed(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Token> {
        Err(Error::TypeNotRepresentable("none"))
    }

    fn serialize_some<T>(self, _: &T) -> Result<Token>
    where
        T: Serialize + ?Sized,
    {
        Err(Error::TypeNotRepresentable("some"))
    }

    fn serialize_unit(self) -> Result<Token> {
        Err(Error::TypeNotRepresentable("unit"))
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<Token> {
        Err(Error::TypeNotRepresentable("unit struct"))
    }

    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Result<Token> {
        Err(Error::TypeNotRepresentable("unit variant (enum)"))
    }

    fn serialize_newtype_struct<T>(self, name: &'static str, value: &T) -> Result<Token>
    where
        T: Serialize + ?Sized,
    {
        let token = value.serialize(TokenSerializer)?;
        if name != DYNAMIC_BYTES {
            return Ok(token);
        }
        match token {
            Token::Fixed(v) => Ok(Token::Bytes(v)),
            _ => Err(Error::Custom("as_bytes used on a non-byte value".into())),
        }
    }

    fn serialize_newtype_variant<T>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: &T,
    ) -> Result<Token>
    where
        T: Serialize + ?Sized,
    {
        Err(Error::TypeNotRepresentable("newtype variant (enum)"))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Compound> {
        Ok(Compound {
            tokens: Vec::with_capacity(len.unwrap_or_default()),
            dynamic_length: true,
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<Compound> {
        Ok(Compound {
            tokens: Vec::with_capacity(len),
            dynamic_length: false,
        })
    }

    fn serialize_tuple_struct(self, _: &'static str, len: usize) -> Result<Compound> {
        self.serialize_tuple(len)
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(Error::TypeNotRepresentable("tuple variant (enum)"))
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap> {
        Err(Error::TypeNotRepresentable("map"))
    }

    fn serialize_struct(self, _: &'static str, len: usize) -> Result<Compound> {
        self.serialize_tuple(len)
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(Error::TypeNotRepresentable("struct variant"))
    }
}

impl SerializeSeq for Compound {
    type Ok = Token;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.push(value)
    }

    fn end(self) -> Result<Token> {
        Ok(self.finish())
    }
}

impl SerializeTuple for Compound {
    type Ok = Token;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.push(value)
    }

    fn end(self) -> Result<Token> {
        Ok(self.finish())
    }
}

impl SerializeTupleStruct for Compound {
    type Ok = Token;
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.push(value)
    }

    fn end(self) -> Result<Token> {
        Ok(self.finish())
    }
}

impl SerializeStruct for Compound {
    type Ok = Token;
    type Error = Error;

    fn serialize_field<T>(&mut self, _: &'static str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.push(value)
    }

    fn end(self) -> Result<Token> {
        Ok(self.finish())
    }
}

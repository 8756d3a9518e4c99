use std::collections::BTreeMap;

use crate::error::Error;
use crate::value::BValue;

/// Decodes a single bencoded value from `input`.
///
/// Duplicate dictionary keys are always rejected (this is `decode`'s strict
/// mode — the encoder is always canonical, so round-tripping never produces
/// them, and no caller in this crawler has a legitimate use for tolerating
/// them). Trailing bytes after the first complete value are rejected too.
pub fn decode(input: &[u8]) -> Result<BValue, Error> {
    let mut cursor = Cursor { buf: input, pos: 0 };
    let value = decode_value(&mut cursor)?;
    if cursor.pos != input.len() {
        return Err(Error::TrailingBytes { offset: cursor.pos });
    }
    Ok(value)
}

/// Decodes a single bencoded value from the front of `input`, returning it
/// together with the number of bytes it consumed. Unlike `decode`, trailing
/// bytes are not an error — this is what a ut_metadata `data` message needs,
/// since the bencoded `{msg_type, piece, total_size}` header is immediately
/// followed by raw (non-bencoded) piece bytes with no separator.
pub fn decode_prefix(input: &[u8]) -> Result<(BValue, usize), Error> {
    let mut cursor = Cursor { buf: input, pos: 0 };
    let value = decode_value(&mut cursor)?;
    Ok((value, cursor.pos))
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Result<u8, Error> {
        self.buf
            .get(self.pos)
            .copied()
            .ok_or(Error::UnexpectedEof { offset: self.pos })
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.pos + n > self.buf.len() {
            return Err(Error::UnexpectedEof { offset: self.pos });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn expect(&mut self, byte: u8) -> Result<(), Error> {
        let found = self.peek()?;
        if found != byte {
            return Err(Error::UnexpectedByte {
                offset: self.pos,
                expected: byte,
                found,
            });
        }
        self.advance(1);
        Ok(())
    }
}

fn decode_value(cursor: &mut Cursor) -> Result<BValue, Error> {
    match cursor.peek()? {
        b'i' => decode_int(cursor).map(BValue::Int),
        b'l' => decode_list(cursor).map(BValue::List),
        b'd' => decode_dict(cursor).map(BValue::Dict),
        b'0'..=b'9' => decode_bytes(cursor).map(BValue::Bytes),
        found => Err(Error::InvalidLength {
            offset: cursor.pos,
            found,
        }),
    }
}

fn decode_bytes(cursor: &mut Cursor) -> Result<Vec<u8>, Error> {
    let len = decode_length_prefix(cursor)?;
    cursor.expect(b':')?;
    Ok(cursor.take(len)?.to_vec())
}

/// Reads the `<len>` part of `<len>:<bytes>`, rejecting a leading zero
/// (`03:foo` is not valid bencode; only a bare `0:` is).
fn decode_length_prefix(cursor: &mut Cursor) -> Result<usize, Error> {
    let start = cursor.pos;
    let first = cursor.peek()?;
    if !first.is_ascii_digit() {
        return Err(Error::InvalidLength {
            offset: cursor.pos,
            found: first,
        });
    }
    let mut end = cursor.pos;
    while let Some(byte) = cursor.buf.get(end).copied() {
        if !byte.is_ascii_digit() {
            break;
        }
        end += 1;
    }
    let digits = &cursor.buf[start..end];
    if digits.len() > 1 && digits[0] == b'0' {
        return Err(Error::LeadingZero { offset: start });
    }
    let text = std::str::from_utf8(digits).expect("ASCII digits are valid UTF-8");
    let value: usize = text.parse().map_err(|_| Error::InvalidLength {
        offset: start,
        found: digits[0],
    })?;
    cursor.pos = end;
    Ok(value)
}

fn decode_int(cursor: &mut Cursor) -> Result<i64, Error> {
    cursor.expect(b'i')?;
    let start = cursor.pos;
    let negative = cursor.peek()? == b'-';
    if negative {
        cursor.advance(1);
    }
    let digits_start = cursor.pos;
    let mut end = digits_start;
    loop {
        let byte = cursor.buf.get(end).copied().ok_or(Error::UnexpectedEof { offset: end })?;
        if byte == b'e' {
            break;
        }
        if !byte.is_ascii_digit() {
            return Err(Error::InvalidLength { offset: end, found: byte });
        }
        end += 1;
    }
    let digits = &cursor.buf[digits_start..end];
    if digits.is_empty() {
        return Err(Error::UnexpectedEof { offset: end });
    }
    if digits.len() > 1 && digits[0] == b'0' {
        return Err(Error::LeadingZero { offset: digits_start });
    }
    if negative && digits == b"0" {
        return Err(Error::NegativeZero { offset: start });
    }
    let text = std::str::from_utf8(&cursor.buf[start..end]).expect("validated ASCII");
    let value: i64 = text.parse().map_err(|_| Error::InvalidLength {
        offset: start,
        found: cursor.buf[start],
    })?;
    cursor.pos = end;
    cursor.expect(b'e')?;
    Ok(value)
}

fn decode_list(cursor: &mut Cursor) -> Result<Vec<BValue>, Error> {
    cursor.expect(b'l')?;
    let mut items = Vec::new();
    while cursor.peek()? != b'e' {
        items.push(decode_value(cursor)?);
    }
    cursor.advance(1);
    Ok(items)
}

fn decode_dict(cursor: &mut Cursor) -> Result<BTreeMap<Vec<u8>, BValue>, Error> {
    cursor.expect(b'd')?;
    let mut map = BTreeMap::new();
    while cursor.peek()? != b'e' {
        let key_offset = cursor.pos;
        let key = decode_bytes(cursor)?;
        let value = decode_value(cursor)?;
        if map.insert(key.clone(), value).is_some() {
            return Err(Error::DuplicateKey {
                offset: key_offset,
                key,
            });
        }
    }
    cursor.advance(1);
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_leading_zero_length() {
        assert_eq!(decode(b"03:foo"), Err(Error::LeadingZero { offset: 0 }));
    }

    #[test]
    fn rejects_negative_zero() {
        assert_eq!(decode(b"i-0e"), Err(Error::NegativeZero { offset: 0 }));
    }

    #[test]
    fn accepts_zero_int() {
        assert_eq!(decode(b"i0e").unwrap().as_int(), Some(0));
    }

    #[test]
    fn rejects_duplicate_keys() {
        let err = decode(b"d1:ai1e1:ai2ee").unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { .. }));
    }

    #[test]
    fn rejects_trailing_bytes() {
        assert_eq!(decode(b"i1eX"), Err(Error::TrailingBytes { offset: 3 }));
    }

    #[test]
    fn reports_offset_on_truncated_string() {
        assert_eq!(decode(b"5:ab"), Err(Error::UnexpectedEof { offset: 2 }));
    }

    #[test]
    fn decodes_nested_list_and_dict() {
        let value = decode(b"ld1:ali1ei2eee").unwrap();
        let list = value.as_list().unwrap();
        assert_eq!(list.len(), 1);
        let inner = list[0].get(b"a").unwrap().as_list().unwrap();
        assert_eq!(inner[0].as_int(), Some(1));
        assert_eq!(inner[1].as_int(), Some(2));
    }
}

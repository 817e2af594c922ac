//! Incremental `nom`-based RESP parser: malformed input becomes
//! `ProtocolError` rather than a retryable parse error, and bulk strings
//! over 512 MiB are rejected.

use super::{Value, MAX_BULK_LEN};
use crate::error::Error;
use nom::{
    bytes::streaming::{tag, take},
    character::streaming::{char, crlf, digit1},
    combinator::opt,
    multi::count,
    sequence::{preceded, terminated, tuple},
    IResult,
};

/// Outcome of attempting to parse one top-level value from `input`.
/// `None` means "need more bytes"; the caller must not advance its cursor.
pub(super) fn parse(input: &[u8]) -> Result<Option<(Value, usize)>, Error> {
    if input.is_empty() {
        return Ok(None);
    }
    let result = match input[0] {
        b'+' => parse_simple_string(input),
        b'-' => parse_error(input),
        b':' => parse_integer(input),
        b'$' => parse_bulk_string(input),
        b'*' => parse_array(input),
        other => {
            return Err(Error::ProtocolError(format!(
                "unexpected leading byte {:#04x} ('{}')",
                other, other as char
            )))
        }
    };
    match result {
        Ok((rest, value)) => {
            let consumed = input.len() - rest.len();
            Ok(Some((value, consumed)))
        }
        Err(nom::Err::Incomplete(_)) => Ok(None),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(Error::ProtocolError(format!(
            "malformed RESP frame: {:?}",
            e.code
        ))),
    }
}

fn line(input: &[u8]) -> IResult<&[u8], &[u8]> {
    terminated(nom::bytes::streaming::take_until("\r\n"), crlf)(input)
}

fn parse_decimal(bytes: &[u8]) -> Result<i64, Error> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| Error::ProtocolError("non-UTF8 decimal length/integer".into()))?;
    text.parse::<i64>()
        .map_err(|_| Error::ProtocolError(format!("invalid decimal token {:?}", text)))
}

fn read_signed_decimal(input: &[u8]) -> IResult<&[u8], i64> {
    let (rest, (sign, digits)) = tuple((opt(char('-')), digit1))(input)?;
    let magnitude: i64 = match parse_decimal(digits) {
        Ok(v) => v,
        Err(_) => {
            return Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Digit,
            )))
        }
    };
    Ok((rest, if sign.is_some() { -magnitude } else { magnitude }))
}

fn parse_simple_string(input: &[u8]) -> IResult<&[u8], Value> {
    let (rest, text) = preceded(tag("+"), line)(input)?;
    let s = String::from_utf8_lossy(text).into_owned();
    Ok((rest, Value::SimpleString(s)))
}

fn parse_error(input: &[u8]) -> IResult<&[u8], Value> {
    let (rest, text) = preceded(tag("-"), line)(input)?;
    let text = String::from_utf8_lossy(text);
    let mut parts = text.splitn(2, ' ');
    let kind = parts.next().unwrap_or("").to_owned();
    let message = parts.next().unwrap_or("").to_owned();
    Ok((rest, Value::Error(kind, message)))
}

fn parse_integer(input: &[u8]) -> IResult<&[u8], Value> {
    let (rest, n) = preceded(tag(":"), terminated(read_signed_decimal, crlf))(input)?;
    Ok((rest, Value::Integer(n)))
}

fn parse_bulk_string(input: &[u8]) -> IResult<&[u8], Value> {
    let (rest, len) = preceded(tag("$"), terminated(read_signed_decimal, crlf))(input)?;
    if len < 0 {
        if len != -1 {
            return Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Digit,
            )));
        }
        return Ok((rest, Value::BulkString(None)));
    }
    let len = len as usize;
    if len > MAX_BULK_LEN {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::TooLarge,
        )));
    }
    let (rest, body) = terminated(take(len), crlf)(rest)?;
    Ok((rest, Value::BulkString(Some(bytes::Bytes::copy_from_slice(body)))))
}

fn parse_array(input: &[u8]) -> IResult<&[u8], Value> {
    let (rest, len) = preceded(tag("*"), terminated(read_signed_decimal, crlf))(input)?;
    if len < 0 {
        if len != -1 {
            return Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Digit,
            )));
        }
        return Ok((rest, Value::Array(None)));
    }
    let (rest, items) = count(parse_one, len as usize)(rest)?;
    Ok((rest, Value::Array(Some(items))))
}

/// Dispatch used by `parse_array`'s recursion. Nesting is unbounded per spec;
/// this recurses with the call stack, which is acceptable for RESP's
/// realistic nesting depths (command arrays, pub/sub frames).
fn parse_one(input: &[u8]) -> IResult<&[u8], Value> {
    if input.is_empty() {
        return Err(nom::Err::Incomplete(nom::Needed::Unknown));
    }
    match input[0] {
        b'+' => parse_simple_string(input),
        b'-' => parse_error(input),
        b':' => parse_integer(input),
        b'$' => parse_bulk_string(input),
        b'*' => parse_array(input),
        _ => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_string() {
        let (value, n) = parse(b"+OK\r\n").unwrap().unwrap();
        assert_eq!(value, Value::SimpleString("OK".into()));
        assert_eq!(n, 5);
    }

    #[test]
    fn parses_error_with_kind_and_message() {
        let (value, _) = parse(b"-WRONGPASS invalid username-password pair\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(
            value,
            Value::Error(
                "WRONGPASS".into(),
                "invalid username-password pair".into()
            )
        );
    }

    #[test]
    fn parses_negative_integer() {
        let (value, _) = parse(b":-299\r\n").unwrap().unwrap();
        assert_eq!(value, Value::Integer(-299));
    }

    #[test]
    fn parses_null_bulk_string() {
        let (value, n) = parse(b"$-1\r\n").unwrap().unwrap();
        assert_eq!(value, Value::BulkString(None));
        assert_eq!(n, 5);
    }

    #[test]
    fn parses_bulk_string_binary_safe() {
        let (value, _) = parse(b"$3\r\n\r\n\x00\r\n").unwrap().unwrap();
        assert_eq!(
            value,
            Value::BulkString(Some(bytes::Bytes::from_static(b"\r\n\x00")))
        );
    }

    #[test]
    fn parses_nested_array() {
        let (value, _) = parse(b"*2\r\n$3\r\nfoo\r\n*1\r\n:1\r\n").unwrap().unwrap();
        assert_eq!(
            value,
            Value::Array(Some(vec![
                Value::BulkString(Some(bytes::Bytes::from_static(b"foo"))),
                Value::Array(Some(vec![Value::Integer(1)])),
            ]))
        );
    }

    #[test]
    fn parses_null_array() {
        let (value, _) = parse(b"*-1\r\n").unwrap().unwrap();
        assert_eq!(value, Value::Array(None));
    }

    #[test]
    fn incomplete_bulk_string_yields_none_without_consuming() {
        assert_eq!(parse(b"$5\r\nhel").unwrap(), None);
    }

    #[test]
    fn incomplete_header_yields_none() {
        assert_eq!(parse(b"*2\r\n:1\r\n").unwrap(), None);
        assert_eq!(parse(b"$5").unwrap(), None);
    }

    #[test]
    fn unknown_leading_byte_is_protocol_error() {
        assert!(parse(b"!nope\r\n").is_err());
    }

    #[test]
    fn oversized_bulk_string_is_protocol_error() {
        let header = format!("${}\r\n", super::MAX_BULK_LEN + 1);
        assert!(parse(header.as_bytes()).is_err());
    }

    #[test]
    fn non_numeric_length_is_protocol_error() {
        assert!(parse(b"$abc\r\n").is_err());
    }
}

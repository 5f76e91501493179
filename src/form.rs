//! `application/x-www-form-urlencoded` parsing and serialization in an
//! arbitrary ASCII-compatible charset.
//!
//! Percent-escaped byte runs are assembled and decoded with the given charset
//! rather than assumed to be UTF-8, so `%C7%D1` in EUC-KR yields `한`.
//! A `%` that is not followed by two hex digits is rejected with
//! [`DecodeError::MalformedEscape`] instead of being passed through.

use std::collections::HashMap;
use std::fmt;

use encoding_rs::Encoding;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::charset;
use crate::error::{DecodeError, EncodeError};

/// Ordered multi-valued form fields.
///
/// Names keep the order in which they were first seen; values keep the order
/// in which they occurred. A `None` value is a field sent without `=`, which is
/// distinct from `Some("")` (sent as `name=`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    entries: Vec<(String, Vec<Option<String>>)>,
    index: HashMap<String, usize>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Append a value under `name`, after any values already stored for it.
    pub fn add(&mut self, name: impl Into<String>, value: Option<String>) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&i) => self.entries[i].1.push(value),
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, vec![value]));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&[Option<String>]> {
        self.index.get(name).map(|&i| self.entries[i].1.as_slice())
    }

    /// First value for `name`; `None` when the field is missing or its first
    /// occurrence had no value.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)?.first()?.as_deref()
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Number of distinct field names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Option<String>])> {
        self.entries.iter().map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Flattened `(name, value)` pairs, grouped by name in first-seen order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.as_str(), v.as_deref())))
    }
}

impl FromIterator<(String, Option<String>)> for FormData {
    fn from_iter<I: IntoIterator<Item = (String, Option<String>)>>(iter: I) -> Self {
        let mut form = FormData::new();
        for (name, value) in iter {
            form.add(name, value);
        }
        form
    }
}

impl fmt::Display for FormData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, values)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}=[", name)?;
            for (j, value) in values.iter().enumerate() {
                if j > 0 {
                    f.write_str(", ")?;
                }
                f.write_str(value.as_deref().unwrap_or("null"))?;
            }
            f.write_str("]")?;
        }
        f.write_str("}")
    }
}

impl Serialize for FormData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, values) in self.iter() {
            map.serialize_entry(name, values)?;
        }
        map.end()
    }
}

/// Parse already-decoded form text, percent-decoding names and values with
/// `charset`.
///
/// Tokens are trimmed and empty ones skipped. Only the first `=` of a
/// token separates name from value.
pub fn parse_form(raw: &str, charset: &'static Encoding) -> Result<FormData, DecodeError> {
    let mut form = FormData::new();
    for pair in raw.split('&') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (name, value) = match pair.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (pair, None),
        };
        let name = percent_decode(name, charset)?;
        let value = value.map(|v| percent_decode(v, charset)).transpose()?;
        form.add(name, value);
    }
    Ok(form)
}

/// Decode one name or value: `+` becomes a space and `%XX` escapes become
/// bytes. Escaped bytes and literal ASCII are collected into one run and
/// decoded together with `charset`, since a multi-byte character may mix the
/// two (EUC-KR `똠` is `%8Cc`). Non-ASCII characters are kept as they are.
pub fn percent_decode(segment: &str, charset: &'static Encoding) -> Result<String, DecodeError> {
    if !segment.contains(['%', '+']) {
        return Ok(segment.to_string());
    }

    let bytes = segment.as_bytes();
    let mut out = String::with_capacity(segment.len());
    let mut pending: Vec<u8> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let mut byte = [0u8; 1];
                let digits = bytes.get(i + 1..i + 3).ok_or_else(|| malformed(segment, i))?;
                hex::decode_to_slice(digits, &mut byte).map_err(|_| malformed(segment, i))?;
                pending.push(byte[0]);
                i += 3;
            }
            b'+' => {
                pending.push(b' ');
                i += 1;
            }
            b if b.is_ascii() => {
                pending.push(b);
                i += 1;
            }
            _ => {
                flush_pending(&mut pending, &mut out, charset)?;
                let Some(ch) = segment[i..].chars().next() else { break };
                out.push(ch);
                i += ch.len_utf8();
            }
        }
    }
    flush_pending(&mut pending, &mut out, charset)?;
    Ok(out)
}

fn flush_pending(pending: &mut Vec<u8>, out: &mut String, charset: &'static Encoding) -> Result<(), DecodeError> {
    if !pending.is_empty() {
        out.push_str(&charset::decode(pending, charset)?);
        pending.clear();
    }
    Ok(())
}

fn malformed(segment: &str, position: usize) -> DecodeError {
    DecodeError::MalformedEscape { segment: segment.to_string(), position }
}

/// Serialize fields as a form body in `charset`. Fields without a value are
/// written as a bare name.
pub fn encode_form(form: &FormData, charset: &'static Encoding) -> Result<String, EncodeError> {
    let mut first = true;
    let mut out = String::new();
    for (name, value) in form.pairs() {
        if !first {
            out.push('&');
        } else {
            first = false;
        }
        out.push_str(&percent_encode(name, charset)?);
        if let Some(value) = value {
            out.push('=');
            out.push_str(&percent_encode(value, charset)?);
        }
    }
    Ok(out)
}

/// Percent-encode `text` as `charset` bytes; spaces become `+`.
pub fn percent_encode(text: &str, charset: &'static Encoding) -> Result<String, EncodeError> {
    let (bytes, _, had_unmappable) = charset.encode(text);
    if had_unmappable {
        let ch = text
            .chars()
            .find(|ch| charset.encode(ch.encode_utf8(&mut [0u8; 4])).2)
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        return Err(EncodeError::Unmappable { ch, charset: charset.name() });
    }
    // '%' itself is escaped as %25, so every %20 here came from a space
    Ok(urlencoding::encode_binary(&bytes).replace("%20", "+"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::EUC_KR;

    #[test]
    fn test_repeats_and_absent_values() {
        let form = parse_form("a=1&a=2&b", EUC_KR).unwrap();

        assert_eq!(form.len(), 2);
        assert_eq!(form.get("a"), Some(&[Some("1".to_string()), Some("2".to_string())][..]));
        assert_eq!(form.get("b"), Some(&[None][..]));
        assert_eq!(form.to_string(), "{a=[1, 2], b=[null]}");
    }

    #[test]
    fn test_empty_value_differs_from_absent() {
        let form = parse_form("name=&flag", EUC_KR).unwrap();

        assert_eq!(form.get("name"), Some(&[Some(String::new())][..]));
        assert_eq!(form.get("flag"), Some(&[None][..]));
        assert_eq!(form.first("name"), Some(""));
        assert_eq!(form.first("flag"), None);
    }

    #[test]
    fn test_blank_tokens_are_skipped() {
        let form = parse_form("&&a=1& &\t&b=2&", EUC_KR).unwrap();
        let names: Vec<&str> = form.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_tokens_are_trimmed() {
        let form = parse_form(" a=1 & b=2\r\n", EUC_KR).unwrap();
        let pairs: Vec<(&str, Option<&str>)> = form.pairs().collect();
        assert_eq!(pairs, vec![("a", Some("1")), ("b", Some("2"))]);
        assert_eq!(form.first("b"), Some("2"));
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_form("", EUC_KR).unwrap().is_empty());
    }

    #[test]
    fn test_only_first_equals_splits() {
        let form = parse_form("expr=a%3Db=c", EUC_KR).unwrap();
        assert_eq!(form.first("expr"), Some("a=b=c"));
    }

    #[test]
    fn test_key_order_follows_first_occurrence() {
        let form = parse_form("z=1&a=2&z=3", EUC_KR).unwrap();
        let pairs: Vec<(&str, Option<&str>)> = form.pairs().collect();
        assert_eq!(pairs, vec![("z", Some("1")), ("z", Some("3")), ("a", Some("2"))]);
    }

    #[test]
    fn test_plus_and_escaped_plus() {
        let form = parse_form("q=Hello+World&op=1%2B1", EUC_KR).unwrap();
        assert_eq!(form.first("q"), Some("Hello World"));
        assert_eq!(form.first("op"), Some("1+1"));
    }

    #[test]
    fn test_multibyte_escapes_use_charset() {
        let form = parse_form("text_kr=%C7%D1%B1%DB", EUC_KR).unwrap();
        assert_eq!(form.first("text_kr"), Some("한글"));

        // The same bytes read as UTF-8 are not valid
        assert!(parse_form("text_kr=%C7%D1%B1%DB", encoding_rs::UTF_8).is_err());
    }

    #[test]
    fn test_escape_followed_by_ascii_trail_byte() {
        // UHC characters often have an ASCII letter as their second byte
        let form = parse_form("t=%8Cc", EUC_KR).unwrap();
        assert_eq!(form.first("t"), Some("똠"));
    }

    #[test]
    fn test_extended_hangul_round_trip() {
        let form: FormData = vec![
            ("t".to_string(), Some("똠방각하".to_string())),
            ("햏".to_string(), Some("햏 햏".to_string())),
        ]
        .into_iter()
        .collect();

        let encoded = encode_form(&form, EUC_KR).unwrap();
        assert!(encoded.starts_with("t=%8Cc"));
        assert_eq!(parse_form(&encoded, EUC_KR).unwrap(), form);
    }

    #[test]
    fn test_escaped_name() {
        let form = parse_form("%C7%D1=1", EUC_KR).unwrap();
        assert_eq!(form.first("한"), Some("1"));
    }

    #[test]
    fn test_literal_characters_pass_through() {
        let form = parse_form("greeting=한글+%21", EUC_KR).unwrap();
        assert_eq!(form.first("greeting"), Some("한글 !"));
    }

    #[test]
    fn test_malformed_escapes() {
        match parse_form("a=%G1", EUC_KR) {
            Err(DecodeError::MalformedEscape { segment, position }) => {
                assert_eq!(segment, "%G1");
                assert_eq!(position, 0);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(parse_form("a=abc%4", EUC_KR), Err(DecodeError::MalformedEscape { position: 3, .. })));
        assert!(matches!(parse_form("a=%", EUC_KR), Err(DecodeError::MalformedEscape { .. })));
    }

    #[test]
    fn test_invalid_charset_sequence() {
        assert!(matches!(
            parse_form("a=%FF%FF", EUC_KR),
            Err(DecodeError::InvalidSequence { charset: "EUC-KR" })
        ));
    }

    #[test]
    fn test_percent_encode_euc_kr() {
        assert_eq!(percent_encode("한글", EUC_KR).unwrap(), "%C7%D1%B1%DB");
        assert_eq!(percent_encode("Hello World", EUC_KR).unwrap(), "Hello+World");
        assert_eq!(percent_encode("100%", EUC_KR).unwrap(), "100%25");
    }

    #[test]
    fn test_percent_encode_unmappable() {
        match percent_encode("a😀", EUC_KR) {
            Err(EncodeError::Unmappable { ch, charset }) => {
                assert_eq!(ch, '😀');
                assert_eq!(charset, "EUC-KR");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_encode_then_parse_preserves_fields() {
        let form: FormData = vec![
            ("text_en".to_string(), Some("Hello World".to_string())),
            ("text_kr".to_string(), Some("한글텍스트".to_string())),
            ("text_kr".to_string(), Some(String::new())),
            ("flag".to_string(), None),
            ("기호".to_string(), Some("a&b=c+d%e".to_string())),
        ]
        .into_iter()
        .collect();

        let encoded = encode_form(&form, EUC_KR).unwrap();
        assert!(encoded.is_ascii());
        assert_eq!(parse_form(&encoded, EUC_KR).unwrap(), form);
    }

    #[test]
    fn test_serialize_json() {
        let form = parse_form("a=1&a=2&b", EUC_KR).unwrap();
        let json = serde_json::to_value(&form).unwrap();
        assert_eq!(json, serde_json::json!({"a": ["1", "2"], "b": [null]}));
    }
}

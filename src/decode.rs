//! Attachment filename decoding: RFC 2047 encoded-words and path-safety
//! normalization.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::warn;

/// Decode a raw attachment filename header value into a usable string.
///
/// Decodes the first encoded-word (`=?charset?B|Q?data?=`) found in the
/// value, converting the decoded bytes with the declared charset. A missing
/// or unknown charset uses `fallback`; byte sequences that cannot be decoded
/// become U+FFFD. Embedded CR, LF and path separators are normalized to `_`
/// so the result is a single safe path component: a name like
/// `../escape.txt` must not reach past the output directory.
///
/// Never fails: malformed encoded-word metadata returns the literal input.
pub fn decode_filename(raw: &str, fallback: &'static encoding_rs::Encoding) -> String {
    let decoded = decode_first_encoded_word(raw, fallback).unwrap_or_else(|| raw.to_string());
    decoded.replace(['\n', '\r', '/', '\\'], "_")
}

/// Decode the first encoded-word in `raw`, splicing surrounding literal
/// text around the decoded text. `None` if no well-formed word is present.
fn decode_first_encoded_word(
    raw: &str,
    fallback: &'static encoding_rs::Encoding,
) -> Option<String> {
    let start = raw.find("=?")?;
    let word = try_decode_one_word(&raw[start + 2..], fallback)?;

    let mut result = String::with_capacity(raw.len());
    result.push_str(&raw[..start]);
    result.push_str(&word.text);
    result.push_str(&raw[start + 2 + word.consumed..]);
    Some(result)
}

struct DecodedWord {
    text: String,
    consumed: usize, // bytes consumed from the string *after* the initial "=?"
}

fn try_decode_one_word(s: &str, fallback: &'static encoding_rs::Encoding) -> Option<DecodedWord> {
    // Format: charset?encoding?encoded_text?=
    let first_q = s.find('?')?;
    let charset = &s[..first_q];

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let end = rest2.find("?=")?;
    let encoded_text = &rest2[..end];

    let total_consumed = first_q + 1 + second_q + 1 + end + 2;

    let bytes = match encoding.to_uppercase().as_str() {
        "B" => BASE64.decode(encoded_text).ok()?,
        "Q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    Some(DecodedWord {
        text: decode_charset(charset, &bytes, fallback),
        consumed: total_consumed,
    })
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                if let Ok(byte) = u8::from_str_radix(
                    std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("00"),
                    16,
                ) {
                    result.push(byte);
                    i += 3;
                } else {
                    result.push(b'=');
                    i += 1;
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Decode bytes using a named charset, with replacement characters for
/// undecodable sequences.
fn decode_charset(
    charset: &str,
    bytes: &[u8],
    fallback: &'static encoding_rs::Encoding,
) -> String {
    let encoding = if charset.is_empty() {
        fallback
    } else {
        match encoding_rs::Encoding::for_label(charset.as_bytes()) {
            Some(enc) => enc,
            None => {
                warn!(charset = charset, "Unknown charset, using fallback");
                fallback
            }
        }
    };
    let (decoded, _, _) = encoding.decode(bytes);
    decoded.into_owned()
}

//! Shared PDF object helpers used by image discovery and decoding.

use crate::{ExtractError, Result};
use lopdf::{Dictionary, Document, Object, Stream};

/// Follow `object` if it is an indirect reference, otherwise return it as is.
pub fn resolve<'a>(document: &'a Document, object: &'a Object) -> lopdf::Result<&'a Object> {
    match object.as_reference() {
        Ok(id) => document.get_object(id),
        Err(_) => Ok(object),
    }
}

/// Look up `key` in `dict` and resolve it to a dictionary, inline or indirect.
pub fn dict_entry<'a>(document: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    let value = dict.get(key).ok()?;
    resolve(document, value).ok()?.as_dict().ok()
}

/// Read an integer entry, following an indirect reference if necessary.
pub fn integer_entry(document: &Document, dict: &Dictionary, key: &[u8]) -> Option<i64> {
    let value = dict.get(key).ok()?;
    resolve(document, value).ok()?.as_i64().ok()
}

/// Read a boolean entry, treating a missing or malformed entry as `false`.
pub fn bool_entry(dict: &Dictionary, key: &[u8]) -> bool {
    dict.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

/// The full name of a filter, expanding the short forms inline images use.
pub fn canonical_filter(name: &str) -> &str {
    match name {
        "AHx" => "ASCIIHexDecode",
        "A85" => "ASCII85Decode",
        "LZW" => "LZWDecode",
        "Fl" => "FlateDecode",
        "RL" => "RunLengthDecode",
        "CCF" => "CCITTFaxDecode",
        "DCT" => "DCTDecode",
        other => other,
    }
}

/// Names listed in a stream's `/Filter` entry, which may be a single name or
/// an array of names, in their full spelling.
pub fn filter_names(document: &Document, dict: &Dictionary) -> Vec<String> {
    let Some(value) = dict.get(b"Filter").ok().and_then(|v| resolve(document, v).ok()) else {
        return Vec::new();
    };
    let names: Vec<&[u8]> = match value {
        Object::Name(n) => vec![n.as_slice()],
        Object::Array(items) => items
            .iter()
            .filter_map(|item| resolve(document, item).ok()?.as_name().ok())
            .collect(),
        _ => Vec::new(),
    };
    names
        .into_iter()
        .map(|n| canonical_filter(&String::from_utf8_lossy(n)).to_owned())
        .collect()
}

/// `/DecodeParms` for the filter at `index`. A single dictionary applies to
/// whichever filter asks; an array is matched up with `/Filter`.
fn decode_params<'a>(document: &'a Document, dict: &'a Dictionary, index: usize) -> Option<&'a Dictionary> {
    let value = dict
        .get(b"DecodeParms")
        .ok()
        .and_then(|v| resolve(document, v).ok())?;
    match value {
        Object::Dictionary(params) => Some(params),
        Object::Array(items) => resolve(document, items.get(index)?).ok()?.as_dict().ok(),
        _ => None,
    }
}

/// Run `content` through `filters` in order, using the parameters `dict`
/// gives for each one.
///
/// Flate, LZW and ASCII85 go through lopdf; ASCIIHex and RunLength are decoded
/// here. Any other filter yields [`ExtractError::UnsupportedImage`].
pub fn apply_filters(document: &Document, dict: &Dictionary, content: &[u8], filters: &[String]) -> Result<Vec<u8>> {
    let mut data = content.to_vec();
    for (i, filter) in filters.iter().enumerate() {
        data = match filter.as_str() {
            "ASCIIHexDecode" => decode_ascii_hex(&data)?,
            "RunLengthDecode" => decode_run_length(&data),
            "FlateDecode" | "LZWDecode" | "ASCII85Decode" => {
                let mut single = Dictionary::new();
                single.set("Filter", Object::Name(filter.as_bytes().to_vec()));
                if let Some(params) = decode_params(document, dict, i) {
                    single.set("DecodeParms", Object::Dictionary(params.clone()));
                }
                Stream::new(single, data).decompressed_content().map_err(|e| match e {
                    lopdf::Error::Unimplemented(what) => {
                        ExtractError::UnsupportedImage(format!("{filter}: {what}"))
                    }
                    other => ExtractError::ParseError(other),
                })?
            }
            other => return Err(ExtractError::UnsupportedImage(format!("{other} filter"))),
        };
    }
    Ok(data)
}

/// The decoded bytes of a stream: raw content when it has no `/Filter`,
/// otherwise the content passed through every listed filter.
pub fn stream_data(document: &Document, stream: &Stream) -> Result<Vec<u8>> {
    let filters = filter_names(document, &stream.dict);
    apply_filters(document, &stream.dict, &stream.content, &filters)
}

/// ASCIIHexDecode: pairs of hex digits up to `>`, whitespace ignored. A
/// trailing odd digit is padded with zero.
pub fn decode_ascii_hex(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;
    for &byte in data {
        if byte == b'>' {
            break;
        }
        if byte.is_ascii_whitespace() || byte == 0 {
            continue;
        }
        let nibble = (byte as char)
            .to_digit(16)
            .ok_or_else(|| ExtractError::InvalidImage(format!("invalid ASCIIHex byte 0x{byte:02x}")))?
            as u8;
        match high.take() {
            Some(h) => out.push(h << 4 | nibble),
            None => high = Some(nibble),
        }
    }
    if let Some(h) = high {
        out.push(h << 4);
    }
    Ok(out)
}

/// RunLengthDecode: a length byte below 128 copies the next `n + 1` bytes,
/// above 128 repeats the next byte `257 - n` times, and 128 ends the data.
pub fn decode_run_length(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut rest = data;
    while let Some((&length, tail)) = rest.split_first() {
        match length {
            128 => break,
            0..=127 => {
                let n = (usize::from(length) + 1).min(tail.len());
                out.extend_from_slice(&tail[..n]);
                rest = &tail[n..];
            }
            _ => {
                let Some((&byte, tail)) = tail.split_first() else {
                    break;
                };
                out.extend(std::iter::repeat(byte).take(257 - usize::from(length)));
                rest = tail;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn ascii_hex_skips_whitespace_and_pads_odd_digit() {
        assert_eq!(decode_ascii_hex(b"ff 00\n7").unwrap(), vec![0xff, 0x00, 0x70]);
        assert_eq!(decode_ascii_hex(b"4142>4344").unwrap(), b"AB".to_vec());
        assert!(decode_ascii_hex(b"zz").is_err());
    }

    #[test]
    fn run_length_copies_and_repeats() {
        // literal run of 2, repeat of 3, end marker, ignored tail
        let encoded = [1, b'a', b'b', 254, b'c', 128, b'x'];
        assert_eq!(decode_run_length(&encoded), b"abccc".to_vec());
    }

    #[test]
    fn abbreviated_filters_are_expanded() {
        let doc = Document::new();
        let dict = dictionary! {
            "Filter" => vec![Object::Name(b"AHx".to_vec()), Object::Name(b"RL".to_vec())],
        };
        assert_eq!(filter_names(&doc, &dict), vec!["ASCIIHexDecode", "RunLengthDecode"]);
    }

    #[test]
    fn filters_are_chained_in_order() {
        let doc = Document::new();
        let stream = Stream::new(
            dictionary! {
                "Filter" => vec![Object::Name(b"ASCIIHexDecode".to_vec()), Object::Name(b"RunLengthDecode".to_vec())],
            },
            b"02 41 42 43 FD 44 80>".to_vec(),
        );
        assert_eq!(stream_data(&doc, &stream).unwrap(), b"ABCDDDD".to_vec());
    }

    #[test]
    fn unknown_filter_is_unsupported() {
        let doc = Document::new();
        let stream = Stream::new(dictionary! { "Filter" => "Crypt" }, vec![0]);
        let err = stream_data(&doc, &stream).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedImage(_)), "{err}");
    }
}

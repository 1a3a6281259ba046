//! Reader for the tstprj binary stream.
//!
//! The stream is a flat pre-order walk of the tree with implicit scoping:
//! each node is `key 0x00 lenOfLen len ...`, where the casing of the key's
//! first letter decides the shape (uppercase = element, lowercase =
//! attribute). An element's `len` is its declared attribute count; a
//! child-count header (a byte below 0x10 plus a little-endian count)
//! follows once its attributes are in place. Runs of 0x00 close every
//! element whose declared slots are all filled.
//!
//! The reader is a push-down automaton over an explicit stack of
//! `(node, expected attrs, expected children)` frames. Malformed or
//! truncated input yields an error; no partial tree escapes.

use log::{debug, trace, warn};

use crate::bytes::{self, TERMINATOR};
use crate::error::{Error, Result};
use crate::model::{AttrType, AttrValue, Attribute, NodeId, Tree};

/// Parses a raw project buffer into a tree.
pub fn parse(data: &[u8]) -> Result<Tree> {
    Parser::new(data).parse()
}

#[derive(Debug)]
pub struct Parser<'a> {
    data: &'a [u8],
}

struct Frame {
    node: NodeId,
    attrs_expected: Option<usize>,
    children_expected: Option<usize>,
}

impl Frame {
    // The synthetic root never declares counts and is never popped.
    fn done(&self, tree: &Tree) -> bool {
        match (self.attrs_expected, self.children_expected) {
            (Some(a), Some(c)) => {
                tree.attributes(self.node).len() == a && tree.children(self.node).len() == c
            }
            _ => false,
        }
    }
}

impl<'a> Parser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn parse(self) -> Result<Tree> {
        let data = self.data;
        if data.is_empty() {
            return Err(Error::Empty);
        }
        debug!("parsing project stream of {} bytes", data.len());

        let mut tree = Tree::new();
        let mut stack = vec![Frame {
            node: tree.root(),
            attrs_expected: None,
            children_expected: None,
        }];
        let mut idx = 0usize;

        while idx < data.len() {
            // Unwind: each terminator closes every frame whose declared
            // slots are exactly filled.
            while idx < data.len() && data[idx] == TERMINATOR {
                while stack.len() > 1 {
                    match stack.last() {
                        Some(top) if top.done(&tree) => {
                            stack.pop();
                        }
                        _ => break,
                    }
                }
                idx += 1;
            }
            if idx >= data.len() {
                break;
            }

            // Child-count header for the element on top of the stack.
            if data[idx] < 0x10 {
                let lol = data[idx] as usize;
                let count = bytes::decode_uint(self.slice(idx + 1, lol, "child count")?)? as usize;
                if let Some(top) = stack.last_mut() {
                    top.children_expected = Some(count);
                }
                idx += 1 + lol;
            }

            // Key runs to the next terminator; none left means end of stream.
            let Some(sig) = bytes::find_pattern(data, &[TERMINATOR], idx) else {
                break;
            };
            let key = bytes::decode_utf8(&data[idx..sig], "node key")?;
            let lol = self.byte(sig + 1, "length of length")? as usize;
            let len = bytes::decode_uint(self.slice(sig + 2, lol, "length field")?)? as usize;
            let body = sig + 2 + lol;

            if key.chars().next().is_some_and(|c| c.is_ascii_lowercase()) {
                let value = self.read_attribute_value(key, body, len)?;
                if let Some(top) = stack.last() {
                    tree.push_attribute(top.node, Attribute::new(key, value));
                }
                idx = body + len;
            } else {
                let parent = match stack.last() {
                    Some(top) => top.node,
                    None => break,
                };
                let child = tree.add_child(parent, key);
                trace!("element {:?} with {} declared attributes", key, len);
                stack.push(Frame {
                    node: child,
                    attrs_expected: Some(len),
                    children_expected: Some(0),
                });
                idx = body;
            }
        }

        if tree.document_root().is_none() {
            return Err(Error::MissingRoot);
        }
        debug!("parsed {} nodes", tree.len());
        Ok(tree)
    }

    /// Decodes one attribute payload. `len` counts the type byte plus the
    /// payload; the string payload additionally carries a trailing
    /// terminator.
    fn read_attribute_value(&self, key: &str, body: usize, len: usize) -> Result<AttrValue> {
        let tag = self.byte(body, "type discriminant")?;
        let payload_len = len.checked_sub(1).ok_or(Error::Truncated {
            context: "attribute payload",
            offset: body,
        })?;
        let payload = self.slice(body + 1, payload_len, "attribute payload")?;
        let attr_type = AttrType::from_tag(tag).ok_or_else(|| Error::UnknownAttributeType {
            key: key.to_string(),
            tag,
            offset: body,
        })?;
        match attr_type {
            AttrType::Int => {
                if payload.len() > 4 {
                    return Err(Error::UintWidth { len: payload.len() });
                }
                let raw = bytes::decode_uint(payload)?;
                // Sign-extend only a full-width payload; narrower ones come
                // from minimal-width writers and are small non-negatives.
                if payload.len() < 4 {
                    warn!(
                        "int attribute {:?} has a {}-byte payload",
                        key,
                        payload.len()
                    );
                }
                let v = if payload.len() == 4 {
                    raw as u32 as i32
                } else {
                    raw as i32
                };
                Ok(AttrValue::Int(v))
            }
            AttrType::Double => Ok(AttrValue::Double(bytes::decode_f64(payload)?)),
            AttrType::String => {
                let text = payload.strip_suffix(&[TERMINATOR]).ok_or(Error::Truncated {
                    context: "string terminator",
                    offset: body + len,
                })?;
                Ok(AttrValue::Str(
                    bytes::decode_utf8(text, "string attribute")?.to_string(),
                ))
            }
        }
    }

    fn byte(&self, i: usize, context: &'static str) -> Result<u8> {
        self.data
            .get(i)
            .copied()
            .ok_or(Error::Truncated { context, offset: i })
    }

    fn slice(&self, start: usize, len: usize, context: &'static str) -> Result<&'a [u8]> {
        let end = start.checked_add(len).ok_or(Error::Truncated {
            context,
            offset: start,
        })?;
        self.data.get(start..end).ok_or(Error::Truncated {
            context,
            offset: start,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Hand-built stream pieces, so the parser is tested independently of
    // the writer.
    fn push_key(out: &mut Vec<u8>, key: &str) {
        out.extend_from_slice(key.as_bytes());
        out.push(0x00);
    }

    fn push_len(out: &mut Vec<u8>, len: &[u8]) {
        out.push(len.len() as u8);
        out.extend_from_slice(len);
    }

    fn push_int_attr(out: &mut Vec<u8>, key: &str, raw: &[u8]) {
        push_key(out, key);
        push_len(out, &[(raw.len() + 1) as u8]);
        out.push(0x01);
        out.extend_from_slice(raw);
    }

    fn push_str_attr(out: &mut Vec<u8>, key: &str, value: &str) {
        push_key(out, key);
        push_len(out, &[(value.len() + 2) as u8]);
        out.push(0x05);
        out.extend_from_slice(value.as_bytes());
        out.push(0x00);
    }

    fn push_double_attr(out: &mut Vec<u8>, key: &str, value: f64) {
        push_key(out, key);
        push_len(out, &[9]);
        out.push(0x04);
        out.extend_from_slice(&value.to_le_bytes());
    }

    fn sample_doc() -> Vec<u8> {
        // Song(bpm=120.0)[Track(index=1, name="lead"), Track(index=-1)]
        let mut out = Vec::new();
        push_key(&mut out, "Song");
        push_len(&mut out, &[1]); // one attribute
        push_double_attr(&mut out, "bpm", 120.0);
        push_len(&mut out, &[2]); // two children
        push_key(&mut out, "Track");
        push_len(&mut out, &[2]);
        push_int_attr(&mut out, "index", &[0x01, 0x00, 0x00, 0x00]);
        push_str_attr(&mut out, "name", "lead");
        out.push(0x00); // Track 1 has no children
        push_key(&mut out, "Track");
        push_len(&mut out, &[1]);
        push_int_attr(&mut out, "index", &[0xff, 0xff, 0xff, 0xff]);
        out.push(0x00);
        out
    }

    #[test]
    fn parse_sample_document() {
        let tree = parse(&sample_doc()).unwrap();
        let song = tree.document_root().unwrap();
        assert_eq!(tree.key(song), "Song");
        assert_eq!(
            tree.attribute(song, "bpm").unwrap().value(),
            &AttrValue::Double(120.0)
        );

        let tracks = tree.children(song);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tree.key(tracks[0]), "Track");
        assert_eq!(
            tree.attribute(tracks[0], "index").unwrap().value(),
            &AttrValue::Int(1)
        );
        assert_eq!(
            tree.attribute(tracks[0], "name").unwrap().value(),
            &AttrValue::Str("lead".into())
        );
        assert_eq!(
            tree.attribute(tracks[1], "index").unwrap().value(),
            &AttrValue::Int(-1)
        );
    }

    #[test]
    fn parse_zero_attribute_element() {
        // "Solo" with no attributes and no children: lenOfLen 0x00, then
        // the closing terminator.
        let mut out = Vec::new();
        push_key(&mut out, "Solo");
        out.push(0x00); // attr count: empty encoding, lenOfLen 0
        out.push(0x00); // close
        let tree = parse(&out).unwrap();
        let root = tree.document_root().unwrap();
        assert_eq!(tree.key(root), "Solo");
        assert!(tree.attributes(root).is_empty());
        assert!(tree.children(root).is_empty());
    }

    #[test]
    fn narrow_int_payload_tolerated() {
        // A minimal-width writer may emit fewer than 4 bytes for small
        // values; the value decodes without sign extension.
        let mut out = Vec::new();
        push_key(&mut out, "Song");
        push_len(&mut out, &[1]);
        push_int_attr(&mut out, "index", &[0x05, 0x00, 0x00]);
        out.push(0x00);
        let tree = parse(&out).unwrap();
        let song = tree.document_root().unwrap();
        assert_eq!(
            tree.attribute(song, "index").unwrap().value(),
            &AttrValue::Int(5)
        );
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(parse(&[]), Err(Error::Empty)));
    }

    #[test]
    fn stream_without_terminator_has_no_root() {
        assert!(matches!(parse(b"Song"), Err(Error::MissingRoot)));
    }

    #[test]
    fn truncated_length_field() {
        let mut out = Vec::new();
        out.extend_from_slice(b"Song");
        out.push(0x00);
        out.push(0x04); // claims a 4-byte length, stream ends after 1
        out.push(0x02);
        assert!(matches!(parse(&out), Err(Error::Truncated { .. })));
    }

    #[test]
    fn truncated_string_payload() {
        let mut out = Vec::new();
        push_key(&mut out, "Song");
        push_len(&mut out, &[1]);
        push_key(&mut out, "name");
        push_len(&mut out, &[10]); // declares more payload than remains
        out.push(0x05);
        out.extend_from_slice(b"hi");
        assert!(matches!(parse(&out), Err(Error::Truncated { .. })));
    }

    #[test]
    fn unknown_type_tag() {
        let mut out = Vec::new();
        push_key(&mut out, "Song");
        push_len(&mut out, &[1]);
        push_key(&mut out, "x");
        push_len(&mut out, &[2]);
        out.push(0x07); // not a defined discriminant
        out.push(0x01);
        out.push(0x00);
        assert!(matches!(
            parse(&out),
            Err(Error::UnknownAttributeType { tag: 0x07, .. })
        ));
    }

    #[test]
    fn short_float_payload() {
        let mut out = Vec::new();
        push_key(&mut out, "Song");
        push_len(&mut out, &[1]);
        push_key(&mut out, "bpm");
        push_len(&mut out, &[5]); // 4-byte payload, doubles need 8
        out.push(0x04);
        out.extend_from_slice(&[0, 0, 0, 0]);
        out.push(0x00);
        assert!(matches!(parse(&out), Err(Error::FloatWidth { got: 4 })));
    }

    #[test]
    fn invalid_utf8_key() {
        let mut out = Vec::new();
        out.extend_from_slice(&[0xff, 0xfe]);
        out.push(0x00);
        push_len(&mut out, &[0]);
        assert!(matches!(parse(&out), Err(Error::InvalidUtf8 { .. })));
    }
}

//! Writer for the tstprj binary stream, the mirror of `binfmt`.
//!
//! Per element: key, terminator, attribute count (zero encodes as the empty
//! buffer so its length-of-length byte alone marks "zero declared"), the
//! attributes, then either a child-count field plus the children or a
//! single closing terminator. Per attribute: key, terminator, a length
//! field covering the type byte plus the payload, the type byte, the
//! payload (int fixed 4 LE, float fixed 8 LE, string UTF-8 plus trailing
//! terminator).
//!
//! Keys are validated against the wire contract before anything is
//! emitted: a caller never receives a truncated buffer.

use log::debug;

use crate::bytes::{self, TERMINATOR};
use crate::error::{Error, Result};
use crate::model::{AttrValue, Attribute, NodeId, Tree};

/// Serializes the document root of `tree` back to bytes.
///
/// Every parsed markup attribute is re-flattened into its string value
/// first, so a mutated derived tree can never go stale against the bytes.
pub fn serialize_tree(tree: &mut Tree) -> Result<Vec<u8>> {
    for id in 0..tree.len() {
        for attr in tree.attributes_mut(id) {
            if attr.markup().is_some() {
                attr.flatten_markup();
            }
        }
    }
    let root = tree.document_root().ok_or(Error::MissingRoot)?;
    serialize_element(tree, root)
}

/// Serializes a single element subtree. The tree is not re-flattened;
/// use [`serialize_tree`] for whole documents.
pub fn serialize_element(tree: &Tree, id: NodeId) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    w.element(tree, id)?;
    debug!("serialized {:?} into {} bytes", tree.key(id), w.out.len());
    Ok(w.out)
}

struct Writer {
    out: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self {
            out: Vec::with_capacity(1024),
        }
    }

    fn element(&mut self, tree: &Tree, id: NodeId) -> Result<()> {
        if tree.is_text(id) {
            return Err(Error::InvalidKey {
                key: String::new(),
                reason: "text nodes cannot appear in a project tree",
            });
        }
        let key = tree.key(id);
        check_key(key, true)?;
        self.key(key);

        let attrs = tree.attributes(id);
        let count = bytes::encode_uint(attrs.len() as u64, true);
        self.out.push(count.len() as u8);
        self.out.extend_from_slice(&count);
        for attr in attrs {
            self.attribute(attr)?;
        }

        let children = tree.children(id);
        if children.is_empty() {
            self.out.push(TERMINATOR);
        } else {
            let count = bytes::encode_uint(children.len() as u64, false);
            self.out.push(count.len() as u8);
            self.out.extend_from_slice(&count);
            for &child in children {
                self.element(tree, child)?;
            }
        }
        Ok(())
    }

    fn attribute(&mut self, attr: &Attribute) -> Result<()> {
        check_key(attr.key(), false)?;
        let payload = match attr.value() {
            AttrValue::Int(n) => bytes::encode_i32(*n).to_vec(),
            AttrValue::Double(x) => bytes::encode_f64(*x).to_vec(),
            AttrValue::Str(s) => bytes::concat(&[s.as_bytes(), &[TERMINATOR]]),
        };
        let len = bytes::encode_uint(payload.len() as u64 + 1, false);
        self.key(attr.key());
        self.out.push(len.len() as u8);
        self.out.extend_from_slice(&len);
        self.out.push(attr.attr_type().tag());
        self.out.extend_from_slice(&payload);
        Ok(())
    }

    fn key(&mut self, key: &str) {
        self.out.extend_from_slice(key.as_bytes());
        self.out.push(TERMINATOR);
    }
}

fn check_key(key: &str, element: bool) -> Result<()> {
    let Some(first) = key.chars().next() else {
        return Err(Error::InvalidKey {
            key: key.to_string(),
            reason: "empty key",
        });
    };
    if key.bytes().any(|b| b == TERMINATOR) {
        return Err(Error::InvalidKey {
            key: key.to_string(),
            reason: "key contains a NUL byte",
        });
    }
    // The casing is the wire format's only shape signal.
    if element && first.is_ascii_lowercase() {
        return Err(Error::InvalidKey {
            key: key.to_string(),
            reason: "element keys must not start with a lowercase letter",
        });
    }
    if !element && !first.is_ascii_lowercase() {
        return Err(Error::InvalidKey {
            key: key.to_string(),
            reason: "attribute keys must start with a lowercase letter",
        });
    }
    Ok(())
}

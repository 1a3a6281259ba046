//! JSON projection of a tree, for piping into other tooling.
//!
//! Objects carry `attributes` and `children` as arrays, not maps: the wire
//! format allows repeated keys and the order is load-bearing, so a map
//! would lose information.

use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::model::{AttrType, AttrValue, Tree, NodeId};

/// JSON for the document root of `tree`.
pub fn document_json(tree: &Tree) -> Result<Value> {
    let root = tree.document_root().ok_or(Error::MissingRoot)?;
    Ok(node_json(tree, root))
}

/// JSON for one node. Text nodes become `{"text": ...}`; elements carry
/// key, attributes and children.
pub fn node_json(tree: &Tree, id: NodeId) -> Value {
    if let Some(text) = tree.text(id) {
        return json!({ "text": text });
    }
    let attributes: Vec<Value> = tree
        .attributes(id)
        .iter()
        .map(|attr| {
            json!({
                "key": attr.key(),
                "type": type_name(attr.attr_type()),
                "value": value_json(attr.value()),
            })
        })
        .collect();
    let children: Vec<Value> = tree
        .children(id)
        .iter()
        .map(|&child| node_json(tree, child))
        .collect();
    json!({
        "key": tree.key(id),
        "attributes": attributes,
        "children": children,
    })
}

fn type_name(t: AttrType) -> &'static str {
    match t {
        AttrType::Int => "int",
        AttrType::Double => "double",
        AttrType::String => "string",
    }
}

fn value_json(value: &AttrValue) -> Value {
    match value {
        AttrValue::Int(n) => json!(n),
        AttrValue::Double(x) => json!(x),
        AttrValue::Str(s) => json!(s),
    }
}

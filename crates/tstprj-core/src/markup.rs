//! The markup dialect embedded in `tsml` string attributes.
//!
//! A fragment is a sequence of elements (`<Key a="v">...</Key>`,
//! self-closing `<Key />`) and text runs. Only the five named entities
//! exist; there are no declarations, comments, CDATA or processing
//! instructions. Text runs and attribute values are entity-unescaped at
//! parse time and held raw in the tree; rendering with `escape = true`
//! re-escapes them, so an unmodified fragment round-trips through the
//! escaped form.
//!
//! The derived tree hangs under a synthetic `tsml` element so a fragment
//! with several top-level nodes still has a single document root.

use log::trace;

use crate::error::{Error, Result};
use crate::model::{AttrValue, Attribute, NodeId, Tree, MARKUP_KEY};

const ENTITIES: [(char, &str); 4] = [
    ('<', "&lt;"),
    ('>', "&gt;"),
    ('"', "&quot;"),
    ('\'', "&apos;"),
];

/// Escapes markup metacharacters. `&` goes first so already-escaped
/// input does not get its entities mangled twice.
pub fn escape_text(text: &str) -> String {
    let mut out = text.replace('&', "&amp;");
    for (ch, entity) in ENTITIES {
        out = out.replace(ch, entity);
    }
    out
}

/// Inverse of [`escape_text`]; `&amp;` resolves last.
pub fn unescape_text(text: &str) -> String {
    let mut out = text.to_string();
    for (ch, entity) in ENTITIES {
        out = out.replace(entity, &ch.to_string());
    }
    out.replace("&amp;", "&")
}

/// Parses a markup fragment into a derived tree.
///
/// The fragment's top-level nodes become children of a synthetic `tsml`
/// document root.
pub fn parse_fragment(src: &str) -> Result<Tree> {
    let mut tree = Tree::new();
    let wrap = tree.add_child(tree.root(), MARKUP_KEY);
    let mut parser = Parser { src, pos: 0 };
    parser.nodes(&mut tree, wrap)?;
    if parser.pos < src.len() {
        // Only a stray close tag can stop `nodes` before the end.
        return Err(parser.error("closing tag without a matching open tag"));
    }
    trace!("parsed markup fragment of {} bytes", src.len());
    Ok(tree)
}

/// Renders the fragment held by a derived tree: the concatenation of the
/// document root's children, without the synthetic wrapper itself.
pub fn fragment_text(tree: &Tree, escape: bool) -> String {
    let mut out = String::new();
    if let Some(wrap) = tree.document_root() {
        for &child in tree.children(wrap) {
            render(tree, child, escape, &mut out);
        }
    }
    out
}

/// Renders one markup node as text. Childless elements render
/// self-closing, with a space before the slash.
pub fn element_text(tree: &Tree, id: NodeId, escape: bool) -> String {
    let mut out = String::new();
    render(tree, id, escape, &mut out);
    out
}

fn render(tree: &Tree, id: NodeId, escape: bool, out: &mut String) {
    if let Some(text) = tree.text(id) {
        if escape {
            out.push_str(&escape_text(text));
        } else {
            out.push_str(text);
        }
        return;
    }
    out.push('<');
    out.push_str(tree.key(id));
    for attr in tree.attributes(id) {
        out.push(' ');
        out.push_str(attr.key());
        out.push_str("=\"");
        let value = attr.value().to_string();
        if escape {
            out.push_str(&escape_text(&value));
        } else {
            out.push_str(&value);
        }
        out.push('"');
    }
    let children = tree.children(id);
    if children.is_empty() {
        out.push_str(" />");
        return;
    }
    out.push('>');
    for &child in children {
        render(tree, child, escape, out);
    }
    out.push_str("</");
    out.push_str(tree.key(id));
    out.push('>');
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    /// Parses sibling nodes under `parent` until a closing tag or the end
    /// of input. Leaves `pos` at the `</` of an unconsumed closing tag.
    fn nodes(&mut self, tree: &mut Tree, parent: NodeId) -> Result<()> {
        while self.pos < self.src.len() {
            if self.rest().starts_with("</") {
                return Ok(());
            }
            if self.rest().starts_with('<') {
                self.element(tree, parent)?;
            } else {
                self.text(tree, parent);
            }
        }
        Ok(())
    }

    fn text(&mut self, tree: &mut Tree, parent: NodeId) {
        let end = self
            .rest()
            .find('<')
            .map_or(self.src.len(), |i| self.pos + i);
        tree.add_text(parent, unescape_text(&self.src[self.pos..end]));
        self.pos = end;
    }

    fn element(&mut self, tree: &mut Tree, parent: NodeId) -> Result<()> {
        self.pos += 1; // '<'
        let name = self.name("element name")?;
        let id = tree.add_child(parent, name.to_string());

        loop {
            self.skip_whitespace();
            if self.rest().starts_with("/>") {
                self.pos += 2;
                return Ok(());
            }
            if self.rest().starts_with('>') {
                self.pos += 1;
                break;
            }
            if self.pos >= self.src.len() {
                return Err(self.error("unterminated opening tag"));
            }
            self.attribute(tree, id)?;
        }

        self.nodes(tree, id)?;
        if !self.rest().starts_with("</") {
            return Err(self.error("unterminated element"));
        }
        self.pos += 2;
        let close = self.name("closing tag name")?;
        if close != tree.key(id) {
            return Err(Error::Markup {
                offset: self.pos,
                message: format!(
                    "mismatched closing tag: expected {:?}, found {:?}",
                    tree.key(id),
                    close
                ),
            });
        }
        self.skip_whitespace();
        if !self.rest().starts_with('>') {
            return Err(self.error("unterminated closing tag"));
        }
        self.pos += 1;
        Ok(())
    }

    fn attribute(&mut self, tree: &mut Tree, id: NodeId) -> Result<()> {
        let key = self.name("attribute name")?.to_string();
        self.skip_whitespace();
        if !self.rest().starts_with('=') {
            return Err(self.error("expected '=' after attribute name"));
        }
        self.pos += 1;
        self.skip_whitespace();
        let quote = match self.rest().chars().next() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.error("expected quoted attribute value")),
        };
        self.pos += 1;
        let end = self
            .rest()
            .find(quote)
            .ok_or_else(|| self.error("unterminated attribute value"))?;
        let value = &self.src[self.pos..self.pos + end];
        self.pos += end + 1;
        tree.push_attribute(id, Attribute::new(key, AttrValue::Str(unescape_text(value))));
        Ok(())
    }

    /// A tag or attribute name: everything up to whitespace, `=`, `/` or
    /// `>`. Must be non-empty.
    fn name(&mut self, what: &str) -> Result<&'a str> {
        let rest = self.rest();
        let end = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '=' | '/' | '>' | '<'))
            .unwrap_or(rest.len());
        if end == 0 {
            return Err(self.error(&format!("empty {what}")));
        }
        let name = &rest[..end];
        self.pos += end;
        Ok(name)
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn error(&self, message: &str) -> Error {
        Error::Markup {
            offset: self.pos,
            message: message.to_string(),
        }
    }
}

impl Attribute {
    /// Parses the string value as a markup fragment and caches the derived
    /// tree. Repeated calls reuse the cache; [`Attribute::set_value`]
    /// drops it.
    pub fn parse_markup(&mut self) -> Result<&mut Tree> {
        if self.markup.is_none() {
            let AttrValue::Str(src) = self.value() else {
                return Err(Error::NotMarkup {
                    key: self.key().to_string(),
                });
            };
            let tree = parse_fragment(src)?;
            self.markup = Some(Box::new(tree));
        }
        Ok(self.markup.as_deref_mut().unwrap())
    }

    /// Re-renders the derived tree (unescaped) into the string value so the
    /// scalar can never go stale against edits made through the tree. A
    /// no-op when nothing was parsed.
    pub fn flatten_markup(&mut self) {
        if let Some(tree) = self.markup.as_deref() {
            let text = fragment_text(tree, false);
            self.set_value_keep_markup(AttrValue::Str(text));
        }
    }
}

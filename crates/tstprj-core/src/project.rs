//! Top-level handle over one tstprj document: parse, edit, serialize,
//! plus the key-path and markup conveniences the CLI is built on.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use log::info;

use crate::binfmt;
use crate::binfmt_write;
use crate::error::{Error, Result};
use crate::keypath::{self, AttrRef, ElemRef};
use crate::markup;
use crate::model::{AttrValue, Attribute, NodeId, Tree, MARKUP_KEY};

/// A loaded (or about to be loaded) project document.
///
/// Parsing replaces the document atomically: a failed parse leaves the
/// previously loaded tree untouched. A flag guards against re-entrant
/// parses on the same handle.
pub struct Project {
    tree: Option<Tree>,
    parsing: AtomicBool,
}

impl Project {
    pub fn new() -> Self {
        Project {
            tree: None,
            parsing: AtomicBool::new(false),
        }
    }

    /// Parses `data` and installs the resulting tree as the document.
    pub fn parse(&mut self, data: &[u8]) -> Result<()> {
        if self.parsing.swap(true, Ordering::SeqCst) {
            return Err(Error::ParseInFlight);
        }
        let result = binfmt::parse(data);
        self.parsing.store(false, Ordering::SeqCst);
        self.tree = Some(result?);
        Ok(())
    }

    /// Reads and parses a project file.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        info!("opening {} ({} bytes)", path.display(), data.len());
        self.parse(&data)
    }

    /// Serializes the document back to bytes. Parsed markup attributes are
    /// re-flattened first, so edits made through derived trees are
    /// included.
    pub fn serialize(&mut self) -> Result<Vec<u8>> {
        let tree = self.tree.as_mut().ok_or(Error::NotParsed)?;
        binfmt_write::serialize_tree(tree)
    }

    /// Serializes the document and writes it to `path`.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.serialize()?;
        let path = path.as_ref();
        fs::write(path, &bytes)?;
        info!("wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    pub fn is_parsed(&self) -> bool {
        self.tree.is_some()
    }

    pub fn is_parsing(&self) -> bool {
        self.parsing.load(Ordering::SeqCst)
    }

    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    pub fn tree_mut(&mut self) -> Option<&mut Tree> {
        self.tree.as_mut()
    }

    fn loaded(&self) -> Result<&Tree> {
        self.tree.as_ref().ok_or(Error::NotParsed)
    }

    /// Elements matching a dot-separated key path. Paths are rooted above
    /// the document root, so they start with its key (`"Song.Track"`, not
    /// `"Track"`).
    pub fn elements_by_path(&self, path: &str) -> Result<Vec<ElemRef<'_>>> {
        let tree = self.loaded()?;
        let start = ElemRef::new(tree, tree.root());
        Ok(keypath::elements_by_path(start, path))
    }

    /// Attributes matching a key path whose final key names the attribute.
    pub fn attributes_by_path(&self, path: &str) -> Result<Vec<AttrRef<'_>>> {
        let tree = self.loaded()?;
        let start = ElemRef::new(tree, tree.root());
        Ok(keypath::attributes_by_path(start, path))
    }

    /// Values of every attribute the path matches, in document order.
    pub fn get_by_path(&self, path: &str) -> Result<Vec<AttrValue>> {
        Ok(self
            .attributes_by_path(path)?
            .iter()
            .map(|a| a.attribute().value().clone())
            .collect())
    }

    /// Assigns `value` to every attribute the path matches and returns the
    /// match count. Derived markup trees on reassigned attributes are
    /// invalidated.
    pub fn set_by_path(&mut self, path: &str, value: AttrValue) -> Result<usize> {
        let targets: Vec<(NodeId, usize)> = self
            .attributes_by_path(path)?
            .iter()
            .map(|a| (a.element(), a.index()))
            .collect();
        let tree = self.tree.as_mut().ok_or(Error::NotParsed)?;
        for &(element, index) in &targets {
            tree.attributes_mut(element)[index].set_value(value.clone());
        }
        Ok(targets.len())
    }

    /// Appends a copy of `attr` to every element the path matches and
    /// returns the match count. This is how a previously absent attribute
    /// gets introduced.
    pub fn add_attribute_by_path(&mut self, path: &str, attr: Attribute) -> Result<usize> {
        let targets: Vec<NodeId> = self
            .elements_by_path(path)?
            .iter()
            .map(|e| e.id())
            .collect();
        let tree = self.tree.as_mut().ok_or(Error::NotParsed)?;
        for &element in &targets {
            tree.push_attribute(element, attr.clone());
        }
        Ok(targets.len())
    }

    /// Lazily parses the `tsml` attribute of `element` and returns its
    /// derived tree.
    pub fn markup(&mut self, element: NodeId) -> Result<&mut Tree> {
        let tree = self.tree.as_mut().ok_or(Error::NotParsed)?;
        let attr = tree
            .attribute_mut(element, MARKUP_KEY)
            .ok_or_else(|| Error::NotMarkup {
                key: MARKUP_KEY.to_string(),
            })?;
        attr.parse_markup()
    }

    /// Renders the whole document as markup text. Parsed `tsml` attributes
    /// are flattened first so their rendered value reflects tree edits.
    pub fn to_markup_text(&mut self, escape: bool) -> Result<String> {
        let tree = self.tree.as_mut().ok_or(Error::NotParsed)?;
        for id in 0..tree.len() {
            for attr in tree.attributes_mut(id) {
                if attr.markup().is_some() {
                    attr.flatten_markup();
                }
            }
        }
        let root = tree.document_root().ok_or(Error::MissingRoot)?;
        Ok(markup::element_text(tree, root, escape))
    }

    #[cfg(test)]
    fn force_parsing_flag(&self, on: bool) {
        self.parsing.store(on, Ordering::SeqCst);
    }
}

impl Default for Project {
    fn default() -> Self {
        Project::new()
    }
}

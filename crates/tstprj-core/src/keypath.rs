//! Dot-separated key-path queries over any tree shape.
//!
//! `"Root.Track.name"` descends one child level per segment; a query can
//! fan out wherever several siblings share a key, and results come back
//! in document order (all matches under an earlier parent before any
//! match under a later one). The traversal is written against the
//! [`QueryNode`] capability trait so the same search runs over the
//! project tree, a derived markup tree, or any caller-supplied shape.

use crate::model::{Attribute, NodeId, Tree};

/// Minimal tree surface the path queries need.
pub trait QueryNode: Sized {
    /// Handle to one attribute of a node.
    type Attr;

    fn key(&self) -> &str;
    fn child_nodes(&self) -> Vec<Self>;
    fn attribute_nodes(&self) -> Vec<Self::Attr>;
    fn attribute_key(attr: &Self::Attr) -> &str;
}

/// Elements reached by descending `keys` from `start`, one child level
/// per key. An empty key list yields `start` itself.
pub fn elements_by_keys<N: QueryNode>(start: N, keys: &[&str]) -> Vec<N> {
    let mut level = vec![start];
    for key in keys {
        let mut next = Vec::new();
        for node in &level {
            for child in node.child_nodes() {
                if child.key() == *key {
                    next.push(child);
                }
            }
        }
        level = next;
        if level.is_empty() {
            break;
        }
    }
    level
}

/// [`elements_by_keys`] with the keys split out of a dot-separated path.
pub fn elements_by_path<N: QueryNode>(start: N, path: &str) -> Vec<N> {
    let keys: Vec<&str> = path.split('.').collect();
    elements_by_keys(start, &keys)
}

/// Attributes reached by a key path whose final key names the attribute
/// and whose leading keys descend elements. An empty key list matches
/// nothing, as there is no attribute key to look for.
pub fn attributes_by_keys<N: QueryNode>(start: N, keys: &[&str]) -> Vec<N::Attr> {
    let Some((attr_key, element_keys)) = keys.split_last() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for element in elements_by_keys(start, element_keys) {
        for attr in element.attribute_nodes() {
            if N::attribute_key(&attr) == *attr_key {
                out.push(attr);
            }
        }
    }
    out
}

/// [`attributes_by_keys`] with the keys split out of a dot-separated path.
pub fn attributes_by_path<N: QueryNode>(start: N, path: &str) -> Vec<N::Attr> {
    let keys: Vec<&str> = path.split('.').collect();
    attributes_by_keys(start, &keys)
}

/// Borrowed element handle tying a [`Tree`] to one of its nodes.
#[derive(Debug, Clone, Copy)]
pub struct ElemRef<'a> {
    tree: &'a Tree,
    id: NodeId,
}

impl<'a> ElemRef<'a> {
    pub fn new(tree: &'a Tree, id: NodeId) -> Self {
        ElemRef { tree, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'a Tree {
        self.tree
    }
}

/// Borrowed attribute handle: the owning element plus the attribute's
/// position in its list.
#[derive(Debug, Clone, Copy)]
pub struct AttrRef<'a> {
    tree: &'a Tree,
    element: NodeId,
    index: usize,
}

impl<'a> AttrRef<'a> {
    pub fn attribute(&self) -> &'a Attribute {
        &self.tree.attributes(self.element)[self.index]
    }

    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl<'a> QueryNode for ElemRef<'a> {
    type Attr = AttrRef<'a>;

    fn key(&self) -> &str {
        self.tree.key(self.id)
    }

    fn child_nodes(&self) -> Vec<Self> {
        self.tree
            .children(self.id)
            .iter()
            .filter(|&&c| !self.tree.is_text(c))
            .map(|&c| ElemRef::new(self.tree, c))
            .collect()
    }

    fn attribute_nodes(&self) -> Vec<AttrRef<'a>> {
        (0..self.tree.attributes(self.id).len())
            .map(|index| AttrRef {
                tree: self.tree,
                element: self.id,
                index,
            })
            .collect()
    }

    fn attribute_key(attr: &AttrRef<'a>) -> &'a str {
        attr.attribute().key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttrValue, Attribute};

    fn sample_tree() -> Tree {
        let mut tree = Tree::new();
        let song = tree.add_child(tree.root(), "Song");
        let t1 = tree.add_child(song, "Track");
        let t2 = tree.add_child(song, "Track");
        let other = tree.add_child(song, "Marker");
        tree.push_attribute(t1, Attribute::new("name", AttrValue::Str("lead".into())));
        tree.push_attribute(t1, Attribute::new("gain", AttrValue::Double(0.5)));
        tree.push_attribute(t2, Attribute::new("name", AttrValue::Str("bass".into())));
        tree.push_attribute(other, Attribute::new("name", AttrValue::Str("intro".into())));
        tree
    }

    #[test]
    fn element_query_fans_out_in_document_order() {
        let tree = sample_tree();
        let start = ElemRef::new(&tree, tree.root());
        let tracks = elements_by_path(start, "Song.Track");
        assert_eq!(tracks.len(), 2);
        assert!(tracks[0].id() < tracks[1].id());
        assert!(elements_by_path(start, "Song.Nope").is_empty());
        assert!(elements_by_path(start, "Track").is_empty());
    }

    #[test]
    fn attribute_query_matches_only_the_final_key() {
        let tree = sample_tree();
        let start = ElemRef::new(&tree, tree.root());
        let names = attributes_by_path(start, "Song.Track.name");
        let values: Vec<_> = names
            .iter()
            .filter_map(|a| a.attribute().value().as_str())
            .collect();
        assert_eq!(values, ["lead", "bass"]);

        let gains = attributes_by_path(start, "Song.Track.gain");
        assert_eq!(gains.len(), 1);
        assert_eq!(gains[0].attribute().value().as_double(), Some(0.5));
    }

    #[test]
    fn empty_key_list_yields_start_for_elements_and_nothing_for_attributes() {
        let tree = sample_tree();
        let start = ElemRef::new(&tree, tree.root());
        let hits = elements_by_keys(start, &[]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id(), tree.root());
        assert!(attributes_by_keys(start, &[]).is_empty());
    }

    #[test]
    fn attribute_key_borrows_from_the_tree_not_the_handle() {
        let tree = sample_tree();
        let start = ElemRef::new(&tree, tree.root());
        // The key must stay usable after the handle that produced it is
        // gone; it borrows from the tree.
        let key = {
            let hit = attributes_by_path(start, "Song.Track.gain")[0];
            hit.attribute().key()
        };
        assert_eq!(key, "gain");
    }

    #[test]
    fn attribute_handle_points_back_into_the_tree() {
        let tree = sample_tree();
        let start = ElemRef::new(&tree, tree.root());
        let hit = attributes_by_path(start, "Song.Marker.name")[0];
        assert_eq!(tree.key(hit.element()), "Marker");
        assert_eq!(hit.index(), 0);
    }

    // The trait is the seam: any caller-defined shape can run the same
    // queries.
    struct Dir {
        name: &'static str,
        files: Vec<&'static str>,
        dirs: Vec<Dir>,
    }

    impl QueryNode for &Dir {
        type Attr = &'static str;

        fn key(&self) -> &str {
            self.name
        }

        fn child_nodes(&self) -> Vec<Self> {
            self.dirs.iter().collect()
        }

        fn attribute_nodes(&self) -> Vec<&'static str> {
            self.files.clone()
        }

        fn attribute_key(attr: &&'static str) -> &'static str {
            *attr
        }
    }

    #[test]
    fn queries_run_over_foreign_trees() {
        let root = Dir {
            name: "root",
            files: vec![],
            dirs: vec![
                Dir {
                    name: "src",
                    files: vec!["main.rs", "lib.rs"],
                    dirs: vec![],
                },
                Dir {
                    name: "src",
                    files: vec!["main.rs"],
                    dirs: vec![],
                },
            ],
        };
        let hits = attributes_by_path(&root, "src.main.rs");
        // "main.rs" contains no dot-path significance here: the split is
        // on '.', so the final key is "rs" and nothing matches.
        assert!(hits.is_empty());
        let hits = attributes_by_keys(&root, &["src", "main.rs"]);
        assert_eq!(hits, ["main.rs", "main.rs"]);
    }
}

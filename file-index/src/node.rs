//! The display file index: a path tree whose nodes record which globs put them there.
//!
//! Nodes live in an arena keyed by [`NodeId`]; parents own their children by
//! name. Every mutation returns the shallowest node whose child set changed,
//! or `None` when the tree kept its shape.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Stable handle of a node in a [`FileIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u64);

/// One node of the tree: the synthetic root, a folder root, a directory or a file.
#[derive(Debug, Clone)]
pub struct UriNode {
    id: NodeId,
    path: Option<PathBuf>,
    name: String,
    children: Option<BTreeMap<String, NodeId>>,
    globs: BTreeSet<String>,
}

impl UriNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Absolute path; `None` only for the root.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_directory(&self) -> bool {
        self.children.is_some()
    }

    /// Glob identities contributing this node.
    pub fn globs(&self) -> impl Iterator<Item = &str> {
        self.globs.iter().map(String::as_str)
    }

    pub fn is_contributed_by(&self, glob_id: &str) -> bool {
        self.globs.contains(glob_id)
    }
}

/// Arena-backed path tree.
#[derive(Debug, Clone)]
pub struct FileIndex {
    nodes: HashMap<NodeId, UriNode>,
    root: NodeId,
    next_id: u64,
}

impl Default for FileIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn segments(relative: &str) -> Vec<&str> {
    relative.split('/').filter(|s| !s.is_empty()).collect()
}

impl FileIndex {
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            UriNode {
                id: root,
                path: None,
                name: String::new(),
                children: Some(BTreeMap::new()),
                globs: BTreeSet::new(),
            },
        );
        Self {
            nodes,
            root,
            next_id: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&UriNode> {
        self.nodes.get(&id)
    }

    /// Number of nodes, not counting the root.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every node but the root.
    pub fn clear(&mut self) {
        let root = self.root;
        self.nodes.retain(|id, _| *id == root);
        if let Some(node) = self.nodes.get_mut(&root) {
            node.children = Some(BTreeMap::new());
        }
    }

    /// Children of `id`, directories first, then by name.
    pub fn children(&self, id: NodeId) -> Vec<&UriNode> {
        let Some(children) = self.nodes.get(&id).and_then(|n| n.children.as_ref()) else {
            return Vec::new();
        };
        let mut nodes: Vec<&UriNode> = children
            .values()
            .filter_map(|child| self.nodes.get(child))
            .collect();
        nodes.sort_by(|a, b| {
            b.is_directory()
                .cmp(&a.is_directory())
                .then_with(|| a.name.cmp(&b.name))
        });
        nodes
    }

    /// The node at a workspace-relative path such as `app/src/main.rs`.
    pub fn find(&self, relative: &str) -> Option<NodeId> {
        segments(relative)
            .into_iter()
            .try_fold(self.root, |cursor, segment| self.child_of(cursor, segment))
    }

    fn child_of(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.nodes.get(&parent)?.children.as_ref()?.get(name).copied()
    }

    fn alloc(&mut self, name: &str, path: Option<PathBuf>, is_directory: bool) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            UriNode {
                id,
                path,
                name: name.to_string(),
                children: is_directory.then(BTreeMap::new),
                globs: BTreeSet::new(),
            },
        );
        id
    }

    fn drop_subtree(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            if let Some(node) = self.nodes.remove(&id) {
                pending.extend(node.children.into_iter().flat_map(BTreeMap::into_values));
            }
        }
    }

    /// Record `file` as contributed by `glob_id`.
    ///
    /// `relative` is the workspace-relative path (folder name first). Missing
    /// directories are created along the way and every node on the path gains
    /// `glob_id`. Adding the same pair twice changes nothing the second time.
    pub fn add_file(&mut self, file: &Path, glob_id: &str, relative: &str) -> Option<NodeId> {
        let segments = segments(relative);
        let last = segments.len().checked_sub(1)?;
        let mut affected = None;
        let mut cursor = self.root;

        for (depth, segment) in segments.into_iter().enumerate() {
            let child = match self.child_of(cursor, segment) {
                Some(child) => child,
                None => {
                    let path = file.ancestors().nth(last - depth).map(Path::to_path_buf);
                    let child = self.alloc(segment, path, depth < last);
                    if let Some(parent) = self.nodes.get_mut(&cursor) {
                        parent
                            .children
                            .get_or_insert_with(BTreeMap::new)
                            .insert(segment.to_string(), child);
                    }
                    affected.get_or_insert(cursor);
                    child
                }
            };
            if let Some(node) = self.nodes.get_mut(&child) {
                node.globs.insert(glob_id.to_string());
            }
            cursor = child;
        }

        affected
    }

    /// Remove the node at `relative` along with any directories it leaves empty.
    pub fn del_file(&mut self, relative: &str) -> Option<NodeId> {
        let segments = segments(relative);
        let mut chain = vec![self.root];
        for segment in &segments {
            let next = self.child_of(*chain.last()?, segment)?;
            chain.push(next);
        }

        let mut depth = segments.len();
        if depth == 0 {
            return None;
        }
        self.drop_subtree(chain[depth]);

        while depth > 0 {
            let parent = chain[depth - 1];
            let children = self.nodes.get_mut(&parent)?.children.as_mut()?;
            children.remove(segments[depth - 1]);
            if parent == self.root || !children.is_empty() {
                return Some(parent);
            }
            self.nodes.remove(&parent);
            depth -= 1;
        }

        None
    }

    /// Withdraw `glob_id` from the whole tree, pruning nodes nothing else contributes.
    pub fn del_children_from_glob(&mut self, glob_id: &str) -> Option<NodeId> {
        self.strip_glob(self.root, glob_id).1
    }

    /// Returns whether `id` is left unreferenced, and the shallowest node of
    /// its subtree whose child set changed.
    fn strip_glob(&mut self, id: NodeId, glob_id: &str) -> (bool, Option<NodeId>) {
        let is_root = id == self.root;
        let Some(node) = self.nodes.get_mut(&id) else {
            return (false, None);
        };
        if !is_root && !node.globs.remove(glob_id) {
            return (false, None);
        }

        let children: Vec<(String, NodeId)> = node
            .children
            .iter()
            .flatten()
            .map(|(name, child)| (name.clone(), *child))
            .collect();

        let mut pruned = Vec::new();
        let mut changed_below = Vec::new();
        for (name, child) in children {
            match self.strip_glob(child, glob_id) {
                (true, _) => pruned.push((name, child)),
                (false, Some(affected)) => changed_below.push(affected),
                (false, None) => {}
            }
        }

        let Some(node) = self.nodes.get_mut(&id) else {
            return (false, None);
        };
        if let Some(children) = node.children.as_mut() {
            for (name, _) in &pruned {
                children.remove(name);
            }
        }
        // A directory left without children goes even if stale contributors
        // remain from files removed by `del_file`.
        let unreferenced = !is_root
            && match node.children.as_ref() {
                Some(children) => children.is_empty(),
                None => node.globs.is_empty(),
            };

        let affected = if !pruned.is_empty() || changed_below.len() > 1 {
            Some(id)
        } else {
            changed_below.pop()
        };
        for (_, child) in pruned {
            self.drop_subtree(child);
        }

        (unreferenced, affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SRC: &str = "[Global]...src/**";
    const RS: &str = "[Global]...**/*.rs";

    fn add(index: &mut FileIndex, glob: &str, relative: &str) -> Option<NodeId> {
        let rel = relative.split_once('/').map_or("", |(_, rest)| rest);
        let file = Path::new("/ws/app").join(rel);
        index.add_file(&file, glob, relative)
    }

    fn names(index: &FileIndex, id: NodeId) -> Vec<String> {
        index
            .children(id)
            .into_iter()
            .map(|n| n.name().to_string())
            .collect()
    }

    #[test]
    fn test_add_file_builds_path() {
        let mut index = FileIndex::new();
        let affected = add(&mut index, SRC, "app/src/main.rs");

        assert_eq!(affected, Some(index.root()));
        let file = index.find("app/src/main.rs").unwrap();
        let node = index.node(file).unwrap();
        assert_eq!(node.path(), Some(Path::new("/ws/app/src/main.rs")));
        assert!(!node.is_directory());

        let folder = index.node(index.find("app").unwrap()).unwrap();
        assert_eq!(folder.path(), Some(Path::new("/ws/app")));
        assert!(folder.is_contributed_by(SRC));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_add_file_is_idempotent() {
        let mut index = FileIndex::new();
        add(&mut index, SRC, "app/src/main.rs");
        let before = index.len();

        assert_eq!(add(&mut index, SRC, "app/src/main.rs"), None);
        assert_eq!(index.len(), before);
    }

    #[test]
    fn test_add_file_reports_shallowest_change() {
        let mut index = FileIndex::new();
        add(&mut index, SRC, "app/src/main.rs");

        let sibling = add(&mut index, SRC, "app/src/lib.rs");
        assert_eq!(sibling, index.find("app/src"));

        let nested = add(&mut index, SRC, "app/src/bin/tool.rs");
        assert_eq!(nested, index.find("app/src"));
    }

    #[test]
    fn test_del_file_prunes_empty_directories() {
        let mut index = FileIndex::new();
        add(&mut index, SRC, "app/src/main.rs");
        add(&mut index, SRC, "app/src/bin/tool.rs");

        let affected = index.del_file("app/src/bin/tool.rs");
        assert_eq!(affected, index.find("app/src"));
        assert_eq!(index.find("app/src/bin"), None);
        assert_eq!(index.del_file("app/src/bin/tool.rs"), None);

        assert_eq!(index.del_file("app/src/main.rs"), Some(index.root()));
        assert!(index.is_empty());
    }

    #[test]
    fn test_del_children_from_glob_keeps_shared_nodes() {
        let mut index = FileIndex::new();
        add(&mut index, SRC, "app/src/main.rs");
        add(&mut index, SRC, "app/src/data.json");
        add(&mut index, RS, "app/src/main.rs");
        add(&mut index, RS, "app/build.rs");

        let affected = index.del_children_from_glob(SRC);

        assert_eq!(affected, index.find("app/src"));
        assert_eq!(index.find("app/src/data.json"), None);
        let main = index.node(index.find("app/src/main.rs").unwrap()).unwrap();
        assert_eq!(main.globs().collect::<Vec<_>>(), vec![RS]);
        assert!(index.find("app/build.rs").is_some());
    }

    #[test]
    fn test_del_children_from_glob_round_trip() {
        let mut index = FileIndex::new();
        add(&mut index, SRC, "app/src/main.rs");
        add(&mut index, SRC, "app/src/util/mod.rs");

        assert_eq!(index.del_children_from_glob(SRC), Some(index.root()));
        assert!(index.is_empty());
        assert_eq!(index.del_children_from_glob(SRC), None);
    }

    #[test]
    fn test_del_children_from_glob_after_del_file_leaves_no_empty_directory() {
        let mut index = FileIndex::new();
        add(&mut index, SRC, "app/src/a.rs");
        add(&mut index, RS, "app/src/b.rs");
        index.del_file("app/src/a.rs");

        let affected = index.del_children_from_glob(RS);

        assert_eq!(affected, Some(index.root()));
        assert_eq!(index.find("app/src"), None);
        assert!(index.is_empty());
    }

    #[test]
    fn test_del_children_from_glob_unrelated_glob() {
        let mut index = FileIndex::new();
        add(&mut index, SRC, "app/src/main.rs");

        assert_eq!(index.del_children_from_glob(RS), None);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_children_sorted_directories_first() {
        let mut index = FileIndex::new();
        add(&mut index, SRC, "app/b.rs");
        add(&mut index, SRC, "app/z/x.rs");
        add(&mut index, SRC, "app/a.rs");
        add(&mut index, SRC, "app/c/x.rs");

        let app = index.find("app").unwrap();
        assert_eq!(names(&index, app), vec!["c", "z", "a.rs", "b.rs"]);

        index.clear();
        assert!(index.children(index.root()).is_empty());
    }
}

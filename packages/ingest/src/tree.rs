//! Folder structure of an archive, rendered as an ASCII tree.

use std::fmt::Write as _;
use std::path::Path;

use crate::IngestError;
use crate::archive::list_entries;

/// Whether a tree node is a folder or a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Folder,
    File,
}

/// One path segment in an [`ArchiveTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    pub kind: NodeKind,
    /// Uncompressed size, known only for files read from an archive.
    pub size: Option<u64>,
    /// Children in the order their paths were first inserted.
    pub children: Vec<Self>,
}

impl TreeNode {
    fn new(name: &str, kind: NodeKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            size: None,
            children: Vec::new(),
        }
    }
}

/// Nested folder/file structure of an archive's entry paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTree {
    root: TreeNode,
}

impl ArchiveTree {
    #[must_use]
    pub fn new(root_name: &str) -> Self {
        Self {
            root: TreeNode::new(root_name, NodeKind::Folder),
        }
    }

    /// Builds the tree of a zip archive, naming the root after the archive
    /// file name without its extension.
    ///
    /// # Errors
    ///
    /// * [`IngestError::Archive`] if `bytes` is not a readable zip archive
    pub fn from_archive(bytes: &[u8], archive_name: &str) -> Result<Self, IngestError> {
        let root_name = Path::new(archive_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(archive_name);

        let mut tree = Self::new(root_name);
        for entry in list_entries(bytes)? {
            tree.insert_file(&entry.name, Some(entry.size));
        }
        Ok(tree)
    }

    #[must_use]
    pub const fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Inserts a `/`-separated path, creating intermediate folders.
    ///
    /// A trailing `/` marks the final segment as a folder. Empty segments
    /// are ignored.
    pub fn insert_path(&mut self, path: &str) {
        self.insert_file(path, None);
    }

    /// Like [`Self::insert_path`], recording `size` on a file leaf.
    pub fn insert_file(&mut self, path: &str, size: Option<u64>) {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let ends_in_folder = path.ends_with('/');

        let mut node = &mut self.root;
        for (i, segment) in segments.iter().enumerate() {
            let kind = if i + 1 == segments.len() && !ends_in_folder {
                NodeKind::File
            } else {
                NodeKind::Folder
            };

            let pos = if let Some(pos) = node.children.iter().position(|c| c.name == *segment) {
                pos
            } else {
                node.children.push(TreeNode::new(segment, kind));
                node.children.len() - 1
            };

            node = &mut node.children[pos];
            if kind == NodeKind::Folder {
                node.kind = NodeKind::Folder;
            } else {
                node.size = size;
            }
        }
    }

    /// Renders the tree with `├── `, `└── `, and `│   ` connectors.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.root.name);

        let mut stack: Vec<(&TreeNode, String, bool)> = self
            .root
            .children
            .iter()
            .enumerate()
            .rev()
            .map(|(i, child)| (child, String::new(), i + 1 == self.root.children.len()))
            .collect();

        while let Some((node, prefix, is_last)) = stack.pop() {
            let connector = if is_last { "└── " } else { "├── " };
            let _ = writeln!(out, "{prefix}{connector}{}", node.name);

            let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
            for (i, child) in node.children.iter().enumerate().rev() {
                stack.push((child, child_prefix.clone(), i + 1 == node.children.len()));
            }
        }

        out
    }
}

impl std::fmt::Display for ArchiveTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

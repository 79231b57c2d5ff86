//! Workspace tree builder
//!
//! Turns a flat `find` listing into path-linked [`FileNode`]s. Everything here
//! is pure; the listing itself comes from the runtime's exec primitive.

use devlab_types::{FileNode, NodeType};
use std::collections::BTreeMap;

/// Tool caches skipped under the workspace root
pub const DEFAULT_DENYLIST: &[&str] = &[
    ".cache",
    "go/pkg/mod",
    ".config",
    ".local",
    ".npm",
    ".pip",
    ".conda",
    ".m2",
    ".gradle",
    ".ivy2",
    ".sbt",
    ".cargo",
    ".rustup",
    ".node_modules",
    ".yarn",
    ".bundle",
    ".gem",
    ".pub-cache",
    ".dart",
    ".flutter",
];

/// One line of a workspace listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Absolute path
    pub path: String,
    /// Entry kind
    pub node_type: NodeType,
}

impl ListingEntry {
    /// New entry
    #[must_use]
    pub fn new(path: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            path: path.into(),
            node_type,
        }
    }
}

/// Command listing every file and directory under `root` as `"<path> <tag>"`
#[must_use]
pub fn listing_command(root: &str) -> Vec<String> {
    [
        "find", root, "(", "-type", "f", "-o", "-type", "d", ")", "-printf", "%p %y\n",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

/// Parse `"<path> <tag>"` lines
///
/// The tag is the last whitespace-separated token, so paths containing spaces
/// survive. Blank lines and lines without a tag are skipped.
#[must_use]
pub fn parse_listing(output: &str) -> Vec<ListingEntry> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim_end_matches('\r');
            let (path, tag) = line.trim_end().rsplit_once(char::is_whitespace)?;
            let path = path.trim();
            if path.is_empty() || tag.is_empty() {
                return None;
            }
            Some(ListingEntry::new(path, NodeType::from_find_tag(tag)))
        })
        .collect()
}

/// Build the node list for `root`
///
/// Output is sorted by path with sorted children, so it does not depend on
/// the order of `entries`. Duplicate paths collapse into one node; if any
/// duplicate says folder, the node is a folder.
#[must_use]
pub fn build_tree<S: AsRef<str>>(
    entries: &[ListingEntry],
    root: &str,
    denylist: &[S],
) -> Vec<FileNode> {
    let root = normalize_root(root);
    let denied: Vec<String> = denylist
        .iter()
        .map(|p| p.as_ref().trim_matches('/'))
        .filter(|p| !p.is_empty())
        .map(|p| join(root, p))
        .collect();

    let mut nodes: BTreeMap<&str, FileNode> = BTreeMap::new();
    for entry in entries {
        let path = entry.path.as_str();
        if !is_under(path, root) || denied.iter().any(|d| is_under(path, d)) {
            continue;
        }
        nodes
            .entry(path)
            .and_modify(|n| {
                if entry.node_type == NodeType::Folder {
                    n.node_type = NodeType::Folder;
                }
            })
            .or_insert_with(|| FileNode::new(path, entry.node_type, path == root));
    }

    let links: Vec<(&str, &str)> = nodes
        .keys()
        .filter(|path| **path != root)
        .map(|path| (parent_of(*path, root), *path))
        .collect();
    for (parent, child) in links {
        if let Some(node) = nodes.get_mut(parent) {
            node.children.push(child.to_string());
        }
    }

    // BTreeMap iteration already yields children in path order
    nodes.into_values().collect()
}

fn normalize_root(root: &str) -> &str {
    let trimmed = root.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

fn join(root: &str, rel: &str) -> String {
    if root == "/" {
        format!("/{rel}")
    } else {
        format!("{root}/{rel}")
    }
}

fn is_under(path: &str, dir: &str) -> bool {
    if dir == "/" {
        return path.starts_with('/');
    }
    path == dir
        || path
            .strip_prefix(dir)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn parent_of<'a>(path: &'a str, root: &'a str) -> &'a str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => root,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ROOT: &str = "/home/devlab";

    fn entries(raw: &[(&str, &str)]) -> Vec<ListingEntry> {
        raw.iter()
            .map(|(p, t)| ListingEntry::new(*p, NodeType::from_find_tag(t)))
            .collect()
    }

    fn children<'a>(tree: &'a [FileNode], path: &str) -> Vec<&'a str> {
        tree.iter()
            .find(|n| n.path == path)
            .map(|n| n.children.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    #[test]
    fn parse_listing_keeps_paths_with_spaces() {
        let parsed = parse_listing("/home/devlab d\n/home/devlab/my notes.txt f\n\n   \nbroken\n");
        assert_eq!(
            parsed,
            vec![
                ListingEntry::new("/home/devlab", NodeType::Folder),
                ListingEntry::new("/home/devlab/my notes.txt", NodeType::File),
            ]
        );
    }

    #[test]
    fn builds_linked_tree() {
        let tree = build_tree(
            &entries(&[
                ("/home/devlab", "d"),
                ("/home/devlab/a", "f"),
                ("/home/devlab/b", "d"),
                ("/home/devlab/b/c", "f"),
            ]),
            ROOT,
            DEFAULT_DENYLIST,
        );

        assert_eq!(tree.len(), 4);
        assert!(tree[0].is_root);
        assert_eq!(children(&tree, ROOT), vec!["/home/devlab/a", "/home/devlab/b"]);
        assert_eq!(children(&tree, "/home/devlab/b"), vec!["/home/devlab/b/c"]);
        assert!(tree.iter().filter(|n| !n.is_root).all(|n| !n.is_open && n.is_saved));
    }

    #[test]
    fn drops_paths_outside_root() {
        let tree = build_tree(
            &entries(&[
                ("/home/devlab", "d"),
                ("/home/devlabber", "d"),
                ("/etc/passwd", "f"),
            ]),
            ROOT,
            DEFAULT_DENYLIST,
        );
        let paths: Vec<&str> = tree.iter().map(|n| n.path.as_str()).collect();
        assert_eq!(paths, vec![ROOT]);
    }

    #[test]
    fn drops_denied_cache_dirs() {
        let tree = build_tree(
            &entries(&[
                ("/home/devlab", "d"),
                ("/home/devlab/.cache", "d"),
                ("/home/devlab/.cache/x", "f"),
                ("/home/devlab/go", "d"),
                ("/home/devlab/go/pkg", "d"),
                ("/home/devlab/go/pkg/mod", "d"),
                ("/home/devlab/go/pkg/mod/golang.org", "d"),
                ("/home/devlab/.cachet", "f"),
            ]),
            ROOT,
            DEFAULT_DENYLIST,
        );
        let paths: Vec<&str> = tree.iter().map(|n| n.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "/home/devlab",
                "/home/devlab/.cachet",
                "/home/devlab/go",
                "/home/devlab/go/pkg",
            ]
        );
        assert_eq!(children(&tree, "/home/devlab/go/pkg"), Vec::<&str>::new());
    }

    #[test]
    fn duplicates_collapse() {
        let tree = build_tree(
            &entries(&[
                ("/home/devlab", "d"),
                ("/home/devlab/a", "f"),
                ("/home/devlab/a", "f"),
            ]),
            ROOT,
            DEFAULT_DENYLIST,
        );
        assert_eq!(tree.len(), 2);
        assert_eq!(children(&tree, ROOT), vec!["/home/devlab/a"]);
    }

    #[test]
    fn trailing_slash_on_root_is_ignored() {
        let tree = build_tree(
            &entries(&[("/home/devlab", "d"), ("/home/devlab/a", "f")]),
            "/home/devlab/",
            &[] as &[&str],
        );
        assert!(tree[0].is_root);
        assert_eq!(children(&tree, ROOT), vec!["/home/devlab/a"]);
    }

    #[test]
    fn listing_command_prints_path_and_type() {
        let cmd = listing_command(ROOT);
        assert_eq!(cmd[0], "find");
        assert_eq!(cmd[1], ROOT);
        assert_eq!(cmd.last().map(String::as_str), Some("%p %y\n"));
    }
}

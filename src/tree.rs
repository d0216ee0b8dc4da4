/*!
 * Directory tree rendering of a discovery result
 */

use std::collections::BTreeMap;
use std::path::Component;

use crate::types::Entry;

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const PIPE: &str = "│   ";
const SPACE: &str = "    ";

#[derive(Default)]
struct TreeNode {
    is_file: bool,
    children: BTreeMap<String, TreeNode>,
}

impl TreeNode {
    fn insert(&mut self, parts: &[String], is_file: bool) {
        let Some((first, rest)) = parts.split_first() else {
            return;
        };
        let child = self.children.entry(first.clone()).or_default();
        if rest.is_empty() {
            child.is_file = is_file;
        } else {
            child.insert(rest, is_file);
        }
    }

    fn sorted_children(&self) -> Vec<(&String, &TreeNode)> {
        let mut children: Vec<_> = self.children.iter().collect();
        children.sort_by(|(a_name, a), (b_name, b)| {
            a.is_file
                .cmp(&b.is_file)
                .then_with(|| a_name.to_lowercase().cmp(&b_name.to_lowercase()))
                .then_with(|| a_name.cmp(b_name))
        });
        children
    }
}

/// Render entries as a box-drawing tree under a `## Directory Tree` header.
///
/// `root_label` is printed above the tree, normally the name of the working
/// directory.
pub fn render_tree(entries: &[Entry], root_label: &str) -> String {
    if entries.is_empty() {
        return "## Directory Tree\n(No files found)\n\n".to_string();
    }

    let mut root = TreeNode::default();
    for entry in entries {
        let parts: Vec<String> = entry
            .display_path
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().to_string()),
                _ => None,
            })
            .collect();
        if parts.is_empty() {
            continue;
        }
        root.insert(&parts, entry.is_file());
    }

    let mut out = String::from("## Directory Tree\n");
    out.push_str(root_label);
    out.push_str("/\n");
    render_children(&root, "", &mut out);
    out.push('\n');
    out
}

fn render_children(node: &TreeNode, prefix: &str, out: &mut String) {
    let children = node.sorted_children();
    let count = children.len();

    for (i, (name, child)) in children.into_iter().enumerate() {
        let is_last = i + 1 == count;
        out.push_str(prefix);
        out.push_str(if is_last { LAST_BRANCH } else { BRANCH });
        out.push_str(name);
        if !child.is_file {
            out.push('/');
        }
        out.push('\n');

        if !child.is_file && !child.children.is_empty() {
            let next = format!("{}{}", prefix, if is_last { SPACE } else { PIPE });
            render_children(child, &next, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntrySource;
    use std::path::PathBuf;

    fn dir(path: &str) -> Entry {
        Entry::directory(PathBuf::from("/p").join(path), path.into(), 1, EntrySource::Walk)
    }

    fn file(path: &str) -> Entry {
        Entry::file(PathBuf::from("/p").join(path), path.into(), 1, EntrySource::Walk)
    }

    #[test]
    fn test_empty_tree() {
        assert_eq!(render_tree(&[], "proj"), "## Directory Tree\n(No files found)\n\n");
    }

    #[test]
    fn test_nested_tree() {
        let entries = vec![
            dir("proj"),
            dir("proj/src"),
            file("proj/src/main.py"),
            file("proj/src/util.py"),
            file("proj/README.md"),
        ];
        let expected = "\
## Directory Tree
work/
└── proj/
    ├── src/
    │   ├── main.py
    │   └── util.py
    └── README.md

";
        assert_eq!(render_tree(&entries, "work"), expected);
    }
}

//! Projection field tree.

/// Ordered nested mapping obtained by unflattening dotted projection paths.
///
/// `["name", "teachers.id", "teachers.name"]` becomes
/// `{name: {}, teachers: {id: {}, name: {}}}`. A node without children is a
/// leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTree {
    children: Vec<(String, FieldTree)>,
}

impl FieldTree {
    /// Build a tree from dotted paths, keeping first-seen order at every level.
    pub fn from_paths<S: AsRef<str>>(paths: &[S]) -> Self {
        let mut root = FieldTree::default();
        for path in paths {
            let mut node = &mut root;
            for segment in path.as_ref().split('.') {
                node = node.child_mut(segment);
            }
        }
        root
    }

    fn child_mut(&mut self, name: &str) -> &mut FieldTree {
        let index = match self.children.iter().position(|(k, _)| k == name) {
            Some(i) => i,
            None => {
                self.children.push((name.to_string(), FieldTree::default()));
                self.children.len() - 1
            }
        };
        &mut self.children[index].1
    }

    pub fn children(&self) -> &[(String, FieldTree)] {
        &self.children
    }

    pub fn get(&self, name: &str) -> Option<&FieldTree> {
        self.children.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Dotted paths of every leaf, in tree order.
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_leaves(&mut Vec::new(), &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, prefix: &mut Vec<&'a str>, out: &mut Vec<String>) {
        for (name, child) in &self.children {
            prefix.push(name);
            if child.is_leaf() {
                out.push(prefix.join("."));
            } else {
                child.collect_leaves(prefix, out);
            }
            prefix.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unflatten_keeps_order() {
        let tree = FieldTree::from_paths(&["name", "teachers.id", "email", "teachers.name"]);
        let keys: Vec<&str> = tree.children().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["name", "teachers", "email"]);

        let teachers = tree.get("teachers").unwrap();
        assert!(!teachers.is_leaf());
        assert!(teachers.get("id").unwrap().is_leaf());
        assert_eq!(
            tree.leaf_paths(),
            vec!["name", "teachers.id", "teachers.name", "email"]
        );
    }

    #[test]
    fn test_empty() {
        let tree = FieldTree::from_paths::<&str>(&[]);
        assert!(tree.is_leaf());
        assert!(tree.get("x").is_none());
    }
}

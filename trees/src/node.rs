//! Branch and Leaf, the two node kinds of a Tree (spec.md §4.4).

use splash_sdk::Value;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
pub struct Leaf {
    pub value: Value,
    pub timestamp_ms: i64,
}

impl Leaf {
    pub fn new(value: Value, timestamp_ms: i64) -> Self {
        Leaf { value, timestamp_ms }
    }
}

/// Leaf equality ignores the timestamp: it is metadata, not identity
/// (spec.md §3, "Two Trees are equal iff ... timestamps are metadata").
impl PartialEq for Leaf {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

#[derive(Clone, Debug, Default)]
pub struct Branch {
    pub children: BTreeMap<String, Node>,
}

impl Branch {
    pub fn new() -> Self {
        Branch::default()
    }

    pub fn branch_names(&self) -> Vec<String> {
        self.children
            .iter()
            .filter_map(|(name, node)| matches!(node, Node::Branch(_)).then(|| name.clone()))
            .collect()
    }

    pub fn leaf_names(&self) -> Vec<String> {
        self.children
            .iter()
            .filter_map(|(name, node)| matches!(node, Node::Leaf(_)).then(|| name.clone()))
            .collect()
    }
}

impl PartialEq for Branch {
    fn eq(&self, other: &Self) -> bool {
        self.children == other.children
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Branch(Branch),
    Leaf(Leaf),
}

impl Node {
    pub fn as_branch(&self) -> Option<&Branch> {
        match self {
            Node::Branch(b) => Some(b),
            Node::Leaf(_) => None,
        }
    }

    pub fn as_branch_mut(&mut self) -> Option<&mut Branch> {
        match self {
            Node::Branch(b) => Some(b),
            Node::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            Node::Leaf(l) => Some(l),
            Node::Branch(_) => None,
        }
    }

    pub fn as_leaf_mut(&mut self) -> Option<&mut Leaf> {
        match self {
            Node::Leaf(l) => Some(l),
            Node::Branch(_) => None,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, Node::Branch(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_equality_ignores_timestamp() {
        let a = Leaf::new(Value::from_i64(1), 10);
        let b = Leaf::new(Value::from_i64(1), 9999);
        assert_eq!(a, b);
    }

    #[test]
    fn branch_names_filters_out_leaves() {
        let mut branch = Branch::new();
        branch.children.insert("x".into(), Node::Leaf(Leaf::new(Value::from_i64(1), 0)));
        branch.children.insert("y".into(), Node::Branch(Branch::new()));
        assert_eq!(branch.branch_names(), vec!["y".to_string()]);
        assert_eq!(branch.leaf_names(), vec!["x".to_string()]);
    }
}

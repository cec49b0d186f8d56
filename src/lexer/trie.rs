use std::collections::HashMap;

/// Prefix tree used for longest-match recognition of multi-character
/// operators.
#[derive(Debug, Default)]
pub struct Trie {
    children: HashMap<char, Trie>,
    leaf: bool,
}

impl Trie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, word: &str) {
        let mut node = self;
        for c in word.chars() {
            node = node.children.entry(c).or_default();
        }
        node.leaf = true;
    }

    /// Follow one edge; `None` when no operator continues with `c`.
    pub fn matching(&self, c: char) -> Option<&Trie> {
        self.children.get(&c)
    }

    /// True when the path walked so far spells a complete operator.
    pub fn leaf(&self) -> bool {
        self.leaf
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_match_wins() {
        let mut trie = Trie::new();
        trie.insert("-");
        trie.insert("->");

        let minus = trie.matching('-').unwrap();
        assert!(minus.leaf());
        let arrow = minus.matching('>').unwrap();
        assert!(arrow.leaf());
        assert!(!arrow.has_children());
    }

    #[test]
    fn prefix_without_leaf() {
        let mut trie = Trie::new();
        trie.insert(".*");

        let dot = trie.matching('.').unwrap();
        assert!(!dot.leaf());
        assert!(dot.matching('*').unwrap().leaf());
    }
}

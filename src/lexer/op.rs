use std::collections::HashMap;

use super::trie::Trie;

/// What an operator spelling means to the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Add,
    Sub,
    Mul,
    Div,
    EltMul,
    EltDiv,
    Mod,
    Pow,
    Arrow,
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    And,
    Or,
    Not,
    In,
    Is,
}

#[derive(Debug, Clone, Copy)]
pub struct OpConfig {
    pub precedence: i32,
    pub left_associative: bool,
    pub kind: OpKind,
}

impl OpConfig {
    const fn new(precedence: i32, left_associative: bool, kind: OpKind) -> Self {
        Self {
            precedence,
            left_associative,
            kind,
        }
    }
}

/// The default operator set plus whatever the user registers on top.
///
/// Symbolic spellings go into the trie so the lexer can do longest-match
/// scanning; word operators (`and`, `or`, ...) are recognised from
/// identifiers by table lookup alone.
pub struct OperatorTable {
    trie: Trie,
    configs: HashMap<String, OpConfig>,
}

impl Default for OperatorTable {
    fn default() -> Self {
        let mut table = Self {
            trie: Trie::new(),
            configs: HashMap::new(),
        };
        for (name, config) in default_precedence() {
            table.insert(name, config);
        }
        table
    }
}

impl OperatorTable {
    pub fn insert(&mut self, name: &str, config: OpConfig) {
        if !name.chars().next().is_some_and(is_word_start) {
            self.trie.insert(name);
        }
        self.configs.insert(name.to_string(), config);
    }

    pub fn trie(&self) -> &Trie {
        &self.trie
    }

    pub fn config(&self, name: &str) -> Option<OpConfig> {
        self.configs.get(name).copied()
    }

    /// Precedence of a binary operator, `-1` when `name` is not binary.
    pub fn precedence(&self, name: &str) -> i32 {
        self.config(name).map(|c| c.precedence).unwrap_or(-1)
    }
}

fn is_word_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn default_precedence() -> Vec<(&'static str, OpConfig)> {
    use OpKind::*;
    vec![
        ("+", OpConfig::new(20, true, Add)),
        ("-", OpConfig::new(20, true, Sub)),
        ("*", OpConfig::new(30, true, Mul)),
        ("/", OpConfig::new(30, true, Div)),
        (".*", OpConfig::new(20, true, EltMul)),
        ("./", OpConfig::new(20, true, EltDiv)),
        ("%", OpConfig::new(10, true, Mod)),
        ("^", OpConfig::new(40, false, Pow)),
        ("->", OpConfig::new(-1, true, Arrow)),
        ("==", OpConfig::new(6, true, Eq)),
        ("!=", OpConfig::new(6, true, NotEq)),
        ("<", OpConfig::new(6, true, Lt)),
        ("<=", OpConfig::new(6, true, LtE)),
        (">", OpConfig::new(6, true, Gt)),
        (">=", OpConfig::new(6, true, GtE)),
        ("and", OpConfig::new(4, true, And)),
        ("or", OpConfig::new(2, true, Or)),
        ("not", OpConfig::new(-1, false, Not)),
        ("in", OpConfig::new(6, true, In)),
        ("is", OpConfig::new(6, true, Is)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let table = OperatorTable::default();
        assert!(table.precedence("*") > table.precedence("+"));
        assert!(table.precedence("+") > table.precedence("=="));
        assert!(table.precedence("==") > table.precedence("and"));
        assert!(table.precedence("and") > table.precedence("or"));
    }

    #[test]
    fn power_is_right_associative() {
        let table = OperatorTable::default();
        let pow = table.config("^").unwrap();
        assert!(!pow.left_associative);
    }

    #[test]
    fn word_operators_skip_the_trie() {
        let table = OperatorTable::default();
        assert!(table.trie().matching('a').is_none());
        assert_eq!(table.config("and").unwrap().kind, OpKind::And);
    }

    #[test]
    fn user_entries_extend_the_table() {
        let mut table = OperatorTable::default();
        table.insert("<=>", OpConfig::new(6, true, OpKind::Eq));
        assert_eq!(table.precedence("<=>"), 6);
        let lt = table.trie().matching('<').unwrap();
        assert!(lt.matching('=').unwrap().matching('>').unwrap().leaf());
    }
}

//! Arena and symbol table, the two fused roles of a module.
//!
//! The [`Ast`] arena owns every node of one module; handles (`ExprId`,
//! `StmtId`, `PatId`) are only meaningful against the arena that produced
//! them and are never shared across arenas. Dropping the arena drops the
//! whole tree.
//!
//! [`Module`] layers the symbol-table role on top: an append-only list of
//! `name -> definition` slots with a scope-length stack, so nested scopes
//! share one vector and absolute slot indices never collide.

use std::collections::HashMap;

use crate::ast::{Expr, ExprContext, ExprId, ExprKind, PatId, Pattern, Span, Stmt, StmtId};

#[derive(Debug, Default)]
pub struct Ast {
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
    patterns: Vec<Pattern>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_expr(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(expr);
        id
    }

    pub fn alloc_stmt(&mut self, stmt: Stmt) -> StmtId {
        let id = StmtId(self.stmts.len() as u32);
        self.stmts.push(stmt);
        id
    }

    pub fn alloc_pattern(&mut self, pattern: Pattern) -> PatId {
        let id = PatId(self.patterns.len() as u32);
        self.patterns.push(pattern);
        id
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id.0 as usize]
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.0 as usize]
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut Stmt {
        &mut self.stmts[id.0 as usize]
    }

    pub fn pattern(&self, id: PatId) -> &Pattern {
        &self.patterns[id.0 as usize]
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn stmt_count(&self) -> usize {
        self.stmts.len()
    }
}

/// One `name -> definition` slot. The slot index doubles as the varid the
/// semantic analyser hands out for the definition.
#[derive(Debug, Clone)]
pub struct ModuleEntry {
    pub name: String,
    pub stmt: StmtId,
}

/// The symbol-table role: hierarchical name lookup over a single vector.
///
/// `enter` records the current length; `exit` truncates back to it, so a
/// child scope's slots start at the parent's `size()` and lookups walk
/// from the newest slot downwards.
#[derive(Debug, Default)]
pub struct Module {
    pub ast: Ast,
    entries: Vec<ModuleEntry>,
    index: HashMap<String, usize>,
    scopes: Vec<usize>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parent-inclusive number of slots.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Append a definition; returns its absolute slot.
    pub fn insert(&mut self, name: &str, stmt: StmtId) -> usize {
        if self.find_slot(name).is_some() {
            log::warn!("overriding definition {}", name);
        }
        let slot = self.entries.len();
        self.entries.push(ModuleEntry {
            name: name.to_string(),
            stmt,
        });
        self.index.insert(name.to_string(), slot);
        slot
    }

    /// Open a nested scope; slots appended from here on are dropped again
    /// by the matching `exit`.
    pub fn enter(&mut self) {
        self.scopes.push(self.entries.len());
    }

    pub fn exit(&mut self) {
        let mark = self.scopes.pop().unwrap_or(0);
        while self.entries.len() > mark {
            let entry = self.entries.pop().unwrap();
            match self.index.get(&entry.name) {
                Some(&slot) if slot == self.entries.len() => {
                    self.index.remove(&entry.name);
                    // Re-expose a shadowed outer definition.
                    if let Some(outer) = self.find_slot_linear(&entry.name) {
                        self.index.insert(entry.name.clone(), outer);
                    }
                }
                _ => {}
            }
        }
    }

    pub fn find(&self, name: &str) -> Option<StmtId> {
        self.find_slot(name).map(|slot| self.entries[slot].stmt)
    }

    pub fn find_slot(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    fn find_slot_linear(&self, name: &str) -> Option<usize> {
        self.entries.iter().rposition(|e| e.name == name)
    }

    /// Build a `Name` expression whose varid records the absolute slot of
    /// `name`, or `-1` when undefined.
    pub fn reference(&mut self, name: &str, span: Span) -> ExprId {
        let varid = self.find_slot(name).map(|s| s as i32).unwrap_or(-1);
        self.ast.alloc_expr(Expr::new(
            ExprKind::Name {
                id: name.to_string(),
                ctx: ExprContext::Load,
                varid,
            },
            span,
        ))
    }

    /// Definitions in insertion order; the executor walks top-level
    /// definitions through this.
    pub fn iter(&self) -> impl Iterator<Item = (&str, StmtId)> {
        self.entries.iter().map(|e| (e.name.as_str(), e.stmt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Stmt, StmtKind};

    fn dummy_stmt(module: &mut Module) -> StmtId {
        module
            .ast
            .alloc_stmt(Stmt::new(StmtKind::Pass, Span::unknown()))
    }

    #[test]
    fn slots_are_insertion_ordered() {
        let mut module = Module::new();
        let a = dummy_stmt(&mut module);
        let b = dummy_stmt(&mut module);
        assert_eq!(module.insert("a", a), 0);
        assert_eq!(module.insert("b", b), 1);
        let names: Vec<&str> = module.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn child_scope_slots_start_after_parent() {
        let mut module = Module::new();
        let a = dummy_stmt(&mut module);
        module.insert("a", a);

        module.enter();
        let b = dummy_stmt(&mut module);
        assert_eq!(module.insert("b", b), 1);
        assert_eq!(module.size(), 2);
        module.exit();

        assert_eq!(module.size(), 1);
        assert!(module.find("b").is_none());
        assert!(module.find("a").is_some());
    }

    #[test]
    fn shadowed_definitions_reappear_on_exit() {
        let mut module = Module::new();
        let outer = dummy_stmt(&mut module);
        module.insert("x", outer);

        module.enter();
        let inner = dummy_stmt(&mut module);
        module.insert("x", inner);
        assert_eq!(module.find("x"), Some(inner));
        module.exit();

        assert_eq!(module.find("x"), Some(outer));
    }

    #[test]
    fn reference_records_the_slot() {
        let mut module = Module::new();
        let a = dummy_stmt(&mut module);
        module.insert("a", a);

        let reference = module.reference("a", Span::unknown());
        match &module.ast.expr(reference).kind {
            ExprKind::Name { varid, .. } => assert_eq!(*varid, 0),
            other => panic!("expected a name, got {:?}", other),
        }

        let missing = module.reference("zzz", Span::unknown());
        match &module.ast.expr(missing).kind {
            ExprKind::Name { varid, .. } => assert_eq!(*varid, -1),
            other => panic!("expected a name, got {:?}", other),
        }
    }
}

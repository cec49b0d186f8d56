//! Binding slots and lexical scoping.
//!
//! One monotonic vector holds every binding the analyser ever sees; a
//! scope-length stack delimits lexical scopes. The absolute index of an
//! entry is the `varid` written back into `Name` nodes, so within one
//! scope chain every varid is unique and monotone. Lookups walk from the
//! newest entry downwards, which is what gives shadowing its meaning.

use crate::ast::{ConstantValue, StmtId, TypeExpr};

/// What a name is bound to, when the analyser knows.
#[derive(Debug, Clone)]
pub enum BindingValue {
    /// A definition in the current module's arena.
    Stmt(StmtId),
    /// A compile-time constant (the builtin `pi`).
    Constant(ConstantValue),
    /// A builtin implemented by the interpreter.
    Native(String),
    /// An imported module, by index into the analyser's module list.
    Module(usize),
    /// A definition imported from another module's arena.
    Imported { module: usize, stmt: StmtId },
}

#[derive(Debug, Clone)]
pub struct BindingEntry {
    pub name: String,
    pub value: Option<BindingValue>,
    pub ty: Option<TypeExpr>,
}

#[derive(Debug, Default)]
pub struct Bindings {
    entries: Vec<BindingEntry>,
    scopes: Vec<usize>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a binding and return its varid.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        value: Option<BindingValue>,
        ty: Option<TypeExpr>,
    ) -> usize {
        let varid = self.entries.len();
        self.entries.push(BindingEntry {
            name: name.into(),
            value,
            ty,
        });
        varid
    }

    /// Resolve a name, newest binding first; `-1` when undefined.
    pub fn get_varid(&self, name: &str) -> i32 {
        for (varid, entry) in self.entries.iter().enumerate().rev() {
            if entry.name == name {
                return varid as i32;
            }
        }
        -1
    }

    pub fn lookup(&self, name: &str) -> Option<(usize, &BindingEntry)> {
        self.entries
            .iter()
            .enumerate()
            .rev()
            .find(|(_, entry)| entry.name == name)
    }

    pub fn entry(&self, varid: usize) -> Option<&BindingEntry> {
        self.entries.get(varid)
    }

    pub fn get_type(&self, varid: i32) -> Option<TypeExpr> {
        if varid < 0 {
            return None;
        }
        self.entries.get(varid as usize).and_then(|e| e.ty.clone())
    }

    pub fn set_type(&mut self, varid: usize, ty: TypeExpr) {
        if let Some(entry) = self.entries.get_mut(varid) {
            entry.ty = Some(ty);
        }
    }

    pub fn get_value(&self, varid: i32) -> Option<&BindingValue> {
        if varid < 0 {
            return None;
        }
        self.entries.get(varid as usize).and_then(|e| e.value.as_ref())
    }

    pub fn get_name(&self, varid: usize) -> Option<&str> {
        self.entries.get(varid).map(|e| e.name.as_str())
    }

    /// First slot of the innermost open scope; bindings at or past this
    /// index belong to the current scope.
    pub fn current_scope_start(&self) -> usize {
        self.scopes.last().copied().unwrap_or(0)
    }

    /// Record the current length; the matching `exit_scope` truncates back
    /// to it.
    pub fn enter_scope(&mut self) -> usize {
        let mark = self.entries.len();
        self.scopes.push(mark);
        mark
    }

    pub fn exit_scope(&mut self) {
        let mark = self.scopes.pop().unwrap_or(0);
        self.entries.truncate(mark);
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &BindingEntry)> {
        self.entries.iter().enumerate()
    }

    /// Debug table of every live binding.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let sep = format!("{:->40}-+-{:->20}\n", "", "");
        out.push_str(&sep);
        out.push_str(&format!("{:>40} | {:>20}\n", "name", "type"));
        out.push_str(&sep);
        for entry in &self.entries {
            let ty = entry
                .ty
                .as_ref()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "?".to_string());
            out.push_str(&format!("{:>40} | {:>20}\n", entry.name, ty));
        }
        out.push_str(&sep);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varids_are_monotone() {
        let mut bindings = Bindings::new();
        assert_eq!(bindings.add("a", None, None), 0);
        assert_eq!(bindings.add("b", None, None), 1);
        assert_eq!(bindings.add("c", None, None), 2);
    }

    #[test]
    fn scope_exit_truncates() {
        let mut bindings = Bindings::new();
        bindings.add("outer", None, None);
        bindings.enter_scope();
        bindings.add("inner", None, None);
        assert_eq!(bindings.get_varid("inner"), 1);
        bindings.exit_scope();
        assert_eq!(bindings.get_varid("inner"), -1);
        assert_eq!(bindings.get_varid("outer"), 0);
    }

    #[test]
    fn lookup_prefers_the_newest_binding() {
        let mut bindings = Bindings::new();
        bindings.add("x", None, Some(TypeExpr::int()));
        bindings.enter_scope();
        bindings.add("x", None, Some(TypeExpr::float()));
        let varid = bindings.get_varid("x");
        assert_eq!(varid, 1);
        assert_eq!(bindings.get_type(varid), Some(TypeExpr::float()));
    }
}

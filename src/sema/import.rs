//! Module lookup and the import half of the analyser.
//!
//! `PYTHONPATH` is a colon-separated list of directories, read once when
//! the analyser is constructed. A dotted module path maps onto the
//! filesystem: a directory resolves through its `__init__` file, a plain
//! name through `<name>.ly` (`.py` is accepted too). A found module runs
//! through the whole front half of the pipeline recursively.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::ast::{Alias, ExprKind, Span, StmtKind, TypeExpr};
use crate::buffer::FileBuffer;
use crate::lexer::Lexer;
use crate::module::Module;
use crate::parser::Parser;

use super::bindings::BindingValue;
use super::errors::SemaError;
use super::{AnalysedImport, SemanticAnalyser};

const SOURCE_EXTENSIONS: &[&str] = &["ly", "py"];

pub fn python_paths() -> Vec<PathBuf> {
    let Ok(value) = env::var("PYTHONPATH") else {
        return Vec::new();
    };
    value
        .split(':')
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Walk the search path for a dotted module name.
pub fn lookup_module(module_path: &str, paths: &[PathBuf]) -> Option<PathBuf> {
    log::debug!("looking for {} in {:?}", module_path, paths);
    let frags: Vec<&str> = module_path.split('.').collect();

    for path in paths {
        if !path.is_dir() {
            log::debug!("not a directory {}", path.display());
            continue;
        }

        let mut fspath = path.clone();
        for frag in &frags {
            fspath.push(frag);
        }

        if fspath.is_dir() {
            // folder module: import my.module => my/module/__init__.ly
            for ext in SOURCE_EXTENSIONS {
                let init = fspath.join(format!("__init__.{}", ext));
                if init.is_file() {
                    log::debug!("found file {}", init.display());
                    return Some(init);
                }
            }
        } else {
            // file module: import my.module => my/module.ly
            for ext in SOURCE_EXTENSIONS {
                let file = fspath.with_extension(ext);
                if file.is_file() {
                    log::debug!("found file {}", file.display());
                    return Some(file);
                }
            }
        }
    }

    None
}

/// Run lex → parse → sema over a module file.
pub fn process_module(path: &Path, dotted_name: &str) -> Result<AnalysedImport> {
    let buffer = FileBuffer::open(path)?;
    let mut module = Module::new();

    let lexer = Lexer::new(Box::new(buffer));
    let mut parser = Parser::new(lexer, &mut module);
    let body = parser.parse_module();
    if !parser.errors.is_empty() {
        bail!(
            "syntax errors while importing {}: {}",
            path.display(),
            parser.errors[0]
        );
    }

    let mut sema = SemanticAnalyser::new(&mut module.ast);
    sema.analyse_module(&body);
    let bindings = std::mem::take(&mut sema.bindings);
    let errors = std::mem::take(&mut sema.errors);
    drop(sema);

    Ok(AnalysedImport {
        name: dotted_name.to_string(),
        module,
        body,
        bindings,
        errors,
    })
}

impl<'a> SemanticAnalyser<'a> {
    /// `import a.b.c [as name]`
    pub(super) fn import(&mut self, names: &[Alias], span: Span) -> Option<TypeExpr> {
        for alias in names {
            let Some(path) = lookup_module(&alias.name, &self.paths) else {
                self.errors.push(SemaError::ModuleNotFoundError {
                    module: alias.name.clone(),
                    span,
                });
                continue;
            };

            match process_module(&path, &alias.name) {
                Ok(imported) => {
                    self.errors.extend(imported.errors.iter().cloned());
                    let index = self.modules.len();
                    self.modules.push(imported);

                    let bind_name = alias.asname.as_deref().unwrap_or(&alias.name);
                    self.bindings.add(
                        bind_name,
                        Some(BindingValue::Module(index)),
                        Some(TypeExpr::Module(alias.name.clone())),
                    );
                }
                Err(error) => {
                    log::warn!("import of {} failed: {}", alias.name, error);
                    self.errors.push(SemaError::ModuleNotFoundError {
                        module: alias.name.clone(),
                        span,
                    });
                }
            }
        }
        None
    }

    /// `from m import n [as name]`
    pub(super) fn importfrom(
        &mut self,
        module: Option<String>,
        names: &[Alias],
        span: Span,
    ) -> Option<TypeExpr> {
        let Some(module_name) = module else {
            return None;
        };

        let Some(path) = lookup_module(&module_name, &self.paths) else {
            self.errors.push(SemaError::ModuleNotFoundError {
                module: module_name,
                span,
            });
            return None;
        };

        let imported = match process_module(&path, &module_name) {
            Ok(imported) => imported,
            Err(error) => {
                log::warn!("import of {} failed: {}", module_name, error);
                self.errors.push(SemaError::ModuleNotFoundError {
                    module: module_name,
                    span,
                });
                return None;
            }
        };
        self.errors.extend(imported.errors.iter().cloned());
        let index = self.modules.len();
        self.modules.push(imported);

        for alias in names {
            let found = find_definition(&self.modules[index], &alias.name);
            match found {
                Some((stmt, ty)) => {
                    let local = alias.asname.as_deref().unwrap_or(&alias.name);
                    self.bindings.add(
                        local,
                        Some(BindingValue::Imported {
                            module: index,
                            stmt,
                        }),
                        ty,
                    );
                }
                None => {
                    log::debug!("{} not found in {}", alias.name, module_name);
                    self.errors.push(SemaError::ImportError {
                        module: module_name.clone(),
                        name: alias.name.clone(),
                        span,
                    });
                }
            }
        }

        None
    }
}

/// Locate a top-level definition (class, function, assignment) by name.
fn find_definition(
    imported: &AnalysedImport,
    name: &str,
) -> Option<(crate::ast::StmtId, Option<TypeExpr>)> {
    let ast = &imported.module.ast;

    for &stmt in &imported.body {
        let matches_name = match &ast.stmt(stmt).kind {
            StmtKind::ClassDef(def) => def.name == name,
            StmtKind::FunctionDef(def) => def.name == name,
            StmtKind::Assign { targets, .. } => targets.first().is_some_and(|t| {
                matches!(&ast.expr(*t).kind, ExprKind::Name { id, .. } if id == name)
            }),
            StmtKind::AnnAssign { target, .. } => {
                matches!(&ast.expr(*target).kind, ExprKind::Name { id, .. } if id == name)
            }
            _ => false,
        };

        if matches_name {
            let ty = imported
                .bindings
                .lookup(name)
                .and_then(|(_, entry)| entry.ty.clone());
            return Some((stmt, ty));
        }
    }

    None
}

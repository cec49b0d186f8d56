//! The builtin prelude installed into every root scope.

use crate::ast::{ConstantValue, TypeExpr};

use super::bindings::{BindingValue, Bindings};

/// Builtin callables the interpreter implements natively.
///
/// `__getitem__` backs subscripts and the tuple-unpacking rewrite of the
/// SSA pass; its argument types stay open.
pub fn native_functions() -> Vec<(&'static str, TypeExpr)> {
    vec![
        (
            "min",
            TypeExpr::arrow(vec![TypeExpr::float(), TypeExpr::float()], TypeExpr::float()),
        ),
        (
            "max",
            TypeExpr::arrow(vec![TypeExpr::float(), TypeExpr::float()], TypeExpr::float()),
        ),
        (
            "sin",
            TypeExpr::arrow(vec![TypeExpr::float()], TypeExpr::float()),
        ),
        (
            "__getitem__",
            TypeExpr::arrow(
                vec![TypeExpr::Unknown, TypeExpr::Unknown],
                TypeExpr::Unknown,
            ),
        ),
    ]
}

/// Pre-insert the type-of-type, the scalar type refs, the native
/// callables and the constant `pi`.
pub fn install_prelude(bindings: &mut Bindings) {
    bindings.add("Type", None, Some(TypeExpr::Type));
    for name in ["Float", "Int", "Bool", "Str", "None"] {
        bindings.add(name, None, Some(TypeExpr::Type));
    }

    for (name, ty) in native_functions() {
        bindings.add(
            name,
            Some(BindingValue::Native(name.to_string())),
            Some(ty),
        );
    }

    bindings.add(
        "pi",
        Some(BindingValue::Constant(ConstantValue::Float(3.14))),
        Some(TypeExpr::float()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prelude_binds_the_builtins() {
        let mut bindings = Bindings::new();
        install_prelude(&mut bindings);

        assert!(bindings.get_varid("Float") >= 0);
        assert!(bindings.get_varid("pi") >= 0);

        let max = bindings.get_varid("max");
        assert!(max >= 0);
        let arrow = bindings.get_type(max).unwrap();
        assert_eq!(arrow.to_string(), "(Float, Float) -> Float");
    }
}

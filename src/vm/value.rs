//! Runtime values and their operators.

use crate::ast::{BinaryOperator, CmpOperator, ConstantValue, UnaryOperator};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// A function value: the program index of its entry point.
    Label(usize),
}

impl Value {
    pub fn from_constant(constant: &ConstantValue) -> Self {
        match constant {
            ConstantValue::Int(v) => Value::Int(*v),
            ConstantValue::Float(v) => Value::Float(*v),
            ConstantValue::Str(s) => Value::Str(s.clone()),
            ConstantValue::Bool(b) => Value::Bool(*b),
            ConstantValue::None => Value::None,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) | Value::Tuple(items) => !items.is_empty(),
            Value::Label(_) => true,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric binary operators with Int→Float promotion, plus string and
    /// list concatenation. `None` means the operands do not support the
    /// operator.
    pub fn binary_op(&self, op: BinaryOperator, rhs: &Value) -> Option<Value> {
        use BinaryOperator::*;

        // bitwise and shift operators only exist on integers
        if let (Value::Int(l), Value::Int(r)) = (self, rhs) {
            match op {
                LShift => return Some(Value::Int(l << r)),
                RShift => return Some(Value::Int(l >> r)),
                BitOr => return Some(Value::Int(l | r)),
                BitXor => return Some(Value::Int(l ^ r)),
                BitAnd => return Some(Value::Int(l & r)),
                _ => {}
            }
        }

        match (self, rhs) {
            (Value::Str(l), Value::Str(r)) if op == Add => {
                return Some(Value::Str(format!("{}{}", l, r)));
            }
            (Value::List(l), Value::List(r)) if op == Add => {
                let mut items = l.clone();
                items.extend(r.iter().cloned());
                return Some(Value::List(items));
            }
            _ => {}
        }

        // integer arithmetic stays integral except for true division
        if let (Value::Int(l), Value::Int(r)) = (self, rhs) {
            let value = match op {
                Add => Value::Int(l + r),
                Sub => Value::Int(l - r),
                Mult | MatMult => Value::Int(l * r),
                Div => {
                    if *r == 0 {
                        return None;
                    }
                    Value::Float(*l as f64 / *r as f64)
                }
                FloorDiv => {
                    if *r == 0 {
                        return None;
                    }
                    Value::Int(l.div_euclid(*r))
                }
                Mod => {
                    if *r == 0 {
                        return None;
                    }
                    Value::Int(l.rem_euclid(*r))
                }
                Pow => {
                    if *r >= 0 {
                        Value::Int(l.pow(*r as u32))
                    } else {
                        Value::Float((*l as f64).powi(*r as i32))
                    }
                }
                _ => return None,
            };
            return Some(value);
        }

        let (l, r) = (self.as_f64()?, rhs.as_f64()?);
        let value = match op {
            Add => l + r,
            Sub => l - r,
            Mult | MatMult => l * r,
            Div => l / r,
            FloorDiv => (l / r).floor(),
            Mod => l.rem_euclid(r),
            Pow => l.powf(r),
            _ => return None,
        };
        Some(Value::Float(value))
    }

    pub fn compare_op(&self, op: CmpOperator, rhs: &Value) -> Option<bool> {
        use CmpOperator::*;

        match op {
            Eq | Is => return Some(self.loose_eq(rhs)),
            NotEq | IsNot => return Some(!self.loose_eq(rhs)),
            In => return rhs.contains(self),
            NotIn => return rhs.contains(self).map(|c| !c),
            _ => {}
        }

        if let (Value::Str(l), Value::Str(r)) = (self, rhs) {
            return Some(match op {
                Lt => l < r,
                LtE => l <= r,
                Gt => l > r,
                GtE => l >= r,
                _ => unreachable!(),
            });
        }

        let (l, r) = (self.as_f64()?, rhs.as_f64()?);
        Some(match op {
            Lt => l < r,
            LtE => l <= r,
            Gt => l > r,
            GtE => l >= r,
            _ => unreachable!(),
        })
    }

    fn loose_eq(&self, rhs: &Value) -> bool {
        if let (Some(l), Some(r)) = (self.as_f64(), rhs.as_f64()) {
            return l == r;
        }
        self == rhs
    }

    fn contains(&self, needle: &Value) -> Option<bool> {
        match self {
            Value::List(items) | Value::Tuple(items) => {
                Some(items.iter().any(|item| item.loose_eq(needle)))
            }
            Value::Str(haystack) => match needle {
                Value::Str(sub) => Some(haystack.contains(sub.as_str())),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn unary_op(&self, op: UnaryOperator) -> Option<Value> {
        match op {
            UnaryOperator::Not => Some(Value::Bool(!self.truthy())),
            UnaryOperator::UAdd => match self {
                Value::Int(_) | Value::Float(_) => Some(self.clone()),
                _ => None,
            },
            UnaryOperator::USub => match self {
                Value::Int(v) => Some(Value::Int(-v)),
                Value::Float(v) => Some(Value::Float(-v)),
                _ => None,
            },
            UnaryOperator::Invert => match self {
                Value::Int(v) => Some(Value::Int(!v)),
                _ => None,
            },
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => {
                if v.is_finite() && v.fract() == 0.0 {
                    write!(f, "{:.1}", v)
                } else {
                    write!(f, "{}", v)
                }
            }
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Value::Label(index) => write!(f, "<function at {}>", index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_stays_integral() {
        let seven = Value::Int(1)
            .binary_op(BinaryOperator::Add, &Value::Int(6))
            .unwrap();
        assert_eq!(seven, Value::Int(7));
    }

    #[test]
    fn mixed_arithmetic_promotes_to_float() {
        let v = Value::Float(4.0)
            .binary_op(BinaryOperator::Div, &Value::Int(2))
            .unwrap();
        assert_eq!(v, Value::Float(2.0));
    }

    #[test]
    fn true_division_of_ints_is_a_float() {
        let v = Value::Int(7)
            .binary_op(BinaryOperator::Div, &Value::Int(2))
            .unwrap();
        assert_eq!(v, Value::Float(3.5));
    }

    #[test]
    fn string_concatenation() {
        let v = Value::Str("ab".into())
            .binary_op(BinaryOperator::Add, &Value::Str("cd".into()))
            .unwrap();
        assert_eq!(v, Value::Str("abcd".into()));
    }

    #[test]
    fn comparisons_promote_like_arithmetic() {
        assert_eq!(
            Value::Int(1).compare_op(CmpOperator::Lt, &Value::Float(1.5)),
            Some(true)
        );
        assert_eq!(
            Value::Int(2).compare_op(CmpOperator::Eq, &Value::Float(2.0)),
            Some(true)
        );
    }

    #[test]
    fn division_by_zero_is_rejected() {
        assert_eq!(Value::Int(1).binary_op(BinaryOperator::Div, &Value::Int(0)), None);
    }
}

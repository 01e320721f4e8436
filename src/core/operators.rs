//! Constant-expression operators with Zend semantics.
//!
//! Integer `+ - *` overflow to float, `/` stays integral only when the
//! division is exact, `%` takes the sign of the dividend and `**` keeps
//! integers for non-negative exponents until it overflows.

use crate::core::value::{ArrayData, ArrayKey, Val};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum OperatorError {
    DivisionByZero,
    ModuloByZero,
    NegativeShift,
    UnsupportedOperands {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
}

impl fmt::Display for OperatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorError::DivisionByZero => write!(f, "Division by zero"),
            OperatorError::ModuloByZero => write!(f, "Modulo by zero"),
            OperatorError::NegativeShift => write!(f, "Bit shift by negative number"),
            OperatorError::UnsupportedOperands { op, left, right } => {
                write!(f, "Unsupported operand types: {} {} {}", left, op, right)
            }
        }
    }
}

impl std::error::Error for OperatorError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl ArithOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
            ArithOp::Pow => "**",
        }
    }

    /// `None` when the integer result does not fit (or is not integral).
    fn apply_int(&self, a: i64, b: i64) -> Option<i64> {
        match self {
            ArithOp::Add => a.checked_add(b),
            ArithOp::Sub => a.checked_sub(b),
            ArithOp::Mul => a.checked_mul(b),
            ArithOp::Div if a.checked_rem(b) == Some(0) => a.checked_div(b),
            ArithOp::Pow if b >= 0 => u32::try_from(b).ok().and_then(|e| a.checked_pow(e)),
            _ => None,
        }
    }

    fn apply_float(&self, a: f64, b: f64) -> f64 {
        match self {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
            ArithOp::Pow => a.powf(b),
            ArithOp::Mod => a % b,
        }
    }
}

fn unsupported(op: &'static str, a: &Val, b: &Val) -> OperatorError {
    OperatorError::UnsupportedOperands {
        op,
        left: a.type_name(),
        right: b.type_name(),
    }
}

pub fn arithmetic(op: ArithOp, a: &Val, b: &Val) -> Result<Val, OperatorError> {
    match (a, b) {
        (Val::Array(left), Val::Array(right)) if op == ArithOp::Add => {
            return Ok(array_union(left, right));
        }
        (Val::Array(_), _) | (_, Val::Array(_)) => return Err(unsupported(op.symbol(), a, b)),
        _ => {}
    }

    if op == ArithOp::Mod {
        let divisor = b.to_int();
        if divisor == 0 {
            return Err(OperatorError::ModuloByZero);
        }
        // i64::MIN % -1 overflows
        return Ok(Val::Int(a.to_int().checked_rem(divisor).unwrap_or(0)));
    }

    let (a, b) = (a.to_number(), b.to_number());
    if op == ArithOp::Div && b.to_float() == 0.0 {
        return Err(OperatorError::DivisionByZero);
    }

    if let (Val::Int(x), Val::Int(y)) = (&a, &b)
        && let Some(result) = op.apply_int(*x, *y)
    {
        return Ok(Val::Int(result));
    }
    Ok(Val::Float(op.apply_float(a.to_float(), b.to_float())))
}

fn array_union(left: &Rc<ArrayData>, right: &Rc<ArrayData>) -> Val {
    let mut result = (**left).clone();
    for (key, value) in right.iter() {
        if !result.map.contains_key(key) {
            result.insert(key.clone(), value.clone());
        }
    }
    Val::Array(Rc::new(result))
}

pub fn negate(a: &Val) -> Result<Val, OperatorError> {
    arithmetic(ArithOp::Mul, a, &Val::Int(-1))
}

/// Unary plus: numeric conversion.
pub fn identity(a: &Val) -> Result<Val, OperatorError> {
    arithmetic(ArithOp::Mul, a, &Val::Int(1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitwiseOp {
    And,
    Or,
    Xor,
    ShiftLeft,
    ShiftRight,
}

impl BitwiseOp {
    fn symbol(&self) -> &'static str {
        match self {
            BitwiseOp::And => "&",
            BitwiseOp::Or => "|",
            BitwiseOp::Xor => "^",
            BitwiseOp::ShiftLeft => "<<",
            BitwiseOp::ShiftRight => ">>",
        }
    }
}

pub fn bitwise(op: BitwiseOp, a: &Val, b: &Val) -> Result<Val, OperatorError> {
    if matches!(a, Val::Array(_)) || matches!(b, Val::Array(_)) {
        return Err(unsupported(op.symbol(), a, b));
    }

    if let (Val::String(x), Val::String(y)) = (a, b)
        && !matches!(op, BitwiseOp::ShiftLeft | BitwiseOp::ShiftRight)
    {
        return Ok(string_bitwise(op, x.as_bytes(), y.as_bytes()));
    }

    let (x, y) = (a.to_int(), b.to_int());
    Ok(Val::Int(match op {
        BitwiseOp::And => x & y,
        BitwiseOp::Or => x | y,
        BitwiseOp::Xor => x ^ y,
        BitwiseOp::ShiftLeft | BitwiseOp::ShiftRight if y < 0 => {
            return Err(OperatorError::NegativeShift);
        }
        BitwiseOp::ShiftLeft if y >= 64 => 0,
        BitwiseOp::ShiftLeft => x << y,
        BitwiseOp::ShiftRight if y >= 64 => {
            if x < 0 {
                -1
            } else {
                0
            }
        }
        BitwiseOp::ShiftRight => x >> y,
    }))
}

fn string_bitwise(op: BitwiseOp, x: &[u8], y: &[u8]) -> Val {
    let (longer, shorter) = if x.len() >= y.len() { (x, y) } else { (y, x) };
    let bytes: Vec<u8> = match op {
        BitwiseOp::Or => longer
            .iter()
            .enumerate()
            .map(|(i, b)| b | shorter.get(i).copied().unwrap_or(0))
            .collect(),
        BitwiseOp::And => shorter.iter().zip(longer).map(|(a, b)| a & b).collect(),
        _ => shorter.iter().zip(longer).map(|(a, b)| a ^ b).collect(),
    };
    Val::String(Rc::from(String::from_utf8_lossy(&bytes).as_ref()))
}

pub fn bit_not(a: &Val) -> Result<Val, OperatorError> {
    match a {
        Val::Int(i) => Ok(Val::Int(!i)),
        Val::Float(f) => Ok(Val::Int(!crate::core::value::float_to_int(*f))),
        Val::String(s) => {
            let bytes: Vec<u8> = s.bytes().map(|b| !b).collect();
            Ok(Val::String(Rc::from(String::from_utf8_lossy(&bytes).as_ref())))
        }
        _ => Err(OperatorError::UnsupportedOperands {
            op: "~",
            left: a.type_name(),
            right: a.type_name(),
        }),
    }
}

pub fn concat(a: &Val, b: &Val) -> Val {
    let mut s = a.to_php_string().to_string();
    s.push_str(&b.to_php_string());
    Val::String(Rc::from(s))
}

/// `===`
pub fn identical(a: &Val, b: &Val) -> bool {
    match (a, b) {
        (Val::Null, Val::Null) => true,
        (Val::Bool(x), Val::Bool(y)) => x == y,
        (Val::Int(x), Val::Int(y)) => x == y,
        (Val::Float(x), Val::Float(y)) => x == y,
        (Val::String(x), Val::String(y)) => x == y,
        (Val::Array(x), Val::Array(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y.iter())
                    .all(|((kx, vx), (ky, vy))| kx == ky && identical(vx, vy))
        }
        _ => false,
    }
}

/// `==`
pub fn loose_equals(a: &Val, b: &Val) -> bool {
    match (a, b) {
        (Val::Float(x), _) if x.is_nan() => false,
        (_, Val::Float(y)) if y.is_nan() => false,
        (Val::Array(x), Val::Array(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(key, value)| y.get(key).is_some_and(|other| loose_equals(value, other)))
        }
        _ => compare(a, b) == Some(Ordering::Equal),
    }
}

fn compare_numbers(a: &Val, b: &Val) -> Option<Ordering> {
    match (a, b) {
        (Val::Int(x), Val::Int(y)) => Some(x.cmp(y)),
        _ => a.to_float().partial_cmp(&b.to_float()),
    }
}

/// Three-way comparison (`<=>`) with PHP 8 type juggling. `None` when the
/// operands are uncomparable (NaN, arrays with disjoint keys).
pub fn compare(a: &Val, b: &Val) -> Option<Ordering> {
    match (a, b) {
        (Val::Bool(_), _) | (_, Val::Bool(_)) => Some(a.to_bool().cmp(&b.to_bool())),
        (Val::Null, Val::Null) => Some(Ordering::Equal),
        (Val::Null, Val::String(s)) => Some("".cmp(&**s)),
        (Val::String(s), Val::Null) => Some((**s).cmp("")),
        (Val::Null, _) | (_, Val::Null) => Some(a.to_bool().cmp(&b.to_bool())),

        (Val::Int(_) | Val::Float(_), Val::Int(_) | Val::Float(_)) => compare_numbers(a, b),

        (Val::String(x), Val::String(y)) => {
            match (Val::numeric_string(x), Val::numeric_string(y)) {
                (Some(nx), Some(ny)) => compare_numbers(&nx, &ny),
                _ => Some(x.as_bytes().cmp(y.as_bytes())),
            }
        }
        (Val::String(s), Val::Int(_) | Val::Float(_)) => match Val::numeric_string(s) {
            Some(n) => compare_numbers(&n, b),
            None => Some(s.as_bytes().cmp(b.to_php_string().as_bytes())),
        },
        (Val::Int(_) | Val::Float(_), Val::String(s)) => match Val::numeric_string(s) {
            Some(n) => compare_numbers(a, &n),
            None => Some(a.to_php_string().as_bytes().cmp(s.as_bytes())),
        },

        (Val::Array(x), Val::Array(y)) => compare_arrays(x, y),
        (Val::Array(_), _) => Some(Ordering::Greater),
        (_, Val::Array(_)) => Some(Ordering::Less),
    }
}

fn compare_arrays(x: &ArrayData, y: &ArrayData) -> Option<Ordering> {
    match x.len().cmp(&y.len()) {
        Ordering::Equal => {}
        other => return Some(other),
    }
    for (key, value) in x.iter() {
        let other = y.get(key)?;
        match compare(value, other)? {
            Ordering::Equal => {}
            ord => return Some(ord),
        }
    }
    Some(Ordering::Equal)
}

/// `<=>` as an integer; uncomparable operands give 1.
pub fn spaceship(a: &Val, b: &Val) -> i64 {
    match compare(a, b) {
        Some(Ordering::Less) => -1,
        Some(Ordering::Equal) => 0,
        Some(Ordering::Greater) | None => 1,
    }
}

/// Array key for `$arr[$dim]` reads on constant arrays and strings.
pub fn fetch_dim(container: &Val, dim: &Val) -> Option<Val> {
    match container {
        Val::Array(arr) => arr.get(&ArrayKey::from_val(dim)?).cloned(),
        Val::String(s) => {
            let len = s.len() as i64;
            let mut index = dim.to_int();
            if index < 0 {
                index += len;
            }
            if (0..len).contains(&index) {
                let byte = s.as_bytes()[index as usize];
                Some(Val::String(Rc::from(
                    String::from_utf8_lossy(&[byte]).as_ref(),
                )))
            } else {
                None
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_arithmetic_promotes_on_overflow() {
        assert_eq!(
            arithmetic(ArithOp::Add, &Val::Int(1), &Val::Int(2)),
            Ok(Val::Int(3))
        );
        assert_eq!(
            arithmetic(ArithOp::Add, &Val::Int(i64::MAX), &Val::Int(1)),
            Ok(Val::Float(i64::MAX as f64 + 1.0))
        );
        assert_eq!(
            arithmetic(ArithOp::Mul, &Val::from("3"), &Val::Int(4)),
            Ok(Val::Int(12))
        );
    }

    #[test]
    fn test_division_rules() {
        assert_eq!(
            arithmetic(ArithOp::Div, &Val::Int(6), &Val::Int(3)),
            Ok(Val::Int(2))
        );
        assert_eq!(
            arithmetic(ArithOp::Div, &Val::Int(7), &Val::Int(2)),
            Ok(Val::Float(3.5))
        );
        assert_eq!(
            arithmetic(ArithOp::Div, &Val::Int(1), &Val::Int(0)),
            Err(OperatorError::DivisionByZero)
        );
        assert_eq!(
            arithmetic(ArithOp::Mod, &Val::Int(-7), &Val::Int(3)),
            Ok(Val::Int(-1))
        );
        assert_eq!(
            arithmetic(ArithOp::Mod, &Val::Int(7), &Val::Int(0)),
            Err(OperatorError::ModuloByZero)
        );
    }

    #[test]
    fn test_pow() {
        assert_eq!(
            arithmetic(ArithOp::Pow, &Val::Int(2), &Val::Int(10)),
            Ok(Val::Int(1024))
        );
        assert_eq!(
            arithmetic(ArithOp::Pow, &Val::Int(2), &Val::Int(-1)),
            Ok(Val::Float(0.5))
        );
        assert!(matches!(
            arithmetic(ArithOp::Pow, &Val::Int(10), &Val::Int(30)),
            Ok(Val::Float(_))
        ));
    }

    #[test]
    fn test_array_union_keeps_left_entries() {
        let left: ArrayData = vec![Val::Int(1), Val::Int(2)].into_iter().collect();
        let right: ArrayData = vec![Val::Int(9), Val::Int(9), Val::Int(3)]
            .into_iter()
            .collect();
        let result = arithmetic(ArithOp::Add, &Val::array(left), &Val::array(right)).unwrap();
        let expected: ArrayData = vec![Val::Int(1), Val::Int(2), Val::Int(3)]
            .into_iter()
            .collect();
        assert_eq!(result, Val::array(expected));
    }

    #[test]
    fn test_bitwise_and_shifts() {
        assert_eq!(
            bitwise(BitwiseOp::Or, &Val::Int(1), &Val::Int(4)),
            Ok(Val::Int(5))
        );
        assert_eq!(
            bitwise(BitwiseOp::ShiftLeft, &Val::Int(1), &Val::Int(3)),
            Ok(Val::Int(8))
        );
        assert_eq!(
            bitwise(BitwiseOp::ShiftRight, &Val::Int(-8), &Val::Int(100)),
            Ok(Val::Int(-1))
        );
        assert_eq!(
            bitwise(BitwiseOp::ShiftLeft, &Val::Int(1), &Val::Int(-1)),
            Err(OperatorError::NegativeShift)
        );
        assert_eq!(bit_not(&Val::Int(0)), Ok(Val::Int(-1)));
    }

    #[test]
    fn test_loose_and_strict_comparison() {
        assert!(loose_equals(&Val::Int(1), &Val::from("1")));
        assert!(loose_equals(&Val::from("1e3"), &Val::from("1000")));
        assert!(!loose_equals(&Val::Int(0), &Val::from("a")));
        assert!(loose_equals(&Val::Null, &Val::Bool(false)));
        assert!(loose_equals(&Val::Null, &Val::from("")));
        assert!(!identical(&Val::Int(1), &Val::Float(1.0)));
        assert!(identical(&Val::from("a"), &Val::from("a")));
    }

    #[test]
    fn test_spaceship() {
        assert_eq!(spaceship(&Val::Int(1), &Val::Int(2)), -1);
        assert_eq!(spaceship(&Val::from("b"), &Val::from("a")), 1);
        assert_eq!(spaceship(&Val::Float(2.5), &Val::Int(2)), 1);
        assert_eq!(spaceship(&Val::Null, &Val::Int(0)), 0);
    }

    #[test]
    fn test_concat_uses_php_string_conversion() {
        assert_eq!(
            concat(&Val::from("v"), &Val::Float(2.0)),
            Val::from("v2")
        );
        assert_eq!(concat(&Val::Bool(true), &Val::Null), Val::from("1"));
    }
}

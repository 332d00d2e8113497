use std::cmp::Ordering;

use crate::error::{Error, ErrorKind};
use crate::value::{Value, ValueRepr};

pub enum CoerceResult<'a> {
    I64(i64, i64),
    F64(f64, f64),
    Str(&'a str, &'a str),
}

pub fn coerce<'x>(a: &'x Value, b: &'x Value) -> Option<CoerceResult<'x>> {
    match (&a.0, &b.0) {
        (ValueRepr::String(a, _), ValueRepr::String(b, _)) => Some(CoerceResult::Str(a, b)),
        (ValueRepr::I64(a), ValueRepr::I64(b)) => Some(CoerceResult::I64(*a, *b)),
        (ValueRepr::F64(a), ValueRepr::F64(b)) => Some(CoerceResult::F64(*a, *b)),

        // are floats involved?
        (ValueRepr::F64(a), _) => Some(CoerceResult::F64(*a, some!(b.as_f64()))),
        (_, ValueRepr::F64(b)) => Some(CoerceResult::F64(some!(a.as_f64()), *b)),

        // everything else tries to go through i64
        _ => Some(CoerceResult::I64(some!(a.as_i64()), some!(b.as_i64()))),
    }
}

fn impossible_op(op: &str, lhs: &Value, rhs: &Value) -> Error {
    Error::new(
        ErrorKind::InvalidOperation,
        format!(
            "tried to use {} operator on unsupported types {} and {}",
            op,
            lhs.kind(),
            rhs.kind()
        ),
    )
}

fn failed_op(op: &str, lhs: &Value, rhs: &Value) -> Error {
    Error::new(
        ErrorKind::InvalidOperation,
        format!("unable to calculate {lhs:?} {op} {rhs:?}"),
    )
}

macro_rules! math_binop {
    ($name:ident, $int:ident, $float:tt) => {
        pub fn $name(lhs: &Value, rhs: &Value) -> Result<Value, Error> {
            match coerce(lhs, rhs) {
                Some(CoerceResult::I64(a, b)) => match a.$int(b) {
                    Some(val) => Ok(Value::from(val)),
                    None => Err(failed_op(stringify!($float), lhs, rhs)),
                },
                Some(CoerceResult::F64(a, b)) => Ok(Value::from(a $float b)),
                _ => Err(impossible_op(stringify!($float), lhs, rhs)),
            }
        }
    }
}

pub fn add(lhs: &Value, rhs: &Value) -> Result<Value, Error> {
    match coerce(lhs, rhs) {
        Some(CoerceResult::I64(a, b)) => a
            .checked_add(b)
            .map(Value::from)
            .ok_or_else(|| failed_op("+", lhs, rhs)),
        Some(CoerceResult::F64(a, b)) => Ok(Value::from(a + b)),
        Some(CoerceResult::Str(a, b)) => Ok(Value::from([a, b].concat())),
        None => match (&lhs.0, &rhs.0) {
            (ValueRepr::Seq(a), ValueRepr::Seq(b)) => Ok(Value(ValueRepr::Seq(
                a.iter().chain(b.iter()).cloned().collect::<Vec<_>>().into(),
            ))),
            _ => Err(impossible_op("+", lhs, rhs)),
        },
    }
}

math_binop!(sub, checked_sub, -);
math_binop!(mul, checked_mul, *);
math_binop!(rem, checked_rem_euclid, %);

pub fn div(lhs: &Value, rhs: &Value) -> Result<Value, Error> {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) if b != 0.0 => Ok(Value::from(a / b)),
        (Some(_), Some(_)) => Err(failed_op("/", lhs, rhs)),
        _ => Err(impossible_op("/", lhs, rhs)),
    }
}

pub fn int_div(lhs: &Value, rhs: &Value) -> Result<Value, Error> {
    match coerce(lhs, rhs) {
        Some(CoerceResult::I64(a, b)) => {
            if b != 0 {
                a.checked_div_euclid(b)
                    .map(Value::from)
                    .ok_or_else(|| failed_op("//", lhs, rhs))
            } else {
                Err(failed_op("//", lhs, rhs))
            }
        }
        Some(CoerceResult::F64(a, b)) if b != 0.0 => Ok(Value::from((a / b).floor())),
        _ => Err(impossible_op("//", lhs, rhs)),
    }
}

pub fn pow(lhs: &Value, rhs: &Value) -> Result<Value, Error> {
    match coerce(lhs, rhs) {
        Some(CoerceResult::I64(a, b)) => {
            if b >= 0 {
                match u32::try_from(b).ok().and_then(|exp| a.checked_pow(exp)) {
                    Some(val) => Ok(Value::from(val)),
                    None => Err(failed_op("**", lhs, rhs)),
                }
            } else {
                Ok(Value::from((a as f64).powf(b as f64)))
            }
        }
        Some(CoerceResult::F64(a, b)) => Ok(Value::from(a.powf(b))),
        _ => Err(impossible_op("**", lhs, rhs)),
    }
}

pub fn neg(value: &Value) -> Result<Value, Error> {
    match value.0 {
        ValueRepr::I64(i) => Ok(Value::from(-i)),
        ValueRepr::F64(f) => Ok(Value::from(-f)),
        _ => Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("tried to negate a value of type {}", value.kind()),
        )),
    }
}

pub fn value_eq(lhs: &Value, rhs: &Value) -> bool {
    match coerce(lhs, rhs) {
        Some(CoerceResult::I64(a, b)) => a == b,
        Some(CoerceResult::F64(a, b)) => a == b,
        Some(CoerceResult::Str(a, b)) => a == b,
        None => match (&lhs.0, &rhs.0) {
            (ValueRepr::Undefined, ValueRepr::Undefined) => true,
            (ValueRepr::None, ValueRepr::None) => true,
            (ValueRepr::Bool(a), ValueRepr::Bool(b)) => a == b,
            (ValueRepr::Seq(a), ValueRepr::Seq(b)) => a.as_ref() == b.as_ref(),
            (ValueRepr::Map(a), ValueRepr::Map(b)) => a.as_ref() == b.as_ref(),
            _ => false,
        },
    }
}

pub fn value_cmp(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match coerce(lhs, rhs)? {
        CoerceResult::I64(a, b) => Some(a.cmp(&b)),
        CoerceResult::F64(a, b) => a.partial_cmp(&b),
        CoerceResult::Str(a, b) => Some(a.cmp(b)),
    }
}

/// Implements the `in` operator.
pub fn contains(container: &Value, value: &Value) -> Result<bool, Error> {
    match container.0 {
        ValueRepr::Seq(ref seq) => Ok(seq.iter().any(|item| value_eq(item, value))),
        ValueRepr::Map(ref map) => Ok(match value.as_str() {
            Some(key) => map.contains_key(key),
            None => false,
        }),
        ValueRepr::String(ref s, _) => match value.as_str() {
            Some(needle) => Ok(s.contains(needle)),
            None => Ok(s.contains(&value.to_string())),
        },
        _ => Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("cannot perform containment check on {}", container.kind()),
        )),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        assert_eq!(add(&Value::from(1), &Value::from(2)).unwrap(), Value::from(3));
        assert_eq!(
            add(&Value::from("a"), &Value::from("b")).unwrap(),
            Value::from("ab")
        );
        assert_eq!(mul(&Value::from(3), &Value::from(4)).unwrap(), Value::from(12));
        assert_eq!(
            div(&Value::from(1), &Value::from(2)).unwrap(),
            Value::from(0.5)
        );
        assert_eq!(
            int_div(&Value::from(7), &Value::from(2)).unwrap(),
            Value::from(3)
        );
        assert!(div(&Value::from(1), &Value::from(0)).is_err());
    }

    #[test]
    fn test_mixed_comparison() {
        assert_eq!(
            value_cmp(&Value::from(1), &Value::from(1.5)),
            Some(Ordering::Less)
        );
        assert!(value_eq(&Value::from(2), &Value::from(2.0)));
    }

    #[test]
    fn test_contains() {
        assert!(contains(&Value::from(vec![1, 2]), &Value::from(2)).unwrap());
        assert!(contains(&Value::from("hello"), &Value::from("ell")).unwrap());
        let map: Value = [("k", 1)].into_iter().collect();
        assert!(contains(&map, &Value::from("k")).unwrap());
    }
}

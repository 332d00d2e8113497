//! The fixed table of functions expressions may call.
//!
//! These are the only names the evaluator resolves calls against besides
//! host registered globals and callables already in context.  Unknown call
//! names fail instead of reaching anything ambient.

use std::cmp::Ordering;

use crate::error::{Error, ErrorKind};
use crate::expr::FunctionTable;
use crate::value::{ops, Value, ValueKind};

const MAX_RANGE: u64 = 1_000_000;

fn invalid_args(detail: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidArguments, detail.into())
}

fn arg<'a>(args: &'a [Value], idx: usize, func: &str) -> Result<&'a Value, Error> {
    args.get(idx)
        .ok_or_else(|| invalid_args(format!("{func} is missing argument {}", idx + 1)))
}

fn string_arg(args: &[Value], idx: usize, func: &str) -> Result<String, Error> {
    Ok(ok!(arg(args, idx, func)).to_string())
}

fn seq_arg(args: &[Value], idx: usize, func: &str) -> Result<Vec<Value>, Error> {
    ok!(arg(args, idx, func)).try_iter()
}

fn sorted_values(mut values: Vec<Value>) -> Vec<Value> {
    values.sort_by(|a, b| ops::value_cmp(a, b).unwrap_or(Ordering::Equal));
    values
}

/// Builds the builtin function table.
pub fn builtin_functions() -> FunctionTable {
    let mut rv = FunctionTable::new();

    macro_rules! func {
        ($name:literal, $f:expr) => {
            rv.insert($name.to_string(), Value::from_function($name, $f));
        };
    }

    // string helpers
    func!("upper", |args: &[Value]| {
        Ok(Value::from(ok!(string_arg(args, 0, "upper")).to_uppercase()))
    });
    func!("lower", |args: &[Value]| {
        Ok(Value::from(ok!(string_arg(args, 0, "lower")).to_lowercase()))
    });
    func!("capitalize", |args: &[Value]| {
        let s = ok!(string_arg(args, 0, "capitalize"));
        let mut chars = s.chars();
        Ok(Value::from(match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
            None => String::new(),
        }))
    });
    func!("title", |args: &[Value]| {
        let s = ok!(string_arg(args, 0, "title"));
        let mut rv = String::with_capacity(s.len());
        let mut at_start = true;
        for c in s.chars() {
            if c.is_alphanumeric() {
                if at_start {
                    rv.extend(c.to_uppercase());
                } else {
                    rv.extend(c.to_lowercase());
                }
                at_start = false;
            } else {
                rv.push(c);
                at_start = true;
            }
        }
        Ok(Value::from(rv))
    });
    func!("strip", |args: &[Value]| {
        Ok(Value::from(ok!(string_arg(args, 0, "strip")).trim().to_string()))
    });
    func!("replace", |args: &[Value]| {
        let s = ok!(string_arg(args, 0, "replace"));
        let from = ok!(string_arg(args, 1, "replace"));
        let to = ok!(string_arg(args, 2, "replace"));
        Ok(Value::from(s.replace(&from, &to)))
    });
    func!("split", |args: &[Value]| {
        let s = ok!(string_arg(args, 0, "split"));
        Ok(match args.get(1) {
            Some(sep) => s
                .split(&sep.to_string())
                .map(Value::from)
                .collect::<Value>(),
            None => s.split_whitespace().map(Value::from).collect::<Value>(),
        })
    });
    func!("join", |args: &[Value]| {
        let sep = ok!(string_arg(args, 0, "join"));
        let items = ok!(seq_arg(args, 1, "join"));
        Ok(Value::from(
            items
                .iter()
                .map(|item| item.to_string())
                .collect::<Vec<_>>()
                .join(&sep),
        ))
    });

    // collection helpers
    let len = |args: &[Value]| {
        let value = ok!(arg(args, 0, "len"));
        value.len().map(Value::from).ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("value of type {} has no length", value.kind()),
            )
        })
    };
    func!("len", len);
    func!("count", len);
    func!("first", |args: &[Value]| {
        let items = ok!(seq_arg(args, 0, "first"));
        Ok(items
            .first()
            .cloned()
            .or_else(|| args.get(1).cloned())
            .unwrap_or(Value::UNDEFINED))
    });
    func!("last", |args: &[Value]| {
        let items = ok!(seq_arg(args, 0, "last"));
        Ok(items
            .last()
            .cloned()
            .or_else(|| args.get(1).cloned())
            .unwrap_or(Value::UNDEFINED))
    });
    func!("sorted", |args: &[Value]| {
        Ok(sorted_values(ok!(seq_arg(args, 0, "sorted")))
            .into_iter()
            .collect())
    });
    func!("sum", |args: &[Value]| {
        let items = ok!(seq_arg(args, 0, "sum"));
        let mut acc = Value::from(0);
        for item in items {
            acc = ok!(ops::add(&acc, &item));
        }
        Ok(acc)
    });
    func!("min", |args: &[Value]| {
        let items = ok!(seq_arg(args, 0, "min"));
        sorted_values(items)
            .into_iter()
            .next()
            .ok_or_else(|| invalid_args("min of an empty collection"))
    });
    func!("max", |args: &[Value]| {
        let items = ok!(seq_arg(args, 0, "max"));
        sorted_values(items)
            .into_iter()
            .last()
            .ok_or_else(|| invalid_args("max of an empty collection"))
    });

    // iteration helpers
    func!("range", |args: &[Value]| {
        let int_at = |idx: usize| -> Result<i64, Error> {
            ok!(arg(args, idx, "range"))
                .as_i64()
                .ok_or_else(|| invalid_args("range arguments must be integers"))
        };
        let (start, stop, step) = match args.len() {
            1 => (0, ok!(int_at(0)), 1),
            2 => (ok!(int_at(0)), ok!(int_at(1)), 1),
            3 => (ok!(int_at(0)), ok!(int_at(1)), ok!(int_at(2))),
            n => return Err(invalid_args(format!("range takes 1 to 3 arguments, got {n}"))),
        };
        if step == 0 {
            return Err(invalid_args("range step cannot be zero"));
        }
        // a span that overflows i64 is far past the item cap anyway
        let span = if step > 0 {
            stop.checked_sub(start)
        } else {
            start.checked_sub(stop)
        };
        let items = match span {
            Some(span) if span > 0 => span as u64 / step.unsigned_abs(),
            Some(_) => 0,
            None => u64::MAX,
        };
        if items > MAX_RANGE {
            return Err(invalid_args(format!("range is limited to {MAX_RANGE} items")));
        }
        let mut rv = Vec::new();
        let mut i = start;
        while (step > 0 && i < stop) || (step < 0 && i > stop) {
            rv.push(Value::from(i));
            i = match i.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(rv.into_iter().collect())
    });
    func!("enumerate", |args: &[Value]| {
        let items = ok!(seq_arg(args, 0, "enumerate"));
        Ok(items
            .into_iter()
            .enumerate()
            .map(|(i, item)| Value::from(vec![Value::from(i), item]))
            .collect())
    });
    func!("zip", |args: &[Value]| {
        let mut columns = Vec::with_capacity(args.len());
        for idx in 0..args.len() {
            columns.push(ok!(seq_arg(args, idx, "zip")));
        }
        let shortest = columns.iter().map(Vec::len).min().unwrap_or(0);
        Ok((0..shortest)
            .map(|row| {
                columns
                    .iter()
                    .map(|col| col[row].clone())
                    .collect::<Value>()
            })
            .collect())
    });
    func!("map", |args: &[Value]| {
        let f = ok!(arg(args, 0, "map")).clone();
        let items = ok!(seq_arg(args, 1, "map"));
        items
            .into_iter()
            .map(|item| f.call(&[item]))
            .collect::<Result<Value, Error>>()
    });
    func!("filter", |args: &[Value]| {
        let f = ok!(arg(args, 0, "filter")).clone();
        let items = ok!(seq_arg(args, 1, "filter"));
        let mut rv = Vec::new();
        for item in items {
            if ok!(f.call(std::slice::from_ref(&item))).is_true() {
                rv.push(item);
            }
        }
        Ok(rv.into_iter().collect())
    });

    // math
    func!("abs", |args: &[Value]| {
        let value = ok!(arg(args, 0, "abs"));
        if let Some(i) = value.as_i64() {
            Ok(Value::from(i.abs()))
        } else if let Some(f) = value.as_f64() {
            Ok(Value::from(f.abs()))
        } else {
            Err(invalid_args("abs requires a number"))
        }
    });
    func!("round", |args: &[Value]| {
        let value = ok!(arg(args, 0, "round"))
            .as_f64()
            .ok_or_else(|| invalid_args("round requires a number"))?;
        let digits = match args.get(1) {
            Some(d) => d
                .as_i64()
                .ok_or_else(|| invalid_args("round digits must be an integer"))?,
            None => 0,
        };
        let factor = 10f64.powi(digits as i32);
        let rounded = (value * factor).round() / factor;
        Ok(if digits <= 0 {
            Value::from(rounded as i64)
        } else {
            Value::from(rounded)
        })
    });

    // json
    func!("json_encode", |args: &[Value]| {
        let value = ok!(arg(args, 0, "json_encode"));
        serde_json::to_string(value)
            .map(Value::from)
            .map_err(|err| {
                Error::new(ErrorKind::BadSerialization, "could not encode value as JSON")
                    .with_source(err)
            })
    });
    func!("json_decode", |args: &[Value]| {
        let raw = ok!(string_arg(args, 0, "json_decode"));
        let decoded: serde_json::Value = ok!(serde_json::from_str(&raw).map_err(|err| {
            Error::new(ErrorKind::BadSerialization, "invalid JSON").with_source(err)
        }));
        Ok(Value::from_serializable(&decoded))
    });

    // type checks and conversions
    func!("is_list", |args: &[Value]| {
        Ok(Value::from(ok!(arg(args, 0, "is_list")).kind() == ValueKind::Seq))
    });
    func!("is_dict", |args: &[Value]| {
        Ok(Value::from(ok!(arg(args, 0, "is_dict")).kind() == ValueKind::Map))
    });
    func!("is_string", |args: &[Value]| {
        Ok(Value::from(
            ok!(arg(args, 0, "is_string")).kind() == ValueKind::String,
        ))
    });
    func!("is_number", |args: &[Value]| {
        Ok(Value::from(
            ok!(arg(args, 0, "is_number")).kind() == ValueKind::Number,
        ))
    });
    func!("str", |args: &[Value]| {
        Ok(Value::from(ok!(arg(args, 0, "str")).to_string()))
    });
    func!("int", |args: &[Value]| {
        let value = ok!(arg(args, 0, "int"));
        if let Some(i) = value.as_i64() {
            Ok(Value::from(i))
        } else if let Some(f) = value.as_f64() {
            Ok(Value::from(f as i64))
        } else if let Some(s) = value.as_str() {
            s.trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| invalid_args(format!("cannot convert {s:?} to int")))
        } else {
            Err(invalid_args(format!("cannot convert {} to int", value.kind())))
        }
    });
    func!("float", |args: &[Value]| {
        let value = ok!(arg(args, 0, "float"));
        if let Some(f) = value.as_f64() {
            Ok(Value::from(f))
        } else if let Some(s) = value.as_str() {
            s.trim()
                .parse::<f64>()
                .map(Value::from)
                .map_err(|_| invalid_args(format!("cannot convert {s:?} to float")))
        } else {
            Err(invalid_args(format!(
                "cannot convert {} to float",
                value.kind()
            )))
        }
    });
    func!("bool", |args: &[Value]| {
        Ok(Value::from(ok!(arg(args, 0, "bool")).is_true()))
    });
    func!("list", |args: &[Value]| {
        Ok(ok!(seq_arg(args, 0, "list")).into_iter().collect())
    });

    // template helpers
    func!("isset", |args: &[Value]| {
        let value = ok!(arg(args, 0, "isset"));
        Ok(Value::from(!value.is_undefined() && !value.is_none()))
    });
    func!("default", |args: &[Value]| {
        let value = ok!(arg(args, 0, "default"));
        Ok(if value.is_true() {
            value.clone()
        } else {
            args.get(1).cloned().unwrap_or_else(|| Value::from(""))
        })
    });

    rv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Result<Value, Error> {
        builtin_functions()[name].call(args)
    }

    #[test]
    fn test_string_helpers() {
        assert_eq!(call("upper", &["abc".into()]).unwrap(), Value::from("ABC"));
        assert_eq!(
            call("title", &["hello world".into()]).unwrap(),
            Value::from("Hello World")
        );
        assert_eq!(
            call("replace", &["a-b".into(), "-".into(), "+".into()]).unwrap(),
            Value::from("a+b")
        );
        assert_eq!(
            call("join", &[", ".into(), Value::from(vec![1, 2])]).unwrap(),
            Value::from("1, 2")
        );
    }

    #[test]
    fn test_collections() {
        let seq = Value::from(vec![3, 1, 2]);
        assert_eq!(call("len", &[seq.clone()]).unwrap(), Value::from(3));
        assert_eq!(
            call("sorted", &[seq.clone()]).unwrap(),
            Value::from(vec![1, 2, 3])
        );
        assert_eq!(call("sum", &[seq.clone()]).unwrap(), Value::from(6));
        assert_eq!(call("min", &[seq.clone()]).unwrap(), Value::from(1));
        assert_eq!(call("max", &[seq]).unwrap(), Value::from(3));
        assert_eq!(
            call("first", &[Value::from(Vec::<i64>::new()), "dflt".into()]).unwrap(),
            Value::from("dflt")
        );
    }

    #[test]
    fn test_range() {
        assert_eq!(call("range", &[3.into()]).unwrap(), Value::from(vec![0, 1, 2]));
        assert_eq!(
            call("range", &[1.into(), 7.into(), 2.into()]).unwrap(),
            Value::from(vec![1, 3, 5])
        );
        assert!(call("range", &[0.into(), 0.into(), 0.into()]).is_err());
    }

    #[test]
    fn test_range_extremes_are_rejected() {
        assert!(call("range", &[i64::MIN.into(), i64::MAX.into()]).is_err());
        assert!(call("range", &[i64::MAX.into()]).is_err());
        assert_eq!(
            call("range", &[0.into(), 3.into(), i64::MIN.into()]).unwrap(),
            Value::from(Vec::<i64>::new())
        );
        assert_eq!(
            call("range", &[3.into(), 0.into(), i64::MIN.into()]).unwrap(),
            Value::from(vec![3])
        );
    }

    #[test]
    fn test_json_round_trip() {
        let encoded = call("json_encode", &[Value::from(vec![1, 2])]).unwrap();
        assert_eq!(encoded, Value::from("[1,2]"));
        let decoded = call("json_decode", &[encoded]).unwrap();
        assert_eq!(decoded, Value::from(vec![1, 2]));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(call("int", &["42".into()]).unwrap(), Value::from(42));
        assert_eq!(call("str", &[42.into()]).unwrap(), Value::from("42"));
        assert!(call("int", &["nope".into()]).is_err());
    }

    #[test]
    fn test_default() {
        assert_eq!(
            call("default", &[Value::UNDEFINED, "x".into()]).unwrap(),
            Value::from("x")
        );
        assert_eq!(
            call("default", &["y".into(), "x".into()]).unwrap(),
            Value::from("y")
        );
    }
}

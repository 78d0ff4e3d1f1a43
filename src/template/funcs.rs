//! Builtin template functions.

use std::cmp::Ordering;

use super::TemplateError;
use crate::value::Value;

type FuncResult = Result<Value, TemplateError>;

/// Call a builtin, or `None` if `name` is not one.
pub(super) fn builtin(name: &str, args: &[Value]) -> Option<FuncResult> {
    let result = match name {
        "and" => and(args),
        "or" => or(args),
        "not" => unary(args).map(|v| Value::Bool(!v.is_truthy())),
        "eq" => eq(args),
        "ne" => binary(args).map(|(a, b)| Value::Bool(!equal(a, b))),
        "lt" => compare(args, |o| o == Ordering::Less),
        "le" => compare(args, |o| o != Ordering::Greater),
        "gt" => compare(args, |o| o == Ordering::Greater),
        "ge" => compare(args, |o| o != Ordering::Less),
        "len" => len(args),
        "index" => index(args),
        "print" => Ok(Value::String(sprint(args))),
        "println" => Ok(Value::String(sprintln(args))),
        "printf" => printf(args),
        "join" => join(args),
        "upper" => unary(args).map(|v| Value::String(v.to_string().to_uppercase())),
        "lower" => unary(args).map(|v| Value::String(v.to_string().to_lowercase())),
        "trim" => unary(args).map(|v| Value::String(v.to_string().trim().to_string())),
        "default" => default(args),
        _ => return None,
    };
    Some(result)
}

fn arity(args: &[Value], n: usize) -> Result<(), TemplateError> {
    if args.len() != n {
        return Err(TemplateError::func(format!(
            "wrong number of args: want {}, got {}",
            n,
            args.len()
        )));
    }
    Ok(())
}

fn unary(args: &[Value]) -> Result<&Value, TemplateError> {
    arity(args, 1)?;
    Ok(&args[0])
}

fn binary(args: &[Value]) -> Result<(&Value, &Value), TemplateError> {
    arity(args, 2)?;
    Ok((&args[0], &args[1]))
}

/// First falsy argument, or the last one.
fn and(args: &[Value]) -> FuncResult {
    match args.iter().find(|v| !v.is_truthy()).or(args.last()) {
        Some(v) => Ok(v.clone()),
        None => Err(TemplateError::func("and: missing arguments")),
    }
}

/// First truthy argument, or the last one.
fn or(args: &[Value]) -> FuncResult {
    match args.iter().find(|v| v.is_truthy()).or(args.last()) {
        Some(v) => Ok(v.clone()),
        None => Err(TemplateError::func("or: missing arguments")),
    }
}

fn equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// `eq a b c` is true when `a` equals any of the others.
fn eq(args: &[Value]) -> FuncResult {
    match args.split_first() {
        Some((first, rest)) if !rest.is_empty() => {
            Ok(Value::Bool(rest.iter().any(|other| equal(first, other))))
        }
        _ => Err(TemplateError::func("eq: missing argument for comparison")),
    }
}

fn compare(args: &[Value], accept: fn(Ordering) -> bool) -> FuncResult {
    let (a, b) = binary(args)?;
    let ordering = match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    };
    ordering.map(|o| Value::Bool(accept(o))).ok_or_else(|| {
        TemplateError::func(format!(
            "incompatible types for comparison: {} and {}",
            a.type_name(),
            b.type_name()
        ))
    })
}

fn len(args: &[Value]) -> FuncResult {
    let v = unary(args)?;
    v.len()
        .map(|n| Value::Integer(n as i64))
        .ok_or_else(|| TemplateError::func(format!("len of type {}", v.type_name())))
}

fn index(args: &[Value]) -> FuncResult {
    let (first, keys) = args
        .split_first()
        .ok_or_else(|| TemplateError::func("index of untyped nil"))?;
    let mut current = first.clone();
    for key in keys {
        current = match (&current, key) {
            (Value::List(items), Value::Integer(i)) => usize::try_from(*i)
                .ok()
                .and_then(|i| items.get(i).cloned())
                .ok_or_else(|| TemplateError::func(format!("index out of range: {}", i)))?,
            (Value::Object(map), Value::String(k)) => map.get(k).cloned().unwrap_or(Value::Null),
            (Value::Null, _) => Value::Null,
            (container, key) => {
                return Err(TemplateError::func(format!(
                    "can't index item of type {} with {}",
                    container.type_name(),
                    key.type_name()
                )));
            }
        };
    }
    Ok(current)
}

/// Spaces go between operands when neither side is a string.
fn sprint(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        let is_string = matches!(arg, Value::String(_));
        if i > 0 && !is_string && !matches!(args[i - 1], Value::String(_)) {
            out.push(' ');
        }
        out.push_str(&arg.to_string());
    }
    out
}

fn sprintln(args: &[Value]) -> String {
    let mut out = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    out.push('\n');
    out
}

fn printf(args: &[Value]) -> FuncResult {
    let (format, rest) = args
        .split_first()
        .ok_or_else(|| TemplateError::func("printf: missing format"))?;
    let format = format
        .as_str()
        .ok_or_else(|| TemplateError::func("printf: format must be a string"))?;

    let mut out = String::new();
    let mut operands = rest.iter();
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut precision: Option<usize> = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut digits = String::new();
            while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                digits.push(*d);
                chars.next();
            }
            precision = digits.parse().ok();
        }
        let verb = match chars.next() {
            Some('%') => {
                out.push('%');
                continue;
            }
            Some(verb) => verb,
            None => {
                out.push_str("%!(NOVERB)");
                break;
            }
        };
        let Some(operand) = operands.next() else {
            out.push_str(&format!("%!{}(MISSING)", verb));
            continue;
        };
        match verb {
            'v' | 's' => out.push_str(&operand.to_string()),
            'd' => match operand {
                Value::Integer(n) => out.push_str(&n.to_string()),
                other => out.push_str(&format!("%!d({})", other)),
            },
            'f' => match operand.as_f64() {
                Some(x) => out.push_str(&format!("{:.*}", precision.unwrap_or(6), x)),
                None => out.push_str(&format!("%!f({})", operand)),
            },
            'q' => out.push_str(&format!("{:?}", operand.to_string())),
            other => out.push_str(&format!("%!{}({})", other, operand)),
        }
    }
    Ok(Value::String(out))
}

/// `join sep list`; the list comes last so it can be piped.
fn join(args: &[Value]) -> FuncResult {
    let (sep, list) = binary(args)?;
    match list {
        Value::List(items) => Ok(Value::String(
            items
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(&sep.to_string()),
        )),
        Value::Null => Ok(Value::String(String::new())),
        other => Err(TemplateError::func(format!(
            "join: expected list, got {}",
            other.type_name()
        ))),
    }
}

/// `default fallback value`.
fn default(args: &[Value]) -> FuncResult {
    let (fallback, value) = binary(args)?;
    Ok(if value.is_truthy() {
        value.clone()
    } else {
        fallback.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Value>) -> Value {
        builtin(name, &args).unwrap().unwrap()
    }

    #[test]
    fn test_unknown_is_none() {
        assert!(builtin("sqlIn", &[]).is_none());
    }

    #[test]
    fn test_logic() {
        assert_eq!(call("and", vec![1.into(), "".into()]), Value::from(""));
        assert_eq!(call("and", vec![1.into(), "x".into()]), Value::from("x"));
        assert_eq!(call("or", vec![0.into(), "x".into()]), Value::from("x"));
        assert_eq!(call("not", vec![Value::Null]), Value::Bool(true));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(call("eq", vec![1.into(), Value::Float(1.0)]), Value::Bool(true));
        assert_eq!(call("eq", vec!["a".into(), "b".into(), "a".into()]), Value::Bool(true));
        assert_eq!(call("ne", vec!["a".into(), "b".into()]), Value::Bool(true));
        assert_eq!(call("lt", vec![1.into(), 2.into()]), Value::Bool(true));
        assert_eq!(call("ge", vec!["b".into(), "a".into()]), Value::Bool(true));
        assert!(builtin("lt", &["a".into(), 1.into()]).unwrap().is_err());
    }

    #[test]
    fn test_len_and_index() {
        let list = Value::from(vec!["a", "b"]);
        assert_eq!(call("len", vec![list.clone()]), Value::Integer(2));
        assert_eq!(call("index", vec![list, 1.into()]), Value::from("b"));
        assert!(builtin("len", &[Value::Integer(3)]).unwrap().is_err());
    }

    #[test]
    fn test_printing() {
        assert_eq!(call("print", vec![1.into(), 2.into()]), Value::from("1 2"));
        assert_eq!(call("print", vec!["a".into(), 2.into()]), Value::from("a2"));
        assert_eq!(call("println", vec!["a".into(), 2.into()]), Value::from("a 2\n"));
        assert_eq!(
            call("printf", vec!["%s=%d %.2f %q 100%%".into(), "n".into(), 3.into(), Value::Float(1.5), "x".into()]),
            Value::from("n=3 1.50 \"x\" 100%")
        );
        assert_eq!(call("printf", vec!["%d".into()]), Value::from("%!d(MISSING)"));
    }

    #[test]
    fn test_strings() {
        assert_eq!(call("join", vec![", ".into(), Value::from(vec!["a", "b"])]), Value::from("a, b"));
        assert_eq!(call("upper", vec!["ab".into()]), Value::from("AB"));
        assert_eq!(call("trim", vec![" ab ".into()]), Value::from("ab"));
        assert_eq!(call("default", vec!["x".into(), "".into()]), Value::from("x"));
        assert_eq!(call("default", vec!["x".into(), "y".into()]), Value::from("y"));
    }

    #[test]
    fn test_wrong_arity() {
        let err = builtin("not", &[]).unwrap().unwrap_err();
        assert!(err.to_string().contains("wrong number of args"));
    }
}

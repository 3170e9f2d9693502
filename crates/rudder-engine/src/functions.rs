//! Global functions available in templates

use minijinja::{Error, ErrorKind, Value};

/// Abort rendering with a custom message
///
/// Usage: {{ fail("unsupported mode") }}
pub fn fail(message: String) -> Result<Value, Error> {
    Err(Error::new(ErrorKind::InvalidOperation, message))
}

/// Build a dict from alternating key/value arguments
///
/// Usage: {{ dict("app", name, "tier", "web") }}
pub fn dict(args: Vec<Value>) -> Result<Value, Error> {
    if args.len() % 2 != 0 {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            "dict requires an even number of arguments (key-value pairs)",
        ));
    }

    let mut map = serde_json::Map::new();
    for pair in args.chunks(2) {
        let key = pair[0]
            .as_str()
            .ok_or_else(|| Error::new(ErrorKind::InvalidOperation, "dict keys must be strings"))?;
        let value = serde_json::to_value(&pair[1])
            .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))?;
        map.insert(key.to_string(), value);
    }

    Ok(Value::from_serialize(serde_json::Value::Object(map)))
}

/// Pick one of two values
///
/// Usage: {{ ternary("on", "off", values.enabled) }}
pub fn ternary(true_val: Value, false_val: Value, condition: Value) -> Value {
    if condition.is_true() { true_val } else { false_val }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dict() {
        let value = dict(vec![Value::from("a"), Value::from(1)]).unwrap();
        assert_eq!(value.get_attr("a").unwrap(), Value::from(1));
        assert!(dict(vec![Value::from("a")]).is_err());
        assert!(dict(vec![Value::from(1), Value::from(1)]).is_err());
    }

    #[test]
    fn test_ternary() {
        assert_eq!(ternary(Value::from("y"), Value::from("n"), Value::from(true)), Value::from("y"));
        assert_eq!(ternary(Value::from("y"), Value::from("n"), Value::from(false)), Value::from("n"));
    }

    #[test]
    fn test_fail() {
        assert!(fail("nope".to_string()).is_err());
    }
}

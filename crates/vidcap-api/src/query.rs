use serde_json::{Map, Value};

/// Flatten JSON tool arguments into query pairs.
///
/// Arrays become repeated keys, booleans are spelled `true`/`false`, and
/// nulls are dropped. Nested objects are passed as their JSON text.
pub fn to_query_pairs(args: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(args.len());
    for (key, value) in args {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    if let Some(s) = scalar(item) {
                        pairs.push((key.clone(), s));
                    }
                }
            }
            other => {
                if let Some(s) = scalar(other) {
                    pairs.push((key.clone(), s));
                }
            }
        }
    }
    pairs
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(if *b { "true" } else { "false" }.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pairs(value: Value) -> Vec<(String, String)> {
        to_query_pairs(value.as_object().unwrap())
    }

    #[test]
    fn arrays_repeat_key() {
        let got = pairs(json!({"second": ["1", 5, "10"]}));
        assert_eq!(
            got,
            vec![
                ("second".into(), "1".into()),
                ("second".into(), "5".into()),
                ("second".into(), "10".into()),
            ]
        );
    }

    #[test]
    fn booleans_and_nulls() {
        let got = pairs(json!({"cache": false, "model": null, "full_page": true}));
        assert!(got.contains(&("cache".into(), "false".into())));
        assert!(got.contains(&("full_page".into(), "true".into())));
        assert!(!got.iter().any(|(k, _)| k == "model"));
    }

    #[test]
    fn numbers_render_plainly() {
        let got = pairs(json!({"maxResults": 25, "scale": 1.5}));
        assert!(got.contains(&("maxResults".into(), "25".into())));
        assert!(got.contains(&("scale".into(), "1.5".into())));
    }
}

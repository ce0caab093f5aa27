//! Dotted field paths over nested documents.
//!
//! A path such as `spec.dbSpec.port` addresses a leaf inside nested
//! mappings. [`set_by_path`] walks every intermediate mapping first and only
//! then assigns the leaf, so a failed walk never leaves a partial write.
//!
//! Only mapping traversal is supported. A segment that lands on an array
//! (e.g. `spec.items.0`) is reported as unresolved rather than treated as an
//! index.
//!
//! Raw values from the command line are strings. A path may carry a type
//! hint (`spec.maxBackupCount:int`); without one, [`FieldPath::coerce`]
//! follows the type of the value currently stored at the leaf.
//!
//! Only a trailing `:<hint>` naming a known hint is split off. Any other `:`
//! stays part of the key, so `metadata.annotations.a:b` addresses the key
//! `a:b`. A key that itself ends in `:int` (or another hint name) cannot be
//! addressed.

use std::fmt;
use std::str::FromStr;

use oiler_store::Document;
use serde_json::Value;

use crate::error::FieldPathError;

/// Target type for a raw string value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeHint {
    Str,
    Int,
    Float,
    Bool,
    Json,
}

impl TypeHint {
    fn name(self) -> &'static str {
        match self {
            Self::Str => "string",
            Self::Int => "integer",
            Self::Float => "float",
            Self::Bool => "boolean",
            Self::Json => "JSON value",
        }
    }
}

impl FromStr for TypeHint {
    type Err = FieldPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "str" | "string" => Ok(Self::Str),
            "int" | "integer" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "bool" | "boolean" => Ok(Self::Bool),
            "json" => Ok(Self::Json),
            other => Err(FieldPathError::UnknownHint {
                hint: other.to_owned(),
            }),
        }
    }
}

/// A parsed dotted path with an optional type hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
    hint: Option<TypeHint>,
}

impl FieldPath {
    /// The path segments, outermost first.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The explicit type hint, if one was given.
    #[must_use]
    pub fn hint(&self) -> Option<TypeHint> {
        self.hint
    }

    /// Whether this path addresses exactly the given segments.
    #[must_use]
    pub fn is(&self, segments: &[&str]) -> bool {
        self.segments.len() == segments.len()
            && self.segments.iter().zip(segments).all(|(a, b)| a == b)
    }

    /// Look up the value currently stored at this path.
    #[must_use]
    pub fn lookup<'a>(&self, document: &'a Document) -> Option<&'a Value> {
        let (first, rest) = self.segments.split_first()?;
        rest.iter()
            .try_fold(document.get(first)?, |value, segment| value.get(segment))
    }

    /// Convert a raw string into the JSON value to store at this path.
    ///
    /// An explicit hint wins. Otherwise a numeric or boolean `existing` leaf
    /// forces the same type, and anything else is stored as a string.
    ///
    /// # Errors
    ///
    /// Returns [`FieldPathError::InvalidValue`] if `raw` cannot be parsed as
    /// the target type.
    pub fn coerce(&self, raw: &str, existing: Option<&Value>) -> Result<Value, FieldPathError> {
        let hint = self.hint.unwrap_or(match existing {
            Some(Value::Number(n)) if n.is_f64() => TypeHint::Float,
            Some(Value::Number(_)) => TypeHint::Int,
            Some(Value::Bool(_)) => TypeHint::Bool,
            _ => TypeHint::Str,
        });
        let invalid = || FieldPathError::InvalidValue {
            path: self.to_string(),
            expected: hint.name(),
        };
        match hint {
            TypeHint::Str => Ok(Value::String(raw.to_owned())),
            TypeHint::Int => raw.trim().parse::<i64>().map(Value::from).map_err(|_| invalid()),
            TypeHint::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(invalid),
            TypeHint::Bool => raw.trim().parse::<bool>().map(Value::Bool).map_err(|_| invalid()),
            TypeHint::Json => serde_json::from_str(raw).map_err(|_| invalid()),
        }
    }
}

impl FromStr for FieldPath {
    type Err = FieldPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, hint) = match s.rsplit_once(':') {
            Some((path, hint)) => match hint.parse::<TypeHint>() {
                Ok(hint) => (path, Some(hint)),
                Err(_) => (s, None),
            },
            None => (s, None),
        };
        if path.is_empty() {
            return Err(FieldPathError::Empty);
        }
        let segments: Vec<String> = path.split('.').map(str::to_owned).collect();
        if segments.iter().any(String::is_empty) {
            return Err(FieldPathError::EmptySegment {
                path: path.to_owned(),
            });
        }
        Ok(Self { segments, hint })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Assign `value` at `path` inside `document`.
///
/// Every segment but the last must resolve to a nested mapping; the last
/// segment is inserted or overwritten unconditionally. The document is
/// mutated in place and nothing is written unless the whole walk succeeds.
///
/// # Errors
///
/// Returns [`FieldPathError::Empty`] for an empty path and
/// [`FieldPathError::Unresolved`] (naming the full dotted path) if an
/// intermediate segment is absent or not a mapping.
pub fn set_by_path<S: AsRef<str>>(
    document: &mut Document,
    path: &[S],
    value: Value,
) -> Result<(), FieldPathError> {
    let Some((leaf, parents)) = path.split_last() else {
        return Err(FieldPathError::Empty);
    };

    let mut current = document;
    for segment in parents {
        current = match current.get_mut(segment.as_ref()) {
            Some(Value::Object(child)) => child,
            _ => {
                return Err(FieldPathError::Unresolved {
                    path: dotted(path),
                });
            }
        };
    }

    current.insert(leaf.as_ref().to_owned(), value);
    Ok(())
}

fn dotted<S: AsRef<str>>(path: &[S]) -> String {
    path.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(".")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    #[test]
    fn sets_nested_leaf_and_keeps_siblings() {
        let mut d = doc(json!({ "a": { "b": { "c": 1, "d": "keep" }, "e": true } }));
        set_by_path(&mut d, &["a", "b", "c"], json!(2)).unwrap();
        assert_eq!(
            Value::Object(d),
            json!({ "a": { "b": { "c": 2, "d": "keep" }, "e": true } })
        );
    }

    #[test]
    fn fails_when_intermediate_is_not_a_mapping() {
        let mut d = doc(json!({ "a": { "b": 1 } }));
        let err = set_by_path(&mut d, &["a", "b", "c"], json!(2)).unwrap_err();
        assert_eq!(
            err,
            FieldPathError::Unresolved {
                path: "a.b.c".to_owned()
            }
        );
        assert_eq!(Value::Object(d), json!({ "a": { "b": 1 } }));
    }

    #[test]
    fn fails_when_intermediate_is_missing() {
        let mut d = doc(json!({ "a": {} }));
        let err = set_by_path(&mut d, &["a", "x", "y"], json!(1)).unwrap_err();
        assert!(matches!(err, FieldPathError::Unresolved { .. }));
        assert_eq!(Value::Object(d), json!({ "a": {} }));
    }

    #[test]
    fn creates_missing_leaf_at_root() {
        let mut d = Document::new();
        set_by_path(&mut d, &["x"], json!("y")).unwrap();
        assert_eq!(Value::Object(d), json!({ "x": "y" }));
    }

    #[test]
    fn empty_path_is_rejected() {
        let mut d = Document::new();
        let empty: [&str; 0] = [];
        assert_eq!(
            set_by_path(&mut d, &empty, json!(1)).unwrap_err(),
            FieldPathError::Empty
        );
    }

    #[test]
    fn arrays_are_not_traversed() {
        let mut d = doc(json!({ "items": [{ "a": 1 }] }));
        let err = set_by_path(&mut d, &["items", "0", "a"], json!(2)).unwrap_err();
        assert!(matches!(err, FieldPathError::Unresolved { .. }));
    }

    #[test]
    fn parses_dotted_path_with_hint() {
        let path: FieldPath = "spec.maxBackupCount:int".parse().unwrap();
        assert_eq!(path.segments(), ["spec", "maxBackupCount"]);
        assert_eq!(path.hint(), Some(TypeHint::Int));
        assert_eq!(path.to_string(), "spec.maxBackupCount");
    }

    #[test]
    fn rejects_malformed_paths() {
        assert_eq!("".parse::<FieldPath>().unwrap_err(), FieldPathError::Empty);
        assert!(matches!(
            "spec..schedule".parse::<FieldPath>().unwrap_err(),
            FieldPathError::EmptySegment { .. }
        ));
        assert!(matches!(
            "spec.schedule.".parse::<FieldPath>().unwrap_err(),
            FieldPathError::EmptySegment { .. }
        ));
        assert!(matches!(
            ":int".parse::<FieldPath>().unwrap_err(),
            FieldPathError::Empty
        ));
    }

    #[test]
    fn colon_without_known_hint_stays_in_key() {
        let path: FieldPath = "metadata.annotations.a:b".parse().unwrap();
        assert_eq!(path.segments(), ["metadata", "annotations", "a:b"]);
        assert_eq!(path.hint(), None);

        let mut d = doc(json!({ "metadata": { "annotations": {} } }));
        set_by_path(&mut d, path.segments(), json!("v")).unwrap();
        assert_eq!(
            Value::Object(d),
            json!({ "metadata": { "annotations": { "a:b": "v" } } })
        );

        assert!(matches!(
            "cron".parse::<TypeHint>().unwrap_err(),
            FieldPathError::UnknownHint { .. }
        ));
    }

    #[test]
    fn lookup_follows_nested_mappings() {
        let d = doc(json!({ "spec": { "dbSpec": { "port": 5432 } } }));
        let path: FieldPath = "spec.dbSpec.port".parse().unwrap();
        assert_eq!(path.lookup(&d), Some(&json!(5432)));
        let missing: FieldPath = "spec.s3Spec.endpoint".parse().unwrap();
        assert_eq!(missing.lookup(&d), None);
    }

    #[test]
    fn coerce_follows_existing_leaf_type() {
        let path: FieldPath = "spec.maxBackupCount".parse().unwrap();
        assert_eq!(path.coerce("5", Some(&json!(2))).unwrap(), json!(5));
        assert!(matches!(
            path.coerce("five", Some(&json!(2))).unwrap_err(),
            FieldPathError::InvalidValue { .. }
        ));
        assert_eq!(path.coerce("true", Some(&json!(false))).unwrap(), json!(true));
        assert_eq!(path.coerce("0 3 * * *", Some(&json!("x"))).unwrap(), json!("0 3 * * *"));
        assert_eq!(path.coerce("7", None).unwrap(), json!("7"));
    }

    #[test]
    fn explicit_hint_overrides_existing_type() {
        let as_str: FieldPath = "spec.maxBackupCount:str".parse().unwrap();
        assert_eq!(as_str.coerce("5", Some(&json!(2))).unwrap(), json!("5"));

        let as_json: FieldPath = "metadata.labels:json".parse().unwrap();
        assert_eq!(
            as_json.coerce(r#"{"team":"db"}"#, None).unwrap(),
            json!({ "team": "db" })
        );

        let as_float: FieldPath = "spec.ratio:float".parse().unwrap();
        assert_eq!(as_float.coerce("0.5", None).unwrap(), json!(0.5));
    }
}

//! Declarative map-style expressions.
//!
//! A small typed subset of the map library's expression language: enough to
//! pick out a feature's county key, test it against a list and map it to a
//! color. Expressions serialize to the library's JSON array form and can be
//! evaluated directly against a feature's properties.

use geojson::{JsonObject, JsonValue};
use serde::ser::{Serialize, SerializeSeq, Serializer};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Str(String),
    /// `["literal", [..]]`
    Literal(Vec<String>),
    /// `["get", property]`
    Get(String),
    /// `["to-string", input]`
    ToString(Box<Expr>),
    /// `["concat", a, b, ..]`
    Concat(Vec<Expr>),
    /// `["slice", input, start]`; negative start counts from the end
    Slice { input: Box<Expr>, start: i64 },
    /// `["in", needle, haystack]`
    In { needle: Box<Expr>, haystack: Box<Expr> },
    /// `["match", input, label, output, .., fallback]`
    Match {
        input: Box<Expr>,
        arms: Vec<(String, Expr)>,
        fallback: Box<Expr>,
    },
}

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluated {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Evaluated>),
}

impl Evaluated {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Evaluated::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Evaluated::Bool(true))
    }

    fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Bool(b) => Evaluated::Bool(*b),
            JsonValue::Number(n) => n.as_f64().map_or(Evaluated::Null, Evaluated::Number),
            JsonValue::String(s) => Evaluated::String(s.clone()),
            JsonValue::Array(items) => Evaluated::Array(items.iter().map(Self::from_json).collect()),
            JsonValue::Null | JsonValue::Object(_) => Evaluated::Null,
        }
    }

    fn to_text(&self) -> String {
        match self {
            Evaluated::Null => String::new(),
            Evaluated::Bool(b) => b.to_string(),
            Evaluated::Number(n) => format_number(*n),
            Evaluated::String(s) => s.clone(),
            Evaluated::Array(items) => items.iter().map(Self::to_text).collect::<Vec<_>>().join(","),
        }
    }
}

/// Integral numbers print without a fractional part, so `6037.0` becomes `"6037"`.
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn slice_start(len: usize, start: i64) -> usize {
    if start < 0 {
        len.saturating_sub(start.unsigned_abs() as usize)
    } else {
        (start as usize).min(len)
    }
}

impl Expr {
    pub fn get(property: impl Into<String>) -> Self {
        Expr::Get(property.into())
    }

    pub fn stringify(input: Expr) -> Self {
        Expr::ToString(Box::new(input))
    }

    pub fn slice(input: Expr, start: i64) -> Self {
        Expr::Slice {
            input: Box::new(input),
            start,
        }
    }

    pub fn contains(needle: Expr, haystack: Expr) -> Self {
        Expr::In {
            needle: Box::new(needle),
            haystack: Box::new(haystack),
        }
    }

    /// Evaluate against a feature's properties.
    pub fn evaluate(&self, properties: &JsonObject) -> Evaluated {
        match self {
            Expr::Str(s) => Evaluated::String(s.clone()),
            Expr::Literal(items) => {
                Evaluated::Array(items.iter().cloned().map(Evaluated::String).collect())
            }
            Expr::Get(property) => properties
                .get(property)
                .map_or(Evaluated::Null, Evaluated::from_json),
            Expr::ToString(input) => Evaluated::String(input.evaluate(properties).to_text()),
            Expr::Concat(parts) => Evaluated::String(
                parts
                    .iter()
                    .map(|p| p.evaluate(properties).to_text())
                    .collect(),
            ),
            Expr::Slice { input, start } => match input.evaluate(properties) {
                Evaluated::String(s) => {
                    let chars: Vec<char> = s.chars().collect();
                    let from = slice_start(chars.len(), *start);
                    Evaluated::String(chars[from..].iter().collect())
                }
                Evaluated::Array(items) => {
                    let from = slice_start(items.len(), *start);
                    Evaluated::Array(items[from..].to_vec())
                }
                _ => Evaluated::Null,
            },
            Expr::In { needle, haystack } => {
                let needle = needle.evaluate(properties);
                let found = match haystack.evaluate(properties) {
                    Evaluated::Array(items) => items.contains(&needle),
                    Evaluated::String(s) => needle.as_str().is_some_and(|n| s.contains(n)),
                    _ => false,
                };
                Evaluated::Bool(found)
            }
            Expr::Match {
                input,
                arms,
                fallback,
            } => {
                let input = input.evaluate(properties);
                let hit = input
                    .as_str()
                    .and_then(|key| arms.iter().find(|(label, _)| label == key));
                match hit {
                    Some((_, output)) => output.evaluate(properties),
                    None => fallback.evaluate(properties),
                }
            }
        }
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Expr::Str(s) => serializer.serialize_str(s),
            Expr::Literal(items) => ("literal", items).serialize(serializer),
            Expr::Get(property) => ("get", property).serialize(serializer),
            Expr::ToString(input) => ("to-string", input).serialize(serializer),
            Expr::Concat(parts) => {
                let mut seq = serializer.serialize_seq(Some(parts.len() + 1))?;
                seq.serialize_element("concat")?;
                for part in parts {
                    seq.serialize_element(part)?;
                }
                seq.end()
            }
            Expr::Slice { input, start } => ("slice", input, start).serialize(serializer),
            Expr::In { needle, haystack } => ("in", needle, haystack).serialize(serializer),
            Expr::Match {
                input,
                arms,
                fallback,
            } => {
                let mut seq = serializer.serialize_seq(Some(arms.len() * 2 + 3))?;
                seq.serialize_element("match")?;
                seq.serialize_element(input)?;
                for (label, output) in arms {
                    seq.serialize_element(label)?;
                    seq.serialize_element(output)?;
                }
                seq.serialize_element(fallback)?;
                seq.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(value: JsonValue) -> JsonObject {
        let mut map = JsonObject::new();
        map.insert("county_fips".to_string(), value);
        map
    }

    fn key_expr() -> Expr {
        Expr::slice(Expr::Concat(vec![Expr::stringify(Expr::get("county_fips"))]), -5)
    }

    #[test]
    fn test_numeric_property_stringifies_without_fraction() {
        let p = props(JsonValue::from(6037));
        assert_eq!(key_expr().evaluate(&p), Evaluated::String("6037".into()));
        let p = props(JsonValue::from(6037.0));
        assert_eq!(key_expr().evaluate(&p), Evaluated::String("6037".into()));
    }

    #[test]
    fn test_slice_keeps_last_five() {
        let p = props(JsonValue::from("0500000US06037"));
        assert_eq!(key_expr().evaluate(&p), Evaluated::String("06037".into()));
    }

    #[test]
    fn test_missing_property() {
        let empty = JsonObject::new();
        assert_eq!(key_expr().evaluate(&empty), Evaluated::String(String::new()));
        assert_eq!(Expr::get("nope").evaluate(&empty), Evaluated::Null);
    }

    #[test]
    fn test_in_and_match() {
        let filter = Expr::contains(key_expr(), Expr::Literal(vec!["06037".into(), "01001".into()]));
        let paint = Expr::Match {
            input: Box::new(key_expr()),
            arms: vec![("06037".into(), Expr::Str("#8e342e".into()))],
            fallback: Box::new(Expr::Str("#ccc".into())),
        };

        let la = props(JsonValue::from("06037"));
        assert!(filter.evaluate(&la).is_true());
        assert_eq!(paint.evaluate(&la).as_str(), Some("#8e342e"));

        let other = props(JsonValue::from("99999"));
        assert!(!filter.evaluate(&other).is_true());
        assert_eq!(paint.evaluate(&other).as_str(), Some("#ccc"));
    }

    #[test]
    fn test_serializes_to_array_form() {
        let filter = Expr::contains(key_expr(), Expr::Literal(vec!["06037".into()]));
        let json = simd_json::to_string(&filter).unwrap();
        assert_eq!(
            json,
            r#"["in",["slice",["concat",["to-string",["get","county_fips"]]],-5],["literal",["06037"]]]"#
        );

        let paint = Expr::Match {
            input: Box::new(Expr::get("id")),
            arms: vec![("a".into(), Expr::Str("#111".into()))],
            fallback: Box::new(Expr::Str("#ccc".into())),
        };
        assert_eq!(
            simd_json::to_string(&paint).unwrap(),
            r##"["match",["get","id"],"a","#111","#ccc"]"##
        );
    }
}

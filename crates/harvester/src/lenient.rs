//! Deserializers for Scopus scalars, which arrive as strings or numbers

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(u64),
    Text(String),
}

/// Optional non-negative integer given as a number or a numeric string
pub fn opt_number<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Scalar::Int(n)) => Ok(Some(n)),
        Some(Scalar::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Scalar::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected a count, got '{}'", s))),
    }
}

/// Required non-negative integer given as a number or a numeric string
pub fn number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    opt_number(deserializer)?.ok_or_else(|| D::Error::custom("expected a count, got nothing"))
}

/// Optional identifier given as a string or a number
pub fn opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        None => None,
        Some(Scalar::Int(n)) => Some(n.to_string()),
        Some(Scalar::Text(s)) => Some(s),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Scalars {
        #[serde(default, deserialize_with = "opt_number")]
        count: Option<u64>,
        #[serde(default, deserialize_with = "opt_text")]
        id: Option<String>,
    }

    #[test]
    fn test_accepts_strings_and_numbers() {
        let a: Scalars = serde_json::from_value(json!({"count": "42", "id": 60012345})).unwrap();
        assert_eq!(a.count, Some(42));
        assert_eq!(a.id.as_deref(), Some("60012345"));

        let b: Scalars = serde_json::from_value(json!({"count": 7, "id": "60000001"})).unwrap();
        assert_eq!(b.count, Some(7));
        assert_eq!(b.id.as_deref(), Some("60000001"));
    }

    #[test]
    fn test_missing_and_null() {
        let p: Scalars = serde_json::from_value(json!({"count": null})).unwrap();
        assert_eq!(p.count, None);
        assert_eq!(p.id, None);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(serde_json::from_value::<Scalars>(json!({"count": "many"})).is_err());
    }
}

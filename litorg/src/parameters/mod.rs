use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    #[error("parameter string must start with ':', got `{0}`")]
    MissingColon(String),
}

/// A single key and the values accumulated under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub key: String,
    pub values: Vec<String>,
}

/// Ordered key/values pairs decoded from a colon-delimited directive string,
/// e.g. `:exports none :include iostream vector :minipage`.
///
/// Kept as a sequence rather than a map so declaration order survives.
/// A key that appears more than once accumulates its values under its first
/// occurrence. A key present with no values (`Some(&[])`) is not the same as an
/// absent key (`None`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    entries: Vec<Parameter>,
}

impl Parameters {
    pub fn new() -> Self {
        Parameters::default()
    }

    /// Decode a parameter string.
    ///
    /// Whitespace separates tokens; a token starting with `:` opens a new key,
    /// any other token is a value of the current key. A colon that is not at the
    /// start of a token (`a:b`) belongs to the value.
    pub fn parse(source: &str) -> Result<Self, ParameterError> {
        let source = source.trim();
        if !source.starts_with(':') {
            return Err(ParameterError::MissingColon(source.to_string()));
        }

        let mut params = Parameters::new();
        let mut current: Option<(String, Vec<String>)> = None;
        for token in source.split_whitespace() {
            if let Some(key) = token.strip_prefix(':') {
                if let Some((key, values)) = current.take() {
                    params.add(key, values);
                }
                current = Some((key.to_string(), Vec::new()));
            } else if let Some((_, values)) = current.as_mut() {
                values.push(token.to_string());
            }
        }
        if let Some((key, values)) = current {
            params.add(key, values);
        }

        Ok(params)
    }

    /// Add values to `key`, creating it if necessary.
    pub fn add(&mut self, key: impl Into<String>, values: Vec<String>) {
        let key = key.into();
        match self.entries.iter_mut().find(|p| p.key == key) {
            Some(existing) => existing.values.extend(values),
            None => self.entries.push(Parameter { key, values }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.values.as_slice())
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Values of `key`, or an empty slice when the key is absent.
    pub fn values(&self, key: &str) -> &[String] {
        self.get(key).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, param) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, ":{}", param.key)?;
            for value in &param.values {
                write!(f, " {}", value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn pairs(params: &Parameters) -> Vec<(&str, Vec<&str>)> {
        params
            .iter()
            .map(|p| (p.key.as_str(), p.values.iter().map(String::as_str).collect()))
            .collect()
    }

    #[test]
    fn numbers_and_keys() {
        let params = Parameters::parse(":lost 4 8 15 16 23 42 :last 108").unwrap();
        assert_eq!(
            pairs(&params),
            vec![
                ("lost", vec!["4", "8", "15", "16", "23", "42"]),
                ("last", vec!["108"]),
            ]
        );
    }

    #[test]
    fn keys_without_values() {
        let params = Parameters::parse(":exports none :include iostream vector :minipage").unwrap();
        assert_eq!(params.get("minipage"), Some(&[][..]));
        assert_eq!(params.values("include"), &["iostream", "vector"]);
        assert_eq!(params.get("missing"), None);
    }

    #[test]
    fn adjacent_keys() {
        let params = Parameters::parse(":a :b x").unwrap();
        assert_eq!(pairs(&params), vec![("a", vec![]), ("b", vec!["x"])]);
    }

    #[test]
    fn colon_inside_value_is_kept() {
        let params = Parameters::parse(":url http://example.org a:b").unwrap();
        assert_eq!(params.values("url"), &["http://example.org", "a:b"]);
    }

    #[test]
    fn repeated_keys_accumulate() {
        let params = Parameters::parse(":noweb a :cpp x :noweb b c").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params.values("noweb"), &["a", "b", "c"]);
    }

    #[test]
    fn empty_values_differ_from_no_values() {
        let mut params = Parameters::new();
        params.add("empty", vec![String::new()]);
        params.add("none", vec![]);
        assert_eq!(params.get("empty"), Some(&[String::new()][..]));
        assert_eq!(params.get("none"), Some(&[][..]));
        assert_ne!(params.get("empty"), params.get("none"));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let params = Parameters::parse("  \t:a  1\t 2  ").unwrap();
        assert_eq!(params.values("a"), &["1", "2"]);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("lost :last 108")]
    #[case("a:b")]
    fn missing_leading_colon(#[case] input: &str) {
        assert_eq!(
            Parameters::parse(input),
            Err(ParameterError::MissingColon(input.trim().to_string()))
        );
    }

    #[test]
    fn display_is_canonical() {
        let params = Parameters::parse(":noweb   a b  :quote :depth 3").unwrap();
        assert_eq!(params.to_string(), ":noweb a b :quote :depth 3");
    }
}

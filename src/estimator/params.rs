//! Hyperparameter values and grids

use serde::{Deserialize, Serialize};

use crate::error::{Result, SieveError};

/// A single hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self, key: &str) -> Result<f64> {
        match self {
            ParamValue::Int(v) => Ok(*v as f64),
            ParamValue::Float(v) => Ok(*v),
            other => Err(invalid(key, other, "a number")),
        }
    }

    pub fn as_usize(&self, key: &str) -> Result<usize> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Ok(*v as usize),
            ParamValue::Float(v) if *v >= 0.0 && v.fract() == 0.0 => Ok(*v as usize),
            other => Err(invalid(key, other, "a non-negative integer")),
        }
    }

    /// `"none"` (any case) maps to `None`; otherwise a positive integer.
    pub fn as_opt_usize(&self, key: &str) -> Result<Option<usize>> {
        match self {
            ParamValue::Text(s) if s.eq_ignore_ascii_case("none") => Ok(None),
            other => match other.as_usize(key)? {
                0 => Err(invalid(key, other, "a positive integer or \"none\"")),
                n => Ok(Some(n)),
            },
        }
    }
}

fn invalid(key: &str, value: &ParamValue, expected: &str) -> SieveError {
    SieveError::config(format!(
        "Parameter '{}' must be {}, got {}",
        key, expected, value
    ))
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
        }
    }
}

/// One grid point: parameter names and values in grid order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(Vec<(String, ParamValue)>);

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: ParamValue) {
        self.0.push((key.into(), value));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ParamSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Discrete search space: named axes, each with candidate values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    axes: Vec<(String, Vec<ParamValue>)>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an axis (builder style)
    pub fn axis(mut self, key: impl Into<String>, values: Vec<ParamValue>) -> Self {
        self.axes.push((key.into(), values));
        self
    }

    /// Number of grid points
    pub fn len(&self) -> usize {
        if self.axes.is_empty() {
            return 0;
        }
        self.axes.iter().map(|(_, v)| v.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every grid point, the last axis varying fastest.
    ///
    /// This enumeration order is what grid-search tie-breaking refers to.
    pub fn combinations(&self) -> Vec<ParamSet> {
        if self.is_empty() {
            return Vec::new();
        }
        let mut combinations = vec![ParamSet::new()];
        for (key, values) in &self.axes {
            let mut next = Vec::with_capacity(combinations.len() * values.len());
            for combination in &combinations {
                for value in values {
                    let mut point = combination.clone();
                    point.push(key.clone(), value.clone());
                    next.push(point);
                }
            }
            combinations = next;
        }
        combinations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combinations_order_last_axis_fastest() {
        let grid = ParamGrid::new()
            .axis("a", vec![ParamValue::Int(1), ParamValue::Int(2)])
            .axis("b", vec![ParamValue::Int(10), ParamValue::Int(20)]);
        let combos = grid.combinations();

        assert_eq!(grid.len(), 4);
        assert_eq!(combos[0].to_string(), "{a=1, b=10}");
        assert_eq!(combos[1].to_string(), "{a=1, b=20}");
        assert_eq!(combos[3].to_string(), "{a=2, b=20}");
    }

    #[test]
    fn test_empty_grid_has_no_points() {
        assert!(ParamGrid::new().combinations().is_empty());
        assert!(ParamGrid::new().is_empty());
    }

    #[test]
    fn test_opt_usize() {
        assert_eq!(ParamValue::Text("None".into()).as_opt_usize("d").unwrap(), None);
        assert_eq!(ParamValue::Int(4).as_opt_usize("d").unwrap(), Some(4));
        assert!(ParamValue::Int(0).as_opt_usize("d").is_err());
        assert!(ParamValue::Float(0.5).as_usize("d").is_err());
    }

    #[test]
    fn test_param_value_json_untagged() {
        let v: Vec<ParamValue> = serde_json::from_str(r#"[3, 0.5, "none", true]"#).unwrap();
        assert_eq!(
            v,
            vec![
                ParamValue::Int(3),
                ParamValue::Float(0.5),
                ParamValue::Text("none".into()),
                ParamValue::Bool(true)
            ]
        );
    }
}

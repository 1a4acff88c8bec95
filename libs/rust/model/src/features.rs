use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};

pub const N_FEATURES: usize = 4;

/// One specimen's measurements, in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub sepal_length: f64,
    pub sepal_width: f64,
    pub petal_length: f64,
    pub petal_width: f64,
}

impl FeatureVector {
    pub fn as_array(&self) -> [f64; N_FEATURES] {
        [self.sepal_length, self.sepal_width, self.petal_length, self.petal_width]
    }
}

/// Unvalidated request parameters, exactly as they arrived.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFeatures {
    pub sepal_length: Option<String>,
    pub sepal_width: Option<String>,
    pub petal_length: Option<String>,
    pub petal_width: Option<String>,
}

impl RawFeatures {
    pub fn parse(&self) -> Result<FeatureVector> {
        Ok(FeatureVector {
            sepal_length: parse_field("sepal_length", self.sepal_length.as_deref())?,
            sepal_width: parse_field("sepal_width", self.sepal_width.as_deref())?,
            petal_length: parse_field("petal_length", self.petal_length.as_deref())?,
            petal_width: parse_field("petal_width", self.petal_width.as_deref())?,
        })
    }
}

fn parse_field(field: &'static str, raw: Option<&str>) -> Result<f64> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(|| ModelError::InvalidInput {
        field,
        reason: "missing required value".into(),
    })?;
    let value: f64 = raw.parse().map_err(|_| ModelError::InvalidInput {
        field,
        reason: format!("'{raw}' is not a number"),
    })?;
    if !value.is_finite() {
        return Err(ModelError::InvalidInput { field, reason: format!("'{raw}' is not finite") });
    }
    if value < 0.0 {
        return Err(ModelError::InvalidInput { field, reason: format!("{value} is negative") });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(sl: &str, sw: &str, pl: &str, pw: &str) -> RawFeatures {
        RawFeatures {
            sepal_length: Some(sl.into()),
            sepal_width: Some(sw.into()),
            petal_length: Some(pl.into()),
            petal_width: Some(pw.into()),
        }
    }

    #[test]
    fn parses_valid_measurements() {
        let fv = raw("5.1", "3.5", "1.4", "0.2").parse().unwrap();
        assert_eq!(fv.as_array(), [5.1, 3.5, 1.4, 0.2]);
        assert!(raw("0", "0", "0", "0").parse().is_ok());
    }

    #[test]
    fn names_the_offending_field() {
        match raw("abc", "3.5", "1.4", "0.2").parse() {
            Err(ModelError::InvalidInput { field, .. }) => assert_eq!(field, "sepal_length"),
            other => panic!("unexpected {other:?}"),
        }
        match raw("5.1", "3.5", "-1", "0.2").parse() {
            Err(ModelError::InvalidInput { field, reason }) => {
                assert_eq!(field, "petal_length");
                assert!(reason.contains("negative"));
            }
            other => panic!("unexpected {other:?}"),
        }
        match raw("5.1", "3.5", "1.4", "NaN").parse() {
            Err(ModelError::InvalidInput { field, .. }) => assert_eq!(field, "petal_width"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_field_is_invalid_input() {
        let mut r = raw("5.1", "3.5", "1.4", "0.2");
        r.sepal_width = None;
        let err = r.parse().unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
        assert!(err.to_string().contains("sepal_width"));
    }
}

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{AttributeValue, Record};

// 測定値に掛ける係数（負の値は警告のみ、非有限値は拒否）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjustmentFactor(f64);

impl AdjustmentFactor {
    pub const IDENTITY: AdjustmentFactor = AdjustmentFactor(1.0);

    pub fn new(factor: f64) -> Result<Self> {
        if !factor.is_finite() {
            return Err(Error::InvalidAdjustment(factor));
        }
        if factor < 0.0 {
            warn!(
                "Adjustment factor {} is negative; measured values will change sign",
                factor
            );
        }
        Ok(Self(factor))
    }

    // (percent + 100) / 100
    pub fn from_percent(percent: f64) -> Result<Self> {
        Self::new((percent + 100.0) / 100.0)
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for AdjustmentFactor {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// 先に全レコードを検査してから書き換える
pub fn rescale(records: &mut [Record], field: &str, factor: AdjustmentFactor) -> Result<()> {
    for (idx, record) in records.iter().enumerate() {
        match record.get(field) {
            None => {
                return Err(Error::MissingField {
                    field: field.to_string(),
                    record: idx,
                })
            }
            Some(AttributeValue::Null | AttributeValue::Integer(_) | AttributeValue::Real(_)) => {}
            Some(_) => {
                return Err(Error::NonNumericField {
                    field: field.to_string(),
                    record: idx,
                })
            }
        }
    }

    for record in records.iter_mut() {
        if let Some(value) = record.get_mut(field) {
            if let Some(current) = value.as_f64() {
                *value = AttributeValue::Real(current * factor.value());
            }
        }
    }

    debug!(
        "Rescaled '{}' of {} records by {}",
        field,
        records.len(),
        factor.value()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    fn records(values: &[f64]) -> Vec<Record> {
        values
            .iter()
            .map(|v| Record::new(Point::new(0.0, 0.0)).with("WetMass", *v))
            .collect()
    }

    fn values(records: &[Record]) -> Vec<f64> {
        records
            .iter()
            .map(|r| r.get("WetMass").and_then(|v| v.as_f64()).unwrap())
            .collect()
    }

    #[test]
    fn test_from_percent() {
        assert_eq!(AdjustmentFactor::from_percent(0.0).unwrap().value(), 1.0);
        assert_eq!(AdjustmentFactor::from_percent(750.0).unwrap().value(), 8.5);
        assert_eq!(AdjustmentFactor::from_percent(-200.0).unwrap().value(), -1.0);
    }

    #[test]
    fn test_identity_leaves_values() {
        let mut rs = records(&[100.0, 0.0, 12.75]);
        rescale(&mut rs, "WetMass", AdjustmentFactor::IDENTITY).unwrap();
        assert_eq!(values(&rs), vec![100.0, 0.0, 12.75]);
    }

    #[test]
    fn test_successive_factors_compose() {
        let f1 = AdjustmentFactor::new(1.1).unwrap();
        let f2 = AdjustmentFactor::new(0.7).unwrap();
        let combined = AdjustmentFactor::new(1.1 * 0.7).unwrap();

        let mut twice = records(&[100.0, 250.5, 3.0]);
        rescale(&mut twice, "WetMass", f1).unwrap();
        rescale(&mut twice, "WetMass", f2).unwrap();

        let mut once = records(&[100.0, 250.5, 3.0]);
        rescale(&mut once, "WetMass", combined).unwrap();

        for (a, b) in values(&twice).iter().zip(values(&once)) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_negative_factor_is_passed_through() {
        let mut rs = records(&[10.0, 20.0]);
        rescale(&mut rs, "WetMass", AdjustmentFactor::new(-0.5).unwrap()).unwrap();
        assert_eq!(values(&rs), vec![-5.0, -10.0]);
    }

    #[test]
    fn test_non_finite_factor_rejected() {
        assert!(matches!(
            AdjustmentFactor::new(f64::NAN),
            Err(Error::InvalidAdjustment(_))
        ));
        assert!(AdjustmentFactor::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_integer_and_null_values() {
        let mut rs = vec![
            Record::new(Point::new(0.0, 0.0)).with("AppliedRate", 4i64),
            Record::new(Point::new(0.0, 0.0)).with("AppliedRate", AttributeValue::Null),
        ];
        rescale(&mut rs, "AppliedRate", AdjustmentFactor::new(2.5).unwrap()).unwrap();
        assert_eq!(rs[0].get("AppliedRate"), Some(&AttributeValue::Real(10.0)));
        assert!(rs[1].get("AppliedRate").unwrap().is_null());
    }

    #[test]
    fn test_bad_field_leaves_records_untouched() {
        let original = vec![
            Record::new(Point::new(0.0, 0.0)).with("WetMass", 1.0),
            Record::new(Point::new(0.0, 0.0)).with("WetMass", "heavy"),
        ];
        let mut rs = original.clone();
        let err = rescale(&mut rs, "WetMass", AdjustmentFactor::new(2.0).unwrap()).unwrap_err();
        assert!(matches!(err, Error::NonNumericField { record: 1, .. }));
        assert_eq!(rs, original);

        let err = rescale(&mut rs, "Moisture", AdjustmentFactor::IDENTITY).unwrap_err();
        assert!(matches!(err, Error::MissingField { record: 0, .. }));
    }
}

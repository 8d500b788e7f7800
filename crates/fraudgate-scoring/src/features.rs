//! Stateless feature derivation applied before the preprocessor, identically at
//! training and serving time.
use log::trace;

use crate::frame::{Column, ColumnValues, Frame};
use crate::record::{FieldValue, TransactionRecord, TRANSACTION_AMT, TRANSACTION_AMT_LOG};

/// Derives engineered fields. Currently only `TransactionAmt_log = ln(1 + TransactionAmt)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEngineer;

impl FeatureEngineer {
    pub fn new() -> Self {
        FeatureEngineer
    }

    /// Augment one record. Unknown fields are passed through untouched. Only a
    /// numeric amount has a log; text is left for the preprocessor to reject.
    pub fn engineer_record(&self, record: &TransactionRecord) -> TransactionRecord {
        let mut out = record.clone();
        let derived = record
            .get(TRANSACTION_AMT)
            .and_then(FieldValue::as_f64)
            .and_then(log_amount);
        out.insert(
            TRANSACTION_AMT_LOG,
            derived.map_or(FieldValue::Missing, FieldValue::Number),
        );
        out
    }

    /// Augment a batch. An absent or non-numeric amount column yields a missing
    /// derived value for the affected rows instead of failing the batch.
    pub fn engineer_frame(&self, frame: &Frame) -> Frame {
        let derived: Vec<Option<f64>> = match frame.column(TRANSACTION_AMT).map(|c| &c.values) {
            Some(ColumnValues::Numeric(values)) => {
                values.iter().map(|v| v.and_then(log_amount)).collect()
            }
            Some(ColumnValues::Categorical(_)) => {
                trace!("{} holds text; {} will be missing", TRANSACTION_AMT, TRANSACTION_AMT_LOG);
                vec![None; frame.nrows()]
            }
            None => {
                trace!("{} absent; {} will be missing", TRANSACTION_AMT, TRANSACTION_AMT_LOG);
                vec![None; frame.nrows()]
            }
        };

        let mut out = frame.clone();
        // lengths match by construction
        let _ = out.set_column(Column::numeric(TRANSACTION_AMT_LOG, derived));
        out
    }
}

fn log_amount(amount: f64) -> Option<f64> {
    let v = amount.ln_1p();
    v.is_finite().then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_log_amount() {
        let rec = TransactionRecord::new()
            .with(TRANSACTION_AMT, FieldValue::Number(59.0))
            .with("ProductCD", FieldValue::Text("W".into()));
        let out = FeatureEngineer::new().engineer_record(&rec);
        let v = out.get(TRANSACTION_AMT_LOG).and_then(FieldValue::as_f64).unwrap();
        assert!((v - 60f64.ln()).abs() < 1e-12);
        assert_eq!(out.get("ProductCD"), rec.get("ProductCD"));
    }

    #[test]
    fn missing_or_text_amount_gives_missing_log() {
        let fe = FeatureEngineer::new();
        let absent = fe.engineer_record(&TransactionRecord::new());
        assert_eq!(absent.get(TRANSACTION_AMT_LOG), Some(&FieldValue::Missing));

        let text = fe.engineer_record(
            &TransactionRecord::new().with(TRANSACTION_AMT, FieldValue::Text("abc".into())),
        );
        assert_eq!(text.get(TRANSACTION_AMT_LOG), Some(&FieldValue::Missing));

        // numeric-looking text is not parsed here either
        let quoted = fe.engineer_record(
            &TransactionRecord::new().with(TRANSACTION_AMT, FieldValue::Text("59.0".into())),
        );
        assert_eq!(quoted.get(TRANSACTION_AMT_LOG), Some(&FieldValue::Missing));

        let below = fe.engineer_record(
            &TransactionRecord::new().with(TRANSACTION_AMT, FieldValue::Number(-1.0)),
        );
        assert_eq!(below.get(TRANSACTION_AMT_LOG), Some(&FieldValue::Missing));
    }

    #[test]
    fn frame_and_record_paths_agree() {
        let records = vec![
            TransactionRecord::new().with(TRANSACTION_AMT, FieldValue::Number(0.0)),
            TransactionRecord::new().with(TRANSACTION_AMT, FieldValue::Missing),
            TransactionRecord::new().with(TRANSACTION_AMT, FieldValue::Number(99.5)),
        ];
        let fe = FeatureEngineer::new();
        let frame = fe.engineer_frame(&Frame::from_records(&records));
        let by_record: Vec<TransactionRecord> =
            records.iter().map(|r| fe.engineer_record(r)).collect();
        assert_eq!(frame, Frame::from_records(&by_record));
    }

    #[test]
    fn frame_without_amount_gets_missing_column() {
        let frame = Frame::from_records(&[
            TransactionRecord::new().with("card4", FieldValue::Text("visa".into()))
        ]);
        let out = FeatureEngineer::new().engineer_frame(&frame);
        assert_eq!(out.missing_fraction(TRANSACTION_AMT_LOG), Some(1.0));
        assert!(out.contains("card4"));
    }
}

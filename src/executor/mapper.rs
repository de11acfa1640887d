/// Raw store rows -> typed [`ResultRow`]s.
///
/// SQLite only has NULL/INTEGER/REAL/TEXT/BLOB, so dates come back as text (or
/// unix seconds) and booleans as 0/1. The output column's semantic type decides
/// the conversion. A value that does not convert is kept as stored rather than
/// replaced with something invented.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use crate::query::OutputColumn;
use crate::storage::RawRow;
use crate::types::{DataType, ResultRow, Value};

pub struct ResultMapper;

impl ResultMapper {
    /// Keys values by output name. Same-named columns collapse into one entry
    /// holding the later value; callers alias columns they need to keep apart.
    pub fn map_row(columns: &[OutputColumn], raw: RawRow) -> ResultRow {
        let mut row = ResultRow::with_capacity(columns.len());
        for (column, value) in columns.iter().zip(raw) {
            row.insert(&column.name, Self::convert(column.data_type, value));
        }
        row
    }

    pub fn convert(data_type: DataType, value: Value) -> Value {
        match (data_type, value) {
            (_, Value::Null) => Value::Null,
            (DataType::Boolean, Value::Integer(i)) => Value::Boolean(i != 0),
            (DataType::Real, Value::Integer(i)) => Value::Real(i as f64),
            (DataType::Date, Value::Text(text)) => Self::parse_date(&text).map_or(Value::Text(text), Value::Date),
            (DataType::Date, Value::Integer(secs)) => DateTime::from_timestamp(secs, 0)
                .map_or(Value::Integer(secs), |dt| Value::Date(dt.date_naive())),
            (_, other) => other,
        }
    }

    fn parse_date(text: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .or_else(|| {
                ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"]
                    .iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                    .map(|dt| dt.date())
            })
    }
}

//! PostgreSQL row decoding.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use replica_audit_core::{error_chain, FetchError, Row, Value};
use rust_decimal::Decimal;
use std::error::Error;
use tokio_postgres::types::{FromSql, Type};
use tracing::debug;

/// Binary wire value of a type without a dedicated [`Value`] variant.
struct RawBytes(Vec<u8>);

impl<'a> FromSql<'a> for RawBytes {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(RawBytes(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// Convert a `tokio_postgres` row into an audit [`Row`], keeping column order.
pub fn decode_row(row: &tokio_postgres::Row) -> Result<Row, FetchError> {
    let mut out = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        out.push(column.name(), decode_value(row, index)?);
    }
    Ok(out)
}

/// Decode an integer column, as used for ids.
pub(crate) fn decode_id(row: &tokio_postgres::Row, index: usize) -> Result<Option<i64>, FetchError> {
    let column = &row.columns()[index];
    match *column.type_() {
        Type::INT2 => Ok(get::<i16>(row, index)?.map(i64::from)),
        Type::INT4 => Ok(get::<i32>(row, index)?.map(i64::from)),
        Type::INT8 => get::<i64>(row, index),
        _ => Err(unsupported(row, index)),
    }
}

/// Decode a `MAX(timestamp)` column. Naive timestamps are read as UTC.
pub(crate) fn decode_timestamp(
    row: &tokio_postgres::Row,
    index: usize,
) -> Result<Option<DateTime<Utc>>, FetchError> {
    let column = &row.columns()[index];
    match *column.type_() {
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, index),
        Type::TIMESTAMP => Ok(get::<NaiveDateTime>(row, index)?.map(|ts| ts.and_utc())),
        Type::DATE => Ok(get::<NaiveDate>(row, index)?
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|ts| ts.and_utc())),
        _ => Err(unsupported(row, index)),
    }
}

/// Decode one column. Values the typed decoders reject (numeric `NaN` or
/// more than 28 digits, `infinity` timestamps, ...) are kept as raw bytes.
fn decode_value(row: &tokio_postgres::Row, index: usize) -> Result<Value, FetchError> {
    match decode_typed(row, index) {
        Ok(value) => Ok(value),
        Err(FetchError::Decode { column, message }) => {
            debug!("Comparing column '{column}' as raw bytes: {message}");
            decode_raw(row, index)
        }
        Err(e) => Err(e),
    }
}

fn decode_raw(row: &tokio_postgres::Row, index: usize) -> Result<Value, FetchError> {
    let pg_type = row.columns()[index].type_();
    let value = get::<RawBytes>(row, index)?.map(|raw| Value::Raw {
        type_name: pg_type.name().to_string(),
        bytes: raw.0,
    });
    Ok(value.unwrap_or(Value::Null))
}

fn decode_typed(row: &tokio_postgres::Row, index: usize) -> Result<Value, FetchError> {
    let pg_type = row.columns()[index].type_();

    let value = match *pg_type {
        Type::BOOL => get::<bool>(row, index)?.map(Value::Bool),
        Type::CHAR => get::<i8>(row, index)?.map(|v| Value::Int(v.into())),
        Type::INT2 => get::<i16>(row, index)?.map(|v| Value::Int(v.into())),
        Type::INT4 => get::<i32>(row, index)?.map(|v| Value::Int(v.into())),
        Type::INT8 => get::<i64>(row, index)?.map(Value::Int),
        Type::OID => get::<u32>(row, index)?.map(|v| Value::Int(v.into())),
        Type::FLOAT4 => get::<f32>(row, index)?.map(|v| Value::Float(v.into())),
        Type::FLOAT8 => get::<f64>(row, index)?.map(Value::Float),
        Type::NUMERIC => get::<Decimal>(row, index)?.map(Value::Numeric),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            get::<String>(row, index)?.map(Value::Text)
        }
        Type::BYTEA => get::<Vec<u8>>(row, index)?.map(Value::Bytes),
        Type::UUID => get::<uuid::Uuid>(row, index)?.map(Value::Uuid),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, index)?.map(Value::Timestamp),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, index)?.map(Value::TimestampTz),
        Type::DATE => get::<NaiveDate>(row, index)?.map(Value::Date),
        Type::TIME => get::<NaiveTime>(row, index)?.map(Value::Time),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, index)?.map(Value::Json),
        Type::BOOL_ARRAY => array::<bool>(row, index, Value::Bool)?,
        Type::INT2_ARRAY => array::<i16>(row, index, |v| Value::Int(v.into()))?,
        Type::INT4_ARRAY => array::<i32>(row, index, |v| Value::Int(v.into()))?,
        Type::INT8_ARRAY => array::<i64>(row, index, Value::Int)?,
        Type::FLOAT4_ARRAY => array::<f32>(row, index, |v| Value::Float(v.into()))?,
        Type::FLOAT8_ARRAY => array::<f64>(row, index, Value::Float)?,
        Type::NUMERIC_ARRAY => array::<Decimal>(row, index, Value::Numeric)?,
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY | Type::BPCHAR_ARRAY => {
            array::<String>(row, index, Value::Text)?
        }
        Type::UUID_ARRAY => array::<uuid::Uuid>(row, index, Value::Uuid)?,
        Type::TIMESTAMPTZ_ARRAY => array::<DateTime<Utc>>(row, index, Value::TimestampTz)?,
        Type::JSONB_ARRAY | Type::JSON_ARRAY => {
            array::<serde_json::Value>(row, index, Value::Json)?
        }
        _ => return decode_raw(row, index),
    };

    Ok(value.unwrap_or(Value::Null))
}

fn get<'a, T: FromSql<'a>>(
    row: &'a tokio_postgres::Row,
    index: usize,
) -> Result<Option<T>, FetchError> {
    row.try_get::<_, Option<T>>(index)
        .map_err(|e| FetchError::Decode {
            column: row.columns()[index].name().to_string(),
            message: error_chain(&e),
        })
}


/// One-dimensional array; NULL elements become [`Value::Null`].
fn array<'a, T: FromSql<'a>>(
    row: &'a tokio_postgres::Row,
    index: usize,
    to_value: impl Fn(T) -> Value,
) -> Result<Option<Value>, FetchError> {
    Ok(get::<Vec<Option<T>>>(row, index)?.map(|items| {
        Value::Array(
            items
                .into_iter()
                .map(|item| item.map(&to_value).unwrap_or(Value::Null))
                .collect(),
        )
    }))
}

fn unsupported(row: &tokio_postgres::Row, index: usize) -> FetchError {
    let column = &row.columns()[index];
    FetchError::UnsupportedType {
        column: column.name().to_string(),
        type_name: column.type_().name().to_string(),
    }
}


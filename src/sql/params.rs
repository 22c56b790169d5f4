//! Convert serde_json::Value to types that sqlx can bind.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::{Database, Type};

/// A statement parameter. Request values are passed through unvalidated, so any JSON scalar may arrive here.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
}

impl SqlValue {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::I64(i)
                } else if let Some(f) = n.as_f64() {
                    SqlValue::F64(f)
                } else {
                    SqlValue::String(n.to_string())
                }
            }
            Value::String(s) => SqlValue::String(s.clone()),
            Value::Array(_) | Value::Object(_) => SqlValue::String(v.to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Bool(b) => Value::Bool(*b),
            SqlValue::I64(n) => Value::Number((*n).into()),
            SqlValue::F64(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            SqlValue::String(s) => Value::String(s.clone()),
        }
    }
}

impl<'q> Encode<'q, Postgres> for SqlValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            SqlValue::Null => <Option<String> as Encode<Postgres>>::encode_by_ref(&None, buf)?,
            SqlValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            SqlValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            SqlValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            SqlValue::String(s) => <String as Encode<Postgres>>::encode_by_ref(s, buf)?,
        })
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            SqlValue::Bool(_) => <bool as Type<Postgres>>::type_info(),
            SqlValue::I64(_) => <i64 as Type<Postgres>>::type_info(),
            SqlValue::F64(_) => <f64 as Type<Postgres>>::type_info(),
            SqlValue::Null | SqlValue::String(_) => <String as Type<Postgres>>::type_info(),
        })
    }
}

impl Type<Postgres> for SqlValue {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }
}

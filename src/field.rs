//! 構造化フィールドモジュール

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// フィールド値
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Bool(bool),
    Float(f64),
    Duration(Duration),
    /// 上記以外の値（serde_jsonでシリアライズ済み）
    Json(Value),
}

/// ログレコードに付与するキーと値の組
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    key: String,
    value: FieldValue,
}

impl Field {
    /// 新しいFieldを作成
    pub fn new(key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn str(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, FieldValue::Str(value.into()))
    }

    pub fn int(key: impl Into<String>, value: i64) -> Self {
        Self::new(key, FieldValue::Int(value))
    }

    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Self::new(key, FieldValue::Bool(value))
    }

    pub fn float(key: impl Into<String>, value: f64) -> Self {
        Self::new(key, FieldValue::Float(value))
    }

    pub fn duration(key: impl Into<String>, value: Duration) -> Self {
        Self::new(key, FieldValue::Duration(value))
    }

    /// 任意のシリアライズ可能な値からFieldを作成
    ///
    /// シリアライズに失敗した場合は `<key>Error` キーにエラー内容を格納する
    pub fn any<T: Serialize + ?Sized>(key: impl Into<String>, value: &T) -> Self {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(json) => Self::new(key, json),
            Err(e) => Self::str(format!("{}Error", key), e.to_string()),
        }
    }

    /// エラーを `error` キーの文字列として格納
    pub fn error(err: &dyn std::error::Error) -> Self {
        Self::str("error", err.to_string())
    }

    /// キーと値が交互に並んだ動的なリストからFieldを作成
    ///
    /// 寛容な変換で、次の入力は黙って捨てられる:
    /// - キーが文字列でない（または空文字列の）組
    /// - 末尾の対にならない要素
    pub fn from_pairs(values: &[Value]) -> Vec<Field> {
        values
            .chunks_exact(2)
            .filter_map(|pair| match &pair[0] {
                Value::String(key) if !key.is_empty() => {
                    Some(Field::new(key.clone(), pair[1].clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        FieldValue::Str(value.clone())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        FieldValue::Float(f64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<Duration> for FieldValue {
    fn from(value: Duration) -> Self {
        FieldValue::Duration(value)
    }
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for FieldValue {
            fn from(value: $t) -> Self {
                FieldValue::Int(i64::from(value))
            }
        })*
    };
}

impl_from_signed!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! impl_from_wide {
    ($($t:ty),*) => {
        $(impl From<$t> for FieldValue {
            fn from(value: $t) -> Self {
                match i64::try_from(value) {
                    Ok(v) => FieldValue::Int(v),
                    Err(_) => FieldValue::Json(Value::from(value)),
                }
            }
        })*
    };
}

impl_from_wide!(u64, usize, isize);

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => FieldValue::Str(s),
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Int(i)
                } else if n.is_f64() {
                    FieldValue::Float(n.as_f64().unwrap_or(f64::NAN))
                } else {
                    // i64に収まらないu64
                    FieldValue::Json(Value::Number(n))
                }
            }
            other => FieldValue::Json(other),
        }
    }
}

//! JSONエンコーダーモジュール

use crate::field::{Field, FieldValue};
use crate::level::Level;
use chrono::{DateTime, Local, SecondsFormat};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// タイムスタンプの書式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeEncoding {
    /// 例: 2024-12-30T10:00:00.000+0900
    #[default]
    Iso8601,
    /// 例: 2024-12-30T10:00:00.000000000+09:00
    Rfc3339,
    /// UNIXエポックからのミリ秒（数値）
    EpochMillis,
}

/// レベル名の書式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelEncoding {
    #[default]
    Lowercase,
    Uppercase,
}

/// Duration値の書式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationEncoding {
    /// 例: "1.5s"
    #[default]
    String,
    Nanos,
    Millis,
    Seconds,
}

/// 呼び出し元の書式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerEncoding {
    /// 末尾のディレクトリとファイル名のみ
    #[default]
    Short,
    Full,
}

/// エンコーダー設定
///
/// キーを空文字列にするとその項目は出力されない
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub time_key: String,
    pub level_key: String,
    pub name_key: String,
    pub caller_key: String,
    pub message_key: String,
    pub stacktrace_key: String,
    pub time_encoding: TimeEncoding,
    pub level_encoding: LevelEncoding,
    pub duration_encoding: DurationEncoding,
    pub caller_encoding: CallerEncoding,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            time_key: "timestamp".to_string(),
            level_key: "level".to_string(),
            name_key: "logger".to_string(),
            caller_key: "caller".to_string(),
            message_key: "message".to_string(),
            stacktrace_key: "trace".to_string(),
            time_encoding: TimeEncoding::default(),
            level_encoding: LevelEncoding::default(),
            duration_encoding: DurationEncoding::default(),
            caller_encoding: CallerEncoding::default(),
        }
    }
}

/// ログの呼び出し元
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller<'a> {
    pub file: &'a str,
    pub line: u32,
}

impl<'a> Caller<'a> {
    pub fn new(file: &'a str, line: u32) -> Self {
        Self { file, line }
    }

    /// `dir/file.rs:line` 形式
    pub fn short(&self) -> String {
        let is_sep = |c: char| c == '/' || c == '\\';
        let trimmed = match self.file.rfind(is_sep) {
            Some(last) => match self.file[..last].rfind(is_sep) {
                Some(prev) => &self.file[prev + 1..],
                None => self.file,
            },
            None => self.file,
        };
        format!("{}:{}", trimmed, self.line)
    }

    /// `full/path/file.rs:line` 形式
    pub fn full(&self) -> String {
        format!("{}:{}", self.file, self.line)
    }
}

/// 1件分のログレコード
#[derive(Debug, Clone)]
pub struct Entry<'a> {
    pub level: Level,
    pub time: DateTime<Local>,
    pub logger_name: &'a str,
    pub caller: Option<Caller<'a>>,
    pub message: &'a str,
    pub stack: Option<String>,
}

/// JSON Linesエンコーダー
#[derive(Debug, Clone, Default)]
pub struct JsonEncoder {
    config: EncoderConfig,
}

impl JsonEncoder {
    /// 新しいJsonEncoderを作成
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// レコードを改行付きの1行にエンコード
    ///
    /// フィールドはコンテキスト、呼び出し箇所の順に出力される
    pub fn encode(
        &self,
        entry: &Entry<'_>,
        context: &[Field],
        fields: &[Field],
    ) -> serde_json::Result<Vec<u8>> {
        let line = Line {
            config: &self.config,
            entry,
            context,
            fields,
        };
        let mut buf = serde_json::to_vec(&line)?;
        buf.push(b'\n');
        Ok(buf)
    }
}

struct Line<'a> {
    config: &'a EncoderConfig,
    entry: &'a Entry<'a>,
    context: &'a [Field],
    fields: &'a [Field],
}

impl Serialize for Line<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let cfg = self.config;
        let entry = self.entry;
        let mut map = serializer.serialize_map(None)?;

        if !cfg.time_key.is_empty() {
            match cfg.time_encoding {
                TimeEncoding::Iso8601 => map.serialize_entry(
                    &cfg.time_key,
                    &entry.time.format("%Y-%m-%dT%H:%M:%S%.3f%z").to_string(),
                )?,
                TimeEncoding::Rfc3339 => map.serialize_entry(
                    &cfg.time_key,
                    &entry.time.to_rfc3339_opts(SecondsFormat::Nanos, false),
                )?,
                TimeEncoding::EpochMillis => {
                    map.serialize_entry(&cfg.time_key, &entry.time.timestamp_millis())?
                }
            }
        }
        if !cfg.level_key.is_empty() {
            let level = match cfg.level_encoding {
                LevelEncoding::Lowercase => entry.level.as_str(),
                LevelEncoding::Uppercase => entry.level.as_upper_str(),
            };
            map.serialize_entry(&cfg.level_key, level)?;
        }
        if !cfg.name_key.is_empty() && !entry.logger_name.is_empty() {
            map.serialize_entry(&cfg.name_key, entry.logger_name)?;
        }
        if let (false, Some(caller)) = (cfg.caller_key.is_empty(), entry.caller) {
            let caller = match cfg.caller_encoding {
                CallerEncoding::Short => caller.short(),
                CallerEncoding::Full => caller.full(),
            };
            map.serialize_entry(&cfg.caller_key, &caller)?;
        }
        if !cfg.message_key.is_empty() {
            map.serialize_entry(&cfg.message_key, entry.message)?;
        }
        if let (false, Some(stack)) = (cfg.stacktrace_key.is_empty(), &entry.stack) {
            map.serialize_entry(&cfg.stacktrace_key, stack)?;
        }

        for field in self.context.iter().chain(self.fields) {
            if field.key().is_empty() {
                continue;
            }
            map.serialize_entry(
                field.key(),
                &EncodedValue {
                    value: field.value(),
                    durations: cfg.duration_encoding,
                },
            )?;
        }

        map.end()
    }
}

struct EncodedValue<'a> {
    value: &'a FieldValue,
    durations: DurationEncoding,
}

impl Serialize for EncodedValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value {
            FieldValue::Str(s) => serializer.serialize_str(s),
            FieldValue::Int(i) => serializer.serialize_i64(*i),
            FieldValue::Bool(b) => serializer.serialize_bool(*b),
            FieldValue::Float(f) => serialize_float(*f, serializer),
            FieldValue::Duration(d) => serialize_duration(*d, self.durations, serializer),
            FieldValue::Json(v) => v.serialize(serializer),
        }
    }
}

fn serialize_float<S: Serializer>(value: f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_nan() {
        serializer.serialize_str("NaN")
    } else if value == f64::INFINITY {
        serializer.serialize_str("+Inf")
    } else if value == f64::NEG_INFINITY {
        serializer.serialize_str("-Inf")
    } else {
        serializer.serialize_f64(value)
    }
}

fn serialize_duration<S: Serializer>(
    value: Duration,
    encoding: DurationEncoding,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match encoding {
        DurationEncoding::String => serializer.serialize_str(&duration_string(value)),
        DurationEncoding::Nanos => {
            serializer.serialize_u64(u64::try_from(value.as_nanos()).unwrap_or(u64::MAX))
        }
        DurationEncoding::Millis => serializer.serialize_f64(value.as_secs_f64() * 1000.0),
        DurationEncoding::Seconds => serializer.serialize_f64(value.as_secs_f64()),
    }
}

/// `1h2m3.5s` 形式の文字列
///
/// 1秒未満は `ns` / `µs` / `ms` 単位、ゼロは `0s`
fn duration_string(value: Duration) -> String {
    let nanos = value.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{}ns", nanos);
    }
    if nanos < 1_000_000 {
        return format!("{}µs", decimal(nanos, 3));
    }
    if nanos < 1_000_000_000 {
        return format!("{}ms", decimal(nanos, 6));
    }

    let secs = value.as_secs();
    let (hours, minutes) = (secs / 3600, secs % 3600 / 60);
    let seconds = decimal(
        u128::from(secs % 60) * 1_000_000_000 + u128::from(value.subsec_nanos()),
        9,
    );

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    out.push_str(&seconds);
    out.push('s');
    out
}

/// 小数点以下 `digits` 桁の固定小数を末尾のゼロを除いて表記
fn decimal(value: u128, digits: u32) -> String {
    let unit = 10u128.pow(digits);
    let (whole, frac) = (value / unit, value % unit);
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0width$}", frac, width = digits as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::{json, Value};

    fn test_entry<'a>(message: &'a str) -> Entry<'a> {
        Entry {
            level: Level::Info,
            time: Local.with_ymd_and_hms(2024, 12, 30, 10, 0, 0).unwrap(),
            logger_name: "",
            caller: Some(Caller::new("/home/dev/jsonlog/src/cli.rs", 42)),
            message,
            stack: None,
        }
    }

    fn encode_to_value(encoder: &JsonEncoder, entry: &Entry, fields: &[Field]) -> Value {
        let line = encoder.encode(entry, &[], fields).unwrap();
        assert_eq!(line.last(), Some(&b'\n'));
        serde_json::from_slice(&line).unwrap()
    }

    #[test]
    fn test_default_keys() {
        let encoder = JsonEncoder::default();
        let value = encode_to_value(&encoder, &test_entry("hello"), &[]);

        assert_eq!(value["level"], "info");
        assert_eq!(value["message"], "hello");
        assert_eq!(value["caller"], "src/cli.rs:42");
        assert!(value["timestamp"].is_string());
        assert!(value.get("logger").is_none());
        assert!(value.get("trace").is_none());
    }

    #[test]
    fn test_key_order() {
        let encoder = JsonEncoder::default();
        let mut entry = test_entry("ordered");
        entry.logger_name = "api";
        entry.stack = Some("stack".to_string());

        let line = encoder.encode(&entry, &[Field::int("a", 1)], &[Field::int("b", 2)]).unwrap();
        let text = String::from_utf8(line).unwrap();
        let positions: Vec<usize> = [
            "\"timestamp\"",
            "\"level\"",
            "\"logger\"",
            "\"caller\"",
            "\"message\"",
            "\"trace\"",
            "\"a\"",
            "\"b\"",
        ]
        .iter()
        .map(|k| text.find(k).unwrap())
        .collect();

        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn test_iso8601_timestamp_parses() {
        let encoder = JsonEncoder::default();
        let value = encode_to_value(&encoder, &test_entry("t"), &[]);
        let ts = value["timestamp"].as_str().unwrap();

        let parsed = DateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.3f%z").unwrap();
        assert_eq!(parsed.timestamp(), test_entry("t").time.timestamp());
    }

    #[test]
    fn test_epoch_millis_timestamp() {
        let encoder = JsonEncoder::new(EncoderConfig {
            time_encoding: TimeEncoding::EpochMillis,
            ..EncoderConfig::default()
        });
        let entry = test_entry("t");
        let value = encode_to_value(&encoder, &entry, &[]);
        assert_eq!(value["timestamp"], json!(entry.time.timestamp_millis()));
    }

    #[test]
    fn test_uppercase_level_and_full_caller() {
        let encoder = JsonEncoder::new(EncoderConfig {
            level_encoding: LevelEncoding::Uppercase,
            caller_encoding: CallerEncoding::Full,
            ..EncoderConfig::default()
        });
        let value = encode_to_value(&encoder, &test_entry("t"), &[]);
        assert_eq!(value["level"], "INFO");
        assert_eq!(value["caller"], "/home/dev/jsonlog/src/cli.rs:42");
    }

    #[test]
    fn test_empty_key_omits_entry() {
        let encoder = JsonEncoder::new(EncoderConfig {
            time_key: String::new(),
            caller_key: String::new(),
            ..EncoderConfig::default()
        });
        let value = encode_to_value(&encoder, &test_entry("t"), &[]);
        assert!(value.get("timestamp").is_none());
        assert!(value.get("caller").is_none());
        assert_eq!(value["message"], "t");
    }

    #[test]
    fn test_field_values() {
        let encoder = JsonEncoder::default();
        let fields = [
            Field::str("name", "x"),
            Field::int("count", 3),
            Field::bool("ok", true),
            Field::float("ratio", 0.25),
            Field::duration("elapsed", Duration::from_millis(1500)),
            Field::new("tags", json!(["a"])),
            Field::int("", 9),
        ];
        let value = encode_to_value(&encoder, &test_entry("t"), &fields);

        assert_eq!(value["name"], "x");
        assert_eq!(value["count"], 3);
        assert_eq!(value["ok"], true);
        assert_eq!(value["ratio"], 0.25);
        assert_eq!(value["elapsed"], "1.5s");
        assert_eq!(value["tags"], json!(["a"]));
        assert!(value.get("").is_none());
    }

    #[test]
    fn test_non_finite_floats() {
        let encoder = JsonEncoder::default();
        let fields = [
            Field::float("nan", f64::NAN),
            Field::float("pos", f64::INFINITY),
            Field::float("neg", f64::NEG_INFINITY),
        ];
        let value = encode_to_value(&encoder, &test_entry("t"), &fields);
        assert_eq!(value["nan"], "NaN");
        assert_eq!(value["pos"], "+Inf");
        assert_eq!(value["neg"], "-Inf");
    }

    #[test]
    fn test_duration_encodings() {
        let elapsed = [Field::duration("elapsed", Duration::from_millis(250))];

        let nanos = JsonEncoder::new(EncoderConfig {
            duration_encoding: DurationEncoding::Nanos,
            ..EncoderConfig::default()
        });
        assert_eq!(encode_to_value(&nanos, &test_entry("t"), &elapsed)["elapsed"], 250_000_000);

        let seconds = JsonEncoder::new(EncoderConfig {
            duration_encoding: DurationEncoding::Seconds,
            ..EncoderConfig::default()
        });
        assert_eq!(encode_to_value(&seconds, &test_entry("t"), &elapsed)["elapsed"], 0.25);
    }

    #[test]
    fn test_duration_string_format() {
        assert_eq!(duration_string(Duration::ZERO), "0s");
        assert_eq!(duration_string(Duration::from_nanos(750)), "750ns");
        assert_eq!(duration_string(Duration::from_nanos(1_500)), "1.5µs");
        assert_eq!(duration_string(Duration::from_millis(3)), "3ms");
        assert_eq!(duration_string(Duration::from_micros(2_250)), "2.25ms");
        assert_eq!(duration_string(Duration::from_millis(1500)), "1.5s");
        assert_eq!(duration_string(Duration::from_secs(90)), "1m30s");
        assert_eq!(duration_string(Duration::from_secs(3600)), "1h0m0s");
        assert_eq!(duration_string(Duration::from_millis(3_723_500)), "1h2m3.5s");
    }

    #[test]
    fn test_message_is_escaped() {
        let encoder = JsonEncoder::default();
        let value = encode_to_value(&encoder, &test_entry("line1\n\"quoted\""), &[]);
        assert_eq!(value["message"], "line1\n\"quoted\"");
    }

    #[test]
    fn test_caller_short_variants() {
        assert_eq!(Caller::new("main.rs", 1).short(), "main.rs:1");
        assert_eq!(Caller::new("src/main.rs", 2).short(), "src/main.rs:2");
        assert_eq!(Caller::new("a/b/c/d.rs", 3).short(), "c/d.rs:3");
        assert_eq!(Caller::new(r"C:\proj\src\lib.rs", 4).short(), "src\\lib.rs:4");
    }
}

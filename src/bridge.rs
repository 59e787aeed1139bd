//! tracing連携モジュール
//!
//! `tracing` のイベントを `Logger` に流す `Layer` を提供する

use crate::encoder::Caller;
use crate::error::ConfigError;
use crate::field::{Field, FieldValue};
use crate::level::Level;
use crate::logger::Logger;
use std::fmt;
use tracing::field::{Field as TracingField, Visit};
use tracing::subscriber::Interest;
use tracing::{Event, Metadata, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// tracingイベントをLoggerへ転送するLayer
#[derive(Debug, Clone)]
pub struct TracingBridge {
    logger: Logger,
}

impl TracingBridge {
    /// 新しいTracingBridgeを作成
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

/// tracingのレベルをログレベルに変換
fn map_level(level: &tracing::Level) -> Level {
    if *level == tracing::Level::ERROR {
        Level::Error
    } else if *level == tracing::Level::WARN {
        Level::Warn
    } else if *level == tracing::Level::INFO {
        Level::Info
    } else {
        Level::Debug
    }
}

impl<S: Subscriber> Layer<S> for TracingBridge {
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        // 最小レベルは実行時に変わるため、キャッシュさせない
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        !metadata.is_event() || self.logger.enabled(map_level(metadata.level()))
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let caller = metadata
            .file()
            .zip(metadata.line())
            .map(|(file, line)| Caller::new(file, line));

        self.logger.emit(
            map_level(metadata.level()),
            visitor.message.as_deref().unwrap_or_default(),
            &visitor.fields,
            caller,
            Some(metadata.target()),
        );
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Vec<Field>,
}

impl FieldVisitor {
    fn push(&mut self, field: &TracingField, value: impl Into<FieldValue>) {
        self.fields.push(Field::new(field.name(), value));
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &TracingField, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.push(field, value);
        }
    }

    fn record_i64(&mut self, field: &TracingField, value: i64) {
        self.push(field, value);
    }

    fn record_u64(&mut self, field: &TracingField, value: u64) {
        self.push(field, value);
    }

    fn record_bool(&mut self, field: &TracingField, value: bool) {
        self.push(field, value);
    }

    fn record_f64(&mut self, field: &TracingField, value: f64) {
        self.push(field, value);
    }

    fn record_error(&mut self, field: &TracingField, value: &(dyn std::error::Error + 'static)) {
        self.push(field, value.to_string());
    }

    fn record_debug(&mut self, field: &TracingField, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.push(field, format!("{:?}", value));
        }
    }
}

/// tracingのグローバルサブスクライバーとして登録
///
/// RUST_LOG環境変数でターゲットごとの絞り込みが可能（デフォルトはすべて通過）。
/// レベルの判定はLogger側の最小レベルで行う
pub fn install(logger: Logger) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace"));

    tracing_subscriber::registry()
        .with(filter)
        .with(TracingBridge::new(logger))
        .try_init()?;

    Ok(())
}

//! jsonlog - JSON構造化ロギングファサード
//!
//! レベル付きのログ出力（Debug / Info / Warn / Error / Fatal）を1行1件のJSONとして書き出す。
//! ロガーはアプリケーションの起点で1つ構築し、クローンを各コンポーネントに渡して使う。
//!
//! ```no_run
//! use jsonlog::{Field, Level, LogConfig};
//!
//! let logger = LogConfig::default().build().expect("logger");
//! let db = logger.with_fields([Field::str("component", "db")]);
//! db.info("connected", &[Field::int("pool_size", 8)]);
//! logger.set_level(Level::Debug);
//! ```

pub mod bridge;
pub mod config;
pub mod encoder;
pub mod error;
pub mod field;
pub mod level;
pub mod logger;
pub mod sampler;
pub mod sink;

pub use bridge::TracingBridge;
pub use config::LogConfig;
pub use error::{ConfigError, LevelParseError};
pub use field::{Field, FieldValue};
pub use level::{AtomicLevel, Level};
pub use logger::{FatalAction, Logger, LoggerBuilder};
pub use sink::{MemoryWriter, Sink};

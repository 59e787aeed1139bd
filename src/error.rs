//! エラー型定義モジュール

use std::io;
use thiserror::Error;
use tracing_subscriber::util::TryInitError;

/// ログレベル解析エラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("不明なログレベル: {0}")]
pub struct LevelParseError(pub String);

/// 設定エラー
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IOエラー: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML解析エラー: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("ログレベルエラー: {0}")]
    LevelError(#[from] LevelParseError),

    #[error("設定値エラー: {0}")]
    InvalidValue(String),

    #[error("出力先を開けません: {path}: {source}")]
    OutputOpenError {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("サブスクライバー登録エラー: {0}")]
    InstallError(#[from] TryInitError),
}

//! 設定モジュール

use crate::encoder::{
    CallerEncoding, DurationEncoding, EncoderConfig, LevelEncoding, TimeEncoding,
};
use crate::error::ConfigError;
use crate::level::Level;
use crate::logger::Logger;
use crate::sampler::SamplingConfig;
use crate::sink::Sink;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// ログレベルを上書きする環境変数
pub const LEVEL_ENV: &str = "JSONLOG_LEVEL";

/// ロガー設定
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// 最小ログレベル
    pub level: Level,
    /// ロガー名（`logger` キー）
    pub name: String,
    /// 出力先（stdout / stderr / ファイルパス）
    pub output: String,
    /// ロギング自体のエラーの出力先
    pub error_output: String,
    /// サンプリング設定（Noneで無効）
    pub sampling: Option<SamplingConfig>,
    pub disable_caller: bool,
    pub disable_stacktrace: bool,
    pub encoder: EncoderConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            name: String::new(),
            output: "stdout".to_string(),
            error_output: "stderr".to_string(),
            sampling: Some(SamplingConfig::default()),
            disable_caller: false,
            disable_stacktrace: false,
            encoder: EncoderConfig::default(),
        }
    }
}

/// TOML設定ファイル用構造体
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    level: Option<Level>,
    name: Option<String>,
    output: Option<String>,
    error_output: Option<String>,
    disable_caller: Option<bool>,
    disable_stacktrace: Option<bool>,
    sampling: Option<FileSampling>,
    encoder: Option<FileEncoder>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileSampling {
    enabled: Option<bool>,
    initial: Option<u64>,
    thereafter: Option<u64>,
    tick_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileEncoder {
    time_key: Option<String>,
    level_key: Option<String>,
    name_key: Option<String>,
    caller_key: Option<String>,
    message_key: Option<String>,
    stacktrace_key: Option<String>,
    time_encoding: Option<TimeEncoding>,
    level_encoding: Option<LevelEncoding>,
    duration_encoding: Option<DurationEncoding>,
    caller_encoding: Option<CallerEncoding>,
}

/// CLI引数
#[derive(Debug, Default)]
pub struct CliArgs {
    pub level: Option<Level>,
    pub output: Option<String>,
}

impl LogConfig {
    /// 設定を読み込む
    ///
    /// 優先順位: CLI引数 > 環境変数 > 設定ファイル > デフォルト値
    pub fn load(config_path: Option<&Path>, cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = LogConfig::default();

        // 設定ファイルを読み込む（明示指定されたファイルは必須）
        match config_path {
            Some(path) => config.merge_file(path)?,
            None => {
                if let Some(path) = default_config_path().filter(|p| p.exists()) {
                    config.merge_file(&path)?;
                }
            }
        }

        // 環境変数で上書き
        config.merge_env_level(std::env::var(LEVEL_ENV).ok().as_deref())?;

        // CLI引数で上書き
        config.merge_cli_args(cli_args);

        // バリデーション
        config.validate()?;

        Ok(config)
    }

    /// TOML文字列から設定を作成
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config = LogConfig::default();
        let file_config: FileConfig = toml::from_str(content)?;
        config.merge_file_config(file_config);
        config.validate()?;
        Ok(config)
    }

    /// 設定からロガーを構築
    pub fn build(&self) -> Result<Logger, ConfigError> {
        let output = Sink::open(&self.output)?;
        let error_output = Sink::open(&self.error_output)?;

        Ok(Logger::builder()
            .level(self.level)
            .name(self.name.clone())
            .encoder(self.encoder.clone())
            .sampling(self.sampling)
            .output(output)
            .error_output(error_output)
            .add_caller(!self.disable_caller)
            .stacktrace_level((!self.disable_stacktrace).then_some(Level::Error))
            .build())
    }

    fn merge_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = fs::read_to_string(path)?;
        let file_config: FileConfig = toml::from_str(&content)?;
        self.merge_file_config(file_config);
        Ok(())
    }

    /// ファイル設定をマージ
    fn merge_file_config(&mut self, file_config: FileConfig) {
        if let Some(level) = file_config.level {
            self.level = level;
        }
        if let Some(name) = file_config.name {
            self.name = name;
        }
        if let Some(output) = file_config.output {
            self.output = output;
        }
        if let Some(error_output) = file_config.error_output {
            self.error_output = error_output;
        }
        if let Some(disable_caller) = file_config.disable_caller {
            self.disable_caller = disable_caller;
        }
        if let Some(disable_stacktrace) = file_config.disable_stacktrace {
            self.disable_stacktrace = disable_stacktrace;
        }
        if let Some(sampling) = file_config.sampling {
            self.merge_sampling(sampling);
        }
        if let Some(encoder) = file_config.encoder {
            self.merge_encoder(encoder);
        }
    }

    fn merge_sampling(&mut self, file: FileSampling) {
        if file.enabled == Some(false) {
            self.sampling = None;
            return;
        }

        let mut sampling = self.sampling.unwrap_or_default();
        if let Some(initial) = file.initial {
            sampling.initial = initial;
        }
        if let Some(thereafter) = file.thereafter {
            sampling.thereafter = thereafter;
        }
        if let Some(tick_ms) = file.tick_ms {
            sampling.tick = Duration::from_millis(tick_ms);
        }
        self.sampling = Some(sampling);
    }

    fn merge_encoder(&mut self, file: FileEncoder) {
        let enc = &mut self.encoder;
        let keys = [
            (file.time_key, &mut enc.time_key),
            (file.level_key, &mut enc.level_key),
            (file.name_key, &mut enc.name_key),
            (file.caller_key, &mut enc.caller_key),
            (file.message_key, &mut enc.message_key),
            (file.stacktrace_key, &mut enc.stacktrace_key),
        ];
        for (value, slot) in keys {
            if let Some(value) = value {
                *slot = value;
            }
        }

        if let Some(time_encoding) = file.time_encoding {
            enc.time_encoding = time_encoding;
        }
        if let Some(level_encoding) = file.level_encoding {
            enc.level_encoding = level_encoding;
        }
        if let Some(duration_encoding) = file.duration_encoding {
            enc.duration_encoding = duration_encoding;
        }
        if let Some(caller_encoding) = file.caller_encoding {
            enc.caller_encoding = caller_encoding;
        }
    }

    /// 環境変数のレベルをマージ
    fn merge_env_level(&mut self, value: Option<&str>) -> Result<(), ConfigError> {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            self.level = value.parse()?;
        }
        Ok(())
    }

    /// CLI引数をマージ
    fn merge_cli_args(&mut self, cli_args: &CliArgs) {
        if let Some(level) = cli_args.level {
            self.level = level;
        }
        if let Some(ref output) = cli_args.output {
            self.output = output.clone();
        }
    }

    /// 設定値をバリデート
    fn validate(&self) -> Result<(), ConfigError> {
        if self.output.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "output must not be empty".to_string(),
            ));
        }
        if self.error_output.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "error_output must not be empty".to_string(),
            ));
        }
        if self.encoder.message_key.is_empty() || self.encoder.level_key.is_empty() {
            return Err(ConfigError::InvalidValue(
                "encoder.message_key and encoder.level_key must not be empty".to_string(),
            ));
        }
        if let Some(sampling) = &self.sampling {
            if sampling.initial == 0 {
                return Err(ConfigError::InvalidValue(
                    "sampling.initial must be greater than 0".to_string(),
                ));
            }
            if sampling.tick.is_zero() {
                return Err(ConfigError::InvalidValue(
                    "sampling.tick_ms must be greater than 0".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// 設定ファイルのデフォルトパス
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("jsonlog").join("config.toml"))
}

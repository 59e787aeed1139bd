//! ログレベルモジュール

use crate::error::LevelParseError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// ログの重要度
///
/// Debug < Info < Warn < Error < Fatal の順に並ぶ
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "String")]
#[repr(u8)]
pub enum Level {
    Debug = 0,
    #[default]
    Info = 1,
    Warn = 2,
    Error = 3,
    Fatal = 4,
}

impl Level {
    /// すべてのレベル（昇順）
    pub const ALL: [Level; 5] = [
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Fatal,
    ];

    /// 小文字のレベル名
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }

    /// 大文字のレベル名
    pub fn as_upper_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Level::Debug,
            1 => Level::Info,
            2 => Level::Warn,
            3 => Level::Error,
            _ => Level::Fatal,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = LevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            _ => Err(LevelParseError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Level {
    type Error = LevelParseError;

    fn try_from(value: String) -> Result<Self, LevelParseError> {
        value.parse()
    }
}

/// 実行時に変更可能な最小レベル
///
/// クローンは同じセルを共有する。読み書きはアトミックに行われる
#[derive(Debug, Clone)]
pub struct AtomicLevel {
    inner: Arc<AtomicU8>,
}

impl AtomicLevel {
    /// 新しいAtomicLevelを作成
    pub fn new(level: Level) -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(level as u8)),
        }
    }

    /// 現在の最小レベルを取得
    pub fn level(&self) -> Level {
        Level::from_u8(self.inner.load(Ordering::SeqCst))
    }

    /// 最小レベルを変更
    pub fn set_level(&self, level: Level) {
        self.inner.store(level as u8, Ordering::SeqCst);
    }

    /// 指定レベルが出力対象かどうか
    pub fn enabled(&self, level: Level) -> bool {
        level >= self.level()
    }
}

impl Default for AtomicLevel {
    fn default() -> Self {
        Self::new(Level::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Fatal);
    }

    #[test]
    fn test_level_display_lowercase() {
        let names: Vec<String> = Level::ALL.iter().map(|l| l.to_string()).collect();
        assert_eq!(names, vec!["debug", "info", "warn", "error", "fatal"]);
    }

    #[test]
    fn test_level_parse_case_insensitive() {
        assert_eq!("INFO".parse::<Level>().unwrap(), Level::Info);
        assert_eq!(" Debug ".parse::<Level>().unwrap(), Level::Debug);
        assert_eq!("warning".parse::<Level>().unwrap(), Level::Warn);
    }

    #[test]
    fn test_level_parse_unknown() {
        let err = "verbose".parse::<Level>().unwrap_err();
        assert_eq!(err, LevelParseError("verbose".to_string()));
    }

    #[test]
    fn test_level_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            level: Level,
        }
        let w: Wrapper = toml::from_str(r#"level = "error""#).unwrap();
        assert_eq!(w.level, Level::Error);

        let bad: Result<Wrapper, _> = toml::from_str(r#"level = "loud""#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_atomic_level_default_info() {
        let level = AtomicLevel::default();
        assert_eq!(level.level(), Level::Info);
        assert!(!level.enabled(Level::Debug));
        assert!(level.enabled(Level::Info));
        assert!(level.enabled(Level::Fatal));
    }

    #[test]
    fn test_atomic_level_shared_between_clones() {
        let level = AtomicLevel::new(Level::Info);
        let handle = level.clone();

        handle.set_level(Level::Debug);
        assert_eq!(level.level(), Level::Debug);
        assert!(level.enabled(Level::Debug));
    }

    #[test]
    fn test_atomic_level_set_is_idempotent() {
        let level = AtomicLevel::new(Level::Info);
        level.set_level(Level::Error);
        level.set_level(Level::Error);
        assert_eq!(level.level(), Level::Error);
        assert!(!level.enabled(Level::Warn));
    }

    #[test]
    fn test_atomic_level_concurrent_access() {
        let level = AtomicLevel::new(Level::Info);

        thread::scope(|s| {
            for i in 0..8 {
                let level = level.clone();
                s.spawn(move || {
                    for _ in 0..1000 {
                        level.set_level(Level::ALL[i % Level::ALL.len()]);
                        // 読み取り値は常にいずれかの有効なレベル
                        assert!(Level::ALL.contains(&level.level()));
                    }
                });
            }
        });
    }
}

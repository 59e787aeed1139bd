//! CLIモジュール

use anyhow::Result;
use clap::{Parser, Subcommand};
use jsonlog::config::CliArgs;
use jsonlog::{bridge, Field, Level, LogConfig, Logger};
use serde_json::Value;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;
use tracing::debug;

/// jsonlog - JSON構造化ログ出力ツール
#[derive(Parser, Debug)]
#[command(name = "jsonlog")]
#[command(about = "JSON構造化ログ出力ツール", long_about = None)]
pub struct Cli {
    /// 設定ファイルのパス
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// 最小ログレベル（debug / info / warn / error / fatal）
    #[arg(short, long, global = true)]
    pub level: Option<Level>,

    /// 出力先（stdout / stderr / ファイルパス）
    #[arg(short, long, global = true)]
    pub output: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// サブコマンド
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// ログを1件出力
    Emit {
        /// メッセージ
        message: String,

        /// 出力レベル（fatalの場合は出力後に終了コード1で終了）
        #[arg(short, long, default_value = "info")]
        severity: Level,

        /// 呼び出し箇所のフィールド（key=value）
        #[arg(short, long = "field", value_parser = parse_field)]
        fields: Vec<Field>,

        /// ロガーに蓄積するフィールド（key=value）
        #[arg(short, long, value_parser = parse_field)]
        with: Vec<Field>,

        /// ロガー名
        #[arg(short, long)]
        name: Option<String>,
    },
    /// 複数スレッドから同時にログを出力
    Stress {
        /// スレッド数
        #[arg(short, long, default_value_t = 4)]
        threads: usize,

        /// スレッドごとの出力件数
        #[arg(short = 'n', long, default_value_t = 1000)]
        lines: usize,
    },
}

/// `key=value` をFieldに変換
///
/// 値はJSONとして解釈できればその型、できなければ文字列になる
fn parse_field(s: &str) -> Result<Field, String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("key=value形式で指定してください: {}", s))?;
    if key.is_empty() {
        return Err(format!("キーが空です: {}", s));
    }

    let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok(Field::new(key, value))
}

/// CLIエントリポイント
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let cli_args = CliArgs {
        level: cli.level,
        output: cli.output.clone(),
    };
    let config = LogConfig::load(cli.config.as_deref(), &cli_args)?;
    let logger = config.build()?;
    bridge::install(logger.clone())?;

    debug!(
        level = %config.level,
        output = %config.output,
        "ロガーを初期化しました"
    );

    match cli.command {
        Commands::Emit {
            message,
            severity,
            fields,
            with,
            name,
        } => {
            let mut logger = logger.with_fields(with);
            if let Some(name) = name {
                logger = logger.named(&name);
            }
            logger.log(severity, &message, &fields);
        }
        Commands::Stress { threads, lines } => {
            stress(&logger, threads, lines);
        }
    }

    logger.sync()?;
    Ok(())
}

/// 複数スレッドから同時に出力
fn stress(logger: &Logger, threads: usize, lines: usize) {
    let started = Instant::now();

    thread::scope(|s| {
        for t in 0..threads {
            let logger = logger.with_fields([Field::new("thread", t)]);
            s.spawn(move || {
                for seq in 0..lines {
                    logger.info("stress", &[Field::new("seq", seq)]);
                }
            });
        }
    });

    logger.info(
        "ストレステスト完了",
        &[
            Field::new("threads", threads),
            Field::new("lines", lines),
            Field::duration("elapsed", started.elapsed()),
        ],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonlog::FieldValue;

    #[test]
    fn test_emit_command_defaults() {
        let cli = Cli::try_parse_from(["jsonlog", "emit", "hello"]);
        assert!(cli.is_ok());

        if let Commands::Emit {
            message,
            severity,
            fields,
            with,
            name,
        } = cli.unwrap().command
        {
            assert_eq!(message, "hello");
            assert_eq!(severity, Level::Info);
            assert!(fields.is_empty());
            assert!(with.is_empty());
            assert_eq!(name, None);
        } else {
            panic!("Expected Emit command");
        }
    }

    #[test]
    fn test_emit_command_with_fields() {
        let cli = Cli::try_parse_from([
            "jsonlog", "emit", "hello", "--severity", "error", "-f", "count=3", "-f", "ok=true",
            "--with", "service=api",
        ]);
        assert!(cli.is_ok());

        if let Commands::Emit {
            severity,
            fields,
            with,
            ..
        } = cli.unwrap().command
        {
            assert_eq!(severity, Level::Error);
            assert_eq!(fields, vec![Field::int("count", 3), Field::bool("ok", true)]);
            assert_eq!(with, vec![Field::str("service", "api")]);
        } else {
            panic!("Expected Emit command");
        }
    }

    #[test]
    fn test_emit_invalid_severity() {
        let cli = Cli::try_parse_from(["jsonlog", "emit", "hello", "--severity", "loud"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::try_parse_from([
            "jsonlog", "stress", "--level", "debug", "--output", "stderr", "-t", "2", "-n", "10",
        ]);
        assert!(cli.is_ok());

        let cli = cli.unwrap();
        assert_eq!(cli.level, Some(Level::Debug));
        assert_eq!(cli.output.as_deref(), Some("stderr"));
        if let Commands::Stress { threads, lines } = cli.command {
            assert_eq!(threads, 2);
            assert_eq!(lines, 10);
        } else {
            panic!("Expected Stress command");
        }
    }

    #[test]
    fn test_parse_field_value_kinds() {
        assert_eq!(parse_field("name=x").unwrap(), Field::str("name", "x"));
        assert_eq!(parse_field("n=42").unwrap(), Field::int("n", 42));
        assert_eq!(parse_field("r=0.5").unwrap(), Field::float("r", 0.5));
        assert_eq!(parse_field("quoted=\"7\"").unwrap(), Field::str("quoted", "7"));
        assert!(matches!(
            parse_field("list=[1,2]").unwrap().value(),
            FieldValue::Json(_)
        ));
        // 値に = を含んでもよい
        assert_eq!(parse_field("q=a=b").unwrap(), Field::str("q", "a=b"));
    }

    #[test]
    fn test_parse_field_rejects_malformed() {
        assert!(parse_field("novalue").is_err());
        assert!(parse_field("=x").is_err());
    }
}

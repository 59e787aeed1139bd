//! ロガーモジュール
//!
//! `Logger` はコアを共有する軽量なハンドル。アプリケーションの起点で1つ作成し、
//! 必要なコンポーネントにクローンを渡す

use crate::encoder::{Caller, EncoderConfig, Entry, JsonEncoder};
use crate::field::Field;
use crate::level::{AtomicLevel, Level};
use crate::sampler::{Sampler, SamplingConfig};
use crate::sink::Sink;
use chrono::{DateTime, Local};
use std::backtrace::Backtrace;
use std::fmt;
use std::io::{self, Write};
use std::panic::Location;
use std::process;
use std::sync::Arc;

/// Fatalログ出力後の動作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalAction {
    /// 指定した終了コードでプロセスを終了
    Exit(i32),
    /// パニックする（プロセス内テスト用）
    Panic,
}

impl Default for FatalAction {
    fn default() -> Self {
        FatalAction::Exit(1)
    }
}

impl FatalAction {
    fn run(self, message: &str) -> ! {
        match self {
            FatalAction::Exit(code) => process::exit(code),
            FatalAction::Panic => panic!("fatal: {}", message),
        }
    }
}

struct Core {
    level: AtomicLevel,
    encoder: JsonEncoder,
    sampler: Option<Sampler>,
    output: Sink,
    error_output: Sink,
    add_caller: bool,
    stacktrace_level: Option<Level>,
    on_fatal: FatalAction,
}

impl Core {
    fn stack_for(&self, level: Level) -> Option<String> {
        match self.stacktrace_level {
            Some(min) if level >= min => {
                Some(trim_internal_frames(&Backtrace::force_capture().to_string()))
            }
            _ => None,
        }
    }

    /// ロギング自体の失敗をエラー出力へ報告
    fn report(&self, time: &DateTime<Local>, err: &dyn fmt::Display) {
        let line = format!("{} write error: {}\n", time.to_rfc3339(), err);
        let _ = self.error_output.write_line(line.as_bytes());
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        let _ = self.output.sync();
        let _ = self.error_output.sync();
    }
}

/// 構造化ロガー
#[derive(Clone)]
pub struct Logger {
    core: Arc<Core>,
    name: String,
    context: Arc<Vec<Field>>,
}

impl Logger {
    /// ビルダーを作成
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::default()
    }

    /// Debugレベルで出力
    #[track_caller]
    pub fn debug(&self, msg: &str, fields: &[Field]) {
        self.emit(Level::Debug, msg, fields, Some(caller()), None);
    }

    /// Infoレベルで出力
    #[track_caller]
    pub fn info(&self, msg: &str, fields: &[Field]) {
        self.emit(Level::Info, msg, fields, Some(caller()), None);
    }

    /// Warnレベルで出力
    #[track_caller]
    pub fn warn(&self, msg: &str, fields: &[Field]) {
        self.emit(Level::Warn, msg, fields, Some(caller()), None);
    }

    /// Errorレベルで出力
    #[track_caller]
    pub fn error(&self, msg: &str, fields: &[Field]) {
        self.emit(Level::Error, msg, fields, Some(caller()), None);
    }

    /// Fatalレベルで出力し、フラッシュ後にプロセスを終了する
    ///
    /// 最小レベルやサンプリングに関係なく常に出力される
    #[track_caller]
    pub fn fatal(&self, msg: &str, fields: &[Field]) -> ! {
        self.emit(Level::Fatal, msg, fields, Some(caller()), None);
        if let Err(e) = self.sync() {
            self.core.report(&Local::now(), &e);
            let _ = self.core.error_output.sync();
        }
        self.core.on_fatal.run(msg)
    }

    /// 指定レベルで出力
    #[track_caller]
    pub fn log(&self, level: Level, msg: &str, fields: &[Field]) {
        if level == Level::Fatal {
            self.fatal(msg, fields);
        }
        self.emit(level, msg, fields, Some(caller()), None);
    }

    /// フィールドを蓄積した派生ロガーを作成
    ///
    /// 蓄積したフィールドは以降のすべてのレコードで呼び出し箇所のフィールドより前に出力される
    pub fn with_fields(&self, fields: impl IntoIterator<Item = Field>) -> Logger {
        let mut context = Vec::clone(&self.context);
        context.extend(fields);
        Logger {
            core: Arc::clone(&self.core),
            name: self.name.clone(),
            context: Arc::new(context),
        }
    }

    /// 名前付きの派生ロガーを作成（親の名前と `.` で連結）
    pub fn named(&self, name: &str) -> Logger {
        let name = match (self.name.is_empty(), name.is_empty()) {
            (_, true) => self.name.clone(),
            (true, false) => name.to_string(),
            (false, false) => format!("{}.{}", self.name, name),
        };
        Logger {
            core: Arc::clone(&self.core),
            name,
            context: Arc::clone(&self.context),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 最小レベルを変更（このコアを共有するすべてのロガーに反映）
    pub fn set_level(&self, level: Level) {
        self.core.level.set_level(level);
    }

    pub fn level(&self) -> Level {
        self.core.level.level()
    }

    /// 最小レベルのハンドルを取得
    pub fn level_handle(&self) -> AtomicLevel {
        self.core.level.clone()
    }

    /// 指定レベルが出力対象かどうか
    pub fn enabled(&self, level: Level) -> bool {
        level == Level::Fatal || self.core.level.enabled(level)
    }

    /// 出力とエラー出力をフラッシュ
    pub fn sync(&self) -> io::Result<()> {
        let output = self.core.output.sync();
        let error_output = self.core.error_output.sync();
        output.and(error_output)
    }

    pub(crate) fn emit(
        &self,
        level: Level,
        message: &str,
        fields: &[Field],
        caller: Option<Caller<'_>>,
        name: Option<&str>,
    ) {
        if !self.enabled(level) {
            return;
        }
        if let Some(sampler) = &self.core.sampler {
            if !sampler.check(level, message) {
                return;
            }
        }

        let entry = Entry {
            level,
            time: Local::now(),
            logger_name: name.unwrap_or(&self.name),
            caller: caller.filter(|_| self.core.add_caller),
            message,
            stack: self.core.stack_for(level),
        };

        match self.core.encoder.encode(&entry, &self.context, fields) {
            Ok(line) => {
                if let Err(e) = self.core.output.write_line(&line) {
                    self.core.report(&entry.time, &e);
                }
            }
            Err(e) => self.core.report(&entry.time, &e),
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level())
            .field("output", &self.core.output)
            .field("context", &self.context)
            .finish()
    }
}

/// スタックトレース先頭のロガー内部のフレームを取り除く
///
/// トレースは呼び出し元のフレームから始まる。フレームを解析できない場合はそのまま返す
fn trim_internal_frames(trace: &str) -> String {
    let mut frames: Vec<Vec<&str>> = Vec::new();
    for line in trace.lines() {
        // `at file:line` 行は直前のフレームに属する
        if frame_symbol(line).is_none() {
            if let Some(frame) = frames.last_mut() {
                frame.push(line);
                continue;
            }
        }
        frames.push(vec![line]);
    }

    let skip = frames
        .iter()
        .take_while(|frame| frame_symbol(frame[0]).is_some_and(is_internal_symbol))
        .count();
    if skip == frames.len() {
        return trace.to_string();
    }
    frames[skip..].concat().join("\n")
}

/// `  12: symbol` 形式の行からシンボル名を取り出す
fn frame_symbol(line: &str) -> Option<&str> {
    let (index, symbol) = line.trim_start().split_once(": ")?;
    (!index.is_empty() && index.bytes().all(|b| b.is_ascii_digit())).then_some(symbol)
}

fn is_internal_symbol(symbol: &str) -> bool {
    const INTERNAL: [&str; 6] = [
        "std::backtrace",
        "jsonlog::logger::Core",
        "jsonlog::logger::Logger",
        "jsonlog::bridge::TracingBridge",
        "tracing_core::",
        "tracing_subscriber::",
    ];
    INTERNAL.iter().any(|prefix| symbol.contains(prefix))
}

#[track_caller]
fn caller() -> Caller<'static> {
    let location = Location::caller();
    Caller::new(location.file(), location.line())
}

/// ロガービルダー
pub struct LoggerBuilder {
    level: Level,
    encoder: EncoderConfig,
    sampling: Option<SamplingConfig>,
    output: Option<Sink>,
    error_output: Option<Sink>,
    add_caller: bool,
    stacktrace_level: Option<Level>,
    on_fatal: FatalAction,
    name: String,
    fields: Vec<Field>,
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self {
            level: Level::Info,
            encoder: EncoderConfig::default(),
            sampling: None,
            output: None,
            error_output: None,
            add_caller: true,
            stacktrace_level: Some(Level::Error),
            on_fatal: FatalAction::default(),
            name: String::new(),
            fields: Vec::new(),
        }
    }
}

impl LoggerBuilder {
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn encoder(mut self, encoder: EncoderConfig) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn sampling(mut self, sampling: Option<SamplingConfig>) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn output(mut self, output: Sink) -> Self {
        self.output = Some(output);
        self
    }

    /// 任意のWriterを出力先にする
    pub fn writer(self, writer: impl Write + Send + 'static) -> Self {
        self.output(Sink::from_writer("writer", writer))
    }

    pub fn error_output(mut self, error_output: Sink) -> Self {
        self.error_output = Some(error_output);
        self
    }

    pub fn add_caller(mut self, add_caller: bool) -> Self {
        self.add_caller = add_caller;
        self
    }

    /// スタックトレースを付与する最小レベル（Noneで無効）
    pub fn stacktrace_level(mut self, level: Option<Level>) -> Self {
        self.stacktrace_level = level;
        self
    }

    pub fn on_fatal(mut self, action: FatalAction) -> Self {
        self.on_fatal = action;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// ロガーを構築
    pub fn build(self) -> Logger {
        let core = Core {
            level: AtomicLevel::new(self.level),
            encoder: JsonEncoder::new(self.encoder),
            sampler: self.sampling.map(Sampler::new),
            output: self.output.unwrap_or_else(Sink::stdout),
            error_output: self.error_output.unwrap_or_else(Sink::stderr),
            add_caller: self.add_caller,
            stacktrace_level: self.stacktrace_level,
            on_fatal: self.on_fatal,
        };
        Logger {
            core: Arc::new(core),
            name: self.name,
            context: Arc::new(self.fields),
        }
    }
}

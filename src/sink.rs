//! 出力先モジュール

use crate::error::ConfigError;
use parking_lot::Mutex;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

/// ログの出力先
///
/// 1行を1回の書き込みで行うため、複数スレッドから書き込んでも行が混ざらない
pub struct Sink {
    name: String,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl Sink {
    /// 出力先を開く
    ///
    /// `stdout` と `stderr` は標準出力・標準エラー、それ以外はファイルパスとして追記で開く
    pub fn open(target: &str) -> Result<Self, ConfigError> {
        match target {
            "stdout" => Ok(Self::stdout()),
            "stderr" => Ok(Self::stderr()),
            path => Self::open_file(Path::new(path)).map_err(|source| {
                ConfigError::OutputOpenError {
                    path: path.to_string(),
                    source,
                }
            }),
        }
    }

    pub fn stdout() -> Self {
        Self::from_writer("stdout", io::stdout())
    }

    pub fn stderr() -> Self {
        Self::from_writer("stderr", io::stderr())
    }

    /// 任意のWriterから作成
    pub fn from_writer(name: impl Into<String>, writer: impl Write + Send + 'static) -> Self {
        Self {
            name: name.into(),
            writer: Mutex::new(Box::new(writer)),
        }
    }

    fn open_file(path: &Path) -> io::Result<Self> {
        // 親ディレクトリが存在しない場合は作成
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::from_writer(
            path.to_string_lossy(),
            BufWriter::new(file),
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// エンコード済みの1行を書き込む
    pub fn write_line(&self, line: &[u8]) -> io::Result<()> {
        self.writer.lock().write_all(line)
    }

    /// バッファをフラッシュ
    pub fn sync(&self) -> io::Result<()> {
        self.writer.lock().flush()
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink").field("name", &self.name).finish()
    }
}

/// メモリ上のバッファ
///
/// クローンは同じバッファを共有する。テストでの出力確認用
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 書き込まれた内容を文字列で取得
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }

    /// 書き込まれた内容を行ごとに取得
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    pub fn clear(&self) {
        self.buf.lock().clear();
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

//! 追記専用の対局結果台帳。
//!
//! 1行1局のタブ区切りテキストで、`#` で始まる行はメタデータ（コメント）。
//! 先頭列の最大値が「どこまで進んだか」を表し、再起動時の再開位置になる。
//!
//! ```text
//! # GAME	ROUND	OPENING	BLACK	WHITE	RES_B	RES_W	LENGTH	TIME_B	TIME_W	ERR	ERR_MSG
//! 0000	0	a1	alpha	beta	B+Resign	B+Resign	41	12.3	10.9	0
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;

use crate::error::{Result, TournamentError};
use crate::result::GameResult;

pub const LEDGER_FILE_NAME: &str = "results";

const BANNER: &str = "Game results file generated by twogtp.";
const COLUMNS: &str = "GAME\tROUND\tOPENING\tBLACK\tWHITE\tRES_B\tRES_W\tLENGTH\tTIME_B\tTIME_W\tERR\tERR_MSG";

/// 台帳の1行。
#[derive(Clone, Debug, PartialEq)]
pub struct GameRecord {
    pub index: u64,
    pub round: u64,
    pub opening: String,
    pub black_name: String,
    pub white_name: String,
    pub result_black: GameResult,
    pub result_white: GameResult,
    /// 終局の `resign` を除いた手数
    pub length: u32,
    pub elapsed_black: Duration,
    pub elapsed_white: Duration,
    pub error: bool,
    pub error_message: String,
}

impl GameRecord {
    /// 改行付きの1行にシリアライズする。
    pub fn to_line(&self) -> String {
        format!(
            "{:04}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.1}\t{:.1}\t{}\t{}\n",
            self.index,
            self.round,
            sanitize(&self.opening),
            sanitize(&self.black_name),
            sanitize(&self.white_name),
            sanitize(&self.result_black.to_string()),
            sanitize(&self.result_white.to_string()),
            self.length,
            self.elapsed_black.as_secs_f64(),
            self.elapsed_white.as_secs_f64(),
            u8::from(self.error),
            sanitize(&self.error_message),
        )
    }
}

/// 自由記述欄のタブ・改行を空白に置き換え、1レコード＝1行を保つ。
fn sanitize(field: &str) -> String {
    field.replace(['\t', '\n', '\r'], " ")
}

/// 対局結果台帳。トーナメント1インスタンスが排他的に所有する。
#[derive(Debug)]
pub struct ResultsLedger {
    path: PathBuf,
    header: Vec<String>,
    last_index: Option<u64>,
}

impl ResultsLedger {
    /// 台帳を開く。
    ///
    /// 既存ファイルがあれば最大の GAME 番号を復元して日付行を追記する。
    /// 無ければ（または空なら）ヘッダを書いて番号 -1 から始める。
    /// `header` は `clear()` 時のヘッダ再構築のために保持する。
    pub fn open(path: impl Into<PathBuf>, header: Vec<String>) -> Result<Self> {
        let path = path.into();
        let mut ledger = Self {
            path,
            header,
            last_index: None,
        };

        let existing = match fs::read(&ledger.path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(TournamentError::persistence(&ledger.path, e)),
        };

        match existing {
            Some(bytes) if !bytes.is_empty() => {
                let complete_len = complete_prefix_len(&bytes);
                if complete_len < bytes.len() {
                    log::warn!(
                        "{}: discarding incomplete trailing line {:?}",
                        ledger.path.display(),
                        String::from_utf8_lossy(&bytes[complete_len..])
                    );
                    ledger.truncate_to(complete_len as u64)?;
                }
                if complete_len == 0 {
                    // ヘッダの書き込み途中で止まっていた
                    ledger.write_header()?;
                    return Ok(ledger);
                }
                ledger.last_index =
                    recover_last_index(&String::from_utf8_lossy(&bytes[..complete_len]));
                log::info!(
                    "resuming ledger {} at game {}",
                    ledger.path.display(),
                    ledger.resume_index()
                );
                ledger.write_timestamp()?;
            }
            _ => ledger.write_header()?,
        }
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 最後に記録された GAME 番号（未記録なら `None`）。
    pub fn last_index(&self) -> Option<u64> {
        self.last_index
    }

    /// 次に対局すべき GAME 番号。
    pub fn resume_index(&self) -> u64 {
        self.last_index.map_or(0, |i| i + 1)
    }

    /// 1局分を追記する。
    ///
    /// 毎回 open-append-close し、プロセスが強制終了されてもバッファに
    /// 取り残されたデータが失われないようにする。
    pub fn append(&mut self, record: &GameRecord) -> Result<()> {
        let expected = self.resume_index();
        if record.index != expected {
            return Err(TournamentError::OutOfSequence {
                expected,
                actual: record.index,
            });
        }
        let line = record.to_line();
        let mut file = self.open_append()?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|e| TournamentError::persistence(&self.path, e))?;
        self.last_index = Some(record.index);
        Ok(())
    }

    /// 台帳を空にしてヘッダ（説明行を含む）を書き直し、番号を 0 からやり直す。
    pub fn clear(&mut self) -> Result<()> {
        self.write_header()?;
        self.last_index = None;
        Ok(())
    }

    fn write_header(&self) -> Result<()> {
        let mut text = format!("# {BANNER}\n#\n");
        for line in &self.header {
            text.push_str(&format!("# {}\n", sanitize(line)));
        }
        text.push_str(&format!("#\n# {COLUMNS}\n#\n"));
        fs::write(&self.path, text).map_err(|e| TournamentError::persistence(&self.path, e))?;
        self.write_timestamp()
    }

    fn write_timestamp(&self) -> Result<()> {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S %Z");
        let mut file = self.open_append()?;
        writeln!(file, "# Date: {stamp}").map_err(|e| TournamentError::persistence(&self.path, e))
    }

    fn open_append(&self) -> Result<File> {
        OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| TournamentError::persistence(&self.path, e))
    }

    fn truncate_to(&self, len: u64) -> Result<()> {
        OpenOptions::new()
            .write(true)
            .open(&self.path)
            .and_then(|f| f.set_len(len))
            .map_err(|e| TournamentError::persistence(&self.path, e))
    }
}

/// 改行で終わっている部分の長さ。最終行が改行で終わっていなければ書き込み途中とみなす。
fn complete_prefix_len(bytes: &[u8]) -> usize {
    bytes.iter().rposition(|&b| b == b'\n').map_or(0, |pos| pos + 1)
}

/// コメント行を除いた各行の先頭列から最大の GAME 番号を求める。
pub fn recover_last_index(text: &str) -> Option<u64> {
    let mut last = None;
    for (lineno, line) in text.lines().enumerate() {
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let first = line.split('\t').next().unwrap_or_default().trim();
        match first.parse::<u64>() {
            Ok(index) => last = last.max(Some(index)),
            Err(_) => log::warn!("ledger line {}: unparsable game index {first:?}", lineno + 1),
        }
    }
    last
}

/// 既存台帳のヘッダに残された `# Seed: N` を読む。台帳が無ければ `None`。
///
/// ランダム開局のトーナメントをシード未指定で再開するとき、同じ開局列を再現するために使う。
pub fn recorded_seed(path: &Path) -> Result<Option<u64>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(TournamentError::persistence(path, e)),
    };
    Ok(text
        .lines()
        .take_while(|line| line.starts_with('#'))
        .find_map(|line| line.strip_prefix("# Seed:"))
        .and_then(|value| value.trim().parse().ok()))
}

//! トーナメント実行時のエラー分類。
//!
//! - [`MatchError`]: 1局の中で起きる失敗。オーケストレータ境界で捕捉され、
//!   `ERR=1` の行として台帳に記録される。ドライバループには伝播しない。
//! - [`TournamentError`]: ハーネス自体が先に進めない失敗。捕捉せずに実行を打ち切る。

use std::io;
use std::path::PathBuf;

/// 台帳の `ERR_MSG` 列に書くプロセス死亡マーカー。
pub const PROCESS_DIED_MESSAGE: &str = "program died";

/// 1局の対局中に発生した失敗。
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// プロトコル上の不整合（GTP の `?` 応答、不正な応答、手数超過など）
    #[error("{0}")]
    Orchestration(String),

    /// エンジンプロセスが予期せず終了した（起動失敗・応答タイムアウトを含む）
    #[error("{label}: {detail}")]
    ProcessDied { label: String, detail: String },
}

impl MatchError {
    pub fn process_died(label: impl Into<String>, detail: impl Into<String>) -> Self {
        MatchError::ProcessDied {
            label: label.into(),
            detail: detail.into(),
        }
    }

    /// 台帳に記録するメッセージ。プロセス死亡は固定文言にする。
    pub fn ledger_message(&self) -> String {
        match self {
            MatchError::Orchestration(msg) => msg.clone(),
            MatchError::ProcessDied { .. } => PROCESS_DIED_MESSAGE.to_string(),
        }
    }
}

/// 実行を中断させる致命的エラー。
#[derive(thiserror::Error, Debug)]
pub enum TournamentError {
    /// 台帳・棋譜ファイルの読み書きに失敗した
    #[error("failed to access {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 台帳の採番と追記しようとした行の番号が食い違った
    #[error("ledger out of sequence: expected game {expected}, got {actual}")]
    OutOfSequence { expected: u64, actual: u64 },

    /// 開局ファイルなどの設定不備（対局を1つもスケジュールする前に失敗する）
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl TournamentError {
    pub fn persistence(path: impl Into<PathBuf>, source: io::Error) -> Self {
        TournamentError::Persistence {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = TournamentError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_death_uses_fixed_ledger_marker() {
        let err = MatchError::process_died("B", "engine exited unexpectedly");
        assert_eq!(err.ledger_message(), "program died");
        assert_eq!(err.to_string(), "B: engine exited unexpectedly");

        let err = MatchError::Orchestration("W rejected play b a1: illegal move".into());
        assert_eq!(err.ledger_message(), "W rejected play b a1: illegal move");
    }
}

//! トーナメント設定。起動時に一度だけ組み立て、以後は変更しない。

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use serde::Deserialize;

use crate::error::{Result, TournamentError};

/// 対局者（名前と起動コマンド）。
///
/// `command` 中の `%SRAND` は対局ごとの乱数シードに置換される。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PlayerConfig {
    pub name: String,
    pub command: String,
}

/// 開局の選び方。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleMode {
    /// 各ラウンドで全開局を両者が先手で1局ずつ
    #[default]
    Iterative,
    /// ラウンドごとに重み付きランダムで1開局
    Random,
}

fn default_result_command() -> String {
    "final_score".to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TournamentConfig {
    pub player1: PlayerConfig,
    pub player2: PlayerConfig,
    pub board_size: u32,
    pub rounds: u64,
    pub out_dir: PathBuf,
    pub openings: PathBuf,
    #[serde(default)]
    pub mode: ScheduleMode,
    /// ランダム開局のシード。未指定なら OS の乱数から決めて台帳ヘッダに残す。
    #[serde(default)]
    pub seed: Option<u64>,
    /// GTP コマンド1つあたりの応答待ち上限（秒）
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// 終局後に各エンジンへ結果を問い合わせるコマンド
    #[serde(default = "default_result_command")]
    pub result_command: String,
    #[serde(default)]
    pub verbose: bool,
}

impl TournamentConfig {
    /// TOML ファイルから読み込む。
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| TournamentError::Configuration(format!("{}: {e}", path.display())))?;
        toml::from_str(&text)
            .map_err(|e| TournamentError::Configuration(format!("{}: {e}", path.display())))
    }

    /// 実行前の整合性チェック。
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(TournamentError::Configuration(msg));
        if self.player1.command.trim().is_empty() || self.player2.command.trim().is_empty() {
            return fail("both players need a command".into());
        }
        if self.player1.name == self.player2.name {
            return fail(format!("player names must differ (both are '{}')", self.player1.name));
        }
        for name in [&self.player1.name, &self.player2.name] {
            if name.is_empty() || name.contains(['/', '\t', '\n']) {
                return fail(format!("invalid player name {name:?}"));
            }
        }
        if self.board_size == 0 {
            return fail("board size must be at least 1".into());
        }
        if self.rounds == 0 {
            return fail("rounds must be at least 1".into());
        }
        if self.openings.as_os_str().is_empty() {
            return fail("an openings file is required".into());
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.out_dir.join(crate::ledger::LEDGER_FILE_NAME)
    }

    /// 台帳ヘッダに書く説明行。
    pub fn info_lines(&self, seed: u64) -> Vec<String> {
        let mut lines = vec![
            format!("p1name: {}", self.player1.name),
            format!("p1cmd: {}", self.player1.command),
            format!("p2name: {}", self.player2.name),
            format!("p2cmd: {}", self.player2.command),
            format!("Boardsize: {}", self.board_size),
            format!("Rounds: {}", self.rounds),
            format!("Openings: {}", self.openings.display()),
            format!("Mode: {}", self.mode.label()),
        ];
        if self.mode == ScheduleMode::Random {
            lines.push(format!("Seed: {seed}"));
        }
        lines.push(format!("Directory: {}", self.out_dir.display()));
        lines.push(format!("Start Date: {}", Local::now().format("%Y-%m-%d %H:%M:%S %Z")));
        lines
    }
}

impl ScheduleMode {
    pub fn label(self) -> &'static str {
        match self {
            ScheduleMode::Iterative => "iterative",
            ScheduleMode::Random => "random",
        }
    }
}

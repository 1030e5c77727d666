//! 1局を最初から台帳記録まで運ぶ。
//!
//! エンジン起動 → 対局 → 結果の正規化（swap 時の色反転）→ 終了処理 → 棋譜保存 → 台帳追記。
//! 対局中の失敗（[`MatchError`]）はここで `ERR=1` の記録に変換し、外へは出さない。
//! 外へ出るのは永続化の失敗だけ。

use std::path::{Path, PathBuf};

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::error::{MatchError, Result, TournamentError};
use crate::ledger::{GameRecord, ResultsLedger};
use crate::result::GameResult;
use crate::schedule::ScheduleEntry;
use crate::transcript::{Color, GameTranscript};

/// コマンドテンプレート中で乱数シードに置き換えられるプレースホルダ。
pub const SEED_PLACEHOLDER: &str = "%SRAND";

/// 起動済みエンジン1本への窓口。
pub trait EngineClient {
    fn label(&self) -> &str;

    /// コマンドを1つ送り、成功応答の本文を返す。
    fn send_command(&mut self, command: &str) -> std::result::Result<String, MatchError>;

    /// エンジンが自己申告した最終結果（未申告なら `?`）。
    fn result(&self) -> GameResult;

    fn set_result(&mut self, result: GameResult);
}

/// エンジンプロセスの起動方法。
pub trait EngineLauncher {
    type Client: EngineClient;

    fn launch(
        &mut self,
        color: Color,
        command: &str,
        log_path: &Path,
    ) -> std::result::Result<Self::Client, MatchError>;
}

/// 2本のエンジンを1局分動かす。
///
/// 成功・失敗にかかわらず、指された手は `transcript` に残す。
pub trait GamePlayer<C: EngineClient> {
    fn play(
        &mut self,
        black: &mut C,
        white: &mut C,
        board_size: u32,
        opening: &str,
        transcript: &mut GameTranscript,
    ) -> std::result::Result<(), MatchError>;
}

pub fn substitute_seed(template: &str, seed: u32) -> String {
    template.replace(SEED_PLACEHOLDER, &seed.to_string())
}

pub fn engine_log_path(out_dir: &Path, player: &str, game_index: u64) -> PathBuf {
    out_dir.join(format!("{player}-{game_index}-stderr.log"))
}

pub fn game_record_path(out_dir: &Path, game_index: u64) -> PathBuf {
    out_dir.join(format!("{game_index:04}.sgf"))
}

fn quit<C: EngineClient>(client: &mut C) {
    // 既に死んでいるプロセスへの quit 失敗は無視する
    if let Err(e) = client.send_command("quit") {
        log::debug!("{}: quit failed: {e}", client.label());
    }
}

pub struct MatchOrchestrator<L, P> {
    launcher: L,
    player: P,
    board_size: u32,
    out_dir: PathBuf,
    seeds: ChaCha8Rng,
}

impl<L, P> MatchOrchestrator<L, P>
where
    L: EngineLauncher,
    P: GamePlayer<L::Client>,
{
    pub fn new(
        launcher: L,
        player: P,
        board_size: u32,
        out_dir: impl Into<PathBuf>,
        seeds: ChaCha8Rng,
    ) -> Self {
        Self {
            launcher,
            player,
            board_size,
            out_dir: out_dir.into(),
            seeds,
        }
    }

    /// 予定された1局を実行し、台帳に記録してからその行を返す。
    pub fn play_match(
        &mut self,
        entry: &ScheduleEntry,
        ledger: &mut ResultsLedger,
    ) -> Result<GameRecord> {
        let index = entry.game_index;
        let mut transcript = GameTranscript::new(self.board_size);

        let outcome = self.run_engines(entry, &mut transcript);
        let (result_black, result_white, failure) = match outcome {
            Ok((black, white)) if transcript.played_swap() => {
                (black.inverted(), white.inverted(), None)
            }
            Ok((black, white)) => (black, white, None),
            Err(e) => {
                log::warn!("game {index}: {e}");
                eprintln!("Error: Game {index}: {e}");
                (GameResult::unknown(), GameResult::unknown(), Some(e))
            }
        };

        let sgf_path = game_record_path(&self.out_dir, index);
        transcript
            .save(&sgf_path, &entry.black.name, &entry.white.name, &result_black, &result_white)
            .map_err(|e| TournamentError::persistence(&sgf_path, e))?;

        let record = GameRecord {
            index,
            round: entry.round,
            opening: entry.opening.clone(),
            black_name: entry.black.name.clone(),
            white_name: entry.white.name.clone(),
            result_black,
            result_white,
            length: transcript.move_count(),
            elapsed_black: transcript.elapsed(Color::Black),
            elapsed_white: transcript.elapsed(Color::White),
            error: failure.is_some(),
            error_message: failure.map(|e| e.ledger_message()).unwrap_or_default(),
        };
        ledger.append(&record)?;
        Ok(record)
    }

    /// 両エンジンを起動して対局させ、終了させる。戻り値は各エンジンの申告結果（色反転前）。
    fn run_engines(
        &mut self,
        entry: &ScheduleEntry,
        transcript: &mut GameTranscript,
    ) -> std::result::Result<(GameResult, GameResult), MatchError> {
        let index = entry.game_index;
        let black_cmd = substitute_seed(&entry.black.command, self.seeds.random());
        let white_cmd = substitute_seed(&entry.white.command, self.seeds.random());
        let black_log = engine_log_path(&self.out_dir, &entry.black.name, index);
        let white_log = engine_log_path(&self.out_dir, &entry.white.name, index);

        let mut black = self.launcher.launch(Color::Black, &black_cmd, &black_log)?;
        let mut white = match self.launcher.launch(Color::White, &white_cmd, &white_log) {
            Ok(client) => client,
            Err(e) => {
                quit(&mut black);
                return Err(e);
            }
        };

        let played =
            self.player.play(&mut black, &mut white, self.board_size, &entry.opening, transcript);
        let results = played.map(|()| (black.result(), white.result()));
        quit(&mut black);
        quit(&mut white);
        results
    }
}

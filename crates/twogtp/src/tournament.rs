//! トーナメント本体。スケジュール・台帳・オーケストレータを束ね、残りの対局を順に消化する。

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::{ScheduleMode, TournamentConfig};
use crate::error::{Result, TournamentError};
use crate::gtp::{GtpGamePlayer, GtpLauncher};
use crate::ledger::{self, ResultsLedger};
use crate::orchestrator::{EngineLauncher, GamePlayer, MatchOrchestrator};
use crate::result::GameResult;
use crate::schedule::{SchedulingPolicy, build_schedule};

/// `run()` の結果。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TournamentSummary {
    /// 今回の実行で最初に指した GAME 番号
    pub first_index: u64,
    /// 次回再開時の GAME 番号
    pub next_index: u64,
    pub total_games: u64,
    pub played: u64,
    pub errors: u64,
    /// 停止要求で途中終了したか
    pub interrupted: bool,
}

impl TournamentSummary {
    pub fn is_complete(&self) -> bool {
        self.next_index >= self.total_games
    }
}

pub struct Tournament<L, P> {
    config: TournamentConfig,
    seed: u64,
    schedule: Box<dyn SchedulingPolicy>,
    ledger: ResultsLedger,
    orchestrator: MatchOrchestrator<L, P>,
    stop: Arc<AtomicBool>,
}

impl Tournament<GtpLauncher, GtpGamePlayer> {
    /// GTP エンジンを実プロセスとして起動するトーナメント。
    pub fn from_config(config: TournamentConfig, restart: bool) -> Result<Self> {
        let launcher = GtpLauncher {
            timeout: config.timeout(),
        };
        let player = GtpGamePlayer::new(config.result_command.clone());
        Self::new(config, launcher, player, restart)
    }
}

impl<L, P> Tournament<L, P>
where
    L: EngineLauncher,
    P: GamePlayer<L::Client>,
{
    /// 設定を検証し、開局を読み、台帳を開く（`restart` なら空にする）。
    ///
    /// 設定・開局の誤りは台帳に触れる前に検出する。
    pub fn new(config: TournamentConfig, launcher: L, player: P, restart: bool) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.out_dir)
            .map_err(|e| TournamentError::persistence(&config.out_dir, e))?;

        let ledger_path = config.ledger_path();
        let recorded = if restart || config.mode != ScheduleMode::Random {
            None
        } else {
            ledger::recorded_seed(&ledger_path)?
        };
        let seed = match (config.seed, recorded) {
            (Some(seed), Some(old)) if seed != old => {
                log::warn!("--seed {seed} differs from the recorded seed {old}");
                seed
            }
            (Some(seed), _) => seed,
            (None, Some(old)) => {
                log::info!("reusing recorded seed {old}");
                old
            }
            (None, None) => rand::rng().random(),
        };

        let schedule = build_schedule(&config, seed)?;
        let mut ledger = ResultsLedger::open(ledger_path, config.info_lines(seed))?;
        if restart {
            log::info!("clearing {}", ledger.path().display());
            ledger.clear()?;
        }

        let orchestrator = MatchOrchestrator::new(
            launcher,
            player,
            config.board_size,
            config.out_dir.clone(),
            ChaCha8Rng::from_rng(&mut rand::rng()),
        );

        Ok(Self {
            config,
            seed,
            schedule,
            ledger,
            orchestrator,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// 外部（Ctrl-C ハンドラなど）と共有する停止フラグ。
    /// 立てると現在の対局を記録した後でループを抜ける。
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// 停止フラグを差し替える。
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn ledger(&self) -> &ResultsLedger {
        &self.ledger
    }

    pub fn total_games(&self) -> u64 {
        self.schedule.total_games()
    }

    /// 台帳の続きから、スケジュールが尽きるまで1局ずつ対局する。
    pub fn run(&mut self) -> Result<TournamentSummary> {
        let first_index = self.ledger.resume_index();
        let total_games = self.schedule.total_games();
        let mut summary = TournamentSummary {
            first_index,
            next_index: first_index,
            total_games,
            ..TournamentSummary::default()
        };
        if first_index >= total_games {
            log::info!("all {total_games} games already recorded");
            return Ok(summary);
        }
        log::info!("playing games {first_index}..{total_games}");

        let start = Instant::now();
        let mut index = first_index;
        while let Some(entry) = self.schedule.entry(index) {
            if self.stop.load(Ordering::Relaxed) {
                summary.interrupted = true;
                break;
            }
            if self.config.verbose {
                println!(
                    "Game {:04}/{total_games} (round {}): {} (B) vs {} (W) [{}]",
                    entry.game_index,
                    entry.round,
                    entry.black.name,
                    entry.white.name,
                    entry.opening
                );
            }

            let record = self.orchestrator.play_match(&entry, &mut self.ledger)?;
            summary.played += 1;
            if record.error {
                summary.errors += 1;
            } else if self.config.verbose {
                println!(
                    "  {} ({} moves, {:.1}s / {:.1}s)",
                    GameResult::canonical(&record.result_black, &record.result_white),
                    record.length,
                    record.elapsed_black.as_secs_f64(),
                    record.elapsed_white.as_secs_f64()
                );
            }
            index = self.ledger.resume_index();
        }
        summary.next_index = self.ledger.resume_index();

        log::info!(
            "{} games played ({} errors) in {:.1}s",
            summary.played,
            summary.errors,
            start.elapsed().as_secs_f64()
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlayerConfig;
    use crate::error::MatchError;
    use crate::orchestrator::EngineClient;
    use crate::transcript::{Color, GameTranscript};
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tempfile::tempdir;

    struct Fake {
        result: GameResult,
    }

    impl EngineClient for Fake {
        fn label(&self) -> &str {
            "fake"
        }

        fn send_command(&mut self, _command: &str) -> std::result::Result<String, MatchError> {
            Ok(String::new())
        }

        fn result(&self) -> GameResult {
            self.result.clone()
        }

        fn set_result(&mut self, result: GameResult) {
            self.result = result;
        }
    }

    /// `fail_on` 番目（起動順）の黒エンジン起動を失敗させる。
    struct Launcher {
        launched: u64,
        fail_on: Option<u64>,
    }

    impl EngineLauncher for Launcher {
        type Client = Fake;

        fn launch(
            &mut self,
            color: Color,
            _command: &str,
            _log_path: &Path,
        ) -> std::result::Result<Fake, MatchError> {
            if color == Color::Black {
                self.launched += 1;
                if self.fail_on == Some(self.launched - 1) {
                    return Err(MatchError::process_died("B", "engine exited unexpectedly"));
                }
            }
            Ok(Fake {
                result: GameResult::unknown(),
            })
        }
    }

    /// 黒が必ず勝つ。
    struct BlackWins;

    impl GamePlayer<Fake> for BlackWins {
        fn play(
            &mut self,
            black: &mut Fake,
            white: &mut Fake,
            _board_size: u32,
            opening: &str,
            transcript: &mut GameTranscript,
        ) -> std::result::Result<(), MatchError> {
            transcript.push(Color::Black, opening, Duration::ZERO);
            transcript.push(Color::White, "resign", Duration::from_millis(500));
            black.set_result(GameResult::parse("B+Resign"));
            white.set_result(GameResult::parse("B+Resign"));
            Ok(())
        }
    }

    fn config(out: &Path, openings: &Path, rounds: u64) -> TournamentConfig {
        TournamentConfig {
            player1: PlayerConfig {
                name: "alpha".into(),
                command: "alpha".into(),
            },
            player2: PlayerConfig {
                name: "beta".into(),
                command: "beta".into(),
            },
            board_size: 5,
            rounds,
            out_dir: out.to_path_buf(),
            openings: openings.to_path_buf(),
            mode: ScheduleMode::Iterative,
            seed: Some(7),
            timeout_secs: None,
            result_command: "final_score".into(),
            verbose: false,
        }
    }

    fn setup(openings: &str) -> (tempfile::TempDir, PathBuf, PathBuf) {
        let td = tempdir().unwrap();
        let file = td.path().join("openings.txt");
        fs::write(&file, openings).unwrap();
        let out = td.path().join("out");
        (td, out, file)
    }

    fn tournament(cfg: TournamentConfig, fail_on: Option<u64>) -> Tournament<Launcher, BlackWins> {
        let launcher = Launcher {
            launched: 0,
            fail_on,
        };
        Tournament::new(cfg, launcher, BlackWins, false).unwrap()
    }

    fn data_rows(out: &Path) -> Vec<String> {
        fs::read_to_string(out.join("results"))
            .unwrap()
            .lines()
            .filter(|l| !l.starts_with('#'))
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn plays_every_scheduled_game_with_alternating_colors() {
        let (_td, out, openings) = setup("a1\nb2\n");
        let mut t = tournament(config(&out, &openings, 1), None);
        let summary = t.run().unwrap();

        assert_eq!(summary.played, 4);
        assert_eq!(summary.errors, 0);
        assert!(summary.is_complete());
        let rows = data_rows(&out);
        assert_eq!(rows.len(), 4);
        assert!(rows[0].starts_with("0000\t0\ta1\talpha\tbeta\tB+Resign\tB+Resign\t1\t"));
        assert!(rows[1].starts_with("0001\t0\ta1\tbeta\talpha\t"));
        assert!(rows[2].starts_with("0002\t0\tb2\talpha\tbeta\t"));
        assert!(rows[3].starts_with("0003\t0\tb2\tbeta\talpha\t"));
        assert!(out.join("0003.sgf").exists());
    }

    #[test]
    fn engine_death_is_recorded_and_the_loop_continues() {
        let (_td, out, openings) = setup("a1\n");
        let mut t = tournament(config(&out, &openings, 2), Some(2));
        let summary = t.run().unwrap();

        assert_eq!(summary.played, 4);
        assert_eq!(summary.errors, 1);
        let rows = data_rows(&out);
        let failed: Vec<&str> = rows[2].split('\t').collect();
        assert_eq!(failed[0], "0002");
        assert_eq!(&failed[5..8], ["?", "?", "0"]);
        assert_eq!(failed[10], "1");
        assert_eq!(failed[11], "program died");
        assert!(rows[3].starts_with("0003\t1\t"));
    }

    #[test]
    fn resumes_where_the_ledger_left_off() {
        let (_td, out, openings) = setup("a1\nb2\n");
        {
            let mut t = tournament(config(&out, &openings, 2), None);
            // 2局だけ指した状態を作る
            let entries: Vec<_> = (0..2).map(|i| t.schedule.entry(i).unwrap()).collect();
            for entry in &entries {
                t.orchestrator.play_match(entry, &mut t.ledger).unwrap();
            }
        }

        let mut t = tournament(config(&out, &openings, 2), None);
        assert_eq!(t.ledger().resume_index(), 2);
        let summary = t.run().unwrap();
        assert_eq!(summary.first_index, 2);
        assert_eq!(summary.played, 6);

        let indices: Vec<String> =
            data_rows(&out).iter().map(|r| r[..4].to_string()).collect();
        let expected: Vec<String> = (0..8).map(|i| format!("{i:04}")).collect();
        assert_eq!(indices, expected);

        // 全局記録済みなら何もしない
        let summary = tournament(config(&out, &openings, 2), None).run().unwrap();
        assert_eq!(summary.played, 0);
        assert!(summary.is_complete());
    }

    #[test]
    fn stop_flag_halts_before_the_next_game() {
        let (_td, out, openings) = setup("a1\n");
        let mut t = tournament(config(&out, &openings, 3), None);
        t.stop_flag().store(true, Ordering::Relaxed);
        let summary = t.run().unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.played, 0);
        assert_eq!(summary.next_index, 0);
    }

    #[test]
    fn missing_openings_fail_before_touching_the_ledger() {
        let (td, out, _) = setup("a1\n");
        let cfg = config(&out, &td.path().join("nope.txt"), 1);
        let launcher = Launcher {
            launched: 0,
            fail_on: None,
        };
        let err = Tournament::new(cfg, launcher, BlackWins, false).err().unwrap();
        assert!(matches!(err, TournamentError::Configuration(_)));
        assert!(!out.join("results").exists());
    }

    #[test]
    fn restart_clears_previous_results() {
        let (_td, out, openings) = setup("a1\n");
        tournament(config(&out, &openings, 1), None).run().unwrap();
        assert_eq!(data_rows(&out).len(), 2);

        let launcher = Launcher {
            launched: 0,
            fail_on: None,
        };
        let mut t = Tournament::new(config(&out, &openings, 1), launcher, BlackWins, true).unwrap();
        assert_eq!(t.ledger().resume_index(), 0);
        assert_eq!(t.run().unwrap().played, 2);
        assert_eq!(data_rows(&out).len(), 2);
    }

    #[test]
    fn random_mode_reuses_the_recorded_seed() {
        let (_td, out, openings) = setup("1.0 a1\n1.0 b2\n1.0 c3\n");
        let mut cfg = config(&out, &openings, 6);
        cfg.mode = ScheduleMode::Random;
        cfg.seed = Some(99);
        let first = tournament(cfg.clone(), None);
        let expected: Vec<String> =
            (0..6).map(|i| first.schedule.entry(i).unwrap().opening).collect();
        drop(first);

        cfg.seed = None;
        let resumed = tournament(cfg, None);
        assert_eq!(resumed.seed(), 99);
        let openings: Vec<String> =
            (0..6).map(|i| resumed.schedule.entry(i).unwrap().opening).collect();
        assert_eq!(openings, expected);
    }
}

use std::time::{Duration, Instant};

use crate::error::MatchError;
use crate::orchestrator::{EngineClient, GamePlayer};
use crate::result::GameResult;
use crate::transcript::{Color, GameTranscript, RESIGN_MOVE};

/// GTP コマンドで2本のエンジンに1局指させる。
///
/// 1. 両者に `boardsize` / `clear_board`
/// 2. 開局の手を黒から交互に `play` で両者へ
/// 3. 手番側に `genmove`、返ってきた手を相手側に `play`。`resign` で終局
/// 4. 終局後、両者に `result_command` を送り、各自の申告結果を記録する
pub struct GtpGamePlayer {
    pub result_command: String,
    /// 1局の上限手数。`None` なら `size * size + 2`。
    pub max_moves: Option<usize>,
}

impl GtpGamePlayer {
    pub fn new(result_command: impl Into<String>) -> Self {
        Self {
            result_command: result_command.into(),
            max_moves: None,
        }
    }

    fn move_limit(&self, board_size: u32) -> usize {
        self.max_moves.unwrap_or_else(|| (board_size as usize).pow(2) + 2)
    }

    /// 終局後に結果を問い合わせる。GTP エラー応答なら観測した投了結果で代用する。
    fn collect_result<C: EngineClient>(
        &self,
        client: &mut C,
        observed: &GameResult,
    ) -> Result<(), MatchError> {
        let result = match client.send_command(&self.result_command) {
            Ok(text) => GameResult::parse(&text),
            Err(MatchError::Orchestration(msg)) => {
                log::debug!("{msg}; using observed result {observed}");
                observed.clone()
            }
            Err(e) => return Err(e),
        };
        client.set_result(result);
        Ok(())
    }
}

impl<C: EngineClient> GamePlayer<C> for GtpGamePlayer {
    fn play(
        &mut self,
        black: &mut C,
        white: &mut C,
        board_size: u32,
        opening: &str,
        transcript: &mut GameTranscript,
    ) -> Result<(), MatchError> {
        for client in [&mut *black, &mut *white] {
            client.send_command(&format!("boardsize {board_size}"))?;
            client.send_command("clear_board")?;
        }

        let mut to_play = Color::Black;
        for mv in opening.split_whitespace() {
            let mv = mv.to_ascii_lowercase();
            let cmd = format!("play {} {mv}", to_play.gtp());
            black.send_command(&cmd)?;
            white.send_command(&cmd)?;
            transcript.push(to_play, &mv, Duration::ZERO);
            to_play = to_play.opposite();
        }

        let limit = self.move_limit(board_size);
        let loser = loop {
            if transcript.length() >= limit {
                return Err(MatchError::Orchestration(format!(
                    "game exceeded {limit} moves without a result"
                )));
            }
            let (mover, other) = match to_play {
                Color::Black => (&mut *black, &mut *white),
                Color::White => (&mut *white, &mut *black),
            };
            let start = Instant::now();
            let reply = mover.send_command(&format!("genmove {}", to_play.gtp()))?;
            let elapsed = start.elapsed();
            let mv = reply.trim().to_ascii_lowercase();
            if mv.is_empty() || mv.contains(char::is_whitespace) {
                return Err(MatchError::Orchestration(format!(
                    "{}: invalid genmove response {reply:?}",
                    mover.label()
                )));
            }
            transcript.push(to_play, &mv, elapsed);
            if mv == RESIGN_MOVE {
                break to_play;
            }
            other.send_command(&format!("play {} {mv}", to_play.gtp()))?;
            to_play = to_play.opposite();
        };

        let observed = GameResult::win(loser.opposite().into(), "Resign");
        self.collect_result(black, &observed)?;
        self.collect_result(white, &observed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// 送られたコマンドを記録し、genmove には用意した手を順に返すクライアント。
    struct Scripted {
        label: &'static str,
        genmoves: VecDeque<&'static str>,
        final_score: Option<&'static str>,
        reject: Option<&'static str>,
        die_on: Option<&'static str>,
        sent: Vec<String>,
        result: GameResult,
    }

    impl Scripted {
        fn new(label: &'static str, genmoves: &[&'static str]) -> Self {
            Self {
                label,
                genmoves: genmoves.iter().copied().collect(),
                final_score: None,
                reject: None,
                die_on: None,
                sent: Vec::new(),
                result: GameResult::unknown(),
            }
        }
    }

    impl EngineClient for Scripted {
        fn label(&self) -> &str {
            self.label
        }

        fn send_command(&mut self, command: &str) -> Result<String, MatchError> {
            self.sent.push(command.to_string());
            if self.die_on.is_some_and(|c| command.starts_with(c)) {
                return Err(MatchError::process_died(self.label, "engine exited unexpectedly"));
            }
            if self.reject.is_some_and(|c| command.starts_with(c)) {
                return Err(MatchError::Orchestration(format!("{}: illegal move", self.label)));
            }
            if command.starts_with("genmove") {
                return Ok(self.genmoves.pop_front().unwrap_or("resign").to_string());
            }
            if command == "final_score" {
                return match self.final_score {
                    Some(score) => Ok(score.to_string()),
                    None => Err(MatchError::Orchestration("unknown command".into())),
                };
            }
            Ok(String::new())
        }

        fn result(&self) -> GameResult {
            self.result.clone()
        }

        fn set_result(&mut self, result: GameResult) {
            self.result = result;
        }
    }

    #[test]
    fn plays_opening_then_alternates_until_resign() {
        let mut black = Scripted::new("B", &["c3", "a2"]);
        let mut white = Scripted::new("W", &["b2", "resign"]);
        black.final_score = Some("B+Resign");
        let mut transcript = GameTranscript::new(5);
        let mut player = GtpGamePlayer::new("final_score");

        player.play(&mut black, &mut white, 5, "A1 swap", &mut transcript).unwrap();

        assert!(transcript.played_swap());
        let moves: Vec<&str> = transcript.moves().iter().map(|m| m.mv.as_str()).collect();
        assert_eq!(moves, vec!["a1", "swap", "c3", "b2", "a2", "resign"]);
        assert_eq!(transcript.move_count(), 5);

        assert_eq!(
            black.sent,
            vec![
                "boardsize 5",
                "clear_board",
                "play b a1",
                "play w swap",
                "genmove b",
                "play w b2",
                "genmove b",
                "final_score",
            ]
        );
        assert_eq!(white.sent[..4], ["boardsize 5", "clear_board", "play b a1", "play w swap"]);
        assert_eq!(
            white.sent[4..],
            ["play b c3", "genmove w", "play b a2", "genmove w", "final_score"]
        );

        // 黒は申告、白は final_score 非対応なので投了から推定
        assert_eq!(black.result.to_string(), "B+Resign");
        assert_eq!(white.result.to_string(), "B+Resign");
    }

    #[test]
    fn rejected_play_is_an_orchestration_error() {
        let mut black = Scripted::new("B", &["c3"]);
        let mut white = Scripted::new("W", &[]);
        white.reject = Some("play b c3");
        let mut transcript = GameTranscript::new(5);

        let err = GtpGamePlayer::new("final_score")
            .play(&mut black, &mut white, 5, "", &mut transcript)
            .unwrap_err();
        assert!(matches!(err, MatchError::Orchestration(_)));
        assert_eq!(transcript.length(), 1);
    }

    #[test]
    fn engine_death_propagates_even_when_querying_result() {
        let mut black = Scripted::new("B", &["resign"]);
        let mut white = Scripted::new("W", &[]);
        white.die_on = Some("final_score");
        let mut transcript = GameTranscript::new(5);

        let err = GtpGamePlayer::new("final_score")
            .play(&mut black, &mut white, 5, "", &mut transcript)
            .unwrap_err();
        assert!(matches!(err, MatchError::ProcessDied { .. }));
        assert_eq!(black.result.to_string(), "W+Resign");
    }

    #[test]
    fn runaway_game_is_cut_off() {
        let mut black = Scripted::new("B", &["a1"; 20]);
        let mut white = Scripted::new("W", &["b1"; 20]);
        let mut transcript = GameTranscript::new(2);

        let err = GtpGamePlayer::new("final_score")
            .play(&mut black, &mut white, 2, "", &mut transcript)
            .unwrap_err();
        assert_eq!(err, MatchError::Orchestration("game exceeded 6 moves without a result".into()));
        assert_eq!(transcript.length(), 6);
    }
}

//! 1局分の指し手記録と SGF 出力。
//!
//! 対局が途中で失敗しても、それまでの手はここに残るので部分棋譜として保存できる。

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::result::{GameResult, Winner};

pub const SWAP_MOVE: &str = "swap";
pub const RESIGN_MOVE: &str = "resign";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    Black,
    White,
}

impl Color {
    pub fn opposite(self) -> Self {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }

    /// GTP の色引数（`b` / `w`）
    pub fn gtp(self) -> &'static str {
        match self {
            Color::Black => "b",
            Color::White => "w",
        }
    }

    /// SGF のプロパティ名、エンジンログのラベル
    pub fn label(self) -> &'static str {
        match self {
            Color::Black => "B",
            Color::White => "W",
        }
    }

    fn slot(self) -> usize {
        match self {
            Color::Black => 0,
            Color::White => 1,
        }
    }
}

impl From<Color> for Winner {
    fn from(color: Color) -> Self {
        match color {
            Color::Black => Winner::Black,
            Color::White => Winner::White,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscriptMove {
    pub color: Color,
    pub mv: String,
    pub elapsed: Duration,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GameTranscript {
    board_size: u32,
    moves: Vec<TranscriptMove>,
    swapped: bool,
    elapsed: [Duration; 2],
}

impl GameTranscript {
    pub fn new(board_size: u32) -> Self {
        Self {
            board_size,
            ..Self::default()
        }
    }

    pub fn push(&mut self, color: Color, mv: &str, elapsed: Duration) {
        if mv.starts_with(SWAP_MOVE) {
            self.swapped = true;
        }
        self.elapsed[color.slot()] += elapsed;
        self.moves.push(TranscriptMove {
            color,
            mv: mv.to_string(),
            elapsed,
        });
    }

    pub fn moves(&self) -> &[TranscriptMove] {
        &self.moves
    }

    pub fn played_swap(&self) -> bool {
        self.swapped
    }

    /// 記録された手数（終局の `resign` を含む）
    pub fn length(&self) -> usize {
        self.moves.len()
    }

    /// 台帳に書く手数。終局の `resign` は手として数えない。
    pub fn move_count(&self) -> u32 {
        let resigned = self.moves.last().is_some_and(|m| m.mv == RESIGN_MOVE);
        (self.moves.len() - usize::from(resigned)) as u32
    }

    pub fn elapsed(&self, color: Color) -> Duration {
        self.elapsed[color.slot()]
    }

    pub fn to_sgf(
        &self,
        black_name: &str,
        white_name: &str,
        result_black: &GameResult,
        result_white: &GameResult,
    ) -> String {
        let result = GameResult::canonical(result_black, result_white);
        let mut sgf = String::from("(;FF[4]AP[twogtp]");
        let _ = write!(
            sgf,
            "SZ[{}]PB[{}]PW[{}]RE[{}]GC[RES_B: {} RES_W: {}]",
            self.board_size,
            escape(black_name),
            escape(white_name),
            escape(&result.to_string()),
            escape(&result_black.to_string()),
            escape(&result_white.to_string()),
        );
        for m in &self.moves {
            let _ = write!(sgf, "\n;{}[{}]", m.color.label(), escape(&m.mv));
        }
        sgf.push_str(")\n");
        sgf
    }

    pub fn save(
        &self,
        path: &Path,
        black_name: &str,
        white_name: &str,
        result_black: &GameResult,
        result_white: &GameResult,
    ) -> std::io::Result<()> {
        fs::write(path, self.to_sgf(black_name, white_name, result_black, result_white))
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace(']', "\\]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_swap_time_and_length() {
        let mut t = GameTranscript::new(5);
        t.push(Color::Black, "c3", Duration::ZERO);
        t.push(Color::White, "swap", Duration::from_millis(300));
        t.push(Color::Black, "a1", Duration::from_millis(1200));
        t.push(Color::White, "resign", Duration::from_millis(100));

        assert!(t.played_swap());
        assert_eq!(t.length(), 4);
        assert_eq!(t.move_count(), 3);
        assert_eq!(t.elapsed(Color::Black), Duration::from_millis(1200));
        assert_eq!(t.elapsed(Color::White), Duration::from_millis(400));
    }

    #[test]
    fn swap_variants_mark_the_swap() {
        let mut t = GameTranscript::new(5);
        t.push(Color::Black, "c3", Duration::ZERO);
        assert!(!t.played_swap());
        t.push(Color::White, "swap-pieces", Duration::ZERO);
        assert!(t.played_swap());
    }

    #[test]
    fn partial_transcript_counts_every_move() {
        let mut t = GameTranscript::new(5);
        assert_eq!(t.move_count(), 0);
        t.push(Color::Black, "c3", Duration::ZERO);
        assert_eq!(t.move_count(), 1);
        assert!(!t.played_swap());
    }

    #[test]
    fn sgf_contains_players_result_and_moves() {
        let mut t = GameTranscript::new(7);
        t.push(Color::Black, "d4", Duration::ZERO);
        t.push(Color::White, "resign", Duration::ZERO);
        let b = GameResult::parse("B+Resign");
        let sgf = t.to_sgf("alpha", "be]ta", &b, &b);
        assert_eq!(
            sgf,
            "(;FF[4]AP[twogtp]SZ[7]PB[alpha]PW[be\\]ta]RE[B+Resign]GC[RES_B: B+Resign RES_W: B+Resign]\n;B[d4]\n;W[resign])\n"
        );

        let w = GameResult::parse("W+Resign");
        assert!(t.to_sgf("alpha", "beta", &b, &w).contains("RE[?]"));
    }
}

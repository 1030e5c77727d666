//! 対局結果文字列（`B+Resign`, `W+12.5`, `?` など）のタグ付き表現。

use std::fmt;

/// 勝者の色。判定できない／エンジンが独自形式で返した場合は `Unknown`。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Winner {
    Black,
    White,
    Unknown,
}

impl Winner {
    pub fn opposite(self) -> Self {
        match self {
            Winner::Black => Winner::White,
            Winner::White => Winner::Black,
            Winner::Unknown => Winner::Unknown,
        }
    }
}

/// エンジンが報告した結果。
///
/// `winner` が `Unknown` の場合、`reason` には受け取った生の文字列をそのまま保持する
/// （空文字列は `?` として表示される）。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GameResult {
    pub winner: Winner,
    pub reason: String,
}

impl GameResult {
    pub fn unknown() -> Self {
        Self {
            winner: Winner::Unknown,
            reason: String::new(),
        }
    }

    pub fn win(winner: Winner, reason: impl Into<String>) -> Self {
        Self {
            winner,
            reason: reason.into(),
        }
    }

    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Some(reason) = text.strip_prefix("B+") {
            return Self::win(Winner::Black, reason);
        }
        if let Some(reason) = text.strip_prefix("W+") {
            return Self::win(Winner::White, reason);
        }
        if text.is_empty() || text == "?" {
            return Self::unknown();
        }
        Self {
            winner: Winner::Unknown,
            reason: text.to_string(),
        }
    }

    /// 色を入れ替えた結果。swap が打たれた対局で、元の名前付きプレイヤー視点に戻すのに使う。
    pub fn inverted(&self) -> Self {
        Self {
            winner: self.winner.opposite(),
            reason: self.reason.clone(),
        }
    }

    /// 両エンジンの申告が一致すればその結果、食い違えば `?`。
    pub fn canonical(black: &GameResult, white: &GameResult) -> GameResult {
        if black == white {
            black.clone()
        } else {
            GameResult::unknown()
        }
    }
}

impl Default for GameResult {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.winner {
            Winner::Black => write!(f, "B+{}", self.reason),
            Winner::White => write!(f, "W+{}", self.reason),
            Winner::Unknown if self.reason.is_empty() => f.write_str("?"),
            Winner::Unknown => f.write_str(&self.reason),
        }
    }
}

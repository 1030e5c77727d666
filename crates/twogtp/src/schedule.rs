//! 対局スケジュール。
//!
//! どの局を何番目に指すかは `(設定, GAME 番号)` だけで決まる純粋関数にしてあり、
//! 台帳から得た再開位置からいつでも同じ並びを再現できる。

use std::fs;
use std::path::Path;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::{PlayerConfig, ScheduleMode, TournamentConfig};
use crate::error::{Result, TournamentError};

/// 1局分の予定。永続化はせず、毎回設定から計算し直す。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub game_index: u64,
    pub round: u64,
    pub black: PlayerConfig,
    pub white: PlayerConfig,
    pub opening: String,
}

pub trait SchedulingPolicy {
    /// 予定されている総局数。
    fn total_games(&self) -> u64;

    /// `index` 番目の局。範囲外なら `None`（終了）。
    fn entry(&self, index: u64) -> Option<ScheduleEntry>;
}

/// 偶数番は player1 が先手、奇数番は player2 が先手。
fn assign_colors(players: &[PlayerConfig; 2], index: u64) -> (PlayerConfig, PlayerConfig) {
    let [p1, p2] = players;
    if index % 2 == 0 {
        (p1.clone(), p2.clone())
    } else {
        (p2.clone(), p1.clone())
    }
}

// ---------------------------------------------------------------------------
// 開局の読み込み
// ---------------------------------------------------------------------------

fn read_opening_lines(path: &Path) -> Result<Vec<(usize, String)>> {
    let text = fs::read_to_string(path).map_err(|e| {
        TournamentError::Configuration(format!("cannot read openings {}: {e}", path.display()))
    })?;
    let lines: Vec<(usize, String)> = text
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim().to_string()))
        .filter(|(_, line)| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return Err(TournamentError::Configuration(format!(
            "no openings found in {}",
            path.display()
        )));
    }
    Ok(lines)
}

/// 1行1開局のファイルを読む。
pub fn load_openings(path: &Path) -> Result<Vec<String>> {
    Ok(read_opening_lines(path)?.into_iter().map(|(_, line)| line).collect())
}

/// 重み付き開局表。`cumulative` は狭義単調増加で、最後の値が総重み。
#[derive(Clone, Debug, PartialEq)]
pub struct WeightedOpenings {
    cumulative: Vec<f64>,
    moves: Vec<String>,
}

impl WeightedOpenings {
    pub fn new(entries: Vec<(f64, String)>) -> Result<Self> {
        if entries.is_empty() {
            return Err(TournamentError::Configuration("no weighted openings".into()));
        }
        let mut cumulative = Vec::with_capacity(entries.len());
        let mut moves = Vec::with_capacity(entries.len());
        let mut sum = 0.0;
        for (weight, mv) in entries {
            if !weight.is_finite() || weight <= 0.0 {
                return Err(TournamentError::Configuration(format!(
                    "opening weight must be positive, got {weight} for {mv:?}"
                )));
            }
            sum += weight;
            cumulative.push(sum);
            moves.push(mv);
        }
        Ok(Self { cumulative, moves })
    }

    /// `<weight> <moves...>` 形式のファイルを読む。
    pub fn load(path: &Path) -> Result<Self> {
        let mut entries = Vec::new();
        for (lineno, line) in read_opening_lines(path)? {
            let (weight, moves) =
                line.split_once(char::is_whitespace).unwrap_or((line.as_str(), ""));
            let weight: f64 = weight.parse().map_err(|_| {
                TournamentError::Configuration(format!(
                    "{} line {lineno}: invalid weight {weight:?}",
                    path.display()
                ))
            })?;
            if !weight.is_finite() || weight <= 0.0 {
                return Err(TournamentError::Configuration(format!(
                    "{} line {lineno}: weight must be positive",
                    path.display()
                )));
            }
            entries.push((weight, moves.trim().to_string()));
        }
        Self::new(entries)
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    pub fn moves(&self, idx: usize) -> &str {
        &self.moves[idx]
    }

    /// `sample` を初めて超える累積重みを持つ開局の位置。`[0, total)` の外なら `None`。
    pub fn pick_opening(&self, sample: f64) -> Option<usize> {
        if sample.is_nan() || sample < 0.0 {
            return None;
        }
        self.cumulative.iter().position(|&w| sample < w)
    }

    /// 乱数源から1つ選ぶ。
    pub fn draw(&self, rng: &mut impl Rng) -> usize {
        let sample = rng.random::<f64>() * self.total_weight();
        // 浮動小数の丸めで sample == total になった場合は末尾を返す
        self.pick_opening(sample).unwrap_or(self.len() - 1)
    }
}

// ---------------------------------------------------------------------------
// スケジュール本体
// ---------------------------------------------------------------------------

/// 各ラウンドで全開局を両者が1回ずつ先手で指す。
pub struct IterativeSchedule {
    players: [PlayerConfig; 2],
    openings: Vec<String>,
    total_games: u64,
}

impl IterativeSchedule {
    pub fn new(players: [PlayerConfig; 2], openings: Vec<String>, rounds: u64) -> Result<Self> {
        if openings.is_empty() {
            return Err(TournamentError::Configuration(
                "iterative schedule needs at least one opening".into(),
            ));
        }
        let games_per_round = 2 * openings.len() as u64;
        let total_games = rounds.checked_mul(games_per_round).ok_or_else(|| {
            TournamentError::Configuration(format!(
                "{rounds} rounds of {games_per_round} games is too many"
            ))
        })?;
        Ok(Self {
            players,
            openings,
            total_games,
        })
    }

    pub fn games_per_round(&self) -> u64 {
        2 * self.openings.len() as u64
    }
}

impl SchedulingPolicy for IterativeSchedule {
    fn total_games(&self) -> u64 {
        self.total_games
    }

    fn entry(&self, index: u64) -> Option<ScheduleEntry> {
        if index >= self.total_games() {
            return None;
        }
        let per_round = self.games_per_round();
        let round = index / per_round;
        let opening_idx = ((index % per_round) / 2) as usize;
        let (black, white) = assign_colors(&self.players, index);
        Some(ScheduleEntry {
            game_index: index,
            round,
            black,
            white,
            opening: self.openings[opening_idx].clone(),
        })
    }
}

/// 1ラウンド1局、重み付きランダムで開局を選ぶ。
///
/// 各局の乱数は `seed` の ChaCha8 ストリーム `index` から引くため、
/// 同じシードなら途中再開しても同じ開局列になる。
pub struct RandomSchedule {
    players: [PlayerConfig; 2],
    openings: WeightedOpenings,
    rounds: u64,
    seed: u64,
}

impl RandomSchedule {
    pub fn new(
        players: [PlayerConfig; 2],
        openings: WeightedOpenings,
        rounds: u64,
        seed: u64,
    ) -> Self {
        Self {
            players,
            openings,
            rounds,
            seed,
        }
    }

    pub fn rng_for(&self, index: u64) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(index);
        rng
    }
}

impl SchedulingPolicy for RandomSchedule {
    fn total_games(&self) -> u64 {
        self.rounds
    }

    fn entry(&self, index: u64) -> Option<ScheduleEntry> {
        if index >= self.rounds {
            return None;
        }
        let pick = self.openings.draw(&mut self.rng_for(index));
        let (black, white) = assign_colors(&self.players, index);
        Some(ScheduleEntry {
            game_index: index,
            round: index,
            black,
            white,
            opening: self.openings.moves(pick).to_string(),
        })
    }
}

/// 設定に従ってスケジュールを組み立てる。開局が読めなければ対局開始前に失敗する。
pub fn build_schedule(config: &TournamentConfig, seed: u64) -> Result<Box<dyn SchedulingPolicy>> {
    let players = [config.player1.clone(), config.player2.clone()];
    let schedule: Box<dyn SchedulingPolicy> = match config.mode {
        ScheduleMode::Iterative => Box::new(IterativeSchedule::new(
            players,
            load_openings(&config.openings)?,
            config.rounds,
        )?),
        ScheduleMode::Random => Box::new(RandomSchedule::new(
            players,
            WeightedOpenings::load(&config.openings)?,
            config.rounds,
            seed,
        )),
    };
    Ok(schedule)
}

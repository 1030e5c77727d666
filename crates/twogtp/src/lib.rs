//! GTP エンジン2本の対局トーナメント
//!
//! 2つの GTP エンジンを開局集に沿って先後交互に対局させ、結果を追記専用の台帳へ
//! 1局ずつ記録します。台帳が対局の進捗そのものなので、途中で止めても次回の起動で
//! 続きから再開できます。
//!
//! - [`schedule`]: 何局目にどの開局・どちらの先手で指すか
//! - [`orchestrator`]: 1局を起動から台帳記録まで運ぶ
//! - [`ledger`]: 結果台帳の読み書きと再開位置の復元
//! - [`gtp`]: エンジンプロセスとの GTP 通信

pub mod config;
pub mod error;
pub mod gtp;
pub mod ledger;
pub mod orchestrator;
pub mod result;
pub mod schedule;
pub mod tournament;
pub mod transcript;

pub use config::{PlayerConfig, ScheduleMode, TournamentConfig};
pub use error::{MatchError, TournamentError};
pub use ledger::{GameRecord, ResultsLedger};
pub use orchestrator::{EngineClient, EngineLauncher, GamePlayer, MatchOrchestrator};
pub use result::{GameResult, Winner};
pub use schedule::{IterativeSchedule, RandomSchedule, ScheduleEntry, SchedulingPolicy};
pub use tournament::{Tournament, TournamentSummary};
pub use transcript::{Color, GameTranscript};

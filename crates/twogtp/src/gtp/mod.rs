//! GTP (Go Text Protocol) でエンジンを動かす実装。

pub mod engine;
pub mod player;

pub use engine::{parse_status_line, GtpEngine, GtpLauncher};
pub use player::GtpGamePlayer;

//! GTP エンジン2本の対局トーナメント。
//!
//! 結果は `<dir>/results` に1局1行で追記される。同じ `--dir` で再実行すると
//! 記録済みの続きから再開する（`--restart` で最初からやり直し）。
//!
//! # 使用例
//!
//! ```shell
//! cargo run -p twogtp --release -- \
//!   --player1 "target/release/hexbot --seed %SRAND" --name1 hexbot \
//!   --player2 "/opt/mohex/mohex" --name2 mohex \
//!   --size 11 --rounds 10 --openings openings/11x11.txt \
//!   --dir "runs/$(date +%Y%m%d_%H%M%S)-hexbot-vs-mohex"
//! ```
//!
//! TOML 設定ファイルでも指定できる（コマンドラインの値が優先）:
//! ```shell
//! cargo run -p twogtp --release -- --config runs/hexbot-vs-mohex.toml --verbose
//! ```
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use anyhow::{Context, Result, bail};
use clap::Parser as _;

use twogtp::{PlayerConfig, ScheduleMode, Tournament, TournamentConfig};

#[derive(clap::Parser, Debug)]
#[command(about = "resumable head-to-head tournament between two GTP engines")]
struct Cli {
    /// Command line of the first engine (`%SRAND` is replaced by a per-game seed)
    #[arg(long)]
    player1: Option<String>,

    /// Command line of the second engine
    #[arg(long)]
    player2: Option<String>,

    /// Name of the first engine (defaults to the program's file name)
    #[arg(long)]
    name1: Option<String>,

    /// Name of the second engine
    #[arg(long)]
    name2: Option<String>,

    /// Board size
    #[arg(long)]
    size: Option<u32>,

    /// Number of rounds
    #[arg(long)]
    rounds: Option<u64>,

    /// Output directory (ledger, SGF files, engine logs)
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Openings file (one per line; `<weight> <moves>` in random mode)
    #[arg(long)]
    openings: Option<PathBuf>,

    /// How openings are scheduled
    #[arg(long, value_enum)]
    mode: Option<ScheduleMode>,

    /// Seed for random opening selection
    #[arg(long)]
    seed: Option<u64>,

    /// Per-command response timeout in seconds (expiry counts as engine death)
    #[arg(long)]
    timeout: Option<u64>,

    /// GTP command asked to each engine for the final result
    #[arg(long)]
    result_command: Option<String>,

    /// Discard existing results and start over from game 0
    #[arg(long)]
    restart: bool,

    /// Print per-game progress and log GTP traffic
    #[arg(long)]
    verbose: bool,

    /// TOML file with tournament settings
    #[arg(long)]
    config: Option<PathBuf>,
}

/// コマンドの先頭（プログラムパス）のファイル名。
fn default_name(command: &str, fallback: &str) -> String {
    command
        .split_whitespace()
        .next()
        .and_then(|program| Path::new(program).file_stem())
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| fallback.to_string())
}

fn player(command: String, name: Option<String>, fallback: &str) -> PlayerConfig {
    PlayerConfig {
        name: name.unwrap_or_else(|| default_name(&command, fallback)),
        command,
    }
}

/// 設定ファイル（あれば）にコマンドラインの値を上書きして最終設定を作る。
fn build_config(cli: Cli) -> Result<(TournamentConfig, bool)> {
    let file = match &cli.config {
        Some(path) => Some(
            TournamentConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
        ),
        None => None,
    };

    let config = match file {
        Some(mut c) => {
            if let Some(cmd) = cli.player1 {
                c.player1 = player(cmd, cli.name1, "player1");
            } else if let Some(name) = cli.name1 {
                c.player1.name = name;
            }
            if let Some(cmd) = cli.player2 {
                c.player2 = player(cmd, cli.name2, "player2");
            } else if let Some(name) = cli.name2 {
                c.player2.name = name;
            }
            c.board_size = cli.size.unwrap_or(c.board_size);
            c.rounds = cli.rounds.unwrap_or(c.rounds);
            c.out_dir = cli.dir.unwrap_or(c.out_dir);
            c.openings = cli.openings.unwrap_or(c.openings);
            c.mode = cli.mode.unwrap_or(c.mode);
            c.seed = cli.seed.or(c.seed);
            c.timeout_secs = cli.timeout.or(c.timeout_secs);
            c.result_command = cli.result_command.unwrap_or(c.result_command);
            c.verbose |= cli.verbose;
            c
        }
        None => {
            let (Some(p1), Some(p2)) = (cli.player1, cli.player2) else {
                bail!("--player1 and --player2 are required (or use --config)");
            };
            let Some(board_size) = cli.size else {
                bail!("--size is required");
            };
            let Some(rounds) = cli.rounds else {
                bail!("--rounds is required");
            };
            let Some(out_dir) = cli.dir else {
                bail!("--dir is required");
            };
            let Some(openings) = cli.openings else {
                bail!("--openings is required");
            };
            TournamentConfig {
                player1: player(p1, cli.name1, "player1"),
                player2: player(p2, cli.name2, "player2"),
                board_size,
                rounds,
                out_dir,
                openings,
                mode: cli.mode.unwrap_or_default(),
                seed: cli.seed,
                timeout_secs: cli.timeout,
                result_command: cli.result_command.unwrap_or_else(|| "final_score".to_string()),
                verbose: cli.verbose,
            }
        }
    };
    Ok((config, cli.restart))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();

    let (config, restart) = build_config(cli)?;
    let out_dir = config.out_dir.clone();
    let mut tournament =
        Tournament::from_config(config, restart).context("failed to set up tournament")?;

    // Ctrl-C ハンドラ: 対局中の1局は最後まで指して記録する
    {
        let stop = tournament.stop_flag();
        ctrlc::set_handler(move || {
            eprintln!("\nStopping after the current game...");
            stop.store(true, Ordering::Relaxed);
        })
        .ok();
    }

    let summary = tournament.run().context("tournament aborted")?;

    println!();
    println!("=== Tournament {} ===", if summary.is_complete() { "Complete" } else { "Stopped" });
    println!(
        "Played: {} games ({} errors), next game {}/{}",
        summary.played, summary.errors, summary.next_index, summary.total_games
    );
    println!("Output: {}", out_dir.display());
    println!("=========================");
    Ok(())
}

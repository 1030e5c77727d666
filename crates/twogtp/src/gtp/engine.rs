use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::error::MatchError;
use crate::orchestrator::{EngineClient, EngineLauncher};
use crate::result::GameResult;
use crate::transcript::Color;

pub const ENGINE_QUIT_TIMEOUT: Duration = Duration::from_millis(300);
pub const ENGINE_QUIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// GTP を話すエンジンプロセス1本。
///
/// stdout は別スレッドで行単位に読み、チャネル経由で受け取る。
/// stderr は対局ごとのログファイルへ流す。
pub struct GtpEngine {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    rx: Receiver<String>,
    label: String,
    timeout: Option<Duration>,
    result: GameResult,
}

impl GtpEngine {
    /// `command` を空白で分割して起動する（先頭がプログラム、残りが引数）。
    pub fn spawn(
        label: &str,
        command: &str,
        log_path: &Path,
        timeout: Option<Duration>,
    ) -> Result<Self, MatchError> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| MatchError::process_died(label, "empty engine command"))?;
        let stderr = File::create(log_path).map_err(|e| {
            MatchError::process_died(label, format!("cannot create {}: {e}", log_path.display()))
        })?;
        let mut cmd = Command::new(program);
        cmd.args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::from(stderr));
        // 端末の Ctrl-C（プロセスグループ宛ての SIGINT）がエンジンに届かないよう別グループにする
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        let mut child = cmd.spawn().map_err(|e| {
            MatchError::process_died(label, format!("failed to spawn {command:?}: {e}"))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MatchError::process_died(label, "no stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MatchError::process_died(label, "no stdout"))?;

        let (tx, rx) = mpsc::channel::<String>();
        std::thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                match line {
                    Ok(l) => {
                        if tx.send(l).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        log::debug!("{label}: started {command:?} (stderr -> {})", log_path.display());
        Ok(Self {
            child,
            stdin: BufWriter::new(stdin),
            rx,
            label: label.to_string(),
            timeout,
            result: GameResult::unknown(),
        })
    }

    fn write_line(&mut self, msg: &str) -> Result<(), MatchError> {
        log::debug!("{} < {msg}", self.label);
        self.stdin
            .write_all(msg.as_bytes())
            .and_then(|_| self.stdin.write_all(b"\n"))
            .and_then(|_| self.stdin.flush())
            .map_err(|e| MatchError::process_died(&self.label, format!("write failed: {e}")))
    }

    fn recv_line(&self) -> Result<String, MatchError> {
        let line = match self.timeout {
            Some(timeout) => self.rx.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => MatchError::process_died(
                    &self.label,
                    format!("no response within {}s", timeout.as_secs_f64()),
                ),
                RecvTimeoutError::Disconnected => {
                    MatchError::process_died(&self.label, "engine exited unexpectedly")
                }
            })?,
            None => self
                .rx
                .recv()
                .map_err(|_| MatchError::process_died(&self.label, "engine exited unexpectedly"))?,
        };
        log::debug!("{} > {line}", self.label);
        Ok(line)
    }

    /// 1つ分の GTP 応答（`=`/`?` 行から空行まで）を読む。
    fn read_response(&self) -> Result<Response, MatchError> {
        let (success, mut text) = loop {
            let line = self.recv_line()?;
            if let Some(head) = parse_status_line(&line) {
                break head;
            }
            if !line.trim().is_empty() {
                log::debug!("{}: ignoring unexpected output {line:?}", self.label);
            }
        };
        loop {
            let line = self.recv_line()?;
            if line.trim().is_empty() {
                break;
            }
            text.push('\n');
            text.push_str(line.trim_end());
        }
        Ok(Response { success, text })
    }
}

struct Response {
    success: bool,
    text: String,
}

/// `= text` / `?id text` を (成功か, 本文) に分解する。応答の先頭行でなければ `None`。
pub fn parse_status_line(line: &str) -> Option<(bool, String)> {
    let success = match line.chars().next()? {
        '=' => true,
        '?' => false,
        _ => return None,
    };
    let rest = line[1..].trim_start_matches(|c: char| c.is_ascii_digit());
    Some((success, rest.trim().to_string()))
}

impl EngineClient for GtpEngine {
    fn label(&self) -> &str {
        &self.label
    }

    fn send_command(&mut self, command: &str) -> Result<String, MatchError> {
        self.write_line(command)?;
        let response = self.read_response()?;
        if response.success {
            Ok(response.text)
        } else {
            Err(MatchError::Orchestration(format!(
                "{}: `{command}` failed: {}",
                self.label, response.text
            )))
        }
    }

    fn result(&self) -> GameResult {
        self.result.clone()
    }

    fn set_result(&mut self, result: GameResult) {
        self.result = result;
    }
}

impl Drop for GtpEngine {
    fn drop(&mut self) {
        let _ = self.write_line("quit");
        let deadline = Instant::now() + ENGINE_QUIT_TIMEOUT;
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                return;
            }
            std::thread::sleep(ENGINE_QUIT_POLL_INTERVAL);
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// 色ラベル付きで [`GtpEngine`] を起動する。
pub struct GtpLauncher {
    pub timeout: Option<Duration>,
}

impl EngineLauncher for GtpLauncher {
    type Client = GtpEngine;

    fn launch(
        &mut self,
        color: Color,
        command: &str,
        log_path: &Path,
    ) -> Result<GtpEngine, MatchError> {
        GtpEngine::spawn(color.label(), command, log_path, self.timeout)
    }
}

//! mpv audio backend over JSON IPC.
//!
//! One long-lived idle mpv process serves the whole app. The session side
//! talks to it through [`MpvBackend`], whose handles just push commands onto
//! an unbounded channel; a writer task owns the IPC socket and a reader task
//! pumps mpv events back as [`PlayerEvent`]s.

use crate::app::events::Event;
use crate::player::MpvCommand;
use crate::session::audio::{AudioBackend, AudioHandle, PlaybackError, PlayerEvent};
use anyhow::Context;
use serde_json::json;
use std::path::PathBuf;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::UnixStream,
    process::{Child, Command},
    sync::mpsc,
};

/// The running mpv process. Dropping it kills the process and removes the
/// IPC socket.
#[derive(Debug)]
pub struct MpvPlayer {
    child: Child,
    socket_path: PathBuf,
}

impl MpvPlayer {
    /// Spawn mpv, connect to its IPC socket and start the reader and writer
    /// tasks. Returns the process guard and the backend the session uses.
    pub async fn spawn(event_tx: mpsc::Sender<Event>, volume: u8) -> anyhow::Result<(Self, MpvBackend)> {
        let socket_path = std::env::temp_dir().join(format!("islet-mpv-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&socket_path);

        let child = Command::new("mpv")
            .args([
                "--no-video",
                "--idle=yes",
                "--input-terminal=no",
                // quiet on stdio; errors come back over IPC log messages
                "--really-quiet",
            ])
            .arg(format!("--input-ipc-server={}", socket_path.display()))
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .context("spawn mpv")?;

        // mpv creates the socket shortly after starting.
        let stream = connect_with_retry(&socket_path).await?;
        let (reader, mut writer) = tokio::io::split(stream);

        tokio::spawn(read_events_loop(reader, event_tx));

        // Ask for log messages and observe the properties the session tracks,
        // before any command can race them.
        let mut request_id: u64 = 1;
        for cmd in [
            json!({"command":["request_log_messages", "warn"]}),
            json!({"command":["observe_property", 1, "time-pos"]}),
            json!({"command":["observe_property", 2, "duration"]}),
            json!({"command":["observe_property", 3, "pause"]}),
            json!({"command":["observe_property", 4, "eof-reached"]}),
            json!({"command":["set_property", "volume", volume]}),
        ] {
            write_command(&mut writer, cmd, &mut request_id).await?;
        }

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(write_commands_loop(writer, cmd_rx, request_id));

        Ok((Self { child, socket_path }, MpvBackend { cmd_tx }))
    }
}

impl Drop for MpvPlayer {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Synchronous face of the mpv process.
#[derive(Debug, Clone)]
pub struct MpvBackend {
    cmd_tx: mpsc::UnboundedSender<MpvCommand>,
}

impl AudioBackend for MpvBackend {
    type Handle = MpvAudioHandle;

    fn open(&mut self, url: &str) -> Result<MpvAudioHandle, PlaybackError> {
        self.cmd_tx
            .send(MpvCommand::Load(url.to_string()))
            .map_err(|_| PlaybackError::Unavailable("mpv process exited".to_string()))?;
        let _ = self.cmd_tx.send(MpvCommand::SetPause(false));
        Ok(MpvAudioHandle {
            cmd_tx: self.cmd_tx.clone(),
        })
    }
}

/// One loaded stream. Dropping the handle stops playback.
#[derive(Debug)]
pub struct MpvAudioHandle {
    cmd_tx: mpsc::UnboundedSender<MpvCommand>,
}

impl AudioHandle for MpvAudioHandle {
    fn pause(&mut self) {
        let _ = self.cmd_tx.send(MpvCommand::SetPause(true));
    }

    fn resume(&mut self) -> Result<(), PlaybackError> {
        self.cmd_tx
            .send(MpvCommand::SetPause(false))
            .map_err(|_| PlaybackError::Unavailable("mpv process exited".to_string()))
    }

    fn seek_to(&mut self, seconds: f64) {
        let _ = self.cmd_tx.send(MpvCommand::Seek(seconds));
    }
}

impl Drop for MpvAudioHandle {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(MpvCommand::Stop);
    }
}

async fn connect_with_retry(path: &PathBuf) -> anyhow::Result<UnixStream> {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    loop {
        match UnixStream::connect(path).await {
            Ok(s) => return Ok(s),
            Err(e) => {
                if tokio::time::Instant::now() > deadline {
                    return Err(e).with_context(|| format!("connect to mpv ipc {}", path.display()));
                }
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
        }
    }
}

async fn write_command(
    writer: &mut tokio::io::WriteHalf<UnixStream>,
    mut v: serde_json::Value,
    request_id: &mut u64,
) -> anyhow::Result<()> {
    // Tag requests so replies carry structured errors on the IPC stream.
    if let serde_json::Value::Object(ref mut o) = v {
        o.insert("request_id".to_string(), serde_json::Value::from(*request_id));
        *request_id += 1;
    }
    let mut line = serde_json::to_vec(&v).context("encode mpv json")?;
    line.push(b'\n');
    writer.write_all(&line).await.context("write mpv ipc")?;
    writer.flush().await.context("flush mpv ipc")?;
    Ok(())
}

async fn write_commands_loop(
    mut writer: tokio::io::WriteHalf<UnixStream>,
    mut cmd_rx: mpsc::UnboundedReceiver<MpvCommand>,
    mut request_id: u64,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        let v = match cmd {
            MpvCommand::Load(url) => json!({"command":["loadfile", url, "replace"]}),
            MpvCommand::SetPause(paused) => json!({"command":["set_property", "pause", paused]}),
            MpvCommand::Seek(seconds) => json!({"command":["seek", seconds, "absolute"]}),
            MpvCommand::Stop => json!({"command":["stop"]}),
        };
        if let Err(e) = write_command(&mut writer, v, &mut request_id).await {
            tracing::warn!("mpv ipc write failed, stopping writer: {e}");
            break;
        }
    }
}

async fn read_events_loop(reader: tokio::io::ReadHalf<UnixStream>, event_tx: mpsc::Sender<Event>) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(&line) {
            // mpv command replies: {"request_id":..., "error":"..."}
            if let (Some(_rid), Some(err)) = (v.get("request_id"), v.get("error"))
                && let Some(err_s) = err.as_str()
                && err_s != "success"
            {
                let _ = event_tx
                    .send(Event::Player(PlayerEvent::Error(format!(
                        "mpv ipc error: {err_s}"
                    ))))
                    .await;
            }
            if let Some(pe) = map_mpv_event(&v) {
                let _ = event_tx.send(Event::Player(pe)).await;
            }
        }
    }
}

fn map_mpv_event(v: &serde_json::Value) -> Option<PlayerEvent> {
    // We mostly care about property-change events.
    match v.get("event")?.as_str()? {
        "property-change" => {
            let name = v.get("name")?.as_str()?;
            match name {
                "time-pos" => Some(PlayerEvent::Position {
                    seconds: v.get("data")?.as_f64().unwrap_or(0.0),
                }),
                "duration" => Some(PlayerEvent::Duration {
                    seconds: v.get("data")?.as_f64().unwrap_or(0.0),
                }),
                "pause" => {
                    let paused = v.get("data")?.as_bool().unwrap_or(false);
                    Some(if paused {
                        PlayerEvent::Paused
                    } else {
                        PlayerEvent::Started
                    })
                }
                "eof-reached" => {
                    let eof = v.get("data")?.as_bool().unwrap_or(false);
                    if eof { Some(PlayerEvent::Ended) } else { None }
                }
                _ => None,
            }
        }
        "end-file" => {
            // A stream mpv cannot play ends with reason=error plus a string.
            let reason = v.get("reason").and_then(|x| x.as_str()).unwrap_or("");
            if reason == "error" {
                let err = v.get("error").and_then(|x| x.as_str()).unwrap_or("unknown");
                Some(PlayerEvent::Error(format!("mpv end-file error: {err}")))
            } else {
                Some(PlayerEvent::Ended)
            }
        }
        "log-message" => {
            let level = v.get("level")?.as_str().unwrap_or("info");
            let text = v.get("text")?.as_str().unwrap_or("").trim();
            if (level == "warn" || level == "error") && !text.is_empty() {
                Some(PlayerEvent::Error(format!("mpv {level}: {text}")))
            } else {
                None
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_property_changes() {
        let v = json!({"event":"property-change","name":"time-pos","data":12.5});
        assert!(matches!(
            map_mpv_event(&v),
            Some(PlayerEvent::Position { seconds }) if seconds == 12.5
        ));

        let v = json!({"event":"property-change","name":"pause","data":true});
        assert!(matches!(map_mpv_event(&v), Some(PlayerEvent::Paused)));

        let v = json!({"event":"property-change","name":"eof-reached","data":false});
        assert!(map_mpv_event(&v).is_none());
    }

    #[test]
    fn test_map_end_file() {
        let v = json!({"event":"end-file","reason":"eof"});
        assert!(matches!(map_mpv_event(&v), Some(PlayerEvent::Ended)));

        let v = json!({"event":"end-file","reason":"error","error":"loading failed"});
        assert!(matches!(
            map_mpv_event(&v),
            Some(PlayerEvent::Error(msg)) if msg.contains("loading failed")
        ));
    }

    #[test]
    fn test_log_messages_below_warn_are_dropped() {
        let v = json!({"event":"log-message","level":"info","text":"something"});
        assert!(map_mpv_event(&v).is_none());

        let v = json!({"event":"log-message","level":"error","text":"bad stream"});
        assert!(matches!(map_mpv_event(&v), Some(PlayerEvent::Error(_))));
    }
}

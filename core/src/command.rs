//! Command interface — the serialisable face of the mode arbiter.
//!
//! Every command yields a `CommandReply`; failures are reported as an
//! error kind plus a reason, never as a panic or an escaped error.

use crate::{
    arbiter::{ModeArbiter, WorldView},
    error::SimError,
    snapshot::Snapshot,
    types::RunId,
};
use serde::{Deserialize, Serialize};

/// Variants added over time — never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    // ── Mode control ──────────────────────────────
    StartLive {
        #[serde(default)]
        seed: Option<u64>,
    },
    StartPlayback {
        log: Vec<Snapshot>,
    },
    Stop,

    // ── Pacing ────────────────────────────────────
    SetSpeed { multiplier: f64 },

    // ── Query ─────────────────────────────────────
    GetState,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandReply {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_multiplier: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<WorldView>,
}

impl CommandReply {
    pub fn success() -> Self {
        Self {
            ok:               true,
            run_id:           None,
            speed_multiplier: None,
            error_kind:       None,
            reason:           None,
            state:            None,
        }
    }

    pub fn failure(err: &SimError) -> Self {
        Self {
            ok:         false,
            error_kind: Some(err.kind()),
            reason:     Some(err.to_string()),
            ..Self::success()
        }
    }
}

impl ModeArbiter {
    /// Run one command and report the outcome.
    pub fn execute(&self, command: Command) -> CommandReply {
        let result = match command {
            Command::StartLive { seed } => {
                let started = match seed {
                    Some(seed) => self.start_live_seeded(seed),
                    None => self.start_live(),
                };
                started.map(|run_id| CommandReply { run_id: Some(run_id), ..CommandReply::success() })
            }
            Command::StartPlayback { log } => self
                .start_playback(log)
                .map(|run_id| CommandReply { run_id: Some(run_id), ..CommandReply::success() }),
            Command::Stop => self.stop().map(|()| CommandReply::success()),
            Command::SetSpeed { multiplier } => self.set_speed(multiplier).map(|effective| {
                CommandReply { speed_multiplier: Some(effective), ..CommandReply::success() }
            }),
            Command::GetState => Ok(CommandReply {
                state: Some(self.world_state()),
                ..CommandReply::success()
            }),
        };
        result.unwrap_or_else(|e| {
            log::warn!("Command failed: {e}");
            CommandReply::failure(&e)
        })
    }
}

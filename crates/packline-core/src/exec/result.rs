//! Per-action and per-command execution results, mirroring the shape of
//! the teacher's `Deployment`/`DeployedDotfile` pair.

use std::borrow::Cow;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::action::Action;

/// Per-action outcome. Matches the status vocabulary in §3/§4.4/§7.
#[derive(Debug, Clone, Serialize)]
pub enum ActionOutcome {
	/// Ran to completion (or would have, under `--dry-run`).
	Ready,
	/// Declined by confirmation, or skipped after a prior failure
	/// during a rollback-enabled run.
	Skipped(Cow<'static, str>),
	/// Blocked by a pre-existing file or a competing action.
	Conflict(Cow<'static, str>),
	/// Execution failed.
	Error(Cow<'static, str>),
}

impl ActionOutcome {
	/// `true` for [`Self::Ready`].
	#[must_use]
	pub const fn is_ready(&self) -> bool {
		matches!(self, Self::Ready)
	}

	/// `true` for [`Self::Error`].
	#[must_use]
	pub const fn is_error(&self) -> bool {
		matches!(self, Self::Error(_))
	}
}

impl std::fmt::Display for ActionOutcome {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Ready => write!(f, "ready"),
			Self::Skipped(reason) => write!(f, "skipped: {reason}"),
			Self::Conflict(reason) => write!(f, "conflict: {reason}"),
			Self::Error(reason) => write!(f, "error: {reason}"),
		}
	}
}

/// The executed form of one [`Action`].
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
	/// Pack the action belonged to.
	pub pack: String,
	/// Handler that produced the action.
	pub handler: String,
	/// Stable type tag (`"link"`, `"provision"`, ...).
	pub kind: &'static str,
	/// Display-friendly target/source path.
	pub path: std::path::PathBuf,
	/// What happened.
	pub outcome: ActionOutcome,
}

impl ActionResult {
	pub(super) fn new(action: &Action, outcome: ActionOutcome) -> Self {
		Self {
			pack: action.pack.clone(),
			handler: action.handler.clone(),
			kind: action.kind_tag(),
			path: action.target_key().clone(),
			outcome,
		}
	}
}

/// Overall status of a command invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecutionStatus {
	/// No action ended in [`ActionOutcome::Error`].
	Success,
	/// At least one action ended in [`ActionOutcome::Error`].
	Failed,
}

/// Per-invocation roll-up of every action result, with timing.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
	#[serde(skip)]
	started: SystemTime,
	#[serde(skip)]
	ended: SystemTime,
	/// Overall status.
	pub status: ExecutionStatus,
	/// Every action's result, in execution order.
	pub actions: Vec<ActionResult>,
}

impl ExecutionResult {
	pub(super) fn new(started: SystemTime, ended: SystemTime, actions: Vec<ActionResult>) -> Self {
		let status = if actions.iter().any(|a| a.outcome.is_error()) {
			ExecutionStatus::Failed
		} else {
			ExecutionStatus::Success
		};

		Self {
			started,
			ended,
			status,
			actions,
		}
	}

	/// Wall-clock duration of the invocation.
	#[must_use]
	pub fn duration(&self) -> Duration {
		self.ended.duration_since(self.started).unwrap_or_default()
	}

	/// Maps the overall status + per-action conflicts to the documented
	/// exit codes (§6 CLI surface).
	#[must_use]
	pub fn exit_code(&self, force: bool) -> i32 {
		if self.status == ExecutionStatus::Failed {
			return 3;
		}

		if !force && self.actions.iter().any(|a| matches!(a.outcome, ActionOutcome::Conflict(_))) {
			return 2;
		}

		0
	}
}

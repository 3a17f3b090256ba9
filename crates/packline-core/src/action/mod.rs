//! The action data model (§3) and the planner (C4).

pub mod plan;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

/// Discriminated union of everything the executor can be asked to do.
#[derive(Debug, Clone, Serialize)]
pub enum ActionKind {
	/// Create a managed symlink from `target` to `source`.
	Link {
		/// Pack-local file the link points at (through the
		/// intermediate).
		source: PathBuf,
		/// User-visible location.
		target: PathBuf,
	},
	/// Arrange that `source` is sourced by the user's shell.
	ShellAdd {
		/// Pack-local script.
		source: PathBuf,
	},
	/// Arrange that `source` is prepended to PATH.
	PathAdd {
		/// Pack-local directory.
		source: PathBuf,
	},
	/// Materialize a file.
	Write {
		/// Destination.
		target: PathBuf,
		/// Full content.
		content: String,
		/// Unix mode bits, when meaningful.
		mode: Option<u32>,
	},
	/// Append a line/block to an existing file.
	Append {
		/// Destination.
		target: PathBuf,
		/// Content to append.
		content: String,
	},
	/// Ensure a directory exists.
	Mkdir {
		/// Directory to create.
		target: PathBuf,
		/// Unix mode bits, when meaningful.
		mode: Option<u32>,
	},
	/// A run-once action gated by a checksum sentinel.
	Provision {
		/// Which kind of provisioner.
		kind: ProvisionKind,
		/// Pack-local script or bundle file.
		source: PathBuf,
	},
	/// Copy a file verbatim into place (seeding).
	Copy {
		/// Pack-local source.
		source: PathBuf,
		/// Destination.
		target: PathBuf,
	},
	/// Render a minimal template into place (seeding).
	Template {
		/// Pack-local template source.
		source: PathBuf,
		/// Destination.
		target: PathBuf,
		/// Substitution variables.
		vars: BTreeMap<String, String>,
	},
}

/// Kind of provisioning action, gated by [`crate::provision::Gate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProvisionKind {
	/// An `install.sh`-style shell script.
	InstallScript,
	/// A `Brewfile` consumed by `brew bundle`.
	Homebrew,
}

/// Outcome of planning (C4) and, later, execution (C7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionStatus {
	/// Eligible to run.
	Ready,
	/// Blocked by a pre-existing file or a competing action; would
	/// proceed under `--force`.
	Conflict,
	/// Planning/validation itself failed (e.g. path safety).
	Error,
	/// A confirmation request for this action was declined.
	Skipped,
}

impl ActionStatus {
	/// `true` for [`Self::Ready`].
	#[must_use]
	pub const fn is_ready(self) -> bool {
		matches!(self, Self::Ready)
	}
}

/// One planned unit of work: the [`ActionKind`] plus the shared header
/// every variant carries (§9 Design Notes: avoid an open "operation"
/// bag, share one small header instead).
#[derive(Debug, Clone, Serialize)]
pub struct Action {
	/// Name of the pack this action was planned for.
	pub pack: String,
	/// Name of the handler that produced this action.
	pub handler: String,
	/// Planning priority; higher wins target conflicts.
	pub priority: i32,
	/// Current status, set by the planner and updated by the executor.
	pub status: ActionStatus,
	/// Opaque per-handler hints (e.g. a precomputed checksum).
	pub metadata: BTreeMap<String, String>,
	/// The actual operation.
	pub kind: ActionKind,
}

impl Action {
	/// The path this action's conflict-resolution and dedup keys are
	/// computed against: the symlink target, the write/append/mkdir
	/// target, or the provisioning/shell/path source.
	#[must_use]
	pub fn target_key(&self) -> &PathBuf {
		match &self.kind {
			ActionKind::Link { target, .. } => target,
			ActionKind::Write { target, .. } | ActionKind::Append { target, .. } | ActionKind::Mkdir { target, .. } => {
				target
			}
			ActionKind::Copy { target, .. } | ActionKind::Template { target, .. } => target,
			ActionKind::ShellAdd { source } | ActionKind::PathAdd { source } | ActionKind::Provision { source, .. } => {
				source
			}
		}
	}

	/// Stable type tag, used as the secondary sort/dedup key.
	#[must_use]
	pub const fn kind_tag(&self) -> &'static str {
		match &self.kind {
			ActionKind::Link { .. } => "link",
			ActionKind::ShellAdd { .. } => "shell_add",
			ActionKind::PathAdd { .. } => "path_add",
			ActionKind::Write { .. } => "write",
			ActionKind::Append { .. } => "append",
			ActionKind::Mkdir { .. } => "mkdir",
			ActionKind::Provision { .. } => "provision",
			ActionKind::Copy { .. } => "copy",
			ActionKind::Template { .. } => "template",
		}
	}
}

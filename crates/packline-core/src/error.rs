//! Typed error kinds shared across the engine.
//!
//! Hard, unexpected failures (a pack config that doesn't parse, an I/O
//! error while walking the dotfiles root) propagate as `color_eyre::Result`.
//! Expected, per-action outcomes are represented here and folded into an
//! [`crate::exec::ExecutionResult`] instead of aborting the whole command.

use std::path::PathBuf;

/// One error kind per case in the engine's error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum PacklineError {
	/// Empty or malformed argument.
	#[error("invalid input: {0}")]
	InvalidInput(String),

	/// A requested pack does not exist under the dotfiles root.
	#[error("pack not found: {0}")]
	PackNotFound(String),

	/// A handler produced a structurally invalid action (missing
	/// source/target).
	#[error("handler `{handler}` produced an invalid action: {reason}")]
	ActionInvalid {
		/// Name of the offending handler.
		handler: String,
		/// Human-readable reason.
		reason: String,
	},

	/// [`crate::safety::Validator`] rejected a path as a protected system
	/// file.
	#[error("refusing to touch protected system file: {0}")]
	ProtectedSystemFile(PathBuf),

	/// [`crate::safety::Validator`] rejected a path outside all sanctioned
	/// roots.
	#[error("path outside sanctioned roots: {0}")]
	OutsideSanctionedRoots(PathBuf),

	/// A pre-existing file or another action already claims this target.
	#[error("conflict at {path}: {reason}")]
	Conflict {
		/// The contested path.
		path: PathBuf,
		/// Why the conflict was raised.
		reason: String,
	},

	/// A handler's external process (install script, brew) failed.
	#[error("handler `{handler}` execution failed: {reason}")]
	HandlerExecution {
		/// Name of the handler whose process failed.
		handler: String,
		/// Failure detail.
		reason: String,
	},

	/// I/O failure surfaced from the [`crate::fsys::FS`] capability.
	#[error("file access error on {path}: {source}")]
	FileAccess {
		/// Path the operation was attempted against.
		path: PathBuf,
		/// Underlying I/O error.
		#[source]
		source: std::io::Error,
	},

	/// [`crate::confirm::Collector`] invariant violated: two requests
	/// shared an id.
	#[error("duplicate confirmation id: {0}")]
	DuplicateConfirmationId(String),
}

impl PacklineError {
	/// Maps an error kind to the process exit code documented for the
	/// command façade.
	#[must_use]
	pub const fn exit_code(&self) -> i32 {
		match self {
			Self::InvalidInput(_) | Self::PackNotFound(_) => 1,
			Self::ProtectedSystemFile(_) | Self::OutsideSanctionedRoots(_) | Self::Conflict { .. } => 2,
			Self::HandlerExecution { .. } | Self::FileAccess { .. } => 3,
			Self::ActionInvalid { .. } | Self::DuplicateConfirmationId(_) => 4,
		}
	}
}

//! The executor (C7): drives the action list against the datastore and
//! filesystem, honoring dry-run, force, and rollback. Implements the
//! two-link deployment strategy for `Link` actions.

mod result;

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use cfg_if::cfg_if;

use crate::action::{Action, ActionKind, ActionStatus, ProvisionKind};
use crate::datastore::Datastore;
use crate::provision::checksum_file;
use crate::safety::{Intent, Validator};

pub use result::{ActionOutcome, ActionResult, ExecutionResult};

/// Behavioral switches for one execution run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutorOptions {
	/// Walk the plan but perform no mutations; every action yields
	/// `Ready` with zero duration.
	pub dry_run: bool,
	/// Proceed through conflicts instead of stopping at them
	/// (last-write-wins at the filesystem level).
	pub force: bool,
	/// If any action fails, undo previously-successful mutations from
	/// this command in reverse order.
	pub rollback_on_error: bool,
}

/// A mutation this invocation performed, recorded so it can be undone on
/// rollback. `previous: None` means the state didn't exist before and
/// rollback should remove it outright, rather than restore it to empty.
#[derive(Debug)]
enum Undo {
	RemoveSymlink(PathBuf),
	RestoreAppendedFile { target: PathBuf, previous: Option<String> },
	RestorePathMarker { pack: String, previous: Option<PathBuf> },
	RestoreShellSourceMarker { pack: String, previous: Option<PathBuf> },
	RemoveSentinel { pack: String, kind: ProvisionKind },
}

/// Drives planned actions to completion. Single-threaded, cooperative:
/// actions run strictly in the planner's sorted order, since shell/PATH
/// fragments depend on deterministic sequencing.
#[derive(Debug)]
pub struct Executor<'a> {
	options: ExecutorOptions,
	datastore: &'a Datastore,
	validator: &'a Validator,
	undo_log: Vec<Undo>,
}

impl<'a> Executor<'a> {
	/// Builds an executor bound to a datastore and path-safety
	/// validator.
	#[must_use]
	pub fn new(options: ExecutorOptions, datastore: &'a Datastore, validator: &'a Validator) -> Self {
		Self {
			options,
			datastore,
			validator,
			undo_log: Vec::new(),
		}
	}

	/// Executes `actions` in order, returning the roll-up.
	pub fn execute(mut self, actions: Vec<Action>) -> ExecutionResult {
		let started = SystemTime::now();
		let mut results = Vec::with_capacity(actions.len());
		let mut had_failure = false;

		for action in actions {
			let outcome = if had_failure && self.options.rollback_on_error {
				ActionOutcome::Skipped(Cow::Borrowed("skipped after an earlier failure"))
			} else {
				self.execute_one(&action)
			};

			if matches!(outcome, ActionOutcome::Error(_)) {
				had_failure = true;
			}

			results.push(ActionResult::new(&action, outcome));
		}

		if had_failure && self.options.rollback_on_error {
			self.rollback();
		}

		// Rewrite the shell fragment once at the end from persisted
		// datastore state, to avoid drift (§4.7).
		if !self.options.dry_run {
			if let Err(e) = self.datastore.rewrite_shell_fragment() {
				log::error!("failed to rewrite shell fragment: {e}");
			}
		}

		ExecutionResult::new(started, SystemTime::now(), results)
	}

	fn execute_one(&mut self, action: &Action) -> ActionOutcome {
		if !action.status.is_ready() {
			return match action.status {
				ActionStatus::Conflict => ActionOutcome::Conflict(Cow::Borrowed("blocked by a pre-existing file or action")),
				ActionStatus::Error => ActionOutcome::Error(Cow::Borrowed("planning failed for this action")),
				ActionStatus::Skipped => ActionOutcome::Skipped(Cow::Borrowed("declined by confirmation")),
				ActionStatus::Ready => unreachable!("handled by the caller"),
			};
		}

		if self.options.dry_run {
			return ActionOutcome::Ready;
		}

		let start = Instant::now();
		let outcome = match &action.kind {
			ActionKind::Link { source, target } => self.deploy_link(source, target),
			ActionKind::ShellAdd { source } => self.deploy_shell_add(&action.pack, source),
			ActionKind::PathAdd { source } => self.deploy_path_add(&action.pack, source),
			ActionKind::Write { target, content, mode } => self.deploy_write(target, content, *mode),
			ActionKind::Append { target, content } => self.deploy_append(target, content),
			ActionKind::Mkdir { target, mode } => self.deploy_mkdir(target, *mode),
			ActionKind::Provision { kind, source } => self.deploy_provision(&action.pack, *kind, source, &action.metadata),
			ActionKind::Copy { source, target } => self.deploy_copy(source, target),
			ActionKind::Template { source, target, vars } => self.deploy_template(source, target, vars),
		};

		log::debug!(
			"executed `{}` action for pack `{}` in {:?}",
			action.kind_tag(),
			action.pack,
			start.elapsed()
		);

		outcome
	}

	/// The two-link strategy: intermediate under the datastore, then
	/// the user-visible symlink pointing at the intermediate.
	fn deploy_link(&mut self, source: &Path, target: &Path) -> ActionOutcome {
		if let Err(e) = self.validator.validate(source, Intent::SymlinkSource) {
			return ActionOutcome::Error(Cow::Owned(e.to_string()));
		}

		let Ok(target) = self.validator.validate(target, Intent::SymlinkTarget) else {
			return ActionOutcome::Error(Cow::Borrowed("target path failed safety validation"));
		};

		if let Some(parent) = target.parent() {
			if !parent.exists() {
				if let Err(e) = std::fs::create_dir_all(parent) {
					return ActionOutcome::Error(Cow::Owned(e.to_string()));
				}
			}
		}

		let intermediate = match self.datastore.link(source, &target) {
			Ok(path) => path,
			Err(e) => return ActionOutcome::Error(Cow::Owned(e.to_string())),
		};

		match std::fs::symlink_metadata(&target) {
			Ok(meta) if meta.is_symlink() => {
				if std::fs::read_link(&target).ok().as_deref() == Some(&intermediate) {
					return ActionOutcome::Ready; // idempotent re-run
				}

				if !self.options.force {
					return ActionOutcome::Conflict(Cow::Borrowed("target is a foreign symlink"));
				}

				let _ = std::fs::remove_file(&target);
			}
			Ok(_) => {
				let adopts = std::fs::read(&target)
					.ok()
					.zip(std::fs::read(source).ok())
					.is_some_and(|(a, b)| a == b);

				if !adopts && !self.options.force {
					return ActionOutcome::Conflict(Cow::Borrowed("target exists with different content"));
				}

				if let Err(e) = std::fs::remove_file(&target) {
					return ActionOutcome::Error(Cow::Owned(e.to_string()));
				}
			}
			Err(e) if crate::fsys::is_not_found(&e) => {}
			Err(e) => return ActionOutcome::Error(Cow::Owned(e.to_string())),
		}

		if let Err(e) = platform_symlink(&intermediate, &target) {
			return ActionOutcome::Error(Cow::Owned(e.to_string()));
		}

		self.undo_log.push(Undo::RemoveSymlink(target));

		ActionOutcome::Ready
	}

	fn deploy_shell_add(&mut self, pack: &str, source: &Path) -> ActionOutcome {
		if self.validator.validate(source, Intent::SymlinkSource).is_err() {
			return ActionOutcome::Error(Cow::Borrowed("source path failed safety validation"));
		}

		let previous = match self.datastore.read_shell_source_marker(pack) {
			Ok(previous) => previous,
			Err(e) => return ActionOutcome::Error(Cow::Owned(e.to_string())),
		};

		match self.datastore.add_shell_source(pack, source) {
			Ok(()) => {
				self.undo_log.push(Undo::RestoreShellSourceMarker {
					pack: pack.to_owned(),
					previous,
				});
				ActionOutcome::Ready
			}
			Err(e) => ActionOutcome::Error(Cow::Owned(e.to_string())),
		}
	}

	fn deploy_path_add(&mut self, pack: &str, source: &Path) -> ActionOutcome {
		if self.validator.validate(source, Intent::SymlinkSource).is_err() {
			return ActionOutcome::Error(Cow::Borrowed("source path failed safety validation"));
		}

		let previous = match self.datastore.read_path_marker(pack) {
			Ok(previous) => previous,
			Err(e) => return ActionOutcome::Error(Cow::Owned(e.to_string())),
		};

		match self.datastore.add_to_path(pack, source) {
			Ok(()) => {
				self.undo_log.push(Undo::RestorePathMarker {
					pack: pack.to_owned(),
					previous,
				});
				ActionOutcome::Ready
			}
			Err(e) => ActionOutcome::Error(Cow::Owned(e.to_string())),
		}
	}

	fn deploy_write(&mut self, target: &Path, content: &str, _mode: Option<u32>) -> ActionOutcome {
		let Ok(target) = self.validator.validate(target, Intent::Write) else {
			return ActionOutcome::Error(Cow::Borrowed("target path failed safety validation"));
		};

		match std::fs::write(&target, content) {
			Ok(()) => ActionOutcome::Ready,
			Err(e) => ActionOutcome::Error(Cow::Owned(e.to_string())),
		}
	}

	fn deploy_append(&mut self, target: &Path, content: &str) -> ActionOutcome {
		let Ok(target) = self.validator.validate(target, Intent::Append) else {
			return ActionOutcome::Error(Cow::Borrowed("target path failed safety validation"));
		};

		use std::io::Write as _;

		let previous = match std::fs::read_to_string(&target) {
			Ok(content) => Some(content),
			Err(e) if crate::fsys::is_not_found(&e) => None,
			Err(e) => return ActionOutcome::Error(Cow::Owned(e.to_string())),
		};
		self.undo_log.push(Undo::RestoreAppendedFile {
			target: target.clone(),
			previous,
		});

		let result = std::fs::OpenOptions::new()
			.create(true)
			.append(true)
			.open(&target)
			.and_then(|mut f| f.write_all(content.as_bytes()));

		match result {
			Ok(()) => ActionOutcome::Ready,
			Err(e) => ActionOutcome::Error(Cow::Owned(e.to_string())),
		}
	}

	fn deploy_mkdir(&mut self, target: &Path, _mode: Option<u32>) -> ActionOutcome {
		let Ok(target) = self.validator.validate(target, Intent::Write) else {
			return ActionOutcome::Error(Cow::Borrowed("target path failed safety validation"));
		};

		match std::fs::create_dir_all(target) {
			Ok(()) => ActionOutcome::Ready,
			Err(e) => ActionOutcome::Error(Cow::Owned(e.to_string())),
		}
	}

	fn deploy_copy(&mut self, source: &Path, target: &Path) -> ActionOutcome {
		let Ok(target) = self.validator.validate(target, Intent::Write) else {
			return ActionOutcome::Error(Cow::Borrowed("target path failed safety validation"));
		};

		match std::fs::copy(source, target) {
			Ok(_) => ActionOutcome::Ready,
			Err(e) => ActionOutcome::Error(Cow::Owned(e.to_string())),
		}
	}

	fn deploy_template(&mut self, source: &Path, target: &Path, vars: &std::collections::BTreeMap<String, String>) -> ActionOutcome {
		let Ok(target) = self.validator.validate(target, Intent::Write) else {
			return ActionOutcome::Error(Cow::Borrowed("target path failed safety validation"));
		};

		let content = match std::fs::read_to_string(source) {
			Ok(c) => c,
			Err(e) => return ActionOutcome::Error(Cow::Owned(e.to_string())),
		};

		let rendered = crate::seed::fill(&content, vars);

		match std::fs::write(&target, rendered) {
			Ok(()) => ActionOutcome::Ready,
			Err(e) => ActionOutcome::Error(Cow::Owned(e.to_string())),
		}
	}

	fn deploy_provision(
		&mut self,
		pack: &str,
		kind: ProvisionKind,
		source: &Path,
		metadata: &std::collections::BTreeMap<String, String>,
	) -> ActionOutcome {
		if self.validator.validate(source, Intent::Provision).is_err() {
			return ActionOutcome::Error(Cow::Borrowed("source path failed safety validation"));
		}

		let checksum = match metadata.get("checksum") {
			Some(c) => c.clone(),
			None => match checksum_file(source) {
				Ok(c) => c,
				Err(e) => return ActionOutcome::Error(Cow::Owned(e.to_string())),
			},
		};

		let command_line = match kind {
			ProvisionKind::InstallScript => source.to_string_lossy().into_owned(),
			ProvisionKind::Homebrew => format!("brew bundle --file=\"{}\"", source.display()),
		};

		let status = run_shell(&command_line, source.parent().unwrap_or(source));

		match status {
			Ok(status) if status.success() => {
				let timestamp = SystemTime::now()
					.duration_since(UNIX_EPOCH)
					.map(|d| d.as_secs().to_string())
					.unwrap_or_default();

				match self.datastore.record_provisioning(pack, kind, &checksum, &timestamp) {
					Ok(()) => {
						self.undo_log.push(Undo::RemoveSentinel {
							pack: pack.to_owned(),
							kind,
						});
						ActionOutcome::Ready
					}
					Err(e) => ActionOutcome::Error(Cow::Owned(e.to_string())),
				}
			}
			Ok(status) => ActionOutcome::Error(Cow::Owned(format!("provisioner exited with {status}"))),
			Err(e) => ActionOutcome::Error(Cow::Owned(e.to_string())),
		}
	}

	/// Reverses recorded mutations in LIFO order. Best-effort: a
	/// rollback failure is logged and does not mask the primary error.
	fn rollback(&mut self) {
		while let Some(undo) = self.undo_log.pop() {
			let result = match &undo {
				Undo::RemoveSymlink(path) => std::fs::remove_file(path),
				Undo::RestoreAppendedFile { target, previous } => match previous {
					Some(content) => std::fs::write(target, content),
					None => std::fs::remove_file(target),
				},
				Undo::RestorePathMarker { pack, previous } => match previous {
					Some(dir_path) => self.datastore.add_to_path(pack, dir_path),
					None => self.datastore.remove_from_path(pack),
				},
				Undo::RestoreShellSourceMarker { pack, previous } => match previous {
					Some(source_path) => self.datastore.add_shell_source(pack, source_path),
					None => self.datastore.remove_shell_source(pack),
				},
				Undo::RemoveSentinel { pack, kind } => self.datastore.clear_sentinel(pack, *kind),
			};

			if let Err(e) = result {
				log::warn!("rollback step failed: {e}");
			}
		}
	}
}

fn platform_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
	#[cfg(unix)]
	{
		std::os::unix::fs::symlink(target, link)
	}
	#[cfg(windows)]
	{
		if target.is_dir() {
			std::os::windows::fs::symlink_dir(target, link)
		} else {
			std::os::windows::fs::symlink_file(target, link)
		}
	}
}

/// Runs a provisioning command line as a shell subprocess, mirroring the
/// teacher's hook-execution platform switch.
fn run_shell(command_line: &str, cwd: &Path) -> std::io::Result<std::process::ExitStatus> {
	cfg_if! {
		if #[cfg(target_family = "windows")] {
			Command::new("cmd").arg("/C").arg(command_line).current_dir(cwd).status()
		} else {
			Command::new("sh").arg("-c").arg(command_line).current_dir(cwd).status()
		}
	}
}

//! Dangling-link detection and status roll-up (C9).

use std::path::Path;

use serde::Serialize;

use crate::action::{Action, ActionKind};
use crate::datastore::Datastore;
use crate::pack::Pack;

/// Per-file classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LinkStatus {
	/// `target` -> intermediate -> source, all present.
	Success,
	/// `target` points inside our intermediate tree, but the
	/// intermediate is absent.
	DanglingIntermediateMissing,
	/// Intermediate exists but its source is gone.
	DanglingSourceRemoved,
	/// Neither target nor intermediate exists; would deploy next run.
	Queue,
	/// Target exists but is not ours.
	Warning,
	/// Informational: the entry is `.dodot.toml`.
	Config,
	/// The pack carries `.dodotignore`.
	Ignored,
}

/// One file's status line, for display.
#[derive(Debug, Clone, Serialize)]
pub struct FileStatus {
	/// Pack the file belongs to.
	pub pack: String,
	/// Path relative to the pack root.
	pub relative_path: std::path::PathBuf,
	/// Classification.
	pub status: LinkStatus,
	/// Human-readable detail, set for warnings/dangling states.
	pub message: Option<String>,
}

/// Pack-level roll-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PackStatus {
	/// Every file is [`LinkStatus::Success`].
	Success,
	/// The pack carries `.dodotignore`.
	Ignored,
	/// At least one file is [`LinkStatus::Warning`].
	Partial,
	/// Otherwise (some files still queued).
	Queue,
}

/// Cross-references planned `Link` actions with filesystem state.
#[derive(Debug, Clone, Copy)]
pub struct Detector<'a> {
	datastore: &'a Datastore,
}

impl<'a> Detector<'a> {
	/// Binds a detector to the datastore whose `deployed/symlink` tree
	/// defines "managed".
	#[must_use]
	pub fn new(datastore: &'a Datastore) -> Self {
		Self { datastore }
	}

	/// Classifies every `Link` action for one pack.
	#[must_use]
	pub fn classify_pack(&self, pack: &Pack, actions: &[Action]) -> Vec<FileStatus> {
		if pack.is_ignored() {
			return vec![FileStatus {
				pack: pack.name.clone(),
				relative_path: std::path::PathBuf::new(),
				status: LinkStatus::Ignored,
				message: None,
			}];
		}

		actions
			.iter()
			.filter(|a| a.pack == pack.name)
			.filter_map(|a| match &a.kind {
				ActionKind::Link { source, target } => Some(self.classify_link(pack, source, target)),
				_ => None,
			})
			.collect()
	}

	fn classify_link(&self, pack: &Pack, source: &Path, target: &Path) -> FileStatus {
		let relative_path = source.strip_prefix(&pack.path).unwrap_or(source).to_path_buf();

		let target_meta = std::fs::symlink_metadata(target);

		let (status, message) = match target_meta {
			Err(_) => (LinkStatus::Queue, None),
			Ok(meta) if !meta.is_symlink() => (
				LinkStatus::Warning,
				Some("target exists and is not a managed symlink".to_owned()),
			),
			Ok(_) => {
				let Ok(intermediate) = std::fs::read_link(target) else {
					return FileStatus {
						pack: pack.name.clone(),
						relative_path,
						status: LinkStatus::Warning,
						message: Some("could not read target symlink".to_owned()),
					};
				};

				if !intermediate.starts_with(self.datastore.deployed_symlink_dir()) {
					(LinkStatus::Warning, Some("target points at a foreign symlink".to_owned()))
				} else if !intermediate.exists() {
					(LinkStatus::DanglingIntermediateMissing, Some("intermediate symlink is missing".to_owned()))
				} else if !source.exists() {
					(
						LinkStatus::DanglingSourceRemoved,
						Some(format!("source `{}` no longer exists", source.display())),
					)
				} else {
					(LinkStatus::Success, None)
				}
			}
		};

		FileStatus {
			pack: pack.name.clone(),
			relative_path,
			status,
			message,
		}
	}

	/// Rolls per-file statuses up to one [`PackStatus`].
	#[must_use]
	pub fn roll_up(statuses: &[FileStatus]) -> PackStatus {
		if statuses.iter().any(|s| s.status == LinkStatus::Ignored) {
			return PackStatus::Ignored;
		}

		if statuses.iter().any(|s| {
			matches!(
				s.status,
				LinkStatus::Warning | LinkStatus::DanglingIntermediateMissing | LinkStatus::DanglingSourceRemoved
			)
		}) {
			return PackStatus::Partial;
		}

		if statuses.iter().all(|s| s.status == LinkStatus::Success) && !statuses.is_empty() {
			return PackStatus::Success;
		}

		PackStatus::Queue
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::pack::PackConfig;

	fn pack(root: &Path) -> Pack {
		Pack {
			name: "vim".to_owned(),
			path: root.to_path_buf(),
			config: PackConfig::default(),
		}
	}

	#[test]
	fn queue_when_nothing_deployed() {
		let tmp = tempfile::tempdir().unwrap();
		let datastore = Datastore::new(tmp.path().join("data"));
		let detector = Detector::new(&datastore);

		let action = Action {
			pack: "vim".to_owned(),
			handler: "symlink".to_owned(),
			priority: 0,
			status: crate::action::ActionStatus::Ready,
			metadata: std::collections::BTreeMap::new(),
			kind: ActionKind::Link {
				source: tmp.path().join("vim/vimrc"),
				target: tmp.path().join("home/.vimrc"),
			},
		};

		let statuses = detector.classify_pack(&pack(&tmp.path().join("vim")), &[action]);
		assert_eq!(statuses[0].status, LinkStatus::Queue);
	}

	#[test]
	fn success_after_full_deploy() {
		let tmp = tempfile::tempdir().unwrap();
		let source = tmp.path().join("vim/vimrc");
		std::fs::create_dir_all(source.parent().unwrap()).unwrap();
		std::fs::write(&source, "\" vim").unwrap();

		let datastore = Datastore::new(tmp.path().join("data"));
		let target = tmp.path().join("home/.vimrc");
		let intermediate = datastore.link(&source, &target).unwrap();

		std::fs::create_dir_all(target.parent().unwrap()).unwrap();
		#[cfg(unix)]
		std::os::unix::fs::symlink(&intermediate, &target).unwrap();

		let detector = Detector::new(&datastore);
		let action = Action {
			pack: "vim".to_owned(),
			handler: "symlink".to_owned(),
			priority: 0,
			status: crate::action::ActionStatus::Ready,
			metadata: std::collections::BTreeMap::new(),
			kind: ActionKind::Link { source, target },
		};

		let statuses = detector.classify_pack(&pack(&tmp.path().join("vim")), &[action]);
		assert_eq!(statuses[0].status, LinkStatus::Success);
	}
}

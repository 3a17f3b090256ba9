//! The action planner (C4): sort, dedupe, resolve conflicts, and check
//! pre-existing state.

use std::collections::BTreeMap;
use std::path::Path;

use crate::confirm::ConfirmationRequest;
use crate::fsys::{EntryKind, FS};
use crate::handler::{PlanContext, Registry};
use crate::rule::RuleMatch;

use super::{Action, ActionKind, ActionStatus};

/// Converts rule matches into a sorted, deduplicated, conflict-resolved
/// action list.
#[derive(Debug, Clone, Copy)]
pub struct Planner {
	/// When set, conflicting actions proceed instead of being marked
	/// `Conflict` (last-write-wins at the filesystem level).
	pub force: bool,
}

impl Planner {
	/// Invokes every handler implied by `matches`, then runs the four
	/// planning steps from the design (sort, dedupe, conflict
	/// resolution, pre-existence check).
	pub fn plan(
		&self,
		matches: &[RuleMatch],
		registry: &Registry,
		context: &PlanContext,
		fs: &dyn FS,
		managed_prefix: &Path,
	) -> color_eyre::Result<(Vec<Action>, Vec<ConfirmationRequest>)> {
		let mut grouped: BTreeMap<&str, Vec<RuleMatch>> = BTreeMap::new();

		for m in matches {
			grouped.entry(m.handler_name.as_str()).or_default().push(m.clone());
		}

		let mut actions = Vec::new();
		let mut requests = Vec::new();

		for (handler_name, group) in grouped {
			let Some(handler) = registry.get(handler_name) else {
				log::warn!("no handler registered for `{handler_name}`, skipping {} matches", group.len());
				continue;
			};

			let (mut handler_actions, mut handler_requests) = handler.plan(&group, context)?;
			actions.append(&mut handler_actions);
			requests.append(&mut handler_requests);
		}

		self.sort(&mut actions);
		let mut actions = Self::dedup(actions);
		self.resolve_conflicts(&mut actions);
		self.check_pre_existing(&mut actions, fs, managed_prefix);

		Ok((actions, requests))
	}

	/// Step 1: sort by `(priority descending, type ascending, target
	/// ascending)`.
	fn sort(&self, actions: &mut [Action]) {
		actions.sort_by(|a, b| {
			b.priority
				.cmp(&a.priority)
				.then_with(|| a.kind_tag().cmp(b.kind_tag()))
				.then_with(|| a.target_key().cmp(b.target_key()))
		});
	}

	/// Step 2: dedupe on `(type, target)`, first occurrence wins.
	fn dedup(actions: Vec<Action>) -> Vec<Action> {
		let mut seen = std::collections::BTreeSet::new();
		let mut out = Vec::with_capacity(actions.len());

		for action in actions {
			let key = (action.kind_tag(), action.target_key().clone());

			if seen.insert(key) {
				out.push(action);
			}
		}

		out
	}

	/// Step 3: for each set of remaining actions sharing a target, keep
	/// compatible `Mkdir`s, otherwise mark all-but-first `Conflict`
	/// unless `force`.
	fn resolve_conflicts(&self, actions: &mut [Action]) {
		let mut first_by_target: BTreeMap<std::path::PathBuf, usize> = BTreeMap::new();

		for idx in 0..actions.len() {
			let target = actions[idx].target_key().clone();

			match first_by_target.get(&target) {
				None => {
					first_by_target.insert(target, idx);
				}
				Some(_) => {
					let all_mkdir = matches!(actions[idx].kind, ActionKind::Mkdir { .. });

					if !all_mkdir && !self.force {
						actions[idx].status = ActionStatus::Conflict;
					}
				}
			}
		}
	}

	/// Step 4: pre-existence check for every symlink-creating action.
	fn check_pre_existing(&self, actions: &mut [Action], fs: &dyn FS, managed_prefix: &Path) {
		for action in actions.iter_mut() {
			if !action.status.is_ready() {
				continue;
			}

			let ActionKind::Link { target, .. } = &action.kind else {
				continue;
			};

			match fs.lstat(target) {
				Err(e) if crate::fsys::is_not_found(&e) => {
					// Missing target: status remains Ready.
				}
				Err(_) => {
					action.status = ActionStatus::Error;
				}
				Ok(EntryKind::Symlink) => {
					let is_ours = fs
						.readlink(target)
						.map(|dest| dest.starts_with(managed_prefix))
						.unwrap_or(false);

					if !is_ours && !self.force {
						action.status = ActionStatus::Conflict;
					}
				}
				Ok(_) => {
					if !self.force {
						action.status = ActionStatus::Conflict;
					}
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::fsys::StdFs;
	use crate::handler::Registry;

	fn ctx() -> PlanContext {
		PlanContext {
			default_priority: 0,
			home_root: std::path::PathBuf::from("/home/user"),
		}
	}

	fn rule_match(pack: &str, rel: &str, handler: &str) -> RuleMatch {
		RuleMatch {
			pack_name: pack.to_owned(),
			relative_path: std::path::PathBuf::from(rel),
			absolute_path: std::path::PathBuf::from(format!("/d/{pack}/{rel}")),
			handler_name: handler.to_owned(),
			handler_options: toml::Table::new(),
			priority: 0,
		}
	}

	#[test]
	fn plans_ready_links_for_missing_targets() {
		let tmp = tempfile::tempdir().unwrap();
		let registry = Registry::default();
		let planner = Planner { force: false };
		let matches = vec![rule_match("vim", "vimrc", "symlink")];

		let (actions, _) = planner
			.plan(&matches, &registry, &ctx(), &StdFs, &tmp.path().join("deployed/symlink"))
			.unwrap();

		assert_eq!(actions.len(), 1);
		assert_eq!(actions[0].status, ActionStatus::Ready);
	}

	#[test]
	fn dedupes_identical_target_actions() {
		let registry = Registry::default();
		let planner = Planner { force: false };
		let matches = vec![rule_match("vim", "vimrc", "symlink"), rule_match("vim", "vimrc", "symlink")];

		let tmp = tempfile::tempdir().unwrap();
		let (actions, _) = planner
			.plan(&matches, &registry, &ctx(), &StdFs, &tmp.path().join("deployed/symlink"))
			.unwrap();

		assert_eq!(actions.len(), 1);
	}
}

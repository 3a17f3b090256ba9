//! Configuration handler: one managed symlink per matched file.

use std::collections::BTreeMap;

use crate::action::{Action, ActionKind, ActionStatus};
use crate::confirm::ConfirmationRequest;
use crate::rule::RuleMatch;

use super::{Category, Handler, PlanContext};

/// Links a pack file to its dotted location under the user's home.
#[derive(Debug, Clone, Copy)]
pub struct SymlinkHandler;

impl Handler for SymlinkHandler {
	fn name(&self) -> &'static str {
		"symlink"
	}

	fn category(&self) -> Category {
		Category::Configuration
	}

	fn plan(
		&self,
		matches: &[RuleMatch],
		context: &PlanContext,
	) -> color_eyre::Result<(Vec<Action>, Vec<ConfirmationRequest>)> {
		let actions = matches
			.iter()
			.map(|m| {
				let basename = m
					.relative_path
					.file_name()
					.expect("rule matches always have a file name")
					.to_string_lossy();

				let target = context.home_root.join(format!(".{basename}"));

				Action {
					pack: m.pack_name.clone(),
					handler: self.name().to_owned(),
					priority: context.default_priority,
					status: ActionStatus::Ready,
					metadata: BTreeMap::new(),
					kind: ActionKind::Link {
						source: m.absolute_path.clone(),
						target,
					},
				}
			})
			.collect();

		Ok((actions, Vec::new()))
	}
}

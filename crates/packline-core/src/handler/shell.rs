//! Configuration handler: arrange for a pack script to be sourced by the
//! user's shell.

use std::collections::BTreeMap;

use crate::action::{Action, ActionKind, ActionStatus};
use crate::confirm::ConfirmationRequest;
use crate::rule::RuleMatch;

use super::{Category, Handler, PlanContext};

/// Sources a pack-local script from the shell-init fragment.
#[derive(Debug, Clone, Copy)]
pub struct ShellHandler;

impl Handler for ShellHandler {
	fn name(&self) -> &'static str {
		"shell"
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
			.map(|m| Action {
				pack: m.pack_name.clone(),
				handler: self.name().to_owned(),
				priority: context.default_priority,
				status: ActionStatus::Ready,
				metadata: BTreeMap::new(),
				kind: ActionKind::ShellAdd {
					source: m.absolute_path.clone(),
				},
			})
			.collect();

		Ok((actions, Vec::new()))
	}
}

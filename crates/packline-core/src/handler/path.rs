//! Configuration handler: prepend a pack-local directory to PATH.

use std::collections::BTreeMap;

use crate::action::{Action, ActionKind, ActionStatus};
use crate::confirm::ConfirmationRequest;
use crate::rule::RuleMatch;

use super::{Category, Handler, PlanContext};

/// Adds a pack-local directory (e.g. `bin/`) to PATH via the datastore's
/// per-pack marker.
#[derive(Debug, Clone, Copy)]
pub struct PathHandler;

impl Handler for PathHandler {
	fn name(&self) -> &'static str {
		"path"
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
				kind: ActionKind::PathAdd {
					source: m.absolute_path.clone(),
				},
			})
			.collect();

		Ok((actions, Vec::new()))
	}
}

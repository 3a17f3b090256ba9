//! Code-execution handler: run `brew bundle` against a pack's `Brewfile`.

use std::collections::BTreeMap;

use crate::action::{Action, ActionKind, ActionStatus, ProvisionKind};
use crate::confirm::ConfirmationRequest;
use crate::rule::RuleMatch;

use super::{Category, Handler, PlanContext};

/// Invokes `brew bundle` against a matched `Brewfile`, gated by the
/// provisioning sentinel (C5).
#[derive(Debug, Clone, Copy)]
pub struct HomebrewHandler;

impl Handler for HomebrewHandler {
	fn name(&self) -> &'static str {
		"homebrew"
	}

	fn category(&self) -> Category {
		Category::CodeExecution
	}

	fn plan(
		&self,
		matches: &[RuleMatch],
		context: &PlanContext,
	) -> color_eyre::Result<(Vec<Action>, Vec<ConfirmationRequest>)> {
		let mut actions = Vec::with_capacity(matches.len());
		let mut requests = Vec::with_capacity(matches.len());

		for m in matches {
			actions.push(Action {
				pack: m.pack_name.clone(),
				handler: self.name().to_owned(),
				priority: context.default_priority,
				status: ActionStatus::Ready,
				metadata: BTreeMap::new(),
				kind: ActionKind::Provision {
					kind: ProvisionKind::Homebrew,
					source: m.absolute_path.clone(),
				},
			});

			requests.push(ConfirmationRequest {
				id: format!("homebrew:{}", m.pack_name),
				pack: m.pack_name.clone(),
				handler: self.name().to_owned(),
				operation: "run".to_owned(),
				title: format!("Run `brew bundle` for `{}`?", m.pack_name),
				description: format!("Installs every formula/cask listed in `{}`.", m.relative_path.display()),
				items: vec![m.relative_path.display().to_string()],
				default_bool: false,
			});
		}

		Ok((actions, requests))
	}
}

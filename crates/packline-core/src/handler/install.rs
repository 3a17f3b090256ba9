//! Code-execution handler: run a pack's `install.sh` once.

use std::collections::BTreeMap;

use crate::action::{Action, ActionKind, ActionStatus, ProvisionKind};
use crate::confirm::ConfirmationRequest;
use crate::rule::RuleMatch;

use super::{Category, Handler, PlanContext};

/// Executes a matched `install.sh`, gated by the provisioning sentinel
/// (C5).
#[derive(Debug, Clone, Copy)]
pub struct InstallScriptHandler;

impl Handler for InstallScriptHandler {
	fn name(&self) -> &'static str {
		"install"
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
					kind: ProvisionKind::InstallScript,
					source: m.absolute_path.clone(),
				},
			});

			requests.push(ConfirmationRequest {
				id: format!("install:{}", m.pack_name),
				pack: m.pack_name.clone(),
				handler: self.name().to_owned(),
				operation: "run".to_owned(),
				title: format!("Run `{}`?", m.relative_path.display()),
				description: format!("Executes `{}` as a shell script.", m.relative_path.display()),
				items: vec![m.relative_path.display().to_string()],
				default_bool: false,
			});
		}

		Ok((actions, requests))
	}
}

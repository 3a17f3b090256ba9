//! Handlers as capabilities, not classes (§9 Design Notes).
//!
//! Each handler is a small struct implementing [`Handler`]; there is no
//! shared base type beyond the trait. Dispatch goes through [`Registry`],
//! a small name-keyed table populated once at start-up.

mod homebrew;
mod install;
mod path;
mod shell;
mod symlink;

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::action::Action;
use crate::confirm::ConfirmationRequest;
use crate::rule::RuleMatch;

pub use homebrew::HomebrewHandler;
pub use install::InstallScriptHandler;
pub use path::PathHandler;
pub use shell::ShellHandler;
pub use symlink::SymlinkHandler;

/// Handler categories, tagged data rather than subclasses — used by the
/// command façade to filter `link` (configuration only) from
/// `provision` (everything).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
	/// Pure filesystem arrangement: link, shell-source, PATH.
	Configuration,
	/// Runs an external process: install scripts, brew.
	CodeExecution,
}

/// Extra, read-only context a handler needs to plan, beyond the matches
/// themselves.
#[derive(Debug, Clone)]
pub struct PlanContext {
	/// Default priority assigned to actions this handler produces.
	pub default_priority: i32,
	/// The user's home root, for computing symlink/append targets.
	pub home_root: PathBuf,
}

/// Turns rule matches into actions; knows how to categorize itself.
///
/// `plan` is pure: it must not touch the filesystem beyond what is
/// already implied by the match (its absolute path, its existing
/// content when relevant for an `Action::Copy`/`Action::Template`
/// preview). All real mutation happens later, in [`crate::exec`].
pub trait Handler {
	/// Name this handler is registered and dispatched under.
	fn name(&self) -> &'static str;

	/// Whether this handler only rearranges the filesystem or also
	/// executes external processes.
	fn category(&self) -> Category;

	/// Converts matches assigned to this handler into actions, plus any
	/// confirmation requests those actions should be gated on.
	fn plan(
		&self,
		matches: &[RuleMatch],
		context: &PlanContext,
	) -> color_eyre::Result<(Vec<Action>, Vec<ConfirmationRequest>)>;
}

/// Name-keyed table of the built-in handlers, populated once at
/// start-up and passed to constructors rather than held as a true
/// global (§9 Design Notes), to keep tests hermetic.
pub struct Registry {
	handlers: BTreeMap<&'static str, Box<dyn Handler>>,
}

impl std::fmt::Debug for Registry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Registry")
			.field("handlers", &self.handlers.keys().collect::<Vec<_>>())
			.finish()
	}
}

impl Default for Registry {
	fn default() -> Self {
		let mut registry = Self {
			handlers: BTreeMap::new(),
		};

		registry.insert(Box::new(SymlinkHandler));
		registry.insert(Box::new(ShellHandler));
		registry.insert(Box::new(PathHandler));
		registry.insert(Box::new(HomebrewHandler));
		registry.insert(Box::new(InstallScriptHandler));

		registry
	}
}

impl Registry {
	/// Registers (or replaces) a handler.
	pub fn insert(&mut self, handler: Box<dyn Handler>) {
		self.handlers.insert(handler.name(), handler);
	}

	/// Looks up a handler by name.
	#[must_use]
	pub fn get(&self, name: &str) -> Option<&dyn Handler> {
		self.handlers.get(name).map(std::convert::AsRef::as_ref)
	}

	/// Iterates all registered handlers.
	pub fn iter(&self) -> impl Iterator<Item = &dyn Handler> {
		self.handlers.values().map(std::convert::AsRef::as_ref)
	}
}

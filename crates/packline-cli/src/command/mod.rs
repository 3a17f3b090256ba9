//! One function per subcommand, composing discovery → rule matching →
//! handler planning → confirmation → (provisioning gate) → execution.

use std::path::{Path, PathBuf};

use color_eyre::eyre::eyre;
use color_eyre::Result;
use packline_core::action::plan::Planner;
use packline_core::action::{Action, ActionKind, ActionStatus};
use packline_core::confirm::{Collector, ConfirmationDialog, ConfirmationRequest};
use packline_core::datastore::{Datastore, Lock};
use packline_core::exec::{Executor, ExecutorOptions};
use packline_core::fsys::StdFs;
use packline_core::handler::{Category, PlanContext, Registry};
use packline_core::pack::{self, Pack};
use packline_core::provision::Gate;
use packline_core::rule::{Matcher, RuleMatch};
use packline_core::safety::Validator;
use packline_core::seed;
use packline_core::status::Detector;

use crate::opt::{self, PackShared};
use crate::util::{self, DeclineAllDialog, TerminalDialog};

/// Resolves the home root from `$HOME`, mirroring the one environment
/// variable the engine's sanctioned-roots design actually requires.
fn home_root() -> Result<PathBuf> {
	std::env::var_os("HOME").map(PathBuf::from).ok_or_else(|| eyre!("HOME is not set"))
}

fn open_datastore(shared: &PackShared) -> Result<Datastore> {
	let root = match &shared.data_dir {
		Some(dir) => dir.clone(),
		None => packline_core::datastore::default_root()?,
	};
	Ok(Datastore::new(root))
}

fn discover_and_select(shared: &PackShared) -> Result<Result<Vec<Pack>, i32>> {
	let all = pack::discover(&shared.dotfiles_root)?;

	match pack::select(&all, &shared.packs) {
		Ok(packs) => Ok(Ok(packs)),
		Err(e) => {
			log::error!("{e}");
			Ok(Err(e.exit_code()))
		}
	}
}

fn match_selected(packs: &[Pack]) -> Result<Vec<RuleMatch>> {
	let matcher = Matcher::default();
	let mut matches = Vec::new();

	for pack in packs {
		matches.extend(matcher.match_pack(pack)?);
	}

	Ok(matches)
}

fn filter_by_category(matches: Vec<RuleMatch>, registry: &Registry, category: Category) -> Vec<RuleMatch> {
	matches
		.into_iter()
		.filter(|m| registry.get(&m.handler_name).is_some_and(|h| h.category() == category))
		.collect()
}

/// Gathers confirmation requests, presents them, and marks any declined
/// action `Skipped`.
fn run_confirmations(requests: Vec<ConfirmationRequest>, actions: &mut [Action], dialog: &dyn ConfirmationDialog) -> Result<()> {
	if requests.is_empty() {
		return Ok(());
	}

	let mut collector = Collector::new();
	for request in requests {
		collector.add(request)?;
	}

	let sorted = collector.into_sorted();
	let responses = dialog.present(&sorted)?;

	for (request, response) in sorted.iter().zip(responses.iter()) {
		if response.approved {
			continue;
		}

		for action in actions.iter_mut() {
			if action.pack == request.pack && action.handler == request.handler && matches!(action.kind, ActionKind::Provision { .. }) {
				action.status = ActionStatus::Skipped;
			}
		}
	}

	Ok(())
}

/// Builds the shared path-safety validator. `allow_home_symlinks` is
/// `true` for the commands whose whole purpose is writing into the
/// user's home (`link`/`unlink`/`adopt`); everything else leaves it off.
fn build_validator(dotfiles_root: &Path, datastore_root: &Path, home: &Path, allow_home_symlinks: bool) -> Validator {
	Validator::new(dotfiles_root.to_path_buf(), datastore_root.to_path_buf(), home.to_path_buf(), allow_home_symlinks)
}

/// Handles the `link` command: deploys configuration-category actions
/// (symlink, shell-source, PATH) for the selected packs.
pub fn link(opt::Link { shared, dry_run, force, output }: opt::Link) -> Result<i32> {
	let home = home_root()?;
	let datastore = open_datastore(&shared)?;
	let _lock = Lock::acquire(&datastore)?;

	let packs = match discover_and_select(&shared)? {
		Ok(packs) => packs,
		Err(code) => return Ok(code),
	};

	let registry = Registry::default();
	let matches = filter_by_category(match_selected(&packs)?, &registry, Category::Configuration);

	let validator = build_validator(&shared.dotfiles_root, datastore.root(), &home, true);
	let context = PlanContext {
		default_priority: 0,
		home_root: home,
	};

	let planner = Planner { force };
	let (mut actions, requests) = planner.plan(&matches, &registry, &context, &StdFs, &datastore.deployed_symlink_dir())?;
	run_confirmations(requests, &mut actions, &TerminalDialog)?;

	let executor = Executor::new(
		ExecutorOptions {
			dry_run,
			force,
			rollback_on_error: true,
		},
		&datastore,
		&validator,
	);

	let result = executor.execute(actions);
	log::debug!("ExecutionResult:\n{:#?}", result);
	util::log_execution_result(&result, dry_run);
	util::handle_output(output, &result);

	Ok(result.exit_code(force))
}

/// Handles the `provision` command: runs code-execution actions (install
/// scripts, Homebrew bundles), gated by the provisioning sentinel.
pub fn provision(
	opt::Provision {
		shared,
		dry_run,
		force,
		provision_rerun,
		no_provision,
		output,
	}: opt::Provision,
) -> Result<i32> {
	let home = home_root()?;
	let datastore = open_datastore(&shared)?;
	let _lock = Lock::acquire(&datastore)?;

	let packs = match discover_and_select(&shared)? {
		Ok(packs) => packs,
		Err(code) => return Ok(code),
	};

	let registry = Registry::default();
	let matches = filter_by_category(match_selected(&packs)?, &registry, Category::CodeExecution);

	let validator = build_validator(&shared.dotfiles_root, datastore.root(), &home, false);
	let context = PlanContext {
		default_priority: 0,
		home_root: home,
	};

	let planner = Planner { force };
	let (mut actions, requests) = planner.plan(&matches, &registry, &context, &StdFs, &datastore.deployed_symlink_dir())?;

	let dialog: &dyn ConfirmationDialog = if no_provision { &DeclineAllDialog } else { &TerminalDialog };
	run_confirmations(requests, &mut actions, dialog)?;

	let gate = Gate {
		force_reprovision: provision_rerun,
		skip_provisioning: no_provision,
		datastore: &datastore,
	};
	let (actions, skipped_packs) = gate.apply(actions)?;

	for pack in skipped_packs {
		log::info!("pack `{pack}` already provisioned with this source, skipping");
	}

	let executor = Executor::new(
		ExecutorOptions {
			dry_run,
			force,
			rollback_on_error: true,
		},
		&datastore,
		&validator,
	);

	let result = executor.execute(actions);
	log::debug!("ExecutionResult:\n{:#?}", result);
	util::log_execution_result(&result, dry_run);
	util::handle_output(output, &result);

	Ok(result.exit_code(force))
}

/// Handles the `unlink` command: removes link/shell/PATH datastore state
/// for the selected packs without touching provisioning sentinels.
pub fn unlink(opt::Unlink { shared, dry_run }: opt::Unlink) -> Result<i32> {
	let home = home_root()?;
	let datastore = open_datastore(&shared)?;
	let _lock = Lock::acquire(&datastore)?;

	let packs = match discover_and_select(&shared)? {
		Ok(packs) => packs,
		Err(code) => return Ok(code),
	};

	let registry = Registry::default();
	let matches = filter_by_category(match_selected(&packs)?, &registry, Category::Configuration);

	let context = PlanContext {
		default_priority: 0,
		home_root: home.clone(),
	};
	let planner = Planner { force: true };
	let (actions, _) = planner.plan(&matches, &registry, &context, &StdFs, &datastore.deployed_symlink_dir())?;

	let mut removed = 0;

	for action in &actions {
		match &action.kind {
			ActionKind::Link { target, .. } => {
				if dry_run {
					log::info!("would remove `{}`", target.display());
					removed += 1;
					continue;
				}

				if let Ok(dest) = std::fs::read_link(target) {
					if dest.starts_with(datastore.deployed_symlink_dir()) {
						let _ = std::fs::remove_file(target);
						if let Some(basename) = dest.file_name().and_then(|n| n.to_str()) {
							let _ = datastore.unlink(basename);
						}
						removed += 1;
					}
				}
			}
			ActionKind::PathAdd { .. } => {
				if !dry_run {
					let _ = datastore.remove_from_path(&action.pack);
				}
				removed += 1;
			}
			ActionKind::ShellAdd { .. } => {
				if !dry_run {
					let _ = datastore.remove_shell_source(&action.pack);
				}
				removed += 1;
			}
			_ => {}
		}
	}

	if !dry_run {
		datastore.rewrite_shell_fragment()?;
	}

	log::info!("removed {removed} managed entries");
	Ok(0)
}

/// Handles the `deprovision` command: clears provisioning sentinels for
/// the selected packs.
pub fn deprovision(opt::Deprovision { shared, dry_run }: opt::Deprovision) -> Result<i32> {
	let datastore = open_datastore(&shared)?;
	let _lock = Lock::acquire(&datastore)?;

	let packs = match discover_and_select(&shared)? {
		Ok(packs) => packs,
		Err(code) => return Ok(code),
	};

	let registry = Registry::default();
	let matches = filter_by_category(match_selected(&packs)?, &registry, Category::CodeExecution);

	let context = PlanContext {
		default_priority: 0,
		home_root: home_root()?,
	};
	let planner = Planner { force: true };
	let (actions, _) = planner.plan(&matches, &registry, &context, &StdFs, &datastore.deployed_symlink_dir())?;

	let mut cleared = 0;

	for action in &actions {
		if let ActionKind::Provision { kind, .. } = &action.kind {
			if dry_run {
				log::info!("would clear sentinel for pack `{}`", action.pack);
			} else {
				datastore.clear_sentinel(&action.pack, *kind)?;
			}
			cleared += 1;
		}
	}

	log::info!("cleared {cleared} provisioning sentinels");
	Ok(0)
}

/// Handles the `status` command: reports per-pack/per-file link status
/// without mutating anything.
pub fn status(opt::Status { shared, output }: opt::Status) -> Result<i32> {
	let home = home_root()?;
	let datastore = open_datastore(&shared)?;

	let packs = match discover_and_select(&shared)? {
		Ok(packs) => packs,
		Err(code) => return Ok(code),
	};

	let registry = Registry::default();
	let matches = filter_by_category(match_selected(&packs)?, &registry, Category::Configuration);

	let context = PlanContext {
		default_priority: 0,
		home_root: home,
	};
	// `status` never mutates; plan with `force: true` so the reported
	// classification reflects actual filesystem state, not a conflict
	// the planner would otherwise mark against a not-yet-deployed file.
	let planner = Planner { force: true };
	let (actions, _) = planner.plan(&matches, &registry, &context, &StdFs, &datastore.deployed_symlink_dir())?;

	let detector = Detector::new(&datastore);
	let mut report = Vec::with_capacity(packs.len());

	for pack in &packs {
		let file_statuses = detector.classify_pack(pack, &actions);
		let pack_status = Detector::roll_up(&file_statuses);

		println!("{}: {:?}", pack.name, pack_status);

		for file in &file_statuses {
			if let Some(message) = &file.message {
				println!("  {} {}: {message}", file.relative_path.display(), format_args!("{:?}", file.status));
			}
		}

		report.push((pack.name.clone(), pack_status, file_statuses));
	}

	util::handle_status_output(output, &report);

	// `status` never mutates, so it never returns the conflict exit code
	// (2) reserved for a mutating command blocked without `--force`.
	Ok(0)
}

/// Handles the `init` command: creates a new, empty pack directory.
pub fn init(opt::Init { shared, name }: opt::Init) -> Result<i32> {
	let pack_dir = shared.dotfiles_root.join(&name);

	if pack_dir.exists() {
		log::error!("pack `{name}` already exists at `{}`", pack_dir.display());
		return Ok(1);
	}

	std::fs::create_dir_all(&pack_dir)?;
	log::info!("created pack `{name}` at `{}`", pack_dir.display());

	Ok(0)
}

/// Handles the `fill` command: writes any template files missing from
/// an existing pack. Packline ships no built-in templates, so this
/// seeds only files the caller has placed under a sibling
/// `<dotfiles_root>/.templates/` directory, matched by name.
pub fn fill(opt::Fill { shared, name }: opt::Fill) -> Result<i32> {
	let pack_dir = shared.dotfiles_root.join(&name);

	if !pack_dir.is_dir() {
		log::error!("pack `{name}` does not exist at `{}`", pack_dir.display());
		return Ok(1);
	}

	let templates_dir = shared.dotfiles_root.join(".templates");

	if !templates_dir.is_dir() {
		log::info!("no `.templates` directory found under the dotfiles root, nothing to fill");
		return Ok(0);
	}

	let home = home_root()?;
	let vars = seed::standard_vars(&name, &shared.dotfiles_root, &home);
	let mut filled = 0;

	for entry in std::fs::read_dir(&templates_dir)? {
		let entry = entry?;
		if !entry.file_type()?.is_file() {
			continue;
		}

		let destination = pack_dir.join(entry.file_name());

		if destination.exists() {
			continue;
		}

		let content = std::fs::read_to_string(entry.path())?;
		let rendered = seed::fill(&content, &vars);
		std::fs::write(&destination, rendered)?;
		filled += 1;
	}

	log::info!("filled {filled} missing template file(s) into pack `{name}`");
	Ok(0)
}

/// Handles the `adopt` command: moves a real home file into a pack, then
/// links it back to its original location.
pub fn adopt(opt::Adopt { shared, name, file }: opt::Adopt) -> Result<i32> {
	let home = home_root()?;
	let datastore = open_datastore(&shared)?;
	let _lock = Lock::acquire(&datastore)?;

	let pack_dir = shared.dotfiles_root.join(&name);

	if !pack_dir.is_dir() {
		log::error!("pack `{name}` does not exist at `{}`", pack_dir.display());
		return Ok(1);
	}

	let source_in_home = if file.is_absolute() { file.clone() } else { home.join(&file) };

	if !source_in_home.exists() {
		log::error!("`{}` does not exist", source_in_home.display());
		return Ok(1);
	}

	let basename = source_in_home
		.file_name()
		.ok_or_else(|| eyre!("`{}` has no basename", source_in_home.display()))?;

	let destination = pack_dir.join(basename);
	std::fs::rename(&source_in_home, &destination)?;

	let validator = build_validator(&shared.dotfiles_root, datastore.root(), &home, true);
	let intermediate = datastore.link(&destination, &source_in_home)?;

	if let Err(e) = validator.validate(&source_in_home, packline_core::safety::Intent::SymlinkTarget) {
		log::error!("adopted file but could not re-link it: {e}");
		return Ok(3);
	}

	#[cfg(unix)]
	std::os::unix::fs::symlink(&intermediate, &source_in_home)?;
	#[cfg(windows)]
	std::os::windows::fs::symlink_file(&intermediate, &source_in_home)?;

	log::info!(
		"adopted `{}` into pack `{name}` and linked it back via `{}`",
		destination.display(),
		source_in_home.display()
	);

	Ok(0)
}

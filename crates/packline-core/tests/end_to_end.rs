//! End-to-end scenarios exercising the full C2-through-C9 pipeline
//! against real temporary directories: fresh link, conflicting targets
//! (with and without `--force`), idempotent and changed provisioning,
//! and dangling-link detection.

use std::path::Path;

use packline_core::action::plan::Planner;
use packline_core::action::ActionKind;
use packline_core::datastore::Datastore;
use packline_core::exec::{Executor, ExecutorOptions};
use packline_core::fsys::StdFs;
use packline_core::handler::{Category, PlanContext, Registry};
use packline_core::pack;
use packline_core::provision::Gate;
use packline_core::rule::Matcher;
use packline_core::safety::Validator;
use packline_core::status::{Detector, LinkStatus, PackStatus};

struct Fixture {
	_tmp: tempfile::TempDir,
	dotfiles_root: std::path::PathBuf,
	home: std::path::PathBuf,
	datastore: Datastore,
}

impl Fixture {
	fn new() -> Self {
		let tmp = tempfile::tempdir().expect("tempdir");
		let dotfiles_root = tmp.path().join("dotfiles");
		let home = tmp.path().join("home");
		let data_root = tmp.path().join("data");

		std::fs::create_dir_all(&dotfiles_root).unwrap();
		std::fs::create_dir_all(&home).unwrap();

		Self {
			datastore: Datastore::new(data_root),
			_tmp: tmp,
			dotfiles_root,
			home,
		}
	}

	fn make_pack(&self, name: &str) -> std::path::PathBuf {
		let dir = self.dotfiles_root.join(name);
		std::fs::create_dir_all(&dir).unwrap();
		dir
	}

	fn validator(&self, allow_home_symlinks: bool) -> Validator {
		Validator::new(
			self.dotfiles_root.clone(),
			self.datastore.root().to_path_buf(),
			self.home.clone(),
			allow_home_symlinks,
		)
	}

	fn context(&self) -> PlanContext {
		PlanContext {
			default_priority: 0,
			home_root: self.home.clone(),
		}
	}

	fn plan_configuration(&self, registry: &Registry, force: bool) -> (Vec<packline_core::action::Action>, usize) {
		let all_packs = pack::discover(&self.dotfiles_root).unwrap();
		let matches: Vec<_> = all_packs
			.iter()
			.flat_map(|p| Matcher::default().match_pack(p).unwrap())
			.filter(|m| registry.get(&m.handler_name).is_some_and(|h| h.category() == Category::Configuration))
			.collect();

		let planner = Planner { force };
		let (actions, requests) = planner
			.plan(&matches, registry, &self.context(), &StdFs, &self.datastore.deployed_symlink_dir())
			.unwrap();

		(actions, requests.len())
	}
}

#[test]
fn fresh_link_deploys_a_new_symlink() {
	let fixture = Fixture::new();
	let pack_dir = fixture.make_pack("vim");
	std::fs::write(pack_dir.join("vimrc"), "\" vim").unwrap();

	let registry = Registry::default();
	let (actions, _) = fixture.plan_configuration(&registry, false);
	assert_eq!(actions.len(), 1);

	let validator = fixture.validator(true);
	let executor = Executor::new(ExecutorOptions::default(), &fixture.datastore, &validator);
	let result = executor.execute(actions);

	assert_eq!(result.exit_code(false), 0);

	let target = fixture.home.join(".vimrc");
	let meta = std::fs::symlink_metadata(&target).unwrap();
	assert!(meta.is_symlink());
	assert_eq!(std::fs::read_to_string(&target).unwrap(), "\" vim");
}

#[test]
fn conflicting_target_is_blocked_without_force() {
	let fixture = Fixture::new();
	let pack_dir = fixture.make_pack("vim");
	std::fs::write(pack_dir.join("vimrc"), "\" vim").unwrap();
	std::fs::write(fixture.home.join(".vimrc"), "\" someone else's vimrc").unwrap();

	let registry = Registry::default();
	let (actions, _) = fixture.plan_configuration(&registry, false);

	let validator = fixture.validator(true);
	let executor = Executor::new(ExecutorOptions::default(), &fixture.datastore, &validator);
	let result = executor.execute(actions);

	assert_eq!(result.exit_code(false), 2);
	assert!(result.actions.iter().any(|a| matches!(a.outcome, packline_core::exec::ActionOutcome::Conflict(_))));
	assert_eq!(std::fs::read_to_string(fixture.home.join(".vimrc")).unwrap(), "\" someone else's vimrc");
}

#[test]
fn conflicting_target_proceeds_with_force() {
	let fixture = Fixture::new();
	let pack_dir = fixture.make_pack("vim");
	std::fs::write(pack_dir.join("vimrc"), "\" vim").unwrap();
	std::fs::write(fixture.home.join(".vimrc"), "\" someone else's vimrc").unwrap();

	let registry = Registry::default();
	let (actions, _) = fixture.plan_configuration(&registry, true);

	let validator = fixture.validator(true);
	let executor = Executor::new(
		ExecutorOptions {
			dry_run: false,
			force: true,
			rollback_on_error: true,
		},
		&fixture.datastore,
		&validator,
	);
	let result = executor.execute(actions);

	assert_eq!(result.exit_code(true), 0);
	let target = fixture.home.join(".vimrc");
	assert!(std::fs::symlink_metadata(&target).unwrap().is_symlink());
	assert_eq!(std::fs::read_to_string(&target).unwrap(), "\" vim");
}

#[test]
fn idempotent_relink_reports_ready_not_conflict() {
	let fixture = Fixture::new();
	let pack_dir = fixture.make_pack("vim");
	std::fs::write(pack_dir.join("vimrc"), "\" vim").unwrap();

	let registry = Registry::default();
	let validator = fixture.validator(true);

	let (actions, _) = fixture.plan_configuration(&registry, false);
	Executor::new(ExecutorOptions::default(), &fixture.datastore, &validator)
		.execute(actions)
		.exit_code(false);

	// Second run over the same, already-deployed state.
	let (actions, _) = fixture.plan_configuration(&registry, false);
	let result = Executor::new(ExecutorOptions::default(), &fixture.datastore, &validator).execute(actions);

	assert_eq!(result.exit_code(false), 0);
	assert!(result.actions.iter().all(|a| a.outcome.is_ready()));
}

fn provision_actions(fixture: &Fixture, registry: &Registry, force: bool) -> Vec<packline_core::action::Action> {
	let all_packs = pack::discover(&fixture.dotfiles_root).unwrap();
	let matches: Vec<_> = all_packs
		.iter()
		.flat_map(|p| Matcher::default().match_pack(p).unwrap())
		.filter(|m| registry.get(&m.handler_name).is_some_and(|h| h.category() == Category::CodeExecution))
		.collect();

	let planner = Planner { force };
	let (actions, _) = planner
		.plan(&matches, registry, &fixture.context(), &StdFs, &fixture.datastore.deployed_symlink_dir())
		.unwrap();

	actions
}

#[test]
fn provisioning_is_idempotent_across_reruns() {
	let fixture = Fixture::new();
	let pack_dir = fixture.make_pack("tools");
	let script = pack_dir.join("install.sh");
	std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
	}

	let registry = Registry::default();
	let validator = fixture.validator(false);

	let actions = provision_actions(&fixture, &registry, false);
	let gate = Gate {
		force_reprovision: false,
		skip_provisioning: false,
		datastore: &fixture.datastore,
	};
	let (actions, skipped) = gate.apply(actions).unwrap();
	assert!(skipped.is_empty());

	let result = Executor::new(ExecutorOptions::default(), &fixture.datastore, &validator).execute(actions);
	assert_eq!(result.exit_code(false), 0);
	assert!(result.actions.iter().all(|a| a.outcome.is_ready()));

	// Second run: same source, should be gated out entirely.
	let actions = provision_actions(&fixture, &registry, false);
	let gate = Gate {
		force_reprovision: false,
		skip_provisioning: false,
		datastore: &fixture.datastore,
	};
	let (actions, skipped) = gate.apply(actions).unwrap();

	assert_eq!(skipped, vec!["tools".to_owned()]);
	assert!(actions.is_empty());
}

#[test]
fn changed_script_is_reprovisioned() {
	let fixture = Fixture::new();
	let pack_dir = fixture.make_pack("tools");
	let script = pack_dir.join("install.sh");
	std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();

	let registry = Registry::default();
	let validator = fixture.validator(false);

	let actions = provision_actions(&fixture, &registry, false);
	let gate = Gate {
		force_reprovision: false,
		skip_provisioning: false,
		datastore: &fixture.datastore,
	};
	let (actions, _) = gate.apply(actions).unwrap();
	Executor::new(ExecutorOptions::default(), &fixture.datastore, &validator).execute(actions);

	// Edit the script's content: checksum changes, so it should run again.
	std::fs::write(&script, "#!/bin/sh\necho changed\nexit 0\n").unwrap();

	let actions = provision_actions(&fixture, &registry, false);
	let gate = Gate {
		force_reprovision: false,
		skip_provisioning: false,
		datastore: &fixture.datastore,
	};
	let (actions, skipped) = gate.apply(actions).unwrap();

	assert!(skipped.is_empty());
	assert_eq!(actions.len(), 1);
	assert!(matches!(actions[0].kind, ActionKind::Provision { .. }));
}

#[test]
fn removed_source_is_detected_as_dangling() {
	let fixture = Fixture::new();
	let pack_dir = fixture.make_pack("vim");
	let source = pack_dir.join("vimrc");
	std::fs::write(&source, "\" vim").unwrap();

	let registry = Registry::default();
	let validator = fixture.validator(true);

	let (actions, _) = fixture.plan_configuration(&registry, false);
	Executor::new(ExecutorOptions::default(), &fixture.datastore, &validator).execute(actions);

	// Remove the underlying pack file; the symlink chain is now broken.
	std::fs::remove_file(&source).unwrap();

	let all_packs = pack::discover(&fixture.dotfiles_root).unwrap();
	let pack = all_packs.iter().find(|p| p.name == "vim").unwrap();

	let (actions, _) = fixture.plan_configuration(&registry, true);
	let detector = Detector::new(&fixture.datastore);
	let statuses = detector.classify_pack(pack, &actions);

	assert_eq!(statuses.len(), 1);
	assert_eq!(statuses[0].status, LinkStatus::DanglingSourceRemoved);
	assert_eq!(Detector::roll_up(&statuses), PackStatus::Partial);
}

#[test]
fn protected_path_is_never_written_even_with_force() {
	let fixture = Fixture::new();
	let pack_dir = fixture.make_pack("creds");
	// The symlink handler dotfiles a bare basename (`netrc` -> `.netrc`),
	// landing squarely on a `DEFAULT_PROTECTED_PATHS` entry.
	std::fs::write(pack_dir.join("netrc"), "machine example.com login me").unwrap();

	let registry = Registry::default();
	let (actions, _) = fixture.plan_configuration(&registry, true);

	let validator = fixture.validator(true);
	let executor = Executor::new(
		ExecutorOptions {
			dry_run: false,
			force: true,
			rollback_on_error: true,
		},
		&fixture.datastore,
		&validator,
	);
	let result = executor.execute(actions);

	assert!(result.actions.iter().any(|a| a.outcome.is_error()));
	assert!(!Path::new(&fixture.home.join(".netrc")).exists());
}

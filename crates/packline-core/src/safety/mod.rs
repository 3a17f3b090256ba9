//! Path safety validation (C1).
//!
//! Every filesystem mutation the engine performs funnels through
//! [`Validator::validate`] first. The gate resolves the path (expanding
//! `~`, cleaning `..`, resolving symlinks on any existing prefix) before
//! checking it against protected-path globs and sanctioned roots, so an
//! adversarial or careless symlink planted earlier cannot be used to
//! escape.

use std::path::{Path, PathBuf};

use crate::error::PacklineError;

/// Default glob patterns that may never be mutated, regardless of other
/// rules. Trimmed to credential/identity material — the system deploys
/// *into* dotfiles, it does not manage editor or linter configuration
/// away from the user.
pub const DEFAULT_PROTECTED_PATHS: &[&str] = &[
	".ssh/*",
	".ssh/**/*",
	".gnupg/*",
	".gnupg/**/*",
	".aws/credentials",
	".aws/config",
	".docker/config.json",
	".netrc",
	".npmrc",
	"*.pem",
	"*.key",
	".env",
	".env.*",
];

/// The intent behind a path access; narrows which sanctioned-root rules
/// apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
	/// A read of existing content.
	Read,
	/// A write of new or replacement content.
	Write,
	/// The path is the `source` end of a symlink (must resolve under
	/// dotfiles root or the datastore).
	SymlinkSource,
	/// The path is the `target` end of a symlink (must resolve inside a
	/// sanctioned root).
	SymlinkTarget,
	/// An append (e.g. shell-profile sourcing line).
	Append,
	/// A provisioning script/bundle invocation.
	Provision,
}

/// Validates that a path is safe to touch for a given [`Intent`].
#[derive(Debug, Clone)]
pub struct Validator {
	/// The dotfiles root and everything beneath it is sanctioned.
	dotfiles_root: PathBuf,
	/// The datastore root and everything beneath it is sanctioned.
	datastore_root: PathBuf,
	/// The user's home root, conditionally sanctioned.
	home_root: PathBuf,
	/// Whether home is a sanctioned root for symlink targets.
	allow_home_symlinks: bool,
	/// Protected-path glob patterns, checked after path resolution.
	protected: Vec<glob::Pattern>,
}

impl Validator {
	/// Builds a validator from the three roots and the home-symlinks
	/// switch, using [`DEFAULT_PROTECTED_PATHS`].
	#[must_use]
	pub fn new(
		dotfiles_root: PathBuf,
		datastore_root: PathBuf,
		home_root: PathBuf,
		allow_home_symlinks: bool,
	) -> Self {
		Self::with_protected_paths(
			dotfiles_root,
			datastore_root,
			home_root,
			allow_home_symlinks,
			DEFAULT_PROTECTED_PATHS,
		)
	}

	/// Like [`Self::new`] but with a caller-supplied protected-path list
	/// (used when a pack's config adds patterns).
	#[must_use]
	pub fn with_protected_paths(
		dotfiles_root: PathBuf,
		datastore_root: PathBuf,
		home_root: PathBuf,
		allow_home_symlinks: bool,
		patterns: &[&str],
	) -> Self {
		let protected = patterns
			.iter()
			.filter_map(|p| glob::Pattern::new(p).ok())
			.collect();

		Self {
			dotfiles_root,
			datastore_root,
			home_root,
			allow_home_symlinks,
			protected,
		}
	}

	/// Runs the six-step validation pipeline from the path-safety design.
	pub fn validate(&self, raw: &Path, intent: Intent) -> Result<PathBuf, PacklineError> {
		// 1. Reject empty paths.
		if raw.as_os_str().is_empty() {
			return Err(PacklineError::InvalidInput("empty path".to_owned()));
		}

		// 2. Resolve: expand `~`, make absolute, clean `..`, resolve
		// symlinks on any existing prefix.
		let resolved = self.resolve(raw);

		// 3. Protected-path check, post-resolution.
		if self.is_protected(&resolved) {
			return Err(PacklineError::ProtectedSystemFile(resolved));
		}

		match intent {
			// 4. symlink_source must be under dotfiles root or datastore.
			Intent::SymlinkSource => {
				if self.under(&resolved, &self.dotfiles_root) || self.under(&resolved, &self.datastore_root) {
					Ok(resolved)
				} else {
					Err(PacklineError::OutsideSanctionedRoots(resolved))
				}
			}
			// 5. write/append/symlink_target must be inside a
			// sanctioned root, with the shell_profile exception
			// handled by callers passing `Intent::Append` for home
			// paths (always permitted).
			Intent::Write | Intent::SymlinkTarget => {
				if self.in_sanctioned_root(&resolved) {
					Ok(resolved)
				} else {
					Err(PacklineError::OutsideSanctionedRoots(resolved))
				}
			}
			Intent::Append => {
				// Narrow exception: shell-init files live in home by
				// convention, permitted regardless of
				// `allow_home_symlinks`.
				if self.under(&resolved, &self.home_root) || self.in_sanctioned_root(&resolved) {
					Ok(resolved)
				} else {
					Err(PacklineError::OutsideSanctionedRoots(resolved))
				}
			}
			Intent::Provision => {
				if self.under(&resolved, &self.dotfiles_root) {
					Ok(resolved)
				} else {
					Err(PacklineError::OutsideSanctionedRoots(resolved))
				}
			}
			Intent::Read => Ok(resolved),
		}
	}

	/// Resolves `path`: `~` expansion, absolutize against home, clean
	/// `..`, then canonicalize the longest existing prefix.
	fn resolve(&self, path: &Path) -> PathBuf {
		let home = self.home_root.to_string_lossy().into_owned();
		let expanded = shellexpand::tilde_with_context(&path.to_string_lossy(), || Some(home.clone())).into_owned();
		let expanded = PathBuf::from(expanded);

		let absolute = if expanded.is_absolute() {
			expanded
		} else {
			self.home_root.join(expanded)
		};

		let cleaned = clean_path(&absolute);

		canonicalize_existing_prefix(&cleaned)
	}

	fn is_protected(&self, resolved: &Path) -> bool {
		let Ok(rel) = resolved.strip_prefix(&self.home_root) else {
			return false;
		};

		self.protected.iter().any(|p| p.matches_path(rel))
	}

	fn under(&self, path: &Path, root: &Path) -> bool {
		path.starts_with(root)
	}

	fn in_sanctioned_root(&self, path: &Path) -> bool {
		self.under(path, &self.dotfiles_root)
			|| self.under(path, &self.datastore_root)
			|| (self.allow_home_symlinks && self.under(path, &self.home_root))
	}
}

/// Removes `.`/`..` components lexically, without touching the
/// filesystem.
fn clean_path(path: &Path) -> PathBuf {
	let mut out = PathBuf::new();

	for component in path.components() {
		match component {
			std::path::Component::ParentDir => {
				out.pop();
			}
			std::path::Component::CurDir => {}
			other => out.push(other.as_os_str()),
		}
	}

	out
}

/// Canonicalizes the longest prefix of `path` that exists, then
/// reappends the remainder. Ensures symlink chains in an existing
/// ancestor are resolved before the protected-path / sanctioned-root
/// checks run.
fn canonicalize_existing_prefix(path: &Path) -> PathBuf {
	let mut existing = path.to_path_buf();
	let mut remainder: Vec<&std::ffi::OsStr> = Vec::new();

	while !existing.exists() {
		match existing.file_name() {
			Some(name) => {
				remainder.push(name);
				existing.pop();
			}
			None => break,
		}
	}

	let mut resolved = std::fs::canonicalize(&existing).unwrap_or(existing);

	for part in remainder.into_iter().rev() {
		resolved.push(part);
	}

	resolved
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	fn validator(home: &Path) -> Validator {
		Validator::new(
			home.join("dotfiles"),
			home.join(".local/share/packline"),
			home.to_path_buf(),
			false,
		)
	}

	#[test]
	fn rejects_empty_path() {
		let tmp = tempfile::tempdir().unwrap();
		let v = validator(tmp.path());

		let err = v.validate(Path::new(""), Intent::Read).unwrap_err();
		assert!(matches!(err, PacklineError::InvalidInput(_)));
	}

	#[test]
	fn rejects_protected_ssh_path() {
		let tmp = tempfile::tempdir().unwrap();
		std::fs::create_dir_all(tmp.path().join(".ssh")).unwrap();
		let v = validator(tmp.path());

		let target = tmp.path().join(".ssh/id_rsa");
		let err = v.validate(&target, Intent::Write).unwrap_err();
		assert!(matches!(err, PacklineError::ProtectedSystemFile(_)));
	}

	#[test]
	fn accepts_dotfiles_root_symlink_source() {
		let tmp = tempfile::tempdir().unwrap();
		std::fs::create_dir_all(tmp.path().join("dotfiles/vim")).unwrap();
		let v = validator(tmp.path());

		let source = tmp.path().join("dotfiles/vim/vimrc");
		assert_eq!(
			v.validate(&source, Intent::SymlinkSource).unwrap(),
			std::fs::canonicalize(tmp.path().join("dotfiles")).unwrap().join("vim/vimrc")
		);
	}

	#[test]
	fn rejects_symlink_target_outside_sanctioned_roots_by_default() {
		let tmp = tempfile::tempdir().unwrap();
		let v = validator(tmp.path());

		let target = tmp.path().join(".vimrc");
		let err = v.validate(&target, Intent::SymlinkTarget).unwrap_err();
		assert!(matches!(err, PacklineError::OutsideSanctionedRoots(_)));
	}

	#[test]
	fn shell_profile_append_permitted_without_allow_home_symlinks() {
		let tmp = tempfile::tempdir().unwrap();
		let v = validator(tmp.path());

		let target = tmp.path().join(".bashrc");
		assert!(v.validate(&target, Intent::Append).is_ok());
	}
}

//! Pack discovery and selection (C2).

use std::path::{Path, PathBuf};

use color_eyre::eyre::Context;
use serde::{Deserialize, Serialize};

use crate::error::PacklineError;

/// Marker file that excludes a directory from discovery entirely.
pub const IGNORE_MARKER: &str = ".dodotignore";

/// Per-pack configuration file.
pub const CONFIG_FILE: &str = ".dodot.toml";

/// A glob that excludes matching pack-relative paths from rule matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IgnoreRule {
	/// Glob, matched against the path relative to the pack root.
	pub path: String,
}

/// A glob that forces a specific handler (with options) for matching
/// pack-relative paths, ahead of the default rule set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideRule {
	/// Glob, matched against the path relative to the pack root.
	pub path: String,
	/// Name of the handler to force.
	pub handler: String,
	/// Handler-specific options, passed through opaquely.
	#[serde(default)]
	pub options: toml::Table,
}

/// Per-pack section of `.dodot.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackSection {
	/// Per-pack override of the global `allow_home_symlinks` switch.
	pub allow_home_symlinks: Option<bool>,
}

/// Parsed `.dodot.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
	/// Pack is discovered but not processed.
	pub disabled: bool,
	/// Ignore rules, evaluated before the default rule set.
	#[serde(rename = "ignore")]
	pub ignores: Vec<IgnoreRule>,
	/// Override rules, evaluated before the default rule set.
	#[serde(rename = "override")]
	pub overrides: Vec<OverrideRule>,
	/// `[pack]` section.
	pub pack: PackSection,
}

impl PackConfig {
	/// Loads `<pack_dir>/.dodot.toml` if present; returns the default
	/// (empty) config otherwise.
	fn load(pack_dir: &Path) -> color_eyre::Result<Self> {
		let config_path = pack_dir.join(CONFIG_FILE);

		if !config_path.exists() {
			return Ok(Self::default());
		}

		let content = std::fs::read_to_string(&config_path)
			.with_context(|| format!("failed to read `{}`", config_path.display()))?;

		toml::from_str(&content).with_context(|| format!("failed to parse `{}`", config_path.display()))
	}
}

/// One discovered, loaded pack. Immutable once created.
#[derive(Debug, Clone)]
pub struct Pack {
	/// Directory basename.
	pub name: String,
	/// Absolute path to the pack directory.
	pub path: PathBuf,
	/// Parsed `.dodot.toml`, or the default if absent.
	pub config: PackConfig,
}

impl Pack {
	/// `true` if the pack directory carries [`IGNORE_MARKER`].
	#[must_use]
	pub fn is_ignored(&self) -> bool {
		self.path.join(IGNORE_MARKER).exists()
	}
}

/// Lists immediate subdirectories of `root` eligible for discovery:
/// not dotfile-named, not carrying [`IGNORE_MARKER`], not marked
/// `disabled`, and actually a directory.
pub fn discover(root: &Path) -> color_eyre::Result<Vec<Pack>> {
	let mut packs = Vec::new();

	let entries = std::fs::read_dir(root)
		.with_context(|| format!("failed to read dotfiles root `{}`", root.display()))?;

	for entry in entries {
		let entry = entry?;
		let path = entry.path();

		if !path.is_dir() {
			continue;
		}

		let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
			continue;
		};

		if name.starts_with('.') {
			continue;
		}

		if path.join(IGNORE_MARKER).exists() {
			log::debug!("skipping ignored pack `{name}`");
			continue;
		}

		let pack = load(&path)?;

		if pack.config.disabled {
			log::debug!("skipping disabled pack `{name}`");
			continue;
		}

		packs.push(pack);
	}

	packs.sort_by(|a, b| a.name.cmp(&b.name));

	Ok(packs)
}

/// Loads a single pack directory into a [`Pack`].
pub fn load(pack_dir: &Path) -> color_eyre::Result<Pack> {
	let name = pack_dir
		.file_name()
		.and_then(|n| n.to_str())
		.ok_or_else(|| color_eyre::eyre::eyre!("pack path has no basename: {}", pack_dir.display()))?
		.to_owned();

	let config = PackConfig::load(pack_dir)?;

	Ok(Pack {
		name,
		path: pack_dir.to_path_buf(),
		config,
	})
}

/// Filters `all_packs` by `names` (order-preserving on `all_packs`,
/// which is already sorted by [`discover`]). Empty `names` selects
/// everything. Trailing `/` on a requested name is stripped before
/// matching.
pub fn select(all_packs: &[Pack], names: &[String]) -> Result<Vec<Pack>, PacklineError> {
	if names.is_empty() {
		return Ok(all_packs.to_vec());
	}

	let normalized: Vec<&str> = names.iter().map(|n| n.trim_end_matches('/')).collect();

	let mut selected = Vec::with_capacity(normalized.len());

	for &name in &normalized {
		match all_packs.iter().find(|p| p.name == name) {
			Some(pack) => selected.push(pack.clone()),
			None => return Err(PacklineError::PackNotFound(name.to_owned())),
		}
	}

	Ok(selected)
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	fn make_pack(root: &Path, name: &str) {
		std::fs::create_dir_all(root.join(name)).unwrap();
	}

	#[test]
	fn discover_sorts_and_skips_ignored() {
		let tmp = tempfile::tempdir().unwrap();
		make_pack(tmp.path(), "zsh");
		make_pack(tmp.path(), "vim");
		make_pack(tmp.path(), "bash");
		std::fs::write(tmp.path().join("bash").join(IGNORE_MARKER), "").unwrap();

		let packs = discover(tmp.path()).unwrap();
		let names: Vec<_> = packs.iter().map(|p| p.name.as_str()).collect();

		assert_eq!(names, vec!["vim", "zsh"]);
	}

	#[test]
	fn discover_skips_disabled() {
		let tmp = tempfile::tempdir().unwrap();
		make_pack(tmp.path(), "vim");
		std::fs::write(
			tmp.path().join("vim").join(CONFIG_FILE),
			"disabled = true\n",
		)
		.unwrap();

		let packs = discover(tmp.path()).unwrap();
		assert!(packs.is_empty());
	}

	#[test]
	fn select_strips_trailing_slash() {
		let tmp = tempfile::tempdir().unwrap();
		make_pack(tmp.path(), "vim");
		let packs = discover(tmp.path()).unwrap();

		let selected = select(&packs, &["vim/".to_owned()]).unwrap();
		assert_eq!(selected.len(), 1);
	}

	#[test]
	fn select_missing_pack_errors() {
		let tmp = tempfile::tempdir().unwrap();
		let packs = discover(tmp.path()).unwrap();

		let err = select(&packs, &["ghost".to_owned()]).unwrap_err();
		assert!(matches!(err, PacklineError::PackNotFound(_)));
	}
}

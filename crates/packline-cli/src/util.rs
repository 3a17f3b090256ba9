//! Various utility functions: the terminal confirmation dialog and the
//! colored execution-result summary.

use std::fmt::Write as _; // Needed for `write!` calls
use std::fs::{File, OpenOptions};
use std::path::Path;

use color_eyre::owo_colors::OwoColorize;
use color_eyre::Result;
use packline_core::confirm::{ConfirmationDialog, ConfirmationRequest, ConfirmationResponse};
use packline_core::exec::{ActionOutcome, ExecutionResult};

/// Asks the user, on stdin/stdout, whether to proceed with each
/// confirmation request in turn. An invalid answer re-prompts.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalDialog;

impl ConfirmationDialog for TerminalDialog {
	fn present(&self, requests: &[ConfirmationRequest]) -> Result<Vec<ConfirmationResponse>> {
		use std::io::Write;

		let stdin = std::io::stdin();
		let mut stdout = std::io::stdout();
		let mut responses = Vec::with_capacity(requests.len());

		for (id_index, request) in requests.iter().enumerate() {
			println!("{}", request.title.bold());
			if !request.description.is_empty() {
				println!("  {}", request.description.bright_black());
			}
			for item in &request.items {
				println!("  - {item}");
			}

			let default_hint = if request.default_bool { "[Y/n]" } else { "[y/N]" };
			let mut line = String::new();

			let approved = loop {
				stdout.write_all(format!("Proceed? {default_hint}: ").as_bytes())?;
				stdout.flush()?;

				line.clear();
				stdin.read_line(&mut line)?;
				line.make_ascii_lowercase();

				match line.trim() {
					"y" => break true,
					"n" => break false,
					"" => break request.default_bool,
					_ => continue,
				}
			};

			responses.push(ConfirmationResponse { id_index, approved });
		}

		Ok(responses)
	}
}

/// Never proceeds with any confirmation; used for `provision
/// --no-provision` and similar unattended runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclineAllDialog;

impl ConfirmationDialog for DeclineAllDialog {
	fn present(&self, requests: &[ConfirmationRequest]) -> Result<Vec<ConfirmationResponse>> {
		Ok((0..requests.len())
			.map(|id_index| ConfirmationResponse {
				id_index,
				approved: false,
			})
			.collect())
	}
}

/// Logs the finished state of an [`ExecutionResult`] to stdout, grouped
/// by outcome the same way the teacher groups dotfiles by status.
pub fn log_execution_result(result: &ExecutionResult, dry_run: bool) {
	let mut out = String::new();

	let mut ready = 0;
	for (idx, action) in result.actions.iter().filter(|a| a.outcome.is_ready()).enumerate() {
		if idx == 0 {
			write!(out, "Actions ({})", "READY".green()).expect("write to String never fails");
		}
		write!(out, "\n\t{} {}", action.kind.bright_black(), action.path.display()).expect("write to String never fails");
		ready += 1;
	}
	if !out.is_empty() {
		println!("{out}");
		out.clear();
	}

	let mut skipped = 0;
	for (idx, action) in result
		.actions
		.iter()
		.filter_map(|a| match &a.outcome {
			ActionOutcome::Skipped(reason) => Some((a, reason)),
			_ => None,
		})
		.enumerate()
	{
		if idx == 0 {
			write!(out, "Actions ({})", "SKIPPED".yellow()).expect("write to String never fails");
		}
		write!(out, "\n\t{} {}: {}", action.0.kind.bright_black(), action.0.path.display(), action.1).expect("write to String never fails");
		skipped += 1;
	}
	if !out.is_empty() {
		println!("{out}");
		out.clear();
	}

	let mut conflicted = 0;
	for (idx, action) in result
		.actions
		.iter()
		.filter_map(|a| match &a.outcome {
			ActionOutcome::Conflict(reason) => Some((a, reason)),
			_ => None,
		})
		.enumerate()
	{
		if idx == 0 {
			write!(out, "Actions ({})", "CONFLICT".yellow()).expect("write to String never fails");
		}
		write!(out, "\n\t{} {}: {}", action.0.kind.bright_black(), action.0.path.display(), action.1).expect("write to String never fails");
		conflicted += 1;
	}
	if !out.is_empty() {
		println!("{out}");
		out.clear();
	}

	let mut failed = 0;
	for (idx, action) in result
		.actions
		.iter()
		.filter_map(|a| match &a.outcome {
			ActionOutcome::Error(reason) => Some((a, reason)),
			_ => None,
		})
		.enumerate()
	{
		if idx == 0 {
			write!(out, "Actions ({})", "FAILED".red()).expect("write to String never fails");
		}
		write!(out, "\n\t{} {}: {}", action.0.kind.bright_black(), action.0.path.display(), action.1).expect("write to String never fails");
		failed += 1;
	}
	if !out.is_empty() {
		println!("{out}");
		out.clear();
	}

	let status_line = match result.status {
		packline_core::exec::ExecutionStatus::Success => "SUCCESS".green().to_string(),
		packline_core::exec::ExecutionStatus::Failed => "FAILED".red().to_string(),
	};

	write!(out, "Status: {status_line}").expect("write to String never fails");
	write!(out, "\nTime             : {:?}", result.duration()).expect("write to String never fails");
	write!(out, "\nActions (ready)  : {ready}").expect("write to String never fails");
	write!(out, "\nActions (skipped): {skipped}").expect("write to String never fails");
	write!(out, "\nActions (conflict): {conflicted}").expect("write to String never fails");
	write!(out, "\nActions (failed) : {failed}").expect("write to String never fails");

	println!("{out}");

	if dry_run {
		log::info!("note: no files were actually touched, since --dry-run was set");
	}
}

/// Writes `result` as json/yaml to the paths requested by
/// [`crate::opt::OutputShared`], if any.
pub fn handle_output(
	crate::opt::OutputShared { json_output, yaml_output }: crate::opt::OutputShared,
	result: &ExecutionResult,
) {
	/// Creates a new file. Fails if the file exists.
	fn create_file(path: &Path) -> std::io::Result<File> {
		OpenOptions::new().create_new(true).write(true).open(path)
	}

	'json: {
		if let Some(json_path) = json_output {
			let mut file = match create_file(&json_path) {
				Ok(file) => file,
				Err(err) => {
					log::error!("failed to create json output file: {err}");
					break 'json;
				}
			};

			if let Err(err) = serde_json::to_writer_pretty(&mut file, result) {
				log::error!("failed to write execution result to json output file: {err}");
			}
		}
	}

	'yaml: {
		if let Some(yaml_path) = yaml_output {
			let mut file = match create_file(&yaml_path) {
				Ok(file) => file,
				Err(err) => {
					log::error!("failed to create yaml output file: {err}");
					break 'yaml;
				}
			};

			if let Err(err) = serde_yaml::to_writer(&mut file, result) {
				log::error!("failed to write execution result to yaml output file: {err}");
			}
		}
	}
}

/// One pack's reported status, in the shape written to `--json-output`/
/// `--yaml-output` for the `status` command.
#[derive(serde::Serialize)]
struct PackStatusReport<'a> {
	pack: &'a str,
	status: packline_core::status::PackStatus,
	files: &'a [packline_core::status::FileStatus],
}

/// Writes the `status` command's per-pack report as json/yaml, mirroring
/// [`handle_output`]'s shape for the execution-result commands.
pub fn handle_status_output(
	crate::opt::OutputShared { json_output, yaml_output }: crate::opt::OutputShared,
	report: &[(String, packline_core::status::PackStatus, Vec<packline_core::status::FileStatus>)],
) {
	fn create_file(path: &Path) -> std::io::Result<File> {
		OpenOptions::new().create_new(true).write(true).open(path)
	}

	let rows: Vec<PackStatusReport<'_>> = report
		.iter()
		.map(|(pack, status, files)| PackStatusReport { pack, status: *status, files })
		.collect();

	'json: {
		if let Some(json_path) = json_output {
			let mut file = match create_file(&json_path) {
				Ok(file) => file,
				Err(err) => {
					log::error!("failed to create json output file: {err}");
					break 'json;
				}
			};

			if let Err(err) = serde_json::to_writer_pretty(&mut file, &rows) {
				log::error!("failed to write status report to json output file: {err}");
			}
		}
	}

	'yaml: {
		if let Some(yaml_path) = yaml_output {
			let mut file = match create_file(&yaml_path) {
				Ok(file) => file,
				Err(err) => {
					log::error!("failed to create yaml output file: {err}");
					break 'yaml;
				}
			};

			if let Err(err) = serde_yaml::to_writer(&mut file, &rows) {
				log::error!("failed to write status report to yaml output file: {err}");
			}
		}
	}
}

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use serde::Serialize;
use domains::SignSet;
use interp::{AbstractAnalysis, Coverage};
use jvm_model::{AbsMethodId, Bytecode, Case, Suite};
use crate::rewrite::{apply_plans, RewritePlan};
use crate::syntactic::{check_triviality, interesting_values, thresholds_for, SourceTree};

/// Concrete runs get this many steps before a case is abandoned.
const MAX_EXEC_STEPS: usize = 1_000;

/// What happened to one method during debloating; also serialized as a
/// per-method artifact for inspection.
#[derive(Debug, Clone, Serialize)]
pub struct MethodReport {
	pub method: String,
	pub success: bool,
	pub trivial: bool,
	pub justification: String,
	pub lines_executed: BTreeSet<u32>,
	pub lines_removed: BTreeSet<u32>,
	pub error: Option<String>,
}

impl MethodReport {
	fn failure(method: &AbsMethodId, error: &anyhow::Error) -> MethodReport {
		MethodReport {
			method: method.write(),
			success: false,
			trivial: false,
			justification: String::new(),
			lines_executed: BTreeSet::new(),
			lines_removed: BTreeSet::new(),
			error: Some(format!("{error:#}")),
		}
	}
}

/// Orchestrates the debloating pipeline: per method coverage analysis
/// (concrete for trivial methods, abstract otherwise), dead line
/// computation against the original source, and a single rewrite per
/// file.
pub struct Debloater<'a> {
	suite: &'a Suite,
	bytecode: &'a Bytecode,
	target: PathBuf,
}

impl<'a> Debloater<'a> {
	pub fn new(suite: &'a Suite, bytecode: &'a Bytecode, target: impl Into<PathBuf>) -> Debloater<'a> {
		Debloater { suite, bytecode, target: target.into() }
	}

	fn final_dir(&self) -> PathBuf {
		self.target.join("final")
	}

	fn intermediate_dir(&self) -> PathBuf {
		self.target.join("intermediate")
	}

	/// Debloats every case of the suite whose method id contains the
	/// filter (all of them without one). Returns one report per method.
	pub fn run(&self, filter: Option<&str>) -> Result<Vec<MethodReport>> {
		let cases = self.suite.cases()?;
		let selected: Vec<Case> = cases.into_iter()
			.filter(|case| {
				filter.map_or(true, |needle| case.method.write().contains(needle))
			})
			.collect();

		// all methods of one source file are rewritten together so the
		// removals can be applied to the original text in one pass
		let mut by_file: BTreeMap<PathBuf, Vec<Case>> = BTreeMap::new();
		for case in selected {
			let file = self.suite.sourcefile(&case.method.class);
			by_file.entry(file).or_default().push(case);
		}

		let mut reports = Vec::new();
		for (file, cases) in by_file {
			reports.extend(self.debloat_file(&file, &cases)?);
		}
		Ok(reports)
	}

	fn debloat_file(&self, file: &Path, cases: &[Case]) -> Result<Vec<MethodReport>> {
		info!("debloating {} methods of {file:?}", cases.len());

		let tree = SourceTree::from_file(file)?;

		// coverage is per method, unioned over every case of that method
		let mut by_method: BTreeMap<AbsMethodId, Vec<&Case>> = BTreeMap::new();
		for case in cases {
			by_method.entry(case.method.clone()).or_default().push(case);
		}

		let mut reports = Vec::new();
		let mut plans = Vec::new();
		for (method, cases) in by_method {
			match self.debloat_method(&tree, &method, &cases) {
				Ok((report, plan)) => {
					self.save_artifacts(&report)?;
					reports.push(report);
					plans.push(plan);
				},
				Err(error) => {
					warn!("debloating {method} failed: {error:#}");
					reports.push(MethodReport::failure(&method, &error));
				},
			}
		}

		if reports.iter().any(|r| r.success) {
			let rewritten = apply_plans(tree.source(), &plans);
			self.persist(file, &rewritten)?;
		}

		Ok(reports)
	}

	fn debloat_method(
		&self,
		tree: &SourceTree,
		method: &AbsMethodId,
		cases: &[&Case],
	) -> Result<(MethodReport, RewritePlan)> {
		let triviality = check_triviality(tree, self.bytecode, method)?;

		let executed = if triviality.is_trivial() {
			let mut lines = BTreeSet::new();
			for case in cases {
				lines.extend(self.concrete_lines(method, case)?);
			}
			lines
		} else {
			self.abstract_lines(tree, method)?
		};

		let plan = RewritePlan::compute(tree, method, &executed)?;

		let report = MethodReport {
			method: method.write(),
			success: true,
			trivial: triviality.is_trivial(),
			justification: triviality.justification(),
			lines_executed: executed,
			lines_removed: plan.dead_lines.clone(),
			error: None,
		};
		Ok((report, plan))
	}

	/// Coverage of a trivial method: run it on the ground truth input.
	fn concrete_lines(&self, method: &AbsMethodId, case: &Case) -> Result<BTreeSet<u32>> {
		let mut coverage = Coverage::new();
		let outcome = interp::run(
			self.bytecode,
			method,
			&case.input.values,
			MAX_EXEC_STEPS,
			&mut coverage,
		)?;
		info!("concrete run of {method} on {} ended with {outcome}", case.input);
		Ok(coverage.lines_of(method))
	}

	/// Coverage of a non-trivial method: explore every input with the
	/// sign domain and the thresholds mined from the source.
	fn abstract_lines(&self, tree: &SourceTree, method: &AbsMethodId) -> Result<BTreeSet<u32>> {
		let node = tree.method_node(method)?;
		let thresholds = thresholds_for(&interesting_values(tree, node));

		let result = AbstractAnalysis::new(self.bytecode)
			.with_thresholds(thresholds)
			.run::<SignSet>(method)?;
		Ok(result.coverage.lines_of(method))
	}

	/// Writes the rewritten source under `target/final`, mirroring the
	/// package layout of the input tree.
	fn persist(&self, file: &Path, rewritten: &str) -> Result<()> {
		let relative = file.strip_prefix(self.suite.sourcefiles_folder())
			.map(Path::to_path_buf)
			.unwrap_or_else(|_| {
				PathBuf::from(file.file_name().unwrap_or(file.as_os_str()))
			});

		let output = self.final_dir().join(relative);
		if let Some(parent) = output.parent() {
			std::fs::create_dir_all(parent)
				.with_context(|| anyhow!("failed to create output folder {parent:?}"))?;
		}
		std::fs::write(&output, rewritten)
			.with_context(|| anyhow!("failed to write debloated source {output:?}"))?;
		info!("wrote {output:?}");
		Ok(())
	}

	/// Keeps the per-method analysis around as json for debugging.
	fn save_artifacts(&self, report: &MethodReport) -> Result<()> {
		let folder = self.intermediate_dir().join(report.method.replace('/', "_"));
		std::fs::create_dir_all(&folder)
			.with_context(|| anyhow!("failed to create artifact folder {folder:?}"))?;

		let json = serde_json::to_string_pretty(report)?;
		std::fs::write(folder.join("report.json"), json)?;
		Ok(())
	}
}

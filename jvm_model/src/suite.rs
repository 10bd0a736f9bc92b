use std::path::{Path, PathBuf};
use anyhow::{anyhow, bail, Context, Result};
use log::info;
use crate::case::Case;
use crate::class::ClassName;

/// The benchmark suite's work folder layout.
///
/// ```txt,ignore
/// <workfolder>/
///   stats/cases.txt          one ground truth case per line
///   src/main/java/...        the java sources, by package
///   target/classes/...       the compiled classes
///   decompiled/...           one json file per class, from the decompiler
/// ```
#[derive(Debug, Clone)]
pub struct Suite {
	workfolder: PathBuf,
}

impl Suite {
	pub fn new(workfolder: impl Into<PathBuf>) -> Suite {
		Suite { workfolder: workfolder.into() }
	}

	pub fn workfolder(&self) -> &Path {
		&self.workfolder
	}

	pub fn case_file(&self) -> PathBuf {
		self.workfolder.join("stats").join("cases.txt")
	}

	pub fn sourcefiles_folder(&self) -> PathBuf {
		self.workfolder.join("src").join("main").join("java")
	}

	pub fn classfiles_folder(&self) -> PathBuf {
		self.workfolder.join("target").join("classes")
	}

	pub fn decompiled_folder(&self) -> PathBuf {
		self.workfolder.join("decompiled")
	}

	/// The source file a class lives in. Inner classes share the file of
	/// their top level class.
	pub fn sourcefile(&self, class: &ClassName) -> PathBuf {
		let mut path = self.sourcefiles_folder();
		for package in class.packages() {
			path.push(package);
		}
		path.push(format!("{}.java", class.top_level_name()));
		path
	}

	/// The decompiled json file of a class.
	pub fn decompiledfile(&self, class: &ClassName) -> PathBuf {
		let mut path = self.decompiled_folder();
		for package in class.packages() {
			path.push(package);
		}
		path.push(format!("{}.json", class.simple_name()));
		path
	}

	pub fn sourcefiles(&self) -> Vec<PathBuf> {
		files_with_extension(&self.sourcefiles_folder(), "java")
	}

	pub fn decompiledfiles(&self) -> Vec<PathBuf> {
		files_with_extension(&self.decompiled_folder(), "json")
	}

	/// Loads and parses the case file.
	pub fn cases(&self) -> Result<Vec<Case>> {
		let path = self.case_file();
		let content = std::fs::read_to_string(&path)
			.with_context(|| anyhow!("failed to read case file {path:?}"))?;

		content.lines()
			.filter(|line| !line.trim().is_empty())
			.map(Case::parse)
			.collect()
	}

	/// Checks the health of the work folder through a sequence of tests.
	pub fn checkhealth(&self) -> Result<()> {
		let case_file = self.case_file();
		if !case_file.exists() {
			bail!("case file {case_file:?} should exist");
		}
		let cases = self.cases()?;
		if cases.is_empty() {
			bail!("case file {case_file:?} should contain at least one case");
		}
		info!("found {} cases", cases.len());

		let sources = self.sourcefiles_folder();
		if !sources.is_dir() {
			bail!("source folder {sources:?} should exist");
		}
		let files = self.sourcefiles();
		if files.is_empty() {
			bail!("source folder {sources:?} should contain java files");
		}
		info!("found {} source files", files.len());

		let decompiled = self.decompiled_folder();
		if !decompiled.is_dir() {
			bail!("decompiled folder {decompiled:?} should exist");
		}
		let files = self.decompiledfiles();
		if files.is_empty() {
			bail!("decompiled folder {decompiled:?} should contain json files");
		}
		info!("found {} decompiled files", files.len());

		Ok(())
	}
}

fn files_with_extension(folder: &Path, extension: &str) -> Vec<PathBuf> {
	walkdir::WalkDir::new(folder)
		.sort_by_file_name()
		.into_iter()
		.filter_map(|entry| entry.ok())
		.filter(|entry| entry.file_type().is_file())
		.map(|entry| entry.into_path())
		.filter(|path| path.extension().is_some_and(|e| e == extension))
		.collect()
}

//! Drives the whole debloating pipeline over a small on-disk suite.

use std::path::PathBuf;
use anyhow::Result;
use jvm_model::{Bytecode, Suite};
use debloat::Debloater;

const SIMPLE_JAVA: &str = "package jpamb.cases;

public class Simple {
	public static int constantFalse() {
		boolean flag = false;
		if (flag) {
			return 1;
		}
		return 0;
	}

	public static int positive(int x) {
		if (x > 0) {
			return x;
		}
		return 0;
	}
}
";

fn simple_json() -> serde_json::Value {
	serde_json::json!({
		"name": "jpamb/cases/Simple",
		"methods": [
			{
				"name": "constantFalse",
				"params": [],
				"returns": "int",
				"code": {
					"bytecode": [
						{"opr": "push", "offset": 0, "line": 5, "value": {"type": "integer", "value": 0}},
						{"opr": "store", "offset": 1, "line": 5, "type": "int", "index": 1},
						{"opr": "load", "offset": 2, "line": 6, "type": "int", "index": 1},
						{"opr": "ifz", "offset": 3, "line": 6, "condition": "eq", "target": 6},
						{"opr": "push", "offset": 4, "line": 7, "value": {"type": "integer", "value": 1}},
						{"opr": "return", "offset": 5, "line": 7, "type": "int"},
						{"opr": "push", "offset": 6, "line": 9, "value": {"type": "integer", "value": 0}},
						{"opr": "return", "offset": 7, "line": 9, "type": "int"},
					],
				},
			},
			{
				"name": "positive",
				"params": ["int"],
				"returns": "int",
				"code": {
					"bytecode": [
						{"opr": "load", "offset": 0, "line": 13, "type": "int", "index": 0},
						{"opr": "ifz", "offset": 1, "line": 13, "condition": "le", "target": 4},
						{"opr": "load", "offset": 2, "line": 14, "type": "int", "index": 0},
						{"opr": "return", "offset": 3, "line": 14, "type": "int"},
						{"opr": "push", "offset": 4, "line": 16, "value": {"type": "integer", "value": 0}},
						{"opr": "return", "offset": 5, "line": 16, "type": "int"},
					],
				},
			},
		],
	})
}

const CASES: &str = "jpamb/cases/Simple.constantFalse:()I () -> ok
jpamb/cases/Simple.positive:(I)I (1) -> ok
";

/// Lays the fixture suite out on disk under a unique temp folder.
fn write_suite() -> Result<PathBuf> {
	let unique = format!(
		"debloat-pipeline-{}-{:?}",
		std::process::id(),
		std::thread::current().id(),
	);
	let root = std::env::temp_dir().join(unique);

	let sources = root.join("src").join("main").join("java").join("jpamb").join("cases");
	std::fs::create_dir_all(&sources)?;
	std::fs::write(sources.join("Simple.java"), SIMPLE_JAVA)?;

	let decompiled = root.join("decompiled").join("jpamb").join("cases");
	std::fs::create_dir_all(&decompiled)?;
	std::fs::write(
		decompiled.join("Simple.json"),
		serde_json::to_string_pretty(&simple_json())?,
	)?;

	let stats = root.join("stats");
	std::fs::create_dir_all(&stats)?;
	std::fs::write(stats.join("cases.txt"), CASES)?;

	Ok(root)
}

#[test]
fn debloats_a_file_end_to_end() -> Result<()> {
	let root = write_suite()?;
	let suite = Suite::new(&root);
	suite.checkhealth()?;

	let bytecode = Bytecode::new(suite.clone());
	let target = root.join("debloated");
	let reports = Debloater::new(&suite, &bytecode, &target).run(None)?;

	assert_eq!(reports.len(), 2);
	assert!(reports.iter().all(|r| r.success));

	// the trivial method ran concretely and lost its impossible branch
	let constant = reports.iter().find(|r| r.method.contains("constantFalse")).unwrap();
	assert!(constant.trivial);
	assert_eq!(constant.lines_removed, [7].into_iter().collect());

	// the parameterized method was explored abstractly; both branches
	// are reachable so nothing goes
	let positive = reports.iter().find(|r| r.method.contains("positive")).unwrap();
	assert!(!positive.trivial);
	assert!(positive.lines_removed.is_empty());

	let output = target.join("final").join("jpamb").join("cases").join("Simple.java");
	let rewritten = std::fs::read_to_string(&output)?;
	assert!(!rewritten.contains("return 1;"));
	assert!(rewritten.contains("if (flag) {"));
	assert!(rewritten.contains("return x;"));

	std::fs::remove_dir_all(&root)?;
	Ok(())
}

#[test]
fn filter_restricts_the_scope() -> Result<()> {
	let root = write_suite()?;
	let suite = Suite::new(&root);
	let bytecode = Bytecode::new(suite.clone());

	let target = root.join("debloated-filtered");
	let reports = Debloater::new(&suite, &bytecode, &target).run(Some("positive"))?;

	assert_eq!(reports.len(), 1);
	assert!(reports[0].method.contains("positive"));

	std::fs::remove_dir_all(&root)?;
	Ok(())
}

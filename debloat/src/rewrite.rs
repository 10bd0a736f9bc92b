use std::collections::BTreeSet;
use anyhow::Result;
use tree_sitter::Node;
use jvm_model::{AbsMethodId, Type};
use crate::syntactic::SourceTree;

/// The 1-based line range a statement occupies in the source.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StatementSpan {
	pub start_line: u32,
	pub end_line: u32,
}

impl StatementSpan {
	fn of(node: Node<'_>) -> StatementSpan {
		StatementSpan {
			start_line: node.start_position().row as u32 + 1,
			end_line: node.end_position().row as u32 + 1,
		}
	}

	pub fn lines(&self) -> impl Iterator<Item = u32> {
		self.start_line..=self.end_line
	}

	/// A statement is live iff any of its lines was executed.
	pub fn is_executed(&self, executed: &BTreeSet<u32>) -> bool {
		self.lines().any(|line| executed.contains(&line))
	}
}

/// Collects every statement of the method body, descending into the
/// bodies of control constructs so nested statements are judged on their
/// own.
pub fn statements_of(method_node: Node<'_>) -> Vec<StatementSpan> {
	let mut statements = Vec::new();
	if let Some(body) = method_node.child_by_field_name("body") {
		collect_statements(body, &mut statements);
	}
	statements
}

fn collect_statements(parent: Node<'_>, statements: &mut Vec<StatementSpan>) {
	let mut cursor = parent.walk();
	for child in parent.children(&mut cursor) {
		match child.kind() {
			"{" | "}" | "comment" | "line_comment" | "block_comment" => continue,
			_ => {},
		}

		statements.push(StatementSpan::of(child));

		match child.kind() {
			"if_statement" => {
				if let Some(consequence) = child.child_by_field_name("consequence") {
					if consequence.kind() == "block" {
						collect_statements(consequence, statements);
					}
				}
				if let Some(alternative) = child.child_by_field_name("alternative") {
					// an else-if chain shows up as a nested if_statement
					// and is walked when its parent arm is
					if alternative.kind() == "block" {
						collect_statements(alternative, statements);
					} else if alternative.kind() == "if_statement" {
						statements.push(StatementSpan::of(alternative));
						collect_statements(alternative, statements);
					}
				}
			},
			"while_statement" | "for_statement" => {
				if let Some(body) = child.child_by_field_name("body") {
					if body.kind() == "block" {
						collect_statements(body, statements);
					}
				}
			},
			"block" => collect_statements(child, statements),
			_ => {},
		}
	}
}

/// What the rewriter decided for one method: the lines only dead
/// statements occupy, and, when the whole body died, the line that gets
/// the minimal return instead.
#[derive(Debug, Clone, PartialEq)]
pub struct RewritePlan {
	pub method: AbsMethodId,
	pub dead_lines: BTreeSet<u32>,
	pub replacement: Option<(u32, String)>,
}

impl RewritePlan {
	/// Works out which lines of the method can go, given the lines the
	/// interpreter covered. The plan is computed against the original
	/// source; applying many plans at once avoids line-number drift.
	pub fn compute(
		tree: &SourceTree,
		method: &AbsMethodId,
		executed: &BTreeSet<u32>,
	) -> Result<RewritePlan> {
		let node = tree.method_node(method)?;
		let statements = statements_of(node);

		// a statement sharing a line with executed code sees that line in
		// the executed set and counts as live, so shared lines survive
		let mut dead_lines = BTreeSet::new();
		for statement in &statements {
			if !statement.is_executed(executed) {
				dead_lines.extend(statement.lines());
			}
		}

		let all_dead = !statements.is_empty()
			&& statements.iter().all(|s| !s.is_executed(executed));
		let replacement = if all_dead {
			let first = dead_lines.iter().next().copied();
			first.map(|line| (line, minimal_return(method.member.returns.as_ref(), tree, node)))
		} else {
			None
		};

		Ok(RewritePlan { method: method.clone(), dead_lines, replacement })
	}

	pub fn removes_anything(&self) -> bool {
		!self.dead_lines.is_empty()
	}
}

/// The statement an emptied body keeps so the method still compiles,
/// indented like the first line it replaces.
fn minimal_return(returns: Option<&Type>, tree: &SourceTree, method_node: Node<'_>) -> String {
	let statement = match returns {
		None => "return;",
		Some(Type::Boolean) => "return false;",
		Some(Type::Byte) => "return (byte) 0;",
		Some(Type::Short) => "return (short) 0;",
		Some(Type::Char) => "return '\\0';",
		Some(Type::Int) => "return 0;",
		Some(Type::Long) => "return 0L;",
		Some(Type::Float) => "return 0.0f;",
		Some(Type::Double) => "return 0.0;",
		Some(Type::Reference | Type::Array(_) | Type::Object(_)) => "return null;",
	};

	// reuse the body's own indentation when it is visible
	let indent = method_node.child_by_field_name("body")
		.and_then(|body| {
			let row = body.start_position().row;
			tree.source().lines().nth(row)
		})
		.map(|line| {
			let prefix: String = line.chars().take_while(|c| c.is_whitespace()).collect();
			format!("{prefix}\t")
		})
		.unwrap_or_else(|| "\t\t".to_owned());

	format!("{indent}{statement}")
}

/// Applies accumulated plans to the original source in one pass: dead
/// lines are dropped, replacement lines are swapped for their minimal
/// return.
pub fn apply_plans(source: &str, plans: &[RewritePlan]) -> String {
	let mut remove = BTreeSet::new();
	let mut replace: Vec<(u32, &str)> = Vec::new();
	for plan in plans {
		remove.extend(plan.dead_lines.iter().copied());
		if let Some((line, text)) = &plan.replacement {
			replace.push((*line, text));
		}
	}

	let mut out = Vec::new();
	for (number, line) in source.lines().enumerate() {
		let number = number as u32 + 1;
		if let Some((_, text)) = replace.iter().find(|(l, _)| *l == number) {
			out.push((*text).to_owned());
		} else if !remove.contains(&number) {
			out.push(line.to_owned());
		}
	}

	let mut result = out.join("\n");
	if source.ends_with('\n') {
		result.push('\n');
	}
	result
}

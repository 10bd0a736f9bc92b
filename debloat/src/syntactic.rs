use std::collections::BTreeSet;
use std::path::Path;
use anyhow::{anyhow, Context, Result};
use tree_sitter::Node;
use domains::KSet;
use jvm_model::{AbsMethodId, Bytecode, MethodId, Opcode};

/// A parsed java source file, ready for the class and method queries the
/// debloater needs.
pub struct SourceTree {
	tree: tree_sitter::Tree,
	source: String,
}

impl SourceTree {
	pub fn parse(source: impl Into<String>) -> Result<SourceTree> {
		let source = source.into();

		let mut parser = tree_sitter::Parser::new();
		parser.set_language(&tree_sitter_java::LANGUAGE.into())
			.map_err(|e| anyhow!("failed to load the java grammar: {e}"))?;

		let tree = parser.parse(&source, None)
			.ok_or_else(|| anyhow!("java parser returned no tree"))?;

		Ok(SourceTree { tree, source })
	}

	pub fn from_file(path: &Path) -> Result<SourceTree> {
		let source = std::fs::read_to_string(path)
			.with_context(|| anyhow!("failed to read source file {path:?}"))?;
		SourceTree::parse(source)
	}

	pub fn source(&self) -> &str {
		&self.source
	}

	pub fn text(&self, node: Node<'_>) -> &str {
		node.utf8_text(self.source.as_bytes()).unwrap_or("")
	}

	/// The class declaration with the given simple name, anywhere in the
	/// file (top level classes and their siblings).
	pub fn find_class(&self, simple_name: &str) -> Option<Node<'_>> {
		let mut found = None;
		visit(self.tree.root_node(), &mut |node| {
			if node.kind() == "class_declaration" {
				if let Some(name) = node.child_by_field_name("name") {
					if self.text(name) == simple_name {
						found.get_or_insert(node);
					}
				}
			}
		});
		found
	}

	/// The method declaration matching the id's name and parameter count.
	/// Parameter type matching is left for later.
	pub fn find_method<'t>(&self, class: Node<'t>, method: &MethodId) -> Option<Node<'t>> {
		let mut found = None;
		visit(class, &mut |node| {
			if node.kind() != "method_declaration" {
				return;
			}
			let Some(name) = node.child_by_field_name("name") else {
				return;
			};
			if self.text(name) != method.name {
				return;
			}
			if parameter_count(node) == method.params.len() {
				found.get_or_insert(node);
			}
		});
		found
	}

	/// Both sides of the query in one call, with errors naming what was
	/// missing.
	pub fn method_node(&self, method: &AbsMethodId) -> Result<Node<'_>> {
		let simple_name = method.class.top_level_name();
		let class = self.find_class(simple_name)
			.ok_or_else(|| anyhow!("class {simple_name} not found in source"))?;
		self.find_method(class, &method.member)
			.ok_or_else(|| anyhow!("method {} not found in class {simple_name}", method.member))
	}
}

fn parameter_count(method_node: Node<'_>) -> usize {
	let Some(parameters) = method_node.child_by_field_name("parameters") else {
		return 0;
	};
	let mut cursor = parameters.walk();
	parameters.children(&mut cursor)
		.filter(|c| matches!(c.kind(), "formal_parameter" | "spread_parameter"))
		.count()
}

/// Depth first walk over every node below `node`.
fn visit<'t>(node: Node<'t>, f: &mut dyn FnMut(Node<'t>)) {
	let mut cursor = node.walk();
	for child in node.children(&mut cursor) {
		f(child);
		visit(child, f);
	}
}

/// Why a method is, or is not, simple enough to run concretely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triviality {
	pub has_parameters: bool,
	pub has_loops: bool,
	pub has_recursion: bool,
}

impl Triviality {
	/// Trivial methods have no parameters, no loops, and no self call;
	/// they behave the same on every input.
	pub fn is_trivial(&self) -> bool {
		!self.has_parameters && !self.has_loops && !self.has_recursion
	}

	pub fn justification(&self) -> String {
		if self.is_trivial() {
			return "trivial: no parameters, loops, or recursion".to_owned();
		}
		let mut reasons = Vec::new();
		if self.has_parameters {
			reasons.push("has parameters");
		}
		if self.has_loops {
			reasons.push("contains loops");
		}
		if self.has_recursion {
			reasons.push("has recursive calls");
		}
		format!("non-trivial: {}", reasons.join(", "))
	}
}

/// Checks a method for triviality. Loop detection is two sided: a loop
/// construct in the source or a backward `goto` in the bytecode both
/// count, whichever is available.
pub fn check_triviality(
	tree: &SourceTree,
	bytecode: &Bytecode,
	method: &AbsMethodId,
) -> Result<Triviality> {
	let node = tree.method_node(method)?;

	let mut has_loops = false;
	visit(node, &mut |n| {
		if matches!(
			n.kind(),
			"while_statement" | "for_statement" | "do_statement" | "enhanced_for_statement",
		) {
			has_loops = true;
		}
	});

	if !has_loops {
		if let Ok(insns) = bytecode.method(method) {
			has_loops = insns.iter().any(|insn| {
				matches!(insn.op, Opcode::Goto { target } if target < insn.offset)
			});
		}
	}

	let mut has_recursion = false;
	visit(node, &mut |n| {
		if n.kind() == "method_invocation" {
			if let Some(name) = n.child_by_field_name("name") {
				if tree.text(name) == method.member.name {
					has_recursion = true;
				}
			}
		}
	});

	Ok(Triviality {
		has_parameters: !method.member.params.is_empty(),
		has_loops,
		has_recursion,
	})
}

/// Mines the integer literals of a method body. Each literal contributes
/// itself, its negation, and zero; these seed the widening thresholds.
pub fn interesting_values(tree: &SourceTree, method_node: Node<'_>) -> BTreeSet<i64> {
	let mut values = BTreeSet::new();

	visit(method_node, &mut |node| {
		let literal = match node.kind() {
			"decimal_integer_literal"
			| "hex_integer_literal"
			| "octal_integer_literal"
			| "binary_integer_literal" => tree.text(node),
			_ => return,
		};
		if let Some(value) = parse_integer_literal(literal) {
			values.insert(value);
			values.insert(-value);
			values.insert(0);
		}
	});

	values
}

/// The widening thresholds for a method: the default spread plus every
/// mined literal with its direct neighbors.
pub fn thresholds_for(values: &BTreeSet<i64>) -> KSet {
	let mut k = KSet::defaults();
	for value in values {
		k.insert_around(*value);
	}
	k
}

fn parse_integer_literal(text: &str) -> Option<i64> {
	let text = text.replace('_', "");
	let text = text.trim_end_matches(['l', 'L']);
	let lower = text.to_ascii_lowercase();

	if let Some(hex) = lower.strip_prefix("0x") {
		i64::from_str_radix(hex, 16).ok()
	} else if let Some(bin) = lower.strip_prefix("0b") {
		i64::from_str_radix(bin, 2).ok()
	} else if lower.len() > 1 && lower.starts_with('0') {
		i64::from_str_radix(&lower[1..], 8).ok()
	} else {
		lower.parse().ok()
	}
}

use anyhow::Result;
use log::{debug, warn};
use domains::{BoxDomain, FloatInterval, Interval, KSet, MachineWord, SignSet, StringSet};
use interp::{AbstractAnalysis, AnalysisResult};
use jvm_model::{AbsMethodId, Bytecode, Outcome, Suite};
use debloat::syntactic::{interesting_values, thresholds_for, SourceTree};
use crate::DomainChoice;

const NAME: &str = "jinx";
const GROUP: &str = "jinx authors";
const TAGS: &[&str] = &["abstract-interpretation", "signs", "intervals", "rust"];

/// Wager on an outcome the analysis cannot rule out.
const POSSIBLE: u32 = 75;
/// Wager on an outcome the analysis ruled out.
const RULED_OUT: u32 = 5;

/// The `info` block of the tool protocol: name, version, group, tags.
pub fn print_info() {
	println!("{NAME}");
	println!("{}", env!("CARGO_PKG_VERSION"));
	println!("{GROUP}");
	println!("{}", TAGS.join(","));
}

/// Analyzes one method and prints a `outcome;confidence%` line for each
/// of the six queries.
pub fn analyze(suite: &Suite, method: &str, domain: DomainChoice) -> Result<()> {
	let method = AbsMethodId::parse(method)?;
	let bytecode = Bytecode::new(suite.clone());

	let analysis = AbstractAnalysis::new(&bytecode)
		.with_thresholds(mined_thresholds(suite, &method));

	let result = match domain {
		DomainChoice::Signs => analysis.run::<SignSet>(&method),
		DomainChoice::Interval => analysis.run::<Interval>(&method),
		DomainChoice::Words => analysis.run::<MachineWord>(&method),
		DomainChoice::Floats => analysis.run::<FloatInterval>(&method),
		DomainChoice::Strings => analysis.run::<StringSet>(&method),
		DomainChoice::Boxes => analysis.run::<BoxDomain>(&method),
	};

	match result {
		Ok(result) => print_wagers(&result),
		Err(error) => {
			// an analysis that fell over tells us nothing either way
			warn!("analysis of {method} failed: {error:#}");
			for query in Outcome::QUERIES {
				let wager = if query == Outcome::Diverges { POSSIBLE } else { 50 };
				println!("{query};{wager}%");
			}
		},
	}
	Ok(())
}

fn print_wagers(result: &AnalysisResult) {
	debug!("possible outcomes: {:?}", result.outcomes);
	for query in Outcome::QUERIES {
		let wager = if result.possible(query) { POSSIBLE } else { RULED_OUT };
		println!("{query};{wager}%");
	}
}

/// The widening thresholds mined from the method's source, falling back
/// to the default spread when the source is unavailable.
pub fn mined_thresholds(suite: &Suite, method: &AbsMethodId) -> KSet {
	let mined = SourceTree::from_file(&suite.sourcefile(&method.class))
		.ok()
		.and_then(|tree| {
			let node = tree.method_node(method).ok()?;
			Some(interesting_values(&tree, node))
		});

	match mined {
		Some(values) => thresholds_for(&values),
		None => {
			debug!("no source for {method}, widening over the default thresholds");
			KSet::defaults()
		},
	}
}

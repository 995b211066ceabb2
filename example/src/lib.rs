mod bounds;
mod programs;

use anyhow::{bail, Result};
use log::info;
use structopt::StructOpt;

use dai_engine::daig::Daig;
use dai_engine::flow::shared::Context;
use dai_shared::logging;

use crate::bounds::{BoundsChecker, Finding, Verdict};
use crate::programs::{DemoProgram, NegativeIndex, OffByOne, SafeLoop, UnknownIndex};

#[derive(StructOpt)]
enum Demo {
    SafeLoop,
    OffByOne,
    NegativeIndex,
    UnknownIndex,
}

#[derive(StructOpt)]
#[structopt(
    name = "dai-example",
    about = "Array bounds checking on demo programs with demanded abstract interpretation",
    rename_all = "kebab-case"
)]
struct Args {
    /// Verbosity (repeat for more)
    #[structopt(short, long, parse(from_occurrences))]
    verbose: usize,

    /// Print the findings as JSON
    #[structopt(long)]
    json: bool,

    /// Demo program
    #[structopt(subcommand)]
    demo: Demo,
}

fn execute<P: DemoProgram>(json: bool) -> Result<()> {
    let mut ctxt = Context::new();
    let cfg = P::build(ctxt.alloc());
    let mut daig = Daig::of_cfg(cfg);
    let findings: Vec<Finding> = BoundsChecker::new(&mut daig).check()?;

    let stats = daig.stats();
    info!(
        "[{}] {} access(es) checked, {} state(s) computed, {} widening(s)",
        P::name(),
        findings.len(),
        stats.computed,
        stats.widens
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&findings)?);
    } else {
        for finding in &findings {
            println!("{}", finding);
        }
    }
    if findings.iter().any(|f| f.verdict == Verdict::Unsafe) {
        bail!("{} has out-of-bounds accesses", P::name());
    }
    Ok(())
}

/// Main entrypoint
pub fn entrypoint() -> Result<()> {
    // setup
    let args = Args::from_args();
    let Args {
        verbose,
        json,
        demo,
    } = args;
    logging::setup(verbose)?;

    // run the subcommand
    match demo {
        Demo::SafeLoop => execute::<SafeLoop>(json),
        Demo::OffByOne => execute::<OffByOne>(json),
        Demo::NegativeIndex => execute::<NegativeIndex>(json),
        Demo::UnknownIndex => execute::<UnknownIndex>(json),
    }
}

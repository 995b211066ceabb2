use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Result};
use log::{info, warn};
use structopt::StructOpt;

use dai_engine::flow::shared::Context;
use dai_engine::flow::Workflow;
use dai_shared::config::PATH_STUDIO;
use dai_shared::logging;

#[derive(StructOpt)]
#[structopt(
    name = "dai-engine",
    about = "Demanded abstract interpretation over a program CFG",
    rename_all = "kebab-case"
)]
struct Args {
    /// Output directory for dot files
    #[structopt(short, long)]
    output: Option<PathBuf>,

    /// Verbosity (repeat for more)
    #[structopt(short, long, parse(from_occurrences))]
    verbose: usize,

    /// Actions
    #[structopt(short, long, default_value = "states")]
    actions: Vec<Action>,

    /// Only demand the states at these labels
    #[structopt(long)]
    at: Vec<String>,

    /// Limit the number of demand rounds
    #[structopt(short, long)]
    depth: Option<usize>,

    /// Program file (JSON)
    input: PathBuf,
}

enum Action {
    /// Print the abstract states
    States,
    /// Dump the CFG and the DAIG in dot format
    Dot,
}

impl FromStr for Action {
    type Err = &'static str;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let action = match s {
            "states" => Self::States,
            "dot" => Self::Dot,
            _ => return Err("invalid action"),
        };
        Ok(action)
    }
}

fn main() -> Result<()> {
    let args = Args::from_args();
    let Args {
        output,
        verbose,
        actions,
        at,
        depth,
        input,
    } = args;

    // setup logging
    logging::setup(verbose)?;

    // run the workflow
    let mut ctxt = Context::new();
    let mut flow = Workflow::new(input, depth);
    for label in at {
        flow = flow.focus(label);
    }
    let report = flow.execute(&mut ctxt)?;
    if report.trace.is_empty() {
        bail!("demand leaves no states in trace");
    }
    info!("Number of demand rounds: {}", report.trace.len());
    if !report.is_stable() {
        warn!("states are not stable yet, consider a larger depth");
    }

    for action in actions {
        match action {
            Action::States => {
                for (label, state) in report.states() {
                    println!("{}: {}", label, state);
                }
            }
            Action::Dot => {
                let output = output.clone().unwrap_or_else(|| PATH_STUDIO.join("dai"));
                match report.dump_dot(&output) {
                    Ok((path_cfg, path_daig)) => info!(
                        "Graphs written to {} and {}",
                        path_cfg.display(),
                        path_daig.display()
                    ),
                    Err(e) => warn!("unable to write dot files: {}", e),
                }
            }
        }
    }

    // done with everything
    Ok(())
}

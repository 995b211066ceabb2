use std::env;
use std::fs;
use std::path::Path;

use anyhow::anyhow;
use datatest_stable::{harness, Result};

use dai_engine::analysis::domain::AbstractDomain;
use dai_engine::flow::shared::Context;
use dai_engine::flow::Workflow;

/// One line of an expectation file
enum Expected {
    /// `label: var = interval`
    Fact {
        label: String,
        var: String,
        value: String,
    },
    /// `label: bottom`
    Unreachable { label: String },
}

fn parse_expectations(content: &str) -> Vec<Expected> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let (label, rest) = line
                .split_once(':')
                .expect("expectation line without a label");
            let label = label.trim().to_string();
            let rest = rest.trim();
            if rest == "bottom" {
                Expected::Unreachable { label }
            } else {
                let (var, value) = rest
                    .split_once('=')
                    .expect("expectation line without a fact");
                Expected::Fact {
                    label,
                    var: var.trim().to_string(),
                    value: value.trim().to_string(),
                }
            }
        })
        .collect()
}

fn run_test(path_input: &Path) -> Result<()> {
    let verbose = env::var("LOG").map_or(false, |v| v != "0");

    // load the expected result
    let path_expect = path_input.with_extension("expect");
    let expected = fs::read_to_string(&path_expect)
        .expect("unable to load content from the expected output file");

    // run the analysis
    let mut ctxt = Context::new();
    let result = Workflow::new(path_input.to_path_buf(), None).execute(&mut ctxt);

    let success = match (result, expected.strip_prefix("error:")) {
        (Err(err), Some(message)) => {
            let obtained = err.to_string();
            if obtained != message.trim() {
                println!(
                    "Error message mismatch:\n{}\n<- expected vs obtained ->\n{}",
                    message.trim(),
                    obtained
                );
                false
            } else {
                true
            }
        }
        (Err(err), None) => {
            println!("Analysis failed while success is expected:\n{}", err);
            false
        }
        (Ok(_), Some(message)) => {
            println!(
                "Analysis succeeded while failure is expected:\n{}",
                message.trim()
            );
            false
        }
        (Ok(report), None) => {
            if verbose {
                println!("Number of demand rounds: {}", report.trace.len());
            }
            let states = report.states();
            let mut matched = report.is_stable();
            if !matched {
                println!("Analysis did not stabilize");
            }
            for item in parse_expectations(&expected) {
                match item {
                    Expected::Unreachable { label } => match states.get(&label) {
                        Some(state) if state.is_bot() => (),
                        other => {
                            println!("{}: expected bottom, obtained {:?}", label, other);
                            matched = false;
                        }
                    },
                    Expected::Fact { label, var, value } => {
                        let obtained = states.get(&label).map(|s| s.get(&var).to_string());
                        if obtained.as_deref() != Some(value.as_str()) {
                            println!(
                                "{}: expected {} = {}, obtained {:?}",
                                label, var, value, obtained
                            );
                            matched = false;
                        }
                    }
                }
            }
            matched
        }
    };

    // report back
    if success {
        Ok(())
    } else {
        Err(anyhow!("result does not match with expectation").into())
    }
}

harness!(run_test, "tests/programs", r".*\.json$");

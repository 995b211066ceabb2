use std::cell::Cell;

use log::{trace, SetLoggerError};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

thread_local! {
    /// Records the current depth of the tracer (per thread)
    static TRACE_DEPTH: Cell<usize> = Cell::new(0);
}

/// Tracer representing the context
pub struct Tracer {
    title: String,
    depth: usize,
}

impl Tracer {
    /// Create a tracing session
    pub fn new(title: String) -> Self {
        let depth = TRACE_DEPTH.with(|level| {
            let depth = level.get();
            level.set(depth + 1);
            depth
        });
        trace!("{}-> {}", "  ".repeat(depth), title);
        Self { title, depth }
    }

    /// Record a new event
    pub fn log(&self, event: &str) {
        trace!("{} {}", "  ".repeat(self.depth), event);
    }
}

impl Drop for Tracer {
    fn drop(&mut self) {
        let Self { title, depth } = self;
        trace!("{}<- {}", "  ".repeat(*depth), title);
        TRACE_DEPTH.with(|level| {
            debug_assert_eq!(level.get(), *depth + 1, "TRACE_DEPTH is out of sync");
            level.set(*depth);
        });
    }
}

/// Setup the logging globally
pub fn setup(verbose: usize) -> Result<(), SetLoggerError> {
    let verbosity = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    TermLogger::init(
        verbosity,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
}

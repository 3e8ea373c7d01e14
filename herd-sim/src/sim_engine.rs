// src/sim_engine.rs
// High-level simulation engine wrapper around the Kernel.
// Scenarios create a SimEngine, register agents, and run it.

use std::path::Path;

use log::{debug, error};

use crate::agents::Agent;
use crate::events::EventListener;
use crate::kernel::{Kernel, RunSummary};
use crate::latency::LatencyModel;
use crate::logging::{CsvOrderLogger, CsvSignalLogger, CsvTradeLogger, CsvValuationLogger};

/// High-level simulation engine: the kernel plus the CSV loggers attached to
/// its event bus.
pub struct SimEngine {
    pub kernel: Kernel,
}

fn attach<L, F>(kernel: &mut Kernel, name: &str, make: F)
where
    L: EventListener + 'static,
    F: FnOnce() -> std::io::Result<L>,
{
    // Don't fail the run over a log file, just report it.
    match make() {
        Ok(logger) => {
            kernel.event_bus_mut().subscribe(Box::new(logger) as Box<dyn EventListener>);
            debug!("[SimEngine] {name} attached");
        }
        Err(e) => error!("[SimEngine] failed to init {name}: {e}"),
    }
}

impl SimEngine {
    /// Create a new engine starting at `start_ns`, optionally writing CSV
    /// logs into `logs_dir`.
    pub fn new(latency: Box<dyn LatencyModel>, start_ns: u64, logs_dir: Option<&Path>) -> Self {
        let mut kernel = Kernel::new(latency, start_ns);

        if let Some(dir) = logs_dir {
            attach(&mut kernel, "CsvOrderLogger", || CsvOrderLogger::new(dir));
            attach(&mut kernel, "CsvTradeLogger", || CsvTradeLogger::new(dir));
            attach(&mut kernel, "CsvSignalLogger", || CsvSignalLogger::new(dir));
            attach(&mut kernel, "CsvValuationLogger", || CsvValuationLogger::new(dir));
        }

        Self { kernel }
    }

    pub fn add_agent(&mut self, agent: Box<dyn Agent>) {
        self.kernel.add_agent(agent);
    }

    pub fn subscribe(&mut self, listener: Box<dyn EventListener>) {
        self.kernel.event_bus_mut().subscribe(listener);
    }

    /// Run the underlying kernel until `stop_ns`.
    pub fn run(&mut self, stop_ns: u64) -> RunSummary {
        self.kernel.run(stop_ns)
    }
}

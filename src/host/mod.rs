//! Multi-instance host driver.
//!
//! Owns any number of independent CPUs and advances them together at a
//! fixed tick rate. Each tick steps every live instance exactly once; an
//! instance's own steps are always serialized, even when a tick is spread
//! across worker threads.

mod config;

pub use config::{ConfigError, FaultPolicy, HostConfig};

use crate::cpu::{Cpu, CpuError, MemoryError};
use log::{info, warn};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Sleeping for less than this is not worth the scheduler round trip.
const MIN_SLEEP: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Default)]
struct Instance {
    cpu: Cpu,
    /// Set once the instance has faulted and been parked.
    fault: Option<CpuError>,
}

/// Outcome of a single tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Instructions executed.
    pub stepped: usize,
    /// Instances that faulted this tick, by index.
    pub faults: Vec<(usize, CpuError)>,
}

/// Outcome of [`Host::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub instructions: u64,
    /// Instances parked after a fault.
    pub halted: usize,
}

/// Drives a fleet of CPUs.
#[derive(Debug)]
pub struct Host {
    config: HostConfig,
    instances: Vec<Instance>,
    ticks: u64,
}

impl Host {
    pub fn new(config: HostConfig) -> Result<Self, HostError> {
        config.validate()?;
        let instances = vec![Instance::default(); config.instances];
        Ok(Self {
            config,
            instances,
            ticks: 0,
        })
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Load the same program into every instance at the configured origin.
    pub fn load_all(&mut self, words: &[u16]) -> Result<(), HostError> {
        for instance in &mut self.instances {
            instance.cpu.load(self.config.origin, words)?;
        }
        Ok(())
    }

    pub fn cpu(&self, index: usize) -> Option<&Cpu> {
        self.instances.get(index).map(|i| &i.cpu)
    }

    pub fn cpus(&self) -> impl Iterator<Item = &Cpu> {
        self.instances.iter().map(|i| &i.cpu)
    }

    /// The fault that parked an instance, if any.
    pub fn fault(&self, index: usize) -> Option<&CpuError> {
        self.instances.get(index).and_then(|i| i.fault.as_ref())
    }

    /// Number of instances still running.
    pub fn live(&self) -> usize {
        self.instances.iter().filter(|i| i.fault.is_none()).count()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Step every live instance once.
    pub fn tick(&mut self) -> Result<TickReport, HostError> {
        let threads = self.config.threads.min(self.instances.len()).max(1);

        let report = if threads == 1 {
            step_chunk(0, &mut self.instances)
        } else {
            let chunk_size = self.instances.len().div_ceil(threads);
            let results = std::thread::scope(|s| {
                let handles: Vec<_> = self
                    .instances
                    .chunks_mut(chunk_size)
                    .enumerate()
                    .map(|(n, chunk)| s.spawn(move || step_chunk(n * chunk_size, chunk)))
                    .collect();
                handles.into_iter().map(|h| h.join()).collect::<Vec<_>>()
            });

            let mut report = TickReport::default();
            for result in results {
                let part = result.map_err(|_| HostError::WorkerPanicked)?;
                report.stepped += part.stepped;
                report.faults.extend(part.faults);
            }
            report
        };

        self.ticks += 1;
        self.handle_faults(&report.faults)?;
        Ok(report)
    }

    /// Tick until `max_ticks` is reached or no instance is left running,
    /// pacing each tick to the configured rate.
    pub fn run(&mut self) -> Result<RunSummary, HostError> {
        let period = self.config.tick_period();
        let start_ticks = self.ticks;
        let mut instructions = 0u64;

        info!(
            "running {} instances at {} Hz on {} thread(s)",
            self.instances.len(),
            self.config.tick_rate_hz,
            self.config.threads
        );

        loop {
            if let Some(max) = self.config.max_ticks {
                if self.ticks - start_ticks >= max {
                    break;
                }
            }
            if self.live() == 0 {
                break;
            }

            let started = Instant::now();
            let report = self.tick()?;
            instructions += report.stepped as u64;

            if let Some(remaining) = period.and_then(|p| p.checked_sub(started.elapsed())) {
                if remaining >= MIN_SLEEP {
                    std::thread::sleep(remaining);
                }
            }
        }

        let summary = RunSummary {
            ticks: self.ticks - start_ticks,
            instructions,
            halted: self.instances.len() - self.live(),
        };
        info!(
            "finished after {} ticks, {} instructions, {} halted",
            summary.ticks, summary.instructions, summary.halted
        );
        Ok(summary)
    }

    fn handle_faults(&mut self, faults: &[(usize, CpuError)]) -> Result<(), HostError> {
        for (index, err) in faults {
            warn!("instance {} faulted: {}", index, err);
            if let Some(instance) = self.instances.get_mut(*index) {
                instance.fault = Some(err.clone());
            }
        }

        match (self.config.fault_policy, faults.first()) {
            (FaultPolicy::Abort, Some((index, err))) => Err(HostError::Fault {
                instance: *index,
                source: err.clone(),
            }),
            _ => Ok(()),
        }
    }
}

fn step_chunk(offset: usize, chunk: &mut [Instance]) -> TickReport {
    let mut report = TickReport::default();

    for (i, instance) in chunk.iter_mut().enumerate() {
        if instance.fault.is_some() {
            continue;
        }
        match instance.cpu.step() {
            Ok(_) => report.stepped += 1,
            Err(e) => report.faults.push((offset + i, e)),
        }
    }

    report
}

/// Errors that stop a host run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("load error: {0}")]
    Load(#[from] MemoryError),

    #[error("instance {instance} faulted: {source}")]
    Fault {
        instance: usize,
        #[source]
        source: CpuError,
    },

    #[error("worker thread panicked")]
    WorkerPanicked,
}

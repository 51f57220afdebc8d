//! Write-behind persistence of chain samples as JSON lines.
//!
//! Samples are handed to a dedicated writer thread over a channel, so a slow
//! disk never stalls the next linear solve longer than a channel send. Each
//! line is flushed on its own; a crash loses at most the line being written,
//! and [`load_chain`] skips such a truncated tail.
//!
//! A retried write resumes at the first byte the sink did not accept, so a
//! short write never duplicates part of a line. A line abandoned halfway is
//! terminated before the next record, which keeps every later line parseable.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cl_sampler_core::analysis::{ChainSample, SolverDiagnostics};
use cl_sampler_core::Vector;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Attempts per line before the sample is given up.
const WRITE_ATTEMPTS: usize = 3;

/// Back-off before the second attempt; doubles for each later one.
const RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// One persisted chain sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainRecord {
    /// Chain identifier.
    pub jobid: u64,
    /// Zero-based Gibbs iteration.
    pub iteration: usize,
    /// Sampled C_ℓ.
    pub cl: Vec<f64>,
    /// Sampled realified a_ℓm.
    pub alm: Vec<f64>,
    /// σ_ℓ of `alm`.
    pub sigma: Vec<f64>,
    /// Multipoles whose draw was clamped.
    #[serde(default)]
    pub clamped: Vec<usize>,
    /// Linear-solve diagnostics.
    pub solver: SolverDiagnostics,
    /// Iteration wall time (s).
    pub seconds: f64,
}

impl ChainRecord {
    /// Record for `sample` in chain `jobid`.
    pub fn from_sample(sample: &ChainSample, jobid: u64) -> Self {
        Self {
            jobid,
            iteration: sample.iteration,
            cl: sample.cl.as_slice().to_vec(),
            alm: sample.alm.as_slice().to_vec(),
            sigma: sample.sigma.as_slice().to_vec(),
            clamped: sample.clamped.clone(),
            solver: sample.solver,
            seconds: sample.seconds,
        }
    }

    /// Sampled a_ℓm as a vector.
    pub fn alm_vector(&self) -> Vector {
        Vector::from_column_slice(&self.alm)
    }

    /// Sampled C_ℓ as a vector.
    pub fn cl_vector(&self) -> Vector {
        Vector::from_column_slice(&self.cl)
    }
}

/// Outcome of all writes of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReport {
    /// Lines written, including records carried over on resume.
    pub written: usize,
    /// Iterations whose line could not be written.
    pub failed: Vec<usize>,
}

/// Handle to the writer thread.
pub struct ChainWriter {
    sender: Option<Sender<ChainRecord>>,
    handle: Option<JoinHandle<WriteReport>>,
    /// Records written synchronously before the thread started.
    preexisting: usize,
    /// Iterations that never reached the thread.
    lost: Vec<usize>,
}

impl ChainWriter {
    /// Start a chain file at `path` holding `existing`, then the writer thread.
    ///
    /// `existing` is written to a sibling temporary file that is renamed over
    /// `path`, so the previous chain stays intact until its replacement is
    /// complete on disk.
    pub fn create(path: &Path, existing: &[ChainRecord]) -> Result<Self> {
        let staging = staging_path(path);
        let staged = write_records(&staging, existing);
        if let Err(e) = staged {
            let _ = fs::remove_file(&staging);
            return Err(e);
        }
        fs::rename(&staging, path).map_err(|e| Error::io(path, e))?;

        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| Error::io(path, e))?;
        let mut writer = Self::spawn(file);
        writer.preexisting = existing.len();
        Ok(writer)
    }

    /// Start a writer thread over an arbitrary sink.
    pub fn spawn<W: Write + Send + 'static>(sink: W) -> Self {
        let (sender, receiver) = mpsc::channel::<ChainRecord>();
        let handle = thread::spawn(move || {
            let mut sink = sink;
            let mut report = WriteReport::default();
            // A previous line was abandoned after part of it reached the sink.
            let mut torn = false;
            for record in receiver {
                match serde_json::to_string(&record) {
                    Ok(line) => {
                        let mut bytes = Vec::with_capacity(line.len() + 2);
                        if torn {
                            bytes.push(b'\n');
                        }
                        bytes.extend_from_slice(line.as_bytes());
                        bytes.push(b'\n');

                        let mut offset = 0;
                        match write_with_retry(&mut sink, &bytes, &mut offset) {
                            Ok(()) => {
                                torn = false;
                                report.written += 1;
                            }
                            Err(e) => {
                                // Open unless exactly the separator got through.
                                torn = offset != usize::from(torn);
                                tracing::error!(
                                    iteration = record.iteration,
                                    attempts = WRITE_ATTEMPTS,
                                    error = %e,
                                    "failed to persist chain sample"
                                );
                                report.failed.push(record.iteration);
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(
                            iteration = record.iteration,
                            error = %e,
                            "failed to encode chain sample"
                        );
                        report.failed.push(record.iteration);
                    }
                }
            }
            report
        });
        Self {
            sender: Some(sender),
            handle: Some(handle),
            preexisting: 0,
            lost: Vec::new(),
        }
    }

    /// Queue a record. Never blocks on I/O.
    pub fn send(&mut self, record: ChainRecord) {
        let iteration = record.iteration;
        let delivered = self
            .sender
            .as_ref()
            .is_some_and(|sender| sender.send(record).is_ok());
        if !delivered {
            tracing::error!(iteration, "chain writer thread is gone; sample not persisted");
            self.lost.push(iteration);
        }
    }

    /// Close the channel, wait for outstanding writes and report.
    pub fn finish(mut self) -> WriteReport {
        self.shutdown()
    }

    fn shutdown(&mut self) -> WriteReport {
        drop(self.sender.take());
        let mut report = match self.handle.take().map(JoinHandle::join) {
            Some(Ok(report)) => report,
            Some(Err(_)) => {
                tracing::error!("chain writer thread panicked");
                WriteReport::default()
            }
            None => WriteReport::default(),
        };
        report.written += self.preexisting;
        report.failed.append(&mut self.lost);
        report.failed.sort_unstable();
        report
    }
}

impl Drop for ChainWriter {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown();
        }
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_records(path: &Path, records: &[ChainRecord]) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut sink = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut sink, record)?;
        sink.write_all(b"\n").map_err(|e| Error::io(path, e))?;
    }
    let file = sink.into_inner().map_err(|e| Error::io(path, e.into_error()))?;
    file.sync_all().map_err(|e| Error::io(path, e))
}

/// Push `bytes[*offset..]` into `sink`, advancing `offset` past every byte
/// the sink accepts.
fn write_from<W: Write>(sink: &mut W, bytes: &[u8], offset: &mut usize) -> io::Result<()> {
    while *offset < bytes.len() {
        match sink.write(&bytes[*offset..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "chain sink accepted no bytes",
                ))
            }
            Ok(n) => *offset += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    sink.flush()
}

/// Write `bytes` with up to [`WRITE_ATTEMPTS`] attempts. Each retry continues
/// from `offset`; on failure `offset` tells how much of `bytes` was accepted.
fn write_with_retry<W: Write>(sink: &mut W, bytes: &[u8], offset: &mut usize) -> io::Result<()> {
    let mut backoff = RETRY_BACKOFF;
    let mut attempt = 1;
    loop {
        match write_from(sink, bytes, offset) {
            Ok(()) => return Ok(()),
            Err(e) if attempt < WRITE_ATTEMPTS => {
                tracing::warn!(attempt, written = *offset, error = %e, "chain write failed, retrying");
                thread::sleep(backoff);
                backoff *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Records read back from a chain file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedChain {
    /// Valid records in file order, iterations strictly increasing.
    pub records: Vec<ChainRecord>,
    /// Lines that could not be used.
    pub skipped: usize,
}

impl LoadedChain {
    /// Last persisted record.
    pub fn last(&self) -> Option<&ChainRecord> {
        self.records.last()
    }
}

/// Read a chain file, skipping malformed or out-of-order lines with a warning.
pub fn load_chain(path: &Path) -> Result<LoadedChain> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut chain = LoadedChain::default();

    for (line_num, line) in BufReader::new(file).lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(line = line_num + 1, error = %e, "skipping unreadable chain line");
                chain.skipped += 1;
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let record: ChainRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(line = line_num + 1, error = %e, "skipping malformed chain line");
                chain.skipped += 1;
                continue;
            }
        };
        if chain
            .records
            .last()
            .is_some_and(|prev| record.iteration <= prev.iteration)
        {
            tracing::warn!(
                line = line_num + 1,
                iteration = record.iteration,
                "skipping out-of-order chain line"
            );
            chain.skipped += 1;
            continue;
        }
        chain.records.push(record);
    }

    Ok(chain)
}

//! Background I/O scheduling.
//!
//! One OS thread services pipe transfers and process exits, appending
//! completion records to a queue that the main thread drains synchronously
//! between device events. The queue is the only shared mutable state; the
//! scheduler's interior is touched solely by the background thread.
//!
//! Completions address their targets by opaque handle, never by reference:
//! a completion arriving for a closed refraction degrades to a no-op on
//! the main thread. Insertion points are re-resolved there via tracked
//! cursors, since user edits interleave with transfers by design.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::process::Child;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use thiserror::Error;
use tracing::{debug, trace, warn};

#[derive(Debug, Error)]
pub enum IoTaskError {
    #[error("scheduler thread is not running")]
    NotRunning,
    #[error("i/o failure: {0}")]
    Failure(String),
}

/// Opaque handle identifying the refraction a transfer targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IoTarget(pub u64);

/// Identity of a scheduled transfer, used for interruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IoLink(pub u64);

/// A completed unit of background work, executed by the main thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Decoded text read from a pipe; spliced at the target's tracked
    /// cursor. `finished` marks the final transfer of the stream.
    Insertion {
        link: IoLink,
        target: IoTarget,
        text: String,
        finished: bool,
    },
    /// Bytes accepted by a sink.
    Transmission {
        link: IoLink,
        target: IoTarget,
        written: usize,
        finished: bool,
    },
    /// A spawned process exited.
    Exit {
        link: IoLink,
        target: IoTarget,
        pid: u32,
        code: i32,
    },
    /// A kernel-side error surfaced as data; never unwinds past the loop.
    Failure {
        link: IoLink,
        target: IoTarget,
        error: String,
    },
}

impl Completion {
    pub fn target(&self) -> IoTarget {
        match self {
            Completion::Insertion { target, .. }
            | Completion::Transmission { target, .. }
            | Completion::Exit { target, .. }
            | Completion::Failure { target, .. } => *target,
        }
    }

    pub fn link(&self) -> IoLink {
        match self {
            Completion::Insertion { link, .. }
            | Completion::Transmission { link, .. }
            | Completion::Exit { link, .. }
            | Completion::Failure { link, .. } => *link,
        }
    }
}

enum Job {
    Read {
        link: IoLink,
        target: IoTarget,
        source: Box<dyn Read + Send>,
    },
    Write {
        link: IoLink,
        target: IoTarget,
        sink: Box<dyn Write + Send>,
        data: Box<dyn Iterator<Item = Vec<u8>> + Send>,
    },
    Process {
        link: IoLink,
        target: IoTarget,
        child: Child,
    },
    Shutdown,
}

const READ_SIZE: usize = 1024;
const WRITE_SIZE: usize = 512;
const POLL_DELAY: Duration = Duration::from_millis(16);

struct ReadState {
    link: IoLink,
    target: IoTarget,
    source: Box<dyn Read + Send>,
    /// Undecoded tail bytes carried between transfers.
    partial: Vec<u8>,
}

struct WriteState {
    link: IoLink,
    target: IoTarget,
    sink: Box<dyn Write + Send>,
    data: Box<dyn Iterator<Item = Vec<u8>> + Send>,
    buffer: Vec<u8>,
}

struct ProcessState {
    link: IoLink,
    target: IoTarget,
    child: Child,
}

/// Decode the maximal valid UTF-8 prefix, replacing invalid interior
/// sequences and carrying an incomplete tail for the next transfer.
fn decode_chunk(partial: &mut Vec<u8>, chunk: &[u8], finishing: bool) -> String {
    partial.extend_from_slice(chunk);
    if partial.is_empty() {
        return String::new();
    }

    match std::str::from_utf8(partial) {
        Ok(s) => {
            let out = s.to_string();
            partial.clear();
            out
        }
        Err(e) => {
            let valid = e.valid_up_to();
            let tail_len = partial.len() - valid;
            if !finishing && e.error_len().is_none() && tail_len < 4 {
                // Incomplete sequence at the boundary; defer it.
                let out = String::from_utf8_lossy(&partial[..valid]).into_owned();
                let tail: Vec<u8> = partial[valid..].to_vec();
                *partial = tail;
                out
            } else {
                // Truly invalid input: the replacement strategy applies.
                let out = String::from_utf8_lossy(partial).into_owned();
                partial.clear();
                out
            }
        }
    }
}

/// System dispatch for I/O jobs.
pub struct IoManager {
    jobs: Sender<Job>,
    transfers: Receiver<Completion>,
    next_link: AtomicU64,
    interrupts: Arc<InterruptSet>,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct InterruptSet {
    flags: std::sync::Mutex<HashMap<u64, Arc<AtomicBool>>>,
}

impl InterruptSet {
    fn flag(&self, link: IoLink) -> Arc<AtomicBool> {
        self.flags
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(link.0)
            .or_default()
            .clone()
    }

    fn raise(&self, link: IoLink) {
        self.flag(link).store(true, Ordering::Release);
    }

    fn clear(&self, link: IoLink) {
        self.flags
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&link.0);
    }
}

impl IoManager {
    /// Instantiate the manager and dispatch the scheduler thread.
    ///
    /// `signal` is invoked by the background thread after transfers are
    /// appended, waking the main loop through the device.
    pub fn allocate(signal: impl Fn() + Send + 'static) -> Result<Self, IoTaskError> {
        let (jobs_tx, jobs_rx) = unbounded::<Job>();
        let (transfers_tx, transfers_rx) = unbounded::<Completion>();
        let interrupts: Arc<InterruptSet> = Arc::default();

        let loop_interrupts = interrupts.clone();
        let handle = std::thread::Builder::new()
            .name("prism-io".to_string())
            .spawn(move || scheduler_loop(jobs_rx, transfers_tx, signal, loop_interrupts))
            .map_err(|e| IoTaskError::Failure(e.to_string()))?;

        Ok(Self {
            jobs: jobs_tx,
            transfers: transfers_rx,
            next_link: AtomicU64::new(1),
            interrupts,
            handle: Some(handle),
        })
    }

    fn link(&self) -> IoLink {
        IoLink(self.next_link.fetch_add(1, Ordering::Relaxed))
    }

    /// Remove the current set of transfers for processing by the main
    /// loop. Drained completions execute in FIFO order.
    pub fn take(&self) -> Vec<Completion> {
        self.transfers.try_iter().collect()
    }

    /// Schedule reads from `source` into the target's cursor.
    pub fn read_into(
        &self,
        target: IoTarget,
        source: Box<dyn Read + Send>,
    ) -> Result<IoLink, IoTaskError> {
        let link = self.link();
        self.jobs
            .send(Job::Read {
                link,
                target,
                source,
            })
            .map_err(|_| IoTaskError::NotRunning)?;
        Ok(link)
    }

    /// Schedule writes of `data` chunks into `sink`.
    pub fn write_from(
        &self,
        target: IoTarget,
        sink: Box<dyn Write + Send>,
        data: Box<dyn Iterator<Item = Vec<u8>> + Send>,
    ) -> Result<IoLink, IoTaskError> {
        let link = self.link();
        self.jobs
            .send(Job::Write {
                link,
                target,
                sink,
                data,
            })
            .map_err(|_| IoTaskError::NotRunning)?;
        Ok(link)
    }

    /// Observe the exit of a spawned process.
    pub fn process(&self, target: IoTarget, child: Child) -> Result<IoLink, IoTaskError> {
        let link = self.link();
        self.jobs
            .send(Job::Process {
                link,
                target,
                child,
            })
            .map_err(|_| IoTaskError::NotRunning)?;
        Ok(link)
    }

    /// Force the link's next transition to perform a zero-length transfer
    /// and finalize; processes receive a kill signal.
    pub fn interrupt(&self, link: IoLink) {
        self.interrupts.raise(link);
    }
}

impl Drop for IoManager {
    fn drop(&mut self) {
        let _ = self.jobs.send(Job::Shutdown);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

/// Event loop for system I/O: drain incoming jobs, advance each active
/// transfer by one bounded step, signal the main thread when completions
/// were appended.
fn scheduler_loop(
    jobs: Receiver<Job>,
    transfers: Sender<Completion>,
    signal: impl Fn(),
    interrupts: Arc<InterruptSet>,
) {
    let mut reads: Vec<ReadState> = Vec::new();
    let mut writes: Vec<WriteState> = Vec::new();
    let mut processes: Vec<ProcessState> = Vec::new();

    loop {
        // Accept new work.
        loop {
            match jobs.try_recv() {
                Ok(Job::Read {
                    link,
                    target,
                    source,
                }) => reads.push(ReadState {
                    link,
                    target,
                    source,
                    partial: Vec::new(),
                }),
                Ok(Job::Write {
                    link,
                    target,
                    sink,
                    data,
                }) => writes.push(WriteState {
                    link,
                    target,
                    sink,
                    data,
                    buffer: Vec::new(),
                }),
                Ok(Job::Process {
                    link,
                    target,
                    child,
                }) => processes.push(ProcessState {
                    link,
                    target,
                    child,
                }),
                Ok(Job::Shutdown) | Err(TryRecvError::Disconnected) => {
                    debug!(target: "io.loop", "scheduler_shutdown");
                    return;
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        let mut appended = false;

        // Advance reads.
        reads.retain_mut(|r| {
            let interrupted = interrupts.flag(r.link).load(Ordering::Acquire);
            let mut buf = [0u8; READ_SIZE];
            let outcome = if interrupted {
                Ok(0)
            } else {
                r.source.read(&mut buf)
            };
            match outcome {
                Ok(0) => {
                    let text = decode_chunk(&mut r.partial, &[], true);
                    let _ = transfers.send(Completion::Insertion {
                        link: r.link,
                        target: r.target,
                        text,
                        finished: true,
                    });
                    interrupts.clear(r.link);
                    appended = true;
                    false
                }
                Ok(n) => {
                    let text = decode_chunk(&mut r.partial, &buf[..n], false);
                    if !text.is_empty() {
                        let _ = transfers.send(Completion::Insertion {
                            link: r.link,
                            target: r.target,
                            text,
                            finished: false,
                        });
                        appended = true;
                    }
                    true
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => true,
                Err(e) => {
                    warn!(target: "io.loop", error = %e, "read_failure");
                    let _ = transfers.send(Completion::Failure {
                        link: r.link,
                        target: r.target,
                        error: e.to_string(),
                    });
                    interrupts.clear(r.link);
                    appended = true;
                    false
                }
            }
        });

        // Advance writes.
        writes.retain_mut(|w| {
            let interrupted = interrupts.flag(w.link).load(Ordering::Acquire);
            if interrupted {
                let _ = transfers.send(Completion::Transmission {
                    link: w.link,
                    target: w.target,
                    written: 0,
                    finished: true,
                });
                interrupts.clear(w.link);
                appended = true;
                return false;
            }

            if w.buffer.is_empty() {
                match w.data.next() {
                    Some(chunk) => w.buffer = chunk,
                    None => {
                        let _ = w.sink.flush();
                        let _ = transfers.send(Completion::Transmission {
                            link: w.link,
                            target: w.target,
                            written: 0,
                            finished: true,
                        });
                        interrupts.clear(w.link);
                        appended = true;
                        return false;
                    }
                }
            }

            let take = w.buffer.len().min(WRITE_SIZE);
            match w.sink.write(&w.buffer[..take]) {
                Ok(n) => {
                    w.buffer.drain(..n);
                    let _ = transfers.send(Completion::Transmission {
                        link: w.link,
                        target: w.target,
                        written: n,
                        finished: false,
                    });
                    appended = true;
                    true
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => true,
                Err(e) => {
                    // Broken pipes finalize quietly; other errors surface.
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        let _ = transfers.send(Completion::Failure {
                            link: w.link,
                            target: w.target,
                            error: e.to_string(),
                        });
                    } else {
                        let _ = transfers.send(Completion::Transmission {
                            link: w.link,
                            target: w.target,
                            written: 0,
                            finished: true,
                        });
                    }
                    interrupts.clear(w.link);
                    appended = true;
                    false
                }
            }
        });

        // Observe process exits.
        processes.retain_mut(|p| {
            if interrupts.flag(p.link).load(Ordering::Acquire) {
                let _ = p.child.kill();
            }
            match p.child.try_wait() {
                Ok(Some(status)) => {
                    let code = status.code().unwrap_or(-1);
                    trace!(target: "io.loop", pid = p.child.id(), code, "process_exit");
                    let _ = transfers.send(Completion::Exit {
                        link: p.link,
                        target: p.target,
                        pid: p.child.id(),
                        code,
                    });
                    interrupts.clear(p.link);
                    appended = true;
                    false
                }
                Ok(None) => true,
                Err(e) => {
                    let _ = transfers.send(Completion::Failure {
                        link: p.link,
                        target: p.target,
                        error: e.to_string(),
                    });
                    interrupts.clear(p.link);
                    appended = true;
                    false
                }
            }
        });

        if appended {
            // Producer appends, then signals; the consumer moves the tail.
            signal();
        }

        if reads.is_empty() && writes.is_empty() && processes.is_empty() {
            // Idle; block briefly for the next job.
            match jobs.recv_timeout(POLL_DELAY * 4) {
                Ok(job) => {
                    // Re-queue through the intake on the next iteration.
                    match job {
                        Job::Shutdown => return,
                        Job::Read {
                            link,
                            target,
                            source,
                        } => reads.push(ReadState {
                            link,
                            target,
                            source,
                            partial: Vec::new(),
                        }),
                        Job::Write {
                            link,
                            target,
                            sink,
                            data,
                        } => writes.push(WriteState {
                            link,
                            target,
                            sink,
                            data,
                            buffer: Vec::new(),
                        }),
                        Job::Process {
                            link,
                            target,
                            child,
                        } => processes.push(ProcessState {
                            link,
                            target,
                            child,
                        }),
                    }
                }
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return,
            }
        } else {
            std::thread::sleep(POLL_DELAY);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn drain_until(io: &IoManager, want: impl Fn(&[Completion]) -> bool) -> Vec<Completion> {
        let mut got = Vec::new();
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(5) {
            got.extend(io.take());
            if want(&got) {
                return got;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("timed out; collected {got:?}");
    }

    #[test]
    fn read_job_streams_and_finalizes() {
        let io = IoManager::allocate(|| {}).unwrap();
        let source = std::io::Cursor::new(b"hello stream".to_vec());
        let link = io.read_into(IoTarget(7), Box::new(source)).unwrap();

        let got = drain_until(&io, |cs| {
            cs.iter()
                .any(|c| matches!(c, Completion::Insertion { finished: true, .. }))
        });

        let text: String = got
            .iter()
            .filter_map(|c| match c {
                Completion::Insertion { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "hello stream");
        assert!(got.iter().all(|c| c.target() == IoTarget(7)));
        assert!(got.iter().all(|c| c.link() == link));
    }

    #[test]
    fn invalid_utf8_replaced() {
        let io = IoManager::allocate(|| {}).unwrap();
        let source = std::io::Cursor::new(vec![b'a', 0xFF, b'b']);
        io.read_into(IoTarget(1), Box::new(source)).unwrap();

        let got = drain_until(&io, |cs| {
            cs.iter()
                .any(|c| matches!(c, Completion::Insertion { finished: true, .. }))
        });
        let text: String = got
            .iter()
            .filter_map(|c| match c {
                Completion::Insertion { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert!(text.starts_with('a'));
        assert!(text.contains('\u{FFFD}'));
        assert!(text.ends_with('b'));
    }

    struct SharedSink(Arc<Mutex<Vec<u8>>>);
    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_job_drains_iterator() {
        let io = IoManager::allocate(|| {}).unwrap();
        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink = SharedSink(collected.clone());
        let chunks: Vec<Vec<u8>> = vec![b"one ".to_vec(), b"two ".to_vec(), b"three".to_vec()];
        io.write_from(IoTarget(2), Box::new(sink), Box::new(chunks.into_iter()))
            .unwrap();

        drain_until(&io, |cs| {
            cs.iter()
                .any(|c| matches!(c, Completion::Transmission { finished: true, .. }))
        });
        assert_eq!(collected.lock().unwrap().as_slice(), b"one two three");
    }

    /// A reader that blocks forever unless interrupted.
    struct Stalling;
    impl Read for Stalling {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            std::thread::sleep(Duration::from_millis(5));
            Err(std::io::Error::new(std::io::ErrorKind::WouldBlock, "stall"))
        }
    }

    #[test]
    fn interrupt_forces_zero_transfer_finalization() {
        let io = IoManager::allocate(|| {}).unwrap();
        let link = io.read_into(IoTarget(3), Box::new(Stalling)).unwrap();

        // Let the job start stalling, then interrupt.
        std::thread::sleep(Duration::from_millis(30));
        io.interrupt(link);

        let got = drain_until(&io, |cs| {
            cs.iter()
                .any(|c| matches!(c, Completion::Insertion { finished: true, .. }))
        });
        assert!(got.iter().any(
            |c| matches!(c, Completion::Insertion { finished: true, text, .. } if text.is_empty())
        ));
    }

    #[test]
    fn wakeup_signal_fires_on_completion() {
        let count = Arc::new(AtomicUsize::new(0));
        let c2 = count.clone();
        let io = IoManager::allocate(move || {
            c2.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        io.read_into(IoTarget(4), Box::new(std::io::Cursor::new(b"x".to_vec())))
            .unwrap();
        drain_until(&io, |cs| {
            cs.iter()
                .any(|c| matches!(c, Completion::Insertion { finished: true, .. }))
        });
        assert!(count.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn completions_drain_fifo() {
        let io = IoManager::allocate(|| {}).unwrap();
        let source = std::io::Cursor::new(vec![b'z'; READ_SIZE * 3]);
        io.read_into(IoTarget(5), Box::new(source)).unwrap();

        let got = drain_until(&io, |cs| {
            cs.iter()
                .any(|c| matches!(c, Completion::Insertion { finished: true, .. }))
        });
        // Partial transfers precede the finalization.
        let finished_at = got
            .iter()
            .position(|c| matches!(c, Completion::Insertion { finished: true, .. }))
            .unwrap();
        assert_eq!(finished_at, got.len() - 1);
        assert!(finished_at >= 1);
    }
}

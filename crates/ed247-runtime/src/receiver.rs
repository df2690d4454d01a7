//! Background threads feeding inbound frames to their channels.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use ed247_transport::{TransportError, TransportLink};
use tracing::{debug, error, info};

use crate::channel::Channel;
use crate::error::{Ed247Error, Result};

struct Worker {
    channel: String,
    handle: JoinHandle<()>,
}

/// One thread per receivable link, stopped together.
pub(crate) struct ReceiverSet {
    stop: Arc<AtomicBool>,
    workers: Vec<Worker>,
}

impl ReceiverSet {
    pub fn start(
        channels: &[Arc<Channel>],
        poll_interval: Duration,
        buffer_size: usize,
    ) -> Result<Self> {
        let mut set = Self {
            stop: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
        };
        for channel in channels {
            for (index, link) in channel.receive_links().enumerate() {
                let label = channel.name().to_string();
                let worker_channel = channel.clone();
                let link = link.clone();
                let stop = set.stop.clone();
                let handle = thread::Builder::new()
                    .name(format!("ed247-rx-{label}-{index}"))
                    .spawn(move || {
                        receive_loop(&worker_channel, link.as_ref(), &stop, poll_interval, buffer_size)
                    })
                    // Threads started so far are stopped when `set` drops.
                    .map_err(|err| Ed247Error::Transport(TransportError::Io(err)))?;
                set.workers.push(Worker {
                    channel: label,
                    handle,
                });
            }
        }
        info!(threads = set.workers.len(), "receivers started");
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Signal every thread and wait for it. Reports the first thread that
    /// panicked.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::Release);
        let mut result = Ok(());
        for worker in self.workers.drain(..) {
            if worker.handle.join().is_err() && result.is_ok() {
                result = Err(Ed247Error::ReceiverPanicked(worker.channel));
            }
        }
        info!("receivers stopped");
        result
    }
}

impl Drop for ReceiverSet {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            let _ = self.shutdown();
        }
    }
}

fn receive_loop(
    channel: &Channel,
    link: &dyn TransportLink,
    stop: &AtomicBool,
    poll_interval: Duration,
    buffer_size: usize,
) {
    let mut buf = vec![0u8; buffer_size];
    debug!(channel = %channel.name(), link = %link.describe(), "receiver running");
    while !stop.load(Ordering::Acquire) {
        match link.recv(&mut buf, poll_interval) {
            Ok(Some(len)) => {
                channel.deliver(Bytes::copy_from_slice(&buf[..len]));
            }
            Ok(None) => {}
            Err(TransportError::Shutdown) => break,
            Err(err) => {
                channel.record_receive_failure();
                error!(channel = %channel.name(), link = %link.describe(), error = %err, "receive failed");
                thread::sleep(poll_interval);
            }
        }
    }
    debug!(channel = %channel.name(), "receiver exiting");
}

//! The unbounded sample queue between the samplers and the persister.

use crate::core::Sample;
use async_channel::{Receiver, Sender, TryRecvError};
use std::time::Duration;
use thiserror::Error;

/// Returned when a sample is pushed after the consumer has gone away.
#[derive(Error, Debug)]
#[error("sample queue is closed")]
pub struct QueueClosed(pub Sample);

/// Outcome of a bounded wait on the queue.
#[derive(Debug)]
pub enum Pop {
    Sample(Sample),
    TimedOut,
    /// The queue is empty and every producer has been dropped.
    Closed,
}

/// Creates a new multi-producer, single-consumer sample queue.
pub fn sample_queue() -> (SampleProducer, SampleConsumer) {
    let (tx, rx) = async_channel::unbounded();
    (SampleProducer { tx }, SampleConsumer { rx })
}

/// The producer half. Cloned once per sampler.
#[derive(Clone, Debug)]
pub struct SampleProducer {
    tx: Sender<Sample>,
}

impl SampleProducer {
    /// Enqueues a sample without waiting.
    pub fn push(&self, sample: Sample) -> Result<(), QueueClosed> {
        // An unbounded channel only rejects a send once it is closed.
        self.tx
            .try_send(sample)
            .map_err(|e| QueueClosed(e.into_inner()))
    }
}

/// The consumer half, owned by the persister.
#[derive(Debug)]
pub struct SampleConsumer {
    rx: Receiver<Sample>,
}

impl SampleConsumer {
    /// Waits up to `timeout` for the next sample.
    pub async fn pop_timeout(&self, timeout: Duration) -> Pop {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Ok(sample)) => Pop::Sample(sample),
            Ok(Err(_)) => Pop::Closed,
            Err(_) => Pop::TimedOut,
        }
    }

    /// Takes every sample that is available right now, in queue order.
    pub fn drain_ready(&self) -> Vec<Sample> {
        let mut batch = Vec::with_capacity(self.rx.len());
        loop {
            match self.rx.try_recv() {
                Ok(sample) => batch.push(sample),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// True once nothing is queued and no producer can enqueue anything more.
    pub fn is_drained(&self) -> bool {
        self.rx.is_empty() && self.rx.sender_count() == 0
    }
}

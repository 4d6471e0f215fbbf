use std::{
    io,
    sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, sync_channel},
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{FlightError, feed::SensorFeed, sample::Sample};

/// Producer half of a lockstep feed, handed to the simulation thread.
pub struct SampleSender {
    samples: SyncSender<Sample>,
    consumed: Receiver<()>,
}

impl SampleSender {
    /// blocks until the flight loop has finished processing `sample`, returns
    /// false once the feed is stopped
    pub fn send(&self, sample: Sample) -> bool {
        self.samples.send(sample).is_ok() && self.consumed.recv().is_ok()
    }
}

/// Capacity one hand-off blocking on both ends, simulated time only advances
/// once the previous sample has gone through the state machine.
pub struct LockstepFeed {
    samples: Option<Receiver<Sample>>,
    consumed: Option<SyncSender<()>>,
    awaiting_ack: bool,
    exhausted: bool,
    recv_timeout: Duration,
    producer: Option<JoinHandle<()>>,
}

impl LockstepFeed {
    /// runs `producer` on its own thread, end of data is the producer
    /// returning
    pub fn spawn<F>(producer: F) -> Result<Self, FlightError>
    where
        F: FnOnce(SampleSender) + Send + 'static,
    {
        let (sample_tx, sample_rx) = sync_channel(1);
        let (consumed_tx, consumed_rx) = sync_channel(1);
        let sender = SampleSender {
            samples: sample_tx,
            consumed: consumed_rx,
        };
        let producer = thread::Builder::new()
            .name("lockstep-producer".into())
            .spawn(move || producer(sender))?;

        Ok(Self {
            samples: Some(sample_rx),
            consumed: Some(consumed_tx),
            awaiting_ack: false,
            exhausted: false,
            recv_timeout: Duration::from_millis(100),
            producer: Some(producer),
        })
    }
}

impl SensorFeed for LockstepFeed {
    /// blocks for the next sample, gives up after a short timeout so the
    /// caller can still check for shutdown
    fn poll_next(&mut self) -> Option<Sample> {
        if self.awaiting_ack {
            self.awaiting_ack = false;
            if let Some(consumed) = &self.consumed {
                let _ = consumed.send(());
            }
        }

        let samples = self.samples.as_ref()?;
        match samples.recv_timeout(self.recv_timeout) {
            Ok(sample) => {
                self.awaiting_ack = true;
                Some(sample)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                log_info!("lockstep producer finished");
                self.exhausted = true;
                None
            }
        }
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    fn stop(&mut self) -> Result<(), FlightError> {
        // dropping both ends unblocks the producer wherever it waits
        self.samples = None;
        self.consumed = None;
        self.exhausted = true;
        match self.producer.take() {
            Some(producer) => producer
                .join()
                .map_err(|_| FlightError::Io(io::Error::other("lockstep producer panicked"))),
            None => Ok(()),
        }
    }
}

impl Drop for LockstepFeed {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log_warn!("failed to stop lockstep feed: {}", e);
        }
    }
}

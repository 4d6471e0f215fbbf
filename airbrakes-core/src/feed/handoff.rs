use std::sync::{Mutex, MutexGuard};

use heapless::Deque;

use crate::sample::Sample;

pub const HANDOFF_CAPACITY: usize = 2;

/// Bounded last-value-wins slot between the sensor thread and the flight
/// loop. A push into a full slot drops the oldest unread sample.
#[derive(Debug, Default)]
pub struct SampleHandoff {
    samples: Mutex<Deque<Sample, HANDOFF_CAPACITY>>,
}

impl SampleHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Deque<Sample, HANDOFF_CAPACITY>> {
        // a panicked holder can only have left a valid deque behind
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// returns true if an unread sample was overwritten
    pub fn push(&self, sample: Sample) -> bool {
        let mut samples = self.lock();
        let overwritten = samples.is_full();
        if overwritten {
            samples.pop_front();
        }
        // can not fail, there is room after the pop
        let _ = samples.push_back(sample);
        overwritten
    }

    /// the newest unread sample, older unread ones are discarded
    pub fn take_latest(&self) -> Option<Sample> {
        let mut samples = self.lock();
        let latest = samples.pop_back();
        samples.clear();
        latest
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    fn sample(timestamp: u64) -> Sample {
        Sample::new(0.0, timestamp, 0.0, 0.0)
    }

    #[test]
    fn overwrites_oldest() {
        let handoff = SampleHandoff::new();
        assert!(!handoff.push(sample(1)));
        assert!(!handoff.push(sample(2)));
        assert!(handoff.push(sample(3)));
        assert_eq!(handoff.take_latest(), Some(sample(3)));
        assert_eq!(handoff.take_latest(), None);
        assert!(handoff.is_empty());
    }

    #[test]
    fn concurrent_reader_never_goes_backwards() {
        let handoff = Arc::new(SampleHandoff::new());
        let producer = {
            let handoff = handoff.clone();
            thread::spawn(move || {
                for timestamp in 1..=20_000 {
                    handoff.push(sample(timestamp));
                }
            })
        };

        let mut last = 0;
        while last < 20_000 {
            if let Some(sample) = handoff.take_latest() {
                assert!(sample.timestamp > last);
                last = sample.timestamp;
            }
            if producer.is_finished() && handoff.is_empty() {
                break;
            }
        }
        producer.join().unwrap();
        if let Some(sample) = handoff.take_latest() {
            assert!(sample.timestamp > last);
        }
    }
}

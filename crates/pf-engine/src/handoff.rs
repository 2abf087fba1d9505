//! Lock-free control → audio handoff
//!
//! Two channels, both single-producer/single-consumer `rtrb` rings:
//!
//! - **Parameters**: `Copy` snapshots. The audio thread drains the ring
//!   and keeps only the newest snapshot, so it never sees a half-written
//!   parameter set.
//! - **Resources**: boxed, fully prepared objects (convolution kernels,
//!   neural models). Whatever they displace travels back on a second
//!   ring so the drop happens on the control thread.

use pf_core::{ParamMap, ParamSnapshot};
use rtrb::{Consumer, Producer, RingBuffer};

pub const DEFAULT_PARAM_QUEUE: usize = 64;
pub const DEFAULT_RESOURCE_QUEUE: usize = 4;

/// Create a parameter snapshot channel
pub fn param_channel(capacity: usize) -> (ParamPublisher, ParamReceiver) {
    let (producer, consumer) = RingBuffer::new(capacity.max(1));
    (
        ParamPublisher {
            producer,
            generation: 0,
        },
        ParamReceiver {
            consumer,
            last_generation: None,
        },
    )
}

/// Control-side end of a parameter channel
pub struct ParamPublisher {
    producer: Producer<ParamSnapshot>,
    generation: u64,
}

impl ParamPublisher {
    /// Queue a snapshot. Returns false when the audio thread has fallen a
    /// full queue behind; the caller keeps its state and publishes again.
    pub fn publish(&mut self, snapshot: ParamSnapshot) -> bool {
        let next = self.generation + 1;
        match self.producer.push(snapshot.with_generation(next)) {
            Ok(()) => {
                self.generation = next;
                true
            }
            Err(_) => false,
        }
    }

    /// Publish the current values of a control-side map
    pub fn publish_map(&mut self, params: &ParamMap) -> bool {
        self.publish(params.snapshot())
    }

    /// Generation of the last successfully queued snapshot
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_abandoned(&self) -> bool {
        self.producer.is_abandoned()
    }
}

/// Audio-side end of a parameter channel
pub struct ParamReceiver {
    consumer: Consumer<ParamSnapshot>,
    last_generation: Option<u64>,
}

impl ParamReceiver {
    /// Drain everything queued and return only the newest snapshot
    #[inline]
    pub fn latest(&mut self) -> Option<ParamSnapshot> {
        let mut newest = None;
        while let Ok(snapshot) = self.consumer.pop() {
            newest = Some(snapshot);
        }
        if let Some(snapshot) = &newest {
            self.last_generation = Some(snapshot.generation());
        }
        newest
    }

    pub fn last_generation(&self) -> Option<u64> {
        self.last_generation
    }
}

/// Create a resource channel. The return ring is twice the forward
/// capacity so displaced resources always have somewhere to go.
pub fn resource_channel<T: Send>(capacity: usize) -> (ResourceSender<T>, ResourceReceiver<T>) {
    let capacity = capacity.max(1);
    let (to_audio, from_control) = RingBuffer::new(capacity);
    let (to_control, from_audio) = RingBuffer::new(capacity * 2);
    (
        ResourceSender {
            to_audio,
            from_audio,
        },
        ResourceReceiver {
            from_control,
            to_control,
        },
    )
}

/// Control-side end of a resource channel
pub struct ResourceSender<T> {
    to_audio: Producer<Box<T>>,
    from_audio: Consumer<Box<T>>,
}

impl<T: Send> ResourceSender<T> {
    /// Queue a prepared resource. Gives it back if the queue is full.
    pub fn send(&mut self, resource: Box<T>) -> Result<(), Box<T>> {
        self.collect_garbage();
        self.to_audio.push(resource).map_err(|rtrb::PushError::Full(r)| r)
    }

    /// Drop resources the audio thread has retired. Returns how many.
    pub fn collect_garbage(&mut self) -> usize {
        let mut dropped = 0;
        while let Ok(old) = self.from_audio.pop() {
            drop(old);
            dropped += 1;
        }
        dropped
    }

    /// Resources queued but not yet picked up
    pub fn pending(&self) -> usize {
        self.to_audio.buffer().capacity() - self.to_audio.slots()
    }
}

/// Audio-side end of a resource channel
pub struct ResourceReceiver<T> {
    from_control: Consumer<Box<T>>,
    to_control: Producer<Box<T>>,
}

impl<T: Send> ResourceReceiver<T> {
    /// Install the newest queued resource into `slot`.
    ///
    /// Each displaced value (the old slot content and any superseded
    /// queue entries) is sent back for dropping. When the return ring is
    /// full the remaining queue is left for the next call.
    #[inline]
    pub fn receive(&mut self, slot: &mut Option<Box<T>>) -> bool {
        let mut installed = false;
        while !self.from_control.is_empty() && !self.to_control.is_full() {
            let Ok(next) = self.from_control.pop() else {
                break;
            };
            if let Some(old) = slot.replace(next) {
                // Checked not full above, so this cannot hand the value back
                let _ = self.to_control.push(old);
            }
            installed = true;
        }
        installed
    }

    pub fn has_pending(&self) -> bool {
        !self.from_control.is_empty()
    }
}

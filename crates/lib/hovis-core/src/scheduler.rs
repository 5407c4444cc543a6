use std::cmp::Reverse;

use keyed_priority_queue::KeyedPriorityQueue;
use log::{debug, trace};
use serde::Deserialize;
use typed_builder::TypedBuilder;

use crate::bucket::{Bucket, TimeMS};
use crate::hashbrown::HashMap;

/// A trait used to represent a scheduler. The order of calling the scheduler's functions is
/// important to ensure the correct behavior of the engine: `initialize` once, then `trigger`
/// until the returned time reaches `duration`, then `terminate`.
pub trait Scheduler<B: Bucket>: Send {
    fn duration(&self) -> TimeMS;
    fn initialize(&mut self);
    fn trigger(&mut self) -> TimeMS;
    fn pending(&self) -> u64;
    fn delivered(&self) -> u64;
    fn terminate(self);
}

/// Event order indicates which of the events scheduled for the same instant is delivered first.
///
/// Events are sorted by time, then by order, then by the sequence in which they were scheduled.
/// Events with the lowest order are delivered first. Within one order, delivery is FIFO.
#[derive(Deserialize, Debug, Copy, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventOrder(pub u32);

impl EventOrder {
    pub const NETWORK: EventOrder = EventOrder(0);
    pub const CONTROL: EventOrder = EventOrder(1);
    pub const TELEMETRY: EventOrder = EventOrder(2);

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl From<u32> for EventOrder {
    fn from(f: u32) -> Self {
        Self(f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u64);

impl EventId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

type EventKey = Reverse<(TimeMS, EventOrder, u64)>;

#[derive(Debug, Clone)]
struct PendingEvent<E> {
    event: E,
    order: EventOrder,
    period: Option<TimeMS>,
}

/// Future event list of the engine.
///
/// A repeating event is registered once and re-armed by the queue every time it is delivered,
/// carrying the same event value. There is no way to cancel it; it ends when the scheduler stops
/// delivering events.
pub struct EventQueue<E> {
    now: TimeMS,
    next_seq: u64,
    queue: KeyedPriorityQueue<EventId, EventKey>,
    pending: HashMap<EventId, PendingEvent<E>>,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self {
            now: TimeMS::default(),
            next_seq: 0,
            queue: KeyedPriorityQueue::new(),
            pending: HashMap::new(),
        }
    }
}

impl<E: Clone> EventQueue<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> TimeMS {
        self.now
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn schedule_at(&mut self, at: TimeMS, order: EventOrder, event: E) -> EventId {
        self.push(at, order, event, None)
    }

    pub fn schedule_in(&mut self, delay: TimeMS, order: EventOrder, event: E) -> EventId {
        self.push(self.now + delay, order, event, None)
    }

    pub fn schedule_repeating(
        &mut self,
        first: TimeMS,
        period: TimeMS,
        order: EventOrder,
        event: E,
    ) -> EventId {
        if period == TimeMS::ZERO {
            panic!("A repeating event needs a non-zero period");
        }
        self.push(first, order, event, Some(period))
    }

    pub fn peek_time(&self) -> Option<TimeMS> {
        self.queue.peek().map(|(_, Reverse((at, _, _)))| *at)
    }

    /// Removes the earliest event, advances the clock to its time and re-arms it if it repeats.
    pub fn pop_next(&mut self) -> Option<(TimeMS, E)> {
        let (event_id, Reverse((at, _, _))) = self.queue.pop()?;
        let pending = self
            .pending
            .remove(&event_id)
            .unwrap_or_else(|| panic!("Event {} is queued without a payload", event_id.0));
        self.now = at;
        trace!("Delivering event {} at {}", event_id.0, at);
        if let Some(period) = pending.period {
            self.push(at + period, pending.order, pending.event.clone(), Some(period));
        }
        Some((at, pending.event))
    }

    fn push(&mut self, at: TimeMS, order: EventOrder, event: E, period: Option<TimeMS>) -> EventId {
        if at < self.now {
            panic!("Cannot schedule an event at {} before now {}", at, self.now);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        let event_id = EventId(seq);
        self.queue.push(event_id, Reverse((at, order, seq)));
        self.pending.insert(
            event_id,
            PendingEvent {
                event,
                order,
                period,
            },
        );
        event_id
    }
}

/// Delivers the events of a bucket in time order until the stop time. The stop is inclusive:
/// events scheduled exactly at `duration` are still delivered, later ones never are.
#[derive(TypedBuilder)]
pub struct EventScheduler<B>
where
    B: Bucket,
{
    pub bucket: B,
    pub duration: TimeMS,
    #[builder(default)]
    pub queue: EventQueue<B::E>,
    #[builder(default = TimeMS::default())]
    pub now: TimeMS,
    #[builder(default)]
    pub delivered: u64,
}

impl<B> EventScheduler<B>
where
    B: Bucket,
{
    pub fn bucket(&self) -> &B {
        &self.bucket
    }
}

impl<B> Scheduler<B> for EventScheduler<B>
where
    B: Bucket,
{
    fn duration(&self) -> TimeMS {
        self.duration
    }

    fn initialize(&mut self) {
        debug!("Initializing the scheduler with stop time {}", self.duration);
        self.bucket.initialize(&mut self.queue);
    }

    fn trigger(&mut self) -> TimeMS {
        let next = match self.queue.peek_time() {
            Some(at) if at <= self.duration => at,
            _ => {
                self.now = self.duration;
                return self.now;
            }
        };

        while self.queue.peek_time() == Some(next) {
            match self.queue.pop_next() {
                Some((_, event)) => {
                    self.delivered += 1;
                    self.bucket.handle(event, &mut self.queue)
                }
                None => break,
            }
        }
        self.now = next;
        self.now
    }

    fn pending(&self) -> u64 {
        self.queue.len() as u64
    }

    fn delivered(&self) -> u64 {
        self.delivered
    }

    fn terminate(self) {
        debug!(
            "Stopping at {} after {} events, {} undelivered",
            self.now,
            self.delivered,
            self.queue.len()
        );
        self.bucket.terminate();
    }
}

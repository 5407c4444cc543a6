use hovis_core::bucket::{Bucket, TimeMS};
use hovis_core::scheduler::{EventOrder, EventQueue};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TestEvent {
    Mark(&'static str),
    MarkLater {
        label: &'static str,
        delay: TimeMS,
        order: EventOrder,
    },
}

/// A bucket that records every delivered event together with the time of delivery.
#[derive(Default, Clone)]
pub struct MyBucket {
    pub initial: Vec<(TimeMS, EventOrder, TestEvent)>,
    pub repeating: Vec<(TimeMS, TimeMS, TestEvent)>,
    pub delivered: Vec<(TimeMS, &'static str)>,
}

impl MyBucket {
    pub fn with_events(initial: Vec<(TimeMS, EventOrder, TestEvent)>) -> Self {
        Self {
            initial,
            ..Self::default()
        }
    }

    pub fn with_repeating(mut self, first: TimeMS, period: TimeMS, event: TestEvent) -> Self {
        self.repeating.push((first, period, event));
        self
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.delivered.iter().map(|(_, label)| *label).collect()
    }

    pub fn times_of(&self, label: &str) -> Vec<TimeMS> {
        self.delivered
            .iter()
            .filter(|(_, l)| *l == label)
            .map(|(t, _)| *t)
            .collect()
    }
}

impl Bucket for MyBucket {
    type E = TestEvent;

    fn initialize(&mut self, queue: &mut EventQueue<TestEvent>) {
        for (at, order, event) in self.initial.drain(..) {
            queue.schedule_at(at, order, event);
        }
        for (first, period, event) in self.repeating.drain(..) {
            queue.schedule_repeating(first, period, EventOrder::TELEMETRY, event);
        }
    }

    fn handle(&mut self, event: TestEvent, queue: &mut EventQueue<TestEvent>) {
        match event {
            TestEvent::Mark(label) => self.delivered.push((queue.now(), label)),
            TestEvent::MarkLater {
                label,
                delay,
                order,
            } => {
                queue.schedule_in(delay, order, TestEvent::Mark(label));
            }
        }
    }

    fn terminate(self) {}
}

use hovis_core::bucket::TimeMS;
use hovis_core::scheduler::{EventOrder, EventQueue, EventScheduler, Scheduler};
use hovis_testutils::bucket::{MyBucket, TestEvent};

fn run_to_end(scheduler: &mut EventScheduler<MyBucket>) {
    scheduler.initialize();
    let mut now = TimeMS::ZERO;
    while now < scheduler.duration() {
        now = scheduler.trigger();
    }
}

#[test]
fn test_time_order() {
    let bucket = MyBucket::with_events(vec![
        (TimeMS::from(30), EventOrder::NETWORK, TestEvent::Mark("c")),
        (TimeMS::from(10), EventOrder::NETWORK, TestEvent::Mark("a")),
        (TimeMS::from(20), EventOrder::NETWORK, TestEvent::Mark("b")),
    ]);
    let mut scheduler = EventScheduler::builder()
        .bucket(bucket)
        .duration(TimeMS::from(100))
        .build();
    run_to_end(&mut scheduler);
    assert_eq!(scheduler.bucket().labels(), vec!["a", "b", "c"]);
}

#[test]
fn test_same_instant_is_fifo_within_order() {
    let bucket = MyBucket::with_events(vec![
        (TimeMS::from(5), EventOrder::CONTROL, TestEvent::Mark("first")),
        (TimeMS::from(5), EventOrder::CONTROL, TestEvent::Mark("second")),
        (TimeMS::from(5), EventOrder::CONTROL, TestEvent::Mark("third")),
    ]);
    let mut scheduler = EventScheduler::builder()
        .bucket(bucket)
        .duration(TimeMS::from(10))
        .build();
    run_to_end(&mut scheduler);
    assert_eq!(scheduler.bucket().labels(), vec!["first", "second", "third"]);
}

#[test]
fn test_lower_order_wins_the_tie() {
    let bucket = MyBucket::with_events(vec![
        (TimeMS::from(5), EventOrder::TELEMETRY, TestEvent::Mark("sample")),
        (TimeMS::from(5), EventOrder::NETWORK, TestEvent::Mark("packet")),
    ]);
    let mut scheduler = EventScheduler::builder()
        .bucket(bucket)
        .duration(TimeMS::from(10))
        .build();
    run_to_end(&mut scheduler);
    assert_eq!(scheduler.bucket().labels(), vec!["packet", "sample"]);
}

#[test]
fn test_events_scheduled_during_delivery_keep_order() {
    let bucket = MyBucket::with_events(vec![(
        TimeMS::from(0),
        EventOrder::CONTROL,
        TestEvent::MarkLater {
            label: "late",
            delay: TimeMS::from(0),
            order: EventOrder::NETWORK,
        },
    )]);
    let mut scheduler = EventScheduler::builder()
        .bucket(bucket)
        .duration(TimeMS::from(10))
        .build();
    run_to_end(&mut scheduler);
    assert_eq!(scheduler.bucket().times_of("late"), vec![TimeMS::from(0)]);
}

#[test]
fn test_repeating_event_until_inclusive_stop() {
    let bucket = MyBucket::default().with_repeating(
        TimeMS::from(100),
        TimeMS::from(100),
        TestEvent::Mark("tick"),
    );
    let mut scheduler = EventScheduler::builder()
        .bucket(bucket)
        .duration(TimeMS::from(1000))
        .build();
    run_to_end(&mut scheduler);
    let expected: Vec<TimeMS> = (1..=10).map(|i| TimeMS::from(i * 100u64)).collect();
    assert_eq!(scheduler.bucket().times_of("tick"), expected);
    // The re-armed event for 1100 ms stays queued and is never delivered.
    assert_eq!(scheduler.pending(), 1);
    assert_eq!(scheduler.delivered(), 10);
}

#[test]
fn test_trigger_on_empty_queue_jumps_to_stop() {
    let mut scheduler = EventScheduler::builder()
        .bucket(MyBucket::default())
        .duration(TimeMS::from(500))
        .build();
    scheduler.initialize();
    assert_eq!(scheduler.trigger(), TimeMS::from(500));
}

#[test]
#[should_panic]
fn test_scheduling_in_the_past_panics() {
    let mut queue: EventQueue<TestEvent> = EventQueue::new();
    queue.schedule_at(TimeMS::from(10), EventOrder::NETWORK, TestEvent::Mark("x"));
    queue.pop_next();
    queue.schedule_at(TimeMS::from(5), EventOrder::NETWORK, TestEvent::Mark("y"));
}

use hovis_core::bucket::TimeMS;
use hovis_core::scheduler::{EventOrder, EventScheduler};
use hovis_runner::runner::run_headless;
use hovis_testutils::bucket::{MyBucket, TestEvent};

#[test]
fn headless_run_reaches_the_stop_time() {
    let bucket = MyBucket::with_events(vec![(
        TimeMS::from(250u64),
        EventOrder::CONTROL,
        TestEvent::Mark("once"),
    )])
    .with_repeating(
        TimeMS::from(100u64),
        TimeMS::from(100u64),
        TestEvent::Mark("tick"),
    );
    let scheduler = EventScheduler::builder()
        .bucket(bucket)
        .duration(TimeMS::from(1000u64))
        .build();
    assert_eq!(run_headless(scheduler), TimeMS::from(1000u64));
}

use hovis_core::bucket::TimeMS;
use hovis_output::trace::{TraceRecord, TraceWriter};
use hovis_output::tracker::DataTracker;
use hovis_testutils::writer::SharedBuffer;

fn records() -> Vec<TraceRecord> {
    vec![
        TraceRecord::CellState {
            time: TimeMS::ZERO,
            cell_id: 1,
            x: 0.5,
            y: 0.0,
            direction: 0,
        },
        TraceRecord::UeSeenAtCell {
            time: TimeMS::from(20u64),
            cell_id: 1,
            imsi: 1,
            context: "/NodeList/3/DeviceList/0/LteEnbRrc/ConnectionEstablished".to_string(),
        },
        TraceRecord::UeState {
            time: TimeMS::from(100u64),
            imsi: 1,
            x: 12.25,
            y: 301.5,
            rx_bytes: 0,
        },
    ]
}

#[test]
fn writer_emits_one_line_per_record() {
    let buffer = SharedBuffer::new();
    let mut writer = TraceWriter::new(Box::new(buffer.clone()));
    for record in records().iter() {
        writer.write(record);
    }
    assert_eq!(writer.written(), 3);
    writer.close();

    let lines = buffer.lines();
    assert_eq!(
        lines,
        vec![
            "0 ms: Cell state: Cell 1 at 0.5 0 direction 0",
            "20 ms: UE seen at cell: Cell 1 saw IMSI 1 \
             (context: /NodeList/3/DeviceList/0/LteEnbRrc/ConnectionEstablished)",
            "100 ms: UE state: IMSI 1 at 12.25 301.5 with 0 received bytes",
        ]
    );
}

#[test]
fn written_stream_reads_back_into_a_tracker() {
    let buffer = SharedBuffer::new();
    let mut writer = TraceWriter::new(Box::new(buffer.clone()));
    for record in records().iter() {
        writer.write(record);
    }
    writer.close();

    let contents = buffer.contents();
    let tracker = DataTracker::from_reader(contents.as_bytes()).unwrap();
    assert_eq!(tracker.cells().len(), 1);
    assert_eq!(tracker.latest_cell(1), Some(1));
    assert_eq!(tracker.ues()[&1].coords, vec![(TimeMS::from(100u64), (12.25, 301.5))]);
}

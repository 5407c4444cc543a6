use std::fmt::{Display, Formatter};
use std::io::{BufWriter, Write};
use std::str::FromStr;

use log::error;
use thiserror::Error;

use hovis_core::bucket::TimeMS;

/// Formats a coordinate the way a default C++ output stream does: six significant digits,
/// trailing zeros removed, scientific notation for very large or small magnitudes.
pub fn format_coord(value: f64) -> String {
    if value == 0.0 {
        return if value.is_sign_negative() {
            "-0".to_string()
        } else {
            "0".to_string()
        };
    }
    if !value.is_finite() {
        return value.to_string();
    }

    let scientific = format!("{:.5e}", value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => return scientific,
    };

    if (-4..6).contains(&exponent) {
        let decimals = (5 - exponent) as usize;
        trim_fraction(&format!("{:.*}", decimals, value))
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exponent.abs()
        )
    }
}

fn trim_fraction(number: &str) -> String {
    if !number.contains('.') {
        return number.to_string();
    }
    number
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellMeasurement {
    pub cell_id: u16,
    pub rsrp: u8,
    pub rsrq: u8,
}

impl Display for CellMeasurement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}/{}", self.cell_id, self.rsrp, self.rsrq)
    }
}

impl FromStr for CellMeasurement {
    type Err = TraceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (cell, quality) = s
            .split_once(':')
            .ok_or_else(|| TraceParseError::new(s, "missing ':'"))?;
        let (rsrp, rsrq) = quality
            .split_once('/')
            .ok_or_else(|| TraceParseError::new(s, "missing '/'"))?;
        Ok(Self {
            cell_id: parse_field(cell, s)?,
            rsrp: parse_field(rsrp, s)?,
            rsrq: parse_field(rsrq, s)?,
        })
    }
}

/// One line of the telemetry stream. Field order and labels are a stable schema consumed by
/// downstream tooling.
#[derive(Clone, Debug, PartialEq)]
pub enum TraceRecord {
    CellState {
        time: TimeMS,
        cell_id: u16,
        x: f64,
        y: f64,
        direction: u32,
    },
    UeState {
        time: TimeMS,
        imsi: u64,
        x: f64,
        y: f64,
        rx_bytes: u64,
    },
    UeSeenAtCell {
        time: TimeMS,
        cell_id: u16,
        imsi: u64,
        context: String,
    },
    MeasurementReport {
        time: TimeMS,
        cell_id: u16,
        imsi: u64,
        meas_id: u8,
        serving: CellMeasurement,
        neighbours: Vec<CellMeasurement>,
    },
}

impl TraceRecord {
    pub fn time(&self) -> TimeMS {
        match self {
            TraceRecord::CellState { time, .. }
            | TraceRecord::UeState { time, .. }
            | TraceRecord::UeSeenAtCell { time, .. }
            | TraceRecord::MeasurementReport { time, .. } => *time,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TraceRecord::CellState { .. } => CELL_STATE,
            TraceRecord::UeState { .. } => UE_STATE,
            TraceRecord::UeSeenAtCell { .. } => UE_SEEN,
            TraceRecord::MeasurementReport { .. } => MEASUREMENT_REPORT,
        }
    }
}

const CELL_STATE: &str = "Cell state";
const UE_STATE: &str = "UE state";
const UE_SEEN: &str = "UE seen at cell";
const MEASUREMENT_REPORT: &str = "Measurement report";

impl Display for TraceRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ms: {}: ", self.time(), self.label())?;
        match self {
            TraceRecord::CellState {
                cell_id,
                x,
                y,
                direction,
                ..
            } => write!(
                f,
                "Cell {} at {} {} direction {}",
                cell_id,
                format_coord(*x),
                format_coord(*y),
                direction
            ),
            TraceRecord::UeState {
                imsi, x, y, rx_bytes, ..
            } => write!(
                f,
                "IMSI {} at {} {} with {} received bytes",
                imsi,
                format_coord(*x),
                format_coord(*y),
                rx_bytes
            ),
            TraceRecord::UeSeenAtCell {
                cell_id,
                imsi,
                context,
                ..
            } => write!(
                f,
                "Cell {} saw IMSI {} (context: {})",
                cell_id, imsi, context
            ),
            TraceRecord::MeasurementReport {
                cell_id,
                imsi,
                meas_id,
                serving,
                neighbours,
                ..
            } => {
                write!(
                    f,
                    "Cell {} got measurements from IMSI {} (ID {}, cell:RSRP/RSRQ {}",
                    cell_id, imsi, meas_id, serving
                )?;
                for neighbour in neighbours.iter() {
                    write!(f, " {}", neighbour)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot parse '{line}': {reason}")]
pub struct TraceParseError {
    pub line: String,
    pub reason: String,
}

impl TraceParseError {
    fn new(line: &str, reason: &str) -> Self {
        Self {
            line: line.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn parse_field<T: FromStr>(field: &str, line: &str) -> Result<T, TraceParseError> {
    field
        .trim()
        .parse::<T>()
        .map_err(|_| TraceParseError::new(line, &format!("bad field '{}'", field)))
}

fn expect_word<'a>(
    words: &mut impl Iterator<Item = &'a str>,
    expected: &str,
    line: &str,
) -> Result<(), TraceParseError> {
    match words.next() {
        Some(word) if word == expected => Ok(()),
        _ => Err(TraceParseError::new(line, &format!("expected '{}'", expected))),
    }
}

fn next_field<'a, T: FromStr>(
    words: &mut impl Iterator<Item = &'a str>,
    line: &str,
) -> Result<T, TraceParseError> {
    let word = words
        .next()
        .ok_or_else(|| TraceParseError::new(line, "line ends early"))?;
    parse_field(word, line)
}

impl FromStr for TraceRecord {
    type Err = TraceParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end();
        let (time, rest) = line
            .split_once(" ms: ")
            .ok_or_else(|| TraceParseError::new(line, "missing time prefix"))?;
        let time: TimeMS = parse_field(time, line)?;
        let (label, body) = rest
            .split_once(": ")
            .ok_or_else(|| TraceParseError::new(line, "missing record label"))?;

        match label {
            CELL_STATE => {
                let mut words = body.split_whitespace();
                expect_word(&mut words, "Cell", line)?;
                let cell_id = next_field(&mut words, line)?;
                expect_word(&mut words, "at", line)?;
                let x = next_field(&mut words, line)?;
                let y = next_field(&mut words, line)?;
                expect_word(&mut words, "direction", line)?;
                let direction = next_field(&mut words, line)?;
                Ok(TraceRecord::CellState {
                    time,
                    cell_id,
                    x,
                    y,
                    direction,
                })
            }
            UE_STATE => {
                let mut words = body.split_whitespace();
                expect_word(&mut words, "IMSI", line)?;
                let imsi = next_field(&mut words, line)?;
                expect_word(&mut words, "at", line)?;
                let x = next_field(&mut words, line)?;
                let y = next_field(&mut words, line)?;
                expect_word(&mut words, "with", line)?;
                let rx_bytes = next_field(&mut words, line)?;
                Ok(TraceRecord::UeState {
                    time,
                    imsi,
                    x,
                    y,
                    rx_bytes,
                })
            }
            UE_SEEN => {
                let (head, context) = body
                    .split_once(" (context: ")
                    .ok_or_else(|| TraceParseError::new(line, "missing context"))?;
                let mut words = head.split_whitespace();
                expect_word(&mut words, "Cell", line)?;
                let cell_id = next_field(&mut words, line)?;
                expect_word(&mut words, "saw", line)?;
                expect_word(&mut words, "IMSI", line)?;
                let imsi = next_field(&mut words, line)?;
                Ok(TraceRecord::UeSeenAtCell {
                    time,
                    cell_id,
                    imsi,
                    context: context.trim_end_matches(')').to_string(),
                })
            }
            MEASUREMENT_REPORT => {
                let (head, details) = body
                    .split_once(" (ID ")
                    .ok_or_else(|| TraceParseError::new(line, "missing measurement id"))?;
                let mut words = head.split_whitespace();
                expect_word(&mut words, "Cell", line)?;
                let cell_id = next_field(&mut words, line)?;
                expect_word(&mut words, "got", line)?;
                expect_word(&mut words, "measurements", line)?;
                expect_word(&mut words, "from", line)?;
                expect_word(&mut words, "IMSI", line)?;
                let imsi = next_field(&mut words, line)?;

                let details = details.trim_end_matches(')');
                let (meas_id, cells) = details
                    .split_once(", cell:RSRP/RSRQ ")
                    .ok_or_else(|| TraceParseError::new(line, "missing cell list"))?;
                let meas_id = parse_field(meas_id, line)?;
                let mut cells = cells.split_whitespace().map(CellMeasurement::from_str);
                let serving = cells
                    .next()
                    .ok_or_else(|| TraceParseError::new(line, "missing serving cell"))??;
                let neighbours = cells.collect::<Result<Vec<_>, _>>()?;
                Ok(TraceRecord::MeasurementReport {
                    time,
                    cell_id,
                    imsi,
                    meas_id,
                    serving,
                    neighbours,
                })
            }
            _ => Err(TraceParseError::new(line, "unknown record label")),
        }
    }
}

/// Line-oriented sink of the telemetry stream. Each record is written as one line; the stream
/// is flushed when the writer is closed.
pub struct TraceWriter {
    out: BufWriter<Box<dyn Write + Send>>,
    written: u64,
}

impl TraceWriter {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: BufWriter::new(out),
            written: 0,
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn write(&mut self, record: &TraceRecord) {
        if let Err(e) = writeln!(self.out, "{}", record) {
            error!("Failed to write trace record: {}", e);
            return;
        }
        self.written += 1;
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn close(mut self) {
        if let Err(e) = self.out.flush() {
            error!("Failed to flush the trace stream: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_use_six_significant_digits() {
        assert_eq!(format_coord(0.0), "0");
        assert_eq!(format_coord(300.0), "300");
        assert_eq!(format_coord(0.5), "0.5");
        assert_eq!(format_coord(-249.5), "-249.5");
        assert_eq!(format_coord(433.0127018922193), "433.013");
        assert_eq!(format_coord(12.3456789), "12.3457");
        assert_eq!(format_coord(0.000123456789), "0.000123457");
        assert_eq!(format_coord(1234567.0), "1.23457e+06");
        assert_eq!(format_coord(0.0000012), "1.2e-06");
        assert_eq!(format_coord(0.000012345), "1.2345e-05");
        assert_eq!(format_coord(-0.0000456), "-4.56e-05");
        assert_eq!(format_coord(0.0001), "0.0001");
        assert_eq!(format_coord(999999.7), "1e+06");
    }

    #[test]
    fn parse_errors_name_the_line() {
        let error = "no separator here".parse::<TraceRecord>().unwrap_err();
        assert_eq!(
            error.to_string(),
            "cannot parse 'no separator here': missing time prefix"
        );
        let boxed: Box<dyn std::error::Error> = Box::new(error);
        assert!(boxed.source().is_none());
    }

    #[test]
    fn measurement_line_layout() {
        let record = TraceRecord::MeasurementReport {
            time: TimeMS::from(2400u64),
            cell_id: 1,
            imsi: 3,
            meas_id: 2,
            serving: CellMeasurement {
                cell_id: 1,
                rsrp: 55,
                rsrq: 28,
            },
            neighbours: vec![
                CellMeasurement {
                    cell_id: 2,
                    rsrp: 52,
                    rsrq: 25,
                },
                CellMeasurement {
                    cell_id: 4,
                    rsrp: 40,
                    rsrq: 12,
                },
            ],
        };
        let line = record.to_string();
        assert_eq!(
            line,
            "2400 ms: Measurement report: Cell 1 got measurements from IMSI 3 \
             (ID 2, cell:RSRP/RSRQ 1:55/28 2:52/25 4:40/12)"
        );
        assert_eq!(line.parse::<TraceRecord>().unwrap(), record);
    }

    #[test]
    fn seen_line_keeps_context() {
        let line = "1020 ms: UE seen at cell: Cell 4 saw IMSI 2 \
                    (context: /NodeList/7/DeviceList/0/LteEnbRrc/ConnectionEstablished)";
        match line.parse::<TraceRecord>().unwrap() {
            TraceRecord::UeSeenAtCell {
                cell_id,
                imsi,
                context,
                ..
            } => {
                assert_eq!(cell_id, 4);
                assert_eq!(imsi, 2);
                assert_eq!(context, "/NodeList/7/DeviceList/0/LteEnbRrc/ConnectionEstablished");
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn state_lines() {
        let cell = TraceRecord::CellState {
            time: TimeMS::ZERO,
            cell_id: 2,
            x: -0.25,
            y: 0.433013,
            direction: 120,
        };
        assert_eq!(
            cell.to_string(),
            "0 ms: Cell state: Cell 2 at -0.25 0.433013 direction 120"
        );
        let ue = TraceRecord::UeState {
            time: TimeMS::from(100u64),
            imsi: 1,
            x: 10.5,
            y: 300.0,
            rx_bytes: 0,
        };
        assert_eq!(
            ue.to_string(),
            "100 ms: UE state: IMSI 1 at 10.5 300 with 0 received bytes"
        );
        assert_eq!(ue.to_string().parse::<TraceRecord>().unwrap(), ue);
    }

    #[test]
    fn unknown_label_is_rejected() {
        assert!("5 ms: Something: else".parse::<TraceRecord>().is_err());
        assert!("not a trace line".parse::<TraceRecord>().is_err());
    }
}

use std::fs;
use std::io;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, warn};

use crate::document::EdfDocument;
use crate::error::{EdfError, Result};
use crate::header::{samples_per_record_offset, DATA_RECORDS, SIGNAL_COUNT};
use crate::types::EdfHeader;
use crate::utils::malformed;
use crate::EDF_SAMPLE_BYTES;

/// Decodes the data-record region that follows a parsed header.
///
/// For every data record, and within it every signal in declaration order,
/// `samples_per_record` little-endian 16-bit integers are read, clamped to
/// the signal's digital range and converted to physical values. Each
/// signal's samples end up in chronological order.
///
/// A signal whose digital or physical range collapses to a single value
/// cannot be scaled; its samples are kept as raw digital values and the
/// document reports a [`SignalWarning::DegenerateRange`](crate::SignalWarning)
/// for it. Bytes past the last declared data record are ignored.
///
/// # Arguments
///
/// * `header` - header returned by [`parse_header`](crate::header::parse_header)
/// * `data` - the file contents starting at `header.header_bytes`
///
/// # Errors
///
/// * `EdfError::TruncatedInput` - `data` is shorter than
///   `sum(samples_per_record) * 2 * datarecords_in_file`
/// * `EdfError::DegenerateRange` - every signal is degenerate
/// * `EdfError::MalformedHeader` - the header has no signals, no records,
///   or a signal with zero samples per record
///
/// # Examples
///
/// ```rust
/// use edfcodec::header::parse_header;
/// use edfcodec::reader::decode_records;
///
/// # let bytes = edfcodec::doctest_utils::simple_edf_bytes()?;
/// let header = parse_header(&bytes)?;
/// let data_offset = header.header_bytes;
/// let document = decode_records(header, &bytes[data_offset..])?;
///
/// for (i, signal) in document.signals().iter().enumerate() {
///     let samples = document.samples(i)?;
///     println!("{}: {} samples at {} Hz", signal.label, samples.len(), document.sample_rate(i)?);
/// }
/// # Ok::<(), edfcodec::EdfError>(())
/// ```
pub fn decode_records(header: EdfHeader, data: &[u8]) -> Result<EdfDocument> {
    if header.signals.is_empty() {
        return Err(malformed("number of signals", SIGNAL_COUNT.0, "0"));
    }
    if header.datarecords_in_file == 0 {
        return Err(malformed("number of data records", DATA_RECORDS.0, "0"));
    }
    if let Some(i) = header.signals.iter().position(|s| s.samples_per_record == 0) {
        return Err(malformed(
            "samples per record",
            samples_per_record_offset(header.signals.len(), i),
            "0",
        ));
    }

    let records = header.datarecords_in_file;
    let needed = header
        .signals
        .iter()
        .try_fold(0usize, |acc, s| {
            s.samples_per_record
                .checked_mul(EDF_SAMPLE_BYTES)
                .and_then(|n| acc.checked_add(n))
        })
        .and_then(|record_size| record_size.checked_mul(records))
        .unwrap_or(usize::MAX);
    if data.len() < needed {
        return Err(EdfError::TruncatedInput {
            needed,
            available: data.len(),
        });
    }
    if data.len() > needed {
        warn!("ignoring {} bytes after the last data record", data.len() - needed);
    }

    let degenerate: Vec<usize> = header
        .signals
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_degenerate())
        .map(|(i, _)| i)
        .collect();
    if degenerate.len() == header.signals.len() {
        return Err(EdfError::DegenerateRange { signals: degenerate });
    }
    for &i in &degenerate {
        warn!(
            "signal {} ({}) has a degenerate scaling range, keeping digital values",
            i, header.signals[i].label
        );
    }

    let mut samples: Vec<Vec<f64>> = header
        .signals
        .iter()
        .map(|s| Vec::with_capacity(s.samples_per_record * records))
        .collect();
    let mut clamped = vec![0usize; header.signals.len()];
    let mut raw = Vec::new();
    let mut pos = 0;

    // 数据按记录交错存储：记录0[信号0, 信号1, ...], 记录1[...]
    for _ in 0..records {
        for (i, signal) in header.signals.iter().enumerate() {
            let len = signal.samples_per_record * EDF_SAMPLE_BYTES;
            raw.resize(signal.samples_per_record, 0i16);
            LittleEndian::read_i16_into(&data[pos..pos + len], &mut raw);
            pos += len;

            let degenerate = signal.is_degenerate();
            let out = &mut samples[i];
            for &value in &raw {
                let digital = signal.clamp_digital(value as i32);
                if digital != value as i32 {
                    clamped[i] += 1;
                }
                out.push(if degenerate {
                    digital as f64
                } else {
                    signal.to_physical(digital)
                });
            }
        }
    }

    for (i, count) in clamped.iter().enumerate().filter(|(_, c)| **c > 0) {
        warn!("signal {}: {} stored samples outside the digital range were clamped", i, count);
    }
    debug!(
        "decoded {} data records, {} signals, {} bytes",
        records,
        header.signals.len(),
        needed
    );

    Ok(EdfDocument::from_decoded(header, samples))
}

/// Reads and decodes a whole EDF file.
///
/// The file is loaded into memory first; decoding never touches the file
/// system.
///
/// # Errors
///
/// * `EdfError::FileNotFound` - the file doesn't exist
/// * `EdfError::Io` - any other read failure
/// * everything [`decode`](crate::decode) can return
///
/// # Examples
///
/// ```rust
/// use edfcodec::reader::read_file;
///
/// match read_file("nonexistent.edf") {
///     Ok(_) => println!("Unexpected success"),
///     Err(edfcodec::EdfError::FileNotFound(msg)) => println!("File not found: {}", msg),
///     Err(e) => println!("Other error: {}", e),
/// }
/// ```
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<EdfDocument> {
    let bytes = fs::read(&path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => {
            EdfError::FileNotFound(format!("{}: {}", path.as_ref().display(), e))
        }
        _ => EdfError::Io(e),
    })?;
    debug!("read {} bytes from {}", bytes.len(), path.as_ref().display());
    crate::decode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RangeKind;
    use crate::types::{SignalParam, SignalWarning};
    use chrono::{NaiveDate, NaiveTime};

    fn header(signals: Vec<SignalParam>, records: usize) -> EdfHeader {
        EdfHeader {
            version: "0".to_string(),
            patient_id: "X".to_string(),
            recording_id: "X".to_string(),
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            header_bytes: 256 * (signals.len() + 1),
            reserved: String::new(),
            datarecords_in_file: records,
            datarecord_duration: 1.0,
            signals,
        }
    }

    fn signal(label: &str, samples_per_record: usize) -> SignalParam {
        SignalParam {
            label: label.to_string(),
            physical_min: -100.0,
            physical_max: 100.0,
            digital_min: -100,
            digital_max: 100,
            samples_per_record,
            ..SignalParam::default()
        }
    }

    fn le_bytes(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_deinterleaves_records() {
        // 两个信号：A 每记录 2 个样本，B 每记录 1 个样本
        let h = header(vec![signal("A", 2), signal("B", 1)], 2);
        let data = le_bytes(&[1, 2, 10, 3, 4, 20]);
        let doc = decode_records(h, &data).unwrap();
        assert_eq!(doc.samples(0).unwrap(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(doc.samples(1).unwrap(), &[10.0, 20.0]);
    }

    #[test]
    fn test_truncated_data() {
        let h = header(vec![signal("A", 2), signal("B", 1)], 2);
        let data = le_bytes(&[1, 2, 10, 3, 4]);
        match decode_records(h, &data) {
            Err(EdfError::TruncatedInput { needed: 12, available: 10 }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_trailing_bytes_are_ignored() {
        let h = header(vec![signal("A", 1)], 1);
        let doc = decode_records(h, &le_bytes(&[5, 99, 99])).unwrap();
        assert_eq!(doc.samples(0).unwrap(), &[5.0]);
    }

    #[test]
    fn test_out_of_range_digital_values_are_clamped() {
        let h = header(vec![signal("A", 2)], 1);
        let doc = decode_records(h, &le_bytes(&[500, -500])).unwrap();
        assert_eq!(doc.samples(0).unwrap(), &[100.0, -100.0]);
    }

    #[test]
    fn test_degenerate_signal_is_isolated() {
        let mut flat = signal("flat", 1);
        flat.digital_max = flat.digital_min;
        let h = header(vec![signal("A", 1), flat, signal("C", 1)], 1);
        let doc = decode_records(h, &le_bytes(&[7, 3, -7])).unwrap();
        assert_eq!(doc.samples(0).unwrap(), &[7.0]);
        assert_eq!(doc.samples(2).unwrap(), &[-7.0]);
        assert_eq!(
            doc.warnings(),
            vec![SignalWarning::DegenerateRange {
                signal: 1,
                label: "flat".to_string(),
                kind: RangeKind::Digital,
            }]
        );
    }

    #[test]
    fn test_all_degenerate_fails() {
        let mut a = signal("A", 1);
        a.physical_max = a.physical_min;
        let mut b = signal("B", 1);
        b.digital_max = b.digital_min;
        let h = header(vec![a, b], 1);
        match decode_records(h, &le_bytes(&[1, 2])) {
            Err(EdfError::DegenerateRange { signals }) => assert_eq!(signals, vec![0, 1]),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_empty_layout_reports_field_offsets() {
        let h = header(vec![signal("A", 1), signal("B", 0)], 1);
        match decode_records(h, &le_bytes(&[1])) {
            Err(EdfError::MalformedHeader { field, offset, .. }) => {
                assert_eq!(field, "samples per record");
                assert_eq!(offset, 256 + 216 * 2 + 8);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let h = header(vec![signal("A", 1)], 0);
        assert!(matches!(
            decode_records(h, &[]),
            Err(EdfError::MalformedHeader { field: "number of data records", offset: 236, .. })
        ));
        let h = header(Vec::new(), 1);
        assert!(matches!(
            decode_records(h, &[]),
            Err(EdfError::MalformedHeader { field: "number of signals", offset: 252, .. })
        ));
    }

    #[test]
    fn test_read_missing_file() {
        assert!(matches!(
            read_file("definitely_missing_file.edf"),
            Err(EdfError::FileNotFound(_))
        ));
    }
}

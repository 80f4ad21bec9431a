//! Fixed-layout ASCII header: parsing and serialization.
//!
//! An EDF header is a 256-byte general block followed by one 256-byte block
//! per signal. The signal blocks are stored field-major: all labels first,
//! then all transducer types, and so on.

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use log::debug;

use crate::error::{EdfError, Result};
use crate::types::{EdfHeader, SignalParam};
use crate::utils::{
    check_text_field, field_str, format_number, malformed, normalize_number, parse_float_field,
    parse_int_field, parse_text_field, put_field,
};
use crate::{EDFLIB_MAXSIGNALS, EDF_DIGITAL_MAX, EDF_DIGITAL_MIN, EDF_HEADER_SIZE, EDF_SIGNAL_HEADER_SIZE};

// 通用头部字段 (offset, width)
const VERSION: (usize, usize) = (0, 8);
const PATIENT: (usize, usize) = (8, 80);
const RECORDING: (usize, usize) = (88, 80);
const START_DATE: (usize, usize) = (168, 8);
const START_TIME: (usize, usize) = (176, 8);
const HEADER_BYTES: (usize, usize) = (184, 8);
const RESERVED: (usize, usize) = (192, 44);
pub(crate) const DATA_RECORDS: (usize, usize) = (236, 8);
const RECORD_DURATION: (usize, usize) = (244, 8);
pub(crate) const SIGNAL_COUNT: (usize, usize) = (252, 4);

/// Per-signal fields in on-disk order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalField {
    Label,
    Transducer,
    Dimension,
    PhysicalMin,
    PhysicalMax,
    DigitalMin,
    DigitalMax,
    Prefilter,
    SamplesPerRecord,
    Reserved,
}

impl SignalField {
    const ALL: [SignalField; 10] = [
        SignalField::Label,
        SignalField::Transducer,
        SignalField::Dimension,
        SignalField::PhysicalMin,
        SignalField::PhysicalMax,
        SignalField::DigitalMin,
        SignalField::DigitalMax,
        SignalField::Prefilter,
        SignalField::SamplesPerRecord,
        SignalField::Reserved,
    ];

    fn width(self) -> usize {
        match self {
            SignalField::Label => 16,
            SignalField::Transducer | SignalField::Prefilter => 80,
            SignalField::Reserved => 32,
            _ => 8,
        }
    }

    fn name(self) -> &'static str {
        match self {
            SignalField::Label => "label",
            SignalField::Transducer => "transducer type",
            SignalField::Dimension => "physical dimension",
            SignalField::PhysicalMin => "physical minimum",
            SignalField::PhysicalMax => "physical maximum",
            SignalField::DigitalMin => "digital minimum",
            SignalField::DigitalMax => "digital maximum",
            SignalField::Prefilter => "prefiltering",
            SignalField::SamplesPerRecord => "samples per record",
            SignalField::Reserved => "signal reserved",
        }
    }

    /// Absolute byte offset of this field for signal `index` out of `count`
    fn offset(self, count: usize, index: usize) -> usize {
        let preceding: usize = Self::ALL
            .iter()
            .take_while(|f| **f != self)
            .map(|f| f.width())
            .sum();
        EDF_HEADER_SIZE + preceding * count + index * self.width()
    }
}

/// Absolute offset of signal `index`'s samples-per-record field
pub(crate) fn samples_per_record_offset(count: usize, index: usize) -> usize {
    SignalField::SamplesPerRecord.offset(count, index)
}

/// Parses the general header and all signal parameter blocks.
///
/// `bytes` is the whole file; the data region is only consulted to resolve
/// an unknown (`-1`) number of data records.
///
/// # Errors
///
/// * `EdfError::TruncatedInput` - fewer bytes than the header needs
/// * `EdfError::MalformedHeader` - a field cannot be interpreted
/// * `EdfError::InconsistentSignalCount` - signal count and header size disagree
///
/// # Examples
///
/// ```rust
/// use edfcodec::header::parse_header;
///
/// # let bytes = edfcodec::doctest_utils::simple_edf_bytes()?;
/// let header = parse_header(&bytes)?;
/// assert_eq!(header.header_bytes, 256 * (header.signals.len() + 1));
/// println!("{} records of {} s", header.datarecords_in_file, header.datarecord_duration);
/// # Ok::<(), edfcodec::EdfError>(())
/// ```
pub fn parse_header(bytes: &[u8]) -> Result<EdfHeader> {
    if bytes.len() < EDF_HEADER_SIZE {
        return Err(EdfError::TruncatedInput {
            needed: EDF_HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let version = field_str(bytes, VERSION.0, VERSION.1);
    if version != "0" {
        return Err(malformed("version", VERSION.0, version));
    }

    let signal_count = parse_int_field(bytes, "number of signals", SIGNAL_COUNT.0, SIGNAL_COUNT.1)?;
    if signal_count < 1 || signal_count > EDFLIB_MAXSIGNALS as i64 {
        return Err(malformed("number of signals", SIGNAL_COUNT.0, signal_count.to_string()));
    }
    let signal_count = signal_count as usize;

    let header_bytes = parse_int_field(bytes, "header bytes", HEADER_BYTES.0, HEADER_BYTES.1)?;
    if header_bytes < 0 {
        return Err(malformed("header bytes", HEADER_BYTES.0, header_bytes.to_string()));
    }
    let header_bytes = header_bytes as usize;
    if header_bytes != EDF_HEADER_SIZE + signal_count * EDF_SIGNAL_HEADER_SIZE {
        return Err(EdfError::InconsistentSignalCount {
            declared: signal_count,
            header_bytes,
        });
    }
    if bytes.len() < header_bytes {
        return Err(EdfError::TruncatedInput {
            needed: header_bytes,
            available: bytes.len(),
        });
    }

    let patient_id = parse_text_field(bytes, "patient identification", PATIENT.0, PATIENT.1)?;
    let recording_id = parse_text_field(bytes, "recording identification", RECORDING.0, RECORDING.1)?;
    let start_date = parse_date(&field_str(bytes, START_DATE.0, START_DATE.1))?;
    let start_time = parse_time(&field_str(bytes, START_TIME.0, START_TIME.1))?;
    let reserved = parse_text_field(bytes, "reserved", RESERVED.0, RESERVED.1)?;

    let declared_records = parse_int_field(bytes, "number of data records", DATA_RECORDS.0, DATA_RECORDS.1)?;
    if declared_records == 0 || declared_records < -1 {
        return Err(malformed("number of data records", DATA_RECORDS.0, declared_records.to_string()));
    }

    let datarecord_duration =
        parse_float_field(bytes, "data record duration", RECORD_DURATION.0, RECORD_DURATION.1)?;
    if datarecord_duration <= 0.0 {
        return Err(malformed(
            "data record duration",
            RECORD_DURATION.0,
            datarecord_duration.to_string(),
        ));
    }

    let signals = parse_signals(bytes, signal_count)?;

    let record_size = signals
        .iter()
        .try_fold(0usize, |acc, s| {
            s.samples_per_record
                .checked_mul(crate::EDF_SAMPLE_BYTES)
                .and_then(|n| acc.checked_add(n))
        })
        .ok_or_else(|| {
            malformed(
                "samples per record",
                SignalField::SamplesPerRecord.offset(signal_count, 0),
                "record size overflow",
            )
        })?;

    let datarecords_in_file = if declared_records == -1 {
        // 记录数未知（流式写入中断的文件），根据数据区长度推断
        let inferred = (bytes.len() - header_bytes) / record_size;
        debug!("inferred {} data records from {} data bytes", inferred, bytes.len() - header_bytes);
        if inferred == 0 {
            return Err(malformed("number of data records", DATA_RECORDS.0, "-1"));
        }
        inferred
    } else {
        declared_records as usize
    };
    if record_size.checked_mul(datarecords_in_file).is_none() {
        return Err(malformed(
            "number of data records",
            DATA_RECORDS.0,
            datarecords_in_file.to_string(),
        ));
    }

    debug!(
        "EDF header parsed: signals={}, data_records={}, record_duration={}s, header_bytes={}",
        signal_count, datarecords_in_file, datarecord_duration, header_bytes
    );

    Ok(EdfHeader {
        version,
        patient_id,
        recording_id,
        start_date,
        start_time,
        header_bytes,
        reserved,
        datarecords_in_file,
        datarecord_duration,
        signals,
    })
}

fn parse_signals(bytes: &[u8], count: usize) -> Result<Vec<SignalParam>> {
    let text = |field: SignalField, i: usize| {
        parse_text_field(bytes, field.name(), field.offset(count, i), field.width())
    };
    let float = |field: SignalField, i: usize| {
        parse_float_field(bytes, field.name(), field.offset(count, i), field.width())
    };
    let int = |field: SignalField, i: usize| {
        parse_int_field(bytes, field.name(), field.offset(count, i), field.width())
    };

    let mut signals = Vec::with_capacity(count);
    for i in 0..count {
        let digital_min = int(SignalField::DigitalMin, i)?;
        let digital_max = int(SignalField::DigitalMax, i)?;
        for (field, value) in [(SignalField::DigitalMin, digital_min), (SignalField::DigitalMax, digital_max)] {
            if value < EDF_DIGITAL_MIN as i64 || value > EDF_DIGITAL_MAX as i64 {
                return Err(malformed(field.name(), field.offset(count, i), value.to_string()));
            }
        }
        if digital_max < digital_min {
            return Err(malformed(
                SignalField::DigitalMax.name(),
                SignalField::DigitalMax.offset(count, i),
                digital_max.to_string(),
            ));
        }

        let samples_per_record = int(SignalField::SamplesPerRecord, i)?;
        if samples_per_record < 1 {
            return Err(malformed(
                SignalField::SamplesPerRecord.name(),
                SignalField::SamplesPerRecord.offset(count, i),
                samples_per_record.to_string(),
            ));
        }

        signals.push(SignalParam {
            label: text(SignalField::Label, i)?,
            transducer: text(SignalField::Transducer, i)?,
            physical_dimension: text(SignalField::Dimension, i)?,
            physical_min: float(SignalField::PhysicalMin, i)?,
            physical_max: float(SignalField::PhysicalMax, i)?,
            digital_min: digital_min as i32,
            digital_max: digital_max as i32,
            prefilter: text(SignalField::Prefilter, i)?,
            samples_per_record: samples_per_record as usize,
            reserved: text(SignalField::Reserved, i)?,
        });
    }
    Ok(signals)
}

/// 解析日期 "dd.mm.yy"，两位年份按 EDF 规则以 1985 为界
fn parse_date(s: &str) -> Result<NaiveDate> {
    let err = || malformed("start date", START_DATE.0, s);
    let [day, month, yy] = split_triplet(s).ok_or_else(err)?;
    let year = if yy >= 85 { 1900 + yy } else { 2000 + yy };
    NaiveDate::from_ymd_opt(year as i32, month, day).ok_or_else(err)
}

/// 解析时间 "hh.mm.ss"
fn parse_time(s: &str) -> Result<NaiveTime> {
    let err = || malformed("start time", START_TIME.0, s);
    let [hour, minute, second] = split_triplet(s).ok_or_else(err)?;
    NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(err)
}

fn split_triplet(s: &str) -> Option<[u32; 3]> {
    let mut parts = s.split('.');
    let mut out = [0u32; 3];
    for slot in out.iter_mut() {
        let part = parts.next()?;
        if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *slot = part.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

/// Returns a copy of `header` whose numeric fields hold exactly the values
/// they will have once written to (and read back from) their 8-character
/// fields.
pub(crate) fn normalize_header(header: &EdfHeader) -> Result<EdfHeader> {
    let mut normalized = header.clone();
    normalized.datarecord_duration = normalize_number(header.datarecord_duration, RECORD_DURATION.1)
        .filter(|d| *d > 0.0)
        .ok_or(EdfError::InvalidRecordDuration(header.datarecord_duration))?;
    for signal in &mut normalized.signals {
        signal.physical_min = normalize_number(signal.physical_min, 8).ok_or_else(|| {
            EdfError::InvalidField {
                field: "physical minimum",
                reason: format!("{} does not fit in 8 characters", signal.physical_min),
            }
        })?;
        signal.physical_max = normalize_number(signal.physical_max, 8).ok_or_else(|| {
            EdfError::InvalidField {
                field: "physical maximum",
                reason: format!("{} does not fit in 8 characters", signal.physical_max),
            }
        })?;
    }
    normalized.header_bytes = EDF_HEADER_SIZE + header.signals.len() * EDF_SIGNAL_HEADER_SIZE;
    Ok(normalized)
}

/// Serializes a header into `256 * (signals + 1)` bytes.
///
/// The header byte count is recomputed from the signal count; the stored
/// `header_bytes` value is ignored.
///
/// # Errors
///
/// * `EdfError::InvalidField` - a text field is too long or not ASCII, a
///   number does not fit its field, or the start year is outside 1985..=2084
/// * `EdfError::InvalidRecordDuration` - duration not positive or too wide
pub fn write_header(header: &EdfHeader) -> Result<Vec<u8>> {
    let count = header.signals.len();
    if count == 0 || count > EDFLIB_MAXSIGNALS {
        return Err(EdfError::InvalidField {
            field: "number of signals",
            reason: format!("{} is outside 1..={}", count, EDFLIB_MAXSIGNALS),
        });
    }
    let header_bytes = EDF_HEADER_SIZE + count * EDF_SIGNAL_HEADER_SIZE;
    let mut buf = vec![b' '; header_bytes];

    check_text_field("patient identification", &header.patient_id, PATIENT.1)?;
    check_text_field("recording identification", &header.recording_id, RECORDING.1)?;
    check_text_field("reserved", &header.reserved, RESERVED.1)?;

    let year = header.start_date.year();
    if !(1985..=2084).contains(&year) {
        return Err(EdfError::InvalidField {
            field: "start date",
            reason: format!("year {} cannot be stored as a two-digit EDF year", year),
        });
    }

    let duration = format_number(header.datarecord_duration, RECORD_DURATION.1)
        .filter(|_| header.datarecord_duration > 0.0)
        .ok_or(EdfError::InvalidRecordDuration(header.datarecord_duration))?;

    let records = header.datarecords_in_file.to_string();
    if records.len() > DATA_RECORDS.1 {
        return Err(EdfError::InvalidField {
            field: "number of data records",
            reason: format!("{} does not fit in 8 characters", records),
        });
    }

    put_field(&mut buf, VERSION.0, VERSION.1, "0");
    put_field(&mut buf, PATIENT.0, PATIENT.1, &header.patient_id);
    put_field(&mut buf, RECORDING.0, RECORDING.1, &header.recording_id);
    let date = format!(
        "{:02}.{:02}.{:02}",
        header.start_date.day(),
        header.start_date.month(),
        year % 100
    );
    put_field(&mut buf, START_DATE.0, START_DATE.1, &date);
    let time = format!(
        "{:02}.{:02}.{:02}",
        header.start_time.hour(),
        header.start_time.minute(),
        header.start_time.second()
    );
    put_field(&mut buf, START_TIME.0, START_TIME.1, &time);
    put_field(&mut buf, HEADER_BYTES.0, HEADER_BYTES.1, &header_bytes.to_string());
    put_field(&mut buf, RESERVED.0, RESERVED.1, &header.reserved);
    put_field(&mut buf, DATA_RECORDS.0, DATA_RECORDS.1, &records);
    put_field(&mut buf, RECORD_DURATION.0, RECORD_DURATION.1, &duration);
    put_field(&mut buf, SIGNAL_COUNT.0, SIGNAL_COUNT.1, &count.to_string());

    for (i, signal) in header.signals.iter().enumerate() {
        for field in SignalField::ALL {
            let value = signal_field_value(signal, field)?;
            put_field(&mut buf, field.offset(count, i), field.width(), &value);
        }
    }

    debug!("EDF header serialized: {} bytes, {} signals", header_bytes, count);
    Ok(buf)
}

fn signal_field_value(signal: &SignalParam, field: SignalField) -> Result<String> {
    let text = |value: &str| -> Result<String> {
        check_text_field(field.name(), value, field.width())?;
        Ok(value.to_string())
    };
    let number = |value: f64| -> Result<String> {
        format_number(value, field.width()).ok_or_else(|| EdfError::InvalidField {
            field: field.name(),
            reason: format!("{} does not fit in {} characters", value, field.width()),
        })
    };

    match field {
        SignalField::Label => text(&signal.label),
        SignalField::Transducer => text(&signal.transducer),
        SignalField::Dimension => text(&signal.physical_dimension),
        SignalField::PhysicalMin => number(signal.physical_min),
        SignalField::PhysicalMax => number(signal.physical_max),
        SignalField::DigitalMin => number(signal.digital_min as f64),
        SignalField::DigitalMax => number(signal.digital_max as f64),
        SignalField::Prefilter => text(&signal.prefilter),
        SignalField::SamplesPerRecord => number(signal.samples_per_record as f64),
        SignalField::Reserved => text(&signal.reserved),
    }
}

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::RangeKind;
use crate::EDF_SAMPLE_BYTES;

/// Label reserved by EDF+ for annotation channels
pub const ANNOTATION_LABEL: &str = "EDF Annotations";

/// Parameters of one signal (channel), as stored in its header block
#[derive(Debug, Clone, PartialEq)]
pub struct SignalParam {
    pub label: String,
    pub transducer: String,
    pub physical_dimension: String,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i32,
    pub digital_max: i32,
    pub prefilter: String,
    pub samples_per_record: usize,
    pub reserved: String,
}

impl SignalParam {
    /// 每个数字量化单位对应的物理值
    pub fn bit_value(&self) -> f64 {
        (self.physical_max - self.physical_min) /
        (self.digital_max - self.digital_min) as f64
    }

    /// Largest error a single quantization step can introduce, in physical units
    pub fn quantization_step(&self) -> f64 {
        self.bit_value().abs()
    }

    /// Converts a stored digital value to its physical value.
    ///
    /// ```rust
    /// use edfcodec::SignalParam;
    ///
    /// let signal = SignalParam {
    ///     physical_min: -500.0,
    ///     physical_max: 500.0,
    ///     digital_min: -32768,
    ///     digital_max: 32767,
    ///     ..SignalParam::default()
    /// };
    /// assert_eq!(signal.to_physical(-32768), -500.0);
    /// assert_eq!(signal.to_physical(32767), 500.0);
    /// ```
    pub fn to_physical(&self, digital_value: i32) -> f64 {
        self.physical_min
            + (digital_value as f64 - self.digital_min as f64)
                * (self.physical_max - self.physical_min)
                / (self.digital_max as f64 - self.digital_min as f64)
    }

    /// Converts a physical value to the nearest digital value, without clamping.
    ///
    /// Halves round away from zero. Use [`SignalParam::clamp_digital`] before
    /// serializing.
    pub fn to_digital(&self, physical_value: f64) -> i32 {
        let steps = (physical_value - self.physical_min)
            * (self.digital_max as f64 - self.digital_min as f64)
            / (self.physical_max - self.physical_min);
        // `as` 饱和转换，NaN 变为 0
        (self.digital_min as f64 + steps.round()) as i32
    }

    /// 将数字值限制在 [digital_min, digital_max]
    pub fn clamp_digital(&self, digital_value: i32) -> i32 {
        digital_value.max(self.digital_min).min(self.digital_max)
    }

    /// Returns which range is collapsed, if the scaling formula is undefined
    pub fn degenerate_range(&self) -> Option<RangeKind> {
        if self.digital_max == self.digital_min {
            Some(RangeKind::Digital)
        } else if self.physical_max == self.physical_min {
            Some(RangeKind::Physical)
        } else {
            None
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.degenerate_range().is_some()
    }

    pub fn is_annotation(&self) -> bool {
        self.label == ANNOTATION_LABEL
    }

    pub fn contains_physical(&self, value: f64) -> bool {
        let (lo, hi) = if self.physical_min <= self.physical_max {
            (self.physical_min, self.physical_max)
        } else {
            (self.physical_max, self.physical_min)
        };
        value >= lo && value <= hi
    }

    /// Sampling frequency in Hz for the given data record duration
    pub fn sample_rate(&self, datarecord_duration: f64) -> f64 {
        self.samples_per_record as f64 / datarecord_duration
    }
}

impl Default for SignalParam {
    fn default() -> Self {
        SignalParam {
            label: String::new(),
            transducer: String::new(),
            physical_dimension: String::new(),
            physical_min: -1.0,
            physical_max: 1.0,
            digital_min: crate::EDF_DIGITAL_MIN,
            digital_max: crate::EDF_DIGITAL_MAX,
            prefilter: String::new(),
            samples_per_record: 1,
            reserved: String::new(),
        }
    }
}

/// The fixed general header plus every signal's parameter block
#[derive(Debug, Clone, PartialEq)]
pub struct EdfHeader {
    pub version: String,
    pub patient_id: String,
    pub recording_id: String,
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    /// 数据区起始偏移
    pub header_bytes: usize,
    pub reserved: String,
    pub datarecords_in_file: usize,
    /// 数据记录时长（秒）
    pub datarecord_duration: f64,
    pub signals: Vec<SignalParam>,
}

impl EdfHeader {
    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    /// Bytes occupied by one data record (all signals)
    pub fn record_size(&self) -> usize {
        self.signals
            .iter()
            .map(|s| s.samples_per_record * EDF_SAMPLE_BYTES)
            .sum()
    }

    /// Bytes occupied by the whole data region
    pub fn data_size(&self) -> usize {
        self.record_size() * self.datarecords_in_file
    }

    pub fn start_datetime(&self) -> NaiveDateTime {
        NaiveDateTime::new(self.start_date, self.start_time)
    }

    /// Total recording length in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.datarecords_in_file as f64 * self.datarecord_duration
    }

    /// Samples a signal must hold for the declared record layout
    pub fn samples_in_file(&self, signal: usize) -> Option<usize> {
        self.signals
            .get(signal)
            .map(|s| s.samples_per_record * self.datarecords_in_file)
    }
}

/// Non-fatal diagnostics attached to a document
#[derive(Debug, Clone, PartialEq)]
pub enum SignalWarning {
    /// The scaling formula is undefined for this signal; its samples hold raw
    /// digital values and are written back unchanged.
    DegenerateRange {
        signal: usize,
        label: String,
        kind: RangeKind,
    },
    /// Samples outside the physical range; they clamp when encoded.
    OutOfPhysicalRange {
        signal: usize,
        count: usize,
        first_index: usize,
    },
}

impl SignalWarning {
    pub fn signal(&self) -> usize {
        match self {
            SignalWarning::DegenerateRange { signal, .. } => *signal,
            SignalWarning::OutOfPhysicalRange { signal, .. } => *signal,
        }
    }
}

impl std::fmt::Display for SignalWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalWarning::DegenerateRange { signal, label, kind } => write!(
                f,
                "signal {} ({}) has a degenerate {} range, samples kept as digital values",
                signal, label, kind
            ),
            SignalWarning::OutOfPhysicalRange { signal, count, first_index } => write!(
                f,
                "signal {} has {} samples outside its physical range (first at {})",
                signal, count, first_index
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eeg() -> SignalParam {
        SignalParam {
            label: "EEG Fp1".to_string(),
            physical_min: -500.0,
            physical_max: 500.0,
            digital_min: -32768,
            digital_max: 32767,
            samples_per_record: 4,
            ..SignalParam::default()
        }
    }

    #[test]
    fn test_scaling_endpoints() {
        let s = eeg();
        assert_eq!(s.to_digital(500.0), 32767);
        assert_eq!(s.to_digital(-500.0), -32768);
        assert_eq!(s.to_physical(32767), 500.0);
        assert_eq!(s.to_physical(-32768), -500.0);
    }

    #[test]
    fn test_scaling_inverse_every_digital_value() {
        let signals = [
            eeg(),
            SignalParam { physical_min: 0.0, physical_max: 3.3, digital_min: 0, digital_max: 4095, ..eeg() },
            SignalParam { physical_min: 40.0, physical_max: 30.0, digital_min: -100, digital_max: 100, ..eeg() },
        ];
        for s in &signals {
            for v in s.digital_min..=s.digital_max {
                assert_eq!(s.to_digital(s.to_physical(v)), v, "drift at {} for {:?}", v, s);
            }
        }
    }

    #[test]
    fn test_to_digital_saturates_and_clamps() {
        let s = eeg();
        assert_eq!(s.clamp_digital(s.to_digital(10_000.0)), 32767);
        assert_eq!(s.clamp_digital(s.to_digital(-10_000.0)), -32768);
        assert_eq!(s.to_digital(f64::INFINITY), i32::MAX);
    }

    #[test]
    fn test_degenerate_detection() {
        let mut s = eeg();
        assert_eq!(s.degenerate_range(), None);
        s.physical_max = s.physical_min;
        assert_eq!(s.degenerate_range(), Some(RangeKind::Physical));
        s.digital_max = s.digital_min;
        assert_eq!(s.degenerate_range(), Some(RangeKind::Digital));
    }

    #[test]
    fn test_contains_physical_with_inverted_range() {
        let s = SignalParam { physical_min: 10.0, physical_max: -10.0, ..eeg() };
        assert!(s.contains_physical(0.0));
        assert!(!s.contains_physical(11.0));
    }

    #[test]
    fn test_header_sizes() {
        let header = EdfHeader {
            version: "0".to_string(),
            patient_id: String::new(),
            recording_id: String::new(),
            start_date: NaiveDate::from_ymd_opt(2001, 2, 3).unwrap(),
            start_time: NaiveTime::from_hms_opt(4, 5, 6).unwrap(),
            header_bytes: 768,
            reserved: String::new(),
            datarecords_in_file: 3,
            datarecord_duration: 0.5,
            signals: vec![eeg(), SignalParam { samples_per_record: 10, ..eeg() }],
        };
        assert_eq!(header.record_size(), 28);
        assert_eq!(header.data_size(), 84);
        assert_eq!(header.samples_in_file(1), Some(30));
        assert_eq!(header.samples_in_file(2), None);
        assert_eq!(header.duration_seconds(), 1.5);
        assert_eq!(header.signals[1].sample_rate(header.datarecord_duration), 20.0);
    }
}

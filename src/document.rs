use chrono::{Datelike, NaiveDateTime, Timelike};
use log::debug;

use crate::error::{EdfError, Result};
use crate::header::normalize_header;
use crate::types::{EdfHeader, SignalParam, SignalWarning};
use crate::utils::{check_text_field, normalize_number};
use crate::{EDFLIB_MAXSIGNALS, EDF_DIGITAL_MAX, EDF_DIGITAL_MIN, EDF_HEADER_SIZE, EDF_SIGNAL_HEADER_SIZE};

/// Relative tolerance when turning a sample rate into an integer sample count
const SAMPLE_RATE_TOLERANCE: f64 = 1e-6;

/// An EDF recording held in memory: the header plus every signal's samples
/// as physical values.
///
/// The document always satisfies the codec's invariants: signal `i` holds
/// exactly `samples_per_record * datarecords_in_file` samples, every scaling
/// range is usable, and every header field fits its on-disk width. Mutators
/// check these before changing anything and leave the document untouched
/// when they fail.
///
/// Signals whose digital or physical range is degenerate (possible only for
/// decoded files) hold raw digital values instead of physical ones; see
/// [`EdfDocument::warnings`].
///
/// # Examples
///
/// ```rust
/// use edfcodec::{decode, encode};
///
/// # let bytes = edfcodec::doctest_utils::simple_edf_bytes()?;
/// let mut document = decode(&bytes)?;
///
/// document.set_signal_label(0, "EEG Cz")?;
/// document.set_sample(0, 10, 42.0)?;
/// document.set_physical_range(0, -250.0, 250.0)?;
///
/// let edited = encode(&document)?;
/// let reread = decode(&edited)?;
/// assert_eq!(reread.signal(0)?.label, "EEG Cz");
/// # Ok::<(), edfcodec::EdfError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EdfDocument {
    pub(crate) header: EdfHeader,
    pub(crate) samples: Vec<Vec<f64>>,
}

impl EdfDocument {
    /// Builds a document from a header and per-signal physical samples.
    ///
    /// Header numbers are normalized to the values their 8-character fields
    /// can hold, and `header_bytes` is recomputed.
    ///
    /// # Errors
    ///
    /// * `EdfError::SampleCountMismatch` - a signal's sample count does not
    ///   match `samples_per_record * datarecords_in_file`
    /// * `EdfError::InvalidField` - signal count, record count, digital
    ///   range or a header number cannot be stored
    /// * `EdfError::InvertedRange` - physical max is not above physical min
    /// * `EdfError::InvalidRecordDuration` - duration not positive
    ///
    /// # Examples
    ///
    /// ```rust
    /// use edfcodec::{EdfDocument, EdfHeader, SignalParam};
    /// use chrono::{NaiveDate, NaiveTime};
    ///
    /// let header = EdfHeader {
    ///     version: "0".to_string(),
    ///     patient_id: "X X X X".to_string(),
    ///     recording_id: "Startdate X X X X".to_string(),
    ///     start_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
    ///     start_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
    ///     header_bytes: 0,
    ///     reserved: String::new(),
    ///     datarecords_in_file: 2,
    ///     datarecord_duration: 1.0,
    ///     signals: vec![SignalParam {
    ///         label: "ECG".to_string(),
    ///         physical_dimension: "mV".to_string(),
    ///         physical_min: -5.0,
    ///         physical_max: 5.0,
    ///         samples_per_record: 4,
    ///         ..SignalParam::default()
    ///     }],
    /// };
    /// let document = EdfDocument::new(header, vec![vec![0.0, 1.0, 2.0, 1.0, 0.0, -1.0, -2.0, -1.0]])?;
    /// assert_eq!(document.header().header_bytes, 512);
    ///
    /// let too_short = EdfDocument::new(document.header().clone(), vec![vec![0.0; 3]]);
    /// assert!(too_short.is_err());
    /// # Ok::<(), edfcodec::EdfError>(())
    /// ```
    pub fn new(header: EdfHeader, samples: Vec<Vec<f64>>) -> Result<Self> {
        let count = header.signals.len();
        if count == 0 || count > EDFLIB_MAXSIGNALS {
            return Err(EdfError::InvalidField {
                field: "number of signals",
                reason: format!("{} is outside 1..={}", count, EDFLIB_MAXSIGNALS),
            });
        }
        if samples.len() != count {
            return Err(EdfError::InvalidField {
                field: "signals",
                reason: format!("{} sample vectors for {} signals", samples.len(), count),
            });
        }
        if header.datarecords_in_file == 0 {
            return Err(EdfError::InvalidField {
                field: "number of data records",
                reason: "must be positive".to_string(),
            });
        }
        if !(header.datarecord_duration.is_finite() && header.datarecord_duration > 0.0) {
            return Err(EdfError::InvalidRecordDuration(header.datarecord_duration));
        }

        for (i, signal) in header.signals.iter().enumerate() {
            if signal.samples_per_record == 0 {
                return Err(EdfError::InvalidSampleRate { signal: i, rate: 0.0 });
            }
            if signal.digital_min < EDF_DIGITAL_MIN
                || signal.digital_max > EDF_DIGITAL_MAX
                || signal.digital_max <= signal.digital_min
            {
                return Err(EdfError::InvalidField {
                    field: "digital range",
                    reason: format!(
                        "signal {}: {}..{} is not an increasing 16-bit range",
                        i, signal.digital_min, signal.digital_max
                    ),
                });
            }
            if !(signal.physical_max > signal.physical_min) {
                return Err(EdfError::InvertedRange {
                    signal: i,
                    min: signal.physical_min,
                    max: signal.physical_max,
                });
            }
            let expected = signal.samples_per_record * header.datarecords_in_file;
            if samples[i].len() != expected {
                return Err(EdfError::SampleCountMismatch {
                    signal: i,
                    expected,
                    actual: samples[i].len(),
                });
            }
        }

        let header = normalize_header(&header)?;
        // 归一化后物理范围仍需有效
        for (i, signal) in header.signals.iter().enumerate() {
            if signal.physical_max <= signal.physical_min {
                return Err(EdfError::InvertedRange {
                    signal: i,
                    min: signal.physical_min,
                    max: signal.physical_max,
                });
            }
        }

        Ok(EdfDocument { header, samples })
    }

    /// 解码器使用：头部和样本已经一致
    pub(crate) fn from_decoded(mut header: EdfHeader, samples: Vec<Vec<f64>>) -> Self {
        header.header_bytes = EDF_HEADER_SIZE + header.signals.len() * EDF_SIGNAL_HEADER_SIZE;
        EdfDocument { header, samples }
    }

    pub fn header(&self) -> &EdfHeader {
        &self.header
    }

    pub fn signal_count(&self) -> usize {
        self.header.signals.len()
    }

    pub fn signals(&self) -> &[SignalParam] {
        &self.header.signals
    }

    pub fn signal(&self, signal: usize) -> Result<&SignalParam> {
        self.check_signal(signal)?;
        Ok(&self.header.signals[signal])
    }

    /// Physical samples of one signal, in chronological order.
    ///
    /// Degenerate signals hold raw digital values instead.
    pub fn samples(&self, signal: usize) -> Result<&[f64]> {
        self.check_signal(signal)?;
        Ok(&self.samples[signal])
    }

    /// Sampling frequency of a signal in Hz
    pub fn sample_rate(&self, signal: usize) -> Result<f64> {
        Ok(self.signal(signal)?.sample_rate(self.header.datarecord_duration))
    }

    /// Seconds since recording start of sample `index` of `signal`
    pub fn time_of(&self, signal: usize, index: usize) -> Result<f64> {
        let len = self.samples(signal)?.len();
        if index >= len {
            return Err(EdfError::IndexOutOfRange { what: "sample", index, len });
        }
        Ok(index as f64 / self.sample_rate(signal)?)
    }

    /// Index of the sample of `signal` closest to `seconds`, clamped to the
    /// recording.
    pub fn sample_index_at(&self, signal: usize, seconds: f64) -> Result<usize> {
        let len = self.samples(signal)?.len();
        let index = (seconds * self.sample_rate(signal)?).round();
        if index.is_nan() || index <= 0.0 {
            return Ok(0);
        }
        Ok((index as usize).min(len - 1))
    }

    /// Total recording length in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.header.duration_seconds()
    }

    /// Diagnostics that do not prevent encoding.
    ///
    /// Reports every signal with a degenerate scaling range and every signal
    /// holding samples outside its physical range (those clamp on encode).
    pub fn warnings(&self) -> Vec<SignalWarning> {
        let mut warnings = Vec::new();
        for (i, signal) in self.header.signals.iter().enumerate() {
            if let Some(kind) = signal.degenerate_range() {
                warnings.push(SignalWarning::DegenerateRange {
                    signal: i,
                    label: signal.label.clone(),
                    kind,
                });
                continue;
            }

            let mut outside = self.samples[i]
                .iter()
                .enumerate()
                .filter(|(_, v)| !signal.contains_physical(**v));
            if let Some((first_index, _)) = outside.next() {
                warnings.push(SignalWarning::OutOfPhysicalRange {
                    signal: i,
                    count: 1 + outside.count(),
                    first_index,
                });
            }
        }
        warnings
    }

    pub fn set_patient_id(&mut self, patient_id: &str) -> Result<()> {
        check_text_field("patient identification", patient_id, 80)?;
        self.header.patient_id = patient_id.to_string();
        Ok(())
    }

    pub fn set_recording_id(&mut self, recording_id: &str) -> Result<()> {
        check_text_field("recording identification", recording_id, 80)?;
        self.header.recording_id = recording_id.to_string();
        Ok(())
    }

    /// Sets the recording start; sub-second precision is dropped.
    ///
    /// # Errors
    ///
    /// * `EdfError::InvalidField` - year outside 1985..=2084 (not storable
    ///   as a two-digit EDF year)
    pub fn set_start_datetime(&mut self, start: NaiveDateTime) -> Result<()> {
        if !(1985..=2084).contains(&start.year()) {
            return Err(EdfError::InvalidField {
                field: "start date",
                reason: format!("year {} cannot be stored as a two-digit EDF year", start.year()),
            });
        }
        self.header.start_date = start.date();
        self.header.start_time = start.time().with_nanosecond(0).unwrap_or(start.time());
        Ok(())
    }

    /// Changes the duration of one data record.
    ///
    /// Sample counts stay the same, so every signal's sample rate scales
    /// inversely.
    ///
    /// # Errors
    ///
    /// * `EdfError::InvalidRecordDuration` - not finite and positive, or not
    ///   representable in the 8-character field
    pub fn set_datarecord_duration(&mut self, seconds: f64) -> Result<()> {
        let duration = normalize_number(seconds, 8)
            .filter(|d| *d > 0.0)
            .ok_or(EdfError::InvalidRecordDuration(seconds))?;
        self.header.datarecord_duration = duration;
        Ok(())
    }

    pub fn set_signal_label(&mut self, signal: usize, label: &str) -> Result<()> {
        self.check_signal(signal)?;
        check_text_field("label", label, 16)?;
        self.header.signals[signal].label = label.to_string();
        Ok(())
    }

    pub fn set_transducer(&mut self, signal: usize, transducer: &str) -> Result<()> {
        self.check_signal(signal)?;
        check_text_field("transducer type", transducer, 80)?;
        self.header.signals[signal].transducer = transducer.to_string();
        Ok(())
    }

    pub fn set_physical_dimension(&mut self, signal: usize, dimension: &str) -> Result<()> {
        self.check_signal(signal)?;
        check_text_field("physical dimension", dimension, 8)?;
        self.header.signals[signal].physical_dimension = dimension.to_string();
        Ok(())
    }

    pub fn set_prefilter(&mut self, signal: usize, prefilter: &str) -> Result<()> {
        self.check_signal(signal)?;
        check_text_field("prefiltering", prefilter, 80)?;
        self.header.signals[signal].prefilter = prefilter.to_string();
        Ok(())
    }

    /// Changes a signal's sampling frequency.
    ///
    /// The new `samples_per_record` is `rate_hz * datarecord_duration`, which
    /// must come out as a positive integer. The signal's samples are
    /// linearly resampled so its sample count keeps matching the record
    /// layout.
    ///
    /// # Errors
    ///
    /// * `EdfError::IndexOutOfRange` - no such signal
    /// * `EdfError::InvalidSampleRate` - rate not finite and positive, not
    ///   giving an integer sample count, or set on an annotation signal
    ///
    /// # Examples
    ///
    /// ```rust
    /// # let bytes = edfcodec::doctest_utils::simple_edf_bytes()?;
    /// let mut document = edfcodec::decode(&bytes)?;
    /// let before = document.samples(0)?.len();
    ///
    /// // 1 s records: 128 Hz means 128 samples per record
    /// document.set_sample_rate(0, 128.0)?;
    /// assert_eq!(document.signal(0)?.samples_per_record, 128);
    /// assert_eq!(document.samples(0)?.len(), before / 2);
    ///
    /// assert!(document.set_sample_rate(0, 100.5).is_err());
    /// # Ok::<(), edfcodec::EdfError>(())
    /// ```
    pub fn set_sample_rate(&mut self, signal: usize, rate_hz: f64) -> Result<()> {
        self.check_signal(signal)?;
        let invalid = || EdfError::InvalidSampleRate { signal, rate: rate_hz };
        if !(rate_hz.is_finite() && rate_hz > 0.0) || self.header.signals[signal].is_annotation() {
            return Err(invalid());
        }

        let exact = rate_hz * self.header.datarecord_duration;
        let rounded = exact.round();
        if rounded < 1.0
            || (exact - rounded).abs() > SAMPLE_RATE_TOLERANCE * rounded.max(1.0)
            || rounded >= 1e8
        {
            return Err(invalid());
        }

        let new_per_record = rounded as usize;
        let old_per_record = self.header.signals[signal].samples_per_record;
        if new_per_record == old_per_record {
            return Ok(());
        }

        let new_len = new_per_record * self.header.datarecords_in_file;
        self.samples[signal] = resample_linear(&self.samples[signal], new_len);
        self.header.signals[signal].samples_per_record = new_per_record;
        debug!(
            "signal {} resampled from {} to {} samples per record",
            signal, old_per_record, new_per_record
        );
        Ok(())
    }

    /// Replaces one sample with a physical value.
    ///
    /// The value is stored as given; values outside the physical range are
    /// reported by [`EdfDocument::warnings`] and clamp when encoded.
    ///
    /// # Errors
    ///
    /// * `EdfError::IndexOutOfRange` - no such signal or sample
    /// * `EdfError::InvalidField` - value is NaN or infinite
    pub fn set_sample(&mut self, signal: usize, index: usize, value: f64) -> Result<()> {
        self.check_signal(signal)?;
        let len = self.samples[signal].len();
        if index >= len {
            return Err(EdfError::IndexOutOfRange { what: "sample", index, len });
        }
        if !value.is_finite() {
            return Err(EdfError::InvalidField {
                field: "sample",
                reason: format!("{} is not a finite number", value),
            });
        }
        self.samples[signal][index] = value;
        Ok(())
    }

    /// Replaces every sample of a signal at once.
    ///
    /// # Errors
    ///
    /// * `EdfError::IndexOutOfRange` - no such signal
    /// * `EdfError::SampleCountMismatch` - wrong number of samples
    /// * `EdfError::InvalidField` - a value is NaN or infinite
    pub fn replace_samples(&mut self, signal: usize, samples: Vec<f64>) -> Result<()> {
        self.check_signal(signal)?;
        let expected = self.samples[signal].len();
        if samples.len() != expected {
            return Err(EdfError::SampleCountMismatch {
                signal,
                expected,
                actual: samples.len(),
            });
        }
        if let Some(value) = samples.iter().find(|v| !v.is_finite()) {
            return Err(EdfError::InvalidField {
                field: "sample",
                reason: format!("{} is not a finite number", value),
            });
        }
        self.samples[signal] = samples;
        Ok(())
    }

    /// Changes a signal's physical range.
    ///
    /// Samples are kept as they are, so they now quantize against the new
    /// range. A signal decoded with a degenerate physical range holds raw
    /// digital values; once it gets a usable range those are converted to
    /// physical values.
    ///
    /// # Errors
    ///
    /// * `EdfError::IndexOutOfRange` - no such signal
    /// * `EdfError::InvertedRange` - `max <= min` or either is not finite
    /// * `EdfError::InvalidField` - a bound does not fit in 8 characters
    pub fn set_physical_range(&mut self, signal: usize, min: f64, max: f64) -> Result<()> {
        self.check_signal(signal)?;
        let inverted = || EdfError::InvertedRange { signal, min, max };
        if !(min.is_finite() && max.is_finite()) || max <= min {
            return Err(inverted());
        }
        let too_wide = |field: &'static str, value: f64| EdfError::InvalidField {
            field,
            reason: format!("{} does not fit in 8 characters", value),
        };
        let new_min = normalize_number(min, 8).ok_or_else(|| too_wide("physical minimum", min))?;
        let new_max = normalize_number(max, 8).ok_or_else(|| too_wide("physical maximum", max))?;
        if new_max <= new_min {
            return Err(inverted());
        }

        let param = &mut self.header.signals[signal];
        let held_digital = param.degenerate_range() == Some(crate::error::RangeKind::Physical);
        param.physical_min = new_min;
        param.physical_max = new_max;

        if held_digital {
            let param = &self.header.signals[signal];
            for value in self.samples[signal].iter_mut() {
                *value = param.to_physical(param.clamp_digital(value.round() as i32));
            }
            debug!("signal {} converted from digital to physical values", signal);
        }
        Ok(())
    }

    fn check_signal(&self, signal: usize) -> Result<()> {
        let len = self.header.signals.len();
        if signal >= len {
            return Err(EdfError::IndexOutOfRange { what: "signal", index: signal, len });
        }
        Ok(())
    }
}

/// Linear interpolation of `samples` onto `new_len` evenly spaced points
/// covering the same time span.
fn resample_linear(samples: &[f64], new_len: usize) -> Vec<f64> {
    if samples.is_empty() {
        return vec![0.0; new_len];
    }
    let step = samples.len() as f64 / new_len as f64;
    let last = samples.len() - 1;
    (0..new_len)
        .map(|j| {
            let pos = j as f64 * step;
            let i = (pos.floor() as usize).min(last);
            let frac = pos - i as f64;
            let next = samples[(i + 1).min(last)];
            samples[i] + (next - samples[i]) * frac
        })
        .collect()
}

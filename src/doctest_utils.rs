// Internal utilities for documentation tests
// This file contains helper functions to build EDF buffers for doctests

use chrono::{NaiveDate, NaiveTime};

use crate::{encode, EdfDocument, EdfHeader, Result, SignalParam};

fn header(signals: Vec<SignalParam>, records: usize) -> EdfHeader {
    EdfHeader {
        version: "0".to_string(),
        patient_id: "DOC001 M 01-JAN-1990 Test_Patient".to_string(),
        recording_id: "Startdate 01-JAN-2024 X X X".to_string(),
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        header_bytes: 0,
        reserved: String::new(),
        datarecords_in_file: records,
        datarecord_duration: 1.0,
        signals,
    }
}

fn sine(rate: usize, seconds: usize, freq: f64, amplitude: f64) -> Vec<f64> {
    (0..rate * seconds)
        .map(|i| {
            let t = i as f64 / rate as f64;
            amplitude * (2.0 * std::f64::consts::PI * freq * t).sin()
        })
        .collect()
}

/// A one-signal document: 2 s of a 10 Hz sine at 256 Hz
pub fn simple_document() -> Result<EdfDocument> {
    let signal = SignalParam {
        label: "EEG Fp1".to_string(),
        transducer: "AgAgCl cup electrodes".to_string(),
        physical_dimension: "uV".to_string(),
        physical_min: -200.0,
        physical_max: 200.0,
        digital_min: -32768,
        digital_max: 32767,
        prefilter: "HP:0.1Hz LP:70Hz".to_string(),
        samples_per_record: 256,
        reserved: String::new(),
    };
    EdfDocument::new(header(vec![signal], 2), vec![sine(256, 2, 10.0, 50.0)])
}

/// Encoded form of [`simple_document`]
pub fn simple_edf_bytes() -> Result<Vec<u8>> {
    encode(&simple_document()?)
}

/// An EEG channel and a slower ECG channel over 3 s
pub fn multi_channel_edf_bytes() -> Result<Vec<u8>> {
    let eeg = SignalParam {
        label: "EEG C3".to_string(),
        transducer: "AgAgCl electrodes".to_string(),
        physical_dimension: "uV".to_string(),
        physical_min: -200.0,
        physical_max: 200.0,
        prefilter: "HP:0.1Hz LP:70Hz".to_string(),
        samples_per_record: 256,
        ..SignalParam::default()
    };
    let ecg = SignalParam {
        label: "ECG".to_string(),
        transducer: "Chest electrodes".to_string(),
        physical_dimension: "mV".to_string(),
        physical_min: -5.0,
        physical_max: 5.0,
        prefilter: "HP:0.5Hz LP:40Hz".to_string(),
        samples_per_record: 100,
        ..SignalParam::default()
    };
    let document = EdfDocument::new(
        header(vec![eeg, ecg], 3),
        vec![sine(256, 3, 10.0, 80.0), sine(100, 3, 1.2, 2.0)],
    )?;
    encode(&document)
}

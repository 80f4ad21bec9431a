use chrono::{NaiveDate, NaiveTime};
use edfcodec::{decode, encode, EdfDocument, EdfError, EdfHeader, SignalParam, SignalWarning};

fn create_document() -> EdfDocument {
    let header = EdfHeader {
        version: "0".to_string(),
        patient_id: "P001 M 01-JAN-1990 Test_Patient".to_string(),
        recording_id: "Startdate 15-MAR-2023 X X X".to_string(),
        start_date: NaiveDate::from_ymd_opt(2023, 3, 15).unwrap(),
        start_time: NaiveTime::from_hms_opt(10, 20, 30).unwrap(),
        header_bytes: 0,
        reserved: String::new(),
        datarecords_in_file: 4,
        datarecord_duration: 1.0,
        signals: vec![
            SignalParam {
                label: "EEG Fp1".to_string(),
                physical_dimension: "uV".to_string(),
                physical_min: -200.0,
                physical_max: 200.0,
                samples_per_record: 8,
                ..SignalParam::default()
            },
            SignalParam {
                label: "Resp".to_string(),
                physical_dimension: "a.u.".to_string(),
                physical_min: 0.0,
                physical_max: 10.0,
                digital_min: 0,
                digital_max: 1000,
                samples_per_record: 2,
                ..SignalParam::default()
            },
        ],
    };
    let eeg = (0..32).map(|i| (i as f64 - 16.0) * 10.0).collect();
    let resp = (0..8).map(|i| i as f64).collect();
    EdfDocument::new(header, vec![eeg, resp]).unwrap()
}

fn round_trip(document: &EdfDocument) -> EdfDocument {
    decode(&encode(document).unwrap()).unwrap()
}

#[test]
fn test_signal_label_persists() {
    let mut document = create_document();
    document.set_signal_label(1, "Resp Thorax").unwrap();

    let reread = round_trip(&document);
    assert_eq!(reread.signal(1).unwrap().label, "Resp Thorax");
    assert_eq!(reread.signal(0).unwrap().label, "EEG Fp1");
}

#[test]
fn test_signal_label_rejects_invalid_text() {
    let mut document = create_document();
    assert!(matches!(
        document.set_signal_label(0, "a label longer than 16"),
        Err(EdfError::InvalidField { field: "label", .. })
    ));
    assert!(document.set_signal_label(0, "tab\there").is_err());
    assert!(matches!(
        document.set_signal_label(2, "X"),
        Err(EdfError::IndexOutOfRange { what: "signal", index: 2, len: 2 })
    ));
    assert_eq!(document.signal(0).unwrap().label, "EEG Fp1");
}

#[test]
fn test_sample_rate_change_persists() {
    let mut document = create_document();
    document.set_sample_rate(0, 4.0).unwrap();
    assert_eq!(document.sample_rate(0).unwrap(), 4.0);
    assert_eq!(document.samples(0).unwrap().len(), 16);

    let reread = round_trip(&document);
    assert_eq!(reread.signal(0).unwrap().samples_per_record, 4);
    assert_eq!(reread.sample_rate(0).unwrap(), 4.0);
    // 另一个信号不受影响
    assert_eq!(reread.samples(1).unwrap().len(), 8);
}

#[test]
fn test_sample_rate_must_give_integer_samples_per_record() {
    let mut document = create_document();
    document.set_datarecord_duration(0.5).unwrap();
    assert_eq!(document.sample_rate(0).unwrap(), 16.0);

    // 0.5 s 记录下 3 Hz 得到 1.5 个样本
    assert!(matches!(
        document.set_sample_rate(1, 3.0),
        Err(EdfError::InvalidSampleRate { signal: 1, .. })
    ));
    document.set_sample_rate(1, 8.0).unwrap();
    assert_eq!(document.signal(1).unwrap().samples_per_record, 4);
    assert_eq!(document.samples(1).unwrap().len(), 16);
}

#[test]
fn test_set_sample_persists_within_quantization() {
    let mut document = create_document();
    document.set_sample(0, 5, 123.456).unwrap();
    document.set_sample(1, 7, 2.5).unwrap();

    let reread = round_trip(&document);
    let step = reread.signal(0).unwrap().quantization_step();
    assert!((reread.samples(0).unwrap()[5] - 123.456).abs() <= step / 2.0 + 1e-9);
    assert!((reread.samples(1).unwrap()[7] - 2.5).abs() <= 0.005 + 1e-9);
}

#[test]
fn test_set_sample_out_of_range_clamps_on_encode() {
    let mut document = create_document();
    document.set_sample(1, 0, 50.0).unwrap();
    assert_eq!(
        document.warnings(),
        vec![SignalWarning::OutOfPhysicalRange { signal: 1, count: 1, first_index: 0 }]
    );

    let reread = round_trip(&document);
    assert_eq!(reread.samples(1).unwrap()[0], 10.0);
    assert!(reread.warnings().is_empty());
}

#[test]
fn test_physical_range_change_requantizes() {
    let mut document = create_document();
    document.set_physical_range(0, -100.0, 100.0).unwrap();
    // 原来 ±160 的样本超出新范围
    assert!(!document.warnings().is_empty());

    let reread = round_trip(&document);
    let signal = reread.signal(0).unwrap();
    assert_eq!((signal.physical_min, signal.physical_max), (-100.0, 100.0));
    let samples = reread.samples(0).unwrap();
    assert_eq!(samples[0], -100.0);
    let step = signal.quantization_step();
    assert!((samples[20] - 40.0).abs() <= step / 2.0 + 1e-9);
}

#[test]
fn test_physical_range_rejects_inverted() {
    let mut document = create_document();
    match document.set_physical_range(0, 50.0, -50.0) {
        Err(EdfError::InvertedRange { signal, min, max }) => {
            assert_eq!((signal, min, max), (0, 50.0, -50.0));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(document.set_physical_range(0, 1.0, 1.0).is_err());
    assert!(document.set_physical_range(0, f64::NEG_INFINITY, 1.0).is_err());
    assert_eq!(document.signal(0).unwrap().physical_max, 200.0);
}

#[test]
fn test_header_fields_persist() {
    let mut document = create_document();
    document.set_patient_id("P777 F 24-DEC-1970 Someone_Else").unwrap();
    document.set_recording_id("Startdate 01-JUN-2031 R-9 Tech Device").unwrap();
    let start = NaiveDate::from_ymd_opt(2031, 6, 1).unwrap().and_hms_opt(7, 8, 9).unwrap();
    document.set_start_datetime(start).unwrap();
    document.set_transducer(0, "Gold cup").unwrap();
    document.set_physical_dimension(1, "mmHg").unwrap();
    document.set_prefilter(0, "HP:0.3Hz LP:35Hz N:50Hz").unwrap();
    document.set_datarecord_duration(2.0).unwrap();

    let reread = round_trip(&document);
    let header = reread.header();
    assert_eq!(header.patient_id, "P777 F 24-DEC-1970 Someone_Else");
    assert_eq!(header.recording_id, "Startdate 01-JUN-2031 R-9 Tech Device");
    assert_eq!(header.start_datetime(), start);
    assert_eq!(header.datarecord_duration, 2.0);
    assert_eq!(header.signals[0].transducer, "Gold cup");
    assert_eq!(header.signals[1].physical_dimension, "mmHg");
    assert_eq!(header.signals[0].prefilter, "HP:0.3Hz LP:35Hz N:50Hz");
    assert_eq!(reread.duration_seconds(), 8.0);
    assert_eq!(reread.sample_rate(0).unwrap(), 4.0);
}

#[test]
fn test_start_datetime_outside_two_digit_years() {
    let mut document = create_document();
    let start = NaiveDate::from_ymd_opt(2090, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    assert!(matches!(
        document.set_start_datetime(start),
        Err(EdfError::InvalidField { field: "start date", .. })
    ));
    assert_eq!(document.header().start_date, NaiveDate::from_ymd_opt(2023, 3, 15).unwrap());
}

#[test]
fn test_replace_samples_and_time_lookup() {
    let mut document = create_document();
    let ramp: Vec<f64> = (0..8).map(|i| i as f64 * 1.25).collect();
    document.replace_samples(1, ramp.clone()).unwrap();
    assert_eq!(document.samples(1).unwrap(), ramp.as_slice());

    assert!(matches!(
        document.replace_samples(1, vec![0.0; 9]),
        Err(EdfError::SampleCountMismatch { signal: 1, expected: 8, actual: 9 })
    ));

    // 2 Hz: 第 3 个样本位于 1.5 s
    assert_eq!(document.time_of(1, 3).unwrap(), 1.5);
    assert_eq!(document.sample_index_at(1, 1.5).unwrap(), 3);
    assert_eq!(document.sample_index_at(0, 1.5).unwrap(), 12);
}

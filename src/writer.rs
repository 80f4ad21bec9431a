use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, warn};

use crate::document::EdfDocument;
use crate::error::{EdfError, Result};
use crate::header::{normalize_header, write_header};
use crate::EDF_SAMPLE_BYTES;

/// Encodes a document into a complete EDF byte buffer.
///
/// The header is re-serialized from the document (with the header byte
/// count recomputed), followed by the data records. Each record holds, for
/// every signal in order, that signal's `samples_per_record` samples for the
/// record's time slice, quantized with
///
/// ```text
/// digital = digital_min + round((physical - physical_min) * (digital_max - digital_min)
///                               / (physical_max - physical_min))
/// ```
///
/// clamped to `[digital_min, digital_max]` and written as little-endian
/// 16-bit integers. Samples of a degenerate signal are raw digital values
/// and are only rounded and clamped.
///
/// Every sample count is checked before anything is written, so a failed
/// encode produces no output at all.
///
/// # Errors
///
/// * `EdfError::SampleCountMismatch` - a signal holds the wrong number of samples
/// * `EdfError::InvalidField` / `EdfError::InvalidRecordDuration` - a header
///   field cannot be stored in its fixed-width slot
///
/// # Examples
///
/// ```rust
/// use edfcodec::{decode, encode};
///
/// # let bytes = edfcodec::doctest_utils::simple_edf_bytes()?;
/// let document = decode(&bytes)?;
/// let encoded = encode(&document)?;
///
/// // Same structure: header plus the same number of data bytes
/// assert_eq!(encoded.len(), bytes.len());
///
/// // Physical values survive within half a quantization step
/// let reread = decode(&encoded)?;
/// let step = document.signal(0)?.quantization_step();
/// for (a, b) in document.samples(0)?.iter().zip(reread.samples(0)?) {
///     assert!((a - b).abs() <= step / 2.0 + 1e-9);
/// }
/// # Ok::<(), edfcodec::EdfError>(())
/// ```
pub fn encode_document(document: &EdfDocument) -> Result<Vec<u8>> {
    let records = document.header.datarecords_in_file;

    // 先检查全部信号，避免部分输出
    for (i, (signal, samples)) in document
        .header
        .signals
        .iter()
        .zip(&document.samples)
        .enumerate()
    {
        let expected = signal.samples_per_record * records;
        if samples.len() != expected {
            return Err(EdfError::SampleCountMismatch {
                signal: i,
                expected,
                actual: samples.len(),
            });
        }
    }
    if document.samples.len() != document.header.signals.len() {
        let signal = document.samples.len().min(document.header.signals.len());
        return Err(EdfError::SampleCountMismatch {
            signal,
            expected: document.header.samples_in_file(signal).unwrap_or(0),
            actual: document.samples.get(signal).map_or(0, Vec::len),
        });
    }

    // 量化使用写入头部后的数值，保证解码时比例一致
    let header = normalize_header(&document.header)?;
    let header_block = write_header(&header)?;
    let data_size = header.data_size();

    let mut out = Vec::with_capacity(header_block.len() + data_size);
    out.extend_from_slice(&header_block);
    out.resize(header_block.len() + data_size, 0);

    let mut pos = header_block.len();
    let mut digital = Vec::new();
    let mut clamped = vec![0usize; header.signals.len()];

    for record in 0..records {
        for (i, signal) in header.signals.iter().enumerate() {
            let per_record = signal.samples_per_record;
            let chunk = &document.samples[i][record * per_record..(record + 1) * per_record];
            let degenerate = signal.is_degenerate();

            digital.clear();
            for &value in chunk {
                let raw = if degenerate {
                    value.round() as i32
                } else {
                    signal.to_digital(value)
                };
                let d = signal.clamp_digital(raw);
                if d != raw {
                    clamped[i] += 1;
                }
                digital.push(d as i16);
            }

            let len = per_record * EDF_SAMPLE_BYTES;
            LittleEndian::write_i16_into(&digital, &mut out[pos..pos + len]);
            pos += len;
        }
    }

    for (i, count) in clamped.iter().enumerate().filter(|(_, c)| **c > 0) {
        warn!(
            "signal {} ({}): {} samples outside the range were clamped",
            i, header.signals[i].label, count
        );
    }
    debug!(
        "encoded {} data records, {} signals, {} bytes",
        records,
        header.signals.len(),
        out.len()
    );

    Ok(out)
}

/// Encodes a document and writes it to `path`.
///
/// The file is only created once encoding has succeeded.
///
/// # Errors
///
/// * `EdfError::FileNotFound` - the file cannot be created
/// * `EdfError::Io` - writing failed
/// * everything [`encode_document`] can return
///
/// # Examples
///
/// ```rust
/// use edfcodec::reader::read_file;
/// use edfcodec::writer::write_file;
///
/// # let bytes = edfcodec::doctest_utils::simple_edf_bytes()?;
/// let mut document = edfcodec::decode(&bytes)?;
/// document.set_patient_id("P042 F 12-AUG-1975 Jane_Doe")?;
///
/// write_file("edited.edf", &document)?;
/// let reread = read_file("edited.edf")?;
/// assert_eq!(reread.header().patient_id, "P042 F 12-AUG-1975 Jane_Doe");
///
/// # std::fs::remove_file("edited.edf").ok();
/// # Ok::<(), edfcodec::EdfError>(())
/// ```
pub fn write_file<P: AsRef<Path>>(path: P, document: &EdfDocument) -> Result<()> {
    let bytes = encode_document(document)?;

    let file = File::create(&path)
        .map_err(|e| EdfError::FileNotFound(format!("{}: {}", path.as_ref().display(), e)))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&bytes)?;
    writer.flush()?;

    debug!("wrote {} bytes to {}", bytes.len(), path.as_ref().display());
    Ok(())
}

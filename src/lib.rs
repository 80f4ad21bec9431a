//! # EDF codec for Rust
//!
//! An in-memory reader/writer for EDF (European Data Format) recordings,
//! with an editable document model.
//!
//! The codec is stateless: [`decode`] turns a byte buffer into an
//! [`EdfDocument`], [`encode`] turns a document back into bytes. Getting the
//! bytes from disk, a network or a browser upload is up to the caller
//! ([`reader::read_file`] and [`writer::write_file`] cover the common file
//! case).
//!
//! ## Quick Start
//!
//! ### Decoding a recording
//!
//! ```rust
//! use edfcodec::{decode, Result};
//!
//! fn main() -> Result<()> {
//!     # let bytes = edfcodec::doctest_utils::multi_channel_edf_bytes()?;
//!     // `bytes` holds a complete EDF file
//!     let document = decode(&bytes)?;
//!
//!     let header = document.header();
//!     println!("Patient: {}", header.patient_id);
//!     println!("Start: {}", header.start_datetime());
//!     println!("Duration: {:.1} s", document.duration_seconds());
//!
//!     for (i, signal) in document.signals().iter().enumerate() {
//!         let samples = document.samples(i)?;
//!         println!("{}: {} samples at {} Hz in {}",
//!             signal.label, samples.len(), document.sample_rate(i)?, signal.physical_dimension);
//!     }
//!
//!     // Non-fatal problems, e.g. a channel whose scaling range is degenerate
//!     for warning in document.warnings() {
//!         eprintln!("warning: {}", warning);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### Editing and re-encoding
//!
//! ```rust
//! use edfcodec::{decode, encode, Result};
//!
//! fn main() -> Result<()> {
//!     # let bytes = edfcodec::doctest_utils::multi_channel_edf_bytes()?;
//!     let mut document = decode(&bytes)?;
//!
//!     document.set_signal_label(1, "ECG Lead II")?;
//!     document.set_physical_range(1, -2.5, 2.5)?;
//!
//!     // Remove an artifact at t = 1.5 s
//!     let index = document.sample_index_at(0, 1.5)?;
//!     document.set_sample(0, index, 0.0)?;
//!
//!     let edited = encode(&document)?;
//!     assert_eq!(decode(&edited)?.signal(1)?.label, "ECG Lead II");
//!     Ok(())
//! }
//! ```
//!
//! ## Physical vs Digital Values
//!
//! EDF stores samples as 16-bit integers. Each signal declares a digital and a
//! physical range and values are mapped linearly between them:
//!
//! ```rust
//! use edfcodec::SignalParam;
//!
//! let signal = SignalParam {
//!     label: "Test Signal".to_string(),
//!     physical_max: 100.0,   // +100 µV
//!     physical_min: -100.0,  // -100 µV
//!     digital_max: 32767,
//!     digital_min: -32768,
//!     samples_per_record: 256,
//!     physical_dimension: "uV".to_string(),
//!     ..SignalParam::default()
//! };
//!
//! let physical_value = signal.to_physical(16384);
//! assert!((physical_value - 50.0).abs() < 0.1);
//!
//! let digital_output = signal.to_digital(25.0);
//! assert!((digital_output - 8192).abs() <= 1);
//!
//! // A digital value survives a round trip exactly
//! assert_eq!(signal.to_digital(signal.to_physical(1234)), 1234);
//! ```
//!
//! ## Logging
//!
//! The crate logs through the [`log`](https://docs.rs/log) facade: header
//! summaries at `debug`, clamped samples and degenerate signals at `warn`.
//! Install any logger to see them.

pub mod error;
pub mod types;
pub mod utils;
pub mod header;
pub mod reader;
pub mod writer;
pub mod document;

#[doc(hidden)]
pub mod doctest_utils; // For internal doctest support

// Re-export main types for convenience
pub use error::{EdfError, RangeKind, Result};
pub use types::{EdfHeader, SignalParam, SignalWarning};
pub use document::EdfDocument;

// Important constants
pub const EDF_HEADER_SIZE: usize = 256;
pub const EDF_SIGNAL_HEADER_SIZE: usize = 256;
pub const EDF_SAMPLE_BYTES: usize = 2;
pub const EDF_DIGITAL_MIN: i32 = -32768;
pub const EDF_DIGITAL_MAX: i32 = 32767;
pub const EDFLIB_MAXSIGNALS: usize = 4096;

/// Decodes a complete EDF file held in memory.
///
/// Parses the header, then de-interleaves and scales the data records.
/// See [`header::parse_header`] and [`reader::decode_records`] for the
/// individual stages and their errors.
///
/// # Examples
///
/// ```rust
/// use edfcodec::{decode, EdfError};
///
/// # let bytes = edfcodec::doctest_utils::simple_edf_bytes()?;
/// let document = decode(&bytes)?;
/// assert_eq!(document.signal_count(), 1);
///
/// // A buffer cut inside the header is rejected, never read out of bounds
/// match decode(&bytes[..300]) {
///     Err(EdfError::TruncatedInput { needed, available }) => {
///         assert_eq!((needed, available), (512, 300));
///     }
///     other => panic!("unexpected: {:?}", other),
/// }
/// # Ok::<(), EdfError>(())
/// ```
pub fn decode(bytes: &[u8]) -> Result<EdfDocument> {
    let header = header::parse_header(bytes)?;
    let data_offset = header.header_bytes;
    reader::decode_records(header, &bytes[data_offset..])
}

/// Encodes a document into a complete EDF file.
///
/// See [`writer::encode_document`].
pub fn encode(document: &EdfDocument) -> Result<Vec<u8>> {
    writer::encode_document(document)
}

/// Library version
///
/// Returns the current version of the edfcodec library.
///
/// # Examples
///
/// ```rust
/// let version = edfcodec::version();
/// assert!(version.contains('.'));
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

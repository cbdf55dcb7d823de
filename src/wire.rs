//! Remote write wire format.
//!
//! Bodies are snappy block-compressed protobuf `prometheus.WriteRequest`
//! messages. The message types are declared with prost derives so no
//! `protoc` is needed at build time.
//!
//! ```protobuf
//! message WriteRequest { repeated TimeSeries timeseries = 1; }
//! message TimeSeries   { repeated Label labels = 1; repeated Sample samples = 2; }
//! message Label        { string name = 1; string value = 2; }
//! message Sample       { double value = 1; int64 timestamp = 2; }
//! ```

use bytes::Bytes;
use prost::Message;

use crate::error::ParseError;
use crate::models::{Label, RawSeries, Sample};

/// Default limit on the decompressed size of a single request (32 MiB).
pub const DEFAULT_MAX_DECODED_BYTES: usize = 32 << 20;

/// Top-level remote write message.
#[derive(Clone, PartialEq, Message)]
pub struct WriteRequest {
    #[prost(message, repeated, tag = "1")]
    pub timeseries: Vec<TimeSeries>,
}

/// A single series with its labels and samples.
#[derive(Clone, PartialEq, Message)]
pub struct TimeSeries {
    #[prost(message, repeated, tag = "1")]
    pub labels: Vec<ProtoLabel>,
    #[prost(message, repeated, tag = "2")]
    pub samples: Vec<ProtoSample>,
}

#[derive(Clone, PartialEq, Eq, Hash, Message)]
pub struct ProtoLabel {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoSample {
    #[prost(double, tag = "1")]
    pub value: f64,
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
}

impl From<TimeSeries> for RawSeries {
    fn from(ts: TimeSeries) -> Self {
        let labels = ts.labels.into_iter().map(|l| Label::new(l.name, l.value)).collect();
        let samples = ts.samples.into_iter().map(|s| Sample::new(s.timestamp, s.value)).collect();
        Self::new(labels, samples)
    }
}

/// Decodes request bodies into raw series.
#[derive(Debug, Clone, Copy)]
pub struct WireDecoder {
    max_decoded_bytes: usize,
}

impl Default for WireDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DECODED_BYTES)
    }
}

impl WireDecoder {
    /// Create a decoder rejecting payloads that decompress to more than
    /// `max_decoded_bytes`.
    pub const fn new(max_decoded_bytes: usize) -> Self {
        Self { max_decoded_bytes }
    }

    pub const fn max_decoded_bytes(&self) -> usize {
        self.max_decoded_bytes
    }

    /// Largest compressed body that can still decompress within the limit.
    pub fn max_body_bytes(&self) -> usize {
        match snap::raw::max_compress_len(self.max_decoded_bytes) {
            0 => usize::MAX,
            len => len,
        }
    }

    /// Decode a compressed remote write body.
    ///
    /// # Parameters
    ///
    /// - `body` - Snappy-compressed protobuf `WriteRequest`
    ///
    /// # Returns
    ///
    /// Returns the series in wire order.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if the body is empty, does not decompress, is
    /// larger than the limit once decompressed, is not a valid `WriteRequest`,
    /// or contains no series.
    pub fn decode(&self, body: &[u8]) -> Result<Vec<RawSeries>, ParseError> {
        if body.is_empty() {
            return Err(ParseError::EmptyBody);
        }

        // Checked against the snappy header before anything is allocated.
        let size = snap::raw::decompress_len(body)?;
        if size > self.max_decoded_bytes {
            return Err(ParseError::TooLarge { size, limit: self.max_decoded_bytes });
        }

        let decompressed = snap::raw::Decoder::new().decompress_vec(body)?;
        let request = WriteRequest::decode(decompressed.as_slice())?;

        if request.timeseries.is_empty() {
            return Err(ParseError::NoSeries);
        }

        Ok(request.timeseries.into_iter().map(RawSeries::from).collect())
    }
}

/// Decode a body with the default size limit.
///
/// # Errors
///
/// See [`WireDecoder::decode`].
pub fn decode(body: &[u8]) -> Result<Vec<RawSeries>, ParseError> {
    WireDecoder::default().decode(body)
}

/// Encode a write request as a snappy-compressed protobuf body.
///
/// # Errors
///
/// Returns `snap::Error` if the encoded message is too large to compress.
pub fn encode_write_request(request: &WriteRequest) -> Result<Bytes, snap::Error> {
    let compressed = snap::raw::Encoder::new().compress_vec(&request.encode_to_vec())?;
    Ok(Bytes::from(compressed))
}

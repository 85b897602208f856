use std::io::Read;

use flate2::read::{DeflateDecoder, GzDecoder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::WatchError;

/// Compression applied by the venue to binary frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
    /// Raw deflate stream without zlib header
    Deflate,
}

/// Decode a text frame. Anything that does not look like JSON, or fails to
/// parse as JSON, is passed through as a string.
pub fn decode_text(text: &str) -> Value {
    let trimmed = text.trim_start();
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && let Ok(value) = serde_json::from_str(trimmed)
    {
        return value;
    }
    Value::String(text.to_string())
}

/// Decompress and decode a binary frame
pub fn decode_binary(data: &[u8], compression: Compression) -> Result<Value, WatchError> {
    let bytes = match compression {
        Compression::None => data.to_vec(),
        Compression::Gzip => inflate(GzDecoder::new(data))?,
        Compression::Deflate => inflate(DeflateDecoder::new(data))?,
    };
    let text = String::from_utf8(bytes)
        .map_err(|e| WatchError::Exchange(format!("Binary frame is not UTF-8: {}", e)))?;
    Ok(decode_text(&text))
}

fn inflate(mut decoder: impl Read) -> Result<Vec<u8>, WatchError> {
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| WatchError::Exchange(format!("Failed to inflate frame: {}", e)))?;
    Ok(out)
}

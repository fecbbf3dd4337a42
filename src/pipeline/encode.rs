//! Image encoding: raw document bytes → base64 `ImageData`.
//!
//! VLM APIs accept images as base64 payloads embedded in the JSON request
//! body. The bytes are sent exactly as fetched; only the MIME type comes from
//! the preprocessing sniff. `detail: "high"` keeps fine print legible for
//! GPT-4-class models, which matters for the small digits in item tables.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use tracing::debug;

/// Wrap document bytes for the multimodal request.
pub fn encode_image(bytes: &[u8], mime_type: &str) -> ImageData {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} as {} bytes base64", mime_type, b64.len());
    ImageData::new(b64, mime_type.to_string()).with_detail("high")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_bytes_and_mime() {
        let data = encode_image(b"\x89PNG\r\n\x1a\nrest", "image/png");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(decoded, b"\x89PNG\r\n\x1a\nrest");
    }

    #[test]
    fn keeps_jpeg_mime() {
        let data = encode_image(&[0xFF, 0xD8, 0xFF], "image/jpeg");
        assert_eq!(data.mime_type, "image/jpeg");
    }
}

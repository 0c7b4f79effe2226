//! Conversions between data URLs, [`EncodedImage`] values and upload blobs.
//!
//! A data URL looks like `data:image/png;base64,iVBORw0...`: a MIME-bearing
//! header, a single comma, then the base64 payload.

use base64::{engine::general_purpose, Engine};

use crate::core::errors::MalformedEncodingError;
use crate::core::types::EncodedImage;

/// Raw bytes plus content type, ready for a multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Parse a data URL into an [`EncodedImage`].
///
/// Fails when there is not exactly one comma, when the header has no
/// `:type/subtype;` segment, when the type is not `image/*`, or when the
/// payload is not valid base64.
pub fn decode(source: &str) -> Result<EncodedImage, MalformedEncodingError> {
    let source = source.trim();
    let (header, data) = source
        .split_once(',')
        .ok_or(MalformedEncodingError::BadSeparator)?;
    if data.contains(',') {
        return Err(MalformedEncodingError::BadSeparator);
    }

    let mime_type = parse_mime(header)?;
    if !mime_type.starts_with("image/") {
        return Err(MalformedEncodingError::NotAnImage(mime_type.to_string()));
    }

    let size_bytes = payload_size(data);
    let payload = general_purpose::STANDARD.decode(data)?;

    EncodedImage::with_size(mime_type, payload, size_bytes)
}

/// Render an [`EncodedImage`] back to its data URL form
pub fn encode(image: &EncodedImage) -> String {
    format!(
        "data:{};base64,{}",
        image.mime_type(),
        general_purpose::STANDARD.encode(image.payload())
    )
}

/// Bytes and content type for upload. The image is well-formed by construction.
pub fn to_transferable_blob(image: &EncodedImage) -> TransferBlob {
    TransferBlob {
        bytes: image.payload().to_vec(),
        content_type: image.mime_type().to_string(),
    }
}

/// Decoded byte count of a base64 payload: `floor(len * 3 / 4)` minus trailing padding
pub fn payload_size(data: &str) -> usize {
    let padding = if data.ends_with("==") {
        2
    } else if data.ends_with('=') {
        1
    } else {
        0
    };
    (data.len() * 3 / 4).saturating_sub(padding)
}

/// Extract `type/subtype` from a `scheme:type/subtype;params` header
fn parse_mime(header: &str) -> Result<&str, MalformedEncodingError> {
    let invalid = || MalformedEncodingError::InvalidMimeSegment(header.to_string());

    let (_, rest) = header.split_once(':').ok_or_else(invalid)?;
    let (mime, _) = rest.split_once(';').ok_or_else(invalid)?;

    let (kind, subtype) = mime.split_once('/').ok_or_else(invalid)?;
    let is_token = |s: &str| {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c))
    };
    if !is_token(kind) || !is_token(subtype) {
        return Err(invalid());
    }

    Ok(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_DATA_URL: &str = "data:image/png;base64,iVBORw0KGgo=";

    #[test]
    fn test_decode_data_url() {
        let image = decode(PNG_DATA_URL).unwrap();
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!(image.payload(), &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
        assert_eq!(image.size_bytes(), 8);
    }

    #[test]
    fn test_round_trip() {
        let original = EncodedImage::new("image/jpeg", vec![0xff, 0xd8, 0xff, 0xe0, 0x00]).unwrap();
        assert_eq!(decode(&encode(&original)).unwrap(), original);
    }

    #[test]
    fn test_round_trip_across_types_and_padding() {
        let mime_types = ["image/png", "image/jpeg", "image/webp", "image/gif", "image/svg+xml"];
        for mime_type in mime_types {
            for len in 1..=7usize {
                let payload: Vec<u8> = (0..len).map(|i| (i * 37 + 251) as u8).collect();
                let original = EncodedImage::new(mime_type, payload).unwrap();

                let url = encode(&original);
                let expected_padding = match len % 3 {
                    1 => "==",
                    2 => "=",
                    _ => "",
                };
                let data = url.split_once(',').unwrap().1;
                assert_eq!(
                    data.len() - data.trim_end_matches('=').len(),
                    expected_padding.len(),
                    "{mime_type} len {len}"
                );

                let decoded = decode(&url).unwrap();
                assert_eq!(decoded, original, "{mime_type} len {len}");
                assert_eq!(decoded.mime_type(), mime_type);
                assert_eq!(decoded.size_bytes(), len);
            }
        }
    }

    #[test]
    fn test_rejects_missing_separator() {
        assert!(matches!(
            decode("data:image/png;base64"),
            Err(MalformedEncodingError::BadSeparator)
        ));
        assert!(matches!(
            decode("data:image/png;base64,AAAA,BBBB"),
            Err(MalformedEncodingError::BadSeparator)
        ));
    }

    #[test]
    fn test_rejects_bad_mime_segment() {
        assert!(matches!(
            decode("data:image/png,AAAA"),
            Err(MalformedEncodingError::InvalidMimeSegment(_))
        ));
        assert!(matches!(
            decode("image/png;base64,AAAA"),
            Err(MalformedEncodingError::InvalidMimeSegment(_))
        ));
        assert!(matches!(
            decode("data:png;base64,AAAA"),
            Err(MalformedEncodingError::InvalidMimeSegment(_))
        ));
    }

    #[test]
    fn test_rejects_non_image_mime() {
        match decode("data:text/plain;base64,aGVsbG8=") {
            Err(MalformedEncodingError::NotAnImage(mime)) => assert_eq!(mime, "text/plain"),
            other => panic!("expected NotAnImage, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_base64_and_empty_payload() {
        assert!(matches!(
            decode("data:image/png;base64,@@@@"),
            Err(MalformedEncodingError::InvalidBase64(_))
        ));
        assert!(matches!(
            decode("data:image/png;base64,"),
            Err(MalformedEncodingError::EmptyPayload)
        ));
    }

    #[test]
    fn test_payload_size_accounts_for_padding() {
        let data = format!("{}==", "A".repeat(98));
        assert_eq!(data.len(), 100);
        assert_eq!(payload_size(&data), 73);

        assert_eq!(payload_size(&format!("{}=", "A".repeat(99))), 74);
        assert_eq!(payload_size(&"A".repeat(100)), 75);
    }

    #[test]
    fn test_transferable_blob() {
        let image = decode(PNG_DATA_URL).unwrap();
        let blob = to_transferable_blob(&image);
        assert_eq!(blob.content_type, "image/png");
        assert_eq!(blob.bytes.len(), 8);
    }
}

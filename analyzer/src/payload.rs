//! Image payloads held by the controller.
//!
//! A selected image is kept in displayable form: either a `data:` URL or a
//! transient `blob:` object URL backed by an [`ObjectUrlStore`]. Before
//! upload it is converted back into an [`ImageFile`].

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};

use crate::lock;

/// Edge length of captured photos, matching the model input.
pub const CAPTURE_SIZE: u32 = 224;
pub const CAPTURE_JPEG_QUALITY: u8 = 95;
const DEFAULT_MIME: &str = "image/jpeg";
const OBJECT_URL_PREFIX: &str = "blob:emotion-analyzer/";

#[derive(Debug)]
pub enum ImageError {
    Io(std::io::Error),
    NotAnImage(String),
    InvalidDataUrl(String),
    Base64(base64::DecodeError),
    Revoked(String),
    Encoding(String),
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::Io(err) => write!(f, "failed to read image: {err}"),
            ImageError::NotAnImage(what) => write!(f, "{what} is not a supported image"),
            ImageError::InvalidDataUrl(reason) => write!(f, "invalid data URL: {reason}"),
            ImageError::Base64(err) => write!(f, "invalid base64 payload: {err}"),
            ImageError::Revoked(url) => write!(f, "object URL {url} is no longer available"),
            ImageError::Encoding(err) => write!(f, "failed to encode image: {err}"),
        }
    }
}

impl std::error::Error for ImageError {}

impl From<std::io::Error> for ImageError {
    fn from(value: std::io::Error) -> Self {
        ImageError::Io(value)
    }
}

impl From<base64::DecodeError> for ImageError {
    fn from(value: base64::DecodeError) -> Self {
        ImageError::Base64(value)
    }
}

impl From<image::ImageError> for ImageError {
    fn from(value: image::ImageError) -> Self {
        ImageError::Encoding(value.to_string())
    }
}

/// Image MIME types accepted on the upload path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Bmp => "image/bmp",
        }
    }

    /// Detects the format from magic bytes rather than trusting a file extension.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes).ok()? {
            image::ImageFormat::Png => Some(ImageFormat::Png),
            image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
            image::ImageFormat::Gif => Some(ImageFormat::Gif),
            image::ImageFormat::WebP => Some(ImageFormat::Webp),
            image::ImageFormat::Bmp => Some(ImageFormat::Bmp),
            _ => None,
        }
    }
}

/// Raw bytes plus their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// Registry of transient `blob:` URLs. Every URL handed out stays resolvable
/// until it is revoked.
#[derive(Debug, Default)]
pub struct ObjectUrlStore {
    next_id: AtomicU64,
    blobs: Mutex<HashMap<String, Blob>>,
}

impl ObjectUrlStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, blob: Blob) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let url = format!("{OBJECT_URL_PREFIX}{id}");
        lock(&self.blobs).insert(url.clone(), blob);
        url
    }

    pub fn resolve(&self, url: &str) -> Option<Blob> {
        lock(&self.blobs).get(url).cloned()
    }

    /// Returns true if the URL was live.
    pub fn revoke(&self, url: &str) -> bool {
        lock(&self.blobs).remove(url).is_some()
    }

    pub fn revoke_all(&self) {
        lock(&self.blobs).clear();
    }

    pub fn live_count(&self) -> usize {
        lock(&self.blobs).len()
    }
}

/// Displayable reference to the selected image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    DataUrl(String),
    ObjectUrl(String),
}

impl ImagePayload {
    pub fn as_str(&self) -> &str {
        match self {
            ImagePayload::DataUrl(url) | ImagePayload::ObjectUrl(url) => url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Upload { file_name: String },
    Capture,
    Object,
}

/// The image currently awaiting (or having undergone) analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedImage {
    pub payload: ImagePayload,
    pub source: ImageSource,
}

impl SelectedImage {
    pub fn is_empty(&self) -> bool {
        match &self.payload {
            ImagePayload::DataUrl(url) => url
                .split_once(',')
                .is_none_or(|(_, data)| data.is_empty()),
            ImagePayload::ObjectUrl(url) => url.is_empty(),
        }
    }

    /// Converts the payload into an uploadable file, whatever its representation.
    pub fn to_file(&self, store: &ObjectUrlStore) -> Result<ImageFile, ImageError> {
        let blob = match &self.payload {
            ImagePayload::DataUrl(url) => decode_data_url(url)?,
            ImagePayload::ObjectUrl(url) => store
                .resolve(url)
                .ok_or_else(|| ImageError::Revoked(url.clone()))?,
        };
        let mime = if blob.mime.is_empty() {
            DEFAULT_MIME.to_string()
        } else {
            blob.mime
        };

        Ok(ImageFile {
            file_name: format!("image_{}.jpg", Utc::now().timestamp_millis()),
            mime,
            bytes: blob.bytes,
        })
    }
}

/// Binary form of a selected image, ready for a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

pub fn encode_data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Parses a base64 `data:` URL. A missing media type falls back to `image/jpeg`.
pub fn decode_data_url(url: &str) -> Result<Blob, ImageError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| ImageError::InvalidDataUrl("missing `data:` scheme".into()))?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| ImageError::InvalidDataUrl("missing `,` separator".into()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| ImageError::InvalidDataUrl("only base64 payloads are supported".into()))?;

    let bytes = STANDARD.decode(data.trim())?;
    let mime = if mime.is_empty() { DEFAULT_MIME } else { mime };

    Ok(Blob {
        bytes,
        mime: mime.to_string(),
    })
}

/// Reads a user-chosen file into a data URL payload.
pub fn read_upload(path: &Path) -> Result<SelectedImage, ImageError> {
    let bytes = fs::read(path)?;
    let format = ImageFormat::sniff(&bytes)
        .ok_or_else(|| ImageError::NotAnImage(path.display().to_string()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(SelectedImage {
        payload: ImagePayload::DataUrl(encode_data_url(&bytes, format.mime_type())),
        source: ImageSource::Upload { file_name },
    })
}

/// Draws a frame into the fixed capture buffer and encodes it as a JPEG data URL.
pub fn encode_capture(frame: &RgbaImage) -> Result<SelectedImage, ImageError> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(ImageError::Encoding("frame has no pixels".into()));
    }

    let resized = imageops::resize(frame, CAPTURE_SIZE, CAPTURE_SIZE, FilterType::Triangle);
    let rgb = DynamicImage::ImageRgba8(resized).to_rgb8();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, CAPTURE_JPEG_QUALITY).encode_image(&rgb)?;

    Ok(SelectedImage {
        payload: ImagePayload::DataUrl(encode_data_url(&jpeg, ImageFormat::Jpeg.mime_type())),
        source: ImageSource::Capture,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sample_png() -> Vec<u8> {
        let img = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    #[test]
    fn data_url_decodes_to_original_bytes() {
        let url = encode_data_url(b"\xff\xd8\xff", "image/jpeg");
        assert!(url.starts_with("data:image/jpeg;base64,"));
        let blob = decode_data_url(&url).expect("decode data url");
        assert_eq!(blob.bytes, b"\xff\xd8\xff");
        assert_eq!(blob.mime, "image/jpeg");
    }

    #[test]
    fn data_url_without_media_type_defaults_to_jpeg() {
        let blob = decode_data_url("data:;base64,AQID").expect("decode");
        assert_eq!(blob.mime, "image/jpeg");
        assert_eq!(blob.bytes, vec![1, 2, 3]);
    }

    #[test]
    fn malformed_data_urls_are_rejected() {
        assert!(matches!(
            decode_data_url("http://example.com/a.jpg"),
            Err(ImageError::InvalidDataUrl(_))
        ));
        assert!(matches!(
            decode_data_url("data:image/png,plain"),
            Err(ImageError::InvalidDataUrl(_))
        ));
        assert!(matches!(
            decode_data_url("data:image/png;base64,@@@"),
            Err(ImageError::Base64(_))
        ));
    }

    #[test]
    fn object_urls_resolve_until_revoked() {
        let store = ObjectUrlStore::new();
        let url = store.create(Blob {
            bytes: vec![1, 2],
            mime: "image/png".into(),
        });
        assert!(url.starts_with("blob:"));
        assert_eq!(store.live_count(), 1);

        let selected = SelectedImage {
            payload: ImagePayload::ObjectUrl(url.clone()),
            source: ImageSource::Object,
        };
        let file = selected.to_file(&store).expect("resolve object url");
        assert_eq!(file.bytes, vec![1, 2]);
        assert_eq!(file.mime, "image/png");
        assert!(file.file_name.starts_with("image_"));
        assert!(file.file_name.ends_with(".jpg"));

        assert!(store.revoke(&url));
        assert!(!store.revoke(&url));
        assert!(matches!(selected.to_file(&store), Err(ImageError::Revoked(_))));
    }

    #[test]
    fn upload_sniffs_the_format() {
        let dir = std::env::temp_dir().join(format!("emotion-analyzer-upload-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join("face.bin");
        fs::write(&path, sample_png()).expect("write png");

        let selected = read_upload(&path).expect("read upload");
        assert!(selected.payload.as_str().starts_with("data:image/png;base64,"));
        assert!(!selected.is_empty());
        assert_eq!(
            selected.source,
            ImageSource::Upload {
                file_name: "face.bin".into()
            }
        );

        let text = dir.join("notes.txt");
        fs::write(&text, "hello").expect("write text");
        assert!(matches!(read_upload(&text), Err(ImageError::NotAnImage(_))));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn capture_is_a_224_square_jpeg() {
        let frame = RgbaImage::from_pixel(1280, 720, Rgba([200, 100, 50, 255]));
        let selected = encode_capture(&frame).expect("encode capture");
        assert_eq!(selected.source, ImageSource::Capture);

        let blob = decode_data_url(selected.payload.as_str()).expect("decode capture");
        assert_eq!(blob.mime, "image/jpeg");
        let decoded = image::load_from_memory(&blob.bytes).expect("decode jpeg");
        assert_eq!((decoded.width(), decoded.height()), (CAPTURE_SIZE, CAPTURE_SIZE));
    }

    #[test]
    fn empty_frames_cannot_be_captured() {
        let frame = RgbaImage::new(0, 0);
        assert!(matches!(encode_capture(&frame), Err(ImageError::Encoding(_))));
    }
}

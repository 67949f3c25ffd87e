//! Upload type detection from magic bytes. The declared `Content-Type` is
//! only a hint; the bytes decide.

use osiris_types::models::UploadKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sniffed {
    pub mime: &'static str,
    pub kind: UploadKind,
}

impl Sniffed {
    const fn image(mime: &'static str) -> Self {
        Self { mime, kind: UploadKind::Image }
    }

    const fn video(mime: &'static str) -> Self {
        Self { mime, kind: UploadKind::Video }
    }
}

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF];
const EBML: &[u8] = &[0x1A, 0x45, 0xDF, 0xA3];

/// Major brands of ISO-BMFF files that are MP4 video. Still-image brands
/// such as `avif`, `heic` and `mif1` share the container and are refused.
const MP4_BRANDS: &[&[u8; 4]] = &[
    b"isom", b"iso2", b"iso4", b"iso5", b"iso6", b"mp41", b"mp42", b"avc1", b"M4V ", b"dash",
];

/// Identify a supported image or video. Returns `None` for everything else,
/// SVG and other text formats included.
pub fn sniff(bytes: &[u8]) -> Option<Sniffed> {
    if bytes.starts_with(PNG) {
        return Some(Sniffed::image("image/png"));
    }
    if bytes.starts_with(JPEG) {
        return Some(Sniffed::image("image/jpeg"));
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some(Sniffed::image("image/gif"));
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some(Sniffed::image("image/webp"));
    }
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        let brand = &bytes[8..12];
        if brand == b"qt  " {
            return Some(Sniffed::video("video/quicktime"));
        }
        if MP4_BRANDS.iter().any(|b| &b[..] == brand) {
            return Some(Sniffed::video("video/mp4"));
        }
        return None;
    }
    if bytes.starts_with(EBML) {
        return Some(Sniffed::video("video/webm"));
    }
    None
}

/// Compare a declared `Content-Type` against the sniffed family.
/// A missing header or `application/octet-stream` defers to the bytes.
pub fn declared_matches(declared: Option<&str>, sniffed: &Sniffed) -> bool {
    let Some(declared) = declared else { return true };
    let essence = declared.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    if essence.is_empty() || essence == "application/octet-stream" {
        return true;
    }
    match sniffed.kind {
        UploadKind::Image => essence.starts_with("image/") && essence != "image/svg+xml",
        UploadKind::Video => essence.starts_with("video/"),
    }
}

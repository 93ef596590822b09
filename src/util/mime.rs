pub const OCTET_STREAM: &str = "application/octet-stream";
pub const TEXT_PLAIN: &str = "text/plain";

/// Guess a MIME type for `path`, looking at magic bytes, then the file
/// extension. Content that is not text falls back to octet-stream, anything
/// else to `text/plain`.
pub fn guess_mime_type(path: &str, contents: &[u8]) -> String {
    if let Some(mime) = sniff(contents) {
        return mime.to_string();
    }

    if let Some(mime) = mime_guess::from_path(path).first() {
        return mime.to_string();
    }

    if contents.contains(&0) || std::str::from_utf8(contents).is_err() {
        return OCTET_STREAM.to_string();
    }

    TEXT_PLAIN.to_string()
}

fn sniff(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if data.starts_with(b"%PDF") {
        return Some("application/pdf");
    }
    if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    None
}

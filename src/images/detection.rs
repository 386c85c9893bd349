/// Image types accepted for upload and serving.
pub const ALLOWED_IMAGE_MIMES: [&str; 5] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
];

#[must_use]
pub fn detect_mime(data: &[u8]) -> Option<String> {
    infer::get(data).map(|info| info.mime_type().to_string())
}

fn looks_like_svg(data: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&data[..data.len().min(512)]);
    let head = head.trim_start_matches('\u{feff}').trim_start();
    head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg"))
}

/// Resolve the MIME type of uploaded image bytes from their content. The
/// client's declared type is never trusted. Returns `None` unless the result
/// is allowlisted.
#[must_use]
pub fn detect_image_mime(data: &[u8]) -> Option<&'static str> {
    // SVG is text, so check it before magic bytes classify it as XML.
    if looks_like_svg(data) {
        return Some("image/svg+xml");
    }
    let sniffed = detect_mime(data)?;

    ALLOWED_IMAGE_MIMES
        .iter()
        .copied()
        .find(|allowed| *allowed == sniffed)
}

/// File extension derived from the MIME type only, never from a client name.
#[must_use]
pub fn extension_from_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpeg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        _ => "bin",
    }
}

#[must_use]
pub fn mime_from_extension(file_name: &str) -> &'static str {
    let ext = file_name.rsplit('.').next().unwrap_or_default();
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

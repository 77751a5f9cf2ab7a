/// Magic-byte detection for decoded page data. Container entry names lie
/// often enough that the output extension is always chosen from content.
pub fn sniff_image_extension(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 12 {
        return None;
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("jpg");
    }
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("png");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("gif");
    }
    if bytes.starts_with(b"BM") {
        return Some("bmp");
    }
    if bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        return Some("webp");
    }
    if &bytes[4..8] == b"ftyp" && (&bytes[8..12] == b"avif" || &bytes[8..12] == b"avis") {
        return Some("avif");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_signatures() {
        assert_eq!(
            sniff_image_extension(b"\xff\xd8\xff\xe0 jfif header .."),
            Some("jpg")
        );
        assert_eq!(
            sniff_image_extension(b"\x89PNG\r\n\x1a\n pixel data .."),
            Some("png")
        );
        assert_eq!(sniff_image_extension(b"GIF89a anim frames .."), Some("gif"));
        assert_eq!(sniff_image_extension(b"BM bitmap data here"), Some("bmp"));
        assert_eq!(sniff_image_extension(b"RIFF\x00\x00\x00\x00WEBPVP8 "), Some("webp"));
        assert_eq!(
            sniff_image_extension(b"\x00\x00\x00\x20ftypavif box.."),
            Some("avif")
        );
    }

    #[test]
    fn test_unknown_and_short_data() {
        assert_eq!(sniff_image_extension(b"plain text, not an image"), None);
        assert_eq!(sniff_image_extension(b"\xff\xd8"), None);
        assert_eq!(sniff_image_extension(b""), None);
    }
}

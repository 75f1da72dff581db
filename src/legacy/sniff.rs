//! Media type guessing from file-name extensions.

use crate::model::content_type::ContentType;

const EXTENSIONS: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("text", "text/plain"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("csv", "text/csv"),
    ("vcf", "text/vcard"),
    ("ics", "text/calendar"),
    ("vcs", "text/x-vcalendar"),
    ("xml", "application/xml"),
    ("json", "application/json"),
    ("rtf", "application/rtf"),
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    ("dot", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("ppt", "application/vnd.ms-powerpoint"),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("odt", "application/vnd.oasis.opendocument.text"),
    ("ods", "application/vnd.oasis.opendocument.spreadsheet"),
    ("msg", "application/vnd.ms-outlook"),
    ("eml", "message/rfc822"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tgz", "application/gzip"),
    ("tar", "application/x-tar"),
    ("7z", "application/x-7z-compressed"),
    ("exe", "application/x-msdownload"),
    ("dll", "application/x-msdownload"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("jpe", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("svg", "image/svg+xml"),
    ("webp", "image/webp"),
    ("ico", "image/x-icon"),
    ("wmf", "image/x-wmf"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/x-wav"),
    ("ogg", "audio/ogg"),
    ("mp4", "video/mp4"),
    ("avi", "video/x-msvideo"),
    ("mov", "video/quicktime"),
];

/// Media type registered for the extension of `file_name`, if known.
pub fn content_type_for_file_name(file_name: &str) -> Option<ContentType> {
    let (_, ext) = file_name.trim().rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    EXTENSIONS
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, media)| ContentType::parse(media))
}

/// Like [`content_type_for_file_name`], falling back to `application/octet-stream`.
pub fn guess_content_type(file_name: Option<&str>) -> ContentType {
    file_name
        .and_then(content_type_for_file_name)
        .unwrap_or_else(ContentType::octet_stream)
}

/// Conventional extension for a media type, without the dot.
pub fn extension_for(content_type: &ContentType) -> Option<&'static str> {
    let base = content_type.base_type();
    EXTENSIONS
        .iter()
        .find(|(_, media)| *media == base)
        .map(|(ext, _)| *ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert_eq!(
            content_type_for_file_name("Report.PDF").unwrap().base_type(),
            "application/pdf"
        );
        assert_eq!(
            content_type_for_file_name("photo.final.jpeg")
                .unwrap()
                .base_type(),
            "image/jpeg"
        );
    }

    #[test]
    fn test_unknown_falls_back() {
        assert!(content_type_for_file_name("README").is_none());
        assert_eq!(
            guess_content_type(Some("data.xyz")).base_type(),
            "application/octet-stream"
        );
        assert_eq!(guess_content_type(None).base_type(), "application/octet-stream");
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for(&ContentType::parse("image/jpeg")), Some("jpg"));
        assert_eq!(extension_for(&ContentType::parse("message/rfc822")), Some("eml"));
        assert_eq!(extension_for(&ContentType::parse("application/x-unknown")), None);
    }
}

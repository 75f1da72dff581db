//! Decoders for legacy encodings found inside otherwise standard messages:
//! UU-encoded files in plain text and TNEF containers.

pub mod sniff;
pub mod tnef;
pub mod uu;

use crate::model::part::Part;

/// `true` for parts carrying a TNEF container.
pub fn is_tnef(part: &Part) -> bool {
    let ct = part.content_type();
    match ct.base_type().as_str() {
        "application/ms-tnef" | "application/vnd.ms-tnef" => true,
        "application/octet-stream" => part
            .file_name()
            .or_else(|| ct.param("name"))
            .is_some_and(|name| name.trim().eq_ignore_ascii_case("winmail.dat")),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::content_type::ContentType;

    #[test]
    fn test_is_tnef() {
        let tnef = Part::leaf(ContentType::new("application", "ms-tnef"), Vec::new());
        assert!(is_tnef(&tnef));
        let vnd = Part::leaf(ContentType::parse("Application/VND.MS-TNEF"), Vec::new());
        assert!(is_tnef(&vnd));
        let winmail =
            Part::leaf(ContentType::octet_stream(), Vec::new()).with_file_name("WINMAIL.DAT");
        assert!(is_tnef(&winmail));
        let other = Part::leaf(ContentType::octet_stream(), Vec::new()).with_file_name("a.dat");
        assert!(!is_tnef(&other));
    }
}

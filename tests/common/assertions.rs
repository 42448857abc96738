//! Response validation and assertion utilities

use std::io::Read;

use flate2::read::GzDecoder;
use reqwest::{Response, StatusCode};

pub trait ResponseAssertions {
    fn assert_status(&self, expected: StatusCode) -> &Self;

    fn assert_header(&self, name: &str, expected: &str) -> &Self;

    fn assert_no_header(&self, name: &str) -> &Self;

    fn assert_content_type_contains(&self, expected: &str) -> &Self;

    fn header_str(&self, name: &str) -> Option<String>;
}

impl ResponseAssertions for Response {
    fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status(),
            expected,
            "Expected status {}, got {}",
            expected,
            self.status()
        );
        self
    }

    fn assert_header(&self, name: &str, expected: &str) -> &Self {
        let header_value = self
            .header_str(name)
            .unwrap_or_else(|| panic!("Header '{}' not found", name));

        assert_eq!(
            header_value, expected,
            "Expected header '{}' to be '{}', got '{}'",
            name, expected, header_value
        );
        self
    }

    fn assert_no_header(&self, name: &str) -> &Self {
        assert!(
            self.headers().get(name).is_none(),
            "Header '{}' should be absent, got {:?}",
            name,
            self.headers().get(name)
        );
        self
    }

    fn assert_content_type_contains(&self, expected: &str) -> &Self {
        let content_type = self
            .header_str("content-type")
            .unwrap_or_else(|| panic!("Content-Type header not found"));
        assert!(
            content_type.contains(expected),
            "Expected content type containing '{}', got '{}'",
            expected,
            content_type
        );
        self
    }

    fn header_str(&self, name: &str) -> Option<String> {
        self.headers()
            .get(name)
            .map(|v| v.to_str().expect("header is not valid ASCII").to_string())
    }
}

/// Decode a gzip body; the test client never decompresses on its own.
pub fn gunzip(bytes: &[u8]) -> Vec<u8> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .expect("body is not a valid gzip stream");
    out
}

//! # Utility Functions Module
//!
//! Small helpers shared by the bridge and the ffmpeg backend: building
//! command-line argument vectors and turning host locators into paths.

use std::path::PathBuf;

/// Builds a `Vec<String>` from heterogeneous `ToString` items.
///
/// # Example
/// ```rust
/// use video_compress::args;
///
/// let bit_rate = 967_680;
/// let args = args!["-b:v", bit_rate, "-an"];
/// assert_eq!(args, vec!["-b:v", "967680", "-an"]);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        vec![$(::std::string::ToString::to_string(&$item)),*]
    };
}

/// Drops a leading `file://` scheme from a host locator
pub fn strip_file_scheme(locator: &str) -> &str {
    locator.strip_prefix("file://").unwrap_or(locator)
}

/// Path for a locator that may be a `file://` URL or a plain path
pub fn path_from_locator(locator: &str) -> PathBuf {
    PathBuf::from(strip_file_scheme(locator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_macro_mixes_types() {
        let width = 853;
        let scale = format!("scale={}:{}", width, 480);
        let result = args!["-vf", scale, "-r", 30.5];
        assert_eq!(result, vec!["-vf", "scale=853:480", "-r", "30.5"]);
    }

    #[test]
    fn test_file_scheme_is_stripped_once() {
        assert_eq!(strip_file_scheme("file:///var/mobile/a.mov"), "/var/mobile/a.mov");
        assert_eq!(strip_file_scheme("/var/mobile/a.mov"), "/var/mobile/a.mov");
        assert_eq!(path_from_locator("file:///tmp/x.mp4"), PathBuf::from("/tmp/x.mp4"));
    }
}

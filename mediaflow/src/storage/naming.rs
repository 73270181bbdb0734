//! Artifact naming convention.
//!
//! Every stage output is named after the shared artifact key: only the
//! extension changes from stage to stage (`lecture01.mp4` becomes
//! `lecture01.mp3`, then `lecture01.srt`, then `lecture01.txt`).

/// Returns the file name of a location without directory and extension.
///
/// ```
/// use mediaflow::storage::naming::base_name;
///
/// assert_eq!(base_name("raw/lecture01.mp4"), "lecture01");
/// assert_eq!(base_name("lecture01"), "lecture01");
/// ```
#[must_use]
pub fn base_name(location: &str) -> &str {
    let file = location.rsplit('/').next().unwrap_or(location);
    match file.rfind('.') {
        Some(0) | None => file,
        Some(dot) => &file[..dot],
    }
}

/// Replaces only the extension of a location.
///
/// A location without an extension gets one appended.
#[must_use]
pub fn with_extension(location: &str, extension: &str) -> String {
    let extension = extension.trim_start_matches('.');
    let file_start = location.rfind('/').map_or(0, |slash| slash + 1);
    let stem_end = match location[file_start..].rfind('.') {
        Some(0) | None => location.len(),
        Some(dot) => file_start + dot,
    };
    format!("{}.{}", &location[..stem_end], extension)
}

/// Location of a stage output: `<prefix>/<artifact_key>.<extension>`.
#[must_use]
pub fn stage_output_location(prefix: &str, artifact_key: &str, extension: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let file = with_extension(artifact_key, extension);
    if prefix.is_empty() {
        file
    } else {
        format!("{prefix}/{file}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("uploads/ine/lecture01.mp4"), "lecture01");
        assert_eq!(base_name("lecture01.tar.gz"), "lecture01.tar");
        assert_eq!(base_name(".hidden"), ".hidden");
        assert_eq!(base_name("dir.v2/lecture01"), "lecture01");
    }

    #[test]
    fn test_with_extension_replaces_only_extension() {
        assert_eq!(with_extension("media/lecture01.mp3", "srt"), "media/lecture01.srt");
        assert_eq!(with_extension("lecture01", ".txt"), "lecture01.txt");
        assert_eq!(with_extension("dir.v2/lecture01", "txt"), "dir.v2/lecture01.txt");
    }

    #[test]
    fn test_stage_output_location() {
        assert_eq!(
            stage_output_location("transcripts/", "lecture01", "srt"),
            "transcripts/lecture01.srt"
        );
        assert_eq!(stage_output_location("", "lecture01", "txt"), "lecture01.txt");
    }
}

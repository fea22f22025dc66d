// components/media_downloader/src/utils.rs
use crate::DownloadError;
use std::collections::HashSet;

/// Trim references, drop empty ones and remove duplicates, keeping first occurrences in order
pub fn normalize_references<I, S>(references: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    references
        .into_iter()
        .filter_map(|r| {
            let r = r.as_ref().trim();
            (!r.is_empty()).then(|| r.to_string())
        })
        .filter(|r| seen.insert(r.clone()))
        .collect()
}

/// Reject references that cannot be handed to the fetch tool as a single argument
pub fn validate_reference(reference: &str) -> Result<(), DownloadError> {
    let reason = if reference.starts_with('-') {
        "looks like a command line option"
    } else if reference.chars().any(char::is_control) {
        "contains control characters"
    } else {
        return Ok(());
    };

    Err(DownloadError::Resolution {
        reference: reference.to_string(),
        reason: reason.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[test]
    fn test_normalize_references() {
        let normalized = normalize_references([
            " https://open.spotify.com/track/A ",
            "",
            "   ",
            "https://open.spotify.com/track/B",
            "https://open.spotify.com/track/A",
        ]);
        assert_eq!(
            normalized,
            vec![
                "https://open.spotify.com/track/A".to_string(),
                "https://open.spotify.com/track/B".to_string(),
            ]
        );
    }

    #[rstest]
    #[case("https://open.spotify.com/track/A", true)]
    #[case("artist - title", true)]
    #[case("--output=/etc", false)]
    #[case("a\nb", false)]
    fn test_validate_reference(#[case] reference: &str, #[case] valid: bool) {
        let result = validate_reference(reference);
        if valid {
            assert!(result.is_ok());
        } else {
            assert_matches!(result, Err(DownloadError::Resolution { .. }));
        }
    }
}

//! Rule table mapping provider error codes and messages to classifications.

use regex::Regex;
use std::sync::OnceLock;

use crate::errors::ErrorClassification;

/// Ordered rules; the first match wins.
const RULES: &[(&str, ErrorClassification)] = &[
    (
        r"(?i)malformed|unsupported|invalid|bad ?request|validation|corrupt|unrecognized|not ?supported|cannot ?decode|not ?found|no ?such",
        ErrorClassification::PermanentInputError,
    ),
    (
        r"(?i)access ?denied|unauthori[sz]ed|forbidden|credential",
        ErrorClassification::ConfigurationError,
    ),
    (
        r"(?i)throttl|rate ?exceeded|too ?many ?requests|limit ?exceeded|quota",
        ErrorClassification::TransientProviderError,
    ),
    (
        r"(?i)unavailable|internal ?(failure|error|server)|service ?error|\b5\d\d\b",
        ErrorClassification::TransientProviderError,
    ),
    (
        r"(?i)time ?out|timed ?out|network|connection|reset|temporar|try ?again",
        ErrorClassification::TransientProviderError,
    ),
];

fn rules() -> &'static [(Regex, ErrorClassification)] {
    static COMPILED: OnceLock<Vec<(Regex, ErrorClassification)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .filter_map(|(pattern, class)| Regex::new(pattern).ok().map(|re| (re, *class)))
            .collect()
    })
}

fn match_rules(text: &str) -> Option<ErrorClassification> {
    rules()
        .iter()
        .find(|(re, _)| re.is_match(text))
        .map(|(_, class)| *class)
}

/// Classifies a provider error.
///
/// The code is matched first, then the message. Errors no rule recognizes
/// are treated as transient so they stay bounded by the stage's attempt limit.
#[must_use]
pub fn classify_provider_error(code: &str, message: &str) -> ErrorClassification {
    match_rules(code)
        .or_else(|| match_rules(message))
        .unwrap_or(ErrorClassification::TransientProviderError)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_rules_compile() {
        assert_eq!(rules().len(), RULES.len());
    }

    #[test]
    fn test_throttling_is_transient() {
        for code in ["ThrottlingException", "LimitExceededException", "ServiceUnavailable", "InternalFailure"] {
            assert_eq!(
                classify_provider_error(code, ""),
                ErrorClassification::TransientProviderError,
                "{code}"
            );
        }
    }

    #[test]
    fn test_bad_input_is_permanent() {
        for code in ["BadRequestException", "UnsupportedMediaFormat", "MalformedInput", "ValidationException"] {
            assert_eq!(
                classify_provider_error(code, ""),
                ErrorClassification::PermanentInputError,
                "{code}"
            );
        }
    }

    #[test]
    fn test_code_takes_precedence_over_message() {
        assert_eq!(
            classify_provider_error("ThrottlingException", "invalid request rate"),
            ErrorClassification::TransientProviderError
        );
    }

    #[test]
    fn test_message_used_when_code_unknown() {
        assert_eq!(
            classify_provider_error("E42", "connection reset by peer"),
            ErrorClassification::TransientProviderError
        );
        assert_eq!(
            classify_provider_error("E43", "The media format is not supported"),
            ErrorClassification::PermanentInputError
        );
    }

    #[test]
    fn test_access_denied_is_configuration() {
        assert_eq!(
            classify_provider_error("AccessDeniedException", ""),
            ErrorClassification::ConfigurationError
        );
    }

    #[test]
    fn test_unknown_defaults_to_transient() {
        assert_eq!(
            classify_provider_error("Weird", "something odd happened"),
            ErrorClassification::TransientProviderError
        );
    }
}

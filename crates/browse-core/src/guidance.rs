//! Maps raw engine and model failures to user guidance.
//!
//! Guidance text is fixed per category and never echoes the raw error, so
//! status codes and provider payloads stay out of the terminal.

/// Failure taxonomy, in the order categories are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Authentication,
    Authorization,
    RateLimited,
    Unavailable,
    DeploymentNotFound,
    Quota,
    ApiVersion,
    EngineCrash,
    Unknown,
}

impl ErrorCategory {
    /// Classifies an error by its display text.
    pub fn classify(error_text: &str) -> Self {
        let text = error_text.to_lowercase();
        let has_any = |words: &[&str]| words.iter().any(|w| text.contains(w));

        if has_any(&["network", "connection", "timeout"]) {
            ErrorCategory::Network
        } else if has_any(&["401", "unauthorized"]) {
            ErrorCategory::Authentication
        } else if has_any(&["403", "forbidden"]) {
            ErrorCategory::Authorization
        } else if has_any(&["429", "rate limit"]) {
            ErrorCategory::RateLimited
        } else if has_any(&["500", "502", "503"]) {
            ErrorCategory::Unavailable
        } else if text.contains("404") && text.contains("deployment") {
            ErrorCategory::DeploymentNotFound
        } else if has_any(&["quota", "capacity"]) {
            ErrorCategory::Quota
        } else if text.contains("api") && text.contains("version") {
            ErrorCategory::ApiVersion
        } else if has_any(&["browser", "playwright", "engine"]) {
            ErrorCategory::EngineCrash
        } else {
            ErrorCategory::Unknown
        }
    }

    /// User-facing guidance for this category.
    ///
    /// `deployment` is named in the deployment-not-found message.
    pub fn guidance(self, deployment: Option<&str>) -> String {
        match self {
            ErrorCategory::Network => "Network error: Unable to connect. Please check your internet connection and try again.".to_string(),
            ErrorCategory::Authentication => "API error: Authentication failed. Please check your AZURE_OPENAI_API_KEY.\n\n\
                 If you use Microsoft Entra ID, make sure the token is scoped for \
                 https://cognitiveservices.azure.com/.default"
                .to_string(),
            ErrorCategory::Authorization => "API error: Access forbidden. Your API key or token does not have permission \
                 to use this resource.\n\n\
                 Check the deployment's permissions and make sure the subscription has quota allocated."
                .to_string(),
            ErrorCategory::RateLimited => "API error: Rate limit exceeded. The model deployment is receiving too many requests.\n\n\
                 The service sends a Retry-After header saying how long to wait before retrying.\n\
                 Back off and retry later, or request a quota increase for the deployment."
                .to_string(),
            ErrorCategory::Unavailable => "API error: The model service is temporarily unavailable. Please try again in a few moments.\n\n\
                 If this persists, check the provider status page or try a different region."
                .to_string(),
            ErrorCategory::DeploymentNotFound => format!(
                "API error: Model deployment '{}' not found.\n\n\
                 Please verify:\n\
                 - AZURE_OPENAI_DEPLOYMENT_NAME matches the deployment name in the portal\n\
                 - The deployment exists in the region behind AZURE_OPENAI_ENDPOINT\n\
                 - The deployment is active and not in a failed state",
                deployment.unwrap_or("unknown")
            ),
            ErrorCategory::Quota => "API error: Insufficient quota or capacity in this region.\n\n\
                 To resolve this:\n\
                 1. Request a quota increase\n\
                 2. Deploy the model in a different region\n\
                 3. Check regional capacity to find an available region"
                .to_string(),
            ErrorCategory::ApiVersion => "API error: Unsupported or invalid API version.\n\n\
                 Set AZURE_OPENAI_API_VERSION to a version your deployment supports."
                .to_string(),
            ErrorCategory::EngineCrash => "Browser error: The automation engine stopped unexpectedly. \
                 Please try again, or try a different task."
                .to_string(),
            ErrorCategory::Unknown => "An unexpected error occurred. Please try again or report this issue if it persists.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_guidance_hides_status_code() {
        let raw = "model request failed with HTTP 429: Too Many Requests";
        assert_eq!(ErrorCategory::classify(raw), ErrorCategory::RateLimited);

        let message = ErrorCategory::RateLimited.guidance(None);
        assert!(!message.contains("429"));
        assert!(message.contains("Rate limit exceeded"));
        assert!(message.contains("Retry-After"));
    }

    #[test]
    fn test_network_wins_over_status_codes() {
        assert_eq!(
            ErrorCategory::classify("connection reset while reading 503 body"),
            ErrorCategory::Network
        );
    }

    #[test]
    fn test_classifies_each_category() {
        let cases = [
            ("HTTP 401", ErrorCategory::Authentication),
            ("Forbidden", ErrorCategory::Authorization),
            ("rate limit reached", ErrorCategory::RateLimited),
            ("HTTP 502 bad gateway", ErrorCategory::Unavailable),
            ("HTTP 404: DeploymentNotFound", ErrorCategory::DeploymentNotFound),
            ("insufficient capacity", ErrorCategory::Quota),
            ("unsupported api version", ErrorCategory::ApiVersion),
            ("browser has been closed", ErrorCategory::EngineCrash),
            ("something odd", ErrorCategory::Unknown),
        ];
        for (raw, expected) in cases {
            assert_eq!(ErrorCategory::classify(raw), expected, "{raw}");
        }
    }

    #[test]
    fn test_status_codes_match_inside_words() {
        assert_eq!(
            ErrorCategory::classify("E429 too many requests"),
            ErrorCategory::RateLimited
        );
        assert_eq!(ErrorCategory::classify("upstream HTTP503"), ErrorCategory::Unavailable);
    }

    #[test]
    fn test_plain_404_is_not_a_deployment_error() {
        assert_eq!(ErrorCategory::classify("HTTP 404"), ErrorCategory::Unknown);
    }

    #[test]
    fn test_deployment_guidance_names_the_deployment() {
        let message = ErrorCategory::DeploymentNotFound.guidance(Some("gpt-4o-prod"));
        assert!(message.contains("'gpt-4o-prod'"));
        assert!(ErrorCategory::DeploymentNotFound
            .guidance(None)
            .contains("'unknown'"));
    }
}

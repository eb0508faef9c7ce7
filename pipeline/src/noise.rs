//! Noise filtering (§4.9, glossary): bot authors and trivial one-line
//! approvals are excluded from enrichment so they never become `Activity`
//! evidence. Login comparisons throughout the pipeline are case-insensitive.

use std::sync::LazyLock;

use regex::Regex;

static TRIVIAL_APPROVAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(LGTM!?|\+1|:shipit:|Ship it!?)$").expect("trivial approval regex")
});

pub fn is_bot_login(login: &str) -> bool {
    let lower = login.to_lowercase();
    lower.ends_with("[bot]") || lower.ends_with("-bot")
}

/// A comment/review body is noise when empty or a one-line trivial
/// approval (`LGTM`, `+1`, `:shipit:`, `Ship it!`, case-insensitive).
pub fn is_noise_body(body: &str) -> bool {
    let trimmed = body.trim();
    trimmed.is_empty() || TRIVIAL_APPROVAL_RE.is_match(trimmed)
}

pub fn logins_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_bot_logins() {
        assert!(is_bot_login("dependabot[bot]"));
        assert!(is_bot_login("release-bot"));
        assert!(!is_bot_login("octocat"));
    }

    #[test]
    fn detects_trivial_approvals_case_insensitively() {
        for body in ["LGTM", "lgtm!", "+1", ":shipit:", "Ship it", "ship it!"] {
            assert!(is_noise_body(body), "expected noise: {body}");
        }
        assert!(!is_noise_body("LGTM but please rebase"));
        assert!(is_noise_body(""));
        assert!(is_noise_body("   "));
    }

    #[test]
    fn logins_compare_case_insensitively() {
        assert!(logins_match("TestUser", "testuser"));
        assert!(!logins_match("testuser", "someoneelse"));
    }
}

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Leading tag of an accepting review
pub const APPROVE_TAG: &str = "[APPROVE]";

/// Leading tag of a rejecting review.
///
/// The fix loop counts literal occurrences of this tag in a change request's
/// comment history, so the exact text is a durable contract.
pub const REQUEST_CHANGES_TAG: &str = "[REQUEST_CHANGES]";

const EMPTY_RESPONSE_RATIONALE: &str =
    "The automated reviewer produced no response, so the change cannot be approved.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    RequestChanges,
}

impl Decision {
    pub fn tag(&self) -> &'static str {
        match self {
            Decision::Approve => APPROVE_TAG,
            Decision::RequestChanges => REQUEST_CHANGES_TAG,
        }
    }
}

/// Outcome of one review pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    pub decision: Decision,
    /// Everything after the tag line
    pub rationale: String,
    /// The response exactly as the backend returned it
    pub raw: String,
}

impl ReviewVerdict {
    /// Derive a verdict from a backend response.
    ///
    /// Only the first line is inspected, verbatim: it must begin with
    /// `[APPROVE]` and must not also carry `[REQUEST_CHANGES]`. Anything else,
    /// including an empty response or whitespace before the tag, is a
    /// rejection.
    pub fn parse(response: &str) -> Self {
        let (first_line, rest) = split_first_line(response);

        let approved =
            first_line.starts_with(APPROVE_TAG) && !first_line.contains(REQUEST_CHANGES_TAG);
        let decision = if approved {
            Decision::Approve
        } else {
            Decision::RequestChanges
        };

        let rationale = if response.trim().is_empty() {
            EMPTY_RESPONSE_RATIONALE.to_string()
        } else if starts_with_tag(first_line) {
            rest.trim().to_string()
        } else {
            // No tag line, so the whole response is the rationale
            response.trim().to_string()
        };

        debug!(?decision, first_line, "Parsed review verdict");

        Self {
            decision,
            rationale,
            raw: response.to_string(),
        }
    }

    pub fn is_approved(&self) -> bool {
        self.decision == Decision::Approve
    }

    /// The comment to post on the change request.
    ///
    /// This is the raw response, unless its first line does not begin with a
    /// tag; then a `[REQUEST_CHANGES]` line is prepended so the comment
    /// history agrees with the fail-closed decision.
    pub fn to_comment(&self) -> String {
        let (first_line, _) = split_first_line(&self.raw);
        if starts_with_tag(first_line) {
            return self.raw.clone();
        }

        let body = if self.raw.trim().is_empty() {
            EMPTY_RESPONSE_RATIONALE
        } else {
            self.raw.as_str()
        };
        format!("{}\n{}", REQUEST_CHANGES_TAG, body)
    }

    /// One-line description for logs
    pub fn short_description(&self) -> String {
        let summary: String = self
            .rationale
            .lines()
            .find(|l| !l.trim().is_empty())
            .unwrap_or_default()
            .chars()
            .take(80)
            .collect();
        format!("{} {}", self.decision.tag(), summary)
    }
}

/// Number of rejection tags in a comment history
pub fn count_rejections(history: &str) -> usize {
    history.matches(REQUEST_CHANGES_TAG).count()
}

fn split_first_line(text: &str) -> (&str, &str) {
    match text.split_once('\n') {
        Some((first, rest)) => (first.strip_suffix('\r').unwrap_or(first), rest),
        None => (text, ""),
    }
}

fn starts_with_tag(line: &str) -> bool {
    line.starts_with(APPROVE_TAG) || line.starts_with(REQUEST_CHANGES_TAG)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approve_on_first_line() {
        let verdict = ReviewVerdict::parse("[APPROVE]\nClean implementation, tests included.");
        assert!(verdict.is_approved());
        assert_eq!(verdict.rationale, "Clean implementation, tests included.");
        assert_eq!(verdict.to_comment(), verdict.raw);
    }

    #[test]
    fn test_request_changes_on_first_line() {
        let verdict = ReviewVerdict::parse("[REQUEST_CHANGES]\nMissing error handling.");
        assert_eq!(verdict.decision, Decision::RequestChanges);
        assert_eq!(verdict.rationale, "Missing error handling.");
        assert_eq!(verdict.to_comment(), "[REQUEST_CHANGES]\nMissing error handling.");
    }

    #[test]
    fn test_empty_response_is_rejection() {
        let verdict = ReviewVerdict::parse("");
        assert_eq!(verdict.decision, Decision::RequestChanges);
        assert!(!verdict.rationale.is_empty());

        let comment = verdict.to_comment();
        assert!(comment.starts_with(REQUEST_CHANGES_TAG));
        assert_eq!(count_rejections(&comment), 1);
    }

    #[test]
    fn test_leading_whitespace_is_rejection() {
        for response in ["  [APPROVE]\nok", "\n[APPROVE]\nok", "\t[APPROVE]"] {
            let verdict = ReviewVerdict::parse(response);
            assert_eq!(verdict.decision, Decision::RequestChanges, "{:?}", response);
            assert_eq!(count_rejections(&verdict.to_comment()), 1);
        }
    }

    #[test]
    fn test_prose_before_tag_is_rejection() {
        let verdict = ReviewVerdict::parse("Overall this looks fine. [APPROVE]\nDetails...");
        assert_eq!(verdict.decision, Decision::RequestChanges);
        assert!(verdict.to_comment().starts_with("[REQUEST_CHANGES]\nOverall"));
    }

    #[test]
    fn test_both_tags_on_first_line_is_rejection() {
        let verdict = ReviewVerdict::parse("[APPROVE] [REQUEST_CHANGES]\nundecided");
        assert_eq!(verdict.decision, Decision::RequestChanges);
        // Raw already carries the rejection tag, nothing is prepended
        assert_eq!(verdict.to_comment(), verdict.raw);
        assert_eq!(count_rejections(&verdict.to_comment()), 1);
    }

    #[test]
    fn test_tag_later_in_response_is_ignored() {
        let verdict = ReviewVerdict::parse("Summary\n[APPROVE]");
        assert_eq!(verdict.decision, Decision::RequestChanges);
    }

    #[test]
    fn test_crlf_first_line() {
        let verdict = ReviewVerdict::parse("[APPROVE]\r\nLooks good");
        assert!(verdict.is_approved());
    }

    #[test]
    fn test_count_rejections() {
        let history = "[General Comment] bot: [REQUEST_CHANGES]\nfix x\n---\n\
                       [General Comment] bot: [APPROVE]\n---\n\
                       [Review Comment] src/a.py:3\n[REQUEST_CHANGES] twice [REQUEST_CHANGES]\n---\n";
        assert_eq!(count_rejections(history), 3);
        assert_eq!(count_rejections(""), 0);
        assert_eq!(count_rejections("REQUEST_CHANGES without brackets"), 0);
    }

    #[test]
    fn test_serialization() {
        let verdict = ReviewVerdict::parse("[APPROVE]\nfine");
        let json = serde_json::to_string(&verdict).unwrap();
        assert!(json.contains("\"decision\":\"approve\""));
    }
}

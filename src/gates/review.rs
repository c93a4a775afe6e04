//! Approval-chain audit over the code-host PR.
//!
//! The PR body must carry a structured code-review summary (files changed +
//! files NOT changed, so a reviewer can see what was intentionally left
//! alone), and the comment thread must contain an exact approval token
//! attributed to an identifiable actor. Fetching the PR is the check here:
//! an unavailable PR host blocks.

use crate::core::evidence::Violation;
use crate::core::probe::PrProbe;
use regex::RegexBuilder;
use serde::Serialize;

pub const APPROVAL_TOKEN: &str = "APPROVED";

#[derive(Debug, Clone, Serialize)]
pub struct ReviewAudit {
    pub pr: u64,
    pub summary_present: bool,
    pub files_changed_documented: bool,
    pub files_not_changed_documented: bool,
    pub approved_by: Option<String>,
    pub comment_count: usize,
}

fn matches_ci(pattern: &str, text: &str) -> bool {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

pub fn audit(probe: &PrProbe, pr: u64, token: &str) -> (ReviewAudit, Vec<Violation>) {
    let mut violations = Vec::new();
    let mut review = ReviewAudit {
        pr,
        summary_present: false,
        files_changed_documented: false,
        files_not_changed_documented: false,
        approved_by: None,
        comment_count: 0,
    };

    match probe.body(pr) {
        Ok(body) => {
            review.summary_present = matches_ci(r"Code\s+Review\s+Summary", &body);
            review.files_changed_documented =
                matches_ci(r"files?\s+(changed|modified)|changed\s+files?", &body);
            review.files_not_changed_documented =
                matches_ci(r"not\s+changed|unchanged|did\s+not\s+change|why\s+not", &body);

            if !review.summary_present {
                violations.push(Violation::new(format!(
                    "PR #{} body has no code-review summary; add a '## Code Review Summary' \
                     with files changed and files NOT changed subsections",
                    pr
                )));
            } else if !review.files_changed_documented {
                violations.push(Violation::new(
                    "code-review summary is missing the files-changed subsection",
                ));
            } else if !review.files_not_changed_documented {
                violations.push(Violation::new(
                    "code-review summary is missing the files-NOT-changed subsection; \
                     list what was intentionally left alone so the reviewer can verify it",
                ));
            }
        }
        Err(why) => {
            violations.push(Violation::with_evidence(
                format!("could not fetch PR #{} body", pr),
                why,
            ));
        }
    }

    match probe.comments(pr) {
        Ok(comments) => {
            review.comment_count = comments.len();
            let token_pattern = format!(r"\b{}\b", regex::escape(token));
            review.approved_by = comments
                .iter()
                .find(|c| matches_ci(&token_pattern, &c.body))
                .map(|c| c.author.clone());
            if review.approved_by.is_none() {
                violations.push(Violation::new(format!(
                    "PR #{} has no '{}' comment ({} comment(s) present); \
                     a reviewer must comment the exact token after reviewing the diff",
                    pr, token, review.comment_count
                )));
            }
        }
        Err(why) => {
            violations.push(Violation::with_evidence(
                format!("could not fetch PR #{} comments", pr),
                why,
            ));
        }
    }

    (review, violations)
}

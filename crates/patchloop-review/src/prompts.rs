/// Prompt templates for the reviewer
pub struct ReviewPrompts;

const MAX_DIFF_LEN: usize = 40_000;

impl ReviewPrompts {
    pub fn system_prompt() -> &'static str {
        r#"You are a senior software engineer performing a code review.

Your job:
1. Check whether the implementation (the diff) satisfies the task requirements.
2. Look for bugs, security problems and code quality issues.
3. If the code is good and completes the task, the FIRST line of your reply must be exactly: [APPROVE]
4. If there are serious problems or gaps, the FIRST line of your reply must be exactly: [REQUEST_CHANGES]

After the first line, write detailed, constructive feedback. Reference files and
lines where possible so the author can act on every point."#
    }

    /// Build the user prompt for one review pass
    pub fn build_review_prompt(task: &str, diff: &str) -> String {
        let diff = if diff.trim().is_empty() {
            "(no changes could be retrieved for this change request)"
        } else {
            truncate_output(diff, MAX_DIFF_LEN)
        };

        format!(
            r#"## Task Requirements
{task}

## Code Changes (diff)
```diff
{diff}
```

Review the changes above. Remember: the first line must be the verdict tag."#,
            task = task,
            diff = diff,
        )
    }
}

fn truncate_output(output: &str, max_len: usize) -> &str {
    if output.len() <= max_len {
        return output;
    }
    let mut end = max_len;
    while !output.is_char_boundary(end) {
        end -= 1;
    }
    // Prefer a line boundary
    match output[..end].rfind('\n') {
        Some(pos) => &output[..pos],
        None => &output[..end],
    }
}

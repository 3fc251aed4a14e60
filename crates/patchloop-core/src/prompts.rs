//! Prompt templates for change generation and file selection

/// Prompt templates for the change generator
pub struct ChangePrompts;

impl ChangePrompts {
    pub fn system_prompt() -> &'static str {
        r#"You are an experienced software engineer.
Your job is to read a task from the issue tracker and modify the code base to complete it.

Output format:
Your reply is applied to the repository automatically, so it must follow this format exactly.
For every file you change or create, give the COMPLETE new content of the file.

File: `path/to/file.ext`
```lang
... complete file content ...
```

Paths are relative to the repository root.
Do not output diffs. Do not omit unchanged parts of a file.
Only include files that actually need to change."#
    }

    /// Prompt for a fresh task: current files plus the task
    pub fn build_initial_prompt(context: &str, task: &str) -> String {
        format!(
            r#"## Current project files
{context}

## Task
{task}

## Instructions
Analyse the task and rewrite the files needed to complete it.
Return the COMPLETE content of every modified file."#,
            context = context_or_placeholder(context),
            task = task,
        )
    }

    /// Prompt for a revision pass on an existing change request
    pub fn build_revision_prompt(context: &str, diff: &str, task: &str, comments: &str) -> String {
        let diff = if diff.trim().is_empty() {
            "(diff unavailable)"
        } else {
            diff
        };
        let comments = if comments.trim().is_empty() {
            "(no reviewer comments)"
        } else {
            comments
        };

        format!(
            r#"This is a revision pass on an open change request.

## Current project files
{context}

## Changes in the change request (diff)
{diff}

## Original task
{task}

## Reviewer comments
{comments}

## Instructions
Fix the code according to the reviewer comments.
Return the COMPLETE content of every corrected file."#,
            context = context_or_placeholder(context),
            diff = diff,
            task = task,
            comments = comments,
        )
    }

    pub fn selection_system_prompt() -> &'static str {
        r#"You are helping a code generator decide which existing files it must read.
You receive a repository map (each file path followed by its indented symbols) and a task.

Reply with ONLY a JSON array of file paths taken from the map, for example:
["src/app.py", "src/utils/strings.py"]

Include files that must be modified and files whose definitions are needed to make the change.
Do not include files that do not exist yet. Reply with [] when no existing file is relevant."#
    }

    pub fn build_selection_prompt(repo_map: &str, task: &str) -> String {
        format!(
            r#"## Repository map
{repo_map}
## Task
{task}

Which files should be read? Answer with a JSON array of paths."#,
            repo_map = repo_map,
            task = task,
        )
    }
}

fn context_or_placeholder(context: &str) -> &str {
    if context.trim().is_empty() {
        "(no existing files were selected)"
    } else {
        context
    }
}

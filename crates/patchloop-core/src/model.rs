use serde::{Deserialize, Serialize};

/// A tracked unit of requested work (an issue), as read from the task store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub url: String,
    pub title: String,
    pub body: String,
    /// Follow-up comments, oldest first
    #[serde(default)]
    pub comments: Vec<String>,
}

impl Task {
    pub fn new(url: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            body: body.into(),
            comments: Vec::new(),
        }
    }

    pub fn with_comments(mut self, comments: Vec<String>) -> Self {
        self.comments = comments;
        self
    }

    /// Trailing numeric key of the task URL, if any
    pub fn number(&self) -> Option<u64> {
        self.url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .and_then(|last| last.parse().ok())
    }

    /// The description with accumulated comments appended
    pub fn description(&self) -> String {
        let mut text = format!("Description:\n{}", self.body.trim_end());
        if !self.comments.is_empty() {
            text.push_str("\n\nComments:");
            for comment in &self.comments {
                text.push_str("\n- ");
                text.push_str(comment.trim());
            }
        }
        text
    }

    /// Full rendering used in prompts
    pub fn text(&self) -> String {
        format!("Title: {}\n{}", self.title, self.description())
    }
}

/// A full-content replacement for one file path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEdit {
    /// Path relative to the working-tree root
    pub path: String,
    /// The entire new file
    pub content: String,
}

impl FileEdit {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// A published change request (pull request)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub branch: String,
    pub title: String,
    pub body: String,
    pub base: String,
    /// Address returned by the change-request store
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_from_url() {
        let task = Task::new("https://github.com/o/r/issues/42", "t", "b");
        assert_eq!(task.number(), Some(42));

        let trailing = Task::new("https://github.com/o/r/issues/7/", "t", "b");
        assert_eq!(trailing.number(), Some(7));

        let local = Task::new("local-task", "t", "b");
        assert_eq!(local.number(), None);
    }

    #[test]
    fn test_text_without_comments() {
        let task = Task::new("u", "Add add()", "Create a function add(a, b)\n");
        assert_eq!(
            task.text(),
            "Title: Add add()\nDescription:\nCreate a function add(a, b)"
        );
    }

    #[test]
    fn test_text_with_comments() {
        let task = Task::new("u", "Add add()", "Create add").with_comments(vec![
            "Please also handle floats".to_string(),
            "  and negative numbers \n".to_string(),
        ]);
        let text = task.text();
        assert!(text.ends_with(
            "Comments:\n- Please also handle floats\n- and negative numbers"
        ));
        assert!(task.description().starts_with("Description:\nCreate add"));
    }
}

use lazy_static::lazy_static;
use patchloop_llm::Generator;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::FileEdit;

lazy_static! {
    /// ``File: `path` `` annotation, then a fenced block running up to a line
    /// holding only the closing fence.
    static ref EDIT_BLOCK: Regex = Regex::new(
        r"(?ms)^[^\n`]*?File:[ \t]*`([^`\n]+)`[^\n]*\n(?:[ \t]*\r?\n)*[ \t]*```[^\n]*\n(.*?)^[ \t]*```[ \t]*\r?$"
    )
    .expect("edit block pattern is valid");
}

/// Parse a backend response into file edits.
///
/// Zero annotations is a valid empty result. When a path occurs more than
/// once the last block wins, in the position of the first.
pub fn parse_response(text: &str) -> Vec<FileEdit> {
    let mut edits: Vec<FileEdit> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for caps in EDIT_BLOCK.captures_iter(text) {
        let path = normalize_path(&caps[1]);
        if path.is_empty() {
            continue;
        }
        let content = caps[2].to_string();
        match seen.get(&path) {
            Some(&index) => {
                debug!(path = %path, "Duplicate edit block, keeping the last one");
                edits[index].content = content;
            }
            None => {
                seen.insert(path.clone(), edits.len());
                edits.push(FileEdit::new(path, content));
            }
        }
    }

    edits
}

fn normalize_path(raw: &str) -> String {
    let mut path = raw.trim();
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    path.to_string()
}

/// Turns prompts into file edits through a generative backend
pub struct ChangeGenerator<'a> {
    generator: &'a dyn Generator,
}

impl<'a> ChangeGenerator<'a> {
    pub fn new(generator: &'a dyn Generator) -> Self {
        Self { generator }
    }

    /// Ask the backend and parse its answer. Backend failures yield no edits.
    pub async fn generate_edits(&self, system_prompt: &str, user_prompt: &str) -> Vec<FileEdit> {
        debug!(
            backend = self.generator.name(),
            prompt_len = user_prompt.len(),
            "Requesting edits"
        );
        let response = self.generator.generate(system_prompt, user_prompt).await;
        let edits = parse_response(&response);
        info!(
            edits = edits.len(),
            response_len = response.len(),
            "Parsed backend response"
        );
        edits
    }
}

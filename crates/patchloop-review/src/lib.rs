mod verdict;
pub mod evaluator;
mod prompts;

pub use evaluator::{ReviewEvaluator, ReviewInput};
pub use prompts::ReviewPrompts;
pub use verdict::{count_rejections, Decision, ReviewVerdict, APPROVE_TAG, REQUEST_CHANGES_TAG};

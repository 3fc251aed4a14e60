use std::collections::{HashMap, VecDeque};
use std::fs;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use patchloop_core::{
    ChangeLocks, ChangeRequestStore, ContextStrategy, FixLoop, Orchestrator, PipelineConfig,
    PipelineContext, ReviewRunner, RunOutcome, StoreError, Task, TaskStore,
};
use patchloop_git::WorkTree;
use patchloop_llm::{BackendKind, Generator, GeneratorError};
use patchloop_logging::{LogFormat, Logger};
use patchloop_review::Decision;
use tempfile::TempDir;

const TASK_URL: &str = "https://github.com/acme/calc/issues/7";
const CHANGE_URL: &str = "https://github.com/acme/calc/pull/8";

// ============================================================
// Fakes
// ============================================================

/// In-memory hosting platform: tasks, comments, branches and one change request
#[derive(Default)]
struct FakeHost {
    tasks: HashMap<String, Task>,
    comments: Mutex<HashMap<String, Vec<String>>>,
    posted: Mutex<Vec<(String, String)>>,
    removed_labels: Mutex<Vec<String>>,
    bases: Mutex<Vec<String>>,
    branches: Mutex<Vec<String>>,
    checkouts: Mutex<Vec<String>>,
    commits: Mutex<Vec<String>>,
    published: Mutex<Vec<(String, String)>>,
    nothing_to_commit: bool,
    push_error: Option<String>,
    diff: String,
    head_branch: String,
}

impl FakeHost {
    fn with_task(body: &str) -> Self {
        let mut tasks = HashMap::new();
        tasks.insert(TASK_URL.to_string(), Task::new(TASK_URL, "Math helpers", body));
        Self {
            tasks,
            head_branch: "fix/issue-7-1".to_string(),
            ..Default::default()
        }
    }

    fn add_comment(&self, target: &str, body: &str) {
        self.comments
            .lock()
            .unwrap()
            .entry(target.to_string())
            .or_default()
            .push(body.to_string());
    }

    fn posted_to(&self, target: &str) -> Vec<String> {
        self.posted
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == target)
            .map(|(_, b)| b.clone())
            .collect()
    }
}

#[async_trait]
impl TaskStore for FakeHost {
    async fn get(&self, task_url: &str) -> Result<Task, StoreError> {
        self.tasks
            .get(task_url)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(task_url.to_string()))
    }

    async fn get_comments(&self, task_url: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .comments
            .lock()
            .unwrap()
            .get(task_url)
            .cloned()
            .unwrap_or_default())
    }

    async fn post_comment(&self, target_url: &str, body: &str) -> Result<(), StoreError> {
        self.posted
            .lock()
            .unwrap()
            .push((target_url.to_string(), body.to_string()));
        self.add_comment(target_url, body);
        Ok(())
    }

    async fn remove_label(&self, _task_url: &str, name: &str) -> Result<(), StoreError> {
        self.removed_labels.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

#[async_trait]
impl ChangeRequestStore for FakeHost {
    async fn switch_to_base(&self, base: &str) -> Result<(), StoreError> {
        self.bases.lock().unwrap().push(base.to_string());
        Ok(())
    }

    async fn create_branch(&self, name: &str) -> Result<(), StoreError> {
        self.branches.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn commit(&self, message: &str) -> Result<bool, StoreError> {
        if self.nothing_to_commit {
            return Ok(false);
        }
        self.commits.lock().unwrap().push(message.to_string());
        Ok(true)
    }

    async fn push_and_open(&self, title: &str, body: &str, _base: &str) -> Result<String, StoreError> {
        if let Some(error) = &self.push_error {
            return Err(StoreError::PermissionDenied(error.clone()));
        }
        self.published
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok(CHANGE_URL.to_string())
    }

    async fn get_diff(&self, _change_url: &str) -> Result<String, StoreError> {
        Ok(self.diff.clone())
    }

    async fn get_comments(&self, change_url: &str) -> Result<String, StoreError> {
        let comments = self.comments.lock().unwrap();
        Ok(comments
            .get(change_url)
            .map(|list| {
                list.iter()
                    .map(|c| format!("[General Comment] bot: {}\n---\n", c))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn checkout(&self, change_url: &str) -> Result<String, StoreError> {
        self.checkouts.lock().unwrap().push(change_url.to_string());
        Ok(self.head_branch.clone())
    }
}

/// Real branches and commits in a local repository; publishing only names the branch
struct LocalChanges {
    tree: WorkTree,
}

#[async_trait]
impl ChangeRequestStore for LocalChanges {
    async fn switch_to_base(&self, base: &str) -> Result<(), StoreError> {
        Ok(self.tree.switch_to_base(base, None)?)
    }

    async fn create_branch(&self, name: &str) -> Result<(), StoreError> {
        Ok(self.tree.create_branch(name)?)
    }

    async fn commit(&self, message: &str) -> Result<bool, StoreError> {
        Ok(self.tree.commit_all(message)?)
    }

    async fn push_and_open(&self, _title: &str, _body: &str, _base: &str) -> Result<String, StoreError> {
        Ok(format!("local://{}", self.tree.current_branch()?))
    }

    async fn get_diff(&self, _change_url: &str) -> Result<String, StoreError> {
        Ok(String::new())
    }

    async fn get_comments(&self, _change_url: &str) -> Result<String, StoreError> {
        Ok(String::new())
    }

    async fn checkout(&self, _change_url: &str) -> Result<String, StoreError> {
        Ok(self.tree.current_branch()?)
    }
}

/// Backend that replays canned responses and records every prompt
struct ScriptedGenerator {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn new(responses: &[&str]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn backend(&self) -> BackendKind {
        BackendKind::OpenAi
    }

    async fn complete(&self, _system: &str, user: &str) -> Result<String, GeneratorError> {
        self.prompts.lock().unwrap().push(user.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| GeneratorError::ExecutionFailed("script exhausted".into()))
    }
}

fn config(dir: &TempDir) -> PipelineConfig {
    PipelineConfig::new(dir.path().to_path_buf()).with_context_strategy(ContextStrategy::Smart)
}

fn logger() -> Arc<Logger> {
    Arc::new(Logger::new(LogFormat::Compact))
}

const ADD_EDIT: &str = "Here is the change.\n\nFile: `math.py`\n```python\ndef add(a, b):\n    return a + b\n```\n";

// ============================================================
// Create-change flow
// ============================================================

#[tokio::test]
async fn test_scenario_a_actionable_task_is_published() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("app.py"), "print('hi')\n").unwrap();
    let host = FakeHost::with_task("Create a function `add(a,b)` in `math.py`");
    let backend = ScriptedGenerator::new(&["[\"app.py\"]", ADD_EDIT]);
    let config = config(&dir);

    let ctx = PipelineContext::new(&host, &host, &backend, &config, logger());
    let outcome = Orchestrator::new(ctx).run(TASK_URL).await.unwrap();

    match &outcome {
        RunOutcome::Published { change_url, branch, files } => {
            assert_eq!(change_url, CHANGE_URL);
            assert!(branch.starts_with("fix/issue-7-"));
            assert_eq!(files, &vec!["math.py".to_string()]);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(
        fs::read_to_string(dir.path().join("math.py")).unwrap(),
        "def add(a, b):\n    return a + b\n"
    );
    assert_eq!(*host.bases.lock().unwrap(), vec!["main"]);
    assert_eq!(host.branches.lock().unwrap().len(), 1);
    assert_eq!(host.commits.lock().unwrap().len(), 1);

    let published = host.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert!(published[0].1.contains("Closes #7"));

    // Selection saw the map; generation saw the selected file and the task
    let prompts = backend.prompts.lock().unwrap();
    assert!(prompts[0].contains("app.py"));
    assert!(prompts[1].contains("print('hi')"));
    assert!(prompts[1].contains("Create a function `add(a,b)`"));
}

#[tokio::test]
async fn test_scenario_b_vague_task_is_rejected() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::with_task("ok");
    let backend = ScriptedGenerator::new(&[ADD_EDIT]);
    let config = config(&dir);

    let ctx = PipelineContext::new(&host, &host, &backend, &config, logger());
    let outcome = Orchestrator::new(ctx).run(TASK_URL).await.unwrap();

    let RunOutcome::Rejected { reason } = &outcome else {
        panic!("unexpected outcome: {:?}", outcome);
    };
    assert!(reason.contains("actionable keyword"));
    assert!(host.bases.lock().unwrap().is_empty());
    assert!(host.branches.lock().unwrap().is_empty());
    assert!(host.published.lock().unwrap().is_empty());
    assert_eq!(backend.calls(), 0);

    let comments = host.posted_to(TASK_URL);
    assert_eq!(comments.len(), 1);
    assert!(comments[0].contains("actionable keyword"));
    assert_eq!(*host.removed_labels.lock().unwrap(), vec!["ready-to-code"]);
}

#[tokio::test]
async fn test_task_comments_count_toward_validation() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::with_task("ok");
    host.add_comment(TASK_URL, "Please add a subtract function to math.py");
    let backend = ScriptedGenerator::new(&["[]", ADD_EDIT]);
    let config = config(&dir);

    let ctx = PipelineContext::new(&host, &host, &backend, &config, logger());
    let outcome = Orchestrator::new(ctx).run(TASK_URL).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Published { .. }));
    assert!(backend.prompts.lock().unwrap()[1].contains("subtract function"));
}

#[tokio::test]
async fn test_no_edits_means_no_branch() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::with_task("Update the README with usage notes");
    let backend = ScriptedGenerator::new(&["[]", "Nothing needs to change."]);
    let config = config(&dir);

    let ctx = PipelineContext::new(&host, &host, &backend, &config, logger());
    let outcome = Orchestrator::new(ctx).run(TASK_URL).await.unwrap();

    assert_eq!(outcome, RunOutcome::NoChanges);
    assert!(host.branches.lock().unwrap().is_empty());
    assert!(host.published.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_backend_outage_is_no_changes() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::with_task("Fix the divide-by-zero in calc.py");
    let backend = ScriptedGenerator::new(&[]);
    let config = config(&dir);

    let ctx = PipelineContext::new(&host, &host, &backend, &config, logger());
    let outcome = Orchestrator::new(ctx).run(TASK_URL).await.unwrap();
    assert_eq!(outcome, RunOutcome::NoChanges);
}

#[tokio::test]
async fn test_unsafe_edit_aborts_before_commit() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::with_task("Fix the parser in parse.py");
    let backend = ScriptedGenerator::new(&[
        "[]",
        "File: `parse.py`\n```python\ndef parse():\n    return []\n```\n\n\
         File: `../outside.py`\n```\nx = 1\n```\n",
    ]);
    let config = config(&dir);

    let ctx = PipelineContext::new(&host, &host, &backend, &config, logger());
    let result = Orchestrator::new(ctx).run(TASK_URL).await;

    assert!(matches!(result, Err(patchloop_core::PipelineError::EditsFailed(_))));
    assert!(host.branches.lock().unwrap().is_empty());
    assert!(host.commits.lock().unwrap().is_empty());
    // The safe edit in the same batch is not left behind for the next run
    assert!(!dir.path().join("parse.py").exists());
    assert!(!dir.path().parent().unwrap().join("outside.py").exists());
}

#[tokio::test]
async fn test_consecutive_tasks_branch_from_base() {
    let dir = TempDir::new().unwrap();
    let mut opts = git2::RepositoryInitOptions::new();
    opts.initial_head("main");
    git2::Repository::init_opts(dir.path(), &opts).unwrap();
    fs::write(dir.path().join("README.md"), "# calc\n").unwrap();
    let tree = WorkTree::discover(dir.path()).unwrap();
    tree.commit_all("initial").unwrap();

    let first_url = "https://github.com/acme/calc/issues/1";
    let second_url = "https://github.com/acme/calc/issues/2";
    let mut host = FakeHost::default();
    host.tasks.insert(
        first_url.to_string(),
        Task::new(first_url, "First", "Create issue1.py with a constant"),
    );
    host.tasks.insert(
        second_url.to_string(),
        Task::new(second_url, "Second", "Create issue2.py with a constant"),
    );
    let changes = LocalChanges { tree };
    let backend = ScriptedGenerator::new(&[
        "[]",
        "File: `issue1.py`\n```python\none = 1\n```\n",
        "[]",
        "File: `issue2.py`\n```python\ntwo = 2\n```\n",
    ]);
    let config = config(&dir);

    let ctx = PipelineContext::new(&host, &changes, &backend, &config, logger());
    let orchestrator = Orchestrator::new(ctx);
    let first = orchestrator.run(first_url).await.unwrap();
    let second = orchestrator.run(second_url).await.unwrap();

    let (RunOutcome::Published { branch: first_branch, .. }, RunOutcome::Published { branch: second_branch, .. }) =
        (&first, &second)
    else {
        panic!("unexpected outcomes: {:?} / {:?}", first, second);
    };

    let repo = git2::Repository::open(dir.path()).unwrap();
    let tip = |name: &str| {
        repo.find_branch(name, git2::BranchType::Local)
            .unwrap()
            .get()
            .peel_to_commit()
            .unwrap()
    };
    let second_tip = tip(second_branch.as_str());
    assert_eq!(second_tip.parent(0).unwrap().message(), Some("initial"));
    let second_tree = second_tip.tree().unwrap();
    assert!(second_tree.get_path(std::path::Path::new("issue2.py")).is_ok());
    assert!(second_tree.get_path(std::path::Path::new("issue1.py")).is_err());
    assert!(tip(first_branch.as_str())
        .tree()
        .unwrap()
        .get_path(std::path::Path::new("issue1.py"))
        .is_ok());
}

#[tokio::test]
async fn test_publish_failure_is_reported_on_task() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost {
        push_error: Some("Resource not accessible by integration".to_string()),
        ..FakeHost::with_task("Create math.py with an add function")
    };
    let backend = ScriptedGenerator::new(&["[]", ADD_EDIT]);
    let config = config(&dir);

    let ctx = PipelineContext::new(&host, &host, &backend, &config, logger());
    let outcome = Orchestrator::new(ctx).run(TASK_URL).await.unwrap();

    let RunOutcome::PublishFailed { branch, error } = &outcome else {
        panic!("unexpected outcome: {:?}", outcome);
    };
    assert!(error.contains("Resource not accessible"));
    assert_eq!(outcome.exit_code(), 3);

    let comments = host.posted_to(TASK_URL);
    assert_eq!(comments.len(), 1);
    assert!(comments[0].contains(branch.as_str()));
    assert!(comments[0].contains("write access"));
}

#[tokio::test]
async fn test_unknown_task_is_an_error() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::with_task("Create something");
    let backend = ScriptedGenerator::new(&[]);
    let config = config(&dir);

    let ctx = PipelineContext::new(&host, &host, &backend, &config, logger());
    let result = Orchestrator::new(ctx)
        .run("https://github.com/acme/calc/issues/999")
        .await;
    assert!(result.is_err());
}

// ============================================================
// Fix loop
// ============================================================

#[tokio::test]
async fn test_scenario_c_exhausted_budget_stops_without_checkout() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::with_task("Create a function add in math.py");
    for i in 0..3 {
        host.add_comment(CHANGE_URL, &format!("[REQUEST_CHANGES]\nround {}", i));
    }
    let backend = ScriptedGenerator::new(&[ADD_EDIT]);
    let config = config(&dir).with_max_iterations(3);

    let ctx = PipelineContext::new(&host, &host, &backend, &config, logger());
    let outcome = FixLoop::new(ctx, ChangeLocks::new())
        .run_fix(CHANGE_URL, TASK_URL)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        RunOutcome::BudgetExhausted {
            rejections: 3,
            max_iterations: 3
        }
    );
    assert_eq!(outcome.exit_code(), 1);
    assert!(host.checkouts.lock().unwrap().is_empty());
    assert_eq!(backend.calls(), 0);

    let comments = host.posted_to(CHANGE_URL);
    assert_eq!(comments.len(), 1);
    assert!(comments[0].contains("human intervention"));
}

#[tokio::test]
async fn test_under_budget_revises_on_same_branch() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("math.py"), "def add(a, b):\n    return a - b\n").unwrap();
    let host = FakeHost {
        diff: "File: math.py\nStatus: added\nPatch:\n+    return a - b\n---\n".to_string(),
        ..FakeHost::with_task("Create a function add in math.py")
    };
    host.add_comment(CHANGE_URL, "[REQUEST_CHANGES]\nadd() subtracts instead of adding");
    let backend = ScriptedGenerator::new(&["[\"math.py\"]", ADD_EDIT]);
    let config = config(&dir).with_max_iterations(3);

    let ctx = PipelineContext::new(&host, &host, &backend, &config, logger());
    let outcome = FixLoop::new(ctx, ChangeLocks::new())
        .run_fix(CHANGE_URL, TASK_URL)
        .await
        .unwrap();

    match &outcome {
        RunOutcome::Published { change_url, branch, .. } => {
            assert_eq!(change_url, CHANGE_URL);
            assert_eq!(branch, "fix/issue-7-1");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(*host.checkouts.lock().unwrap(), vec![CHANGE_URL]);
    assert!(host.branches.lock().unwrap().is_empty());
    assert_eq!(
        fs::read_to_string(dir.path().join("math.py")).unwrap(),
        "def add(a, b):\n    return a + b\n"
    );

    let prompts = backend.prompts.lock().unwrap();
    let revision = &prompts[1];
    assert!(revision.contains("subtracts instead of adding"));
    assert!(revision.contains("+    return a - b"));
    assert!(revision.contains("return a - b\n"));
}

#[tokio::test]
async fn test_budget_is_rederived_on_every_run() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::with_task("Create a function add in math.py");
    host.add_comment(CHANGE_URL, "[REQUEST_CHANGES]\nfirst");
    let backend = ScriptedGenerator::new(&["[]", ADD_EDIT]);
    let config = config(&dir).with_max_iterations(2);
    let locks = ChangeLocks::new();

    let ctx = PipelineContext::new(&host, &host, &backend, &config, logger());
    let fix_loop = FixLoop::new(ctx, locks);
    let first = fix_loop.run_fix(CHANGE_URL, TASK_URL).await.unwrap();
    assert!(matches!(first, RunOutcome::Published { .. }));

    host.add_comment(CHANGE_URL, "[REQUEST_CHANGES]\nsecond");
    let second = fix_loop.run_fix(CHANGE_URL, TASK_URL).await.unwrap();
    assert_eq!(
        second,
        RunOutcome::BudgetExhausted {
            rejections: 2,
            max_iterations: 2
        }
    );
}

#[tokio::test]
async fn test_identical_regeneration_is_no_changes() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost {
        nothing_to_commit: true,
        ..FakeHost::with_task("Create a function add in math.py")
    };
    let backend = ScriptedGenerator::new(&["[]", ADD_EDIT]);
    let config = config(&dir);

    let ctx = PipelineContext::new(&host, &host, &backend, &config, logger());
    let outcome = FixLoop::new(ctx, ChangeLocks::new())
        .run_fix(CHANGE_URL, TASK_URL)
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::NoChanges);
    assert!(host.published.lock().unwrap().is_empty());
}

// ============================================================
// Review
// ============================================================

#[tokio::test]
async fn test_review_posts_verdict_and_feeds_budget() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost {
        diff: "File: math.py\nStatus: added\nPatch:\n+def add(a, b): return a - b\n---\n".to_string(),
        ..FakeHost::with_task("Create a function add in math.py")
    };
    let backend = ScriptedGenerator::new(&[
        "[REQUEST_CHANGES]\nadd() subtracts",
        "Looks fine to me.\n[APPROVE]",
    ]);
    let config = config(&dir);

    let ctx = PipelineContext::new(&host, &host, &backend, &config, logger());
    let runner = ReviewRunner::new(ctx);

    let first = runner.review(CHANGE_URL, TASK_URL).await.unwrap();
    assert_eq!(
        first,
        RunOutcome::Reviewed {
            change_url: CHANGE_URL.to_string(),
            decision: Decision::RequestChanges
        }
    );

    // Prose before the tag is a rejection, and the posted comment says so
    let second = runner.review(CHANGE_URL, TASK_URL).await.unwrap();
    assert!(matches!(
        second,
        RunOutcome::Reviewed {
            decision: Decision::RequestChanges,
            ..
        }
    ));

    let comments = host.posted_to(CHANGE_URL);
    assert_eq!(comments.len(), 2);
    assert!(comments[0].starts_with("[REQUEST_CHANGES]"));
    assert!(comments[1].starts_with("[REQUEST_CHANGES]"));

    let history = ChangeRequestStore::get_comments(&host, CHANGE_URL).await.unwrap();
    assert_eq!(patchloop_review::count_rejections(&history), 2);
}

#[tokio::test]
async fn test_review_approves_on_leading_tag() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::with_task("Create a function add in math.py");
    let backend = ScriptedGenerator::new(&["[APPROVE]\nClean and complete."]);
    let config = config(&dir);

    let ctx = PipelineContext::new(&host, &host, &backend, &config, logger());
    let outcome = ReviewRunner::new(ctx).review(CHANGE_URL, TASK_URL).await.unwrap();
    assert!(matches!(
        outcome,
        RunOutcome::Reviewed {
            decision: Decision::Approve,
            ..
        }
    ));
    assert!(host.posted_to(CHANGE_URL)[0].starts_with("[APPROVE]"));
}

#[tokio::test]
async fn test_empty_review_is_fail_closed() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::with_task("Create a function add in math.py");
    let backend = ScriptedGenerator::new(&[]);
    let config = config(&dir);

    let ctx = PipelineContext::new(&host, &host, &backend, &config, logger());
    let outcome = ReviewRunner::new(ctx).review(CHANGE_URL, TASK_URL).await.unwrap();
    assert!(matches!(
        outcome,
        RunOutcome::Reviewed {
            decision: Decision::RequestChanges,
            ..
        }
    ));
    assert!(host.posted_to(CHANGE_URL)[0].starts_with("[REQUEST_CHANGES]"));
}

use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use workflow_pr_tagger::{
    Error, GitHubApi, RepoRef, Result, RunOptions,
    github::models::{
        HeadCommit, Label, LabelUpdate, PullRequest, Repository, User, WorkflowRun,
    },
    pipeline::{self, PathFilter, TagOutcome},
};

const RUN_ID: u64 = 1234;
const WORKFLOW_ID: u64 = 42;
const TAG: &str = "your-tag";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    GetWorkflowRun(u64),
    GetRepository,
    ListRuns {
        workflow_id: u64,
        branch: String,
        per_page: u8,
    },
    Compare {
        base: String,
        head: String,
    },
    CommitFiles(String),
    PullsForCommit(String),
    UpdateLabels {
        number: u64,
        labels: Vec<String>,
    },
}

/// An in-memory GitHub recording every call it receives.
#[derive(Default)]
struct FakeGitHub {
    default_branch: String,
    runs: HashMap<u64, WorkflowRun>,
    successful_runs: Vec<WorkflowRun>,
    comparison: Vec<String>,
    commit_files: HashMap<String, Vec<String>>,
    transient_commits: HashSet<String>,
    rejected_commits: HashSet<String>,
    missing_pull_lookups: HashSet<String>,
    rejected_pull_lookups: HashSet<String>,
    pull_requests: HashMap<String, Vec<PullRequest>>,
    refused_updates: HashMap<u64, u16>,
    calls: Mutex<Vec<Call>>,
}

impl FakeGitHub {
    fn new(run: WorkflowRun) -> Self {
        Self {
            default_branch: "main".to_owned(),
            runs: HashMap::from([(run.id, run)]),
            ..Self::default()
        }
    }

    fn with_successful_runs(mut self, runs: Vec<WorkflowRun>) -> Self {
        self.successful_runs = runs;
        self
    }

    fn with_comparison(mut self, commits: &[&str]) -> Self {
        self.comparison = commits.iter().map(|sha| (*sha).to_owned()).collect();
        self
    }

    fn with_files(mut self, sha: &str, files: &[&str]) -> Self {
        self.commit_files.insert(
            sha.to_owned(),
            files.iter().map(|file| (*file).to_owned()).collect(),
        );
        self
    }

    fn with_pull_requests(mut self, sha: &str, pull_requests: Vec<PullRequest>) -> Self {
        self.pull_requests.insert(sha.to_owned(), pull_requests);
        self
    }

    fn rejected(sha: &str) -> Error {
        Error::Rejected {
            url: format!("https://api.github.com/repos/your-owner/your-repo/commits/{sha}"),
            status: 422,
            message: format!("No commit found for SHA: {sha}"),
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&Call) -> bool,
    {
        self.calls.lock().iter().filter(|call| predicate(*call)).count()
    }

    fn updates(&self) -> Vec<(u64, Vec<String>)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::UpdateLabels { number, labels } => Some((*number, labels.clone())),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl GitHubApi for FakeGitHub {
    async fn get_workflow_run(&self, _repo: &RepoRef, run_id: u64) -> Result<WorkflowRun> {
        self.record(Call::GetWorkflowRun(run_id));
        self.runs
            .get(&run_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("run {run_id}")))
    }

    async fn get_repository(&self, _repo: &RepoRef) -> Result<Repository> {
        self.record(Call::GetRepository);
        Ok(Repository {
            default_branch: self.default_branch.clone(),
        })
    }

    async fn list_successful_workflow_runs(
        &self,
        _repo: &RepoRef,
        workflow_id: u64,
        branch: &str,
        per_page: u8,
    ) -> Result<Vec<WorkflowRun>> {
        self.record(Call::ListRuns {
            workflow_id,
            branch: branch.to_owned(),
            per_page,
        });
        Ok(self
            .successful_runs
            .iter()
            .take(usize::from(per_page))
            .cloned()
            .collect())
    }

    async fn compare_commits(
        &self,
        _repo: &RepoRef,
        base: &str,
        head: &str,
    ) -> Result<Vec<String>> {
        self.record(Call::Compare {
            base: base.to_owned(),
            head: head.to_owned(),
        });
        Ok(self.comparison.clone())
    }

    async fn get_commit_files(&self, _repo: &RepoRef, sha: &str) -> Result<Vec<String>> {
        self.record(Call::CommitFiles(sha.to_owned()));
        if self.transient_commits.contains(sha) {
            return Err(Error::Transient(format!("rate limited on {sha}")));
        }
        if self.rejected_commits.contains(sha) {
            return Err(Self::rejected(sha));
        }
        self.commit_files
            .get(sha)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("commit {sha}")))
    }

    async fn list_pull_requests_for_commit(
        &self,
        _repo: &RepoRef,
        sha: &str,
    ) -> Result<Vec<PullRequest>> {
        self.record(Call::PullsForCommit(sha.to_owned()));
        if self.missing_pull_lookups.contains(sha) {
            return Err(Error::NotFound(format!("commit {sha}")));
        }
        if self.rejected_pull_lookups.contains(sha) {
            return Err(Self::rejected(sha));
        }
        Ok(self.pull_requests.get(sha).cloned().unwrap_or_default())
    }

    async fn update_issue_labels(
        &self,
        _repo: &RepoRef,
        issue_number: u64,
        labels: &[String],
    ) -> Result<LabelUpdate> {
        self.record(Call::UpdateLabels {
            number: issue_number,
            labels: labels.to_vec(),
        });
        Ok(match self.refused_updates.get(&issue_number) {
            Some(status) => LabelUpdate {
                status: *status,
                reason: Some("Validation Failed".to_owned()),
            },
            None => LabelUpdate {
                status: 200,
                reason: None,
            },
        })
    }
}

fn workflow_run(head_commit: Option<&str>) -> WorkflowRun {
    WorkflowRun {
        id: RUN_ID,
        workflow_id: WORKFLOW_ID,
        head_branch: None,
        head_sha: head_commit.map(str::to_owned),
        head_commit: head_commit.map(|id| HeadCommit { id: id.to_owned() }),
        created_at: None,
    }
}

fn successful_run(id: u64, head_sha: &str) -> WorkflowRun {
    WorkflowRun {
        id,
        workflow_id: WORKFLOW_ID,
        head_branch: Some("main".to_owned()),
        head_sha: Some(head_sha.to_owned()),
        head_commit: Some(HeadCommit {
            id: head_sha.to_owned(),
        }),
        created_at: None,
    }
}

fn pull_request(number: u64, labels: &[&str]) -> PullRequest {
    PullRequest {
        number,
        url: format!("https://github.com/your-owner/your-repo/pull/{number}"),
        html_url: None,
        labels: labels
            .iter()
            .map(|name| Label {
                name: (*name).to_owned(),
            })
            .collect(),
        user: Some(User {
            login: "octocat".to_owned(),
        }),
    }
}

fn options(paths: &[&str]) -> RunOptions {
    RunOptions {
        paths: paths.iter().map(|path| (*path).to_owned()).collect(),
        ..RunOptions::new(RepoRef::new("your-owner", "your-repo"), RUN_ID, TAG)
    }
}

#[tokio::test]
async fn updates_pull_request_with_a_new_tag() {
    let api = FakeGitHub::new(workflow_run(Some("commit-id")))
        .with_successful_runs(vec![
            successful_run(12345, "last-commit-id"),
            successful_run(12346, "last-commit-id"),
        ])
        .with_comparison(&["commit-id"])
        .with_files("commit-id", &["path/to/your/file"])
        .with_pull_requests("commit-id", vec![pull_request(123, &[])]);

    let summary = pipeline::run(&api, &options(&["path/to/your/file"]))
        .await
        .unwrap();

    assert_eq!(api.updates(), vec![(123, vec![TAG.to_owned()])]);
    let calls = api.calls();
    assert!(calls.contains(&Call::ListRuns {
        workflow_id: WORKFLOW_ID,
        branch: "main".to_owned(),
        per_page: 10,
    }));
    assert!(calls.contains(&Call::Compare {
        base: "last-commit-id".to_owned(),
        head: "commit-id".to_owned(),
    }));
    assert!(calls.contains(&Call::CommitFiles("commit-id".to_owned())));

    assert_eq!(summary.branch, "main");
    assert_eq!(summary.baseline.map(|baseline| baseline.run_id), Some(12345));
    assert_eq!(summary.qualifying_commits, vec!["commit-id"]);
    assert_eq!(summary.outcomes[0].outcome, TagOutcome::Tagged { number: 123 });
    assert_eq!(summary.report.len(), 1);
    assert_eq!(summary.report.entries()[0].author.as_deref(), Some("octocat"));
}

#[tokio::test]
async fn filter_keeps_commits_touching_the_patterns() {
    let api = FakeGitHub::new(workflow_run(Some("commit-id")))
        .with_files("commit-id", &["path/to/your/file"]);
    let filter = PathFilter::new(&["path/to/your/file"]).unwrap().unwrap();

    let qualifying = filter
        .filter_commits(
            &api,
            &RepoRef::new("your-owner", "your-repo"),
            &["commit-id".to_owned()],
            4,
        )
        .await
        .unwrap();

    assert_eq!(qualifying, vec!["commit-id"]);
}

#[tokio::test]
async fn no_pull_request_found_for_the_commit() {
    let api = FakeGitHub::new(workflow_run(Some("commit-id")));

    let summary = pipeline::run(&api, &options(&[])).await.unwrap();

    assert!(api.updates().is_empty());
    assert!(summary.report.is_empty());
    assert_eq!(summary.outcomes.len(), 1);
    assert_eq!(summary.outcomes[0].sha, "commit-id");
    assert_eq!(summary.outcomes[0].outcome, TagOutcome::NoAssociatedPr);
}

#[tokio::test]
async fn dry_run_skips_the_update_but_reports_the_pull_request() {
    let api = FakeGitHub::new(workflow_run(Some("commit-id")))
        .with_pull_requests("commit-id", vec![pull_request(123, &[])]);
    let options = RunOptions {
        dry_run: true,
        ..options(&[])
    };

    let summary = pipeline::run(&api, &options).await.unwrap();

    assert!(api.updates().is_empty());
    assert_eq!(
        summary.outcomes[0].outcome,
        TagOutcome::DryRunSkipped { number: 123 }
    );
    assert_eq!(summary.report.len(), 1);
    assert_eq!(summary.report.entries()[0].number, 123);
}

#[tokio::test]
async fn runs_without_a_head_commit_tag_nothing() {
    let api = FakeGitHub::new(workflow_run(None))
        .with_successful_runs(vec![successful_run(12345, "last-commit-id")]);

    let summary = pipeline::run(&api, &options(&["src/**"])).await.unwrap();

    assert_eq!(api.count(|call| matches!(call, Call::PullsForCommit(_))), 0);
    assert!(api.updates().is_empty());
    assert!(summary.report.is_empty());
    assert!(summary.outcomes.is_empty());
    assert_eq!(summary.head_sha, None);
}

#[tokio::test]
async fn each_pull_request_is_updated_once() {
    let api = FakeGitHub::new(workflow_run(Some("head")))
        .with_successful_runs(vec![successful_run(12345, "base")])
        .with_comparison(&["first", "second", "head"])
        .with_files("first", &["src/lib.rs"])
        .with_files("second", &["src/main.rs"])
        .with_files("head", &["README.md"])
        .with_pull_requests("head", vec![pull_request(123, &[])])
        .with_pull_requests("first", vec![pull_request(123, &[])])
        .with_pull_requests("second", vec![pull_request(123, &[])]);

    let summary = pipeline::run(&api, &options(&["src/*.rs"])).await.unwrap();

    assert_eq!(api.updates().len(), 1);
    assert_eq!(summary.qualifying_commits, vec!["head", "first", "second"]);
    let outcomes: Vec<_> = summary
        .outcomes
        .iter()
        .map(|outcome| outcome.outcome.clone())
        .collect();
    assert_eq!(
        outcomes,
        vec![
            TagOutcome::Tagged { number: 123 },
            TagOutcome::AlreadyQueued { number: 123 },
            TagOutcome::AlreadyQueued { number: 123 },
        ]
    );
    assert_eq!(summary.report.len(), 1);
}

#[tokio::test]
async fn filtered_commits_bring_their_own_pull_requests() {
    let api = FakeGitHub::new(workflow_run(Some("head")))
        .with_successful_runs(vec![successful_run(12345, "base")])
        .with_comparison(&["docs-only", "code", "head"])
        .with_files("docs-only", &["docs/guide.md"])
        .with_files("code", &["src/pipeline/filter.rs"])
        .with_files("head", &["Cargo.toml"])
        .with_pull_requests("head", vec![pull_request(200, &[])])
        .with_pull_requests("docs-only", vec![pull_request(100, &[])])
        .with_pull_requests("code", vec![pull_request(150, &[])]);

    let summary = pipeline::run(&api, &options(&["src/**"])).await.unwrap();

    assert_eq!(summary.qualifying_commits, vec!["head", "code"]);
    let tagged: Vec<u64> = api.updates().into_iter().map(|(number, _)| number).collect();
    assert_eq!(tagged, vec![200, 150]);
    assert_eq!(
        api.count(|call| *call == Call::PullsForCommit("docs-only".to_owned())),
        0
    );
}

#[tokio::test]
async fn empty_patterns_only_consider_the_head_commit() {
    let api = FakeGitHub::new(workflow_run(Some("commit-id")))
        .with_successful_runs(vec![successful_run(12345, "last-commit-id")])
        .with_comparison(&["other", "commit-id"])
        .with_files("other", &["src/lib.rs"])
        .with_pull_requests("commit-id", vec![pull_request(123, &[])])
        .with_pull_requests("other", vec![pull_request(99, &[])]);

    let summary = pipeline::run(&api, &options(&[])).await.unwrap();

    assert_eq!(api.count(|call| matches!(call, Call::CommitFiles(_))), 0);
    assert_eq!(api.count(|call| matches!(call, Call::ListRuns { .. })), 0);
    assert_eq!(api.count(|call| matches!(call, Call::Compare { .. })), 0);
    assert_eq!(summary.qualifying_commits, vec!["commit-id"]);
    assert_eq!(api.updates(), vec![(123, vec![TAG.to_owned()])]);
}

#[tokio::test]
async fn existing_labels_are_kept() {
    let api = FakeGitHub::new(workflow_run(Some("commit-id")))
        .with_pull_requests("commit-id", vec![pull_request(123, &["a", "b"])]);

    pipeline::run(&api, &options(&[])).await.unwrap();

    let updates = api.updates();
    assert_eq!(updates.len(), 1);
    let (_, labels) = &updates[0];
    assert_eq!(labels.len(), 3);
    let labels: BTreeSet<&str> = labels.iter().map(String::as_str).collect();
    assert_eq!(labels, BTreeSet::from(["a", "b", TAG]));
}

#[tokio::test]
async fn already_present_tag_is_not_duplicated() {
    let api = FakeGitHub::new(workflow_run(Some("commit-id")))
        .with_pull_requests("commit-id", vec![pull_request(123, &[TAG, "a"])]);

    pipeline::run(&api, &options(&[])).await.unwrap();

    assert_eq!(
        api.updates(),
        vec![(123, vec![TAG.to_owned(), "a".to_owned()])]
    );
}

#[tokio::test]
async fn refused_updates_do_not_stop_other_pull_requests() {
    let mut api = FakeGitHub::new(workflow_run(Some("head")))
        .with_successful_runs(vec![successful_run(12345, "base")])
        .with_comparison(&["code", "head"])
        .with_files("code", &["src/lib.rs"])
        .with_pull_requests("head", vec![pull_request(1, &[])])
        .with_pull_requests("code", vec![pull_request(2, &[])]);
    api.refused_updates.insert(1, 422);

    let summary = pipeline::run(&api, &options(&["src/**"])).await.unwrap();

    assert_eq!(api.updates().len(), 2);
    assert!(matches!(
        &summary.outcomes[0].outcome,
        TagOutcome::Failed { number: 1, reason } if reason.starts_with("422")
    ));
    assert_eq!(summary.outcomes[1].outcome, TagOutcome::Tagged { number: 2 });
    assert_eq!(summary.report.len(), 1);
    assert_eq!(summary.report.entries()[0].number, 2);
}

#[tokio::test]
async fn transient_errors_abort_the_run() {
    let mut api = FakeGitHub::new(workflow_run(Some("head")))
        .with_successful_runs(vec![successful_run(12345, "base")])
        .with_comparison(&["flaky", "head"])
        .with_files("head", &["src/lib.rs"])
        .with_pull_requests("head", vec![pull_request(1, &[])]);
    api.transient_commits.insert("flaky".to_owned());

    let result = pipeline::run(&api, &options(&["src/**"])).await;

    assert!(matches!(result, Err(Error::Transient(_))));
    assert!(api.updates().is_empty());
}

#[tokio::test]
async fn vanished_commits_are_skipped() {
    let api = FakeGitHub::new(workflow_run(Some("head")))
        .with_successful_runs(vec![successful_run(12345, "base")])
        .with_comparison(&["rebased-away", "code", "head"])
        .with_files("code", &["src/lib.rs"])
        .with_files("head", &["README.md"])
        .with_pull_requests("code", vec![pull_request(2, &[])]);

    let summary = pipeline::run(&api, &options(&["src/**"])).await.unwrap();

    assert_eq!(summary.qualifying_commits, vec!["head", "code"]);
    assert_eq!(api.updates(), vec![(2, vec![TAG.to_owned()])]);
}

#[tokio::test]
async fn commits_github_refuses_to_resolve_are_skipped() {
    let mut api = FakeGitHub::new(workflow_run(Some("head")))
        .with_successful_runs(vec![successful_run(12345, "base")])
        .with_comparison(&["gone", "orphan", "code", "head"])
        .with_files("orphan", &["src/main.rs"])
        .with_files("code", &["src/lib.rs"])
        .with_files("head", &["README.md"])
        .with_pull_requests("head", vec![pull_request(1, &[])])
        .with_pull_requests("orphan", vec![pull_request(3, &[])])
        .with_pull_requests("code", vec![pull_request(2, &[])]);
    api.rejected_commits.insert("gone".to_owned());
    api.rejected_pull_lookups.insert("orphan".to_owned());

    let summary = pipeline::run(&api, &options(&["src/**"])).await.unwrap();

    assert_eq!(summary.qualifying_commits, vec!["head", "orphan", "code"]);
    let tagged: Vec<u64> = api.updates().into_iter().map(|(number, _)| number).collect();
    assert_eq!(tagged, vec![1, 2]);
    let outcomes: Vec<_> = summary
        .outcomes
        .iter()
        .map(|outcome| outcome.outcome.clone())
        .collect();
    assert_eq!(
        outcomes,
        vec![
            TagOutcome::Tagged { number: 1 },
            TagOutcome::NoAssociatedPr,
            TagOutcome::Tagged { number: 2 },
        ]
    );
}

#[tokio::test]
async fn missing_pull_request_lookups_count_as_no_pull_request() {
    let mut api = FakeGitHub::new(workflow_run(Some("head")))
        .with_successful_runs(vec![successful_run(12345, "base")])
        .with_comparison(&["missing", "code", "head"])
        .with_files("missing", &["src/main.rs"])
        .with_files("code", &["src/lib.rs"])
        .with_files("head", &["src/pipeline/mod.rs"])
        .with_pull_requests("head", vec![pull_request(1, &[])])
        .with_pull_requests("code", vec![pull_request(2, &[])]);
    api.missing_pull_lookups.insert("missing".to_owned());

    let summary = pipeline::run(&api, &options(&["src/**"])).await.unwrap();

    assert_eq!(summary.qualifying_commits, vec!["head", "missing", "code"]);
    assert_eq!(summary.outcomes[1].sha, "missing");
    assert_eq!(summary.outcomes[1].outcome, TagOutcome::NoAssociatedPr);
    let tagged: Vec<u64> = api.updates().into_iter().map(|(number, _)| number).collect();
    assert_eq!(tagged, vec![1, 2]);
    assert_eq!(summary.report.len(), 2);
}

#[tokio::test]
async fn first_successful_run_only_checks_the_head_commit() {
    let api = FakeGitHub::new(workflow_run(Some("head")))
        .with_files("head", &["src/lib.rs"])
        .with_pull_requests("head", vec![pull_request(1, &[])]);

    let summary = pipeline::run(&api, &options(&["src/**"])).await.unwrap();

    assert_eq!(summary.baseline, None);
    assert_eq!(api.count(|call| matches!(call, Call::Compare { .. })), 0);
    assert_eq!(
        api.count(|call| *call == Call::CommitFiles("head".to_owned())),
        1
    );
    assert_eq!(summary.qualifying_commits, vec!["head"]);
}

#[tokio::test]
async fn the_current_run_is_never_its_own_baseline() {
    let api = FakeGitHub::new(workflow_run(Some("head")))
        .with_successful_runs(vec![
            successful_run(RUN_ID, "head"),
            successful_run(1200, "previous"),
        ])
        .with_comparison(&["head"])
        .with_files("head", &["src/lib.rs"]);

    let summary = pipeline::run(&api, &options(&["src/**"])).await.unwrap();

    assert_eq!(
        summary.baseline.map(|baseline| baseline.sha).as_deref(),
        Some("previous")
    );
    assert!(api.calls().contains(&Call::Compare {
        base: "previous".to_owned(),
        head: "head".to_owned(),
    }));
}

#[tokio::test]
async fn the_run_branch_wins_over_the_default_branch() {
    let run = WorkflowRun {
        head_branch: Some("release/1.x".to_owned()),
        ..workflow_run(Some("head"))
    };
    let api = FakeGitHub::new(run).with_files("head", &[]);
    let options = RunOptions {
        baseline_window: 3,
        ..options(&["src/**"])
    };

    let summary = pipeline::run(&api, &options).await.unwrap();

    assert_eq!(summary.branch, "release/1.x");
    assert!(api.calls().contains(&Call::ListRuns {
        workflow_id: WORKFLOW_ID,
        branch: "release/1.x".to_owned(),
        per_page: 3,
    }));
}

#[tokio::test]
async fn unknown_runs_are_not_found() {
    let api = FakeGitHub::new(workflow_run(Some("head")));
    let options = RunOptions {
        run_id: 9999,
        ..options(&[])
    };

    assert!(matches!(
        pipeline::run(&api, &options).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn invalid_options_fail_before_any_request() {
    let api = FakeGitHub::new(workflow_run(Some("head")));
    let options = RunOptions {
        tag: String::new(),
        ..options(&[])
    };

    assert!(matches!(
        pipeline::run(&api, &options).await,
        Err(Error::Validation(_))
    ));
    assert!(api.calls().is_empty());
}

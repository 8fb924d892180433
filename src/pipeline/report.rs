use std::fmt::Write as _;

use crate::github::PullRequest;

/// A pull request that made it into the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    /// The pull request number.
    pub number: u64,
    /// Where a human can look at the pull request.
    pub link: String,
    /// The login of the author.
    pub author: Option<String>,
}

/// The pull requests tagged during a run, in the order they were tagged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    entries: Vec<ReportEntry>,
}

impl RunReport {
    pub(crate) fn push(&mut self, pull_request: &PullRequest) {
        self.entries.push(ReportEntry {
            number: pull_request.number,
            link: pull_request.link().to_owned(),
            author: pull_request.author().map(str::to_owned),
        });
    }

    /// The reported pull requests.
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Whether no pull request was tagged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The number of tagged pull requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Renders the report as a markdown heading followed by a table of pull requests and authors.
    pub fn to_markdown(&self, tag: &str) -> String {
        let mut markdown = format!("## Pull requests tagged with `{tag}`\n\n");
        if self.entries.is_empty() {
            markdown.push_str("No pull requests were tagged.\n");
            return markdown;
        }

        markdown.push_str("| Pull request | Author |\n| --- | --- |\n");
        for entry in &self.entries {
            let author = match &entry.author {
                Some(author) => format!("@{author}"),
                None => "unknown".to_owned(),
            };
            // Writing to a `String` never fails.
            drop(writeln!(
                markdown,
                "| [#{}]({}) | {author} |",
                entry.number, entry.link
            ));
        }
        markdown
    }
}

//! Labels such as `TransportRequest: 12345` found in commit messages.

use regex::Regex;

use crate::error::{Error, Result};
use crate::exec::{run_checked, ProcessRunner};

const RECORD_END: char = '\u{1e}';
const FIELD_END: char = '\u{1f}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: String,
    pub message: String,
}

fn label_pattern(label: &str) -> Result<Regex> {
    Regex::new(&format!("{}: (.*)", regex::escape(label))).map_err(|e| {
        Error::validation_invalid_argument("label", format!("Cannot extract label: {}", e), None)
    })
}

fn push_unique(values: &mut Vec<String>, value: String) {
    if !values.contains(&value) {
        values.push(value);
    }
}

/// Distinct label values over all commits, in commit order. A commit carrying
/// two different values for the same label is an error.
pub fn find_labels_in_commits(commits: &[Commit], label: &str) -> Result<Vec<String>> {
    let pattern = label_pattern(label)?;
    let mut all = Vec::new();
    for commit in commits {
        let mut found = Vec::new();
        for caps in pattern.captures_iter(&commit.message) {
            push_unique(&mut found, caps[1].trim().to_string());
        }
        if found.len() > 1 {
            return Err(Error::validation_invalid_argument(
                label,
                format!(
                    "Found more than one labels ({}) in commit '{}': [{}]",
                    label,
                    commit.id,
                    found.join(", ")
                ),
                None,
            ));
        }
        for value in found {
            push_unique(&mut all, value);
        }
    }
    Ok(all)
}

/// Commits reachable from `to` but not from `from`, newest first.
pub fn commits_in_range(runner: &mut dyn ProcessRunner, from: &str, to: &str) -> Result<Vec<Commit>> {
    let args = vec![
        "log".to_string(),
        "--format=%H%x1f%B%x1e".to_string(),
        format!("{}..{}", from, to),
    ];
    let output = run_checked(runner, "git", &args)?;
    Ok(parse_log(&output.stdout))
}

fn parse_log(raw: &str) -> Vec<Commit> {
    raw.split(RECORD_END)
        .filter_map(|record| {
            let (id, message) = record.split_once(FIELD_END)?;
            let id = id.trim();
            (!id.is_empty()).then(|| Commit {
                id: id.to_string(),
                message: message.to_string(),
            })
        })
        .collect()
}

/// The single value of `label` in the commit range.
pub fn find_id_in_range(
    runner: &mut dyn ProcessRunner,
    label: &str,
    from: &str,
    to: &str,
) -> Result<String> {
    let commits = commits_in_range(runner, from, to)?;
    let mut ids = find_labels_in_commits(&commits, label)?;
    match ids.len() {
        0 => Err(Error::validation_invalid_argument(
            label,
            format!("No values found for '{}' in range '{}..{}'", label, from, to),
            None,
        )),
        1 => Ok(ids.remove(0)),
        _ => Err(Error::validation_invalid_argument(
            label,
            format!(
                "More than one values found for label '{}' in range '{}..{}': [{}]",
                label,
                from,
                to,
                ids.join(", ")
            ),
            None,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use crate::testing::RecordingRunner;

    fn commit(id: &str, message: &str) -> Commit {
        Commit {
            id: id.into(),
            message: message.into(),
        }
    }

    #[test]
    fn label_found_in_commit_body() {
        let commits = vec![
            commit("a1", "Fix the thing\n\nTransportRequest: 12345678\n"),
            commit("b2", "Unrelated change\n"),
        ];
        assert_eq!(
            find_labels_in_commits(&commits, "TransportRequest").unwrap(),
            vec!["12345678"]
        );
    }

    #[test]
    fn same_value_in_several_commits_is_reported_once() {
        let commits = vec![
            commit("a1", "TransportRequest: 111"),
            commit("b2", "TransportRequest: 111\nTransportRequest: 111"),
        ];
        assert_eq!(
            find_labels_in_commits(&commits, "TransportRequest").unwrap(),
            vec!["111"]
        );
    }

    #[test]
    fn two_values_in_one_commit_fail() {
        let commits = vec![commit("a1", "TransportRequest: 111\nTransportRequest: 222")];
        let err = find_labels_in_commits(&commits, "TransportRequest").unwrap_err();
        assert_eq!(
            err.message,
            "Found more than one labels (TransportRequest) in commit 'a1': [111, 222]"
        );
    }

    #[test]
    fn id_from_git_log() {
        let log = "a1\u{1f}Change\n\nTransportRequest: 12345678\n\u{1e}\nb2\u{1f}Other\n\u{1e}\n";
        let mut runner = RecordingRunner::new().respond("git log", CommandOutput::ok(log));
        let id = find_id_in_range(&mut runner, "TransportRequest", "origin/master", "HEAD").unwrap();
        assert_eq!(id, "12345678");
        assert_eq!(
            runner.lines(),
            vec!["git log --format=%H%x1f%B%x1e origin/master..HEAD"]
        );
    }

    #[test]
    fn distinct_ids_in_range_fail() {
        let log = "a1\u{1f}TransportRequest: 1\n\u{1e}b2\u{1f}TransportRequest: 2\n\u{1e}";
        let mut runner = RecordingRunner::new().respond("git log", CommandOutput::ok(log));
        let err = find_id_in_range(&mut runner, "TransportRequest", "origin/master", "HEAD")
            .unwrap_err();
        assert!(err.message.starts_with("More than one values found"));
    }

    #[test]
    fn no_id_in_range_fails() {
        let mut runner = RecordingRunner::new().respond("git log", CommandOutput::ok(""));
        let err = find_id_in_range(&mut runner, "TransportRequest", "origin/master", "HEAD")
            .unwrap_err();
        assert_eq!(
            err.message,
            "No values found for 'TransportRequest' in range 'origin/master..HEAD'"
        );
    }
}

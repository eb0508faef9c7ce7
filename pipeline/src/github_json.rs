//! Maps raw GitHub REST v3 JSON (as returned by `gh-client`, which hands
//! back `serde_json::Value` for anything beyond a search page) onto our
//! canonical raw types. Deliberately tolerant of missing fields — GHES
//! instances and older API versions omit things upstream GitHub always
//! sends.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::model::{CommitFile, CommitRaw, IssueRaw, PrComment, PrFile, PrRaw, PrReview, ReviewState};

pub fn str_field(v: &Value, key: &str) -> String {
    v.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

pub fn opt_str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(str::to_string)
}

pub fn u64_field(v: &Value, key: &str) -> u64 {
    v.get(key).and_then(Value::as_u64).unwrap_or(0)
}

pub fn bool_field(v: &Value, key: &str) -> bool {
    v.get(key).and_then(Value::as_bool).unwrap_or(false)
}

pub fn datetime_field(v: &Value, key: &str) -> Option<DateTime<Utc>> {
    v.get(key)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn login_of(v: &Value, user_key: &str) -> String {
    v.get(user_key)
        .and_then(|u| u.get("login"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub fn labels_of(v: &Value) -> Vec<String> {
    v.get("labels")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|l| l.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// GitHub search items carry `repository_url: "https://api.<host>/repos/{owner}/{repo}"`.
pub fn owner_repo_from_repository_url(url: &str) -> Option<(String, String)> {
    let idx = url.find("/repos/")?;
    let tail = &url[idx + "/repos/".len()..];
    let mut parts = tail.splitn(2, '/');
    let owner = parts.next()?.to_string();
    let repo = parts.next()?.trim_end_matches('/').to_string();
    Some((owner, repo))
}

/// `pull_request.url` on a search/issues item that represents a PR, else
/// `None` (a plain issue has no `pull_request` key).
pub fn pr_api_url_of(item: &Value) -> Option<String> {
    item.get("pull_request")
        .and_then(|pr| pr.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

pub fn pr_raw_from_get_pr(
    repo: &str,
    pr: &Value,
    files: Vec<Value>,
    comments: Vec<Value>,
    reviews: Vec<Value>,
) -> PrRaw {
    let number = u64_field(pr, "number");
    let merged_at = datetime_field(pr, "merged_at");

    let files: Vec<PrFile> = files
        .iter()
        .map(|f| PrFile {
            filename: str_field(f, "filename"),
            additions: u64_field(f, "additions"),
            deletions: u64_field(f, "deletions"),
            status: str_field(f, "status"),
            patch: opt_str_field(f, "patch").filter(|p| !p.is_empty()),
        })
        .collect();

    let comments: Vec<PrComment> = comments
        .iter()
        .map(|c| PrComment {
            author: login_of(c, "user"),
            body: str_field(c, "body"),
            created_at: datetime_field(c, "created_at").unwrap_or_else(Utc::now),
            url: str_field(c, "html_url"),
            path: opt_str_field(c, "path"),
            line: c.get("line").and_then(Value::as_u64).or_else(|| c.get("original_line").and_then(Value::as_u64)),
            diff_hunk: opt_str_field(c, "diff_hunk"),
        })
        .collect();

    let reviews: Vec<PrReview> = reviews
        .iter()
        .filter_map(|r| {
            let state = match str_field(r, "state").as_str() {
                "APPROVED" => ReviewState::Approved,
                "CHANGES_REQUESTED" => ReviewState::ChangesRequested,
                "COMMENTED" => ReviewState::Commented,
                _ => return None,
            };
            Some(PrReview {
                author: login_of(r, "user"),
                state,
                body: str_field(r, "body"),
                submitted_at: datetime_field(r, "submitted_at").unwrap_or_else(Utc::now),
                url: str_field(r, "html_url"),
            })
        })
        .collect();

    PrRaw {
        repo: repo.to_string(),
        number,
        html_url: str_field(pr, "html_url"),
        api_url: str_field(pr, "url"),
        title: str_field(pr, "title"),
        body: str_field(pr, "body"),
        state: str_field(pr, "state"),
        is_merged: merged_at.is_some() || bool_field(pr, "merged"),
        created_at: datetime_field(pr, "created_at").unwrap_or_else(Utc::now),
        updated_at: datetime_field(pr, "updated_at").unwrap_or_else(Utc::now),
        merged_at,
        author: login_of(pr, "user"),
        labels: labels_of(pr),
        files,
        comments,
        reviews,
    }
}

pub fn commit_raw_from_get_commit(repo: &str, commit: &Value) -> CommitRaw {
    let sha = str_field(commit, "sha");
    let commit_obj = commit.get("commit").cloned().unwrap_or(Value::Null);
    let author_date = commit_obj
        .get("author")
        .and_then(|a| datetime_field(a, "date"))
        .unwrap_or_else(Utc::now);
    let message = str_field(&commit_obj, "message");

    // The committer login lives on the top-level `author`/`committer` object
    // (a GitHub user), not inside the nested raw commit metadata.
    let author = login_of(commit, "author");

    let files: Vec<CommitFile> = commit
        .get("files")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .map(|f| CommitFile {
                    filename: str_field(f, "filename"),
                    additions: u64_field(f, "additions"),
                    deletions: u64_field(f, "deletions"),
                    status: str_field(f, "status"),
                })
                .collect()
        })
        .unwrap_or_default();

    CommitRaw {
        sha,
        repo: repo.to_string(),
        html_url: str_field(commit, "html_url"),
        api_url: str_field(commit, "url"),
        message,
        author,
        committed_at: author_date,
        files,
    }
}

pub fn issue_raw_from_get_issue(repo: &str, issue: &Value, comments: Vec<Value>) -> IssueRaw {
    let comments: Vec<PrComment> = comments
        .iter()
        .map(|c| PrComment {
            author: login_of(c, "user"),
            body: str_field(c, "body"),
            created_at: datetime_field(c, "created_at").unwrap_or_else(Utc::now),
            url: str_field(c, "html_url"),
            path: None,
            line: None,
            diff_hunk: None,
        })
        .collect();

    IssueRaw {
        repo: repo.to_string(),
        number: u64_field(issue, "number"),
        html_url: str_field(issue, "html_url"),
        api_url: str_field(issue, "url"),
        title: str_field(issue, "title"),
        body: str_field(issue, "body"),
        state: str_field(issue, "state"),
        created_at: datetime_field(issue, "created_at").unwrap_or_else(Utc::now),
        updated_at: datetime_field(issue, "updated_at").unwrap_or_else(Utc::now),
        closed_at: datetime_field(issue, "closed_at"),
        labels: labels_of(issue),
        author: login_of(issue, "user"),
        comments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_owner_repo_from_repository_url() {
        let url = "https://api.github.com/repos/acme/widgets";
        assert_eq!(
            owner_repo_from_repository_url(url),
            Some(("acme".to_string(), "widgets".to_string()))
        );
    }

    #[test]
    fn search_item_without_pull_request_key_is_a_plain_issue() {
        let item = json!({"number": 5, "repository_url": "https://api.github.com/repos/a/b"});
        assert!(pr_api_url_of(&item).is_none());
    }

    #[test]
    fn search_item_with_pull_request_key_yields_its_api_url() {
        let item = json!({
            "number": 5,
            "pull_request": {"url": "https://api.github.com/repos/a/b/pulls/5"}
        });
        assert_eq!(
            pr_api_url_of(&item).as_deref(),
            Some("https://api.github.com/repos/a/b/pulls/5")
        );
    }
}

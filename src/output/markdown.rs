//! Markdown summary generation
//!
//! This module generates a human-readable markdown summary of a harvest run,
//! including outcome counts, failed links, and the exported files.

use crate::output::traits::{OutputResult, RunSummary};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Escapes characters that would break a markdown table cell
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Writes a markdown summary of a run to `output_path`
///
/// # Arguments
///
/// * `summary` - The run summary data
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(summary: &RunSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_summary(summary: &RunSummary) -> String {
    let mut md = String::new();

    md.push_str("# Course Harvest Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Run ID**: {}\n", summary.run_id));
    md.push_str(&format!("- **Started**: {}\n", summary.started_at));
    if let Some(finished) = &summary.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished));
    }
    if let Some(duration) = summary.duration_seconds {
        md.push_str(&format!(
            "- **Duration**: {} seconds ({:.2} minutes)\n",
            duration,
            duration as f64 / 60.0
        ));
    }
    md.push_str(&format!("- **Status**: {}\n", summary.status));
    md.push_str(&format!("- **Termination**: {}\n", summary.termination));
    md.push_str(&format!("- **Config Hash**: {}\n\n", summary.config_hash));

    // Outcomes
    md.push_str("## Outcomes\n\n");
    md.push_str(&format!("- **Listing Pages**: {}\n", summary.listing_pages));
    md.push_str(&format!("- **Links Discovered**: {}\n", summary.discovered));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n\n",
        summary.success_rate()
    ));

    md.push_str("| Outcome | Count |\n");
    md.push_str("|---------|-------|\n");
    md.push_str(&format!("| Done | {} |\n", summary.done));
    md.push_str(&format!("| Skipped (duplicate) | {} |\n", summary.skipped));
    md.push_str(&format!("| Failed | {} |\n", summary.failed));
    md.push_str(&format!(
        "| Not attempted | {} |\n\n",
        summary.not_attempted
    ));

    if !summary.failures.is_empty() {
        md.push_str("## Failed Links\n\n");
        md.push_str("| Link | Error | Attempts | Message |\n");
        md.push_str("|------|-------|----------|---------|\n");

        for failure in &summary.failures {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                cell(&failure.link),
                failure.error_kind,
                failure.attempts,
                cell(&failure.message)
            ));
        }
        md.push('\n');
    }

    if !summary.not_attempted_links.is_empty() {
        md.push_str("## Links Not Attempted\n\n");
        md.push_str("The run stopped before these links were started; ");
        md.push_str("`--retry-failed` picks them up.\n\n");
        for link in &summary.not_attempted_links {
            md.push_str(&format!("- {}\n", link));
        }
        md.push('\n');
    }

    if !summary.listing_failures.is_empty() {
        md.push_str("## Listing Pages Not Fetched\n\n");
        for (url, error) in &summary.listing_failures {
            md.push_str(&format!("- {}: {}\n", url, error));
        }
        md.push('\n');
    }

    if !summary.exported_files.is_empty() {
        md.push_str("## Exported Files\n\n");
        for path in &summary.exported_files {
            md.push_str(&format!("- `{}`\n", path.display()));
        }
        md.push('\n');
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FailureRecord;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_test_summary() -> RunSummary {
        let mut summary = RunSummary::new();
        summary.run_id = 3;
        summary.started_at = "2024-01-01T00:00:00Z".to_string();
        summary.finished_at = Some("2024-01-01T00:10:00Z".to_string());
        summary.duration_seconds = Some(600);
        summary.status = "completed".to_string();
        summary.termination = "completed".to_string();
        summary.config_hash = "abc123".to_string();
        summary.listing_pages = 2;
        summary.discovered = 42;
        summary.done = 30;
        summary.skipped = 10;
        summary.failed = 2;
        summary
    }

    #[test]
    fn test_format_markdown_summary() {
        let markdown = format_markdown_summary(&create_test_summary());

        assert!(markdown.contains("# Course Harvest Summary"));
        assert!(markdown.contains("- **Run ID**: 3"));
        assert!(markdown.contains("| Done | 30 |"));
        assert!(markdown.contains("| Skipped (duplicate) | 10 |"));
        assert!(markdown.contains("| Failed | 2 |"));
        assert!(markdown.contains("- **Links Discovered**: 42"));
        assert!(!markdown.contains("## Failed Links"));
    }

    #[test]
    fn test_markdown_with_failures() {
        let mut summary = create_test_summary();
        summary.failures = vec![FailureRecord {
            link: "https://www.udemy.com/course/broken".to_string(),
            search_term: None,
            error_kind: "missing_field".to_string(),
            message: "missing required field 'title'".to_string(),
            attempts: 1,
        }];
        summary.listing_failures = vec![(
            "https://www.udemy.com/courses/search/?p=2".to_string(),
            "HTTP 503".to_string(),
        )];
        summary.exported_files = vec![PathBuf::from("dataset/courses.csv")];

        let markdown = format_markdown_summary(&summary);

        assert!(markdown.contains("## Failed Links"));
        assert!(markdown.contains(
            "| https://www.udemy.com/course/broken | missing_field | 1 | missing required field 'title' |"
        ));
        assert!(markdown.contains("## Listing Pages Not Fetched"));
        assert!(markdown.contains("`dataset/courses.csv`"));
    }

    #[test]
    fn test_markdown_lists_not_attempted_links() {
        let mut summary = create_test_summary();
        summary.not_attempted = 2;
        summary.not_attempted_links = vec![
            "https://www.udemy.com/course/b".to_string(),
            "https://www.udemy.com/course/c".to_string(),
        ];

        let markdown = format_markdown_summary(&summary);

        assert!(markdown.contains("| Not attempted | 2 |"));
        assert!(markdown.contains("## Links Not Attempted"));
        assert!(markdown.contains("- https://www.udemy.com/course/b\n"));
        assert!(markdown.contains("- https://www.udemy.com/course/c\n"));
    }

    #[test]
    fn test_cell_escapes_pipes() {
        assert_eq!(cell("a|b\nc"), "a\\|b c");
    }

    #[test]
    fn test_generate_creates_parent_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reports").join("summary.md");

        generate_markdown_summary(&create_test_summary(), &path).unwrap();

        assert!(fs::read_to_string(&path)
            .unwrap()
            .contains("Course Harvest Summary"));
    }
}

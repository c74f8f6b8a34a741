//! Flat-file exports of accepted courses and failed links

use crate::output::traits::{Exporter, OutputResult};
use crate::record::{CourseRecord, InstructorProfile};
use crate::storage::FailureRecord;
use chrono::{DateTime, Local};
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Column names of the course exports, in field order of [`CourseRow`]
pub const COURSE_COLUMNS: [&str; 23] = [
    "unique_key",
    "title",
    "slug",
    "url",
    "source_url",
    "search_term",
    "subtitle",
    "price",
    "rating",
    "num_students",
    "created_by",
    "last_updated",
    "instructor",
    "instructor_url",
    "instructor_rating",
    "instructor_reviews",
    "instructor_students",
    "instructor_courses",
    "instructor_website",
    "instructor_twitter",
    "instructor_linkedin",
    "instructor_facebook",
    "instructor_youtube",
];

const FAILURE_COLUMNS: [&str; 5] = ["link", "search_term", "error_kind", "message", "attempts"];

/// One row per course; nested fields are flattened
#[derive(Debug, Serialize)]
struct CourseRow<'a> {
    unique_key: &'a str,
    title: &'a str,
    slug: &'a str,
    url: &'a str,
    source_url: &'a str,
    search_term: &'a str,
    subtitle: &'a str,
    price: &'a str,
    rating: &'a str,
    num_students: &'a str,
    created_by: String,
    last_updated: &'a str,
    instructor: &'a str,
    instructor_url: &'a str,
    instructor_rating: &'a str,
    instructor_reviews: &'a str,
    instructor_students: &'a str,
    instructor_courses: &'a str,
    instructor_website: &'a str,
    instructor_twitter: &'a str,
    instructor_linkedin: &'a str,
    instructor_facebook: &'a str,
    instructor_youtube: &'a str,
}

impl<'a> From<&'a CourseRecord> for CourseRow<'a> {
    fn from(record: &'a CourseRecord) -> Self {
        let course = &record.course;
        let instructor = &course.instructor;
        let profile = record.instructor_profile.as_ref();

        Self {
            unique_key: record.key.as_str(),
            title: &course.title,
            slug: &course.slug,
            url: &course.canonical_url,
            source_url: &record.source_url,
            search_term: record.search_term.as_deref().unwrap_or(""),
            subtitle: course.subtitle.as_deref().unwrap_or(""),
            price: course.price.as_deref().unwrap_or(""),
            rating: course.rating.as_deref().unwrap_or(""),
            num_students: course.num_students.as_deref().unwrap_or(""),
            created_by: course.created_by.join(", "),
            last_updated: course.last_updated.as_deref().unwrap_or(""),
            instructor: instructor.name.as_deref().unwrap_or(""),
            instructor_url: instructor.profile_url.as_deref().unwrap_or(""),
            instructor_rating: instructor.rating.as_deref().unwrap_or(""),
            instructor_reviews: instructor.reviews.as_deref().unwrap_or(""),
            instructor_students: instructor.students.as_deref().unwrap_or(""),
            instructor_courses: instructor.courses.as_deref().unwrap_or(""),
            instructor_website: profile_field(profile, |p| &p.website),
            instructor_twitter: profile_field(profile, |p| &p.twitter),
            instructor_linkedin: profile_field(profile, |p| &p.linkedin),
            instructor_facebook: profile_field(profile, |p| &p.facebook),
            instructor_youtube: profile_field(profile, |p| &p.youtube),
        }
    }
}

impl CourseRow<'_> {
    /// Cell values in [`COURSE_COLUMNS`] order
    fn cells(&self) -> [&str; 23] {
        [
            self.unique_key,
            self.title,
            self.slug,
            self.url,
            self.source_url,
            self.search_term,
            self.subtitle,
            self.price,
            self.rating,
            self.num_students,
            &self.created_by,
            self.last_updated,
            self.instructor,
            self.instructor_url,
            self.instructor_rating,
            self.instructor_reviews,
            self.instructor_students,
            self.instructor_courses,
            self.instructor_website,
            self.instructor_twitter,
            self.instructor_linkedin,
            self.instructor_facebook,
            self.instructor_youtube,
        ]
    }
}

fn profile_field<'a>(
    profile: Option<&'a InstructorProfile>,
    pick: impl Fn(&'a InstructorProfile) -> &'a Option<String>,
) -> &'a str {
    profile.and_then(|p| pick(p).as_deref()).unwrap_or("")
}

#[derive(Debug, Serialize)]
struct FailureRow<'a> {
    link: &'a str,
    search_term: &'a str,
    error_kind: &'a str,
    message: &'a str,
    attempts: u32,
}

/// CSV writer whose header row is written up front, so an empty export
/// still names its columns
fn csv_writer(path: &Path, columns: &[&str]) -> OutputResult<csv::Writer<File>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(columns)?;
    Ok(writer)
}

/// CSV export, one flattened row per course
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvExporter;

impl Exporter for CsvExporter {
    fn extension(&self) -> &'static str {
        "csv"
    }

    fn export(&self, records: &[CourseRecord], path: &Path) -> OutputResult<()> {
        let mut writer = csv_writer(path, &COURSE_COLUMNS)?;
        for record in records {
            writer.serialize(CourseRow::from(record))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Spreadsheet export, one worksheet with a bold header row
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxExporter;

impl Exporter for XlsxExporter {
    fn extension(&self) -> &'static str {
        "xlsx"
    }

    fn export(&self, records: &[CourseRecord], path: &Path) -> OutputResult<()> {
        let mut workbook = Workbook::new();
        let header = Format::new().set_bold();
        let sheet = workbook.add_worksheet();

        for (col, name) in COURSE_COLUMNS.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *name, &header)?;
        }
        for (row, record) in records.iter().enumerate() {
            let course = CourseRow::from(record);
            for (col, value) in course.cells().iter().enumerate() {
                if !value.is_empty() {
                    sheet.write_string(row as u32 + 1, col as u16, *value)?;
                }
            }
        }

        workbook.save(path)?;
        Ok(())
    }
}

/// JSON export, the full records as a pretty-printed array
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExporter;

impl Exporter for JsonExporter {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn export(&self, records: &[CourseRecord], path: &Path) -> OutputResult<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, records)?;
        Ok(())
    }
}

/// Writes the unfinished links of a run as CSV
pub fn export_failures(failures: &[FailureRecord], path: &Path) -> OutputResult<()> {
    let mut writer = csv_writer(path, &FAILURE_COLUMNS)?;
    for failure in failures {
        writer.serialize(FailureRow {
            link: &failure.link,
            search_term: failure.search_term.as_deref().unwrap_or(""),
            error_kind: &failure.error_kind,
            message: &failure.message,
            attempts: failure.attempts,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Builds an export file name like `courses_rust_run7_2024-05-01_13-37-05.csv`
///
/// `tag` names the export (`run7`, `all`). Characters that are awkward in
/// file names are replaced by `_`.
pub fn export_file_name(
    prefix: &str,
    expression: &str,
    tag: &str,
    at: DateTime<Local>,
    extension: &str,
) -> String {
    let label: String = expression
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let label = if label.is_empty() { "listing" } else { &label };

    format!(
        "{}_{}_{}_{}.{}",
        prefix,
        label,
        tag,
        at.format("%Y-%m-%d_%H-%M-%S"),
        extension
    )
}

/// Returns `dir/name`, or `dir/<stem>-N.<ext>` for the first N that does not
/// exist yet; exports never overwrite each other
fn unused_path(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    if !path.exists() {
        return path;
    }

    let (stem, extension) = match name.rsplit_once('.') {
        Some((stem, extension)) => (stem, format!(".{}", extension)),
        None => (name, String::new()),
    };
    (2..)
        .map(|n| dir.join(format!("{}-{}{}", stem, n, extension)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(path)
}

/// Exports a run's courses with every exporter, plus its unfinished links
///
/// The failures file is only written when there are unfinished links.
///
/// # Returns
///
/// The paths of every file written
pub fn export_run(
    records: &[CourseRecord],
    failures: &[FailureRecord],
    export_dir: &Path,
    expression: &str,
    tag: &str,
) -> OutputResult<Vec<PathBuf>> {
    fs::create_dir_all(export_dir)?;
    let now = Local::now();
    let mut written = Vec::new();

    let exporters: [&dyn Exporter; 3] = [&CsvExporter, &XlsxExporter, &JsonExporter];
    for exporter in exporters {
        let name = export_file_name("courses", expression, tag, now, exporter.extension());
        let path = unused_path(export_dir, &name);
        exporter.export(records, &path)?;
        tracing::info!("Exported {} courses to {}", records.len(), path.display());
        written.push(path);
    }

    if !failures.is_empty() {
        let name = export_file_name("failures", expression, tag, now, "csv");
        let path = unused_path(export_dir, &name);
        export_failures(failures, &path)?;
        tracing::info!("Exported {} unfinished links to {}", failures.len(), path.display());
        written.push(path);
    }

    Ok(written)
}

//! JSON readers for course snapshots and stored section rollups.

use anyhow::{Context, Result};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::rollups::types::AssignmentRollup;
use crate::stats::CourseScope;

/// Decodes a course snapshot: its assignments, enrolled students and their
/// submissions.
///
/// # Errors
///
/// Returns an error if the bytes are not a valid snapshot document.
pub fn parse_snapshot(bytes: &[u8]) -> Result<CourseScope> {
    let course: CourseScope = serde_json::from_slice(bytes).context("decoding course snapshot")?;

    let assignments: HashSet<u64> = course.assignments.iter().map(|a| a.id).collect();
    let orphans = course
        .submissions
        .iter()
        .filter(|s| !assignments.contains(&s.assignment_id))
        .count();
    if orphans > 0 {
        warn!(course_id = course.course_id, orphans, "Submissions for assignments not in snapshot");
    }

    debug!(
        course_id = course.course_id,
        assignments = course.assignments.len(),
        students = course.students.len(),
        submissions = course.submissions.len(),
        "Course snapshot parsed"
    );
    Ok(course)
}

pub fn load_snapshot(path: &str) -> Result<CourseScope> {
    let bytes = std::fs::read(path).with_context(|| format!("reading snapshot '{path}'"))?;
    parse_snapshot(&bytes).with_context(|| format!("in '{path}'"))
}

/// Decodes a JSON array of section rollup rows.
pub fn parse_rollups(bytes: &[u8]) -> Result<Vec<AssignmentRollup>> {
    Ok(serde_json::from_slice(bytes).context("decoding section rollups")?)
}

pub fn load_rollups(path: &str) -> Result<Vec<AssignmentRollup>> {
    let bytes = std::fs::read(path).with_context(|| format!("reading rollups '{path}'"))?;
    parse_rollups(&bytes).with_context(|| format!("in '{path}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_snapshot() {
        let course = parse_snapshot(br#"{"course_id": 4}"#).unwrap();
        assert_eq!(course.course_id, 4);
        assert!(course.assignments.is_empty());
        assert!(course.submissions.is_empty());
    }

    #[test]
    fn test_parse_invalid_bytes() {
        assert!(parse_snapshot(&[0xFF, 0xFE, 0x00, 0x01]).is_err());
        assert!(parse_snapshot(br#"{"course_id": "four"}"#).is_err());
    }

    #[test]
    fn test_parse_minimal_snapshot() {
        let json = br#"{
            "course_id": 9,
            "assignments": [
                {"id": 1, "title": "Essay", "due_at": "2024-03-01T23:59:00Z", "points_possible": 20,
                 "overrides": {"7": null}}
            ],
            "students": [{"id": 7, "section_ids": [100]}],
            "submissions": [
                {"assignment_id": 1, "user_id": 7, "score": 18,
                 "submitted_at": "2024-03-02T08:00:00Z", "workflow_state": "graded"}
            ]
        }"#;

        let course = parse_snapshot(json).unwrap();
        assert_eq!(course.assignments[0].points_possible, Some(20.0));
        assert_eq!(course.assignments[0].overridden_for(7), None);
        assert!(course.students[0].in_section(100));
        assert_eq!(course.submissions[0].graded_score(), Some(18.0));
    }

    #[test]
    fn test_parse_rollups() {
        let json = br#"[{
            "assignment_id": 1, "course_section_id": 100, "title": "Essay",
            "due_at": null, "points_possible": 10,
            "max_score": 9, "min_score": 2, "first_quartile": 3, "median": 5, "third_quartile": 7,
            "score_buckets": [0, 0, 1, 0, 0, 1, 0, 0, 0, 1, 0],
            "total_submissions": 4, "missing_submissions": 1,
            "late_submissions": 0, "on_time_submissions": 3
        }]"#;

        let rollups = parse_rollups(json).unwrap();
        assert_eq!(rollups.len(), 1);
        assert!(!rollups[0].muted);
        assert_eq!(rollups[0].tardiness().total, 4);
    }
}

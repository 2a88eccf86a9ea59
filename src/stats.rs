//! Per-assignment statistics for any scope of submissions.
//!
//! The same [`StatsCalculator`] serves course-wide views and a single
//! student's view of a course; only the [`SubmissionScope`] differs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

use crate::cache::{CachePort, fetch_with};
use crate::error::{AnalyticsError, Result};
use crate::rollups::types::AssignmentRollup;
use crate::scores::{ScoreBuckets, ScoreSummary};
use crate::tardiness::{Dimension, ScaledBreakdown, TardinessBreakdown, TardinessGrid};
use crate::types::{Assignment, AssignmentId, SectionId, Student, StudentId, Submission};

/// Supplies the assignments, students and submissions a calculation covers.
pub trait SubmissionScope {
    /// Identifies the scope in cache keys.
    fn fingerprint(&self) -> String;
    fn assignments(&self) -> &[Assignment];
    fn students(&self) -> &[Student];
    fn submissions(&self) -> &[Submission];
}

/// Everything visible in one course.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseScope {
    pub course_id: u64,
    pub assignments: Vec<Assignment>,
    pub students: Vec<Student>,
    pub submissions: Vec<Submission>,
}

impl SubmissionScope for CourseScope {
    fn fingerprint(&self) -> String {
        format!("course:{}", self.course_id)
    }

    fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    fn students(&self) -> &[Student] {
        &self.students
    }

    fn submissions(&self) -> &[Submission] {
        &self.submissions
    }
}

/// One student's slice of a course.
#[derive(Debug, Clone)]
pub struct StudentInCourseScope {
    course_id: u64,
    student: Student,
    assignments: Vec<Assignment>,
    submissions: Vec<Submission>,
}

impl StudentInCourseScope {
    pub fn new(course: &CourseScope, student_id: StudentId) -> Result<Self> {
        let student = course
            .students
            .iter()
            .find(|s| s.id == student_id)
            .cloned()
            .ok_or_else(|| AnalyticsError::unknown_student(student_id))?;

        Ok(Self {
            course_id: course.course_id,
            student,
            assignments: course.assignments.clone(),
            submissions: course
                .submissions
                .iter()
                .filter(|s| s.user_id == student_id)
                .cloned()
                .collect(),
        })
    }
}

impl SubmissionScope for StudentInCourseScope {
    fn fingerprint(&self) -> String {
        format!("course:{}:student:{}", self.course_id, self.student.id)
    }

    fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    fn students(&self) -> &[Student] {
        std::slice::from_ref(&self.student)
    }

    fn submissions(&self) -> &[Submission] {
        &self.submissions
    }
}

/// Hook for attaching extra per-assignment data to computed statistics.
pub trait AssignmentEnricher {
    fn enrich(&self, _assignment: &Assignment, _stats: &mut AssignmentStats) {}
}

/// Adds nothing.
pub struct NoEnrichment;

impl AssignmentEnricher for NoEnrichment {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentStats {
    pub assignment_id: AssignmentId,
    pub title: String,
    pub due_at: Option<DateTime<Utc>>,
    pub points_possible: Option<f64>,
    pub muted: bool,
    pub non_digital_submission: bool,
    #[serde(flatten)]
    pub score: ScoreSummary,
    pub score_buckets: Vec<u64>,
    pub tardiness: TardinessBreakdown,
    pub tardiness_breakdown: ScaledBreakdown,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentTardiness {
    pub student_id: StudentId,
    #[serde(flatten)]
    pub breakdown: TardinessBreakdown,
}

pub struct StatsCalculator<'a, S> {
    scope: &'a S,
    now: DateTime<Utc>,
    enricher: Box<dyn AssignmentEnricher + 'a>,
}

impl<'a, S: SubmissionScope> StatsCalculator<'a, S> {
    pub fn new(scope: &'a S, now: DateTime<Utc>) -> Self {
        Self {
            scope,
            now,
            enricher: Box::new(NoEnrichment),
        }
    }

    pub fn with_enricher(mut self, enricher: impl AssignmentEnricher + 'a) -> Self {
        self.enricher = Box::new(enricher);
        self
    }

    pub fn assignment_stats(&self) -> Result<Vec<AssignmentStats>> {
        let mut grid = self.grid();
        grid.prebuild()?;
        let scores = self.graded_scores();

        let mut rows = Vec::with_capacity(self.scope.assignments().len());
        for assignment in self.scope.assignments() {
            let (score, score_buckets) =
                score_distribution(assignment, scores.get(&assignment.id))?;
            let tardiness = grid.tally(Dimension::Assignment, assignment.id)?;

            let mut stats = AssignmentStats {
                assignment_id: assignment.id,
                title: assignment.title.clone(),
                due_at: assignment.due_at,
                points_possible: assignment.points_possible,
                muted: assignment.muted,
                non_digital_submission: assignment.non_digital_submission,
                score,
                score_buckets,
                tardiness,
                tardiness_breakdown: tardiness.as_fractions(),
                extra: BTreeMap::new(),
            };
            self.enricher.enrich(assignment, &mut stats);
            rows.push(stats);
        }

        debug!(scope = %self.scope.fingerprint(), assignments = rows.len(), "Computed assignment stats");
        Ok(rows)
    }

    /// [`Self::assignment_stats`] memoized under the scope's fingerprint.
    pub fn cached_assignment_stats<C: CachePort + ?Sized>(
        &self,
        cache: &C,
        ttl: Duration,
    ) -> Result<Vec<AssignmentStats>> {
        let key = format!("{}:assignment_stats", self.scope.fingerprint());
        fetch_with(cache, &key, ttl, || self.assignment_stats())
    }

    /// Tardiness across all assignments, one entry per student.
    pub fn student_tardiness(&self) -> Result<Vec<StudentTardiness>> {
        let mut grid = self.grid();
        grid.prebuild()?;
        self.scope
            .students()
            .iter()
            .map(|student| {
                Ok(StudentTardiness {
                    student_id: student.id,
                    breakdown: grid.tally(Dimension::Student, student.id)?,
                })
            })
            .collect()
    }

    /// The persisted per-section row for one assignment.
    pub fn section_rollup(
        &self,
        assignment_id: AssignmentId,
        section_id: SectionId,
    ) -> Result<AssignmentRollup> {
        let assignment = self
            .scope
            .assignments()
            .iter()
            .find(|a| a.id == assignment_id)
            .ok_or_else(|| AnalyticsError::unknown_assignment(assignment_id))?;
        let mut grid = self.grid();
        build_rollup(&mut grid, assignment, section_id, self.scope.submissions())
    }

    /// Rows for every assignment in every section that has students.
    pub fn section_rollups(&self) -> Result<Vec<AssignmentRollup>> {
        let sections: BTreeSet<SectionId> = self
            .scope
            .students()
            .iter()
            .flat_map(|s| s.section_ids.iter().copied())
            .collect();

        let mut grid = self.grid();
        grid.prebuild()?;
        let mut rollups = Vec::new();
        for assignment in self.scope.assignments() {
            for &section_id in &sections {
                rollups.push(build_rollup(
                    &mut grid,
                    assignment,
                    section_id,
                    self.scope.submissions(),
                )?);
            }
        }
        Ok(rollups)
    }

    fn grid(&self) -> TardinessGrid {
        TardinessGrid::new(
            self.scope.assignments().to_vec(),
            self.scope.students().to_vec(),
            self.scope.submissions().to_vec(),
            self.now,
        )
    }

    /// Graded scores of the scope's students, by assignment.
    fn graded_scores(&self) -> HashMap<AssignmentId, Vec<f64>> {
        let students: HashSet<StudentId> = self.scope.students().iter().map(|s| s.id).collect();
        let mut scores: HashMap<AssignmentId, Vec<f64>> = HashMap::new();
        for submission in self.scope.submissions() {
            if !students.contains(&submission.user_id) {
                continue;
            }
            if let Some(score) = submission.graded_score() {
                scores.entry(submission.assignment_id).or_default().push(score);
            }
        }
        scores
    }
}

fn score_distribution(
    assignment: &Assignment,
    scores: Option<&Vec<f64>>,
) -> Result<(ScoreSummary, Vec<u64>)> {
    if assignment.points_possible.is_none() {
        return Ok((ScoreSummary::default(), Vec::new()));
    }
    let mut buckets = ScoreBuckets::new(assignment.points_possible)?;
    buckets.extend(scores.into_iter().flatten().copied());
    Ok((buckets.summary(), buckets.buckets().to_vec()))
}

fn build_rollup(
    grid: &mut TardinessGrid,
    assignment: &Assignment,
    section_id: SectionId,
    submissions: &[Submission],
) -> Result<AssignmentRollup> {
    let members: Vec<StudentId> = grid
        .students()
        .iter()
        .filter(|s| s.in_section(section_id))
        .map(|s| s.id)
        .collect();
    let member_set: HashSet<StudentId> = members.iter().copied().collect();

    let scores: Vec<f64> = submissions
        .iter()
        .filter(|s| s.assignment_id == assignment.id && member_set.contains(&s.user_id))
        .filter_map(Submission::graded_score)
        .collect();
    let (score, score_buckets) = score_distribution(assignment, Some(&scores))?;
    let tardiness = grid.tally_for_students(assignment.id, &members)?;

    let mut rollup = AssignmentRollup {
        assignment_id: assignment.id,
        course_section_id: section_id,
        title: assignment.title.clone(),
        due_at: assignment.due_at,
        muted: assignment.muted,
        points_possible: assignment.points_possible,
        non_digital_submission: assignment.non_digital_submission,
        score_buckets,
        total_submissions: members.len() as u64,
        missing_submissions: tardiness.missing,
        late_submissions: tardiness.late,
        on_time_submissions: tardiness.on_time,
        ..Default::default()
    };
    rollup.set_score_summary(score);
    Ok(rollup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::rollups::aggregate::aggregate_rollups;
    use crate::types::WorkflowState;
    use chrono::{Duration as Days, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 15, 0, 0, 0).unwrap()
    }

    fn graded(assignment_id: u64, user_id: u64, score: f64) -> Submission {
        Submission {
            assignment_id,
            user_id,
            score: Some(score),
            submitted_at: Some(now() - Days::days(10)),
            graded_at: Some(now() - Days::days(8)),
            workflow_state: WorkflowState::Graded,
            ..Default::default()
        }
    }

    fn student(id: u64, section: u64) -> Student {
        Student {
            id,
            section_ids: vec![section],
        }
    }

    fn course() -> CourseScope {
        CourseScope {
            course_id: 3,
            assignments: vec![
                Assignment {
                    id: 1,
                    title: "Lab".into(),
                    due_at: Some(now() - Days::days(9)),
                    points_possible: Some(10.0),
                    ..Default::default()
                },
                Assignment {
                    id: 2,
                    title: "Attendance".into(),
                    due_at: Some(now() + Days::days(2)),
                    points_possible: None,
                    ..Default::default()
                },
            ],
            students: vec![student(10, 100), student(11, 100), student(12, 200)],
            submissions: vec![graded(1, 10, 4.0), graded(1, 11, 6.0), graded(1, 99, 10.0)],
        }
    }

    #[test]
    fn test_course_assignment_stats() {
        let course = course();
        let stats = StatsCalculator::new(&course, now()).assignment_stats().unwrap();

        assert_eq!(stats.len(), 2);
        let lab = &stats[0];
        assert_eq!(lab.score.median, 5.0);
        assert_eq!(lab.score.max_score, 6.0);
        assert_eq!(lab.score_buckets.len(), 11);
        assert_eq!(lab.tardiness, TardinessBreakdown::new(1, 0, 2));

        let attendance = &stats[1];
        assert_eq!(attendance.score, ScoreSummary::default());
        assert_eq!(attendance.tardiness.floating, 3);
    }

    #[test]
    fn test_student_scope_reuses_calculator() {
        let course = course();
        let scope = StudentInCourseScope::new(&course, 12).unwrap();
        let stats = StatsCalculator::new(&scope, now()).assignment_stats().unwrap();

        assert_eq!(stats[0].tardiness, TardinessBreakdown::new(1, 0, 0));
        assert_eq!(stats[0].score, ScoreSummary::default());
        assert!(StudentInCourseScope::new(&course, 404).is_err());
    }

    #[test]
    fn test_student_tardiness() {
        let course = course();
        let rows = StatsCalculator::new(&course, now()).student_tardiness().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].breakdown, TardinessBreakdown::with_floating(1, 0, 0, 1));
    }

    struct SubmissionCount;

    impl AssignmentEnricher for SubmissionCount {
        fn enrich(&self, _assignment: &Assignment, stats: &mut AssignmentStats) {
            stats
                .extra
                .insert("graded".into(), serde_json::json!(stats.score_buckets.iter().sum::<u64>()));
        }
    }

    #[test]
    fn test_enricher_decorates_rows() {
        let course = course();
        let stats = StatsCalculator::new(&course, now())
            .with_enricher(SubmissionCount)
            .assignment_stats()
            .unwrap();
        assert_eq!(stats[0].extra["graded"], serde_json::json!(2));
    }

    #[test]
    fn test_cached_stats_round_trip() {
        let course = course();
        let cache = MemoryCache::new();
        let calculator = StatsCalculator::new(&course, now());

        let fresh = calculator
            .cached_assignment_stats(&cache, Duration::from_secs(300))
            .unwrap();
        assert!(cache.read("course:3:assignment_stats").is_some());
        let cached = calculator
            .cached_assignment_stats(&cache, Duration::from_secs(300))
            .unwrap();
        assert_eq!(fresh, cached);
    }

    #[test]
    fn test_section_rollups_compose_to_course_view() {
        let course = course();
        let calculator = StatsCalculator::new(&course, now());
        let rollups: Vec<_> = calculator
            .section_rollups()
            .unwrap()
            .into_iter()
            .filter(|r| r.assignment_id == 1)
            .collect();
        assert_eq!(rollups.len(), 2);
        assert_eq!(rollups[0].total_submissions, 2);
        assert_eq!(rollups[1].missing_submissions, 1);

        let merged = aggregate_rollups(&rollups).unwrap().unwrap();
        assert_eq!(merged.total_submissions, 3);
        assert_eq!(merged.score.median, 5.0);
        assert_eq!(merged.score.min_score, 4.0);
    }

    #[test]
    fn test_section_rollup_for_unknown_assignment() {
        let course = course();
        let err = StatsCalculator::new(&course, now()).section_rollup(77, 100).unwrap_err();
        assert!(matches!(err, AnalyticsError::UnknownEntity { id: 77, .. }));
    }
}

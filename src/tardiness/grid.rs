use chrono::{DateTime, Utc};
use std::cell::OnceCell;
use std::collections::HashMap;
use tracing::debug;

use super::breakdown::TardinessBreakdown;
use super::tardy::Tardy;
use crate::error::{AnalyticsError, Result};
use crate::types::{Assignment, AssignmentId, Student, StudentId, Submission};

/// Resolves the due date that applies to one student for one assignment.
pub trait DueDateResolver: Send + Sync {
    fn resolve(&self, assignment: &Assignment, student: StudentId) -> Option<DateTime<Utc>>;
}

/// Default resolver: the assignment's due date unless the student has an override.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverrideResolver;

impl DueDateResolver for OverrideResolver {
    fn resolve(&self, assignment: &Assignment, student: StudentId) -> Option<DateTime<Utc>> {
        assignment.overridden_for(student)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TardinessGridCoord {
    pub assignment_id: AssignmentId,
    pub student_id: StudentId,
}

impl TardinessGridCoord {
    pub fn new(assignment_id: AssignmentId, student_id: StudentId) -> Self {
        Self {
            assignment_id,
            student_id,
        }
    }
}

/// Axis of the grid to tally along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Assignment,
    Student,
}

/// Tardiness of every (assignment, student) pair, computed at most once per cell.
pub struct TardinessGrid {
    assignments: Vec<Assignment>,
    students: Vec<Student>,
    submissions: Vec<Submission>,
    now: DateTime<Utc>,
    resolver: Box<dyn DueDateResolver>,
    assignment_index: HashMap<AssignmentId, usize>,
    student_index: HashMap<StudentId, usize>,
    submissions_by_student: OnceCell<HashMap<StudentId, Vec<usize>>>,
    tardies_memo: HashMap<TardinessGridCoord, Tardy>,
}

impl TardinessGrid {
    pub fn new(
        assignments: Vec<Assignment>,
        students: Vec<Student>,
        submissions: Vec<Submission>,
        now: DateTime<Utc>,
    ) -> Self {
        let assignment_index = assignments
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id, i))
            .collect();
        let student_index = students.iter().enumerate().map(|(i, s)| (s.id, i)).collect();

        Self {
            assignments,
            students,
            submissions,
            now,
            resolver: Box::new(OverrideResolver),
            assignment_index,
            student_index,
            submissions_by_student: OnceCell::new(),
            tardies_memo: HashMap::new(),
        }
    }

    pub fn new_now(
        assignments: Vec<Assignment>,
        students: Vec<Student>,
        submissions: Vec<Submission>,
    ) -> Self {
        Self::new(assignments, students, submissions, Utc::now())
    }

    /// Replaces the due date resolver. Clears anything already memoized.
    pub fn with_resolver(mut self, resolver: impl DueDateResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self.tardies_memo.clear();
        self
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn memo_len(&self) -> usize {
        self.tardies_memo.len()
    }

    /// Computes every cell of the grid.
    pub fn prebuild(&mut self) -> Result<&mut Self> {
        let index = self.submission_index();
        let mut built = Vec::with_capacity(self.assignments.len() * self.students.len());

        for student in &self.students {
            let mut by_assignment: HashMap<AssignmentId, Vec<&Submission>> = HashMap::new();
            for &i in index.get(&student.id).into_iter().flatten() {
                let submission = &self.submissions[i];
                by_assignment
                    .entry(submission.assignment_id)
                    .or_default()
                    .push(submission);
            }

            for assignment in &self.assignments {
                let coord = TardinessGridCoord::new(assignment.id, student.id);
                let submission = by_assignment
                    .get(&assignment.id)
                    .and_then(|rows| select_submission(rows.iter().copied()));
                let tardy = build_tardy(
                    self.resolver.as_ref(),
                    assignment,
                    student.id,
                    submission,
                    self.now,
                )?;
                built.push((coord, tardy));
            }
        }

        self.tardies_memo.extend(built);
        debug!(
            assignments = self.assignments.len(),
            students = self.students.len(),
            submissions = self.submissions.len(),
            cells = self.tardies_memo.len(),
            "Tardiness grid prebuilt"
        );
        Ok(self)
    }

    /// Tardy for one cell, building it if needed.
    ///
    /// Ids that were never registered yield a tardy with no due date and no
    /// submission, which is not memoized.
    pub fn get_tardy(&mut self, assignment_id: AssignmentId, student_id: StudentId) -> Result<Tardy> {
        let coord = TardinessGridCoord::new(assignment_id, student_id);
        if !self.is_registered(coord) {
            return Ok(Tardy::new(None, None, self.now));
        }
        self.ensure_built(&[coord])?;
        Ok(self.tardies_memo[&coord].clone())
    }

    /// One tardy per assignment, in assignment registration order.
    pub fn tardies_for_student(&mut self, student_id: StudentId) -> Result<Vec<&Tardy>> {
        if !self.student_index.contains_key(&student_id) {
            return Err(AnalyticsError::unknown_student(student_id));
        }
        let coords: Vec<_> = self
            .assignments
            .iter()
            .map(|a| TardinessGridCoord::new(a.id, student_id))
            .collect();
        self.collect(coords)
    }

    /// One tardy per student, in student registration order.
    pub fn tardies_for_assignment(&mut self, assignment_id: AssignmentId) -> Result<Vec<&Tardy>> {
        if !self.assignment_index.contains_key(&assignment_id) {
            return Err(AnalyticsError::unknown_assignment(assignment_id));
        }
        let coords: Vec<_> = self
            .students
            .iter()
            .map(|s| TardinessGridCoord::new(assignment_id, s.id))
            .collect();
        self.collect(coords)
    }

    pub fn tally(&mut self, dimension: Dimension, id: u64) -> Result<TardinessBreakdown> {
        let tardies = match dimension {
            Dimension::Assignment => self.tardies_for_assignment(id)?,
            Dimension::Student => self.tardies_for_student(id)?,
        };
        Ok(TardinessBreakdown::tally(tardies))
    }

    /// Tally for one assignment restricted to a subset of students, e.g. a section.
    pub fn tally_for_students(
        &mut self,
        assignment_id: AssignmentId,
        student_ids: &[StudentId],
    ) -> Result<TardinessBreakdown> {
        if !self.assignment_index.contains_key(&assignment_id) {
            return Err(AnalyticsError::unknown_assignment(assignment_id));
        }
        if let Some(&unknown) = student_ids
            .iter()
            .find(|id| !self.student_index.contains_key(*id))
        {
            return Err(AnalyticsError::unknown_student(unknown));
        }
        let coords: Vec<_> = student_ids
            .iter()
            .map(|&s| TardinessGridCoord::new(assignment_id, s))
            .collect();
        Ok(TardinessBreakdown::tally(self.collect(coords)?))
    }

    fn collect(&mut self, coords: Vec<TardinessGridCoord>) -> Result<Vec<&Tardy>> {
        self.ensure_built(&coords)?;
        let memo = &self.tardies_memo;
        Ok(coords.iter().map(|c| &memo[c]).collect())
    }

    fn is_registered(&self, coord: TardinessGridCoord) -> bool {
        self.assignment_index.contains_key(&coord.assignment_id)
            && self.student_index.contains_key(&coord.student_id)
    }

    fn ensure_built(&mut self, coords: &[TardinessGridCoord]) -> Result<()> {
        let mut built = Vec::new();
        for &coord in coords {
            if self.tardies_memo.contains_key(&coord) {
                continue;
            }
            let assignment = &self.assignments[self.assignment_index[&coord.assignment_id]];
            let submission = self.find_submission(coord);
            let tardy = build_tardy(
                self.resolver.as_ref(),
                assignment,
                coord.student_id,
                submission,
                self.now,
            )?;
            built.push((coord, tardy));
        }
        self.tardies_memo.extend(built);
        Ok(())
    }

    fn find_submission(&self, coord: TardinessGridCoord) -> Option<&Submission> {
        select_submission(
            self.submission_index()
                .get(&coord.student_id)?
                .iter()
                .map(|&i| &self.submissions[i])
                .filter(|s| s.assignment_id == coord.assignment_id),
        )
    }

    fn submission_index(&self) -> &HashMap<StudentId, Vec<usize>> {
        self.submissions_by_student.get_or_init(|| {
            let mut index: HashMap<StudentId, Vec<usize>> = HashMap::new();
            for (i, submission) in self.submissions.iter().enumerate() {
                index.entry(submission.user_id).or_default().push(i);
            }
            index
        })
    }
}

/// Picks the row that counts when a cell has several submissions: the last
/// one that was handed in, else the last one.
fn select_submission<'a>(rows: impl Iterator<Item = &'a Submission>) -> Option<&'a Submission> {
    let mut last = None;
    let mut last_handed_in = None;
    for row in rows {
        if row.effective_submitted_at().is_some() {
            last_handed_in = Some(row);
        }
        last = Some(row);
    }
    last_handed_in.or(last)
}

/// Builds the tardy for one cell from its resolved inputs.
pub(crate) fn build_tardy(
    resolver: &dyn DueDateResolver,
    assignment: &Assignment,
    student_id: StudentId,
    submission: Option<&Submission>,
    now: DateTime<Utc>,
) -> Result<Tardy> {
    if let Some(submission) = submission {
        if submission.user_id != student_id || submission.assignment_id != assignment.id {
            return Err(AnalyticsError::DataConsistency(format!(
                "submission for assignment {} / user {} resolved for assignment {} / student {}",
                submission.assignment_id, submission.user_id, assignment.id, student_id
            )));
        }
    }

    let due_at = resolver.resolve(assignment, student_id);
    let submitted_at = submission.and_then(Submission::effective_submitted_at);
    Ok(Tardy::new(due_at, submitted_at, now))
}

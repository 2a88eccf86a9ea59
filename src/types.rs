//! Data types supplied by the assignment, student and submission providers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type AssignmentId = u64;
pub type StudentId = u64;
pub type SectionId = u64;

/// An assignment as seen by the permission-filtered caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    #[serde(default)]
    pub title: String,
    pub due_at: Option<DateTime<Utc>>,
    pub points_possible: Option<f64>,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub non_digital_submission: bool,
    /// Per-student due date overrides. A `None` value clears the due date for that student.
    #[serde(default)]
    pub overrides: HashMap<StudentId, Option<DateTime<Utc>>>,
}

impl Assignment {
    /// Due date that applies to `student`, accounting for overrides.
    pub fn overridden_for(&self, student: StudentId) -> Option<DateTime<Utc>> {
        match self.overrides.get(&student) {
            Some(due_at) => *due_at,
            None => self.due_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    #[serde(default)]
    pub section_ids: Vec<SectionId>,
}

impl Student {
    pub fn new(id: StudentId) -> Self {
        Self {
            id,
            section_ids: Vec::new(),
        }
    }

    pub fn in_section(&self, section_id: SectionId) -> bool {
        self.section_ids.contains(&section_id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    Unsubmitted,
    Submitted,
    PendingReview,
    Graded,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Submission {
    pub assignment_id: AssignmentId,
    pub user_id: StudentId,
    pub score: Option<f64>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub graded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub workflow_state: WorkflowState,
    #[serde(default)]
    pub missing: bool,
    #[serde(default)]
    pub late: bool,
}

impl Submission {
    pub fn is_graded(&self) -> bool {
        self.workflow_state == WorkflowState::Graded
    }

    /// When the work counts as handed in: the submission time, or the grading
    /// time for work that was graded without an online submission.
    pub fn effective_submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
            .or_else(|| if self.is_graded() { self.graded_at } else { None })
    }

    /// Score that participates in grade distributions.
    pub fn graded_score(&self) -> Option<f64> {
        if self.is_graded() { self.score } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_override_replaces_due_date() {
        let mut assignment = Assignment {
            id: 1,
            due_at: Some(at(10)),
            ..Default::default()
        };
        assignment.overrides.insert(7, Some(at(20)));
        assignment.overrides.insert(8, None);

        assert_eq!(assignment.overridden_for(6), Some(at(10)));
        assert_eq!(assignment.overridden_for(7), Some(at(20)));
        assert_eq!(assignment.overridden_for(8), None);
    }

    #[test]
    fn test_effective_submitted_at_falls_back_to_graded_at() {
        let graded = Submission {
            graded_at: Some(at(3)),
            workflow_state: WorkflowState::Graded,
            ..Default::default()
        };
        assert_eq!(graded.effective_submitted_at(), Some(at(3)));

        let ungraded = Submission {
            graded_at: Some(at(3)),
            workflow_state: WorkflowState::PendingReview,
            ..Default::default()
        };
        assert_eq!(ungraded.effective_submitted_at(), None);

        let submitted = Submission {
            submitted_at: Some(at(2)),
            graded_at: Some(at(3)),
            workflow_state: WorkflowState::Graded,
            ..Default::default()
        };
        assert_eq!(submitted.effective_submitted_at(), Some(at(2)));
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: String,
    pub name: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    pub capacity: i64,
    #[serde(default)]
    pub enrolled_students: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub class_id: String,
    pub day_of_week: i64,
    pub start_time: String,
    pub end_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleException {
    pub id: String,
    pub schedule_id: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_end_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: String,
    pub title: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    pub student_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub class_id: String,
    pub date: String,
    #[serde(default)]
    pub entries: Vec<AttendanceEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassNote {
    pub id: String,
    pub class_id: String,
    pub date: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Test {
    pub id: String,
    pub class_id: String,
    pub title: String,
    pub date: String,
    pub max_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: String,
    pub test_id: String,
    pub student_id: String,
    pub score: f64,
    pub percentage: f64,
    pub grade: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkAssignment {
    pub id: String,
    pub class_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub due_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_points: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkSubmission {
    pub id: String,
    pub assignment_id: String,
    pub student_id: String,
    pub submitted_at: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// The full set of records a migration run writes. Backups reuse this shape
/// for the persisted snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationPayload {
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub classes: Vec<Class>,
    #[serde(default)]
    pub schedules: Vec<Schedule>,
    #[serde(default)]
    pub schedule_exceptions: Vec<ScheduleException>,
    #[serde(default)]
    pub meetings: Vec<Meeting>,
    #[serde(default)]
    pub attendance: Vec<AttendanceRecord>,
    #[serde(default)]
    pub notes: Vec<ClassNote>,
    #[serde(default)]
    pub tests: Vec<Test>,
    #[serde(default)]
    pub test_results: Vec<TestResult>,
    #[serde(default)]
    pub homework: Vec<HomeworkAssignment>,
    #[serde(default)]
    pub submissions: Vec<HomeworkSubmission>,
}

impl MigrationPayload {
    pub fn enrollment_count(&self) -> usize {
        self.classes.iter().map(|c| c.enrolled_students.len()).sum()
    }

    /// Number of records the payload carries for one group.
    pub fn group_len(&self, group: EntityGroup) -> usize {
        match group {
            EntityGroup::Students => self.students.len(),
            EntityGroup::Classes => self.classes.len(),
            EntityGroup::Enrollments => self.enrollment_count(),
            EntityGroup::Schedules => self.schedules.len(),
            EntityGroup::ScheduleExceptions => self.schedule_exceptions.len(),
            EntityGroup::Meetings => self.meetings.len(),
            EntityGroup::Attendance => self.attendance.len(),
            EntityGroup::Notes => self.notes.len(),
            EntityGroup::Tests => self.tests.len(),
            EntityGroup::TestResults => self.test_results.len(),
            EntityGroup::Homework => self.homework.len(),
            EntityGroup::Submissions => self.submissions.len(),
        }
    }
}

/// Insert steps in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityGroup {
    Students,
    Classes,
    Enrollments,
    Schedules,
    ScheduleExceptions,
    Meetings,
    Attendance,
    Notes,
    Tests,
    TestResults,
    Homework,
    Submissions,
}

impl EntityGroup {
    pub const ALL: [EntityGroup; 12] = [
        EntityGroup::Students,
        EntityGroup::Classes,
        EntityGroup::Enrollments,
        EntityGroup::Schedules,
        EntityGroup::ScheduleExceptions,
        EntityGroup::Meetings,
        EntityGroup::Attendance,
        EntityGroup::Notes,
        EntityGroup::Tests,
        EntityGroup::TestResults,
        EntityGroup::Homework,
        EntityGroup::Submissions,
    ];

    pub fn summary_key(&self) -> &'static str {
        match self {
            Self::Students => "students",
            Self::Classes => "classes",
            Self::Enrollments => "enrollments",
            Self::Schedules => "schedules",
            Self::ScheduleExceptions => "scheduleExceptions",
            Self::Meetings => "meetings",
            Self::Attendance => "attendance",
            Self::Notes => "notes",
            Self::Tests => "tests",
            Self::TestResults => "testResults",
            Self::Homework => "homework",
            Self::Submissions => "submissions",
        }
    }
}

impl fmt::Display for EntityGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.summary_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_groups_default_to_empty() {
        let payload: MigrationPayload = serde_json::from_str(
            r#"{"students":[{"id":"1","name":"Ada","email":"a@b.com"}]}"#,
        )
        .expect("parse payload");
        assert_eq!(payload.students.len(), 1);
        assert!(payload.classes.is_empty());
        assert!(payload.submissions.is_empty());
    }

    #[test]
    fn camel_case_fields_are_accepted() {
        let class: Class = serde_json::from_str(
            r#"{"id":"c1","name":"Algebra","subject":"Math","capacity":20,"enrolledStudents":["1","2"]}"#,
        )
        .expect("parse class");
        assert_eq!(class.enrolled_students, vec!["1", "2"]);
        let payload = MigrationPayload {
            classes: vec![class],
            ..Default::default()
        };
        assert_eq!(payload.group_len(EntityGroup::Enrollments), 2);
    }

    #[test]
    fn groups_are_listed_in_dependency_order() {
        let mut sorted = EntityGroup::ALL;
        sorted.sort();
        assert_eq!(sorted, EntityGroup::ALL);
        assert_eq!(EntityGroup::ALL[0], EntityGroup::Students);
        assert_eq!(EntityGroup::TestResults.to_string(), "testResults");
    }
}

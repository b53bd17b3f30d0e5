use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::OnceLock;

use crate::model::MigrationPayload;

pub const ATTENDANCE_STATUSES: [&str; 4] = ["present", "absent", "late", "excused"];
pub const SUBMISSION_STATUSES: [&str; 4] = ["submitted", "late", "missing", "graded"];

/// One field-level defect in an input payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub entity: String,
    pub id: String,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}].{}: {}",
            self.entity, self.id, self.field, self.message
        )
    }
}

/// Ids that already live in storage, grouped by table. References may point
/// here as well as into the payload; payload ids must not collide with them.
#[derive(Debug, Clone, Default)]
pub struct ExistingIds {
    pub students: HashSet<String>,
    pub classes: HashSet<String>,
    pub schedules: HashSet<String>,
    pub schedule_exceptions: HashSet<String>,
    pub meetings: HashSet<String>,
    pub attendance: HashSet<String>,
    pub notes: HashSet<String>,
    pub tests: HashSet<String>,
    pub test_results: HashSet<String>,
    pub homework: HashSet<String>,
    pub submissions: HashSet<String>,
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .unwrap_or_else(|e| panic!("email pattern must compile: {e}"))
    })
}

pub fn is_valid_email(s: &str) -> bool {
    email_regex().is_match(s)
}

/// Strict HH:MM, 00:00 through 23:59.
pub fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    if s.len() != 5 {
        return None;
    }
    NaiveTime::parse_from_str(s, "%H:%M").ok()
}

pub fn parse_ymd(s: &str) -> Option<NaiveDate> {
    if s.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

struct Collector {
    errors: Vec<ValidationError>,
}

impl Collector {
    fn push(&mut self, entity: &str, id: &str, field: &str, message: impl Into<String>) {
        self.errors.push(ValidationError {
            entity: entity.to_string(),
            id: id.to_string(),
            field: field.to_string(),
            message: message.into(),
        });
    }

    fn required(&mut self, entity: &str, id: &str, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.push(entity, id, field, format!("{} is required", field));
        }
    }

    fn date(&mut self, entity: &str, id: &str, field: &str, value: &str) {
        if parse_ymd(value).is_none() {
            self.push(
                entity,
                id,
                field,
                format!("Invalid date {:?}; expected YYYY-MM-DD", value),
            );
        }
    }

    fn time(&mut self, entity: &str, id: &str, field: &str, value: &str) -> Option<NaiveTime> {
        let parsed = parse_hhmm(value);
        if parsed.is_none() {
            self.push(
                entity,
                id,
                field,
                format!("Invalid time {:?}; expected HH:MM", value),
            );
        }
        parsed
    }

    fn time_window(&mut self, entity: &str, id: &str, start: &str, end: &str) {
        let s = self.time(entity, id, "startTime", start);
        let e = self.time(entity, id, "endTime", end);
        if let (Some(s), Some(e)) = (s, e) {
            if e <= s {
                self.push(entity, id, "endTime", "endTime must be after startTime");
            }
        }
    }

    fn reference(
        &mut self,
        entity: &str,
        id: &str,
        field: &str,
        target: &str,
        value: &str,
        known: &HashSet<&str>,
        stored: &HashSet<String>,
    ) -> bool {
        if known.contains(value) || stored.contains(value) {
            return true;
        }
        self.push(
            entity,
            id,
            field,
            format!("References non-existent {} {:?}", target, value),
        );
        false
    }

    /// Blank ids, duplicates within the group, and collisions with storage.
    /// Returns the set of distinct non-blank ids.
    fn ids<'a>(
        &mut self,
        entity: &str,
        ids: impl Iterator<Item = &'a str>,
        stored: &HashSet<String>,
    ) -> HashSet<&'a str> {
        let mut seen = HashSet::new();
        for id in ids {
            if id.trim().is_empty() {
                self.push(entity, id, "id", "id is required");
                continue;
            }
            if !seen.insert(id) {
                self.push(entity, id, "id", format!("Duplicate {} id {:?}", entity, id));
            } else if stored.contains(id) {
                self.push(
                    entity,
                    id,
                    "id",
                    format!("{} {:?} already exists in storage", entity, id),
                );
            }
        }
        seen
    }
}

/// Validate a payload against itself and against empty storage.
pub fn validate_payload(payload: &MigrationPayload) -> Vec<ValidationError> {
    validate_input_data(payload, &ExistingIds::default())
}

/// Check every entity group for format and cross-reference violations.
///
/// All violations are collected; an empty result means the payload can be
/// migrated. Nothing is mutated.
pub fn validate_input_data(
    payload: &MigrationPayload,
    existing: &ExistingIds,
) -> Vec<ValidationError> {
    let mut c = Collector { errors: Vec::new() };

    let student_ids = c.ids(
        "student",
        payload.students.iter().map(|s| s.id.as_str()),
        &existing.students,
    );
    let class_ids = c.ids(
        "class",
        payload.classes.iter().map(|x| x.id.as_str()),
        &existing.classes,
    );
    let schedule_ids = c.ids(
        "schedule",
        payload.schedules.iter().map(|x| x.id.as_str()),
        &existing.schedules,
    );
    c.ids(
        "scheduleException",
        payload.schedule_exceptions.iter().map(|x| x.id.as_str()),
        &existing.schedule_exceptions,
    );
    c.ids(
        "meeting",
        payload.meetings.iter().map(|x| x.id.as_str()),
        &existing.meetings,
    );
    c.ids(
        "attendance",
        payload.attendance.iter().map(|x| x.id.as_str()),
        &existing.attendance,
    );
    c.ids(
        "note",
        payload.notes.iter().map(|x| x.id.as_str()),
        &existing.notes,
    );
    let test_ids = c.ids(
        "test",
        payload.tests.iter().map(|x| x.id.as_str()),
        &existing.tests,
    );
    c.ids(
        "testResult",
        payload.test_results.iter().map(|x| x.id.as_str()),
        &existing.test_results,
    );
    let assignment_ids = c.ids(
        "homework",
        payload.homework.iter().map(|x| x.id.as_str()),
        &existing.homework,
    );
    c.ids(
        "submission",
        payload.submissions.iter().map(|x| x.id.as_str()),
        &existing.submissions,
    );

    for s in &payload.students {
        c.required("student", &s.id, "name", &s.name);
        if !is_valid_email(&s.email) {
            c.push(
                "student",
                &s.id,
                "email",
                format!("Invalid email format {:?}", s.email),
            );
        }
    }

    for cl in &payload.classes {
        c.required("class", &cl.id, "name", &cl.name);
        c.required("class", &cl.id, "subject", &cl.subject);
        if cl.capacity <= 0 {
            c.push(
                "class",
                &cl.id,
                "capacity",
                format!("Capacity must be greater than 0, got {}", cl.capacity),
            );
        }
        let mut enrolled = HashSet::new();
        for sid in &cl.enrolled_students {
            if !enrolled.insert(sid.as_str()) {
                c.push(
                    "class",
                    &cl.id,
                    "enrolledStudents",
                    format!("Student {:?} is enrolled twice", sid),
                );
                continue;
            }
            c.reference(
                "class",
                &cl.id,
                "enrolledStudents",
                "student",
                sid,
                &student_ids,
                &existing.students,
            );
        }
        // Duplicates are already reported above; count distinct students only.
        if cl.capacity > 0 && enrolled.len() as i64 > cl.capacity {
            c.push(
                "class",
                &cl.id,
                "enrolledStudents",
                format!(
                    "{} enrolled students exceed capacity {}",
                    enrolled.len(),
                    cl.capacity
                ),
            );
        }
    }

    for s in &payload.schedules {
        c.reference(
            "schedule",
            &s.id,
            "classId",
            "class",
            &s.class_id,
            &class_ids,
            &existing.classes,
        );
        if !(0..=6).contains(&s.day_of_week) {
            c.push(
                "schedule",
                &s.id,
                "dayOfWeek",
                format!("dayOfWeek must be between 0 and 6, got {}", s.day_of_week),
            );
        }
        c.time_window("schedule", &s.id, &s.start_time, &s.end_time);
    }

    for x in &payload.schedule_exceptions {
        c.reference(
            "scheduleException",
            &x.id,
            "scheduleId",
            "schedule",
            &x.schedule_id,
            &schedule_ids,
            &existing.schedules,
        );
        c.date("scheduleException", &x.id, "date", &x.date);
        match (&x.new_start_time, &x.new_end_time) {
            (Some(s), Some(e)) => {
                let s = c.time("scheduleException", &x.id, "newStartTime", s);
                let e = c.time("scheduleException", &x.id, "newEndTime", e);
                if let (Some(s), Some(e)) = (s, e) {
                    if e <= s {
                        c.push(
                            "scheduleException",
                            &x.id,
                            "newEndTime",
                            "newEndTime must be after newStartTime",
                        );
                    }
                }
            }
            (Some(s), None) => {
                c.time("scheduleException", &x.id, "newStartTime", s);
            }
            (None, Some(e)) => {
                c.time("scheduleException", &x.id, "newEndTime", e);
            }
            (None, None) => {}
        }
    }

    for m in &payload.meetings {
        c.required("meeting", &m.id, "title", &m.title);
        c.date("meeting", &m.id, "date", &m.date);
        c.time_window("meeting", &m.id, &m.start_time, &m.end_time);
        if let Some(cid) = &m.class_id {
            c.reference(
                "meeting",
                &m.id,
                "classId",
                "class",
                cid,
                &class_ids,
                &existing.classes,
            );
        }
    }

    for a in &payload.attendance {
        c.reference(
            "attendance",
            &a.id,
            "classId",
            "class",
            &a.class_id,
            &class_ids,
            &existing.classes,
        );
        c.date("attendance", &a.id, "date", &a.date);
        let mut seen = HashSet::new();
        for e in &a.entries {
            if !seen.insert(e.student_id.as_str()) {
                c.push(
                    "attendance",
                    &a.id,
                    "entries",
                    format!("Student {:?} appears twice", e.student_id),
                );
                continue;
            }
            c.reference(
                "attendance",
                &a.id,
                "entries.studentId",
                "student",
                &e.student_id,
                &student_ids,
                &existing.students,
            );
            if !ATTENDANCE_STATUSES.contains(&e.status.as_str()) {
                c.push(
                    "attendance",
                    &a.id,
                    "entries.status",
                    format!(
                        "Invalid attendance status {:?}; expected one of {}",
                        e.status,
                        ATTENDANCE_STATUSES.join(", ")
                    ),
                );
            }
        }
    }

    for n in &payload.notes {
        c.reference(
            "note",
            &n.id,
            "classId",
            "class",
            &n.class_id,
            &class_ids,
            &existing.classes,
        );
        c.date("note", &n.id, "date", &n.date);
        c.required("note", &n.id, "content", &n.content);
    }

    let mut max_scores: HashMap<&str, f64> = HashMap::new();
    for t in &payload.tests {
        c.reference(
            "test",
            &t.id,
            "classId",
            "class",
            &t.class_id,
            &class_ids,
            &existing.classes,
        );
        c.required("test", &t.id, "title", &t.title);
        c.date("test", &t.id, "date", &t.date);
        if !(t.max_score > 0.0) {
            c.push(
                "test",
                &t.id,
                "maxScore",
                format!("maxScore must be greater than 0, got {}", t.max_score),
            );
        } else {
            max_scores.entry(t.id.as_str()).or_insert(t.max_score);
        }
    }

    for r in &payload.test_results {
        c.reference(
            "testResult",
            &r.id,
            "testId",
            "test",
            &r.test_id,
            &test_ids,
            &existing.tests,
        );
        c.reference(
            "testResult",
            &r.id,
            "studentId",
            "student",
            &r.student_id,
            &student_ids,
            &existing.students,
        );
        if !(r.score >= 0.0) {
            c.push(
                "testResult",
                &r.id,
                "score",
                format!("score must not be negative, got {}", r.score),
            );
        } else if let Some(max) = max_scores.get(r.test_id.as_str()) {
            if r.score > *max {
                c.push(
                    "testResult",
                    &r.id,
                    "score",
                    format!("score {} exceeds test maxScore {}", r.score, max),
                );
            }
        }
        if !(0.0..=100.0).contains(&r.percentage) {
            c.push(
                "testResult",
                &r.id,
                "percentage",
                format!("percentage must be between 0 and 100, got {}", r.percentage),
            );
        }
        c.required("testResult", &r.id, "grade", &r.grade);
    }

    let mut max_points: HashMap<&str, f64> = HashMap::new();
    for h in &payload.homework {
        c.reference(
            "homework",
            &h.id,
            "classId",
            "class",
            &h.class_id,
            &class_ids,
            &existing.classes,
        );
        c.required("homework", &h.id, "title", &h.title);
        c.date("homework", &h.id, "dueDate", &h.due_date);
        if let Some(p) = h.max_points {
            if !(p > 0.0) {
                c.push(
                    "homework",
                    &h.id,
                    "maxPoints",
                    format!("maxPoints must be greater than 0, got {}", p),
                );
            } else {
                max_points.entry(h.id.as_str()).or_insert(p);
            }
        }
    }

    for s in &payload.submissions {
        c.reference(
            "submission",
            &s.id,
            "assignmentId",
            "homework assignment",
            &s.assignment_id,
            &assignment_ids,
            &existing.homework,
        );
        c.reference(
            "submission",
            &s.id,
            "studentId",
            "student",
            &s.student_id,
            &student_ids,
            &existing.students,
        );
        c.date("submission", &s.id, "submittedAt", &s.submitted_at);
        if !SUBMISSION_STATUSES.contains(&s.status.as_str()) {
            c.push(
                "submission",
                &s.id,
                "status",
                format!(
                    "Invalid submission status {:?}; expected one of {}",
                    s.status,
                    SUBMISSION_STATUSES.join(", ")
                ),
            );
        }
        if let Some(g) = s.grade {
            if !(g >= 0.0) {
                c.push(
                    "submission",
                    &s.id,
                    "grade",
                    format!("grade must not be negative, got {}", g),
                );
            } else if let Some(max) = max_points.get(s.assignment_id.as_str()) {
                if g > *max {
                    c.push(
                        "submission",
                        &s.id,
                        "grade",
                        format!("grade {} exceeds maxPoints {}", g, max),
                    );
                }
            }
        }
    }

    c.errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("first.last+tag@school.edu.au"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email(" a@b.com "));
    }

    #[test]
    fn hhmm_is_strict() {
        assert!(parse_hhmm("08:30").is_some());
        assert!(parse_hhmm("23:59").is_some());
        assert!(parse_hhmm("24:00").is_none());
        assert!(parse_hhmm("8:30").is_none());
        assert!(parse_hhmm("08:60").is_none());
        assert!(parse_hhmm("08:30:00").is_none());
        assert!(parse_hhmm(" 08:30").is_none());
        assert!(parse_hhmm("08:30 ").is_none());
    }

    #[test]
    fn dates_are_iso() {
        assert!(parse_ymd("2024-09-03").is_some());
        assert!(parse_ymd("2024-02-30").is_none());
        assert!(parse_ymd("03/09/2024").is_none());
        assert!(parse_ymd("2024-09-03 ").is_none());
        assert!(parse_ymd(" 2024-09-03").is_none());
    }

    #[test]
    fn display_names_the_field() {
        let e = ValidationError {
            entity: "student".into(),
            id: "1".into(),
            field: "email".into(),
            message: "Invalid email format \"x\"".into(),
        };
        assert_eq!(e.to_string(), "student[1].email: Invalid email format \"x\"");
    }
}

mod test_support;

use classboard_migrate::model::*;
use classboard_migrate::{validate_input_data, validate_payload, ExistingIds};
use test_support::{class, full_payload, student};

#[test]
fn full_payload_is_clean() {
    let errors = validate_payload(&full_payload());
    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
}

#[test]
fn malformed_email_is_one_violation() {
    let mut p = full_payload();
    p.students[0].email = "a@b".to_string();
    let errors = validate_payload(&p);
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert_eq!(errors[0].entity, "student");
    assert_eq!(errors[0].id, "1");
    assert_eq!(errors[0].field, "email");
}

#[test]
fn non_positive_capacity_is_one_violation() {
    let mut p = full_payload();
    p.classes[0].capacity = 0;
    let errors = validate_payload(&p);
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert_eq!(errors[0].field, "capacity");

    p.classes[0].capacity = -3;
    assert_eq!(validate_payload(&p).len(), 1);
}

#[test]
fn dangling_test_result_student_is_reported() {
    let mut p = full_payload();
    p.test_results[0].student_id = "nonexistent".to_string();
    let errors = validate_payload(&p);
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert_eq!(errors[0].entity, "testResult");
    assert_eq!(errors[0].field, "studentId");
    assert!(errors[0].message.contains("References non-existent"));
}

#[test]
fn independent_violations_are_all_collected() {
    let mut p = full_payload();
    p.students[1].email = "nope".to_string();
    p.classes[0].capacity = 0;
    p.schedules[0].day_of_week = 7;
    p.schedules[0].start_time = "25:00".to_string();
    p.submissions[0].assignment_id = "missing-hw".to_string();
    p.attendance[0].entries[0].status = "sleeping".to_string();
    let errors = validate_payload(&p);
    assert_eq!(errors.len(), 6, "{:?}", errors);
}

#[test]
fn schedule_window_must_be_ordered() {
    let mut p = full_payload();
    p.schedules[0].start_time = "10:00".to_string();
    p.schedules[0].end_time = "09:00".to_string();
    let errors = validate_payload(&p);
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert_eq!(errors[0].field, "endTime");
}

#[test]
fn references_may_point_into_storage() {
    let p = MigrationPayload {
        test_results: vec![TestResult {
            id: "r9".into(),
            test_id: "stored-test".into(),
            student_id: "stored-student".into(),
            score: 10.0,
            percentage: 50.0,
            grade: "C".into(),
        }],
        ..Default::default()
    };
    assert_eq!(validate_payload(&p).len(), 2);

    let mut existing = ExistingIds::default();
    existing.tests.insert("stored-test".into());
    existing.students.insert("stored-student".into());
    assert!(validate_input_data(&p, &existing).is_empty());
}

#[test]
fn payload_ids_must_not_collide_with_storage() {
    let p = MigrationPayload {
        students: vec![student("1", "a@b.com")],
        ..Default::default()
    };
    let mut existing = ExistingIds::default();
    existing.students.insert("1".into());
    let errors = validate_input_data(&p, &existing);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("already exists"));
}

#[test]
fn duplicate_ids_and_double_enrollment() {
    let p = MigrationPayload {
        students: vec![student("1", "a@b.com"), student("1", "x@y.com")],
        classes: vec![class("c1", 5, &["1", "1"])],
        ..Default::default()
    };
    let errors = validate_payload(&p);
    assert_eq!(errors.len(), 2, "{:?}", errors);
    assert!(errors.iter().any(|e| e.entity == "student" && e.field == "id"));
    assert!(errors
        .iter()
        .any(|e| e.entity == "class" && e.field == "enrolledStudents"));
}

#[test]
fn enrollment_over_capacity() {
    let p = MigrationPayload {
        students: vec![student("1", "a@b.com"), student("2", "c@d.com")],
        classes: vec![class("c1", 1, &["1", "2"])],
        ..Default::default()
    };
    let errors = validate_payload(&p);
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert!(errors[0].message.contains("exceed capacity"));
}

#[test]
fn scores_are_bounded_by_the_test() {
    let mut p = full_payload();
    p.test_results[0].score = 41.0;
    p.test_results[0].percentage = 102.5;
    let errors = validate_payload(&p);
    assert_eq!(errors.len(), 2, "{:?}", errors);
}

#[test]
fn dates_are_checked_everywhere() {
    let mut p = full_payload();
    p.notes[0].date = "09/09/2024".into();
    p.homework[0].due_date = "2024-13-01".into();
    p.schedule_exceptions[0].date = "".into();
    let errors = validate_payload(&p);
    assert_eq!(errors.len(), 3, "{:?}", errors);
    assert!(errors.iter().all(|e| e.message.contains("YYYY-MM-DD")));
}

#[test]
fn double_enrollment_is_not_also_over_capacity() {
    let p = MigrationPayload {
        students: vec![student("1", "a@b.com")],
        classes: vec![class("c1", 1, &["1", "1"])],
        ..Default::default()
    };
    let errors = validate_payload(&p);
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert!(errors[0].message.contains("enrolled twice"));
}

#[test]
fn rescheduled_exception_times_are_checked() {
    let mut p = full_payload();
    p.schedule_exceptions[0].cancelled = false;
    p.schedule_exceptions[0].new_start_time = Some("10:00".into());
    p.schedule_exceptions[0].new_end_time = Some("09:30".into());
    let errors = validate_payload(&p);
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert_eq!(errors[0].entity, "scheduleException");
    assert_eq!(errors[0].field, "newEndTime");

    p.schedule_exceptions[0].new_start_time = Some("10:75".into());
    p.schedule_exceptions[0].new_end_time = Some("11:00".into());
    let errors = validate_payload(&p);
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert_eq!(errors[0].field, "newStartTime");

    p.schedule_exceptions[0].new_start_time = None;
    p.schedule_exceptions[0].new_end_time = Some("1100".into());
    let errors = validate_payload(&p);
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert_eq!(errors[0].field, "newEndTime");
}

#[test]
fn meeting_window_and_class_reference() {
    let mut p = full_payload();
    p.meetings[0].start_time = "17:00".into();
    p.meetings[0].end_time = "16:00".into();
    let errors = validate_payload(&p);
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert_eq!(errors[0].entity, "meeting");
    assert_eq!(errors[0].field, "endTime");

    let mut p = full_payload();
    p.meetings[0].class_id = Some("stored-class".into());
    let errors = validate_payload(&p);
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert_eq!(errors[0].field, "classId");

    let mut existing = ExistingIds::default();
    existing.classes.insert("stored-class".into());
    assert!(validate_input_data(&p, &existing).is_empty());
}

#[test]
fn surrounding_whitespace_is_not_accepted() {
    let mut p = full_payload();
    p.students[0].email = " a@b.com ".into();
    p.schedules[0].start_time = " 08:30".into();
    p.notes[0].date = "2024-09-03 ".into();
    let errors = validate_payload(&p);
    assert_eq!(errors.len(), 3, "{:?}", errors);
    let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"startTime"));
    assert!(fields.contains(&"date"));
}

//! The named rule sets, one per validated admin operation.

use super::{Check, Code, FieldRule, Pattern, RuleSet};

const GENDERS: &[&str] = &["Male", "Female", "Other"];
const NOTICE_AUDIENCES: &[&str] = &["All", "Student", "Faculty"];

// --- Shared field shapes ---

const TEXT: &[Check] = &[Check::Text];
const PERSON_NAME: &[Check] = &[Check::Text, Check::MinLen(2), Check::MaxLen(50)];
const EMAIL: &[Check] = &[Check::Text, Check::Email];
const DATE: &[Check] = &[Check::Text, Check::Matches(Pattern::Date)];
const PHONE: &[Check] = &[Check::Text, Check::Matches(Pattern::Phone)];
const YEAR: &[Check] = &[Check::Text, Check::Matches(Pattern::Year)];
const URI: &[Check] = &[Check::Text, Check::Uri];
const GENDER: &[Check] = &[Check::Text, Check::OneOf(GENDERS)];

/// `POST /api/admin/login`
pub static LOGIN: RuleSet = RuleSet {
    name: "login",
    fields: &[
        FieldRule::required("username", TEXT).messages(&[
            (Code::Empty, "Username is required"),
            (Code::Required, "Username is required"),
        ]),
        FieldRule::required("password", &[Check::Text, Check::MinLen(3)]).messages(&[
            (Code::Empty, "Password is required"),
            (Code::Min, "Password must be at least 3 characters long"),
            (Code::Required, "Password is required"),
        ]),
    ],
};

/// `POST /api/admin/updatepassword`
pub static PASSWORD_UPDATE: RuleSet = RuleSet {
    name: "password-update",
    fields: &[
        FieldRule::required("newPassword", &[Check::Text, Check::MinLen(6)]).messages(&[
            (Code::Empty, "New password is required"),
            (Code::Min, "New password must be at least 6 characters long"),
            (Code::Required, "New password is required"),
        ]),
        FieldRule::required("confirmPassword", &[Check::Text, Check::SameAs("newPassword")])
            .messages(&[
                (Code::Only, "Passwords do not match"),
                (Code::Required, "Confirm password is required"),
            ]),
        FieldRule::required("email", EMAIL).messages(&[
            (Code::Email, "Please provide a valid email"),
            (Code::Required, "Email is required"),
        ]),
    ],
};

/// `POST /api/admin/addadmin`
pub static ADMIN_CREATE: RuleSet = RuleSet {
    name: "admin-create",
    fields: &[
        FieldRule::required("name", PERSON_NAME).messages(&[
            (Code::Min, "Name must be at least 2 characters long"),
            (Code::Max, "Name cannot exceed 50 characters"),
            (Code::Required, "Name is required"),
        ]),
        FieldRule::required("email", EMAIL).messages(&[
            (Code::Email, "Please provide a valid email"),
            (Code::Required, "Email is required"),
        ]),
        FieldRule::required("department", TEXT)
            .messages(&[(Code::Required, "Department is required")]),
        FieldRule::required("dob", DATE).messages(&[
            (Code::Pattern, "Date of birth must be in YYYY-MM-DD format"),
            (Code::Required, "Date of birth is required"),
        ]),
        FieldRule::required("contactNumber", PHONE).messages(&[
            (Code::Pattern, "Contact number must be 10 digits"),
            (Code::Required, "Contact number is required"),
        ]),
        FieldRule::required("joiningYear", YEAR).messages(&[
            (Code::Pattern, "Joining year must be a 4-digit year"),
            (Code::Required, "Joining year is required"),
        ]),
        FieldRule::optional("avatar", URI),
    ],
};

/// `POST /api/admin/addstudent`
pub static STUDENT_CREATE: RuleSet = RuleSet {
    name: "student-create",
    fields: &[
        FieldRule::required("name", PERSON_NAME),
        FieldRule::required("email", EMAIL),
        FieldRule::required("department", TEXT),
        FieldRule::required("dob", DATE),
        FieldRule::required("contactNumber", PHONE),
        FieldRule::required("section", TEXT),
        FieldRule::required("gender", GENDER),
        FieldRule::required("batch", TEXT),
        FieldRule::required("year", TEXT),
        FieldRule::required("fatherName", PERSON_NAME),
        FieldRule::required("motherName", PERSON_NAME),
        FieldRule::required("fatherContactNumber", PHONE),
        FieldRule::required("motherContactNumber", PHONE),
        FieldRule::optional("avatar", URI),
    ],
};

/// `POST /api/admin/addfaculty`
pub static FACULTY_CREATE: RuleSet = RuleSet {
    name: "faculty-create",
    fields: &[
        FieldRule::required("name", PERSON_NAME),
        FieldRule::required("email", EMAIL),
        FieldRule::required("department", TEXT),
        FieldRule::required("dob", DATE),
        FieldRule::required("contactNumber", PHONE),
        FieldRule::required("gender", GENDER),
        FieldRule::required("designation", TEXT),
        FieldRule::required("joiningYear", YEAR),
        FieldRule::optional("avatar", URI),
    ],
};

/// `POST /api/admin/adddepartment`
pub static DEPARTMENT_CREATE: RuleSet = RuleSet {
    name: "department-create",
    fields: &[FieldRule::required(
        "department",
        &[Check::Text, Check::MinLen(2), Check::MaxLen(100)],
    )
    .messages(&[
        (Code::Min, "Department name must be at least 2 characters long"),
        (Code::Max, "Department name cannot exceed 100 characters"),
        (Code::Required, "Department name is required"),
    ])],
};

/// `POST /api/admin/addsubject`
pub static SUBJECT_CREATE: RuleSet = RuleSet {
    name: "subject-create",
    fields: &[
        FieldRule::required("subjectName", &[Check::Text, Check::MinLen(2), Check::MaxLen(100)]),
        FieldRule::required("subjectCode", &[Check::Text, Check::MinLen(2), Check::MaxLen(20)]),
        FieldRule::required("department", TEXT),
        FieldRule::required("year", TEXT),
        FieldRule::required(
            "totalLectures",
            &[Check::Integer, Check::AtLeast(1), Check::AtMost(u32::MAX as i64)],
        )
        .messages(&[
            (Code::Min, "Total lectures must be at least 1"),
            (Code::Required, "Total lectures is required"),
        ]),
    ],
};

/// `POST /api/admin/createnotice`
pub static NOTICE_CREATE: RuleSet = RuleSet {
    name: "notice-create",
    fields: &[
        FieldRule::required("topic", &[Check::Text, Check::MinLen(5), Check::MaxLen(200)]),
        FieldRule::required("content", &[Check::Text, Check::MinLen(10), Check::MaxLen(2000)]),
        FieldRule::required("date", DATE),
        FieldRule::required("noticeFor", &[Check::Text, Check::OneOf(NOTICE_AUDIENCES)]),
        FieldRule::required("from", TEXT),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;
    use serde_json::json;

    fn messages(rules: &RuleSet, body: serde_json::Value) -> Vec<(String, String)> {
        validate(rules, &body)
            .unwrap_err()
            .into_iter()
            .map(|e| (e.field, e.message))
            .collect()
    }

    #[test]
    fn login_reports_missing_username_with_custom_message() {
        assert_eq!(
            messages(&LOGIN, json!({ "password": "secret" })),
            vec![("username".to_string(), "Username is required".to_string())]
        );
    }

    #[test]
    fn login_short_password() {
        assert_eq!(
            messages(&LOGIN, json!({ "username": "ADM2024001", "password": "ab" })),
            vec![(
                "password".to_string(),
                "Password must be at least 3 characters long".to_string()
            )]
        );
    }

    #[test]
    fn password_mismatch_is_reported() {
        let found = messages(
            &PASSWORD_UPDATE,
            json!({ "newPassword": "abcdef", "confirmPassword": "abcdeg", "email": "a@b.co" }),
        );
        assert_eq!(
            found,
            vec![("confirmPassword".to_string(), "Passwords do not match".to_string())]
        );
    }

    #[test]
    fn admin_create_collects_all_failures() {
        let found = messages(
            &ADMIN_CREATE,
            json!({
                "name": "A",
                "email": "not-an-email",
                "department": "CSE",
                "dob": "01/02/2000",
                "contactNumber": "12345",
                "joiningYear": "24",
                "avatar": "nope"
            }),
        );
        let fields: Vec<&str> = found.iter().map(|(f, _)| f.as_str()).collect();
        assert_eq!(
            fields,
            vec!["name", "email", "dob", "contactNumber", "joiningYear", "avatar"]
        );
        assert_eq!(found[3].1, "Contact number must be 10 digits");
    }

    #[test]
    fn student_create_accepts_a_complete_record() {
        let body = json!({
            "name": "Riya Sharma",
            "email": "riya@college.edu",
            "department": "Computer Science",
            "dob": "2003-04-15",
            "contactNumber": "9876543210",
            "section": "A",
            "gender": "Female",
            "batch": "2021-2025",
            "year": "3",
            "fatherName": "Raj Sharma",
            "motherName": "Meera Sharma",
            "fatherContactNumber": "9876500000",
            "motherContactNumber": "9876511111"
        });
        assert!(validate(&STUDENT_CREATE, &body).is_ok());
    }

    #[test]
    fn faculty_gender_must_be_listed() {
        let found = messages(
            &FACULTY_CREATE,
            json!({
                "name": "Dr Rao",
                "email": "rao@college.edu",
                "department": "Physics",
                "dob": "1980-01-01",
                "contactNumber": "9000000000",
                "gender": "Unknown",
                "designation": "Professor",
                "joiningYear": "2010"
            }),
        );
        assert_eq!(
            found,
            vec![(
                "gender".to_string(),
                "\"gender\" must be one of [Male, Female, Other]".to_string()
            )]
        );
    }

    #[test]
    fn department_name_too_short() {
        assert_eq!(
            messages(&DEPARTMENT_CREATE, json!({ "department": "X" })),
            vec![(
                "department".to_string(),
                "Department name must be at least 2 characters long".to_string()
            )]
        );
    }

    #[test]
    fn subject_needs_at_least_one_lecture() {
        let found = messages(
            &SUBJECT_CREATE,
            json!({
                "subjectName": "Algorithms",
                "subjectCode": "CS301",
                "department": "CSE",
                "year": "3",
                "totalLectures": 0
            }),
        );
        assert_eq!(
            found,
            vec![("totalLectures".to_string(), "Total lectures must be at least 1".to_string())]
        );
    }

    #[test]
    fn total_lectures_above_the_counter_range_is_rejected() {
        let found = messages(
            &SUBJECT_CREATE,
            json!({
                "subjectName": "Algorithms",
                "subjectCode": "CS301",
                "department": "CSE",
                "year": "3",
                "totalLectures": 5_000_000_000_u64
            }),
        );
        assert_eq!(
            found,
            vec![(
                "totalLectures".to_string(),
                "\"totalLectures\" must be less than or equal to 4294967295".to_string()
            )]
        );
    }

    #[test]
    fn notice_audience_and_lengths() {
        let found = messages(
            &NOTICE_CREATE,
            json!({
                "topic": "Exam",
                "content": "Too short",
                "date": "2024-10-01",
                "noticeFor": "Parents",
                "from": "Admin"
            }),
        );
        let fields: Vec<&str> = found.iter().map(|(f, _)| f.as_str()).collect();
        assert_eq!(fields, vec!["topic", "content", "noticeFor"]);
    }
}

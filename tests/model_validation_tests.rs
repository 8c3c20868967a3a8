use college_erp::{
    error::{ErrorEnvelope, FieldError},
    models::{
        Admin, CreateSubjectRequest, Department, LoginResponse, MutationResponse,
        ProfileUpdateRequest, Student, Subject,
    },
};
use serde_json::json;
use uuid::Uuid;

// --- Tests ---

#[test]
fn stored_admin_decodes_without_exposing_the_password() {
    let id = Uuid::new_v4();
    let stored = json!({
        "_id": id.to_string(),
        "name": "Seed Admin",
        "email": "seed.admin@college.local",
        "username": "ADMDUMMY",
        "password": "pbkdf2-sha256$1000$c2FsdA$aGFzaA",
        "department": "Administration",
        "dob": "1970-01-01",
        "joiningYear": "2024",
        "contactNumber": "0000000000",
        "createdAt": "2024-01-01T00:00:00+00:00"
    });

    let admin: Admin = serde_json::from_value(stored).unwrap();
    assert_eq!(admin.id, id);
    assert!(admin.is_active, "missing isActive defaults to true");
    assert!(!admin.password_updated);
    assert_eq!(admin.last_login, None);

    let rendered = serde_json::to_value(&admin).unwrap();
    assert!(rendered.get("password").is_none());
    assert_eq!(rendered["_id"], id.to_string());
    assert_eq!(rendered["joiningYear"], "2024");
    assert!(rendered.get("joining_year").is_none());
}

#[test]
fn student_subjects_default_to_empty() {
    let student: Student = serde_json::from_value(json!({
        "_id": Uuid::new_v4().to_string(),
        "name": "Riya Sharma",
        "email": "riya@college.edu",
        "username": "STU2024001",
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
    }))
    .unwrap();

    assert!(student.subjects.is_empty());
    assert_eq!(student.father_name, "Raj Sharma");
}

#[test]
fn subject_request_accepts_number_or_numeric_string() {
    let base = json!({
        "subjectName": "Data Structures",
        "subjectCode": "CS201",
        "department": "Computer Science",
        "year": "2"
    });

    let mut as_number = base.clone();
    as_number["totalLectures"] = json!(40);
    let parsed: CreateSubjectRequest = serde_json::from_value(as_number).unwrap();
    assert_eq!(parsed.total_lectures, 40);

    let mut as_text = base.clone();
    as_text["totalLectures"] = json!(" 40 ");
    let parsed: CreateSubjectRequest = serde_json::from_value(as_text).unwrap();
    assert_eq!(parsed.total_lectures, 40);

    let mut whole_float = base.clone();
    whole_float["totalLectures"] = json!(40.0);
    let parsed: CreateSubjectRequest = serde_json::from_value(whole_float).unwrap();
    assert_eq!(parsed.total_lectures, 40);

    for rejected in [json!("forty"), json!(40.5), json!(-1), json!(5_000_000_000_u64)] {
        let mut body = base.clone();
        body["totalLectures"] = rejected.clone();
        assert!(
            serde_json::from_value::<CreateSubjectRequest>(body).is_err(),
            "{rejected} should not decode"
        );
    }
}

#[test]
fn subject_serializes_camel_case() {
    let subject = Subject {
        id: Uuid::new_v4(),
        subject_name: "Optics".to_string(),
        subject_code: "PH110".to_string(),
        department: "Physics".to_string(),
        year: "1".to_string(),
        total_lectures: 30,
        created_at: None,
        updated_at: None,
    };

    let value = serde_json::to_value(&subject).unwrap();
    assert_eq!(value["subjectCode"], "PH110");
    assert_eq!(value["totalLectures"], 30);
}

#[test]
fn profile_update_serializes_only_supplied_fields() {
    let request: ProfileUpdateRequest =
        serde_json::from_value(json!({ "contactNumber": "9123456789" })).unwrap();
    assert_eq!(
        serde_json::to_value(&request).unwrap(),
        json!({ "contactNumber": "9123456789" })
    );
}

#[test]
fn mutation_and_login_envelopes_have_the_documented_keys() {
    let department = Department {
        id: Uuid::new_v4(),
        department: "Physics".to_string(),
        department_code: "02".to_string(),
        created_at: None,
        updated_at: None,
    };
    let value =
        serde_json::to_value(MutationResponse::new("Department added successfully", department))
            .unwrap();
    assert_eq!(value["success"], true);
    assert_eq!(value["response"]["departmentCode"], "02");

    let admin: Admin = serde_json::from_value(json!({
        "_id": Uuid::new_v4().to_string(),
        "name": "A B",
        "email": "a@b.co",
        "username": "ADM2024001",
        "department": "X",
        "dob": "1990-01-01",
        "joiningYear": "2020",
        "contactNumber": "9999999999"
    }))
    .unwrap();
    let value = serde_json::to_value(LoginResponse {
        result: admin,
        token: "t".to_string(),
    })
    .unwrap();
    assert_eq!(value["token"], "t");
    assert_eq!(value["result"]["username"], "ADM2024001");
}

#[test]
fn error_envelope_omits_absent_parts() {
    let bare = serde_json::to_value(ErrorEnvelope::new("Access denied. Invalid token.")).unwrap();
    assert_eq!(bare, json!({ "error": "Access denied. Invalid token." }));

    let detailed = ErrorEnvelope {
        error: "Validation failed".to_string(),
        message: None,
        details: Some(vec![FieldError::new("name", "Name is required")]),
    };
    assert_eq!(
        serde_json::to_value(detailed).unwrap(),
        json!({
            "error": "Validation failed",
            "details": [{ "field": "name", "message": "Name is required" }]
        })
    );
}

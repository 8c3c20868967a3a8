use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Stored Records (Response Schemas) ---
//
// Records are read back from documents. Fields the document carries but the record does
// not declare (the password hash in particular) are dropped on the way out.

/// Admin
///
/// An administrator account. The only kind of account that can call `/api/admin`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub username: String,
    pub department: String,
    pub dob: String,
    pub joining_year: String,
    pub contact_number: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub password_updated: bool,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
    #[serde(default)]
    pub last_login: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

fn active_by_default() -> bool {
    true
}

/// Student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Student {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub username: String,
    pub department: String,
    pub dob: String,
    pub contact_number: String,
    pub section: String,
    pub gender: String,
    pub batch: String,
    pub year: String,
    pub father_name: String,
    pub mother_name: String,
    pub father_contact_number: String,
    pub mother_contact_number: String,
    #[serde(default)]
    pub avatar: Option<String>,
    /// Subject codes the student is enrolled in.
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub password_updated: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Faculty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Faculty {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub username: String,
    pub department: String,
    pub dob: String,
    pub contact_number: String,
    pub gender: String,
    pub designation: String,
    pub joining_year: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub password_updated: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Department
///
/// `departmentCode` is a two-digit code assigned in creation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Department {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub department: String,
    pub department_code: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Subject {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub subject_name: String,
    pub subject_code: String,
    pub department: String,
    pub year: String,
    pub total_lectures: u32,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Notice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Notice {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub topic: String,
    pub content: String,
    pub date: String,
    /// `All`, `Student` or `Faculty`.
    pub notice_for: String,
    pub from: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

// --- Request Payloads (Input Schemas) ---

/// LoginRequest
///
/// Input payload for `POST /api/admin/login`.
#[derive(Debug, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// PasswordUpdateRequest
///
/// Input payload for `POST /api/admin/updatepassword`. Equality of the two passwords is
/// checked by the validation stage.
#[derive(Debug, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PasswordUpdateRequest {
    pub new_password: String,
    pub confirm_password: String,
    pub email: String,
}

/// ProfileUpdateRequest
///
/// Partial update of the caller's own admin profile. Absent fields are left untouched.
#[derive(Debug, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProfileUpdateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// CreateAdminRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateAdminRequest {
    pub name: String,
    pub email: String,
    pub department: String,
    pub dob: String,
    pub contact_number: String,
    pub joining_year: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// CreateStudentRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateStudentRequest {
    pub name: String,
    pub email: String,
    pub department: String,
    pub dob: String,
    pub contact_number: String,
    pub section: String,
    pub gender: String,
    pub batch: String,
    pub year: String,
    pub father_name: String,
    pub mother_name: String,
    pub father_contact_number: String,
    pub mother_contact_number: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// CreateFacultyRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateFacultyRequest {
    pub name: String,
    pub email: String,
    pub department: String,
    pub dob: String,
    pub contact_number: String,
    pub gender: String,
    pub designation: String,
    pub joining_year: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// CreateDepartmentRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateDepartmentRequest {
    pub department: String,
}

/// CreateSubjectRequest
///
/// `totalLectures` may arrive as a number or a numeric string.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateSubjectRequest {
    pub subject_name: String,
    pub subject_code: String,
    pub department: String,
    pub year: String,
    #[serde(deserialize_with = "number_or_numeric_string")]
    pub total_lectures: u32,
}

/// CreateNoticeRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateNoticeRequest {
    pub topic: String,
    pub content: String,
    pub date: String,
    pub notice_for: String,
    pub from: String,
}

/// DeleteRequest
///
/// Identifies the record to remove by its `_id`.
#[derive(Debug, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DeleteRequest {
    pub id: String,
}

/// Accepts `40`, `40.0` or `" 40 "`. Anything fractional, negative or past `u32::MAX` is
/// refused.
fn number_or_numeric_string<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    let n = match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n,
        Raw::Text(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom)?,
    };

    if n.is_finite() && n.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&n) {
        Ok(n as u32)
    } else {
        Err(serde::de::Error::custom(format!(
            "{n} is not a whole number of lectures"
        )))
    }
}

// --- Response Payloads ---

/// LoginResponse
///
/// The authenticated admin and a freshly signed bearer token.
#[derive(Debug, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub result: Admin,
    pub token: String,
}

/// MutationResponse
///
/// Acknowledges a create or update and echoes the stored record.
#[derive(Debug, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct MutationResponse<T: TS> {
    pub success: bool,
    pub message: String,
    pub response: T,
}

impl<T: TS> MutationResponse<T> {
    pub fn new(message: impl Into<String>, response: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            response,
        }
    }
}

/// Acknowledgement
///
/// Body of a successful delete.
#[derive(Debug, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Acknowledgement {
    pub success: bool,
    pub message: String,
}

/// HealthStatus
#[derive(Debug, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    /// Seconds since the process started.
    pub uptime: f64,
    pub environment: String,
}

/// ApiInfo
///
/// Body of `GET /`.
#[derive(Debug, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ApiInfo {
    pub message: String,
    pub version: String,
    pub status: String,
    pub endpoints: ApiEndpoints,
}

#[derive(Debug, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ApiEndpoints {
    pub health: String,
    pub admin: String,
    pub faculty: String,
    pub student: String,
}

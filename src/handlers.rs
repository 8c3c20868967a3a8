use std::{future::Future, time::Duration};

use axum::{Json, extract::State, http::Uri};
use chrono::{Datelike, Utc};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{
    AppState,
    auth::{self, AuthUser},
    error::AppError,
    models::{
        Acknowledgement, Admin, ApiEndpoints, ApiInfo, CreateAdminRequest,
        CreateDepartmentRequest, CreateFacultyRequest, CreateNoticeRequest,
        CreateStudentRequest, CreateSubjectRequest, DeleteRequest, Department, Faculty,
        HealthStatus, LoginRequest, LoginResponse, MutationResponse, Notice,
        PasswordUpdateRequest, ProfileUpdateRequest, Student, Subject,
    },
    password,
    repository::{Collection, Document, Filter, RepoError, RepositoryState, filter_by},
    validation::Payload,
};

// --- Persistence Access ---

/// Db
///
/// The repository as handlers see it: every call is bounded by the configured deadline,
/// and failures arrive already converted into `AppError`.
struct Db {
    repo: RepositoryState,
    timeout: Duration,
}

impl Db {
    fn new(state: &AppState) -> Self {
        Self {
            repo: state.repo.clone(),
            timeout: state.config.persistence_timeout,
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, RepoError>>,
    ) -> Result<T, AppError> {
        let result = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| RepoError::Timeout)?;
        Ok(result?)
    }

    async fn create(&self, collection: Collection, doc: Document) -> Result<Document, AppError> {
        self.bounded(self.repo.create(collection, doc)).await
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: Filter,
    ) -> Result<Option<Document>, AppError> {
        self.bounded(self.repo.find_one(collection, filter)).await
    }

    async fn find(&self, collection: Collection, filter: Filter) -> Result<Vec<Document>, AppError> {
        self.bounded(self.repo.find(collection, filter)).await
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: Filter,
        patch: Document,
    ) -> Result<Option<Document>, AppError> {
        self.bounded(self.repo.update_one(collection, filter, patch))
            .await
    }

    async fn delete_one(&self, collection: Collection, filter: Filter) -> Result<bool, AppError> {
        self.bounded(self.repo.delete_one(collection, filter)).await
    }

    async fn count(&self, collection: Collection) -> Result<u64, AppError> {
        self.bounded(self.repo.count(collection)).await
    }
}

fn to_document<T: Serialize>(value: &T) -> Result<Document, AppError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(doc)) => Ok(doc),
        Ok(_) => Err(AppError::internal("SerializationError", "record is not an object")),
        Err(e) => Err(AppError::internal("SerializationError", e.to_string())),
    }
}

fn decode<T: DeserializeOwned>(doc: Document) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(doc))
        .map_err(|e| AppError::internal("CorruptRecord", e.to_string()))
}

fn decode_all<T: DeserializeOwned>(docs: Vec<Document>) -> Result<Vec<T>, AppError> {
    docs.into_iter().map(decode).collect()
}

async fn list<T: DeserializeOwned>(
    state: &AppState,
    collection: Collection,
    filter: Filter,
) -> Result<Json<Vec<T>>, AppError> {
    let docs = Db::new(state).find(collection, filter).await?;
    Ok(Json(decode_all(docs)?))
}

async fn remove(
    state: &AppState,
    collection: Collection,
    label: &str,
    id: &str,
) -> Result<Json<Acknowledgement>, AppError> {
    if !Db::new(state).delete_one(collection, filter_by("_id", id)).await? {
        return Err(AppError::NotFound(format!("{label} not found")));
    }

    tracing::info!(collection = collection.as_str(), id, "record deleted");
    Ok(Json(Acknowledgement {
        success: true,
        message: format!("{label} deleted successfully"),
    }))
}

// --- Account Provisioning ---

/// The initial password of a new account: its date of birth as `DD-MM-YYYY`.
pub fn initial_password(dob: &str) -> String {
    dob.split('-').rev().collect::<Vec<_>>().join("-")
}

/// Next free username of the form `<prefix><year><nnn>`.
async fn next_username(db: &Db, collection: Collection, prefix: &str) -> Result<String, AppError> {
    let year = Utc::now().year();
    let mut sequence = db.count(collection).await? + 1;

    loop {
        let candidate = format!("{prefix}{year}{sequence:03}");
        if db
            .find_one(collection, filter_by("username", candidate.as_str()))
            .await?
            .is_none()
        {
            return Ok(candidate);
        }
        sequence += 1;
    }
}

async fn hash_password(state: &AppState, plain: String) -> Result<String, AppError> {
    Ok(password::hash_blocking(plain, state.config.password_iterations).await?)
}

/// Stores a new admin, student or faculty account with a generated username and the
/// date-of-birth initial password.
async fn provision_account<R: Serialize, T: DeserializeOwned>(
    state: &AppState,
    collection: Collection,
    prefix: &str,
    request: &R,
) -> Result<T, AppError> {
    let db = Db::new(state);
    let mut doc = to_document(request)?;

    let email = doc
        .get("email")
        .and_then(Value::as_str)
        .map(str::to_lowercase)
        .unwrap_or_default();
    let dob = doc
        .get("dob")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let username = next_username(&db, collection, prefix).await?;
    let hashed = hash_password(state, initial_password(&dob)).await?;

    doc.insert("email".to_string(), Value::String(email));
    doc.insert("username".to_string(), Value::String(username.clone()));
    doc.insert("password".to_string(), Value::String(hashed));
    doc.insert("passwordUpdated".to_string(), Value::Bool(false));

    let stored = db.create(collection, doc).await?;
    tracing::info!(collection = collection.as_str(), %username, "account created");
    decode(stored)
}

/// bootstrap_admin
///
/// Creates the configured seed admin when no admin with that username exists yet.
pub async fn bootstrap_admin(state: &AppState) -> Result<(), AppError> {
    let Some(seed) = state.config.seed_admin.clone() else {
        return Ok(());
    };

    let db = Db::new(state);
    let existing = db
        .find_one(Collection::Admin, filter_by("username", seed.username.as_str()))
        .await?;
    if existing.is_some() {
        tracing::debug!(username = %seed.username, "seed admin already present");
        return Ok(());
    }

    let mut doc = to_document(&CreateAdminRequest {
        name: "Seed Admin".to_string(),
        email: "seed.admin@college.local".to_string(),
        department: "Administration".to_string(),
        dob: "1970-01-01".to_string(),
        contact_number: "0000000000".to_string(),
        joining_year: Utc::now().year().to_string(),
        avatar: None,
    })?;
    doc.insert("username".to_string(), Value::String(seed.username.clone()));
    doc.insert(
        "password".to_string(),
        Value::String(hash_password(state, seed.password).await?),
    );
    doc.insert("passwordUpdated".to_string(), Value::Bool(false));

    db.create(Collection::Admin, doc).await?;
    tracing::info!(username = %seed.username, "seed admin created");
    Ok(())
}

// --- Public Handlers ---

/// root
///
/// API information and the top-level endpoint map.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "API information", body = ApiInfo))
)]
pub async fn root() -> Json<ApiInfo> {
    Json(ApiInfo {
        message: "College ERP API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
        endpoints: ApiEndpoints {
            health: "/health".to_string(),
            admin: "/api/admin".to_string(),
            faculty: "/api/faculty".to_string(),
            student: "/api/student".to_string(),
        },
    })
}

/// health
///
/// Liveness probe with process uptime.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthStatus))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "OK".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        uptime: state.started_at.elapsed().as_secs_f64(),
        environment: state.config.env.as_str().to_string(),
    })
}

/// route_not_found
///
/// Router fallback for unknown paths and unsupported methods.
pub async fn route_not_found(uri: Uri) -> AppError {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    AppError::RouteNotFound(path)
}

/// admin_login
///
/// [Public Route] Exchanges admin credentials for a bearer token.
#[utoipa::path(
    post,
    path = "/api/admin/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many login attempts")
    )
)]
pub async fn admin_login(
    State(state): State<AppState>,
    Payload(request): Payload<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let db = Db::new(&state);

    let Some(doc) = db
        .find_one(Collection::Admin, filter_by("username", request.username.as_str()))
        .await?
    else {
        return Err(AppError::InvalidCredentials);
    };

    let Some(stored_hash) = doc.get("password").and_then(Value::as_str).map(str::to_string)
    else {
        tracing::warn!(username = %request.username, "admin record has no password hash");
        return Err(AppError::InvalidCredentials);
    };

    if !password::verify_blocking(request.password, stored_hash).await? {
        return Err(AppError::InvalidCredentials);
    }

    let mut patch = Document::new();
    patch.insert("lastLogin".to_string(), Value::String(Utc::now().to_rfc3339()));
    let filter = filter_by("username", request.username.as_str());
    let doc = db
        .update_one(Collection::Admin, filter, patch)
        .await?
        .unwrap_or(doc);

    let admin: Admin = decode(doc)?;
    let token = auth::issue_token(
        admin.id,
        &admin.email,
        &state.config.jwt_secret,
        state.config.token_ttl,
    )?;

    tracing::info!(username = %admin.username, "admin logged in");
    Ok(Json(LoginResponse {
        result: admin,
        token,
    }))
}

// --- Protected Handlers ---

/// update_password
///
/// [Authenticated Route] Replaces the password of the admin with the given email.
#[utoipa::path(
    post,
    path = "/api/admin/updatepassword",
    request_body = PasswordUpdateRequest,
    responses(
        (status = 200, description = "Password updated", body = MutationResponse<Admin>),
        (status = 404, description = "No admin with that email")
    ),
    security(("bearer" = []))
)]
pub async fn update_password(
    _caller: AuthUser,
    State(state): State<AppState>,
    Payload(request): Payload<PasswordUpdateRequest>,
) -> Result<Json<MutationResponse<Admin>>, AppError> {
    let email = request.email.to_lowercase();
    let hashed = hash_password(&state, request.new_password).await?;

    let mut patch = Document::new();
    patch.insert("password".to_string(), Value::String(hashed));
    patch.insert("passwordUpdated".to_string(), Value::Bool(true));

    let updated = Db::new(&state)
        .update_one(Collection::Admin, filter_by("email", email.as_str()), patch)
        .await?
        .ok_or_else(|| AppError::NotFound("No admin found with that email".to_string()))?;

    Ok(Json(MutationResponse::new(
        "Password updated successfully",
        decode(updated)?,
    )))
}

/// update_profile
///
/// [Authenticated Route] Applies a partial update to the caller's own admin record.
#[utoipa::path(
    post,
    path = "/api/admin/updateprofile",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Profile updated", body = MutationResponse<Admin>),
        (status = 404, description = "Caller's record no longer exists")
    ),
    security(("bearer" = []))
)]
pub async fn update_profile(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Payload(mut request): Payload<ProfileUpdateRequest>,
) -> Result<Json<MutationResponse<Admin>>, AppError> {
    request.email = request.email.map(|email| email.to_lowercase());
    let patch = to_document(&request)?;

    let updated = Db::new(&state)
        .update_one(Collection::Admin, filter_by("_id", id.to_string()), patch)
        .await?
        .ok_or_else(|| AppError::NotFound("Admin not found".to_string()))?;

    Ok(Json(MutationResponse::new("Profile updated", decode(updated)?)))
}

/// get_all_students
#[utoipa::path(
    get,
    path = "/api/admin/getallstudent",
    responses((status = 200, description = "All students", body = [Student])),
    security(("bearer" = []))
)]
pub async fn get_all_students(
    _caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Student>>, AppError> {
    list(&state, Collection::Student, Filter::new()).await
}

/// get_all_faculty
#[utoipa::path(
    get,
    path = "/api/admin/getallfaculty",
    responses((status = 200, description = "All faculty", body = [Faculty])),
    security(("bearer" = []))
)]
pub async fn get_all_faculty(
    _caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Faculty>>, AppError> {
    list(&state, Collection::Faculty, Filter::new()).await
}

/// get_all_departments
#[utoipa::path(
    get,
    path = "/api/admin/getalldepartment",
    responses((status = 200, description = "All departments", body = [Department])),
    security(("bearer" = []))
)]
pub async fn get_all_departments(
    _caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Department>>, AppError> {
    list(&state, Collection::Department, Filter::new()).await
}

/// get_all_subjects
#[utoipa::path(
    get,
    path = "/api/admin/getallsubject",
    responses((status = 200, description = "All subjects", body = [Subject])),
    security(("bearer" = []))
)]
pub async fn get_all_subjects(
    _caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Subject>>, AppError> {
    list(&state, Collection::Subject, Filter::new()).await
}

/// get_all_admins
#[utoipa::path(
    get,
    path = "/api/admin/getalladmin",
    responses((status = 200, description = "All admins", body = [Admin])),
    security(("bearer" = []))
)]
pub async fn get_all_admins(
    _caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Admin>>, AppError> {
    list(&state, Collection::Admin, Filter::new()).await
}

/// add_admin
///
/// [Authenticated Route] Creates an admin account (`ADM<year><nnn>`).
#[utoipa::path(
    post,
    path = "/api/admin/addadmin",
    request_body = CreateAdminRequest,
    responses(
        (status = 200, description = "Admin created", body = MutationResponse<Admin>),
        (status = 400, description = "Validation failed or duplicate entry")
    ),
    security(("bearer" = []))
)]
pub async fn add_admin(
    _caller: AuthUser,
    State(state): State<AppState>,
    Payload(request): Payload<CreateAdminRequest>,
) -> Result<Json<MutationResponse<Admin>>, AppError> {
    let admin = provision_account(&state, Collection::Admin, "ADM", &request).await?;
    Ok(Json(MutationResponse::new("Admin added successfully", admin)))
}

/// add_student
///
/// [Authenticated Route] Creates a student account (`STU<year><nnn>`).
#[utoipa::path(
    post,
    path = "/api/admin/addstudent",
    request_body = CreateStudentRequest,
    responses(
        (status = 200, description = "Student created", body = MutationResponse<Student>),
        (status = 400, description = "Validation failed or duplicate entry")
    ),
    security(("bearer" = []))
)]
pub async fn add_student(
    _caller: AuthUser,
    State(state): State<AppState>,
    Payload(request): Payload<CreateStudentRequest>,
) -> Result<Json<MutationResponse<Student>>, AppError> {
    let student = provision_account(&state, Collection::Student, "STU", &request).await?;
    Ok(Json(MutationResponse::new("Student added successfully", student)))
}

/// add_faculty
///
/// [Authenticated Route] Creates a faculty account (`FAC<year><nnn>`).
#[utoipa::path(
    post,
    path = "/api/admin/addfaculty",
    request_body = CreateFacultyRequest,
    responses(
        (status = 200, description = "Faculty created", body = MutationResponse<Faculty>),
        (status = 400, description = "Validation failed or duplicate entry")
    ),
    security(("bearer" = []))
)]
pub async fn add_faculty(
    _caller: AuthUser,
    State(state): State<AppState>,
    Payload(request): Payload<CreateFacultyRequest>,
) -> Result<Json<MutationResponse<Faculty>>, AppError> {
    let faculty = provision_account(&state, Collection::Faculty, "FAC", &request).await?;
    Ok(Json(MutationResponse::new("Faculty added successfully", faculty)))
}

/// add_department
///
/// [Authenticated Route] Creates a department with the next two-digit code.
#[utoipa::path(
    post,
    path = "/api/admin/adddepartment",
    request_body = CreateDepartmentRequest,
    responses(
        (status = 200, description = "Department created", body = MutationResponse<Department>),
        (status = 400, description = "Validation failed or duplicate entry")
    ),
    security(("bearer" = []))
)]
pub async fn add_department(
    _caller: AuthUser,
    State(state): State<AppState>,
    Payload(request): Payload<CreateDepartmentRequest>,
) -> Result<Json<MutationResponse<Department>>, AppError> {
    let db = Db::new(&state);
    let code = format!("{:02}", db.count(Collection::Department).await? + 1);

    let mut doc = to_document(&request)?;
    doc.insert("departmentCode".to_string(), Value::String(code));

    let department: Department = decode(db.create(Collection::Department, doc).await?)?;
    Ok(Json(MutationResponse::new(
        "Department added successfully",
        department,
    )))
}

/// add_subject
#[utoipa::path(
    post,
    path = "/api/admin/addsubject",
    request_body = CreateSubjectRequest,
    responses(
        (status = 200, description = "Subject created", body = MutationResponse<Subject>),
        (status = 400, description = "Validation failed or duplicate entry")
    ),
    security(("bearer" = []))
)]
pub async fn add_subject(
    _caller: AuthUser,
    State(state): State<AppState>,
    Payload(request): Payload<CreateSubjectRequest>,
) -> Result<Json<MutationResponse<Subject>>, AppError> {
    let doc = to_document(&request)?;
    let subject: Subject = decode(Db::new(&state).create(Collection::Subject, doc).await?)?;
    Ok(Json(MutationResponse::new("Subject added successfully", subject)))
}

/// create_notice
#[utoipa::path(
    post,
    path = "/api/admin/createnotice",
    request_body = CreateNoticeRequest,
    responses(
        (status = 200, description = "Notice created", body = MutationResponse<Notice>),
        (status = 400, description = "Validation failed")
    ),
    security(("bearer" = []))
)]
pub async fn create_notice(
    _caller: AuthUser,
    State(state): State<AppState>,
    Payload(request): Payload<CreateNoticeRequest>,
) -> Result<Json<MutationResponse<Notice>>, AppError> {
    let doc = to_document(&request)?;
    let notice: Notice = decode(Db::new(&state).create(Collection::Notice, doc).await?)?;
    Ok(Json(MutationResponse::new("Notice created successfully", notice)))
}

// Filtered queries take a field-match object as the body, e.g. `{"department": "CSE"}`.

/// get_faculty
#[utoipa::path(
    post,
    path = "/api/admin/getfaculty",
    responses((status = 200, description = "Matching faculty", body = [Faculty])),
    security(("bearer" = []))
)]
pub async fn get_faculty(
    _caller: AuthUser,
    State(state): State<AppState>,
    Payload(filter): Payload<Map<String, Value>>,
) -> Result<Json<Vec<Faculty>>, AppError> {
    list(&state, Collection::Faculty, filter).await
}

/// get_subject
#[utoipa::path(
    post,
    path = "/api/admin/getsubject",
    responses((status = 200, description = "Matching subjects", body = [Subject])),
    security(("bearer" = []))
)]
pub async fn get_subject(
    _caller: AuthUser,
    State(state): State<AppState>,
    Payload(filter): Payload<Map<String, Value>>,
) -> Result<Json<Vec<Subject>>, AppError> {
    list(&state, Collection::Subject, filter).await
}

/// get_student
#[utoipa::path(
    post,
    path = "/api/admin/getstudent",
    responses((status = 200, description = "Matching students", body = [Student])),
    security(("bearer" = []))
)]
pub async fn get_student(
    _caller: AuthUser,
    State(state): State<AppState>,
    Payload(filter): Payload<Map<String, Value>>,
) -> Result<Json<Vec<Student>>, AppError> {
    list(&state, Collection::Student, filter).await
}

/// get_notice
#[utoipa::path(
    post,
    path = "/api/admin/getnotice",
    responses((status = 200, description = "Matching notices", body = [Notice])),
    security(("bearer" = []))
)]
pub async fn get_notice(
    _caller: AuthUser,
    State(state): State<AppState>,
    Payload(filter): Payload<Map<String, Value>>,
) -> Result<Json<Vec<Notice>>, AppError> {
    list(&state, Collection::Notice, filter).await
}

/// get_admin
#[utoipa::path(
    post,
    path = "/api/admin/getadmin",
    responses((status = 200, description = "Matching admins", body = [Admin])),
    security(("bearer" = []))
)]
pub async fn get_admin(
    _caller: AuthUser,
    State(state): State<AppState>,
    Payload(filter): Payload<Map<String, Value>>,
) -> Result<Json<Vec<Admin>>, AppError> {
    list(&state, Collection::Admin, filter).await
}

/// delete_admin
#[utoipa::path(
    post,
    path = "/api/admin/deleteadmin",
    request_body = DeleteRequest,
    responses(
        (status = 200, description = "Deleted", body = Acknowledgement),
        (status = 404, description = "No such admin")
    ),
    security(("bearer" = []))
)]
pub async fn delete_admin(
    _caller: AuthUser,
    State(state): State<AppState>,
    Payload(request): Payload<DeleteRequest>,
) -> Result<Json<Acknowledgement>, AppError> {
    remove(&state, Collection::Admin, "Admin", &request.id).await
}

/// delete_faculty
#[utoipa::path(
    post,
    path = "/api/admin/deletefaculty",
    request_body = DeleteRequest,
    responses(
        (status = 200, description = "Deleted", body = Acknowledgement),
        (status = 404, description = "No such faculty")
    ),
    security(("bearer" = []))
)]
pub async fn delete_faculty(
    _caller: AuthUser,
    State(state): State<AppState>,
    Payload(request): Payload<DeleteRequest>,
) -> Result<Json<Acknowledgement>, AppError> {
    remove(&state, Collection::Faculty, "Faculty", &request.id).await
}

/// delete_student
#[utoipa::path(
    post,
    path = "/api/admin/deletestudent",
    request_body = DeleteRequest,
    responses(
        (status = 200, description = "Deleted", body = Acknowledgement),
        (status = 404, description = "No such student")
    ),
    security(("bearer" = []))
)]
pub async fn delete_student(
    _caller: AuthUser,
    State(state): State<AppState>,
    Payload(request): Payload<DeleteRequest>,
) -> Result<Json<Acknowledgement>, AppError> {
    remove(&state, Collection::Student, "Student", &request.id).await
}

/// delete_department
#[utoipa::path(
    post,
    path = "/api/admin/deletedepartment",
    request_body = DeleteRequest,
    responses(
        (status = 200, description = "Deleted", body = Acknowledgement),
        (status = 404, description = "No such department")
    ),
    security(("bearer" = []))
)]
pub async fn delete_department(
    _caller: AuthUser,
    State(state): State<AppState>,
    Payload(request): Payload<DeleteRequest>,
) -> Result<Json<Acknowledgement>, AppError> {
    remove(&state, Collection::Department, "Department", &request.id).await
}

/// delete_subject
#[utoipa::path(
    post,
    path = "/api/admin/deletesubject",
    request_body = DeleteRequest,
    responses(
        (status = 200, description = "Deleted", body = Acknowledgement),
        (status = 404, description = "No such subject")
    ),
    security(("bearer" = []))
)]
pub async fn delete_subject(
    _caller: AuthUser,
    State(state): State<AppState>,
    Payload(request): Payload<DeleteRequest>,
) -> Result<Json<Acknowledgement>, AppError> {
    remove(&state, Collection::Subject, "Subject", &request.id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_password_reverses_the_date() {
        assert_eq!(initial_password("2003-04-15"), "15-04-2003");
    }
}

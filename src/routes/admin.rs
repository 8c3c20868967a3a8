use crate::{
    AppState,
    auth::require_auth,
    handlers,
    validation::{rules, validate_body},
};
use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    routing::{get, post},
};

/// Admin Router Module
///
/// Mounted at `/api/admin`. Stage order for every protected route is
/// `require_auth` → `validate_body(rule set)` → handler: the verification layer is applied
/// to the whole protected router, the validation layer to the individual method router.
///
/// `route_layer` is used so unknown paths fall through to the 404 fallback instead of
/// being answered with a 401.
pub fn admin_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        // POST /updatepassword
        .route(
            "/updatepassword",
            post(handlers::update_password).layer(middleware::from_fn(
                |req: Request, next: Next| validate_body(&rules::PASSWORD_UPDATE, req, next),
            )),
        )
        // GET /getall*
        // Whole-collection listings.
        .route("/getallstudent", get(handlers::get_all_students))
        .route("/getallfaculty", get(handlers::get_all_faculty))
        .route("/getalldepartment", get(handlers::get_all_departments))
        .route("/getallsubject", get(handlers::get_all_subjects))
        .route("/getalladmin", get(handlers::get_all_admins))
        // POST /updateprofile
        // Partial update of the caller's own record; no rule set.
        .route("/updateprofile", post(handlers::update_profile))
        // POST /add* and /createnotice
        // Record creation, each behind its rule set.
        .route(
            "/addadmin",
            post(handlers::add_admin).layer(middleware::from_fn(
                |req: Request, next: Next| validate_body(&rules::ADMIN_CREATE, req, next),
            )),
        )
        .route(
            "/adddepartment",
            post(handlers::add_department).layer(middleware::from_fn(
                |req: Request, next: Next| validate_body(&rules::DEPARTMENT_CREATE, req, next),
            )),
        )
        .route(
            "/addfaculty",
            post(handlers::add_faculty).layer(middleware::from_fn(
                |req: Request, next: Next| validate_body(&rules::FACULTY_CREATE, req, next),
            )),
        )
        .route(
            "/addsubject",
            post(handlers::add_subject).layer(middleware::from_fn(
                |req: Request, next: Next| validate_body(&rules::SUBJECT_CREATE, req, next),
            )),
        )
        .route(
            "/addstudent",
            post(handlers::add_student).layer(middleware::from_fn(
                |req: Request, next: Next| validate_body(&rules::STUDENT_CREATE, req, next),
            )),
        )
        .route(
            "/createnotice",
            post(handlers::create_notice).layer(middleware::from_fn(
                |req: Request, next: Next| validate_body(&rules::NOTICE_CREATE, req, next),
            )),
        )
        // POST /get*
        // Field-match queries; the body is the filter.
        .route("/getfaculty", post(handlers::get_faculty))
        .route("/getsubject", post(handlers::get_subject))
        .route("/getstudent", post(handlers::get_student))
        .route("/getnotice", post(handlers::get_notice))
        .route("/getadmin", post(handlers::get_admin))
        // POST /delete*
        // Remove one record by `{ "id": ... }`.
        .route("/deleteadmin", post(handlers::delete_admin))
        .route("/deletefaculty", post(handlers::delete_faculty))
        .route("/deletestudent", post(handlers::delete_student))
        .route("/deletedepartment", post(handlers::delete_department))
        .route("/deletesubject", post(handlers::delete_subject))
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    Router::new()
        // POST /login
        // The only public route in the namespace. Also counted by the login rate window.
        .route(
            "/login",
            post(handlers::admin_login).layer(middleware::from_fn(
                |req: Request, next: Next| validate_body(&rules::LOGIN, req, next),
            )),
        )
        .merge(protected)
}

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use warp::{http::StatusCode, Filter, Rejection, Reply};

use super::globals::{
    decode_segment, persistence_failed, success, JsonReply, PaginatedQueryableListRequest,
    SimpleSuccessResponse,
};
use super::{ErrorCode, FailureResponse};
use crate::progress::Progress;
use db::{
    models::{ProgressRecord, Role, User},
    Completion, Database, Db, NewUser,
};
use filters::{authed, authed_is_of_kind, identity, with_db, Session, Unauthorized};

pub fn routes(db: &Db) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let register_route = warp::path!("api" / "users")
        .and(warp::post())
        .and(identity())
        .and(with_db(db.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(register)
        .boxed();

    let list_route = warp::path!("api" / "users")
        .and(warp::get())
        .and(authed_is_of_kind(db, &[Role::Admin]))
        .and(with_db(db.clone()))
        .and(warp::query::<PaginatedQueryableListRequest>())
        .and(warp::query::<RoleFilter>())
        .and_then(list)
        .boxed();

    let get_route = warp::path!("api" / "users" / u32)
        .and(warp::get())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and_then(get)
        .boxed();

    let delete_route = warp::path!("api" / "users" / u32)
        .and(warp::delete())
        .and(authed_is_of_kind(db, &[Role::Admin]))
        .and(with_db(db.clone()))
        .and_then(delete)
        .boxed();

    let get_by_email_route = warp::path!("api" / "users" / "email" / String)
        .and(warp::get())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and_then(get_by_email)
        .boxed();

    let update_route = warp::path!("api" / "users" / "email" / String)
        .and(warp::patch())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(update)
        .boxed();

    let enroll_route = warp::path!("api" / "users" / "enroll")
        .and(warp::patch())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(enroll)
        .boxed();

    let progress_route = warp::path!("api" / "users" / "progress")
        .and(warp::patch())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(save_progress)
        .boxed();

    let complete_route = warp::path!("api" / "users" / "completeCourse")
        .and(warp::patch())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(complete_course)
        .boxed();

    register_route
        .or(list_route)
        .or(get_route)
        .or(delete_route)
        .or(get_by_email_route)
        .or(update_route)
        .or(enroll_route)
        .or(progress_route)
        .or(complete_route)
}

#[derive(Serialize)]
struct UserResponse<'a> {
    status: &'static str,
    user: &'a User,
}

impl<'a> UserResponse<'a> {
    fn new(user: &'a User) -> Self {
        Self {
            status: "success",
            user,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    #[serde(default)]
    name: String,
    role: Option<String>,
    photo_url: Option<String>,
}

async fn register(email: String, db: Db, request: RegisterRequest) -> Result<JsonReply, Rejection> {
    let mut db = db.lock().await;

    if db.user_get(&email).is_some() {
        return Ok(FailureResponse::with_status(
            ErrorCode::UserAlreadyExists,
            StatusCode::CONFLICT,
        ));
    }

    // Admins are only ever promoted by hand in the store
    let role = match request.role.as_deref().map(str::trim) {
        None | Some("") | Some("student") => Role::Student,
        Some("instructor") => Role::Instructor,
        Some(_) => {
            return Ok(FailureResponse::with_status(
                ErrorCode::InvalidRole,
                StatusCode::BAD_REQUEST,
            ))
        }
    };

    let user = db
        .user_add(NewUser {
            email,
            name: request.name.trim().to_string(),
            role,
            photo_url: request.photo_url,
        })
        .map_err(persistence_failed)?;

    info!("Registered {} as {:?}", user.email, user.role);
    Ok(success(&UserResponse::new(user)))
}

#[derive(Deserialize)]
struct RoleFilter {
    role: Option<Role>,
}

#[derive(Serialize)]
struct ListResponse<'a> {
    status: &'static str,
    total: usize,
    users: Vec<&'a User>,
}

async fn list(
    _session: Session,
    db: Db,
    request: PaginatedQueryableListRequest,
    filter: RoleFilter,
) -> Result<JsonReply, Rejection> {
    let db = db.lock().await;

    let page = request.normalized_page_number();
    let (total, users) = db.user_list(page, request.query.as_deref(), |user| {
        filter.role.map_or(true, |role| user.role == role)
    });

    Ok(success(&ListResponse {
        status: "success",
        total,
        users,
    }))
}

async fn get(id: u32, _session: Session, db: Db) -> Result<JsonReply, Rejection> {
    let db = db.lock().await;

    match db.user_get_by_id(id) {
        Some(user) => Ok(success(&UserResponse::new(user))),
        None => Ok(FailureResponse::with_status(
            ErrorCode::InvalidID,
            StatusCode::NOT_FOUND,
        )),
    }
}

async fn get_by_email(email: String, _session: Session, db: Db) -> Result<JsonReply, Rejection> {
    let db = db.lock().await;

    match db.user_get(&decode_segment(&email)) {
        Some(user) => Ok(success(&UserResponse::new(user))),
        None => Ok(FailureResponse::with_status(
            ErrorCode::InvalidID,
            StatusCode::NOT_FOUND,
        )),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest {
    name: Option<String>,
    bio: Option<String>,
    photo_url: Option<String>,
}

async fn update(
    email: String,
    session: Session,
    db: Db,
    request: UpdateRequest,
) -> Result<JsonReply, Rejection> {
    let email = decode_segment(&email);

    if !session.can_act_for(&email) {
        return Err(warp::reject::custom(Unauthorized));
    }

    let mut db = db.lock().await;

    let mut user = match db.user_get(&email) {
        Some(user) => user.clone(),
        None => {
            return Ok(FailureResponse::with_status(
                ErrorCode::InvalidID,
                StatusCode::NOT_FOUND,
            ))
        }
    };

    if let Some(name) = request.name {
        user.name = name.trim().to_string();
    }
    if let Some(bio) = request.bio {
        user.bio = bio;
    }
    if let Some(photo_url) = request.photo_url {
        user.photo_url = Some(photo_url).filter(|url| !url.trim().is_empty());
    }

    db.user_update(user).map_err(persistence_failed)?;

    match db.user_get(&email) {
        Some(user) => Ok(success(&UserResponse::new(user))),
        None => Ok(success(&SimpleSuccessResponse::new())),
    }
}

async fn delete(id: u32, _session: Session, db: Db) -> Result<JsonReply, Rejection> {
    let mut db = db.lock().await;

    match db.user_get_by_id(id) {
        None => {
            return Ok(FailureResponse::with_status(
                ErrorCode::InvalidID,
                StatusCode::NOT_FOUND,
            ))
        }
        Some(user) if user.role.is_admin() => {
            return Ok(FailureResponse::with_status(
                ErrorCode::IllegalRequest,
                StatusCode::FORBIDDEN,
            ))
        }
        Some(_) => (),
    }

    db.user_remove(id).map_err(persistence_failed)?;
    info!("Removed user {}", id);

    Ok(success(&SimpleSuccessResponse::new()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnrollRequest {
    course_id: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnrollResponse<'a> {
    status: &'static str,
    course_id: u32,
    /// False when the user was already enrolled
    updated: bool,
    enrolled_courses: &'a [u32],
}

async fn enroll(session: Session, db: Db, request: EnrollRequest) -> Result<JsonReply, Rejection> {
    let mut db = db.lock().await;

    if db.course_get(request.course_id).is_none() {
        return Ok(FailureResponse::with_status(
            ErrorCode::InvalidID,
            StatusCode::NOT_FOUND,
        ));
    }

    let status = db
        .user_enroll(&session.email, request.course_id)
        .map_err(persistence_failed)?;

    if status.updated {
        info!("{} enrolled in course {}", session.email, request.course_id);
    }

    let enrolled_courses = db
        .user_get(&session.email)
        .map_or(&[][..], |user| user.enrolled_courses.as_slice());

    Ok(success(&EnrollResponse {
        status: "success",
        course_id: request.course_id,
        updated: status.updated,
        enrolled_courses,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressRequest {
    course_id: u32,
    progress: ProgressRecord,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressResponse {
    status: &'static str,
    course_id: u32,
    progress: ProgressRecord,
}

async fn save_progress(
    session: Session,
    db: Db,
    request: ProgressRequest,
) -> Result<JsonReply, Rejection> {
    let mut db = db.lock().await;

    let course = match db.course_get(request.course_id) {
        Some(course) => course.clone(),
        None => {
            return Ok(FailureResponse::with_status(
                ErrorCode::InvalidID,
                StatusCode::NOT_FOUND,
            ))
        }
    };

    let user = db
        .user_get(&session.email)
        .ok_or_else(|| warp::reject::custom(filters::Forbidden))?;

    if !user.is_enrolled(course.id) {
        return Ok(FailureResponse::with_status(
            ErrorCode::NotEnrolled,
            StatusCode::FORBIDDEN,
        ));
    }

    if user.has_completed(course.id) {
        return Ok(FailureResponse::with_status(
            ErrorCode::CourseCompleted,
            StatusCode::CONFLICT,
        ));
    }

    // Clients send whatever they hold, only an in-range record is stored
    let record = Progress::resume(&course, Some(&request.progress), false).to_record();

    db.progress_save(&session.email, course.id, record.clone())
        .map_err(persistence_failed)?;

    Ok(success(&ProgressResponse {
        status: "success",
        course_id: course.id,
        progress: record,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompleteRequest {
    course_id: u32,
    #[serde(default)]
    mark: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteResponse {
    status: &'static str,
    course_id: u32,
    mark: u8,
}

/// Numbers and numeric strings are rounded into 0..=100, anything else counts as 0
fn coerce_mark(value: &Value) -> u8 {
    let mark = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };

    mark.filter(|mark| mark.is_finite())
        .map_or(0, |mark| mark.round().max(0.0).min(100.0) as u8)
}

async fn complete_course(
    session: Session,
    db: Db,
    request: CompleteRequest,
) -> Result<JsonReply, Rejection> {
    let mut db = db.lock().await;

    let course = match db.course_get(request.course_id) {
        Some(course) => course.clone(),
        None => {
            return Ok(FailureResponse::with_status(
                ErrorCode::InvalidID,
                StatusCode::NOT_FOUND,
            ))
        }
    };

    let user = db
        .user_get(&session.email)
        .ok_or_else(|| warp::reject::custom(filters::Forbidden))?;

    if !user.is_enrolled(course.id) {
        return Ok(FailureResponse::with_status(
            ErrorCode::NotEnrolled,
            StatusCode::FORBIDDEN,
        ));
    }

    let progress = Progress::resume(&course, user.progress.get(&course.id), true).to_record();
    let mark = coerce_mark(&request.mark);

    db.course_complete(
        &session.email,
        course.id,
        Completion {
            mark,
            date: chrono::Utc::now().date_naive(),
            progress,
        },
    )
    .map_err(persistence_failed)?;

    info!("{} completed course {} with {}", session.email, course.id, mark);

    Ok(success(&CompleteResponse {
        status: "success",
        course_id: course.id,
        mark,
    }))
}

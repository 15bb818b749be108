use serde::Serialize;
use warp::{http::StatusCode, Filter, Rejection, Reply};

use super::globals::{persistence_failed, success, JsonReply, SimpleSuccessResponse};
use super::{ErrorCode, FailureResponse};
use db::{
    models::{Faq, Role},
    Database, Db, FaqUpdate, NewFaq,
};
use filters::{authed_is_of_kind, with_db, Session};

pub fn routes(db: &Db) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list_route = warp::path!("api" / "faqs")
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(list)
        .boxed();

    let create_route = warp::path!("api" / "faqs")
        .and(warp::post())
        .and(authed_is_of_kind(db, &[Role::Admin]))
        .and(with_db(db.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(create)
        .boxed();

    let update_route = warp::path!("api" / "faqs" / u32)
        .and(warp::patch())
        .and(authed_is_of_kind(db, &[Role::Admin]))
        .and(with_db(db.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(update)
        .boxed();

    let delete_route = warp::path!("api" / "faqs" / u32)
        .and(warp::delete())
        .and(authed_is_of_kind(db, &[Role::Admin]))
        .and(with_db(db.clone()))
        .and_then(delete)
        .boxed();

    list_route
        .or(create_route)
        .or(update_route)
        .or(delete_route)
}

#[derive(Serialize)]
struct ListResponse<'a> {
    status: &'static str,
    faqs: Vec<&'a Faq>,
}

#[derive(Serialize)]
struct FaqResponse<'a> {
    status: &'static str,
    faq: &'a Faq,
}

fn blank(text: &str) -> bool {
    text.trim().is_empty()
}

async fn list(db: Db) -> Result<JsonReply, Rejection> {
    let db = db.lock().await;

    Ok(success(&ListResponse {
        status: "success",
        faqs: db.faq_list(),
    }))
}

async fn create(_session: Session, db: Db, request: NewFaq) -> Result<JsonReply, Rejection> {
    if blank(&request.question) || blank(&request.answer) {
        return Ok(FailureResponse::with_status(
            ErrorCode::MalformedData,
            StatusCode::BAD_REQUEST,
        ));
    }

    let mut db = db.lock().await;
    let faq = db.faq_add(request).map_err(persistence_failed)?;

    Ok(success(&FaqResponse {
        status: "success",
        faq,
    }))
}

async fn update(
    id: u32,
    _session: Session,
    db: Db,
    request: FaqUpdate,
) -> Result<JsonReply, Rejection> {
    let fields = [&request.question, &request.answer];
    if fields.iter().any(|field| field.as_deref().map_or(false, blank)) {
        return Ok(FailureResponse::with_status(
            ErrorCode::MalformedData,
            StatusCode::BAD_REQUEST,
        ));
    }

    let mut db = db.lock().await;
    let status = db.faq_update(id, request).map_err(persistence_failed)?;

    if !status.found {
        return Ok(FailureResponse::with_status(
            ErrorCode::InvalidID,
            StatusCode::NOT_FOUND,
        ));
    }

    Ok(success(&SimpleSuccessResponse::new()))
}

async fn delete(id: u32, _session: Session, db: Db) -> Result<JsonReply, Rejection> {
    let mut db = db.lock().await;

    if !db.faq_remove(id).map_err(persistence_failed)? {
        return Ok(FailureResponse::with_status(
            ErrorCode::InvalidID,
            StatusCode::NOT_FOUND,
        ));
    }

    Ok(success(&SimpleSuccessResponse::new()))
}

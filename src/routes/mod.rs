use log::warn;
use warp::{http::StatusCode, Filter, Rejection, Reply};

use db::Db;
use filters::{Forbidden, Unauthorized};

mod courses;
mod faqs;
mod globals;
mod index;
mod player;
mod profile;
mod reviews;
mod users;

#[cfg(test)]
mod testing;

pub use globals::{ErrorCode, FailureResponse, PersistenceFailed};

pub fn routes(db: &Db) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    index::routes()
        .or(users::routes(db))
        .or(profile::routes(db))
        .or(courses::routes(db))
        .or(reviews::routes(db))
        .or(player::routes(db))
        .or(faqs::routes(db))
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, std::convert::Infallible> {
    let error_code;
    let status_code;

    if err.is_not_found() {
        error_code = ErrorCode::NotFound;
        status_code = StatusCode::NOT_FOUND;
    } else if let Some(Forbidden) = err.find() {
        error_code = ErrorCode::InvalidCredentials;
        status_code = StatusCode::FORBIDDEN;
    } else if let Some(Unauthorized) = err.find() {
        error_code = ErrorCode::InsufficientAuthorization;
        status_code = StatusCode::UNAUTHORIZED;
    } else if let Some(PersistenceFailed) = err.find() {
        error_code = ErrorCode::PersistenceFailure;
        status_code = StatusCode::INTERNAL_SERVER_ERROR;
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some()
        || err.find::<warp::reject::InvalidQuery>().is_some()
        || err.find::<warp::reject::LengthRequired>().is_some()
        || err.find::<warp::reject::PayloadTooLarge>().is_some()
        || err.find::<warp::reject::UnsupportedMediaType>().is_some()
    {
        error_code = ErrorCode::MalformedData;
        status_code = StatusCode::BAD_REQUEST;
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        error_code = ErrorCode::MethodNotAllowed;
        status_code = StatusCode::METHOD_NOT_ALLOWED;
    } else {
        warn!("Unhandled rejection: {:?}", err);
        error_code = ErrorCode::InternalServerError;
        status_code = StatusCode::INTERNAL_SERVER_ERROR;
    }

    Ok(FailureResponse::with_status(error_code, status_code))
}

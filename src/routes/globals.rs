use log::error;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};

use db::StoreError;

/// Every JSON handler answers with one of these, success or not
pub type JsonReply = WithStatus<Json>;

#[derive(Serialize)]
pub struct FailureResponse {
    status: &'static str,
    code: ErrorCode,
}

impl FailureResponse {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            status: "error",
            code,
        }
    }

    pub fn new_reply(code: ErrorCode) -> Json {
        warp::reply::json(&Self::new(code))
    }

    pub fn with_status(code: ErrorCode, status: StatusCode) -> JsonReply {
        warp::reply::with_status(Self::new_reply(code), status)
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub enum ErrorCode {
    InvalidCredentials,
    InsufficientAuthorization,
    MalformedData,
    MethodNotAllowed,
    InvalidID,
    NotFound,
    IllegalRequest,
    UserAlreadyExists,
    InvalidRole,
    InvalidDifficulty,
    InvalidQuiz,
    InvalidRating,
    NotEnrolled,
    CourseCompleted,
    CourseNotCompleted,
    LessonLocked,
    QuizLocked,
    AnswerRequired,
    InvalidOption,
    PersistenceFailure,
    InternalServerError,
}

/// Replies `body` with a 200
pub fn success<T: Serialize>(body: &T) -> JsonReply {
    warp::reply::with_status(warp::reply::json(body), StatusCode::OK)
}

#[derive(Serialize)]
pub struct SimpleSuccessResponse {
    status: &'static str,
}

impl SimpleSuccessResponse {
    pub fn new() -> Self {
        Self { status: "success" }
    }
}

/// The store could not make a write durable; nothing was changed
#[derive(Debug)]
pub struct PersistenceFailed;

impl warp::reject::Reject for PersistenceFailed {}

pub fn persistence_failed(err: StoreError) -> warp::Rejection {
    error!("Write refused by the store: {}", err);
    warp::reject::custom(PersistenceFailed)
}

#[derive(Deserialize, Debug, Default)]
pub struct PaginatedQueryableListRequest {
    pub query: Option<String>,
    pub page: Option<usize>,
}

impl PaginatedQueryableListRequest {
    /// Checks that the page number is valid, and if its not it returns 1.
    /// No page at all means the whole list.
    pub fn normalized_page_number(&self) -> Option<usize> {
        self.page.map(|v| if v >= 1 { v } else { 1 })
    }
}

/// Decodes `%XX` escapes of a path segment, so `a%40b.io` reads as `a@b.io`
pub fn decode_segment(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_is_optional_and_at_least_one() {
        let mut request = PaginatedQueryableListRequest::default();
        assert_eq!(request.normalized_page_number(), None);

        request.page = Some(0);
        assert_eq!(request.normalized_page_number(), Some(1));

        request.page = Some(3);
        assert_eq!(request.normalized_page_number(), Some(3));
    }

    #[test]
    fn segments_are_percent_decoded() {
        assert_eq!(decode_segment("eve%40learnly.dev"), "eve@learnly.dev");
        assert_eq!(decode_segment("eve@learnly.dev"), "eve@learnly.dev");
        assert_eq!(decode_segment("100%"), "100%");
        assert_eq!(decode_segment("%zz"), "%zz");
        assert_eq!(decode_segment("a%+1b"), "a%+1b");
        assert_eq!(decode_segment("a%2bb"), "a+b");
    }
}

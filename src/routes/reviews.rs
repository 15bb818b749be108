use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use warp::{http::StatusCode, Filter, Rejection, Reply};

use super::globals::{persistence_failed, success, JsonReply};
use super::{ErrorCode, FailureResponse};
use db::{
    models::{Course, Review},
    Database, Db,
};
use filters::{authed, with_db, Forbidden, Session};

pub fn routes(db: &Db) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let post_route = warp::path!("api" / "courses" / u32 / "reviews")
        .and(warp::post())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(post)
        .boxed();

    let list_route = warp::path!("api" / "courses" / u32 / "reviews")
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(list)
        .boxed();

    post_route.or(list_route)
}

#[derive(Deserialize)]
struct ReviewRequest {
    rating: i64,
    comment: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReviewsResponse<'a> {
    status: &'static str,
    /// Set on submissions, whether an earlier review by the same author was overwritten
    #[serde(skip_serializing_if = "Option::is_none")]
    replaced: Option<bool>,
    average_rating: f64,
    review_count: usize,
    reviews: &'a [Review],
}

impl<'a> ReviewsResponse<'a> {
    fn new(course: &'a Course, replaced: Option<bool>) -> Self {
        Self {
            status: "success",
            replaced,
            average_rating: course.average_rating(),
            review_count: course.reviews.len(),
            reviews: &course.reviews,
        }
    }
}

async fn post(
    course_id: u32,
    session: Session,
    db: Db,
    request: ReviewRequest,
) -> Result<JsonReply, Rejection> {
    let mut db = db.lock().await;

    if !(1..=5).contains(&request.rating) {
        return Ok(FailureResponse::with_status(
            ErrorCode::InvalidRating,
            StatusCode::BAD_REQUEST,
        ));
    }

    let name = db
        .user_get(&session.email)
        .map(|user| user.display_name().to_string())
        .ok_or_else(|| warp::reject::custom(Forbidden))?;

    let review = Review {
        user_email: session.email.clone(),
        name: Some(name),
        rating: request.rating as u8,
        comment: request
            .comment
            .map(|comment| comment.trim().to_string())
            .filter(|comment| !comment.is_empty()),
        created_at: Utc::now(),
    };

    let replaced = match db
        .review_upsert(course_id, review)
        .map_err(persistence_failed)?
    {
        Some(replaced) => replaced,
        None => {
            return Ok(FailureResponse::with_status(
                ErrorCode::InvalidID,
                StatusCode::NOT_FOUND,
            ))
        }
    };

    info!(
        "{} reviewed course {} ({})",
        session.email,
        course_id,
        if replaced { "updated" } else { "new" }
    );

    match db.course_get(course_id) {
        Some(course) => Ok(success(&ReviewsResponse::new(course, Some(replaced)))),
        None => Ok(FailureResponse::with_status(
            ErrorCode::InvalidID,
            StatusCode::NOT_FOUND,
        )),
    }
}

async fn list(course_id: u32, db: Db) -> Result<JsonReply, Rejection> {
    let db = db.lock().await;

    match db.course_get(course_id) {
        Some(course) => Ok(success(&ReviewsResponse::new(course, None))),
        None => Ok(FailureResponse::with_status(
            ErrorCode::InvalidID,
            StatusCode::NOT_FOUND,
        )),
    }
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::*;
    use serde_json::json;

    fn review(email: &str, rating: i64, comment: &str) -> warp::test::RequestBuilder {
        as_user(email, "POST", "/api/courses/0/reviews")
            .json(&json!({ "rating": rating, "comment": comment }))
    }

    #[tokio::test]
    async fn second_review_replaces_the_first() {
        let app = TestApp::new();

        let (status, body) = app.send(review(STUDENT, 5, "Great")).await;
        assert_eq!(status, 200);
        assert_eq!(body["replaced"], false);
        assert_eq!(body["reviews"][0]["name"], "Student User");

        app.send(review(INSTRUCTOR, 2, "Could be longer")).await;

        let (_, body) = app.send(review(STUDENT, 3, "  Fine after all ")).await;
        assert_eq!(body["replaced"], true);
        assert_eq!(body["reviewCount"], 2);
        assert_eq!(body["averageRating"], 2.5);
        assert_eq!(body["reviews"][0]["rating"], 3);
        assert_eq!(body["reviews"][0]["comment"], "Fine after all");

        let (status, body) = app.send(anonymous("GET", "/api/courses/0/reviews")).await;
        assert_eq!(status, 200);
        assert_eq!(body["reviewCount"], 2);
        assert!(body.get("replaced").is_none());
    }

    #[tokio::test]
    async fn ratings_out_of_range_are_refused() {
        let app = TestApp::new();

        for rating in &[0, 6, -1] {
            let (status, body) = app.send(review(STUDENT, *rating, "")).await;
            assert_eq!(status, 400);
            assert_eq!(body["code"], "InvalidRating");
        }

        let (_, body) = app.send(anonymous("GET", "/api/courses/0/reviews")).await;
        assert_eq!(body["reviewCount"], 0);
        assert_eq!(body["averageRating"], 0.0);
    }

    #[tokio::test]
    async fn unknown_course_or_reviewer() {
        let app = TestApp::new();

        let (status, body) = app
            .send(as_user(STUDENT, "POST", "/api/courses/9/reviews").json(&json!({ "rating": 4 })))
            .await;
        assert_eq!(status, 404);
        assert_eq!(body["code"], "InvalidID");

        let (status, body) = app.send(review("ghost@learnly.dev", 4, "")).await;
        assert_eq!(status, 403);
        assert_eq!(body["code"], "InvalidCredentials");
    }
}

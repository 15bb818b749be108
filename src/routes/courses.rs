use log::info;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use warp::{http::StatusCode, Filter, Rejection, Reply};

use super::globals::{
    persistence_failed, success, JsonReply, PaginatedQueryableListRequest, SimpleSuccessResponse,
};
use super::{ErrorCode, FailureResponse};
use db::{
    models::{Course, Difficulty, Lesson, Quiz, Review, Role},
    CourseFilter, Database, Db, NewCourse,
};
use filters::{authed, authed_is_of_kind, with_db, Session, Unauthorized};

pub fn routes(db: &Db) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list_route = warp::path!("api" / "courses")
        .and(warp::get())
        .and(with_db(db.clone()))
        .and(warp::query::<PaginatedQueryableListRequest>())
        .and(warp::query::<FilterRequest>())
        .and_then(list)
        .boxed();

    let create_route = warp::path!("api" / "courses")
        .and(warp::post())
        .and(authed_is_of_kind(db, &[Role::Instructor]))
        .and(with_db(db.clone()))
        .and(warp::body::content_length_limit(1024 * 64).and(warp::body::json()))
        .and_then(create)
        .boxed();

    let get_route = warp::path!("api" / "courses" / u32)
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(get)
        .boxed();

    let content_route = warp::path!("api" / "courses" / u32 / "content")
        .and(warp::get())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and_then(content)
        .boxed();

    let delete_route = warp::path!("api" / "courses" / u32)
        .and(warp::delete())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and_then(delete)
        .boxed();

    let categories_route = warp::path!("api" / "categories")
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(categories)
        .boxed();

    list_route
        .or(create_route)
        .or(get_route)
        .or(content_route)
        .or(delete_route)
        .or(categories_route)
}

/// Catalogue entry of a course, without its content
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary<'a> {
    id: u32,
    title: &'a str,
    description: &'a str,
    instructor_email: &'a str,
    instructor_name: Option<&'a str>,
    difficulty: Difficulty,
    categories: &'a [String],
    lesson_count: usize,
    quiz_count: usize,
    average_rating: f64,
    review_count: usize,
}

impl<'a> CourseSummary<'a> {
    pub fn new(db: &'a impl Database, course: &'a Course) -> Self {
        Self {
            id: course.id,
            title: &course.title,
            description: &course.description,
            instructor_email: &course.instructor_email,
            instructor_name: db
                .user_get(&course.instructor_email)
                .map(|instructor| instructor.display_name()),
            difficulty: course.difficulty,
            categories: &course.categories,
            lesson_count: course.lessons.len(),
            quiz_count: course.quizzes.len(),
            average_rating: course.average_rating(),
            review_count: course.reviews.len(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilterRequest {
    instructor_email: Option<String>,
    difficulty: Option<String>,
    category: Option<String>,
}

#[derive(Serialize)]
struct ListResponse<'a> {
    status: &'static str,
    total: usize,
    courses: Vec<CourseSummary<'a>>,
}

async fn list(
    db: Db,
    request: PaginatedQueryableListRequest,
    filter: FilterRequest,
) -> Result<JsonReply, Rejection> {
    let db = db.lock().await;

    let difficulty = match filter.difficulty.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(difficulty) => match Difficulty::from_str(difficulty) {
            Ok(difficulty) => Some(difficulty),
            Err(_) => {
                return Ok(FailureResponse::with_status(
                    ErrorCode::InvalidDifficulty,
                    StatusCode::BAD_REQUEST,
                ))
            }
        },
    };

    let filter = CourseFilter {
        instructor_email: filter.instructor_email.filter(|email| !email.is_empty()),
        difficulty,
        category: filter.category.filter(|category| !category.is_empty()),
    };

    let page = request.normalized_page_number();
    let (total, courses) = db.course_list(page, request.query.as_deref(), &filter);

    Ok(success(&ListResponse {
        status: "success",
        total,
        courses: courses
            .into_iter()
            .map(|course| CourseSummary::new(&*db, course))
            .collect(),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseRequest {
    title: String,
    #[serde(default)]
    description: String,
    difficulty: String,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default, alias = "videos")]
    lessons: Vec<Lesson>,
    #[serde(default)]
    quizzes: Vec<Quiz>,
}

impl CourseRequest {
    fn validate(self, instructor_email: String) -> Result<NewCourse, ErrorCode> {
        if self.title.trim().is_empty() {
            return Err(ErrorCode::MalformedData);
        }

        let difficulty =
            Difficulty::from_str(self.difficulty.trim()).map_err(|_| ErrorCode::InvalidDifficulty)?;

        if self.lessons.iter().any(|lesson| lesson.url.trim().is_empty()) {
            return Err(ErrorCode::MalformedData);
        }

        if !self.quizzes.iter().all(Quiz::is_well_formed) {
            return Err(ErrorCode::InvalidQuiz);
        }

        Ok(NewCourse {
            title: self.title.trim().to_string(),
            description: self.description,
            instructor_email,
            difficulty,
            categories: self.categories,
            lessons: self.lessons,
            quizzes: self.quizzes,
        })
    }
}

#[derive(Serialize)]
struct CourseResponse<'a> {
    status: &'static str,
    course: &'a Course,
}

async fn create(session: Session, db: Db, request: CourseRequest) -> Result<JsonReply, Rejection> {
    let mut db = db.lock().await;

    let course = match request.validate(session.email) {
        Ok(course) => course,
        Err(code) => return Ok(FailureResponse::with_status(code, StatusCode::BAD_REQUEST)),
    };

    let course = db.course_add(course).map_err(persistence_failed)?;
    info!("Course {} created by {}", course.id, course.instructor_email);

    Ok(success(&CourseResponse {
        status: "success",
        course,
    }))
}

/// Quiz as shown to students, without its answer
#[derive(Serialize)]
struct QuizView<'a> {
    question: &'a str,
    options: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublicCourse<'a> {
    #[serde(flatten)]
    summary: CourseSummary<'a>,
    lessons: &'a [Lesson],
    quizzes: Vec<QuizView<'a>>,
    reviews: &'a [Review],
}

#[derive(Serialize)]
struct PublicCourseResponse<'a> {
    status: &'static str,
    course: PublicCourse<'a>,
}

async fn get(id: u32, db: Db) -> Result<JsonReply, Rejection> {
    let db = db.lock().await;

    let course = match db.course_get(id) {
        Some(course) => course,
        None => {
            return Ok(FailureResponse::with_status(
                ErrorCode::InvalidID,
                StatusCode::NOT_FOUND,
            ))
        }
    };

    Ok(success(&PublicCourseResponse {
        status: "success",
        course: PublicCourse {
            summary: CourseSummary::new(&*db, course),
            lessons: &course.lessons,
            quizzes: course
                .quizzes
                .iter()
                .map(|quiz| QuizView {
                    question: &quiz.question,
                    options: &quiz.options,
                })
                .collect(),
            reviews: &course.reviews,
        },
    }))
}

async fn content(id: u32, session: Session, db: Db) -> Result<JsonReply, Rejection> {
    let db = db.lock().await;

    match db.course_get(id) {
        Some(course) if session.can_act_for(&course.instructor_email) => {
            Ok(success(&CourseResponse {
                status: "success",
                course,
            }))
        }
        Some(_) => Err(warp::reject::custom(Unauthorized)),
        None => Ok(FailureResponse::with_status(
            ErrorCode::InvalidID,
            StatusCode::NOT_FOUND,
        )),
    }
}

async fn delete(id: u32, session: Session, db: Db) -> Result<JsonReply, Rejection> {
    let mut db = db.lock().await;

    match db.course_get(id) {
        Some(course) if session.can_act_for(&course.instructor_email) => (),
        Some(_) => return Err(warp::reject::custom(Unauthorized)),
        None => {
            return Ok(FailureResponse::with_status(
                ErrorCode::InvalidID,
                StatusCode::NOT_FOUND,
            ))
        }
    }

    db.course_remove(id).map_err(persistence_failed)?;
    info!("Course {} removed by {}", id, session.email);

    Ok(success(&SimpleSuccessResponse::new()))
}

#[derive(Serialize)]
struct CategoriesResponse<'a> {
    status: &'static str,
    categories: Vec<&'a str>,
}

async fn categories(db: Db) -> Result<JsonReply, Rejection> {
    let db = db.lock().await;

    Ok(success(&CategoriesResponse {
        status: "success",
        categories: db.category_list(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::*;
    use serde_json::{json, Value};

    fn course_body() -> Value {
        json!({
            "title": "Graphs",
            "description": "Traversals",
            "difficulty": "Advanced",
            "categories": [" Algorithms ", "Graphs", "", "Graphs"],
            "videos": [{ "title": "BFS", "url": "https://youtu.be/abc" }],
            "quizzes": [{
                "question": "BFS uses a",
                "options": ["stack", "queue", "heap", "set"],
                "correctAnswer": "b"
            }]
        })
    }

    fn request(body: Value) -> CourseRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn validation_rejects_bad_courses() {
        let owner = || "teach@learnly.dev".to_string();

        let course = request(course_body()).validate(owner()).unwrap();
        assert_eq!(course.lessons.len(), 1);
        assert_eq!(course.difficulty, Difficulty::Advanced);

        let mut body = course_body();
        body["title"] = json!("  ");
        assert_eq!(
            request(body).validate(owner()).err(),
            Some(ErrorCode::MalformedData)
        );

        let mut body = course_body();
        body["difficulty"] = json!("Expert");
        assert_eq!(
            request(body).validate(owner()).err(),
            Some(ErrorCode::InvalidDifficulty)
        );

        let mut body = course_body();
        body["quizzes"][0]["options"] = json!(["a", "b", "c"]);
        assert_eq!(
            request(body).validate(owner()).err(),
            Some(ErrorCode::InvalidQuiz)
        );

        let mut body = course_body();
        body["quizzes"][0]["correctAnswer"] = json!("E");
        assert_eq!(
            request(body).validate(owner()).err(),
            Some(ErrorCode::InvalidQuiz)
        );
    }

    #[tokio::test]
    async fn instructors_create_courses() {
        let app = TestApp::new();

        let (status, _) = app
            .send(as_user(STUDENT, "POST", "/api/courses").json(&course_body()))
            .await;
        assert_eq!(status, 401);

        let (status, body) = app
            .send(as_user(INSTRUCTOR, "POST", "/api/courses").json(&course_body()))
            .await;
        assert_eq!(status, 200);
        assert_eq!(body["course"]["id"], 1);
        assert_eq!(body["course"]["categories"], json!(["Algorithms", "Graphs"]));
        assert_eq!(body["course"]["lessons"][0]["title"], "BFS");

        let (status, body) = app
            .send(
                as_user(INSTRUCTOR, "POST", "/api/courses")
                    .json(&json!({ "title": "x", "difficulty": "Expert" })),
            )
            .await;
        assert_eq!(status, 400);
        assert_eq!(body["code"], "InvalidDifficulty");
    }

    #[tokio::test]
    async fn answer_keys_stay_with_the_owner() {
        let app = TestApp::new();

        let (status, body) = app.send(anonymous("GET", "/api/courses/0")).await;
        assert_eq!(status, 200);
        assert_eq!(body["course"]["title"], "Data Structures 101");
        assert_eq!(body["course"]["instructorName"], "Instructor User");
        assert_eq!(body["course"]["quizzes"][0]["options"][1], "Stack");
        assert!(body["course"]["quizzes"][0].get("correctAnswer").is_none());

        let (status, _) = app
            .send(as_user(STUDENT, "GET", "/api/courses/0/content"))
            .await;
        assert_eq!(status, 401);

        let (status, body) = app
            .send(as_user(INSTRUCTOR, "GET", "/api/courses/0/content"))
            .await;
        assert_eq!(status, 200);
        assert_eq!(body["course"]["quizzes"][0]["correctAnswer"], "B");

        let (status, body) = app.send(anonymous("GET", "/api/courses/9")).await;
        assert_eq!(status, 404);
        assert_eq!(body["code"], "InvalidID");
    }

    #[tokio::test]
    async fn catalogue_filters() {
        let app = TestApp::new();
        app.send(as_user(INSTRUCTOR, "POST", "/api/courses").json(&course_body()))
            .await;

        let (_, body) = app.send(anonymous("GET", "/api/courses")).await;
        assert_eq!(body["total"], 2);

        let (_, body) = app
            .send(anonymous("GET", "/api/courses?category=DSA"))
            .await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["courses"][0]["lessonCount"], 2);

        let (_, body) = app
            .send(anonymous("GET", "/api/courses?query=graphs&difficulty=Advanced"))
            .await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["courses"][0]["title"], "Graphs");

        let (status, body) = app
            .send(anonymous("GET", "/api/courses?difficulty=Hard"))
            .await;
        assert_eq!(status, 400);
        assert_eq!(body["code"], "InvalidDifficulty");

        let (_, body) = app.send(anonymous("GET", "/api/categories")).await;
        assert_eq!(body["categories"], json!(["DSA", "Algorithms", "Graphs"]));
    }

    #[tokio::test]
    async fn only_owner_or_admin_deletes() {
        let app = TestApp::new();
        app.send(
            as_user("rival@learnly.dev", "POST", "/api/users")
                .json(&json!({ "role": "instructor" })),
        )
        .await;

        let (status, _) = app
            .send(as_user("rival@learnly.dev", "DELETE", "/api/courses/0"))
            .await;
        assert_eq!(status, 401);

        let (status, _) = app.send(as_user(ADMIN, "DELETE", "/api/courses/0")).await;
        assert_eq!(status, 200);

        let (status, _) = app.send(anonymous("GET", "/api/courses/0")).await;
        assert_eq!(status, 404);
    }
}

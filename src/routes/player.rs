//! Course player: the student's way through one course, backed by [`crate::progress`].
//!
//! Every transition is computed on a copy of the stored state, written to the store, and only
//! then replied. A write that fails leaves the store as it was and the student where they were.

use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use warp::{http::StatusCode, Filter, Rejection, Reply};

use super::globals::{persistence_failed, success, JsonReply};
use super::{ErrorCode, FailureResponse};
use crate::certificate::{certificate_id, Certificate};
use crate::progress::{ItemStatus, Progress, Refusal, Step};
use db::{
    models::{Course, Phase, User},
    Completion, Database, Db,
};
use filters::{authed, with_db, Session};

pub fn routes(db: &Db) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let view_route = warp::path!("api" / "courses" / u32 / "player")
        .and(warp::get())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and_then(view)
        .boxed();

    let lesson_route = warp::path!("api" / "courses" / u32 / "player" / "lessons" / usize)
        .and(warp::get())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and_then(open_lesson)
        .boxed();

    let watched_route =
        warp::path!("api" / "courses" / u32 / "player" / "lessons" / usize / "watched")
            .and(warp::post())
            .and(authed(db))
            .and(with_db(db.clone()))
            .and_then(watched)
            .boxed();

    let quiz_route = warp::path!("api" / "courses" / u32 / "player" / "quizzes" / usize)
        .and(warp::get())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and_then(open_quiz)
        .boxed();

    let answer_route =
        warp::path!("api" / "courses" / u32 / "player" / "quizzes" / usize / "answer")
            .and(warp::post())
            .and(authed(db))
            .and(with_db(db.clone()))
            .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
            .and_then(answer)
            .boxed();

    let certificate_route = warp::path!("api" / "courses" / u32 / "certificate")
        .and(warp::get())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and_then(certificate)
        .boxed();

    view_route
        .or(lesson_route)
        .or(watched_route)
        .or(quiz_route)
        .or(answer_route)
        .or(certificate_route)
}

/// A student sitting in front of a course they are enrolled in
struct Seat {
    course: Course,
    user: User,
    progress: Progress,
}

impl Seat {
    fn take(db: &impl Database, course_id: u32, email: &str) -> Result<Self, JsonReply> {
        let course = db.course_get(course_id).ok_or_else(|| {
            FailureResponse::with_status(ErrorCode::NotFound, StatusCode::NOT_FOUND)
        })?;
        let user = db.user_get(email).ok_or_else(|| {
            FailureResponse::with_status(ErrorCode::InvalidCredentials, StatusCode::FORBIDDEN)
        })?;

        if !user.is_enrolled(course_id) {
            return Err(FailureResponse::with_status(
                ErrorCode::NotEnrolled,
                StatusCode::FORBIDDEN,
            ));
        }

        let progress = Progress::resume(
            course,
            user.progress.get(&course_id),
            user.has_completed(course_id),
        );

        Ok(Self {
            course: course.clone(),
            user: user.clone(),
            progress,
        })
    }

    /// The stored completion mark, or the one the current state implies
    fn mark(&self) -> Option<u8> {
        self.user
            .completed_course_marks
            .get(&self.course.id)
            .copied()
            .or_else(|| self.progress.mark(&self.course))
    }

    /// Makes `step` durable and returns the state the student is now in
    fn apply(&self, db: &mut impl Database, step: Step) -> Result<Progress, Rejection> {
        match step {
            Step::Stale => Ok(self.progress),
            Step::Advanced(next) => {
                db.progress_save(&self.user.email, self.course.id, next.to_record())
                    .map_err(persistence_failed)?;
                Ok(next)
            }
            Step::Completed { progress, mark } => {
                self.complete(db, progress, mark)?;
                Ok(progress)
            }
        }
    }

    fn complete(
        &self,
        db: &mut impl Database,
        progress: Progress,
        mark: u8,
    ) -> Result<(), Rejection> {
        db.course_complete(
            &self.user.email,
            self.course.id,
            Completion {
                mark,
                date: Utc::now().date_naive(),
                progress: progress.to_record(),
            },
        )
        .map_err(persistence_failed)?;

        info!(
            "{} completed course {} with {}",
            self.user.email, self.course.id, mark
        );
        Ok(())
    }
}

fn refused(refusal: Refusal) -> JsonReply {
    debug!("Player refused: {:?}", refusal);

    let (code, status) = match refusal {
        Refusal::NoSuchItem => (ErrorCode::InvalidID, StatusCode::NOT_FOUND),
        Refusal::LessonLocked => (ErrorCode::LessonLocked, StatusCode::FORBIDDEN),
        Refusal::QuizLocked => (ErrorCode::QuizLocked, StatusCode::FORBIDDEN),
        Refusal::AnswerRequired => (ErrorCode::AnswerRequired, StatusCode::BAD_REQUEST),
        Refusal::InvalidOption => (ErrorCode::InvalidOption, StatusCode::BAD_REQUEST),
    };

    FailureResponse::with_status(code, status)
}

#[derive(Serialize)]
struct ItemView<'a> {
    index: usize,
    title: &'a str,
    status: ItemStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse<'a> {
    status: &'static str,
    /// Set on submissions, false when the item was already behind the student
    #[serde(skip_serializing_if = "Option::is_none")]
    accepted: Option<bool>,
    course_id: u32,
    title: &'a str,
    phase: Phase,
    current_lesson: usize,
    current_quiz: usize,
    correct_count: usize,
    mark: Option<u8>,
    certificate_id: Option<String>,
    lessons: Vec<ItemView<'a>>,
    quizzes: Vec<ItemView<'a>>,
}

impl<'a> PlayerResponse<'a> {
    fn new(course: &'a Course, email: &str, progress: Progress, mark: Option<u8>) -> Self {
        Self {
            status: "success",
            accepted: None,
            course_id: course.id,
            title: &course.title,
            phase: progress.phase,
            current_lesson: progress.current_lesson,
            current_quiz: progress.current_quiz,
            correct_count: progress.correct_count,
            mark,
            certificate_id: if progress.is_done() {
                Some(certificate_id(email, course.id))
            } else {
                None
            },
            lessons: course
                .lessons
                .iter()
                .enumerate()
                .map(|(index, lesson)| ItemView {
                    index,
                    title: &lesson.title,
                    status: progress.lesson_status(index),
                })
                .collect(),
            quizzes: course
                .quizzes
                .iter()
                .enumerate()
                .map(|(index, quiz)| ItemView {
                    index,
                    title: &quiz.question,
                    status: progress.quiz_status(index),
                })
                .collect(),
        }
    }

    fn accepted(mut self, accepted: bool) -> Self {
        self.accepted = Some(accepted);
        self
    }
}

async fn view(course_id: u32, session: Session, db: Db) -> Result<JsonReply, Rejection> {
    let mut db = db.lock().await;

    let seat = match Seat::take(&*db, course_id, &session.email) {
        Ok(seat) => seat,
        Err(reply) => return Ok(reply),
    };

    // Done without a completion on record: a previous finalization never made it to the store
    if seat.progress.is_done() && !seat.user.has_completed(course_id) {
        let mark = seat.progress.mark(&seat.course).unwrap_or(100);
        seat.complete(&mut *db, seat.progress, mark)?;

        return Ok(success(&PlayerResponse::new(
            &seat.course,
            &seat.user.email,
            seat.progress,
            Some(mark),
        )));
    }

    Ok(success(&PlayerResponse::new(
        &seat.course,
        &seat.user.email,
        seat.progress,
        seat.mark(),
    )))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LessonResponse<'a> {
    status: &'static str,
    index: usize,
    title: &'a str,
    url: &'a str,
    embed_url: String,
    item_status: ItemStatus,
}

async fn open_lesson(
    course_id: u32,
    index: usize,
    session: Session,
    db: Db,
) -> Result<JsonReply, Rejection> {
    let db = db.lock().await;

    let seat = match Seat::take(&*db, course_id, &session.email) {
        Ok(seat) => seat,
        Err(reply) => return Ok(reply),
    };

    if let Err(refusal) = seat.progress.check_lesson(&seat.course, index) {
        return Ok(refused(refusal));
    }

    let lesson = &seat.course.lessons[index];

    Ok(success(&LessonResponse {
        status: "success",
        index,
        title: &lesson.title,
        url: &lesson.url,
        embed_url: lesson.embed_url(),
        item_status: seat.progress.lesson_status(index),
    }))
}

async fn watched(
    course_id: u32,
    index: usize,
    session: Session,
    db: Db,
) -> Result<JsonReply, Rejection> {
    let mut db = db.lock().await;

    let seat = match Seat::take(&*db, course_id, &session.email) {
        Ok(seat) => seat,
        Err(reply) => return Ok(reply),
    };

    let step = match seat.progress.watch_lesson(&seat.course, index) {
        Ok(step) => step,
        Err(refusal) => return Ok(refused(refusal)),
    };

    reply_step(&mut *db, &seat, step)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuizResponse<'a> {
    status: &'static str,
    index: usize,
    question: &'a str,
    options: &'a [String],
    item_status: ItemStatus,
    /// Only revealed once the course is done
    #[serde(skip_serializing_if = "Option::is_none")]
    correct_option: Option<usize>,
}

async fn open_quiz(
    course_id: u32,
    index: usize,
    session: Session,
    db: Db,
) -> Result<JsonReply, Rejection> {
    let db = db.lock().await;

    let seat = match Seat::take(&*db, course_id, &session.email) {
        Ok(seat) => seat,
        Err(reply) => return Ok(reply),
    };

    if let Err(refusal) = seat.progress.check_quiz(&seat.course, index) {
        return Ok(refused(refusal));
    }

    let quiz = &seat.course.quizzes[index];

    Ok(success(&QuizResponse {
        status: "success",
        index,
        question: &quiz.question,
        options: &quiz.options,
        item_status: seat.progress.quiz_status(index),
        correct_option: if seat.progress.is_done() {
            quiz.correct_index()
        } else {
            None
        },
    }))
}

#[derive(Deserialize)]
struct AnswerRequest {
    #[serde(default)]
    option: Option<usize>,
}

async fn answer(
    course_id: u32,
    index: usize,
    session: Session,
    db: Db,
    request: AnswerRequest,
) -> Result<JsonReply, Rejection> {
    let mut db = db.lock().await;

    let seat = match Seat::take(&*db, course_id, &session.email) {
        Ok(seat) => seat,
        Err(reply) => return Ok(reply),
    };

    let step = match seat.progress.answer_quiz(&seat.course, index, request.option) {
        Ok(step) => step,
        Err(refusal) => return Ok(refused(refusal)),
    };

    reply_step(&mut *db, &seat, step)
}

fn reply_step(db: &mut impl Database, seat: &Seat, step: Step) -> Result<JsonReply, Rejection> {
    let accepted = step != Step::Stale;
    let mark = match step {
        Step::Completed { mark, .. } => Some(mark),
        _ => seat.mark(),
    };

    let progress = seat.apply(db, step)?;

    Ok(success(
        &PlayerResponse::new(&seat.course, &seat.user.email, progress, mark).accepted(accepted),
    ))
}

async fn certificate(
    course_id: u32,
    session: Session,
    db: Db,
) -> Result<warp::reply::Response, Rejection> {
    let db = db.lock().await;

    let seat = match Seat::take(&*db, course_id, &session.email) {
        Ok(seat) => seat,
        Err(reply) => return Ok(reply.into_response()),
    };

    if !seat.user.has_completed(course_id) {
        return Ok(
            FailureResponse::with_status(ErrorCode::CourseNotCompleted, StatusCode::CONFLICT)
                .into_response(),
        );
    }

    let certificate = Certificate {
        student_name: seat.user.display_name(),
        course_title: &seat.course.title,
        completed_on: seat
            .user
            .completed_on
            .get(&course_id)
            .copied()
            .unwrap_or_else(|| Utc::now().date_naive()),
        score: seat.mark().unwrap_or(0),
        id: certificate_id(&seat.user.email, course_id),
    };

    let disposition = format!("attachment; filename=\"{}\"", certificate.file_name());

    Ok(
        warp::reply::with_header(certificate.render(), "content-disposition", disposition)
            .into_response(),
    )
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::*;
    use db::{
        models::{Phase, ProgressRecord},
        Database,
    };
    use serde_json::json;

    async fn enrolled() -> TestApp {
        let app = TestApp::new();
        app.db.lock().await.user_enroll(STUDENT, COURSE).unwrap();
        app
    }

    fn player(method: &str, tail: &str) -> warp::test::RequestBuilder {
        as_user(STUDENT, method, &format!("/api/courses/0/player{}", tail))
    }

    fn pick(option: usize) -> serde_json::Value {
        json!({ "option": option })
    }

    #[tokio::test]
    async fn strangers_are_turned_away() {
        let app = TestApp::new();

        let (status, body) = app.send(player("GET", "")).await;
        assert_eq!(status, 403);
        assert_eq!(body["code"], "NotEnrolled");

        let (status, body) = app
            .send(as_user(STUDENT, "GET", "/api/courses/9/player"))
            .await;
        assert_eq!(status, 404);
        assert_eq!(body["code"], "NotFound");
    }

    #[tokio::test]
    async fn walk_through_the_course() {
        let app = enrolled().await;

        let (status, body) = app.send(player("GET", "")).await;
        assert_eq!(status, 200);
        assert_eq!(body["phase"], "lessons");
        assert_eq!(body["lessons"][0]["status"], "current");
        assert_eq!(body["lessons"][1]["status"], "locked");
        assert_eq!(body["quizzes"][0]["status"], "locked");
        assert!(body["mark"].is_null());

        let (status, body) = app.send(player("GET", "/lessons/1")).await;
        assert_eq!(status, 403);
        assert_eq!(body["code"], "LessonLocked");

        let (status, body) = app
            .send(player("POST", "/quizzes/0/answer").json(&pick(1)))
            .await;
        assert_eq!(status, 403);
        assert_eq!(body["code"], "QuizLocked");

        let (status, body) = app.send(player("GET", "/lessons/0")).await;
        assert_eq!(status, 200);
        assert_eq!(
            body["embedUrl"],
            "https://www.youtube.com/embed/QJNwK2uJyGs"
        );

        let (_, body) = app.send(player("POST", "/lessons/0/watched")).await;
        assert_eq!(body["accepted"], true);
        assert_eq!(body["currentLesson"], 1);

        let (_, body) = app.send(player("POST", "/lessons/0/watched")).await;
        assert_eq!(body["accepted"], false);
        assert_eq!(body["currentLesson"], 1);

        let (_, body) = app.send(player("POST", "/lessons/1/watched")).await;
        assert_eq!(body["phase"], "quizzes");
        assert_eq!(body["quizzes"][0]["status"], "current");

        let (status, body) = app
            .send(player("POST", "/quizzes/0/answer").json(&json!({})))
            .await;
        assert_eq!(status, 400);
        assert_eq!(body["code"], "AnswerRequired");

        let (status, body) = app
            .send(player("POST", "/quizzes/0/answer").json(&pick(7)))
            .await;
        assert_eq!(status, 400);
        assert_eq!(body["code"], "InvalidOption");

        let (_, body) = app
            .send(player("POST", "/quizzes/0/answer").json(&pick(1)))
            .await;
        assert_eq!(body["accepted"], true);
        assert_eq!(body["correctCount"], 1);
        assert_eq!(body["currentQuiz"], 1);

        // Answering again, even right, changes nothing
        let (_, body) = app
            .send(player("POST", "/quizzes/0/answer").json(&pick(1)))
            .await;
        assert_eq!(body["accepted"], false);
        assert_eq!(body["correctCount"], 1);

        let (status, body) = app.send(player("GET", "/quizzes/0")).await;
        assert_eq!(status, 200);
        assert!(body.get("correctOption").is_none());

        let (_, body) = app
            .send(player("POST", "/quizzes/1/answer").json(&pick(3)))
            .await;
        assert_eq!(body["phase"], "done");
        assert_eq!(body["mark"], 50);
        assert_eq!(body["certificateId"], "LEARNLY-STUD-0000");

        let (_, body) = app.send(player("GET", "/quizzes/1")).await;
        assert_eq!(body["correctOption"], 0);
        assert_eq!(body["itemStatus"], "completed");

        let db = app.db.lock().await;
        let student = db.user_get(STUDENT).unwrap();
        assert!(student.has_completed(COURSE));
        assert_eq!(student.completed_course_marks[&COURSE], 50);
        assert_eq!(student.progress[&COURSE].phase, Some(Phase::Done));
    }

    #[tokio::test]
    async fn unknown_items_are_not_found() {
        let app = enrolled().await;

        let (status, body) = app.send(player("POST", "/lessons/2/watched")).await;
        assert_eq!(status, 404);
        assert_eq!(body["code"], "InvalidID");

        let (status, _) = app.send(player("GET", "/quizzes/5")).await;
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn failed_write_keeps_the_student_in_place() {
        let mut app = enrolled().await;
        app.break_store();

        let (status, body) = app.send(player("POST", "/lessons/0/watched")).await;
        assert_eq!(status, 500);
        assert_eq!(body["code"], "PersistenceFailure");

        let db = app.db.lock().await;
        assert!(db.user_get(STUDENT).unwrap().progress.get(&COURSE).is_none());
    }

    #[tokio::test]
    async fn unrecorded_completion_is_finalized_on_view() {
        let app = enrolled().await;
        let record = ProgressRecord {
            phase: Some(Phase::Done),
            current_lesson: 1,
            current_quiz: 1,
            correct_count: 5,
        };
        app.db
            .lock()
            .await
            .progress_save(STUDENT, COURSE, record)
            .unwrap();

        let (status, body) = app.send(player("GET", "")).await;
        assert_eq!(status, 200);
        assert_eq!(body["phase"], "done");
        assert_eq!(body["mark"], 100);

        let db = app.db.lock().await;
        let student = db.user_get(STUDENT).unwrap();
        assert!(student.has_completed(COURSE));
        assert_eq!(student.completed_course_marks[&COURSE], 100);
    }

    #[tokio::test]
    async fn certificate_needs_a_completion() {
        let app = enrolled().await;
        let request = || as_user(STUDENT, "GET", "/api/courses/0/certificate");

        let (status, body) = app.send(request()).await;
        assert_eq!(status, 409);
        assert_eq!(body["code"], "CourseNotCompleted");

        for (index, option) in [(0, 1), (1, 0)].iter() {
            app.send(player("POST", "/lessons/0/watched")).await;
            app.send(player("POST", "/lessons/1/watched")).await;
            app.send(player("POST", &format!("/quizzes/{}/answer", index)).json(&pick(*option)))
                .await;
        }

        let response = request().reply(&api(&app.db)).await;
        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers()["content-disposition"],
            "attachment; filename=\"learnly-stud-0000.txt\""
        );

        let page = String::from_utf8_lossy(response.body());
        assert!(page.contains("Student User"));
        assert!(page.contains("Data Structures 101"));
        assert!(page.contains("Score: 100%"));
        assert!(page.contains("Certificate ID: LEARNLY-STUD-0000"));
    }
}

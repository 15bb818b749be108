use chrono::NaiveDate;
use serde::Serialize;
use warp::{Filter, Rejection, Reply};

use super::courses::CourseSummary;
use super::globals::{success, JsonReply};
use db::{models::User, Database, Db};
use filters::{authed, with_db, Forbidden, Session};

pub fn routes(db: &Db) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("api" / "profile")
        .and(warp::get())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and_then(dashboard)
        .boxed()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletedCourse<'a> {
    #[serde(flatten)]
    course: CourseSummary<'a>,
    mark: Option<u8>,
    completed_on: Option<NaiveDate>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardResponse<'a> {
    status: &'static str,
    user: &'a User,
    in_progress: Vec<CourseSummary<'a>>,
    completed: Vec<CompletedCourse<'a>>,
}

async fn dashboard(session: Session, db: Db) -> Result<JsonReply, Rejection> {
    let db = db.lock().await;

    let user = db
        .user_get(&session.email)
        .ok_or_else(|| warp::reject::custom(Forbidden))?;

    // Courses removed since enrollment are skipped
    let in_progress = user
        .enrolled_courses
        .iter()
        .filter(|id| !user.has_completed(**id))
        .filter_map(|id| db.course_get(*id))
        .map(|course| CourseSummary::new(&*db, course))
        .collect();

    let completed = user
        .completed_courses
        .iter()
        .filter_map(|id| db.course_get(*id))
        .map(|course| CompletedCourse {
            course: CourseSummary::new(&*db, course),
            mark: user.completed_course_marks.get(&course.id).copied(),
            completed_on: user.completed_on.get(&course.id).copied(),
        })
        .collect();

    Ok(success(&DashboardResponse {
        status: "success",
        user,
        in_progress,
        completed,
    }))
}

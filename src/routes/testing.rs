use serde_json::Value;
use std::{convert::Infallible, sync::Arc};
use tempfile::TempDir;
use tokio::sync::Mutex;
use warp::{test::RequestBuilder, Filter, Reply};

use db::{seed::seed_db, Db, JSONDatabase};
use filters::IDENTITY_HEADER;

pub use db::seed::{DEMO_ADMIN as ADMIN, DEMO_INSTRUCTOR as INSTRUCTOR, DEMO_STUDENT as STUDENT};

/// Id of the seeded "Data Structures 101" course: 2 lessons, then quizzes answered `B` and `A`
pub const COURSE: u32 = 0;

/// Seeded store living in a temporary directory
pub struct TestApp {
    pub db: Db,
    dir: Option<TempDir>,
}

impl TestApp {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JSONDatabase::open(dir.path().join("store.json")).unwrap();
        seed_db(&mut store).unwrap();

        Self {
            db: Arc::new(Mutex::new(store)),
            dir: Some(dir),
        }
    }

    /// Removes the store directory, every write from now on fails
    pub fn break_store(&mut self) {
        if let Some(dir) = self.dir.take() {
            dir.close().unwrap();
        }
    }

    pub async fn send(&self, request: RequestBuilder) -> (u16, Value) {
        let response = request.reply(&api(&self.db)).await;
        let body = serde_json::from_slice(response.body()).unwrap_or(Value::Null);
        (response.status().as_u16(), body)
    }
}

pub fn api(db: &Db) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    super::routes(db).recover(super::handle_rejection)
}

pub fn anonymous(method: &str, path: &str) -> RequestBuilder {
    warp::test::request().method(method).path(path)
}

pub fn as_user(email: &str, method: &str, path: &str) -> RequestBuilder {
    anonymous(method, path).header(IDENTITY_HEADER, email)
}

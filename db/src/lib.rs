use chrono::NaiveDate;
use serde::Deserialize;
use std::{path::Path, sync::Arc};
use tokio::sync::Mutex;

mod error;
mod json;
pub mod models;
pub mod seed;
pub mod utils;

pub use error::StoreError;
pub use json::JSONDatabase;
use models::{Course, Difficulty, Faq, Lesson, ProgressRecord, Quiz, Review, Role, User};

pub const PAGE_SIZE: usize = 10;

pub type Db = Arc<Mutex<JSONDatabase>>;

pub fn new_db(path: impl AsRef<Path>) -> Result<Db, StoreError> {
    Ok(Arc::new(Mutex::new(JSONDatabase::open(path)?)))
}

// Every write is durable before it returns `Ok`; on `Err` the in-memory documents are left
// exactly as they were before the call.
pub trait Database {
    fn seed(
        &mut self,
        users: impl Iterator<Item = NewUser>,
        courses: impl Iterator<Item = NewCourse>,
        faqs: impl Iterator<Item = NewFaq>,
    ) -> Result<(), StoreError>;
    fn is_empty(&self) -> bool;
    fn dump_as_json(&self) -> Result<String, serde_json::Error>;

    fn user_add(&mut self, user: NewUser) -> Result<&User, StoreError>;
    fn user_get(&self, email: &str) -> Option<&User>;
    fn user_get_by_id(&self, id: u32) -> Option<&User>;
    fn user_update(&mut self, user: User) -> Result<(), StoreError>;
    fn user_list(
        &self,
        page: Option<usize>,
        query: Option<&str>,
        filter: impl Fn(&User) -> bool,
    ) -> (usize, Vec<&User>);
    fn user_remove(&mut self, id: u32) -> Result<bool, StoreError>;

    /// Adds the course to the user's enrolled courses; `updated` is false if it was already there
    fn user_enroll(&mut self, email: &str, course_id: u32) -> Result<UpdateStatus, StoreError>;
    fn progress_save(
        &mut self,
        email: &str,
        course_id: u32,
        progress: ProgressRecord,
    ) -> Result<UpdateStatus, StoreError>;
    /// Records the completion mark and date and stores the final progress record, in one write
    fn course_complete(
        &mut self,
        email: &str,
        course_id: u32,
        completion: Completion,
    ) -> Result<UpdateStatus, StoreError>;

    fn course_add(&mut self, course: NewCourse) -> Result<&Course, StoreError>;
    fn course_get(&self, id: u32) -> Option<&Course>;
    fn course_list(
        &self,
        page: Option<usize>,
        query: Option<&str>,
        filter: &CourseFilter,
    ) -> (usize, Vec<&Course>);
    fn course_remove(&mut self, id: u32) -> Result<bool, StoreError>;
    fn category_list(&self) -> Vec<&str>;
    /// `None` when the course does not exist, otherwise whether an older review was replaced
    fn review_upsert(&mut self, course_id: u32, review: Review)
        -> Result<Option<bool>, StoreError>;

    fn faq_list(&self) -> Vec<&Faq>;
    fn faq_add(&mut self, faq: NewFaq) -> Result<&Faq, StoreError>;
    fn faq_update(&mut self, id: u32, update: FaqUpdate) -> Result<UpdateStatus, StoreError>;
    fn faq_remove(&mut self, id: u32) -> Result<bool, StoreError>;
}

pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub photo_url: Option<String>,
}

pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub instructor_email: String,
    pub difficulty: Difficulty,
    pub categories: Vec<String>,
    pub lessons: Vec<Lesson>,
    pub quizzes: Vec<Quiz>,
}

#[derive(Default)]
pub struct CourseFilter {
    pub instructor_email: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub category: Option<String>,
}

impl CourseFilter {
    pub fn matches(&self, course: &Course) -> bool {
        self.instructor_email
            .as_ref()
            .map_or(true, |email| &course.instructor_email == email)
            && self
                .difficulty
                .map_or(true, |difficulty| course.difficulty == difficulty)
            && self
                .category
                .as_ref()
                .map_or(true, |category| course.categories.contains(category))
    }
}

pub struct Completion {
    pub mark: u8,
    pub date: NaiveDate,
    pub progress: ProgressRecord,
}

#[derive(Debug, PartialEq)]
pub struct UpdateStatus {
    pub found: bool,
    pub updated: bool,
}

impl UpdateStatus {
    pub fn not_found() -> Self {
        Self {
            found: false,
            updated: false,
        }
    }
}

#[derive(Deserialize)]
pub struct NewFaq {
    pub question: String,
    pub answer: String,
}

#[derive(Deserialize)]
pub struct FaqUpdate {
    pub question: Option<String>,
    pub answer: Option<String>,
}

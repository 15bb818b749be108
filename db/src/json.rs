use chrono::Utc;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use super::{
    utils::{normalize_categories, UniqueExt},
    Completion, CourseFilter, Database, FaqUpdate, NewCourse, NewFaq, NewUser, StoreError,
    UpdateStatus, PAGE_SIZE,
};
use crate::models::{Course, Faq, Phase, ProgressRecord, Review, User};

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct JSONDatabase {
    #[serde(skip)]
    path: PathBuf,
    users: BTreeMap<String, User>,
    courses: BTreeMap<u32, Course>,
    faqs: BTreeMap<u32, Faq>,
    next_user_id: u32,
    next_course_id: u32,
    next_faq_id: u32,
}

impl JSONDatabase {
    /// Loads the store from `path`, or creates an empty one there if the file does not exist yet
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        match Self::from_file(&path) {
            Ok(mut db) => {
                info!(
                    "Loaded {} users, {} courses from {}",
                    db.users.len(),
                    db.courses.len(),
                    path.display()
                );
                db.path = path;
                Ok(db)
            }
            Err(StoreError::Io { ref source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                info!("Creating a new store at {}", path.display());
                let db = Self {
                    path,
                    ..Self::default()
                };
                db.persist()?;
                Ok(db)
            }
            Err(err) => Err(err),
        }
    }

    fn from_file(path: &Path) -> Result<Self, StoreError> {
        let contents = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(serde_json::from_str(&contents)?)
    }

    /// Writes the whole store next to the file then swaps it in, so a crash never leaves a
    /// truncated file behind
    fn persist(&self) -> Result<(), StoreError> {
        let contents = self.dump_as_json()?;
        let staging = self.path.with_extension("tmp");
        let io_error = |source: io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let mut output = File::create(&staging).map_err(io_error)?;
        output.write_all(contents.as_bytes()).map_err(io_error)?;
        output.sync_all().map_err(io_error)?;
        fs::rename(&staging, &self.path).map_err(io_error)?;
        Ok(())
    }

    /// Applies `change`, then persists. If persisting fails the change is rolled back.
    fn commit<T>(&mut self, change: impl FnOnce(&mut Self) -> T) -> Result<T, StoreError> {
        let snapshot = self.clone();
        let result = change(self);

        if let Err(err) = self.persist() {
            error!("{}, rolling back", err);
            *self = snapshot;
            return Err(err);
        }

        Ok(result)
    }

    fn update_user(
        &mut self,
        email: &str,
        change: impl FnOnce(&mut User) -> bool,
    ) -> Result<UpdateStatus, StoreError> {
        if !self.users.contains_key(email) {
            return Ok(UpdateStatus::not_found());
        }

        let updated = self.commit(|db| db.users.get_mut(email).map_or(false, change))?;

        Ok(UpdateStatus {
            found: true,
            updated,
        })
    }
}

impl Database for JSONDatabase {
    fn seed(
        &mut self,
        users: impl Iterator<Item = NewUser>,
        courses: impl Iterator<Item = NewCourse>,
        faqs: impl Iterator<Item = NewFaq>,
    ) -> Result<(), StoreError> {
        self.commit(|db| {
            users.for_each(|u| {
                db._user_add(u);
            });
            courses.for_each(|c| {
                db._course_add(c);
            });
            faqs.for_each(|f| {
                db._faq_add(f);
            });
        })
    }

    fn is_empty(&self) -> bool {
        self.users.is_empty() && self.courses.is_empty() && self.faqs.is_empty()
    }

    fn dump_as_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self)
    }

    fn user_add(&mut self, user: NewUser) -> Result<&User, StoreError> {
        let email = self.commit(|db| db._user_add(user))?;
        Ok(&self.users[&email])
    }

    fn user_get(&self, email: &str) -> Option<&User> {
        self.users.get(email)
    }

    fn user_get_by_id(&self, id: u32) -> Option<&User> {
        self.users.values().find(|u| u.id == id)
    }

    fn user_update(&mut self, user: User) -> Result<(), StoreError> {
        self.commit(|db| {
            db.users.insert(user.email.clone(), user);
        })
    }

    fn user_list(
        &self,
        page: Option<usize>,
        query: Option<&str>,
        filter: impl Fn(&User) -> bool,
    ) -> (usize, Vec<&User>) {
        _search(
            self.users.values(),
            |u: &User| format!("{} {}", u.name, u.email),
            page,
            query,
            filter,
        )
    }

    fn user_remove(&mut self, id: u32) -> Result<bool, StoreError> {
        let email = match self.user_get_by_id(id) {
            Some(user) => user.email.clone(),
            None => return Ok(false),
        };

        self.commit(|db| {
            db.users.remove(&email);
        })?;
        Ok(true)
    }

    fn user_enroll(&mut self, email: &str, course_id: u32) -> Result<UpdateStatus, StoreError> {
        if let Some(user) = self.users.get(email) {
            if user.is_enrolled(course_id) {
                return Ok(UpdateStatus {
                    found: true,
                    updated: false,
                });
            }
        }

        self.update_user(email, |user| {
            user.enrolled_courses.push(course_id);
            true
        })
    }

    fn progress_save(
        &mut self,
        email: &str,
        course_id: u32,
        progress: ProgressRecord,
    ) -> Result<UpdateStatus, StoreError> {
        self.update_user(email, |user| {
            user.progress.insert(course_id, progress);
            true
        })
    }

    fn course_complete(
        &mut self,
        email: &str,
        course_id: u32,
        completion: Completion,
    ) -> Result<UpdateStatus, StoreError> {
        self.update_user(email, |user| {
            if !user.has_completed(course_id) {
                user.completed_courses.push(course_id);
            }
            user.completed_course_marks.insert(course_id, completion.mark);
            user.completed_on.entry(course_id).or_insert(completion.date);

            let progress = ProgressRecord {
                phase: Some(Phase::Done),
                ..completion.progress
            };
            user.progress.insert(course_id, progress);
            true
        })
    }

    fn course_add(&mut self, course: NewCourse) -> Result<&Course, StoreError> {
        let id = self.commit(|db| db._course_add(course))?;
        Ok(&self.courses[&id])
    }

    fn course_get(&self, id: u32) -> Option<&Course> {
        self.courses.get(&id)
    }

    fn course_list(
        &self,
        page: Option<usize>,
        query: Option<&str>,
        filter: &CourseFilter,
    ) -> (usize, Vec<&Course>) {
        let users = &self.users;

        _search(
            self.courses.values(),
            |c: &Course| {
                let instructor = users
                    .get(&c.instructor_email)
                    .map(|u| u.name.as_str())
                    .unwrap_or("");
                format!("{} {} {}", c.title, instructor, c.categories.join(" "))
            },
            page,
            query,
            |c| filter.matches(c),
        )
    }

    fn course_remove(&mut self, id: u32) -> Result<bool, StoreError> {
        if !self.courses.contains_key(&id) {
            return Ok(false);
        }

        self.commit(|db| {
            db.courses.remove(&id);
        })?;
        Ok(true)
    }

    fn category_list(&self) -> Vec<&str> {
        self.courses
            .values()
            .flat_map(|c| c.categories.iter().map(String::as_str))
            .unique()
            .collect()
    }

    fn review_upsert(
        &mut self,
        course_id: u32,
        review: Review,
    ) -> Result<Option<bool>, StoreError> {
        if !self.courses.contains_key(&course_id) {
            return Ok(None);
        }

        self.commit(|db| {
            db.courses
                .get_mut(&course_id)
                .map(|course| course.upsert_review(review))
        })
    }

    fn faq_list(&self) -> Vec<&Faq> {
        self.faqs.values().collect()
    }

    fn faq_add(&mut self, faq: NewFaq) -> Result<&Faq, StoreError> {
        let id = self.commit(|db| db._faq_add(faq))?;
        Ok(&self.faqs[&id])
    }

    fn faq_update(&mut self, id: u32, update: FaqUpdate) -> Result<UpdateStatus, StoreError> {
        if !self.faqs.contains_key(&id) {
            return Ok(UpdateStatus::not_found());
        }

        if update.question.is_none() && update.answer.is_none() {
            return Ok(UpdateStatus {
                found: true,
                updated: false,
            });
        }

        self.commit(|db| {
            if let Some(faq) = db.faqs.get_mut(&id) {
                if let Some(question) = update.question {
                    faq.question = question;
                }

                if let Some(answer) = update.answer {
                    faq.answer = answer;
                }

                faq.updated_at = Some(Utc::now());
            }
        })?;

        Ok(UpdateStatus {
            found: true,
            updated: true,
        })
    }

    fn faq_remove(&mut self, id: u32) -> Result<bool, StoreError> {
        if !self.faqs.contains_key(&id) {
            return Ok(false);
        }

        self.commit(|db| {
            db.faqs.remove(&id);
        })?;
        Ok(true)
    }
}

impl JSONDatabase {
    fn _user_add(&mut self, user: NewUser) -> String {
        let email = user.email.clone();

        self.users.insert(
            email.clone(),
            User {
                id: self.next_user_id,
                email: user.email,
                role: user.role,
                name: user.name,
                bio: String::new(),
                photo_url: user.photo_url,
                enrolled_courses: Vec::new(),
                completed_courses: Vec::new(),
                completed_course_marks: Default::default(),
                completed_on: Default::default(),
                progress: Default::default(),
            },
        );

        self.next_user_id += 1;
        email
    }

    fn _course_add(&mut self, course: NewCourse) -> u32 {
        let id = self.next_course_id;

        self.courses.insert(
            id,
            Course {
                id,
                title: course.title,
                description: course.description,
                instructor_email: course.instructor_email,
                difficulty: course.difficulty,
                categories: normalize_categories(&course.categories),
                lessons: course.lessons,
                quizzes: course.quizzes,
                reviews: Vec::new(),
            },
        );

        self.next_course_id += 1;
        id
    }

    fn _faq_add(&mut self, faq: NewFaq) -> u32 {
        let id = self.next_faq_id;

        self.faqs.insert(
            id,
            Faq {
                id,
                question: faq.question,
                answer: faq.answer,
                created_at: Utc::now(),
                updated_at: None,
            },
        );

        self.next_faq_id += 1;
        id
    }
}

/// Filters `collection` with `query` and `custom_filter`, then cuts out the requested page.
/// Without a page every match is returned.
fn _search<'a, T, F>(
    collection: impl Iterator<Item = &'a T>,
    property: F,
    page: Option<usize>,
    query: Option<&str>,
    custom_filter: impl Fn(&T) -> bool,
) -> (usize, Vec<&'a T>)
where
    F: Fn(&T) -> String,
{
    let mut filter = contains_query(query, property);
    let mut total = 0;
    let mut skipped = 0;
    let mut results: Vec<&T> = Vec::new();
    let to_skip = page.map_or(0, |page| (page.max(1) - 1) * PAGE_SIZE);
    let limit = page.map_or(usize::MAX, |_| PAGE_SIZE);

    for row in collection {
        if !filter(&row) || !custom_filter(row) {
            continue;
        }

        total += 1;

        if skipped < to_skip {
            skipped += 1;
        } else if results.len() < limit {
            results.push(row);
        }
    }

    (total, results)
}

/// Returns a function to be used as a filter that checks if the provided query is contained in the
/// object string.
fn contains_query<T, F>(query: Option<&str>, property: F) -> impl FnMut(&&T) -> bool
where
    F: Fn(&T) -> String,
{
    let normalize = |s: &str| unidecode::unidecode(s.trim()).to_ascii_lowercase();
    let query = query.map(|d| truncate(d, 50)).map(normalize);

    move |object: &&T| {
        if let Some(query) = &query {
            let name = property(object);
            let name = normalize(&name);
            name.contains(query)
        } else {
            true
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        None => s,
        Some((idx, _)) => &s[..idx],
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, str::FromStr};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u32,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub enrolled_courses: Vec<u32>,
    #[serde(default)]
    pub completed_courses: Vec<u32>,
    #[serde(default)]
    pub completed_course_marks: HashMap<u32, u8>,
    #[serde(default)]
    pub completed_on: HashMap<u32, NaiveDate>,
    #[serde(default)]
    pub progress: HashMap<u32, ProgressRecord>,
}

impl User {
    /// Name shown on certificates and reviews, the email when no name was given
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }

    pub fn is_enrolled(&self, course_id: u32) -> bool {
        self.enrolled_courses.contains(&course_id)
    }

    pub fn has_completed(&self, course_id: u32) -> bool {
        self.completed_courses.contains(&course_id)
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        match self {
            Self::Admin => true,
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Lessons,
    Quizzes,
    Done,
}

/// Progress of a student in a course, as last written to the store.
///
/// Values come straight from clients and older documents, so indices may be negative or past the
/// end of the course; they are clamped when the player resumes from them.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    #[serde(default)]
    pub phase: Option<Phase>,
    #[serde(default)]
    pub current_lesson: i64,
    #[serde(default)]
    pub current_quiz: i64,
    #[serde(default)]
    pub correct_count: i64,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub instructor_email: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
    #[serde(default)]
    pub quizzes: Vec<Quiz>,
    #[serde(default)]
    pub reviews: Vec<Review>,
}

impl Course {
    /// Mean rating rounded to one decimal, 0 without reviews
    pub fn average_rating(&self) -> f64 {
        if self.reviews.is_empty() {
            return 0.0;
        }

        let sum: u32 = self.reviews.iter().map(|r| u32::from(r.rating)).sum();
        let mean = f64::from(sum) / self.reviews.len() as f64;
        (mean * 10.0).round() / 10.0
    }

    /// Replaces the review written by the same author, or appends it.
    /// Returns `true` when an existing review was replaced.
    pub fn upsert_review(&mut self, review: Review) -> bool {
        match self
            .reviews
            .iter_mut()
            .find(|r| r.user_email == review.user_email)
        {
            Some(existing) => {
                *existing = review;
                true
            }
            None => {
                self.reviews.push(review);
                false
            }
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl FromStr for Difficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Beginner" => Ok(Self::Beginner),
            "Intermediate" => Ok(Self::Intermediate),
            "Advanced" => Ok(Self::Advanced),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Lesson {
    pub title: String,
    pub url: String,
}

impl Lesson {
    /// Link usable in an embedded player, YouTube watch and short links are rewritten
    pub fn embed_url(&self) -> String {
        if self.url.contains("watch?v=") {
            self.url.replace("watch?v=", "embed/")
        } else if self.url.contains("youtu.be/") {
            self.url.replace("youtu.be/", "www.youtube.com/embed/")
        } else {
            self.url.clone()
        }
    }
}

pub const QUIZ_OPTION_COUNT: usize = 4;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub question: String,
    pub options: Vec<String>,
    /// Letter of the right option, `A` to `D`
    #[serde(default)]
    pub correct_answer: String,
}

impl Quiz {
    /// Index of the right option, `None` when the designator is not a letter from A to D
    pub fn correct_index(&self) -> Option<usize> {
        match self.correct_answer.trim().to_ascii_uppercase().as_str() {
            "A" => Some(0),
            "B" => Some(1),
            "C" => Some(2),
            "D" => Some(3),
            _ => None,
        }
    }

    pub fn is_well_formed(&self) -> bool {
        !self.question.trim().is_empty()
            && self.options.len() == QUIZ_OPTION_COUNT
            && self.correct_index().is_some()
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub user_email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Faq {
    pub id: u32,
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(email: &str, rating: u8, comment: &str) -> Review {
        Review {
            user_email: email.to_string(),
            name: None,
            rating,
            comment: Some(comment.to_string()),
            created_at: Utc::now(),
        }
    }

    fn course() -> Course {
        Course {
            id: 7,
            title: "Rust".to_string(),
            description: String::new(),
            instructor_email: "teach@learnly.dev".to_string(),
            difficulty: Difficulty::Beginner,
            categories: vec![],
            lessons: vec![],
            quizzes: vec![],
            reviews: vec![],
        }
    }

    #[test]
    fn designator_maps_letters_to_indices() {
        let mut quiz = Quiz {
            question: "?".to_string(),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_answer: " c ".to_string(),
        };
        assert_eq!(quiz.correct_index(), Some(2));
        assert!(quiz.is_well_formed());

        quiz.correct_answer = "E".to_string();
        assert_eq!(quiz.correct_index(), None);
        assert!(!quiz.is_well_formed());

        quiz.correct_answer = String::new();
        assert_eq!(quiz.correct_index(), None);
    }

    #[test]
    fn quiz_needs_four_options() {
        let quiz = Quiz {
            question: "?".to_string(),
            options: vec!["a".into(), "b".into()],
            correct_answer: "A".to_string(),
        };
        assert!(!quiz.is_well_formed());
    }

    #[test]
    fn duplicate_review_overwrites_and_keeps_count() {
        let mut course = course();
        assert!(!course.upsert_review(review("a@x.io", 5, "great")));
        assert!(!course.upsert_review(review("b@x.io", 2, "meh")));
        assert_eq!(course.average_rating(), 3.5);

        assert!(course.upsert_review(review("a@x.io", 3, "ok after all")));
        assert_eq!(course.reviews.len(), 2);
        assert_eq!(course.reviews[0].rating, 3);
        assert_eq!(course.reviews[0].comment.as_deref(), Some("ok after all"));
        assert_eq!(course.average_rating(), 2.5);
    }

    #[test]
    fn average_is_rounded_to_one_decimal() {
        let mut course = course();
        assert_eq!(course.average_rating(), 0.0);

        course.upsert_review(review("a@x.io", 5, ""));
        course.upsert_review(review("b@x.io", 4, ""));
        course.upsert_review(review("c@x.io", 4, ""));
        assert_eq!(course.average_rating(), 4.3);
    }

    #[test]
    fn youtube_links_are_embedded() {
        let lesson = Lesson {
            title: "intro".to_string(),
            url: "https://www.youtube.com/watch?v=abc".to_string(),
        };
        assert_eq!(lesson.embed_url(), "https://www.youtube.com/embed/abc");

        let short = Lesson {
            title: "intro".to_string(),
            url: "https://youtu.be/abc".to_string(),
        };
        assert_eq!(short.embed_url(), "https://www.youtube.com/embed/abc");
    }

    #[test]
    fn progress_record_tolerates_missing_fields() {
        let record: ProgressRecord = serde_json::from_str(r#"{"currentLesson": -3}"#).unwrap();
        assert_eq!(record.phase, None);
        assert_eq!(record.current_lesson, -3);
        assert_eq!(record.correct_count, 0);
    }
}

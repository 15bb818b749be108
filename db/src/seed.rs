use super::{
    models::{Difficulty, Lesson, Quiz, Role},
    Database, NewCourse, NewFaq, NewUser, StoreError,
};

pub const DEMO_ADMIN: &str = "admin@learnly.dev";
pub const DEMO_INSTRUCTOR: &str = "instructor@learnly.dev";
pub const DEMO_STUDENT: &str = "student@learnly.dev";

/// Fills an empty store with a few accounts, a course and the FAQ, for local development
pub fn seed_db<D: Database>(db: &mut D) -> Result<(), StoreError> {
    db.seed(
        demo_users().into_iter(),
        demo_courses().into_iter(),
        demo_faqs().into_iter(),
    )
}

fn demo_users() -> Vec<NewUser> {
    vec![
        NewUser {
            email: DEMO_ADMIN.to_string(),
            name: "Admin User".to_string(),
            role: Role::Admin,
            photo_url: None,
        },
        NewUser {
            email: DEMO_INSTRUCTOR.to_string(),
            name: "Instructor User".to_string(),
            role: Role::Instructor,
            photo_url: None,
        },
        NewUser {
            email: DEMO_STUDENT.to_string(),
            name: "Student User".to_string(),
            role: Role::Student,
            photo_url: None,
        },
    ]
}

fn demo_courses() -> Vec<NewCourse> {
    vec![NewCourse {
        title: "Data Structures 101".to_string(),
        description: "Arrays, lists, stacks and queues from the ground up.".to_string(),
        instructor_email: DEMO_INSTRUCTOR.to_string(),
        difficulty: Difficulty::Beginner,
        categories: vec!["DSA".to_string(), "Algorithms".to_string()],
        lessons: vec![
            lesson("Arrays", "https://www.youtube.com/watch?v=QJNwK2uJyGs"),
            lesson("Linked lists", "https://youtu.be/R9PTBwOzceo"),
        ],
        quizzes: vec![
            quiz(
                "Which structure is LIFO?",
                ["Queue", "Stack", "Heap", "Tree"],
                "B",
            ),
            quiz(
                "Access by index in an array is",
                ["O(1)", "O(log n)", "O(n)", "O(n²)"],
                "A",
            ),
        ],
    }]
}

fn lesson(title: &str, url: &str) -> Lesson {
    Lesson {
        title: title.to_string(),
        url: url.to_string(),
    }
}

fn quiz(question: &str, options: [&str; 4], correct_answer: &str) -> Quiz {
    Quiz {
        question: question.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
        correct_answer: correct_answer.to_string(),
    }
}

fn demo_faqs() -> Vec<NewFaq> {
    vec![
        NewFaq {
            question: "How do I get a certificate?".to_string(),
            answer: "Finish every lesson and quiz of a course, then download it from the course page."
                .to_string(),
        },
        NewFaq {
            question: "Can I retake a quiz?".to_string(),
            answer: "No, each quiz is graded once. You can still review it after completing the course."
                .to_string(),
        },
    ]
}

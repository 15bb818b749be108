//! Course player: gates a student's way through the lessons then the quizzes of one course.
//!
//! Every operation here is pure. A transition hands back the next state without touching the
//! current one; the caller persists it and only then treats it as the student's progress.

use db::models::{Course, Phase, ProgressRecord};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Progress {
    pub phase: Phase,
    pub current_lesson: usize,
    pub current_quiz: usize,
    pub correct_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Completed,
    Current,
    Locked,
}

/// Outcome of an accepted submission
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    /// The item was already done, nothing changes
    Stale,
    Advanced(Progress),
    Completed { progress: Progress, mark: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    NoSuchItem,
    LessonLocked,
    QuizLocked,
    AnswerRequired,
    InvalidOption,
}

/// Percentage of right answers, rounded half up. A course without quizzes scores 100.
pub fn score(correct: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }

    let correct = correct.min(total);
    ((correct * 200 + total) / (total * 2)) as u8
}

fn initial_phase(course: &Course) -> Phase {
    if !course.lessons.is_empty() {
        Phase::Lessons
    } else if !course.quizzes.is_empty() {
        Phase::Quizzes
    } else {
        Phase::Done
    }
}

fn clamp_index(value: i64, len: usize) -> usize {
    let last = len.saturating_sub(1) as i64;
    value.max(0).min(last) as usize
}

impl Progress {
    pub fn start(course: &Course) -> Self {
        Self {
            phase: initial_phase(course),
            current_lesson: 0,
            current_quiz: 0,
            correct_count: 0,
        }
    }

    /// Rebuilds the state from what was last stored, pulling every value back into range.
    ///
    /// `completed` tells whether the store already holds a completion for this course, which
    /// wins over whatever the record says.
    pub fn resume(course: &Course, record: Option<&ProgressRecord>, completed: bool) -> Self {
        let finished;
        let record = match record {
            Some(record) => record,
            None if completed => {
                finished = ProgressRecord {
                    phase: Some(Phase::Done),
                    ..ProgressRecord::default()
                };
                &finished
            }
            None => return Self::start(course),
        };

        let quizzes = course.quizzes.len();

        let phase = if completed || record.phase == Some(Phase::Done) {
            Phase::Done
        } else if record.phase == Some(Phase::Quizzes) {
            if quizzes > 0 {
                Phase::Quizzes
            } else {
                Phase::Done
            }
        } else {
            initial_phase(course)
        };

        let current_lesson = clamp_index(record.current_lesson, course.lessons.len());
        let current_quiz = clamp_index(record.current_quiz, quizzes);

        // Cannot have more right answers than answered quizzes
        let answered = match phase {
            Phase::Lessons => 0,
            Phase::Quizzes => current_quiz,
            Phase::Done => quizzes,
        };
        let correct_count = record.correct_count.max(0).min(answered as i64) as usize;

        Self {
            phase,
            current_lesson,
            current_quiz,
            correct_count,
        }
    }

    pub fn to_record(&self) -> ProgressRecord {
        ProgressRecord {
            phase: Some(self.phase),
            current_lesson: self.current_lesson as i64,
            current_quiz: self.current_quiz as i64,
            correct_count: self.correct_count as i64,
        }
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Score this state stands for, once the course is done
    pub fn mark(&self, course: &Course) -> Option<u8> {
        if self.is_done() {
            Some(score(self.correct_count, course.quizzes.len()))
        } else {
            None
        }
    }

    pub fn can_open_lesson(&self, index: usize) -> bool {
        match self.phase {
            Phase::Lessons => index <= self.current_lesson,
            Phase::Quizzes | Phase::Done => true,
        }
    }

    pub fn can_open_quiz(&self, index: usize) -> bool {
        match self.phase {
            Phase::Lessons => false,
            Phase::Quizzes => index <= self.current_quiz,
            Phase::Done => true,
        }
    }

    pub fn lesson_status(&self, index: usize) -> ItemStatus {
        if self.phase != Phase::Lessons || index < self.current_lesson {
            ItemStatus::Completed
        } else if index == self.current_lesson {
            ItemStatus::Current
        } else {
            ItemStatus::Locked
        }
    }

    pub fn quiz_status(&self, index: usize) -> ItemStatus {
        match self.phase {
            Phase::Lessons => ItemStatus::Locked,
            Phase::Done => ItemStatus::Completed,
            Phase::Quizzes if index < self.current_quiz => ItemStatus::Completed,
            Phase::Quizzes if index == self.current_quiz => ItemStatus::Current,
            Phase::Quizzes => ItemStatus::Locked,
        }
    }

    pub fn check_lesson(&self, course: &Course, index: usize) -> Result<(), Refusal> {
        if index >= course.lessons.len() {
            Err(Refusal::NoSuchItem)
        } else if !self.can_open_lesson(index) {
            Err(Refusal::LessonLocked)
        } else {
            Ok(())
        }
    }

    pub fn check_quiz(&self, course: &Course, index: usize) -> Result<(), Refusal> {
        if index >= course.quizzes.len() {
            Err(Refusal::NoSuchItem)
        } else if !self.can_open_quiz(index) {
            Err(Refusal::QuizLocked)
        } else {
            Ok(())
        }
    }

    pub fn watch_lesson(&self, course: &Course, index: usize) -> Result<Step, Refusal> {
        self.check_lesson(course, index)?;

        if self.phase != Phase::Lessons || index != self.current_lesson {
            return Ok(Step::Stale);
        }

        let step = if index + 1 < course.lessons.len() {
            Step::Advanced(Self {
                current_lesson: index + 1,
                ..*self
            })
        } else if !course.quizzes.is_empty() {
            Step::Advanced(Self {
                phase: Phase::Quizzes,
                current_quiz: 0,
                ..*self
            })
        } else {
            self.finish(course, self.correct_count)
        };

        Ok(step)
    }

    /// Grades `option` (index into the quiz options) for the quiz at `index`
    pub fn answer_quiz(
        &self,
        course: &Course,
        index: usize,
        option: Option<usize>,
    ) -> Result<Step, Refusal> {
        self.check_quiz(course, index)?;

        if self.phase != Phase::Quizzes || index != self.current_quiz {
            return Ok(Step::Stale);
        }

        let option = option.ok_or(Refusal::AnswerRequired)?;
        let quiz = &course.quizzes[index];

        if option >= quiz.options.len() {
            return Err(Refusal::InvalidOption);
        }

        // A quiz without a valid designator has no right option
        let correct_count = if quiz.correct_index() == Some(option) {
            self.correct_count + 1
        } else {
            self.correct_count
        };

        let step = if index + 1 < course.quizzes.len() {
            Step::Advanced(Self {
                current_quiz: index + 1,
                correct_count,
                ..*self
            })
        } else {
            self.finish(course, correct_count)
        };

        Ok(step)
    }

    fn finish(&self, course: &Course, correct_count: usize) -> Step {
        let progress = Self {
            phase: Phase::Done,
            correct_count,
            ..*self
        };

        Step::Completed {
            progress,
            mark: score(correct_count, course.quizzes.len()),
        }
    }
}

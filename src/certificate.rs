use chrono::NaiveDate;

/// Inner width of the certificate frame, in characters
const WIDTH: usize = 62;

pub struct Certificate<'a> {
    pub student_name: &'a str,
    pub course_title: &'a str,
    pub completed_on: NaiveDate,
    pub score: u8,
    pub id: String,
}

/// `LEARNLY-{first 4 letters of the email's local part}-{last 4 digits of the course id}`
pub fn certificate_id(email: &str, course_id: u32) -> String {
    let local_part = email.split('@').next().unwrap_or_default();
    let name: String = if local_part.is_empty() {
        "USER".to_string()
    } else {
        local_part.chars().take(4).collect::<String>().to_uppercase()
    };

    let course = format!("{:04}", course_id);
    let course = &course[course.len() - 4..];

    format!("LEARNLY-{}-{}", name, course)
}

impl<'a> Certificate<'a> {
    pub fn file_name(&self) -> String {
        format!("{}.txt", self.id.to_lowercase())
    }

    /// Lays the certificate out as a framed, fixed-width text page
    pub fn render(&self) -> String {
        let border = format!("+{}+", "=".repeat(WIDTH));
        let mut lines = vec![border.clone(), blank()];

        lines.push(centered("L E A R N L Y"));
        lines.push(centered("Certificate of Completion"));
        lines.push(blank());
        lines.push(centered("This certifies that"));
        lines.extend(wrap(self.student_name, WIDTH - 4).iter().map(|l| centered(l)));
        lines.push(centered("has successfully completed the course"));
        lines.extend(wrap(self.course_title, WIDTH - 4).iter().map(|l| centered(l)));
        lines.push(blank());
        lines.push(split(
            &format!("Date: {}", self.completed_on.format("%Y-%m-%d")),
            &format!("Score: {}%", self.score),
        ));
        lines.push(split(&format!("Certificate ID: {}", self.id), ""));
        lines.push(blank());
        lines.push(border);

        let mut page = lines.join("\n");
        page.push('\n');
        page
    }
}

fn blank() -> String {
    format!("|{}|", " ".repeat(WIDTH))
}

fn centered(text: &str) -> String {
    let len = text.chars().count().min(WIDTH);
    let left = (WIDTH - len) / 2;
    let right = WIDTH - len - left;
    let text: String = text.chars().take(WIDTH).collect();
    format!("|{}{}{}|", " ".repeat(left), text, " ".repeat(right))
}

/// `left` against the left margin, `right` against the right one
fn split(left: &str, right: &str) -> String {
    let margin = 2;
    let used = left.chars().count() + right.chars().count() + 2 * margin;
    let gap = WIDTH.saturating_sub(used).max(1);
    let line = format!(
        "{}{}{}{}{}",
        " ".repeat(margin),
        left,
        " ".repeat(gap),
        right,
        " ".repeat(margin)
    );
    let line: String = line.chars().take(WIDTH).collect();
    let pad = WIDTH - line.chars().count();
    format!("|{}{}|", line, " ".repeat(pad))
}

/// Breaks `text` on whitespace into lines of at most `width` characters
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        // Words longer than a line are cut
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            lines.push(word.drain(..width).collect());
        }

        let word: String = word.into_iter().collect();
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };

        if needed > width {
            lines.push(std::mem::take(&mut current));
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }

    lines
}

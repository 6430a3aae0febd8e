use crate::error::{AppError, AppResult};

/// Rule for a required free-text field.
pub struct TextRule {
    pub label: &'static str,
    pub missing: &'static str,
    pub max_len: usize,
}

pub const QUESTION_TITLE: TextRule = TextRule {
    label: "Title",
    missing: "Please add a title",
    max_len: 200,
};

pub const QUESTION_BODY: TextRule = TextRule {
    label: "Question body",
    missing: "Please add a question body",
    max_len: 5000,
};

pub const ANSWER_BODY: TextRule = TextRule {
    label: "Answer",
    missing: "Please add an answer",
    max_len: 5000,
};

impl TextRule {
    /// Trim and length-check `input`. The text is stored as submitted, so code
    /// fragments like `Vec<String>` or `a && b` survive untouched.
    pub fn apply(&self, input: &str) -> AppResult<String> {
        let text = input.trim();
        if text.is_empty() {
            return Err(AppError::Validation(self.missing.to_string()));
        }
        if text.chars().count() > self.max_len {
            return Err(AppError::Validation(format!(
                "{} can not be more than {} characters",
                self.label, self.max_len
            )));
        }
        Ok(text.to_string())
    }
}

/// Trim tags, drop empty ones and duplicates, keeping first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|seen| seen == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_accepts_plain_text() {
        assert_eq!(QUESTION_TITLE.apply("  How do I?  ").unwrap(), "How do I?");
    }

    #[test]
    fn rejects_blank_and_oversized_text() {
        let err = QUESTION_TITLE.apply("   ").unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg == "Please add a title"));

        let long = "a".repeat(201);
        assert!(QUESTION_TITLE.apply(&long).is_err());
        assert!(QUESTION_BODY.apply(&long).is_ok());
    }

    #[test]
    fn code_text_is_kept_verbatim() {
        let title = QUESTION_TITLE
            .apply("How do I use Vec<String> with a && b?")
            .unwrap();
        assert_eq!(title, "How do I use Vec<String> with a && b?");

        let body = ANSWER_BODY.apply("  if a && b { x.push('<') }  ").unwrap();
        assert_eq!(body, "if a && b { x.push('<') }");
    }

    #[test]
    fn length_is_measured_on_the_submitted_text() {
        let brackets = "<".repeat(2000);
        assert_eq!(QUESTION_BODY.apply(&brackets).unwrap(), brackets);

        let at_limit = "&".repeat(5000);
        assert!(QUESTION_BODY.apply(&at_limit).is_ok());
        assert!(QUESTION_BODY.apply(&format!("{at_limit}&")).is_err());
    }

    #[test]
    fn tags_are_trimmed_and_deduplicated() {
        let tags = vec![
            " async ".to_string(),
            "".to_string(),
            "await".to_string(),
            "async".to_string(),
        ];
        assert_eq!(normalize_tags(&tags), vec!["async", "await"]);
    }

    #[test]
    fn tags_keep_symbols() {
        let tags = vec!["c++".to_string(), " Vec<T> ".to_string(), "a&b".to_string()];
        assert_eq!(normalize_tags(&tags), vec!["c++", "Vec<T>", "a&b"]);
    }
}

//! The content snapshot handed to the classifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The kind of post being moderated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostKind {
    /// A problem looking for solutions.
    Problem,
    /// A question looking for answers.
    #[default]
    Question,
    /// An idea open for discussion.
    Idea,
}

impl PostKind {
    /// Returns the wire name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Problem => "problem",
            Self::Question => "question",
            Self::Idea => "idea",
        }
    }

    /// Returns the path segment used in links to posts of this kind.
    #[must_use]
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::Problem => "problems",
            Self::Question => "questions",
            Self::Idea => "ideas",
        }
    }
}

impl fmt::Display for PostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who wrote the post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorKind {
    /// A human user account.
    #[default]
    Human,
    /// An AI agent account.
    Agent,
}

impl AuthorKind {
    /// Returns the wire name of the author kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Agent => "agent",
        }
    }
}

impl fmt::Display for AuthorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of a post taken when its pipeline starts.
///
/// Fields are private so a snapshot cannot change while a run is using it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationInput {
    post_id: Uuid,
    title: String,
    body: String,
    tags: Vec<String>,
    post_kind: PostKind,
    author_kind: AuthorKind,
    author_id: String,
}

impl ModerationInput {
    /// Creates a snapshot with no tags, authored by an anonymous human.
    #[must_use]
    pub fn new(post_id: Uuid, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            post_id,
            title: title.into(),
            body: body.into(),
            tags: Vec::new(),
            post_kind: PostKind::default(),
            author_kind: AuthorKind::default(),
            author_id: String::new(),
        }
    }

    /// Sets the tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the post kind.
    #[must_use]
    pub fn with_post_kind(mut self, kind: PostKind) -> Self {
        self.post_kind = kind;
        self
    }

    /// Sets the author.
    #[must_use]
    pub fn with_author(mut self, kind: AuthorKind, id: impl Into<String>) -> Self {
        self.author_kind = kind;
        self.author_id = id.into();
        self
    }

    /// The post being moderated.
    #[must_use]
    pub fn post_id(&self) -> Uuid {
        self.post_id
    }

    /// The post title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The post body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// The post tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// The post kind.
    #[must_use]
    pub fn post_kind(&self) -> PostKind {
        self.post_kind
    }

    /// The author kind.
    #[must_use]
    pub fn author_kind(&self) -> AuthorKind {
        self.author_kind
    }

    /// The author identifier.
    #[must_use]
    pub fn author_id(&self) -> &str {
        &self.author_id
    }

    /// Renders the text submitted to the classifier.
    #[must_use]
    pub fn prompt_text(&self) -> String {
        format!(
            "Title: {}\nDescription: {}\nTags: {}",
            self.title,
            self.body,
            self.tags.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_text() {
        let input = ModerationInput::new(Uuid::nil(), "Async in Go", "How do goroutines work?")
            .with_tags(["go", "concurrency"]);

        assert_eq!(
            input.prompt_text(),
            "Title: Async in Go\nDescription: How do goroutines work?\nTags: go, concurrency"
        );
    }

    #[test]
    fn test_prompt_text_without_tags() {
        let input = ModerationInput::new(Uuid::nil(), "t", "b");
        assert!(input.prompt_text().ends_with("Tags: "));
    }

    #[test]
    fn test_builder_sets_author() {
        let input = ModerationInput::new(Uuid::nil(), "t", "b")
            .with_post_kind(PostKind::Idea)
            .with_author(AuthorKind::Agent, "claude_assistant");

        assert_eq!(input.post_kind(), PostKind::Idea);
        assert_eq!(input.author_kind(), AuthorKind::Agent);
        assert_eq!(input.author_id(), "claude_assistant");
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(PostKind::Problem.to_string(), "problem");
        assert_eq!(PostKind::Question.path_segment(), "questions");
        assert_eq!(AuthorKind::Agent.to_string(), "agent");

        let json = serde_json::to_string(&PostKind::Idea).unwrap();
        assert_eq!(json, r#""idea""#);
    }
}

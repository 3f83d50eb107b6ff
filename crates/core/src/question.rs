use serde::{Deserialize, Serialize};

use crate::ids::*;
use crate::record::{RevisionMeta, Versioned};
use crate::CoreError;

/// The "question" part of a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub id: PromptId,
    pub prompt: String,
}

/// The "answer" part of an answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub id: AnswerId,
    pub answer: String,
}

/// The general form of a question a coop may answer. Suggested answers
/// are attached through an ordered join table in storage.
///
/// Questions are not versioned. A revised question gets a new row, so
/// nobody finds they answered a different question than they thought
/// they did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub prompt: PromptId,
    pub multiple_answers_ok: bool,
    pub free_text_answer_ok: bool,
    pub category: Option<CategoryId>,
}

/// An organizing strategy for questions. Categories form a tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionCategory {
    pub id: CategoryId,
    pub category: String,
    pub parent: Option<CategoryId>,
}

/// A coop's response to a Question, owned by the coop.
///
/// Answered questions are versioned. The chosen answers are part of the
/// versioned content (stored as one blob per row), so editing the
/// selection produces an archived copy of the previous selection too.
/// Whether a chosen answer must be one of the question's suggestions is
/// a UI concern, not enforced here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnsweredQuestionRecord {
    pub meta: RevisionMeta,
    pub question: QuestionId,
    /// Branch id of the owning coop.
    pub coop: RecordId,
    /// Display order within the coop's description.
    pub position: i64,
    pub answers: Vec<AnswerId>,
}

impl AnsweredQuestionRecord {
    pub fn new(
        question: QuestionId,
        coop: RecordId,
        position: i64,
        answers: Vec<AnswerId>,
        created_by: UserId,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            meta: RevisionMeta::new(created_by)?,
            question,
            coop,
            position,
            answers,
        })
    }
}

impl Versioned for AnsweredQuestionRecord {
    fn meta(&self) -> &RevisionMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RevisionMeta {
        &mut self.meta
    }
}

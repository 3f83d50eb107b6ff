pub mod error;

pub use error::EngineError;

use tracing::debug;

use coopdir_core::{
    contact::{ContactLabel, Email, PhoneNumber},
    coop::{CoopCategory, CoopRecord, CoopRelationship, DirectoryUser, Picture, RelationshipType},
    ids::*,
    question::{Answer, AnsweredQuestionRecord, Prompt, Question, QuestionCategory},
    record::Versioned,
    time::Timestamp,
};
use coopdir_storage::{RevisionStore, SqliteStorage, StorageError};

/// The directory facade the web layer talks to. Owns the storage
/// connection and implements the save-with-history protocol on top of
/// the row-level store primitives.
pub struct Directory {
    storage: SqliteStorage,
}

impl Directory {
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut SqliteStorage {
        &mut self.storage
    }

    /// Execute a batch SQL statement on the underlying connection, mapping errors.
    fn exec_batch(&self, sql: &str) -> Result<(), EngineError> {
        self.storage
            .conn()
            .execute_batch(sql)
            .map_err(|e| EngineError::Storage(StorageError::Sqlite(e)))
    }

    /// A COMMIT failure means the head update and its archive could not
    /// land as one unit; surface it as a transaction failure.
    fn commit_tx(&self) -> Result<(), EngineError> {
        self.storage
            .conn()
            .execute_batch("COMMIT")
            .map_err(|e| EngineError::Storage(StorageError::TransactionFailure(e.to_string())))
    }

    // ========================================================================
    // Versioning protocol
    // ========================================================================

    /// Persist a record, maintaining its revision history.
    ///
    /// A record without an id is established as its own branch at
    /// revision 0. A record with an id gets chained after the current
    /// head of its branch, regardless of which revision the caller
    /// originally loaded: the head row is rewritten in place with the new
    /// content, and the head's previous content is re-inserted as an
    /// archived row under a fresh id.
    ///
    /// Both writes happen inside one transaction. A concurrent save on
    /// the same branch makes the archive insert collide on
    /// UNIQUE (branch, revision); the loser's transaction rolls back and
    /// the `ConstraintViolation` reaches the caller, who may re-read the
    /// head and reapply its edits. No retry happens here.
    pub fn commit_revision<R>(&mut self, record: &mut R) -> Result<(), EngineError>
    where
        R: Versioned,
        SqliteStorage: RevisionStore<R>,
    {
        self.exec_batch("BEGIN IMMEDIATE")?;

        let result = (|| -> Result<(), EngineError> {
            match record.meta().id {
                None => {
                    // First save: establish the row, then point the branch
                    // at itself.
                    let id = self.storage.insert(record)?;
                    record.meta_mut().branch = Some(id);
                    self.storage.update(id, record)?;
                    debug!(branch = %id, "established branch");
                }
                Some(id) => {
                    let branch = record
                        .meta()
                        .branch
                        .ok_or_else(|| EngineError::MissingBranch(id.to_string()))?;
                    let latest: R = self.storage.get(branch)?;
                    let next_revision = latest.meta().revision + 1;

                    // Chain after the current head even if the caller was
                    // editing an older revision.
                    record.meta_mut().id = Some(branch);
                    record.meta_mut().branch = Some(branch);
                    record.meta_mut().revision = next_revision;
                    record.meta_mut().created_at = Timestamp::now()?;
                    self.storage.update(branch, record)?;

                    // Relocate the previous head content into an archived
                    // row. Must come after the head rewrite, or the old
                    // revision number would collide with itself.
                    let mut archived = latest;
                    archived.meta_mut().id = None;
                    self.storage.insert(&mut archived)?;
                    debug!(branch = %branch, revision = next_revision, "committed revision");
                }
            }
            Ok(())
        })();

        match result {
            Ok(()) => {
                self.commit_tx()?;
                Ok(())
            }
            Err(e) => {
                let _ = self.exec_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    // ========================================================================
    // Query surface
    // ========================================================================

    /// The head row for a branch. By invariant it always holds the
    /// highest revision's content.
    pub fn current<R>(&self, branch: RecordId) -> Result<R, EngineError>
    where
        R: Versioned,
        SqliteStorage: RevisionStore<R>,
    {
        Ok(self.storage.get(branch)?)
    }

    /// Every revision of a branch, head included, ascending by revision.
    pub fn history<R>(&self, branch: RecordId) -> Result<Vec<R>, EngineError>
    where
        R: Versioned,
        SqliteStorage: RevisionStore<R>,
    {
        let rows: Vec<R> = self.storage.find_by_branch(branch)?;
        if rows.is_empty() {
            return Err(EngineError::Storage(StorageError::NotFound(format!(
                "branch {branch}"
            ))));
        }
        Ok(rows)
    }

    pub fn latest_revision_number<R>(&self, branch: RecordId) -> Result<u32, EngineError>
    where
        R: Versioned,
        SqliteStorage: RevisionStore<R>,
    {
        let head: R = self.storage.get(branch)?;
        Ok(head.meta().revision)
    }

    // ========================================================================
    // Coops
    // ========================================================================

    /// Create a coop and establish its branch. Returns the record with
    /// id, branch, and revision 0 filled in.
    pub fn create_coop(
        &mut self,
        name: &str,
        created_by: UserId,
    ) -> Result<CoopRecord, EngineError> {
        let mut record = CoopRecord::new(name, created_by)?;
        self.commit_revision(&mut record)?;
        debug!(name, branch = ?record.meta.branch, "created coop");
        Ok(record)
    }

    /// Head rows only, ordered by name.
    pub fn list_coops(&self) -> Result<Vec<CoopRecord>, EngineError> {
        Ok(self.storage.list_coop_heads()?)
    }

    // ========================================================================
    // Answered questions
    // ========================================================================

    /// Record a coop's answer to a question and establish its branch.
    pub fn answer_question(
        &mut self,
        coop: RecordId,
        question: QuestionId,
        answers: Vec<AnswerId>,
        position: i64,
        created_by: UserId,
    ) -> Result<AnsweredQuestionRecord, EngineError> {
        let mut record =
            AnsweredQuestionRecord::new(question, coop, position, answers, created_by)?;
        self.commit_revision(&mut record)?;
        Ok(record)
    }

    /// Current answers for a coop, in display order. Heads only.
    pub fn answered_questions_for(
        &self,
        coop: RecordId,
    ) -> Result<Vec<AnsweredQuestionRecord>, EngineError> {
        Ok(self.storage.answered_question_heads_for(coop)?)
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub fn create_user(
        &mut self,
        display_name: &str,
        contactable: Option<ContactId>,
    ) -> Result<UserId, EngineError> {
        let user = DirectoryUser {
            id: UserId::new(),
            display_name: display_name.to_string(),
            contactable,
        };
        self.storage.insert_user(&user)?;
        Ok(user.id)
    }

    pub fn get_user(&self, id: UserId) -> Result<DirectoryUser, EngineError> {
        Ok(self.storage.get_user(id)?)
    }

    // ========================================================================
    // Question catalog
    // ========================================================================

    pub fn create_prompt(&mut self, text: &str) -> Result<PromptId, EngineError> {
        let prompt = Prompt {
            id: PromptId::new(),
            prompt: text.to_string(),
        };
        self.storage.insert_prompt(&prompt)?;
        Ok(prompt.id)
    }

    pub fn create_answer(&mut self, text: &str) -> Result<AnswerId, EngineError> {
        let answer = Answer {
            id: AnswerId::new(),
            answer: text.to_string(),
        };
        self.storage.insert_answer(&answer)?;
        Ok(answer.id)
    }

    /// Create a question with its suggested answers in the given order.
    /// One transaction: either the question lands with all its answers
    /// attached, or nothing does.
    pub fn create_question(
        &mut self,
        prompt: PromptId,
        multiple_answers_ok: bool,
        free_text_answer_ok: bool,
        category: Option<CategoryId>,
        answers: &[AnswerId],
    ) -> Result<QuestionId, EngineError> {
        let question = Question {
            id: QuestionId::new(),
            prompt,
            multiple_answers_ok,
            free_text_answer_ok,
            category,
        };

        self.exec_batch("BEGIN IMMEDIATE")?;
        let result = (|| -> Result<(), EngineError> {
            self.storage.insert_question(&question)?;
            for (position, answer) in answers.iter().enumerate() {
                self.storage
                    .attach_suggested_answer(question.id, *answer, position as i64)?;
            }
            Ok(())
        })();

        match result {
            Ok(()) => {
                self.commit_tx()?;
                debug!(question = %question.id, answers = answers.len(), "created question");
                Ok(question.id)
            }
            Err(e) => {
                let _ = self.exec_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    pub fn get_question(&self, id: QuestionId) -> Result<Question, EngineError> {
        Ok(self.storage.get_question(id)?)
    }

    pub fn list_questions(&self) -> Result<Vec<Question>, EngineError> {
        Ok(self.storage.list_questions()?)
    }

    pub fn suggested_answers(&self, question: QuestionId) -> Result<Vec<Answer>, EngineError> {
        Ok(self.storage.suggested_answers(question)?)
    }

    pub fn get_prompt(&self, id: PromptId) -> Result<Prompt, EngineError> {
        Ok(self.storage.get_prompt(id)?)
    }

    pub fn get_answer(&self, id: AnswerId) -> Result<Answer, EngineError> {
        Ok(self.storage.get_answer(id)?)
    }

    pub fn create_question_category(
        &mut self,
        name: &str,
        parent: Option<CategoryId>,
    ) -> Result<CategoryId, EngineError> {
        let category = QuestionCategory {
            id: CategoryId::new(),
            category: name.to_string(),
            parent,
        };
        self.storage.insert_question_category(&category)?;
        Ok(category.id)
    }

    pub fn get_question_category(&self, id: CategoryId) -> Result<QuestionCategory, EngineError> {
        Ok(self.storage.get_question_category(id)?)
    }

    // ========================================================================
    // Contact methods
    // ========================================================================

    pub fn create_contactable(&mut self) -> Result<ContactId, EngineError> {
        let id = ContactId::new();
        self.storage.insert_contactable(id)?;
        Ok(id)
    }

    pub fn create_contact_label(&mut self, label: &str, rank: u16) -> Result<LabelId, EngineError> {
        let label = ContactLabel {
            id: LabelId::new(),
            label: label.to_string(),
            rank,
        };
        self.storage.insert_contact_label(&label)?;
        Ok(label.id)
    }

    pub fn get_contact_label(&self, id: LabelId) -> Result<ContactLabel, EngineError> {
        Ok(self.storage.get_contact_label(id)?)
    }

    pub fn add_email(
        &mut self,
        contactable: ContactId,
        label: LabelId,
        address: &str,
        description: &str,
    ) -> Result<EmailId, EngineError> {
        let email = Email {
            id: EmailId::new(),
            contactable,
            label,
            address: address.to_string(),
            description: description.to_string(),
            created_at: Timestamp::now()?,
        };
        self.storage.insert_email(&email)?;
        Ok(email.id)
    }

    pub fn add_phone_number(
        &mut self,
        contactable: ContactId,
        label: LabelId,
        number: &str,
        description: &str,
    ) -> Result<PhoneId, EngineError> {
        let phone = PhoneNumber {
            id: PhoneId::new(),
            contactable,
            label,
            number: number.to_string(),
            description: description.to_string(),
            created_at: Timestamp::now()?,
        };
        self.storage.insert_phone_number(&phone)?;
        Ok(phone.id)
    }

    pub fn emails_for(&self, contactable: ContactId) -> Result<Vec<Email>, EngineError> {
        Ok(self.storage.emails_for(contactable)?)
    }

    pub fn phone_numbers_for(
        &self,
        contactable: ContactId,
    ) -> Result<Vec<PhoneNumber>, EngineError> {
        Ok(self.storage.phone_numbers_for(contactable)?)
    }

    // ========================================================================
    // Pictures
    // ========================================================================

    pub fn create_picture(&mut self, path: &str, stock: bool) -> Result<PictureId, EngineError> {
        let picture = Picture {
            id: PictureId::new(),
            stock,
            path: path.to_string(),
        };
        self.storage.insert_picture(&picture)?;
        Ok(picture.id)
    }

    pub fn get_picture(&self, id: PictureId) -> Result<Picture, EngineError> {
        Ok(self.storage.get_picture(id)?)
    }

    // ========================================================================
    // Coop categories and relationships
    // ========================================================================

    pub fn create_coop_category(&mut self, name: &str) -> Result<CoopCategoryId, EngineError> {
        let category = CoopCategory {
            id: CoopCategoryId::new(),
            category: name.to_string(),
        };
        self.storage.insert_coop_category(&category)?;
        Ok(category.id)
    }

    pub fn assign_category(
        &mut self,
        coop: RecordId,
        category: CoopCategoryId,
    ) -> Result<(), EngineError> {
        Ok(self.storage.link_coop_category(coop, category)?)
    }

    pub fn categories_for(&self, coop: RecordId) -> Result<Vec<CoopCategory>, EngineError> {
        Ok(self.storage.categories_for(coop)?)
    }

    pub fn create_relationship_type(
        &mut self,
        name: &str,
    ) -> Result<RelationshipTypeId, EngineError> {
        let rel_type = RelationshipType {
            id: RelationshipTypeId::new(),
            name: name.to_string(),
        };
        self.storage.insert_relationship_type(&rel_type)?;
        Ok(rel_type.id)
    }

    /// Relate two coops by their branch ids, so the relationship keeps
    /// pointing at each coop's current head as they are revised.
    pub fn relate_coops(
        &mut self,
        from: RecordId,
        to: RecordId,
        relationship_type: RelationshipTypeId,
    ) -> Result<(), EngineError> {
        let rel = CoopRelationship {
            from_coop: from,
            to_coop: to,
            relationship_type,
        };
        Ok(self.storage.insert_relationship(&rel)?)
    }

    pub fn relationships_of(&self, coop: RecordId) -> Result<Vec<CoopRelationship>, EngineError> {
        Ok(self.storage.relationships_from(coop)?)
    }
}

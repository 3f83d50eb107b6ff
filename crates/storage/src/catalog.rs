//! Plain, non-versioned directory records: users, the question catalog,
//! contact methods, pictures, categories, and coop relationships.

use coopdir_core::{
    contact::{ContactLabel, Email, PhoneNumber},
    coop::{CoopCategory, CoopRelationship, DirectoryUser, Picture, RelationshipType},
    ids::*,
    question::{Answer, Prompt, Question, QuestionCategory},
    time::Timestamp,
};

use crate::error::StorageError;
use crate::sqlite::{to_array, SqliteStorage};

fn map_constraint(e: rusqlite::Error, what: &str) -> StorageError {
    match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StorageError::ConstraintViolation(what.to_string())
        }
        e => StorageError::Sqlite(e),
    }
}

impl SqliteStorage {
    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub fn insert_user(&mut self, user: &DirectoryUser) -> Result<(), StorageError> {
        self.conn().execute(
            "INSERT INTO users (id, display_name, contactable_id) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                user.id.as_bytes().as_slice(),
                user.display_name,
                user.contactable.map(|c| c.as_bytes().to_vec()),
            ],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: UserId) -> Result<DirectoryUser, StorageError> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id, display_name, contactable_id FROM users WHERE id = ?1")?;
        let mut rows = stmt.query(rusqlite::params![id.as_bytes().as_slice()])?;
        match rows.next()? {
            Some(row) => {
                let id_bytes: Vec<u8> = row.get(0)?;
                let display_name: String = row.get(1)?;
                let contactable: Option<Vec<u8>> = row.get(2)?;
                Ok(DirectoryUser {
                    id: UserId::from_bytes(to_array::<16>(id_bytes, "user id")?),
                    display_name,
                    contactable: contactable
                        .map(|b| to_array::<16>(b, "contactable_id").map(ContactId::from_bytes))
                        .transpose()?,
                })
            }
            None => Err(StorageError::NotFound(format!("user {id}"))),
        }
    }

    // ------------------------------------------------------------------
    // Question catalog
    // ------------------------------------------------------------------

    pub fn insert_prompt(&mut self, prompt: &Prompt) -> Result<(), StorageError> {
        self.conn().execute(
            "INSERT INTO prompts (id, prompt) VALUES (?1, ?2)",
            rusqlite::params![prompt.id.as_bytes().as_slice(), prompt.prompt],
        )?;
        Ok(())
    }

    pub fn get_prompt(&self, id: PromptId) -> Result<Prompt, StorageError> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id, prompt FROM prompts WHERE id = ?1")?;
        let mut rows = stmt.query(rusqlite::params![id.as_bytes().as_slice()])?;
        match rows.next()? {
            Some(row) => {
                let id_bytes: Vec<u8> = row.get(0)?;
                let prompt: String = row.get(1)?;
                Ok(Prompt {
                    id: PromptId::from_bytes(to_array::<16>(id_bytes, "prompt id")?),
                    prompt,
                })
            }
            None => Err(StorageError::NotFound(format!("prompt {id}"))),
        }
    }

    pub fn insert_answer(&mut self, answer: &Answer) -> Result<(), StorageError> {
        self.conn().execute(
            "INSERT INTO answers (id, answer) VALUES (?1, ?2)",
            rusqlite::params![answer.id.as_bytes().as_slice(), answer.answer],
        )?;
        Ok(())
    }

    pub fn get_answer(&self, id: AnswerId) -> Result<Answer, StorageError> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id, answer FROM answers WHERE id = ?1")?;
        let mut rows = stmt.query(rusqlite::params![id.as_bytes().as_slice()])?;
        match rows.next()? {
            Some(row) => {
                let id_bytes: Vec<u8> = row.get(0)?;
                let answer: String = row.get(1)?;
                Ok(Answer {
                    id: AnswerId::from_bytes(to_array::<16>(id_bytes, "answer id")?),
                    answer,
                })
            }
            None => Err(StorageError::NotFound(format!("answer {id}"))),
        }
    }

    pub fn insert_question(&mut self, question: &Question) -> Result<(), StorageError> {
        self.conn().execute(
            "INSERT INTO questions (id, prompt_id, multiple_answers_ok, free_text_answer_ok, category_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                question.id.as_bytes().as_slice(),
                question.prompt.as_bytes().as_slice(),
                question.multiple_answers_ok,
                question.free_text_answer_ok,
                question.category.map(|c| c.as_bytes().to_vec()),
            ],
        )?;
        Ok(())
    }

    pub fn get_question(&self, id: QuestionId) -> Result<Question, StorageError> {
        let mut stmt = self.conn().prepare(
            "SELECT id, prompt_id, multiple_answers_ok, free_text_answer_ok, category_id
             FROM questions WHERE id = ?1",
        )?;
        let mut rows = stmt.query(rusqlite::params![id.as_bytes().as_slice()])?;
        match rows.next()? {
            Some(row) => read_question(row),
            None => Err(StorageError::NotFound(format!("question {id}"))),
        }
    }

    pub fn list_questions(&self) -> Result<Vec<Question>, StorageError> {
        let mut stmt = self.conn().prepare(
            "SELECT id, prompt_id, multiple_answers_ok, free_text_answer_ok, category_id
             FROM questions",
        )?;
        let mut rows = stmt.query([])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            result.push(read_question(row)?);
        }
        Ok(result)
    }

    /// Attach a suggested answer at a position. UNIQUE (question, position)
    /// keeps the suggestion order unambiguous.
    pub fn attach_suggested_answer(
        &mut self,
        question: QuestionId,
        answer: AnswerId,
        position: i64,
    ) -> Result<(), StorageError> {
        self.conn()
            .execute(
                "INSERT INTO question_answers (question_id, answer_id, position) VALUES (?1, ?2, ?3)",
                rusqlite::params![
                    question.as_bytes().as_slice(),
                    answer.as_bytes().as_slice(),
                    position,
                ],
            )
            .map_err(|e| {
                map_constraint(
                    e,
                    &format!("question {question} already has an answer at position {position}"),
                )
            })?;
        Ok(())
    }

    /// Suggested answers for a question, in suggestion order.
    pub fn suggested_answers(&self, question: QuestionId) -> Result<Vec<Answer>, StorageError> {
        let mut stmt = self.conn().prepare(
            "SELECT a.id, a.answer FROM answers a
             JOIN question_answers qa ON qa.answer_id = a.id
             WHERE qa.question_id = ?1 ORDER BY qa.position",
        )?;
        let mut rows = stmt.query(rusqlite::params![question.as_bytes().as_slice()])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let id_bytes: Vec<u8> = row.get(0)?;
            let answer: String = row.get(1)?;
            result.push(Answer {
                id: AnswerId::from_bytes(to_array::<16>(id_bytes, "answer id")?),
                answer,
            });
        }
        Ok(result)
    }

    pub fn insert_question_category(
        &mut self,
        category: &QuestionCategory,
    ) -> Result<(), StorageError> {
        self.conn().execute(
            "INSERT INTO question_categories (id, category, parent_id) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                category.id.as_bytes().as_slice(),
                category.category,
                category.parent.map(|p| p.as_bytes().to_vec()),
            ],
        )?;
        Ok(())
    }

    pub fn get_question_category(
        &self,
        id: CategoryId,
    ) -> Result<QuestionCategory, StorageError> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id, category, parent_id FROM question_categories WHERE id = ?1")?;
        let mut rows = stmt.query(rusqlite::params![id.as_bytes().as_slice()])?;
        match rows.next()? {
            Some(row) => {
                let id_bytes: Vec<u8> = row.get(0)?;
                let category: String = row.get(1)?;
                let parent: Option<Vec<u8>> = row.get(2)?;
                Ok(QuestionCategory {
                    id: CategoryId::from_bytes(to_array::<16>(id_bytes, "category id")?),
                    category,
                    parent: parent
                        .map(|b| to_array::<16>(b, "parent_id").map(CategoryId::from_bytes))
                        .transpose()?,
                })
            }
            None => Err(StorageError::NotFound(format!("question category {id}"))),
        }
    }

    // ------------------------------------------------------------------
    // Contact methods
    // ------------------------------------------------------------------

    pub fn insert_contactable(&mut self, id: ContactId) -> Result<(), StorageError> {
        self.conn().execute(
            "INSERT INTO contactables (id) VALUES (?1)",
            rusqlite::params![id.as_bytes().as_slice()],
        )?;
        Ok(())
    }

    pub fn insert_contact_label(&mut self, label: &ContactLabel) -> Result<(), StorageError> {
        self.conn().execute(
            "INSERT INTO contact_labels (id, label, rank) VALUES (?1, ?2, ?3)",
            rusqlite::params![label.id.as_bytes().as_slice(), label.label, label.rank],
        )?;
        Ok(())
    }

    pub fn get_contact_label(&self, id: LabelId) -> Result<ContactLabel, StorageError> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id, label, rank FROM contact_labels WHERE id = ?1")?;
        let mut rows = stmt.query(rusqlite::params![id.as_bytes().as_slice()])?;
        match rows.next()? {
            Some(row) => {
                let id_bytes: Vec<u8> = row.get(0)?;
                let label: String = row.get(1)?;
                let rank: i64 = row.get(2)?;
                Ok(ContactLabel {
                    id: LabelId::from_bytes(to_array::<16>(id_bytes, "label id")?),
                    label,
                    rank: rank as u16,
                })
            }
            None => Err(StorageError::NotFound(format!("contact label {id}"))),
        }
    }

    pub fn insert_email(&mut self, email: &Email) -> Result<(), StorageError> {
        self.conn().execute(
            "INSERT INTO emails (id, contactable_id, label_id, address, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                email.id.as_bytes().as_slice(),
                email.contactable.as_bytes().as_slice(),
                email.label.as_bytes().as_slice(),
                email.address,
                email.description,
                email.created_at.as_millis(),
            ],
        )?;
        Ok(())
    }

    pub fn emails_for(&self, contactable: ContactId) -> Result<Vec<Email>, StorageError> {
        let mut stmt = self.conn().prepare(
            "SELECT id, contactable_id, label_id, address, description, created_at
             FROM emails WHERE contactable_id = ?1 ORDER BY created_at",
        )?;
        let mut rows = stmt.query(rusqlite::params![contactable.as_bytes().as_slice()])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let id_bytes: Vec<u8> = row.get(0)?;
            let contactable_bytes: Vec<u8> = row.get(1)?;
            let label_bytes: Vec<u8> = row.get(2)?;
            let address: String = row.get(3)?;
            let description: String = row.get(4)?;
            let created_at: i64 = row.get(5)?;
            result.push(Email {
                id: EmailId::from_bytes(to_array::<16>(id_bytes, "email id")?),
                contactable: ContactId::from_bytes(to_array::<16>(
                    contactable_bytes,
                    "contactable_id",
                )?),
                label: LabelId::from_bytes(to_array::<16>(label_bytes, "label_id")?),
                address,
                description,
                created_at: Timestamp::from_millis(created_at),
            });
        }
        Ok(result)
    }

    pub fn insert_phone_number(&mut self, phone: &PhoneNumber) -> Result<(), StorageError> {
        self.conn().execute(
            "INSERT INTO phone_numbers (id, contactable_id, label_id, number, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                phone.id.as_bytes().as_slice(),
                phone.contactable.as_bytes().as_slice(),
                phone.label.as_bytes().as_slice(),
                phone.number,
                phone.description,
                phone.created_at.as_millis(),
            ],
        )?;
        Ok(())
    }

    pub fn phone_numbers_for(
        &self,
        contactable: ContactId,
    ) -> Result<Vec<PhoneNumber>, StorageError> {
        let mut stmt = self.conn().prepare(
            "SELECT id, contactable_id, label_id, number, description, created_at
             FROM phone_numbers WHERE contactable_id = ?1 ORDER BY created_at",
        )?;
        let mut rows = stmt.query(rusqlite::params![contactable.as_bytes().as_slice()])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let id_bytes: Vec<u8> = row.get(0)?;
            let contactable_bytes: Vec<u8> = row.get(1)?;
            let label_bytes: Vec<u8> = row.get(2)?;
            let number: String = row.get(3)?;
            let description: String = row.get(4)?;
            let created_at: i64 = row.get(5)?;
            result.push(PhoneNumber {
                id: PhoneId::from_bytes(to_array::<16>(id_bytes, "phone id")?),
                contactable: ContactId::from_bytes(to_array::<16>(
                    contactable_bytes,
                    "contactable_id",
                )?),
                label: LabelId::from_bytes(to_array::<16>(label_bytes, "label_id")?),
                number,
                description,
                created_at: Timestamp::from_millis(created_at),
            });
        }
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Pictures
    // ------------------------------------------------------------------

    pub fn insert_picture(&mut self, picture: &Picture) -> Result<(), StorageError> {
        self.conn().execute(
            "INSERT INTO pictures (id, stock, path) VALUES (?1, ?2, ?3)",
            rusqlite::params![picture.id.as_bytes().as_slice(), picture.stock, picture.path],
        )?;
        Ok(())
    }

    pub fn get_picture(&self, id: PictureId) -> Result<Picture, StorageError> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id, stock, path FROM pictures WHERE id = ?1")?;
        let mut rows = stmt.query(rusqlite::params![id.as_bytes().as_slice()])?;
        match rows.next()? {
            Some(row) => {
                let id_bytes: Vec<u8> = row.get(0)?;
                let stock: bool = row.get(1)?;
                let path: String = row.get(2)?;
                Ok(Picture {
                    id: PictureId::from_bytes(to_array::<16>(id_bytes, "picture id")?),
                    stock,
                    path,
                })
            }
            None => Err(StorageError::NotFound(format!("picture {id}"))),
        }
    }

    // ------------------------------------------------------------------
    // Coop categories
    // ------------------------------------------------------------------

    pub fn insert_coop_category(&mut self, category: &CoopCategory) -> Result<(), StorageError> {
        self.conn().execute(
            "INSERT INTO coop_categories (id, category) VALUES (?1, ?2)",
            rusqlite::params![category.id.as_bytes().as_slice(), category.category],
        )?;
        Ok(())
    }

    /// Link a coop branch to a category. Idempotence is not provided; a
    /// duplicate link surfaces as a constraint violation.
    pub fn link_coop_category(
        &mut self,
        coop: RecordId,
        category: CoopCategoryId,
    ) -> Result<(), StorageError> {
        self.conn()
            .execute(
                "INSERT INTO coop_category_links (coop_id, category_id) VALUES (?1, ?2)",
                rusqlite::params![coop.as_bytes().as_slice(), category.as_bytes().as_slice()],
            )
            .map_err(|e| {
                map_constraint(e, &format!("coop {coop} already linked to category {category}"))
            })?;
        Ok(())
    }

    pub fn categories_for(&self, coop: RecordId) -> Result<Vec<CoopCategory>, StorageError> {
        let mut stmt = self.conn().prepare(
            "SELECT c.id, c.category FROM coop_categories c
             JOIN coop_category_links l ON l.category_id = c.id
             WHERE l.coop_id = ?1 ORDER BY c.category",
        )?;
        let mut rows = stmt.query(rusqlite::params![coop.as_bytes().as_slice()])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let id_bytes: Vec<u8> = row.get(0)?;
            let category: String = row.get(1)?;
            result.push(CoopCategory {
                id: CoopCategoryId::from_bytes(to_array::<16>(id_bytes, "category id")?),
                category,
            });
        }
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Relationships
    // ------------------------------------------------------------------

    pub fn insert_relationship_type(
        &mut self,
        rel_type: &RelationshipType,
    ) -> Result<(), StorageError> {
        self.conn().execute(
            "INSERT INTO relationship_types (id, name) VALUES (?1, ?2)",
            rusqlite::params![rel_type.id.as_bytes().as_slice(), rel_type.name],
        )?;
        Ok(())
    }

    pub fn insert_relationship(&mut self, rel: &CoopRelationship) -> Result<(), StorageError> {
        self.conn()
            .execute(
                "INSERT INTO coop_relationships (from_coop, to_coop, relationship_type)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![
                    rel.from_coop.as_bytes().as_slice(),
                    rel.to_coop.as_bytes().as_slice(),
                    rel.relationship_type.as_bytes().as_slice(),
                ],
            )
            .map_err(|e| {
                map_constraint(
                    e,
                    &format!("relationship {} -> {} already exists", rel.from_coop, rel.to_coop),
                )
            })?;
        Ok(())
    }

    pub fn relationships_from(
        &self,
        coop: RecordId,
    ) -> Result<Vec<CoopRelationship>, StorageError> {
        let mut stmt = self.conn().prepare(
            "SELECT from_coop, to_coop, relationship_type
             FROM coop_relationships WHERE from_coop = ?1",
        )?;
        let mut rows = stmt.query(rusqlite::params![coop.as_bytes().as_slice()])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let from_bytes: Vec<u8> = row.get(0)?;
            let to_bytes: Vec<u8> = row.get(1)?;
            let type_bytes: Vec<u8> = row.get(2)?;
            result.push(CoopRelationship {
                from_coop: RecordId::from_bytes(to_array::<16>(from_bytes, "from_coop")?),
                to_coop: RecordId::from_bytes(to_array::<16>(to_bytes, "to_coop")?),
                relationship_type: RelationshipTypeId::from_bytes(to_array::<16>(
                    type_bytes,
                    "relationship_type",
                )?),
            });
        }
        Ok(result)
    }
}

fn read_question(row: &rusqlite::Row) -> Result<Question, StorageError> {
    let id_bytes: Vec<u8> = row.get(0)?;
    let prompt_bytes: Vec<u8> = row.get(1)?;
    let multiple_answers_ok: bool = row.get(2)?;
    let free_text_answer_ok: bool = row.get(3)?;
    let category: Option<Vec<u8>> = row.get(4)?;
    Ok(Question {
        id: QuestionId::from_bytes(to_array::<16>(id_bytes, "question id")?),
        prompt: PromptId::from_bytes(to_array::<16>(prompt_bytes, "prompt_id")?),
        multiple_answers_ok,
        free_text_answer_ok,
        category: category
            .map(|b| to_array::<16>(b, "category_id").map(CategoryId::from_bytes))
            .transpose()?,
    })
}

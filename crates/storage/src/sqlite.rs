use rusqlite::Connection;
use tracing::debug;

use coopdir_core::{
    coop::CoopRecord,
    ids::*,
    question::AnsweredQuestionRecord,
    record::RevisionMeta,
    time::Timestamp,
};

use crate::error::StorageError;
use crate::traits::RevisionStore;

/// Convert Vec<u8> to fixed-size array with proper error handling.
pub(crate) fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Head rows only (id == branch), ordered by name. What a directory
    /// listing shows.
    pub fn list_coop_heads(&self) -> Result<Vec<CoopRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, branch, revision, created_by, created_at, name, picture_id, contactable_id
             FROM coops WHERE id = branch ORDER BY name",
        )?;
        let mut rows = stmt.query([])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            result.push(read_coop(row)?);
        }
        Ok(result)
    }

    /// Current answered questions for a coop branch, in display order.
    pub fn answered_question_heads_for(
        &self,
        coop: RecordId,
    ) -> Result<Vec<AnsweredQuestionRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, branch, revision, created_by, created_at, question_id, coop_id, position, answers
             FROM answered_questions WHERE id = branch AND coop_id = ?1 ORDER BY position",
        )?;
        let mut rows = stmt.query(rusqlite::params![coop.as_bytes().as_slice()])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            result.push(read_answered(row)?);
        }
        Ok(result)
    }
}

/// Shared revision columns are laid out identically in every versioned
/// table: id, branch, revision, created_by, created_at at indices 0..=4.
fn read_meta(row: &rusqlite::Row) -> Result<RevisionMeta, StorageError> {
    let id_bytes: Vec<u8> = row.get(0)?;
    let branch_bytes: Option<Vec<u8>> = row.get(1)?;
    let revision: i64 = row.get(2)?;
    let created_by_bytes: Vec<u8> = row.get(3)?;
    let created_at: i64 = row.get(4)?;

    Ok(RevisionMeta {
        id: Some(RecordId::from_bytes(to_array::<16>(id_bytes, "id")?)),
        branch: branch_bytes
            .map(|b| to_array::<16>(b, "branch").map(RecordId::from_bytes))
            .transpose()?,
        revision: revision as u32,
        created_by: UserId::from_bytes(to_array::<16>(created_by_bytes, "created_by")?),
        created_at: Timestamp::from_millis(created_at),
    })
}

fn read_coop(row: &rusqlite::Row) -> Result<CoopRecord, StorageError> {
    let meta = read_meta(row)?;
    let name: String = row.get(5)?;
    let picture_bytes: Option<Vec<u8>> = row.get(6)?;
    let contactable_bytes: Option<Vec<u8>> = row.get(7)?;

    Ok(CoopRecord {
        meta,
        name,
        picture: picture_bytes
            .map(|b| to_array::<16>(b, "picture_id").map(PictureId::from_bytes))
            .transpose()?,
        contactable: contactable_bytes
            .map(|b| to_array::<16>(b, "contactable_id").map(ContactId::from_bytes))
            .transpose()?,
    })
}

fn read_answered(row: &rusqlite::Row) -> Result<AnsweredQuestionRecord, StorageError> {
    let meta = read_meta(row)?;
    let question_bytes: Vec<u8> = row.get(5)?;
    let coop_bytes: Vec<u8> = row.get(6)?;
    let position: i64 = row.get(7)?;
    let answers_blob: Vec<u8> = row.get(8)?;

    let answers: Vec<AnswerId> = rmp_serde::from_slice(&answers_blob)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;

    Ok(AnsweredQuestionRecord {
        meta,
        question: QuestionId::from_bytes(to_array::<16>(question_bytes, "question_id")?),
        coop: RecordId::from_bytes(to_array::<16>(coop_bytes, "coop_id")?),
        position,
        answers,
    })
}

/// Map a uniqueness failure on (branch, revision) to the retryable
/// conflict error; everything else passes through. Applies to both
/// inserts and head rewrites, which race on the same unique index.
fn map_revision_conflict(e: rusqlite::Error, table: &str, meta: &RevisionMeta) -> StorageError {
    match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            let branch = meta
                .branch
                .map(|b| b.to_string())
                .unwrap_or_else(|| "unset".to_string());
            StorageError::ConstraintViolation(format!(
                "{table}: branch {branch} revision {} already exists",
                meta.revision
            ))
        }
        e => StorageError::Sqlite(e),
    }
}

impl RevisionStore<CoopRecord> for SqliteStorage {
    fn insert(&mut self, row: &mut CoopRecord) -> Result<RecordId, StorageError> {
        let id = RecordId::new();
        self.conn
            .execute(
                "INSERT INTO coops (id, branch, revision, created_by, created_at, name, picture_id, contactable_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    id.as_bytes().as_slice(),
                    row.meta.branch.map(|b| b.as_bytes().to_vec()),
                    row.meta.revision as i64,
                    row.meta.created_by.as_bytes().as_slice(),
                    row.meta.created_at.as_millis(),
                    row.name,
                    row.picture.map(|p| p.as_bytes().to_vec()),
                    row.contactable.map(|c| c.as_bytes().to_vec()),
                ],
            )
            .map_err(|e| map_revision_conflict(e, "coops", &row.meta))?;
        row.meta.id = Some(id);
        debug!(table = "coops", %id, revision = row.meta.revision, "inserted revision row");
        Ok(id)
    }

    fn update(&mut self, id: RecordId, row: &CoopRecord) -> Result<(), StorageError> {
        let n = self
            .conn
            .execute(
                "UPDATE coops SET branch = ?2, revision = ?3, created_by = ?4, created_at = ?5,
                                  name = ?6, picture_id = ?7, contactable_id = ?8
                 WHERE id = ?1",
                rusqlite::params![
                    id.as_bytes().as_slice(),
                    row.meta.branch.map(|b| b.as_bytes().to_vec()),
                    row.meta.revision as i64,
                    row.meta.created_by.as_bytes().as_slice(),
                    row.meta.created_at.as_millis(),
                    row.name,
                    row.picture.map(|p| p.as_bytes().to_vec()),
                    row.contactable.map(|c| c.as_bytes().to_vec()),
                ],
            )
            .map_err(|e| map_revision_conflict(e, "coops", &row.meta))?;
        if n == 0 {
            return Err(StorageError::NotFound(format!("coop {id}")));
        }
        debug!(table = "coops", %id, revision = row.meta.revision, "rewrote row in place");
        Ok(())
    }

    fn get(&self, id: RecordId) -> Result<CoopRecord, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, branch, revision, created_by, created_at, name, picture_id, contactable_id
             FROM coops WHERE id = ?1",
        )?;
        let mut rows = stmt.query(rusqlite::params![id.as_bytes().as_slice()])?;
        match rows.next()? {
            Some(row) => read_coop(row),
            None => Err(StorageError::NotFound(format!("coop {id}"))),
        }
    }

    fn find_by_branch(&self, branch: RecordId) -> Result<Vec<CoopRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, branch, revision, created_by, created_at, name, picture_id, contactable_id
             FROM coops WHERE branch = ?1 ORDER BY revision",
        )?;
        let mut rows = stmt.query(rusqlite::params![branch.as_bytes().as_slice()])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            result.push(read_coop(row)?);
        }
        Ok(result)
    }
}

impl RevisionStore<AnsweredQuestionRecord> for SqliteStorage {
    fn insert(&mut self, row: &mut AnsweredQuestionRecord) -> Result<RecordId, StorageError> {
        let id = RecordId::new();
        let answers = rmp_serde::to_vec(&row.answers)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.conn
            .execute(
                "INSERT INTO answered_questions (id, branch, revision, created_by, created_at, question_id, coop_id, position, answers)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    id.as_bytes().as_slice(),
                    row.meta.branch.map(|b| b.as_bytes().to_vec()),
                    row.meta.revision as i64,
                    row.meta.created_by.as_bytes().as_slice(),
                    row.meta.created_at.as_millis(),
                    row.question.as_bytes().as_slice(),
                    row.coop.as_bytes().as_slice(),
                    row.position,
                    answers,
                ],
            )
            .map_err(|e| map_revision_conflict(e, "answered_questions", &row.meta))?;
        row.meta.id = Some(id);
        debug!(table = "answered_questions", %id, revision = row.meta.revision, "inserted revision row");
        Ok(id)
    }

    fn update(&mut self, id: RecordId, row: &AnsweredQuestionRecord) -> Result<(), StorageError> {
        let answers = rmp_serde::to_vec(&row.answers)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let n = self
            .conn
            .execute(
                "UPDATE answered_questions SET branch = ?2, revision = ?3, created_by = ?4, created_at = ?5,
                                               question_id = ?6, coop_id = ?7, position = ?8, answers = ?9
                 WHERE id = ?1",
                rusqlite::params![
                    id.as_bytes().as_slice(),
                    row.meta.branch.map(|b| b.as_bytes().to_vec()),
                    row.meta.revision as i64,
                    row.meta.created_by.as_bytes().as_slice(),
                    row.meta.created_at.as_millis(),
                    row.question.as_bytes().as_slice(),
                    row.coop.as_bytes().as_slice(),
                    row.position,
                    answers,
                ],
            )
            .map_err(|e| map_revision_conflict(e, "answered_questions", &row.meta))?;
        if n == 0 {
            return Err(StorageError::NotFound(format!("answered question {id}")));
        }
        debug!(table = "answered_questions", %id, revision = row.meta.revision, "rewrote row in place");
        Ok(())
    }

    fn get(&self, id: RecordId) -> Result<AnsweredQuestionRecord, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, branch, revision, created_by, created_at, question_id, coop_id, position, answers
             FROM answered_questions WHERE id = ?1",
        )?;
        let mut rows = stmt.query(rusqlite::params![id.as_bytes().as_slice()])?;
        match rows.next()? {
            Some(row) => read_answered(row),
            None => Err(StorageError::NotFound(format!("answered question {id}"))),
        }
    }

    fn find_by_branch(
        &self,
        branch: RecordId,
    ) -> Result<Vec<AnsweredQuestionRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, branch, revision, created_by, created_at, question_id, coop_id, position, answers
             FROM answered_questions WHERE branch = ?1 ORDER BY revision",
        )?;
        let mut rows = stmt.query(rusqlite::params![branch.as_bytes().as_slice()])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            result.push(read_answered(row)?);
        }
        Ok(result)
    }
}

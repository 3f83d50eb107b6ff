use coopdir_core::{
    coop::CoopRecord,
    ids::*,
    question::AnsweredQuestionRecord,
};
use coopdir_engine::Directory;
use coopdir_storage::SqliteStorage;

/// An in-memory directory with one fixture user, for tests.
pub struct TestDirectory {
    pub directory: Directory,
    pub user: UserId,
}

impl TestDirectory {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let storage = SqliteStorage::open_in_memory()?;
        let mut directory = Directory::new(storage);
        let user = directory.create_user("fixture-user", None)?;
        Ok(Self { directory, user })
    }

    pub fn create_coop(&mut self, name: &str) -> Result<CoopRecord, Box<dyn std::error::Error>> {
        Ok(self.directory.create_coop(name, self.user)?)
    }

    pub fn rename_coop(
        &mut self,
        record: &mut CoopRecord,
        name: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        record.name = name.to_string();
        self.directory.commit_revision(record)?;
        Ok(())
    }

    /// Seed a prompt, its canned answers, and a question offering them.
    pub fn seed_question(
        &mut self,
        prompt: &str,
        answers: &[&str],
    ) -> Result<(QuestionId, Vec<AnswerId>), Box<dyn std::error::Error>> {
        let prompt_id = self.directory.create_prompt(prompt)?;
        let mut answer_ids = Vec::new();
        for text in answers {
            answer_ids.push(self.directory.create_answer(text)?);
        }
        let question = self
            .directory
            .create_question(prompt_id, false, false, None, &answer_ids)?;
        Ok((question, answer_ids))
    }

    pub fn answer(
        &mut self,
        coop: RecordId,
        question: QuestionId,
        answers: Vec<AnswerId>,
        position: i64,
    ) -> Result<AnsweredQuestionRecord, Box<dyn std::error::Error>> {
        Ok(self
            .directory
            .answer_question(coop, question, answers, position, self.user)?)
    }
}

use coopdir_core::coop::CoopRecord;
use coopdir_core::ids::RecordId;
use coopdir_core::question::AnsweredQuestionRecord;
use coopdir_engine::EngineError;
use coopdir_harness::TestDirectory;
use coopdir_storage::{RevisionStore, StorageError};

// ============================================================================
// Save protocol
// ============================================================================

#[test]
fn fresh_save_establishes_branch() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestDirectory::new()?;
    let coop = t.create_coop("Testy Coop")?;

    assert_eq!(coop.meta.branch, coop.meta.id);
    assert_eq!(coop.meta.revision, 0);
    assert!(coop.meta.is_head());

    Ok(())
}

#[test]
fn revision_archives_previous_content() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestDirectory::new()?;
    let mut coop = t.create_coop("Testy Coop")?;
    let orig_id = coop.meta.id.unwrap();

    t.rename_coop(&mut coop, "Testy Coop Revised")?;

    // The head keeps its id and carries the new revision.
    assert_eq!(coop.meta.revision, 1);
    assert_eq!(coop.meta.id, Some(orig_id));
    assert_eq!(coop.meta.branch, Some(orig_id));

    let head: CoopRecord = t.directory.current(orig_id)?;
    assert_eq!(head.name, "Testy Coop Revised");
    assert_eq!(head.meta.revision, 1);

    // The old content moved to an archived row under a fresh id.
    let history: Vec<CoopRecord> = t.directory.history(orig_id)?;
    assert_eq!(history.len(), 2);
    let archived = &history[0];
    assert_eq!(archived.name, "Testy Coop");
    assert_eq!(archived.meta.revision, 0);
    assert_eq!(archived.meta.branch, Some(orig_id));
    assert_ne!(archived.meta.id, Some(orig_id));

    Ok(())
}

#[test]
fn current_read_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestDirectory::new()?;
    let mut coop = t.create_coop("Steady Coop")?;
    t.rename_coop(&mut coop, "Steady Coop v2")?;
    let branch = coop.meta.branch.unwrap();

    let first: CoopRecord = t.directory.current(branch)?;
    let second: CoopRecord = t.directory.current(branch)?;
    assert_eq!(first.name, second.name);
    assert_eq!(first.meta.id, second.meta.id);
    assert_eq!(first.meta.revision, second.meta.revision);

    Ok(())
}

#[test]
fn revision_numbers_are_dense_and_unique() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestDirectory::new()?;
    let mut coop = t.create_coop("Revision Mill")?;
    let branch = coop.meta.branch.unwrap();

    for i in 1..=4 {
        t.rename_coop(&mut coop, &format!("Revision Mill v{i}"))?;
    }

    let history: Vec<CoopRecord> = t.directory.history(branch)?;
    let revisions: Vec<u32> = history.iter().map(|r| r.meta.revision).collect();
    assert_eq!(revisions, vec![0, 1, 2, 3, 4]);
    assert_eq!(t.directory.latest_revision_number::<CoopRecord>(branch)?, 4);

    Ok(())
}

#[test]
fn editing_an_old_revision_chains_after_the_head() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestDirectory::new()?;
    let mut coop = t.create_coop("Forky Coop")?;
    let branch = coop.meta.branch.unwrap();

    for i in 1..=5 {
        t.rename_coop(&mut coop, &format!("Forky Coop v{i}"))?;
    }

    // Load the archived row at revision 2 and edit it. The save must
    // reattach after the current head, not after revision 2.
    let history: Vec<CoopRecord> = t.directory.history(branch)?;
    let mut fork = history.iter().find(|r| r.meta.revision == 2).unwrap().clone();
    fork.name = "Forky Coop fork from old rev.".to_string();
    t.directory.commit_revision(&mut fork)?;

    assert_eq!(fork.meta.revision, 6);
    assert_eq!(fork.meta.id, Some(branch));

    let head: CoopRecord = t.directory.current(branch)?;
    assert_eq!(head.name, "Forky Coop fork from old rev.");
    assert_eq!(head.meta.revision, 6);

    Ok(())
}

#[test]
fn record_with_id_but_no_branch_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestDirectory::new()?;
    let mut bad = CoopRecord::new("Orphan", t.user)?;
    bad.meta.id = Some(RecordId::new());

    let err = t.directory.commit_revision(&mut bad).unwrap_err();
    assert!(matches!(err, EngineError::MissingBranch(_)));

    Ok(())
}

#[test]
fn history_of_unknown_branch_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestDirectory::new()?;
    let err = t.directory.history::<CoopRecord>(RecordId::new()).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Storage(StorageError::NotFound(_))
    ));
    Ok(())
}

// ============================================================================
// Uniqueness and concurrency
// ============================================================================

#[test]
fn duplicate_branch_revision_pair_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestDirectory::new()?;
    let coop = t.create_coop("Original")?;
    let branch = coop.meta.branch.unwrap();

    // Hand-assemble a row that claims the branch's revision 0 slot.
    let mut bad = CoopRecord::new("Bad", t.user)?;
    bad.meta.branch = Some(branch);
    bad.meta.revision = 0;

    let err = t.directory.storage_mut().insert(&mut bad).unwrap_err();
    assert!(matches!(err, StorageError::ConstraintViolation(_)));

    Ok(())
}

#[test]
fn losing_concurrent_save_rolls_back_cleanly() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestDirectory::new()?;
    let mut coop = t.create_coop("Contended Coop")?;
    let branch = coop.meta.branch.unwrap();

    for i in 1..=3 {
        t.rename_coop(&mut coop, &format!("Contended Coop v{i}"))?;
    }

    // Both writers read the head at revision 3 and will compute 4.
    let stale: CoopRecord = t.directory.current(branch)?;
    assert_eq!(stale.meta.revision, 3);

    // Writer one commits first.
    t.rename_coop(&mut coop, "Winner")?;
    assert_eq!(coop.meta.revision, 4);

    // Writer two replays the protocol from its stale read: rewrite the
    // head at revision 4, then archive its copy of revision 3. The
    // archive collides with the row writer one already archived.
    {
        let storage = t.directory.storage_mut();
        storage.conn().execute_batch("BEGIN IMMEDIATE")?;

        let mut loser_head = stale.clone();
        loser_head.meta.revision = 4;
        loser_head.name = "Loser".to_string();
        storage.update(branch, &loser_head)?;

        let mut loser_archive = stale.clone();
        loser_archive.meta.id = None;
        let err = storage.insert(&mut loser_archive).unwrap_err();
        assert!(matches!(err, StorageError::ConstraintViolation(_)));

        storage.conn().execute_batch("ROLLBACK")?;
    }

    // The rollback left the winner's commit fully intact: no torn head,
    // exactly one archived revision 3.
    let head: CoopRecord = t.directory.current(branch)?;
    assert_eq!(head.name, "Winner");
    assert_eq!(head.meta.revision, 4);

    let history: Vec<CoopRecord> = t.directory.history(branch)?;
    assert_eq!(history.len(), 5);
    let rev3: Vec<_> = history.iter().filter(|r| r.meta.revision == 3).collect();
    assert_eq!(rev3.len(), 1);
    assert_eq!(rev3[0].name, "Contended Coop v3");

    Ok(())
}

#[test]
fn head_rewrite_into_taken_revision_slot_is_a_conflict() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestDirectory::new()?;
    let mut coop = t.create_coop("Slotted Coop")?;
    let branch = coop.meta.branch.unwrap();
    t.rename_coop(&mut coop, "Slotted Coop v1")?;

    // Revision 0 lives in an archived row now. Rewriting the head back
    // onto that slot must surface as the retryable conflict, same as a
    // colliding insert.
    let mut stale: CoopRecord = t.directory.current(branch)?;
    stale.meta.revision = 0;
    let err = t.directory.storage_mut().update(branch, &stale).unwrap_err();
    assert!(matches!(err, StorageError::ConstraintViolation(_)));

    Ok(())
}

#[test]
fn constraint_violation_is_reported_retryable() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestDirectory::new()?;
    let coop = t.create_coop("Retry Coop")?;

    let mut bad = CoopRecord::new("Bad", t.user)?;
    bad.meta.branch = coop.meta.branch;
    bad.meta.revision = 0;
    let err: EngineError = t.directory.storage_mut().insert(&mut bad).unwrap_err().into();
    assert!(err.is_retryable_conflict());

    Ok(())
}

#[test]
fn history_survives_reopen() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("coopdir.db");
    let path = path.to_str().unwrap();

    let branch;
    {
        let storage = coopdir_storage::SqliteStorage::open(path)?;
        let mut directory = coopdir_engine::Directory::new(storage);
        let user = directory.create_user("disk-user", None)?;
        let mut coop = directory.create_coop("Durable House", user)?;
        branch = coop.meta.branch.unwrap();
        coop.name = "Durable House v2".to_string();
        directory.commit_revision(&mut coop)?;
    }

    let storage = coopdir_storage::SqliteStorage::open(path)?;
    let directory = coopdir_engine::Directory::new(storage);
    let history: Vec<CoopRecord> = directory.history(branch)?;
    assert_eq!(history.len(), 2);
    let head: CoopRecord = directory.current(branch)?;
    assert_eq!(head.name, "Durable House v2");
    assert_eq!(head.meta.revision, 1);

    Ok(())
}

// ============================================================================
// Answered questions version through the same protocol
// ============================================================================

#[test]
fn answered_question_revisions() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestDirectory::new()?;
    let coop = t.create_coop("Quizzical Coop")?;
    let coop_branch = coop.meta.branch.unwrap();
    let (question, answers) = t.seed_question("Do you cook together?", &["Yes", "No"])?;

    let mut answered = t.answer(coop_branch, question, vec![answers[0]], 0)?;
    assert_eq!(answered.meta.revision, 0);
    assert_eq!(answered.meta.branch, answered.meta.id);
    let branch = answered.meta.branch.unwrap();

    // Change the selection; the old selection must survive as an archive.
    answered.answers = vec![answers[1]];
    t.directory.commit_revision(&mut answered)?;
    assert_eq!(answered.meta.revision, 1);

    let history: Vec<AnsweredQuestionRecord> = t.directory.history(branch)?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].answers, vec![answers[0]]);
    assert_eq!(history[1].answers, vec![answers[1]]);

    let head: AnsweredQuestionRecord = t.directory.current(branch)?;
    assert_eq!(head.answers, vec![answers[1]]);

    Ok(())
}

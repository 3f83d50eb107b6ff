use coopdir_core::coop::CoopRecord;
use coopdir_harness::TestDirectory;
use coopdir_storage::StorageError;

// ============================================================================
// Question catalog
// ============================================================================

#[test]
fn question_keeps_suggested_answers_ordered() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestDirectory::new()?;
    let (question, answers) =
        t.seed_question("How many residents?", &["1-5", "6-15", "16 or more"])?;

    let suggested = t.directory.suggested_answers(question)?;
    assert_eq!(
        suggested.iter().map(|a| a.id).collect::<Vec<_>>(),
        answers
    );
    assert_eq!(suggested[0].answer, "1-5");
    assert_eq!(suggested[2].answer, "16 or more");

    let loaded = t.directory.get_question(question)?;
    let prompt = t.directory.get_prompt(loaded.prompt)?;
    assert_eq!(prompt.prompt, "How many residents?");

    Ok(())
}

#[test]
fn duplicate_answer_position_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestDirectory::new()?;
    let (question, _) = t.seed_question("Pets allowed?", &["Yes"])?;
    let extra = t.directory.create_answer("Cats only")?;

    let err = t
        .directory
        .storage_mut()
        .attach_suggested_answer(question, extra, 0)
        .unwrap_err();
    assert!(matches!(err, StorageError::ConstraintViolation(_)));

    Ok(())
}

#[test]
fn question_categories_form_a_tree() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestDirectory::new()?;
    let root = t.directory.create_question_category("Daily life", None)?;
    let child = t.directory.create_question_category("Food", Some(root))?;

    let loaded = t.directory.get_question_category(child)?;
    assert_eq!(loaded.category, "Food");
    assert_eq!(loaded.parent, Some(root));

    Ok(())
}

// ============================================================================
// Contact methods
// ============================================================================

#[test]
fn contactable_collects_emails_and_phones() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestDirectory::new()?;
    let contactable = t.directory.create_contactable()?;
    let main = t.directory.create_contact_label("Main", 0)?;
    let work = t.directory.create_contact_label("Work", 1)?;

    t.directory
        .add_email(contactable, main, "house@example.coop", "shared inbox")?;
    t.directory
        .add_phone_number(contactable, work, "555-0101", "")?;

    let emails = t.directory.emails_for(contactable)?;
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].address, "house@example.coop");
    assert_eq!(emails[0].label, main);

    let phones = t.directory.phone_numbers_for(contactable)?;
    assert_eq!(phones.len(), 1);
    assert_eq!(phones[0].number, "555-0101");

    // Labels resolve back to their display text and rank.
    let main_label = t.directory.get_contact_label(emails[0].label)?;
    assert_eq!(main_label.label, "Main");
    assert_eq!(main_label.rank, 0);
    let work_label = t.directory.get_contact_label(phones[0].label)?;
    assert_eq!(work_label.label, "Work");
    assert_eq!(work_label.rank, 1);

    Ok(())
}

// ============================================================================
// Coop listing, categories, relationships
// ============================================================================

#[test]
fn listing_returns_heads_only_sorted_by_name() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestDirectory::new()?;
    let mut beech = t.create_coop("Beech House")?;
    t.create_coop("Alder House")?;

    // A few revisions must not multiply the listing.
    t.rename_coop(&mut beech, "Beech House Co-op")?;
    t.rename_coop(&mut beech, "Beech House Cooperative")?;

    let listed = t.directory.list_coops()?;
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|c| c.meta.is_head()));
    assert_eq!(listed[0].name, "Alder House");
    assert_eq!(listed[1].name, "Beech House Cooperative");

    Ok(())
}

#[test]
fn coop_picture_and_contactable_survive_revisions() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestDirectory::new()?;
    let mut coop = t.create_coop("Shutterbug House")?;
    let branch = coop.meta.branch.unwrap();

    let picture = t.directory.create_picture("uploads/coop_pictures/sb.jpg", false)?;
    let contactable = t.directory.create_contactable()?;
    coop.picture = Some(picture);
    coop.contactable = Some(contactable);
    t.directory.commit_revision(&mut coop)?;

    let head: CoopRecord = t.directory.current(branch)?;
    assert_eq!(head.picture, Some(picture));
    assert_eq!(head.contactable, Some(contactable));
    assert_eq!(t.directory.get_picture(picture)?.path, "uploads/coop_pictures/sb.jpg");

    // Revision 0 predates the picture.
    let history: Vec<CoopRecord> = t.directory.history(branch)?;
    assert_eq!(history[0].picture, None);

    Ok(())
}

#[test]
fn categories_attach_to_the_branch() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestDirectory::new()?;
    let mut coop = t.create_coop("Tagged House")?;
    let branch = coop.meta.branch.unwrap();

    let student = t.directory.create_coop_category("student housing")?;
    let vegan = t.directory.create_coop_category("vegan kitchen")?;
    t.directory.assign_category(branch, student)?;
    t.directory.assign_category(branch, vegan)?;

    // Category links key on the branch, so revisions don't detach them.
    t.rename_coop(&mut coop, "Tagged House v2")?;
    let categories = t.directory.categories_for(branch)?;
    assert_eq!(categories.len(), 2);

    let err = t.directory.assign_category(branch, student).unwrap_err();
    assert!(err.is_retryable_conflict());

    Ok(())
}

#[test]
fn relationships_link_coop_branches() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestDirectory::new()?;
    let parent = t.create_coop("Umbrella Org")?;
    let member = t.create_coop("Member House")?;
    let parent_branch = parent.meta.branch.unwrap();
    let member_branch = member.meta.branch.unwrap();

    let member_of = t.directory.create_relationship_type("member of")?;
    t.directory.relate_coops(member_branch, parent_branch, member_of)?;

    let rels = t.directory.relationships_of(member_branch)?;
    assert_eq!(rels.len(), 1);
    assert_eq!(rels[0].to_coop, parent_branch);
    assert_eq!(rels[0].relationship_type, member_of);

    Ok(())
}

// ============================================================================
// Answered questions as directory content
// ============================================================================

#[test]
fn answered_questions_listed_in_display_order() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestDirectory::new()?;
    let coop = t.create_coop("Ordered House")?;
    let branch = coop.meta.branch.unwrap();
    let (q1, a1) = t.seed_question("Do you cook together?", &["Yes", "No"])?;
    let (q2, a2) = t.seed_question("Pets allowed?", &["Yes", "No"])?;

    // Answer out of order; the listing sorts by position.
    let mut second = t.answer(branch, q2, vec![a2[1]], 1)?;
    t.answer(branch, q1, vec![a1[0]], 0)?;

    let listed = t.directory.answered_questions_for(branch)?;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].question, q1);
    assert_eq!(listed[1].question, q2);

    // Revising one answer must not duplicate it in the listing.
    second.answers = vec![a2[0]];
    t.directory.commit_revision(&mut second)?;
    let listed = t.directory.answered_questions_for(branch)?;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[1].answers, vec![a2[0]]);

    Ok(())
}

#[test]
fn users_are_stored_and_stamped() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestDirectory::new()?;
    let user = t.directory.get_user(t.user)?;
    assert_eq!(user.display_name, "fixture-user");

    let coop = t.create_coop("Stamped House")?;
    assert_eq!(coop.meta.created_by, t.user);

    Ok(())
}

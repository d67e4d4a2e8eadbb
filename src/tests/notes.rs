use crate::notes::{parse_tags, BackendCsv, NoteCreate, NoteManager, NoteQuery, NoteUpdate};

fn create_backend() -> (BackendCsv, tempfile::TempDir, String) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let path = tmp.path().join("notes.csv").to_str().unwrap().to_string();
    let backend = BackendCsv::load(&path).expect("failed to create notes csv");
    (backend, tmp, path)
}

fn note(title: &str, tags: &[&str]) -> NoteCreate {
    NoteCreate {
        title: title.to_string(),
        content: format!("{title} content"),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..Default::default()
    }
}

#[test]
fn test_parse_tags() {
    assert_eq!(parse_tags("work, ideas,,work , "), vec!["work", "ideas"]);
    assert!(parse_tags("").is_empty());
}

#[test]
fn test_create_assigns_ids_and_positions() {
    let (backend, _tmp, _) = create_backend();

    let first = backend.create("alice", note("First", &["a"]), vec![]).unwrap();
    let second = backend.create("alice", note("Second", &["a"]), vec![]).unwrap();
    let other = backend.create("bob", note("Other", &["a"]), vec![]).unwrap();

    assert_eq!(first.id, 0);
    assert_eq!(second.id, 1);
    assert_eq!(other.id, 2);

    assert_eq!(first.position, 1);
    assert_eq!(second.position, 2);
    // positions are per user
    assert_eq!(other.position, 1);
}

#[test]
fn test_roundtrip_through_csv() {
    let (backend, _tmp, path) = create_backend();

    let mut create = note("Title, with \"quotes\"", &["x", "y"]);
    create.content = "multi\nline, content".to_string();
    create.folder_id = Some("folder-1".to_string());
    let created = backend
        .create("alice", create, vec![0.25, -1.5, 3.0])
        .unwrap();

    let reloaded = BackendCsv::load(&path).unwrap();
    let note = reloaded.get("alice", created.id).unwrap().unwrap();

    assert_eq!(note.title, "Title, with \"quotes\"");
    assert_eq!(note.content, "multi\nline, content");
    assert_eq!(note.tags, vec!["x", "y"]);
    assert_eq!(note.folder_id.as_deref(), Some("folder-1"));
    assert_eq!(note.embedding, vec![0.25, -1.5, 3.0]);
    assert_eq!(note.created_at, created.created_at);
}

#[test]
fn test_get_is_user_scoped() {
    let (backend, _tmp, _) = create_backend();
    let created = backend.create("alice", note("Mine", &["a"]), vec![]).unwrap();

    assert!(backend.get("alice", created.id).unwrap().is_some());
    assert!(backend.get("bob", created.id).unwrap().is_none());
    assert!(backend
        .update("bob", created.id, NoteUpdate::default())
        .unwrap()
        .is_none());
    assert!(!backend.delete("bob", created.id).unwrap());
}

#[test]
fn test_list_order_pinned_then_position() {
    let (backend, _tmp, _) = create_backend();

    let first = backend.create("alice", note("First", &["a"]), vec![]).unwrap();
    let second = backend.create("alice", note("Second", &["a"]), vec![]).unwrap();
    let third = backend.create("alice", note("Third", &["a"]), vec![]).unwrap();

    let pin = NoteUpdate {
        is_pinned: Some(true),
        ..Default::default()
    };
    backend.update("alice", third.id, pin).unwrap();

    let ids: Vec<u64> = backend
        .list("alice", NoteQuery::default())
        .unwrap()
        .iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(ids, vec![third.id, first.id, second.id]);
}

#[test]
fn test_list_filters() {
    let (backend, _tmp, _) = create_backend();

    backend.create("alice", note("Groceries", &["home"]), vec![]).unwrap();
    let mut work = note("Quarterly plan", &["work"]);
    work.folder_id = Some("f1".to_string());
    backend.create("alice", work, vec![]).unwrap();
    backend.create("bob", note("Groceries", &["home"]), vec![]).unwrap();

    let by_tag = backend
        .list(
            "alice",
            NoteQuery {
                tags: Some(vec!["work".to_string(), "missing".to_string()]),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(by_tag.len(), 1);
    assert_eq!(by_tag[0].title, "Quarterly plan");

    let by_search = backend
        .list(
            "alice",
            NoteQuery {
                search: Some("GROCER".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(by_search.len(), 1);
    assert_eq!(by_search[0].user_id, "alice");

    let by_tag_search = backend
        .list(
            "alice",
            NoteQuery {
                search: Some("work".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(by_tag_search.len(), 1);

    let by_folder = backend
        .list(
            "alice",
            NoteQuery {
                folder_id: Some("f1".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(by_folder.len(), 1);
}

#[test]
fn test_update_fields() {
    let (backend, _tmp, path) = create_backend();
    let mut create = note("Draft", &["a"]);
    create.folder_id = Some("f1".to_string());
    let created = backend.create("alice", create, vec![1.0]).unwrap();

    let update = NoteUpdate {
        content: Some("final".to_string()),
        tags: Some(vec!["b".to_string(), "b".to_string()]),
        folder_id: Some(String::new()),
        embedding: Some(vec![0.5, 0.5]),
        ..Default::default()
    };
    let updated = backend.update("alice", created.id, update).unwrap().unwrap();

    assert_eq!(updated.title, "Draft");
    assert_eq!(updated.content, "final");
    assert_eq!(updated.tags, vec!["b"]);
    assert_eq!(updated.folder_id, None);
    assert!(updated.updated_at >= created.updated_at);

    let reloaded = BackendCsv::load(&path).unwrap();
    let note = reloaded.get("alice", created.id).unwrap().unwrap();
    assert_eq!(note.embedding, vec![0.5, 0.5]);
}

#[test]
fn test_delete() {
    let (backend, _tmp, path) = create_backend();
    let created = backend.create("alice", note("Gone", &["a"]), vec![]).unwrap();

    assert!(backend.delete("alice", created.id).unwrap());
    assert!(!backend.delete("alice", created.id).unwrap());

    let reloaded = BackendCsv::load(&path).unwrap();
    assert!(reloaded.list("alice", NoteQuery::default()).unwrap().is_empty());
}

#[test]
fn test_serialized_note_omits_embedding() {
    let (backend, _tmp, _) = create_backend();
    let created = backend.create("alice", note("Hidden", &["a"]), vec![1.0, 2.0]).unwrap();

    let value = serde_json::to_value(&created).unwrap();
    assert!(value.get("embedding").is_none());
    assert_eq!(value["title"], "Hidden");
}

#[test]
fn test_failed_save_leaves_store_unchanged() {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let data = tmp.path().join("data");
    std::fs::create_dir(&data).unwrap();
    let backend = BackendCsv::load(data.join("notes.csv").to_str().unwrap()).unwrap();
    let kept = backend.create("alice", note("Kept", &["a"]), vec![1.0]).unwrap();

    std::fs::remove_dir_all(&data).unwrap();

    assert!(backend.create("alice", note("Lost", &["a"]), vec![]).is_err());

    let update = NoteUpdate {
        title: Some("Renamed".to_string()),
        embedding: Some(vec![]),
        ..Default::default()
    };
    assert!(backend.update("alice", kept.id, update).is_err());
    assert!(backend.delete("alice", kept.id).is_err());

    let notes = backend.list("alice", NoteQuery::default()).unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].title, "Kept");
    assert_eq!(notes[0].embedding, vec![1.0]);
}

#[test]
fn test_clear_folder() {
    let (backend, _tmp, path) = create_backend();

    let mut filed = note("Filed", &["a"]);
    filed.folder_id = Some("f1".to_string());
    let filed = backend.create("alice", filed, vec![]).unwrap();
    let mut other_user = note("Theirs", &["a"]);
    other_user.folder_id = Some("f1".to_string());
    let other_user = backend.create("bob", other_user, vec![]).unwrap();

    assert_eq!(backend.clear_folder("alice", "f1").unwrap(), 1);
    assert_eq!(backend.clear_folder("alice", "f1").unwrap(), 0);

    let reloaded = BackendCsv::load(&path).unwrap();
    assert_eq!(reloaded.get("alice", filed.id).unwrap().unwrap().folder_id, None);
    assert_eq!(
        reloaded
            .get("bob", other_user.id)
            .unwrap()
            .unwrap()
            .folder_id
            .as_deref(),
        Some("f1")
    );
}

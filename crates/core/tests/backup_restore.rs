use cardshelf_core::backup::{parse_backup, RestoreMode};
use cardshelf_core::config::AppConfig;
use cardshelf_core::import::{ImportSource, PlaceholderRenderer};
use cardshelf_core::{BackupError, Library};
use std::sync::Arc;
use storage::models::{CardId, GroupKey};
use storage::{CardStore, MemoryStore, OrderStore, PrefStore, SqliteStore};

fn pdf(label: &str) -> Vec<u8> {
    format!("%PDF-1.4\n% {label}\n<< /Type /Page >>\n%%EOF").into_bytes()
}

async fn seeded(store: Arc<MemoryStore>) -> (Library, CardId, CardId) {
    let mut cfg = AppConfig::default();
    cfg.ui.reorder_enabled = true;
    let mut library = Library::open(cfg, store.clone(), store.clone(), store)
        .await
        .unwrap();
    let report = library
        .import(
            vec![
                ImportSource::new("rules.pdf", pdf("rules")),
                ImportSource::new("atlas.pdf", pdf("atlas")),
            ],
            &PlaceholderRenderer,
        )
        .await;
    let a = report.imported[0].id.clone();
    let b = report.imported[1].id.clone();
    library.create_collection("Maps").await.unwrap();
    library.set_tags(&a, ["lore"]).await.unwrap();
    library.move_card(&b, &a, true).unwrap();
    library.set_theme(Some("dark")).await.unwrap();
    library.flush().await.unwrap();
    (library, a, b)
}

#[tokio::test]
async fn replace_restore_reproduces_exported_library() {
    let (source, a, b) = seeded(Arc::new(MemoryStore::new())).await;
    let text = source.export_backup().await.unwrap().to_json().unwrap();

    let target_store = Arc::new(MemoryStore::new());
    let mut target = Library::open(
        AppConfig::default(),
        target_store.clone(),
        target_store.clone(),
        target_store.clone(),
    )
    .await
    .unwrap();
    target
        .import(vec![ImportSource::new("stray.pdf", pdf("stray"))], &PlaceholderRenderer)
        .await;

    let validated = parse_backup("shelf.json", &text).unwrap();
    let summary = target
        .restore_backup(validated, RestoreMode::Replace)
        .await
        .unwrap();
    assert_eq!(summary.cards, 2);
    assert_eq!(summary.files, 2);

    let mut expected = source.cards().to_vec();
    let mut restored = target.cards().to_vec();
    expected.sort_by(|x, y| x.id.cmp(&y.id));
    restored.sort_by(|x, y| x.id.cmp(&y.id));
    assert_eq!(restored, expected);
    assert_eq!(target.group_order(&GroupKey::none()), vec![b.clone(), a.clone()]);
    assert_eq!(target.theme(), Some("dark"));
    assert_eq!(target_store.load_collections().await.unwrap(), vec!["Maps"]);
    assert_eq!(target.file_bytes(&a).await.unwrap(), Some(pdf("rules")));
    assert_eq!(target_store.card_count().await, 2);
}

#[tokio::test]
async fn merge_restore_keeps_existing_cards() {
    let (source, _, _) = seeded(Arc::new(MemoryStore::new())).await;
    let backup = source.export_backup().await.unwrap();

    let target_store = Arc::new(MemoryStore::new());
    let mut target = Library::open(
        AppConfig::default(),
        target_store.clone(),
        target_store.clone(),
        target_store.clone(),
    )
    .await
    .unwrap();
    target.create_collection("maps").await.unwrap();
    target.create_collection("Handouts").await.unwrap();
    let report = target
        .import(vec![ImportSource::new("own.pdf", pdf("own"))], &PlaceholderRenderer)
        .await;
    let own = report.imported[0].id.clone();

    let validated = parse_backup("shelf.JSON", &backup.to_json().unwrap()).unwrap();
    target
        .restore_backup(validated, RestoreMode::Merge)
        .await
        .unwrap();

    assert_eq!(target.cards().len(), 3);
    assert!(target.card(&own).is_some());
    let names: Vec<String> = target.collections().into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["Dayseal", "Nightseal", "Handouts", "maps"]);
}

#[tokio::test]
async fn rejected_backup_leaves_stores_untouched() {
    let (mut library, a, _) = seeded(Arc::new(MemoryStore::new())).await;
    let mut backup = library.export_backup().await.unwrap();
    backup.version = 42;
    let text = backup.to_json().unwrap();

    let err = parse_backup("shelf.json", &text).unwrap_err();
    assert!(matches!(err, BackupError::UnsupportedVersion { found: 42, .. }));
    assert!(matches!(
        parse_backup("shelf.zip", &text).unwrap_err(),
        BackupError::WrongExtension(_)
    ));

    assert_eq!(library.cards().len(), 2);
    assert!(library.card(&a).is_some());
    library.flush().await.unwrap();
}

#[tokio::test]
async fn sqlite_backed_library_restores_from_memory_export() {
    let (source, a, b) = seeded(Arc::new(MemoryStore::new())).await;
    let text = source.export_backup().await.unwrap().to_json().unwrap();

    let temp = tempfile::tempdir().unwrap();
    let db = temp.path().join("shelf.db");
    let store = Arc::new(SqliteStore::open(&db.to_string_lossy()).await.unwrap());
    let mut library = Library::open(AppConfig::default(), store.clone(), store.clone(), store.clone())
        .await
        .unwrap();

    library
        .restore_backup(parse_backup("shelf.json", &text).unwrap(), RestoreMode::Replace)
        .await
        .unwrap();
    assert_eq!(library.group_order(&GroupKey::none()), vec![b.clone(), a.clone()]);
    assert_eq!(store.get(&a).await.unwrap().unwrap().tags, vec!["lore"]);
    assert_eq!(
        store.load_map().await.unwrap().get(&GroupKey::none()),
        Some(&vec![b, a])
    );
}

#[tokio::test]
async fn restore_normalizes_tags_and_skips_builtin_and_reserved_names() {
    let (source, a, _) = seeded(Arc::new(MemoryStore::new())).await;
    let mut backup = source.export_backup().await.unwrap();
    let card = backup.cards.iter_mut().find(|c| c.id == a).unwrap();
    card.tags = vec!["Foo".into(), "foo".into(), " ".into()];
    backup.collections = ["dayseal", "", "__none__", "Maps", "MAPS"]
        .into_iter()
        .map(String::from)
        .collect();

    let target_store = Arc::new(MemoryStore::new());
    let mut target = Library::open(
        AppConfig::default(),
        target_store.clone(),
        target_store.clone(),
        target_store.clone(),
    )
    .await
    .unwrap();
    let validated = parse_backup("shelf.json", &backup.to_json().unwrap()).unwrap();
    let summary = target
        .restore_backup(validated, RestoreMode::Merge)
        .await
        .unwrap();
    assert_eq!(summary.collections, 1);

    assert_eq!(target.card(&a).unwrap().tags, vec!["Foo"]);
    assert_eq!(target_store.get(&a).await.unwrap().unwrap().tags, vec!["Foo"]);
    let listed: Vec<(String, bool)> = target
        .collections()
        .into_iter()
        .map(|c| (c.name, c.builtin))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("Dayseal".to_string(), true),
            ("Nightseal".to_string(), true),
            ("Maps".to_string(), false),
        ]
    );
    assert_eq!(target_store.load_collections().await.unwrap(), vec!["Maps"]);

    assert_eq!(target.delete_collection("maps").await.unwrap(), 0);
    let names: Vec<String> = target.collections().into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["Dayseal", "Nightseal"]);
    target.flush().await.unwrap();
}

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use common::*;
use workspace_file_index::{
    EntityId, EntityPointer, EntitySnapshot, EntityStorageKind, EntityType, IndexConfig, KindMask,
    LibraryRootData, ModuleContentRootData, NonExistingFileSetKind, NonIncrementalContributor,
    SnapshotBuilder, ThreeState, VfsEvent, WorkspaceFileIndex, WorkspaceFileInternalInfo,
    WorkspaceFileKind, WorkspaceFileSetRegistrar, WorkspaceModel,
};

fn owners(info: &WorkspaceFileInternalInfo) -> Vec<EntityPointer> {
    let mut owners: Vec<EntityPointer> = info.file_sets().iter().map(|set| set.owner()).collect();
    owners.sort();
    owners
}

fn file_info(index: &WorkspaceFileIndex, path: &str, honor_exclusion: bool) -> WorkspaceFileInternalInfo {
    index.read(|reader| reader.get_file_info_by_url(&url(path), KindMask::ALL, honor_exclusion))
}

#[test]
fn source_root_inside_content_root_resolves_both_owners() {
    let vfs = vfs_with(&["/proj/src/com/foo/Bar.java"]);
    let mut builder = SnapshotBuilder::new();
    let module = builder.add(ModuleEntity::new("app", &["/proj/src"]));
    let source_root = builder.add(SourceRootEntity::new(module, "/proj/src", ""));
    let index = index_with(vfs, builder.build());

    let info = file_info(&index, "/proj/src/com/foo/Bar.java", true);
    assert!(matches!(info, WorkspaceFileInternalInfo::Multiple(_)));
    assert!(info
        .file_sets()
        .iter()
        .all(|set| set.kind() == WorkspaceFileKind::Content));
    assert_eq!(owners(&info), vec![module, source_root]);

    index.read(|reader| {
        let file = reader
            .vfs()
            .find_file_by_url(&url("/proj/src/com/foo/Bar.java"))
            .expect("file exists");
        assert_eq!(reader.get_package_name(file).as_deref(), Some("com.foo"));
        assert_eq!(reader.find_containing_entities(file, true), vec![module, source_root]);
    });
}

#[test]
fn excluded_directory_depends_on_honor_exclusion() {
    let vfs = vfs_with(&["/proj/src/excluded/f", "/proj/src/kept"]);
    let mut builder = SnapshotBuilder::new();
    let module = builder.add(ModuleEntity::new("app", &["/proj/src"]).excluding(&["/proj/src/excluded"]));
    let index = index_with(vfs, builder.build());

    assert!(matches!(
        file_info(&index, "/proj/src/excluded/f", true),
        WorkspaceFileInternalInfo::Excluded
    ));
    let unfiltered = file_info(&index, "/proj/src/excluded/f", false);
    assert_eq!(owners(&unfiltered), vec![module]);
    assert_eq!(owners(&file_info(&index, "/proj/src/kept", true)), vec![module]);
}

#[test]
fn same_root_with_different_kinds_yields_multiple_sets() {
    let vfs = vfs_with(&["/shared/x.java"]);
    let mut builder = SnapshotBuilder::new();
    builder.add(ModuleEntity::new("app", &["/shared"]));
    builder.add(LibraryEntity {
        sources: vec!["file:///shared".to_string()],
        ..LibraryEntity::default()
    });
    let index = index_with(vfs, builder.build());

    let info = file_info(&index, "/shared/x.java", true);
    assert_eq!(info.file_sets().len(), 2);
    let library = info
        .find_file_set_with_custom_data::<LibraryRootData>()
        .expect("library set");
    assert_eq!(library.kind(), WorkspaceFileKind::ExternalSource);
    let module = info
        .find_file_set_with_custom_data::<ModuleContentRootData>()
        .expect("module set");
    assert_eq!(module.kind(), WorkspaceFileKind::Content);

    let content_only = index.read(|reader| {
        reader.get_file_info_by_url(&url("/shared/x.java"), KindMask::CONTENT, true)
    });
    assert!(matches!(content_only, WorkspaceFileInternalInfo::Single(_)));
}

#[test]
fn nearest_registration_wins() {
    let vfs = vfs_with(&["/proj/src/A.java", "/proj/README"]);
    let mut builder = SnapshotBuilder::new();
    let module = builder.add(ModuleEntity::new("app", &["/proj"]));
    let source_root = builder.add(SourceRootEntity::new(module, "/proj/src", ""));
    let index = index_with(vfs, builder.build());

    assert_eq!(owners(&file_info(&index, "/proj/src/A.java", true)), vec![source_root]);
    assert_eq!(owners(&file_info(&index, "/proj/README", true)), vec![module]);
    assert!(matches!(
        file_info(&index, "/elsewhere", true),
        WorkspaceFileInternalInfo::Invalid
    ));
}

#[test]
fn update_dirty_entities_is_idempotent() {
    let vfs = vfs_with(&["/proj/"]);
    let mut builder = SnapshotBuilder::new();
    let module = builder.add(ModuleEntity::new("app", &["/proj"]));
    let index = index_with(vfs, builder.build());

    index.write_action(|action| {
        action.mark_dirty([module], [url("/proj")]);
        assert!(action.update_dirty_entities());
        assert!(!action.update_dirty_entities());
    });
    assert_eq!(owners(&file_info(&index, "/proj", true)), vec![module]);
}

#[test]
fn missing_root_is_promoted_when_created() {
    let vfs = vfs_with(&["/proj/"]);
    let mut builder = SnapshotBuilder::new();
    let module = builder.add(ModuleEntity::new("app", &["/proj/gen"]));
    let index = index_with(vfs, builder.build());

    index.read(|reader| {
        let kinds = reader.get_non_existent_file_set_kinds(&url("/proj/gen"));
        assert_eq!(kinds, BTreeSet::from([NonExistingFileSetKind::IncludedContent]));
        assert_eq!(reader.is_url_in_content(&url("/proj/gen/Main.java")), ThreeState::Yes);
        assert_eq!(reader.is_url_in_content(&url("/proj/other")), ThreeState::No);
    });

    index
        .write_action(|action| {
            action.apply_vfs_events(&[
                VfsEvent::create_directory(url("/proj/gen")),
                VfsEvent::create_file(url("/proj/gen/Main.java")),
            ])
        })
        .expect("events apply");

    assert_eq!(owners(&file_info(&index, "/proj/gen/Main.java", true)), vec![module]);
    index.read(|reader| {
        assert!(reader.get_non_existent_file_set_kinds(&url("/proj/gen")).is_empty());
    });
}

#[test]
fn excluded_missing_root_answers_not_in_content() {
    let vfs = vfs_with(&["/proj/src/"]);
    let mut builder = SnapshotBuilder::new();
    builder.add(ModuleEntity::new("app", &["/proj"]).excluding(&["/proj/src/gen"]));
    let index = index_with(vfs, builder.build());

    index.read(|reader| {
        assert_eq!(reader.is_url_in_content(&url("/proj/src/gen/x")), ThreeState::No);
        assert_eq!(reader.is_url_in_content(&url("/proj/src/y")), ThreeState::Yes);
        assert_eq!(
            reader.is_url_in_content(&workspace_file_index::VirtualFileUrl::archive_root("/nowhere.jar")),
            ThreeState::Unsure
        );
    });
}

#[test]
fn adding_then_removing_an_entity_restores_the_store() {
    let vfs = vfs_with(&["/proj/", "/lib/classes/"]);
    let mut builder = SnapshotBuilder::new();
    builder.add(ModuleEntity::new("app", &["/proj"]));
    let base = builder.build();
    let index = index_with(vfs, base.clone());

    let counts = |index: &WorkspaceFileIndex| {
        index.read(|reader| {
            let storage = reader.storage().expect("initialized");
            (
                storage.file_sets.len(),
                storage.non_existing.len(),
                storage.url_cache.len(),
            )
        })
    };
    let before = counts(&index);

    let mut builder = base.to_builder();
    builder.add(LibraryEntity {
        classes: vec!["file:///lib/classes".to_string(), "file:///lib/missing".to_string()],
        ..LibraryEntity::default()
    });
    let with_library = builder.build();
    index.write_action(|action| action.replace_snapshot(EntityStorageKind::Main, with_library));
    assert_eq!(counts(&index), (before.0 + 1, before.1 + 1, before.2 + 1));

    index.write_action(|action| action.replace_snapshot(EntityStorageKind::Main, base));
    assert_eq!(counts(&index), before);
}

#[test]
fn parent_change_recomputes_dependent_children() {
    let vfs = vfs_with(&["/proj/test/T.java"]);
    let mut builder = SnapshotBuilder::new();
    let module = builder.add(ModuleEntity::new("app", &["/proj"]));
    builder.add(SourceRootEntity::new(module, "/proj/test", ""));
    let snapshot = builder.build();
    let index = index_with(vfs, snapshot.clone());

    let kind_of = |index: &WorkspaceFileIndex| {
        file_info(index, "/proj/test/T.java", true)
            .file_sets()
            .first()
            .map(|set| set.kind())
    };
    assert_eq!(kind_of(&index), Some(WorkspaceFileKind::Content));

    let mut builder = snapshot.to_builder();
    let mut test_module = ModuleEntity::new("app", &["/proj"]);
    test_module.test_module = true;
    assert!(builder.replace(module, test_module));
    let changed = builder.build();
    index.write_action(|action| action.replace_snapshot(EntityStorageKind::Main, changed));

    assert_eq!(kind_of(&index), Some(WorkspaceFileKind::TestContent));
}

#[test]
fn child_change_recomputes_the_parent() {
    init_logging();
    let vfs = vfs_with(&["/proj/gen/G.java", "/proj/src/A.java"]);
    let mut builder = SnapshotBuilder::new();
    let module = builder.add(ModuleEntity::new("app", &["/proj"]));
    let base = builder.build();
    let model = WorkspaceModel::new(vfs).with_snapshot(EntityStorageKind::Main, base.clone());
    let index = WorkspaceFileIndex::builder()
        .contributor(Arc::new(ModuleContributor))
        .contributor(Arc::new(FacetExclusionContributor))
        .build(model)
        .expect("valid configuration");
    index.initialize();
    assert!(file_info(&index, "/proj/gen/G.java", true).is_included());

    let mut builder = base.to_builder();
    builder.add(FacetEntity {
        module,
        excluded: "/proj/gen".to_string(),
    });
    let with_facet = builder.build();
    index.write_action(|action| action.replace_snapshot(EntityStorageKind::Main, with_facet));

    assert!(matches!(
        file_info(&index, "/proj/gen/G.java", true),
        WorkspaceFileInternalInfo::Excluded
    ));
    assert!(file_info(&index, "/proj/src/A.java", true).is_included());

    index.write_action(|action| action.replace_snapshot(EntityStorageKind::Main, base));
    assert!(file_info(&index, "/proj/gen/G.java", true).is_included());
}

#[test]
fn unloaded_registrations_live_beside_main_ones() {
    init_logging();
    let vfs = vfs_with(&["/proj/A.java"]);
    let mut builder = SnapshotBuilder::new();
    let module = builder.add(ModuleEntity::new("app", &["/proj"]));
    let snapshot = builder.build();
    let model = WorkspaceModel::new(vfs)
        .with_snapshot(EntityStorageKind::Main, snapshot.clone())
        .with_snapshot(EntityStorageKind::Unloaded, snapshot);
    let index = WorkspaceFileIndex::builder()
        .contributor(Arc::new(ModuleContributor))
        .contributor(Arc::new(UnloadedModuleContributor))
        .build(model)
        .expect("valid configuration");
    index.initialize();

    let info = file_info(&index, "/proj/A.java", true);
    assert_eq!(owners(&info), vec![module, module]);
    let kinds: BTreeSet<EntityStorageKind> = info.file_sets().iter().map(|set| set.storage_kind()).collect();
    assert_eq!(
        kinds,
        BTreeSet::from([EntityStorageKind::Main, EntityStorageKind::Unloaded])
    );

    index.write_action(|action| action.replace_snapshot(EntityStorageKind::Unloaded, EntitySnapshot::empty()));
    let info = file_info(&index, "/proj/A.java", true);
    assert!(matches!(info, WorkspaceFileInternalInfo::Single(_)));
    assert_eq!(info.file_sets()[0].storage_kind(), EntityStorageKind::Main);
}

#[test]
fn exclusion_condition_covers_matching_files_and_their_subtrees() {
    let vfs = vfs_with(&["/proj/tmp-out/a.txt", "/proj/src/tmp.rs", "/proj/src/keep.rs"]);
    let mut builder = SnapshotBuilder::new();
    let module = builder.add(ModuleEntity::new("app", &["/proj"]).excluding_names_starting_with("tmp"));
    let snapshot = builder.build();
    let index = index_with(vfs, snapshot.clone());

    for excluded in ["/proj/tmp-out/a.txt", "/proj/src/tmp.rs"] {
        assert!(
            matches!(file_info(&index, excluded, true), WorkspaceFileInternalInfo::Excluded),
            "{excluded} should be excluded"
        );
        assert!(file_info(&index, excluded, false).is_included());
    }
    assert!(file_info(&index, "/proj/src/keep.rs", true).is_included());

    let mut builder = snapshot.to_builder();
    assert!(builder.replace(module, ModuleEntity::new("app", &["/proj"])));
    let without_condition = builder.build();
    index.write_action(|action| action.replace_snapshot(EntityStorageKind::Main, without_condition));
    assert!(file_info(&index, "/proj/src/tmp.rs", true).is_included());
}

#[test]
fn root_moving_between_owners_in_one_transaction() {
    let vfs = vfs_with(&["/proj/f"]);
    let mut builder = SnapshotBuilder::new();
    let first = builder.add(ModuleEntity::new("first", &["/proj"]));
    let snapshot = builder.build();
    let index = index_with(vfs, snapshot.clone());

    let mut builder = snapshot.to_builder();
    builder.remove(first);
    let second = builder.add(ModuleEntity::new("second", &["/proj"]));
    let moved = builder.build();
    index.write_action(|action| action.replace_snapshot(EntityStorageKind::Main, moved));

    assert_eq!(owners(&file_info(&index, "/proj/f", true)), vec![second]);
}

#[test]
fn queries_before_initialization_report_not_under_roots() {
    init_logging();
    let vfs = vfs_with(&["/proj/f"]);
    let mut builder = SnapshotBuilder::new();
    builder.add(ModuleEntity::new("app", &["/proj"]));
    let model = WorkspaceModel::new(vfs).with_snapshot(EntityStorageKind::Main, builder.build());
    let index = WorkspaceFileIndex::builder()
        .contributor(Arc::new(ModuleContributor))
        .build(model)
        .expect("valid configuration");

    assert_eq!(index.state_name(), "not-initialized");
    assert!(matches!(
        file_info(&index, "/proj/f", true),
        WorkspaceFileInternalInfo::NotUnderRoots
    ));
    assert!(index.read(|reader| reader.get_directories_by_package_name("a", false).is_empty()));

    index.initialize();
    assert_eq!(index.state_name(), "active");
    assert!(file_info(&index, "/proj/f", true).is_included());
}

#[test]
fn reset_index_is_rebuilt_on_next_read() {
    let vfs = vfs_with(&["/proj/f"]);
    let mut builder = SnapshotBuilder::new();
    let module = builder.add(ModuleEntity::new("app", &["/proj"]));
    let index = index_with(vfs, builder.build());

    index.reset();
    assert_eq!(index.state_name(), "reset");
    assert_eq!(owners(&file_info(&index, "/proj/f", true)), vec![module]);
    assert_eq!(index.state_name(), "active");
}

#[test]
fn concurrent_readers_after_reset_agree() {
    let vfs = vfs_with(&["/proj/f"]);
    let mut builder = SnapshotBuilder::new();
    let module = builder.add(ModuleEntity::new("app", &["/proj"]));
    let index = index_with(vfs, builder.build());
    index.reset();

    let results: Vec<Vec<EntityPointer>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| owners(&file_info(&index, "/proj/f", true))))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("reader thread"))
            .collect()
    });
    assert!(results.iter().all(|result| *result == vec![module]));
    assert_eq!(index.state_name(), "active");
}

#[test]
fn ignored_names_shadow_registrations() {
    let vfs = vfs_with(&["/proj/.git/config", "/proj/cache.pyc", "/proj/ok"]);
    let mut builder = SnapshotBuilder::new();
    builder.add(ModuleEntity::new("app", &["/proj"]));
    let index = index_with(vfs, builder.build());

    assert!(matches!(
        file_info(&index, "/proj/.git/config", true),
        WorkspaceFileInternalInfo::Ignored
    ));
    assert!(matches!(
        file_info(&index, "/proj/cache.pyc", true),
        WorkspaceFileInternalInfo::Ignored
    ));
    assert!(file_info(&index, "/proj/ok", true).is_included());
}

#[test]
fn exclusion_patterns_veto_content_below_the_root() {
    let vfs = vfs_with(&["/proj/out.log", "/proj/build/x", "/proj/a.txt"]);
    let mut builder = SnapshotBuilder::new();
    builder.add(ModuleEntity::new("app", &["/proj"]).with_patterns(&["*.log", "build"]));
    let index = index_with(vfs, builder.build());

    assert!(matches!(
        file_info(&index, "/proj/out.log", true),
        WorkspaceFileInternalInfo::Excluded
    ));
    assert!(matches!(
        file_info(&index, "/proj/build/x", true),
        WorkspaceFileInternalInfo::Excluded
    ));
    assert!(file_info(&index, "/proj/a.txt", true).is_included());
    assert!(file_info(&index, "/proj", true).is_included());
    assert!(file_info(&index, "/proj/out.log", false).is_included());
}

#[test]
fn package_directories_and_files() {
    let vfs = vfs_with(&["/proj/java/util/File.java", "/proj/java/util/inner/", "/proj/java/Top.java"]);
    let mut builder = SnapshotBuilder::new();
    let module = builder.add(ModuleEntity::new("app", &["/proj"]));
    builder.add(SourceRootEntity::new(module, "/proj/java", "com.acme"));
    let index = index_with(vfs, builder.build());

    index.read(|reader| {
        let vfs = reader.vfs();
        let util = vfs.find_file_by_url(&url("/proj/java/util")).expect("util");
        let file = vfs
            .find_file_by_url(&url("/proj/java/util/File.java"))
            .expect("file");
        let java = vfs.find_file_by_url(&url("/proj/java")).expect("java");

        assert_eq!(reader.get_package_name(file).as_deref(), Some("com.acme.util"));
        assert_eq!(reader.get_package_name(java).as_deref(), Some("com.acme"));
        assert_eq!(&*reader.get_directories_by_package_name("com.acme.util", false), &[util]);
        assert_eq!(&*reader.get_directories_by_package_name("com.acme", false), &[java]);
        assert_eq!(&*reader.get_files_by_package_name("com.acme.util"), &[file]);
        assert!(reader.get_directories_by_package_name("org", false).is_empty());
    });
}

#[test]
fn package_files_skip_excluded_files() {
    let vfs = vfs_with(&[
        "/proj/java/util/File.java",
        "/proj/java/util/out.log",
        "/proj/java/util/Gen.java",
    ]);
    let mut builder = SnapshotBuilder::new();
    let module = builder.add(
        ModuleEntity::new("app", &["/proj"])
            .with_patterns(&["*.log"])
            .excluding(&["/proj/java/util/Gen.java"]),
    );
    builder.add(SourceRootEntity::new(module, "/proj/java", "com.acme"));
    let index = index_with(vfs, builder.build());

    for excluded in ["/proj/java/util/out.log", "/proj/java/util/Gen.java"] {
        assert!(matches!(
            file_info(&index, excluded, true),
            WorkspaceFileInternalInfo::Excluded
        ));
    }
    index.read(|reader| {
        let vfs = reader.vfs();
        let util = vfs.find_file_by_url(&url("/proj/java/util")).expect("util");
        let file = vfs
            .find_file_by_url(&url("/proj/java/util/File.java"))
            .expect("file");

        assert_eq!(&*reader.get_directories_by_package_name("com.acme.util", false), &[util]);
        assert_eq!(&*reader.get_files_by_package_name("com.acme.util"), &[file]);
    });
}

#[test]
fn library_sources_are_opt_in_for_package_directories() {
    let vfs = vfs_with(&["/src-lib/org/x/Y.java"]);
    let mut builder = SnapshotBuilder::new();
    builder.add(LibraryEntity {
        sources: vec!["file:///src-lib".to_string()],
        ..LibraryEntity::default()
    });
    let index = index_with(vfs, builder.build());

    index.read(|reader| {
        assert!(reader.get_directories_by_package_name("org.x", false).is_empty());
        assert_eq!(reader.get_directories_by_package_name("org.x", true).len(), 1);
    });
}

#[test]
fn multi_release_archive_versions_share_packages() {
    let vfs = vfs_with(&[
        "/lib/a.jar",
        "jar:///lib/a.jar!/com/x/Y.class",
        "jar:///lib/a.jar!/META-INF/versions/11/com/x/Z.class",
        "jar:///lib/a.jar!/META-INF/versions/8/com/x/Old.class",
    ]);
    let mut builder = SnapshotBuilder::new();
    builder.add(LibraryEntity {
        classes: vec!["jar:///lib/a.jar!/".to_string()],
        ..LibraryEntity::default()
    });
    let index = index_with(vfs, builder.build());

    index.read(|reader| {
        let vfs = reader.vfs();
        let find = |raw: &str| {
            vfs.find_file_by_url(&workspace_file_index::VirtualFileUrl::parse(raw).expect("url"))
                .expect("file exists")
        };
        let y = find("jar:///lib/a.jar!/com/x/Y.class");
        let z = find("jar:///lib/a.jar!/META-INF/versions/11/com/x/Z.class");
        let old = find("jar:///lib/a.jar!/META-INF/versions/8/com/x/Old.class");

        let info = reader.get_file_info(y, KindMask::ALL, true);
        assert_eq!(info.file_sets()[0].kind(), WorkspaceFileKind::External);
        assert_eq!(reader.get_package_name(y).as_deref(), Some("com.x"));
        assert_eq!(reader.get_package_name(z).as_deref(), Some("com.x"));
        assert_eq!(
            reader.get_package_name(old).as_deref(),
            Some("META-INF.versions.8.com.x")
        );

        let dirs = reader.get_directories_by_package_name("com.x", false);
        assert_eq!(dirs.len(), 2);
        assert!(dirs.contains(&vfs.parent(y).expect("parent")));
        assert!(dirs.contains(&vfs.parent(z).expect("parent")));
    });
}

#[test]
fn non_incremental_contributors_are_queried_and_visited() {
    init_logging();
    let vfs = vfs_with(&["/sdk/rt/String.class", "/proj/f"]);
    let mut builder = SnapshotBuilder::new();
    let module = builder.add(ModuleEntity::new("app", &["/proj"]));
    let sdk = EntityPointer::new(workspace_file_index::EntityType::new("sdk"), workspace_file_index::EntityId::new(0));
    let model = WorkspaceModel::new(vfs).with_snapshot(EntityStorageKind::Main, builder.build());
    let index = WorkspaceFileIndex::builder()
        .contributor(Arc::new(ModuleContributor))
        .non_incremental_contributor(Arc::new(SdkContributor {
            owner: sdk,
            roots: vec!["/sdk".to_string()],
        }))
        .build(model)
        .expect("valid configuration");
    index.initialize();

    let info = file_info(&index, "/sdk/rt/String.class", true);
    assert_eq!(owners(&info), vec![sdk]);
    assert_eq!(info.file_sets()[0].kind(), WorkspaceFileKind::External);

    let mut visited = Vec::new();
    index.read(|reader| reader.visit_file_sets(|set| visited.push(set.owner())));
    visited.sort();
    assert_eq!(visited, vec![module, sdk]);
}

/// Keeps content out of fixed roots without per-entity tracking.
struct ContentExclusions {
    owner: EntityPointer,
    roots: Vec<&'static str>,
}

impl NonIncrementalContributor for ContentExclusions {
    fn name(&self) -> &str {
        "content-exclusions"
    }

    fn register_file_sets(&self, registrar: &mut dyn WorkspaceFileSetRegistrar, _snapshot: &EntitySnapshot) {
        for root in &self.roots {
            registrar.register_excluded_root(&url(root), KindMask::CONTENT, self.owner);
        }
    }
}

#[test]
fn non_incremental_exclusion_vetoes_content_granted_at_the_same_root() {
    init_logging();
    let vfs = vfs_with(&["/proj/f"]);
    let mut builder = SnapshotBuilder::new();
    builder.add(ModuleEntity::new("app", &["/proj"]));
    let owner = EntityPointer::new(EntityType::new("generated"), EntityId::new(0));
    let model = WorkspaceModel::new(vfs).with_snapshot(EntityStorageKind::Main, builder.build());
    let index = WorkspaceFileIndex::builder()
        .contributor(Arc::new(ModuleContributor))
        .non_incremental_contributor(Arc::new(ContentExclusions {
            owner,
            roots: vec!["/proj"],
        }))
        .build(model)
        .expect("valid configuration");
    index.initialize();

    assert!(matches!(
        file_info(&index, "/proj/f", true),
        WorkspaceFileInternalInfo::Excluded
    ));
    let unfiltered = file_info(&index, "/proj/f", false);
    assert_eq!(unfiltered.file_sets().len(), 1);
    assert_eq!(unfiltered.file_sets()[0].kind(), WorkspaceFileKind::Content);
}

#[test]
fn content_iteration_skips_excluded_and_ignored() {
    let vfs = vfs_with(&["/proj/a", "/proj/out/b", "/proj/src/c", "/proj/.git/HEAD"]);
    let mut builder = SnapshotBuilder::new();
    builder.add(ModuleEntity::new("app", &["/proj"]).excluding(&["/proj/out"]));
    let index = index_with(vfs, builder.build());

    index.read(|reader| {
        let vfs = reader.vfs();
        let root = vfs.find_file_by_url(&url("/proj")).expect("root");
        let mut visited = BTreeSet::new();
        assert!(reader.process_content_files(root, KindMask::CONTENT, |file| {
            visited.insert(vfs.url_of(file).expect("live file").to_string());
            true
        }));
        let expected: BTreeSet<String> = ["/proj", "/proj/a", "/proj/src", "/proj/src/c"]
            .into_iter()
            .map(|path| url(path).to_string())
            .collect();
        assert_eq!(visited, expected);
    });
}

#[test]
fn content_iteration_aborts_on_runaway_alternation() {
    init_logging();
    let vfs = vfs_with(&["/p/x/y/z"]);
    let mut builder = SnapshotBuilder::new();
    builder.add(ModuleEntity::new("outer", &["/p"]).excluding(&["/p/x"]));
    builder.add(ModuleEntity::new("inner", &["/p/x/y"]));
    let snapshot: EntitySnapshot = builder.build();
    let model = WorkspaceModel::new(vfs).with_snapshot(EntityStorageKind::Main, snapshot);
    let config = IndexConfig {
        max_exclusion_alternations: 1,
        ..IndexConfig::default()
    };
    let index = WorkspaceFileIndex::builder()
        .config(config)
        .contributor(Arc::new(ModuleContributor))
        .build(model)
        .expect("valid configuration");
    index.initialize();

    index.read(|reader| {
        let root = reader.vfs().find_file_by_url(&url("/p")).expect("root");
        let mut visited = 0;
        let completed = reader.process_content_files(root, KindMask::CONTENT, |_| {
            visited += 1;
            true
        });
        assert!(!completed);
        assert_eq!(visited, 1);
    });
}

#[test]
fn invalid_configuration_is_rejected() {
    let config = IndexConfig {
        ignored_file_patterns: vec!["[".to_string()],
        ..IndexConfig::default()
    };
    let result = WorkspaceFileIndex::builder()
        .config(config)
        .build(WorkspaceModel::default());
    assert!(result.is_err());
}

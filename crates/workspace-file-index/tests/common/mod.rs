//! Entities and contributors shared by the integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use workspace_file_index::contributor::DependencyDescription;
use workspace_file_index::vfs::VirtualFileRef;
use workspace_file_index::{
    EntityPointer, EntityRef, EntitySnapshot, EntityType, KindMask, LegacyRootsChangeListener,
    LibraryRootData, ModuleContentRootData, ModuleSourceRootData, NoFileSetData,
    EntityStorageKind, NonIncrementalContributor, VirtualFileSystem, VirtualFileUrl,
    WorkspaceEntity, WorkspaceFileIndex, WorkspaceFileIndexContributor, WorkspaceFileKind,
    WorkspaceFileSetRegistrar, WorkspaceModel,
};

pub const MODULE: EntityType = EntityType::new("module");
pub const SOURCE_ROOT: EntityType = EntityType::new("source_root");
pub const LIBRARY: EntityType = EntityType::new("library");
pub const FACET: EntityType = EntityType::new("facet");

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub fn url(path: &str) -> VirtualFileUrl {
    VirtualFileUrl::from_path(path)
}

/// Accepts either a full URL or a plain local path.
pub fn any_url(raw: &str) -> VirtualFileUrl {
    if raw.contains("://") {
        VirtualFileUrl::parse(raw).expect("valid url")
    } else {
        url(raw)
    }
}

/// Builds a tree from paths or URLs; a trailing `/` marks a directory.
pub fn vfs_with(paths: &[&str]) -> VirtualFileSystem {
    let mut vfs = VirtualFileSystem::new();
    for path in paths {
        match path.strip_suffix('/') {
            Some(dir) => {
                vfs.create_directory(&any_url(dir)).expect("create directory");
            }
            None => {
                vfs.create_file(&any_url(path)).expect("create file");
            }
        }
    }
    vfs
}

#[derive(Debug, Clone, Default)]
pub struct ModuleEntity {
    pub name: String,
    pub content_roots: Vec<String>,
    pub excluded_roots: Vec<String>,
    pub exclude_patterns: Vec<String>,
    /// Files named with this prefix, or below such a directory, are excluded.
    pub excluded_name_prefix: Option<String>,
    /// Source roots of test modules register as test content.
    pub test_module: bool,
}

impl ModuleEntity {
    pub fn new(name: &str, content_roots: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            content_roots: content_roots.iter().map(|root| root.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn excluding(mut self, roots: &[&str]) -> Self {
        self.excluded_roots = roots.iter().map(|root| root.to_string()).collect();
        self
    }

    pub fn with_patterns(mut self, patterns: &[&str]) -> Self {
        self.exclude_patterns = patterns.iter().map(|pattern| pattern.to_string()).collect();
        self
    }

    pub fn excluding_names_starting_with(mut self, prefix: &str) -> Self {
        self.excluded_name_prefix = Some(prefix.to_string());
        self
    }
}

impl WorkspaceEntity for ModuleEntity {
    fn entity_type(&self) -> EntityType {
        MODULE
    }
}

#[derive(Debug, Clone)]
pub struct SourceRootEntity {
    pub module: EntityPointer,
    pub root: String,
    pub package_prefix: String,
}

impl SourceRootEntity {
    pub fn new(module: EntityPointer, root: &str, package_prefix: &str) -> Self {
        Self {
            module,
            root: root.to_string(),
            package_prefix: package_prefix.to_string(),
        }
    }
}

impl WorkspaceEntity for SourceRootEntity {
    fn entity_type(&self) -> EntityType {
        SOURCE_ROOT
    }
}

#[derive(Debug, Clone, Default)]
pub struct LibraryEntity {
    pub classes: Vec<String>,
    pub sources: Vec<String>,
    /// Directories whose archives are all library roots.
    pub archive_directories: Vec<String>,
}

impl WorkspaceEntity for LibraryEntity {
    fn entity_type(&self) -> EntityType {
        LIBRARY
    }
}

pub struct ModuleContributor;

impl WorkspaceFileIndexContributor for ModuleContributor {
    fn entity_type(&self) -> EntityType {
        MODULE
    }

    fn register_file_sets(
        &self,
        entity: EntityRef<'_>,
        registrar: &mut dyn WorkspaceFileSetRegistrar,
        _snapshot: &EntitySnapshot,
    ) {
        let Some(module) = entity.downcast::<ModuleEntity>() else {
            return;
        };
        for root in &module.content_roots {
            let root = url(root);
            registrar.register_file_set(
                &root,
                WorkspaceFileKind::Content,
                entity.pointer,
                Arc::new(ModuleContentRootData {
                    module: entity.pointer,
                }),
            );
            if !module.exclude_patterns.is_empty() {
                registrar.register_exclusion_patterns(&root, &module.exclude_patterns, entity.pointer);
            }
            if let Some(prefix) = &module.excluded_name_prefix {
                let prefix = prefix.clone();
                registrar.register_exclusion_condition(
                    &root,
                    Arc::new(move |file: VirtualFileRef<'_>| file.name().starts_with(prefix.as_str())),
                    entity.pointer,
                );
            }
        }
        for excluded in &module.excluded_roots {
            registrar.register_excluded_root(&url(excluded), KindMask::ALL, entity.pointer);
        }
    }
}

pub struct SourceRootContributor;

impl WorkspaceFileIndexContributor for SourceRootContributor {
    fn entity_type(&self) -> EntityType {
        SOURCE_ROOT
    }

    fn register_file_sets(
        &self,
        entity: EntityRef<'_>,
        registrar: &mut dyn WorkspaceFileSetRegistrar,
        snapshot: &EntitySnapshot,
    ) {
        let Some(source_root) = entity.downcast::<SourceRootEntity>() else {
            return;
        };
        let module = source_root.module.resolve_as::<ModuleEntity>(snapshot);
        let test = module.is_some_and(|module| module.test_module);
        let kind = if test {
            WorkspaceFileKind::TestContent
        } else {
            WorkspaceFileKind::Content
        };
        let root = url(&source_root.root);
        // Module patterns hold inside nested source roots too.
        if let Some(module) = module.filter(|module| !module.exclude_patterns.is_empty()) {
            registrar.register_exclusion_patterns(&root, &module.exclude_patterns, entity.pointer);
        }
        registrar.register_file_set(
            &root,
            kind,
            entity.pointer,
            Arc::new(ModuleSourceRootData {
                module: source_root.module,
                package_prefix: source_root.package_prefix.clone(),
                root_type: if test { "java-test" } else { "java-source" }.to_string(),
            }),
        );
    }

    fn dependencies_on_other_entities(&self) -> Vec<DependencyDescription> {
        vec![DependencyDescription::OnParent {
            parent_type: MODULE,
            children: Arc::new(|module: EntityRef<'_>, snapshot: &EntitySnapshot| {
                snapshot
                    .entities_of_type(SOURCE_ROOT)
                    .filter(|pointer| {
                        pointer
                            .resolve_as::<SourceRootEntity>(snapshot)
                            .is_some_and(|root| root.module == module.pointer)
                    })
                    .collect()
            }),
        }]
    }
}

/// Registers the same content roots as [`ModuleContributor`] for modules of
/// the unloaded snapshot.
pub struct UnloadedModuleContributor;

impl WorkspaceFileIndexContributor for UnloadedModuleContributor {
    fn entity_type(&self) -> EntityType {
        MODULE
    }

    fn storage_kind(&self) -> EntityStorageKind {
        EntityStorageKind::Unloaded
    }

    fn register_file_sets(
        &self,
        entity: EntityRef<'_>,
        registrar: &mut dyn WorkspaceFileSetRegistrar,
        snapshot: &EntitySnapshot,
    ) {
        ModuleContributor.register_file_sets(entity, registrar, snapshot);
    }
}

/// A module facet that keeps one directory out of the module.
#[derive(Debug, Clone)]
pub struct FacetEntity {
    pub module: EntityPointer,
    pub excluded: String,
}

impl WorkspaceEntity for FacetEntity {
    fn entity_type(&self) -> EntityType {
        FACET
    }
}

/// Registers, on the module's behalf, the directories its facets exclude.
pub struct FacetExclusionContributor;

impl WorkspaceFileIndexContributor for FacetExclusionContributor {
    fn entity_type(&self) -> EntityType {
        MODULE
    }

    fn register_file_sets(
        &self,
        entity: EntityRef<'_>,
        registrar: &mut dyn WorkspaceFileSetRegistrar,
        snapshot: &EntitySnapshot,
    ) {
        let facets = snapshot
            .entities_of_type(FACET)
            .filter_map(|pointer| pointer.resolve_as::<FacetEntity>(snapshot))
            .filter(|facet| facet.module == entity.pointer);
        for facet in facets {
            registrar.register_excluded_root(&url(&facet.excluded), KindMask::ALL, entity.pointer);
        }
    }

    fn dependencies_on_other_entities(&self) -> Vec<DependencyDescription> {
        vec![DependencyDescription::OnChild {
            child_type: FACET,
            parent: Arc::new(|facet: EntityRef<'_>, _snapshot: &EntitySnapshot| {
                facet.downcast::<FacetEntity>().map(|facet| facet.module)
            }),
        }]
    }
}

pub struct LibraryContributor;

impl WorkspaceFileIndexContributor for LibraryContributor {
    fn entity_type(&self) -> EntityType {
        LIBRARY
    }

    fn register_file_sets(
        &self,
        entity: EntityRef<'_>,
        registrar: &mut dyn WorkspaceFileSetRegistrar,
        _snapshot: &EntitySnapshot,
    ) {
        let Some(library) = entity.downcast::<LibraryEntity>() else {
            return;
        };
        for root in &library.classes {
            registrar.register_file_set(
                &VirtualFileUrl::parse(root).expect("library url"),
                WorkspaceFileKind::External,
                entity.pointer,
                Arc::new(LibraryRootData),
            );
        }
        for root in &library.sources {
            registrar.register_file_set(
                &VirtualFileUrl::parse(root).expect("library url"),
                WorkspaceFileKind::ExternalSource,
                entity.pointer,
                Arc::new(LibraryRootData),
            );
        }
        for dir in &library.archive_directories {
            registrar.register_archive_container(
                &url(dir),
                true,
                WorkspaceFileKind::External,
                entity.pointer,
                Arc::new(LibraryRootData),
            );
        }
    }
}

/// Registers fixed SDK roots without per-entity tracking.
pub struct SdkContributor {
    pub owner: EntityPointer,
    pub roots: Vec<String>,
}

impl NonIncrementalContributor for SdkContributor {
    fn name(&self) -> &str {
        "sdk"
    }

    fn register_file_sets(&self, registrar: &mut dyn WorkspaceFileSetRegistrar, _snapshot: &EntitySnapshot) {
        for root in &self.roots {
            registrar.register_file_set(
                &url(root),
                WorkspaceFileKind::External,
                self.owner,
                Arc::new(NoFileSetData),
            );
        }
    }
}

/// Records every notification it receives.
#[derive(Default)]
pub struct RecordingListener {
    pub notified: Mutex<Vec<EntityPointer>>,
}

impl LegacyRootsChangeListener for RecordingListener {
    fn entity_type(&self) -> EntityType {
        MODULE
    }

    fn roots_changed(&self, entities: &[EntityPointer]) {
        self.notified
            .lock()
            .expect("listener lock")
            .extend_from_slice(entities);
    }
}

/// An initialized index over `vfs` and `snapshot` with the standard contributors.
pub fn index_with(vfs: VirtualFileSystem, snapshot: EntitySnapshot) -> WorkspaceFileIndex {
    init_logging();
    let model = WorkspaceModel::new(vfs).with_snapshot(EntityStorageKind::Main, snapshot);
    let index = WorkspaceFileIndex::builder()
        .contributor(Arc::new(ModuleContributor))
        .contributor(Arc::new(SourceRootContributor))
        .contributor(Arc::new(LibraryContributor))
        .build(model)
        .expect("valid configuration");
    index.initialize();
    index
}

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use tidy_explorer::{
    ConfigScope, ConfigurationChange, Explorer, ExplorerConfig, ExplorerError, FileIndex,
    IndexChange, MemoryFileSource, SelectorKey, SelectorSetting, StateTarget, WorkspaceFolder,
};
use tidy_file_index::ExcludeFilter;
use tidy_selectors::{
    ConfigurationService, JsonFileStore, MemoryConfiguration, ScopeRegistry, StateStores,
};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};

const POCKETS: &str = "tidyExplorer";
const EXCLUDE: &str = "files.exclude";
const GLOBAL_SRC: &str = "[Global]...src/**";
const APP_SRC: &str = "[file:///ws/app]...src/**";

struct Fixture {
    config: Arc<MemoryConfiguration>,
    source: Arc<MemoryFileSource>,
    explorer: Arc<Explorer>,
    changes: mpsc::UnboundedReceiver<IndexChange>,
}

fn app() -> WorkspaceFolder {
    WorkspaceFolder::new("app", "/ws/app")
}

fn lib() -> WorkspaceFolder {
    WorkspaceFolder::new("lib", "/ws/lib")
}

fn global_src() -> SelectorKey {
    SelectorKey::new(ConfigScope::Global, "src/**")
}

fn app_src() -> SelectorKey {
    SelectorKey::new(app().scope(), "src/**")
}

async fn declared_config() -> Arc<MemoryConfiguration> {
    let config = Arc::new(MemoryConfiguration::new());
    config
        .set(
            ConfigScope::Global,
            POCKETS,
            json!({ "pockets": [{ "name": "Sources", "selectors": ["src/**"] }] }),
        )
        .await;
    config
        .set(
            app().scope(),
            POCKETS,
            json!({ "pockets": [{ "name": "App", "selectors": ["src/**", "docs/**"] }] }),
        )
        .await;
    config
}

async fn fixture_with(
    config: Arc<MemoryConfiguration>,
    folders: Vec<WorkspaceFolder>,
    stores: StateStores,
) -> Fixture {
    let filter = ExcludeFilter::new(config.clone(), EXCLUDE, ScopeRegistry::new(folders.clone()));
    let source = Arc::new(MemoryFileSource::new(Arc::new(filter)));
    for file in [
        "/ws/app/src/main.rs",
        "/ws/app/src/gen/out.rs",
        "/ws/app/docs/guide.md",
        "/ws/app/README.md",
        "/ws/lib/src/lib.rs",
    ] {
        source.create_file(file).await;
    }

    let (explorer, changes) = Explorer::new(
        ExplorerConfig::default(),
        folders,
        config.clone(),
        stores,
        source.clone(),
    );
    explorer.reload().await.unwrap();

    Fixture {
        config,
        source,
        explorer: Arc::new(explorer),
        changes,
    }
}

async fn fixture() -> Fixture {
    fixture_with(declared_config().await, vec![app(), lib()], StateStores::in_memory()).await
}

async fn json_stores(dir: &Path) -> StateStores {
    StateStores::new(
        Arc::new(JsonFileStore::open(dir.join("global.json")).await.unwrap()),
        Arc::new(JsonFileStore::open(dir.join("workspace.json")).await.unwrap()),
    )
}

async fn eventually(explorer: &Explorer, check: impl Fn(&FileIndex) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if check(&*explorer.index().await) {
            return true;
        }
        if Instant::now() > deadline {
            return false;
        }
        sleep(Duration::from_millis(10)).await;
    }
}

fn has(index: &FileIndex, relative: &str) -> bool {
    index.find(relative).is_some()
}

#[tokio::test]
async fn test_nothing_displayed_after_first_reload() {
    let fx = fixture().await;

    assert!(fx.explorer.subscribed().await.is_empty());
    assert!(fx.explorer.index().await.is_empty());
    assert_eq!(fx.config.write_count(), 0);
}

#[tokio::test]
async fn test_display_inherits_and_hidden_vetoes() {
    let mut fx = fixture().await;

    let changed = fx
        .explorer
        .set_selector_state(SelectorSetting::Display, &StateTarget::Selector(global_src()))
        .await
        .unwrap();
    assert_eq!(changed, vec![global_src()]);
    assert_eq!(fx.explorer.subscribed().await, vec![GLOBAL_SRC, APP_SRC]);
    {
        let index = fx.explorer.index().await;
        assert!(has(&index, "app/src/main.rs"));
        assert!(has(&index, "lib/src/lib.rs"));
        assert!(!has(&index, "app/README.md"));

        let main = index.find("app/src/main.rs").unwrap();
        let globs: Vec<&str> = index.node(main).unwrap().globs().collect();
        assert_eq!(globs, vec![GLOBAL_SRC, APP_SRC]);
    }
    assert_eq!(fx.changes.recv().await, Some(IndexChange::FullRefresh));

    fx.explorer
        .set_selector_state(SelectorSetting::Hidden, &StateTarget::Selector(app_src()))
        .await
        .unwrap();

    let exclude = fx.config.inspect(&app().scope(), EXCLUDE).await.unwrap();
    assert_eq!(exclude, Some(json!({ "src/**": true })));
    assert_eq!(fx.explorer.subscribed().await, vec![GLOBAL_SRC]);
    assert_eq!(
        fx.explorer.effective_setting(&app().scope(), "src/**").await,
        Some(SelectorSetting::Hidden)
    );

    assert!(
        eventually(&fx.explorer, |index| !has(index, "app/src")
            && has(index, "lib/src/lib.rs"))
        .await
    );
    assert_eq!(fx.explorer.caches().ids().await, vec![GLOBAL_SRC]);
}

#[tokio::test]
async fn test_pocket_target_applies_to_every_selector() {
    let fx = fixture().await;

    let target = StateTarget::Pocket {
        scope: app().scope(),
        name: "App".into(),
    };
    let changed = fx
        .explorer
        .set_selector_state(SelectorSetting::Display, &target)
        .await
        .unwrap();

    assert_eq!(changed.len(), 2);
    let index = fx.explorer.index().await;
    assert!(has(&index, "app/src/main.rs"));
    assert!(has(&index, "app/docs/guide.md"));
    assert!(!has(&index, "lib/src/lib.rs"));
}

#[tokio::test]
async fn test_created_file_reaches_the_index() {
    let fx = fixture().await;
    fx.explorer
        .set_selector_state(SelectorSetting::Display, &StateTarget::Selector(app_src()))
        .await
        .unwrap();

    fx.source.create_file("/ws/app/src/new.rs").await;
    fx.source.create_file("/ws/app/notes.txt").await;

    assert!(eventually(&fx.explorer, |index| has(index, "app/src/new.rs")).await);
    assert!(!has(&*fx.explorer.index().await, "app/notes.txt"));

    fx.source.delete_file(Path::new("/ws/app/src/gen")).await;
    assert!(eventually(&fx.explorer, |index| !has(index, "app/src/gen")).await);
    assert!(has(&*fx.explorer.index().await, "app/src/main.rs"));
}

#[tokio::test]
async fn test_exclude_change_prunes_the_index() {
    let fx = fixture().await;
    fx.explorer
        .set_selector_state(SelectorSetting::Display, &StateTarget::Selector(global_src()))
        .await
        .unwrap();
    assert!(has(&*fx.explorer.index().await, "app/src/gen/out.rs"));

    fx.config
        .set(ConfigScope::Workspace, EXCLUDE, json!({ "src/gen/**": true }))
        .await;
    fx.explorer
        .on_configuration_changed(&ConfigurationChange::new([EXCLUDE]))
        .await
        .unwrap();

    assert!(
        fx.explorer
            .is_default_exclude(&ConfigScope::Workspace, "Default Excludes")
            .await
    );
    assert!(
        fx.explorer
            .is_default_hidden(&SelectorKey::new(ConfigScope::Workspace, "src/gen/**"))
            .await
    );
    assert!(
        eventually(&fx.explorer, |index| !has(index, "app/src/gen")
            && has(index, "app/src/main.rs"))
        .await
    );
}

#[tokio::test]
async fn test_pocket_and_exclude_change_prunes_the_index() {
    let fx = fixture().await;
    fx.explorer
        .set_selector_state(SelectorSetting::Display, &StateTarget::Selector(global_src()))
        .await
        .unwrap();
    assert!(has(&*fx.explorer.index().await, "app/src/gen/out.rs"));

    fx.config
        .set(
            ConfigScope::Workspace,
            POCKETS,
            json!({ "pockets": [{ "name": "Generated", "selectors": ["src/gen/**"] }] }),
        )
        .await;
    fx.config
        .set(ConfigScope::Workspace, EXCLUDE, json!({ "src/gen/**": true }))
        .await;
    fx.explorer
        .on_configuration_changed(&ConfigurationChange::new([POCKETS, EXCLUDE]))
        .await
        .unwrap();

    assert_eq!(
        fx.explorer
            .effective_setting(&ConfigScope::Workspace, "src/gen/**")
            .await,
        Some(SelectorSetting::Hidden)
    );
    assert!(
        eventually(&fx.explorer, |index| !has(index, "app/src/gen")
            && has(index, "app/src/main.rs"))
        .await
    );
}

#[tokio::test]
async fn test_passes_complete_in_arrival_order() {
    let fx = fixture().await;
    fx.source.hold_scans();

    let display = tokio::spawn({
        let explorer = fx.explorer.clone();
        async move {
            explorer
                .set_selector_state(SelectorSetting::Display, &StateTarget::Selector(app_src()))
                .await
        }
    });
    let deadline = Instant::now() + Duration::from_secs(2);
    while fx.source.scan_count() == 0 && Instant::now() < deadline {
        sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(fx.source.scan_count(), 1);

    let hide = tokio::spawn({
        let explorer = fx.explorer.clone();
        async move {
            explorer
                .set_selector_state(SelectorSetting::Hidden, &StateTarget::Selector(app_src()))
                .await
        }
    });
    sleep(Duration::from_millis(50)).await;
    assert!(!display.is_finished());
    assert!(!hide.is_finished());
    assert_eq!(fx.config.write_count(), 0);

    fx.source.release_scans();
    assert_eq!(display.await.unwrap().unwrap(), vec![app_src()]);
    assert_eq!(hide.await.unwrap().unwrap(), vec![app_src()]);

    assert_eq!(
        fx.explorer.effective_setting(&app().scope(), "src/**").await,
        Some(SelectorSetting::Hidden)
    );
    assert_eq!(
        fx.config.inspect(&app().scope(), EXCLUDE).await.unwrap(),
        Some(json!({ "src/**": true }))
    );
    assert!(fx.explorer.subscribed().await.is_empty());
    assert!(fx.explorer.caches().ids().await.is_empty());
    assert!(fx.explorer.index().await.is_empty());
}

#[tokio::test]
async fn test_unrelated_change_is_ignored() {
    let fx = fixture().await;
    fx.explorer
        .on_configuration_changed(&ConfigurationChange::new(["editor.fontSize"]))
        .await
        .unwrap();

    assert!(fx.explorer.subscribed().await.is_empty());
    assert_eq!(fx.source.scan_count(), 0);
}

#[tokio::test]
async fn test_pocket_change_reloads_declarations() {
    let fx = fixture().await;
    fx.config
        .set(
            lib().scope(),
            POCKETS,
            json!({ "pockets": [{ "name": "Lib", "selectors": ["src/**"] }] }),
        )
        .await;

    fx.explorer
        .on_configuration_changed(&ConfigurationChange::new([POCKETS]))
        .await
        .unwrap();
    fx.explorer
        .set_selector_state(
            SelectorSetting::Display,
            &StateTarget::Selector(SelectorKey::new(lib().scope(), "src/**")),
        )
        .await
        .unwrap();

    assert_eq!(fx.explorer.subscribed().await, vec!["[file:///ws/lib]...src/**"]);
    assert!(has(&*fx.explorer.index().await, "lib/src/lib.rs"));
}

#[tokio::test]
async fn test_workspace_folders_change_rebuilds_index() {
    let fx = fixture_with(declared_config().await, vec![app()], StateStores::in_memory()).await;
    fx.explorer
        .set_selector_state(SelectorSetting::Display, &StateTarget::Selector(global_src()))
        .await
        .unwrap();
    assert!(!has(&*fx.explorer.index().await, "lib/src/lib.rs"));

    fx.explorer
        .set_workspace_folders(vec![app(), lib()])
        .await
        .unwrap();

    let index = fx.explorer.index().await;
    assert!(has(&index, "app/src/main.rs"));
    assert!(has(&index, "lib/src/lib.rs"));
}

#[tokio::test]
async fn test_removed_folder_drops_its_selectors() {
    let fx = fixture().await;
    fx.explorer
        .set_selector_state(SelectorSetting::Display, &StateTarget::Selector(app_src()))
        .await
        .unwrap();

    fx.explorer.set_workspace_folders(vec![lib()]).await.unwrap();

    assert!(fx.explorer.subscribed().await.is_empty());
    assert!(fx.explorer.index().await.is_empty());

    let changed = fx
        .explorer
        .set_selector_state(SelectorSetting::Display, &StateTarget::Selector(app_src()))
        .await
        .unwrap();
    assert!(changed.is_empty());
}

#[tokio::test]
async fn test_dispose_stops_everything() {
    let fx = fixture().await;
    fx.explorer
        .set_selector_state(SelectorSetting::Display, &StateTarget::Selector(global_src()))
        .await
        .unwrap();

    fx.explorer.dispose().await;

    assert!(fx.explorer.is_disposed());
    assert!(fx.explorer.subscribed().await.is_empty());
    assert!(fx.explorer.caches().ids().await.is_empty());
    assert!(fx.explorer.index().await.is_empty());
    assert!(matches!(fx.explorer.reload().await, Err(ExplorerError::Disposed)));

    fx.source.create_file("/ws/app/src/late.rs").await;
    sleep(Duration::from_millis(50)).await;
    assert!(fx.explorer.index().await.is_empty());
}

#[tokio::test]
async fn test_dispose_abandons_pending_scan() {
    let fx = fixture().await;
    fx.source.hold_scans();

    let pass = tokio::spawn({
        let explorer = fx.explorer.clone();
        async move {
            explorer
                .set_selector_state(SelectorSetting::Display, &StateTarget::Selector(app_src()))
                .await
        }
    });
    let deadline = Instant::now() + Duration::from_secs(2);
    while fx.source.scan_count() == 0 && Instant::now() < deadline {
        sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(fx.source.scan_count(), 1);

    fx.explorer.dispose().await;
    let _ = pass.await.unwrap();
    fx.source.release_scans();

    assert!(fx.explorer.subscribed().await.is_empty());
    assert!(fx.explorer.index().await.is_empty());
}

#[tokio::test]
async fn test_display_state_survives_restart() {
    let dir = TempDir::new().unwrap();

    let config = declared_config().await;
    let stores = json_stores(dir.path()).await;
    let first = fixture_with(config.clone(), vec![app(), lib()], stores).await;
    first
        .explorer
        .set_selector_state(SelectorSetting::Display, &StateTarget::Selector(app_src()))
        .await
        .unwrap();
    first.explorer.dispose().await;

    let stores = json_stores(dir.path()).await;
    let second = fixture_with(config, vec![app(), lib()], stores).await;
    assert_eq!(second.explorer.subscribed().await, vec![APP_SRC]);
    assert!(has(&*second.explorer.index().await, "app/src/main.rs"));
}

use daybook_core::theme::DARK_CLASS;
use daybook_core::{
    resolve_theme, AppContext, ClassList, ClassListApplier, EffectiveTheme, StoreConfig,
    SystemTheme, SystemThemeSource, ThemeApplier, ThemeController, ThemePreference,
};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

#[test]
fn resolution_table() {
    let cases = [
        (ThemePreference::Light, SystemTheme::Light, EffectiveTheme::Light),
        (ThemePreference::Light, SystemTheme::Dark, EffectiveTheme::Light),
        (ThemePreference::Dark, SystemTheme::Light, EffectiveTheme::Dark),
        (ThemePreference::Dark, SystemTheme::Dark, EffectiveTheme::Dark),
        (ThemePreference::System, SystemTheme::Light, EffectiveTheme::Light),
        (ThemePreference::System, SystemTheme::Dark, EffectiveTheme::Dark),
    ];
    for (preference, system, expected) in cases {
        assert_eq!(
            resolve_theme(preference, system),
            expected,
            "{preference} under {system:?}"
        );
    }
}

/// Applier recording every applied theme.
#[derive(Default)]
struct RecordingApplier {
    applied: RefCell<Vec<EffectiveTheme>>,
}

impl ThemeApplier for RecordingApplier {
    fn apply(&self, theme: EffectiveTheme) {
        self.applied.borrow_mut().push(theme);
    }
}

#[test]
fn controller_follows_preference_and_system_signal() {
    let app = AppContext::open(&StoreConfig::default());
    let root = Rc::new(ClassList::new());
    let signal = Rc::new(SystemThemeSource::new(SystemTheme::Dark));
    let controller = ThemeController::mount(
        app.theme_preference(),
        Rc::clone(&signal) as _,
        Rc::new(ClassListApplier::new(Rc::clone(&root))),
    );

    // Default preference is `system`, and the system is dark.
    assert_eq!(controller.effective(), EffectiveTheme::Dark);
    assert!(root.contains(DARK_CLASS));

    controller.set_theme(ThemePreference::Light);
    assert_eq!(controller.effective(), EffectiveTheme::Light);
    assert!(!root.contains(DARK_CLASS));

    controller.set_theme(ThemePreference::System);
    assert_eq!(controller.effective(), EffectiveTheme::Dark);
    assert!(root.contains(DARK_CLASS));

    signal.set(SystemTheme::Light);
    assert_eq!(controller.system(), SystemTheme::Light);
    assert_eq!(controller.effective(), EffectiveTheme::Light);
    assert!(!root.contains(DARK_CLASS));
}

#[test]
fn explicit_preference_ignores_signal_changes() {
    let app = AppContext::open(&StoreConfig::default());
    app.theme_preference().set(ThemePreference::Dark);
    let signal = Rc::new(SystemThemeSource::new(SystemTheme::Light));
    let applier = Rc::new(RecordingApplier::default());
    let controller = ThemeController::mount(
        app.theme_preference(),
        Rc::clone(&signal) as _,
        Rc::clone(&applier) as _,
    );

    signal.set(SystemTheme::Dark);
    signal.set(SystemTheme::Light);
    assert_eq!(controller.effective(), EffectiveTheme::Dark);
    assert!(applier
        .applied
        .borrow()
        .iter()
        .all(|theme| *theme == EffectiveTheme::Dark));
}

#[test]
fn dropped_controller_stops_applying() {
    let app = AppContext::open(&StoreConfig::default());
    let signal = Rc::new(SystemThemeSource::new(SystemTheme::Light));
    let applier = Rc::new(RecordingApplier::default());
    let controller = ThemeController::mount(
        app.theme_preference(),
        Rc::clone(&signal) as _,
        Rc::clone(&applier) as _,
    );
    assert_eq!(applier.applied.borrow().len(), 1);

    drop(controller);
    signal.set(SystemTheme::Dark);
    app.theme_preference().set(ThemePreference::Dark);
    assert_eq!(applier.applied.borrow().len(), 1);
}

#[test]
fn preference_from_other_process_reapplies_theme() {
    let dir = tempfile::tempdir().unwrap();
    let path: &Path = &dir.path().join("daybook.db");

    let other = AppContext::open(&StoreConfig::with_db_path(path));
    let app = AppContext::open(&StoreConfig::with_db_path(path));
    let root = Rc::new(ClassList::new());
    let controller = ThemeController::mount(
        app.theme_preference(),
        Rc::new(SystemThemeSource::new(SystemTheme::Light)),
        Rc::new(ClassListApplier::new(Rc::clone(&root))),
    );
    assert!(!root.contains(DARK_CLASS));

    other.theme_preference().set(ThemePreference::Dark);
    assert_eq!(app.sync_external_changes(), 1);
    assert_eq!(controller.preference(), ThemePreference::Dark);
    assert!(root.contains(DARK_CLASS));
}

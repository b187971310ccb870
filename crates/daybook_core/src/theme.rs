//! Effective light/dark theme resolution.
//!
//! # Responsibility
//! - Resolve the effective theme from the stored preference and the system
//!   signal (`resolve_theme`, pure and total).
//! - Keep the applied theme in sync with both inputs (`ThemeController`).
//!
//! # Invariants
//! - `light` and `dark` preferences ignore the system signal.
//! - Every input change re-resolves and re-applies exactly once.
//! - The side effect is only reached through an injected `ThemeApplier`.

use crate::store::listeners::{ListenerId, Listeners};
use crate::store::preference::{PreferenceCell, Update};
use log::debug;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::rc::{Rc, Weak};
use std::str::FromStr;

/// Preference key holding the stored `ThemePreference`.
pub const THEME_PREFERENCE_KEY: &str = "theme";
/// Class toggled on the presentation root while the dark theme is active.
pub const DARK_CLASS: &str = "dark";

/// Stored tri-state theme choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemePreference {
    Light,
    Dark,
    #[default]
    System,
}

impl ThemePreference {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }
}

impl Display for ThemePreference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemePreference {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "system" => Ok(Self::System),
            other => Err(format!(
                "unsupported theme `{other}`; expected light|dark|system"
            )),
        }
    }
}

/// Theme reported by the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemTheme {
    Light,
    Dark,
}

/// Theme actually applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveTheme {
    Light,
    Dark,
}

impl EffectiveTheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

/// Resolves the effective theme.
pub fn resolve_theme(preference: ThemePreference, system: SystemTheme) -> EffectiveTheme {
    match (preference, system) {
        (ThemePreference::Light, _) => EffectiveTheme::Light,
        (ThemePreference::Dark, _) => EffectiveTheme::Dark,
        (ThemePreference::System, SystemTheme::Light) => EffectiveTheme::Light,
        (ThemePreference::System, SystemTheme::Dark) => EffectiveTheme::Dark,
    }
}

/// Side effect applying a resolved theme to the presentation layer.
pub trait ThemeApplier {
    fn apply(&self, theme: EffectiveTheme);
}

/// Environment capability reporting the system theme and its changes.
pub trait SystemThemeSignal {
    fn current(&self) -> SystemTheme;
    fn subscribe(&self, listener: Box<dyn Fn(SystemTheme)>) -> ListenerId;
    fn unsubscribe(&self, id: ListenerId) -> bool;
}

/// In-process system theme signal, set by the embedding environment.
pub struct SystemThemeSource {
    current: Cell<SystemTheme>,
    listeners: Listeners<SystemTheme>,
}

impl SystemThemeSource {
    pub fn new(initial: SystemTheme) -> Self {
        Self {
            current: Cell::new(initial),
            listeners: Listeners::new(),
        }
    }

    /// Records a new system theme; listeners run only on an actual change.
    pub fn set(&self, theme: SystemTheme) {
        if self.current.replace(theme) != theme {
            self.listeners.notify(&theme);
        }
    }
}

impl SystemThemeSignal for SystemThemeSource {
    fn current(&self) -> SystemTheme {
        self.current.get()
    }

    fn subscribe(&self, listener: Box<dyn Fn(SystemTheme)>) -> ListenerId {
        self.listeners.subscribe(move |theme: &SystemTheme| listener(*theme))
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }
}

/// Set of presentation classes on the root element.
#[derive(Debug, Default)]
pub struct ClassList {
    classes: RefCell<BTreeSet<String>>,
}

impl ClassList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, class: &str) -> bool {
        self.classes.borrow().contains(class)
    }

    pub fn toggle(&self, class: &str, enabled: bool) {
        let mut classes = self.classes.borrow_mut();
        if enabled {
            classes.insert(class.to_string());
        } else {
            classes.remove(class);
        }
    }

    pub fn classes(&self) -> Vec<String> {
        self.classes.borrow().iter().cloned().collect()
    }
}

/// Applies the theme by toggling `DARK_CLASS` on a `ClassList`.
pub struct ClassListApplier {
    root: Rc<ClassList>,
}

impl ClassListApplier {
    pub fn new(root: Rc<ClassList>) -> Self {
        Self { root }
    }
}

impl ThemeApplier for ClassListApplier {
    fn apply(&self, theme: EffectiveTheme) {
        self.root.toggle(DARK_CLASS, theme == EffectiveTheme::Dark);
    }
}

/// Keeps the applied theme resolved from the preference cell and the
/// system signal.
///
/// Dropping the controller removes its subscriptions.
pub struct ThemeController {
    preference: Rc<PreferenceCell<ThemePreference>>,
    signal: Rc<dyn SystemThemeSignal>,
    applier: Rc<dyn ThemeApplier>,
    system: Cell<SystemTheme>,
    effective: Cell<EffectiveTheme>,
    preference_listener: Cell<Option<ListenerId>>,
    signal_listener: Cell<Option<ListenerId>>,
}

impl ThemeController {
    /// Reads both inputs, applies the resolved theme, and subscribes to
    /// later changes of either input.
    pub fn mount(
        preference: Rc<PreferenceCell<ThemePreference>>,
        signal: Rc<dyn SystemThemeSignal>,
        applier: Rc<dyn ThemeApplier>,
    ) -> Rc<Self> {
        let system = signal.current();
        let effective = resolve_theme(preference.get(), system);

        let controller = Rc::new(Self {
            preference,
            signal,
            applier,
            system: Cell::new(system),
            effective: Cell::new(effective),
            preference_listener: Cell::new(None),
            signal_listener: Cell::new(None),
        });
        controller.applier.apply(effective);

        let weak = Rc::downgrade(&controller);
        let preference_listener = controller
            .preference
            .subscribe(move |_: &ThemePreference| refresh_weak(&weak));
        controller
            .preference_listener
            .set(Some(preference_listener));

        let weak = Rc::downgrade(&controller);
        let signal_listener = controller.signal.subscribe(Box::new(move |theme: SystemTheme| {
            if let Some(controller) = weak.upgrade() {
                controller.system.set(theme);
                controller.refresh();
            }
        }));
        controller.signal_listener.set(Some(signal_listener));

        controller
    }

    /// Stores a new preference; the effective theme follows immediately.
    pub fn set_theme(&self, preference: ThemePreference) {
        self.preference.set(Update::Literal(preference));
    }

    pub fn preference(&self) -> ThemePreference {
        self.preference.get()
    }

    pub fn system(&self) -> SystemTheme {
        self.system.get()
    }

    pub fn effective(&self) -> EffectiveTheme {
        self.effective.get()
    }

    fn refresh(&self) {
        let preference = self.preference.get();
        let effective = resolve_theme(preference, self.system.get());
        self.effective.set(effective);
        self.applier.apply(effective);
        debug!(
            "event=theme_apply module=theme status=ok preference={} effective={}",
            preference,
            effective.as_str()
        );
    }
}

impl Drop for ThemeController {
    fn drop(&mut self) {
        if let Some(id) = self.preference_listener.take() {
            self.preference.unsubscribe(id);
        }
        if let Some(id) = self.signal_listener.take() {
            self.signal.unsubscribe(id);
        }
    }
}

fn refresh_weak(controller: &Weak<ThemeController>) {
    if let Some(controller) = controller.upgrade() {
        controller.refresh();
    }
}

#[cfg(test)]
mod tests {
    use super::{resolve_theme, EffectiveTheme, SystemTheme, ThemePreference};

    #[test]
    fn explicit_preferences_ignore_system_signal() {
        for system in [SystemTheme::Light, SystemTheme::Dark] {
            assert_eq!(
                resolve_theme(ThemePreference::Light, system),
                EffectiveTheme::Light
            );
            assert_eq!(
                resolve_theme(ThemePreference::Dark, system),
                EffectiveTheme::Dark
            );
        }
    }

    #[test]
    fn system_preference_follows_signal() {
        assert_eq!(
            resolve_theme(ThemePreference::System, SystemTheme::Dark),
            EffectiveTheme::Dark
        );
        assert_eq!(
            resolve_theme(ThemePreference::System, SystemTheme::Light),
            EffectiveTheme::Light
        );
    }

    #[test]
    fn parses_preference_names() {
        assert_eq!(" Dark ".parse::<ThemePreference>(), Ok(ThemePreference::Dark));
        assert!("sepia".parse::<ThemePreference>().is_err());
    }
}

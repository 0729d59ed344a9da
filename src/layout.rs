//! Theme and menu state of the dashboard shell.
//!
//! Values live in [`Observable`] holders; whoever renders the shell
//! subscribes and is called after every change.

use std::fmt;

/// Viewports wider than this use the desktop menu.
pub const DESKTOP_BREAKPOINT: u32 = 991;

type Subscriber<T> = Box<dyn Fn(&T) + Send + Sync>;

/// A value with an explicit list of change subscribers.
pub struct Observable<T> {
    value: T,
    subscribers: Vec<Subscriber<T>>,
}

impl<T> Observable<T> {
    pub fn new(value: T) -> Self {
        Self { value, subscribers: Vec::new() }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Register a callback run after each change.
    pub fn subscribe<F>(&mut self, subscriber: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn set(&mut self, value: T) {
        self.update(|current| *current = value);
    }

    /// Mutate the value in place and notify subscribers.
    pub fn update<F>(&mut self, change: F)
    where
        F: FnOnce(&mut T),
    {
        change(&mut self.value);
        for subscriber in &self.subscribers {
            subscriber(&self.value);
        }
    }
}

impl<T: Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &self.value)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MenuMode {
    #[default]
    Static,
    Overlay,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutConfig {
    pub dark_theme: bool,
    pub menu_mode: MenuMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutState {
    pub static_menu_desktop_inactive: bool,
    pub overlay_menu_active: bool,
    pub static_menu_mobile_active: bool,
    pub menu_hover_active: bool,
}

#[derive(Debug, Default)]
pub struct Layout {
    pub config: Observable<LayoutConfig>,
    pub state: Observable<LayoutState>,
}

impl Layout {
    /// Start from a persisted theme preference.
    pub fn with_dark_theme(dark_theme: bool) -> Self {
        Self {
            config: Observable::new(LayoutConfig { dark_theme, ..LayoutConfig::default() }),
            state: Observable::default(),
        }
    }

    pub fn toggle_dark_mode(&mut self) {
        self.config.update(|config| config.dark_theme = !config.dark_theme);
    }

    /// Open or close the menu for a viewport `viewport_width` pixels wide.
    pub fn toggle_menu(&mut self, viewport_width: u32) {
        let overlay = self.config.get().menu_mode == MenuMode::Overlay;
        self.state.update(|state| {
            if overlay {
                state.overlay_menu_active = !state.overlay_menu_active;
            }
            if viewport_width > DESKTOP_BREAKPOINT {
                state.static_menu_desktop_inactive = !state.static_menu_desktop_inactive;
            } else {
                state.static_menu_mobile_active = !state.static_menu_mobile_active;
            }
        });
    }

    pub fn is_sidebar_active(&self) -> bool {
        let state = self.state.get();
        state.overlay_menu_active || state.static_menu_mobile_active
    }

    pub fn is_dark_theme(&self) -> bool {
        self.config.get().dark_theme
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_subscribers_see_every_change() {
        let seen = Arc::new(AtomicUsize::new(0));
        let mut layout = Layout::default();

        let counter = Arc::clone(&seen);
        layout.config.subscribe(move |config| {
            if config.dark_theme {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        layout.toggle_dark_mode();
        assert!(layout.is_dark_theme());
        layout.toggle_dark_mode();
        assert!(!layout.is_dark_theme());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_toggle_menu_desktop() {
        let mut layout = Layout::default();
        layout.toggle_menu(1280);
        assert!(layout.state.get().static_menu_desktop_inactive);
        assert!(!layout.is_sidebar_active());
    }

    #[test]
    fn test_toggle_menu_mobile() {
        let mut layout = Layout::default();
        layout.toggle_menu(DESKTOP_BREAKPOINT);
        assert!(layout.state.get().static_menu_mobile_active);
        assert!(layout.is_sidebar_active());
        layout.toggle_menu(400);
        assert!(!layout.is_sidebar_active());
    }

    #[test]
    fn test_overlay_mode_flips_overlay_flag() {
        let mut layout = Layout::default();
        layout.config.set(LayoutConfig { dark_theme: false, menu_mode: MenuMode::Overlay });
        layout.toggle_menu(1280);
        let state = layout.state.get();
        assert!(state.overlay_menu_active);
        assert!(state.static_menu_desktop_inactive);
        assert!(layout.is_sidebar_active());
    }

    #[test]
    fn test_with_dark_theme() {
        assert!(Layout::with_dark_theme(true).is_dark_theme());
    }
}

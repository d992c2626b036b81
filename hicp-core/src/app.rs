//! Application and authentication interfaces.
//!
//! An [`App`] builds and drives the GUI for one connection. The
//! [`AppRegistry`] maps requested application names to factories so
//! every connection gets its own instance.

use async_trait::async_trait;

use crate::message::Message;
use crate::session::Session;

/// One application driving one connection's GUI.
#[async_trait]
pub trait App: Send {
    /// Called once the connection reaches the running phase. Build
    /// the initial GUI here.
    async fn connected(&mut self, session: &Session);

    /// Whether this app authenticates connections itself, used when
    /// no separate authenticator is configured.
    fn handles_authentication(&self) -> bool {
        false
    }

    /// Check an authenticate event. Only called when
    /// [`handles_authentication`](App::handles_authentication) is true.
    async fn authenticate(&mut self, _session: &Session, _message: &Message) -> bool {
        false
    }

    /// Called when the app is being replaced or the connection is
    /// closing, after its components were removed.
    async fn stopped(&mut self, _session: &Session) {}
}

pub type AppFactory = Box<dyn Fn() -> Box<dyn App> + Send + Sync>;

/// Credential check applied before any app starts.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, message: &Message) -> bool;

    /// Method names offered to the client.
    fn methods(&self) -> Vec<String> {
        vec![crate::message::METHOD_PLAIN.to_string()]
    }
}

// ── AppRegistry ──────────────────────────────────────────────────

/// Named app factories plus the default choice.
#[derive(Default)]
pub struct AppRegistry {
    apps: Vec<(String, AppFactory)>,
    default_app: Option<String>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn() -> Box<dyn App> + Send + Sync + 'static,
    ) {
        self.apps.push((name.into(), Box::new(factory)));
    }

    pub fn set_default(&mut self, name: impl Into<String>) {
        self.default_app = Some(name.into());
    }

    /// Pick an app name: the requested one when registered, else the
    /// default, else the first registered.
    pub fn resolve<'a>(&'a self, requested: Option<&'a str>) -> Option<&'a str> {
        if let Some(requested) = requested {
            if self.apps.iter().any(|(name, _)| name == requested) {
                return Some(requested);
            }
        }
        if let Some(default_app) = &self.default_app {
            if self.apps.iter().any(|(name, _)| name == default_app) {
                return Some(default_app);
            }
        }
        self.apps.first().map(|(name, _)| name.as_str())
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn App>> {
        self.apps
            .iter()
            .find(|(app_name, _)| app_name == name)
            .map(|(_, factory)| factory())
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nop;

    #[async_trait]
    impl App for Nop {
        async fn connected(&mut self, _session: &Session) {}
    }

    fn registry() -> AppRegistry {
        let mut registry = AppRegistry::new();
        registry.register("calc", || Box::new(Nop));
        registry.register("clock", || Box::new(Nop));
        registry
    }

    #[test]
    fn requested_app_wins() {
        let registry = registry();
        assert_eq!(registry.resolve(Some("clock")), Some("clock"));
    }

    #[test]
    fn unknown_request_falls_back() {
        let mut registry = registry();
        assert_eq!(registry.resolve(Some("missing")), Some("calc"));

        registry.set_default("clock");
        assert_eq!(registry.resolve(Some("missing")), Some("clock"));
        assert_eq!(registry.resolve(None), Some("clock"));
    }

    #[test]
    fn empty_registry_resolves_nothing() {
        let registry = AppRegistry::new();
        assert_eq!(registry.resolve(Some("calc")), None);
        assert!(registry.create("calc").is_none());
    }

    #[test]
    fn create_returns_fresh_instances() {
        let registry = registry();
        assert!(registry.create("calc").is_some());
        assert!(registry.create("missing").is_none());
    }
}

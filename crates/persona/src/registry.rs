//! Persona Registry (C1): canonicalizes discovered speaker identifiers and
//! tracks their voice bindings, per book.

use crate::normalize::normalize;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A point-in-time copy of the registry's discovered/mapped/unmapped state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaSnapshot {
    /// Display (first-seen raw) form of every discovered canonical, in
    /// discovery order
    pub discovered: Vec<String>,
    /// Canonical ids that currently have a bound voice
    pub mapped: Vec<String>,
    /// Canonical ids currently without a bound voice, in discovery order
    pub unmapped: Vec<String>,
}

#[derive(Default)]
struct Inner {
    /// Canonical ids in first-discovery order
    order: Vec<String>,
    /// canonical -> first raw form seen for it
    display: HashMap<String, String>,
    /// canonical -> bound provider voice id
    voices: HashMap<String, String>,
    /// canonical ids without a bound voice, in discovery order
    unmapped: Vec<String>,
}

/// Per-book persona registry. A single lock serializes all mutations; reads
/// copy data out under the lock and return independent collections, so
/// callers never hold the lock across an await point.
#[derive(Clone)]
pub struct PersonaRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl PersonaRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Normalize `raw`, look up or insert it, and return the canonical label
    /// callers must substitute into the segment before enqueue.
    pub fn register(&self, raw: &str) -> String {
        self.register_reporting_new(raw).0
    }

    /// Like [`Self::register`], but also reports whether this call is the
    /// one that first discovered the canonical.
    pub fn register_reporting_new(&self, raw: &str) -> (String, bool) {
        let canonical = normalize(raw);
        let mut inner = self.inner.lock();
        let is_new = !inner.display.contains_key(&canonical);
        if is_new {
            inner.order.push(canonical.clone());
            inner.display.insert(canonical.clone(), raw.to_string());
            inner.unmapped.push(canonical.clone());
            tracing::info!(canonical = %canonical, raw = %raw, "persona discovered");
        }
        (canonical, is_new)
    }

    /// Canonical ids in first-discovery order, as passed to the LLM to
    /// steer it toward reusing existing names (§6).
    pub fn known_canonicals(&self) -> Vec<String> {
        self.inner.lock().order.clone()
    }

    /// Bind `canonical` to a provider voice id; if it was unmapped, remove it
    /// from the unmapped list.
    pub fn bind(&self, canonical: &str, voice: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.voices.insert(canonical.to_string(), voice.into());
        inner.unmapped.retain(|p| p != canonical);
        tracing::info!(canonical, "persona bound to voice");
    }

    pub fn is_mapped(&self, canonical: &str) -> bool {
        self.inner.lock().voices.contains_key(canonical)
    }

    pub fn voice_of(&self, canonical: &str) -> Option<String> {
        self.inner.lock().voices.get(canonical).cloned()
    }

    pub fn snapshot(&self) -> PersonaSnapshot {
        let inner = self.inner.lock();
        let discovered = inner
            .order
            .iter()
            .map(|c| inner.display.get(c).cloned().unwrap_or_else(|| c.clone()))
            .collect();
        let mapped = inner.voices.keys().cloned().collect();
        let unmapped = inner.unmapped.clone();
        PersonaSnapshot { discovered, mapped, unmapped }
    }
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent_across_aliases() {
        let registry = PersonaRegistry::new();
        let a = registry.register("Father_Terrier");
        let b = registry.register("Father Terrier (thought)");
        let c = registry.register("father terrier");
        assert_eq!(a, b);
        assert_eq!(b, c);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.discovered, vec!["Father_Terrier"]);
        assert_eq!(snapshot.unmapped, vec![a]);
    }

    #[test]
    fn bind_moves_persona_out_of_unmapped() {
        let registry = PersonaRegistry::new();
        let canonical = registry.register("Narrator");
        assert!(!registry.is_mapped(&canonical));

        registry.bind(&canonical, "voice-1");
        assert!(registry.is_mapped(&canonical));
        assert_eq!(registry.voice_of(&canonical).as_deref(), Some("voice-1"));

        let snapshot = registry.snapshot();
        assert!(snapshot.unmapped.is_empty());
        assert_eq!(snapshot.mapped, vec![canonical]);
    }

    #[test]
    fn rebind_never_removed_keeps_latest_voice() {
        let registry = PersonaRegistry::new();
        let canonical = registry.register("Alice");
        registry.bind(&canonical, "voice-a");
        registry.bind(&canonical, "voice-b");
        assert_eq!(registry.voice_of(&canonical).as_deref(), Some("voice-b"));
    }

    #[test]
    fn register_reporting_new_flags_first_sighting_only() {
        let registry = PersonaRegistry::new();
        let (a, a_new) = registry.register_reporting_new("Alice");
        let (b, b_new) = registry.register_reporting_new("alice");
        assert!(a_new);
        assert!(!b_new);
        assert_eq!(a, b);
    }

    #[test]
    fn known_canonicals_reflects_discovery_order() {
        let registry = PersonaRegistry::new();
        registry.register("Narrator");
        registry.register("Alice");
        assert_eq!(registry.known_canonicals(), vec!["narrator", "alice"]);
    }

    #[test]
    fn discovery_order_is_preserved() {
        let registry = PersonaRegistry::new();
        registry.register("Narrator");
        registry.register("Alice");
        registry.register("Bob");
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.discovered, vec!["Narrator", "Alice", "Bob"]);
    }
}

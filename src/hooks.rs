//! Extension points for callers who want to adjust or observe core
//! behavior without forking it (§9: "polymorphic augmentations and
//! hooks"). A hook can tweak a noun/verb before it's persisted, or
//! post-process a search page before it reaches the caller.
//!
//! Hooks are wired once at [`crate::BrainyDb::open_with_hooks`] and never
//! mutated afterward, so the facade's hot path just iterates a `Vec`
//! rather than guarding against concurrent registration.

use crate::noun::NewNoun;
use crate::query::QueryPage;
use crate::verb::NewVerb;

/// Observes or adjusts database operations at fixed extension points.
///
/// All methods default to no-ops, so a hook only needs to implement the
/// ones it cares about.
pub trait BrainyHook: Send + Sync {
    /// Called after validation, before a noun is embedded and persisted.
    /// May adjust `noun` in place (e.g. normalize a property, inject a
    /// computed field).
    fn on_before_add_noun(&self, noun: &mut NewNoun) {
        let _ = noun;
    }

    /// Called after validation and endpoint resolution, before a verb's
    /// weight/confidence are finalized and it is persisted.
    fn on_before_add_verb(&self, verb: &mut NewVerb) {
        let _ = verb;
    }

    /// Called after a query page is assembled, before it's returned to
    /// the caller. May reorder or annotate hits but must not change
    /// `hits.len()` in a way that desyncs `next_cursor`.
    fn on_after_search(&self, page: &mut QueryPage) {
        let _ = page;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noun::NounType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHook {
        before_add_noun_calls: AtomicUsize,
    }

    impl BrainyHook for CountingHook {
        fn on_before_add_noun(&self, noun: &mut NewNoun) {
            self.before_add_noun_calls.fetch_add(1, Ordering::SeqCst);
            noun.properties.insert("tagged_by_hook".to_string(), serde_json::json!(true));
        }
    }

    #[test]
    fn test_default_hook_methods_are_no_ops() {
        struct Noop;
        impl BrainyHook for Noop {}

        let hook = Noop;
        let mut noun = NewNoun { noun_type: NounType::Thing, ..Default::default() };
        hook.on_before_add_noun(&mut noun);
        assert!(noun.properties.is_empty());
    }

    #[test]
    fn test_hook_can_mutate_noun_before_persistence() {
        let hook = CountingHook::default();
        let mut noun = NewNoun { noun_type: NounType::Thing, ..Default::default() };
        hook.on_before_add_noun(&mut noun);
        assert_eq!(hook.before_add_noun_calls.load(Ordering::SeqCst), 1);
        assert_eq!(noun.properties.get("tagged_by_hook"), Some(&serde_json::json!(true)));
    }
}

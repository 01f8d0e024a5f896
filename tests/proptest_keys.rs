//! Property-based tests for cache key resolution.
//!
//! # Properties Tested
//!
//! 1. **Determinism**: resolving the same subject twice yields the same key
//! 2. **Liveness key**: the marker key is always `base:alive`
//! 3. **Qualifiers**: every qualifier lands after the base key, in order
//! 4. **Distinctness**: different ids give different default keys

use proptest::prelude::*;
use reactive_cache::config::KeyTemplate;
use reactive_cache::key::{CacheKeyBuilder, ALIVE_QUALIFIER, KEY_SEPARATOR};
use reactive_cache::{ReactiveConfig, ReactiveSubject, Result};

#[derive(Clone, Debug)]
struct MergeRequest {
    project: String,
    iid: u64,
}

impl ReactiveSubject for MergeRequest {
    type Value = u64;

    fn subject_type() -> &'static str {
        "merge_request"
    }

    fn subject_id(&self) -> String {
        self.iid.to_string()
    }

    async fn calculate(&self) -> Result<Self::Value> {
        Ok(self.iid)
    }
}

fn project_key(mr: &MergeRequest) -> Vec<String> {
    vec!["mr".to_string(), mr.project.clone(), mr.iid.to_string()]
}

fn arb_merge_request() -> impl Strategy<Value = MergeRequest> {
    ("[a-z][a-z0-9_-]{0,20}", any::<u64>())
        .prop_map(|(project, iid)| MergeRequest { project, iid })
}

proptest! {
    #[test]
    fn prop_resolution_is_deterministic(mr in arb_merge_request()) {
        let config: ReactiveConfig<MergeRequest> = ReactiveConfig::default()
            .with_key_template(KeyTemplate::Derived(project_key));

        let first = CacheKeyBuilder::base_key(&mr, &config);
        let second = CacheKeyBuilder::base_key(&mr.clone(), &config);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first, format!("mr:{}:{}", mr.project, mr.iid));
    }

    #[test]
    fn prop_alive_key_extends_base(mr in arb_merge_request()) {
        let config: ReactiveConfig<MergeRequest> = ReactiveConfig::default();

        let base = CacheKeyBuilder::base_key(&mr, &config);
        let alive = CacheKeyBuilder::alive_key(&mr, &config);
        prop_assert_eq!(alive, format!("{}{}{}", base, KEY_SEPARATOR, ALIVE_QUALIFIER));
    }

    #[test]
    fn prop_qualifiers_follow_base(
        mr in arb_merge_request(),
        qualifiers in prop::collection::vec("[a-z0-9_]{1,12}", 0..4),
    ) {
        let config: ReactiveConfig<MergeRequest> = ReactiveConfig::default()
            .with_key_template(KeyTemplate::Derived(project_key));
        let refs: Vec<&str> = qualifiers.iter().map(String::as_str).collect();

        let key = CacheKeyBuilder::resolve(&mr, &config.key_template, &refs);
        let base = CacheKeyBuilder::base_key(&mr, &config);
        let mut expected = vec![base];
        expected.extend(qualifiers.iter().cloned());
        prop_assert_eq!(key, expected.join(KEY_SEPARATOR));
    }

    #[test]
    fn prop_default_keys_distinct(a in any::<u64>(), b in any::<u64>()) {
        prop_assume!(a != b);
        let config: ReactiveConfig<MergeRequest> = ReactiveConfig::default();
        let mr_a = MergeRequest { project: "gitlab".to_string(), iid: a };
        let mr_b = MergeRequest { project: "gitlab".to_string(), iid: b };

        prop_assert_ne!(
            CacheKeyBuilder::base_key(&mr_a, &config),
            CacheKeyBuilder::base_key(&mr_b, &config)
        );
    }

    #[test]
    fn prop_fixed_template_ignores_subject(mr in arb_merge_request()) {
        let config: ReactiveConfig<MergeRequest> = ReactiveConfig::default().with_key_template(
            KeyTemplate::Fixed(vec!["dashboard".to_string(), "global".to_string()]),
        );

        prop_assert_eq!(CacheKeyBuilder::base_key(&mr, &config), "dashboard:global");
        prop_assert!(config.validate().is_ok());
    }
}

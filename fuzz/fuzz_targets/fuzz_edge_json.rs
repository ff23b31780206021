// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2026 Jonathan D.A. Jewell
#![no_main]

use libfuzzer_sys::fuzz_target;
use stargraph::store::EdgeStore;
use stargraph::types::Edge;

fuzz_target!(|data: &[u8]| {
    let Ok(edges) = serde_json::from_slice::<Vec<Edge>>(data) else {
        return;
    };
    let store = EdgeStore::new();
    if store.upsert(edges).is_ok() {
        for edge in store.all() {
            assert!((0.0..=1.0).contains(&edge.weight));
            assert_ne!(edge.source_repo, edge.target_repo);
        }
    } else {
        assert!(store.is_empty());
    }
});

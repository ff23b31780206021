// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2026 Jonathan D.A. Jewell
#![no_main]

use libfuzzer_sys::fuzz_target;
use stargraph::config::ExtractorSettings;
use stargraph::corpus::{Corpus, CorpusDocument};
use stargraph::extract::{default_extractors, Scope};

fuzz_target!(|data: &[u8]| {
    let Ok(doc) = serde_json::from_slice::<CorpusDocument>(data) else {
        return;
    };
    let Ok(corpus) = Corpus::from_document(doc) else {
        return;
    };
    // Every draft an extractor accepts must be a storable edge
    for extractor in default_extractors(&ExtractorSettings::default()) {
        if let Ok(drafts) = extractor.extract(&corpus, &Scope::All) {
            for draft in drafts {
                assert!(draft.into_edge(extractor.kind()).is_ok());
            }
        }
    }
});

// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2026 Jonathan D.A. Jewell
#![no_main]

use libfuzzer_sys::fuzz_target;
use stargraph::types::EdgeKind;

fuzz_target!(|input: &str| {
    if let Ok(kind) = input.parse::<EdgeKind>() {
        assert_eq!(kind.as_str().parse::<EdgeKind>().ok(), Some(kind));
    }
});

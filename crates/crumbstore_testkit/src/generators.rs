//! Property-based test generators using proptest.
//!
//! Provides strategies for breadcrumb drafts and the awkward text they
//! may carry.

use crumbstore_core::{BreadcrumbLevel, BreadcrumbType, NewBreadcrumb};
use proptest::prelude::*;

/// Strategy for breadcrumb types.
pub fn breadcrumb_type_strategy() -> impl Strategy<Value = BreadcrumbType> {
    prop::sample::select(BreadcrumbType::ALL.to_vec())
}

/// Strategy for breadcrumb levels.
pub fn breadcrumb_level_strategy() -> impl Strategy<Value = BreadcrumbLevel> {
    prop_oneof![
        Just(BreadcrumbLevel::Debug),
        Just(BreadcrumbLevel::Info),
        Just(BreadcrumbLevel::Warning),
        Just(BreadcrumbLevel::Error),
        Just(BreadcrumbLevel::Fatal),
    ]
}

/// Strategy for text with embedded newlines, quotes and multi-byte
/// characters.
pub fn message_strategy(max_chars: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            4 => any::<char>(),
            1 => Just('\n'),
            1 => Just('"'),
            1 => Just('é'),
        ],
        0..=max_chars,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

/// Strategy for attribute lists, in insertion order.
pub fn attributes_strategy(max_len: usize) -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec(
        (
            prop::string::string_regex("[a-z_\n]{1,24}").expect("Invalid regex"),
            message_strategy(300),
        ),
        0..=max_len,
    )
}

/// Strategy for complete breadcrumb drafts.
pub fn new_breadcrumb_strategy() -> impl Strategy<Value = NewBreadcrumb> {
    (
        message_strategy(1500),
        attributes_strategy(8),
        breadcrumb_type_strategy(),
        breadcrumb_level_strategy(),
    )
        .prop_map(|(message, attributes, kind, level)| {
            NewBreadcrumb::new(message)
                .attributes(attributes)
                .kind(kind)
                .level(level)
        })
}

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

const CATEGORY_PALETTE: [Rgb; 10] = [
    Rgb(31, 119, 180),
    Rgb(255, 127, 14),
    Rgb(44, 160, 44),
    Rgb(214, 39, 40),
    Rgb(148, 103, 189),
    Rgb(140, 86, 75),
    Rgb(227, 119, 194),
    Rgb(127, 127, 127),
    Rgb(188, 189, 34),
    Rgb(23, 190, 207),
];

const CLUSTER_PALETTE: [Rgb; 6] = [
    Rgb(246, 206, 104),
    Rgb(103, 196, 255),
    Rgb(241, 146, 94),
    Rgb(150, 220, 140),
    Rgb(200, 160, 255),
    Rgb(255, 150, 180),
];

pub const UNCATEGORIZED: &str = "uncategorized";

pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

pub fn title_case(value: &str) -> String {
    value
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn stable_hash(id: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    hasher.finish()
}

/// Deterministic pair in `[-1, 1]` derived from `id`, used for jitter.
pub fn stable_pair(id: &str) -> (f32, f32) {
    let hash = stable_hash(id);

    let x = ((hash & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    let y = (((hash >> 32) & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    ((x * 2.0) - 1.0, (y * 2.0) - 1.0)
}

pub fn category_color(category: &str) -> Rgb {
    let index = (stable_hash(&category.to_lowercase()) % CATEGORY_PALETTE.len() as u64) as usize;
    CATEGORY_PALETTE[index]
}

pub fn cluster_color(order: usize) -> Rgb {
    CLUSTER_PALETTE[order % CLUSTER_PALETTE.len()]
}

pub fn truncate_label(label: &str, max_chars: usize) -> String {
    if label.chars().count() <= max_chars {
        return label.to_owned();
    }
    let mut shortened = label.chars().take(max_chars.saturating_sub(1)).collect::<String>();
    shortened.push('…');
    shortened
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_case_splits_on_separators() {
        assert_eq!(title_case("late-night jazz"), "Late Night Jazz");
        assert_eq!(title_case("  "), "");
    }

    #[test]
    fn stable_pair_is_deterministic_and_bounded() {
        let first = stable_pair("event-1");
        assert_eq!(first, stable_pair("event-1"));
        assert!((-1.0..=1.0).contains(&first.0));
        assert!((-1.0..=1.0).contains(&first.1));
    }

    #[test]
    fn category_color_ignores_case() {
        assert_eq!(category_color("Music"), category_color("music"));
    }

    #[test]
    fn truncate_label_keeps_short_labels() {
        assert_eq!(truncate_label("Rave", 8), "Rave");
        assert_eq!(truncate_label("Warehouse Rave", 6), "Wareh…");
    }
}

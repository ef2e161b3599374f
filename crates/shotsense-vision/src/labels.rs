//! Shot label tables and canonicalization.
//!
//! The shot classifier was trained against labels containing a couple of
//! typos and casing variants. `map_label` canonicalizes those on the way
//! out; the table is data so it can be tested and extended independently.

/// Default shot class labels, in classifier output order.
pub const SHOT_CLASSES: &[&str] = &[
    "Batsman",
    "Drive",
    "Pull Shot",
    "Straight Drive",
    "Sweep",
    "Stap-Out",
];

/// Known raw-label variants and their canonical names.
const CANONICAL: &[(&str, &str)] = &[
    ("Stap-Out", "Step-Shot"),
    ("stop-out", "Step-Shot"),
    ("Pull shot", "Pull Shot"),
];

/// Canonicalize a classifier label by exact-string lookup.
///
/// Unmapped labels pass through unchanged, so the function is total and
/// idempotent (canonical names are never themselves mapped).
pub fn map_label(raw: &str) -> &str {
    CANONICAL
        .iter()
        .find(|(variant, _)| *variant == raw)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_variants() {
        assert_eq!(map_label("Stap-Out"), "Step-Shot");
        assert_eq!(map_label("stop-out"), "Step-Shot");
        assert_eq!(map_label("Pull shot"), "Pull Shot");
    }

    #[test]
    fn test_passthrough() {
        assert_eq!(map_label("Straight Drive"), "Straight Drive");
        assert_eq!(map_label("Batsman"), "Batsman");
        assert_eq!(map_label(""), "");
    }

    #[test]
    fn test_idempotent_and_total() {
        // map_label(map_label(x)) == map_label(x) for the whole table and
        // for arbitrary unmapped input.
        for (variant, _) in CANONICAL {
            let once = map_label(variant);
            assert_eq!(map_label(once), once);
        }
        for raw in SHOT_CLASSES {
            let once = map_label(raw);
            assert_eq!(map_label(once), once);
        }
        assert_eq!(map_label(map_label("no such label")), "no such label");
    }
}

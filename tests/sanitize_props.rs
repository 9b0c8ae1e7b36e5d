use rand::{rngs::StdRng, Rng, SeedableRng};
use stemdeck::{sanitize_label, SanitizedLabel, FALLBACK_LABEL};

const ALPHABET: &[char] = &[
    'a', 'Z', '0', '9', '-', '_', ' ', '!', '/', '\\', '.', ':', '*', '?', '"', '<', '>', '|',
    'é', 'ß', '日', '🎵', '\t', '\n',
];

fn random_label(rng: &mut StdRng) -> String {
    let len = rng.gen_range(0..24);
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())])
        .collect()
}

#[test]
fn sanitized_labels_are_safe_path_segments() {
    let mut rng = StdRng::seed_from_u64(0x5EED);
    for _ in 0..2_000 {
        let raw = random_label(&mut rng);
        let clean = sanitize_label(&raw);

        assert!(
            clean
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "{raw:?} -> {clean:?}"
        );
        assert!(!clean.contains("__"), "{raw:?} -> {clean:?}");
        assert!(!clean.starts_with('_') && !clean.ends_with('_'), "{raw:?} -> {clean:?}");
        assert_eq!(sanitize_label(&clean), clean, "not idempotent for {raw:?}");
        assert_eq!(SanitizedLabel::new(&raw).is_some(), !clean.is_empty());
    }
}

#[test]
fn fallback_applies_only_to_empty_results() {
    assert_eq!(SanitizedLabel::or_fallback("  ?? ").as_str(), FALLBACK_LABEL);
    assert_eq!(SanitizedLabel::or_fallback("").as_str(), FALLBACK_LABEL);
    assert_eq!(SanitizedLabel::or_fallback("Live @ Home").as_str(), "Live_Home");
}

#[test]
fn separators_cannot_survive() {
    for raw in ["../etc/passwd", "a/b", "a\\b", "..", "C:\\x"] {
        let clean = sanitize_label(raw);
        assert!(!clean.contains('/') && !clean.contains('\\') && !clean.contains('.'));
        assert!(!SanitizedLabel::is_sanitized(raw));
    }
}

// Bag-of-words vectors over a fixed contract vocabulary. Shared by the unit
// test fixtures and the integration tests so both embed text identically.

pub(crate) const VOCABULARY: [&str; 8] = [
    "payment",
    "terms",
    "net",
    "days",
    "renewal",
    "annual",
    "termination",
    "notice",
];

/// One slot per vocabulary word plus a constant slot
pub(crate) const KEYWORD_DIMENSION: usize = VOCABULARY.len() + 1;

/// Counts vocabulary words; the final component keeps vectors non-zero
pub(crate) fn keyword_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; KEYWORD_DIMENSION];
    for word in text.split_whitespace() {
        let word = word
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if let Some(i) = VOCABULARY.iter().position(|v| *v == word) {
            vector[i] += 1.0;
        }
    }
    vector[VOCABULARY.len()] = 1.0;
    vector
}

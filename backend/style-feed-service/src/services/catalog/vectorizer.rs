// ============================================
// TF-IDF Vectorizer
// ============================================
//
// Default upstream feature extractor for catalogs that ship without
// precomputed embeddings.
//
// - Tokens: lowercase runs of >= 2 alphanumeric chars, English stop words dropped
// - Vocabulary: `max_features` most frequent terms (ties alphabetical),
//   indexed alphabetically
// - IDF (smoothed): ln((1 + n) / (1 + df)) + 1
// - Output rows: raw term count x idf, L2-normalized

use crate::utils::l2_normalize;
use ndarray::Array2;
use std::collections::{BTreeMap, HashMap, HashSet};

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "can", "do", "for", "from",
    "had", "has", "have", "he", "her", "his", "if", "in", "into", "is", "it", "its", "no", "not",
    "of", "on", "or", "our", "she", "so", "than", "that", "the", "their", "them", "then",
    "there", "these", "they", "this", "to", "up", "was", "we", "were", "what", "when", "which",
    "who", "will", "with", "you", "your",
];

#[derive(Debug, Clone)]
pub struct TfIdfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
}

impl TfIdfVectorizer {
    /// Learn vocabulary and IDF weights from a corpus
    pub fn fit<S: AsRef<str>>(documents: &[S], max_features: usize) -> Self {
        let tokenized: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d.as_ref())).collect();

        let mut term_freq: BTreeMap<String, usize> = BTreeMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for tokens in &tokenized {
            for token in tokens {
                *term_freq.entry(token.clone()).or_insert(0) += 1;
            }
            let unique: HashSet<&String> = tokens.iter().collect();
            for token in unique {
                *doc_freq.entry(token.clone()).or_insert(0) += 1;
            }
        }

        // BTreeMap iteration is alphabetical, stable sort keeps that for ties
        let mut ranked: Vec<(String, usize)> = term_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(max_features);

        let mut terms: Vec<String> = ranked.into_iter().map(|(term, _)| term).collect();
        terms.sort();

        let n = documents.len() as f32;
        let idf = terms
            .iter()
            .map(|term| {
                let df = doc_freq.get(term).copied().unwrap_or(0) as f32;
                ((1.0 + n) / (1.0 + df)).ln() + 1.0
            })
            .collect();
        let vocabulary = terms
            .into_iter()
            .enumerate()
            .map(|(idx, term)| (term, idx))
            .collect();

        Self { vocabulary, idf }
    }

    pub fn dimensions(&self) -> usize {
        self.idf.len()
    }

    /// Vectorize one document
    pub fn transform(&self, document: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions()];
        for token in tokenize(document) {
            if let Some(&idx) = self.vocabulary.get(&token) {
                vector[idx] += self.idf[idx];
            }
        }
        l2_normalize(&mut vector);
        vector
    }

    /// Vectorize a corpus into an `N x D` matrix
    pub fn transform_all<S: AsRef<str>>(&self, documents: &[S]) -> Array2<f32> {
        let dim = self.dimensions();
        let mut matrix = Array2::<f32>::zeros((documents.len(), dim));
        for (row, document) in documents.iter().enumerate() {
            let vector = self.transform(document.as_ref());
            for (col, value) in vector.into_iter().enumerate() {
                matrix[[row, col]] = value;
            }
        }
        matrix
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= 2)
        .filter(|token| !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("The Black-Leather jacket, a classic!"),
            vec!["black", "leather", "jacket", "classic"]
        );
    }

    #[test]
    fn test_vocabulary_is_alphabetical() {
        let docs = ["red dress", "black dress", "black top"];
        let vectorizer = TfIdfVectorizer::fit(&docs, 10);
        assert_eq!(vectorizer.dimensions(), 4);
        assert_eq!(vectorizer.vocabulary["black"], 0);
        assert_eq!(vectorizer.vocabulary["top"], 3);
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let docs = ["red dress", "black dress", "black top"];
        let vectorizer = TfIdfVectorizer::fit(&docs, 2);
        assert_eq!(vectorizer.dimensions(), 2);
        assert!(vectorizer.vocabulary.contains_key("black"));
        assert!(vectorizer.vocabulary.contains_key("dress"));
    }

    #[test]
    fn test_rare_terms_weigh_more() {
        let docs = ["red dress", "black dress", "blue dress"];
        let vectorizer = TfIdfVectorizer::fit(&docs, 10);
        let v = vectorizer.transform("red dress");
        let red = v[vectorizer.vocabulary["red"]];
        let dress = v[vectorizer.vocabulary["dress"]];
        assert!(red > dress);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_unknown_text_is_zero_vector() {
        let vectorizer = TfIdfVectorizer::fit(&["red dress"], 10);
        assert!(vectorizer.transform("zzz qqq").iter().all(|x| *x == 0.0));
    }
}

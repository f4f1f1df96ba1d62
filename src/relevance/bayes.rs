// src/relevance/bayes.rs
//! Bag-of-words multinomial Naive Bayes: the offline-trained fallback tier used while
//! the semantic filter has no training data.

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

static RE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("token regex"));

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be",
        "been", "but", "by", "can", "could", "did", "do", "does", "for", "from", "had", "has",
        "have", "he", "her", "his", "how", "if", "in", "into", "is", "it", "its", "more", "most",
        "new", "no", "not", "of", "on", "or", "other", "our", "out", "over", "she", "so", "some",
        "such", "than", "that", "the", "their", "them", "then", "there", "these", "they", "this",
        "to", "up", "was", "we", "were", "what", "when", "which", "who", "will", "with", "would",
        "you", "your",
    ]
    .into_iter()
    .collect()
});

/// Fewer labeled records than this and training is refused.
pub const MIN_TRAINING_RECORDS: usize = 5;

pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    RE_TOKEN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|t| !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ClassCounts {
    docs: usize,
    total_tokens: usize,
    tokens: HashMap<String, usize>,
}

/// Two-class model: index 0 = irrelevant, 1 = relevant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BayesFilter {
    classes: [ClassCounts; 2],
    vocabulary: usize,
}

impl BayesFilter {
    /// Train on `(text, is_relevant)` pairs. Refuses tiny or single-class data, since
    /// a one-class model would reject everything or pass everything.
    pub fn train<'a, I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, bool)>,
    {
        let mut classes: [ClassCounts; 2] = Default::default();
        let mut vocab: HashSet<String> = HashSet::new();
        let mut n = 0usize;

        for (text, relevant) in records {
            n += 1;
            let class = &mut classes[usize::from(relevant)];
            class.docs += 1;
            for tok in tokenize(text) {
                class.total_tokens += 1;
                *class.tokens.entry(tok.clone()).or_insert(0) += 1;
                vocab.insert(tok);
            }
        }

        if n < MIN_TRAINING_RECORDS {
            bail!("not enough labeled records to train ({n} < {MIN_TRAINING_RECORDS})");
        }
        if classes.iter().any(|c| c.docs == 0) {
            bail!("training data has a single class; label at least one record of each kind");
        }

        Ok(Self {
            classes,
            vocabulary: vocab.len(),
        })
    }

    /// P(relevant | text) with Laplace smoothing. Unseen tokens are ignored.
    pub fn prob_relevant(&self, text: &str) -> f32 {
        let total_docs = (self.classes[0].docs + self.classes[1].docs) as f64;
        let vocab = self.vocabulary.max(1) as f64;

        let mut log_post = [0.0f64; 2];
        for (k, class) in self.classes.iter().enumerate() {
            log_post[k] = (class.docs as f64 / total_docs).ln();
        }

        for tok in tokenize(text) {
            let seen = self.classes.iter().any(|c| c.tokens.contains_key(&tok));
            if !seen {
                continue;
            }
            for (k, class) in self.classes.iter().enumerate() {
                let count = class.tokens.get(&tok).copied().unwrap_or(0) as f64;
                log_post[k] += ((count + 1.0) / (class.total_tokens as f64 + vocab)).ln();
            }
        }

        // softmax over two classes
        let max = log_post[0].max(log_post[1]);
        let e0 = (log_post[0] - max).exp();
        let e1 = (log_post[1] - max).exp();
        (e1 / (e0 + e1)) as f32
    }

    pub fn passes(&self, content: &str, threshold: f32) -> bool {
        let p = self.prob_relevant(content);
        if !p.is_finite() {
            return true;
        }
        p >= threshold
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading bayes model {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing bayes model {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating directory {}", dir.display()))?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(self)?)
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<(&'static str, bool)> {
        vec![
            ("Bank announces acquisition of fintech startup", true),
            ("Retailer launches digital venture in Mexico", true),
            ("Energy major invests in corporate venture fund", true),
            ("Celebrity wedding photos go viral", false),
            ("Local football team wins derby", false),
            ("Weather forecast: rain all weekend", false),
        ]
    }

    #[test]
    fn tokenizer_drops_stop_words_and_single_chars() {
        assert_eq!(tokenize("The Bank of X buys a fintech"), vec!["bank", "buys", "fintech"]);
    }

    #[test]
    fn separates_obvious_classes() {
        let m = BayesFilter::train(corpus()).unwrap();
        assert!(m.prob_relevant("fintech acquisition by bank") > 0.5);
        assert!(m.prob_relevant("football derby weekend rain") < 0.5);
        assert!(m.passes("digital venture fund", 0.5));
    }

    #[test]
    fn refuses_small_or_single_class_data() {
        assert!(BayesFilter::train(corpus().into_iter().take(3)).is_err());
        let only_pos = vec![("a b c deal", true); 6];
        assert!(BayesFilter::train(only_pos).is_err());
    }

    #[test]
    fn unknown_text_falls_back_to_prior() {
        let m = BayesFilter::train(corpus()).unwrap();
        assert!((m.prob_relevant("zzz qqq") - 0.5).abs() < 1e-6);
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filter_model.json");
        let m = BayesFilter::train(corpus()).unwrap();
        m.save(&path).unwrap();
        let loaded = BayesFilter::load(&path).unwrap();
        assert!((loaded.prob_relevant("bank fintech") - m.prob_relevant("bank fintech")).abs() < 1e-6);
    }
}

//! Per-example text metrics
//!
//! Scores a model's prediction against an example's labels for the selected
//! metric names. Examples without labels produce no text metrics at all, and
//! n-gram metrics are omitted when no label is long enough to contain an
//! n-gram, so absent measurements never dilute a ratio's denominator.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::registry::MetricSelection;
use super::types::{Metric, MetricSet};
use crate::models::Prediction;
use crate::tasks::Example;

static RE_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r##"[!"#$%&()*+,\-./:;<=>?@\[\]\\^`{|}~_']"##).expect("valid regex"));
static RE_ARTICLES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(a|an|the)\b").expect("valid regex"));

/// Lowercase, strip punctuation and articles, collapse whitespace
pub fn normalize_answer(text: &str) -> String {
    let lowered = text.to_lowercase();
    let no_punct = RE_PUNCT.replace_all(&lowered, " ");
    let no_articles = RE_ARTICLES.replace_all(&no_punct, " ");
    no_articles.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tokens(text: &str) -> Vec<String> {
    normalize_answer(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if n == 0 || tokens.len() < n {
        return counts;
    }
    for gram in tokens.windows(n) {
        *counts.entry(gram).or_insert(0) += 1;
    }
    counts
}

fn overlap(pred: &HashMap<&[String], usize>, gold: &HashMap<&[String], usize>) -> usize {
    pred.iter()
        .map(|(gram, count)| (*count).min(gold.get(gram).copied().unwrap_or(0)))
        .sum()
}

/// Token-level F1 between a guess and one answer
pub fn token_f1(guess: &str, answer: &str) -> f64 {
    let guess = tokens(guess);
    let answer = tokens(answer);
    let common = overlap(&ngram_counts(&guess, 1), &ngram_counts(&answer, 1));
    if common == 0 {
        return 0.0;
    }
    let precision = common as f64 / guess.len() as f64;
    let recall = common as f64 / answer.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

/// ROUGE-N recall against one reference, or `None` if the reference has no n-grams
pub fn rouge_n(guess: &str, reference: &str, n: usize) -> Option<f64> {
    let guess = tokens(guess);
    let reference = tokens(reference);
    let gold = ngram_counts(&reference, n);
    let total: usize = gold.values().sum();
    if total == 0 {
        return None;
    }
    let hits = overlap(&ngram_counts(&guess, n), &gold);
    Some(hits as f64 / total as f64)
}

/// ROUGE-L recall (longest common subsequence) against one reference
pub fn rouge_l(guess: &str, reference: &str) -> Option<f64> {
    let guess = tokens(guess);
    let reference = tokens(reference);
    if reference.is_empty() {
        return None;
    }
    let mut row = vec![0usize; reference.len() + 1];
    for g in &guess {
        let mut diag = 0;
        for (j, r) in reference.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if g == r { diag + 1 } else { above.max(row[j]) };
            diag = above;
        }
    }
    Some(row[reference.len()] as f64 / reference.len() as f64)
}

/// Sentence BLEU-4 against all references, with epsilon smoothing for empty
/// precision counts; orders longer than the guess are skipped
///
/// `None` only when every reference is empty. An empty guess scores 0.
pub fn bleu4(guess: &str, references: &[String]) -> Option<f64> {
    const EPSILON: f64 = 0.1;

    let guess = tokens(guess);
    let references: Vec<Vec<String>> = references.iter().map(|r| tokens(r)).collect();
    if references.iter().all(Vec::is_empty) {
        return None;
    }
    if guess.is_empty() {
        return Some(0.0);
    }

    let mut log_sum = 0.0;
    let mut orders = 0;
    for n in 1..=4 {
        let pred = ngram_counts(&guess, n);
        let total: usize = pred.values().sum();
        if total == 0 {
            continue;
        }
        let ref_counts: Vec<_> = references.iter().map(|r| ngram_counts(r, n)).collect();
        let clipped: usize = pred
            .iter()
            .map(|(gram, count)| {
                let max_ref = ref_counts
                    .iter()
                    .map(|c| c.get(gram).copied().unwrap_or(0))
                    .max()
                    .unwrap_or(0);
                (*count).min(max_ref)
            })
            .sum();
        let precision = if clipped == 0 {
            EPSILON / total as f64
        } else {
            clipped as f64 / total as f64
        };
        log_sum += precision.ln();
        orders += 1;
    }

    let closest_ref = references
        .iter()
        .map(Vec::len)
        .min_by_key(|len| (len.abs_diff(guess.len()), *len))
        .unwrap_or(0);
    let brevity = if guess.len() >= closest_ref {
        1.0
    } else {
        (1.0 - closest_ref as f64 / guess.len() as f64).exp()
    };

    Some(brevity * (log_sum / orders as f64).exp())
}

/// Computes the selected text metrics for one example
#[derive(Debug, Clone)]
pub struct TextScorer {
    selection: MetricSelection,
}

impl TextScorer {
    /// Create a scorer for a metric selection
    pub fn new(selection: MetricSelection) -> Self {
        Self { selection }
    }

    /// The selection this scorer computes
    pub fn selection(&self) -> &MetricSelection {
        &self.selection
    }

    /// Score a prediction against the example's labels
    pub fn score(&self, example: &Example, prediction: &Prediction) -> MetricSet {
        let mut set = MetricSet::new();
        if example.labels.is_empty() {
            return set;
        }
        let guess = prediction.text.as_str();
        let labels = &example.labels;

        for name in self.selection.names() {
            let value = match *name {
                "accuracy" => {
                    let normalized = normalize_answer(guess);
                    let correct = labels.iter().any(|l| normalize_answer(l) == normalized);
                    Some(Metric::hit(correct))
                }
                "f1" => best(labels.iter().map(|l| Some(token_f1(guess, l)))),
                "bleu-4" => bleu4(guess, labels).map(|v| Metric::average(v, 1)),
                "rouge-1" => best(labels.iter().map(|l| rouge_n(guess, l, 1))),
                "rouge-2" => best(labels.iter().map(|l| rouge_n(guess, l, 2))),
                "rouge-L" => best(labels.iter().map(|l| rouge_l(guess, l))),
                other => {
                    tracing::debug!(metric = other, "No text scorer for metric");
                    None
                }
            };
            if let Some(metric) = value {
                set.insert(*name, metric);
            }
        }

        set
    }
}

/// Best score over labels as a single-observation ratio
fn best(scores: impl Iterator<Item = Option<f64>>) -> Option<Metric> {
    scores
        .flatten()
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
        .map(|v| Metric::average(v, 1))
}

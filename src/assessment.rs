//! Personality questionnaire aggregates.
//!
//! Answers are on a 1–5 scale and interleaved by trait: answer `i` counts
//! toward the trait whose offset is `i % 5`.
//!
//! | Offset | Trait | Indices |
//! |--------|-------|---------|
//! | 0 | Extraversion | 0, 5, 10, … |
//! | 1 | Agreeableness | 1, 6, 11, … |
//! | 2 | Neuroticism | 2, 7, 12, … |
//! | 3 | Conscientiousness | 3, 8, 13, … |
//! | 4 | Openness | 4, 9, 14, … |
//!
//! With the standard 50 questions each total is out of 50.

use std::fmt;

/// Stride between two answers of the same trait.
const STRIDE: usize = 5;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Trait {
    Extraversion,
    Agreeableness,
    Neuroticism,
    Conscientiousness,
    Openness,
}

impl Trait {
    /// In index-offset order.
    pub const ALL: [Trait; 5] = [
        Trait::Extraversion,
        Trait::Agreeableness,
        Trait::Neuroticism,
        Trait::Conscientiousness,
        Trait::Openness,
    ];

    /// Position of this trait's first answer.
    pub fn offset(self) -> usize {
        self as usize
    }

    /// One-line summary for `level`.
    pub fn summary(self, level: TraitLevel) -> &'static str {
        use TraitLevel::*;
        match (self, level) {
            (Trait::Openness, High) => "Highly creative and open to new experiences",
            (Trait::Openness, Moderate) => "Balanced between novelty and routine",
            (Trait::Openness, Low) => "Prefers tradition and practicality",
            (Trait::Conscientiousness, High) => "Very organized and disciplined",
            (Trait::Conscientiousness, Moderate) => "Structured but flexible",
            (Trait::Conscientiousness, Low) => "Spontaneous and adaptable",
            (Trait::Extraversion, High) => "Social and energetic",
            (Trait::Extraversion, Moderate) => "Balanced social needs",
            (Trait::Extraversion, Low) => "Introverted and reserved",
            (Trait::Agreeableness, High) => "Compassionate and cooperative",
            (Trait::Agreeableness, Moderate) => "Assertive yet kind",
            (Trait::Agreeableness, Low) => "Independent and direct",
            (Trait::Neuroticism, High) => "Sensitive to stress",
            (Trait::Neuroticism, Moderate) => "Generally resilient",
            (Trait::Neuroticism, Low) => "Emotionally stable",
        }
    }

    /// Longer description for `level`.
    pub fn description(self, level: TraitLevel) -> &'static str {
        use TraitLevel::*;
        match (self, level) {
            (Trait::Openness, High) => {
                "Highly creative, curious, and open to new experiences. You enjoy exploring abstract ideas and artistic expressions."
            }
            (Trait::Openness, Moderate) => {
                "Practical but imaginative, you balance novelty with familiar routines."
            }
            (Trait::Openness, Low) => {
                "Traditional and pragmatic, you value concrete information over abstract concepts."
            }
            (Trait::Conscientiousness, High) => {
                "Highly organized, responsible, and dependable. You excel in planning and executing tasks."
            }
            (Trait::Conscientiousness, Moderate) => {
                "Moderately organized, you balance structure with flexibility in your approach."
            }
            (Trait::Conscientiousness, Low) => {
                "Spontaneous and adaptable, you prefer to go with the flow rather than stick to a plan."
            }
            (Trait::Extraversion, High) => {
                "Social and outgoing, you thrive in group settings and enjoy engaging with others."
            }
            (Trait::Extraversion, Moderate) => {
                "Moderately social, you appreciate both social interactions and personal time."
            }
            (Trait::Extraversion, Low) => {
                "Reserved and introspective, you prefer solitary activities and quiet environments."
            }
            (Trait::Agreeableness, High) => {
                "Compassionate and cooperative, you prioritize harmony in relationships."
            }
            (Trait::Agreeableness, Moderate) => {
                "Moderately agreeable, you can be assertive while still valuing kindness."
            }
            (Trait::Agreeableness, Low) => {
                "Independent and direct, you prioritize honesty over tact."
            }
            (Trait::Neuroticism, High) => {
                "Sensitive to stress, you may experience anxiety and emotional fluctuations."
            }
            (Trait::Neuroticism, Moderate) => {
                "Generally resilient, you handle stress but can be affected by challenges."
            }
            (Trait::Neuroticism, Low) => {
                "Emotionally stable, you maintain a calm demeanor even in stressful situations."
            }
        }
    }
}

impl fmt::Display for Trait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// TraitLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraitLevel {
    High,
    Moderate,
    Low,
}

impl TraitLevel {
    /// ≥ 40 High, ≥ 30 Moderate, otherwise Low.
    pub fn from_score(score: u32) -> Self {
        match score {
            40.. => TraitLevel::High,
            30..=39 => TraitLevel::Moderate,
            _ => TraitLevel::Low,
        }
    }
}

// ---------------------------------------------------------------------------
// TraitTotals
// ---------------------------------------------------------------------------

/// Per-trait answer sums.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraitTotals([u32; 5]);

impl TraitTotals {
    pub fn get(&self, t: Trait) -> u32 {
        self.0[t.offset()]
    }

    /// `(trait, total, level)` in index-offset order.
    pub fn interpret(&self) -> impl Iterator<Item = (Trait, u32, TraitLevel)> + '_ {
        Trait::ALL.into_iter().map(|t| {
            let score = self.get(t);
            (t, score, TraitLevel::from_score(score))
        })
    }
}

/// Sum `answers` into the five trait totals.
///
/// Any number of answers is accepted; a trait with no answers totals 0.
///
/// ```rust
/// use emotion_assistant::assessment::{trait_totals, Trait};
///
/// let totals = trait_totals(&[5, 1, 1, 1, 1, 4]);
/// assert_eq!(totals.get(Trait::Extraversion), 9);
/// assert_eq!(totals.get(Trait::Openness), 1);
/// ```
pub fn trait_totals(answers: &[u32]) -> TraitTotals {
    let mut totals = [0u32; 5];
    for (i, &answer) in answers.iter().enumerate() {
        totals[i % STRIDE] += answer;
    }
    TraitTotals(totals)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_follow_stride_five() {
        // Trait at offset k answers k+1 everywhere.
        let answers: Vec<u32> = (0..50).map(|i| (i % 5) as u32 + 1).collect();
        let totals = trait_totals(&answers);

        assert_eq!(totals.get(Trait::Extraversion), 10);
        assert_eq!(totals.get(Trait::Agreeableness), 20);
        assert_eq!(totals.get(Trait::Neuroticism), 30);
        assert_eq!(totals.get(Trait::Conscientiousness), 40);
        assert_eq!(totals.get(Trait::Openness), 50);
    }

    #[test]
    fn empty_answers_total_zero() {
        assert_eq!(trait_totals(&[]), TraitTotals::default());
    }

    #[test]
    fn level_thresholds() {
        assert_eq!(TraitLevel::from_score(50), TraitLevel::High);
        assert_eq!(TraitLevel::from_score(40), TraitLevel::High);
        assert_eq!(TraitLevel::from_score(39), TraitLevel::Moderate);
        assert_eq!(TraitLevel::from_score(30), TraitLevel::Moderate);
        assert_eq!(TraitLevel::from_score(29), TraitLevel::Low);
        assert_eq!(TraitLevel::from_score(0), TraitLevel::Low);
    }

    #[test]
    fn interpretation_pairs_scores_with_text() {
        let answers: Vec<u32> = (0..50).map(|i| (i % 5) as u32 + 1).collect();
        let rows: Vec<_> = trait_totals(&answers).interpret().collect();

        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0], (Trait::Extraversion, 10, TraitLevel::Low));
        assert_eq!(rows[2], (Trait::Neuroticism, 30, TraitLevel::Moderate));
        assert_eq!(rows[4], (Trait::Openness, 50, TraitLevel::High));
        assert_eq!(
            Trait::Openness.summary(TraitLevel::High),
            "Highly creative and open to new experiences"
        );
        assert!(Trait::Neuroticism
            .description(TraitLevel::Low)
            .starts_with("Emotionally stable"));
    }
}

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{NarrativeError, NarrativeFacts, NarrativeGenerator, NarrativeSubject};

/// Local, always-available narratives.
///
/// Deviation phrasing is picked from three fixed templates by hashing the
/// seed with the facts, so the same inputs always read the same way.
/// Pattern narratives reuse the pattern's own description.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateNarrator {
    seed: u64,
}

const DEVIATION_TEMPLATES: usize = 3;

impl TemplateNarrator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn name(&self) -> &'static str {
        "template"
    }

    /// Index of the deviation template used for these facts
    pub fn choose(&self, facts: &NarrativeFacts) -> usize {
        let mut hasher = Sha256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update(facts.category.as_str().as_bytes());
        if let NarrativeSubject::Deviation { percentage } = facts.subject {
            hasher.update(percentage.to_le_bytes());
        }
        hasher.update(facts.occurrences.to_le_bytes());
        let digest = hasher.finalize();

        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(head) % DEVIATION_TEMPLATES as u64) as usize
    }

    pub fn render(&self, facts: &NarrativeFacts) -> String {
        match &facts.subject {
            NarrativeSubject::Deviation { percentage } => {
                let category = facts.category.as_str();
                let count = facts.occurrences;
                match self.choose(facts) {
                    0 => format!(
                        "This week, your {} spending is {}% higher than your typical weeks, across {} transactions. It might be a one-off, or a new pattern. Want to take a look?",
                        category, percentage, count
                    ),
                    1 => format!(
                        "It looks like your {} spending changed this week—{} transactions, about {}% more than usual. Does this feel like a temporary shift?",
                        category, count, percentage
                    ),
                    _ => format!(
                        "We noticed your {} activity is higher than your baseline this week. This could reflect a change in routine, or just a busy week.",
                        category
                    ),
                }
            }
            NarrativeSubject::Pattern { description, .. } => description.clone(),
        }
    }
}

#[async_trait]
impl NarrativeGenerator for TemplateNarrator {
    async fn generate(&self, facts: &NarrativeFacts) -> Result<String, NarrativeError> {
        Ok(self.render(facts))
    }

    fn name(&self) -> &'static str {
        TemplateNarrator::name(self)
    }
}

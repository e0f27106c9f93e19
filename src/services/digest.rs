//! Weekly digest wording.

use crate::models::Category;

pub const DIGEST_TITLE: &str = "Your Weekly Spending Story";

pub fn digest_body(changed: &[Category]) -> String {
    let detail = if changed.is_empty() {
        "No major pattern changes this week—your spending aligned with your usual rhythm."
            .to_string()
    } else {
        let names: Vec<&str> = changed.iter().map(|c| c.as_str()).collect();
        format!(
            "A couple of patterns changed this week, mainly in {}.",
            names.join(" and ")
        )
    };
    format!("Your weekly Spending Story is ready. {}", detail)
}

use super::GenerationRequest;
use crate::models::Answers;
use crate::scoring::{ScoreCard, QUESTIONS};
use std::fmt::Write as _;

pub const SYSTEM_ROLE: &str = "You are an AI and automation strategy advisor for an insurance organization. \
You give practical, structured recommendations on measuring value, sequencing delivery and managing delivery risk.";

pub const TEMPERATURE: f32 = 0.7;
pub const ROI_MAX_TOKENS: u32 = 2000;
pub const COMPLEXITY_MAX_TOKENS: u32 = 2500;

const NOT_SPECIFIED: &str = "Not specified";

/// ROI planner fields and the labels they carry in the prompt.
pub const ROI_FIELDS: [(&str, &str); 8] = [
    ("initiative_type", "Initiative type"),
    ("value_type", "Primary value type"),
    ("scale", "Implementation scale"),
    ("units_processed", "Units processed per month"),
    ("current_process", "Current process"),
    ("success_metrics", "Success measurement approach"),
    ("timeline", "Expected ROI timeline"),
    ("industry_specifics", "Industry focus area"),
];

const COMPLEXITY_LABELS: [(&str, &str); 13] = [
    ("business_case_clarity", "Business case clarity"),
    ("data_availability", "Data availability"),
    ("data_quality", "Data quality"),
    ("infrastructure_readiness", "Infrastructure readiness"),
    ("stakeholder_buyin", "Stakeholder buy-in"),
    ("budget_availability", "Budget status"),
    ("regulatory_compliance", "Regulatory and compliance risk"),
    ("integration_complexity", "Integration complexity"),
    ("technology_maturity", "Technology maturity"),
    ("change_management", "Change readiness"),
    ("data_governance", "Data governance"),
    ("expected_timeline", "Expected timeline"),
    ("team_availability", "Team availability"),
];

fn answer<'a>(answers: &'a Answers, field: &str) -> &'a str {
    answers
        .get(field)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .unwrap_or(NOT_SPECIFIED)
}

fn label(field: &'static str) -> &'static str {
    COMPLEXITY_LABELS
        .iter()
        .find(|(id, _)| *id == field)
        .map(|(_, label)| *label)
        .unwrap_or(field)
}

pub fn roi_prompt(answers: &Answers) -> String {
    let mut prompt = String::from("An initiative owner described a planned initiative as follows:\n\n");
    for (field, label) in ROI_FIELDS {
        let _ = writeln!(prompt, "- {}: {}", label, answer(answers, field));
    }
    prompt.push_str(
        "\nRecommend how to measure the return on investment of this initiative. Include:\n\
         1. The key metrics to track, with a unit of measure for each\n\
         2. How to capture a baseline before go-live\n\
         3. A realistic monthly tracking cadence and who should own each metric\n\
         4. Leading indicators that show value early\n\
         5. Risks that could undermine the expected return\n\
         Keep the answer concise and use headings.",
    );
    prompt
}

pub fn complexity_prompt(answers: &Answers, card: &ScoreCard) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Initiative: {}\n",
        answer(answers, "initiative_name")
    );
    prompt.push_str("Readiness assessment:\n");
    for question in QUESTIONS.iter() {
        let _ = writeln!(prompt, "- {}: {}", label(question.id), answer(answers, question.id));
    }
    let _ = writeln!(
        prompt,
        "\nComplexity score: {:.2} / 100\nValue score: {:.2} / 100\nQuadrant: {}\n",
        card.complexity, card.value, card.quadrant
    );
    prompt.push_str(
        "Based on this assessment, provide:\n\
         1. An interpretation of the quadrant placement\n\
         2. The biggest blockers to address first\n\
         3. A phased implementation approach\n\
         4. Whether to proceed, rescope or defer, with reasons\n\
         Keep the answer concise and use headings.",
    );
    prompt
}

pub fn roi_request(answers: &Answers) -> GenerationRequest {
    GenerationRequest {
        system_role: SYSTEM_ROLE.to_string(),
        prompt: roi_prompt(answers),
        temperature: TEMPERATURE,
        max_tokens: ROI_MAX_TOKENS,
    }
}

pub fn complexity_request(answers: &Answers, card: &ScoreCard) -> GenerationRequest {
    GenerationRequest {
        system_role: SYSTEM_ROLE.to_string(),
        prompt: complexity_prompt(answers, card),
        temperature: TEMPERATURE,
        max_tokens: COMPLEXITY_MAX_TOKENS,
    }
}

//! Complexity/value scoring for the readiness questionnaire.
//!
//! Each question has four answer labels, best case first. Complexity is the
//! mean of every question's complexity points; value is the sum of the value
//! points of a subset of questions. Both tables are plain data so every
//! (question, answer) pair can be enumerated.

use crate::models::Answers;
use serde::{Deserialize, Serialize};

/// Complexity points for an unanswered question or an unknown label.
pub const NEUTRAL_COMPLEXITY: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Question {
    pub id: &'static str,
    pub options: [&'static str; 4],
    pub complexity: [u32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueWeight {
    pub question: &'static str,
    pub points: [u32; 4],
    pub default: u32,
}

pub static QUESTIONS: [Question; 13] = [
    Question {
        id: "business_case_clarity",
        options: [
            "Very clear with quantified benefits",
            "Moderately clear",
            "Somewhat unclear",
            "Needs significant work",
        ],
        complexity: [0, 30, 65, 90],
    },
    Question {
        id: "data_availability",
        options: [
            "Readily available and accessible",
            "Available but needs gathering",
            "Partially available",
            "Not available yet",
        ],
        complexity: [0, 30, 60, 90],
    },
    Question {
        id: "data_quality",
        options: [
            "High quality and clean",
            "Moderate quality",
            "Poor quality, needs cleaning",
            "Unknown or unassessed",
        ],
        complexity: [0, 35, 70, 90],
    },
    Question {
        id: "infrastructure_readiness",
        options: [
            "Fully ready",
            "Mostly ready, minor gaps",
            "Significant gaps exist",
            "Not ready, needs build-out",
        ],
        complexity: [0, 25, 65, 95],
    },
    Question {
        id: "stakeholder_buyin",
        options: [
            "Strong support from all levels",
            "Moderate support",
            "Limited support",
            "No support secured yet",
        ],
        complexity: [0, 30, 65, 90],
    },
    Question {
        id: "budget_availability",
        options: [
            "Approved and allocated",
            "Budget requested pending approval",
            "Budget uncertain",
            "No budget identified",
        ],
        complexity: [0, 30, 60, 90],
    },
    Question {
        id: "regulatory_compliance",
        options: [
            "Low risk, compliant",
            "Moderate risk, manageable",
            "High risk, needs review",
            "Very high risk or unknown",
        ],
        complexity: [0, 35, 70, 95],
    },
    Question {
        id: "integration_complexity",
        options: [
            "Simple, minimal integration",
            "Moderate complexity",
            "Complex, multiple systems",
            "Very complex, enterprise-wide",
        ],
        complexity: [5, 35, 70, 95],
    },
    Question {
        id: "technology_maturity",
        options: [
            "Proven and widely adopted",
            "Established but evolving",
            "Emerging technology",
            "Experimental or cutting-edge",
        ],
        complexity: [0, 30, 65, 95],
    },
    Question {
        id: "change_management",
        options: [
            "Highly prepared with change plan",
            "Moderately prepared",
            "Limited preparation",
            "Not prepared",
        ],
        complexity: [0, 30, 65, 90],
    },
    Question {
        id: "data_governance",
        options: [
            "Strong governance in place",
            "Adequate governance",
            "Weak governance",
            "No governance established",
        ],
        complexity: [0, 30, 65, 90],
    },
    Question {
        id: "expected_timeline",
        options: ["Under 3 months", "3-6 months", "6-12 months", "Over 12 months"],
        complexity: [10, 35, 65, 90],
    },
    Question {
        id: "team_availability",
        options: [
            "Team fully allocated",
            "Team mostly available",
            "Limited availability",
            "Team not identified",
        ],
        complexity: [0, 30, 65, 90],
    },
];

pub static VALUE_WEIGHTS: [ValueWeight; 6] = [
    ValueWeight {
        question: "business_case_clarity",
        points: [25, 18, 8, 2],
        default: 12,
    },
    ValueWeight {
        question: "data_availability",
        points: [15, 10, 5, 0],
        default: 7,
    },
    ValueWeight {
        question: "data_quality",
        points: [15, 10, 4, 2],
        default: 7,
    },
    ValueWeight {
        question: "stakeholder_buyin",
        points: [20, 14, 6, 0],
        default: 10,
    },
    ValueWeight {
        question: "budget_availability",
        points: [15, 10, 5, 0],
        default: 7,
    },
    ValueWeight {
        question: "expected_timeline",
        points: [10, 8, 5, 2],
        default: 5,
    },
];

/// `[value band][complexity band]`, bands ordered Low, Medium, High.
const QUADRANTS: [[&str; 3]; 3] = [
    ["Nice to Have", "Deprioritize", "Avoid"],
    ["Quick Win", "Evaluate Further", "Complex - Reassess Scope"],
    [
        "Low Hanging Fruit",
        "Strategic Priority - Plan Carefully",
        "Major Initiative - Requires AI COE",
    ],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Band {
    Low,
    Medium,
    High,
}

impl Band {
    fn of(score: f64, medium_from: f64, high_from: f64) -> Self {
        if score >= high_from {
            Self::High
        } else if score >= medium_from {
            Self::Medium
        } else {
            Self::Low
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }
}

pub fn complexity_band(complexity: f64) -> Band {
    Band::of(complexity, 33.0, 66.0)
}

pub fn value_band(value: f64) -> Band {
    Band::of(value, 40.0, 70.0)
}

pub fn quadrant(complexity: f64, value: f64) -> &'static str {
    QUADRANTS[value_band(value).index()][complexity_band(complexity).index()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub complexity: f64,
    pub value: f64,
    pub quadrant: String,
}

impl Question {
    /// Position of `answer` among this question's labels.
    pub fn option_index(&self, answer: &str) -> Option<usize> {
        let answer = answer.trim();
        self.options.iter().position(|option| *option == answer)
    }
}

pub fn question(id: &str) -> Option<&'static Question> {
    QUESTIONS.iter().find(|question| question.id == id)
}

fn answer_index(answers: &Answers, question: &Question) -> Option<usize> {
    answers
        .get(question.id)
        .and_then(|answer| question.option_index(answer))
}

pub fn complexity_score(answers: &Answers) -> f64 {
    let total: u32 = QUESTIONS
        .iter()
        .map(|question| {
            answer_index(answers, question)
                .map(|index| question.complexity[index])
                .unwrap_or(NEUTRAL_COMPLEXITY)
        })
        .sum();
    round2(f64::from(total) / QUESTIONS.len() as f64)
}

pub fn value_score(answers: &Answers) -> f64 {
    let total: u32 = VALUE_WEIGHTS
        .iter()
        .map(|weight| {
            question(weight.question)
                .and_then(|question| answer_index(answers, question))
                .map(|index| weight.points[index])
                .unwrap_or(weight.default)
        })
        .sum();
    f64::from(total.min(100))
}

pub fn score(answers: &Answers) -> ScoreCard {
    let complexity = complexity_score(answers);
    let value = value_score(answers);
    ScoreCard {
        complexity,
        value,
        quadrant: quadrant(complexity, value).to_string(),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers_at(option: usize) -> Answers {
        QUESTIONS
            .iter()
            .map(|question| (question.id.to_string(), question.options[option].to_string()))
            .collect()
    }

    #[test]
    fn every_value_question_exists() {
        for weight in VALUE_WEIGHTS {
            assert!(question(weight.question).is_some(), "{}", weight.question);
        }
    }

    #[test]
    fn each_answer_moves_complexity_by_its_points() {
        for question in QUESTIONS {
            for (index, option) in question.options.iter().enumerate() {
                let mut answers = Answers::new();
                answers.insert(question.id.to_string(), option.to_string());
                let expected = round2(
                    f64::from(question.complexity[index] + NEUTRAL_COMPLEXITY * 12) / 13.0,
                );
                assert_eq!(complexity_score(&answers), expected, "{} / {}", question.id, option);
            }
        }
    }

    #[test]
    fn each_answer_moves_value_by_its_points() {
        let neutral: u32 = VALUE_WEIGHTS.iter().map(|weight| weight.default).sum();
        assert_eq!(value_score(&Answers::new()), f64::from(neutral));

        for weight in VALUE_WEIGHTS {
            let asked = question(weight.question).expect("question");
            for (index, option) in asked.options.iter().enumerate() {
                let mut answers = Answers::new();
                answers.insert(asked.id.to_string(), option.to_string());
                let expected = neutral - weight.default + weight.points[index];
                assert_eq!(value_score(&answers), f64::from(expected), "{} / {}", asked.id, option);
            }
        }
    }

    #[test]
    fn best_case_is_low_hanging_fruit() {
        let card = score(&answers_at(0));
        assert_eq!(card.complexity, 1.15);
        assert_eq!(card.value, 100.0);
        assert_eq!(card.quadrant, "Low Hanging Fruit");
    }

    #[test]
    fn worst_case_is_avoid() {
        let card = score(&answers_at(3));
        assert_eq!(card.complexity, 91.54);
        assert_eq!(card.value, 6.0);
        assert_eq!(card.quadrant, "Avoid");
    }

    #[test]
    fn unanswered_questionnaire_is_neutral() {
        let card = score(&Answers::new());
        assert_eq!(card.complexity, 50.0);
        assert_eq!(card.value, 48.0);
        assert_eq!(card.quadrant, "Evaluate Further");
    }

    #[test]
    fn unknown_labels_fall_back_and_labels_are_trimmed() {
        let mut answers = Answers::new();
        answers.insert("expected_timeline".to_string(), "Someday".to_string());
        assert_eq!(complexity_score(&answers), 50.0);

        answers.insert("expected_timeline".to_string(), " Under 3 months ".to_string());
        assert_eq!(complexity_score(&answers), round2(f64::from(10 + 50 * 12) / 13.0));
    }

    #[test]
    fn band_thresholds_are_inclusive_lower_bounds() {
        assert_eq!(quadrant(32.99, 70.0), "Low Hanging Fruit");
        assert_eq!(quadrant(33.0, 70.0), "Strategic Priority - Plan Carefully");
        assert_eq!(quadrant(66.0, 70.0), "Major Initiative - Requires AI COE");
        assert_eq!(quadrant(0.0, 69.99), "Quick Win");
        assert_eq!(quadrant(50.0, 40.0), "Evaluate Further");
        assert_eq!(quadrant(80.0, 55.0), "Complex - Reassess Scope");
        assert_eq!(quadrant(10.0, 39.99), "Nice to Have");
        assert_eq!(quadrant(40.0, 0.0), "Deprioritize");
        assert_eq!(quadrant(100.0, 0.0), "Avoid");
    }
}

//! External collaborator contracts
//!
//! The review, hint and distractor endpoints are AI services owned by the
//! platform backend. This module fixes the request/response shapes and the
//! traits a host implements to reach them. `OfflineReviewer`, `OfflineHints`
//! and `OfflineDistractors` answer locally and back the native demo and tests.

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::settings::Tuning;
use crate::sim::FALLBACK_DISTRACTORS;
use crate::sim::token::tokenize;

/// Code review request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub code: String,
    pub solution: String,
    pub language: String,
}

/// Code review response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub feedback: String,
    /// Structured verdict; older endpoints only send `feedback`
    #[serde(default)]
    pub passed: Option<bool>,
}

/// Outcome of a review
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl ReviewResponse {
    /// Pass/fail for this response.
    ///
    /// Uses the structured flag when present. Otherwise falls back to phrase
    /// matching on the feedback text, with fail phrases taking precedence.
    pub fn verdict(&self, tuning: &Tuning) -> Verdict {
        if let Some(passed) = self.passed {
            return if passed { Verdict::Pass } else { Verdict::Fail };
        }
        let text = self.feedback.to_lowercase();
        if tuning.fail_phrases.iter().any(|p| text.contains(&p.to_lowercase())) {
            return Verdict::Fail;
        }
        if tuning.pass_phrases.iter().any(|p| text.contains(&p.to_lowercase())) {
            log::debug!("Review passed on feedback phrase match");
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }
}

/// Hint request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintRequest {
    pub problem: String,
    pub code: String,
}

/// Hint response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintResponse {
    pub hint: String,
}

/// Distractor generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistractorRequest {
    pub language: String,
    pub correct_snippets: Vec<String>,
    pub count: u32,
}

/// Distractor payload: either a bare list or `{"distractors": [...]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DistractorResponse {
    List(Vec<String>),
    Wrapped { distractors: Vec<String> },
}

impl DistractorResponse {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            DistractorResponse::List(v) => v,
            DistractorResponse::Wrapped { distractors } => distractors,
        }
    }
}

/// Reviews assembled code against the reference solution
pub trait CodeReviewer {
    fn review(&self, request: &ReviewRequest) -> Result<ReviewResponse, ServiceError>;
}

/// Produces a hint for the current code
pub trait HintProvider {
    fn hint(&self, request: &HintRequest) -> Result<HintResponse, ServiceError>;
}

/// Generates decoy tokens for a level
pub trait DistractorProvider {
    fn distractors(&self, request: &DistractorRequest) -> Result<Vec<String>, ServiceError>;
}

/// Local reviewer: the code passes when its token sequence equals the solution's
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineReviewer;

impl CodeReviewer for OfflineReviewer {
    fn review(&self, request: &ReviewRequest) -> Result<ReviewResponse, ServiceError> {
        let got = tokenize(&request.code);
        let want = tokenize(&request.solution);
        if got == want {
            return Ok(ReviewResponse {
                feedback: "Correct! Well done.".to_string(),
                passed: Some(true),
            });
        }

        let mismatch = got.iter().zip(&want).position(|(a, b)| a != b);
        let feedback = match mismatch {
            Some(i) => format!(
                "Token {} should be `{}` but found `{}`.",
                i + 1,
                want[i],
                got[i]
            ),
            None if got.len() < want.len() => {
                format!("The code stops early; `{}` comes next.", want[got.len()])
            }
            None => format!(
                "Unexpected extra code after `{}`.",
                want.last().map(String::as_str).unwrap_or("")
            ),
        };
        Ok(ReviewResponse {
            feedback,
            passed: Some(false),
        })
    }
}

/// Local hints derived from a known solution
#[derive(Debug, Clone, Default)]
pub struct OfflineHints {
    pub solution: String,
}

impl HintProvider for OfflineHints {
    fn hint(&self, request: &HintRequest) -> Result<HintResponse, ServiceError> {
        let want = tokenize(&self.solution);
        let got = tokenize(&request.code);
        let matched = got.iter().zip(&want).take_while(|(a, b)| a == b).count();
        let hint = match want.get(matched) {
            Some(next) if matched == got.len() => format!("Next, look for `{}`.", next),
            Some(next) => format!("Check token {}: it should be `{}`.", matched + 1, next),
            None => "Your code already has every piece; submit it for review.".to_string(),
        };
        Ok(HintResponse { hint })
    }
}

/// Local distractors: fallback strings that do not occur in the solution
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineDistractors;

impl DistractorProvider for OfflineDistractors {
    fn distractors(&self, request: &DistractorRequest) -> Result<Vec<String>, ServiceError> {
        Ok(FALLBACK_DISTRACTORS
            .iter()
            .filter(|d| !request.correct_snippets.iter().any(|s| s == *d))
            .take(request.count as usize)
            .map(|d| d.to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(feedback: &str, passed: Option<bool>) -> ReviewResponse {
        ReviewResponse {
            feedback: feedback.to_string(),
            passed,
        }
    }

    #[test]
    fn test_structured_verdict_wins() {
        let t = Tuning::default();
        assert_eq!(response("Looks wrong", Some(true)).verdict(&t), Verdict::Pass);
        assert_eq!(response("Correct!", Some(false)).verdict(&t), Verdict::Fail);
    }

    #[test]
    fn test_phrase_fallback() {
        let t = Tuning::default();
        assert_eq!(response("Well Done, it works", None).verdict(&t), Verdict::Pass);
        assert_eq!(response("That is CORRECT.", None).verdict(&t), Verdict::Pass);
        assert_eq!(response("This is incorrect.", None).verdict(&t), Verdict::Fail);
        assert_eq!(response("Not correct yet", None).verdict(&t), Verdict::Fail);
        assert_eq!(response("Try again", None).verdict(&t), Verdict::Fail);
    }

    #[test]
    fn test_review_response_without_flag_parses() {
        let r: ReviewResponse = serde_json::from_str(r#"{"feedback":"ok"}"#).unwrap();
        assert_eq!(r.passed, None);
    }

    #[test]
    fn test_distractor_request_shape() {
        let req = DistractorRequest {
            language: "python".into(),
            correct_snippets: vec!["print".into()],
            count: 5,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"correctSnippets\":[\"print\"]"));
    }

    #[test]
    fn test_distractor_response_forms() {
        let parse = |json: &str| {
            serde_json::from_str::<DistractorResponse>(json).map(DistractorResponse::into_vec)
        };
        assert_eq!(parse(r#"["a","b"]"#).unwrap(), vec!["a", "b"]);
        assert_eq!(parse(r#"{"distractors":["c"]}"#).unwrap(), vec!["c"]);
        assert!(parse(r#"{"nope":1}"#).is_err());
    }

    #[test]
    fn test_offline_distractors_skip_solution_tokens() {
        let request = DistractorRequest {
            language: "python".into(),
            correct_snippets: vec!["print".into(), "(".into()],
            count: 3,
        };
        let list = OfflineDistractors.distractors(&request).unwrap();
        assert_eq!(list, vec!["var", "let", "const"]);
        let request = DistractorRequest {
            correct_snippets: vec!["var".into()],
            ..request
        };
        assert_eq!(
            OfflineDistractors.distractors(&request).unwrap(),
            vec!["let", "const", "function"]
        );
    }

    #[test]
    fn test_offline_reviewer() {
        let req = |code: &str| ReviewRequest {
            code: code.into(),
            solution: "print('hi')".into(),
            language: "python".into(),
        };
        let ok = OfflineReviewer.review(&req("print ( 'hi' )")).unwrap();
        assert_eq!(ok.passed, Some(true));

        let wrong = OfflineReviewer.review(&req("print('ho')")).unwrap();
        assert_eq!(wrong.passed, Some(false));
        assert!(wrong.feedback.contains("'hi'"));

        let short = OfflineReviewer.review(&req("print(")).unwrap();
        assert!(short.feedback.contains("stops early"));
    }

    #[test]
    fn test_offline_hints() {
        let hints = OfflineHints {
            solution: "x = 1".into(),
        };
        let h = hints
            .hint(&HintRequest {
                problem: String::new(),
                code: "x".into(),
            })
            .unwrap();
        assert_eq!(h.hint, "Next, look for `=`.");
        let h = hints
            .hint(&HintRequest {
                problem: String::new(),
                code: "x = 1".into(),
            })
            .unwrap();
        assert!(h.hint.contains("submit"));
    }
}

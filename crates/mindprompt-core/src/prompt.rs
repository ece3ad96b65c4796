//! Prompt Categories
//!
//! The closed set of prompt flavours a user can ask for, with the system
//! instruction sent to the model and the intro used by the templated fallback.

use serde::{Deserialize, Serialize};

/// Requested prompt flavour
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptCategory {
    Code,
    Research,
    Creative,
    Business,
    Education,
    #[default]
    #[serde(other)]
    General,
}

impl PromptCategory {
    pub const ALL: [Self; 6] = [
        Self::Code,
        Self::Research,
        Self::Creative,
        Self::Business,
        Self::Education,
        Self::General,
    ];

    /// Parse a category tag. Unknown tags map to `General`.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "code" => Self::Code,
            "research" => Self::Research,
            "creative" => Self::Creative,
            "business" => Self::Business,
            "education" => Self::Education,
            _ => Self::General,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Research => "research",
            Self::Creative => "creative",
            Self::Business => "business",
            Self::Education => "education",
            Self::General => "general",
        }
    }

    /// System instruction for the model
    pub const fn system_instruction(self) -> &'static str {
        match self {
            Self::Code => {
                "You are an expert prompt engineer specializing in code generation. Convert the following mind map into a clear, structured prompt for AI code generation. Include:
- Specific programming languages and frameworks
- Expected functionality and features
- Code structure and architecture
- Best practices to follow
Make it natural and conversational, not robotic."
            }
            Self::Research => {
                "You are an expert prompt engineer for research and analysis. Convert the following mind map into a comprehensive research prompt. Include:
- Research questions and objectives
- Methodology and approach
- Key areas to investigate
- Expected depth and format
Make it sound natural and academic, not mechanical."
            }
            Self::Creative => {
                "You are an expert prompt engineer for creative content. Convert the following mind map into an inspiring creative prompt. Include:
- Tone, style, and mood
- Key themes and elements
- Target audience
- Format and length
Make it engaging and natural, like a creative brief."
            }
            Self::Business => {
                "You are an expert prompt engineer for business applications. Convert the following mind map into a professional business prompt. Include:
- Business objectives and goals
- Target audience and stakeholders
- Key deliverables
- Success metrics
Make it professional yet conversational."
            }
            Self::Education => {
                "You are an expert prompt engineer for educational content. Convert the following mind map into a clear educational prompt. Include:
- Learning objectives
- Target audience level
- Teaching approach
- Assessment criteria
Make it clear and approachable, like a lesson plan."
            }
            Self::General => {
                "You are an expert prompt engineer. Convert the following mind map into a well-structured, clear prompt for AI. Maintain hierarchy, add context, and make it natural and human-like. Focus on clarity and specificity while keeping a conversational tone."
            }
        }
    }

    /// Opening sentence of the templated fallback
    pub const fn fallback_intro(self) -> &'static str {
        match self {
            Self::Code => "I need help creating code with the following structure and requirements:",
            Self::Research => "I need to conduct research on the following topics:",
            Self::Creative => "I need creative content based on these ideas:",
            Self::Business => "I need business-focused content covering:",
            Self::Education => "I need educational content about:",
            Self::General => "Here's what I need help with:",
        }
    }
}

impl std::fmt::Display for PromptCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User message wrapping the outline
pub fn user_message(outline: &str) -> String {
    format!(
        "Mind Map Structure:\n\n{outline}\n\nPlease convert this into an optimized, natural-sounding prompt that maintains the hierarchical structure but reads like it was written by a human. Focus on clarity, context, and proper formatting."
    )
}

/// Deterministic prompt used when the model cannot be reached
pub fn fallback_prompt(outline: &str, category: PromptCategory) -> String {
    format!(
        "{}\n\n{outline}\n\nPlease provide a comprehensive response that addresses all these points.",
        category.fallback_intro()
    )
}

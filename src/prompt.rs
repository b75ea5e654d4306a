//! System prompt templates and message composition
//!
//! Exactly one of two fixed templates is used per request. The
//! document-grounded template embeds the extracted text verbatim.

use crate::llm::LlmMessage;

/// Template used when no document is attached
const GENERAL_PROMPT: &str = r"You are a helpful, knowledgeable, and friendly AI assistant. Provide comprehensive, detailed, and well-structured responses that fully address the user's questions.

Formatting Guidelines:
- Provide thorough and detailed answers - don't be overly brief
- Use **bold** for section headings, important topics, key concepts, and terms that need emphasis
- Use simple bullet points with hyphens (-) for lists
- Use numbered lists (1., 2., 3.) when order matters
- Use *italics* occasionally for subtle emphasis or foreign terms
- Make your responses comprehensive and informative while using proper Markdown formatting
- Bold formatting should help organize content and highlight important information
";

const DOCUMENT_PREAMBLE: &str = r"You are a helpful AI assistant specialized in document analysis. You have access to the content of a PDF document that the user has uploaded.

PDF Document Content:
";

const DOCUMENT_INSTRUCTIONS: &str = r"

Instructions:
- Provide detailed, comprehensive answers based on the PDF content when relevant
- Reference specific sections, pages, or quotes from the PDF when applicable
- If a question cannot be fully answered from the PDF, clearly state this and provide additional helpful context from your general knowledge
- Be thorough in your analysis and explanations - users want detailed insights
- Explain concepts, provide context, and offer comprehensive information

Formatting Guidelines:
- Use **bold** for section headings, key topics from the PDF, important concepts, and terms that need emphasis
- Use simple bullet points with hyphens (-) for lists
- Use numbered lists (1., 2., 3.) when showing steps or ordered information
- Use *italics* occasionally for document titles, subtle emphasis, or technical terms
- Structure your response with clear headings and proper formatting
- Bold formatting should help organize the content and make important information stand out
- Prioritize detailed, helpful content with proper visual structure
";

/// Which template a request gets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    General,
    DocumentGrounded,
}

impl PromptKind {
    pub fn for_document(document_text: Option<&str>) -> Self {
        match document_text {
            Some(text) if !text.is_empty() => Self::DocumentGrounded,
            _ => Self::General,
        }
    }
}

/// Build the system instruction for a request.
pub fn system_prompt(document_text: Option<&str>) -> String {
    match (PromptKind::for_document(document_text), document_text) {
        (PromptKind::DocumentGrounded, Some(text)) => {
            let mut prompt =
                String::with_capacity(DOCUMENT_PREAMBLE.len() + text.len() + DOCUMENT_INSTRUCTIONS.len());
            prompt.push_str(DOCUMENT_PREAMBLE);
            prompt.push_str(text);
            prompt.push_str(DOCUMENT_INSTRUCTIONS);
            prompt
        }
        _ => GENERAL_PROMPT.to_string(),
    }
}

/// Prepend a freshly built system message to the caller's messages.
///
/// The caller's slice is copied, never reordered.
pub fn compose(messages: &[LlmMessage], document_text: Option<&str>) -> Vec<LlmMessage> {
    let mut composed = Vec::with_capacity(messages.len() + 1);
    composed.push(LlmMessage::system(system_prompt(document_text)));
    composed.extend_from_slice(messages);
    composed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MessageRole;

    #[test]
    fn general_template_without_document() {
        let prompt = system_prompt(None);
        assert!(prompt.starts_with("You are a helpful, knowledgeable"));
        assert!(!prompt.contains("PDF Document Content"));
    }

    #[test]
    fn empty_document_uses_general_template() {
        assert_eq!(PromptKind::for_document(Some("")), PromptKind::General);
        assert_eq!(system_prompt(Some("")), system_prompt(None));
    }

    #[test]
    fn document_template_embeds_text_once() {
        let prompt = system_prompt(Some("hello world"));
        assert!(prompt.contains("PDF Document Content:\nhello world\n\nInstructions:"));
        assert!(prompt.contains("general knowledge"));
        assert!(!prompt.contains("friendly AI assistant"));
        assert_eq!(prompt.matches("hello world").count(), 1);
    }

    #[test]
    fn compose_prepends_exactly_one_system_message() {
        let history = vec![
            LlmMessage::user("first"),
            LlmMessage::system("caller supplied"),
            LlmMessage::assistant("reply"),
        ];
        let composed = compose(&history, Some("doc"));

        assert_eq!(composed.len(), history.len() + 1);
        assert_eq!(composed[0].role, MessageRole::System);
        assert!(composed[0].content.contains("doc"));
        assert_eq!(&composed[1..], history.as_slice());
    }
}

pub const SYSTEM_INSTRUCTION: &str = concat!(
    "You are a NIST Cybersecurity Framework expert AI. ",
    "Always respond in plain conversational English. ",
    "Never use markdown, bullet points, numbered lists, or headings. ",
    "Do not structure answers like documentation. ",
    "Respond like a human security consultant speaking naturally. ",
    "Answer ONLY using the NIST Cybersecurity Framework. ",
    "If the answer is not found, say: ",
    "'This is not explicitly addressed in the NIST Cybersecurity Framework.'"
);

pub const REFUSAL_MESSAGE: &str =
    "I can only provide guidance based on the NIST Cybersecurity Framework.";

const REFERENCE_LABEL: &str = "NIST CSF REFERENCE:";
const QUESTION_LABEL: &str = "USER QUESTION:";

/// Composes the single prompt string sent to the language model.
///
/// The message is inserted verbatim. A blank `reference` is treated as absent.
pub fn build_prompt(message: &str, system_instruction: &str, reference: Option<&str>) -> String {
    match reference.filter(|text| !text.trim().is_empty()) {
        Some(reference) => format!(
            "\n{system_instruction}\n\n{REFERENCE_LABEL}\n{reference}\n\n{QUESTION_LABEL}\n{message}\n"
        ),
        None => format!("\n{system_instruction}\n\n{QUESTION_LABEL}\n{message}\n"),
    }
}

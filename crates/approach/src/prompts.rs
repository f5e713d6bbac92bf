//! Prompt templates and few-shot examples.
//!
//! Templates carry two placeholders: `{follow_up_questions_prompt}` and
//! `{injected_prompt}`. Use [`render_system_prompt`] to fill them.

use sourcewell_core::message::Message;

pub const FOLLOWUP_PLACEHOLDER: &str = "{follow_up_questions_prompt}";
pub const INJECTED_PLACEHOLDER: &str = "{injected_prompt}";

/// Prefix marking a prompt override that is injected instead of replacing.
pub const INJECT_PREFIX: &str = ">>>";

/// The user-turn prefix sent to the query rewriter.
pub const QUERY_REQUEST_PREFIX: &str = "Generate search query for: ";

/// What the query rewriter answers when it can't produce a query.
pub const NO_QUERY_SENTINEL: &str = "0";

/// Function name a model may use to return the search query.
pub const SEARCH_FUNCTION_NAME: &str = "search_sources";

pub const QUERY_PROMPT_TEMPLATE: &str = "\
Below is the conversation so far and a new question from the user. The question must be answered by searching a knowledge base of financial market analysis documents.
You can query a search index holding hundreds of documents.
Write a search query from the conversation and the new question.
Leave out cited file and document names such as info.txt or doc.pdf.
Leave out any text inside [] or <<>>.
Leave out special characters such as '+'.
If the question is not in English, translate it to English before writing the query.
If no search query can be written, return just the number 0.
";

/// Few-shot examples for the query rewriter, as user/assistant pairs.
pub fn query_few_shots() -> Vec<Message> {
    vec![
        Message::user("How did crypto do last year?"),
        Message::assistant("Summarize Cryptocurrency Market Dynamics from last year"),
        Message::user("how will S&P 500 do in the next few years?"),
        Message::assistant("Show me the S&P 500 forecast for the next few years"),
    ]
}

pub const CHAT_SYSTEM_TEMPLATE: &str = "\
You are an assistant helping people analyze an annual financial report. The documents contain text, charts, tables and images.
Each text source starts on a new line with the file name, a colon, and then the information.
Cite the source name for every fact you use, in the format [filename].
Answer the question using only the information in the sources below.
If a clarifying question to the user would help, ask it.
Keep answers short.
Return tabular information as an html table, not markdown.
If the sources below don't contain the answer, say you don't know. Return only the answer, without repeating the input.
{follow_up_questions_prompt}
{injected_prompt}
";

pub const CHAT_VISION_SYSTEM_TEMPLATE: &str = "\
You are an assistant helping people analyze an annual financial report. The documents contain text, charts, tables and images.
Each image source shows its file name in the top left corner at pixel (10,10), in the format SourceFileName:<file_name>.
Each text source starts on a new line with the file name, a colon, and then the information.
Cite the source name from the image or text for every fact you use, in the format [filename].
Answer the question using only the information in the sources below.
If a clarifying question to the user would help, ask it.
Keep answers short.
Return tabular information as an html table, not markdown.
An image and a text source may share a file name. Cite the file name as given, never the image title.
If the sources below don't contain the answer, say you don't know. Return only the answer, without repeating the input.
{follow_up_questions_prompt}
{injected_prompt}
";

pub const FOLLOWUP_QUESTIONS_PROMPT: &str = "\
Generate 3 very brief follow-up questions the user would likely ask next.
Put each follow-up question in double angle brackets. Example:
<<Are there exclusions for prescriptions?>>
<<Which pharmacies can be ordered from?>>
<<What is the limit for over-the-counter medication?>>
Don't repeat questions that were already asked.
Make sure the last question ends with \">>\".";

pub const ASK_SYSTEM_TEMPLATE: &str = "\
You are an assistant helping employees with questions about their healthcare plan and the employee handbook. \
Address the person asking as 'you' even if they ask with 'I'. \
Answer the question using only the information in the sources below. \
Return tabular information as an html table, not markdown. \
Each source has a name, a colon, and then the information; cite the source name for every fact you use. \
If the sources below don't contain the answer, say you don't know. Follow the example below.";

pub const ASK_VISION_SYSTEM_TEMPLATE: &str = "\
You are an assistant helping people analyze an annual financial report. The documents contain text, charts, tables and images. \
Answer the question using only the information in the sources below. \
Return tabular information as an html table, not markdown. \
Each text source has a name, a colon, and then the information; cite the source name for every fact you use as [filename]. \
Each image source shows its file name in the top left corner at pixel (10,10), in the format SourceFileName:<file_name>; cite it as [file_name] when you use an image. \
An image and a text source may share a file name. Cite the file name as given, never the image title. \
If the sources below don't contain the answer, say you don't know. Return only the answer, without repeating the input.";

pub const ASK_EXAMPLE_QUESTION: &str = "
'What is the deductible for the employee plan for a visit to Overlake in Bellevue?'

Sources:
info1.txt: deductibles depend on whether you are in-network or out-of-network. In-network deductibles are $500 for employee and $1000 for family. Out-of-network deductibles are $1000 for employee and $2000 for family.
info2.pdf: Overlake is in-network for the employee plan.
info3.pdf: Overlake is the name of the area that includes a park and ride near Bellevue.
info4.pdf: In-network institutions include Overlake, Swedish and others in the region
";

pub const ASK_EXAMPLE_ANSWER: &str = "In-network deductibles are $500 for employee and $1000 for family [info1.txt] and Overlake is in-network for the employee plan [info2.pdf][info4.pdf].";

/// Resolve the system prompt for a request.
///
/// * no override: `default_template` with the follow-up prompt filled in
/// * `>>>text`: `text` plus a newline injected into `default_template`
/// * anything else: the override replaces the template; only the follow-up
///   placeholder is filled
pub fn render_system_prompt(
    default_template: &str,
    prompt_override: Option<&str>,
    followup_prompt: &str,
) -> String {
    match prompt_override {
        None => default_template
            .replace(FOLLOWUP_PLACEHOLDER, followup_prompt)
            .replace(INJECTED_PLACEHOLDER, ""),
        Some(o) => match o.strip_prefix(INJECT_PREFIX) {
            Some(injected) => default_template
                .replace(FOLLOWUP_PLACEHOLDER, followup_prompt)
                .replace(INJECTED_PLACEHOLDER, &format!("{injected}\n")),
            None => o.replace(FOLLOWUP_PLACEHOLDER, followup_prompt),
        },
    }
}

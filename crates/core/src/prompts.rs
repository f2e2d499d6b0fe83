//! Prompt builders for the two text-model calls made per job.

use crate::content::{Script, QUIZ_OPTION_COUNT, QUIZ_QUESTION_COUNT};
use crate::style::instruction_for;

/// Inputs for the script prompt, borrowed from the generation record.
#[derive(Debug, Clone, Copy)]
pub struct ScriptPromptInput<'a> {
    pub topic: &'a str,
    pub details: &'a str,
    pub duration_minutes: i32,
    pub language: &'a str,
    pub style: &'a str,
}

/// Prompt asking for `{ "title", "bullets" }` narration for one lesson.
pub fn script_prompt(input: ScriptPromptInput<'_>) -> String {
    let style = instruction_for(input.style);
    format!(
        "Create an educational script as concise bullet points.\n\
         \n\
         Return STRICT JSON in this format:\n\
         \n\
         {{\n  \"title\": \"\",\n  \"bullets\": [\n    \"Step 1: ...\",\n    \"Step 2: ...\",\n    \"Step 3: ...\"\n  ]\n}}\n\
         \n\
         Topic: {topic}\n\
         Details: {details}\n\
         Duration: {duration} minutes\n\
         Language: {language}\n\
         Teaching Style: {style}\n\
         \n\
         Rules:\n\
         - Use bullet points that explain each step clearly\n\
         - Keep each bullet short (1-2 sentences)\n\
         - Use simple language\n\
         - Do not return anything except JSON\n",
        topic = input.topic,
        details = input.details,
        duration = input.duration_minutes,
        language = input.language,
    )
}

/// Prompt asking for a multiple-choice quiz covering `script`.
pub fn quiz_prompt(script: &Script) -> String {
    // Serializing a Vec<String> cannot fail.
    let bullets = serde_json::to_string_pretty(&script.bullets).unwrap_or_default();
    format!(
        "Based on this educational video script, create a quiz to test understanding:\n\
         \n\
         Script Title: {title}\n\
         Script Content: {bullets}\n\
         \n\
         Create a quiz with {questions} multiple choice questions, each with exactly {options} options. \
         Return STRICT JSON in this format:\n\
         \n\
         {{\n  \"questions\": [\n    {{\n      \"question\": \"Question text\",\n      \"options\": [\"Option A\", \"Option B\", \"Option C\", \"Option D\"],\n      \"correctAnswer\": 0,\n      \"explanation\": \"Why this answer is correct\"\n    }}\n  ]\n}}\n\
         \n\
         Rules:\n\
         - Questions should test key concepts from the script\n\
         - Include explanations for each answer\n\
         - Make questions appropriate for the topic difficulty\n\
         - Do not return anything except JSON\n",
        title = script.title,
        questions = QUIZ_QUESTION_COUNT,
        options = QUIZ_OPTION_COUNT,
    )
}

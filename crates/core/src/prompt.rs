use crate::models::Language;
use crate::retrieval::RetrievedContext;

/// A task containing this marker is treated as an already templated prompt.
pub const INSTRUCTION_MARKER: &str = "[INST]";

/// Replaced with the retrieved context inside an already templated prompt.
pub const CONTEXT_PLACEHOLDER: &str = "{similaritySearchResult}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Answer,
    Vocabulary,
    Steps {
        with_description: bool,
        with_clips: bool,
    },
}

/// Pure function from `(context, task)` to model input.
pub type Template = fn(&str, &str) -> String;

pub fn template(language: Language, kind: PromptKind) -> Template {
    match (language, kind) {
        (Language::English, PromptKind::Answer) => answer_en,
        (Language::Polish, PromptKind::Answer) => answer_pl,
        (Language::English, PromptKind::Vocabulary) => vocabulary_en,
        (Language::Polish, PromptKind::Vocabulary) => vocabulary_pl,
        (language, PromptKind::Steps { with_description, with_clips }) => {
            match (language, with_description, with_clips) {
                (Language::English, false, false) => steps_en,
                (Language::English, true, false) => steps_described_en,
                (Language::English, false, true) => steps_clips_en,
                (Language::English, true, true) => steps_described_clips_en,
                (Language::Polish, false, false) => steps_pl,
                (Language::Polish, true, false) => steps_described_pl,
                (Language::Polish, false, true) => steps_clips_pl,
                (Language::Polish, true, true) => steps_described_clips_pl,
            }
        }
    }
}

/// Builds the final model input for `task`.
///
/// A task that already carries [`INSTRUCTION_MARKER`] keeps its own wording: the
/// placeholder is substituted and the context is appended once more at the end.
pub fn compose(task: &str, context: &RetrievedContext, language: Language, kind: PromptKind) -> String {
    let context = context.as_prompt_text();

    if task.contains(INSTRUCTION_MARKER) {
        let substituted = task.replacen(
            CONTEXT_PLACEHOLDER,
            &format!("EXTRA INFORMATION: {context}"),
            1,
        );
        return format!("{substituted} EXTRA INFO: {context}");
    }

    template(language, kind)(&context, task)
}

fn answer_en(context: &str, task: &str) -> String {
    format!(
        "<s>[INST]use this extra information to answer user's question[/INST] EXTRA INFORMATION: {context}</s>QUESTION: {task}[INST]answer in English[/INST]"
    )
}

fn answer_pl(context: &str, task: &str) -> String {
    format!(
        "[INST]użyj tych dodatkowych informacji, udziel krótkiej odpowiedzi na następujące pytanie {context}[/INST]{task}?[INST]odpowiedz po polsku[/INST]"
    )
}

fn vocabulary_en(context: &str, task: &str) -> String {
    format!(
        "<s>[INST]You are AI assistant, your name is Taqi. Answer questions. Use this helpful information to answer questions. Finish your answer with <end> tag.[/INST] {context}</s>[INST]{task}[/INST]"
    )
}

fn vocabulary_pl(context: &str, task: &str) -> String {
    format!(
        "<s>[INST]Jesteś asystentem AI, nazywasz się Taqi. Odpowiadaj na pytania. Użyj tych pomocnych informacji, aby odpowiadać na pytania. Zakończ odpowiedź znacznikiem <end>.[/INST] {context}</s>[INST]{task}[/INST][INST]odpowiedz po polsku[/INST]"
    )
}

fn steps_en(_context: &str, task: &str) -> String {
    format!("[INST]generate manual: list the steps shown in these subtitles[/INST]{task}")
}

fn steps_described_en(_context: &str, task: &str) -> String {
    format!(
        "[INST]generate manual: list the steps shown in these subtitles and describe each step in detail[/INST]{task}"
    )
}

fn steps_clips_en(_context: &str, task: &str) -> String {
    format!(
        "[INST]generate manual: list the steps shown in these subtitles with the start time in seconds of the subtitle where each step begins[/INST]{task}"
    )
}

fn steps_described_clips_en(_context: &str, task: &str) -> String {
    format!(
        "[INST]generate manual: list the steps shown in these subtitles, describe each step in detail and give the start time in seconds of the subtitle where each step begins[/INST]{task}"
    )
}

fn steps_pl(_context: &str, task: &str) -> String {
    format!("[INST]wygeneruj instrukcję: wypisz kroki pokazane w tych napisach, po polsku[/INST]{task}")
}

fn steps_described_pl(_context: &str, task: &str) -> String {
    format!(
        "[INST]wygeneruj instrukcję: wypisz kroki pokazane w tych napisach i opisz szczegółowo każdy krok, po polsku[/INST]{task}"
    )
}

fn steps_clips_pl(_context: &str, task: &str) -> String {
    format!(
        "[INST]wygeneruj instrukcję: wypisz kroki pokazane w tych napisach wraz z czasem rozpoczęcia każdego kroku w sekundach, po polsku[/INST]{task}"
    )
}

fn steps_described_clips_pl(_context: &str, task: &str) -> String {
    format!(
        "[INST]wygeneruj instrukcję: wypisz kroki pokazane w tych napisach, opisz szczegółowo każdy krok i podaj czas jego rozpoczęcia w sekundach, po polsku[/INST]{task}"
    )
}

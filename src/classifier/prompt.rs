use super::ChatMessage;

const CLASSIFICATION_INSTRUCTIONS: &str = "\
Your task: assign a CEFR level (A1, A2, B1, B2, C1, C2) to the Spanish sentence. \
Classify at the highest level indicated by the grammar or vocabulary present.\n\
A1: present indicative only, basic vocabulary, connectors y / o.\n\
A2: modal periphrasis (tener que, poder, querer + infinitive), idiomatic tener, \
preference verbs, causal porque, preterite with a time marker.\n\
B1: past and future narration, present subjunctive, pluperfect indicative, \
experiential present perfect.\n\
B2: imperfect or pluperfect subjunctive, type 2/3 conditionals, future perfect, \
concessive connectors with subjunctive.\n\
C1: pretérito anterior, future subjunctive, fixed formal expressions, rare formal vocabulary.\n\
C2: abstract, academic or philosophical register.\n\
Respond ONLY with a JSON object of the form \
{\"cefr_level\": \"A1|A2|B1|B2|C1|C2\", \"reasoning\": \"one or two sentences\", \
\"grammar\": [\"Present Indicative\", \"...\"]}. \
The cefr_level MUST be exactly one of A1, A2, B1, B2, C1, C2.";

const TRANSLATION_INSTRUCTIONS: &str = "Translate the following English sentence into natural, \
fluent Spanish. Output only the Spanish sentence.";

/// Few-shot anchors as (sentence, assistant answer) pairs.
const EXEMPLARS: &[(&str, &str)] = &[
    (
        "Tengo un gato.",
        r#"{"cefr_level": "A1", "reasoning": "Present indicative of tener for possession.", "grammar": ["Present Indicative"]}"#,
    ),
    (
        "Leo un libro y bebo té.",
        r#"{"cefr_level": "A1", "reasoning": "Two present-tense actions joined only by y.", "grammar": ["Present Indicative", "Connector y"]}"#,
    ),
    (
        "Tengo que estudiar para el examen.",
        r#"{"cefr_level": "A2", "reasoning": "Obligation with tener que + infinitive.", "grammar": ["Tener que + Infinitive"]}"#,
    ),
    (
        "Voy al supermercado porque necesito leche.",
        r#"{"cefr_level": "A2", "reasoning": "Causal connector porque with present indicative.", "grammar": ["Present Indicative", "Causal Connector porque"]}"#,
    ),
    (
        "He estado en España tres veces.",
        r#"{"cefr_level": "B1", "reasoning": "Experiential present perfect with a frequency expression.", "grammar": ["Present Perfect Indicative", "Frequency Expression"]}"#,
    ),
    (
        "Quiero que vengas a mi fiesta.",
        r#"{"cefr_level": "B1", "reasoning": "Volition verb triggering the present subjunctive.", "grammar": ["Present Subjunctive", "Volition Clause"]}"#,
    ),
    (
        "Si hubiera tenido más tiempo, habría viajado a Italia.",
        r#"{"cefr_level": "B2", "reasoning": "Type 3 conditional with pluperfect subjunctive and conditional perfect.", "grammar": ["Pluperfect Subjunctive", "Conditional Perfect"]}"#,
    ),
    (
        "Sea como fuere, habida cuenta de los datos, la propuesta no prosperó.",
        r#"{"cefr_level": "C1", "reasoning": "Fixed formal expressions sea como fuere and habida cuenta de.", "grammar": ["Fixed Formal Expression"]}"#,
    ),
    (
        "La epistemología cuestiona los fundamentos del conocimiento humano.",
        r#"{"cefr_level": "C2", "reasoning": "Abstract academic register despite the simple present.", "grammar": ["Present Indicative", "Academic Vocabulary"]}"#,
    ),
];

pub fn build_classification_messages(text: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(EXEMPLARS.len() * 2 + 2);
    messages.push(ChatMessage::system(CLASSIFICATION_INSTRUCTIONS));
    for (sentence, answer) in EXEMPLARS {
        messages.push(ChatMessage::user(sentence));
        messages.push(ChatMessage::assistant(answer));
    }
    messages.push(ChatMessage::user(text));
    messages
}

pub fn build_translation_messages(text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(TRANSLATION_INSTRUCTIONS),
        ChatMessage::user(text),
    ]
}

#[cfg(test)]
mod tests {
    use super::{EXEMPLARS, build_classification_messages};
    use crate::classifier::parse_label_response;

    #[test]
    fn classification_messages_end_with_target_text() {
        let messages = build_classification_messages("Ayer fui al cine.");
        assert_eq!(messages.len(), EXEMPLARS.len() * 2 + 2);
        assert_eq!(messages[0].role, "system");
        let last = messages.last().expect("target message");
        assert_eq!(last.role, "user");
        assert_eq!(last.content, "Ayer fui al cine.");
    }

    #[test]
    fn exemplar_answers_satisfy_response_schema() {
        for (_, answer) in EXEMPLARS {
            let parsed = parse_label_response(answer).expect("exemplar should parse");
            assert!(parsed.into_validated().label.rank().is_some());
        }
    }
}

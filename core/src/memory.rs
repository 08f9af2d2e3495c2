//! Conversion between the external conversation memory and protocol messages.
//!
//! Memories that only store text receive each exchange flattened as
//!
//! ```text
//! [Used tools: Tool: <name>, Input: <args>, Result: <result>; ...] <answer>
//! ```
//!
//! and the annotation is expanded back into function-call / function-result
//! pairs when the history is rebuilt.

use crate::traits::{ConversationMemory, MemoryRecord};
use crate::types::{FunctionCall, Message};
use serde_json::Value;
use tracing::{debug, warn};

const TOOLS_PREFIX: &str = "[Used tools: ";
const RECORD_PREFIX: &str = "Tool: ";
const INPUT_SEPARATOR: &str = ", Input: ";
const RESULT_SEPARATOR: &str = ", Result: ";
const RECORD_SEPARATOR: &str = "; ";

/// One tool invocation as recorded in flattened memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallRecord {
    pub name: String,
    pub arguments: String,
    pub result: String,
}

/// Rebuild the message history from memory.
///
/// The optional system message always comes first. A memory that fails to
/// load yields an empty history.
pub async fn build_history(
    memory: Option<&dyn ConversationMemory>,
    system_message: Option<&str>,
) -> Vec<Message> {
    let mut messages = Vec::new();

    if let Some(system) = system_message.filter(|s| !s.is_empty()) {
        messages.push(Message::system(system));
    }

    let Some(memory) = memory else {
        return messages;
    };

    let records = match memory.load_memory_variables().await {
        Ok(records) => records,
        Err(e) => {
            warn!("Error loading chat history from memory: {}", e);
            return messages;
        }
    };

    for record in records {
        match record {
            MemoryRecord::Human(content) => messages.push(Message::user(content)),
            MemoryRecord::Ai(content) => match expand_annotation(&content) {
                Some(expanded) => messages.extend(expanded),
                None => messages.push(Message::assistant(content)),
            },
            MemoryRecord::Messages(stored) => messages.extend(stored),
        }
    }

    debug!("Rebuilt {} history messages from memory", messages.len());
    messages
}

/// Write one finished exchange back to memory.
///
/// `exchange` holds the turns produced after the user message. Failures
/// are logged and swallowed.
pub async fn persist(memory: Option<&dyn ConversationMemory>, user_input: &str, exchange: &[Message]) {
    let Some(memory) = memory else {
        return;
    };
    if user_input.is_empty() {
        return;
    }

    let outcome = if memory.supports_structured() {
        let mut messages = Vec::with_capacity(exchange.len() + 1);
        messages.push(Message::user(user_input));
        messages.extend_from_slice(exchange);
        memory.save_messages(&messages).await
    } else {
        let output = flatten_exchange(exchange);
        if output.is_empty() {
            return;
        }
        memory.save_context(user_input, &output).await
    };

    if let Err(e) = outcome {
        warn!("Error saving conversation to memory: {}", e);
    }
}

/// Pair each function-call directive with the next result of the same name
pub fn collect_tool_calls(exchange: &[Message]) -> Vec<ToolCallRecord> {
    let mut records = Vec::new();

    for (index, message) in exchange.iter().enumerate() {
        let Some(call) = message.as_function_call() else {
            continue;
        };

        let result = exchange[index + 1..].iter().find_map(|later| match later {
            Message::Function { name, content } if *name == call.name => Some(content.clone()),
            _ => None,
        });

        if let Some(result) = result {
            records.push(ToolCallRecord {
                name: call.name.clone(),
                arguments: call.arguments_text(),
                result,
            });
        }
    }

    records
}

/// Last non-empty assistant content of the exchange
pub fn final_answer(exchange: &[Message]) -> String {
    exchange
        .iter()
        .rev()
        .find_map(|message| match message {
            Message::Assistant {
                content: Some(content),
                ..
            } if !content.is_empty() => Some(content.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

/// Flatten an exchange into the text stored by text-only memories
pub fn flatten_exchange(exchange: &[Message]) -> String {
    let answer = final_answer(exchange);
    let calls = collect_tool_calls(exchange);

    if calls.is_empty() {
        return answer;
    }

    let rendered: Vec<String> = calls
        .iter()
        .map(|call| {
            format!(
                "{}{}{}{}{}{}",
                RECORD_PREFIX, call.name, INPUT_SEPARATOR, call.arguments, RESULT_SEPARATOR, call.result
            )
        })
        .collect();

    format!("{}{}] {}", TOOLS_PREFIX, rendered.join(RECORD_SEPARATOR), answer)
}

/// Expand a flattened assistant turn into protocol messages.
///
/// Returns `None` when the text carries no well-formed annotation.
pub fn expand_annotation(text: &str) -> Option<Vec<Message>> {
    let mut rest = text.strip_prefix(TOOLS_PREFIX)?;
    let mut messages = Vec::new();

    loop {
        rest = rest.strip_prefix(RECORD_PREFIX)?;

        let name_end = rest.find(INPUT_SEPARATOR)?;
        let name = rest[..name_end].trim();
        if name.is_empty() || name.contains(',') {
            return None;
        }
        rest = &rest[name_end + INPUT_SEPARATOR.len()..];

        let (input, after_input) = take_payload(rest, |after| after.starts_with(RESULT_SEPARATOR))
            .or_else(|| rest.find(RESULT_SEPARATOR).map(|end| (&rest[..end], &rest[end..])))?;
        rest = &after_input[RESULT_SEPARATOR.len()..];

        let (result, after_result) =
            take_payload(rest, ends_result).or_else(|| scan_result(rest))?;

        let arguments = serde_json::from_str::<Value>(input.trim())
            .unwrap_or_else(|_| Value::String(input.trim().to_string()));
        messages.push(Message::function_call(FunctionCall::new(name, arguments)));
        messages.push(Message::function_result(name, result.trim()));

        if let Some(next) = after_result.strip_prefix(RECORD_SEPARATOR) {
            rest = next;
            continue;
        }

        let answer = after_result.strip_prefix(']')?;
        let answer = answer.strip_prefix(' ').unwrap_or(answer);
        if !answer.is_empty() {
            messages.push(Message::assistant(answer));
        }
        return Some(messages);
    }
}

/// Consume one JSON value from the start of `text` if it is followed by a
/// valid terminator.
fn take_payload(text: &str, terminated: impl Fn(&str) -> bool) -> Option<(&str, &str)> {
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<Value>();
    match stream.next() {
        Some(Ok(_)) => {
            let end = stream.byte_offset();
            let after = &text[end..];
            terminated(after).then(|| (&text[..end], after))
        }
        _ => None,
    }
}

fn ends_result(after: &str) -> bool {
    after.starts_with("; Tool: ") || after.starts_with("] ") || after == "]"
}

/// Delimiter fallback for results that are not JSON
fn scan_result(text: &str) -> Option<(&str, &str)> {
    let next_record = text.find("; Tool: ");
    let block_end = text
        .find("] ")
        .or_else(|| text.ends_with(']').then(|| text.len() - 1));

    let end = match (next_record, block_end) {
        (Some(a), Some(b)) => a.min(b),
        (a, b) => a.or(b)?,
    };
    Some((&text[..end], &text[end..]))
}

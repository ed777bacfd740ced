//! Request loop for `refrain serve`.
//!
//! Reads one request per line until EOF, answers each with exactly one
//! response line. Bad input never ends the loop: parse failures, unknown
//! operations, and oversized lines all produce an error response.

use std::io::{self, BufRead, Write};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{RefrainError, Result};
use crate::server::protocol::{Request, Response};
use crate::service::{render_items, AddItemRequest, ContextService};

/// Maximum size of a single request line (1 MiB).
pub const MAX_LINE_SIZE: usize = 1_048_576;

#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    Line(String),
    TooLarge,
    Eof,
}

/// Read one line without buffering more than `max` bytes of it.
///
/// An oversized line is drained up to its newline so the next read starts
/// on a fresh request.
fn read_bounded_line<R: BufRead>(reader: &mut R, max: usize) -> io::Result<LineRead> {
    let mut buf: Vec<u8> = Vec::new();
    let mut too_large = false;
    let mut read_any = false;

    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            break;
        }
        read_any = true;

        let newline = available.iter().position(|&b| b == b'\n');
        let end = newline.map(|p| p + 1).unwrap_or(available.len());
        if !too_large {
            if buf.len() + end > max {
                too_large = true;
                buf.clear();
            } else {
                buf.extend_from_slice(&available[..end]);
            }
        }
        reader.consume(end);

        if newline.is_some() {
            break;
        }
    }

    if too_large {
        Ok(LineRead::TooLarge)
    } else if !read_any {
        Ok(LineRead::Eof)
    } else {
        Ok(LineRead::Line(String::from_utf8_lossy(&buf).into_owned()))
    }
}

fn write_response<W: Write>(writer: &mut W, response: &Response) -> io::Result<()> {
    writeln!(writer, "{}", response.to_line())?;
    writer.flush()
}

/// Serve requests from `reader` until EOF. Returns the number of requests
/// answered.
pub fn serve<R: BufRead, W: Write>(
    service: &ContextService,
    mut reader: R,
    mut writer: W,
) -> Result<usize> {
    let mut handled = 0;

    loop {
        let line = match read_bounded_line(&mut reader, MAX_LINE_SIZE)? {
            LineRead::Eof => break,
            LineRead::TooLarge => {
                tracing::warn!(max = MAX_LINE_SIZE, "rejected oversized request");
                let response = Response::error(
                    Value::Null,
                    format!("request too large (max {} bytes)", MAX_LINE_SIZE),
                );
                if write_response(&mut writer, &response).is_err() {
                    break;
                }
                handled += 1;
                continue;
            }
            LineRead::Line(line) => line,
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(line) {
            Ok(request) => {
                tracing::debug!(op = %request.op, "request");
                match dispatch(service, &request.op, request.params) {
                    Ok(result) => Response::success(request.id, result),
                    Err(e) => {
                        if e.is_fail_open() {
                            tracing::warn!(op = %request.op, error = %e, "request failed");
                        } else {
                            tracing::debug!(op = %request.op, error = %e, "request rejected");
                        }
                        Response::error(request.id, e.to_string())
                    }
                }
            }
            Err(e) => Response::error(Value::Null, format!("parse error: {}", e)),
        };

        if write_response(&mut writer, &response).is_err() {
            // Client went away
            break;
        }
        handled += 1;
    }

    tracing::info!(requests = handled, "input closed");
    Ok(handled)
}

#[derive(Debug, Deserialize)]
struct IdParams {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TextParams {
    text: String,
}

#[derive(Debug, Deserialize)]
struct UriParams {
    uri: String,
}

fn params<T: DeserializeOwned>(op: &str, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| RefrainError::protocol(format!("invalid params for {}: {}", op, e)))
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(RefrainError::from)
}

/// Run one operation against the service.
pub fn dispatch(service: &ContextService, op: &str, raw: Value) -> Result<Value> {
    // Pick up state saved by hook processes since the previous request
    service.reload();

    match op {
        "add_item" => {
            let request: AddItemRequest = params(op, raw)?;
            let message = service.add_item(request)?;
            Ok(json!({ "message": message }))
        }
        "remove_item" => {
            let IdParams { id } = params(op, raw)?;
            let existed = service.get_item(&id).is_some();
            let message = service.remove_item(&id);
            Ok(json!({ "removed": existed, "message": message }))
        }
        "track_tokens" => {
            let TextParams { text } = params(op, raw)?;
            let tokens = service.track_tokens(&text);
            Ok(json!({
                "tokens": tokens,
                "total": service.summary().token_count,
                "message": format!("Tracked {} tokens", tokens),
            }))
        }
        "summary" => to_value(&service.summary()),
        "force_refresh" => {
            let outcome = service.force_refresh();
            Ok(json!({ "updated": outcome.is_updated(), "message": outcome.message() }))
        }
        "active_context" => {
            let due = service.due_items();
            Ok(json!({
                "count": due.len(),
                "ids": due.iter().map(|item| item.id()).collect::<Vec<_>>(),
                "text": render_items(&due),
            }))
        }
        "list_resources" => to_value(&service.list_resources()),
        "read_resource" => {
            let UriParams { uri } = params(op, raw)?;
            to_value(&service.read_resource(&uri))
        }
        "get_item" => {
            let IdParams { id } = params(op, raw)?;
            match service.get_item(&id) {
                Some(item) => to_value(&item),
                None => Err(RefrainError::protocol(format!("context not found: {}", id))),
            }
        }
        other => Err(RefrainError::protocol(format!("unknown op: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::git::tests::FakeGit;
    use crate::git::GitStatusProvider;
    use crate::storage::{MemoryStateStore, StateStore};
    use crate::tokens::HeuristicCounter;
    use std::io::Cursor;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn service(dir: &TempDir, state: Arc<MemoryStateStore>) -> ContextService {
        ContextService::with_parts(
            dir.path(),
            Config::default(),
            Arc::new(HeuristicCounter),
            Some(Arc::new(FakeGit::on_branch("main")) as Arc<dyn GitStatusProvider>),
            Some(state as Arc<dyn StateStore>),
        )
    }

    fn run(service: &ContextService, input: &str) -> Vec<Response> {
        let mut out = Vec::new();
        serve(service, Cursor::new(input.as_bytes().to_vec()), &mut out).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_read_bounded_line() {
        let mut reader = Cursor::new(b"one\ntwo".to_vec());
        assert_eq!(
            read_bounded_line(&mut reader, 100).unwrap(),
            LineRead::Line("one\n".to_string())
        );
        assert_eq!(
            read_bounded_line(&mut reader, 100).unwrap(),
            LineRead::Line("two".to_string())
        );
        assert_eq!(read_bounded_line(&mut reader, 100).unwrap(), LineRead::Eof);
    }

    #[test]
    fn test_read_bounded_line_drains_oversized() {
        let input = format!("{}\nnext\n", "x".repeat(50));
        let mut reader = io::BufReader::with_capacity(8, Cursor::new(input.into_bytes()));
        assert_eq!(read_bounded_line(&mut reader, 10).unwrap(), LineRead::TooLarge);
        assert_eq!(
            read_bounded_line(&mut reader, 10).unwrap(),
            LineRead::Line("next\n".to_string())
        );
    }

    #[test]
    fn test_session_flow() {
        let dir = TempDir::new().unwrap();
        let state = Arc::new(MemoryStateStore::new());
        let service = service(&dir, state.clone());

        let input = [
            r#"{"id":1,"op":"add_item","params":{"id":"a","content":"alpha","priority":9,"category":"state","repeat_after_tokens":100}}"#,
            r#"{"id":2,"op":"add_item","params":{"id":"b","content":"beta","priority":3,"category":"state","repeat_after_tokens":50}}"#,
            r#"{"id":3,"op":"track_tokens","params":{"text":"this text is exactly sixty characters long, more or less ok"}}"#,
            r#"{"id":4,"op":"active_context"}"#,
            r#"{"id":5,"op":"active_context"}"#,
            r#"{"id":6,"op":"summary"}"#,
        ]
        .join("\n");

        let responses = run(&service, &input);
        assert_eq!(responses.len(), 6);
        assert!(responses.iter().all(|r| r.ok), "{:?}", responses);

        assert_eq!(
            responses[0].result.as_ref().unwrap()["message"],
            "Added context: a"
        );
        let tracked = responses[2].result.as_ref().unwrap();
        assert_eq!(tracked["tokens"], 15);
        assert_eq!(tracked["message"], "Tracked 15 tokens");

        // 15 tokens: only the forced item is due
        assert_eq!(responses[3].result.as_ref().unwrap()["ids"], json!(["a"]));

        let summary = responses[5].result.as_ref().unwrap();
        assert_eq!(summary["total_items"], 2);
        assert_eq!(summary["token_count"], 15);
        assert_eq!(summary["by_category"]["state"], 2);
        assert_eq!(summary["forecast"][0]["id"], "b");
        assert_eq!(summary["forecast"][0]["tokens_until_due"], 35);

        assert_eq!(state.load().unwrap().unwrap().token_count, 15);
    }

    #[test]
    fn test_errors_do_not_stop_loop() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, Arc::new(MemoryStateStore::new()));

        let input = [
            "not json",
            r#"{"id":"u","op":"explode"}"#,
            r#"{"id":"p","op":"add_item","params":{"id":"x","content":"c","priority":11,"category":"state"}}"#,
            r#"{"id":"m","op":"remove_item","params":{}}"#,
            r#"{"id":"g","op":"get_item","params":{"id":"missing"}}"#,
            "",
            r#"{"id":"ok","op":"summary"}"#,
        ]
        .join("\n");

        let responses = run(&service, &input);
        assert_eq!(responses.len(), 6);

        assert!(!responses[0].ok);
        assert!(responses[0].error.as_ref().unwrap().starts_with("parse error"));
        assert_eq!(responses[1].id, json!("u"));
        assert_eq!(responses[1].error.as_deref(), Some("protocol error: unknown op: explode"));
        assert!(responses[2].error.as_ref().unwrap().contains("invalid context item"));
        assert!(responses[3].error.as_ref().unwrap().contains("invalid params for remove_item"));
        assert!(responses[4].error.as_ref().unwrap().contains("context not found"));
        assert!(responses[5].ok);
        assert_eq!(service.summary().total_items, 0);
    }

    #[test]
    fn test_oversized_line_rejected() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, Arc::new(MemoryStateStore::new()));

        let input = format!(
            "{}\n{}\n",
            "x".repeat(MAX_LINE_SIZE + 10),
            r#"{"id":2,"op":"summary"}"#
        );
        let responses = run(&service, &input);
        assert_eq!(responses.len(), 2);
        assert!(!responses[0].ok);
        assert!(responses[0].error.as_ref().unwrap().contains("too large"));
        assert!(responses[1].ok);
    }

    #[test]
    fn test_resources_and_items() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, Arc::new(MemoryStateStore::new()));

        let input = [
            r#"{"id":1,"op":"add_item","params":{"id":"notes","content":"read me","category":"documentation"}}"#,
            r#"{"id":2,"op":"list_resources"}"#,
            r#"{"id":3,"op":"read_resource","params":{"uri":"context://notes"}}"#,
            r#"{"id":4,"op":"get_item","params":{"id":"notes"}}"#,
            r#"{"id":5,"op":"force_refresh"}"#,
            r#"{"id":6,"op":"remove_item","params":{"id":"notes"}}"#,
            r#"{"id":7,"op":"remove_item","params":{"id":"notes"}}"#,
        ]
        .join("\n");

        let responses = run(&service, &input);
        assert!(responses.iter().all(|r| r.ok), "{:?}", responses);

        let resources = responses[1].result.as_ref().unwrap().as_array().unwrap();
        assert_eq!(resources.len(), 3);
        assert_eq!(resources[1]["uri"], "context://notes");
        assert_eq!(resources[1]["name"], "Notes");

        assert_eq!(responses[2].result.as_ref().unwrap()["text"], "read me");

        let item = responses[3].result.as_ref().unwrap();
        assert_eq!(item["priority"], 5);
        assert_eq!(item["repeat_after_tokens"], 5000);
        assert_eq!(item["category"], "documentation");

        assert_eq!(responses[4].result.as_ref().unwrap()["updated"], true);

        assert_eq!(responses[5].result.as_ref().unwrap()["removed"], true);
        assert_eq!(
            responses[6].result.as_ref().unwrap()["message"],
            "Failed to remove context: notes"
        );
    }
}

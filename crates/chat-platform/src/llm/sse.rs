//! Incremental server-sent-events framing.
//!
//! Network chunks can split an SSE event anywhere, so the parser buffers
//! until it sees the `\n\n` event boundary and hands back the `data:`
//! payloads of each complete event.

/// Stateful SSE framer fed raw chunk text.
#[derive(Default)]
pub struct SseParser {
    buffer: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the `data:` payloads of every event that is
    /// now complete, in order.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);
        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let event: String = self.buffer.drain(..pos + 2).collect();
            collect_data_lines(&event, &mut payloads);
        }
        payloads
    }

    /// Drain whatever is left after the stream ends. Handles a final event
    /// that lacks its trailing `\n\n`, e.g. after a network interruption.
    pub fn finish(mut self) -> Vec<String> {
        let mut payloads = Vec::new();
        let remaining = std::mem::take(&mut self.buffer);
        if !remaining.trim().is_empty() {
            collect_data_lines(&remaining, &mut payloads);
        }
        payloads
    }
}

fn collect_data_lines(event: &str, out: &mut Vec<String>) {
    for line in event.lines() {
        if let Some(data) = line.strip_prefix("data:") {
            // A single space after the colon is part of the framing, not
            // the payload; it is also optional.
            let data = data.strip_prefix(' ').unwrap_or(data);
            if !data.trim().is_empty() {
                out.push(data.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_complete_event() {
        let mut parser = SseParser::new();
        let payloads = parser.push("data: {\"a\":1}\n\n");
        assert_eq!(payloads, vec!["{\"a\":1}"]);
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.push("data: {\"delta\":").is_empty());
        assert!(parser.push("\"hel").is_empty());
        let payloads = parser.push("lo\"}\n\ndata: ");
        assert_eq!(payloads, vec!["{\"delta\":\"hello\"}"]);
        let payloads = parser.push("[DONE]\n\n");
        assert_eq!(payloads, vec!["[DONE]"]);
    }

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut parser = SseParser::new();
        let payloads = parser.push("data: one\n\ndata: two\n\ndata: three\n\n");
        assert_eq!(payloads, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_data_prefix_without_space() {
        let mut parser = SseParser::new();
        let payloads = parser.push("data:one\n\ndata: two\n\n");
        assert_eq!(payloads, vec!["one", "two"]);
    }

    #[test]
    fn test_non_data_lines_ignored() {
        let mut parser = SseParser::new();
        let payloads = parser.push(": keep-alive\nevent: message\ndata: payload\n\n");
        assert_eq!(payloads, vec!["payload"]);
    }

    #[test]
    fn test_finish_flushes_unterminated_event() {
        let mut parser = SseParser::new();
        assert!(parser.push("data: truncated").is_empty());
        assert_eq!(parser.finish(), vec!["truncated"]);
    }

    #[test]
    fn test_finish_empty_buffer() {
        let parser = SseParser::new();
        assert!(parser.finish().is_empty());
    }
}

/// Deserialization tests for `GenerateContentResponse` using representative
/// payloads returned by the generateContent endpoint.
#[cfg(test)]
mod unit {
    use crate::types::GenerateContentResponse;

    fn parse(json: &str) -> GenerateContentResponse {
        serde_json::from_str(json).expect("failed to parse response")
    }

    #[test]
    fn parse_single_text_part() {
        let resp = parse(
            r#"{
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "{\"narrative\":\"hi\"}"}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 5, "totalTokenCount": 17}
            }"#,
        );
        assert_eq!(resp.text().as_deref(), Some(r#"{"narrative":"hi"}"#));
        let usage = resp.usage_metadata.unwrap();
        assert_eq!(usage.total_token_count, 17);
    }

    #[test]
    fn parse_trims_surrounding_whitespace() {
        let resp = parse(r#"{"candidates":[{"content":{"parts":[{"text":"\n  ok \n"}]}}]}"#);
        assert_eq!(resp.text().as_deref(), Some("ok"));
    }

    #[test]
    fn non_text_parts_are_skipped() {
        let resp = parse(
            r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"audio/pcm","data":"AAAA"}},{"text":"spoken"}]}}]}"#,
        );
        assert_eq!(resp.text().as_deref(), Some("spoken"));
    }

    #[test]
    fn blocked_candidate_has_no_text() {
        let resp = parse(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#);
        assert_eq!(resp.text(), None);
    }

    #[test]
    fn empty_body_has_no_text() {
        let resp = parse("{}");
        assert!(resp.candidates.is_empty());
        assert_eq!(resp.text(), None);
    }
}

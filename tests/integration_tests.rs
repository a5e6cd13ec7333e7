//! Integration tests for the colloquy library.
//! The network tests require an API key in the environment to run.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use colloquy::{
        ChatMessage, KnownModel, Model, OpenAi, PauseGate, SessionOptions, StreamSession,
        estimate,
    };

    #[tokio::test]
    async fn test_streaming_session() {
        // This test requires COLLOQUY_API_KEY to be set
        let api_key = std::env::var("COLLOQUY_API_KEY").ok();
        if api_key.is_none() {
            eprintln!("Skipping test_streaming_session: COLLOQUY_API_KEY not set");
            return;
        }

        let client = OpenAi::new(api_key).expect("Failed to create client");
        let model = Model::Known(KnownModel::Gpt35Turbo);
        let messages = vec![ChatMessage::human("2+2?")];
        let gate = Arc::new(PauseGate::new());

        let handle = StreamSession::start(
            &client,
            &messages,
            SessionOptions::new(model.clone()).with_max_tokens(Some(16)),
            gate,
        )
        .await
        .expect("Stream request should succeed");

        let reply = handle.join().await.expect("Session should settle");
        assert!(reply.is_assistant());
        assert!(!reply.text.is_empty());
        assert_eq!(reply.model, Some(model));
    }

    #[test]
    fn test_estimate_known_model() {
        let messages = vec![ChatMessage::human("2+2?")];
        let est = estimate(&messages, &Model::Known(KnownModel::Gpt35Turbo));
        assert!(est.count > 0);
        let cost = est.cost.expect("gpt-3.5-turbo pricing is known");
        let expected = est.count as f64 / 1000.0 * 0.002;
        assert!((cost - expected).abs() < 1e-12);
    }

    #[test]
    fn test_estimate_unknown_model() {
        let messages = vec![ChatMessage::human("2+2?")];
        let est = estimate(&messages, &Model::Custom("unknown-model-x".to_string()));
        assert!(est.count > 0);
        assert_eq!(est.cost, None);
    }
}

//! `say` and `respond` construction.

use serde_json::{Value, json};
use slackline_core::{BoxError, OutgoingMessage, Respond, Say, SharedClient, lookup_str};
use std::sync::Arc;

/// `say` for a conversation: posts with `chat.postMessage` through `client`.
pub fn say_for(client: SharedClient, conversation_id: String) -> Say {
    let conversation_id: Arc<str> = Arc::from(conversation_id);
    Say::new(move |message: OutgoingMessage| {
        let client = Arc::clone(&client);
        let params = Value::Object(message.or_insert("channel", &*conversation_id).into_map());
        async move { client.call("chat.postMessage", params).await }
    })
}

/// The URL `respond` posts to: `response_url`, else the first `response_urls` entry.
pub fn response_url(body: &Value) -> Option<&str> {
    lookup_str(body, &["response_url"]).or_else(|| {
        body.get("response_urls")
            .and_then(Value::as_array)
            .and_then(|urls| urls.first())
            .and_then(|first| lookup_str(first, &["response_url"]))
    })
}

/// `respond` for a response URL: posts the message as JSON.
pub fn respond_for(http: reqwest::Client, url: String) -> Respond {
    let url: Arc<str> = Arc::from(url);
    Respond::new(move |message: OutgoingMessage| {
        let http = http.clone();
        let url = Arc::clone(&url);
        async move {
            let response = http
                .post(&*url)
                .json(&Value::Object(message.into_map()))
                .send()
                .await?
                .error_for_status()?;
            Ok::<_, BoxError>(json!({"status": response.status().as_u16()}))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use slackline_std::testing::RecordingClient;

    #[test]
    fn test_response_url_fallback() {
        assert_eq!(
            response_url(&json!({"response_url": "https://a", "response_urls": [{"response_url": "https://b"}]})),
            Some("https://a")
        );
        assert_eq!(
            response_url(&json!({"response_urls": [{"response_url": "https://b"}]})),
            Some("https://b")
        );
        assert_eq!(response_url(&json!({"response_urls": []})), None);
    }

    #[tokio::test]
    async fn test_say_posts_into_conversation() {
        let client = RecordingClient::with_token("xoxb");
        let say = say_for(Arc::new(client.clone()), "C1".into());

        say.send("hello").await.unwrap();
        say.send(json!({"text": "elsewhere", "channel": "C2"})).await.unwrap();

        let calls = client.calls();
        assert_eq!(calls[0].method, "chat.postMessage");
        assert_eq!(calls[0].params, json!({"text": "hello", "channel": "C1"}));
        assert_eq!(calls[1].params["channel"], "C2");
    }
}

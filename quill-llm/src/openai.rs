//! Wire adapter for the OpenAI-compatible HTTP API.
//!
//! Owns the mapping from an instruction prompt to the chat request shape the
//! endpoint requires, and the SSE decoding for streamed responses.

use crate::error::{ModelError, Result};
use crate::types::{CompletionRequest, CompletionStream, ModelId, ProviderConfig, StreamChunk};
use bytes::Bytes;
use futures_util::Stream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub(crate) struct OpenAiClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl OpenAiClient {
    pub(crate) fn new(http: reqwest::Client, config: ProviderConfig) -> Self {
        Self { http, config }
    }

    #[tracing::instrument(level = "info", skip_all, fields(model = %model))]
    pub(crate) async fn chat_stream(
        &self,
        model: ModelId,
        request: &CompletionRequest,
    ) -> Result<CompletionStream> {
        let req = OpenAiChatRequest::new(model, request);

        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url()))
            .bearer_auth(self.config.api_key())
            .json(&req)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Http(format!(
                "chat completions status={status} body={body}"
            )));
        }

        let sse = Box::pin(decode_sse(response.bytes_stream()));

        let stream = futures_util::stream::unfold(sse, |mut sse| async move {
            loop {
                let next = sse.as_mut().next().await?;
                match next {
                    Ok(SseEvent::Data(data)) => {
                        if data.trim() == "[DONE]" {
                            return Some((Ok(StreamChunk::Done), sse));
                        }

                        let chunk: OpenAiStreamResponseChunk = match serde_json::from_str(&data) {
                            Ok(v) => v,
                            Err(e) => {
                                return Some((
                                    Err(ModelError::StreamParse(format!(
                                        "chunk json error={e} data={data}"
                                    ))),
                                    sse,
                                ));
                            }
                        };

                        let Some(choice) = chunk.choices.first() else {
                            continue;
                        };
                        if let Some(content) = choice.delta.content.as_ref() {
                            if !content.is_empty() {
                                return Some((
                                    Ok(StreamChunk::Delta {
                                        content: content.clone(),
                                    }),
                                    sse,
                                ));
                            }
                        }
                    }
                    Ok(SseEvent::Other) => continue,
                    Err(e) => return Some((Err(e), sse)),
                }
            }
        });

        Ok(Box::pin(stream))
    }

    #[tracing::instrument(level = "info", skip_all, fields(model = model))]
    pub(crate) async fn embed(&self, model: &str, input: &str) -> Result<(Vec<f32>, u32)> {
        let req = OpenAiEmbeddingRequest {
            model: model.to_string(),
            input: input.to_string(),
        };

        let response = self
            .http
            .post(format!("{}/embeddings", self.config.base_url()))
            .bearer_auth(self.config.api_key())
            .json(&req)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ModelError::Http(format!(
                "embeddings status={status} body={body}"
            )));
        }

        let parsed: OpenAiEmbeddingResponse = serde_json::from_str(&body)?;
        let record = parsed.data.into_iter().next().ok_or_else(|| {
            ModelError::ResponseFormat("embeddings response missing data".to_string())
        })?;

        Ok((record.embedding, parsed.usage.total_tokens))
    }
}

#[derive(Debug, Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    max_tokens: u32,
    temperature: f32,
    // Repetition penalties are intentionally pinned, not caller-configurable.
    frequency_penalty: f32,
    presence_penalty: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    stream: bool,
}

impl OpenAiChatRequest {
    fn new(model: ModelId, request: &CompletionRequest) -> Self {
        Self {
            model: model.as_str().to_string(),
            // The instruction prompt maps to a single user turn.
            messages: vec![OpenAiMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            stop: request.stop.clone(),
            stream: true,
        }
    }
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingRecord>,
    usage: OpenAiEmbeddingUsage,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingRecord {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingUsage {
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Debug)]
enum SseEvent {
    Data(String),
    Other,
}

fn decode_sse<S>(bytes_stream: S) -> impl Stream<Item = Result<SseEvent>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + Unpin + 'static,
{
    futures_util::stream::unfold(
        (bytes_stream, String::new()),
        |(mut stream, mut buffer)| async move {
            loop {
                if let Some(idx) = buffer.find("\n\n") {
                    let raw = buffer[..idx].to_string();
                    buffer = buffer[idx + 2..].to_string();

                    let mut data_lines = Vec::new();
                    for line in raw.lines() {
                        let line = line.trim_end();
                        if let Some(rest) = line.strip_prefix("data:") {
                            data_lines.push(rest.trim_start().to_string());
                        }
                    }
                    if data_lines.is_empty() {
                        return Some((Ok(SseEvent::Other), (stream, buffer)));
                    }
                    return Some((Ok(SseEvent::Data(data_lines.join("\n"))), (stream, buffer)));
                }

                match stream.next().await {
                    Some(Ok(chunk)) => {
                        buffer.push_str(&String::from_utf8_lossy(&chunk));
                        continue;
                    }
                    Some(Err(e)) => {
                        return Some((Err(ModelError::Http(e.to_string())), (stream, buffer)));
                    }
                    None => return None,
                }
            }
        },
    )
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamResponseChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_pins_penalties_and_streams() {
        let req = CompletionRequest::new("translate this", 128)
            .with_stop(vec!["\n\n".to_string()])
            .with_temperature(0.4);
        let wire = OpenAiChatRequest::new(ModelId::Gpt4, &req);
        let v = serde_json::to_value(&wire).unwrap();

        assert_eq!(v["model"], "gpt-4");
        assert_eq!(v["messages"][0]["role"], "user");
        assert_eq!(v["messages"][0]["content"], "translate this");
        assert_eq!(v["max_tokens"], 128);
        assert_eq!(v["frequency_penalty"], 0.0);
        assert_eq!(v["presence_penalty"], 0.0);
        assert_eq!(v["stop"][0], "\n\n");
        assert_eq!(v["stream"], true);
    }

    #[test]
    fn chat_request_omits_absent_stop() {
        let wire = OpenAiChatRequest::new(ModelId::Gpt35Turbo, &CompletionRequest::new("hi", 8));
        let v = serde_json::to_value(&wire).unwrap();
        assert!(v.get("stop").is_none());
        assert_eq!(v["temperature"], 0.0);
    }

    #[tokio::test]
    async fn decode_sse_reassembles_split_frames() {
        let frames: Vec<std::result::Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"a\"")),
            Ok(Bytes::from_static(b":1}\n\ndata: [DONE]\n\n")),
        ];
        let mut sse = Box::pin(decode_sse(futures_util::stream::iter(frames)));

        let first = sse.next().await.unwrap().unwrap();
        match first {
            SseEvent::Data(d) => assert_eq!(d, "{\"a\":1}"),
            SseEvent::Other => panic!("expected data event"),
        }
        let second = sse.next().await.unwrap().unwrap();
        match second {
            SseEvent::Data(d) => assert_eq!(d, "[DONE]"),
            SseEvent::Other => panic!("expected data event"),
        }
        assert!(sse.next().await.is_none());
    }

    #[tokio::test]
    async fn decode_sse_skips_comment_frames() {
        let frames: Vec<std::result::Result<Bytes, reqwest::Error>> =
            vec![Ok(Bytes::from_static(b": keepalive\n\ndata: x\n\n"))];
        let mut sse = Box::pin(decode_sse(futures_util::stream::iter(frames)));

        assert!(matches!(sse.next().await.unwrap().unwrap(), SseEvent::Other));
        match sse.next().await.unwrap().unwrap() {
            SseEvent::Data(d) => assert_eq!(d, "x"),
            SseEvent::Other => panic!("expected data event"),
        }
    }

    #[test]
    fn embedding_response_parses_vector_and_usage() {
        let body = r#"{
            "data": [{"embedding": [0.1, 0.2, 0.3], "index": 0, "object": "embedding"}],
            "usage": {"prompt_tokens": 7, "total_tokens": 7}
        }"#;
        let parsed: OpenAiEmbeddingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.2, 0.3]);
        assert_eq!(parsed.usage.total_tokens, 7);
    }
}

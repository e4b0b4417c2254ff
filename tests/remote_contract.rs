//! HTTP contract tests for the remote collaborators.
//!
//! Verify exact request/response formats against a mock backend: the chat
//! fallback, the synthesis service (including the degraded-mode protocol
//! and its health probe) and the record APIs.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use lua_voice::config::{EndpointConfig, SynthesisConfig, VoiceGender};
use lua_voice::events::PlaybackEvent;
use lua_voice::history::{ConversationTurn, Role};
use lua_voice::remote::{ChatClient, ChatContext, ChatPort, RecordsClient, RecordsPort, TtsClient};
use lua_voice::synthesis::{
    LocalVoice, RemoteFirstSynthesizer, SpeechOutputPort, SpeechRequest,
};
use lua_voice::test_support::{FixedLocalSynth, InstantSink};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn endpoints(server: &MockServer) -> EndpointConfig {
    EndpointConfig {
        base_url: server.uri(),
        ..EndpointConfig::default()
    }
}

fn chat_context() -> ChatContext {
    ChatContext {
        user_id: "web-user".to_owned(),
        history: vec![
            ConversationTurn::now(Role::User, "criar vale"),
            ConversationTurn::now(Role::Assistant, "qual funcionário?"),
        ],
        timestamp: Utc::now(),
        identity: Some(json!({ "name": "Ana" })),
    }
}

#[tokio::test]
async fn chat_request_carries_message_user_and_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "message": "qual é a previsão do tempo",
            "user_id": "web-user",
            "context": {
                "history": [
                    { "role": "user", "content": "criar vale" },
                    { "role": "assistant", "content": "qual funcionário?" }
                ],
                "user": { "name": "Ana" }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "Deve fazer sol hoje.",
            "module": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new(&endpoints(&server)).expect("client");
    let reply = client
        .converse("qual é a previsão do tempo", &chat_context())
        .await
        .expect("reply");

    assert_eq!(reply.response, "Deve fazer sol hoje.");
    assert!(reply.module.is_none());
}

#[tokio::test]
async fn chat_reply_with_action_is_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "Abrindo o caixa.",
            "action": "open",
            "module": "caixa",
            "data": { "period": "today" }
        })))
        .mount(&server)
        .await;

    let client = ChatClient::new(&endpoints(&server)).expect("client");
    let reply = client.converse("abrir", &chat_context()).await.expect("reply");

    assert_eq!(reply.action.as_deref(), Some("open"));
    assert_eq!(reply.module.as_deref(), Some("caixa"));
    assert_eq!(reply.data, Some(json!({ "period": "today" })));
}

#[tokio::test]
async fn chat_server_error_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = ChatClient::new(&endpoints(&server)).expect("client");
    assert!(client.converse("olá", &chat_context()).await.is_err());
}

#[tokio::test]
async fn synthesis_decodes_base64_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tts/speak"))
        .and(body_partial_json(json!({
            "text": "Olá senhor",
            "voice": "luna",
            "speed": 1.0,
            "format": "base64"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "audio_base64": BASE64.encode(b"RIFF-fake-wav"),
            "format": "wav"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = TtsClient::new(&endpoints(&server)).expect("client");
    let clip = client
        .synthesize("Olá senhor", "luna", Some("confident"), 1.0)
        .await
        .expect("clip");

    assert_eq!(clip.data, b"RIFF-fake-wav");
    assert_eq!(clip.format, "wav");
}

#[tokio::test]
async fn synthesis_refusal_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tts/speak"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": "engine offline"
        })))
        .mount(&server)
        .await;

    let client = TtsClient::new(&endpoints(&server)).expect("client");
    assert!(client.synthesize("Olá", "luna", None, 1.0).await.is_err());
}

#[tokio::test]
async fn health_probe_reports_engine_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tts/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "engine_loaded": false,
            "status": { "engine": "none" }
        })))
        .mount(&server)
        .await;

    let client = TtsClient::new(&endpoints(&server)).expect("client");
    assert!(!client.probe().await.expect("probe"));
}

#[tokio::test]
async fn advance_creation_contract() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/vales/create-via-ai"))
        .and(body_partial_json(json!({
            "employee_name": "Josemir",
            "amount": 200.0,
            "reason": "Vale almoço"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "vale": { "id": 7 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = RecordsClient::new(&endpoints(&server)).expect("client");
    client
        .create_advance("Josemir", 200.0, "Vale almoço")
        .await
        .expect("created");
}

#[tokio::test]
async fn advance_creation_refusal_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/vales/create-via-ai"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": "employee not found"
        })))
        .mount(&server)
        .await;

    let client = RecordsClient::new(&endpoints(&server)).expect("client");
    assert!(client.create_advance("Ana", 50.0, "Vale").await.is_err());
}

#[tokio::test]
async fn advance_search_contract() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/vales/search"))
        .and(query_param("employee", "Josemir"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "vales": [
                { "amount": 100.0, "employee_name": "Josemir" },
                { "amount": 50.5 }
            ]
        })))
        .mount(&server)
        .await;

    let client = RecordsClient::new(&endpoints(&server)).expect("client");
    let records = client.search_advances("Josemir").await.expect("records");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].amount, 100.0);
    assert_eq!(records[1].employee_name, None);
}

#[tokio::test]
async fn report_contract() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/reports/sales"))
        .and(query_param("period", "week"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "summary": "Vendas da semana: R$ 8400"
        })))
        .mount(&server)
        .await;

    let client = RecordsClient::new(&endpoints(&server)).expect("client");
    let report = client.generate_report("sales", "week").await.expect("report");
    assert_eq!(report.summary, "Vendas da semana: R$ 8400");
}

fn pt_voices() -> Vec<LocalVoice> {
    vec![
        LocalVoice {
            id: "pt-br-maria".to_owned(),
            language: "pt-BR".to_owned(),
            gender: VoiceGender::Female,
        },
        LocalVoice {
            id: "en-us-guy".to_owned(),
            language: "en-US".to_owned(),
            gender: VoiceGender::Male,
        },
    ]
}

async fn drain_to_terminal(mut rx: tokio::sync::mpsc::Receiver<PlaybackEvent>) -> Vec<PlaybackEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        let terminal = event.is_terminal();
        events.push(event);
        if terminal {
            break;
        }
    }
    events
}

#[tokio::test]
async fn remote_failure_degrades_to_local_and_stops_trying_remote() {
    let server = MockServer::start().await;
    // Exactly one remote attempt may arrive across both speak calls.
    Mock::given(method("POST"))
        .and(path("/api/tts/speak"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let local = Arc::new(FixedLocalSynth {
        voices: pt_voices(),
        ..FixedLocalSynth::default()
    });
    let sink = Arc::new(InstantSink::default());
    let synth = RemoteFirstSynthesizer::new(
        TtsClient::new(&endpoints(&server)).expect("client"),
        Arc::clone(&local) as Arc<dyn lua_voice::synthesis::LocalSynthesizer>,
        Arc::clone(&sink) as Arc<dyn lua_voice::synthesis::PlaybackSink>,
        SynthesisConfig::default(),
    );

    let request = SpeechRequest::new("Olá senhor", &SynthesisConfig::default());
    let events = drain_to_terminal(synth.speak(request.clone()).await).await;
    assert_eq!(events.last(), Some(&PlaybackEvent::Ended));
    assert!(synth.remote_unavailable());
    assert_eq!(local.calls.load(Ordering::SeqCst), 1);

    // Degraded: the second call goes straight to the local engine, with the
    // language/gender matched voice.
    let events = drain_to_terminal(synth.speak(request).await).await;
    assert_eq!(events.last(), Some(&PlaybackEvent::Ended));
    assert_eq!(local.calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        local.requested_voices.lock().expect("voices").as_slice(),
        &[Some("pt-br-maria".to_owned()), Some("pt-br-maria".to_owned())]
    );
    assert_eq!(sink.played.lock().expect("played").len(), 2);
}

#[tokio::test]
async fn health_probe_restores_the_remote_path() {
    let server = MockServer::start().await;
    // First attempt fails, flipping the degraded flag.
    Mock::given(method("POST"))
        .and(path("/api/tts/speak"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let local = Arc::new(FixedLocalSynth {
        voices: pt_voices(),
        ..FixedLocalSynth::default()
    });
    let sink = Arc::new(InstantSink::default());
    let synth = RemoteFirstSynthesizer::new(
        TtsClient::new(&endpoints(&server)).expect("client"),
        Arc::clone(&local) as Arc<dyn lua_voice::synthesis::LocalSynthesizer>,
        Arc::clone(&sink) as Arc<dyn lua_voice::synthesis::PlaybackSink>,
        SynthesisConfig::default(),
    );

    let request = SpeechRequest::new("Olá senhor", &SynthesisConfig::default());
    drain_to_terminal(synth.speak(request.clone()).await).await;
    assert!(synth.remote_unavailable());

    // The engine comes back; the probe clears the degraded flag.
    Mock::given(method("GET"))
        .and(path("/api/tts/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "engine_loaded": true,
            "status": { "engine": "xtts" }
        })))
        .mount(&server)
        .await;
    assert!(synth.probe_remote().await);
    assert!(!synth.remote_unavailable());

    Mock::given(method("POST"))
        .and(path("/api/tts/speak"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "audio_base64": BASE64.encode(b"remote-audio"),
            "format": "wav"
        })))
        .mount(&server)
        .await;

    drain_to_terminal(synth.speak(request).await).await;
    // Remote handled the last call; the local engine was not used again.
    assert_eq!(local.calls.load(Ordering::SeqCst), 1);
    let played = sink.played.lock().expect("played");
    assert_eq!(played.last().expect("clip").data, b"remote-audio");
}

#[tokio::test]
async fn both_paths_failing_completes_the_turn_silently() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tts/speak"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let local = Arc::new(FixedLocalSynth {
        voices: pt_voices(),
        fail: true,
        ..FixedLocalSynth::default()
    });
    let sink = Arc::new(InstantSink::default());
    let synth = RemoteFirstSynthesizer::new(
        TtsClient::new(&endpoints(&server)).expect("client"),
        Arc::clone(&local) as Arc<dyn lua_voice::synthesis::LocalSynthesizer>,
        Arc::clone(&sink) as Arc<dyn lua_voice::synthesis::PlaybackSink>,
        SynthesisConfig::default(),
    );

    let request = SpeechRequest::new("Olá senhor", &SynthesisConfig::default());
    let events = drain_to_terminal(synth.speak(request).await).await;

    // Exactly one terminal event, nothing played.
    assert_eq!(events, vec![PlaybackEvent::Error]);
    assert!(sink.played.lock().expect("played").is_empty());
}

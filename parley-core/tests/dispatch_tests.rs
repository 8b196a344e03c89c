// ABOUTME: End-to-end tests of the message pipeline against mock backends.
// ABOUTME: Covers plain replies, document and image generation, cancellation and naming.

use parley_agent::backends::mock::{MockBackend, MockImageBackend, FAKE_PNG};
use parley_core::conversation::{CANCELLED_MARKER, DEFAULT_CHAT_NAME};
use parley_core::prompts::{APOLOGY, ASK_FILE_FORMAT};
use parley_core::{BackendConfig, Config, CoreError, Dispatcher, Stores};
use std::sync::Arc;
use tempfile::TempDir;

const CHAT: &str = "Identidade e Função";
const ATTRIBUTES: &str = "Extraia e salve informações";
const MEMORY: &str = "extraia apenas uma frase curta";
const WANTS_FILE: &str = "Isto é para gerar um ficheiro";
const FILE_FORMAT: &str = "Que tipo de ficheiro";
const NAMING: &str = "Gere um nome curto";

struct Harness {
    _dir: TempDir,
    dispatcher: Dispatcher,
    mock: MockBackend,
}

impl Harness {
    fn stores(&self) -> &Arc<Stores> {
        self.dispatcher.stores()
    }

    fn new_chat(&self) -> String {
        self.stores().conversations.create_chat().unwrap().id
    }

    fn chat_files(&self, chat_id: &str) -> Vec<String> {
        self.stores().files.list(chat_id, |_| true).unwrap()
    }
}

fn harness_with_image(mock: MockBackend, image: MockImageBackend) -> Harness {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.storage.data_dir = dir.path().join("data").display().to_string();
    config.storage.uploads_dir = dir.path().join("uploads").display().to_string();
    config.backend = BackendConfig::new("mock")
        .with("max_retries", 3)
        .with("retry_base_delay_ms", 0);

    let stores = Arc::new(Stores::open(&config).unwrap());
    let dispatcher = Dispatcher::new(stores, Arc::new(mock.clone()), Arc::new(image), &config);
    Harness {
        _dir: dir,
        dispatcher,
        mock,
    }
}

fn harness(mock: MockBackend) -> Harness {
    harness_with_image(mock, MockImageBackend::succeeding(FAKE_PNG))
}

#[tokio::test]
async fn test_txt_request_writes_file_and_links_it() {
    let h = harness(
        MockBackend::new()
            .on_prompt(CHAT)
            .respond_text("Aqui está o ficheiro.")
            .on_prompt(NAMING)
            .respond_text("\"Ficheiro de teste\"")
            .otherwise_text("N/A"),
    );
    let chat_id = h.new_chat();

    let result = h
        .dispatcher
        .send(&chat_id, "gera um ficheiro txt com olá mundo")
        .await
        .unwrap();

    let files = h.chat_files(&chat_id);
    assert_eq!(files.len(), 1);
    let filename = &files[0];
    assert!(filename.starts_with("gerado_"));
    assert!(filename.ends_with(".txt"));

    let path = h.stores().files.resolve(&chat_id, filename).unwrap();
    assert_eq!(std::fs::read_to_string(path).unwrap(), "olá mundo");

    assert_eq!(result.block_idx, 0);
    assert!(result.ai_text.starts_with("Aqui está o ficheiro."));
    assert!(result
        .ai_text
        .ends_with(&format!("(/files/{}/{})", chat_id, filename)));
    assert!(!result.memoria_atualizada);

    // The format came from the message itself
    assert_eq!(h.mock.prompt_count_containing(WANTS_FILE), 0);
    assert_eq!(h.mock.prompt_count_containing(FILE_FORMAT), 0);

    let chat = h.stores().conversations.get_chat(&chat_id).unwrap();
    assert_eq!(chat.name, "Ficheiro de teste");
    assert_eq!(
        chat.conversation_blocks[0].ai_responses[0].as_deref(),
        Some(result.ai_text.as_str())
    );
}

#[tokio::test]
async fn test_plain_message_persists_reply_and_reports_memory() {
    let h = harness(
        MockBackend::new()
            .on_prompt(ATTRIBUTES)
            .respond_text("Claro: {\"interesse\": \"biologia\"}")
            .on_prompt(MEMORY)
            .respond_text("O utilizador interessa-se por biologia.")
            .on_prompt(WANTS_FILE)
            .respond_text("não")
            .on_prompt(CHAT)
            .respond_text("A fotossíntese converte luz em energia química.")
            .on_prompt(NAMING)
            .respond_text("Fotossíntese"),
    );
    let chat_id = h.new_chat();

    let result = h
        .dispatcher
        .send(&chat_id, "Explica-me como funciona a fotossíntese nas plantas")
        .await
        .unwrap();

    assert_eq!(result.block_idx, 0);
    assert_eq!(result.ai_text, "A fotossíntese converte luz em energia química.");
    assert!(result.memoria_atualizada);
    assert!(h.chat_files(&chat_id).is_empty());

    let blocks = h.stores().conversations.get_blocks(&chat_id).unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].selected_response(), Some(result.ai_text.as_str()));

    let profile = h.stores().profiles.get("default_user").unwrap();
    assert_eq!(profile.attributes["interesse"], "biologia");
    assert_eq!(profile.memories, vec!["O utilizador interessa-se por biologia."]);
    assert_eq!(h.mock.pending_expectations(), 0);
}

#[tokio::test]
async fn test_profile_reaches_the_prompt() {
    let h = harness(MockBackend::new().otherwise_text("não"));
    h.stores()
        .profiles
        .add_memory("default_user", "O utilizador vive no Porto.")
        .unwrap();
    let chat_id = h.new_chat();

    h.dispatcher
        .send(&chat_id, "Que tempo vai fazer amanhã?")
        .await
        .unwrap();

    let chat_prompts: Vec<String> = h
        .mock
        .prompts()
        .into_iter()
        .filter(|p| p.contains(CHAT))
        .collect();
    assert_eq!(chat_prompts.len(), 1);
    assert!(chat_prompts[0].contains("O utilizador vive no Porto."));
}

#[tokio::test]
async fn test_chat_history_included_only_when_enabled() {
    let h = harness(MockBackend::new().otherwise_text("não"));
    let chat_id = h.new_chat();

    h.dispatcher
        .send(&chat_id, "A minha cor preferida é o azul")
        .await
        .unwrap();
    h.dispatcher
        .send(&chat_id, "Qual é a capital de França?")
        .await
        .unwrap();

    let mut settings = h.stores().settings.get().unwrap();
    settings.memory.reference_chat_history = true;
    h.stores().settings.replace(settings).unwrap();

    let result = h
        .dispatcher
        .send(&chat_id, "Resume a nossa conversa")
        .await
        .unwrap();
    assert_eq!(result.block_idx, 2);

    let chat_prompts: Vec<String> = h
        .mock
        .prompts()
        .into_iter()
        .filter(|p| p.contains(CHAT))
        .collect();
    assert_eq!(chat_prompts.len(), 3);
    assert!(!chat_prompts[1].contains("A minha cor preferida"));
    assert!(chat_prompts[2].contains("A minha cor preferida é o azul"));
    assert!(chat_prompts[2].contains("Qual é a capital de França?"));
}

#[tokio::test]
async fn test_unknown_format_asks_for_it() {
    let h = harness(
        MockBackend::new()
            .on_prompt(CHAT)
            .respond_text("Claro!")
            .otherwise_text("não sei"),
    );
    let chat_id = h.new_chat();

    let result = h
        .dispatcher
        .send(&chat_id, "cria um documento sobre gatos")
        .await
        .unwrap();

    assert_eq!(result.ai_text, ASK_FILE_FORMAT);
    assert!(!result.memoria_atualizada);
    assert!(h.chat_files(&chat_id).is_empty());
    assert_eq!(h.mock.prompt_count_containing(FILE_FORMAT), 3);

    let blocks = h.stores().conversations.get_blocks(&chat_id).unwrap();
    assert_eq!(blocks[0].selected_response(), Some(ASK_FILE_FORMAT));
}

#[tokio::test]
async fn test_cancel_applies_to_unknown_format_reply() {
    let h = harness(
        MockBackend::new()
            .on_prompt(CHAT)
            .respond_text("Claro!")
            .on_prompt(CHAT)
            .respond_text("Paris.")
            .otherwise_text("não sei"),
    );
    let chat_id = h.new_chat();

    h.dispatcher.cancel(&chat_id).unwrap();
    let result = h
        .dispatcher
        .send(&chat_id, "cria um documento sobre gatos")
        .await
        .unwrap();
    assert_eq!(result.ai_text, CANCELLED_MARKER);
    assert!(!result.memoria_atualizada);

    let next = h
        .dispatcher
        .send(&chat_id, "Qual é a capital de França?")
        .await
        .unwrap();
    assert_eq!(next.ai_text, "Paris.");

    let blocks = h.stores().conversations.get_blocks(&chat_id).unwrap();
    assert_eq!(blocks[0].selected_response(), Some(CANCELLED_MARKER));
    assert_eq!(blocks[1].selected_response(), Some("Paris."));
}

#[tokio::test]
async fn test_format_asked_of_backend_when_not_named() {
    let h = harness(
        MockBackend::new()
            .on_prompt(FILE_FORMAT)
            .respond_text("CSV")
            .otherwise_text("N/A"),
    );
    let chat_id = h.new_chat();

    let result = h
        .dispatcher
        .send(&chat_id, "exporta um ficheiro com nome;idade")
        .await
        .unwrap();

    let files = h.chat_files(&chat_id);
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with(".csv"));
    assert!(result.ai_text.contains(&files[0]));
}

#[tokio::test]
async fn test_cancel_discards_reply() {
    let h = harness(MockBackend::new().otherwise_text("Resposta longa"));
    let chat_id = h.new_chat();

    h.dispatcher.cancel(&chat_id).unwrap();
    let result = h
        .dispatcher
        .send(&chat_id, "Conta-me uma história comprida")
        .await
        .unwrap();

    assert_eq!(result.ai_text, CANCELLED_MARKER);
    let chat = h.stores().conversations.get_chat(&chat_id).unwrap();
    assert_eq!(
        chat.conversation_blocks[0].selected_response(),
        Some(CANCELLED_MARKER)
    );
    assert_eq!(chat.name, DEFAULT_CHAT_NAME);

    // The flag is consumed by the cancelled reply
    let next = h
        .dispatcher
        .send(&chat_id, "E agora uma curta, por favor")
        .await
        .unwrap();
    assert_eq!(next.ai_text, "Resposta longa");
    assert_eq!(next.block_idx, 1);
}

#[tokio::test]
async fn test_cancel_unknown_chat_is_not_found() {
    let h = harness(MockBackend::new());
    assert!(matches!(
        h.dispatcher.cancel("missing"),
        Err(CoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_greetings_skip_memory_extraction() {
    let h = harness(MockBackend::new().otherwise_text("não"));
    let chat_id = h.new_chat();

    for greeting in ["oi", "boa tarde", "Olá!"] {
        let result = h.dispatcher.send(&chat_id, greeting).await.unwrap();
        assert!(!result.memoria_atualizada);
    }
    assert_eq!(h.mock.prompt_count_containing(MEMORY), 0);
    assert_eq!(h.mock.prompt_count_containing(CHAT), 3);
}

#[tokio::test]
async fn test_memory_list_capped_and_deduplicated() {
    let h = harness(MockBackend::new().otherwise_text("não"));
    let chat_id = h.new_chat();

    for i in 0..25 {
        let sentence = format!("O utilizador tem {} gatos.", i);
        let _ = h.mock.clone().on_prompt(MEMORY).respond_text(&sentence);
        let result = h
            .dispatcher
            .send(&chat_id, &format!("Tenho {} gatos em casa", i))
            .await
            .unwrap();
        assert!(result.memoria_atualizada);
    }

    let _ = h
        .mock
        .clone()
        .on_prompt(MEMORY)
        .respond_text("O utilizador tem 24 gatos.");
    let repeated = h
        .dispatcher
        .send(&chat_id, "Já disse que tenho 24 gatos")
        .await
        .unwrap();
    assert!(!repeated.memoria_atualizada);

    let memories = h.stores().profiles.get("default_user").unwrap().memories;
    assert_eq!(memories.len(), 20);
    assert_eq!(memories[0], "O utilizador tem 5 gatos.");
    assert_eq!(memories[19], "O utilizador tem 24 gatos.");
}

#[tokio::test]
async fn test_image_request_stores_png() {
    let image = MockImageBackend::succeeding(FAKE_PNG);
    let h = harness_with_image(MockBackend::new().otherwise_text("Aqui vai."), image.clone());
    let chat_id = h.new_chat();

    let result = h
        .dispatcher
        .send(&chat_id, "desenha um gato ao pôr do sol")
        .await
        .unwrap();

    let files = h.chat_files(&chat_id);
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("imagem_"));
    assert!(result.ai_text.starts_with("Imagem gerada com sucesso!"));
    assert!(result.ai_text.contains(&format!("/files/{}/{}", chat_id, files[0])));
    assert_eq!(image.prompts(), vec!["desenha um gato ao pôr do sol".to_string()]);
    assert_eq!(h.mock.prompt_count_containing(WANTS_FILE), 0);
}

#[tokio::test]
async fn test_image_failure_is_internal_and_leaves_block_pending() {
    let h = harness_with_image(
        MockBackend::new().otherwise_text("Aqui vai."),
        MockImageBackend::failing("gpu offline"),
    );
    let chat_id = h.new_chat();

    let err = h
        .dispatcher
        .send(&chat_id, "desenha um farol numa tempestade")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Internal(_)));

    let blocks = h.stores().conversations.get_blocks(&chat_id).unwrap();
    assert_eq!(blocks.len(), 1);
    assert!(!blocks[0].is_complete());
}

#[tokio::test]
async fn test_backend_outage_yields_apology_and_fallback_name() {
    let h = harness(MockBackend::new().otherwise_error("connection refused"));
    let chat_id = h.new_chat();
    let message = "Quero aprender a tocar guitarra portuguesa este ano";

    let result = h.dispatcher.send(&chat_id, message).await.unwrap();
    assert_eq!(result.ai_text, APOLOGY);
    assert!(!result.memoria_atualizada);

    let chat = h.stores().conversations.get_chat(&chat_id).unwrap();
    let expected: String = message.chars().take(30).collect();
    assert_eq!(chat.name, expected);
    // Naming gets exactly one attempt
    assert_eq!(h.mock.prompt_count_containing(NAMING), 1);
}

#[tokio::test]
async fn test_user_rename_is_kept() {
    let h = harness(MockBackend::new().otherwise_text("não"));
    let chat_id = h.new_chat();
    h.stores()
        .conversations
        .rename_chat(&chat_id, "Planos de viagem")
        .unwrap();

    h.dispatcher
        .send(&chat_id, "Quero visitar o Japão na primavera")
        .await
        .unwrap();

    let chat = h.stores().conversations.get_chat(&chat_id).unwrap();
    assert_eq!(chat.name, "Planos de viagem");
    assert_eq!(h.mock.prompt_count_containing(NAMING), 0);
}

#[tokio::test]
async fn test_only_first_exchange_names_the_chat() {
    let h = harness(MockBackend::new().otherwise_text("Receitas"));
    let chat_id = h.new_chat();

    h.dispatcher
        .send(&chat_id, "Dá-me uma receita de bacalhau")
        .await
        .unwrap();
    h.dispatcher
        .send(&chat_id, "E uma sobremesa para acompanhar?")
        .await
        .unwrap();

    assert_eq!(h.mock.prompt_count_containing(NAMING), 1);
    let chat = h.stores().conversations.get_chat(&chat_id).unwrap();
    assert_eq!(chat.name, "Receitas");
}

#[tokio::test]
async fn test_invalid_input_changes_nothing() {
    let h = harness(MockBackend::new().otherwise_text("não"));
    let chat_id = h.new_chat();

    assert!(matches!(
        h.dispatcher.send(&chat_id, "   ").await,
        Err(CoreError::InvalidArgument(_))
    ));
    let too_long = "a".repeat(20_001);
    assert!(matches!(
        h.dispatcher.send(&chat_id, &too_long).await,
        Err(CoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        h.dispatcher.send("missing", "Olá, tudo bem contigo?").await,
        Err(CoreError::NotFound(_))
    ));

    assert!(h.stores().conversations.get_blocks(&chat_id).unwrap().is_empty());
    assert!(h.mock.prompts().is_empty());
}

#[tokio::test]
async fn test_markup_is_escaped_before_storage() {
    let h = harness(MockBackend::new().otherwise_text("não"));
    let chat_id = h.new_chat();

    h.dispatcher
        .send(&chat_id, "<script>alert(1)</script> o que é isto?")
        .await
        .unwrap();

    let blocks = h.stores().conversations.get_blocks(&chat_id).unwrap();
    assert_eq!(
        blocks[0].user_variants[0],
        "&lt;script&gt;alert(1)&lt;/script&gt; o que é isto?"
    );
}

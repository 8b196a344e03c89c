// ABOUTME: Decides whether a message asks for plain chat, a generated file, or an image.
// ABOUTME: Keyword patterns first, then yes/no and format questions to the language model.

use crate::prompts;
use anyhow::anyhow;
use parley_agent::{retry, ChatBackend, RetryPolicy};
use regex::Regex;
use std::sync::{Arc, LazyLock};

/// Document formats the generator can render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Pdf,
    Txt,
    Csv,
    Json,
    Py,
    Docx,
    Xlsx,
    Pptx,
}

impl FileFormat {
    /// Detection order matters: earlier formats win substring ties
    pub const ALL: [FileFormat; 8] = [
        FileFormat::Pdf,
        FileFormat::Txt,
        FileFormat::Csv,
        FileFormat::Json,
        FileFormat::Py,
        FileFormat::Docx,
        FileFormat::Xlsx,
        FileFormat::Pptx,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Pdf => "pdf",
            FileFormat::Txt => "txt",
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
            FileFormat::Py => "py",
            FileFormat::Docx => "docx",
            FileFormat::Xlsx => "xlsx",
            FileFormat::Pptx => "pptx",
        }
    }

    /// First known extension occurring anywhere in `text` (already lowercased)
    fn find_in(text: &str) -> Option<FileFormat> {
        Self::ALL.into_iter().find(|f| text.contains(f.extension()))
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Plain,
    File(FileFormat),
    /// A file was requested but no format could be determined
    FileFormatUnknown,
    Image,
}

static FILE_REQUEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(gera|cria|exporta|envia|faz|quero baixar|quero um|quero uma|quero o|quero a|generate|create|export|send|make|i want to download|i want a|i want an)\b.*\b(pdf|ficheiro|arquivo|documento|word|excel|pptx|docx|xlsx|csv|json|txt|py|file|document|spreadsheet)\b",
    )
    .expect("file request pattern is valid")
});

static AFFIRMATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(sim|yes|pdf|ficheiro|arquivo|documento|word|excel|pptx|docx|xlsx|csv|json|txt|py|file|document)\b",
    )
    .expect("affirmative pattern is valid")
});

const IMAGE_KEYWORDS: &[&str] = &[
    "gera uma imagem",
    "cria uma imagem",
    "desenha",
    "faz uma imagem",
    "ilustra",
    "imagem de",
    "picture of",
    "draw",
    "generate an image",
    "create an image",
];

pub fn matches_file_pattern(text: &str) -> bool {
    FILE_REQUEST.is_match(&text.to_lowercase())
}

pub fn is_image_request(text: &str) -> bool {
    let lowered = text.to_lowercase();
    IMAGE_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

pub struct RequestClassifier {
    backend: Arc<dyn ChatBackend>,
    policy: RetryPolicy,
}

impl RequestClassifier {
    /// Questions to the model are retried with a constant pause of the
    /// policy's base delay.
    pub fn new(backend: Arc<dyn ChatBackend>, policy: RetryPolicy) -> Self {
        Self {
            backend,
            policy: policy.as_fixed(),
        }
    }

    pub async fn classify(&self, text: &str) -> RequestKind {
        let wants_file = if matches_file_pattern(text) {
            true
        } else if is_image_request(text) {
            return RequestKind::Image;
        } else {
            self.ask_wants_file(text).await
        };

        if !wants_file {
            return RequestKind::Plain;
        }
        match self.file_format(text).await {
            Some(format) => RequestKind::File(format),
            None => RequestKind::FileFormatUnknown,
        }
    }

    /// Ask the model whether the message wants a file.
    /// Empty answers and errors are retried; exhaustion means "no".
    pub async fn ask_wants_file(&self, text: &str) -> bool {
        let prompt = prompts::wants_file_prompt(text);
        let backend = self.backend.as_ref();
        let answer = retry(&self.policy, "wants_file", |attempt| {
            let prompt = prompt.as_str();
            async move {
                let answer = backend.ask(prompt).await?.trim().to_lowercase();
                tracing::debug!(attempt, answer = %answer, "File request answer");
                if answer.is_empty() {
                    return Err(anyhow!("empty answer"));
                }
                Ok(answer)
            }
        })
        .await;

        match answer {
            Ok(answer) => AFFIRMATIVE.is_match(&answer),
            Err(_) => false,
        }
    }

    /// Known format named in the message, else asked of the model.
    /// Answers without a known extension are retried up to the attempt cap.
    pub async fn file_format(&self, text: &str) -> Option<FileFormat> {
        if let Some(format) = FileFormat::find_in(&text.to_lowercase()) {
            return Some(format);
        }

        let prompt = prompts::file_format_prompt(text);
        let backend = self.backend.as_ref();
        let found = retry(&self.policy, "file_format", |attempt| {
            let prompt = prompt.as_str();
            async move {
                let answer = backend.ask(prompt).await?.trim().to_lowercase();
                tracing::debug!(attempt, answer = %answer, "File format answer");
                FileFormat::find_in(&answer)
                    .ok_or_else(|| anyhow!("no known format in answer '{}'", answer))
            }
        })
        .await;
        found.ok()
    }
}

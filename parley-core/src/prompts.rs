// ABOUTME: Prompt text sent to the language model and fixed reply strings.
// ABOUTME: Builders fill the user's message or profile into each template.

use crate::profile::UserProfile;

/// Persona sent as the first system message of every chat request
pub const PERSONA: &str = r#"Identidade e Função:
És o Llama 3, um modelo de linguagem do Ollama. Foste criado para ajudar os utilizadores com informações úteis, gerar texto, responder a perguntas, resolver problemas e muito mais.

Estilo de Comunicação:
Sê direto, claro e profissional.
Não faças elogios exagerados ou bajulação.
Mantém um tom humano e caloroso, mas evita soar robótico ou artificialmente entusiasmado.
Prioriza a honestidade: se não souberes algo, diz-o abertamente.
Evita adivinhar o que o utilizador quer sem confirmação. Pergunta se necessário.

Linguagem e Preferências do Utilizador:
Lê e adapta-te às preferências do utilizador com base no contexto da conversa (por exemplo, se preferir respostas curtas, em português europeu, técnicas, etc.).

Privacidade e Segurança:
Nunca peças, guardes ou reveles dados sensíveis.
"#;

pub const APOLOGY: &str = "Lamento, não consigo processar isso agora.";
pub const ASK_FILE_FORMAT: &str =
    "Por favor, indique o tipo de ficheiro (ex: pdf, docx, txt, etc.)";

/// Sentinel the memory prompt asks for when nothing personal was said
pub const NO_MEMORY: &str = "N/A";

const PROFILE_HEADER: &str = "As informações a seguir são sobre o usuário. Use-as para personalizar suas respostas de forma implícita, sem mencioná-las diretamente.\n";

pub fn attributes_prompt(user_text: &str) -> String {
    format!(
        "Extraia e salve informações pessoais relevantes do usuário (nome, profissão, interesses, cidade, clube, etc) \
         a partir da mensagem abaixo. Responda apenas com um JSON contendo os campos detectados.\n\
         Mensagem: \"{user_text}\"\n\
         Exemplo de resposta: {{\"nome\": \"Leandro\", \"clube\": \"Sporting\"}}"
    )
}

pub fn memory_prompt(user_text: &str) -> String {
    format!(
        "A partir da mensagem do usuário abaixo, extraia apenas uma frase curta e objetiva que resuma uma informação pessoal relevante sobre o usuário, \
         como gostos, hobbies, interesses, línguas que fala, preferências, profissão, localidade, idade, etc. \
         Ignore informações sobre tópicos de conversa, eventos históricos, notícias, ou qualquer coisa que não seja sobre o próprio usuário. \
         Responda no formato: 'O utilizador ...'. Se não houver informação pessoal relevante, responda apenas com '{NO_MEMORY}'.\n\
         Mensagem: \"{user_text}\""
    )
}

pub fn naming_prompt(user_text: &str) -> String {
    format!(
        "Gere um nome curto, técnico e descritivo para uma conversa de chat com base na mensagem abaixo. \
         O nome deve ter no máximo 5 palavras, evitar adjetivos vagos ou genéricos e descrever claramente o tema da conversa. \
         Se a mensagem for apenas uma saudação ou não indicar um tema, sugira um título neutro como 'Saudações' ou 'Cumprimentos'. \
         Responda apenas com o nome sugerido, sem explicações ou pontuação extra.\n\
         Mensagem: \"{user_text}\""
    )
}

pub fn wants_file_prompt(user_text: &str) -> String {
    format!(
        "Isto é para gerar um ficheiro? Responde só sim ou não, sem contexto nem formatação. Frase: {user_text}"
    )
}

pub fn file_format_prompt(user_text: &str) -> String {
    format!(
        "Que tipo de ficheiro é suposto ser gerado? Responde só pdf, txt, csv, json, py, docx, xlsx, pptx ou outro tipo simples, \
         sem contexto nem formatação. Frase: {user_text}"
    )
}

/// System block describing the user, or `None` when nothing is known
pub fn profile_context(profile: &UserProfile) -> Option<String> {
    let attributes: Vec<_> = profile
        .attributes
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .collect();
    if attributes.is_empty() && profile.memories.is_empty() {
        return None;
    }

    let mut context = String::from(PROFILE_HEADER);
    for (key, value) in attributes {
        context.push_str(&format!("- {}: {}\n", label(key), value));
    }
    if !profile.memories.is_empty() {
        context.push_str("- Outras informações relevantes:\n");
        for sentence in &profile.memories {
            context.push_str(&format!("  - {}\n", sentence));
        }
    }
    Some(context)
}

/// "cidade_natal" -> "Cidade natal"
fn label(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

pub fn file_link(chat_dir: &str, filename: &str) -> String {
    format!("\n\n[Download do arquivo gerado](/files/{}/{})", chat_dir, filename)
}

pub fn image_reply(chat_dir: &str, filename: &str) -> String {
    format!(
        "Imagem gerada com sucesso! [Download da imagem gerada](/files/{}/{})",
        chat_dir, filename
    )
}

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use super::guard::{self, GuardDecision};
use super::planner::{PlannedAction, Planner};
use super::state::TranslationState;
use super::tools::{DocumentTranslationTool, ToolRegistry};
use crate::config::Config;
use crate::error::Result;
use crate::language::Language;
use crate::llm::ChatMessage;
use crate::messages::Message;

type TranslationJob = JoinHandle<Result<Option<PathBuf>>>;

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub history_limit: usize,
    pub max_upload_bytes: u64,
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            history_limit: config.session.history_limit,
            max_upload_bytes: config.upload.max_size_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    pub text: String,
    /// Language the reply was written for
    pub language: Language,
}

/// One conversation: its own history, translation state and translation job.
pub struct ChatSession {
    id: Uuid,
    state: TranslationState,
    history: VecDeque<ChatMessage>,
    language: Language,
    last_output: Option<PathBuf>,
    job: Option<TranslationJob>,
    planner: Arc<dyn Planner>,
    translation_tool: Arc<dyn DocumentTranslationTool>,
    tools: Arc<ToolRegistry>,
    options: SessionOptions,
}

impl ChatSession {
    pub fn new(
        planner: Arc<dyn Planner>,
        translation_tool: Arc<dyn DocumentTranslationTool>,
        tools: Arc<ToolRegistry>,
        options: SessionOptions,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: TranslationState::default(),
            history: VecDeque::new(),
            language: Language::English,
            last_output: None,
            job: None,
            planner,
            translation_tool,
            tools,
            options,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> TranslationState {
        self.state
    }

    /// Language of the user's most recent message.
    pub fn language(&self) -> Language {
        self.language
    }

    pub fn last_output(&self) -> Option<&PathBuf> {
        self.last_output.as_ref()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Handle one user turn.
    pub async fn handle_message(&mut self, text: &str) -> Result<AgentReply> {
        self.collect_finished_job().await;

        let language = Language::detect(text);
        self.language = language;
        self.remember(ChatMessage::user(text));

        let history: Vec<ChatMessage> = self.history.iter().cloned().collect();
        let action = match self.planner.plan(&history, &self.tools.descriptions()).await {
            Ok(action) => action,
            Err(e) => {
                warn!("Session {}: planning failed: {}", self.id, e);
                PlannedAction::Reply { text: Message::Failed.render(language) }
            }
        };

        let reply = match action {
            PlannedAction::Reply { text } => text,
            PlannedAction::Translate { source, target } => self.start_translation(source.as_deref(), target.as_deref()),
            PlannedAction::UseTool { tool, input } => match self.tools.call(&tool, input).await {
                Ok(Some(output)) => output,
                Ok(None) => Message::UnknownTool { name: tool }.render(language),
                Err(e) => {
                    warn!("Session {}: {}", self.id, e);
                    Message::Failed.render(language)
                }
            },
        };

        self.remember(ChatMessage::assistant(reply.clone()));
        Ok(AgentReply { text: reply, language })
    }

    fn start_translation(&mut self, source: Option<&str>, target: Option<&str>) -> String {
        match guard::evaluate(self.state, source, target) {
            GuardDecision::Allow { source, target } => {
                info!("Session {}: starting translation {} -> {}", self.id, source, target);
                self.state = TranslationState::WaitingForFile;
                let tool = Arc::clone(&self.translation_tool);
                self.job = Some(tokio::spawn(async move { tool.run(source, target).await }));
                Message::UploadPrompt {
                    max_size_mb: self.options.max_upload_bytes.div_ceil(1024 * 1024),
                }
                .render(self.language)
            }
            GuardDecision::Clarify(message) | GuardDecision::Refuse(message) => message.render(self.language),
        }
    }

    async fn collect_finished_job(&mut self) {
        if self.job.as_ref().is_some_and(|job| job.is_finished()) {
            self.collect_job().await;
        }
    }

    async fn collect_job(&mut self) {
        let Some(job) = self.job.take() else {
            return;
        };
        self.state = match job.await {
            Ok(Ok(Some(path))) => {
                info!("Session {}: translation finished: {}", self.id, path.display());
                self.last_output = Some(path);
                TranslationState::TranslationComplete
            }
            Ok(Ok(None)) => {
                info!("Session {}: no file received", self.id);
                TranslationState::NoTranslation
            }
            Ok(Err(e)) => {
                warn!("Session {}: translation failed: {}", self.id, e);
                TranslationState::NoTranslation
            }
            Err(e) => {
                warn!("Session {}: translation task ended abnormally: {}", self.id, e);
                TranslationState::NoTranslation
            }
        };
    }

    /// Wait for a running translation job, if any, and return the resulting state.
    pub async fn wait_for_translation(&mut self) -> TranslationState {
        self.collect_job().await;
        self.state
    }

    /// Start over: abort any job, forget the conversation and the translation.
    pub fn reset(&mut self) -> AgentReply {
        if let Some(job) = self.job.take() {
            job.abort();
        }
        self.id = Uuid::new_v4();
        self.state = TranslationState::NoTranslation;
        self.history.clear();
        self.last_output = None;
        AgentReply {
            text: Message::SessionReset.render(self.language),
            language: self.language,
        }
    }

    fn remember(&mut self, message: ChatMessage) {
        self.history.push_back(message);
        while self.history.len() > self.options.history_limit.max(1) {
            self.history.pop_front();
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(job) = self.job.take() {
            job.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::Value;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::agent::tools::{ExternalTool, ToolDescription};

    struct FixedPlanner(PlannedAction);

    #[async_trait]
    impl Planner for FixedPlanner {
        async fn plan(&self, _history: &[ChatMessage], _tools: &[ToolDescription]) -> Result<PlannedAction> {
            Ok(self.0.clone())
        }
    }

    /// Counts runs; each run waits for a gate permit when gated.
    struct GatedTool {
        calls: AtomicUsize,
        pairs: Mutex<Vec<(Language, Language)>>,
        gate: Option<Semaphore>,
        output: Option<PathBuf>,
    }

    impl GatedTool {
        fn new(gated: bool, output: Option<&str>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                pairs: Mutex::new(Vec::new()),
                gate: gated.then(|| Semaphore::new(0)),
                output: output.map(PathBuf::from),
            }
        }

        fn open(&self) {
            if let Some(gate) = &self.gate {
                gate.add_permits(1);
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentTranslationTool for GatedTool {
        async fn run(&self, source: Language, target: Language) -> Result<Option<PathBuf>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pairs.lock().unwrap().push((source, target));
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await;
            }
            Ok(self.output.clone())
        }
    }

    struct StockTool;

    #[async_trait]
    impl ExternalTool for StockTool {
        fn name(&self) -> &str {
            "stock_price"
        }

        fn description(&self) -> &str {
            "Latest price for a ticker"
        }

        async fn call(&self, input: Value) -> Result<String> {
            Ok(format!("{} is 1000", input["symbol"].as_str().unwrap_or("?")))
        }
    }

    fn translate(source: Option<&str>, target: Option<&str>) -> PlannedAction {
        PlannedAction::Translate {
            source: source.map(str::to_string),
            target: target.map(str::to_string),
        }
    }

    fn session(action: PlannedAction, tool: Arc<GatedTool>) -> ChatSession {
        let mut tools = ToolRegistry::default();
        tools.register(StockTool);
        ChatSession::new(
            Arc::new(FixedPlanner(action)),
            tool,
            Arc::new(tools),
            SessionOptions {
                history_limit: 4,
                max_upload_bytes: 10 * 1024 * 1024,
            },
        )
    }

    #[tokio::test]
    async fn test_waiting_for_file_blocks_second_request() {
        let tool = Arc::new(GatedTool::new(true, Some("/out/translated_deck.pptx")));
        let mut session = session(translate(Some("English"), Some("Japanese")), tool.clone());

        let first = session.handle_message("Please translate my deck from English to Japanese").await.unwrap();
        assert_eq!(first.text, Message::UploadPrompt { max_size_mb: 10 }.render(Language::English));
        assert_eq!(session.state(), TranslationState::WaitingForFile);
        tokio::task::yield_now().await;

        let second = session.handle_message("Translate it from English to Japanese again").await.unwrap();
        assert_eq!(second.text, Message::TranslationInProgress.render(Language::English));
        assert_eq!(session.state(), TranslationState::WaitingForFile);

        tool.open();
        assert_eq!(session.wait_for_translation().await, TranslationState::TranslationComplete);
        assert_eq!(tool.calls(), 1);
        assert_eq!(session.last_output(), Some(&PathBuf::from("/out/translated_deck.pptx")));

        let third = session.handle_message("And once more please").await.unwrap();
        assert_eq!(third.text, Message::TranslationAlreadyComplete.render(Language::English));
        assert_eq!(tool.calls(), 1);
    }

    #[tokio::test]
    async fn test_finished_job_collected_at_next_turn() {
        let tool = Arc::new(GatedTool::new(false, Some("/out/translated_deck.pptx")));
        let mut session = session(translate(Some("en"), Some("ja")), tool.clone());

        session.handle_message("translate en to ja").await.unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let reply = session.handle_message("again please").await.unwrap();
        assert_eq!(reply.text, Message::TranslationAlreadyComplete.render(Language::English));
        assert_eq!(session.state(), TranslationState::TranslationComplete);
    }

    #[tokio::test]
    async fn test_unknown_language_asks_and_does_not_invoke() {
        let tool = Arc::new(GatedTool::new(false, None));
        let mut session = session(translate(Some("English"), Some("Klingon")), tool.clone());

        let reply = session.handle_message("Translate my slides into Klingon").await.unwrap();
        assert_eq!(
            reply.text,
            Message::UnsupportedLanguage { phrase: "Klingon".to_string() }.render(Language::English)
        );
        assert_eq!(session.state(), TranslationState::NoTranslation);
        tokio::task::yield_now().await;
        assert_eq!(tool.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_language_question_in_user_language() {
        let tool = Arc::new(GatedTool::new(false, None));
        let mut session = session(translate(None, Some("日文")), tool.clone());

        let reply = session.handle_message("請幫我把簡報翻譯成日文").await.unwrap();
        assert_eq!(reply.text, "請問您要將 PowerPoint 從哪種語言翻譯成哪種語言？");
        assert_eq!(reply.language, Language::TraditionalChinese);
        assert_eq!(tool.calls(), 0);
    }

    #[tokio::test]
    async fn test_chinese_phrasing_normalized() {
        let tool = Arc::new(GatedTool::new(false, Some("/out/a.pptx")));
        let mut session = session(translate(Some("華語"), Some("英文")), tool.clone());

        session.handle_message("請把簡報從華語翻成英文").await.unwrap();
        session.wait_for_translation().await;
        assert_eq!(
            tool.pairs.lock().unwrap().clone(),
            vec![(Language::TraditionalChinese, Language::English)]
        );
    }

    #[tokio::test]
    async fn test_abandoned_upload_allows_retry() {
        let tool = Arc::new(GatedTool::new(false, None));
        let mut session = session(translate(Some("en"), Some("ja")), tool.clone());

        session.handle_message("translate en to ja").await.unwrap();
        assert_eq!(session.wait_for_translation().await, TranslationState::NoTranslation);

        session.handle_message("translate en to ja").await.unwrap();
        session.wait_for_translation().await;
        assert_eq!(tool.calls(), 2);
    }

    #[tokio::test]
    async fn test_reset_aborts_job() {
        let tool = Arc::new(GatedTool::new(true, Some("/out/a.pptx")));
        let mut session = session(translate(Some("en"), Some("ja")), tool.clone());
        let first_id = session.id();

        session.handle_message("translate en to ja").await.unwrap();
        let reply = session.reset();
        assert_eq!(reply.text, Message::SessionReset.render(Language::English));
        assert_eq!(session.state(), TranslationState::NoTranslation);
        assert_ne!(session.id(), first_id);
        assert_eq!(session.history_len(), 0);

        let again = session.handle_message("translate en to ja").await.unwrap();
        assert_eq!(again.text, Message::UploadPrompt { max_size_mb: 10 }.render(Language::English));
    }

    #[tokio::test]
    async fn test_tool_dispatch() {
        let tool = Arc::new(GatedTool::new(false, None));
        let mut known = session(
            PlannedAction::UseTool {
                tool: "stock_price".to_string(),
                input: serde_json::json!({"symbol": "2330.TW"}),
            },
            tool.clone(),
        );
        assert_eq!(known.handle_message("TSMC price?").await.unwrap().text, "2330.TW is 1000");

        let mut unknown = session(
            PlannedAction::UseTool {
                tool: "weather".to_string(),
                input: Value::Null,
            },
            tool,
        );
        assert_eq!(
            unknown.handle_message("天氣如何？").await.unwrap().text,
            Message::UnknownTool { name: "weather".to_string() }.render(Language::TraditionalChinese)
        );
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let tool = Arc::new(GatedTool::new(false, None));
        let mut session = session(PlannedAction::Reply { text: "ok".to_string() }, tool);
        for turn in 0..5 {
            session.handle_message(&format!("message {}", turn)).await.unwrap();
        }
        assert_eq!(session.history_len(), 4);
    }
}
